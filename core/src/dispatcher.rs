//! Command dispatch for a single session.
//!
//! A dispatcher owns its [`Session`] and runs on that session's connection
//! task, so commands from one client are handled strictly in order. Shared
//! state is reached only through the registry and router, neither of which
//! is ever locked across an await point; dispatch itself never awaits.

use crate::server::ServerState;
use crate::utils::string::{is_valid_nickname, sanitize_username};
use crate::{
    Error, Malformation, Message, MessageType, NumericReply, Prefix, ReplyError, Result, Session,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default reason for a QUIT without one
pub const DEFAULT_QUIT_REASON: &str = "Client Quit";

/// Reason used when a session sends too many malformed lines
pub const EXCESS_VIOLATIONS: &str = "Excess protocol violations";

/// Handler result type
pub type HandlerResult = std::result::Result<Flow, ReplyError>;

/// What the connection should do after a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading
    Continue,
    /// Close the session with the given reason
    Quit(String),
}

/// Per-session command dispatcher
pub struct Dispatcher {
    state: Arc<ServerState>,
    session: Session,
    /// Malformed lines seen so far
    violations: u32,
}

impl Dispatcher {
    /// Create a dispatcher for a freshly accepted session
    pub fn new(state: Arc<ServerState>, session: Session) -> Self {
        Self {
            state,
            session,
            violations: 0,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub(crate) fn state(&self) -> &ServerState {
        &self.state
    }

    pub(crate) fn server_name(&self) -> &str {
        &self.state.config.server.name
    }

    /// Queue a message for this session
    pub(crate) fn send(&self, message: &Message) {
        self.state.router.send_to(self.session.id(), message);
    }

    /// Report a command failure to this session only
    pub(crate) fn reply_error(&self, error: &ReplyError) {
        let reply = error.to_reply(self.server_name(), self.session.target());
        self.send(&reply);
    }

    /// Handle one parsed message
    pub fn dispatch(&mut self, message: Message) -> Result<Flow> {
        if self.session.is_closed() {
            return Err(Error::SessionClosed);
        }

        debug!("Session {} -> {}", self.session.id(), message);
        self.state.stats.record_message_received(&message.command);

        match self.execute(&message) {
            Ok(flow) => Ok(flow),
            Err(error) => {
                debug!("Session {}: {}", self.session.id(), error);
                self.reply_error(&error);
                Ok(Flow::Continue)
            }
        }
    }

    /// Handle a line the codec rejected.
    ///
    /// Empty lines are ignored. Anything else counts as a violation and, past
    /// the configured limit, ends the session.
    pub fn malformed(&mut self, malformation: &Malformation) -> Flow {
        let error = match malformation {
            Malformation::Empty => return Flow::Continue,
            Malformation::TooLong(_) => ReplyError::InputTooLong,
            Malformation::Unparseable(_) => ReplyError::UnknownCommand("*".to_string()),
        };

        self.violations += 1;
        self.state.stats.record_violation();
        warn!(
            "Protocol violation from session {} ({}): {}",
            self.session.id(),
            self.violations,
            malformation
        );
        self.reply_error(&error);

        if self.violations > self.state.config.connection.max_violations {
            return Flow::Quit(EXCESS_VIOLATIONS.to_string());
        }
        Flow::Continue
    }

    fn execute(&mut self, message: &Message) -> HandlerResult {
        // Accepted in any state
        match message.command {
            MessageType::Cap | MessageType::Pong => return Ok(Flow::Continue),
            MessageType::Ping => return self.handle_ping(message),
            MessageType::Quit => return Ok(self.handle_quit(message)),
            MessageType::Nick => return self.handle_nick(message),
            MessageType::User => return self.handle_user(message),
            _ => {}
        }

        if !self.session.is_registered() {
            return Err(ReplyError::NotRegistered);
        }

        match &message.command {
            MessageType::Join => self.handle_join(message),
            MessageType::Part => self.handle_part(message),
            MessageType::Topic => self.handle_topic(message),
            MessageType::Names => self.handle_names(message),
            MessageType::Mode => self.handle_mode(message),
            MessageType::Kick => self.handle_kick(message),
            MessageType::Ban => self.handle_ban(message),
            MessageType::PrivMsg => self.handle_privmsg(message),
            MessageType::Notice => Ok(self.handle_notice(message)),
            MessageType::Ison => self.handle_ison(message),
            MessageType::Lusers => self.handle_lusers(),
            MessageType::Motd => self.send_motd(),
            other => Err(ReplyError::UnknownCommand(other.to_string())),
        }
    }

    /// Handle NICK command
    fn handle_nick(&mut self, message: &Message) -> HandlerResult {
        let nick = message.param(0).ok_or(ReplyError::NoNicknameGiven)?;

        // Validate nickname
        let max_length = self.state.config.limits.max_nickname_length;
        if !is_valid_nickname(nick, max_length) {
            return Err(ReplyError::ErroneousNickname(nick.to_string()));
        }

        let id = self.session.id();
        let Some(old) = self.session.nick().map(str::to_string) else {
            self.state.registry.reserve(nick, id)?;
            self.session.set_nick(nick.to_string());
            self.try_register();
            return Ok(Flow::Continue);
        };

        if old == nick {
            return Ok(Flow::Continue);
        }

        // Commit to the registry before anyone hears about it
        let peers = self.state.registry.rename(&old, nick, id)?;
        let old_prefix = self.session.prefix();
        self.session.set_nick(nick.to_string());

        if self.session.is_registered() {
            info!("Session {} renamed {} -> {}", id, old, nick);
            let notice = Message::with_prefix(old_prefix, MessageType::Nick, vec![nick.to_string()]);
            self.state.router.send_to_all(&peers, &notice);
        }
        Ok(Flow::Continue)
    }

    /// Handle USER command
    fn handle_user(&mut self, message: &Message) -> HandlerResult {
        if self.session.is_registered() {
            return Err(ReplyError::AlreadyRegistered);
        }
        if message.params.len() < 4 {
            return Err(ReplyError::NeedMoreParams("USER".to_string()));
        }

        let max_length = self.state.config.limits.max_nickname_length;
        let username = sanitize_username(&message.params[0], max_length);
        if username.is_empty() {
            return Err(ReplyError::NeedMoreParams("USER".to_string()));
        }

        self.session.set_user(username, message.params[3].clone());
        self.try_register();
        Ok(Flow::Continue)
    }

    /// Complete registration once both NICK and USER are in
    fn try_register(&mut self) {
        if !self.session.has_identity() || !self.session.mark_registered() {
            return;
        }
        self.state.stats.record_registration();

        let nick = self.session.target().to_string();
        let user = self.session.username().unwrap_or("*").to_string();
        let host = self.session.host().to_string();
        let latency = self
            .session
            .registered_at()
            .map(|at| (at - self.session.connected_at()).num_milliseconds())
            .unwrap_or_default();
        info!(
            "Session {} registered as {}!{}@{} ({}) after {}ms",
            self.session.id(),
            nick,
            user,
            host,
            self.session.realname().unwrap_or_default(),
            latency
        );

        let server = &self.state.config.server;
        let created = self
            .state
            .created
            .format("%a %b %d %Y at %H:%M:%S UTC")
            .to_string();
        let welcome = [
            NumericReply::welcome(&server.name, &server.network, &nick, &user, &host),
            NumericReply::your_host(&server.name, &nick, &server.version),
            NumericReply::created(&server.name, &nick, &created),
            NumericReply::my_info(&server.name, &nick, &server.version),
        ];
        for reply in &welcome {
            self.send(reply);
        }

        if let Err(error) = self.send_motd() {
            self.reply_error(&error);
        }
    }

    /// Send the MOTD block
    fn send_motd(&self) -> HandlerResult {
        let messages = self
            .state
            .motd
            .messages(self.server_name(), self.session.target())?;
        for message in &messages {
            self.send(message);
        }
        Ok(Flow::Continue)
    }

    /// Handle PING command
    fn handle_ping(&self, message: &Message) -> HandlerResult {
        let token = message
            .param(0)
            .ok_or_else(|| ReplyError::NeedMoreParams("PING".to_string()))?;
        let pong = Message::with_prefix(
            Prefix::Server(self.server_name().to_string()),
            MessageType::Pong,
            vec![self.server_name().to_string(), token.to_string()],
        );
        self.send(&pong);
        Ok(Flow::Continue)
    }

    /// Handle QUIT command
    fn handle_quit(&self, message: &Message) -> Flow {
        let reason = message.param(0).unwrap_or(DEFAULT_QUIT_REASON);
        Flow::Quit(reason.to_string())
    }

    /// Handle ISON command
    fn handle_ison(&self, message: &Message) -> HandlerResult {
        // Nicknames may arrive as separate params or one trailing list
        let online: Vec<String> = message
            .params
            .iter()
            .flat_map(|param| param.split_whitespace())
            .filter(|nick| self.state.registry.lookup(nick).is_some())
            .map(str::to_string)
            .collect();

        let reply = NumericReply::is_on(self.server_name(), self.session.target(), &online);
        self.send(&reply);
        Ok(Flow::Continue)
    }

    /// Handle LUSERS command
    fn handle_lusers(&self) -> HandlerResult {
        let server = self.server_name();
        let nick = self.session.target();
        let users = self.state.stats.registered_users();

        self.send(&NumericReply::luser_client(server, nick, users));
        self.send(&NumericReply::luser_channels(
            server,
            nick,
            self.state.registry.channel_count(),
        ));
        self.send(&NumericReply::luser_me(
            server,
            nick,
            self.state.router.session_count(),
        ));
        Ok(Flow::Continue)
    }

    /// Tear the session down.
    ///
    /// Cleanup runs exactly once whatever path got here: registry entries go
    /// first, then co-members hear the QUIT, then the client gets its ERROR
    /// line and the session stops being routable.
    pub fn close(&mut self, reason: &str) {
        let was_registered = self.session.is_registered();
        if !self.session.mark_closed() {
            return;
        }

        let id = self.session.id();
        let departure = self.state.registry.remove_session(id);

        if was_registered {
            self.state.stats.record_departure();
            let quit = Message::with_prefix(
                self.session.prefix(),
                MessageType::Quit,
                vec![reason.to_string()],
            );
            self.state.router.send_to_all(&departure.peers, &quit);
        }

        let error = Message::new(
            MessageType::Error,
            vec![format!("Closing Link: {} ({})", self.session.host(), reason)],
        );
        self.send(&error);
        self.state.router.unregister(id);

        let lifetime = Utc::now() - self.session.connected_at();
        info!(
            "Session {} ({}) closed after {}s: {}",
            id,
            departure.nick.as_deref().unwrap_or("*"),
            lifetime.num_seconds(),
            reason
        );
    }
}
