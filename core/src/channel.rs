//! Channel commands: JOIN, PART, TOPIC, NAMES, MODE, KICK, BAN

use crate::dispatcher::{Dispatcher, Flow, HandlerResult};
use crate::registry::{JoinOutcome, JoinRequest, MemberMode};
use crate::utils::string::{is_channel_target, is_valid_channel_name, truncate};
use crate::{Message, MessageType, NumericReply, ReplyError, SessionId};
use tracing::info;

/// Default reason for a KICK without one
pub const DEFAULT_KICK_REASON: &str = "No reason given";

/// Split a comma separated list, skipping empty entries
fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').filter(|item| !item.is_empty())
}

impl Dispatcher {
    /// Handle JOIN command
    pub(crate) fn handle_join(&self, message: &Message) -> HandlerResult {
        let channels = message
            .param(0)
            .ok_or_else(|| ReplyError::NeedMoreParams("JOIN".to_string()))?;

        // Keys pair with channels by position
        let mut keys = message.param(1).map(|keys| keys.split(','));

        for channel in split_list(channels) {
            let key = keys
                .as_mut()
                .and_then(|keys| keys.next())
                .filter(|key| !key.is_empty());
            if let Err(error) = self.join_channel(channel, key) {
                self.reply_error(&error);
            }
        }
        Ok(Flow::Continue)
    }

    fn join_channel(&self, channel: &str, key: Option<&str>) -> Result<(), ReplyError> {
        let limits = &self.state().config.limits;
        if !is_valid_channel_name(channel, limits.max_channel_name_length) {
            return Err(ReplyError::NoSuchChannel(channel.to_string()));
        }

        let mask = self.session().prefix().to_string();
        let request = JoinRequest::new(self.session().id(), &mask, limits.max_channels_per_client)
            .with_key(key);
        let outcome = self.state().registry.join(channel, &request)?;

        let JoinOutcome::Joined { members, topic } = outcome else {
            return Ok(());
        };

        info!("{} joined {}", self.session().target(), channel);

        // Everyone including the joiner sees the JOIN
        let join = Message::with_prefix(
            self.session().prefix(),
            MessageType::Join,
            vec![channel.to_string()],
        );
        self.state().router.send_to_all(&members, &join);

        if let Some(topic) = topic {
            self.send(&NumericReply::topic(
                self.server_name(),
                self.session().target(),
                channel,
                &topic.text,
            ));
        }
        self.send_names(channel);
        self.send(&NumericReply::end_of_names(
            self.server_name(),
            self.session().target(),
            channel,
        ));
        Ok(())
    }

    /// Handle PART command
    pub(crate) fn handle_part(&self, message: &Message) -> HandlerResult {
        let channels = message
            .param(0)
            .ok_or_else(|| ReplyError::NeedMoreParams("PART".to_string()))?;
        let reason = message.param(1);

        for channel in split_list(channels) {
            match self.state().registry.part(channel, self.session().id()) {
                Ok(prior) => {
                    info!("{} left {}", self.session().target(), channel);

                    let mut params = vec![channel.to_string()];
                    if let Some(reason) = reason {
                        params.push(reason.to_string());
                    }
                    let part = Message::with_prefix(self.session().prefix(), MessageType::Part, params);
                    self.state().router.send_to_all(&prior, &part);
                }
                Err(error) => self.reply_error(&error),
            }
        }
        Ok(Flow::Continue)
    }

    /// Handle TOPIC command
    pub(crate) fn handle_topic(&self, message: &Message) -> HandlerResult {
        let channel = message
            .param(0)
            .ok_or_else(|| ReplyError::NeedMoreParams("TOPIC".to_string()))?;
        let server = self.server_name();
        let nick = self.session().target();

        // Query
        let Some(text) = message.params.get(1) else {
            let reply = match self.state().registry.topic(channel)? {
                Some(topic) => NumericReply::topic(server, nick, channel, &topic.text),
                None => NumericReply::no_topic(server, nick, channel),
            };
            self.send(&reply);
            return Ok(Flow::Continue);
        };

        let text = truncate(text, self.state().config.limits.max_topic_length);
        let members = self
            .state()
            .registry
            .set_topic(channel, self.session().id(), text, nick)?;

        let topic = Message::with_prefix(
            self.session().prefix(),
            MessageType::Topic,
            vec![channel.to_string(), text.to_string()],
        );
        self.state().router.send_to_all(&members, &topic);
        Ok(Flow::Continue)
    }

    /// Handle NAMES command
    pub(crate) fn handle_names(&self, message: &Message) -> HandlerResult {
        let server = self.server_name();
        let nick = self.session().target();

        match message.param(0) {
            Some(channels) => {
                for channel in split_list(channels) {
                    self.send_names(channel);
                    self.send(&NumericReply::end_of_names(server, nick, channel));
                }
            }
            None => {
                for channel in self.state().registry.channels_of(self.session().id()) {
                    self.send_names(&channel);
                }
                self.send(&NumericReply::end_of_names(server, nick, "*"));
            }
        }
        Ok(Flow::Continue)
    }

    /// RPL_NAMREPLY for `channel`; nothing if it does not exist
    fn send_names(&self, channel: &str) {
        if let Some(names) = self.state().registry.names(channel) {
            self.send(&NumericReply::name_reply(
                self.server_name(),
                self.session().target(),
                channel,
                &names,
            ));
        }
    }

    /// Handle MODE command
    pub(crate) fn handle_mode(&self, message: &Message) -> HandlerResult {
        let target = message
            .param(0)
            .ok_or_else(|| ReplyError::NeedMoreParams("MODE".to_string()))?;

        if !is_channel_target(target) {
            return self.user_mode(target, message.param(1));
        }

        let Some(modes) = message.param(1) else {
            let modes = self
                .state()
                .registry
                .channel_modes(target, self.session().id())?;
            self.send(&NumericReply::channel_mode_is(
                self.server_name(),
                self.session().target(),
                target,
                modes,
            ));
            return Ok(Flow::Continue);
        };

        let mut args = message.params.iter().skip(2).map(String::as_str);
        let mut enable = true;
        for flag in modes.chars() {
            let change = match flag {
                '+' => {
                    enable = true;
                    continue;
                }
                '-' => {
                    enable = false;
                    continue;
                }
                'k' => self.change_key(target, enable, &mut args),
                'o' => self.change_member_mode(target, MemberMode::Operator, enable, args.next()),
                'v' => self.change_member_mode(target, MemberMode::Voice, enable, args.next()),
                'b' => self.change_ban(target, enable, args.next()),
                other => Err(ReplyError::UnknownMode(other)),
            };

            match change {
                Ok(Some((members, params))) => self.broadcast_mode(target, &members, params),
                Ok(None) => {}
                Err(error) => self.reply_error(&error),
            }
        }
        Ok(Flow::Continue)
    }

    /// MODE aimed at a nickname. No user modes exist, so only a query of
    /// one's own modes succeeds.
    fn user_mode(&self, target: &str, modes: Option<&str>) -> HandlerResult {
        if target != self.session().target() {
            return match self.state().registry.lookup(target) {
                Some(_) => Err(ReplyError::UsersDontMatch),
                None => Err(ReplyError::NoSuchNick(target.to_string())),
            };
        }

        match modes {
            Some(modes) if modes.chars().any(|c| c != '+' && c != '-') => {
                Err(ReplyError::UnknownModeFlag)
            }
            _ => {
                self.send(&NumericReply::umode_is(self.server_name(), self.session().target()));
                Ok(Flow::Continue)
            }
        }
    }

    /// Apply `+k <key>` or `-k`
    fn change_key<'a>(
        &self,
        channel: &str,
        enable: bool,
        args: &mut impl Iterator<Item = &'a str>,
    ) -> ModeChange {
        let id = self.session().id();
        if !enable {
            let members = self.state().registry.set_key(channel, id, None)?;
            return Ok(Some((members, vec!["-k".to_string()])));
        }

        let key = args
            .next()
            .ok_or_else(|| ReplyError::NeedMoreParams("MODE".to_string()))?;
        let members = self.state().registry.set_key(channel, id, Some(key))?;
        Ok(Some((members, vec!["+k".to_string(), key.to_string()])))
    }

    /// Apply `+o`, `-o`, `+v` or `-v` to a member
    fn change_member_mode(
        &self,
        channel: &str,
        mode: MemberMode,
        enable: bool,
        target: Option<&str>,
    ) -> ModeChange {
        let target = target.ok_or_else(|| ReplyError::NeedMoreParams("MODE".to_string()))?;
        let members = self.state().registry.set_member_mode(
            channel,
            self.session().id(),
            target,
            mode,
            enable,
        )?;

        let flag = format!("{}{}", sign(enable), mode.flag());
        Ok(Some((members, vec![flag, target.to_string()])))
    }

    /// Apply `+b <mask>` or `-b <mask>`. A bare `+b` lists the bans.
    fn change_ban(&self, channel: &str, enable: bool, mask: Option<&str>) -> ModeChange {
        let Some(mask) = mask else {
            if !enable {
                return Err(ReplyError::NeedMoreParams("MODE".to_string()));
            }
            self.send_ban_list(channel)?;
            return Ok(None);
        };

        let changed = self
            .state()
            .registry
            .set_ban(channel, self.session().id(), mask, enable)?;
        Ok(changed.map(|members| {
            let flag = format!("{}b", sign(enable));
            (members, vec![flag, mask.to_string()])
        }))
    }

    /// RPL_BANLIST per mask, then RPL_ENDOFBANLIST
    fn send_ban_list(&self, channel: &str) -> Result<(), ReplyError> {
        let server = self.server_name();
        let nick = self.session().target();
        for mask in self.state().registry.bans(channel)? {
            self.send(&NumericReply::ban_list(server, nick, channel, &mask));
        }
        self.send(&NumericReply::end_of_ban_list(server, nick, channel));
        Ok(())
    }

    fn broadcast_mode(&self, channel: &str, members: &[SessionId], change: Vec<String>) {
        info!(
            "{} set MODE {} {}",
            self.session().target(),
            channel,
            change.join(" ")
        );

        let mut params = vec![channel.to_string()];
        params.extend(change);
        let mode = Message::with_prefix(self.session().prefix(), MessageType::Mode, params);
        self.state().router.send_to_all(members, &mode);
    }

    /// Handle KICK command
    pub(crate) fn handle_kick(&self, message: &Message) -> HandlerResult {
        if message.params.len() < 2 {
            return Err(ReplyError::NeedMoreParams("KICK".to_string()));
        }
        let channel = &message.params[0];
        let target = &message.params[1];
        let reason = message.param(2).unwrap_or(DEFAULT_KICK_REASON);

        let prior = self
            .state()
            .registry
            .kick(channel, self.session().id(), target)?;
        info!(
            "{} kicked {} from {}: {}",
            self.session().target(),
            target,
            channel,
            reason
        );

        // The kicked member hears it too
        let kick = Message::with_prefix(
            self.session().prefix(),
            MessageType::Kick,
            vec![channel.to_string(), target.to_string(), reason.to_string()],
        );
        self.state().router.send_to_all(&prior, &kick);
        Ok(Flow::Continue)
    }

    /// Handle BAN command, shorthand for `MODE <channel> +b <mask>`
    pub(crate) fn handle_ban(&self, message: &Message) -> HandlerResult {
        if message.params.len() < 2 {
            return Err(ReplyError::NeedMoreParams("BAN".to_string()));
        }
        let channel = &message.params[0];

        if let Some((members, change)) = self.change_ban(channel, true, message.param(1))? {
            self.broadcast_mode(channel, &members, change);
        }
        Ok(Flow::Continue)
    }
}

/// Recipients and MODE parameters of an applied change, or `None` if
/// nothing needs announcing
type ModeChange = Result<Option<(Vec<SessionId>, Vec<String>)>, ReplyError>;

fn sign(enable: bool) -> char {
    if enable {
        '+'
    } else {
        '-'
    }
}
