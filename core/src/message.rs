//! Wire message parsing and serialization
//!
//! One message per line: `[:prefix] VERB [params...] [:trailing]`.

use crate::{Error, Malformation, Result};
use std::fmt;

/// Maximum length of a line in bytes, CRLF included
pub const MAX_LINE_LENGTH: usize = 512;

/// Message prefix (server or user)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prefix {
    /// Server name
    Server(String),
    /// User prefix (nick!user@host)
    User {
        nick: String,
        user: String,
        host: String,
    },
}

impl Prefix {
    /// Parse the text following the leading colon
    pub fn parse(raw: &str) -> Self {
        if let Some((nick, rest)) = raw.split_once('!') {
            if let Some((user, host)) = rest.split_once('@') {
                return Prefix::User {
                    nick: nick.to_string(),
                    user: user.to_string(),
                    host: host.to_string(),
                };
            }
        }
        Prefix::Server(raw.to_string())
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::Server(name) => write!(f, "{}", name),
            Prefix::User { nick, user, host } => write!(f, "{}!{}@{}", nick, user, host),
        }
    }
}

/// Command verbs understood by the server
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageType {
    // Registration
    Nick,
    User,
    Quit,
    Cap,

    // Channels
    Join,
    Part,
    Topic,
    Names,
    Mode,
    Kick,
    Ban,

    // Messaging
    PrivMsg,
    Notice,

    // Queries
    Ison,
    Lusers,
    Motd,

    // Miscellaneous
    Ping,
    Pong,
    Error,

    // Numerics and anything unknown
    Custom(String),
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageType::Nick => "NICK",
            MessageType::User => "USER",
            MessageType::Quit => "QUIT",
            MessageType::Cap => "CAP",
            MessageType::Join => "JOIN",
            MessageType::Part => "PART",
            MessageType::Topic => "TOPIC",
            MessageType::Names => "NAMES",
            MessageType::Mode => "MODE",
            MessageType::Kick => "KICK",
            MessageType::Ban => "BAN",
            MessageType::PrivMsg => "PRIVMSG",
            MessageType::Notice => "NOTICE",
            MessageType::Ison => "ISON",
            MessageType::Lusers => "LUSERS",
            MessageType::Motd => "MOTD",
            MessageType::Ping => "PING",
            MessageType::Pong => "PONG",
            MessageType::Error => "ERROR",
            MessageType::Custom(cmd) => cmd,
        };
        write!(f, "{}", s)
    }
}

impl From<&str> for MessageType {
    fn from(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "NICK" => MessageType::Nick,
            "USER" => MessageType::User,
            "QUIT" => MessageType::Quit,
            "CAP" => MessageType::Cap,
            "JOIN" => MessageType::Join,
            "PART" => MessageType::Part,
            "TOPIC" => MessageType::Topic,
            "NAMES" => MessageType::Names,
            "MODE" => MessageType::Mode,
            "KICK" => MessageType::Kick,
            "BAN" => MessageType::Ban,
            "PRIVMSG" => MessageType::PrivMsg,
            "NOTICE" => MessageType::Notice,
            "ISON" => MessageType::Ison,
            "LUSERS" => MessageType::Lusers,
            "MOTD" => MessageType::Motd,
            "PING" => MessageType::Ping,
            "PONG" => MessageType::Pong,
            "ERROR" => MessageType::Error,
            other => MessageType::Custom(other.to_string()),
        }
    }
}

/// A single protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Optional prefix (server or user)
    pub prefix: Option<Prefix>,
    /// Command verb
    pub command: MessageType,
    /// Parameters, the trailing one already stripped of its colon
    pub params: Vec<String>,
}

impl Message {
    /// Create a new message
    pub fn new(command: MessageType, params: Vec<String>) -> Self {
        Self {
            prefix: None,
            command,
            params,
        }
    }

    /// Create a new message with prefix
    pub fn with_prefix(prefix: Prefix, command: MessageType, params: Vec<String>) -> Self {
        Self {
            prefix: Some(prefix),
            command,
            params,
        }
    }

    /// Parse one line, with or without its CRLF/LF terminator
    ///
    /// Length limits are enforced by the framing layer, see [`crate::codec::LineCodec`].
    pub fn parse(input: &str) -> Result<Self> {
        let line = input.trim_end_matches(&['\r', '\n'][..]);
        let mut rest = line.trim_start_matches(' ');
        if rest.is_empty() {
            return Err(Error::MalformedLine(Malformation::Empty));
        }

        let prefix = if let Some(stripped) = rest.strip_prefix(':') {
            let (raw, after) = stripped
                .split_once(' ')
                .ok_or(Error::MalformedLine(Malformation::Unparseable("prefix without command")))?;
            if raw.is_empty() {
                return Err(Error::MalformedLine(Malformation::Unparseable("empty prefix")));
            }
            rest = after.trim_start_matches(' ');
            Some(Prefix::parse(raw))
        } else {
            None
        };

        let (verb, mut rest) = match rest.split_once(' ') {
            Some((verb, after)) => (verb, after),
            None => (rest, ""),
        };
        if verb.is_empty() {
            return Err(Error::MalformedLine(Malformation::Unparseable("missing command")));
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            // Trailing parameter swallows the rest of the line, spaces included
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            match rest.split_once(' ') {
                Some((param, after)) => {
                    params.push(param.to_string());
                    rest = after;
                }
                None => {
                    params.push(rest.to_string());
                    break;
                }
            }
        }

        Ok(Message {
            prefix,
            command: MessageType::from(verb),
            params,
        })
    }

    /// Serialize to one wire line terminated by CRLF
    pub fn to_wire(&self) -> String {
        let mut result = String::with_capacity(64);

        if let Some(ref prefix) = self.prefix {
            result.push(':');
            result.push_str(&prefix.to_string());
            result.push(' ');
        }

        result.push_str(&self.command.to_string());

        let last = self.params.len().saturating_sub(1);
        for (i, param) in self.params.iter().enumerate() {
            result.push(' ');
            if i == last && (param.is_empty() || param.contains(' ') || param.starts_with(':')) {
                result.push(':');
            }
            // CR, LF and NUL would split or truncate the line on the peer
            result.extend(param.chars().filter(|c| !matches!(c, '\r' | '\n' | '\0')));
        }

        result.push_str("\r\n");
        result
    }

    /// Parameter at `index`, if present and non-empty
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params
            .get(index)
            .map(|s| s.as_str())
            .filter(|s| !s.is_empty())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_wire().trim_end())
    }
}
