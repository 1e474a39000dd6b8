//! Error types for the chat daemon

use crate::{Message, NumericReply};
use thiserror::Error;

/// Infrastructure error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed line: {0}")]
    MalformedLine(Malformation),

    #[error("Session closed")]
    SessionClosed,

    #[error("Server error: {0}")]
    Server(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Why an inbound line was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Malformation {
    #[error("empty line")]
    Empty,

    #[error("line exceeds {0} bytes")]
    TooLong(usize),

    #[error("{0}")]
    Unparseable(&'static str),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(format!("Failed to parse config file: {}", e))
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(format!("Failed to serialize config: {}", e))
    }
}

/// Command-level failure reported to the offending session only.
///
/// Every variant maps to exactly one numeric reply. None of them are ever
/// broadcast and none of them terminate the connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplyError {
    #[error("No such nick/channel: {0}")]
    NoSuchNick(String),

    #[error("No such channel: {0}")]
    NoSuchChannel(String),

    #[error("Too many channels: {0}")]
    TooManyChannels(String),

    #[error("No recipient given ({0})")]
    NoRecipient(String),

    #[error("No text to send")]
    NoTextToSend,

    #[error("Input line was too long")]
    InputTooLong,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("MOTD file is missing")]
    NoMotd,

    #[error("No nickname given")]
    NoNicknameGiven,

    #[error("Erroneous nickname: {0}")]
    ErroneousNickname(String),

    #[error("Nickname is already in use: {0}")]
    NicknameInUse(String),

    #[error("{nick} is not on channel {channel}")]
    UserNotInChannel { nick: String, channel: String },

    #[error("You're not on that channel: {0}")]
    NotOnChannel(String),

    #[error("You have not registered")]
    NotRegistered,

    #[error("Not enough parameters: {0}")]
    NeedMoreParams(String),

    #[error("You may not reregister")]
    AlreadyRegistered,

    #[error("Unknown mode char: {0}")]
    UnknownMode(char),

    #[error("Banned from channel: {0}")]
    BannedFromChannel(String),

    #[error("Bad channel key: {0}")]
    BadChannelKey(String),

    #[error("Not channel operator: {0}")]
    ChanOpPrivsNeeded(String),

    #[error("Unknown user mode flag")]
    UnknownModeFlag,

    #[error("Cannot change mode for other users")]
    UsersDontMatch,
}

impl ReplyError {
    /// Numeric code this error is reported with
    pub fn numeric(&self) -> NumericReply {
        match self {
            ReplyError::NoSuchNick(_) => NumericReply::ErrNoSuchNick,
            ReplyError::NoSuchChannel(_) => NumericReply::ErrNoSuchChannel,
            ReplyError::TooManyChannels(_) => NumericReply::ErrTooManyChannels,
            ReplyError::NoRecipient(_) => NumericReply::ErrNoRecipient,
            ReplyError::NoTextToSend => NumericReply::ErrNoTextToSend,
            ReplyError::InputTooLong => NumericReply::ErrInputTooLong,
            ReplyError::UnknownCommand(_) => NumericReply::ErrUnknownCommand,
            ReplyError::NoMotd => NumericReply::ErrNoMotd,
            ReplyError::NoNicknameGiven => NumericReply::ErrNoNicknameGiven,
            ReplyError::ErroneousNickname(_) => NumericReply::ErrErroneousNickname,
            ReplyError::NicknameInUse(_) => NumericReply::ErrNicknameInUse,
            ReplyError::UserNotInChannel { .. } => NumericReply::ErrUserNotInChannel,
            ReplyError::NotOnChannel(_) => NumericReply::ErrNotOnChannel,
            ReplyError::NotRegistered => NumericReply::ErrNotRegistered,
            ReplyError::NeedMoreParams(_) => NumericReply::ErrNeedMoreParams,
            ReplyError::AlreadyRegistered => NumericReply::ErrAlreadyRegistered,
            ReplyError::UnknownMode(_) => NumericReply::ErrUnknownMode,
            ReplyError::BannedFromChannel(_) => NumericReply::ErrBannedFromChan,
            ReplyError::BadChannelKey(_) => NumericReply::ErrBadChannelKey,
            ReplyError::ChanOpPrivsNeeded(_) => NumericReply::ErrChanOpPrivsNeeded,
            ReplyError::UnknownModeFlag => NumericReply::ErrUmodeUnknownFlag,
            ReplyError::UsersDontMatch => NumericReply::ErrUsersDontMatch,
        }
    }

    /// Build the numeric line sent back to `target` (nick or `*`)
    pub fn to_reply(&self, server: &str, target: &str) -> Message {
        let params = match self {
            ReplyError::NoSuchNick(nick) => vec![nick.clone(), "No such nick/channel".to_string()],
            ReplyError::NoSuchChannel(chan) => vec![chan.clone(), "No such channel".to_string()],
            ReplyError::TooManyChannels(chan) => {
                vec![chan.clone(), "You have joined too many channels".to_string()]
            }
            ReplyError::NoRecipient(cmd) => vec![format!("No recipient given ({})", cmd)],
            ReplyError::NoTextToSend => vec!["No text to send".to_string()],
            ReplyError::InputTooLong => vec!["Input line was too long".to_string()],
            ReplyError::UnknownCommand(cmd) => vec![cmd.clone(), "Unknown command".to_string()],
            ReplyError::NoMotd => vec!["MOTD File is missing".to_string()],
            ReplyError::NoNicknameGiven => vec!["No nickname given".to_string()],
            ReplyError::ErroneousNickname(nick) => vec![nick.clone(), "Erroneous nickname".to_string()],
            ReplyError::NicknameInUse(nick) => {
                vec![nick.clone(), "Nickname is already in use".to_string()]
            }
            ReplyError::UserNotInChannel { nick, channel } => vec![
                nick.clone(),
                channel.clone(),
                "They aren't on that channel".to_string(),
            ],
            ReplyError::NotOnChannel(chan) => {
                vec![chan.clone(), "You're not on that channel".to_string()]
            }
            ReplyError::NotRegistered => vec!["You have not registered".to_string()],
            ReplyError::NeedMoreParams(cmd) => vec![cmd.clone(), "Not enough parameters".to_string()],
            ReplyError::AlreadyRegistered => vec!["You may not reregister".to_string()],
            ReplyError::UnknownMode(mode) => {
                vec![mode.to_string(), "is unknown mode char to me".to_string()]
            }
            ReplyError::BannedFromChannel(chan) => {
                vec![chan.clone(), "Cannot join channel (+b)".to_string()]
            }
            ReplyError::BadChannelKey(chan) => {
                vec![chan.clone(), "Cannot join channel (+k)".to_string()]
            }
            ReplyError::ChanOpPrivsNeeded(chan) => {
                vec![chan.clone(), "You're not channel operator".to_string()]
            }
            ReplyError::UnknownModeFlag => vec!["Unknown MODE flag".to_string()],
            ReplyError::UsersDontMatch => vec!["Cannot change mode for other users".to_string()],
        };
        self.numeric().reply(server, target, params)
    }
}
