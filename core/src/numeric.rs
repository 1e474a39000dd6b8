//! Numeric replies as defined in RFC 1459 / RFC 2812

use crate::{Message, MessageType, Prefix};

/// Numeric reply codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum NumericReply {
    // Connection registration
    RplWelcome = 1,
    RplYourHost = 2,
    RplCreated = 3,
    RplMyInfo = 4,

    // Server queries
    RplUmodeIs = 221,
    RplLuserClient = 251,
    RplLuserChannels = 254,
    RplLuserMe = 255,
    RplIsOn = 303,
    RplChannelModeIs = 324,
    RplNoTopic = 331,
    RplTopic = 332,
    RplNameReply = 353,
    RplEndOfNames = 366,
    RplBanList = 367,
    RplEndOfBanList = 368,
    RplMotd = 372,
    RplMotdStart = 375,
    RplEndOfMotd = 376,

    // Errors
    ErrNoSuchNick = 401,
    ErrNoSuchChannel = 403,
    ErrTooManyChannels = 405,
    ErrNoRecipient = 411,
    ErrNoTextToSend = 412,
    ErrInputTooLong = 417,
    ErrUnknownCommand = 421,
    ErrNoMotd = 422,
    ErrNoNicknameGiven = 431,
    ErrErroneousNickname = 432,
    ErrNicknameInUse = 433,
    ErrUserNotInChannel = 441,
    ErrNotOnChannel = 442,
    ErrNotRegistered = 451,
    ErrNeedMoreParams = 461,
    ErrAlreadyRegistered = 462,
    ErrUnknownMode = 472,
    ErrBannedFromChan = 474,
    ErrBadChannelKey = 475,
    ErrChanOpPrivsNeeded = 482,
    ErrUmodeUnknownFlag = 501,
    ErrUsersDontMatch = 502,
}

impl NumericReply {
    /// Numeric value
    pub fn numeric_code(&self) -> u16 {
        *self as u16
    }

    /// Three digit wire form
    pub fn code(&self) -> String {
        format!("{:03}", self.numeric_code())
    }

    /// Create a numeric reply message from `server` to `target`
    pub fn reply(&self, server: &str, target: &str, params: Vec<String>) -> Message {
        let mut all_params = Vec::with_capacity(params.len() + 1);
        all_params.push(target.to_string());
        all_params.extend(params);

        Message::with_prefix(
            Prefix::Server(server.to_string()),
            MessageType::Custom(self.code()),
            all_params,
        )
    }
}

/// Common numeric replies
impl NumericReply {
    /// RPL_WELCOME
    pub fn welcome(server: &str, network: &str, nick: &str, user: &str, host: &str) -> Message {
        Self::RplWelcome.reply(
            server,
            nick,
            vec![format!(
                "Welcome to the {} IRC Network {}!{}@{}",
                network, nick, user, host
            )],
        )
    }

    /// RPL_YOURHOST
    pub fn your_host(server: &str, nick: &str, version: &str) -> Message {
        Self::RplYourHost.reply(
            server,
            nick,
            vec![format!("Your host is {}, running version {}", server, version)],
        )
    }

    /// RPL_CREATED
    pub fn created(server: &str, nick: &str, date: &str) -> Message {
        Self::RplCreated.reply(server, nick, vec![format!("This server was created {}", date)])
    }

    /// RPL_MYINFO
    pub fn my_info(server: &str, nick: &str, version: &str) -> Message {
        // No user modes; channel ban, key, op and voice
        Self::RplMyInfo.reply(
            server,
            nick,
            vec![server.to_string(), version.to_string(), "-".to_string(), "bkov".to_string()],
        )
    }

    /// RPL_LUSERCLIENT
    pub fn luser_client(server: &str, nick: &str, users: usize) -> Message {
        Self::RplLuserClient.reply(
            server,
            nick,
            vec![format!("There are {} users and 0 invisible on 1 servers", users)],
        )
    }

    /// RPL_LUSERCHANNELS
    pub fn luser_channels(server: &str, nick: &str, channels: usize) -> Message {
        Self::RplLuserChannels.reply(
            server,
            nick,
            vec![channels.to_string(), "channels formed".to_string()],
        )
    }

    /// RPL_LUSERME
    pub fn luser_me(server: &str, nick: &str, clients: usize) -> Message {
        Self::RplLuserMe.reply(
            server,
            nick,
            vec![format!("I have {} clients and 0 servers", clients)],
        )
    }

    /// RPL_ISON
    pub fn is_on(server: &str, nick: &str, online: &[String]) -> Message {
        Self::RplIsOn.reply(server, nick, vec![online.join(" ")])
    }

    /// RPL_UMODEIS
    pub fn umode_is(server: &str, nick: &str) -> Message {
        Self::RplUmodeIs.reply(server, nick, vec!["+".to_string()])
    }

    /// RPL_CHANNELMODEIS, `modes` being the flag word followed by its arguments
    pub fn channel_mode_is(server: &str, nick: &str, channel: &str, modes: Vec<String>) -> Message {
        let mut params = Vec::with_capacity(modes.len() + 1);
        params.push(channel.to_string());
        params.extend(modes);
        Self::RplChannelModeIs.reply(server, nick, params)
    }

    /// RPL_BANLIST
    pub fn ban_list(server: &str, nick: &str, channel: &str, mask: &str) -> Message {
        Self::RplBanList.reply(server, nick, vec![channel.to_string(), mask.to_string()])
    }

    /// RPL_ENDOFBANLIST
    pub fn end_of_ban_list(server: &str, nick: &str, channel: &str) -> Message {
        Self::RplEndOfBanList.reply(
            server,
            nick,
            vec![channel.to_string(), "End of channel ban list".to_string()],
        )
    }

    /// RPL_NOTOPIC
    pub fn no_topic(server: &str, nick: &str, channel: &str) -> Message {
        Self::RplNoTopic.reply(
            server,
            nick,
            vec![channel.to_string(), "No topic is set".to_string()],
        )
    }

    /// RPL_TOPIC
    pub fn topic(server: &str, nick: &str, channel: &str, topic: &str) -> Message {
        Self::RplTopic.reply(server, nick, vec![channel.to_string(), topic.to_string()])
    }

    /// RPL_NAMREPLY
    pub fn name_reply(server: &str, nick: &str, channel: &str, names: &[String]) -> Message {
        Self::RplNameReply.reply(
            server,
            nick,
            vec!["=".to_string(), channel.to_string(), names.join(" ")],
        )
    }

    /// RPL_ENDOFNAMES
    pub fn end_of_names(server: &str, nick: &str, channel: &str) -> Message {
        Self::RplEndOfNames.reply(
            server,
            nick,
            vec![channel.to_string(), "End of /NAMES list".to_string()],
        )
    }

    /// RPL_MOTDSTART
    pub fn motd_start(server: &str, nick: &str) -> Message {
        Self::RplMotdStart.reply(
            server,
            nick,
            vec![format!("- {} Message of the Day -", server)],
        )
    }

    /// RPL_MOTD
    pub fn motd_line(server: &str, nick: &str, line: &str) -> Message {
        Self::RplMotd.reply(server, nick, vec![format!("- {}", line)])
    }

    /// RPL_ENDOFMOTD
    pub fn end_of_motd(server: &str, nick: &str) -> Message {
        Self::RplEndOfMotd.reply(server, nick, vec!["End of /MOTD command".to_string()])
    }
}
