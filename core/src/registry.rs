//! Nickname and channel registry.
//!
//! All shared naming state lives behind a single lock: the nickname table,
//! its reverse index, channels and the per-session membership index. Every
//! operation takes the lock once, so a caller never observes a nickname that
//! is half renamed or a channel whose member set disagrees with the
//! membership index. Operations that feed a broadcast return the recipient
//! snapshot taken under the same lock as the mutation.
//!
//! Names are compared as exact byte strings.

use crate::utils::string::matches_mask;
use crate::{ReplyError, SessionId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};

/// Channel topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub text: String,
    pub set_by: String,
    pub set_at: DateTime<Utc>,
}

/// A channel exists exactly as long as it has members
#[derive(Debug, Default)]
struct Channel {
    members: FxHashSet<SessionId>,
    /// Always a subset of `members`
    operators: FxHashSet<SessionId>,
    /// Always a subset of `members`
    voices: FxHashSet<SessionId>,
    topic: Option<Topic>,
    /// Key required to join
    key: Option<String>,
    /// Ban masks in the order they were set
    bans: Vec<String>,
}

impl Channel {
    fn snapshot(&self) -> Vec<SessionId> {
        self.members.iter().copied().collect()
    }
}

/// Status a channel operator can grant to or take from a member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberMode {
    Operator,
    Voice,
}

impl MemberMode {
    /// Mode letter on the wire
    pub fn flag(self) -> char {
        match self {
            MemberMode::Operator => 'o',
            MemberMode::Voice => 'v',
        }
    }
}

/// A session asking to join a channel
#[derive(Debug, Clone, Copy)]
pub struct JoinRequest<'a> {
    pub id: SessionId,
    /// `nick!user@host`, checked against the ban list
    pub mask: &'a str,
    /// Key offered for a keyed channel
    pub key: Option<&'a str>,
    /// Channels the session may be in at once
    pub max_channels: usize,
}

impl<'a> JoinRequest<'a> {
    pub fn new(id: SessionId, mask: &'a str, max_channels: usize) -> Self {
        Self {
            id,
            mask,
            key: None,
            max_channels,
        }
    }

    pub fn with_key(mut self, key: Option<&'a str>) -> Self {
        self.key = key;
        self
    }
}

/// Result of a JOIN
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The session was added. `members` includes the joiner.
    Joined {
        members: Vec<SessionId>,
        topic: Option<Topic>,
    },
    /// The session was already a member; nothing changed
    AlreadyMember,
}

/// What a departing session leaves behind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Departure {
    /// Nickname the session held, if any
    pub nick: Option<String>,
    /// Sessions that shared at least one channel with it, excluding itself
    pub peers: Vec<SessionId>,
    /// Channels it was a member of
    pub channels: Vec<String>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    /// Nickname -> owner
    nicks: FxHashMap<String, SessionId>,
    /// Owner -> nickname
    nick_by_session: FxHashMap<SessionId, String>,
    /// Channel name -> channel
    channels: FxHashMap<String, Channel>,
    /// Session -> channels it belongs to
    memberships: FxHashMap<SessionId, FxHashSet<String>>,
}

impl RegistryInner {
    /// Sessions sharing a channel with `id`, excluding `id`
    fn co_members(&self, id: SessionId) -> FxHashSet<SessionId> {
        let mut peers = FxHashSet::default();
        if let Some(joined) = self.memberships.get(&id) {
            for name in joined {
                if let Some(channel) = self.channels.get(name) {
                    peers.extend(channel.members.iter().copied());
                }
            }
        }
        peers.remove(&id);
        peers
    }

    /// Member nicknames sorted by name, prefixed `@` for operators and `+` for voice
    fn names_of(&self, channel: &Channel) -> Vec<String> {
        let mut members: Vec<(&str, SessionId)> = channel
            .members
            .iter()
            .filter_map(|id| self.nick_by_session.get(id).map(|nick| (nick.as_str(), *id)))
            .collect();
        members.sort_by(|a, b| a.0.cmp(b.0));

        members
            .into_iter()
            .map(|(nick, id)| {
                if channel.operators.contains(&id) {
                    format!("@{}", nick)
                } else if channel.voices.contains(&id) {
                    format!("+{}", nick)
                } else {
                    nick.to_string()
                }
            })
            .collect()
    }

    /// Drop the binding of `nick` in both directions
    fn release(&mut self, nick: &str) {
        if let Some(id) = self.nicks.remove(nick) {
            self.nick_by_session.remove(&id);
        }
    }

    /// Channel `name`, failing with `NoSuchChannel`
    fn channel(&self, name: &str) -> Result<&Channel, ReplyError> {
        self.channels
            .get(name)
            .ok_or_else(|| ReplyError::NoSuchChannel(name.to_string()))
    }

    fn channel_mut(&mut self, name: &str) -> Result<&mut Channel, ReplyError> {
        self.channels
            .get_mut(name)
            .ok_or_else(|| ReplyError::NoSuchChannel(name.to_string()))
    }

    /// Remove `id` from `name`, deleting the channel if it empties
    fn leave(&mut self, name: &str, id: SessionId) {
        let empty = match self.channels.get_mut(name) {
            Some(channel) => {
                channel.members.remove(&id);
                channel.operators.remove(&id);
                channel.voices.remove(&id);
                channel.members.is_empty()
            }
            None => false,
        };
        if empty {
            self.channels.remove(name);
            tracing::debug!("Channel {} removed (no members left)", name);
        }

        let drop_index = match self.memberships.get_mut(&id) {
            Some(joined) => {
                joined.remove(name);
                joined.is_empty()
            }
            None => false,
        };
        if drop_index {
            self.memberships.remove(&id);
        }
    }
}

/// Shared nickname and channel state
#[derive(Debug, Default)]
pub struct Registry {
    inner: Mutex<RegistryInner>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `nick` for `id`.
    ///
    /// Reserving a nickname the session already owns is a no-op. A session
    /// that already holds a different nickname must use [`Registry::rename`].
    pub fn reserve(&self, nick: &str, id: SessionId) -> Result<(), ReplyError> {
        let mut inner = self.inner.lock();

        match inner.nicks.get(nick) {
            Some(owner) if *owner == id => return Ok(()),
            Some(_) => return Err(ReplyError::NicknameInUse(nick.to_string())),
            None => {}
        }

        assert!(
            !inner.nick_by_session.contains_key(&id),
            "session {} reserved a second nickname",
            id
        );

        inner.nicks.insert(nick.to_string(), id);
        inner.nick_by_session.insert(id, nick.to_string());
        Ok(())
    }

    /// Atomically move `id` from `old` to `new`.
    ///
    /// No observer ever sees both names or neither name bound to `id`.
    /// Returns `id` plus every session sharing a channel with it at the
    /// moment of the rename, each once.
    pub fn rename(&self, old: &str, new: &str, id: SessionId) -> Result<Vec<SessionId>, ReplyError> {
        let mut inner = self.inner.lock();

        assert_eq!(
            inner.nicks.get(old),
            Some(&id),
            "session {} renamed a nickname it does not own",
            id
        );

        if old != new {
            if inner.nicks.contains_key(new) {
                return Err(ReplyError::NicknameInUse(new.to_string()));
            }
            inner.release(old);
            inner.nicks.insert(new.to_string(), id);
            inner.nick_by_session.insert(id, new.to_string());
        }

        let mut peers = inner.co_members(id);
        peers.insert(id);
        Ok(peers.into_iter().collect())
    }

    /// Owner of `nick`
    pub fn lookup(&self, nick: &str) -> Option<SessionId> {
        self.inner.lock().nicks.get(nick).copied()
    }

    /// Add a session to `channel`, creating the channel if needed.
    ///
    /// The creator of a channel becomes its operator. Joining an existing
    /// channel needs its key, if one is set, and a mask no ban matches. A
    /// new membership is refused with `TooManyChannels` once the session is
    /// in `max_channels` channels.
    pub fn join(&self, channel: &str, request: &JoinRequest<'_>) -> Result<JoinOutcome, ReplyError> {
        let mut inner = self.inner.lock();
        let id = request.id;

        if let Some(existing) = inner.channels.get(channel) {
            if existing.members.contains(&id) {
                return Ok(JoinOutcome::AlreadyMember);
            }
            if existing.key.is_some() && existing.key.as_deref() != request.key {
                return Err(ReplyError::BadChannelKey(channel.to_string()));
            }
            if existing.bans.iter().any(|ban| matches_mask(ban, request.mask)) {
                return Err(ReplyError::BannedFromChannel(channel.to_string()));
            }
        }

        let joined = inner.memberships.get(&id).map_or(0, |set| set.len());
        if joined >= request.max_channels {
            return Err(ReplyError::TooManyChannels(channel.to_string()));
        }

        let entry = inner.channels.entry(channel.to_string()).or_default();
        if entry.members.is_empty() {
            entry.operators.insert(id);
        }
        entry.members.insert(id);
        let members = entry.snapshot();
        let topic = entry.topic.clone();

        inner
            .memberships
            .entry(id)
            .or_default()
            .insert(channel.to_string());

        Ok(JoinOutcome::Joined { members, topic })
    }

    /// Remove `id` from `channel`.
    ///
    /// Returns the member set as it was before the removal, so the departing
    /// session is included.
    pub fn part(&self, channel: &str, id: SessionId) -> Result<Vec<SessionId>, ReplyError> {
        let mut inner = self.inner.lock();

        let existing = inner.channel(channel)?;
        if !existing.members.contains(&id) {
            return Err(ReplyError::NotOnChannel(channel.to_string()));
        }
        let prior = existing.snapshot();

        inner.leave(channel, id);
        Ok(prior)
    }

    /// Remove the owner of `target` from `channel` on behalf of `kicker`.
    ///
    /// Only channel operators may kick. Returns the member set before the
    /// removal, so the kicked session is included.
    pub fn kick(
        &self,
        channel: &str,
        kicker: SessionId,
        target: &str,
    ) -> Result<Vec<SessionId>, ReplyError> {
        let mut inner = self.inner.lock();

        let existing = inner.channel(channel)?;
        if !existing.members.contains(&kicker) {
            return Err(ReplyError::NotOnChannel(channel.to_string()));
        }
        if !existing.operators.contains(&kicker) {
            return Err(ReplyError::ChanOpPrivsNeeded(channel.to_string()));
        }
        let target_id = *inner
            .nicks
            .get(target)
            .ok_or_else(|| ReplyError::NoSuchNick(target.to_string()))?;
        if !existing.members.contains(&target_id) {
            return Err(ReplyError::UserNotInChannel {
                nick: target.to_string(),
                channel: channel.to_string(),
            });
        }
        let prior = existing.snapshot();

        inner.leave(channel, target_id);
        Ok(prior)
    }

    /// Members of `channel` other than `sender`.
    ///
    /// Fails if the channel does not exist or `sender` is not in it.
    pub fn message_targets(
        &self,
        channel: &str,
        sender: SessionId,
    ) -> Result<Vec<SessionId>, ReplyError> {
        let inner = self.inner.lock();
        let existing = inner.channel(channel)?;
        if !existing.members.contains(&sender) {
            return Err(ReplyError::NotOnChannel(channel.to_string()));
        }
        Ok(existing
            .members
            .iter()
            .copied()
            .filter(|member| *member != sender)
            .collect())
    }

    /// Channels `id` belongs to, sorted
    pub fn channels_of(&self, id: SessionId) -> Vec<String> {
        let inner = self.inner.lock();
        let mut channels: Vec<String> = inner
            .memberships
            .get(&id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        channels.sort();
        channels
    }

    /// Member nicknames of `channel` with their status prefixes, sorted by nickname
    pub fn names(&self, channel: &str) -> Option<Vec<String>> {
        let inner = self.inner.lock();
        let existing = inner.channels.get(channel)?;
        Some(inner.names_of(existing))
    }

    /// Current topic of `channel`
    pub fn topic(&self, channel: &str) -> Result<Option<Topic>, ReplyError> {
        let inner = self.inner.lock();
        Ok(inner.channel(channel)?.topic.clone())
    }

    /// Set or clear (empty `text`) the topic of `channel`.
    ///
    /// Only members may change it. Returns every member, setter included.
    pub fn set_topic(
        &self,
        channel: &str,
        id: SessionId,
        text: &str,
        set_by: &str,
    ) -> Result<Vec<SessionId>, ReplyError> {
        let mut inner = self.inner.lock();
        let existing = inner.channel_mut(channel)?;
        if !existing.members.contains(&id) {
            return Err(ReplyError::NotOnChannel(channel.to_string()));
        }

        existing.topic = if text.is_empty() {
            None
        } else {
            Some(Topic {
                text: text.to_string(),
                set_by: set_by.to_string(),
                set_at: Utc::now(),
            })
        };
        Ok(existing.snapshot())
    }

    /// Mode word and its arguments for RPL_CHANNELMODEIS.
    ///
    /// The key itself is only revealed to members.
    pub fn channel_modes(&self, channel: &str, viewer: SessionId) -> Result<Vec<String>, ReplyError> {
        let inner = self.inner.lock();
        let existing = inner.channel(channel)?;

        let mut flags = String::from("+");
        let mut args = Vec::new();
        if let Some(key) = &existing.key {
            flags.push('k');
            if existing.members.contains(&viewer) {
                args.push(key.clone());
            }
        }

        let mut modes = vec![flags];
        modes.extend(args);
        Ok(modes)
    }

    /// Set or clear (`None`) the key of `channel`.
    ///
    /// Any member may change the key. Returns every member.
    pub fn set_key(
        &self,
        channel: &str,
        id: SessionId,
        key: Option<&str>,
    ) -> Result<Vec<SessionId>, ReplyError> {
        let mut inner = self.inner.lock();
        let existing = inner.channel_mut(channel)?;
        if !existing.members.contains(&id) {
            return Err(ReplyError::NotOnChannel(channel.to_string()));
        }

        existing.key = key.map(str::to_string);
        Ok(existing.snapshot())
    }

    /// Grant or take `mode` from the member holding `target`.
    ///
    /// Only channel operators may do this. Returns every member.
    pub fn set_member_mode(
        &self,
        channel: &str,
        setter: SessionId,
        target: &str,
        mode: MemberMode,
        enable: bool,
    ) -> Result<Vec<SessionId>, ReplyError> {
        let mut inner = self.inner.lock();
        let target_id = inner.nicks.get(target).copied();

        let existing = inner.channel_mut(channel)?;
        if !existing.operators.contains(&setter) {
            return Err(ReplyError::ChanOpPrivsNeeded(channel.to_string()));
        }
        let target_id = target_id.ok_or_else(|| ReplyError::NoSuchNick(target.to_string()))?;
        if !existing.members.contains(&target_id) {
            return Err(ReplyError::UserNotInChannel {
                nick: target.to_string(),
                channel: channel.to_string(),
            });
        }

        let set = match mode {
            MemberMode::Operator => &mut existing.operators,
            MemberMode::Voice => &mut existing.voices,
        };
        if enable {
            set.insert(target_id);
        } else {
            set.remove(&target_id);
        }
        Ok(existing.snapshot())
    }

    /// Add or remove a ban mask on behalf of an operator.
    ///
    /// Returns every member, or `None` when the list did not change.
    pub fn set_ban(
        &self,
        channel: &str,
        setter: SessionId,
        mask: &str,
        enable: bool,
    ) -> Result<Option<Vec<SessionId>>, ReplyError> {
        let mut inner = self.inner.lock();
        let existing = inner.channel_mut(channel)?;
        if !existing.operators.contains(&setter) {
            return Err(ReplyError::ChanOpPrivsNeeded(channel.to_string()));
        }

        let present = existing.bans.iter().any(|ban| ban == mask);
        match (enable, present) {
            (true, false) => existing.bans.push(mask.to_string()),
            (false, true) => existing.bans.retain(|ban| ban != mask),
            _ => return Ok(None),
        }
        Ok(Some(existing.snapshot()))
    }

    /// Ban masks of `channel` in the order they were set
    pub fn bans(&self, channel: &str) -> Result<Vec<String>, ReplyError> {
        let inner = self.inner.lock();
        Ok(inner.channel(channel)?.bans.clone())
    }

    /// Remove every trace of `id`: memberships, empty channels, nickname.
    ///
    /// The returned peers are computed before cleanup.
    pub fn remove_session(&self, id: SessionId) -> Departure {
        let mut inner = self.inner.lock();

        let peers = inner.co_members(id).into_iter().collect();
        let mut channels: Vec<String> = inner
            .memberships
            .get(&id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        channels.sort();

        for name in &channels {
            inner.leave(name, id);
        }

        let nick = inner.nick_by_session.get(&id).cloned();
        if let Some(nick) = &nick {
            inner.release(nick);
        }

        Departure {
            nick,
            peers,
            channels,
        }
    }

    /// Number of existing channels
    pub fn channel_count(&self) -> usize {
        self.inner.lock().channels.len()
    }

    /// Nickname held by `id`
    #[cfg(test)]
    pub(crate) fn nick_of(&self, id: SessionId) -> Option<String> {
        self.inner.lock().nick_by_session.get(&id).cloned()
    }

    /// Number of nicknames in use
    #[cfg(test)]
    pub(crate) fn nick_count(&self) -> usize {
        self.inner.lock().nicks.len()
    }

    /// Members of `channel`, or `None` if it does not exist
    #[cfg(test)]
    pub(crate) fn members_of(&self, channel: &str) -> Option<Vec<SessionId>> {
        self.inner.lock().channels.get(channel).map(Channel::snapshot)
    }

    /// Panic if the indexes disagree with each other
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let inner = self.inner.lock();

        assert_eq!(inner.nicks.len(), inner.nick_by_session.len());
        for (nick, id) in &inner.nicks {
            assert_eq!(inner.nick_by_session.get(id), Some(nick));
        }

        for (name, channel) in &inner.channels {
            assert!(!channel.members.is_empty(), "empty channel {} survived", name);
            assert!(channel.operators.is_subset(&channel.members));
            assert!(channel.voices.is_subset(&channel.members));
            for member in &channel.members {
                assert!(inner.memberships.get(member).map_or(false, |s| s.contains(name)));
            }
        }
        for (id, joined) in &inner.memberships {
            assert!(!joined.is_empty());
            for name in joined {
                assert!(inner.channels.get(name).map_or(false, |c| c.members.contains(id)));
            }
        }
    }
}
