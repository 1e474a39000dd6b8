//! Message fan-out.
//!
//! The router owns the directory of live outbound queues. Recipient sets
//! come from registry snapshots; the registry lock is never held while
//! queues are touched. Each message is serialized once and the same buffer
//! is shared by every recipient.

use crate::{Message, Registry, ReplyError, SendQueue, SessionId};
use dashmap::DashMap;
use std::sync::Arc;

/// Routes messages to session queues
#[derive(Debug)]
pub struct Router {
    registry: Arc<Registry>,
    queues: DashMap<SessionId, SendQueue>,
}

impl Router {
    /// Create a router resolving names through `registry`
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            queues: DashMap::new(),
        }
    }

    /// Make `id` reachable
    pub fn register(&self, id: SessionId, queue: SendQueue) {
        self.queues.insert(id, queue);
    }

    /// Stop delivering to `id`
    pub fn unregister(&self, id: SessionId) -> Option<SendQueue> {
        self.queues.remove(&id).map(|(_, queue)| queue)
    }

    /// Number of reachable sessions
    pub fn session_count(&self) -> usize {
        self.queues.len()
    }

    /// Queue a pre-serialized line for one session
    fn push(&self, id: SessionId, line: &Arc<str>) -> bool {
        // Clone the handle so no shard lock is held across the push
        let queue = match self.queues.get(&id) {
            Some(entry) => entry.value().clone(),
            None => return false,
        };
        queue.push(line.clone())
    }

    /// Deliver `message` to a single session
    pub fn send_to(&self, id: SessionId, message: &Message) -> bool {
        let line: Arc<str> = Arc::from(message.to_wire());
        self.push(id, &line)
    }

    /// Deliver `message` to each of `recipients`.
    /// Returns how many queues accepted it.
    pub fn send_to_all<'a, I>(&self, recipients: I, message: &Message) -> usize
    where
        I: IntoIterator<Item = &'a SessionId>,
    {
        let line: Arc<str> = Arc::from(message.to_wire());
        recipients
            .into_iter()
            .filter(|id| self.push(**id, &line))
            .count()
    }

    /// Deliver to every member of `channel` except `sender`.
    ///
    /// The sender must be a member.
    pub fn send_to_channel(
        &self,
        channel: &str,
        sender: SessionId,
        message: &Message,
    ) -> Result<usize, ReplyError> {
        let recipients = self.registry.message_targets(channel, sender)?;
        Ok(self.send_to_all(&recipients, message))
    }

    /// Deliver to the owner of `nick`
    pub fn send_to_nick(&self, nick: &str, message: &Message) -> Result<(), ReplyError> {
        let id = self
            .registry
            .lookup(nick)
            .ok_or_else(|| ReplyError::NoSuchNick(nick.to_string()))?;
        self.send_to(id, message);
        Ok(())
    }
}
