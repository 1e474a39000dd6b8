//! Server statistics

use crate::MessageType;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

/// Counters shared by every connection task
#[derive(Debug)]
pub struct Statistics {
    /// Server start time
    start_time: Instant,
    /// Total connections accepted
    total_connections: AtomicU64,
    /// Currently open connections
    current_connections: AtomicUsize,
    /// Currently registered users
    registered_users: AtomicUsize,
    /// Total messages received
    messages_received: AtomicU64,
    /// Protocol violations seen
    violations: AtomicU64,
    /// Command usage by verb, unknown verbs in one bucket
    command_usage: DashMap<String, u64>,
}

impl Default for Statistics {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            total_connections: AtomicU64::new(0),
            current_connections: AtomicUsize::new(0),
            registered_users: AtomicUsize::new(0),
            messages_received: AtomicU64::new(0),
            violations: AtomicU64::new(0),
            command_usage: DashMap::new(),
        }
    }
}

/// Usage key shared by every verb the server does not know
pub const UNKNOWN_COMMAND_KEY: &str = "UNKNOWN";

/// Point-in-time copy of the counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticsSnapshot {
    pub uptime_seconds: u64,
    pub total_connections: u64,
    pub current_connections: usize,
    pub registered_users: usize,
    pub messages_received: u64,
    pub violations: u64,
}

impl Statistics {
    /// Create new statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Record a new connection
    pub fn record_connection(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.current_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection disconnect
    pub fn record_disconnection(&self) {
        let _ = self
            .current_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Record a completed registration
    pub fn record_registration(&self) {
        self.registered_users.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a registered user leaving
    pub fn record_departure(&self) {
        let _ = self
            .registered_users
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Record a message received.
    ///
    /// Clients choose the verbs they send, so only known verbs get their
    /// own counter.
    pub fn record_message_received(&self, command: &MessageType) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        let key = match command {
            MessageType::Custom(_) => UNKNOWN_COMMAND_KEY.to_string(),
            known => known.to_string(),
        };
        *self.command_usage.entry(key).or_insert(0) += 1;
    }

    /// Record a malformed or overlong line
    pub fn record_violation(&self) {
        self.violations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn current_connections(&self) -> usize {
        self.current_connections.load(Ordering::Relaxed)
    }

    pub fn registered_users(&self) -> usize {
        self.registered_users.load(Ordering::Relaxed)
    }

    /// Get top commands by usage
    pub fn top_commands(&self, limit: usize) -> Vec<(String, u64)> {
        let mut commands: Vec<(String, u64)> = self
            .command_usage
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        commands.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        commands.truncate(limit);
        commands
    }

    /// Copy the counters
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            uptime_seconds: self.uptime_seconds(),
            total_connections: self.total_connections.load(Ordering::Relaxed),
            current_connections: self.current_connections(),
            registered_users: self.registered_users(),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            violations: self.violations.load(Ordering::Relaxed),
        }
    }
}
