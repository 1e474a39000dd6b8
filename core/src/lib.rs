//! Gossip chat daemon core
//!
//! This crate provides the session handling, nickname and channel registry,
//! message routing and listener for a single-server IRC-style chat daemon
//! speaking the RFC 1459 line protocol.

pub mod buffer;
pub mod channel;
pub mod codec;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod messaging;
pub mod motd;
pub mod numeric;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod statistics;
pub mod utils;


pub use buffer::{SendQueue, SendQueueReceiver};
pub use codec::LineCodec;
pub use config::Config;
pub use dispatcher::{Dispatcher, Flow};
pub use error::{Error, Malformation, ReplyError, Result};
pub use message::{Message, MessageType, Prefix};
pub use motd::Motd;
pub use numeric::NumericReply;
pub use registry::{Departure, JoinOutcome, JoinRequest, MemberMode, Registry, Topic};
pub use router::Router;
pub use server::{Server, ServerState};
pub use session::{Session, SessionId, SessionState};
pub use statistics::{Statistics, StatisticsSnapshot};

/// Re-exports for convenience
pub use tracing::{debug, error, info, warn};
