//! Server Module
//!
//! This module contains the receiver-facing side of the gnmd daemon.
//!
//! The server module is organized into two components:
//! - codec: Parses and serializes the line-oriented receiver commands
//! - server: Accepts TCP sessions, frames lines and reports events

use crate::receiver::registry::ConnectionId;
use codec::Command;

/// Command codec module - wire keywords, arity checks and line parsing
pub mod codec;

/// Server module - TCP accept loop, per-connection readers and connection handles
pub mod server;

/// Events delivered to the coordinator, in wire order per connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// A well-formed command arrived
    CommandReceived { id: ConnectionId, command: Command },
    /// The connection closed; fires exactly once per accepted connection
    Disconnected { id: ConnectionId },
}
