//! Connection Registry Module
//!
//! Maps live connection ids to the receiver bound to them. An entry is created
//! on the first accepted ADDR from a connection and lives until that
//! connection disconnects. The registry is owned by the coordinator and is
//! never shared between tasks.

use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;

/// Transport-assigned identifier of one TCP session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One live receiver session
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverConnection {
    connection_id: ConnectionId,
    mac_address: String,
    /// Metadata from the most recent accepted ADDR
    pub firmware_version: Option<String>,
    pub interface_address: Option<IpAddr>,
    pub public_address: Option<IpAddr>,
    pub last_seen: Option<NaiveDateTime>,
}

impl ReceiverConnection {
    pub fn new(connection_id: ConnectionId, mac_address: impl Into<String>) -> Self {
        Self {
            connection_id,
            mac_address: mac_address.into(),
            firmware_version: None,
            interface_address: None,
            public_address: None,
            last_seen: None,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Hardware address this session is bound to; fixed for its lifetime
    pub fn mac_address(&self) -> &str {
        &self.mac_address
    }
}

/// Registry of receiver sessions keyed by connection id
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, ReceiverConnection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ConnectionId) -> Option<&ReceiverConnection> {
        self.connections.get(&id)
    }

    /// Return the session for `id`, binding it to `mac_address` if it has none
    ///
    /// An existing binding is returned unchanged even when `mac_address`
    /// differs. Returns `None` only when there is no binding and
    /// `mac_address` is empty.
    pub fn get_or_create(
        &mut self,
        id: ConnectionId,
        mac_address: &str,
    ) -> Option<&mut ReceiverConnection> {
        if !self.connections.contains_key(&id) {
            if mac_address.is_empty() {
                return None;
            }
            self.connections
                .insert(id, ReceiverConnection::new(id, mac_address));
        }
        self.connections.get_mut(&id)
    }

    pub fn remove(&mut self, id: ConnectionId) -> Option<ReceiverConnection> {
        self.connections.remove(&id)
    }

    /// Connections other than `except` bound to `mac_address`
    pub fn bound_to(&self, mac_address: &str, except: ConnectionId) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|conn| conn.connection_id != except && conn.mac_address == mac_address)
            .map(ReceiverConnection::connection_id)
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }
}
