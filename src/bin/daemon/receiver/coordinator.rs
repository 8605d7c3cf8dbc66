//! Device State Coordinator
//!
//! Turns command server events into registry changes and receiver table
//! updates. It is the only component that writes receiver rows, and it runs
//! on a single task, so the registry and the table never see interleaved
//! updates.

use chrono::Utc;
use std::net::IpAddr;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::registry::{ConnectionId, ConnectionRegistry};
use super::{is_firmware_version, is_mac_address, parse_interface_address};
use crate::server::ServerEvent;
use crate::server::codec::Command;
use crate::store::{DeviceStore, OnlineUpdate};
use crate::utils::error::Result;

/// Control over live connections, provided by the command server
pub trait ConnectionControl: Send + Sync {
    /// Remote IP of the connection as seen by the server's TCP stack
    ///
    /// Known until the connection is released, even after the peer hung up.
    fn peer_address(&self, id: ConnectionId) -> Option<IpAddr>;

    /// Force-close the connection; a disconnect event follows
    fn close_connection(&self, id: ConnectionId);

    /// Whether [`ConnectionControl::close_connection`] was called for `id`
    fn is_closing(&self, id: ConnectionId) -> bool;

    /// Forget a connection once its disconnect has been handled
    fn release(&self, id: ConnectionId);
}

/// Reasons an ADDR report is refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddrRejection {
    #[error("Invalid MAC address: {0}")]
    InvalidMacAddress(String),

    #[error("Invalid interface address: {0}")]
    InvalidInterfaceAddress(String),

    #[error("Invalid firmware version: {0}")]
    InvalidFirmwareVersion(String),

    #[error("Unknown receiver: {0}")]
    UnknownDevice(String),

    #[error("Receiver lookup failed: {0}")]
    LookupFailed(String),

    #[error("No peer address for connection {0}")]
    ConnectionGone(ConnectionId),
}

pub struct Coordinator<S, C> {
    store: S,
    connections: C,
    registry: ConnectionRegistry,
}

impl<S: DeviceStore, C: ConnectionControl> Coordinator<S, C> {
    pub fn new(store: S, connections: C) -> Self {
        Self {
            store,
            connections,
            registry: ConnectionRegistry::new(),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Route one command server event
    pub async fn dispatch(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::CommandReceived { id, command } => self.handle_command(id, command).await,
            ServerEvent::Disconnected { id } => self.handle_disconnect(id).await,
        }
    }

    /// Execute a command from `id`
    ///
    /// Commands are handled in wire order even when the peer has already hung
    /// up. An ADDR queued behind a close this coordinator requested is dropped.
    pub async fn handle_command(&mut self, id: ConnectionId, command: Command) {
        match command {
            Command::Exit => self.handle_exit(id),
            Command::Addr { .. } if self.connections.is_closing(id) => {
                debug!("Dropping ADDR from closing connection {}", id);
            }
            Command::Addr {
                mac_address,
                interface_address,
                firmware_version,
            } => {
                if let Err(e) = self
                    .handle_addr(id, &mac_address, &interface_address, &firmware_version)
                    .await
                {
                    warn!("Rejected ADDR on connection {}: {}", id, e);
                    self.connections.close_connection(id);
                }
            }
        }
    }

    pub fn handle_exit(&mut self, id: ConnectionId) {
        debug!("Connection {} requested exit", id);
        self.connections.close_connection(id);
    }

    /// Validate an ADDR report and mark the receiver online
    ///
    /// On rejection nothing is written and the caller is expected to close the
    /// connection. A failed write after validation is logged and otherwise
    /// ignored; the row is corrected by the next ADDR or disconnect.
    pub async fn handle_addr(
        &mut self,
        id: ConnectionId,
        mac_address: &str,
        interface_address: &str,
        firmware_version: &str,
    ) -> std::result::Result<(), AddrRejection> {
        if !is_mac_address(mac_address) {
            return Err(AddrRejection::InvalidMacAddress(mac_address.to_string()));
        }
        let interface_address = parse_interface_address(interface_address).ok_or_else(|| {
            AddrRejection::InvalidInterfaceAddress(interface_address.to_string())
        })?;
        if !is_firmware_version(firmware_version) {
            return Err(AddrRejection::InvalidFirmwareVersion(
                firmware_version.to_string(),
            ));
        }

        match self.store.device_exists(mac_address).await {
            Ok(true) => {}
            Ok(false) => return Err(AddrRejection::UnknownDevice(mac_address.to_string())),
            Err(e) => {
                error!("Failed to look up receiver {}: {}", mac_address, e);
                return Err(AddrRejection::LookupFailed(mac_address.to_string()));
            }
        }

        let public_address = self
            .connections
            .peer_address(id)
            .ok_or(AddrRejection::ConnectionGone(id))?;

        let newly_bound = self.registry.get(id).is_none();
        let Some(conn) = self.registry.get_or_create(id, mac_address) else {
            return Err(AddrRejection::InvalidMacAddress(mac_address.to_string()));
        };
        if conn.mac_address() != mac_address {
            warn!(
                "Connection {} is bound to {}; ignoring reported MAC {}",
                id,
                conn.mac_address(),
                mac_address
            );
        }

        let last_seen = Utc::now().naive_utc();
        conn.firmware_version = Some(firmware_version.to_string());
        conn.interface_address = Some(interface_address);
        conn.public_address = Some(public_address);
        conn.last_seen = Some(last_seen);
        let bound_mac = conn.mac_address().to_string();

        if newly_bound {
            let others = self.registry.bound_to(&bound_mac, id);
            if !others.is_empty() {
                warn!(
                    "Receiver {} registered on connection {} while still bound to {:?}",
                    bound_mac, id, others
                );
            }
            info!(
                "Receiver {} online on connection {} from {}",
                bound_mac, id, public_address
            );
        }

        let interface_address = interface_address.to_string();
        let public_address = public_address.to_string();
        let update = OnlineUpdate {
            mac_address: &bound_mac,
            firmware_version,
            interface_address: &interface_address,
            public_address: &public_address,
            last_seen,
        };
        if let Err(e) = self.store.update_online(&update).await {
            error!("Failed to mark receiver {} online: {}", bound_mac, e);
        }

        Ok(())
    }

    /// Mark the receiver bound to `id` offline and forget the binding
    ///
    /// A connection that never registered leaves the table untouched.
    pub async fn handle_disconnect(&mut self, id: ConnectionId) {
        self.connections.release(id);
        let Some(conn) = self.registry.remove(id) else {
            debug!("Unregistered connection {} closed", id);
            return;
        };

        if let Err(e) = self.store.update_offline(conn.mac_address()).await {
            error!("Failed to mark receiver {} offline: {}", conn.mac_address(), e);
            return;
        }
        info!("Receiver {} offline (connection {})", conn.mac_address(), id);
        debug!(
            "Last report from {}: firmware {:?}, interface {:?}, public {:?}, at {:?}",
            conn.mac_address(),
            conn.firmware_version,
            conn.interface_address,
            conn.public_address,
            conn.last_seen
        );
    }

    /// Mark every receiver offline regardless of the registry
    pub async fn reset_all_offline(&self) -> Result<()> {
        self.store.reset_all_offline().await?;
        info!("All receivers marked offline");
        Ok(())
    }
}
