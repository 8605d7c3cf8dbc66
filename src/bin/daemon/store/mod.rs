//! Store Module
//!
//! The persistence operations the coordinator needs from the receiver table.
//! Receiver rows are provisioned elsewhere; nothing here creates or deletes
//! them.

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::utils::error::Result;

pub mod sql;

pub use sql::SqlDeviceStore;

/// Values written when a receiver comes online
#[derive(Debug, Clone, PartialEq)]
pub struct OnlineUpdate<'a> {
    pub mac_address: &'a str,
    pub firmware_version: &'a str,
    pub interface_address: &'a str,
    pub public_address: &'a str,
    pub last_seen: NaiveDateTime,
}

/// Persistence collaborator for receiver state
///
/// Each update is a single statement so the online flag and both address
/// columns always change together.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Whether a row exists for `mac_address`
    async fn device_exists(&self, mac_address: &str) -> Result<bool>;

    /// Mark the receiver online with fresh addressing and firmware
    async fn update_online(&self, update: &OnlineUpdate<'_>) -> Result<()>;

    /// Mark the receiver offline and clear both addresses
    async fn update_offline(&self, mac_address: &str) -> Result<()>;

    /// Mark every receiver offline and clear all addresses
    async fn reset_all_offline(&self) -> Result<()>;

    /// Cheap round trip used to keep the connection alive
    async fn ping(&self) -> Result<()>;
}

#[cfg(test)]
pub mod test_support;
