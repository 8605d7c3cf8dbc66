//! SQL-backed receiver store
//!
//! Runs against the `RECEIVERS` table through sqlx's `Any` driver, so the same
//! statements serve MySQL deployments and SQLite test databases. Only `?`
//! placeholders are used since both backends accept them.

use async_trait::async_trait;
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;
use tracing::debug;

use super::{DeviceStore, OnlineUpdate};
use crate::utils::error::Result;

/// Format used for `LAST_SEEN`, accepted by both MySQL DATETIME and SQLite TEXT
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct SqlDeviceStore {
    pub(super) pool: AnyPool,
}

impl SqlDeviceStore {
    /// Open a connection pool for `url`
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(url)
            .await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeviceStore for SqlDeviceStore {
    async fn device_exists(&self, mac_address: &str) -> Result<bool> {
        let row = sqlx::query("SELECT ID FROM RECEIVERS WHERE MAC_ADDRESS = ?")
            .bind(mac_address)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn update_online(&self, update: &OnlineUpdate<'_>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE RECEIVERS SET ONLINE = 1, FIRMWARE_VERSION = ?, \
             INTERFACE_ADDRESS = ?, PUBLIC_ADDRESS = ?, LAST_SEEN = ? \
             WHERE MAC_ADDRESS = ?",
        )
        .bind(update.firmware_version)
        .bind(update.interface_address)
        .bind(update.public_address)
        .bind(update.last_seen.format(TIMESTAMP_FORMAT).to_string())
        .bind(update.mac_address)
        .execute(&self.pool)
        .await?;
        debug!(
            "Marked {} online ({} rows)",
            update.mac_address,
            result.rows_affected()
        );
        Ok(())
    }

    async fn update_offline(&self, mac_address: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE RECEIVERS SET ONLINE = 0, INTERFACE_ADDRESS = NULL, \
             PUBLIC_ADDRESS = NULL WHERE MAC_ADDRESS = ?",
        )
        .bind(mac_address)
        .execute(&self.pool)
        .await?;
        debug!("Marked {} offline ({} rows)", mac_address, result.rows_affected());
        Ok(())
    }

    async fn reset_all_offline(&self) -> Result<()> {
        let result = sqlx::query(
            "UPDATE RECEIVERS SET ONLINE = 0, INTERFACE_ADDRESS = NULL, PUBLIC_ADDRESS = NULL",
        )
        .execute(&self.pool)
        .await?;
        debug!("Reset {} receivers offline", result.rows_affected());
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
