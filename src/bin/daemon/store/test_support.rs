//! In-memory SQLite fixtures shared by the store, coordinator and lifecycle tests

use sqlx::Row;
use sqlx::any::AnyPoolOptions;

use super::SqlDeviceStore;

/// Snapshot of one `RECEIVERS` row
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverRow {
    pub online: bool,
    pub interface_address: Option<String>,
    pub public_address: Option<String>,
    pub firmware_version: Option<String>,
    pub last_seen: Option<String>,
}

/// A store over a private in-memory database holding an empty `RECEIVERS` table
pub async fn memory_store() -> SqlDeviceStore {
    sqlx::any::install_default_drivers();
    // A single connection that never expires keeps the in-memory database alive
    let pool = AnyPoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    sqlx::query(
        "CREATE TABLE RECEIVERS (\
           ID INTEGER PRIMARY KEY AUTOINCREMENT, \
           MAC_ADDRESS TEXT NOT NULL UNIQUE, \
           ONLINE INTEGER NOT NULL DEFAULT 0, \
           INTERFACE_ADDRESS TEXT, \
           PUBLIC_ADDRESS TEXT, \
           FIRMWARE_VERSION TEXT, \
           LAST_SEEN TEXT)",
    )
    .execute(&pool)
    .await
    .unwrap();

    SqlDeviceStore::from_pool(pool)
}

/// Insert an offline receiver row
pub async fn provision(store: &SqlDeviceStore, mac_address: &str) {
    sqlx::query("INSERT INTO RECEIVERS (MAC_ADDRESS, ONLINE) VALUES (?, 0)")
        .bind(mac_address)
        .execute(&store.pool)
        .await
        .unwrap();
}

/// Insert a receiver row that claims to be online, as left behind by a crash
pub async fn provision_online(store: &SqlDeviceStore, mac_address: &str) {
    sqlx::query(
        "INSERT INTO RECEIVERS (MAC_ADDRESS, ONLINE, INTERFACE_ADDRESS, PUBLIC_ADDRESS, FIRMWARE_VERSION) \
         VALUES (?, 1, '10.0.0.2', '198.51.100.4', '0.9.1')",
    )
    .bind(mac_address)
    .execute(&store.pool)
    .await
    .unwrap();
}

pub async fn fetch_row(store: &SqlDeviceStore, mac_address: &str) -> Option<ReceiverRow> {
    let row = sqlx::query(
        "SELECT ONLINE, INTERFACE_ADDRESS, PUBLIC_ADDRESS, FIRMWARE_VERSION, LAST_SEEN \
         FROM RECEIVERS WHERE MAC_ADDRESS = ?",
    )
    .bind(mac_address)
    .fetch_optional(&store.pool)
    .await
    .unwrap()?;

    Some(ReceiverRow {
        online: row.try_get::<i64, _>("ONLINE").unwrap() != 0,
        interface_address: row.try_get("INTERFACE_ADDRESS").unwrap(),
        public_address: row.try_get("PUBLIC_ADDRESS").unwrap(),
        firmware_version: row.try_get("FIRMWARE_VERSION").unwrap(),
        last_seen: row.try_get("LAST_SEEN").unwrap(),
    })
}

/// Make every subsequent query fail
pub async fn drop_receivers_table(store: &SqlDeviceStore) {
    sqlx::query("DROP TABLE RECEIVERS")
        .execute(&store.pool)
        .await
        .unwrap();
}

pub async fn row_count(store: &SqlDeviceStore) -> i64 {
    sqlx::query("SELECT COUNT(*) AS N FROM RECEIVERS")
        .fetch_one(&store.pool)
        .await
        .unwrap()
        .try_get::<i64, _>("N")
        .unwrap()
}
