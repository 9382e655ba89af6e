//! SQLite purchases store opened against the synchronized database file.

use std::path::Path;

use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Result, StoreError};

/// Table name shared with databases already published by earlier deployments.
const PURCHASES_TABLE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS purchases_x (
        purchase_id INTEGER PRIMARY KEY AUTOINCREMENT,
        item_name TEXT NOT NULL,
        category TEXT NOT NULL,
        purchase_amount REAL NOT NULL
    );
";

/// One row of the purchases table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Purchase {
    pub id: i64,
    pub item_name: String,
    pub category: String,
    pub amount: f64,
}

/// Row-level access to the purchases database.
///
/// Must be closed (or dropped) before the file is published.
pub struct PurchaseStore {
    conn: Connection,
}

impl PurchaseStore {
    /// Open (or create) the database file and make sure the schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(PURCHASES_TABLE_SQL)?;
        info!("Opened purchases database {}", path.display());

        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(PURCHASES_TABLE_SQL)?;
        Ok(Self { conn })
    }

    /// Insert a purchase and return its ID.
    pub fn add_purchase(&self, item_name: &str, category: &str, amount: f64) -> Result<i64> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(StoreError::InvalidAmount(amount));
        }

        self.conn.execute(
            "INSERT INTO purchases_x (item_name, category, purchase_amount) VALUES (?1, ?2, ?3)",
            params![item_name, category, amount],
        )?;
        let id = self.conn.last_insert_rowid();

        debug!("Added purchase {} ({} / {})", id, item_name, category);
        Ok(id)
    }

    /// All purchases in insertion order.
    pub fn list_purchases(&self) -> Result<Vec<Purchase>> {
        let mut stmt = self.conn.prepare(
            "SELECT purchase_id, item_name, category, purchase_amount
             FROM purchases_x
             ORDER BY purchase_id",
        )?;

        let purchases = stmt
            .query_map([], |row| {
                Ok(Purchase {
                    id: row.get(0)?,
                    item_name: row.get(1)?,
                    category: row.get(2)?,
                    amount: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(purchases)
    }

    /// Close the connection so the file can be published.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| StoreError::Database(e))
    }
}
