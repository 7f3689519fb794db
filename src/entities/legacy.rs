// Flat asset / liability rows (name, amount, category).
//
// These predate the item + snapshot model and still live in their own
// tables. `migrate_legacy_entities` folds them into the balance sheet.

use super::balance_sheet::{self, BalanceSheetType, NewBalanceSheetItem};
use crate::error::FinanceError;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetEntity {
    pub id: i64,
    pub name: String,
    pub amount: f64,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiabilityEntity {
    pub id: i64,
    pub name: String,
    pub amount: f64,
    pub category: String,
}

// Row shape shared by both flat tables
type FlatRow = (i64, String, f64, String);

fn insert_flat(conn: &Connection, table: &str, name: &str, amount: f64, category: &str) -> Result<i64> {
    conn.execute(
        &format!("INSERT INTO {} (name, amount, category) VALUES (?1, ?2, ?3)", table),
        params![name, amount, category],
    )?;
    Ok(conn.last_insert_rowid())
}

fn update_flat(
    conn: &Connection,
    table: &str,
    entity: &'static str,
    row: (i64, &str, f64, &str),
) -> Result<()> {
    let (id, name, amount, category) = row;
    let changed = conn.execute(
        &format!("UPDATE {} SET name = ?1, amount = ?2, category = ?3 WHERE id = ?4", table),
        params![name, amount, category, id],
    )?;

    if changed == 0 {
        return Err(FinanceError::not_found(entity, id).into());
    }
    Ok(())
}

fn delete_flat(conn: &Connection, table: &str, entity: &'static str, id: i64) -> Result<()> {
    let changed = conn.execute(&format!("DELETE FROM {} WHERE id = ?1", table), [id])?;

    if changed == 0 {
        return Err(FinanceError::not_found(entity, id).into());
    }
    Ok(())
}

fn all_flat(conn: &Connection, table: &str, only_unmigrated: bool) -> Result<Vec<FlatRow>> {
    let filter = if only_unmigrated { "WHERE migrated = 0" } else { "" };
    let mut stmt = conn.prepare(&format!(
        "SELECT id, name, amount, category FROM {} {} ORDER BY name COLLATE NOCASE, id",
        table, filter
    ))?;

    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn total_flat(conn: &Connection, table: &str) -> Result<f64> {
    let total: f64 = conn.query_row(
        &format!("SELECT COALESCE(SUM(amount), 0.0) FROM {}", table),
        [],
        |row| row.get(0),
    )?;
    Ok(total)
}

// ============================================================================
// ASSETS
// ============================================================================

pub fn insert_asset(conn: &Connection, name: &str, amount: f64, category: &str) -> Result<i64> {
    insert_flat(conn, "assets", name, amount, category)
}

pub fn update_asset(conn: &Connection, asset: &AssetEntity) -> Result<()> {
    update_flat(
        conn,
        "assets",
        "asset",
        (asset.id, &asset.name, asset.amount, &asset.category),
    )
}

pub fn delete_asset(conn: &Connection, id: i64) -> Result<()> {
    delete_flat(conn, "assets", "asset", id)
}

pub fn get_all_assets(conn: &Connection) -> Result<Vec<AssetEntity>> {
    Ok(all_flat(conn, "assets", false)?
        .into_iter()
        .map(|(id, name, amount, category)| AssetEntity { id, name, amount, category })
        .collect())
}

pub fn total_assets(conn: &Connection) -> Result<f64> {
    total_flat(conn, "assets")
}

// ============================================================================
// LIABILITIES
// ============================================================================

pub fn insert_liability(conn: &Connection, name: &str, amount: f64, category: &str) -> Result<i64> {
    insert_flat(conn, "liabilities", name, amount, category)
}

pub fn update_liability(conn: &Connection, liability: &LiabilityEntity) -> Result<()> {
    update_flat(
        conn,
        "liabilities",
        "liability",
        (liability.id, &liability.name, liability.amount, &liability.category),
    )
}

pub fn delete_liability(conn: &Connection, id: i64) -> Result<()> {
    delete_flat(conn, "liabilities", "liability", id)
}

pub fn get_all_liabilities(conn: &Connection) -> Result<Vec<LiabilityEntity>> {
    Ok(all_flat(conn, "liabilities", false)?
        .into_iter()
        .map(|(id, name, amount, category)| LiabilityEntity { id, name, amount, category })
        .collect())
}

pub fn total_liabilities(conn: &Connection) -> Result<f64> {
    total_flat(conn, "liabilities")
}

// ============================================================================
// MIGRATION
// ============================================================================

/// Copy every not-yet-migrated flat row into a balance-sheet item carrying
/// one snapshot of its amount. Safe to run repeatedly.
pub fn migrate_legacy_entities(conn: &Connection) -> Result<usize> {
    migrate_legacy_entities_at(conn, Utc::now())
}

/// Same as [`migrate_legacy_entities`] with an explicit snapshot timestamp
pub fn migrate_legacy_entities_at(conn: &Connection, timestamp: DateTime<Utc>) -> Result<usize> {
    let tx = conn
        .unchecked_transaction()
        .context("Failed to start legacy migration")?;

    let mut migrated = 0;
    for (table, item_type) in [
        ("assets", BalanceSheetType::Asset),
        ("liabilities", BalanceSheetType::Liability),
    ] {
        for (id, name, amount, category) in all_flat(&tx, table, true)? {
            let item_id = balance_sheet::insert_item(
                &tx,
                &NewBalanceSheetItem { name, category, item_type },
            )?;
            balance_sheet::insert_value(&tx, item_id, amount, timestamp)?;
            tx.execute(&format!("UPDATE {} SET migrated = 1 WHERE id = ?1", table), [id])?;
            migrated += 1;
        }
    }

    tx.commit()?;

    if migrated > 0 {
        info!(count = migrated, "legacy entities migrated to balance sheet");
    }
    Ok(migrated)
}
