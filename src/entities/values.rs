// Dated value snapshots shared by balance-sheet and budget items.
//
// Both snapshot tables have the same shape (item_id, value, timestamp), so the
// queries live here once and each entity module points them at its own tables.

use crate::db::{parse_db_time, to_db_time};
use crate::error::FinanceError;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

/// A timestamped value recorded against a parent item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueSnapshot {
    pub id: i64,
    pub item_id: i64,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl ValueSnapshot {
    /// Latest snapshot by timestamp; ties go to the later insert
    pub fn latest(values: &[ValueSnapshot]) -> Option<&ValueSnapshot> {
        values
            .iter()
            .max_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)))
    }
}

/// Table pair a snapshot query runs against
#[derive(Debug, Clone, Copy)]
pub(crate) struct ValueTable {
    pub items: &'static str,
    pub values: &'static str,
    pub entity: &'static str,
}

impl ValueTable {
    /// Correlated subquery selecting the latest snapshot id for `{alias}.id`
    pub fn latest_id_subquery(&self, alias: &str) -> String {
        format!(
            "(SELECT lv.id FROM {values} lv WHERE lv.item_id = {alias}.id
              ORDER BY lv.timestamp DESC, lv.id DESC LIMIT 1)",
            values = self.values,
            alias = alias,
        )
    }
}

pub(crate) fn item_exists(conn: &Connection, table: ValueTable, item_id: i64) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            &format!("SELECT id FROM {} WHERE id = ?1", table.items),
            [item_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn insert(
    conn: &Connection,
    table: ValueTable,
    item_id: i64,
    value: f64,
    timestamp: DateTime<Utc>,
) -> Result<i64> {
    if !item_exists(conn, table, item_id)? {
        return Err(FinanceError::not_found(table.entity, item_id).into());
    }

    conn.execute(
        &format!(
            "INSERT INTO {} (item_id, value, timestamp) VALUES (?1, ?2, ?3)",
            table.values
        ),
        params![item_id, value, to_db_time(timestamp)],
    )?;

    Ok(conn.last_insert_rowid())
}

pub(crate) fn update(conn: &Connection, table: ValueTable, snapshot: &ValueSnapshot) -> Result<()> {
    let changed = conn.execute(
        &format!(
            "UPDATE {} SET value = ?1, timestamp = ?2 WHERE id = ?3",
            table.values
        ),
        params![snapshot.value, to_db_time(snapshot.timestamp), snapshot.id],
    )?;

    if changed == 0 {
        return Err(FinanceError::not_found("value", snapshot.id).into());
    }
    Ok(())
}

pub(crate) fn delete(conn: &Connection, table: ValueTable, value_id: i64) -> Result<bool> {
    let changed = conn.execute(
        &format!("DELETE FROM {} WHERE id = ?1", table.values),
        [value_id],
    )?;
    Ok(changed > 0)
}

pub(crate) fn for_item(conn: &Connection, table: ValueTable, item_id: i64) -> Result<Vec<ValueSnapshot>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, item_id, value, timestamp
         FROM {}
         WHERE item_id = ?1
         ORDER BY timestamp ASC, id ASC",
        table.values
    ))?;

    let values = stmt
        .query_map([item_id], map_snapshot)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(values)
}

/// Every snapshot whose parent has the given type, oldest first
pub(crate) fn by_item_type(
    conn: &Connection,
    table: ValueTable,
    item_type: &str,
) -> Result<Vec<ValueSnapshot>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT v.id, v.item_id, v.value, v.timestamp
         FROM {values} v
         JOIN {items} i ON i.id = v.item_id
         WHERE i.item_type = ?1
         ORDER BY v.timestamp ASC, v.id ASC",
        values = table.values,
        items = table.items,
    ))?;

    let values = stmt
        .query_map([item_type], map_snapshot)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(values)
}

/// Sum of each item's latest value, restricted to one item type
pub(crate) fn latest_total(conn: &Connection, table: ValueTable, item_type: &str) -> Result<f64> {
    let total: f64 = conn.query_row(
        &format!(
            "SELECT COALESCE(SUM(v.value), 0.0)
             FROM {items} i
             JOIN {values} v ON v.id = {latest}
             WHERE i.item_type = ?1",
            items = table.items,
            values = table.values,
            latest = table.latest_id_subquery("i"),
        ),
        [item_type],
        |row| row.get(0),
    )?;
    Ok(total)
}

pub(crate) fn map_snapshot(row: &rusqlite::Row<'_>) -> rusqlite::Result<ValueSnapshot> {
    let timestamp: String = row.get(3)?;
    Ok(ValueSnapshot {
        id: row.get(0)?,
        item_id: row.get(1)?,
        value: row.get(2)?,
        timestamp: parse_db_time(3, &timestamp)?,
    })
}

/// Optional snapshot from the trailing (id, value, timestamp) columns of a LEFT JOIN
pub(crate) fn map_optional_snapshot(
    row: &rusqlite::Row<'_>,
    item_id: i64,
    first_col: usize,
) -> rusqlite::Result<Option<ValueSnapshot>> {
    let id: Option<i64> = row.get(first_col)?;
    match id {
        Some(id) => {
            let timestamp: String = row.get(first_col + 2)?;
            Ok(Some(ValueSnapshot {
                id,
                item_id,
                value: row.get(first_col + 1)?,
                timestamp: parse_db_time(first_col + 2, &timestamp)?,
            }))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot(id: i64, value: f64, day: u32) -> ValueSnapshot {
        ValueSnapshot {
            id,
            item_id: 1,
            value,
            timestamp: Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_latest_uses_timestamp_not_position() {
        let values = vec![snapshot(1, 10.0, 5), snapshot(2, 20.0, 1), snapshot(3, 30.0, 3)];
        assert_eq!(ValueSnapshot::latest(&values).unwrap().value, 10.0);
    }

    #[test]
    fn test_latest_breaks_ties_by_id() {
        let values = vec![snapshot(4, 10.0, 5), snapshot(7, 70.0, 5)];
        assert_eq!(ValueSnapshot::latest(&values).unwrap().id, 7);
    }

    #[test]
    fn test_latest_of_empty_is_none() {
        assert!(ValueSnapshot::latest(&[]).is_none());
    }
}
