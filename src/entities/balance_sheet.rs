// Balance sheet: assets and liabilities, each valued by dated snapshots.
//
// The current value of an item is its latest snapshot by timestamp. Items
// without snapshots count as zero in every total.

use super::values::{self, ValueSnapshot, ValueTable};
use crate::error::FinanceError;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type BalanceSheetValue = ValueSnapshot;

const TABLE: ValueTable = ValueTable {
    items: "balance_sheet_items",
    values: "balance_sheet_values",
    entity: "balance sheet item",
};

// ============================================================================
// BALANCE SHEET TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceSheetType {
    Asset,
    Liability,
}

impl BalanceSheetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BalanceSheetType::Asset => "asset",
            BalanceSheetType::Liability => "liability",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BalanceSheetType::Asset => "Assets",
            BalanceSheetType::Liability => "Liabilities",
        }
    }
}

impl FromStr for BalanceSheetType {
    type Err = FinanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asset" => Ok(BalanceSheetType::Asset),
            "liability" => Ok(BalanceSheetType::Liability),
            other => Err(FinanceError::InvalidType {
                kind: "balance sheet",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for BalanceSheetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ITEMS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSheetItem {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub item_type: BalanceSheetType,
}

/// Item fields before the database assigns an id
#[derive(Debug, Clone, PartialEq)]
pub struct NewBalanceSheetItem {
    pub name: String,
    pub category: String,
    pub item_type: BalanceSheetType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceSheetItemWithValue {
    pub item: BalanceSheetItem,
    pub latest_value: Option<BalanceSheetValue>,
}

impl BalanceSheetItemWithValue {
    pub fn current_value(&self) -> f64 {
        self.latest_value.as_ref().map_or(0.0, |v| v.value)
    }
}

pub fn insert_item(conn: &Connection, item: &NewBalanceSheetItem) -> Result<i64> {
    conn.execute(
        "INSERT INTO balance_sheet_items (name, category, item_type) VALUES (?1, ?2, ?3)",
        params![item.name, item.category, item.item_type.as_str()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_item(conn: &Connection, item: &BalanceSheetItem) -> Result<()> {
    let changed = conn.execute(
        "UPDATE balance_sheet_items SET name = ?1, category = ?2, item_type = ?3 WHERE id = ?4",
        params![item.name, item.category, item.item_type.as_str(), item.id],
    )?;

    if changed == 0 {
        return Err(FinanceError::not_found(TABLE.entity, item.id).into());
    }
    Ok(())
}

/// Delete an item; its snapshots go with it
pub fn delete_item(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute("DELETE FROM balance_sheet_items WHERE id = ?1", [id])?;

    if changed == 0 {
        return Err(FinanceError::not_found(TABLE.entity, id).into());
    }
    Ok(())
}

pub fn get_item(conn: &Connection, id: i64) -> Result<Option<BalanceSheetItem>> {
    let item = conn
        .query_row(
            "SELECT id, name, category, item_type FROM balance_sheet_items WHERE id = ?1",
            [id],
            map_item,
        )
        .optional()?;
    Ok(item)
}

/// Items with their latest snapshot, ordered by name. `None` returns both types.
pub fn get_items_with_latest_value(
    conn: &Connection,
    item_type: Option<BalanceSheetType>,
) -> Result<Vec<BalanceSheetItemWithValue>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT i.id, i.name, i.category, i.item_type, v.id, v.value, v.timestamp
         FROM balance_sheet_items i
         LEFT JOIN balance_sheet_values v ON v.id = {latest}
         WHERE ?1 IS NULL OR i.item_type = ?1
         ORDER BY i.name COLLATE NOCASE, i.id",
        latest = TABLE.latest_id_subquery("i"),
    ))?;

    let items = stmt
        .query_map([item_type.map(|t| t.as_str())], |row| {
            let item = map_item(row)?;
            let latest_value = values::map_optional_snapshot(row, item.id, 4)?;
            Ok(BalanceSheetItemWithValue { item, latest_value })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(items)
}

fn map_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<BalanceSheetItem> {
    let item_type: String = row.get(3)?;
    Ok(BalanceSheetItem {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        item_type: item_type.parse().map_err(|e: FinanceError| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?,
    })
}

// ============================================================================
// SNAPSHOTS
// ============================================================================

pub fn insert_value(
    conn: &Connection,
    item_id: i64,
    value: f64,
    timestamp: DateTime<Utc>,
) -> Result<i64> {
    values::insert(conn, TABLE, item_id, value, timestamp)
}

pub fn update_value(conn: &Connection, value: &BalanceSheetValue) -> Result<()> {
    values::update(conn, TABLE, value)
}

pub fn delete_value(conn: &Connection, value_id: i64) -> Result<bool> {
    values::delete(conn, TABLE, value_id)
}

pub fn get_values_for_item(conn: &Connection, item_id: i64) -> Result<Vec<BalanceSheetValue>> {
    values::for_item(conn, TABLE, item_id)
}

pub fn get_values_by_type(
    conn: &Connection,
    item_type: BalanceSheetType,
) -> Result<Vec<BalanceSheetValue>> {
    values::by_item_type(conn, TABLE, item_type.as_str())
}

// ============================================================================
// AGGREGATES
// ============================================================================

pub fn total_by_type(conn: &Connection, item_type: BalanceSheetType) -> Result<f64> {
    values::latest_total(conn, TABLE, item_type.as_str())
}

/// Assets total minus liabilities total
pub fn net_worth(conn: &Connection) -> Result<f64> {
    let assets = total_by_type(conn, BalanceSheetType::Asset)?;
    let liabilities = total_by_type(conn, BalanceSheetType::Liability)?;
    Ok(assets - liabilities)
}

/// Sum of latest values per category, largest first
pub fn totals_by_category(
    conn: &Connection,
    item_type: BalanceSheetType,
) -> Result<Vec<(String, f64)>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT i.category, COALESCE(SUM(v.value), 0.0) AS total
         FROM balance_sheet_items i
         LEFT JOIN balance_sheet_values v ON v.id = {latest}
         WHERE i.item_type = ?1
         GROUP BY i.category
         ORDER BY total DESC, i.category",
        latest = TABLE.latest_id_subquery("i"),
    ))?;

    let totals = stmt
        .query_map([item_type.as_str()], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, 9, 0, 0).unwrap()
    }

    fn new_item(name: &str, category: &str, item_type: BalanceSheetType) -> NewBalanceSheetItem {
        NewBalanceSheetItem {
            name: name.to_string(),
            category: category.to_string(),
            item_type,
        }
    }

    #[test]
    fn test_type_parsing() {
        assert_eq!("asset".parse::<BalanceSheetType>().unwrap(), BalanceSheetType::Asset);
        assert_eq!(" Liability ".parse::<BalanceSheetType>().unwrap(), BalanceSheetType::Liability);
        assert!("income".parse::<BalanceSheetType>().is_err());
    }

    #[test]
    fn test_insert_and_get_item() {
        let conn = open_in_memory().unwrap();
        let id = insert_item(&conn, &new_item("Checking", "Bank", BalanceSheetType::Asset)).unwrap();

        let item = get_item(&conn, id).unwrap().unwrap();
        assert_eq!(item.name, "Checking");
        assert_eq!(item.category, "Bank");
        assert_eq!(item.item_type, BalanceSheetType::Asset);

        assert!(get_item(&conn, id + 100).unwrap().is_none());
    }

    #[test]
    fn test_latest_value_is_chosen_by_timestamp() {
        let conn = open_in_memory().unwrap();
        let id = insert_item(&conn, &new_item("Brokerage", "Investments", BalanceSheetType::Asset)).unwrap();

        insert_value(&conn, id, 500.0, at(10)).unwrap();
        // Backdated entry recorded later must not become current
        insert_value(&conn, id, 100.0, at(1)).unwrap();

        let items = get_items_with_latest_value(&conn, Some(BalanceSheetType::Asset)).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].current_value(), 500.0);
        assert_eq!(items[0].latest_value.as_ref().unwrap().timestamp, at(10));
    }

    #[test]
    fn test_item_without_snapshots_counts_as_zero() {
        let conn = open_in_memory().unwrap();
        insert_item(&conn, &new_item("Car", "Vehicle", BalanceSheetType::Asset)).unwrap();

        let items = get_items_with_latest_value(&conn, None).unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].latest_value.is_none());
        assert_eq!(items[0].current_value(), 0.0);
        assert_eq!(total_by_type(&conn, BalanceSheetType::Asset).unwrap(), 0.0);
    }

    #[test]
    fn test_totals_and_net_worth() {
        let conn = open_in_memory().unwrap();
        let cash = insert_item(&conn, &new_item("Cash", "Bank", BalanceSheetType::Asset)).unwrap();
        let house = insert_item(&conn, &new_item("House", "Property", BalanceSheetType::Asset)).unwrap();
        let loan = insert_item(&conn, &new_item("Mortgage", "Loans", BalanceSheetType::Liability)).unwrap();

        insert_value(&conn, cash, 1_000.0, at(1)).unwrap();
        insert_value(&conn, cash, 1_500.0, at(2)).unwrap();
        insert_value(&conn, house, 200_000.0, at(1)).unwrap();
        insert_value(&conn, loan, 150_000.0, at(1)).unwrap();

        assert_eq!(total_by_type(&conn, BalanceSheetType::Asset).unwrap(), 201_500.0);
        assert_eq!(total_by_type(&conn, BalanceSheetType::Liability).unwrap(), 150_000.0);
        assert_eq!(net_worth(&conn).unwrap(), 51_500.0);

        // Displayed total equals the sum of displayed latest values
        let items = get_items_with_latest_value(&conn, Some(BalanceSheetType::Asset)).unwrap();
        let sum: f64 = items.iter().map(|i| i.current_value()).sum();
        assert_eq!(sum, 201_500.0);
    }

    #[test]
    fn test_items_filter_and_order() {
        let conn = open_in_memory().unwrap();
        insert_item(&conn, &new_item("savings", "Bank", BalanceSheetType::Asset)).unwrap();
        insert_item(&conn, &new_item("Brokerage", "Investments", BalanceSheetType::Asset)).unwrap();
        insert_item(&conn, &new_item("Card", "Credit", BalanceSheetType::Liability)).unwrap();

        let assets = get_items_with_latest_value(&conn, Some(BalanceSheetType::Asset)).unwrap();
        let names: Vec<&str> = assets.iter().map(|i| i.item.name.as_str()).collect();
        assert_eq!(names, vec!["Brokerage", "savings"]);

        assert_eq!(get_items_with_latest_value(&conn, None).unwrap().len(), 3);
    }

    #[test]
    fn test_delete_item_cascades_to_snapshots() {
        let conn = open_in_memory().unwrap();
        let id = insert_item(&conn, &new_item("Cash", "Bank", BalanceSheetType::Asset)).unwrap();
        insert_value(&conn, id, 10.0, at(1)).unwrap();
        insert_value(&conn, id, 20.0, at(2)).unwrap();

        delete_item(&conn, id).unwrap();

        let orphans: i64 = conn
            .query_row("SELECT COUNT(*) FROM balance_sheet_values", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphans, 0);
        assert!(get_values_for_item(&conn, id).unwrap().is_empty());
    }

    #[test]
    fn test_value_requires_existing_parent() {
        let conn = open_in_memory().unwrap();
        let err = insert_value(&conn, 42, 1.0, at(1)).unwrap_err();
        assert_eq!(
            err.downcast_ref::<FinanceError>(),
            Some(&FinanceError::not_found("balance sheet item", 42))
        );
    }

    #[test]
    fn test_update_and_delete_missing_rows() {
        let conn = open_in_memory().unwrap();
        let ghost = BalanceSheetItem {
            id: 9,
            name: "Ghost".to_string(),
            category: String::new(),
            item_type: BalanceSheetType::Asset,
        };
        assert!(update_item(&conn, &ghost).is_err());
        assert!(delete_item(&conn, 9).is_err());
        assert!(!delete_value(&conn, 9).unwrap());
    }

    #[test]
    fn test_latest_value_within_one_millisecond() {
        let conn = open_in_memory().unwrap();
        let id = insert_item(&conn, &new_item("Wallet", "Cash", BalanceSheetType::Asset)).unwrap();
        let base = at(1);

        insert_value(&conn, id, 100.0, base + chrono::Duration::microseconds(700)).unwrap();
        insert_value(&conn, id, 1.0, base + chrono::Duration::microseconds(200)).unwrap();

        let items = get_items_with_latest_value(&conn, Some(BalanceSheetType::Asset)).unwrap();
        assert_eq!(items[0].current_value(), 100.0);
        assert_eq!(
            items[0].latest_value.as_ref().unwrap().timestamp,
            base + chrono::Duration::microseconds(700)
        );
        assert_eq!(total_by_type(&conn, BalanceSheetType::Asset).unwrap(), 100.0);
    }

    #[test]
    fn test_update_item_and_value() {
        let conn = open_in_memory().unwrap();
        let id = insert_item(&conn, &new_item("Card", "Credit", BalanceSheetType::Liability)).unwrap();
        let value_id = insert_value(&conn, id, 300.0, at(3)).unwrap();

        let mut item = get_item(&conn, id).unwrap().unwrap();
        item.name = "Visa".to_string();
        update_item(&conn, &item).unwrap();

        let mut snapshot = get_values_for_item(&conn, id).unwrap().remove(0);
        assert_eq!(snapshot.id, value_id);
        snapshot.value = 250.0;
        update_value(&conn, &snapshot).unwrap();

        let items = get_items_with_latest_value(&conn, Some(BalanceSheetType::Liability)).unwrap();
        assert_eq!(items[0].item.name, "Visa");
        assert_eq!(items[0].current_value(), 250.0);
    }

    #[test]
    fn test_values_by_type_only_returns_that_type() {
        let conn = open_in_memory().unwrap();
        let a = insert_item(&conn, &new_item("Cash", "Bank", BalanceSheetType::Asset)).unwrap();
        let l = insert_item(&conn, &new_item("Loan", "Loans", BalanceSheetType::Liability)).unwrap();
        insert_value(&conn, a, 1.0, at(2)).unwrap();
        insert_value(&conn, a, 2.0, at(1)).unwrap();
        insert_value(&conn, l, 3.0, at(1)).unwrap();

        let asset_values = get_values_by_type(&conn, BalanceSheetType::Asset).unwrap();
        assert_eq!(asset_values.len(), 2);
        assert!(asset_values.iter().all(|v| v.item_id == a));
        assert!(asset_values[0].timestamp < asset_values[1].timestamp);
    }

    #[test]
    fn test_totals_by_category() {
        let conn = open_in_memory().unwrap();
        let a = insert_item(&conn, &new_item("Checking", "Bank", BalanceSheetType::Asset)).unwrap();
        let b = insert_item(&conn, &new_item("Savings", "Bank", BalanceSheetType::Asset)).unwrap();
        let c = insert_item(&conn, &new_item("ETF", "Investments", BalanceSheetType::Asset)).unwrap();
        insert_value(&conn, a, 100.0, at(1)).unwrap();
        insert_value(&conn, b, 50.0, at(1)).unwrap();
        insert_value(&conn, c, 400.0, at(1)).unwrap();

        let totals = totals_by_category(&conn, BalanceSheetType::Asset).unwrap();
        assert_eq!(
            totals,
            vec![("Investments".to_string(), 400.0), ("Bank".to_string(), 150.0)]
        );
    }
}
