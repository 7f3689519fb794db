// Budget: income and expense line items with a due date and dated values.

use super::values::{self, ValueSnapshot, ValueTable};
use crate::db::{parse_db_date, to_db_date};
use crate::error::FinanceError;
use crate::history::percent;
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type BudgetValue = ValueSnapshot;

const TABLE: ValueTable = ValueTable {
    items: "budget_items",
    values: "budget_values",
    entity: "budget item",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetType {
    Income,
    Expense,
}

impl BudgetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetType::Income => "income",
            BudgetType::Expense => "expense",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BudgetType::Income => "Income",
            BudgetType::Expense => "Expenses",
        }
    }
}

impl FromStr for BudgetType {
    type Err = FinanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(BudgetType::Income),
            "expense" => Ok(BudgetType::Expense),
            other => Err(FinanceError::InvalidType {
                kind: "budget",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for BudgetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetItem {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub item_type: BudgetType,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewBudgetItem {
    pub name: String,
    pub category: String,
    pub item_type: BudgetType,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetItemWithValue {
    pub item: BudgetItem,
    pub latest_value: Option<BudgetValue>,
}

impl BudgetItemWithValue {
    pub fn current_value(&self) -> f64 {
        self.latest_value.as_ref().map_or(0.0, |v| v.value)
    }
}

/// Income vs. expense totals shown on the budget dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BudgetSummary {
    pub income: f64,
    pub expense: f64,
    pub net: f64,
    /// Expense-to-income percentage
    pub dti: f64,
}

impl BudgetSummary {
    pub fn from_totals(income: f64, expense: f64) -> Self {
        BudgetSummary {
            income,
            expense,
            net: income - expense,
            dti: percent(expense, income),
        }
    }
}

pub fn insert_item(conn: &Connection, item: &NewBudgetItem) -> Result<i64> {
    conn.execute(
        "INSERT INTO budget_items (name, category, item_type, due_date) VALUES (?1, ?2, ?3, ?4)",
        params![
            item.name,
            item.category,
            item.item_type.as_str(),
            item.due_date.map(to_db_date),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_item(conn: &Connection, item: &BudgetItem) -> Result<()> {
    let changed = conn.execute(
        "UPDATE budget_items
         SET name = ?1, category = ?2, item_type = ?3, due_date = ?4
         WHERE id = ?5",
        params![
            item.name,
            item.category,
            item.item_type.as_str(),
            item.due_date.map(to_db_date),
            item.id,
        ],
    )?;

    if changed == 0 {
        return Err(FinanceError::not_found(TABLE.entity, item.id).into());
    }
    Ok(())
}

pub fn delete_item(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute("DELETE FROM budget_items WHERE id = ?1", [id])?;

    if changed == 0 {
        return Err(FinanceError::not_found(TABLE.entity, id).into());
    }
    Ok(())
}

pub fn get_item(conn: &Connection, id: i64) -> Result<Option<BudgetItem>> {
    let item = conn
        .query_row(
            "SELECT id, name, category, item_type, due_date FROM budget_items WHERE id = ?1",
            [id],
            map_item,
        )
        .optional()?;
    Ok(item)
}

pub fn get_items_with_latest_value(
    conn: &Connection,
    item_type: Option<BudgetType>,
) -> Result<Vec<BudgetItemWithValue>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT i.id, i.name, i.category, i.item_type, i.due_date, v.id, v.value, v.timestamp
         FROM budget_items i
         LEFT JOIN budget_values v ON v.id = {latest}
         WHERE ?1 IS NULL OR i.item_type = ?1
         ORDER BY i.name COLLATE NOCASE, i.id",
        latest = TABLE.latest_id_subquery("i"),
    ))?;

    let items = stmt
        .query_map([item_type.map(|t| t.as_str())], map_item_with_value)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(items)
}

/// Items due on or after `from`, soonest first
pub fn upcoming_due(
    conn: &Connection,
    from: NaiveDate,
    limit: usize,
) -> Result<Vec<BudgetItemWithValue>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT i.id, i.name, i.category, i.item_type, i.due_date, v.id, v.value, v.timestamp
         FROM budget_items i
         LEFT JOIN budget_values v ON v.id = {latest}
         WHERE i.due_date IS NOT NULL AND i.due_date >= ?1
         ORDER BY i.due_date ASC, i.name COLLATE NOCASE
         LIMIT ?2",
        latest = TABLE.latest_id_subquery("i"),
    ))?;

    let items = stmt
        .query_map(params![to_db_date(from), limit as i64], map_item_with_value)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(items)
}

fn map_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<BudgetItem> {
    let item_type: String = row.get(3)?;
    let due_date: Option<String> = row.get(4)?;
    Ok(BudgetItem {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        item_type: item_type.parse().map_err(|e: FinanceError| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?,
        due_date: due_date.map(|d| parse_db_date(4, &d)).transpose()?,
    })
}

fn map_item_with_value(row: &rusqlite::Row<'_>) -> rusqlite::Result<BudgetItemWithValue> {
    let item = map_item(row)?;
    let latest_value = values::map_optional_snapshot(row, item.id, 5)?;
    Ok(BudgetItemWithValue { item, latest_value })
}

pub fn insert_value(
    conn: &Connection,
    item_id: i64,
    value: f64,
    timestamp: DateTime<Utc>,
) -> Result<i64> {
    values::insert(conn, TABLE, item_id, value, timestamp)
}

pub fn update_value(conn: &Connection, value: &BudgetValue) -> Result<()> {
    values::update(conn, TABLE, value)
}

pub fn delete_value(conn: &Connection, value_id: i64) -> Result<bool> {
    values::delete(conn, TABLE, value_id)
}

pub fn get_values_for_item(conn: &Connection, item_id: i64) -> Result<Vec<BudgetValue>> {
    values::for_item(conn, TABLE, item_id)
}

pub fn get_values_by_type(conn: &Connection, item_type: BudgetType) -> Result<Vec<BudgetValue>> {
    values::by_item_type(conn, TABLE, item_type.as_str())
}

pub fn total_by_type(conn: &Connection, item_type: BudgetType) -> Result<f64> {
    values::latest_total(conn, TABLE, item_type.as_str())
}

pub fn budget_summary(conn: &Connection) -> Result<BudgetSummary> {
    let income = total_by_type(conn, BudgetType::Income)?;
    let expense = total_by_type(conn, BudgetType::Expense)?;
    Ok(BudgetSummary::from_totals(income, expense))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, 8, 30, 0).unwrap()
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn new_item(name: &str, item_type: BudgetType, due: Option<NaiveDate>) -> NewBudgetItem {
        NewBudgetItem {
            name: name.to_string(),
            category: "General".to_string(),
            item_type,
            due_date: due,
        }
    }

    #[test]
    fn test_due_date_round_trip() {
        let conn = open_in_memory().unwrap();
        let id = insert_item(&conn, &new_item("Rent", BudgetType::Expense, Some(date(1)))).unwrap();
        let none = insert_item(&conn, &new_item("Gifts", BudgetType::Income, None)).unwrap();

        assert_eq!(get_item(&conn, id).unwrap().unwrap().due_date, Some(date(1)));
        assert_eq!(get_item(&conn, none).unwrap().unwrap().due_date, None);
    }

    #[test]
    fn test_summary_and_dti() {
        let conn = open_in_memory().unwrap();
        let salary = insert_item(&conn, &new_item("Salary", BudgetType::Income, None)).unwrap();
        let rent = insert_item(&conn, &new_item("Rent", BudgetType::Expense, Some(date(1)))).unwrap();
        let car = insert_item(&conn, &new_item("Car loan", BudgetType::Expense, Some(date(15)))).unwrap();

        insert_value(&conn, salary, 4_000.0, at(1)).unwrap();
        insert_value(&conn, salary, 5_000.0, at(2)).unwrap();
        insert_value(&conn, rent, 1_500.0, at(1)).unwrap();
        insert_value(&conn, car, 500.0, at(1)).unwrap();

        let summary = budget_summary(&conn).unwrap();
        assert_eq!(summary.income, 5_000.0);
        assert_eq!(summary.expense, 2_000.0);
        assert_eq!(summary.net, 3_000.0);
        assert_eq!(summary.dti, 40.0);
    }

    #[test]
    fn test_dti_without_income_is_zero() {
        let conn = open_in_memory().unwrap();
        let rent = insert_item(&conn, &new_item("Rent", BudgetType::Expense, None)).unwrap();
        insert_value(&conn, rent, 900.0, at(1)).unwrap();

        let summary = budget_summary(&conn).unwrap();
        assert_eq!(summary.income, 0.0);
        assert_eq!(summary.dti, 0.0);
        assert_eq!(summary.net, -900.0);
    }

    #[test]
    fn test_upcoming_due_orders_and_limits() {
        let conn = open_in_memory().unwrap();
        insert_item(&conn, &new_item("Past", BudgetType::Expense, Some(date(2)))).unwrap();
        insert_item(&conn, &new_item("Later", BudgetType::Expense, Some(date(20)))).unwrap();
        insert_item(&conn, &new_item("Soon", BudgetType::Expense, Some(date(10)))).unwrap();
        insert_item(&conn, &new_item("Undated", BudgetType::Expense, None)).unwrap();

        let upcoming = upcoming_due(&conn, date(5), 10).unwrap();
        let names: Vec<&str> = upcoming.iter().map(|i| i.item.name.as_str()).collect();
        assert_eq!(names, vec!["Soon", "Later"]);

        assert_eq!(upcoming_due(&conn, date(5), 1).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_cascades() {
        let conn = open_in_memory().unwrap();
        let id = insert_item(&conn, &new_item("Salary", BudgetType::Income, None)).unwrap();
        insert_value(&conn, id, 1.0, at(1)).unwrap();

        delete_item(&conn, id).unwrap();

        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM budget_values", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
        assert_eq!(total_by_type(&conn, BudgetType::Income).unwrap(), 0.0);
    }

    #[test]
    fn test_update_item_changes_type() {
        let conn = open_in_memory().unwrap();
        let id = insert_item(&conn, &new_item("Side job", BudgetType::Expense, None)).unwrap();
        insert_value(&conn, id, 300.0, at(3)).unwrap();

        let mut item = get_item(&conn, id).unwrap().unwrap();
        item.item_type = BudgetType::Income;
        item.due_date = Some(date(28));
        update_item(&conn, &item).unwrap();

        assert_eq!(total_by_type(&conn, BudgetType::Income).unwrap(), 300.0);
        assert_eq!(total_by_type(&conn, BudgetType::Expense).unwrap(), 0.0);
        let incomes = get_items_with_latest_value(&conn, Some(BudgetType::Income)).unwrap();
        assert_eq!(incomes[0].item.due_date, Some(date(28)));
    }
}
