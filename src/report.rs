// Non-interactive reporting: the `summary` printout and the CSV export.

use crate::entities::{BalanceSheetType, BudgetSummary, BudgetType, ValueSnapshot};
use crate::store::Store;
use anyhow::{Context, Result};
use chrono::SecondsFormat;
use csv::WriterBuilder;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub assets: f64,
    pub liabilities: f64,
    pub net_worth: f64,
    pub budget: BudgetSummary,
}

impl Summary {
    pub fn collect(store: &Store) -> Result<Self> {
        let assets = store.balance_sheet_total(BalanceSheetType::Asset)?;
        let liabilities = store.balance_sheet_total(BalanceSheetType::Liability)?;
        Ok(Summary {
            assets,
            liabilities,
            net_worth: assets - liabilities,
            budget: store.budget_summary()?,
        })
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Assets       {:>14.2}", self.assets)?;
        writeln!(f, "Liabilities  {:>14.2}", self.liabilities)?;
        writeln!(f, "Net worth    {:>14.2}", self.net_worth)?;
        writeln!(f)?;
        writeln!(f, "Income       {:>14.2}", self.budget.income)?;
        writeln!(f, "Expense      {:>14.2}", self.budget.expense)?;
        writeln!(f, "Net          {:>14.2}", self.budget.net)?;
        write!(f, "DTI          {:>13.1}%", self.budget.dti)
    }
}

#[derive(Serialize)]
struct ItemRow<'a> {
    id: i64,
    name: &'a str,
    category: &'a str,
    item_type: &'a str,
    due_date: Option<String>,
    latest_value: Option<f64>,
    latest_timestamp: Option<String>,
}

#[derive(Serialize)]
struct HistoryRow<'a> {
    table: &'static str,
    item_id: i64,
    item_name: &'a str,
    value_id: i64,
    value: f64,
    timestamp: String,
}

fn timestamp(v: &ValueSnapshot) -> String {
    v.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Write `balance_sheet.csv`, `budget.csv` and `history.csv` into `dir`
/// (created if needed). Returns the written paths.
pub fn export_csv(store: &Store, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory {}", dir.display()))?;

    let balance_items = store.balance_sheet_items(None)?;
    let budget_items = store.budget_items(None)?;

    let balance_path = dir.join("balance_sheet.csv");
    let mut wrt = WriterBuilder::new()
        .from_path(&balance_path)
        .with_context(|| format!("Failed to create {}", balance_path.display()))?;
    for row in &balance_items {
        wrt.serialize(ItemRow {
            id: row.item.id,
            name: &row.item.name,
            category: &row.item.category,
            item_type: row.item.item_type.as_str(),
            due_date: None,
            latest_value: row.latest_value.as_ref().map(|v| v.value),
            latest_timestamp: row.latest_value.as_ref().map(timestamp),
        })?;
    }
    wrt.flush()?;

    let budget_path = dir.join("budget.csv");
    let mut wrt = WriterBuilder::new()
        .from_path(&budget_path)
        .with_context(|| format!("Failed to create {}", budget_path.display()))?;
    for row in &budget_items {
        wrt.serialize(ItemRow {
            id: row.item.id,
            name: &row.item.name,
            category: &row.item.category,
            item_type: row.item.item_type.as_str(),
            due_date: row.item.due_date.map(|d| d.format("%Y-%m-%d").to_string()),
            latest_value: row.latest_value.as_ref().map(|v| v.value),
            latest_timestamp: row.latest_value.as_ref().map(timestamp),
        })?;
    }
    wrt.flush()?;

    let balance_names: HashMap<i64, &str> = balance_items
        .iter()
        .map(|r| (r.item.id, r.item.name.as_str()))
        .collect();
    let budget_names: HashMap<i64, &str> = budget_items
        .iter()
        .map(|r| (r.item.id, r.item.name.as_str()))
        .collect();

    let history_path = dir.join("history.csv");
    let mut wrt = WriterBuilder::new()
        .from_path(&history_path)
        .with_context(|| format!("Failed to create {}", history_path.display()))?;
    let mut history_rows = 0usize;

    for item_type in [BalanceSheetType::Asset, BalanceSheetType::Liability] {
        for v in store.balance_sheet_values_by_type(item_type)? {
            wrt.serialize(HistoryRow {
                table: "balance_sheet",
                item_id: v.item_id,
                item_name: balance_names.get(&v.item_id).copied().unwrap_or_default(),
                value_id: v.id,
                value: v.value,
                timestamp: timestamp(&v),
            })?;
            history_rows += 1;
        }
    }
    for item_type in [BudgetType::Income, BudgetType::Expense] {
        for v in store.budget_values_by_type(item_type)? {
            wrt.serialize(HistoryRow {
                table: "budget",
                item_id: v.item_id,
                item_name: budget_names.get(&v.item_id).copied().unwrap_or_default(),
                value_id: v.id,
                value: v.value,
                timestamp: timestamp(&v),
            })?;
            history_rows += 1;
        }
    }
    wrt.flush()?;

    info!(
        dir = %dir.display(),
        balance_sheet = balance_items.len(),
        budget = budget_items.len(),
        history = history_rows,
        "export written"
    );

    Ok(vec![balance_path, budget_path, history_path])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{NewBalanceSheetItem, NewBudgetItem};
    use chrono::{NaiveDate, TimeZone, Utc};
    use tempfile::TempDir;

    fn seeded() -> Store {
        let store = Store::in_memory().unwrap();
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let house = store
            .add_balance_sheet_item(
                &NewBalanceSheetItem {
                    name: "House".to_string(),
                    category: "Property".to_string(),
                    item_type: BalanceSheetType::Asset,
                },
                Some((300_000.0, t)),
            )
            .unwrap();
        store.record_balance_sheet_value(house, 310_000.0, t + chrono::Duration::days(31)).unwrap();
        store
            .add_balance_sheet_item(
                &NewBalanceSheetItem {
                    name: "Mortgage".to_string(),
                    category: "Loans".to_string(),
                    item_type: BalanceSheetType::Liability,
                },
                Some((200_000.0, t)),
            )
            .unwrap();
        store
            .add_budget_item(
                &NewBudgetItem {
                    name: "Salary".to_string(),
                    category: "Work".to_string(),
                    item_type: BudgetType::Income,
                    due_date: None,
                },
                Some((5_000.0, t)),
            )
            .unwrap();
        store
            .add_budget_item(
                &NewBudgetItem {
                    name: "Mortgage payment".to_string(),
                    category: "Housing".to_string(),
                    item_type: BudgetType::Expense,
                    due_date: NaiveDate::from_ymd_opt(2024, 4, 1),
                },
                Some((1_500.0, t)),
            )
            .unwrap();
        store
    }

    #[test]
    fn test_summary_totals() {
        let summary = Summary::collect(&seeded()).unwrap();
        assert_eq!(summary.assets, 310_000.0);
        assert_eq!(summary.liabilities, 200_000.0);
        assert_eq!(summary.net_worth, 110_000.0);
        assert_eq!(summary.budget.dti, 30.0);

        let text = summary.to_string();
        assert!(text.contains("Net worth"));
        assert!(text.contains("110000.00"));
        assert!(text.contains("30.0%"));
    }

    #[test]
    fn test_export_writes_three_files() {
        let store = seeded();
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("export");

        let paths = export_csv(&store, &out).unwrap();
        assert_eq!(paths.len(), 3);

        let balance = fs::read_to_string(out.join("balance_sheet.csv")).unwrap();
        let mut lines = balance.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,name,category,item_type,due_date,latest_value,latest_timestamp"
        );
        assert_eq!(balance.lines().count(), 3);
        assert!(balance.contains("House,Property,asset,,310000.0,2024-04-01T08:00:00.000Z"));

        let budget = fs::read_to_string(out.join("budget.csv")).unwrap();
        assert!(budget.contains("Mortgage payment,Housing,expense,2024-04-01,1500.0"));

        let history = fs::read_to_string(out.join("history.csv")).unwrap();
        // header + 3 balance-sheet snapshots + 2 budget snapshots
        assert_eq!(history.lines().count(), 6);
        assert!(history.contains("balance_sheet,1,House,"));
    }

    #[test]
    fn test_export_empty_store() {
        let store = Store::in_memory().unwrap();
        let dir = TempDir::new().unwrap();
        export_csv(&store, dir.path()).unwrap();

        // Headers are only written with the first record
        let history = fs::read_to_string(dir.path().join("history.csv")).unwrap();
        assert!(history.is_empty());
    }
}
