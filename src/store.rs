// Live-query store.
//
// The store owns the connection and the preferences. Every write goes
// through it and is followed by a `Change` broadcast, so subscribers
// (the screen view models) know which of their queries went stale.

use crate::config::Config;
use crate::db;
use crate::entities::{
    balance_sheet, budget, legacy, AssetEntity, BalanceSheetItem, BalanceSheetItemWithValue,
    BalanceSheetType, BalanceSheetValue, BudgetItem, BudgetItemWithValue, BudgetSummary,
    BudgetType, BudgetValue, LiabilityEntity, NewBalanceSheetItem, NewBudgetItem,
};
use crate::preferences::{PreferencesStore, Settings, ThemeMode};
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;
use tracing::{debug, info};

/// Which family of tables (or settings) a write touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Change {
    BalanceSheet,
    Budget,
    Legacy,
    Preferences,
}

pub struct Store {
    conn: Connection,
    preferences: PreferencesStore,
    subscribers: Mutex<Vec<Sender<Change>>>,
}

impl Store {
    pub fn new(conn: Connection, preferences: PreferencesStore) -> Self {
        Store {
            conn,
            preferences,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn open(config: &Config) -> Result<Self> {
        let conn = db::open_database(&config.storage.database)?;
        let preferences = PreferencesStore::load(&config.storage.preferences)?;
        Ok(Store::new(conn, preferences))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Store::new(db::open_in_memory()?, PreferencesStore::in_memory()))
    }

    // ========================================================================
    // SUBSCRIPTIONS
    // ========================================================================

    pub fn subscribe(&self) -> Receiver<Change> {
        let (tx, rx) = mpsc::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    fn notify(&self, change: Change) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        // Dropped receivers belong to screens that went away
        subscribers.retain(|tx| tx.send(change).is_ok());
        debug!(?change, subscribers = subscribers.len(), "change broadcast");
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    // ========================================================================
    // BALANCE SHEET
    // ========================================================================

    pub fn balance_sheet_items(
        &self,
        item_type: Option<BalanceSheetType>,
    ) -> Result<Vec<BalanceSheetItemWithValue>> {
        balance_sheet::get_items_with_latest_value(&self.conn, item_type)
    }

    pub fn balance_sheet_item(&self, id: i64) -> Result<Option<BalanceSheetItem>> {
        balance_sheet::get_item(&self.conn, id)
    }

    pub fn balance_sheet_values(&self, item_id: i64) -> Result<Vec<BalanceSheetValue>> {
        balance_sheet::get_values_for_item(&self.conn, item_id)
    }

    pub fn balance_sheet_values_by_type(
        &self,
        item_type: BalanceSheetType,
    ) -> Result<Vec<BalanceSheetValue>> {
        balance_sheet::get_values_by_type(&self.conn, item_type)
    }

    pub fn balance_sheet_total(&self, item_type: BalanceSheetType) -> Result<f64> {
        balance_sheet::total_by_type(&self.conn, item_type)
    }

    pub fn balance_sheet_totals_by_category(
        &self,
        item_type: BalanceSheetType,
    ) -> Result<Vec<(String, f64)>> {
        balance_sheet::totals_by_category(&self.conn, item_type)
    }

    pub fn net_worth(&self) -> Result<f64> {
        balance_sheet::net_worth(&self.conn)
    }

    /// Create an item, optionally with its first snapshot, in one transaction
    pub fn add_balance_sheet_item(
        &self,
        item: &NewBalanceSheetItem,
        initial_value: Option<(f64, DateTime<Utc>)>,
    ) -> Result<i64> {
        let tx = self.conn.unchecked_transaction()?;
        let id = balance_sheet::insert_item(&tx, item)?;
        if let Some((value, timestamp)) = initial_value {
            balance_sheet::insert_value(&tx, id, value, timestamp)?;
        }
        tx.commit()?;

        info!(id, name = %item.name, item_type = %item.item_type, "balance sheet item added");
        self.notify(Change::BalanceSheet);
        Ok(id)
    }

    /// Update an item and, when given, record a new snapshot in the same transaction
    pub fn edit_balance_sheet_item(
        &self,
        item: &BalanceSheetItem,
        new_value: Option<(f64, DateTime<Utc>)>,
    ) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        balance_sheet::update_item(&tx, item)?;
        if let Some((value, timestamp)) = new_value {
            balance_sheet::insert_value(&tx, item.id, value, timestamp)?;
        }
        tx.commit()?;

        info!(id = item.id, "balance sheet item updated");
        self.notify(Change::BalanceSheet);
        Ok(())
    }

    pub fn delete_balance_sheet_item(&self, id: i64) -> Result<()> {
        balance_sheet::delete_item(&self.conn, id)?;
        info!(id, "balance sheet item deleted");
        self.notify(Change::BalanceSheet);
        Ok(())
    }

    pub fn record_balance_sheet_value(
        &self,
        item_id: i64,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<i64> {
        let id = balance_sheet::insert_value(&self.conn, item_id, value, timestamp)?;
        debug!(item_id, value, "balance sheet value recorded");
        self.notify(Change::BalanceSheet);
        Ok(id)
    }

    pub fn update_balance_sheet_value(&self, value: &BalanceSheetValue) -> Result<()> {
        balance_sheet::update_value(&self.conn, value)?;
        self.notify(Change::BalanceSheet);
        Ok(())
    }

    pub fn delete_balance_sheet_value(&self, value_id: i64) -> Result<bool> {
        let deleted = balance_sheet::delete_value(&self.conn, value_id)?;
        if deleted {
            self.notify(Change::BalanceSheet);
        }
        Ok(deleted)
    }

    // ========================================================================
    // BUDGET
    // ========================================================================

    pub fn budget_items(&self, item_type: Option<BudgetType>) -> Result<Vec<BudgetItemWithValue>> {
        budget::get_items_with_latest_value(&self.conn, item_type)
    }

    pub fn budget_item(&self, id: i64) -> Result<Option<BudgetItem>> {
        budget::get_item(&self.conn, id)
    }

    pub fn budget_values(&self, item_id: i64) -> Result<Vec<BudgetValue>> {
        budget::get_values_for_item(&self.conn, item_id)
    }

    pub fn budget_values_by_type(&self, item_type: BudgetType) -> Result<Vec<BudgetValue>> {
        budget::get_values_by_type(&self.conn, item_type)
    }

    pub fn budget_total(&self, item_type: BudgetType) -> Result<f64> {
        budget::total_by_type(&self.conn, item_type)
    }

    pub fn budget_summary(&self) -> Result<BudgetSummary> {
        budget::budget_summary(&self.conn)
    }

    pub fn upcoming_due(&self, from: NaiveDate, limit: usize) -> Result<Vec<BudgetItemWithValue>> {
        budget::upcoming_due(&self.conn, from, limit)
    }

    pub fn add_budget_item(
        &self,
        item: &NewBudgetItem,
        initial_value: Option<(f64, DateTime<Utc>)>,
    ) -> Result<i64> {
        let tx = self.conn.unchecked_transaction()?;
        let id = budget::insert_item(&tx, item)?;
        if let Some((value, timestamp)) = initial_value {
            budget::insert_value(&tx, id, value, timestamp)?;
        }
        tx.commit()?;

        info!(id, name = %item.name, item_type = %item.item_type, "budget item added");
        self.notify(Change::Budget);
        Ok(id)
    }

    pub fn edit_budget_item(
        &self,
        item: &BudgetItem,
        new_value: Option<(f64, DateTime<Utc>)>,
    ) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        budget::update_item(&tx, item)?;
        if let Some((value, timestamp)) = new_value {
            budget::insert_value(&tx, item.id, value, timestamp)?;
        }
        tx.commit()?;

        info!(id = item.id, "budget item updated");
        self.notify(Change::Budget);
        Ok(())
    }

    pub fn delete_budget_item(&self, id: i64) -> Result<()> {
        budget::delete_item(&self.conn, id)?;
        info!(id, "budget item deleted");
        self.notify(Change::Budget);
        Ok(())
    }

    pub fn record_budget_value(
        &self,
        item_id: i64,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<i64> {
        let id = budget::insert_value(&self.conn, item_id, value, timestamp)?;
        debug!(item_id, value, "budget value recorded");
        self.notify(Change::Budget);
        Ok(id)
    }

    pub fn update_budget_value(&self, value: &BudgetValue) -> Result<()> {
        budget::update_value(&self.conn, value)?;
        self.notify(Change::Budget);
        Ok(())
    }

    pub fn delete_budget_value(&self, value_id: i64) -> Result<bool> {
        let deleted = budget::delete_value(&self.conn, value_id)?;
        if deleted {
            self.notify(Change::Budget);
        }
        Ok(deleted)
    }

    // ========================================================================
    // LEGACY FLAT TABLES
    // ========================================================================

    pub fn legacy_assets(&self) -> Result<Vec<AssetEntity>> {
        legacy::get_all_assets(&self.conn)
    }

    pub fn legacy_liabilities(&self) -> Result<Vec<LiabilityEntity>> {
        legacy::get_all_liabilities(&self.conn)
    }

    pub fn add_legacy_asset(&self, name: &str, amount: f64, category: &str) -> Result<i64> {
        let id = legacy::insert_asset(&self.conn, name, amount, category)?;
        self.notify(Change::Legacy);
        Ok(id)
    }

    pub fn add_legacy_liability(&self, name: &str, amount: f64, category: &str) -> Result<i64> {
        let id = legacy::insert_liability(&self.conn, name, amount, category)?;
        self.notify(Change::Legacy);
        Ok(id)
    }

    pub fn update_legacy_asset(&self, asset: &AssetEntity) -> Result<()> {
        legacy::update_asset(&self.conn, asset)?;
        self.notify(Change::Legacy);
        Ok(())
    }

    pub fn delete_legacy_asset(&self, id: i64) -> Result<()> {
        legacy::delete_asset(&self.conn, id)?;
        self.notify(Change::Legacy);
        Ok(())
    }

    pub fn update_legacy_liability(&self, liability: &LiabilityEntity) -> Result<()> {
        legacy::update_liability(&self.conn, liability)?;
        self.notify(Change::Legacy);
        Ok(())
    }

    pub fn delete_legacy_liability(&self, id: i64) -> Result<()> {
        legacy::delete_liability(&self.conn, id)?;
        self.notify(Change::Legacy);
        Ok(())
    }

    /// Fold flat rows into the balance sheet; notifies both families when rows moved
    pub fn migrate_legacy(&self) -> Result<usize> {
        let migrated = legacy::migrate_legacy_entities(&self.conn)?;
        if migrated > 0 {
            self.notify(Change::Legacy);
            self.notify(Change::BalanceSheet);
        }
        Ok(migrated)
    }

    // ========================================================================
    // PREFERENCES
    // ========================================================================

    pub fn settings(&self) -> Settings {
        self.preferences.settings()
    }

    pub fn set_dynamic_color(&self, enabled: bool) -> Result<Settings> {
        let settings = self.preferences.set_dynamic_color(enabled)?;
        self.notify(Change::Preferences);
        Ok(settings)
    }

    pub fn set_theme_mode(&self, mode: ThemeMode) -> Result<Settings> {
        let settings = self.preferences.set_theme_mode(mode)?;
        self.notify(Change::Preferences);
        Ok(settings)
    }
}
