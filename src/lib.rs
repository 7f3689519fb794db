// Finance Tracker - Core Library
// Storage, live-query store, view models and chart arithmetic; the binary adds the TUI

pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod history;
pub mod logging;
pub mod preferences;
pub mod report;
pub mod screens;
pub mod store;

// Re-export commonly used types
pub use config::{CliArgs, Command, Config};
pub use db::{open_database, open_in_memory, setup_database, SCHEMA_VERSION};
pub use entities::{
    AssetEntity, BalanceSheetItem, BalanceSheetItemWithValue, BalanceSheetType,
    BalanceSheetValue, BudgetItem, BudgetItemWithValue, BudgetSummary, BudgetType, BudgetValue,
    LiabilityEntity, NewBalanceSheetItem, NewBudgetItem, ValueSnapshot,
};
pub use error::FinanceError;
pub use history::{Granularity, SeriesPoint, Slice};
pub use preferences::{PreferencesStore, Settings, ThemeMode};
pub use report::{export_csv, Summary};
pub use store::{Change, Store};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
