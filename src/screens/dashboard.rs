use super::drain;
use crate::entities::{BalanceSheetType, BudgetItemWithValue, BudgetSummary};
use crate::history::{net_worth_series, proportions, Granularity, SeriesPoint, Slice};
use crate::store::{Change, Store};
use anyhow::Result;
use chrono::{NaiveDate, Utc};
use std::sync::mpsc::Receiver;

/// Bills listed under "coming up"
const UPCOMING_LIMIT: usize = 5;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardState {
    pub assets_total: f64,
    pub liabilities_total: f64,
    pub net_worth: f64,
    pub budget: BudgetSummary,
    pub asset_slices: Vec<Slice>,
    pub liability_slices: Vec<Slice>,
    pub net_worth_history: Vec<SeriesPoint>,
    pub upcoming: Vec<BudgetItemWithValue>,
}

pub struct DashboardViewModel {
    pub state: DashboardState,
    pub granularity: Granularity,
    changes: Receiver<Change>,
}

impl DashboardViewModel {
    pub fn new(store: &Store) -> Result<Self> {
        let mut vm = DashboardViewModel {
            state: DashboardState::default(),
            granularity: Granularity::default(),
            changes: store.subscribe(),
        };
        vm.refresh(store)?;
        Ok(vm)
    }

    pub fn refresh(&mut self, store: &Store) -> Result<()> {
        self.refresh_at(store, Utc::now().date_naive())
    }

    /// Re-query everything; bills due on or after `today` count as upcoming
    pub fn refresh_at(&mut self, store: &Store, today: NaiveDate) -> Result<()> {
        let assets_total = store.balance_sheet_total(BalanceSheetType::Asset)?;
        let liabilities_total = store.balance_sheet_total(BalanceSheetType::Liability)?;

        let asset_values = store.balance_sheet_values_by_type(BalanceSheetType::Asset)?;
        let liability_values = store.balance_sheet_values_by_type(BalanceSheetType::Liability)?;

        self.state = DashboardState {
            assets_total,
            liabilities_total,
            net_worth: assets_total - liabilities_total,
            budget: store.budget_summary()?,
            asset_slices: proportions(
                &store.balance_sheet_totals_by_category(BalanceSheetType::Asset)?,
            ),
            liability_slices: proportions(
                &store.balance_sheet_totals_by_category(BalanceSheetType::Liability)?,
            ),
            net_worth_history: net_worth_series(&asset_values, &liability_values, self.granularity),
            upcoming: store.upcoming_due(today, UPCOMING_LIMIT)?,
        };
        Ok(())
    }

    pub fn poll(&mut self, store: &Store) -> Result<bool> {
        if drain(&self.changes, &[Change::BalanceSheet, Change::Budget]) {
            self.refresh(store)?;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn toggle_granularity(&mut self, store: &Store) -> Result<()> {
        self.granularity = self.granularity.toggle();
        self.refresh(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{BudgetType, NewBalanceSheetItem, NewBudgetItem};
    use chrono::{TimeZone, Utc};

    fn asset(name: &str, category: &str) -> NewBalanceSheetItem {
        NewBalanceSheetItem {
            name: name.to_string(),
            category: category.to_string(),
            item_type: BalanceSheetType::Asset,
        }
    }

    #[test]
    fn test_empty_dashboard() {
        let store = Store::in_memory().unwrap();
        let vm = DashboardViewModel::new(&store).unwrap();
        assert_eq!(vm.state.net_worth, 0.0);
        assert!(vm.state.asset_slices.is_empty());
        assert!(vm.state.net_worth_history.is_empty());
        assert_eq!(vm.state.budget.dti, 0.0);
    }

    #[test]
    fn test_net_worth_and_slices() {
        let store = Store::in_memory().unwrap();
        let mut vm = DashboardViewModel::new(&store).unwrap();
        let now = Utc::now();

        store.add_balance_sheet_item(&asset("Checking", "Bank"), Some((300.0, now))).unwrap();
        store.add_balance_sheet_item(&asset("Index fund", "Investments"), Some((900.0, now))).unwrap();
        store
            .add_balance_sheet_item(
                &NewBalanceSheetItem {
                    name: "Card".to_string(),
                    category: "Credit".to_string(),
                    item_type: BalanceSheetType::Liability,
                },
                Some((200.0, now)),
            )
            .unwrap();

        assert!(vm.poll(&store).unwrap());
        assert_eq!(vm.state.assets_total, 1_200.0);
        assert_eq!(vm.state.liabilities_total, 200.0);
        assert_eq!(vm.state.net_worth, 1_000.0);

        assert_eq!(vm.state.asset_slices.len(), 2);
        assert_eq!(vm.state.asset_slices[0].label, "Investments");
        assert_eq!(vm.state.asset_slices[0].fraction, 0.75);
        assert_eq!(vm.state.liability_slices[0].fraction, 1.0);

        let last = vm.state.net_worth_history.last().unwrap();
        assert_eq!(last.value, 1_000.0);
    }

    #[test]
    fn test_history_respects_granularity() {
        let store = Store::in_memory().unwrap();
        let mut vm = DashboardViewModel::new(&store).unwrap();
        let jan = Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap();
        let jan_late = Utc.with_ymd_and_hms(2024, 1, 25, 12, 0, 0).unwrap();

        let id = store.add_balance_sheet_item(&asset("Cash", "Bank"), Some((10.0, jan))).unwrap();
        store.record_balance_sheet_value(id, 40.0, jan_late).unwrap();
        vm.poll(&store).unwrap();

        assert_eq!(vm.granularity, Granularity::Month);
        assert_eq!(vm.state.net_worth_history.len(), 1);
        assert_eq!(vm.state.net_worth_history[0].value, 40.0);

        vm.toggle_granularity(&store).unwrap();
        assert_eq!(vm.granularity, Granularity::Day);
        let values: Vec<f64> = vm.state.net_worth_history.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![10.0, 40.0]);
    }

    #[test]
    fn test_budget_and_upcoming() {
        let store = Store::in_memory().unwrap();
        let mut vm = DashboardViewModel::new(&store).unwrap();
        let now = Utc::now();
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();

        store
            .add_budget_item(
                &NewBudgetItem {
                    name: "Salary".to_string(),
                    category: "Work".to_string(),
                    item_type: BudgetType::Income,
                    due_date: None,
                },
                Some((2_000.0, now)),
            )
            .unwrap();
        for (name, day) in [("Rent", 20), ("Old bill", 1)] {
            store
                .add_budget_item(
                    &NewBudgetItem {
                        name: name.to_string(),
                        category: "Bills".to_string(),
                        item_type: BudgetType::Expense,
                        due_date: NaiveDate::from_ymd_opt(2024, 6, day),
                    },
                    Some((500.0, now)),
                )
                .unwrap();
        }

        vm.refresh_at(&store, today).unwrap();
        assert_eq!(vm.state.budget.income, 2_000.0);
        assert_eq!(vm.state.budget.expense, 1_000.0);
        assert_eq!(vm.state.budget.dti, 50.0);
        assert_eq!(vm.state.upcoming.len(), 1);
        assert_eq!(vm.state.upcoming[0].item.name, "Rent");
    }

    #[test]
    fn test_ignores_preference_changes() {
        let store = Store::in_memory().unwrap();
        let mut vm = DashboardViewModel::new(&store).unwrap();
        store.set_dynamic_color(false).unwrap();
        assert!(!vm.poll(&store).unwrap());
    }
}
