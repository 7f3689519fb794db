use super::{drain, Dialog, ItemForm, ItemInput, Selection, Submission, ValueForm};
use crate::entities::{BalanceSheetItem, BalanceSheetItemWithValue, BalanceSheetType, NewBalanceSheetItem};
use crate::store::{Change, Store};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::mpsc::Receiver;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BalanceSheetState {
    pub items: Vec<BalanceSheetItemWithValue>,
    pub total: f64,
}

/// Assets screen or liabilities screen
pub struct BalanceSheetViewModel {
    pub item_type: BalanceSheetType,
    pub state: BalanceSheetState,
    pub selection: Selection,
    pub dialog: Dialog,
    /// Last validation message shown inside the dialog
    pub form_error: Option<String>,
    changes: Receiver<Change>,
}

impl BalanceSheetViewModel {
    pub fn new(store: &Store, item_type: BalanceSheetType) -> Result<Self> {
        let mut vm = BalanceSheetViewModel {
            item_type,
            state: BalanceSheetState::default(),
            selection: Selection::default(),
            dialog: Dialog::None,
            form_error: None,
            changes: store.subscribe(),
        };
        vm.refresh(store)?;
        Ok(vm)
    }

    pub fn refresh(&mut self, store: &Store) -> Result<()> {
        let items = store.balance_sheet_items(Some(self.item_type))?;
        let total = store.balance_sheet_total(self.item_type)?;
        self.state = BalanceSheetState { items, total };
        self.selection.clamp(self.state.items.len());
        Ok(())
    }

    /// Re-query if a balance-sheet write happened since the last poll
    pub fn poll(&mut self, store: &Store) -> Result<bool> {
        if drain(&self.changes, &[Change::BalanceSheet]) {
            self.refresh(store)?;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn selected(&self) -> Option<&BalanceSheetItemWithValue> {
        self.selection.index.and_then(|i| self.state.items.get(i))
    }

    pub fn select_next(&mut self) {
        self.selection.next(self.state.items.len());
    }

    pub fn select_previous(&mut self) {
        self.selection.previous(self.state.items.len());
    }

    // ========================================================================
    // DIALOGS
    // ========================================================================

    pub fn open_add(&mut self) {
        self.form_error = None;
        self.dialog = Dialog::AddItem(ItemForm::new(false));
    }

    /// Edit dialog prefilled from the selected row
    pub fn open_edit(&mut self) {
        if let Some(selected) = self.selected() {
            let mut form = ItemForm::new(false);
            form.name = selected.item.name.clone();
            form.category = selected.item.category.clone();
            let id = selected.item.id;
            self.form_error = None;
            self.dialog = Dialog::EditItem { id, form };
        }
    }

    pub fn open_add_value(&mut self) {
        if let Some(selected) = self.selected() {
            let item_id = selected.item.id;
            self.form_error = None;
            self.dialog = Dialog::AddValue { item_id, form: ValueForm::default() };
        }
    }

    pub fn open_delete(&mut self) {
        if let Some(selected) = self.selected() {
            let (id, name) = (selected.item.id, selected.item.name.clone());
            self.dialog = Dialog::ConfirmDelete { id, name };
        }
    }

    pub fn close_dialog(&mut self) {
        self.dialog = Dialog::None;
        self.form_error = None;
    }

    /// Validate and apply the open dialog. Validation failures keep the
    /// dialog open with `form_error` set; storage errors propagate.
    pub fn submit_dialog(&mut self, store: &Store, now: DateTime<Utc>) -> Result<()> {
        let submission = match self.dialog.submission() {
            None => return Ok(()),
            Some(Ok(submission)) => submission,
            Some(Err(e)) => {
                self.form_error = Some(e.to_string());
                return Ok(());
            }
        };

        match submission {
            Submission::Add(input) => {
                self.add_item(store, &input, now)?;
            }
            Submission::Edit(id, input) => self.update_item(store, id, &input, now)?,
            Submission::Value(item_id, value) => {
                self.record_value(store, item_id, value, now)?;
            }
            Submission::Delete(id) => self.delete_item(store, id)?,
        }

        self.close_dialog();
        Ok(())
    }

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    pub fn add_item(&self, store: &Store, input: &ItemInput, now: DateTime<Utc>) -> Result<i64> {
        let item = NewBalanceSheetItem {
            name: input.name.clone(),
            category: input.category.clone(),
            item_type: self.item_type,
        };
        store.add_balance_sheet_item(&item, input.amount.map(|v| (v, now)))
    }

    /// Rename/recategorize; a filled amount also records a new snapshot
    pub fn update_item(
        &self,
        store: &Store,
        id: i64,
        input: &ItemInput,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let item = BalanceSheetItem {
            id,
            name: input.name.clone(),
            category: input.category.clone(),
            item_type: self.item_type,
        };
        store.edit_balance_sheet_item(&item, input.amount.map(|v| (v, now)))
    }

    pub fn record_value(
        &self,
        store: &Store,
        item_id: i64,
        value: f64,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        store.record_balance_sheet_value(item_id, value, now)
    }

    pub fn delete_item(&self, store: &Store, id: i64) -> Result<()> {
        store.delete_balance_sheet_item(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn input(name: &str, amount: Option<f64>) -> ItemInput {
        ItemInput {
            name: name.to_string(),
            category: "Bank".to_string(),
            amount,
            due_date: None,
        }
    }

    #[test]
    fn test_adding_item_updates_list_and_total_after_poll() {
        let store = Store::in_memory().unwrap();
        let mut vm = BalanceSheetViewModel::new(&store, BalanceSheetType::Asset).unwrap();
        assert!(vm.state.items.is_empty());
        assert_eq!(vm.state.total, 0.0);

        vm.add_item(&store, &input("Cash", Some(120.0)), Utc::now()).unwrap();
        // State only moves once the change notification is consumed
        assert!(vm.state.items.is_empty());

        assert!(vm.poll(&store).unwrap());
        assert_eq!(vm.state.items.len(), 1);
        assert_eq!(vm.state.total, 120.0);
        assert_eq!(vm.selection.index, Some(0));

        assert!(!vm.poll(&store).unwrap());
    }

    #[test]
    fn test_screen_ignores_other_type_in_list_but_not_in_poll() {
        let store = Store::in_memory().unwrap();
        let mut assets = BalanceSheetViewModel::new(&store, BalanceSheetType::Asset).unwrap();
        let liabilities = BalanceSheetViewModel::new(&store, BalanceSheetType::Liability).unwrap();

        liabilities.add_item(&store, &input("Card", Some(50.0)), Utc::now()).unwrap();

        assert!(assets.poll(&store).unwrap());
        assert!(assets.state.items.is_empty());
        assert_eq!(assets.state.total, 0.0);
    }

    #[test]
    fn test_total_matches_sum_of_rows() {
        let store = Store::in_memory().unwrap();
        let mut vm = BalanceSheetViewModel::new(&store, BalanceSheetType::Asset).unwrap();
        let now = Utc::now();

        let a = vm.add_item(&store, &input("A", Some(10.0)), now).unwrap();
        vm.add_item(&store, &input("B", Some(32.5)), now).unwrap();
        vm.add_item(&store, &input("C", None), now).unwrap();
        vm.record_value(&store, a, 15.0, now + Duration::seconds(1)).unwrap();
        vm.poll(&store).unwrap();

        let sum: f64 = vm.state.items.iter().map(|i| i.current_value()).sum();
        assert_eq!(vm.state.items.len(), 3);
        assert_eq!(sum, 47.5);
        assert_eq!(vm.state.total, sum);
    }

    #[test]
    fn test_add_dialog_flow() {
        let store = Store::in_memory().unwrap();
        let mut vm = BalanceSheetViewModel::new(&store, BalanceSheetType::Liability).unwrap();

        vm.open_add();
        assert!(vm.dialog.is_open());

        // Submitting an empty form keeps the dialog open
        vm.submit_dialog(&store, Utc::now()).unwrap();
        assert!(vm.dialog.is_open());
        assert_eq!(vm.form_error.as_deref(), Some("name is required"));

        for c in "Mortgage".chars() {
            vm.dialog.push_char(c);
        }
        vm.dialog.next_field();
        vm.dialog.next_field();
        for c in "200000".chars() {
            vm.dialog.push_char(c);
        }
        vm.submit_dialog(&store, Utc::now()).unwrap();

        assert!(!vm.dialog.is_open());
        assert!(vm.form_error.is_none());
        vm.poll(&store).unwrap();
        assert_eq!(vm.state.total, 200_000.0);
        assert_eq!(vm.state.items[0].item.name, "Mortgage");
    }

    #[test]
    fn test_edit_dialog_prefills_and_records_value() {
        let store = Store::in_memory().unwrap();
        let mut vm = BalanceSheetViewModel::new(&store, BalanceSheetType::Asset).unwrap();
        let now = Utc::now();
        vm.add_item(&store, &input("Car", Some(9_000.0)), now).unwrap();
        vm.poll(&store).unwrap();

        vm.open_edit();
        match &vm.dialog {
            Dialog::EditItem { form, .. } => assert_eq!(form.name, "Car"),
            other => panic!("unexpected dialog {:?}", other),
        }

        vm.dialog.next_field();
        vm.dialog.next_field();
        for c in "8500".chars() {
            vm.dialog.push_char(c);
        }
        vm.submit_dialog(&store, now + Duration::days(30)).unwrap();
        vm.poll(&store).unwrap();

        assert_eq!(vm.state.total, 8_500.0);
        let item_id = vm.state.items[0].item.id;
        assert_eq!(store.balance_sheet_values(item_id).unwrap().len(), 2);
    }

    #[test]
    fn test_delete_dialog_removes_item_and_snapshots() {
        let store = Store::in_memory().unwrap();
        let mut vm = BalanceSheetViewModel::new(&store, BalanceSheetType::Asset).unwrap();
        let id = vm.add_item(&store, &input("Gold", Some(1_000.0)), Utc::now()).unwrap();
        vm.poll(&store).unwrap();

        vm.open_delete();
        assert_eq!(
            vm.dialog,
            Dialog::ConfirmDelete { id, name: "Gold".to_string() }
        );
        vm.submit_dialog(&store, Utc::now()).unwrap();
        vm.poll(&store).unwrap();

        assert!(vm.state.items.is_empty());
        assert_eq!(vm.selection.index, None);
        assert!(store.balance_sheet_values(id).unwrap().is_empty());
    }

    #[test]
    fn test_dialogs_need_a_selection() {
        let store = Store::in_memory().unwrap();
        let mut vm = BalanceSheetViewModel::new(&store, BalanceSheetType::Asset).unwrap();
        vm.open_edit();
        vm.open_add_value();
        vm.open_delete();
        assert!(!vm.dialog.is_open());
    }
}
