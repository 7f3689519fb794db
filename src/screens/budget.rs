use super::{drain, Dialog, ItemForm, ItemInput, Selection, Submission, ValueForm};
use crate::entities::{BudgetItem, BudgetItemWithValue, BudgetSummary, BudgetType, NewBudgetItem};
use crate::store::{Change, Store};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::mpsc::Receiver;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BudgetState {
    pub items: Vec<BudgetItemWithValue>,
    pub total: f64,
    /// Income vs. expense across both budget screens
    pub summary: BudgetSummary,
}

/// Income screen or expense screen
pub struct BudgetViewModel {
    pub item_type: BudgetType,
    pub state: BudgetState,
    pub selection: Selection,
    pub dialog: Dialog,
    pub form_error: Option<String>,
    changes: Receiver<Change>,
}

impl BudgetViewModel {
    pub fn new(store: &Store, item_type: BudgetType) -> Result<Self> {
        let mut vm = BudgetViewModel {
            item_type,
            state: BudgetState::default(),
            selection: Selection::default(),
            dialog: Dialog::None,
            form_error: None,
            changes: store.subscribe(),
        };
        vm.refresh(store)?;
        Ok(vm)
    }

    pub fn refresh(&mut self, store: &Store) -> Result<()> {
        self.state = BudgetState {
            items: store.budget_items(Some(self.item_type))?,
            total: store.budget_total(self.item_type)?,
            summary: store.budget_summary()?,
        };
        self.selection.clamp(self.state.items.len());
        Ok(())
    }

    pub fn poll(&mut self, store: &Store) -> Result<bool> {
        if drain(&self.changes, &[Change::Budget]) {
            self.refresh(store)?;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn selected(&self) -> Option<&BudgetItemWithValue> {
        self.selection.index.and_then(|i| self.state.items.get(i))
    }

    pub fn select_next(&mut self) {
        self.selection.next(self.state.items.len());
    }

    pub fn select_previous(&mut self) {
        self.selection.previous(self.state.items.len());
    }

    pub fn open_add(&mut self) {
        self.form_error = None;
        self.dialog = Dialog::AddItem(ItemForm::new(true));
    }

    pub fn open_edit(&mut self) {
        if let Some(selected) = self.selected() {
            let mut form = ItemForm::new(true);
            form.name = selected.item.name.clone();
            form.category = selected.item.category.clone();
            form.due_date = selected
                .item
                .due_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
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

    pub fn add_item(&self, store: &Store, input: &ItemInput, now: DateTime<Utc>) -> Result<i64> {
        let item = NewBudgetItem {
            name: input.name.clone(),
            category: input.category.clone(),
            item_type: self.item_type,
            due_date: input.due_date,
        };
        store.add_budget_item(&item, input.amount.map(|v| (v, now)))
    }

    pub fn update_item(
        &self,
        store: &Store,
        id: i64,
        input: &ItemInput,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let item = BudgetItem {
            id,
            name: input.name.clone(),
            category: input.category.clone(),
            item_type: self.item_type,
            due_date: input.due_date,
        };
        store.edit_budget_item(&item, input.amount.map(|v| (v, now)))
    }

    pub fn record_value(
        &self,
        store: &Store,
        item_id: i64,
        value: f64,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        store.record_budget_value(item_id, value, now)
    }

    pub fn delete_item(&self, store: &Store, id: i64) -> Result<()> {
        store.delete_budget_item(id)
    }
}
