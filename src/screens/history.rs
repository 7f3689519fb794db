use super::{drain, Selection};
use crate::entities::ValueSnapshot;
use crate::history::{group_latest, group_sum, Granularity, SeriesPoint};
use crate::screens::forms::ValueForm;
use crate::store::{Change, Store};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::mpsc::Receiver;

/// Which item the history screen is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistorySubject {
    BalanceSheet(i64),
    Budget(i64),
}

impl HistorySubject {
    fn change(&self) -> Change {
        match self {
            HistorySubject::BalanceSheet(_) => Change::BalanceSheet,
            HistorySubject::Budget(_) => Change::Budget,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryState {
    pub name: String,
    /// Newest first, the way the list renders them
    pub values: Vec<ValueSnapshot>,
    pub series: Vec<SeriesPoint>,
    /// The item was deleted while the screen was open
    pub missing: bool,
}

/// Snapshot list and chart for a single item
pub struct ItemHistoryViewModel {
    pub subject: HistorySubject,
    pub granularity: Granularity,
    pub state: HistoryState,
    pub selection: Selection,
    /// Open "record value" dialog
    pub value_form: Option<ValueForm>,
    pub form_error: Option<String>,
    changes: Receiver<Change>,
}

impl ItemHistoryViewModel {
    pub fn new(store: &Store, subject: HistorySubject) -> Result<Self> {
        let mut vm = ItemHistoryViewModel {
            subject,
            granularity: Granularity::default(),
            state: HistoryState::default(),
            selection: Selection::default(),
            value_form: None,
            form_error: None,
            changes: store.subscribe(),
        };
        vm.refresh(store)?;
        Ok(vm)
    }

    pub fn refresh(&mut self, store: &Store) -> Result<()> {
        let (name, mut values, series) = match self.subject {
            HistorySubject::BalanceSheet(id) => {
                let name = store.balance_sheet_item(id)?.map(|i| i.name);
                let values = store.balance_sheet_values(id)?;
                let series = group_latest(&values, self.granularity);
                (name, values, series)
            }
            HistorySubject::Budget(id) => {
                let name = store.budget_item(id)?.map(|i| i.name);
                let values = store.budget_values(id)?;
                let series = group_sum(&values, self.granularity);
                (name, values, series)
            }
        };
        values.reverse();

        self.state = HistoryState {
            missing: name.is_none(),
            name: name.unwrap_or_default(),
            values,
            series,
        };
        self.selection.clamp(self.state.values.len());
        Ok(())
    }

    pub fn poll(&mut self, store: &Store) -> Result<bool> {
        if drain(&self.changes, &[self.subject.change()]) {
            self.refresh(store)?;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn toggle_granularity(&mut self, store: &Store) -> Result<()> {
        self.granularity = self.granularity.toggle();
        self.refresh(store)
    }

    pub fn selected(&self) -> Option<&ValueSnapshot> {
        self.selection.index.and_then(|i| self.state.values.get(i))
    }

    pub fn select_next(&mut self) {
        self.selection.next(self.state.values.len());
    }

    pub fn select_previous(&mut self) {
        self.selection.previous(self.state.values.len());
    }

    pub fn open_value_form(&mut self) {
        if !self.state.missing {
            self.form_error = None;
            self.value_form = Some(ValueForm::default());
        }
    }

    pub fn close_value_form(&mut self) {
        self.value_form = None;
        self.form_error = None;
    }

    pub fn submit_value_form(&mut self, store: &Store, now: DateTime<Utc>) -> Result<()> {
        let value = match self.value_form.as_ref().map(ValueForm::validate) {
            None => return Ok(()),
            Some(Ok(value)) => value,
            Some(Err(e)) => {
                self.form_error = Some(e.to_string());
                return Ok(());
            }
        };
        self.record_value(store, value, now)?;
        self.close_value_form();
        Ok(())
    }

    pub fn record_value(&self, store: &Store, value: f64, now: DateTime<Utc>) -> Result<i64> {
        match self.subject {
            HistorySubject::BalanceSheet(id) => store.record_balance_sheet_value(id, value, now),
            HistorySubject::Budget(id) => store.record_budget_value(id, value, now),
        }
    }

    /// False when the snapshot is gone or belongs to another item
    pub fn delete_value(&self, store: &Store, value_id: i64) -> Result<bool> {
        let owned = |values: Vec<ValueSnapshot>| values.iter().any(|v| v.id == value_id);
        match self.subject {
            HistorySubject::BalanceSheet(id) => {
                if !owned(store.balance_sheet_values(id)?) {
                    return Ok(false);
                }
                store.delete_balance_sheet_value(value_id)
            }
            HistorySubject::Budget(id) => {
                if !owned(store.budget_values(id)?) {
                    return Ok(false);
                }
                store.delete_budget_value(value_id)
            }
        }
    }

    pub fn delete_selected_value(&self, store: &Store) -> Result<bool> {
        match self.selected() {
            Some(value) => self.delete_value(store, value.id),
            None => Ok(false),
        }
    }
}
