// Presentation state holders, one per screen.
//
// Each view model subscribes to the store, keeps the derived state its
// screen renders, and carries ephemeral UI flags (selection, open dialog).
// Mutations go through the store; the resulting `Change` is what makes the
// view model re-query on its next `poll`.

pub mod balance_sheet;
pub mod budget;
pub mod dashboard;
pub mod forms;
pub mod history;
pub mod settings;

pub use balance_sheet::BalanceSheetViewModel;
pub use budget::BudgetViewModel;
pub use dashboard::DashboardViewModel;
pub use forms::{FormError, FormField, ItemForm, ItemInput, ValueForm};
pub use history::{HistorySubject, ItemHistoryViewModel};
pub use settings::SettingsViewModel;

use crate::store::Change;
use std::sync::mpsc::Receiver;

/// Drain pending changes; true when any of them is one the screen cares about
pub(crate) fn drain(changes: &Receiver<Change>, relevant: &[Change]) -> bool {
    let mut stale = false;
    for change in changes.try_iter() {
        if relevant.contains(&change) {
            stale = true;
        }
    }
    stale
}

/// Open dialog on a list screen
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Dialog {
    #[default]
    None,
    AddItem(ItemForm),
    EditItem { id: i64, form: ItemForm },
    AddValue { item_id: i64, form: ValueForm },
    ConfirmDelete { id: i64, name: String },
}

impl Dialog {
    pub fn is_open(&self) -> bool {
        !matches!(self, Dialog::None)
    }

    /// Route a typed character to whichever form is open
    pub fn push_char(&mut self, c: char) {
        match self {
            Dialog::AddItem(form) | Dialog::EditItem { form, .. } => form.push_char(c),
            Dialog::AddValue { form, .. } => form.push_char(c),
            Dialog::None | Dialog::ConfirmDelete { .. } => {}
        }
    }

    pub fn pop_char(&mut self) {
        match self {
            Dialog::AddItem(form) | Dialog::EditItem { form, .. } => form.pop_char(),
            Dialog::AddValue { form, .. } => form.pop_char(),
            Dialog::None | Dialog::ConfirmDelete { .. } => {}
        }
    }

    pub fn next_field(&mut self) {
        if let Dialog::AddItem(form) | Dialog::EditItem { form, .. } = self {
            form.next_field();
        }
    }

    pub fn previous_field(&mut self) {
        if let Dialog::AddItem(form) | Dialog::EditItem { form, .. } = self {
            form.previous_field();
        }
    }
}

/// What confirming the open dialog asks for, after validation
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Add(ItemInput),
    Edit(i64, ItemInput),
    Value(i64, f64),
    Delete(i64),
}

impl Dialog {
    /// None when no dialog is open
    pub fn submission(&self) -> Option<Result<Submission, FormError>> {
        let submission = match self {
            Dialog::None => return None,
            Dialog::AddItem(form) => form.validate().map(Submission::Add),
            Dialog::EditItem { id, form } => form.validate().map(|input| Submission::Edit(*id, input)),
            Dialog::AddValue { item_id, form } => form.validate().map(|v| Submission::Value(*item_id, v)),
            Dialog::ConfirmDelete { id, .. } => Ok(Submission::Delete(*id)),
        };
        Some(submission)
    }
}

/// Row selection with wrap-around, clamped to the list length
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    pub index: Option<usize>,
}

impl Selection {
    /// Keep the selection valid after the list changed length
    pub fn clamp(&mut self, len: usize) {
        self.index = match (self.index, len) {
            (_, 0) => None,
            (None, _) => Some(0),
            (Some(i), len) if i >= len => Some(len - 1),
            (Some(i), _) => Some(i),
        };
    }

    pub fn next(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        self.index = Some(match self.index {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        });
    }

    pub fn previous(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        self.index = Some(match self.index {
            Some(0) => len - 1,
            Some(i) => i - 1,
            None => 0,
        });
    }
}
