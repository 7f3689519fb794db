// Dialog forms: raw text as typed, validated into domain values on submit.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FormError {
    #[error("name is required")]
    EmptyName,

    #[error("not a valid amount: {0}")]
    InvalidAmount(String),

    #[error("not a valid date (expected YYYY-MM-DD): {0}")]
    InvalidDate(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Name,
    Category,
    Amount,
    DueDate,
}

impl FormField {
    pub fn label(&self) -> &'static str {
        match self {
            FormField::Name => "Name",
            FormField::Category => "Category",
            FormField::Amount => "Amount",
            FormField::DueDate => "Due date",
        }
    }
}

/// Accepts "1,250.50", "$99", " -3 "
pub fn parse_amount(raw: &str) -> Result<f64, FormError> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',' && *c != '_')
        .collect();

    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(FormError::InvalidAmount(raw.trim().to_string())),
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, FormError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| FormError::InvalidDate(raw.trim().to_string()))
}

/// Add/edit dialog for an item
#[derive(Debug, Clone, PartialEq)]
pub struct ItemForm {
    pub name: String,
    pub category: String,
    /// Blank means "no new snapshot"
    pub amount: String,
    pub due_date: String,
    pub with_due_date: bool,
    pub focus: usize,
}

/// Validated item form
#[derive(Debug, Clone, PartialEq)]
pub struct ItemInput {
    pub name: String,
    pub category: String,
    pub amount: Option<f64>,
    pub due_date: Option<NaiveDate>,
}

impl ItemForm {
    pub fn new(with_due_date: bool) -> Self {
        ItemForm {
            name: String::new(),
            category: String::new(),
            amount: String::new(),
            due_date: String::new(),
            with_due_date,
            focus: 0,
        }
    }

    pub fn fields(&self) -> Vec<FormField> {
        let mut fields = vec![FormField::Name, FormField::Category, FormField::Amount];
        if self.with_due_date {
            fields.push(FormField::DueDate);
        }
        fields
    }

    pub fn focused(&self) -> FormField {
        let fields = self.fields();
        fields[self.focus.min(fields.len() - 1)]
    }

    pub fn value(&self, field: FormField) -> &str {
        match field {
            FormField::Name => &self.name,
            FormField::Category => &self.category,
            FormField::Amount => &self.amount,
            FormField::DueDate => &self.due_date,
        }
    }

    fn value_mut(&mut self, field: FormField) -> &mut String {
        match field {
            FormField::Name => &mut self.name,
            FormField::Category => &mut self.category,
            FormField::Amount => &mut self.amount,
            FormField::DueDate => &mut self.due_date,
        }
    }

    pub fn next_field(&mut self) {
        self.focus = (self.focus + 1) % self.fields().len();
    }

    pub fn previous_field(&mut self) {
        let len = self.fields().len();
        self.focus = (self.focus + len - 1) % len;
    }

    pub fn push_char(&mut self, c: char) {
        let field = self.focused();
        self.value_mut(field).push(c);
    }

    pub fn pop_char(&mut self) {
        let field = self.focused();
        self.value_mut(field).pop();
    }

    pub fn validate(&self) -> Result<ItemInput, FormError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(FormError::EmptyName);
        }

        let amount = if self.amount.trim().is_empty() {
            None
        } else {
            Some(parse_amount(&self.amount)?)
        };

        let due_date = if self.with_due_date && !self.due_date.trim().is_empty() {
            Some(parse_date(&self.due_date)?)
        } else {
            None
        };

        Ok(ItemInput {
            name: name.to_string(),
            category: self.category.trim().to_string(),
            amount,
            due_date,
        })
    }
}

/// Single-amount dialog for recording a new snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueForm {
    pub amount: String,
}

impl ValueForm {
    pub fn push_char(&mut self, c: char) {
        self.amount.push(c);
    }

    pub fn pop_char(&mut self) {
        self.amount.pop();
    }

    pub fn validate(&self) -> Result<f64, FormError> {
        parse_amount(&self.amount)
    }
}
