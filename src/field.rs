//! Per-field persistence rules
//!
//! Rules, first match wins:
//! 1. under an ignore-matched element: excluded
//! 2. radio/checkbox: persisted as `name + value -> "on"` when checked, else excluded
//! 3. hidden/submit: excluded
//! 4. empty value: excluded
//! 5. anything else: persisted as `name -> value`

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dom::Field;

/// Stored value marking a checked radio/checkbox
pub const CHECKED: &str = "on";

/// Saved field values for one form, keyed by field key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormRecord(pub BTreeMap<String, String>);

impl FormRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Insert, replacing any earlier entry for the same key
    pub fn insert(&mut self, key: String, value: String) {
        self.0.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// How a control type is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Toggle,
    Skipped,
    Free,
}

impl Kind {
    fn of(field: &dyn Field) -> Self {
        match field.kind().to_lowercase().as_str() {
            "radio" | "checkbox" => Kind::Toggle,
            "hidden" | "submit" => Kind::Skipped,
            _ => Kind::Free,
        }
    }
}

/// Outcome of classifying one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Excluded,
    Toggle { name: String, value: String },
    Value { name: String, value: String },
}

impl Classification {
    /// Record entry this field contributes, if any
    pub fn entry(self) -> Option<(String, String)> {
        match self {
            Classification::Excluded => None,
            Classification::Toggle { name, value } => Some((toggle_key(&name, &value), CHECKED.to_string())),
            Classification::Value { name, value } => Some((name, value)),
        }
    }
}

fn toggle_key(name: &str, value: &str) -> String {
    format!("{name}{value}")
}

/// Decide whether and how `field` is persisted
pub fn classify(field: &dyn Field, ignore: &str) -> Classification {
    if field.has_ancestor(ignore) {
        return Classification::Excluded;
    }
    match Kind::of(field) {
        Kind::Toggle if field.is_checked() => Classification::Toggle {
            name: field.name(),
            value: field.value(),
        },
        Kind::Toggle | Kind::Skipped => Classification::Excluded,
        Kind::Free => {
            let value = field.value();
            if value.is_empty() {
                Classification::Excluded
            } else {
                Classification::Value { name: field.name(), value }
            }
        }
    }
}

/// Collect the record for a set of fields. Later fields overwrite earlier
/// ones that map to the same key.
pub fn collect(fields: &[Box<dyn Field>], ignore: &str) -> FormRecord {
    let mut record = FormRecord::new();
    for field in fields {
        if let Some((key, value)) = classify(&**field, ignore).entry() {
            record.insert(key, value);
        }
    }
    record
}

/// Restore `field` from `record`. Toggles are checked when their key holds
/// the checked marker; free fields take a non-empty stored value. Fields
/// without a matching entry are left alone. Returns whether the field changed.
///
/// Fields under `ignore` are never restored, even when a record written by an
/// older configuration still holds a value for them, so a load only ever
/// reverses what `collect` would store today.
pub fn populate(field: &dyn Field, record: &FormRecord, ignore: &str) -> bool {
    if field.has_ancestor(ignore) {
        return false;
    }
    match Kind::of(field) {
        Kind::Toggle => {
            if record.get(&toggle_key(&field.name(), &field.value())) == Some(CHECKED) {
                field.set_checked(true);
                return true;
            }
            false
        }
        Kind::Skipped => false,
        Kind::Free => match record.get(&field.name()) {
            Some(value) if !value.is_empty() => {
                field.set_value(value);
                true
            }
            _ => false,
        },
    }
}
