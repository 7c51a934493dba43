//! Per-locale value table.

use std::collections::HashMap;

use crate::types::{
    KeyId,
    LocaleId,
};

/// Mapping of key id → localized string for exactly one locale.
///
/// A missing entry is distinct from an entry holding an empty string: the
/// former means "no translation", the latter an intentionally empty one.
/// Writes here never touch other locales' tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleTable {
    /// The locale this table is scoped to.
    locale: LocaleId,
    /// Values by key id.
    values: HashMap<KeyId, String>,
}

impl LocaleTable {
    /// Creates an empty table for `locale`.
    #[must_use]
    pub fn new(locale: LocaleId) -> Self {
        Self { locale, values: HashMap::new() }
    }

    /// The locale this table is scoped to.
    #[must_use]
    pub const fn locale(&self) -> &LocaleId {
        &self.locale
    }

    /// Upserts the value for `id`, returning the previous value if any.
    pub fn set(&mut self, id: KeyId, value: impl Into<String>) -> Option<String> {
        self.values.insert(id, value.into())
    }

    /// Returns the value for `id`, or `None` when no translation exists in
    /// this locale. Callers must not conflate `None` with `Some("")`.
    #[must_use]
    pub fn get(&self, id: KeyId) -> Option<&str> {
        self.values.get(&id).map(String::as_str)
    }

    /// Removes the value for `id`, returning it if it existed.
    pub fn remove(&mut self, id: KeyId) -> Option<String> {
        self.values.remove(&id)
    }

    /// Number of values in this table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the table holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over all `(id, value)` pairs, in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (KeyId, &str)> {
        self.values.iter().map(|(id, value)| (*id, value.as_str()))
    }
}
