//! Table collection: one registry plus one table per provisioned locale.

use std::collections::HashMap;

use thiserror::Error;

use crate::error::RegistryError;
use crate::store::registry::{
    KeyEntry,
    KeyRegistry,
};
use crate::store::table::LocaleTable;
use crate::types::{
    KeyId,
    LocaleId,
};

/// Errors from direct writes into a [`TableCollection`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The key id is not present in the collection's registry. Every id held
    /// by a locale table must exist in the registry (referential integrity).
    #[error("key {0} is not registered in this collection")]
    UnregisteredKey(KeyId),

    /// The target locale has no provisioned table. Tables are never created
    /// on demand; a typo'd locale must surface instead of silently growing a
    /// new table.
    #[error("locale '{0}' has no provisioned table")]
    UnprovisionedLocale(LocaleId),
}

/// The unit of import and lookup: one [`KeyRegistry`] shared by a set of
/// [`LocaleTable`]s, one per supported locale.
///
/// Locale tables are provisioned explicitly via [`Self::provision_locale`];
/// lookups of unprovisioned locales return `None` rather than auto-creating a
/// table. Mutations set a dirty flag; flushing the collection to durable
/// storage is entirely the host's responsibility.
#[derive(Debug, Clone)]
pub struct TableCollection {
    /// Unique name, used as the external lookup handle.
    name: String,
    /// Key registry shared by all locale tables of this collection.
    registry: KeyRegistry,
    /// Provisioned locale tables.
    tables: HashMap<LocaleId, LocaleTable>,
    /// Set on mutation, cleared by [`Self::take_dirty`].
    dirty: bool,
}

impl TableCollection {
    /// Creates an empty collection named `name`, with no locales provisioned.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), registry: KeyRegistry::new(), tables: HashMap::new(), dirty: false }
    }

    /// The collection's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Provisions a table for `locale` if one does not exist yet.
    pub fn provision_locale(&mut self, locale: LocaleId) -> &mut LocaleTable {
        self.dirty = true;
        self.tables.entry(locale.clone()).or_insert_with(|| LocaleTable::new(locale))
    }

    /// Returns the table for `locale`, or `None` when that locale is not
    /// provisioned.
    #[must_use]
    pub fn table(&self, locale: &LocaleId) -> Option<&LocaleTable> {
        self.tables.get(locale)
    }

    /// Mutable access to the table for `locale`, if provisioned.
    pub fn table_mut(&mut self, locale: &LocaleId) -> Option<&mut LocaleTable> {
        self.tables.get_mut(locale)
    }

    /// Returns the key entry named `name`, creating it if unseen.
    ///
    /// # Errors
    /// [`RegistryError::InvalidKey`] if `name` is empty.
    pub fn ensure_key(&mut self, name: &str) -> Result<KeyEntry, RegistryError> {
        let created_before = self.registry.len();
        let entry = self.registry.get_or_create(name)?;
        if self.registry.len() != created_before {
            self.dirty = true;
        }
        Ok(entry)
    }

    /// The collection's key registry.
    #[must_use]
    pub const fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    /// Mutable registry access for maintenance operations (rename, pruning by
    /// an external tool).
    pub fn registry_mut(&mut self) -> &mut KeyRegistry {
        self.dirty = true;
        &mut self.registry
    }

    /// Upserts `value` for `(locale, id)`.
    ///
    /// # Errors
    /// - [`StoreError::UnregisteredKey`] if `id` is unknown to the registry.
    /// - [`StoreError::UnprovisionedLocale`] if `locale` has no table.
    pub fn set_value(
        &mut self,
        locale: &LocaleId,
        id: KeyId,
        value: impl Into<String>,
    ) -> Result<(), StoreError> {
        if self.registry.lookup_id(id).is_none() {
            return Err(StoreError::UnregisteredKey(id));
        }
        let Some(table) = self.tables.get_mut(locale) else {
            return Err(StoreError::UnprovisionedLocale(locale.clone()));
        };
        table.set(id, value);
        self.dirty = true;
        Ok(())
    }

    /// Iterates over the provisioned locales, in arbitrary order.
    pub fn locales(&self) -> impl Iterator<Item = &LocaleId> {
        self.tables.keys()
    }

    /// Marks the collection as mutated without going through a typed write.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Whether the collection was mutated since the last [`Self::take_dirty`].
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clears and returns the dirty flag. Hosts call this when flushing the
    /// collection to their own storage.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }
}
