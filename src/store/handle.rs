//! Shared collection handle with committed-write change events.

use std::sync::{
    Arc,
    RwLock,
    RwLockReadGuard,
    RwLockWriteGuard,
};

use crate::error::RegistryError;
use crate::events::ListenerSet;
use crate::store::collection::{
    StoreError,
    TableCollection,
};
use crate::store::registry::KeyEntry;
use crate::types::{
    KeyId,
    LocaleId,
};

/// One committed write into a collection: the locale table and key it landed
/// on. Emitted after the write lock is released, so listeners may read the
/// collection freely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableChange {
    /// Locale whose table was written.
    pub locale: LocaleId,
    /// Key whose value changed.
    pub key_id: KeyId,
}

/// Cloneable shared handle to a [`TableCollection`].
///
/// Each write through the handle is atomic at key-and-locale granularity:
/// concurrent readers observe either the pre- or post-write value, never a
/// torn one. Committed writes are announced on [`Self::changes`] so bound
/// references can re-resolve.
#[derive(Clone)]
pub struct CollectionHandle {
    /// Collection name, duplicated out of the lock for cheap access.
    name: Arc<str>,
    /// The collection itself.
    cell: Arc<RwLock<TableCollection>>,
    /// Listeners for committed writes.
    changes: ListenerSet<TableChange>,
}

impl std::fmt::Debug for CollectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionHandle")
            .field("name", &self.name)
            .field("changes", &self.changes)
            .finish_non_exhaustive()
    }
}

impl CollectionHandle {
    /// Wraps `collection` in a shared handle.
    #[must_use]
    pub fn new(collection: TableCollection) -> Self {
        Self {
            name: Arc::from(collection.name()),
            cell: Arc::new(RwLock::new(collection)),
            changes: ListenerSet::new(),
        }
    }

    /// The collection's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Listener set announcing committed writes.
    #[must_use]
    pub const fn changes(&self) -> &ListenerSet<TableChange> {
        &self.changes
    }

    /// Read access to the collection.
    #[must_use]
    pub fn read(&self) -> RwLockReadGuard<'_, TableCollection> {
        self.cell.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Raw write access for maintenance operations (provisioning, renames,
    /// pruning). Writes made through this guard do not announce changes;
    /// value edits that bound consumers should observe must go through
    /// [`Self::set_value`] / [`Self::remove_value`].
    #[must_use]
    pub fn write(&self) -> RwLockWriteGuard<'_, TableCollection> {
        self.cell.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Returns the key entry named `name`, creating it if unseen.
    ///
    /// # Errors
    /// [`RegistryError::InvalidKey`] if `name` is empty.
    pub fn ensure_key(&self, name: &str) -> Result<KeyEntry, RegistryError> {
        self.write().ensure_key(name)
    }

    /// Whether `locale` has a provisioned table.
    #[must_use]
    pub fn has_locale(&self, locale: &LocaleId) -> bool {
        self.read().table(locale).is_some()
    }

    /// Clones out the value for `(locale, id)`, if any.
    #[must_use]
    pub fn value(&self, locale: &LocaleId, id: KeyId) -> Option<String> {
        self.read().table(locale).and_then(|table| table.get(id)).map(str::to_string)
    }

    /// Upserts `value` for `(locale, id)` and announces the change.
    ///
    /// # Errors
    /// Same conditions as [`TableCollection::set_value`].
    pub fn set_value(
        &self,
        locale: &LocaleId,
        id: KeyId,
        value: impl Into<String>,
    ) -> Result<(), StoreError> {
        {
            let mut collection = self.write();
            collection.set_value(locale, id, value)?;
        }
        self.changes.emit(&TableChange { locale: locale.clone(), key_id: id });
        Ok(())
    }

    /// Removes the value for `(locale, id)`, announcing the change if a value
    /// was actually removed.
    pub fn remove_value(&self, locale: &LocaleId, id: KeyId) -> Option<String> {
        let removed = {
            let mut collection = self.write();
            let removed = collection.table_mut(locale).and_then(|table| table.remove(id));
            if removed.is_some() {
                collection.mark_dirty();
            }
            removed
        };
        if removed.is_some() {
            self.changes.emit(&TableChange { locale: locale.clone(), key_id: id });
        }
        removed
    }

    /// Clears and returns the collection's dirty flag.
    pub fn take_dirty(&self) -> bool {
        self.write().take_dirty()
    }
}
