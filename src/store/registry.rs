//! Name↔id mapping for translation keys.

use std::collections::HashMap;

use crate::error::RegistryError;
use crate::types::KeyId;

/// One translation key: a stable numeric id plus a human-editable name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEntry {
    /// Stable identifier, assigned once, never reused.
    pub id: KeyId,
    /// Unique name within the owning registry; mutable via
    /// [`KeyRegistry::rename`], which preserves the id.
    pub name: String,
}

/// Bidirectional name↔id registry for the translation keys of one
/// [`crate::store::TableCollection`].
///
/// Both lookup views are kept consistent at all times: `lookup_name` and
/// `lookup_id` always resolve to the same entry. Ids are allocated from a
/// monotonic counter and never reassigned, even after a rename.
#[derive(Debug, Clone, Default)]
pub struct KeyRegistry {
    /// Name → id view.
    by_name: HashMap<String, KeyId>,
    /// Id → entry view; owns the entry data.
    by_id: HashMap<KeyId, KeyEntry>,
    /// Next id to allocate.
    next_id: u64,
}

impl KeyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry named `name`, creating it with a fresh id if absent.
    ///
    /// # Errors
    /// [`RegistryError::InvalidKey`] if `name` is empty.
    pub fn get_or_create(&mut self, name: &str) -> Result<KeyEntry, RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::InvalidKey("key name is empty".to_string()));
        }
        if let Some(id) = self.by_name.get(name) {
            if let Some(entry) = self.by_id.get(id) {
                return Ok(entry.clone());
            }
        }

        let id = KeyId(self.next_id);
        self.next_id += 1;
        let entry = KeyEntry { id, name: name.to_string() };
        self.by_name.insert(name.to_string(), id);
        self.by_id.insert(id, entry.clone());
        tracing::debug!(key = %name, id = %id, "registered translation key");
        Ok(entry)
    }

    /// Looks up an entry by id.
    #[must_use]
    pub fn lookup_id(&self, id: KeyId) -> Option<&KeyEntry> {
        self.by_id.get(&id)
    }

    /// Looks up an entry by exact name.
    #[must_use]
    pub fn lookup_name(&self, name: &str) -> Option<&KeyEntry> {
        self.by_name.get(name).and_then(|id| self.by_id.get(id))
    }

    /// Renames an entry, preserving its id and keeping both views consistent.
    ///
    /// # Errors
    /// - [`RegistryError::UnknownId`] if `id` was never allocated.
    /// - [`RegistryError::InvalidKey`] if `new_name` is empty.
    /// - [`RegistryError::DuplicateName`] if another entry already holds
    ///   `new_name`.
    pub fn rename(&mut self, id: KeyId, new_name: &str) -> Result<(), RegistryError> {
        if new_name.is_empty() {
            return Err(RegistryError::InvalidKey("key name is empty".to_string()));
        }
        match self.by_name.get(new_name) {
            Some(existing) if *existing != id => {
                return Err(RegistryError::DuplicateName(new_name.to_string()));
            }
            _ => {}
        }
        let Some(entry) = self.by_id.get_mut(&id) else {
            return Err(RegistryError::UnknownId(id));
        };

        self.by_name.remove(&entry.name);
        entry.name = new_name.to_string();
        self.by_name.insert(new_name.to_string(), id);
        Ok(())
    }

    /// Number of registered keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether the registry holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// All entries, sorted by name for stable presentation (pickers,
    /// diagnostics output).
    #[must_use]
    pub fn entries_sorted(&self) -> Vec<&KeyEntry> {
        let mut entries: Vec<&KeyEntry> = self.by_id.values().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }
}
