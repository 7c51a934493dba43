//! Collection lookup: the boundary to the host's table storage.

use std::collections::HashMap;
use std::sync::{
    Arc,
    RwLock,
};

use futures::future::BoxFuture;

use crate::store::collection::TableCollection;
use crate::store::handle::CollectionHandle;

/// Outcome of a collection lookup by name.
///
/// The `Loading` arm models backing storage that must load the collection on
/// first touch; it yields `None` when the load concludes that the collection
/// does not exist after all. Callers must handle both `Loaded` and `Loading`
/// without assuming synchronicity.
pub enum Lookup {
    /// The collection is materialized in memory.
    Loaded(CollectionHandle),
    /// The collection is being loaded; await the future for the result.
    Loading(BoxFuture<'static, Option<CollectionHandle>>),
    /// No collection of that name exists.
    Missing,
}

impl std::fmt::Debug for Lookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loaded(handle) => f.debug_tuple("Loaded").field(handle).finish(),
            Self::Loading(_) => f.write_str("Loading(..)"),
            Self::Missing => f.write_str("Missing"),
        }
    }
}

/// Source of named collections, implemented by the host's storage layer.
pub trait CollectionProvider: Send + Sync {
    /// Looks up the collection named `name`.
    fn collection(&self, name: &str) -> Lookup;
}

/// Stock provider holding every collection in memory.
///
/// Suits tests and hosts whose storage layer loads everything up front.
/// Inserting a collection under an already-used name replaces the previous
/// handle; live references bound to the old handle keep reading it until
/// their next full re-resolution.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCollections {
    /// Handles by collection name.
    inner: Arc<RwLock<HashMap<String, CollectionHandle>>>,
}

impl InMemoryCollections {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps `collection` in a handle and registers it under its name.
    pub fn insert(&self, collection: TableCollection) -> CollectionHandle {
        let handle = CollectionHandle::new(collection);
        self.insert_handle(handle.clone());
        handle
    }

    /// Registers an existing handle under its name.
    pub fn insert_handle(&self, handle: CollectionHandle) {
        let mut map = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        map.insert(handle.name().to_string(), handle);
    }

    /// Returns the handle named `name`, if registered.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<CollectionHandle> {
        let map = self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        map.get(name).cloned()
    }
}

impl CollectionProvider for InMemoryCollections {
    fn collection(&self, name: &str) -> Lookup {
        self.get(name).map_or(Lookup::Missing, Lookup::Loaded)
    }
}
