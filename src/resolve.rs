//! Reference resolution: turning a `(collection, key)` pointer plus the
//! active locale into a localized value.

use std::sync::{
    Arc,
    Mutex,
    Weak,
};

use futures::future::BoxFuture;
use serde::{
    Deserialize,
    Serialize,
};
use thiserror::Error;

use crate::events::{
    ListenerSet,
    Subscription,
};
use crate::locale::ActiveLocale;
use crate::store::{
    CollectionHandle,
    CollectionProvider,
    Lookup,
    TableChange,
};
use crate::types::{
    KeyId,
    LocaleId,
};

/// Why a reference could not be resolved right now.
///
/// All of these are non-fatal: they are returned as values, never thrown, so
/// a temporarily unresolvable reference cannot destabilize a running binding.
/// The consumer layer picks the fallback display behavior.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unresolved {
    /// No collection of the referenced name exists.
    #[error("no such table collection")]
    NoSuchCollection,
    /// Neither the key id nor the key name resolved in the registry.
    #[error("no such key in the collection")]
    NoSuchKey,
    /// The active locale has no provisioned table in the collection.
    #[error("no table for the active locale")]
    NoSuchLocale,
    /// The key exists but holds no value in the active locale.
    #[error("no value for the active locale")]
    NoValueForLocale,
    /// No locale is currently selected.
    #[error("no locale selected")]
    NoLocaleSelected,
}

/// How a [`Reference`] currently identifies its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyBindingState {
    /// No key information at all.
    Unbound,
    /// A key id is known (the name may be kept alongside for diagnostics).
    BoundById,
    /// Only the human-editable name is known; the next successful resolution
    /// rewrites the id (`BoundByNameOnly → BoundById`).
    BoundByNameOnly,
}

/// A `(collection, key)` pointer with dual id/name key identity.
///
/// The id is compact and stable under renames, so it is authoritative
/// whenever it resolves. The name is the durable recovery path: when the id
/// is absent or invalid (e.g. after a registry reset), resolution falls back
/// to the name and, on success, rewrites the id. The name is never dropped
/// once an id is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    /// Name of the table collection to resolve against.
    pub collection: String,
    /// Stable key id, if known.
    pub key_id: Option<KeyId>,
    /// Human-editable key name, kept for recovery and diagnostics.
    pub key_name: Option<String>,
}

impl Reference {
    /// Reference by key name only.
    #[must_use]
    pub fn by_name(collection: impl Into<String>, key_name: impl Into<String>) -> Self {
        Self { collection: collection.into(), key_id: None, key_name: Some(key_name.into()) }
    }

    /// Reference by key id only.
    #[must_use]
    pub fn by_id(collection: impl Into<String>, key_id: KeyId) -> Self {
        Self { collection: collection.into(), key_id: Some(key_id), key_name: None }
    }

    /// Current key-identity state.
    #[must_use]
    pub const fn binding_state(&self) -> KeyBindingState {
        match (self.key_id, &self.key_name) {
            (Some(_), _) => KeyBindingState::BoundById,
            (None, Some(_)) => KeyBindingState::BoundByNameOnly,
            (None, None) => KeyBindingState::Unbound,
        }
    }

    /// Resolves the key against `registry`, self-healing the identity:
    /// a resolvable id wins and refreshes the stored name; otherwise the name
    /// is tried and, on success, the id is rewritten from the registry.
    fn resolve_key(&mut self, registry: &crate::store::KeyRegistry) -> Option<KeyId> {
        if let Some(id) = self.key_id {
            if let Some(entry) = registry.lookup_id(id) {
                if self.key_name.as_deref() != Some(entry.name.as_str()) {
                    self.key_name = Some(entry.name.clone());
                }
                return Some(id);
            }
        }
        if let Some(name) = self.key_name.clone() {
            if let Some(entry) = registry.lookup_name(&name) {
                tracing::debug!(key = %name, id = %entry.id, "rebound reference by name");
                self.key_id = Some(entry.id);
                return Some(entry.id);
            }
        }
        None
    }
}

/// What changed about a [`LocalizedReference`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceChange {
    /// The reference itself was rewritten via
    /// [`LocalizedReference::set_reference`].
    Rewritten,
    /// A committed write to the bound collection could have altered the
    /// resolved value for the currently active locale.
    ValueUpdated,
}

/// Outcome of [`LocalizedReference::resolve`].
///
/// Resolution is synchronous when the backing collection is materialized and
/// asynchronous when the provider must load it first; callers must handle
/// both. The `Pending` future performs the same key self-healing and change
/// watching as the synchronous path once the collection is available.
pub enum Resolution {
    /// The value is materialized.
    Ready(String),
    /// The backing collection is loading; await for the settled outcome.
    Pending(BoxFuture<'static, Result<String, Unresolved>>),
    /// Not resolvable right now; see [`Unresolved`] for the reason.
    Unresolved(Unresolved),
}

impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
            Self::Unresolved(reason) => f.debug_tuple("Unresolved").field(reason).finish(),
        }
    }
}

/// Mutable interior of a [`LocalizedReference`].
struct RefInner {
    /// The pointer being resolved.
    reference: Reference,
    /// Last delivered value and the locale it was computed for (`None` locale
    /// covers fallback values delivered with no selection). Used purely to
    /// suppress redundant downstream writes.
    cached: Option<(Option<LocaleId>, String)>,
    /// Watch on the bound collection's committed writes.
    watch: Option<Watch>,
}

/// An attached collection watch.
struct Watch {
    /// Name of the watched collection.
    collection: String,
    /// Keeps the listener registered; dropping unregisters.
    _subscription: Subscription,
}

/// A resolvable reference with a change notification and a resolution cache.
///
/// `changed` fires exactly once per committed change that could alter the
/// resolved value for the currently active locale: on explicit rewrite, or on
/// a committed write to the bound key in the active locale's table. Writes to
/// other locales' tables never fire it.
pub struct LocalizedReference {
    /// Shared mutable state; shared with the collection watch and pending
    /// resolutions.
    inner: Arc<Mutex<RefInner>>,
    /// Change listeners.
    changed: ListenerSet<ReferenceChange>,
}

impl std::fmt::Debug for LocalizedReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalizedReference")
            .field("reference", &self.reference())
            .field("changed", &self.changed)
            .finish()
    }
}

impl LocalizedReference {
    /// Wraps `reference` for resolution.
    #[must_use]
    pub fn new(reference: Reference) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RefInner { reference, cached: None, watch: None })),
            changed: ListenerSet::new(),
        }
    }

    /// Shorthand for a name-identified reference.
    #[must_use]
    pub fn by_name(collection: impl Into<String>, key_name: impl Into<String>) -> Self {
        Self::new(Reference::by_name(collection, key_name))
    }

    /// Locks the interior, recovering from poisoning.
    fn lock(inner: &Arc<Mutex<RefInner>>) -> std::sync::MutexGuard<'_, RefInner> {
        inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Snapshot of the current reference.
    #[must_use]
    pub fn reference(&self) -> Reference {
        Self::lock(&self.inner).reference.clone()
    }

    /// Current key-identity state.
    #[must_use]
    pub fn binding_state(&self) -> KeyBindingState {
        Self::lock(&self.inner).reference.binding_state()
    }

    /// Listener set announcing changes that warrant a re-resolve.
    #[must_use]
    pub const fn changed(&self) -> &ListenerSet<ReferenceChange> {
        &self.changed
    }

    /// Rewrites the reference to `(collection, key_name)`, invalidating the
    /// cache and the collection watch, then fires `changed` exactly once.
    pub fn set_reference(&self, collection: impl Into<String>, key_name: impl Into<String>) {
        {
            let mut guard = Self::lock(&self.inner);
            guard.reference = Reference::by_name(collection, key_name);
            guard.cached = None;
            guard.watch = None;
        }
        self.changed.emit(&ReferenceChange::Rewritten);
    }

    /// Last delivered value, if any.
    #[must_use]
    pub fn cached_value(&self) -> Option<String> {
        Self::lock(&self.inner).cached.as_ref().map(|(_, value)| value.clone())
    }

    /// Records `value` as delivered for `locale`; returns whether it differs
    /// from the previously delivered value (i.e. whether a downstream write
    /// is warranted).
    pub(crate) fn store_cached(&self, locale: Option<LocaleId>, value: &str) -> bool {
        let mut guard = Self::lock(&self.inner);
        let unchanged =
            guard.cached.as_ref().is_some_and(|(_, cached_value)| cached_value == value);
        guard.cached = Some((locale, value.to_string()));
        !unchanged
    }

    /// Resolves the reference for the currently active locale.
    ///
    /// The synchronous path returns `Ready`/`Unresolved`; when the provider
    /// must load the collection, `Pending` is returned and the future settles
    /// with identical semantics once the load completes.
    #[must_use]
    pub fn resolve(&self, provider: &dyn CollectionProvider, active: &ActiveLocale) -> Resolution {
        let locale = active.current();
        let collection_name = Self::lock(&self.inner).reference.collection.clone();

        match provider.collection(&collection_name) {
            Lookup::Missing => Resolution::Unresolved(Unresolved::NoSuchCollection),
            Lookup::Loaded(handle) => {
                match Self::resolve_with_handle(&self.inner, &self.changed, active, &handle, locale)
                {
                    Ok(value) => Resolution::Ready(value),
                    Err(reason) => Resolution::Unresolved(reason),
                }
            }
            Lookup::Loading(load) => {
                let inner = Arc::clone(&self.inner);
                let changed = self.changed.clone();
                let active = active.clone();
                Resolution::Pending(Box::pin(async move {
                    let Some(handle) = load.await else {
                        return Err(Unresolved::NoSuchCollection);
                    };
                    Self::resolve_with_handle(&inner, &changed, &active, &handle, locale)
                }))
            }
        }
    }

    /// Shared resolution core for the sync and async paths: attaches the
    /// collection watch, self-heals the key identity, and reads the value.
    /// Lookup order: key, then locale selection, then table, then value, so a
    /// missing collection or key always outranks a missing locale selection.
    ///
    /// Lock order: reference interior first, then the collection's read lock.
    fn resolve_with_handle(
        inner: &Arc<Mutex<RefInner>>,
        changed: &ListenerSet<ReferenceChange>,
        active: &ActiveLocale,
        handle: &CollectionHandle,
        locale: Option<LocaleId>,
    ) -> Result<String, Unresolved> {
        Self::ensure_watch(inner, changed, active, handle);

        let mut guard = Self::lock(inner);
        let collection = handle.read();
        let Some(key_id) = guard.reference.resolve_key(collection.registry()) else {
            return Err(Unresolved::NoSuchKey);
        };
        let Some(locale) = locale else {
            return Err(Unresolved::NoLocaleSelected);
        };
        let Some(table) = collection.table(&locale) else {
            return Err(Unresolved::NoSuchLocale);
        };
        table.get(key_id).map(str::to_string).ok_or(Unresolved::NoValueForLocale)
    }

    /// Subscribes to `handle`'s committed writes, re-emitting `changed` for
    /// writes that could alter this reference's resolved value: same key (or
    /// any key while only the name is known) in the active locale's table.
    fn ensure_watch(
        inner: &Arc<Mutex<RefInner>>,
        changed: &ListenerSet<ReferenceChange>,
        active: &ActiveLocale,
        handle: &CollectionHandle,
    ) {
        let mut guard = Self::lock(inner);
        if guard.watch.as_ref().is_some_and(|watch| watch.collection == handle.name()) {
            return;
        }

        let weak: Weak<Mutex<RefInner>> = Arc::downgrade(inner);
        let changed = changed.clone();
        let active = active.clone();
        let subscription = handle.changes().subscribe(move |change: &TableChange| {
            if active.current().as_ref() != Some(&change.locale) {
                return;
            }
            let affected = weak.upgrade().is_some_and(|inner| {
                let guard = inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                match (guard.reference.key_id, &guard.reference.key_name) {
                    (Some(id), _) => id == change.key_id,
                    // Name-only: until the id is known, any committed write
                    // could be the one that makes the name resolvable.
                    (None, Some(_)) => true,
                    (None, None) => false,
                }
            });
            if affected {
                changed.emit(&ReferenceChange::ValueUpdated);
            }
        });
        guard.watch =
            Some(Watch { collection: handle.name().to_string(), _subscription: subscription });
    }
}
