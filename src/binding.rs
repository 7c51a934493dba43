//! Consumer bindings: the only writers to the consumer-facing surface.

use std::sync::{
    Arc,
    Mutex,
};

use crate::events::Subscription;
use crate::locale::ActiveLocale;
use crate::resolve::{
    LocalizedReference,
    Resolution,
    Unresolved,
};
use crate::store::CollectionProvider;
use crate::types::LocaleId;

/// Consumer-update callback, invoked with the final settled value of a
/// refresh. At most one invocation happens per logical refresh generation and
/// none at all when the value did not change.
pub type ResolvedSink = Arc<dyn Fn(&str) + Send + Sync>;

/// What to display while a reference is unresolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnresolvedFallback {
    /// Keep showing the last good cached value (silent staleness).
    #[default]
    KeepCurrent,
    /// Deliver an empty string.
    Empty,
    /// Deliver the reference's key name, handy for spotting missing
    /// translations in a running UI.
    KeyName,
}

/// Which bound reference a refresh step concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// The main text reference; formatting arguments apply here.
    Text,
    /// The optional secondary asset reference, resolved as an asset key.
    Asset,
}

/// The optional secondary asset reference and its sink.
struct AssetSlot {
    /// The asset reference.
    reference: Arc<LocalizedReference>,
    /// Consumer callback for the resolved asset key.
    sink: ResolvedSink,
}

/// Mutable refresh bookkeeping.
struct BindingState {
    /// Monotonic refresh generation; a pending continuation whose generation
    /// is stale relative to this is discarded unexecuted.
    generation: u64,
    /// Positional formatting arguments substituted into `{0}`, `{1}`, …
    arguments: Vec<String>,
    /// Display behavior while unresolved.
    fallback: UnresolvedFallback,
}

/// State shared between the binding, its event subscriptions, and in-flight
/// pending resolutions.
struct Shared {
    /// Source of collections.
    provider: Arc<dyn CollectionProvider>,
    /// The process-wide locale selection.
    active: ActiveLocale,
    /// The bound text reference.
    text: Arc<LocalizedReference>,
    /// Consumer callback for resolved text.
    on_resolved: ResolvedSink,
    /// Optional secondary asset reference.
    asset: Mutex<Option<AssetSlot>>,
    /// Refresh bookkeeping.
    state: Mutex<BindingState>,
}

/// Binds localized references to consumer callbacks and keeps them
/// synchronized with the store and the active locale.
///
/// The binding subscribes to the active-locale change event and to each bound
/// reference's change event, and collapses update storms: a refresh writes
/// downstream only when the settled value differs from the last delivered
/// one, and a stale pending resolution is discarded by generation rather
/// than racing a newer one.
///
/// One logical owner: callers must not invoke [`Self::refresh`] or
/// [`Self::set_reference`] from two threads concurrently without external
/// serialization. Internal locks protect data integrity, not call ordering.
pub struct ReferenceBinding {
    /// Shared state.
    shared: Arc<Shared>,
    /// Event registrations; dropped (and thereby unregistered) with the
    /// binding.
    subscriptions: Vec<Subscription>,
}

impl std::fmt::Debug for ReferenceBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceBinding")
            .field("text", &self.shared.text)
            .field("subscriptions", &self.subscriptions)
            .finish_non_exhaustive()
    }
}

impl ReferenceBinding {
    /// Binds `text` to `on_resolved` and performs an initial refresh.
    #[must_use]
    pub fn new(
        provider: Arc<dyn CollectionProvider>,
        active: &ActiveLocale,
        text: LocalizedReference,
        on_resolved: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        let shared = Arc::new(Shared {
            provider,
            active: active.clone(),
            text: Arc::new(text),
            on_resolved: Arc::new(on_resolved),
            asset: Mutex::new(None),
            state: Mutex::new(BindingState {
                generation: 0,
                arguments: Vec::new(),
                fallback: UnresolvedFallback::default(),
            }),
        });

        let mut subscriptions = Vec::new();
        let weak = Arc::downgrade(&shared);
        subscriptions.push(active.changed().subscribe(move |_: &Option<LocaleId>| {
            if let Some(shared) = weak.upgrade() {
                Self::refresh_shared(&shared);
            }
        }));
        let weak = Arc::downgrade(&shared);
        subscriptions.push(shared.text.changed().subscribe(move |_| {
            if let Some(shared) = weak.upgrade() {
                Self::refresh_shared(&shared);
            }
        }));

        Self::refresh_shared(&shared);
        Self { shared, subscriptions }
    }

    /// Sets the display behavior while unresolved.
    #[must_use]
    pub fn with_fallback(self, fallback: UnresolvedFallback) -> Self {
        Self::lock_state(&self.shared).fallback = fallback;
        self.refresh();
        self
    }

    /// Binds a secondary asset reference to its own sink and refreshes.
    pub fn bind_asset(
        &mut self,
        reference: LocalizedReference,
        sink: impl Fn(&str) + Send + Sync + 'static,
    ) {
        let reference = Arc::new(reference);
        let weak = Arc::downgrade(&self.shared);
        self.subscriptions.push(reference.changed().subscribe(move |_| {
            if let Some(shared) = weak.upgrade() {
                Self::refresh_shared(&shared);
            }
        }));
        *Self::lock_asset(&self.shared) = Some(AssetSlot { reference, sink: Arc::new(sink) });
        self.refresh();
    }

    /// Snapshot of the bound text reference.
    #[must_use]
    pub fn reference(&self) -> crate::resolve::Reference {
        self.shared.text.reference()
    }

    /// Last value delivered for the text reference, if any.
    #[must_use]
    pub fn cached_value(&self) -> Option<String> {
        self.shared.text.cached_value()
    }

    /// Rewrites the text reference to `(collection, key)`. The rewrite
    /// invalidates the cache and triggers a refresh through the reference's
    /// own change event.
    pub fn set_reference(&self, collection: impl Into<String>, key: impl Into<String>) {
        self.shared.text.set_reference(collection, key);
    }

    /// Rewrites the asset reference, if one is bound.
    pub fn set_asset_reference(&self, collection: impl Into<String>, key: impl Into<String>) {
        let reference = Self::lock_asset(&self.shared)
            .as_ref()
            .map(|slot| Arc::clone(&slot.reference));
        if let Some(reference) = reference {
            reference.set_reference(collection, key);
        }
    }

    /// Replaces the positional formatting arguments and refreshes. The
    /// refresh writes downstream only if the formatted text changed.
    pub fn set_arguments(&self, arguments: Vec<String>) {
        Self::lock_state(&self.shared).arguments = arguments;
        self.refresh();
    }

    /// Re-resolves all bound references against the current active locale.
    pub fn refresh(&self) {
        Self::refresh_shared(&self.shared);
    }

    /// Locks the refresh state, recovering from poisoning.
    fn lock_state(shared: &Shared) -> std::sync::MutexGuard<'_, BindingState> {
        shared.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Locks the asset slot, recovering from poisoning.
    fn lock_asset(shared: &Shared) -> std::sync::MutexGuard<'_, Option<AssetSlot>> {
        shared.asset.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Starts a new refresh generation and resolves every bound slot.
    fn refresh_shared(shared: &Arc<Shared>) {
        let generation = {
            let mut state = Self::lock_state(shared);
            state.generation += 1;
            state.generation
        };
        tracing::debug!(generation, "refreshing binding");

        Self::refresh_slot(shared, Slot::Text, generation);
        if Self::lock_asset(shared).is_some() {
            Self::refresh_slot(shared, Slot::Asset, generation);
        }
    }

    /// Resolves one slot and settles it, immediately on the fast path or via
    /// a spawned continuation on the slow one.
    fn refresh_slot(shared: &Arc<Shared>, slot: Slot, generation: u64) {
        let Some(reference) = Self::slot_reference(shared, slot) else {
            return;
        };
        let locale = shared.active.current();

        match reference.resolve(shared.provider.as_ref(), &shared.active) {
            Resolution::Ready(value) => Self::settle(shared, slot, generation, locale, Ok(value)),
            Resolution::Unresolved(reason) => {
                Self::settle(shared, slot, generation, locale, Err(reason));
            }
            Resolution::Pending(future) => {
                if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                    let shared = Arc::clone(shared);
                    runtime.spawn(async move {
                        let outcome = future.await;
                        Self::settle(&shared, slot, generation, locale, outcome);
                    });
                } else {
                    tracing::warn!(
                        generation,
                        "dropping pending resolution: no async runtime available"
                    );
                }
            }
        }
    }

    /// The reference bound to `slot`, if any.
    fn slot_reference(shared: &Shared, slot: Slot) -> Option<Arc<LocalizedReference>> {
        match slot {
            Slot::Text => Some(Arc::clone(&shared.text)),
            Slot::Asset => {
                Self::lock_asset(shared).as_ref().map(|asset| Arc::clone(&asset.reference))
            }
        }
    }

    /// The sink bound to `slot`, if any.
    fn slot_sink(shared: &Shared, slot: Slot) -> Option<ResolvedSink> {
        match slot {
            Slot::Text => Some(Arc::clone(&shared.on_resolved)),
            Slot::Asset => Self::lock_asset(shared).as_ref().map(|asset| Arc::clone(&asset.sink)),
        }
    }

    /// Applies a settled outcome: discards stale generations, applies
    /// formatting and the unresolved fallback, and writes downstream only
    /// when the value differs from the last delivered one.
    fn settle(
        shared: &Arc<Shared>,
        slot: Slot,
        generation: u64,
        locale: Option<LocaleId>,
        outcome: Result<String, Unresolved>,
    ) {
        let (arguments, fallback) = {
            let state = Self::lock_state(shared);
            if state.generation != generation {
                tracing::debug!(
                    generation,
                    current = state.generation,
                    "discarding stale resolution"
                );
                return;
            }
            (state.arguments.clone(), state.fallback)
        };
        let Some(reference) = Self::slot_reference(shared, slot) else {
            return;
        };

        let value = match outcome {
            Ok(raw) => match slot {
                Slot::Text => format_arguments(&raw, &arguments),
                Slot::Asset => raw,
            },
            Err(reason) => {
                tracing::debug!(%reason, ?slot, "reference unresolved");
                match fallback {
                    UnresolvedFallback::KeepCurrent => return,
                    UnresolvedFallback::Empty => String::new(),
                    UnresolvedFallback::KeyName => {
                        match reference.reference().key_name {
                            Some(name) => name,
                            None => return,
                        }
                    }
                }
            }
        };

        if reference.store_cached(locale, &value) {
            if let Some(sink) = Self::slot_sink(shared, slot) {
                sink(&value);
            }
        }
    }
}

/// Substitutes positional arguments into `{0}`, `{1}`, … placeholders.
/// Placeholders without a matching argument are left as-is; there is no
/// escape syntax.
fn format_arguments(text: &str, arguments: &[String]) -> String {
    if arguments.is_empty() {
        return text.to_string();
    }
    let mut formatted = text.to_string();
    for (index, argument) in arguments.iter().enumerate() {
        formatted = formatted.replace(&format!("{{{index}}}"), argument);
    }
    formatted
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use googletest::prelude::*;
    use rstest::rstest;

    use super::*;
    use crate::store::{
        InMemoryCollections,
        TableCollection,
    };

    /// Provider with a `UI` collection holding `hello → 안녕 / Hello`.
    fn seeded() -> (InMemoryCollections, crate::store::CollectionHandle) {
        let mut collection = TableCollection::new("UI");
        collection.provision_locale(LocaleId::from("ko"));
        collection.provision_locale(LocaleId::from("en"));
        let entry = collection.ensure_key("hello").unwrap();
        collection.set_value(&LocaleId::from("ko"), entry.id, "안녕").unwrap();
        collection.set_value(&LocaleId::from("en"), entry.id, "Hello").unwrap();

        let provider = InMemoryCollections::new();
        let handle = provider.insert(collection);
        (provider, handle)
    }

    /// Collects every sink invocation.
    fn recording_sink() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) + Send + Sync + 'static) {
        let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink_log = Arc::clone(&log);
        (log, move |value: &str| sink_log.lock().unwrap().push(value.to_string()))
    }

    #[rstest]
    #[case::no_arguments("Hello", &[], "Hello")]
    #[case::one_argument("Hello {0}!", &["World"], "Hello World!")]
    #[case::repeated("{0} and {0}", &["twice"], "twice and twice")]
    #[case::two_arguments("{1}, {0}", &["a", "b"], "b, a")]
    #[case::unmatched_placeholder("Hi {3}", &["a"], "Hi {3}")]
    fn format_arguments_cases(
        #[case] text: &str,
        #[case] arguments: &[&str],
        #[case] expected: &str,
    ) {
        let arguments: Vec<String> = arguments.iter().map(ToString::to_string).collect();

        assert_that!(format_arguments(text, &arguments), eq(expected));
    }

    #[googletest::test]
    fn initial_refresh_delivers_the_resolved_value() {
        let (provider, _handle) = seeded();
        let active = ActiveLocale::starting_at("ko");
        let (log, sink) = recording_sink();

        let binding = ReferenceBinding::new(
            Arc::new(provider),
            &active,
            LocalizedReference::by_name("UI", "hello"),
            sink,
        );

        assert_that!(*log.lock().unwrap(), elements_are![eq("안녕")]);
        expect_that!(binding.cached_value(), some(eq("안녕")));
    }

    #[googletest::test]
    fn repeated_refresh_with_unchanged_value_writes_once() {
        let (provider, _handle) = seeded();
        let active = ActiveLocale::starting_at("ko");
        let (log, sink) = recording_sink();
        let binding = ReferenceBinding::new(
            Arc::new(provider),
            &active,
            LocalizedReference::by_name("UI", "hello"),
            sink,
        );

        binding.refresh();
        binding.refresh();

        assert_that!(*log.lock().unwrap(), elements_are![eq("안녕")]);
    }

    #[googletest::test]
    fn locale_switch_delivers_the_new_value_exactly_once() {
        let (provider, _handle) = seeded();
        let active = ActiveLocale::starting_at("ko");
        let (log, sink) = recording_sink();
        let _binding = ReferenceBinding::new(
            Arc::new(provider),
            &active,
            LocalizedReference::by_name("UI", "hello"),
            sink,
        );

        active.select("en");

        assert_that!(*log.lock().unwrap(), elements_are![eq("안녕"), eq("Hello")]);
    }

    #[googletest::test]
    fn set_reference_delivers_the_new_key_value() {
        let (provider, handle) = seeded();
        let bye = handle.ensure_key("bye").unwrap();
        handle.set_value(&LocaleId::from("ko"), bye.id, "잘가").unwrap();
        let active = ActiveLocale::starting_at("ko");
        let (log, sink) = recording_sink();
        let binding = ReferenceBinding::new(
            Arc::new(provider),
            &active,
            LocalizedReference::by_name("UI", "hello"),
            sink,
        );

        binding.set_reference("UI", "bye");

        assert_that!(*log.lock().unwrap(), elements_are![eq("안녕"), eq("잘가")]);
    }

    #[googletest::test]
    fn store_write_in_active_locale_propagates() {
        let (provider, handle) = seeded();
        let active = ActiveLocale::starting_at("ko");
        let (log, sink) = recording_sink();
        let _binding = ReferenceBinding::new(
            Arc::new(provider),
            &active,
            LocalizedReference::by_name("UI", "hello"),
            sink,
        );
        let key_id = handle.read().registry().lookup_name("hello").unwrap().id;

        handle.set_value(&LocaleId::from("ko"), key_id, "안녕하세요").unwrap();
        // A write to the inactive locale must not reach the consumer.
        handle.set_value(&LocaleId::from("en"), key_id, "Hello there").unwrap();

        assert_that!(*log.lock().unwrap(), elements_are![eq("안녕"), eq("안녕하세요")]);
    }

    #[googletest::test]
    fn unresolved_keeps_the_last_good_value_by_default() {
        let (provider, handle) = seeded();
        let active = ActiveLocale::starting_at("ko");
        let (log, sink) = recording_sink();
        let binding = ReferenceBinding::new(
            Arc::new(provider),
            &active,
            LocalizedReference::by_name("UI", "hello"),
            sink,
        );
        let key_id = handle.read().registry().lookup_name("hello").unwrap().id;

        handle.remove_value(&LocaleId::from("ko"), key_id);

        // The removal triggers a refresh that resolves to NoValueForLocale;
        // the binding keeps showing the stale value rather than blanking.
        assert_that!(*log.lock().unwrap(), elements_are![eq("안녕")]);
        expect_that!(binding.cached_value(), some(eq("안녕")));
    }

    #[googletest::test]
    fn empty_fallback_blanks_an_unresolved_binding() {
        let (provider, handle) = seeded();
        let active = ActiveLocale::starting_at("ko");
        let (log, sink) = recording_sink();
        let binding = ReferenceBinding::new(
            Arc::new(provider),
            &active,
            LocalizedReference::by_name("UI", "hello"),
            sink,
        )
        .with_fallback(UnresolvedFallback::Empty);
        let key_id = handle.read().registry().lookup_name("hello").unwrap().id;

        handle.remove_value(&LocaleId::from("ko"), key_id);

        assert_that!(*log.lock().unwrap(), elements_are![eq("안녕"), eq("")]);
        expect_that!(binding.cached_value(), some(eq("")));
    }

    #[googletest::test]
    fn key_name_fallback_shows_the_missing_key() {
        let (provider, _handle) = seeded();
        let active = ActiveLocale::starting_at("ko");
        let (log, sink) = recording_sink();
        let _binding = ReferenceBinding::new(
            Arc::new(provider),
            &active,
            LocalizedReference::by_name("UI", "missing.key"),
            sink,
        )
        .with_fallback(UnresolvedFallback::KeyName);

        assert_that!(*log.lock().unwrap(), elements_are![eq("missing.key")]);
    }

    #[googletest::test]
    fn arguments_are_substituted_and_rerendered_on_change() {
        let (provider, handle) = seeded();
        let greet = handle.ensure_key("greet").unwrap();
        handle.set_value(&LocaleId::from("en"), greet.id, "Hello {0}!").unwrap();
        let active = ActiveLocale::starting_at("en");
        let (log, sink) = recording_sink();
        let binding = ReferenceBinding::new(
            Arc::new(provider),
            &active,
            LocalizedReference::by_name("UI", "greet"),
            sink,
        );

        binding.set_arguments(vec!["World".to_string()]);
        // Same arguments settle to the same text: no extra write.
        binding.set_arguments(vec!["World".to_string()]);
        binding.set_arguments(vec!["Rust".to_string()]);

        assert_that!(
            *log.lock().unwrap(),
            elements_are![eq("Hello {0}!"), eq("Hello World!"), eq("Hello Rust!")]
        );
    }

    #[googletest::test]
    fn asset_reference_resolves_through_its_own_sink() {
        let (provider, handle) = seeded();
        let icon = handle.ensure_key("hello.icon").unwrap();
        handle.set_value(&LocaleId::from("ko"), icon.id, "icons/wave_ko.png").unwrap();
        let active = ActiveLocale::starting_at("ko");
        let (text_log, text_sink) = recording_sink();
        let (asset_log, asset_sink) = recording_sink();
        let mut binding = ReferenceBinding::new(
            Arc::new(provider),
            &active,
            LocalizedReference::by_name("UI", "hello"),
            text_sink,
        );

        binding.bind_asset(LocalizedReference::by_name("UI", "hello.icon"), asset_sink);

        assert_that!(*text_log.lock().unwrap(), elements_are![eq("안녕")]);
        assert_that!(*asset_log.lock().unwrap(), elements_are![eq("icons/wave_ko.png")]);
    }

    #[googletest::test]
    fn dropping_the_binding_stops_deliveries() {
        let (provider, _handle) = seeded();
        let active = ActiveLocale::starting_at("ko");
        let (log, sink) = recording_sink();
        let binding = ReferenceBinding::new(
            Arc::new(provider),
            &active,
            LocalizedReference::by_name("UI", "hello"),
            sink,
        );

        drop(binding);
        active.select("en");

        assert_that!(*log.lock().unwrap(), elements_are![eq("안녕")]);
        expect_that!(active.changed().is_empty(), eq(true));
    }
}
