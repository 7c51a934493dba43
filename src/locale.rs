//! Process-wide active-locale selection.

use std::sync::{
    Arc,
    RwLock,
};

use crate::events::ListenerSet;
use crate::types::LocaleId;

/// Cloneable handle to the currently selected locale.
///
/// "No locale selected" is a valid state: resolution against it yields
/// [`crate::resolve::Unresolved::NoLocaleSelected`] rather than an error.
/// Selection changes are announced on [`Self::changed`], but only when the
/// value actually changes; re-selecting the current locale is silent.
#[derive(Debug, Clone, Default)]
pub struct ActiveLocale {
    /// The selected locale, if any.
    current: Arc<RwLock<Option<LocaleId>>>,
    /// Listeners for selection changes; the event carries the new selection.
    changed: ListenerSet<Option<LocaleId>>,
}

impl ActiveLocale {
    /// Creates a handle with no locale selected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a handle with `locale` pre-selected.
    #[must_use]
    pub fn starting_at(locale: impl Into<LocaleId>) -> Self {
        let this = Self::new();
        this.set(Some(locale.into()));
        this
    }

    /// The currently selected locale, if any.
    #[must_use]
    pub fn current(&self) -> Option<LocaleId> {
        self.current.read().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    /// Listener set announcing selection changes.
    #[must_use]
    pub const fn changed(&self) -> &ListenerSet<Option<LocaleId>> {
        &self.changed
    }

    /// Selects `locale` (or clears the selection with `None`), announcing the
    /// change to subscribers if the selection actually changed.
    pub fn set(&self, locale: Option<LocaleId>) {
        {
            let mut current =
                self.current.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            if *current == locale {
                return;
            }
            *current = locale.clone();
        }
        tracing::debug!(locale = ?locale.as_ref().map(LocaleId::as_str), "active locale changed");
        self.changed.emit(&locale);
    }

    /// Convenience for `set(Some(locale))`.
    pub fn select(&self, locale: impl Into<LocaleId>) {
        self.set(Some(locale.into()));
    }

    /// Convenience for `set(None)`.
    pub fn clear(&self) {
        self.set(None);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use googletest::prelude::*;

    use super::*;

    #[googletest::test]
    fn starts_with_no_selection() {
        let active = ActiveLocale::new();

        expect_that!(active.current(), none());
    }

    #[googletest::test]
    fn select_announces_the_new_locale() {
        let active = ActiveLocale::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_cb = Arc::clone(&seen);
        let _sub = active.changed().subscribe(move |locale: &Option<LocaleId>| {
            seen_cb.lock().unwrap().push(locale.clone());
        });

        active.select("ko");
        active.select("en");
        active.clear();

        assert_that!(
            *seen.lock().unwrap(),
            elements_are![
                some(eq(&LocaleId::from("ko"))),
                some(eq(&LocaleId::from("en"))),
                none()
            ]
        );
    }

    #[googletest::test]
    fn reselecting_the_current_locale_is_silent() {
        let active = ActiveLocale::starting_at("ko");
        let count = Arc::new(Mutex::new(0));

        let count_cb = Arc::clone(&count);
        let _sub = active.changed().subscribe(move |_: &Option<LocaleId>| {
            *count_cb.lock().unwrap() += 1;
        });

        active.select("ko");

        expect_that!(*count.lock().unwrap(), eq(0));
    }

    #[googletest::test]
    fn clones_share_the_selection() {
        let active = ActiveLocale::new();
        let other = active.clone();

        active.select("ja");

        expect_that!(other.current(), some(eq(&LocaleId::from("ja"))));
    }
}
