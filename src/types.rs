//! Core identifier types used throughout the crate.

use serde::{
    Deserialize,
    Serialize,
};

/// Stable numeric identifier of a translation key.
///
/// Assigned once by a [`crate::store::KeyRegistry`], monotonically increasing,
/// never reused. Compact and stable under key renames, which makes it the
/// preferred half of the dual id/name reference identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(pub u64);

impl std::fmt::Display for KeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A locale identifier such as `"ko"`, `"en"` or `"ja-JP"`.
///
/// Treated as an opaque code: the crate never validates it against a language
/// registry, it only uses it as a lookup handle into a
/// [`crate::store::TableCollection`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocaleId(pub String);

impl LocaleId {
    /// Creates a locale identifier from anything string-like.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The raw locale code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LocaleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LocaleId {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

impl From<String> for LocaleId {
    fn from(code: String) -> Self {
        Self(code)
    }
}

/// Handle for an observer registration in a [`crate::events::ListenerSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);
