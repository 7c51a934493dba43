//! Fatal error types.
//!
//! Only preconditions checked before bulk work begins are fatal. Row-level
//! import problems accumulate into the [`crate::import::ImportReport`] and
//! resolution problems are returned as [`crate::resolve::Unresolved`] values;
//! neither goes through these types.

use thiserror::Error;

/// Errors that abort an import before any row is processed.
#[derive(Error, Debug)]
pub enum ImportError {
    /// The tabular source could not be read at all (e.g. the backing JSON
    /// document is not an array of row objects).
    #[error("tabular source is unreadable: {0}")]
    SourceUnreadable(String),

    /// The configured key column is not a field of the source's row schema.
    /// Checked once against the first row, since every row would fail
    /// identically.
    #[error("key column '{0}' is not a field of the source rows")]
    InvalidSchema(String),
}

/// Errors from direct [`crate::store::KeyRegistry`] manipulation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// An empty or malformed key name was supplied.
    #[error("invalid translation key: {0}")]
    InvalidKey(String),

    /// A rename target name is already taken by another entry.
    #[error("key name '{0}' already exists in the registry")]
    DuplicateName(String),

    /// A rename referenced an id that was never allocated.
    #[error("key id {0} does not exist in the registry")]
    UnknownId(crate::types::KeyId),
}
