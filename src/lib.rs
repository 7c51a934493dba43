//! i18n-tables
//!
//! A keyed multi-locale string store with tabular import and reactive
//! reference bindings: collections of locale tables indexed by a stable key
//! registry, populated from row-oriented sources, and consumed through
//! self-healing references that follow the active locale.

pub mod binding;
pub mod error;
pub mod events;
pub mod import;
pub mod locale;
pub mod resolve;
pub mod store;
pub mod types;

pub use binding::{
    ReferenceBinding,
    UnresolvedFallback,
};
pub use locale::ActiveLocale;
pub use resolve::{
    LocalizedReference,
    Reference,
    Resolution,
    Unresolved,
};
pub use store::{
    CollectionHandle,
    CollectionProvider,
    InMemoryCollections,
    TableCollection,
};
pub use types::{
    KeyId,
    LocaleId,
};
