//! Keyed multi-locale string storage.
mod collection;
mod handle;
mod provider;
mod registry;
mod table;

pub use collection::{
    StoreError,
    TableCollection,
};
pub use handle::{
    CollectionHandle,
    TableChange,
};
pub use provider::{
    CollectionProvider,
    InMemoryCollections,
    Lookup,
};
pub use registry::{
    KeyEntry,
    KeyRegistry,
};
pub use table::LocaleTable;
