//! Import outcome reporting.

use serde::{
    Deserialize,
    Serialize,
};

use crate::types::LocaleId;

/// A non-fatal problem accumulated during an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ImportWarning {
    /// A mapping targeted a locale with no provisioned table; the mapping was
    /// skipped. Reported once per locale, with the first offending row.
    #[serde(rename_all = "camelCase")]
    MissingLocaleTable {
        /// The unprovisioned locale.
        locale: LocaleId,
        /// Index of the first row where the mapping was skipped.
        row_index: usize,
    },

    /// Two mappings target the same locale. Allowed (the later mapping wins
    /// per row) but almost always a configuration mistake.
    #[serde(rename_all = "camelCase")]
    DuplicateLocaleMapping {
        /// The locale targeted more than once.
        locale: LocaleId,
    },
}

/// Summary of one import run.
///
/// An import with warnings still completes; only pre-loop precondition
/// failures abort a run (see [`crate::error::ImportError`]).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    /// Rows that produced at least one successful value write.
    pub updated: usize,
    /// Rows skipped for lacking a key (blank rows are common in tabular
    /// sources; this is accounting, not an error).
    pub skipped: usize,
    /// Accumulated warnings, in discovery order.
    pub warnings: Vec<ImportWarning>,
}
