//! Tabular import: maps loosely-typed rows into a collection's locale tables.
mod report;
mod row;

use std::borrow::Cow;
use std::collections::HashSet;

use serde::{
    Deserialize,
    Serialize,
};

pub use report::{
    ImportReport,
    ImportWarning,
};
pub use row::{
    FieldAccess,
    FieldValue,
    JsonRow,
    json_rows,
};

use crate::error::ImportError;
use crate::store::{
    CollectionHandle,
    StoreError,
};
use crate::types::LocaleId;

/// One column-to-locale mapping of an import configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocaleMapping {
    /// Column name in the tabular source (e.g. `"KR"`).
    pub source_column: String,
    /// Target locale (e.g. `"ko"`).
    pub locale: LocaleId,
}

impl LocaleMapping {
    /// Convenience constructor.
    #[must_use]
    pub fn new(source_column: impl Into<String>, locale: impl Into<LocaleId>) -> Self {
        Self { source_column: source_column.into(), locale: locale.into() }
    }
}

/// Imports `rows` into `target`, mapping `key_column` to key names and each
/// entry of `mappings` to one locale table.
///
/// Row-level problems never abort the run: blank-key rows are counted as
/// `skipped`, mappings whose column is absent from a row are skipped
/// silently, and mappings targeting an unprovisioned locale are skipped with
/// a [`ImportWarning::MissingLocaleTable`] warning (locale tables are never
/// created here). Re-running the same import is idempotent: keys keep their
/// ids and values settle to the same state.
///
/// # Errors
/// - [`ImportError::InvalidSchema`] when `key_column` is not a field of the
///   row schema, checked once against the first row before the loop.
pub fn import<R: FieldAccess>(
    rows: &[R],
    key_column: &str,
    mappings: &[LocaleMapping],
    target: &CollectionHandle,
) -> Result<ImportReport, ImportError> {
    tracing::debug!(
        collection = %target.name(),
        rows = rows.len(),
        mappings = mappings.len(),
        "starting tabular import"
    );

    if let Some(first) = rows.first() {
        if !first.has_field(key_column) {
            return Err(ImportError::InvalidSchema(key_column.to_string()));
        }
    }

    let mut report = ImportReport::default();
    flag_duplicate_locales(mappings, &mut report);

    let mut missing_locales: HashSet<LocaleId> = HashSet::new();

    for (row_index, row) in rows.iter().enumerate() {
        let key = match row.field(key_column) {
            FieldValue::Text(text) if !text.is_empty() => text.into_owned(),
            // Blank or valueless key: skip the row, not an error.
            FieldValue::Absent | FieldValue::Null | FieldValue::Text(_) => {
                report.skipped += 1;
                continue;
            }
        };

        // Non-empty by construction, so this cannot fail; stay row-scoped if
        // it ever does.
        let Ok(entry) = target.ensure_key(&key) else {
            report.skipped += 1;
            continue;
        };

        let mut row_updated = false;
        for mapping in mappings {
            let value: Cow<'_, str> = match row.field(&mapping.source_column) {
                // Not every row schema carries every locale column.
                FieldValue::Absent => continue,
                FieldValue::Null => Cow::Borrowed(""),
                FieldValue::Text(text) => text,
            };

            match target.set_value(&mapping.locale, entry.id, value) {
                Ok(()) => row_updated = true,
                Err(StoreError::UnprovisionedLocale(locale)) => {
                    if missing_locales.insert(locale.clone()) {
                        report.warnings.push(ImportWarning::MissingLocaleTable {
                            locale,
                            row_index,
                        });
                    }
                }
                Err(error @ StoreError::UnregisteredKey(_)) => {
                    // Unreachable after ensure_key; keep the run alive anyway.
                    tracing::warn!(%error, row_index, "value write rejected");
                }
            }
        }

        if row_updated {
            report.updated += 1;
        }
    }

    if report.warnings.is_empty() {
        tracing::debug!(
            collection = %target.name(),
            updated = report.updated,
            skipped = report.skipped,
            "import finished"
        );
    } else {
        tracing::warn!(
            collection = %target.name(),
            updated = report.updated,
            skipped = report.skipped,
            warnings = report.warnings.len(),
            "import finished with warnings"
        );
    }
    Ok(report)
}

/// Imports a JSON document of row objects. See [`import`].
///
/// # Errors
/// [`ImportError::SourceUnreadable`] when `source` is not an array of
/// objects, plus the conditions of [`import`].
pub fn import_json(
    source: &serde_json::Value,
    key_column: &str,
    mappings: &[LocaleMapping],
    target: &CollectionHandle,
) -> Result<ImportReport, ImportError> {
    let rows = json_rows(source)?;
    import(&rows, key_column, mappings, target)
}

/// Records one [`ImportWarning::DuplicateLocaleMapping`] per locale that is
/// targeted more than once, in first-occurrence order. Last write still wins
/// per row; the warning exists because the duplication is almost always a
/// configuration mistake.
fn flag_duplicate_locales(mappings: &[LocaleMapping], report: &mut ImportReport) {
    let mut seen: HashSet<&LocaleId> = HashSet::new();
    let mut flagged: HashSet<&LocaleId> = HashSet::new();
    for mapping in mappings {
        if !seen.insert(&mapping.locale) && flagged.insert(&mapping.locale) {
            report
                .warnings
                .push(ImportWarning::DuplicateLocaleMapping { locale: mapping.locale.clone() });
        }
    }
}
