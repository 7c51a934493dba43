//! Schema-generic row access.
//!
//! The importer never knows the concrete row type at compile time; rows only
//! need to expose named-field access through [`FieldAccess`]. The stock
//! adapter is [`JsonRow`] over `serde_json` objects, covering any source a
//! host can dump to JSON.

use std::borrow::Cow;

use serde_json::Value;

use crate::error::ImportError;

/// The value of one named field of a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue<'a> {
    /// The row schema has no such field.
    Absent,
    /// The field exists but holds no value.
    Null,
    /// The field's value, converted to text.
    Text(Cow<'a, str>),
}

/// Capability interface for named-field access on a row.
///
/// Implement this per concrete row type; the importer operates exclusively
/// through it.
pub trait FieldAccess {
    /// Reads the field named `name`.
    fn field(&self, name: &str) -> FieldValue<'_>;

    /// Whether `name` is a field of this row's schema. A field can exist and
    /// still yield [`FieldValue::Null`].
    fn has_field(&self, name: &str) -> bool;
}

/// A row backed by one JSON object.
#[derive(Debug, Clone, Copy)]
pub struct JsonRow<'a> {
    /// The object's fields.
    fields: &'a serde_json::Map<String, Value>,
}

impl FieldAccess for JsonRow<'_> {
    fn field(&self, name: &str) -> FieldValue<'_> {
        match self.fields.get(name) {
            None => FieldValue::Absent,
            Some(Value::Null) => FieldValue::Null,
            Some(Value::String(text)) => FieldValue::Text(Cow::Borrowed(text)),
            // Numbers and booleans are stringified, same as cells typed as
            // such in a spreadsheet export.
            Some(other) => FieldValue::Text(Cow::Owned(other.to_string())),
        }
    }

    fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
}

/// Interprets a JSON document as a sequence of rows.
///
/// # Errors
/// [`ImportError::SourceUnreadable`] unless `source` is an array whose every
/// element is an object. Checked in full before returning, so the importer
/// never aborts mid-loop on a malformed element.
pub fn json_rows(source: &Value) -> Result<Vec<JsonRow<'_>>, ImportError> {
    let Value::Array(elements) = source else {
        return Err(ImportError::SourceUnreadable(format!(
            "expected an array of row objects, got {}",
            json_kind(source)
        )));
    };

    elements
        .iter()
        .enumerate()
        .map(|(index, element)| {
            element.as_object().map(|fields| JsonRow { fields }).ok_or_else(|| {
                ImportError::SourceUnreadable(format!(
                    "row {index} is not an object (got {})",
                    json_kind(element)
                ))
            })
        })
        .collect()
}

/// Human-readable JSON value kind for error messages.
const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use googletest::prelude::*;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[googletest::test]
    fn object_fields_are_read_as_text() {
        let doc = json!([{ "Key": "hello", "Count": 3, "Flag": true, "Empty": null }]);
        let rows = json_rows(&doc).unwrap();
        let row = rows.first().unwrap();

        expect_that!(row.field("Key"), eq(&FieldValue::Text(Cow::Borrowed("hello"))));
        expect_that!(row.field("Count"), eq(&FieldValue::Text(Cow::Owned("3".to_string()))));
        expect_that!(row.field("Flag"), eq(&FieldValue::Text(Cow::Owned("true".to_string()))));
        expect_that!(row.field("Empty"), eq(&FieldValue::Null));
        expect_that!(row.field("Nope"), eq(&FieldValue::Absent));
    }

    #[googletest::test]
    fn has_field_distinguishes_null_from_absent() {
        let doc = json!([{ "Empty": null }]);
        let rows = json_rows(&doc).unwrap();
        let row = rows.first().unwrap();

        expect_that!(row.has_field("Empty"), eq(true));
        expect_that!(row.has_field("Nope"), eq(false));
    }

    #[rstest]
    #[case::object(json!({"Key": "hello"}))]
    #[case::string(json!("rows"))]
    #[case::number(json!(1))]
    fn non_array_source_is_unreadable(#[case] doc: Value) {
        let result = json_rows(&doc);

        assert_that!(result, err(matches_pattern!(ImportError::SourceUnreadable(_))));
    }

    #[googletest::test]
    fn non_object_row_is_unreadable() {
        let doc = json!([{ "Key": "a" }, "not a row"]);

        let result = json_rows(&doc);

        assert_that!(
            result,
            err(matches_pattern!(ImportError::SourceUnreadable(contains_substring("row 1"))))
        );
    }

    #[googletest::test]
    fn empty_array_is_a_valid_empty_source() {
        let doc = json!([]);

        let rows = json_rows(&doc).unwrap();

        expect_that!(rows.len(), eq(0));
    }
}
