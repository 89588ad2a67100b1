//! Foreign-key lookups

use serde_json::Value;
use tokio::sync::OnceCell;

use super::RowObject;
use super::loose_eq;
use super::value_text;

/// Value field assumed when a lookup returns no rows.
pub const DEFAULT_VALUE_FIELD: &str = "id";
/// Label field assumed when a lookup returns no rows.
pub const DEFAULT_LABEL_FIELD: &str = "name";

/// Loaded options of a lookup.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LookupOptions {
    pub rows: Vec<RowObject>,
    pub value_field: String,
    pub label_field: String,
}

impl LookupOptions {
    /// Builds options, taking the value and label fields from the key order
    /// of the first row.
    ///
    /// A single-key row uses that key for both. No rows fall back to `id`/`name`.
    pub fn from_rows(rows: Vec<RowObject>) -> Self {
        let (value_field, label_field) = match rows.first() {
            Some(first) => {
                let mut keys = first.keys();
                match (keys.next(), keys.next()) {
                    (Some(value), Some(label)) => (value.clone(), label.clone()),
                    (Some(value), None) => (value.clone(), value.clone()),
                    _ => (DEFAULT_VALUE_FIELD.to_string(), DEFAULT_LABEL_FIELD.to_string()),
                }
            }
            None => (DEFAULT_VALUE_FIELD.to_string(), DEFAULT_LABEL_FIELD.to_string()),
        };
        Self {
            rows,
            value_field,
            label_field,
        }
    }

    /// Finds the option whose value loosely equals `value`.
    pub fn find(&self, value: &Value) -> Option<&RowObject> {
        self.rows
            .iter()
            .find(|row| row.get(&self.value_field).is_some_and(|v| loose_eq(v, value)))
    }

    /// The option value of the first row, if any.
    pub fn first_value(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.get(&self.value_field))
    }
}

/// The value-to-label resolution context of a foreign-key column.
///
/// Shared by reference (`Arc<Lookup>`) between the columns that use it.
/// Options are filled at most once; see [`crate::resolver::LookupResolver`].
#[derive(Debug)]
pub struct Lookup {
    pub name: String,
    /// Reference table for the generic lookup endpoint.
    pub ref_table: Option<String>,
    /// Dedicated REST endpoint returning the options.
    pub api: Option<String>,
    /// Options supplied with the table configuration.
    pub static_options: Option<Vec<RowObject>>,
    options: OnceCell<LookupOptions>,
}

impl Lookup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ref_table: None,
            api: None,
            static_options: None,
            options: OnceCell::new(),
        }
    }

    pub fn with_ref_table(mut self, ref_table: impl Into<String>) -> Self {
        self.ref_table = Some(ref_table.into());
        self
    }

    pub fn with_api(mut self, api: impl Into<String>) -> Self {
        self.api = Some(api.into());
        self
    }

    pub fn with_static_options(mut self, options: Vec<RowObject>) -> Self {
        self.static_options = Some(options);
        self
    }

    /// Returns `true` once options have been loaded, even if empty.
    pub fn is_loaded(&self) -> bool {
        self.options.initialized()
    }

    /// Loaded options, `None` until first load.
    pub fn options(&self) -> Option<&LookupOptions> {
        self.options.get()
    }

    pub(crate) fn cell(&self) -> &OnceCell<LookupOptions> {
        &self.options
    }
}

/// Resolves `value` to its label.
///
/// Null, unloaded lookups and unmatched values all give the empty label.
pub fn find_lookup_value(value: &Value, lookup: &Lookup) -> String {
    if value.is_null() {
        return String::new();
    }
    lookup
        .options()
        .and_then(|options| {
            options
                .find(value)
                .and_then(|row| row.get(&options.label_field))
                .map(value_text)
        })
        .unwrap_or_default()
}
