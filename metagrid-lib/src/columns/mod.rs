//! Column inference from tabular payloads
//!
//! [`ColumnModel`] turns a dataset into an ordered column list: one column
//! per attribute (compact) or per key of the first row (plain), foreign-key
//! pairs detected from naming conventions and swapped so the label column
//! shows in place of the id, then visibility, editability and caller
//! overrides applied on top.

mod overrides;
mod pairing;

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

pub use overrides::ColumnOverride;
pub use overrides::ColumnOverrides;
pub use overrides::LookupOverride;
pub use overrides::RuleNames;
pub use pairing::derive_label;
pub use pairing::swap_id_and_val_columns;

use crate::model::Column;
use crate::model::ColumnIndex;
use crate::model::ColumnType;
use crate::model::Dataset;
use crate::model::Lookup;
use crate::model::RowObject;
use crate::model::ValueKind;
use crate::registry::RuleRegistry;

/// Columns the server maintains.
const SYSTEM_COLUMNS: [&str; 4] = ["id", "time_created", "time_modified", "user_modified"];

/// Master key/value of a detail table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentContext {
    pub key: String,
    pub value: Value,
}

impl ParentContext {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self { key: key.into(), value }
    }
}

/// Where a column's lookup comes from, before the shared instance exists.
#[derive(Debug, Default)]
struct LookupSpec {
    ref_table: Option<String>,
    api: Option<String>,
    options: Option<Vec<RowObject>>,
}

impl LookupSpec {
    fn merge(&mut self, other: &LookupOverride) {
        if other.ref_table.is_some() {
            self.ref_table = other.ref_table.clone();
        }
        if other.api.is_some() {
            self.api = other.api.clone();
        }
        if other.options.is_some() {
            self.options = other.options.clone();
        }
    }

    fn build(self, name: &str) -> Lookup {
        let mut lookup = Lookup::new(name);
        lookup.ref_table = self.ref_table;
        lookup.api = self.api;
        lookup.static_options = self.options;
        lookup
    }
}

/// Derives table columns from a dataset.
///
/// # Example
///
/// ```ignore
/// let columns = ColumnModel::new(ctx.rules())
///     .with_overrides(&options.col_atts)
///     .with_parent_key("site_id")
///     .build(&mut dataset);
/// ```
pub struct ColumnModel<'a> {
    rules: &'a RuleRegistry,
    overrides: Option<&'a ColumnOverrides>,
    parent_key: Option<&'a str>,
}

impl<'a> ColumnModel<'a> {
    pub fn new(rules: &'a RuleRegistry) -> Self {
        Self {
            rules,
            overrides: None,
            parent_key: None,
        }
    }

    pub fn with_overrides(mut self, overrides: &'a ColumnOverrides) -> Self {
        self.overrides = Some(overrides);
        self
    }

    pub fn with_parent_key(mut self, key: &'a str) -> Self {
        self.parent_key = Some(key);
        self
    }

    fn override_for(&self, name: &str) -> Option<&'a ColumnOverride> {
        self.overrides.and_then(|o| o.get(name))
    }

    /// Builds the column list.
    ///
    /// Null cells of `rating` columns in `dataset` are replaced by 0. An empty
    /// payload gives an empty list.
    pub fn build(&self, dataset: &mut Dataset) -> Vec<Column> {
        let mut columns = infer_columns(dataset);

        let mut lookup_keys: Vec<Option<String>> = Vec::with_capacity(columns.len());
        let mut specs: IndexMap<String, LookupSpec> = IndexMap::new();

        for col in &mut columns {
            let source = col.name.clone();
            let (ref_table, field) = pairing::split_ref_table(&source);
            col.name = field.to_string();

            let mut key = None;
            if let Some(table) = ref_table {
                col.ref_table = Some(table.to_string());
                key = pairing::lookup_key(&col.name).map(str::to_string);
                if let Some(k) = &key {
                    let spec = specs.entry(k.clone()).or_default();
                    spec.ref_table.get_or_insert_with(|| table.to_string());
                    col.display = pairing::is_display_name(&col.name);
                }
            }

            if let Some(ov) = self.override_for(&col.name) {
                if let Some(lookup) = &ov.lookup {
                    let name = lookup
                        .name
                        .clone()
                        .or_else(|| key.clone())
                        .or_else(|| pairing::lookup_key(&col.name).map(str::to_string))
                        .unwrap_or_else(|| col.name.clone());
                    specs.entry(name.clone()).or_default().merge(lookup);
                    col.display = col.display || col.name.ends_with("_val");
                    key = Some(name);
                }
                if ov.no_lookup {
                    key = None;
                    col.display = false;
                }
            }

            col.label = derive_label(&col.name);
            lookup_keys.push(key);
        }

        let shared: HashMap<String, Arc<Lookup>> = specs
            .into_iter()
            .map(|(name, spec)| {
                let lookup = Arc::new(spec.build(&name));
                (name, lookup)
            })
            .collect();
        for (col, key) in columns.iter_mut().zip(lookup_keys) {
            col.lookup = key.and_then(|k| shared.get(&k).cloned());
        }

        swap_id_and_val_columns(&mut columns);

        for col in &mut columns {
            // Overrides are keyed by the name as received, marker included.
            let key = col.name.clone();
            self.apply_defaults(col);
            if let Some(ov) = self.override_for(&key) {
                self.apply_override(col, ov);
            }
        }

        if let Some(parent) = self.parent_key {
            let display = format!("{}_val", parent);
            for col in columns.iter_mut().filter(|c| c.name == parent || c.name == display) {
                col.invisible = true;
                col.lookup = None;
            }
        }
        propagate_disabled(&mut columns);
        fill_ratings(&columns, dataset);

        log::debug!("built {} columns", columns.len());
        columns
    }

    fn apply_defaults(&self, col: &mut Column) {
        if SYSTEM_COLUMNS.contains(&col.name.as_str()) {
            col.disabled = true;
        }
        if col.name == "id" || col.name.ends_with("_id") {
            col.invisible = true;
        }
        if pairing::strip_disabled_marker(col) {
            col.disabled = true;
        }
    }

    fn apply_override(&self, col: &mut Column, ov: &ColumnOverride) {
        if let Some(label) = &ov.label {
            col.label = label.clone();
        }
        if let Some(column_type) = &ov.column_type {
            col.set_type(column_type.clone());
        }
        if let Some(invisible) = ov.invisible {
            col.invisible = invisible;
        }
        if let Some(visible) = ov.visible {
            col.invisible = !visible;
        }
        if let Some(disabled) = ov.disabled {
            col.disabled = disabled;
        }
        if let Some(enabled) = ov.enabled {
            col.disabled = !enabled;
        }
        if let Some(sortable) = ov.sortable {
            col.sortable = sortable;
        }
        if ov.decimals.is_some() {
            col.decimals = ov.decimals;
        }
        if let Some(align) = ov.align {
            col.align = align;
        }
        if let Some(rules) = &ov.rules {
            col.rules = self.rules.resolve(&rules.names());
        }
        if ov.default_previous {
            col.default_previous = true;
        }
        if ov.default.is_some() {
            col.default_value = ov.default.clone();
        }
    }
}

/// Infers one column per attribute (compact) or first-row key (plain).
fn infer_columns(dataset: &Dataset) -> Vec<Column> {
    match dataset {
        Dataset::Compact(compact) => compact
            .attributes
            .iter()
            .enumerate()
            .map(|(i, attr)| {
                let column_type = ColumnType::from_tag(attr.type_tag.as_deref().unwrap_or("string"));
                let mut col = Column::new(attr.name.clone(), column_type, ColumnIndex::Position(i));
                col.decimals = attr.decimals;
                col
            })
            .collect(),
        Dataset::Plain(rows) => {
            let Some(first) = rows.first() else {
                return Vec::new();
            };
            first
                .keys()
                .map(|key| {
                    let kind = rows
                        .iter()
                        .filter_map(|row| row.get(key).and_then(ValueKind::of))
                        .fold(None, |current, observed| Some(ValueKind::widen(current, observed)));
                    let tag = kind.map(|k| k.type_tag()).unwrap_or("string");
                    Column::new(key.clone(), ColumnType::from_tag(tag), ColumnIndex::Key(key.clone()))
                })
                .collect()
        }
    }
}

/// A disabled column disables its `<name>_val` sibling.
fn propagate_disabled(columns: &mut [Column]) {
    let disabled: Vec<String> = columns
        .iter()
        .filter(|c| c.disabled)
        .map(|c| format!("{}_val", c.name))
        .collect();
    for col in columns.iter_mut() {
        if disabled.contains(&col.name) {
            col.disabled = true;
        }
    }
}

fn fill_ratings(columns: &[Column], dataset: &mut Dataset) {
    let ratings: Vec<&ColumnIndex> = columns
        .iter()
        .filter(|c| c.column_type == ColumnType::Rating)
        .map(|c| &c.index)
        .collect();
    if ratings.is_empty() {
        return;
    }
    match dataset {
        Dataset::Compact(compact) => {
            for row in &mut compact.data {
                for index in &ratings {
                    if let ColumnIndex::Position(i) = index {
                        if let Some(cell) = row.get_mut(*i).filter(|v| v.is_null()) {
                            *cell = Value::from(0);
                        }
                    }
                }
            }
        }
        Dataset::Plain(rows) => {
            for row in rows {
                for index in &ratings {
                    if let ColumnIndex::Key(k) = index {
                        let cell = row.entry(k.clone()).or_insert(Value::Null);
                        if cell.is_null() {
                            *cell = Value::from(0);
                        }
                    }
                }
            }
        }
    }
}
