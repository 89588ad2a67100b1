//! Foreign-key naming conventions

use crate::model::Column;

const ID_SUFFIX: &str = "_id";
const ID_VAL_SUFFIX: &str = "_id_val";
const DISABLED_MARKER: &str = "_disabled_";

/// Splits `table__field` into `(Some(table), field)`.
pub fn split_ref_table(name: &str) -> (Option<&str>, &str) {
    match name.find("__") {
        Some(pos) if pos > 0 => (Some(&name[..pos]), &name[pos + 2..]),
        _ => (None, name),
    }
}

/// Lookup key of an `_id` or `_id_val` column name.
pub fn lookup_key(name: &str) -> Option<&str> {
    name.strip_suffix(ID_VAL_SUFFIX).or_else(|| name.strip_suffix(ID_SUFFIX))
}

/// Whether `name` is the label half of a lookup pair.
pub fn is_display_name(name: &str) -> bool {
    name.ends_with(ID_VAL_SUFFIX)
}

/// Sentence-case label of a column name, `_id`/`_id_val` removed.
pub fn derive_label(name: &str) -> String {
    let base = lookup_key(name).unwrap_or(name);
    let spaced = base.replace('_', " ");
    let mut chars = spaced.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Strips the force-disabled marker. Returns whether it was present.
pub fn strip_disabled_marker(column: &mut Column) -> bool {
    if !column.name.contains(DISABLED_MARKER) {
        return false;
    }
    column.name = column.name.replace(DISABLED_MARKER, "");
    column.label = column.label.replace(" disabled", "").trim().to_string();
    true
}

/// Swaps each `X_id` column with its `X_id_val` sibling so the label
/// column takes the id column's place.
///
/// Every column takes part in at most one swap, so repeated calls leave the
/// order unchanged. When several `X_id_val` columns exist, an `X_id` column
/// pairs with the first unswapped one in list order.
pub fn swap_id_and_val_columns(columns: &mut [Column]) {
    for i in 0..columns.len() {
        if columns[i].swapped || !columns[i].name.ends_with(ID_SUFFIX) {
            continue;
        }
        let sibling = format!("{}_val", columns[i].name);
        let found = columns
            .iter()
            .position(|c| !c.swapped && c.name == sibling);
        if let Some(j) = found {
            columns.swap(i, j);
            columns[i].swapped = true;
            columns[j].swapped = true;
        }
    }
}
