//! Per-column row filters

use std::cmp::Ordering;

use indexmap::IndexMap;
use serde_json::Value;

use crate::model::Column;
use crate::model::FilterOp;
use crate::model::Row;
use crate::model::as_number;
use crate::model::loose_eq;
use crate::model::value_text;

/// Filter on one column. Inactive until an operand is set.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnFilter {
    pub op: FilterOp,
    pub value: Value,
    /// Upper bound of `between`.
    pub value2: Value,
}

impl ColumnFilter {
    pub fn new(op: FilterOp) -> Self {
        Self {
            op,
            value: Value::Null,
            value2: Value::Null,
        }
    }

    pub fn is_active(&self) -> bool {
        is_set(&self.value) || (self.op == FilterOp::Between && is_set(&self.value2))
    }

    pub fn matches(&self, column: &Column, cell: &Value) -> bool {
        match self.op {
            FilterOp::Equals => !is_set(&self.value) || loose_eq(cell, &self.value),
            FilterOp::Contains => {
                let needle = value_text(&self.value).to_lowercase();
                needle.is_empty() || column.format(cell).to_lowercase().contains(&needle)
            }
            FilterOp::Between => {
                if cell.is_null() {
                    return !self.is_active();
                }
                let above = !is_set(&self.value) || compare_bound(cell, &self.value) != Ordering::Less;
                let below = !is_set(&self.value2) || compare_bound(cell, &self.value2) != Ordering::Greater;
                above && below
            }
        }
    }
}

fn is_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Numbers compare numerically. Text compares on the bound's length, so a
/// date bound covers every timestamp of that day.
fn compare_bound(cell: &Value, bound: &Value) -> Ordering {
    if let (Value::Number(_), Some(a), Some(b)) = (cell, as_number(cell), as_number(bound)) {
        return a.partial_cmp(&b).unwrap_or(Ordering::Equal);
    }
    let cell = value_text(cell);
    let bound = value_text(bound);
    let prefix: String = cell.chars().take(bound.chars().count()).collect();
    prefix.cmp(&bound)
}

/// Filters of a table, by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    filters: IndexMap<String, ColumnFilter>,
}

impl Filters {
    /// One inactive filter per column with the column type's default operator.
    pub fn for_columns(columns: &[Column]) -> Self {
        Self {
            filters: columns
                .iter()
                .map(|c| (c.name.clone(), ColumnFilter::new(c.column_type.default_filter())))
                .collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&ColumnFilter> {
        self.filters.get(column)
    }

    /// Sets the operands of a column's filter. Unknown columns are ignored.
    pub fn set(&mut self, column: &str, value: Value, value2: Value) {
        match self.filters.get_mut(column) {
            Some(filter) => {
                filter.value = value;
                filter.value2 = value2;
            }
            None => log::debug!("no filter for column '{}'", column),
        }
    }

    pub fn set_op(&mut self, column: &str, op: FilterOp) {
        if let Some(filter) = self.filters.get_mut(column) {
            filter.op = op;
        }
    }

    pub fn is_active(&self) -> bool {
        self.filters.values().any(ColumnFilter::is_active)
    }

    pub fn matches(&self, row: &Row, columns: &[Column]) -> bool {
        columns.iter().all(|col| match self.filters.get(&col.name) {
            Some(filter) if filter.is_active() => filter.matches(col, &row.value(&col.index)),
            _ => true,
        })
    }
}
