//! Conversions between table rows and form objects

use serde_json::Value;

use super::EditMode;
use crate::api::SaveResult;
use crate::columns::ParentContext;
use crate::error::FieldValidationError;
use crate::error::ValidationError;
use crate::model::Column;
use crate::model::ColumnIndex;
use crate::model::Encoding;
use crate::model::Row;
use crate::model::RowObject;
use crate::model::is_truthy;

/// Columns the server stamps on insert.
const SERVER_STAMPED: [&str; 3] = ["time_created", "time_modified", "user_modified"];

/// A new form row: `{}` for json columns, `false` for booleans, the
/// configured default where one exists and null otherwise.
///
/// The parent key, if any, is pre-seeded with the master value.
pub fn create_empty_row(columns: &[Column], parent: Option<&ParentContext>) -> RowObject {
    let mut row = RowObject::new();
    for col in columns {
        let value = if let Some(default) = &col.default_value {
            default.clone()
        } else if col.is_json() {
            Value::String("{}".to_string())
        } else if col.is_boolean() {
            Value::Bool(false)
        } else {
            Value::Null
        };
        row.insert(col.name.clone(), value);
    }
    if let Some(parent) = parent {
        row.insert(parent.key.clone(), parent.value.clone());
    }
    row
}

/// Reads a table row into named-property form.
pub fn row_to_object(row: &Row, columns: &[Column]) -> RowObject {
    columns
        .iter()
        .map(|col| (col.name.clone(), row.value(&col.index)))
        .collect()
}

/// Form snapshot of a row: structured values of json columns become text.
pub fn edit_snapshot(row: &Row, columns: &[Column]) -> RowObject {
    let mut obj = row_to_object(row, columns);
    for col in columns.iter().filter(|c| c.is_json()) {
        if let Some(value) = obj.get_mut(&col.name) {
            if value.is_object() || value.is_array() {
                *value = Value::String(value.to_string());
            }
        }
    }
    obj
}

/// Normalizes form values before sending.
///
/// Json text is parsed, booleans become strict booleans and empty strings
/// become null. Unparseable json fails for that field.
pub fn prepare_row(row: &mut RowObject, columns: &[Column]) -> Result<(), ValidationError> {
    let mut errors = Vec::new();
    for col in columns {
        let Some(value) = row.get_mut(&col.name) else {
            continue;
        };
        if col.is_json() {
            if let Value::String(text) = value {
                if text.trim().is_empty() {
                    *value = Value::Null;
                } else {
                    match serde_json::from_str(text) {
                        Ok(parsed) => *value = parsed,
                        Err(e) => errors.push(FieldValidationError::with_rule(
                            col.name.clone(),
                            format!("Invalid JSON: {}", e),
                            "json",
                        )),
                    }
                }
            }
            continue;
        }
        if col.is_boolean() {
            *value = Value::Bool(is_truthy(value));
            continue;
        }
        if value.as_str() == Some("") {
            *value = Value::Null;
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(errors))
    }
}

/// Runs every column's rules against the form.
pub fn validate_row(row: &RowObject, columns: &[Column]) -> Result<(), ValidationError> {
    let errors: Vec<FieldValidationError> = columns
        .iter()
        .flat_map(|col| {
            let value = row.get(&col.name).cloned().unwrap_or(Value::Null);
            col.rules
                .iter()
                .filter_map(move |rule| {
                    rule.check(&value)
                        .err()
                        .map(|message| FieldValidationError::with_rule(col.name.clone(), message, rule.name.clone()))
                })
                .collect::<Vec<_>>()
        })
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(errors))
    }
}

/// Clears the server-stamped columns of a row about to be inserted.
pub fn clear_server_stamps(row: &mut RowObject) {
    for name in SERVER_STAMPED {
        if row.contains_key(name) {
            row.insert(name.to_string(), Value::Null);
        }
    }
}

/// Encodes a form object as a table row.
///
/// Plain rows keep properties that have no column.
pub fn create_row_for_table(obj: &RowObject, columns: &[Column], encoding: Encoding) -> Row {
    let mut row = match encoding {
        Encoding::Compact => Row::Compact(vec![Value::Null; columns.len()]),
        Encoding::Plain => Row::Plain(obj.clone()),
    };
    for col in columns {
        let value = obj.get(&col.name).cloned().unwrap_or(Value::Null);
        row.set(&col.index, value);
    }
    row
}

/// Patches a saved row with the server's answer.
///
/// An echoed object overwrites the columns it names; a bare key fills the
/// key column of an inserted row.
pub fn apply_save_result(row: &mut Row, columns: &[Column], key_index: &ColumnIndex, result: &SaveResult, mode: EditMode) {
    match result {
        SaveResult::Echo(obj) => {
            for (name, value) in obj {
                match columns.iter().find(|c| &c.name == name) {
                    Some(col) => row.set(&col.index, value.clone()),
                    None => {
                        if let Row::Plain(plain) = row {
                            plain.insert(name.clone(), value.clone());
                        }
                    }
                }
            }
        }
        SaveResult::Key(key) if mode == EditMode::Add => row.set(key_index, key.clone()),
        SaveResult::Key(_) | SaveResult::Empty => {}
    }
}
