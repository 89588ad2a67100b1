//! `{{variable}}` substitution in action descriptors

use serde_json::Value;

use crate::model::RowObject;
use crate::model::value_text;

const GLOBAL_PREFIX: &str = "store.globalValues.";
const CONTEXT_PREFIX: &str = "store.contextValues.";
/// Descriptor key whose object is merged into the global values.
pub const GLOBAL_ASSIGNMENT_KEY: &str = "store.globalValues";
/// Nested action lists are substituted when they run, not before.
const SKIPPED_KEY: &str = "rowActions";

/// Values visible to a substitution.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    pub row: RowObject,
    pub globals: RowObject,
    pub context: RowObject,
}

impl Variables {
    pub fn new(row: RowObject) -> Self {
        Self {
            row,
            ..Self::default()
        }
    }

    pub fn with_globals(mut self, globals: RowObject) -> Self {
        self.globals = globals;
        self
    }

    pub fn with_context(mut self, context: RowObject) -> Self {
        self.context = context;
        self
    }

    fn replace(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (key, value) in &self.row {
            out = out.replace(&format!("{{{{{}}}}}", key), &value_text(value));
        }
        for (key, value) in &self.globals {
            out = out.replace(&format!("{{{{{}{}}}}}", GLOBAL_PREFIX, key), &value_text(value));
        }
        for (key, value) in &self.context {
            out = out.replace(&format!("{{{{{}{}}}}}", CONTEXT_PREFIX, key), &value_text(value));
        }
        out
    }
}

/// Substitutes every string in `obj`, descending into nested objects and
/// arrays but never into `rowActions`.
///
/// Returns the `store.globalValues` objects found, already substituted, for
/// the caller to merge into the global values.
pub fn substitute(obj: &mut RowObject, vars: &Variables) -> Vec<RowObject> {
    let mut assignments = Vec::new();
    substitute_object(obj, vars, &mut assignments);
    assignments
}

fn substitute_object(obj: &mut RowObject, vars: &Variables, assignments: &mut Vec<RowObject>) {
    for (key, value) in obj.iter_mut() {
        if key == SKIPPED_KEY {
            continue;
        }
        substitute_value(value, vars, assignments);
        if key == GLOBAL_ASSIGNMENT_KEY {
            if let Value::Object(values) = value {
                assignments.push(values.clone());
            }
        }
    }
}

fn substitute_value(value: &mut Value, vars: &Variables, assignments: &mut Vec<RowObject>) {
    match value {
        Value::String(text) if text.contains("{{") => *text = vars.replace(text),
        Value::Object(obj) => substitute_object(obj, vars, assignments),
        Value::Array(items) => {
            for item in items {
                substitute_value(item, vars, assignments);
            }
        }
        _ => {}
    }
}
