//! Value kinds and loose comparisons over schema-less JSON values

use serde_json::Value;

/// The native kind of a non-null cell value.
///
/// Plain datasets carry no type metadata, so column types are inferred from
/// the kinds observed in the rows.
///
/// | JSON value      | Kind         |
/// |-----------------|--------------|
/// | `true`/`false`  | `Boolean`    |
/// | number          | `Number`     |
/// | string          | `Text`       |
/// | array, object   | `Structured` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Boolean,
    Number,
    Text,
    Structured,
}

impl ValueKind {
    /// Returns the kind of `value`, or `None` for null.
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(Self::Boolean),
            Value::Number(_) => Some(Self::Number),
            Value::String(_) => Some(Self::Text),
            Value::Array(_) | Value::Object(_) => Some(Self::Structured),
        }
    }

    /// Merges an observed kind into the kind inferred so far.
    ///
    /// Disagreeing kinds widen to `Text`.
    pub fn widen(current: Option<Self>, observed: Self) -> Self {
        match current {
            None => observed,
            Some(kind) if kind == observed => kind,
            Some(_) => Self::Text,
        }
    }

    /// The type tag a column inferred with this kind carries.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::Text => "string",
            Self::Structured => "json",
        }
    }
}

/// Renders a value the way it is substituted into text.
///
/// Strings are used verbatim, null renders empty, everything else as JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Truthiness of a cell value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Numeric view of a value, following string-to-number coercion.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse().ok()
            }
        }
        _ => None,
    }
}

/// Loose equality used for key and lookup matching.
///
/// A number and its textual form are equal (`5 == "5"`), null only equals null.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Number(_) | Value::Bool(_), _) | (_, Value::Number(_) | Value::Bool(_)) => {
            match (as_number(a), as_number(b)) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        _ => a == b,
    }
}
