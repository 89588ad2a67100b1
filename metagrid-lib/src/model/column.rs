//! Column metadata

use std::sync::Arc;

use chrono::DateTime;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use super::ColumnIndex;
use super::Lookup;
use super::as_number;
use super::value_text;
use crate::registry::NamedRule;

const DATE_FORMAT: &str = "%d.%m.%Y";
const TIMESTAMP_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// Column type, parsed from the source type tag.
///
/// Unknown tags are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ColumnType {
    Boolean,
    Integer,
    Float,
    Numeric,
    DoublePrecision,
    Number,
    Text,
    #[default]
    String,
    Json,
    Date,
    Timestamp,
    Rating,
    Icon,
    Other(String),
}

impl ColumnType {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "boolean" | "bool" => Self::Boolean,
            "integer" | "int" | "bigint" | "smallint" => Self::Integer,
            "float" | "real" => Self::Float,
            "numeric" | "decimal" => Self::Numeric,
            "double precision" => Self::DoublePrecision,
            "number" => Self::Number,
            "text" => Self::Text,
            "string" | "character varying" | "varchar" => Self::String,
            "json" | "jsonb" | "object" => Self::Json,
            "date" => Self::Date,
            "timestamp with time zone" | "timestamp" | "timestamptz" => Self::Timestamp,
            "rating" => Self::Rating,
            "icon" => Self::Icon,
            _ => Self::Other(tag.to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Numeric => "numeric",
            Self::DoublePrecision => "double precision",
            Self::Number => "number",
            Self::Text => "text",
            Self::String => "character varying",
            Self::Json => "json",
            Self::Date => "date",
            Self::Timestamp => "timestamp with time zone",
            Self::Rating => "rating",
            Self::Icon => "icon",
            Self::Other(tag) => tag,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Integer | Self::Float | Self::Numeric | Self::DoublePrecision | Self::Number
        )
    }

    pub fn align(&self) -> Align {
        match self {
            t if t.is_numeric() => Align::Right,
            Self::Boolean => Align::Center,
            _ => Align::Left,
        }
    }

    pub fn compare(&self) -> CompareMode {
        match self {
            t if t.is_numeric() => CompareMode::Interval,
            Self::Date | Self::Timestamp => CompareMode::Interval,
            _ => CompareMode::String,
        }
    }

    /// Default filter operator for a column of this type.
    pub fn default_filter(&self) -> FilterOp {
        match self {
            Self::Timestamp => FilterOp::Between,
            Self::Integer
            | Self::Numeric
            | Self::Float
            | Self::DoublePrecision
            | Self::Boolean
            | Self::Rating => FilterOp::Equals,
            _ => FilterOp::Contains,
        }
    }

    /// Preferred display width.
    pub fn width(&self) -> Option<&'static str> {
        match self {
            Self::Integer => Some("60px"),
            Self::String => Some("150px"),
            Self::Text | Self::Json => Some("200px"),
            Self::DoublePrecision | Self::Number => Some("100px"),
            Self::Boolean => Some("50px"),
            _ => None,
        }
    }
}

impl Serialize for ColumnType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tag())
    }
}

impl<'de> Deserialize<'de> for ColumnType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Self::from_tag(&tag))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    Center,
    Right,
}

/// How column values are compared when filtering and sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
    String,
    Interval,
}

/// Filter operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "=")]
    Equals,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "between")]
    Between,
}

/// A table column.
///
/// Columns sharing a lookup hold the same `Arc<Lookup>`, so loading it
/// through one column makes the options visible through the other.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub label: String,
    pub column_type: ColumnType,
    pub index: ColumnIndex,
    pub decimals: Option<u32>,
    pub align: Align,
    pub compare: CompareMode,
    pub sortable: bool,
    pub disabled: bool,
    pub invisible: bool,
    pub lookup: Option<Arc<Lookup>>,
    pub ref_table: Option<String>,
    /// This column carries the label half of an `_id`/`_id_val` pair.
    pub display: bool,
    pub rules: Vec<NamedRule>,
    /// Remember the last saved value and offer it for new rows.
    pub default_previous: bool,
    pub default_value: Option<Value>,
    pub(crate) swapped: bool,
}

impl Column {
    /// A column with type-derived presentation defaults.
    pub fn new(name: impl Into<String>, column_type: ColumnType, index: ColumnIndex) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            align: column_type.align(),
            compare: column_type.compare(),
            column_type,
            index,
            decimals: None,
            sortable: true,
            disabled: false,
            invisible: false,
            lookup: None,
            ref_table: None,
            display: false,
            rules: Vec::new(),
            default_previous: false,
            default_value: None,
            swapped: false,
        }
    }

    /// Re-derives alignment and compare mode after a type change.
    pub fn set_type(&mut self, column_type: ColumnType) {
        self.align = column_type.align();
        self.compare = column_type.compare();
        self.column_type = column_type;
    }

    pub fn is_json(&self) -> bool {
        self.column_type == ColumnType::Json
    }

    pub fn is_boolean(&self) -> bool {
        self.column_type == ColumnType::Boolean
    }

    /// Whether the column gets a field in the row edit form.
    pub fn shown_in_edit(&self, parent_key: Option<&str>) -> bool {
        self.name != "id" && !self.name.ends_with("_val") && parent_key != Some(self.name.as_str())
    }

    /// Formats a cell value for display.
    pub fn format(&self, value: &Value) -> String {
        if value.is_null() {
            return String::new();
        }
        if let Some(decimals) = self.decimals {
            if let Some(n) = as_number(value) {
                return format!("{:.*}", decimals as usize, n);
            }
        }
        match self.column_type {
            ColumnType::Numeric => as_number(value)
                .map(|n| format!("{:.2}", n))
                .unwrap_or_else(|| value_text(value)),
            ColumnType::Date => format_date(value, DATE_FORMAT),
            ColumnType::Timestamp => format_date(value, TIMESTAMP_FORMAT),
            _ => value_text(value),
        }
    }
}

fn format_date(value: &Value, pattern: &str) -> String {
    let text = value_text(value);
    if let Ok(dt) = DateTime::parse_from_rfc3339(&text) {
        return dt.format(pattern).to_string();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M:%S%.f") {
        return dt.format(pattern).to_string();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S%.f") {
        return dt.format(pattern).to_string();
    }
    if let Ok(d) = NaiveDate::parse_from_str(&text, "%Y-%m-%d") {
        return d.format(DATE_FORMAT).to_string();
    }
    text
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_type_presentation() {
        assert_eq!(ColumnType::from_tag("double precision").align(), Align::Right);
        assert_eq!(ColumnType::from_tag("boolean").align(), Align::Center);
        assert_eq!(ColumnType::from_tag("character varying").align(), Align::Left);
        assert_eq!(ColumnType::from_tag("date").compare(), CompareMode::Interval);
        assert_eq!(ColumnType::from_tag("text").compare(), CompareMode::String);
        assert_eq!(ColumnType::from_tag("timestamp with time zone").default_filter(), FilterOp::Between);
        assert_eq!(ColumnType::from_tag("rating").default_filter(), FilterOp::Equals);
        assert_eq!(ColumnType::from_tag("geometry"), ColumnType::Other("geometry".to_string()));
    }

    #[test]
    fn test_format_numeric_and_decimals() {
        let mut col = Column::new("price", ColumnType::Numeric, ColumnIndex::Position(0));
        assert_eq!(col.format(&json!(3.14159)), "3.14");
        col.decimals = Some(3);
        assert_eq!(col.format(&json!("2.5")), "2.500");
        assert_eq!(col.format(&json!(null)), "");
    }

    #[test]
    fn test_format_dates() {
        let col = Column::new("day", ColumnType::Date, ColumnIndex::Position(0));
        assert_eq!(col.format(&json!("2024-03-05")), "05.03.2024");
        let col = Column::new("at", ColumnType::Timestamp, ColumnIndex::Position(0));
        assert_eq!(col.format(&json!("2024-03-05T10:20:30+01:00")), "05.03.2024 10:20:30");
    }

    #[test]
    fn test_shown_in_edit() {
        let col = Column::new("country_id_val", ColumnType::String, ColumnIndex::Position(1));
        assert!(!col.shown_in_edit(None));
        let col = Column::new("site_id", ColumnType::Integer, ColumnIndex::Position(2));
        assert!(col.shown_in_edit(None));
        assert!(!col.shown_in_edit(Some("site_id")));
    }
}
