//! Dataset encodings and rows

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

/// A row in named-property form.
pub type RowObject = Map<String, Value>;

/// A declared column of a compact dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    /// Source type tag, e.g. `integer` or `timestamp with time zone`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u32>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_tag: Some(type_tag.into()),
            decimals: None,
        }
    }
}

/// Compact ("frugal") encoding: one attribute list plus positional rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompactDataset {
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub data: Vec<Vec<Value>>,
}

impl CompactDataset {
    /// Expands positional rows into named-property objects.
    pub fn to_objects(&self) -> Vec<RowObject> {
        frugal_json_to_array(self)
    }
}

/// Converts a compact dataset into an array of row objects keyed by attribute name.
///
/// Short rows yield null for the missing trailing attributes.
pub fn frugal_json_to_array(data: &CompactDataset) -> Vec<RowObject> {
    data.data
        .iter()
        .map(|row| {
            data.attributes
                .iter()
                .enumerate()
                .map(|(i, attr)| (attr.name.clone(), row.get(i).cloned().unwrap_or(Value::Null)))
                .collect()
        })
        .collect()
}

/// Which encoding a table instance uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    Compact,
    Plain,
}

/// A tabular payload in either encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dataset {
    Compact(CompactDataset),
    Plain(Vec<RowObject>),
}

impl Dataset {
    /// Interprets a response body as a dataset.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Rebuilds a dataset from a table's rows.
    ///
    /// Rows not matching `encoding` are skipped.
    pub fn from_rows(encoding: Encoding, attributes: Vec<Attribute>, rows: &[Row]) -> Self {
        match encoding {
            Encoding::Compact => Self::Compact(CompactDataset {
                attributes,
                data: rows
                    .iter()
                    .filter_map(|row| match row {
                        Row::Compact(values) => Some(values.clone()),
                        Row::Plain(_) => None,
                    })
                    .collect(),
            }),
            Encoding::Plain => Self::Plain(
                rows.iter()
                    .filter_map(|row| match row {
                        Row::Plain(obj) => Some(obj.clone()),
                        Row::Compact(_) => None,
                    })
                    .collect(),
            ),
        }
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            Self::Compact(_) => Encoding::Compact,
            Self::Plain(_) => Encoding::Plain,
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        match self {
            Self::Compact(c) => c.data.len(),
            Self::Plain(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows in named-property form regardless of encoding.
    pub fn to_objects(&self) -> Vec<RowObject> {
        match self {
            Self::Compact(c) => c.to_objects(),
            Self::Plain(rows) => rows.clone(),
        }
    }

    /// Splits the dataset into its declared attributes and encoded rows.
    ///
    /// Plain datasets have no declared attributes.
    pub fn into_parts(self) -> (Encoding, Vec<Attribute>, Vec<Row>) {
        match self {
            Self::Compact(c) => (
                Encoding::Compact,
                c.attributes,
                c.data.into_iter().map(Row::Compact).collect(),
            ),
            Self::Plain(rows) => (Encoding::Plain, Vec::new(), rows.into_iter().map(Row::Plain).collect()),
        }
    }
}

/// Address of a column's value inside a row.
///
/// Compact rows are addressed by position, plain rows by key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnIndex {
    Position(usize),
    Key(String),
}

impl std::fmt::Display for ColumnIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Position(i) => write!(f, "{}", i),
            Self::Key(k) => f.write_str(k),
        }
    }
}

/// A single encoded row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Row {
    Compact(Vec<Value>),
    Plain(RowObject),
}

impl Row {
    pub fn get(&self, index: &ColumnIndex) -> Option<&Value> {
        match (self, index) {
            (Self::Compact(values), ColumnIndex::Position(i)) => values.get(*i),
            (Self::Plain(obj), ColumnIndex::Key(k)) => obj.get(k),
            _ => None,
        }
    }

    /// The value at `index`, null when absent.
    pub fn value(&self, index: &ColumnIndex) -> Value {
        self.get(index).cloned().unwrap_or(Value::Null)
    }

    /// Writes a value, growing compact rows with nulls as needed.
    ///
    /// Writing with an index of the other encoding is ignored.
    pub fn set(&mut self, index: &ColumnIndex, value: Value) {
        match (self, index) {
            (Self::Compact(values), ColumnIndex::Position(i)) => {
                if values.len() <= *i {
                    values.resize(*i + 1, Value::Null);
                }
                values[*i] = value;
            }
            (Self::Plain(obj), ColumnIndex::Key(k)) => {
                obj.insert(k.clone(), value);
            }
            _ => log::warn!("ignoring write through mismatched column index {}", index),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_frugal_json_to_array() {
        let data: CompactDataset = serde_json::from_value(json!({
            "attributes": [{"name": "id"}, {"name": "name"}],
            "data": [[1, "a"], [2, "b"]]
        }))
        .unwrap();

        let objects = frugal_json_to_array(&data);
        assert_eq!(
            Value::Array(objects.into_iter().map(Value::Object).collect()),
            json!([{"id": 1, "name": "a"}, {"id": 2, "name": "b"}])
        );
    }

    #[test]
    fn test_from_value_detects_encoding() {
        let compact = Dataset::from_value(json!({"attributes": [{"name": "id", "type": "integer"}], "data": [[1]]})).unwrap();
        assert_eq!(compact.encoding(), Encoding::Compact);
        assert_eq!(compact.len(), 1);

        let plain = Dataset::from_value(json!([{"id": 1}, {"id": 2}])).unwrap();
        assert_eq!(plain.encoding(), Encoding::Plain);
        assert_eq!(plain.len(), 2);

        assert!(Dataset::from_value(json!("nope")).is_err());
    }

    #[test]
    fn test_row_set_grows_compact_row() {
        let mut row = Row::Compact(vec![json!(1)]);
        row.set(&ColumnIndex::Position(3), json!("x"));
        assert_eq!(row, Row::Compact(vec![json!(1), json!(null), json!(null), json!("x")]));
        assert_eq!(row.value(&ColumnIndex::Key("id".into())), json!(null));
    }

    #[test]
    fn test_into_parts_round_trips_rows() {
        let dataset = Dataset::from_value(json!({"attributes": [{"name": "id"}], "data": [[1], [2]]})).unwrap();
        let (encoding, attributes, rows) = dataset.clone().into_parts();
        assert_eq!(Dataset::from_rows(encoding, attributes, &rows), dataset);
    }
}
