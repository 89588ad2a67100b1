//! Per-column configuration overrides

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::model::Align;
use crate::model::ColumnType;
use crate::model::RowObject;

/// Overrides keyed by column name, in configuration order.
pub type ColumnOverrides = IndexMap<String, ColumnOverride>;

/// Attributes merged over an inferred column. Every provided key wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColumnOverride {
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub column_type: Option<ColumnType>,
    /// Force the column visible.
    pub visible: Option<bool>,
    pub invisible: Option<bool>,
    /// Force the column editable.
    pub enabled: Option<bool>,
    pub disabled: Option<bool>,
    pub sortable: Option<bool>,
    pub decimals: Option<u32>,
    pub align: Option<Align>,
    /// Names of registered validation rules.
    pub rules: Option<RuleNames>,
    pub lookup: Option<LookupOverride>,
    pub no_lookup: bool,
    pub default_previous: bool,
    pub default: Option<Value>,
}

/// One rule name or a list of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleNames {
    One(String),
    Many(Vec<String>),
}

impl RuleNames {
    pub fn names(&self) -> Vec<String> {
        match self {
            Self::One(name) => vec![name.clone()],
            Self::Many(names) => names.clone(),
        }
    }
}

/// Lookup configured on a column.
///
/// Columns naming the same lookup share it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LookupOverride {
    pub name: Option<String>,
    pub ref_table: Option<String>,
    #[serde(rename = "API", alias = "api")]
    pub api: Option<String>,
    pub options: Option<Vec<RowObject>>,
}
