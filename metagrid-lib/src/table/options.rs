//! Table configuration

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::action::Action;
use crate::action::ActionKind;
use crate::api::DataSource;
use crate::columns::ColumnOverrides;
use crate::columns::ParentContext;
use crate::error::Error;
use crate::model::RowObject;
use crate::registry::FunctionRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    #[default]
    None,
    Single,
    Multiple,
}

/// A named parameter scoping the table's request, remembered across sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContextValue {
    pub name: String,
    pub label: Option<String>,
    pub value: Value,
    /// Parameter lookup providing the options.
    pub lookup: Option<String>,
    pub options: Vec<RowObject>,
    pub option_value: Option<String>,
    pub option_label: Option<String>,
}

/// How a table view is configured.
///
/// Exactly one of `db_function`, `rest_api` and `table_api` selects the data
/// source, checked in that order. Only `table_api` tables are editable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableOptions {
    pub title: Option<String>,
    pub db_function: Option<String>,
    #[serde(rename = "restAPI")]
    pub rest_api: Option<String>,
    #[serde(rename = "tableAPI")]
    pub table_api: Option<String>,
    /// Fetch a single row of the table by this key.
    #[serde(rename = "tableAPIKey")]
    pub table_api_key: Option<String>,
    pub frugal: bool,
    pub json: bool,
    pub preprocess: Option<String>,
    pub col_atts: ColumnOverrides,
    pub row_actions: Vec<RowObject>,
    pub table_actions: Vec<RowObject>,
    pub selection: SelectionMode,
    pub context_values: Vec<ContextValue>,
    pub master_key: Option<String>,
    pub master_value: Option<Value>,
    pub no_inline_editing: bool,
    pub allow_edit: bool,
    pub allow_new: bool,
    pub allow_delete: bool,
    /// Serve the table from the offline cache when the network is down.
    pub cacheable: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            title: None,
            db_function: None,
            rest_api: None,
            table_api: None,
            table_api_key: None,
            frugal: false,
            json: false,
            preprocess: None,
            col_atts: ColumnOverrides::new(),
            row_actions: Vec::new(),
            table_actions: Vec::new(),
            selection: SelectionMode::None,
            context_values: Vec::new(),
            master_key: None,
            master_value: None,
            no_inline_editing: false,
            allow_edit: true,
            allow_new: true,
            allow_delete: true,
            cacheable: false,
        }
    }
}

impl TableOptions {
    /// Reads options from their JSON form.
    pub fn from_value(value: Value) -> Result<Self, Error> {
        Ok(serde_json::from_value(value)?)
    }

    /// Where the rows come from: `dbFunction`, then `restAPI`, then `tableAPI`.
    pub fn source(&self) -> Option<DataSource> {
        if let Some(name) = &self.db_function {
            return Some(DataSource::DbFunction {
                name: name.clone(),
                frugal: self.frugal,
                json: self.json,
                preprocess: self.preprocess.clone(),
            });
        }
        if let Some(path) = &self.rest_api {
            return Some(DataSource::Rest { path: path.clone() });
        }
        self.table_api.as_ref().map(|name| DataSource::Table {
            name: name.clone(),
            key: self.table_api_key.clone(),
        })
    }

    /// Master key and value when this is a detail table.
    pub fn parent(&self) -> Option<ParentContext> {
        match (&self.master_key, &self.master_value) {
            (Some(key), Some(value)) => Some(ParentContext::new(key.clone(), value.clone())),
            _ => None,
        }
    }

    /// Parses `rowActions`.
    pub fn row_actions(&self) -> Result<Vec<Action>, Error> {
        self.row_actions.iter().cloned().map(Action::from_object).collect()
    }

    /// Parses `tableActions`.
    pub fn table_actions(&self) -> Result<Vec<Action>, Error> {
        self.table_actions.iter().cloned().map(Action::from_object).collect()
    }

    /// Checks that every action parses and names registered functions.
    pub fn validate(&self, functions: &FunctionRegistry) -> Result<(), Error> {
        for action in self.row_actions()?.iter().chain(self.table_actions()?.iter()) {
            match action.kind() {
                ActionKind::CustomFunction(name) if !functions.has_function(&name) => {
                    return Err(Error::UnknownFunction(name));
                }
                ActionKind::Chart(chart) => {
                    if let Some(name) = chart.preprocess.filter(|n| !functions.has_preprocessor(n)) {
                        return Err(Error::UnknownFunction(name));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_source_precedence() {
        let options = TableOptions::from_value(json!({
            "restAPI": "Person/List",
            "tableAPI": "person"
        }))
        .unwrap();
        assert_eq!(
            options.source(),
            Some(DataSource::Rest {
                path: "Person/List".to_string()
            })
        );

        let options = TableOptions::from_value(json!({"tableAPI": "person", "tableAPIKey": "7"})).unwrap();
        assert!(options.source().unwrap().is_table());
        assert!(options.allow_edit && options.allow_new && options.allow_delete);
        assert_eq!(TableOptions::default().source(), None);
    }

    #[test]
    fn test_parent_and_context_values() {
        let options = TableOptions::from_value(json!({
            "tableAPI": "field",
            "masterKey": "farm_id",
            "masterValue": 3,
            "selection": "multiple",
            "contextValues": [{"name": "year", "lookup": "years"}]
        }))
        .unwrap();
        assert_eq!(options.parent(), Some(ParentContext::new("farm_id", json!(3))));
        assert_eq!(options.selection, SelectionMode::Multiple);
        assert_eq!(options.context_values[0].lookup.as_deref(), Some("years"));
        assert!(options.context_values[0].value.is_null());
    }

    #[test]
    fn test_validate_checks_function_names() {
        let functions = FunctionRegistry::new();
        let options = TableOptions::from_value(json!({
            "rowActions": [{"customFunction": "archive"}]
        }))
        .unwrap();
        assert!(matches!(options.validate(&functions), Err(Error::UnknownFunction(name)) if name == "archive"));

        functions.register_function("archive", |_| async { Ok(()) }).unwrap();
        assert!(options.validate(&functions).is_ok());

        let options = TableOptions::from_value(json!({
            "tableActions": [{"chart": {"preprocess": "smooth"}}]
        }))
        .unwrap();
        assert!(options.validate(&functions).is_err());
    }
}
