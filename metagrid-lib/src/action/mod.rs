//! Declarative row and table actions
//!
//! An action is a JSON descriptor attached to a table. Its kind is decided by
//! which key it carries, in fixed precedence (see [`ActionKind`]). String
//! fields may reference row fields and application values with `{{...}}`
//! placeholders, and a confirmation may depend on a condition expression.
//! Running actions is [`crate::table::TableController`]'s job.

pub mod condition;
mod substitute;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

pub use condition::ConditionScope;
pub use condition::evaluate;
pub use substitute::GLOBAL_ASSIGNMENT_KEY;
pub use substitute::Variables;
pub use substitute::substitute;

use crate::error::Error;
use crate::model::RowObject;
use crate::transport::Verb;

/// Confirmation asked only when `condition` holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionalConfirmation {
    pub condition: String,
    pub message: String,
}

/// Chart settings of a chart action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChartDescriptor {
    /// Remote procedure returning the chart data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_function: Option<String>,
    #[serde(rename = "restAPI", skip_serializing_if = "Option::is_none")]
    pub rest_api: Option<String>,
    pub frugal: bool,
    pub json: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Registered preprocessor applied to the data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preprocess: Option<String>,
    /// Display settings passed through to the chart.
    #[serde(flatten)]
    pub display: RowObject,
}

impl ChartDescriptor {
    /// Whether the chart fetches its own data instead of using table rows.
    pub fn retrieves_data(&self) -> bool {
        self.db_function.is_some() || self.rest_api.is_some()
    }
}

/// Typed view of an action descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionDescriptor {
    pub label: Option<String>,
    pub route: Option<String>,
    pub custom_function: Option<String>,
    #[serde(rename = "restAPI")]
    pub rest_api: Option<String>,
    /// Verb name, `get` when absent.
    pub method: Option<String>,
    pub params: Option<RowObject>,
    pub delete: bool,
    #[serde(rename = "tableAPI")]
    pub table_api: Option<String>,
    /// Table to clone the row in.
    #[serde(rename = "clone")]
    pub clone_table: Option<String>,
    /// Row field holding the key of the row to clone.
    pub key: Option<String>,
    pub chart: Option<ChartDescriptor>,
    pub component: Option<String>,
    pub popup: Option<String>,
    pub confirmation_message: Option<String>,
    pub conditional_confirmation_message: Option<ConditionalConfirmation>,
    pub reload: bool,
    pub no_row_delete: bool,
    /// Application collection to remove the deleted row from.
    pub delete_in_store: Option<String>,
    pub redirect: bool,
    pub must_select_rows: bool,
    pub key_for_keys: Option<String>,
}

/// What an action does, by precedence.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    Route(String),
    CustomFunction(String),
    Rest { path: String, verb: Verb },
    Delete,
    Clone(String),
    Chart(ChartDescriptor),
    /// Fallback: open a popup.
    Component { popup: String, component: Option<String> },
}

impl ActionDescriptor {
    pub fn verb(&self) -> Verb {
        self.method.as_deref().and_then(Verb::parse).unwrap_or_default()
    }

    /// Kind in precedence order: route, customFunction, restAPI, delete,
    /// clone, chart, component.
    pub fn kind(&self) -> ActionKind {
        if let Some(route) = &self.route {
            return ActionKind::Route(route.clone());
        }
        if let Some(name) = &self.custom_function {
            return ActionKind::CustomFunction(name.clone());
        }
        if let Some(path) = &self.rest_api {
            return ActionKind::Rest {
                path: path.clone(),
                verb: self.verb(),
            };
        }
        if self.delete {
            return ActionKind::Delete;
        }
        if let Some(table) = &self.clone_table {
            return ActionKind::Clone(table.clone());
        }
        if let Some(chart) = &self.chart {
            return ActionKind::Chart(chart.clone());
        }
        ActionKind::Component {
            popup: self.popup.clone().unwrap_or_else(|| "default".to_string()),
            component: self.component.clone(),
        }
    }
}

/// An action descriptor together with its raw JSON, which popups and
/// custom routes receive as properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub descriptor: ActionDescriptor,
    pub raw: RowObject,
}

impl Action {
    pub fn from_object(raw: RowObject) -> Result<Self, Error> {
        let descriptor = serde_json::from_value(Value::Object(raw.clone()))
            .map_err(|e| Error::InvalidAction(e.to_string()))?;
        Ok(Self { descriptor, raw })
    }

    pub fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Object(raw) => Self::from_object(raw),
            other => Err(Error::InvalidAction(format!("expected an object, got {}", other))),
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.descriptor.kind()
    }

    /// A copy with placeholders replaced, plus any global value assignments.
    pub fn substituted(&self, vars: &Variables) -> Result<(Self, Vec<RowObject>), Error> {
        let mut raw = self.raw.clone();
        let assignments = substitute(&mut raw, vars);
        Ok((Self::from_object(raw)?, assignments))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn action(value: Value) -> Action {
        Action::from_value(value).unwrap()
    }

    #[test]
    fn test_kind_precedence() {
        let a = action(json!({"route": "/x", "customFunction": "f", "restAPI": "p"}));
        assert_eq!(a.kind(), ActionKind::Route("/x".to_string()));

        let a = action(json!({"customFunction": "f", "restAPI": "p", "delete": true}));
        assert_eq!(a.kind(), ActionKind::CustomFunction("f".to_string()));

        let a = action(json!({"restAPI": "p", "method": "DELETE", "delete": true}));
        assert_eq!(
            a.kind(),
            ActionKind::Rest {
                path: "p".to_string(),
                verb: Verb::Delete
            }
        );

        let a = action(json!({"delete": true, "clone": "t", "chart": {}}));
        assert_eq!(a.kind(), ActionKind::Delete);

        let a = action(json!({"clone": "t", "chart": {}}));
        assert_eq!(a.kind(), ActionKind::Clone("t".to_string()));

        let a = action(json!({"chart": {"dbFunction": "api.yield", "type": "line"}}));
        match a.kind() {
            ActionKind::Chart(chart) => {
                assert!(chart.retrieves_data());
                assert_eq!(chart.display["type"], json!("line"));
            }
            other => panic!("unexpected kind {:?}", other),
        }

        let a = action(json!({"component": "person-card"}));
        assert_eq!(
            a.kind(),
            ActionKind::Component {
                popup: "default".to_string(),
                component: Some("person-card".to_string())
            }
        );
    }

    #[test]
    fn test_rejects_non_objects() {
        assert!(matches!(Action::from_value(json!("route")), Err(Error::InvalidAction(_))));
        assert!(matches!(Action::from_value(json!({"delete": "yes"})), Err(Error::InvalidAction(_))));
    }

    #[test]
    fn test_substituted_reparses() {
        let a = action(json!({"restAPI": "Person/{{id}}", "method": "delete"}));
        let vars = Variables::new(json!({"id": 5}).as_object().cloned().unwrap());
        let (done, _) = a.substituted(&vars).unwrap();
        assert_eq!(done.descriptor.rest_api.as_deref(), Some("Person/5"));
        assert_eq!(done.descriptor.verb(), Verb::Delete);
        assert_eq!(a.descriptor.rest_api.as_deref(), Some("Person/{{id}}"));
    }
}
