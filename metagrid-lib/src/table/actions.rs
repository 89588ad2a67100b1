use serde_json::Value;
use serde_json::json;

use super::DeletePrompt;
use super::SelectionMode;
use super::TableController;
use crate::action::Action;
use crate::action::ActionKind;
use crate::action::ChartDescriptor;
use crate::action::ConditionScope;
use crate::action::Variables;
use crate::action::evaluate;
use crate::action::substitute;
use crate::error::Error;
use crate::model::Column;
use crate::model::Dataset;
use crate::model::Row;
use crate::model::RowObject;
use crate::model::value_text;
use crate::registry::FunctionArgs;
use crate::surface::ChartRequest;
use crate::surface::PopupRequest;
use crate::surface::RouteRequest;
use crate::transport::ApiRequest;
use crate::transport::Verb;

const CLONED_MESSAGE: &str = "Record cloned. Table will be refreshed.";
const SELECT_ROWS_MESSAGE: &str = "Please select rows!";

/// Column metadata as handed to routes and popups.
fn columns_value(columns: &[Column]) -> Value {
    Value::Array(
        columns
            .iter()
            .map(|c| {
                json!({
                    "name": c.name,
                    "label": c.label,
                    "type": c.column_type,
                    "index": c.index,
                    "invisible": c.invisible,
                    "disabled": c.disabled,
                    "lookup": c.lookup.as_ref().map(|l| l.name.clone()),
                })
            })
            .collect(),
    )
}

fn objects_value(rows: &[RowObject]) -> Value {
    Value::Array(rows.iter().cloned().map(Value::Object).collect())
}

/// GET sends parameters as query, other verbs as a JSON body.
fn rest_request(verb: Verb, path: &str, params: RowObject) -> ApiRequest {
    match verb {
        Verb::Get => params
            .iter()
            .fold(ApiRequest::get(path), |request, (name, value)| {
                request.with_query(name.as_str(), value_text(value))
            }),
        _ => ApiRequest::new(verb, path).with_body(Value::Object(params)),
    }
}

impl TableController {
    fn variables(&self, row: RowObject) -> Variables {
        let ctx = self.context();
        Variables::new(row)
            .with_globals(ctx.global_values())
            .with_context(ctx.context_values())
    }

    /// Substitutes placeholders and applies `store.globalValues` assignments.
    fn prepare_action(&self, action: &Action, row: RowObject) -> Result<Action, Error> {
        let (action, assignments) = action.substituted(&self.variables(row))?;
        for values in &assignments {
            self.context().merge_global_values(values);
        }
        Ok(action)
    }

    fn object_rows(&self, rows: &[Row]) -> Vec<RowObject> {
        rows.iter().map(|r| self.state.row_object(r)).collect()
    }

    /// Row context added to route and popup properties.
    fn row_props(&self, props: &mut RowObject, row: Option<&RowObject>, rows: &[RowObject]) {
        let row = row.cloned().map(Value::Object).unwrap_or(Value::Null);
        let selected: Vec<RowObject> = self
            .selected_rows()
            .into_iter()
            .map(|r| self.state.row_object(r))
            .collect();
        props.insert("row".into(), row.clone());
        props.insert("rows".into(), objects_value(rows));
        props.insert("selectedRows".into(), objects_value(&selected));
        props.insert("columns".into(), columns_value(&self.state.columns));
        props.insert("editingRow".into(), row);
        props.insert(
            "editingRowIndex".into(),
            self.state.action_row.map(Value::from).unwrap_or(Value::Null),
        );
    }

    /// Plain and conditional confirmations. `false` means the user declined.
    async fn confirm_action(&self, action: &Action, row: Option<(&Row, &RowObject)>) -> Result<bool, Error> {
        let surface = self.context().surface();
        if let Some(message) = &action.descriptor.confirmation_message {
            if !surface.confirm(message).await {
                return Ok(false);
            }
        }
        if let Some(conditional) = &action.descriptor.conditional_confirmation_message {
            let empty_row = Row::Plain(RowObject::new());
            let empty_obj = RowObject::new();
            let (row, object) = row.unwrap_or((&empty_row, &empty_obj));
            let scope = ConditionScope {
                row,
                object,
                column_count: self.state.columns.len(),
            };
            if evaluate(&conditional.condition, &scope)? && !surface.confirm(&conditional.message).await {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Saves this view's state for back-navigation and navigates.
    async fn navigate(&self, action: &Action, route: &str, row: Option<&RowObject>, rows: &[RowObject]) {
        let ctx = self.context();
        ctx.save_view_state(self.route_path.clone(), self.state.clone());

        let mut request = match ctx.find_route(route) {
            Some(def) => {
                let mut props = def.props.clone();
                substitute(&mut props, &self.variables(row.cloned().unwrap_or_default()));
                RouteRequest {
                    path: def.path.clone(),
                    name: def.name.clone(),
                    component: def.component.clone(),
                    props,
                }
            }
            None => RouteRequest {
                path: route.to_string(),
                name: Some(route.to_string()),
                component: action.descriptor.component.clone(),
                props: action.raw.clone(),
            },
        };
        self.row_props(&mut request.props, row, rows);
        request.props.insert("backButton".into(), Value::Bool(true));
        ctx.surface().navigate(request).await;
    }

    async fn open_popup(&self, action: &Action, popup: String, row: Option<&RowObject>, rows: &[RowObject]) {
        let mut props = action.raw.clone();
        self.row_props(&mut props, row, rows);
        self.context()
            .surface()
            .open_popup(PopupRequest { name: popup, props })
            .await;
    }

    fn remove_from_collection(&self, action: &Action, row: &RowObject) {
        if let Some(collection) = &action.descriptor.delete_in_store {
            let id = row.get("id").cloned().unwrap_or(Value::Null);
            if !self.context().remove_from_collection(collection, &id) {
                log::debug!("row {} not in collection {}", value_text(&id), collection);
            }
        }
    }

    async fn call_function(&self, name: &str, action: &Action, rows: Vec<RowObject>) -> Result<(), Error> {
        let function = self.context().functions().function(name)?;
        function(FunctionArgs {
            action: action.raw.clone(),
            rows,
            columns: self.state.columns.clone(),
        })
        .await
    }

    // =========================================================================
    // Row actions
    // =========================================================================

    /// Runs a row action on row `index`.
    ///
    /// Declined confirmations end the action with no side effects.
    pub async fn run_row_action(&mut self, action: &Action, index: usize) -> Result<(), Error> {
        let row = self.row(index)?.clone();
        let obj = self.state.row_object(&row);
        let action = self.prepare_action(action, obj.clone())?;
        self.state.action_row = Some(index);

        if !self.confirm_action(&action, Some((&row, &obj))).await? {
            log::debug!("row action declined");
            return Ok(());
        }

        let all = self.object_rows(&self.state.rows);
        match action.kind() {
            ActionKind::Route(route) => self.navigate(&action, &route, Some(&obj), &all).await,
            ActionKind::CustomFunction(name) => self.call_function(&name, &action, vec![obj.clone()]).await?,
            ActionKind::Rest { path, verb } => {
                let params = action.descriptor.params.clone().unwrap_or_default();
                if let Some(ret) = self.api.call(rest_request(verb, &path, params)).await {
                    if verb == Verb::Delete && !action.descriptor.no_row_delete {
                        self.forget_row(index);
                        self.remove_from_collection(&action, &obj);
                        self.mirror().await;
                    } else if action.descriptor.redirect {
                        self.context().surface().open_url(&value_text(&ret)).await;
                    }
                }
            }
            ActionKind::Delete => {
                let table = match &action.descriptor.table_api {
                    Some(table) => table.clone(),
                    None => self.table_api()?,
                };
                let prompt = if action.descriptor.confirmation_message.is_some() {
                    DeletePrompt::Confirmed
                } else {
                    DeletePrompt::Ask
                };
                if self.delete_row_in(&table, index, prompt).await? {
                    self.remove_from_collection(&action, &obj);
                }
            }
            ActionKind::Clone(table) => {
                let field = action.descriptor.key.as_deref().unwrap_or("id");
                let key = obj.get(field).cloned().unwrap_or(Value::Null);
                if self.api.clone_row(&table, &key).await.is_some() {
                    self.context().surface().show_message(CLONED_MESSAGE).await;
                    self.reload().await;
                }
            }
            ActionKind::Chart(chart) => self.chart(&chart, &self.state.rows).await?,
            ActionKind::Component { popup, .. } => self.open_popup(&action, popup, Some(&obj), &all).await,
        }

        if action.descriptor.reload {
            self.reload().await;
        }
        Ok(())
    }

    // =========================================================================
    // Table actions
    // =========================================================================

    /// Runs a table action on the selected rows (multiple selection) or the
    /// filtered rows.
    pub async fn run_table_action(&mut self, action: &Action) -> Result<(), Error> {
        let rows: Vec<Row> = if self.state.options.selection == SelectionMode::Multiple {
            let selected: Vec<Row> = self.selected_rows().into_iter().cloned().collect();
            if action.descriptor.must_select_rows && selected.is_empty() {
                self.context().surface().show_message(SELECT_ROWS_MESSAGE).await;
                return Ok(());
            }
            selected
        } else {
            self.filtered_rows().into_iter().cloned().collect()
        };

        let action = self.prepare_action(action, RowObject::new())?;
        if !self.confirm_action(&action, None).await? {
            log::debug!("table action declined");
            return Ok(());
        }

        let objects = self.object_rows(&rows);
        match action.kind() {
            ActionKind::Route(route) => self.navigate(&action, &route, None, &objects).await,
            ActionKind::CustomFunction(name) => self.call_function(&name, &action, objects).await?,
            ActionKind::Rest { path, verb } => {
                let keys: Vec<Value> = match &action.descriptor.key_for_keys {
                    Some(field) => objects
                        .iter()
                        .map(|o| o.get(field).cloned().unwrap_or(Value::Null))
                        .collect(),
                    None => rows.iter().map(|r| self.state.row_key(r)).collect(),
                };
                let mut params = RowObject::new();
                params.insert("keys".into(), Value::Array(keys));
                for (name, value) in action.descriptor.params.clone().unwrap_or_default() {
                    params.insert(name, value);
                }
                if let Some(ret) = self.api.call(rest_request(verb, &path, params)).await {
                    if let Some(task) = ret.get("taskId").filter(|t| !t.is_null()) {
                        self.context().surface().show_progress(task).await;
                    }
                }
            }
            ActionKind::Delete | ActionKind::Clone(_) => {
                return Err(Error::InvalidAction("delete and clone act on a single row".to_string()));
            }
            ActionKind::Chart(chart) => self.chart(&chart, &rows).await?,
            ActionKind::Component { popup, .. } => self.open_popup(&action, popup, None, &objects).await,
        }

        if action.descriptor.reload {
            self.reload().await;
        }
        Ok(())
    }

    // =========================================================================
    // Charts
    // =========================================================================

    /// Publishes chart data: fetched through the chart's own source when it
    /// has one, otherwise `rows`.
    pub async fn chart(&self, chart: &ChartDescriptor, rows: &[Row]) -> Result<(), Error> {
        let data = if let Some(function) = &chart.db_function {
            let pars = chart.params.clone().unwrap_or_else(|| json!({}));
            let request = ApiRequest::get("Table/GetTable")
                .with_query("dbFunction", function.as_str())
                .with_query("frugal", chart.frugal.to_string())
                .with_query("json", chart.json.to_string())
                .with_query("pars", pars.to_string());
            match self.api.call(request).await {
                Some(body) => Dataset::from_value(body)?.to_objects(),
                None => return Ok(()),
            }
        } else if let Some(path) = &chart.rest_api {
            match self.api.get(path.as_str()).await {
                Some(body) => Dataset::from_value(body)?.to_objects(),
                None => return Ok(()),
            }
        } else {
            self.object_rows(rows)
        };

        let data = match &chart.preprocess {
            Some(name) => {
                let preprocess = self.context().functions().preprocessor(name)?;
                preprocess(data)
            }
            None => data,
        };
        let props = match serde_json::to_value(chart)? {
            Value::Object(props) => props,
            _ => RowObject::new(),
        };
        self.context()
            .surface()
            .show_chart(ChartRequest { props, data })
            .await;
        Ok(())
    }
}
