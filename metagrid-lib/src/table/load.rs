use serde_json::Value;

use super::Filters;
use super::TableController;
use super::TableOptions;
use super::TableState;
use crate::columns::ColumnModel;
use crate::error::Error;
use crate::model::ColumnIndex;
use crate::model::Encoding;
use crate::model::LookupOptions;
use crate::model::Row;
use crate::model::RowObject;
use crate::model::loose_eq;
use crate::response::CacheStatus;
use crate::store::LocalStore;

impl TableController {
    /// Opens the view.
    ///
    /// A state saved when navigating away from this route is restored as is.
    /// Otherwise the options are validated and applied, remembered context
    /// values loaded and the table fetched.
    pub async fn init(&mut self, options: TableOptions) -> Result<(), Error> {
        let ctx = self.context().clone();
        if let Some(saved) = ctx.take_view_state(&self.route_path) {
            log::debug!("restoring view state of {}", self.route_path);
            self.state = saved;
            return Ok(());
        }

        options.validate(ctx.functions())?;
        ctx.set_form_changed(false);
        self.state = TableState::new(options);

        self.state.read_only = ctx.route(&self.route_path).is_some_and(|r| r.read_only);
        if self.state.read_only || self.state.options.table_api.is_none() {
            let options = &mut self.state.options;
            options.allow_edit = false;
            options.allow_new = false;
            options.allow_delete = false;
        }

        self.load_context_values().await;
        self.reload().await;
        self.state.loaded = true;
        Ok(())
    }

    /// Restores each context value from the local store and loads its options.
    /// Without a remembered value the first option is the default.
    async fn load_context_values(&mut self) {
        let ctx = self.api.context().clone();
        for cv in &mut self.state.context_values {
            match ctx.store().get::<Value>(&LocalStore::context_key(&cv.name)).await {
                Ok(Some(value)) => cv.value = value,
                Ok(None) => {}
                Err(e) => log::warn!("could not read context value {}: {}", cv.name, e),
            }
            if let Some(lookup) = &cv.lookup {
                if let Some(rows) = self.api.param_lookup(lookup).await {
                    cv.options = rows;
                }
            }
            if !cv.options.is_empty() {
                let options = LookupOptions::from_rows(cv.options.clone());
                if cv.value.is_null() {
                    if let Some(first) = options.first_value() {
                        cv.value = first.clone();
                    }
                }
                cv.option_value = Some(options.value_field);
                cv.option_label = Some(options.label_field);
            }
        }
    }

    /// Changes a context value. Takes effect on the next reload.
    pub fn set_context_value(&mut self, name: &str, value: Value) -> Result<(), Error> {
        let cv = self
            .state
            .context_values
            .iter_mut()
            .find(|cv| cv.name == name)
            .ok_or_else(|| Error::InvalidAction(format!("no context value '{}'", name)))?;
        cv.value = value;
        Ok(())
    }

    /// Fetches the rows and rebuilds the columns.
    ///
    /// Context values become the request parameters and are remembered. A
    /// failed fetch leaves an empty table.
    pub async fn reload(&mut self) {
        let ctx = self.api.context().clone();

        if !self.state.context_values.is_empty() {
            let mut params = RowObject::new();
            for cv in &self.state.context_values {
                params.insert(cv.name.clone(), cv.value.clone());
                if let Err(e) = ctx.store().set(&LocalStore::context_key(&cv.name), &cv.value).await {
                    log::warn!("could not remember context value {}: {}", cv.name, e);
                }
                ctx.set_context_value(cv.name.clone(), cv.value.clone());
            }
            self.state.params = Some(params);
        }

        let Some(source) = self.state.options.source() else {
            log::warn!("table at {} has no data source", self.route_path);
            self.clear_table();
            return;
        };
        let params = self.state.params.clone().unwrap_or_default();
        let Some(response) = self.api.fetch_table(&source, &params, self.prefer_cache()).await else {
            self.clear_table();
            return;
        };

        let cache = response.cache;
        let mut dataset = response.into_inner();
        let parent = self.state.options.parent();
        let columns = {
            let mut model = ColumnModel::new(ctx.rules()).with_overrides(&self.state.options.col_atts);
            if let Some(parent) = &parent {
                model = model.with_parent_key(&parent.key);
            }
            model.build(&mut dataset)
        };
        let (encoding, attributes, mut rows) = dataset.into_parts();

        if let Some(parent) = &parent {
            match columns.iter().find(|c| c.name == parent.key) {
                Some(col) => rows.retain(|row| loose_eq(&row.value(&col.index), &parent.value)),
                None => log::warn!("parent key {} is not a column", parent.key),
            }
        }

        self.state.key_index = key_index(encoding, &rows);
        self.state.filters = Filters::for_columns(&columns);
        self.state.encoding = encoding;
        self.state.attributes = attributes;
        self.state.columns = columns;
        self.state.rows = rows;
        self.state.cache = cache;
        self.state.selected.clear();
        self.state.overlay = None;
        log::info!(
            "loaded {} rows, {} columns for {}",
            self.state.rows.len(),
            self.state.columns.len(),
            self.route_path
        );
    }

    fn clear_table(&mut self) {
        self.state.rows.clear();
        self.state.columns.clear();
        self.state.attributes.clear();
        self.state.selected.clear();
        self.state.overlay = None;
        self.state.filters = Filters::default();
        self.state.cache = CacheStatus::None;
    }
}

/// Compact rows keep the key first. Plain rows use `id`, or their first
/// property when there is none.
fn key_index(encoding: Encoding, rows: &[Row]) -> ColumnIndex {
    match (encoding, rows.first()) {
        (Encoding::Compact, _) => ColumnIndex::Position(0),
        (Encoding::Plain, Some(Row::Plain(obj))) if !obj.contains_key("id") => obj
            .keys()
            .next()
            .map(|k| ColumnIndex::Key(k.clone()))
            .unwrap_or_else(|| ColumnIndex::Key("id".to_string())),
        (Encoding::Plain, _) => ColumnIndex::Key("id".to_string()),
    }
}
