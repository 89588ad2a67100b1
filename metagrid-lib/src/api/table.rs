//! Generic table API calls

use serde_json::Value;

use super::Api;
use super::DataSource;
use crate::error::ApiError;
use crate::model::Dataset;
use crate::model::RowObject;
use crate::model::value_text;
use crate::response::Response;
use crate::transport::ApiRequest;
use crate::transport::Verb;

/// Successful answer to a row save.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveResult {
    /// Object patch, usually the stored row.
    Echo(RowObject),
    /// Bare generated key.
    Key(Value),
    /// Empty body.
    Empty,
}

impl Api {
    /// Fetches a table, network first.
    ///
    /// Table sources with `prefer_cache` are mirrored to the offline cache
    /// after each successful fetch. When the request fails and the context
    /// has gone offline, the mirrored copy is returned instead. Other sources
    /// always go to the network. A null body yields `None`.
    pub async fn fetch_table(
        &self,
        source: &DataSource,
        params: &RowObject,
        prefer_cache: bool,
    ) -> Option<Response<Dataset>> {
        let cache = self.cache();
        let cacheable = prefer_cache && cache.is_enabled() && source.is_table();
        let dataset_name = cache.config().dataset.clone();
        let table = source.cache_table();

        let request = source.request(params);
        let path = request.path.clone();
        let Some(body) = self.call(request).await else {
            if cacheable && !self.context().is_online() {
                let hit = cache.read(&dataset_name, &table).await;
                if hit.is_none() {
                    log::info!("{} unreachable and not cached offline", table);
                }
                return hit;
            }
            return None;
        };
        if body.is_null() {
            return None;
        }

        let dataset = match Dataset::from_value(body) {
            Ok(dataset) => dataset,
            Err(e) => {
                self.report(Verb::Get, &path, ApiError::parse(format!("not a table: {}", e)))
                    .await;
                return None;
            }
        };

        if cacheable {
            match cache.write(&dataset_name, &table, &dataset).await {
                Ok(status) => return Some(Response::with_status(dataset, status)),
                Err(e) => log::warn!("could not mirror {}: {}", table, e),
            }
        }
        Some(Response::new(dataset))
    }

    /// Sends a row to `path` with `verb` (POST creates, PUT updates).
    pub async fn save_row(&self, path: &str, row: &RowObject, verb: Verb) -> Option<SaveResult> {
        let request = ApiRequest::new(verb, path).with_body(Value::Object(row.clone()));
        let body = self.call(request).await?;
        Some(match body {
            Value::Object(obj) => SaveResult::Echo(obj),
            Value::Null => SaveResult::Empty,
            other => SaveResult::Key(other),
        })
    }

    /// Deletes a row of a named table by key.
    pub async fn delete_row(&self, table: &str, key: &Value) -> Option<Value> {
        self.delete(format!("Table/{}/{}", table, urlencoding::encode(&value_text(key))))
            .await
    }

    /// Asks the server to clone a row of `table`.
    pub async fn clone_row(&self, table: &str, key: &Value) -> Option<Value> {
        let path = format!("Table/Clone/{}/{}", table, urlencoding::encode(&value_text(key)));
        self.call(ApiRequest::new(Verb::Post, path)).await
    }

    /// Options of the generic lookup for a reference table.
    pub async fn lookup_options(&self, ref_table: &str) -> Option<Vec<RowObject>> {
        self.rows_from(ApiRequest::get(format!("Table/GetLookup/{}", ref_table)))
            .await
    }

    /// Options served by a dedicated endpoint.
    pub async fn lookup_options_from(&self, path: &str) -> Option<Vec<RowObject>> {
        self.rows_from(ApiRequest::get(path)).await
    }

    /// Options of a context value's parameter lookup.
    pub async fn param_lookup(&self, name: &str) -> Option<Vec<RowObject>> {
        self.rows_from(ApiRequest::get(format!("Table/GetParamLookup/{}", name)))
            .await
    }

    async fn rows_from(&self, request: ApiRequest) -> Option<Vec<RowObject>> {
        let path = request.path.clone();
        let body = self.get_cached(request).await?;
        if body.is_null() {
            return Some(Vec::new());
        }
        match Dataset::from_value(body) {
            Ok(dataset) => Some(dataset.to_objects()),
            Err(e) => {
                self.report(Verb::Get, &path, ApiError::parse(format!("not a row list: {}", e)))
                    .await;
                None
            }
        }
    }
}
