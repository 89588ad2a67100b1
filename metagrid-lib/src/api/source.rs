//! Where a table's rows come from

use serde_json::Value;

use crate::model::RowObject;
use crate::model::value_text;
use crate::transport::ApiRequest;

/// Data source of a table view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// Server-side function returning a table through `Table/GetTable`.
    DbFunction {
        name: String,
        /// Ask for the compact encoding.
        frugal: bool,
        /// Ask for structured columns as JSON.
        json: bool,
        /// Server-side preprocessing step.
        preprocess: Option<String>,
    },
    /// Arbitrary REST path; parameters become trailing path segments.
    Rest { path: String },
    /// A named table served by the generic table API in compact encoding.
    Table { name: String, key: Option<String> },
}

impl DataSource {
    /// Builds the GET request for this source.
    pub fn request(&self, params: &RowObject) -> ApiRequest {
        match self {
            Self::DbFunction {
                name,
                frugal,
                json,
                preprocess,
            } => {
                let mut request = ApiRequest::get("Table/GetTable")
                    .with_query("dbFunction", name.as_str())
                    .with_query("frugal", frugal.to_string())
                    .with_query("json", json.to_string())
                    .with_query("pars", Value::Object(params.clone()).to_string());
                if let Some(preprocess) = preprocess {
                    request = request.with_query("preprocess", preprocess.as_str());
                }
                request
            }
            Self::Rest { path } => {
                let mut full = path.trim_end_matches('/').to_string();
                for value in params.values() {
                    full.push('/');
                    full.push_str(&urlencoding::encode(&value_text(value)));
                }
                ApiRequest::get(full)
            }
            Self::Table { name, key } => {
                if !params.is_empty() {
                    ApiRequest::get(format!("Table/{}", name))
                        .with_query("pars", Value::Object(params.clone()).to_string())
                } else if let Some(key) = key {
                    ApiRequest::get(format!("Table/{}/{}", name, urlencoding::encode(key)))
                } else {
                    ApiRequest::get(format!("Table/{}", name))
                }
            }
        }
    }

    /// Only table sources are mirrored to and read from the offline cache.
    pub fn is_table(&self) -> bool {
        matches!(self, Self::Table { .. })
    }

    pub fn table_name(&self) -> Option<&str> {
        match self {
            Self::Table { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Table name under which this source is cached.
    pub fn cache_table(&self) -> String {
        match self {
            Self::DbFunction { name, .. } => name.replace('.', "_"),
            Self::Rest { path } => path.replace('/', "_"),
            Self::Table { name, .. } => name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn params(value: Value) -> RowObject {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_db_function_request() {
        let source = DataSource::DbFunction {
            name: "api.soil_samples".to_string(),
            frugal: true,
            json: false,
            preprocess: None,
        };
        let request = source.request(&params(json!({"site_id": 4})));
        assert_eq!(request.path, "Table/GetTable");
        assert_eq!(
            request.query,
            vec![
                ("dbFunction".to_string(), "api.soil_samples".to_string()),
                ("frugal".to_string(), "true".to_string()),
                ("json".to_string(), "false".to_string()),
                ("pars".to_string(), "{\"site_id\":4}".to_string()),
            ]
        );
        assert_eq!(source.cache_table(), "api_soil_samples");
        assert!(!source.is_table());
    }

    #[test]
    fn test_rest_params_become_segments() {
        let source = DataSource::Rest {
            path: "Sample/ForSite".to_string(),
        };
        let request = source.request(&params(json!({"site": 4, "year": "2024"})));
        assert_eq!(request.path, "Sample/ForSite/4/2024");
        assert!(request.query.is_empty());
    }

    #[test]
    fn test_table_request_variants() {
        let source = DataSource::Table {
            name: "person".to_string(),
            key: Some("7".to_string()),
        };
        assert_eq!(source.request(&RowObject::new()).path, "Table/person/7");

        let request = source.request(&params(json!({"org": 1})));
        assert_eq!(request.path, "Table/person");
        assert_eq!(request.query, vec![("pars".to_string(), "{\"org\":1}".to_string())]);
        assert!(source.is_table());
    }
}
