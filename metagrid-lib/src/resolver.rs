//! Lazy loading of lookup options

use std::sync::Arc;

use futures::future::join_all;

use crate::api::Api;
use crate::model::Column;
use crate::model::Lookup;
use crate::model::LookupOptions;
use crate::model::RowObject;

/// Loads lookup options on first use.
///
/// Each lookup is loaded at most once. Concurrent loads of the same lookup
/// share one request: the first caller fetches, the others wait for its
/// result. A failed fetch leaves the lookup unloaded so a later action can
/// retry; an empty result counts as loaded.
#[derive(Clone)]
pub struct LookupResolver {
    api: Api,
}

impl LookupResolver {
    /// Creates a resolver fetching through `api`.
    pub fn new(api: Api) -> Self {
        Self { api }
    }

    /// Ensures `lookup` is loaded. Returns whether options are available.
    pub async fn load(&self, lookup: &Lookup) -> bool {
        let result = lookup
            .cell()
            .get_or_try_init(|| async {
                let rows = self.fetch(lookup).await.ok_or(())?;
                log::debug!("lookup '{}' loaded with {} options", lookup.name, rows.len());
                Ok::<_, ()>(LookupOptions::from_rows(rows))
            })
            .await;
        result.is_ok()
    }

    async fn fetch(&self, lookup: &Lookup) -> Option<Vec<RowObject>> {
        if let Some(options) = &lookup.static_options {
            return Some(options.clone());
        }
        if let Some(api) = &lookup.api {
            return self.api.lookup_options_from(api).await;
        }
        if let Some(ref_table) = &lookup.ref_table {
            return self.api.lookup_options(ref_table).await;
        }
        log::warn!("lookup '{}' has no source, treating as empty", lookup.name);
        Some(Vec::new())
    }

    /// Loads every distinct lookup referenced by `columns`, concurrently.
    pub async fn load_all(&self, columns: &[Column]) {
        let mut distinct: Vec<&Arc<Lookup>> = Vec::new();
        for lookup in columns.iter().filter_map(|c| c.lookup.as_ref()) {
            if !lookup.is_loaded() && !distinct.iter().any(|l| Arc::ptr_eq(l, lookup)) {
                distinct.push(lookup);
            }
        }
        join_all(distinct.into_iter().map(|lookup| self.load(lookup))).await;
    }
}
