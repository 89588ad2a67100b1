//! Application context shared by every table

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::model::RowObject;
use crate::model::loose_eq;
use crate::registry::FunctionRegistry;
use crate::registry::RuleRegistry;
use crate::store::LocalStore;
use crate::surface::Surface;
use crate::table::TableState;

/// A registered view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDef {
    pub path: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub component: Option<String>,
    /// Properties merged into every navigation to this view.
    #[serde(default)]
    pub props: RowObject,
    /// Tables on this view may be served from the offline cache.
    #[serde(default)]
    pub offline: bool,
    #[serde(default, alias = "read_only")]
    pub read_only: bool,
}

/// Process-wide state, created once at startup and shared as `Arc<AppContext>`.
///
/// # Example
///
/// ```ignore
/// let ctx = Arc::new(
///     AppContext::new(MySurface::default())
///         .with_store(LocalStore::new(SqliteBackend::open("local.db").await?))
///         .with_routes(routes),
/// );
/// ctx.functions().register_function("archive", archive)?;
/// ```
pub struct AppContext {
    working: AtomicUsize,
    online: AtomicBool,
    form_changed: AtomicBool,
    global_values: DashMap<String, Value>,
    context_values: DashMap<String, Value>,
    view_states: DashMap<String, TableState>,
    collections: DashMap<String, Vec<RowObject>>,
    routes: Vec<RouteDef>,
    rules: RuleRegistry,
    functions: FunctionRegistry,
    store: LocalStore,
    surface: Arc<dyn Surface>,
}

impl AppContext {
    /// Creates a context reporting to `surface`, with an in-memory store and no routes.
    pub fn new(surface: impl Surface + 'static) -> Self {
        Self::with_surface(Arc::new(surface))
    }

    /// Like [`AppContext::new`] for a surface that is already shared.
    pub fn with_surface(surface: Arc<dyn Surface>) -> Self {
        Self {
            working: AtomicUsize::new(0),
            online: AtomicBool::new(true),
            form_changed: AtomicBool::new(false),
            global_values: DashMap::new(),
            context_values: DashMap::new(),
            view_states: DashMap::new(),
            collections: DashMap::new(),
            routes: Vec::new(),
            rules: RuleRegistry::new(),
            functions: FunctionRegistry::new(),
            store: LocalStore::in_memory(),
            surface,
        }
    }

    /// Replaces the local store.
    pub fn with_store(mut self, store: LocalStore) -> Self {
        self.store = store;
        self
    }

    /// Registers the application views.
    pub fn with_routes(mut self, routes: Vec<RouteDef>) -> Self {
        self.routes = routes;
        self
    }

    /// The user interface this context reports to.
    pub fn surface(&self) -> &dyn Surface {
        self.surface.as_ref()
    }

    /// Durable key-value storage for remembered values.
    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Validation rules available to column overrides.
    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    /// Custom functions and chart preprocessors available to actions.
    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    // =========================================================================
    // Flags
    // =========================================================================

    /// `true` while any gateway call is in flight.
    pub fn is_working(&self) -> bool {
        self.working.load(Ordering::SeqCst) > 0
    }

    /// Marks a call in flight until the guard drops.
    pub fn begin_work(&self) -> WorkingGuard<'_> {
        self.working.fetch_add(1, Ordering::SeqCst);
        WorkingGuard { ctx: self }
    }

    /// `false` after a network failure, until the next successful call.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Records connectivity, logging transitions.
    pub fn set_online(&self, online: bool) {
        if self.online.swap(online, Ordering::SeqCst) != online {
            log::info!("connectivity changed: online = {}", online);
        }
    }

    /// Unsaved edits exist somewhere.
    pub fn form_changed(&self) -> bool {
        self.form_changed.load(Ordering::SeqCst)
    }

    /// Marks whether unsaved edits exist.
    pub fn set_form_changed(&self, changed: bool) {
        self.form_changed.store(changed, Ordering::SeqCst);
    }

    // =========================================================================
    // Named values
    // =========================================================================

    /// Looks up one global value.
    pub fn global_value(&self, name: &str) -> Option<Value> {
        self.global_values.get(name).map(|v| v.clone())
    }

    /// Sets one global value.
    pub fn set_global_value(&self, name: impl Into<String>, value: Value) {
        self.global_values.insert(name.into(), value);
    }

    /// Copy of all global values.
    pub fn global_values(&self) -> RowObject {
        self.global_values
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// Merges `values` into the global values.
    pub fn merge_global_values(&self, values: &RowObject) {
        for (name, value) in values {
            self.global_values.insert(name.clone(), value.clone());
        }
    }

    /// Copy of all context values.
    pub fn context_values(&self) -> RowObject {
        self.context_values
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// Looks up one context value.
    pub fn context_value(&self, name: &str) -> Option<Value> {
        self.context_values.get(name).map(|v| v.clone())
    }

    /// Sets a context value, as used for `{{store.contextValues.X}}`.
    pub fn set_context_value(&self, name: impl Into<String>, value: Value) {
        self.context_values.insert(name.into(), value);
    }

    // =========================================================================
    // Routes and view state
    // =========================================================================

    /// Looks a route up by path.
    pub fn route(&self, path: &str) -> Option<&RouteDef> {
        self.routes.iter().find(|r| r.path == path)
    }

    /// Looks a route up by name, falling back to path.
    pub fn find_route(&self, name_or_path: &str) -> Option<&RouteDef> {
        self.routes
            .iter()
            .find(|r| r.name.as_deref() == Some(name_or_path))
            .or_else(|| self.route(name_or_path))
    }

    /// Stores a table's state for back-navigation to `path`.
    pub fn save_view_state(&self, path: impl Into<String>, state: TableState) {
        self.view_states.insert(path.into(), state);
    }

    /// Takes the stored state for `path`, if any.
    pub fn take_view_state(&self, path: &str) -> Option<TableState> {
        self.view_states.remove(path).map(|(_, state)| state)
    }

    // =========================================================================
    // Named collections
    // =========================================================================

    /// Copy of a named collection, empty if unknown.
    pub fn collection(&self, name: &str) -> Vec<RowObject> {
        self.collections.get(name).map(|c| c.clone()).unwrap_or_default()
    }

    /// Replaces a named collection.
    pub fn set_collection(&self, name: impl Into<String>, rows: Vec<RowObject>) {
        self.collections.insert(name.into(), rows);
    }

    /// Removes the first entry whose `id` matches. Returns whether one was removed.
    pub fn remove_from_collection(&self, name: &str, id: &Value) -> bool {
        let Some(mut rows) = self.collections.get_mut(name) else {
            return false;
        };
        match rows
            .iter()
            .position(|r| r.get("id").is_some_and(|v| loose_eq(v, id)))
        {
            Some(pos) => {
                rows.remove(pos);
                true
            }
            None => false,
        }
    }
}

/// Clears the working flag on drop.
pub struct WorkingGuard<'a> {
    ctx: &'a AppContext,
}

impl Drop for WorkingGuard<'_> {
    fn drop(&mut self) {
        self.ctx.working.fetch_sub(1, Ordering::SeqCst);
    }
}
