//! Scripted transport and recording surface shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::Once;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use metagrid_lib::Api;
use metagrid_lib::AppContext;
use metagrid_lib::RemoteCache;
use metagrid_lib::RouteDef;
use metagrid_lib::Surface;
use metagrid_lib::TableController;
use metagrid_lib::cache::CacheConfig;
use metagrid_lib::cache::InMemoryCache;
use metagrid_lib::error::ApiError;
use metagrid_lib::surface::ChartRequest;
use metagrid_lib::surface::PopupRequest;
use metagrid_lib::surface::RouteRequest;
use metagrid_lib::transport::ApiRequest;
use metagrid_lib::transport::Transport;
use metagrid_lib::transport::Verb;
use serde_json::Value;

static LOGGER: Once = Once::new();

pub fn init_logger() {
    LOGGER.call_once(|| {
        let _ = simplelog::TestLogger::init(simplelog::LevelFilter::Debug, simplelog::Config::default());
    });
}

// =============================================================================
// Transport
// =============================================================================

/// Answers requests from a table of `(verb, path)` responses and records
/// every request it receives.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<HashMap<(Verb, String), Result<Value, ApiError>>>,
    requests: Mutex<Vec<ApiRequest>>,
    offline: AtomicBool,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn respond(&self, verb: Verb, path: &str, body: Value) {
        self.responses
            .lock()
            .unwrap()
            .insert((verb, path.to_string()), Ok(body));
    }

    pub fn fail(&self, verb: Verb, path: &str, error: ApiError) {
        self.responses
            .lock()
            .unwrap()
            .insert((verb, path.to_string()), Err(error));
    }

    /// Every request fails with a network error while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, verb: Verb, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.verb == verb && r.path == path)
            .count()
    }

    pub fn last(&self, verb: Verb) -> Option<ApiRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.verb == verb)
            .cloned()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(ApiError::Network("connection refused".to_string()));
        }
        self.responses
            .lock()
            .unwrap()
            .get(&(request.verb, request.path.clone()))
            .cloned()
            .unwrap_or_else(|| Err(ApiError::server(404, format!("no route {}", request.path))))
    }
}

// =============================================================================
// Surface
// =============================================================================

/// Records everything shown to the user. Confirmations are answered from a
/// queue, then with the default answer.
pub struct RecordingSurface {
    answers: Mutex<VecDeque<bool>>,
    default_answer: AtomicBool,
    pub confirms: Mutex<Vec<String>>,
    pub messages: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
    pub routes: Mutex<Vec<RouteRequest>>,
    pub popups: Mutex<Vec<PopupRequest>>,
    pub charts: Mutex<Vec<ChartRequest>>,
    pub progress: Mutex<Vec<Value>>,
    pub urls: Mutex<Vec<String>>,
    pub logouts: Mutex<usize>,
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self {
            answers: Mutex::new(VecDeque::new()),
            default_answer: AtomicBool::new(true),
            confirms: Mutex::default(),
            messages: Mutex::default(),
            errors: Mutex::default(),
            routes: Mutex::default(),
            popups: Mutex::default(),
            charts: Mutex::default(),
            progress: Mutex::default(),
            urls: Mutex::default(),
            logouts: Mutex::default(),
        }
    }
}

impl RecordingSurface {
    pub fn answer(&self, yes: bool) {
        self.answers.lock().unwrap().push_back(yes);
    }

    pub fn always_answer(&self, yes: bool) {
        self.default_answer.store(yes, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn confirms(&self) -> Vec<String> {
        self.confirms.lock().unwrap().clone()
    }
}

#[async_trait]
impl Surface for RecordingSurface {
    async fn confirm(&self, message: &str) -> bool {
        self.confirms.lock().unwrap().push(message.to_string());
        let queued = self.answers.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| self.default_answer.load(Ordering::SeqCst))
    }

    async fn show_message(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }

    async fn show_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }

    async fn navigate(&self, request: RouteRequest) {
        self.routes.lock().unwrap().push(request);
    }

    async fn open_popup(&self, request: PopupRequest) {
        self.popups.lock().unwrap().push(request);
    }

    async fn show_chart(&self, request: ChartRequest) {
        self.charts.lock().unwrap().push(request);
    }

    async fn show_progress(&self, task_id: &Value) {
        self.progress.lock().unwrap().push(task_id.clone());
    }

    async fn open_url(&self, url: &str) {
        self.urls.lock().unwrap().push(url.to_string());
    }

    async fn logout(&self) {
        *self.logouts.lock().unwrap() += 1;
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub struct Harness {
    pub transport: Arc<ScriptedTransport>,
    pub surface: Arc<RecordingSurface>,
    pub ctx: Arc<AppContext>,
    pub api: Api,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(ScriptedTransport::new(), Vec::new())
    }

    pub fn with(transport: ScriptedTransport, routes: Vec<RouteDef>) -> Self {
        init_logger();
        let transport = Arc::new(transport);
        let surface = Arc::new(RecordingSurface::default());
        let ctx = Arc::new(AppContext::with_surface(surface.clone()).with_routes(routes));
        let cache = RemoteCache::new(InMemoryCache::new(), CacheConfig::default());
        let api = Api::from_arc(transport.clone(), ctx.clone(), cache);
        Self {
            transport,
            surface,
            ctx,
            api,
        }
    }

    pub fn controller(&self, path: &str) -> TableController {
        TableController::new(self.api.clone(), path)
    }
}

/// A compact `person` table with a country lookup pair.
pub fn person_table() -> Value {
    serde_json::json!({
        "attributes": [
            {"name": "id", "type": "integer"},
            {"name": "name", "type": "character varying"},
            {"name": "country__country_id", "type": "integer"},
            {"name": "country__country_id_val", "type": "character varying"},
            {"name": "active", "type": "boolean"}
        ],
        "data": [
            [1, "Ana", 10, "Croatia", true],
            [2, "Ben", 20, "Denmark", false],
            [3, "Cleo", 10, "Croatia", true]
        ]
    })
}

pub fn countries() -> Value {
    serde_json::json!([
        {"id": 10, "name": "Croatia"},
        {"id": 20, "name": "Denmark"},
        {"id": 30, "name": "Estonia"}
    ])
}
