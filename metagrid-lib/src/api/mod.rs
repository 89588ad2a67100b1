//! Data-access gateway
//!
//! Every server call of the engine goes through [`Api`]. It raises the
//! working flag for the duration of the call, reports failures to the user
//! through the [`Surface`](crate::surface::Surface) and returns `None`
//! instead of an error. Callers treat `None` as "did not happen".

mod source;
mod table;

pub use source::*;
pub use table::*;

use std::sync::Arc;

use serde_json::Value;

use crate::cache::RemoteCache;
use crate::context::AppContext;
use crate::error::ApiError;
use crate::model::value_text;
use crate::transport::ApiRequest;
use crate::transport::Transport;
use crate::transport::Verb;

/// The gateway. Cheap to clone.
///
/// # Example
///
/// ```ignore
/// let api = Api::new(transport, ctx.clone(), RemoteCache::new(SqliteCache::open("offline.db").await?, CacheConfig::default()));
///
/// if let Some(person) = api.get("Person/Current").await {
///     println!("{}", person["name"]);
/// }
/// ```
#[derive(Clone)]
pub struct Api {
    inner: Arc<ApiInner>,
}

struct ApiInner {
    transport: Arc<dyn Transport>,
    ctx: Arc<AppContext>,
    cache: RemoteCache,
}

impl Api {
    /// Creates a gateway over `transport`.
    pub fn new(transport: impl Transport + 'static, ctx: Arc<AppContext>, cache: RemoteCache) -> Self {
        Self::from_arc(Arc::new(transport), ctx, cache)
    }

    /// Like [`Api::new`] for a transport that is already shared.
    pub fn from_arc(transport: Arc<dyn Transport>, ctx: Arc<AppContext>, cache: RemoteCache) -> Self {
        Self {
            inner: Arc::new(ApiInner { transport, ctx, cache }),
        }
    }

    /// The application context this gateway reports to.
    pub fn context(&self) -> &Arc<AppContext> {
        &self.inner.ctx
    }

    /// The offline mirror of table data.
    pub fn cache(&self) -> &RemoteCache {
        &self.inner.cache
    }

    /// Sends a request, reporting any failure.
    ///
    /// A 2xx body carrying `error` counts as a failure. A body carrying
    /// `message` is shown to the user and still returned.
    pub async fn call(&self, request: ApiRequest) -> Option<Value> {
        let ctx = &self.inner.ctx;
        let verb = request.verb;
        let path = request.path.clone();

        let result = {
            let _working = ctx.begin_work();
            self.inner.transport.send(request).await
        };

        match result {
            Ok(body) => {
                ctx.set_online(true);
                self.inspect_body(body).await
            }
            Err(err) => {
                self.report(verb, &path, err).await;
                None
            }
        }
    }

    async fn inspect_body(&self, body: Value) -> Option<Value> {
        let surface = self.inner.ctx.surface();
        if let Some(obj) = body.as_object() {
            if let Some(error) = obj.get("error").filter(|e| !e.is_null()) {
                let message = value_text(error);
                log::warn!("server reported error: {}", message);
                surface.show_error(&message).await;
                return None;
            }
            if let Some(Value::String(message)) = obj.get("message") {
                if !message.is_empty() {
                    surface.show_message(message).await;
                }
            }
        }
        Some(body)
    }

    /// Shows `err` to the user and applies its session consequences.
    pub(crate) async fn report(&self, verb: Verb, path: &str, err: ApiError) {
        let ctx = &self.inner.ctx;
        log::warn!("{} {} failed: {}", verb, path, err);
        if err.is_network() {
            ctx.set_online(false);
        }
        ctx.surface().show_error(&err.user_message()).await;
        if err.requires_logout() {
            ctx.surface().logout().await;
        }
    }

    /// Sends a GET.
    pub async fn get(&self, path: impl Into<String>) -> Option<Value> {
        self.call(ApiRequest::get(path)).await
    }

    /// Sends a POST with a JSON body.
    pub async fn post(&self, path: impl Into<String>, body: Value) -> Option<Value> {
        self.call(ApiRequest::new(Verb::Post, path).with_body(body)).await
    }

    /// Sends a PUT with a JSON body.
    pub async fn put(&self, path: impl Into<String>, body: Value) -> Option<Value> {
        self.call(ApiRequest::new(Verb::Put, path).with_body(body)).await
    }

    /// Sends a DELETE.
    pub async fn delete(&self, path: impl Into<String>) -> Option<Value> {
        self.call(ApiRequest::new(Verb::Delete, path)).await
    }

    /// GET whose response is remembered in the local store.
    ///
    /// The network is always tried first. When it is unreachable and caching
    /// is enabled, the remembered response is returned instead.
    pub async fn get_cached(&self, request: ApiRequest) -> Option<Value> {
        let ctx = &self.inner.ctx;
        let caching = self.inner.cache.is_enabled();
        let key = request.cache_key();

        let Some(value) = self.call(request).await else {
            if !caching || ctx.is_online() {
                return None;
            }
            return match ctx.store().get::<Value>(&key).await {
                Ok(Some(value)) => {
                    log::debug!("serving {} from local store", key);
                    Some(value)
                }
                Ok(None) => {
                    log::info!("no stored response for {}", key);
                    None
                }
                Err(e) => {
                    log::warn!("local store read failed for {}: {}", key, e);
                    None
                }
            };
        };
        if caching {
            if let Err(e) = ctx.store().set(&key, &value).await {
                log::warn!("local store write failed for {}: {}", key, e);
            }
        }
        Some(value)
    }
}
