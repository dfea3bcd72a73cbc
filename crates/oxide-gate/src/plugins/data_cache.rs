//! Serves user data from a cache so repeated requests skip the fetcher.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::cache::CacheStorage;
use crate::context::RequestContext;
use crate::error::Result;
use crate::plugin::{HookResult, Plugin};
use crate::request::Request;
use crate::response::Response;

/// Metadata flag set when `data` came from the cache.
pub const CACHE_HIT_META: &str = "cache.hit";

type KeyFn = Arc<dyn Fn(&Request) -> Option<String> + Send + Sync>;

/// Supplies `ctx.data` from a [`CacheStorage`] in `before_request` and
/// stores freshly fetched data in `after_request`.
///
/// Requests the key function returns `None` for are left alone.
pub struct DataCachePlugin {
    storage: Arc<dyn CacheStorage>,
    key: KeyFn,
    ttl: Option<Duration>,
}

impl DataCachePlugin {
    /// Creates a plugin keyed by `key`.
    pub fn new<F>(storage: Arc<dyn CacheStorage>, key: F) -> Self
    where
        F: Fn(&Request) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            storage,
            key: Arc::new(key),
            ttl: None,
        }
    }

    /// Creates a plugin keyed by the value of a cookie.
    pub fn by_cookie(storage: Arc<dyn CacheStorage>, cookie: &str) -> Self {
        let cookie = cookie.to_string();
        Self::new(storage, move |req| {
            req.cookie(&cookie).map(|value| format!("data:{value}"))
        })
    }

    /// Sets how long cached data lives.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    async fn load<T: DeserializeOwned>(&self, ctx: &mut RequestContext<T>) -> HookResult {
        let Some(key) = (self.key)(&ctx.req) else {
            return Ok(());
        };
        if let Some(value) = self.storage.get(&key).await? {
            debug!(key = %key, "Serving user data from cache");
            ctx.data = Some(serde_json::from_value(value)?);
            ctx.set_meta(CACHE_HIT_META, true);
        }
        Ok(())
    }

    async fn save<T: Serialize>(&self, ctx: &RequestContext<T>) -> Result<()> {
        let hit = ctx.meta(CACHE_HIT_META).and_then(serde_json::Value::as_bool);
        if hit == Some(true) {
            return Ok(());
        }
        let (Some(key), Some(data)) = ((self.key)(&ctx.req), ctx.data.as_ref()) else {
            return Ok(());
        };
        self.storage
            .set(&key, serde_json::to_value(data)?, self.ttl)
            .await
    }
}

impl<T> Plugin<T> for DataCachePlugin
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn name(&self) -> &str {
        "data_cache"
    }

    fn before_request<'a>(&'a self, ctx: &'a mut RequestContext<T>) -> BoxFuture<'a, HookResult> {
        Box::pin(self.load(ctx))
    }

    fn after_request<'a>(
        &'a self,
        ctx: &'a mut RequestContext<T>,
        _response: &'a Response,
    ) -> BoxFuture<'a, HookResult> {
        Box::pin(self.save(ctx))
    }
}
