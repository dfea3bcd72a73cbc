//! Built-in rule factories.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::debug;

use crate::context::RequestContext;
use crate::limiter::CounterStore;
use crate::principal::Principal;
use crate::response::Response;
use crate::rule::{rule_fn, Rule, RuleOutcome, SharedRule};

/// Metadata key under which [`locale_redirect`] records the locale.
pub const LOCALE_META: &str = "locale";

/// Requires the user to hold at least one of `roles`.
pub fn require_role<T, I, S>(roles: I) -> SharedRule<T>
where
    T: Principal + Send + 'static,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let roles: Vec<String> = roles.into_iter().map(Into::into).collect();
    let name = format!("require_role({})", roles.join("|"));
    rule_fn(name, move |ctx: &mut RequestContext<T>| {
        Ok(match &ctx.data {
            None => Some(Response::unauthorized("authentication required")),
            Some(user) if roles.iter().any(|role| user.has_role(role)) => None,
            Some(_) => Some(Response::forbidden(format!(
                "requires role: {}",
                roles.join(", ")
            ))),
        })
    })
}

/// Requires the user to hold `permission`.
pub fn require_permission<T>(permission: impl Into<String>) -> SharedRule<T>
where
    T: Principal + Send + 'static,
{
    let permission = permission.into();
    let name = format!("require_permission({permission})");
    rule_fn(name, move |ctx: &mut RequestContext<T>| {
        Ok(match &ctx.data {
            None => Some(Response::unauthorized("authentication required")),
            Some(user) if user.has_permission(&permission) => None,
            Some(_) => Some(Response::forbidden(format!(
                "missing permission: {permission}"
            ))),
        })
    })
}

/// A per-key rate limit over an injected [`CounterStore`].
pub struct RateLimit<K> {
    store: Arc<dyn CounterStore>,
    limit: u64,
    window: Duration,
    key: K,
}

impl<K> RateLimit<K> {
    async fn check<T>(&self, ctx: &mut RequestContext<T>) -> RuleOutcome
    where
        K: Fn(&RequestContext<T>) -> String,
    {
        let key = (self.key)(&*ctx);
        if self.store.check(&key, self.limit, self.window).await? {
            return Ok(None);
        }

        debug!(key = %key, limit = self.limit, "Rate limit exceeded");
        Ok(Some(
            Response::json(&serde_json::json!({ "error": "too many requests" }), 429)
                .header("Retry-After", self.window.as_secs().max(1).to_string()),
        ))
    }
}

impl<T, K> Rule<T> for RateLimit<K>
where
    T: Send + Sync,
    K: Fn(&RequestContext<T>) -> String + Send + Sync,
{
    fn name(&self) -> &str {
        "rate_limit"
    }

    fn evaluate<'a>(&'a self, ctx: &'a mut RequestContext<T>) -> BoxFuture<'a, RuleOutcome> {
        Box::pin(self.check(ctx))
    }
}

/// Allows `limit` requests per `window` for each key `key` derives.
pub fn rate_limit<T, K>(
    store: Arc<dyn CounterStore>,
    limit: u64,
    window: Duration,
    key: K,
) -> SharedRule<T>
where
    T: Send + Sync + 'static,
    K: Fn(&RequestContext<T>) -> String + Send + Sync + 'static,
{
    Arc::new(RateLimit {
        store,
        limit,
        window,
        key,
    })
}

/// Rate-limit key from the first `X-Forwarded-For` address.
pub fn client_ip_key<T>(ctx: &RequestContext<T>) -> String {
    let ip = ctx
        .req
        .get_header("X-Forwarded-For")
        .and_then(|v| v.split(',').next())
        .map_or("unknown", str::trim);
    format!("ip:{ip}")
}

/// Rate-limit key from the principal's ID.
pub fn principal_key<T: Principal>(ctx: &RequestContext<T>) -> String {
    ctx.data
        .as_ref()
        .map_or_else(|| "user:anonymous".to_string(), |u| format!("user:{}", u.id()))
}

/// Sends paths without a supported locale prefix to a localized path.
///
/// The locale is taken from `Accept-Language` when one of `locales`
/// matches (exactly or by primary subtag), else `default`. Paths that
/// already carry a locale pass, with the locale recorded in metadata.
pub fn locale_redirect<T, I, S>(locales: I, default: &str) -> SharedRule<T>
where
    T: Send + 'static,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let locales: Vec<String> = locales.into_iter().map(Into::into).collect();
    let default = default.to_string();
    rule_fn("locale_redirect", move |ctx: &mut RequestContext<T>| {
        let first = ctx.path.split('/').find(|s| !s.is_empty()).unwrap_or("");
        if let Some(locale) = locales.iter().find(|l| l.as_str() == first) {
            ctx.set_meta(LOCALE_META, locale.clone());
            return Ok(None);
        }

        let locale = ctx
            .req
            .get_header("Accept-Language")
            .and_then(|header| preferred_locale(header, &locales))
            .unwrap_or(&default);
        let target = if ctx.path == "/" {
            format!("/{locale}")
        } else {
            format!("/{locale}{}", ctx.path)
        };
        Ok(Some(Response::redirect(target)))
    })
}

fn preferred_locale<'a>(header: &str, locales: &'a [String]) -> Option<&'a String> {
    header
        .split(',')
        .filter_map(|part| part.split(';').next())
        .map(|tag| tag.trim().to_ascii_lowercase())
        .find_map(|tag| {
            let primary = tag.split('-').next().unwrap_or(&tag).to_string();
            locales
                .iter()
                .find(|l| l.eq_ignore_ascii_case(&tag))
                .or_else(|| locales.iter().find(|l| l.eq_ignore_ascii_case(&primary)))
        })
}
