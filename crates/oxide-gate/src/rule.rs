//! Rules: the decision functions attached to a route.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::context::RequestContext;
use crate::error::Result;
use crate::response::Response;

/// What a rule decided.
///
/// `Ok(None)` means "not decided, continue with the next rule",
/// `Ok(Some(response))` terminates the chain with that response and `Err`
/// fails the whole request.
pub type RuleOutcome = Result<Option<Response>>;

/// A single authorization or decision step for a matched route.
///
/// Rules may read everything on the context and are expected to write only
/// to `metadata`. Any state a rule keeps between requests (counters,
/// caches) belongs in an injected store, not in the engine.
///
/// # Example
///
/// ```
/// use oxide_gate::{BoxFuture, RequestContext, Response, Rule, RuleOutcome};
///
/// struct MaintenanceMode;
///
/// impl<T: Send> Rule<T> for MaintenanceMode {
///     fn name(&self) -> &str {
///         "maintenance"
///     }
///
///     fn evaluate<'a>(&'a self, _ctx: &'a mut RequestContext<T>) -> BoxFuture<'a, RuleOutcome> {
///         Box::pin(async { Ok(Some(Response::text("back soon").status(503))) })
///     }
/// }
/// ```
pub trait Rule<T>: Send + Sync {
    /// Name used in logs and plugin hooks.
    fn name(&self) -> &str;

    /// Evaluates the rule against one request.
    fn evaluate<'a>(&'a self, ctx: &'a mut RequestContext<T>) -> BoxFuture<'a, RuleOutcome>;
}

/// A rule shared between routes.
pub type SharedRule<T> = Arc<dyn Rule<T>>;

/// A rule backed by a synchronous closure.
pub struct FnRule<F> {
    name: String,
    f: F,
}

impl<T, F> Rule<T> for FnRule<F>
where
    T: Send,
    F: Fn(&mut RequestContext<T>) -> RuleOutcome + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate<'a>(&'a self, ctx: &'a mut RequestContext<T>) -> BoxFuture<'a, RuleOutcome> {
        Box::pin(async move { (self.f)(ctx) })
    }
}

/// Wraps a closure as a named rule.
///
/// ```
/// use oxide_gate::{rule_fn, RequestContext, Response, Rule, SharedRule};
///
/// let no_robots: SharedRule<()> = rule_fn("no-robots", |ctx: &mut RequestContext<()>| {
///     let is_bot = ctx
///         .req
///         .get_header("User-Agent")
///         .is_some_and(|ua| ua.contains("bot"));
///     Ok(is_bot.then(|| Response::forbidden("bots are not allowed")))
/// });
/// assert_eq!(no_robots.name(), "no-robots");
/// ```
pub fn rule_fn<T, F>(name: impl Into<String>, f: F) -> SharedRule<T>
where
    T: Send + 'static,
    F: Fn(&mut RequestContext<T>) -> RuleOutcome + Send + Sync + 'static,
{
    Arc::new(FnRule {
        name: name.into(),
        f,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;

    #[tokio::test]
    async fn test_fn_rule_evaluates() {
        let rule: SharedRule<u32> = rule_fn("even-only", |ctx: &mut RequestContext<u32>| {
            ctx.set_meta("checked", true);
            Ok(ctx
                .data
                .filter(|n| n % 2 == 1)
                .map(|_| Response::forbidden("odd")))
        });

        let mut ctx = RequestContext::new(Request::get("/"));
        ctx.data = Some(3);
        let outcome = rule.evaluate(&mut ctx).await.unwrap();
        assert_eq!(outcome.map(|r| r.status), Some(403));
        assert_eq!(ctx.meta("checked"), Some(&serde_json::json!(true)));

        ctx.data = Some(4);
        assert!(rule.evaluate(&mut ctx).await.unwrap().is_none());
    }
}
