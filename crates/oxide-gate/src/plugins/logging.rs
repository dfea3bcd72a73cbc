//! Request logging.

use chrono::Utc;
use futures::future::BoxFuture;
use tracing::{debug, info};

use crate::context::RequestContext;
use crate::plugin::{HookResult, Plugin};
use crate::response::Response;
use crate::rule::Rule;

const STARTED_AT: &str = "logging.started_at";

/// Logs one line per gated request and one debug line per rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingPlugin;

impl<T: Send + Sync> Plugin<T> for LoggingPlugin {
    fn name(&self) -> &str {
        "logging"
    }

    fn before_request<'a>(&'a self, ctx: &'a mut RequestContext<T>) -> BoxFuture<'a, HookResult> {
        Box::pin(async move {
            ctx.set_meta(STARTED_AT, Utc::now().timestamp_millis());
            debug!(method = %ctx.req.method, path = %ctx.path, "--> request");
            Ok(())
        })
    }

    fn before_rule<'a>(
        &'a self,
        ctx: &'a mut RequestContext<T>,
        rule: &'a dyn Rule<T>,
    ) -> BoxFuture<'a, HookResult> {
        Box::pin(async move {
            debug!(rule = %rule.name(), path = %ctx.path, "Running rule");
            Ok(())
        })
    }

    fn after_rule<'a>(
        &'a self,
        ctx: &'a mut RequestContext<T>,
        rule: &'a dyn Rule<T>,
        result: Option<&'a Response>,
    ) -> BoxFuture<'a, HookResult> {
        Box::pin(async move {
            debug!(
                rule = %rule.name(),
                path = %ctx.path,
                decided = result.is_some(),
                "Rule finished"
            );
            Ok(())
        })
    }

    fn after_request<'a>(
        &'a self,
        ctx: &'a mut RequestContext<T>,
        response: &'a Response,
    ) -> BoxFuture<'a, HookResult> {
        Box::pin(async move {
            let elapsed_ms = ctx
                .meta(STARTED_AT)
                .and_then(serde_json::Value::as_i64)
                .map(|started| Utc::now().timestamp_millis() - started);
            info!(
                method = %ctx.req.method,
                path = %ctx.path,
                route = ctx.matched.as_deref().unwrap_or("-"),
                status = response.status,
                pass_through = response.is_pass_through(),
                elapsed_ms,
                "<-- gated"
            );
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;

    #[tokio::test]
    async fn test_records_start_time() {
        let plugin = LoggingPlugin;
        let mut ctx: RequestContext<()> = RequestContext::new(Request::get("/"));
        Plugin::<()>::before_request(&plugin, &mut ctx).await.unwrap();
        assert!(ctx.meta(STARTED_AT).and_then(serde_json::Value::as_i64).is_some());

        Plugin::<()>::after_request(&plugin, &mut ctx, &Response::pass())
            .await
            .unwrap();
    }
}
