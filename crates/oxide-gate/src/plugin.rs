//! Plugins: cross-cutting observers around the gate pipeline.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::warn;

use crate::context::RequestContext;
use crate::error::{guarded, GateError, Result};
use crate::response::Response;
use crate::rule::Rule;

/// The five points in a request where plugins are called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    /// Once per request, before route resolution.
    BeforeRequest,
    /// Before each rule of the matched chain.
    BeforeRule,
    /// After each rule of the matched chain.
    AfterRule,
    /// Once at the end of a successful run.
    AfterRequest,
    /// When the request failed.
    OnError,
}

impl Hook {
    /// Returns the hook name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BeforeRequest => "before_request",
            Self::BeforeRule => "before_rule",
            Self::AfterRule => "after_rule",
            Self::AfterRequest => "after_request",
            Self::OnError => "on_error",
        }
    }
}

impl std::fmt::Display for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an observing hook.
pub type HookResult = Result<()>;

/// A cross-cutting observer with lifecycle hooks.
///
/// Every hook is optional. A failing hook is logged with the plugin and
/// hook name and otherwise ignored, so plugins cannot abort a request.
/// Only [`Plugin::on_error`] can change the outcome, by supplying a fallback
/// response for a failed request.
///
/// # Example
///
/// ```
/// use oxide_gate::{BoxFuture, HookResult, Plugin, RequestContext};
///
/// struct Tenant;
///
/// impl<T: Send + Sync> Plugin<T> for Tenant {
///     fn name(&self) -> &str {
///         "tenant"
///     }
///
///     fn before_request<'a>(&'a self, ctx: &'a mut RequestContext<T>) -> BoxFuture<'a, HookResult> {
///         Box::pin(async move {
///             let host = ctx.req.get_header("Host").unwrap_or("default").to_string();
///             ctx.set_meta("tenant", host);
///             Ok(())
///         })
///     }
/// }
/// ```
pub trait Plugin<T>: Send + Sync {
    /// Unique name, used for diagnostics.
    fn name(&self) -> &str;

    /// Called once before the route is resolved. May supply `ctx.data`
    /// to skip the user fetch.
    fn before_request<'a>(&'a self, _ctx: &'a mut RequestContext<T>) -> BoxFuture<'a, HookResult> {
        Box::pin(async { Ok(()) })
    }

    /// Called immediately before each rule.
    fn before_rule<'a>(
        &'a self,
        _ctx: &'a mut RequestContext<T>,
        _rule: &'a dyn Rule<T>,
    ) -> BoxFuture<'a, HookResult> {
        Box::pin(async { Ok(()) })
    }

    /// Called immediately after each rule with its decision.
    fn after_rule<'a>(
        &'a self,
        _ctx: &'a mut RequestContext<T>,
        _rule: &'a dyn Rule<T>,
        _result: Option<&'a Response>,
    ) -> BoxFuture<'a, HookResult> {
        Box::pin(async { Ok(()) })
    }

    /// Called once with the final response of a successful run.
    fn after_request<'a>(
        &'a self,
        _ctx: &'a mut RequestContext<T>,
        _response: &'a Response,
    ) -> BoxFuture<'a, HookResult> {
        Box::pin(async { Ok(()) })
    }

    /// Called when the request failed. Returning a response ends error
    /// handling with that response.
    fn on_error<'a>(
        &'a self,
        _ctx: &'a mut RequestContext<T>,
        _error: &'a GateError,
    ) -> BoxFuture<'a, Result<Option<Response>>> {
        Box::pin(async { Ok(None) })
    }
}

/// A plugin shared by the pipeline.
pub type SharedPlugin<T> = Arc<dyn Plugin<T>>;

/// The ordered plugin list, with failure isolation.
pub struct PluginPipeline<T> {
    plugins: Vec<SharedPlugin<T>>,
}

impl<T> Default for PluginPipeline<T> {
    fn default() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }
}

impl<T: Send + Sync> PluginPipeline<T> {
    /// Creates an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a plugin. Registration order is invocation order.
    pub fn push(&mut self, plugin: SharedPlugin<T>) {
        self.plugins.push(plugin);
    }

    /// Number of registered plugins.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Returns true if no plugins are registered.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Plugin names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Runs every `before_request` hook.
    pub async fn before_request(&self, ctx: &mut RequestContext<T>) {
        for plugin in &self.plugins {
            let result = guarded(plugin.before_request(ctx)).await;
            report(plugin.as_ref(), Hook::BeforeRequest, result);
        }
    }

    /// Runs every `before_rule` hook.
    pub async fn before_rule(&self, ctx: &mut RequestContext<T>, rule: &dyn Rule<T>) {
        for plugin in &self.plugins {
            let result = guarded(plugin.before_rule(ctx, rule)).await;
            report(plugin.as_ref(), Hook::BeforeRule, result);
        }
    }

    /// Runs every `after_rule` hook.
    pub async fn after_rule(
        &self,
        ctx: &mut RequestContext<T>,
        rule: &dyn Rule<T>,
        result: Option<&Response>,
    ) {
        for plugin in &self.plugins {
            let outcome = guarded(plugin.after_rule(ctx, rule, result)).await;
            report(plugin.as_ref(), Hook::AfterRule, outcome);
        }
    }

    /// Runs every `after_request` hook.
    pub async fn after_request(&self, ctx: &mut RequestContext<T>, response: &Response) {
        for plugin in &self.plugins {
            let result = guarded(plugin.after_request(ctx, response)).await;
            report(plugin.as_ref(), Hook::AfterRequest, result);
        }
    }

    /// Offers the error to each plugin in order; the first response wins.
    pub async fn on_error(&self, ctx: &mut RequestContext<T>, error: &GateError) -> Option<Response> {
        for plugin in &self.plugins {
            match guarded(plugin.on_error(ctx, error)).await {
                Ok(Some(response)) => return Some(response),
                Ok(None) => {}
                Err(err) => report(plugin.as_ref(), Hook::OnError, Err(err)),
            }
        }
        None
    }
}

fn report<T>(plugin: &dyn Plugin<T>, hook: Hook, result: HookResult) {
    if let Err(err) = result {
        warn!(
            plugin = %plugin.name(),
            hook = %hook,
            error = %err,
            "Plugin hook failed, continuing"
        );
    }
}
