//! The gate: fluent registration and the per-request state machine.
//!
//! A request moves through `before_request` hooks, route resolution, the
//! user fetch, the rule chain and `after_request` hooks. Unmatched paths
//! pass straight through without fetching user data. Any failure after the
//! `before_request` hooks is offered to the plugins' `on_error` hooks, and
//! if none of them answers, the default policy applies: auth pages pass
//! through, everything else redirects to the sign-in page.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::context::{RequestContext, Stage};
use crate::error::{guarded, GateError, Result};
use crate::executor::execute_chain;
use crate::fetch::UserFetcher;
use crate::path;
use crate::plugin::{Plugin, PluginPipeline};
use crate::request::Request;
use crate::response::Response;
use crate::rule::SharedRule;
use crate::table::{RouteOptions, RouteTable};

/// Where unauthenticated requests are sent by default.
pub const DEFAULT_SIGN_IN_PATH: &str = "/sign-in";

/// A boxed request-handling function.
pub type Handler = Arc<dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync>;

/// Builds a [`Gate`].
///
/// # Example
///
/// ```
/// use oxide_gate::{require_role, Gate, GateError, Request, User};
///
/// let gate = Gate::builder(|req: Request| async move {
///     let user = req.cookie("session").map(|id| User::new(id).with_role("admin"));
///     Ok::<_, GateError>(user)
/// })
/// .exact("/", [])
/// .prefix("/admin", [require_role(["admin"])])
/// .register_auth_paths(["/sign-in", "/sign-up"])
/// .build();
///
/// assert_eq!(gate.table().len(), 2);
/// ```
pub struct GateBuilder<T> {
    table: RouteTable<T>,
    plugins: PluginPipeline<T>,
    auth_paths: Vec<String>,
    sign_in_path: String,
    fetcher: Arc<dyn UserFetcher<T>>,
}

impl<T: Send + Sync + 'static> GateBuilder<T> {
    /// Creates a builder around the user-data fetcher.
    pub fn new(fetcher: impl UserFetcher<T> + 'static) -> Self {
        Self {
            table: RouteTable::new(),
            plugins: PluginPipeline::new(),
            auth_paths: Vec::new(),
            sign_in_path: DEFAULT_SIGN_IN_PATH.to_string(),
            fetcher: Arc::new(fetcher),
        }
    }

    /// Registers an exact route.
    #[must_use]
    pub fn exact<I>(mut self, pattern: &str, rules: I) -> Self
    where
        I: IntoIterator<Item = SharedRule<T>>,
    {
        self.table = self.table.register_exact(pattern, rules);
        self
    }

    /// Registers a prefix route.
    #[must_use]
    pub fn prefix<I>(mut self, pattern: &str, rules: I) -> Self
    where
        I: IntoIterator<Item = SharedRule<T>>,
    {
        self.table = self.table.register_prefix(pattern, rules);
        self
    }

    /// Registers a route with explicit options.
    #[must_use]
    pub fn route(mut self, pattern: &str, options: RouteOptions<T>) -> Self {
        self.table = self.table.register_custom(pattern, options);
        self
    }

    /// Adds a plugin. Plugins run in the order they are added.
    #[must_use]
    pub fn plugin(mut self, plugin: impl Plugin<T> + 'static) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    /// Adds paths that stay reachable when a request fails, typically the
    /// sign-in and sign-up pages. A trailing `/*` covers everything below.
    #[must_use]
    pub fn register_auth_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.auth_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Sets the default redirect target for failed requests.
    #[must_use]
    pub fn sign_in_path(mut self, path: impl Into<String>) -> Self {
        self.sign_in_path = path.into();
        self
    }

    /// Freezes the registrations into a gate.
    pub fn build(self) -> Gate<T> {
        Gate {
            table: self.table,
            plugins: self.plugins,
            auth_paths: self.auth_paths,
            sign_in_path: self.sign_in_path,
            fetcher: self.fetcher,
        }
    }
}

/// Decides, for each request, whether it may proceed.
///
/// Routes and plugins are fixed once built, so a gate can be shared
/// across any number of concurrent requests.
pub struct Gate<T> {
    table: RouteTable<T>,
    plugins: PluginPipeline<T>,
    auth_paths: Vec<String>,
    sign_in_path: String,
    fetcher: Arc<dyn UserFetcher<T>>,
}

impl<T: Send + Sync + 'static> Gate<T> {
    /// Starts building a gate.
    pub fn builder(fetcher: impl UserFetcher<T> + 'static) -> GateBuilder<T> {
        GateBuilder::new(fetcher)
    }

    /// The route table.
    pub fn table(&self) -> &RouteTable<T> {
        &self.table
    }

    /// The plugin pipeline.
    pub fn plugins(&self) -> &PluginPipeline<T> {
        &self.plugins
    }

    /// The default redirect target.
    pub fn sign_in(&self) -> &str {
        &self.sign_in_path
    }

    /// Returns true if `path` is one of the configured auth paths.
    pub fn is_auth_path(&self, path: &str) -> bool {
        self.auth_paths.iter().any(|auth| match auth.strip_suffix("/*") {
            Some(base) => path::is_under_prefix(path, base),
            None => auth == path,
        })
    }

    /// Handles one request. Always produces a response.
    pub async fn handle(&self, req: Request) -> Response {
        let mut ctx = RequestContext::new(req);
        self.plugins.before_request(&mut ctx).await;

        match guarded(self.run(&mut ctx)).await {
            Ok(response) => {
                ctx.enter(Stage::AfterRequest);
                self.plugins.after_request(&mut ctx, &response).await;
                response
            }
            Err(err) => self.recover(&mut ctx, err).await,
        }
    }

    /// Turns the gate into a shareable handler function.
    pub fn into_handler(self) -> Handler {
        let gate = Arc::new(self);
        Arc::new(move |req: Request| -> BoxFuture<'static, Response> {
            let gate = Arc::clone(&gate);
            Box::pin(async move { gate.handle(req).await })
        })
    }

    async fn run(&self, ctx: &mut RequestContext<T>) -> Result<Response> {
        ctx.enter(Stage::Resolving);
        let Some(route) = self.table.resolve(&ctx.path) else {
            debug!(path = %ctx.path, "No route matched, passing through");
            return Ok(Response::pass());
        };

        ctx.params = route.params(&ctx.path);
        ctx.matched = Some(route.pattern().to_string());
        for (key, value) in route.metadata() {
            ctx.metadata
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        if ctx.data.is_none() {
            ctx.enter(Stage::FetchingData);
            let data = guarded(self.fetcher.fetch(&ctx.req))
                .await?
                .ok_or_else(|| GateError::Unauthenticated {
                    path: ctx.path.clone(),
                })?;
            ctx.data = Some(data);
        }

        ctx.enter(Stage::ExecutingRules);
        let decision = execute_chain(route.rules(), ctx, &self.plugins).await?;
        Ok(decision.unwrap_or_else(Response::pass))
    }

    async fn recover(&self, ctx: &mut RequestContext<T>, err: GateError) -> Response {
        warn!(
            path = %ctx.path,
            stage = %ctx.stage(),
            error = %err,
            "Request failed"
        );

        if let Some(response) = self.plugins.on_error(ctx, &err).await {
            return response;
        }

        if self.is_auth_path(&ctx.path) {
            debug!(path = %ctx.path, "Auth path, passing through");
            Response::pass()
        } else {
            debug!(path = %ctx.path, to = %self.sign_in_path, "Redirecting to sign-in");
            Response::redirect(&self.sign_in_path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::rule::rule_fn;

    fn anonymous(_req: Request) -> futures::future::Ready<Result<Option<String>>> {
        futures::future::ready(Ok(None))
    }

    fn alice(_req: Request) -> futures::future::Ready<Result<Option<String>>> {
        futures::future::ready(Ok(Some("alice".to_string())))
    }

    #[tokio::test]
    async fn test_unmatched_path_passes_without_fetch() {
        let gate = Gate::builder(anonymous).exact("/private", []).build();
        let res = gate.handle(Request::get("/public")).await;
        assert!(res.is_pass_through());
    }

    #[tokio::test]
    async fn test_missing_user_redirects_to_sign_in() {
        let gate = Gate::builder(anonymous)
            .prefix("/dashboard", [])
            .sign_in_path("/login")
            .build();
        let res = gate.handle(Request::get("/dashboard/stats")).await;
        assert_eq!(res.location(), Some("/login"));
    }

    #[tokio::test]
    async fn test_rule_decision_is_returned() {
        let gate = Gate::builder(alice)
            .exact(
                "/billing",
                [rule_fn("owner-only", |ctx: &mut RequestContext<String>| {
                    Ok((ctx.data.as_deref() != Some("owner")).then(|| Response::forbidden("no")))
                })],
            )
            .build();
        assert_eq!(gate.handle(Request::get("/billing")).await.status, 403);
    }

    #[test]
    fn test_auth_path_matching() {
        let gate = Gate::builder(anonymous)
            .register_auth_paths(["/sign-in", "/api/*"])
            .build();
        assert!(gate.is_auth_path("/sign-in"));
        assert!(!gate.is_auth_path("/sign-in/extra"));
        assert!(gate.is_auth_path("/api"));
        assert!(gate.is_auth_path("/api/x"));
        assert!(!gate.is_auth_path("/apis"));
    }

    #[tokio::test]
    async fn test_into_handler() {
        let handler = Gate::builder(alice).exact("/", []).build().into_handler();
        let res = handler(Request::get("/")).await;
        assert!(res.is_pass_through());
    }
}
