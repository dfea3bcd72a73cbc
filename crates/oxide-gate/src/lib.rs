//! # oxide-gate
//!
//! Request gating: decide, before a page or API handler runs, whether a
//! request passes, is redirected or is answered directly.
//!
//! This crate provides:
//! - Exact and prefix route patterns with bracket parameters
//! - Numeric route priority so the most specific route wins
//! - Ordered rule chains that short-circuit on the first decision
//! - Plugins with five lifecycle hooks, isolated from each other
//! - A default error policy (auth pages pass, everything else goes to sign-in)
//! - A legacy `next()`/`redirect()` matcher for older applications
//!
//! ## Quick Start
//!
//! ```
//! use oxide_gate::{require_role, Gate, GateError, LoggingPlugin, Request, User};
//!
//! # async fn demo() {
//! let gate = Gate::builder(|req: Request| async move {
//!     Ok::<_, GateError>(req.cookie("session").map(|id| User::new(id).with_role("admin")))
//! })
//! .exact("/", [])
//! .prefix("/admin", [require_role(["admin"])])
//! .plugin(LoggingPlugin)
//! .register_auth_paths(["/sign-in"])
//! .build();
//!
//! let response = gate.handle(Request::get("/admin/users")).await;
//! assert_eq!(response.location(), Some("/sign-in"));
//! # }
//! ```
//!
//! ## Route Priority
//!
//! Exact routes score `segments * 10`, prefix routes `1000 + (100 - segments)`.
//! The lowest score among matching routes wins, so exact routes beat prefix
//! routes and deeper prefixes beat shallower ones:
//!
//! ```
//! assert_eq!(oxide_gate::priority("/users/[id]", true), 20);
//! assert_eq!(oxide_gate::priority("/admin/*", false), 1099);
//! assert_eq!(oxide_gate::priority("/admin/users", false), 1098);
//! ```
//!
//! ## Rules
//!
//! A rule returns `Ok(None)` to let the chain continue and `Ok(Some(response))`
//! to answer the request. Errors are request-level failures handled by the
//! plugins' `on_error` hooks and then the default policy.
//!
//! ```
//! use oxide_gate::{rule_fn, RequestContext, Response, SharedRule};
//!
//! let weekdays_only: SharedRule<()> = rule_fn("weekdays", |ctx: &mut RequestContext<()>| {
//!     let closed = ctx.req.get_header("X-Day") == Some("sunday");
//!     Ok(closed.then(|| Response::forbidden("closed on sundays")))
//! });
//! ```

mod cache;
mod config;
mod context;
mod error;
mod executor;
mod fetch;
mod gate;
mod legacy;
mod limiter;
mod path;
mod plugin;
pub mod plugins;
mod principal;
mod priority;
mod request;
mod response;
mod rule;
mod rules;
mod table;

pub use cache::{CacheStorage, MemoryCache, DEFAULT_MAX_ENTRIES};
pub use config::{GateConfig, RouteConfig};
pub use context::{Metadata, RequestContext, Stage};
pub use error::{GateError, Result};
pub use executor::execute_chain;
pub use fetch::UserFetcher;
pub use futures::future::BoxFuture;
pub use gate::{Gate, GateBuilder, Handler, DEFAULT_SIGN_IN_PATH};
pub use legacy::{
    legacy_rule, LegacyContext, LegacyControl, LegacyMatcher, LegacyRule, RedirectOptions,
    SharedLegacyRule,
};
pub use limiter::{CounterStore, MemoryCounterStore, DEFAULT_MAX_KEYS};
pub use path::{extract_params, matches, MatchKind, Segment, WILDCARD_PARAM};
pub use plugin::{Hook, HookResult, Plugin, PluginPipeline, SharedPlugin};
pub use plugins::{ApiErrorPlugin, DataCachePlugin, LoggingPlugin};
pub use principal::{Principal, User};
pub use priority::priority;
pub use request::{Method, Params, Request};
pub use response::Response;
pub use rule::{rule_fn, FnRule, Rule, RuleOutcome, SharedRule};
pub use rules::{
    client_ip_key, locale_redirect, principal_key, rate_limit, require_permission, require_role,
    RateLimit, LOCALE_META,
};
pub use table::{RouteDefinition, RouteOptions, RouteTable};
