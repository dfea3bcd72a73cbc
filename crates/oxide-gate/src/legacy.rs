//! Compatibility matcher for applications written against the older
//! `next()`/`redirect()` rule style.
//!
//! It keeps its own route bag and a coarser precedence than [`crate::Gate`]:
//! wildcard patterns (ending in `/*`) come after every other pattern, and
//! registration order decides within each group. Only the first matching
//! route runs.
//!
//! Protected paths are checked before any route. Only they trigger the
//! user-data fetch; a failed or empty fetch goes to the error handler, and
//! without one the request is dropped (`handle` returns `None`).

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::error::{guarded, GateError, Result};
use crate::fetch::UserFetcher;
use crate::path::{extract_params, MatchKind, Segment};
use crate::request::{Params, Request};
use crate::response::Response;

/// Options for [`LegacyControl::redirect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectOptions {
    /// Redirect status code.
    pub status: u16,
}

impl Default for RedirectOptions {
    fn default() -> Self {
        Self { status: 302 }
    }
}

/// What a legacy rule sees.
#[derive(Debug, Clone)]
pub struct LegacyContext<T> {
    /// User data, present only on protected paths.
    pub data: Option<T>,
    /// The incoming request.
    pub req: Request,
    /// Request path.
    pub path: String,
    /// Parameters bound by the matched pattern.
    pub params: Params,
}

/// The `next()`/`redirect()` pair handed to each legacy rule.
#[derive(Debug, Default)]
pub struct LegacyControl {
    next_called: bool,
    redirect: Option<(String, RedirectOptions)>,
}

impl LegacyControl {
    /// Lets the request continue. Later redirects are ignored.
    pub fn next(&mut self) {
        self.next_called = true;
    }

    /// Records a redirect target. Only the first call before `next()` counts.
    pub fn redirect(&mut self, path: impl Into<String>, options: Option<RedirectOptions>) {
        if self.next_called || self.redirect.is_some() {
            return;
        }
        self.redirect = Some((path.into(), options.unwrap_or_default()));
    }

    /// Returns true once `next()` has been called.
    pub fn is_next_called(&self) -> bool {
        self.next_called
    }

    fn take_redirect(&mut self) -> Option<Response> {
        self.redirect
            .take()
            .map(|(path, options)| Response::redirect(path).status(options.status))
    }
}

/// A rule in the legacy style.
///
/// Plain closures `Fn(&LegacyContext<T>, &mut LegacyControl) -> Result<()>`
/// implement this; implement it by hand for rules that need to await.
pub trait LegacyRule<T>: Send + Sync {
    /// Inspects the request and calls `next()` or `redirect()` on `control`.
    fn call<'a>(
        &'a self,
        ctx: &'a LegacyContext<T>,
        control: &'a mut LegacyControl,
    ) -> BoxFuture<'a, Result<()>>;
}

impl<T, F> LegacyRule<T> for F
where
    T: Sync,
    F: Fn(&LegacyContext<T>, &mut LegacyControl) -> Result<()> + Send + Sync,
{
    fn call<'a>(
        &'a self,
        ctx: &'a LegacyContext<T>,
        control: &'a mut LegacyControl,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { self(ctx, control) })
    }
}

/// A shared legacy rule.
pub type SharedLegacyRule<T> = Arc<dyn LegacyRule<T>>;

/// Wraps a closure as a [`SharedLegacyRule`].
pub fn legacy_rule<T, F>(f: F) -> SharedLegacyRule<T>
where
    T: Sync + 'static,
    F: Fn(&LegacyContext<T>, &mut LegacyControl) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

type ErrorHandler = Arc<dyn Fn(&Request, &GateError) -> Response + Send + Sync>;

/// The compatibility matcher.
pub struct LegacyMatcher<T> {
    routes: Vec<(String, Vec<SharedLegacyRule<T>>)>,
    protected: Vec<String>,
    fetcher: Arc<dyn UserFetcher<T>>,
    error_handler: Option<ErrorHandler>,
}

impl<T: Send + Sync + 'static> LegacyMatcher<T> {
    /// Creates an empty matcher.
    pub fn new(fetcher: impl UserFetcher<T> + 'static) -> Self {
        Self {
            routes: Vec::new(),
            protected: Vec::new(),
            fetcher: Arc::new(fetcher),
            error_handler: None,
        }
    }

    /// Registers rules for a pattern, replacing any rules it already had.
    #[must_use]
    pub fn route<I>(mut self, pattern: &str, rules: I) -> Self
    where
        I: IntoIterator<Item = SharedLegacyRule<T>>,
    {
        let rules: Vec<_> = rules.into_iter().collect();
        match self.routes.iter_mut().find(|(p, _)| p == pattern) {
            Some((_, existing)) => *existing = rules,
            None => self.routes.push((pattern.to_string(), rules)),
        }
        // stable: registration order survives within each group
        self.routes.sort_by_key(|(p, _)| is_wildcard(p));
        self
    }

    /// Adds patterns whose requests require user data.
    #[must_use]
    pub fn protect<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protected.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Sets the handler that answers failed fetches and rule errors.
    #[must_use]
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Request, &GateError) -> Response + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Registered patterns in evaluation order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|(p, _)| p.as_str())
    }

    /// Returns true if `path` needs user data.
    pub fn is_protected(&self, path: &str) -> bool {
        self.protected.iter().any(|p| pattern_accepts(p, path))
    }

    /// Handles one request. `None` means the request was dropped.
    pub async fn handle(&self, req: Request) -> Option<Response> {
        let path = req.path.clone();

        let data = if self.is_protected(&path) {
            let fetched = guarded(self.fetcher.fetch(&req))
                .await
                .and_then(|data| {
                    data.ok_or_else(|| GateError::Unauthenticated { path: path.clone() })
                });
            match fetched {
                Ok(data) => Some(data),
                Err(err) => return self.fail(&req, &err),
            }
        } else {
            None
        };

        let Some((pattern, rules)) = self.routes.iter().find(|(p, _)| pattern_accepts(p, &path))
        else {
            debug!(path = %path, "No legacy route matched, passing through");
            return Some(Response::pass());
        };

        let kind = MatchKind::from_exact(!is_wildcard(pattern));
        let ctx = LegacyContext {
            data,
            params: extract_params(&path, pattern, kind, None),
            path,
            req,
        };

        let mut control = LegacyControl::default();
        for rule in rules {
            if let Err(err) = guarded(rule.call(&ctx, &mut control)).await {
                return self.fail(&ctx.req, &err);
            }
            if let Some(response) = control.take_redirect() {
                debug!(path = %ctx.path, pattern = %pattern, "Legacy rule redirected");
                return Some(response);
            }
            if control.is_next_called() {
                break;
            }
        }
        Some(Response::pass())
    }

    fn fail(&self, req: &Request, err: &GateError) -> Option<Response> {
        match &self.error_handler {
            Some(handler) => Some(handler(req, err)),
            None => {
                warn!(path = %req.path, error = %err, "No error handler, dropping request");
                None
            }
        }
    }
}

fn is_wildcard(pattern: &str) -> bool {
    pattern.ends_with("/*")
}

/// Segment-wise match where `[name]` accepts any one segment and a `*`
/// segment accepts the rest of the path.
fn pattern_accepts(pattern: &str, path: &str) -> bool {
    let mut path_segments = path.split('/');
    for segment in pattern.split('/') {
        let segment = Segment::parse(segment);
        if segment == Segment::Wildcard {
            return true;
        }
        match path_segments.next() {
            Some(actual) if segment.accepts(actual) => {}
            _ => return false,
        }
    }
    path_segments.next().is_none()
}
