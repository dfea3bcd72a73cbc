//! JSON error answers for API paths.

use futures::future::BoxFuture;

use crate::context::RequestContext;
use crate::error::{GateError, Result};
use crate::path::is_under_prefix;
use crate::plugin::Plugin;
use crate::response::Response;

/// Answers failed requests under API prefixes with JSON instead of a
/// sign-in redirect, which API clients cannot follow.
#[derive(Debug, Clone, Default)]
pub struct ApiErrorPlugin {
    prefixes: Vec<String>,
}

impl ApiErrorPlugin {
    /// Creates the plugin for the given path prefixes, e.g. `"/api"`.
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    fn covers(&self, path: &str) -> bool {
        self.prefixes.iter().any(|prefix| is_under_prefix(path, prefix))
    }
}

impl<T: Send + Sync> Plugin<T> for ApiErrorPlugin {
    fn name(&self) -> &str {
        "api_errors"
    }

    fn on_error<'a>(
        &'a self,
        ctx: &'a mut RequestContext<T>,
        error: &'a GateError,
    ) -> BoxFuture<'a, Result<Option<Response>>> {
        Box::pin(async move {
            if !self.covers(&ctx.path) {
                return Ok(None);
            }
            Ok(Some(match error {
                GateError::Unauthenticated { .. } => {
                    Response::unauthorized("authentication required")
                }
                _ => Response::json(&serde_json::json!({ "error": "internal error" }), 500),
            }))
        })
    }
}
