//! Error types for the gate pipeline.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use thiserror::Error;

/// Gate-specific errors.
///
/// Everything except [`GateError::Plugin`] is a request-level failure: it
/// is routed to the plugins' `on_error` hooks and then to the default
/// fallback policy. The request handler itself never returns an error.
#[derive(Debug, Error)]
pub enum GateError {
    /// A rule in the matched chain failed.
    #[error("rule '{rule}' failed: {message}")]
    Rule { rule: String, message: String },

    /// The user-data fetcher returned nothing for a matched path.
    #[error("no user data for {path}")]
    Unauthenticated { path: String },

    /// The user-data fetcher itself failed.
    #[error("user fetch failed: {0}")]
    Fetch(String),

    /// A plugin hook failed. Logged and swallowed by the pipeline.
    #[error("plugin '{plugin}' failed in {hook}: {message}")]
    Plugin {
        plugin: String,
        hook: String,
        message: String,
    },

    /// A rule, hook or fetcher panicked.
    #[error("panicked: {0}")]
    Panicked(String),

    /// Cache storage failure.
    #[error("cache error: {0}")]
    Cache(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error while loading configuration.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl GateError {
    /// Creates a rule failure.
    pub fn rule(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rule {
            rule: rule.into(),
            message: message.into(),
        }
    }

    /// Creates a plugin hook failure.
    pub fn plugin(
        plugin: impl Into<String>,
        hook: impl std::fmt::Display,
        message: impl Into<String>,
    ) -> Self {
        Self::Plugin {
            plugin: plugin.into(),
            hook: hook.to_string(),
            message: message.into(),
        }
    }

    /// Converts a caught panic payload into an error.
    pub(crate) fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Self::Panicked(message)
    }
}

/// Result type alias for gate operations.
pub type Result<T> = std::result::Result<T, GateError>;

/// Awaits `fut`, turning a panic inside it into [`GateError::Panicked`].
pub(crate) async fn guarded<F, T>(fut: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(GateError::from_panic(payload.as_ref())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = GateError::rule("admin-only", "boom");
        assert_eq!(err.to_string(), "rule 'admin-only' failed: boom");

        let err = GateError::plugin("cache", "before_request", "down");
        assert_eq!(
            err.to_string(),
            "plugin 'cache' failed in before_request: down"
        );
    }

    #[test]
    fn test_from_panic() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("bad state");
        let err = GateError::from_panic(payload.as_ref());
        assert!(matches!(err, GateError::Panicked(ref m) if m == "bad state"));

        let payload: Box<dyn std::any::Any + Send> = Box::new(42_u8);
        let err = GateError::from_panic(payload.as_ref());
        assert!(matches!(err, GateError::Panicked(ref m) if m == "unknown panic"));
    }

    #[tokio::test]
    async fn test_guarded_catches_panic() {
        let ok = guarded(async { Ok::<_, GateError>(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        async fn explode() -> Result<u8> {
            panic!("rule exploded")
        }

        let caught = guarded(explode()).await;
        assert!(matches!(caught, Err(GateError::Panicked(ref m)) if m == "rule exploded"));
    }
}
