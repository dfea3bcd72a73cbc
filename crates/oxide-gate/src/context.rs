//! Per-request state shared by plugins and rules.

use std::collections::HashMap;

use crate::request::{Params, Request};

/// Free-form values plugins and rules use to talk to each other.
pub type Metadata = HashMap<String, serde_json::Value>;

/// Where a request currently is in the gate pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// `before_request` hooks are running.
    BeforeRequest,
    /// The route table is resolving the path.
    Resolving,
    /// The user-data fetcher is running.
    FetchingData,
    /// The matched rule chain is running.
    ExecutingRules,
    /// `after_request` hooks are running.
    AfterRequest,
}

impl Stage {
    /// Returns the stage as a string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BeforeRequest => "before_request",
            Self::Resolving => "resolving",
            Self::FetchingData => "fetching_data",
            Self::ExecutingRules => "executing_rules",
            Self::AfterRequest => "after_request",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State for one request, created on arrival and dropped when the gate
/// answers.
#[derive(Debug, Clone)]
pub struct RequestContext<T> {
    /// User data from the fetcher, or supplied early by a plugin.
    pub data: Option<T>,
    /// The request being decided on.
    pub req: Request,
    /// Request path.
    pub path: String,
    /// Parameters bound by the matched route.
    pub params: Params,
    /// Shared scratch space for plugins and rules.
    pub metadata: Metadata,
    /// Pattern of the matched route, once resolved.
    pub matched: Option<String>,
    stage: Stage,
}

impl<T> RequestContext<T> {
    /// Creates a context for a freshly received request.
    pub fn new(req: Request) -> Self {
        Self {
            data: None,
            path: req.path.clone(),
            req,
            params: Params::new(),
            metadata: Metadata::new(),
            matched: None,
            stage: Stage::BeforeRequest,
        }
    }

    /// Returns the current pipeline stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub(crate) fn enter(&mut self, stage: Stage) {
        self.stage = stage;
    }

    /// Reads a metadata value.
    pub fn meta(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }

    /// Writes a metadata value.
    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.metadata.insert(key.into(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context() {
        let ctx: RequestContext<()> = RequestContext::new(Request::get("/a/b"));
        assert_eq!(ctx.path, "/a/b");
        assert!(ctx.data.is_none());
        assert!(ctx.params.is_empty());
        assert_eq!(ctx.stage(), Stage::BeforeRequest);
    }

    #[test]
    fn test_metadata() {
        let mut ctx: RequestContext<()> = RequestContext::new(Request::get("/"));
        ctx.set_meta("locale", "fr");
        assert_eq!(ctx.meta("locale"), Some(&serde_json::json!("fr")));
        assert_eq!(ctx.meta("missing"), None);
    }
}
