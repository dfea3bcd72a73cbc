//! The route table: registered routes kept in precedence order.

use crate::context::Metadata;
use crate::path::{self, MatchKind};
use crate::priority::priority;
use crate::request::Params;
use crate::rule::SharedRule;

/// A registered route.
pub struct RouteDefinition<T> {
    pattern: String,
    kind: MatchKind,
    rules: Vec<SharedRule<T>>,
    priority: i32,
    prefix: Option<String>,
    metadata: Metadata,
}

impl<T> RouteDefinition<T> {
    fn new(pattern: &str, kind: MatchKind, rules: Vec<SharedRule<T>>, metadata: Metadata) -> Self {
        let is_exact = kind == MatchKind::Exact;
        Self {
            pattern: pattern.to_string(),
            kind,
            rules,
            priority: priority(pattern, is_exact),
            prefix: (!is_exact).then(|| path::normalize_prefix(pattern)),
            metadata,
        }
    }

    /// The pattern as registered.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// How the pattern is matched.
    pub fn kind(&self) -> MatchKind {
        self.kind
    }

    /// Rule chain, in registration order.
    pub fn rules(&self) -> &[SharedRule<T>] {
        &self.rules
    }

    /// Precedence; lower is tried first.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Normalized prefix, for prefix routes.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Route metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Returns true if `path` satisfies this route.
    pub fn matches(&self, path: &str) -> bool {
        path::matches(path, &self.pattern, self.kind, self.prefix())
    }

    /// Extracts this route's parameters from `path`.
    pub fn params(&self, path: &str) -> Params {
        path::extract_params(path, &self.pattern, self.kind, self.prefix())
    }
}

impl<T> std::fmt::Debug for RouteDefinition<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteDefinition")
            .field("pattern", &self.pattern)
            .field("kind", &self.kind)
            .field(
                "rules",
                &self.rules.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .field("priority", &self.priority)
            .field("prefix", &self.prefix)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Options for [`RouteTable::register_custom`].
pub struct RouteOptions<T> {
    /// Rule chain.
    pub rules: Vec<SharedRule<T>>,
    /// Exact (default) or prefix matching.
    pub is_exact: bool,
    /// Free-form route metadata.
    pub metadata: Metadata,
}

impl<T> Default for RouteOptions<T> {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            is_exact: true,
            metadata: Metadata::new(),
        }
    }
}

impl<T> RouteOptions<T> {
    /// Creates options for an exact route with no rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rule.
    #[must_use]
    pub fn rule(mut self, rule: SharedRule<T>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Sets exact or prefix matching.
    #[must_use]
    pub fn exact(mut self, is_exact: bool) -> Self {
        self.is_exact = is_exact;
        self
    }

    /// Sets a metadata entry.
    #[must_use]
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Registered routes, ordered by ascending priority.
///
/// Routes with equal priority keep their registration order.
///
/// # Example
///
/// ```
/// use oxide_gate::RouteTable;
///
/// let table: RouteTable<()> = RouteTable::new()
///     .register_prefix("/admin", [])
///     .register_prefix("/admin/users", [])
///     .register_exact("/admin/users/new", []);
///
/// assert_eq!(table.resolve("/admin/users/5").unwrap().pattern(), "/admin/users");
/// assert_eq!(table.resolve("/admin/users/new").unwrap().pattern(), "/admin/users/new");
/// assert!(table.resolve("/blog").is_none());
/// ```
pub struct RouteTable<T> {
    routes: Vec<RouteDefinition<T>>,
}

impl<T> Default for RouteTable<T> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<T> RouteTable<T> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an exact route.
    #[must_use]
    pub fn register_exact<I>(self, pattern: &str, rules: I) -> Self
    where
        I: IntoIterator<Item = SharedRule<T>>,
    {
        self.insert(RouteDefinition::new(
            pattern,
            MatchKind::Exact,
            rules.into_iter().collect(),
            Metadata::new(),
        ))
    }

    /// Registers a prefix route.
    #[must_use]
    pub fn register_prefix<I>(self, pattern: &str, rules: I) -> Self
    where
        I: IntoIterator<Item = SharedRule<T>>,
    {
        self.insert(RouteDefinition::new(
            pattern,
            MatchKind::Prefix,
            rules.into_iter().collect(),
            Metadata::new(),
        ))
    }

    /// Registers a route with explicit options.
    #[must_use]
    pub fn register_custom(self, pattern: &str, options: RouteOptions<T>) -> Self {
        self.insert(RouteDefinition::new(
            pattern,
            MatchKind::from_exact(options.is_exact),
            options.rules,
            options.metadata,
        ))
    }

    fn insert(mut self, route: RouteDefinition<T>) -> Self {
        let at = self
            .routes
            .partition_point(|existing| existing.priority <= route.priority);
        self.routes.insert(at, route);
        self
    }

    /// Returns the first route, in priority order, that matches `path`.
    pub fn resolve(&self, path: &str) -> Option<&RouteDefinition<T>> {
        self.routes.iter().find(|route| route.matches(path))
    }

    /// Routes in priority order.
    pub fn routes(&self) -> impl Iterator<Item = &RouteDefinition<T>> {
        self.routes.iter()
    }

    /// Number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if no routes are registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::rule::rule_fn;

    fn table() -> RouteTable<()> {
        RouteTable::new()
            .register_prefix("/admin", [])
            .register_exact("/", [])
            .register_prefix("/admin/users", [])
            .register_exact("/admin", [])
            .register_custom("/docs/*", RouteOptions::new().exact(false).meta("section", "docs"))
    }

    #[test]
    fn test_priority_order() {
        let table = table();
        let order: Vec<(&str, i32)> = table
            .routes()
            .map(|r| (r.pattern(), r.priority()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("/", 0),
                ("/admin", 10),
                ("/admin/users", 1098),
                ("/admin", 1099),
                ("/docs/*", 1099),
            ]
        );
    }

    #[test]
    fn test_resolve_most_specific_prefix() {
        let table = table();
        assert_eq!(table.resolve("/admin/users/5").unwrap().pattern(), "/admin/users");
        assert_eq!(table.resolve("/admin/settings").unwrap().kind(), MatchKind::Prefix);
        assert_eq!(table.resolve("/admin").unwrap().kind(), MatchKind::Exact);
        assert!(table.resolve("/blog").is_none());
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let table = table();
        let first = table.resolve("/docs/guide").map(RouteDefinition::pattern);
        for _ in 0..5 {
            assert_eq!(table.resolve("/docs/guide").map(RouteDefinition::pattern), first);
        }
    }

    #[test]
    fn test_custom_route_metadata_and_prefix() {
        let table = table();
        let docs = table.resolve("/docs/a/b").unwrap();
        assert_eq!(docs.prefix(), Some("/docs"));
        assert_eq!(docs.metadata().get("section"), Some(&serde_json::json!("docs")));
        assert_eq!(docs.params("/docs/a/b").get("*"), Some("a/b"));
    }

    #[test]
    fn test_equal_priority_keeps_registration_order() {
        let table: RouteTable<()> = RouteTable::new()
            .register_prefix("/a", [rule_fn("first", |_: &mut RequestContext<()>| Ok(None))])
            .register_prefix("/a/", [rule_fn("second", |_: &mut RequestContext<()>| Ok(None))]);
        let route = table.resolve("/a/x").unwrap();
        assert_eq!(route.rules()[0].name(), "first");
        assert_eq!(route.prefix(), Some("/a"));
    }
}
