//! Declarative gate configuration.
//!
//! A JSON document describing routes, auth paths and the sign-in page can
//! be turned into a [`GateBuilder`] or a [`LegacyMatcher`].
//!
//! ```json
//! {
//!   "sign_in_path": "/login",
//!   "auth_paths": ["/login", "/api/*"],
//!   "routes": [
//!     { "pattern": "/admin", "exact": false, "roles": ["admin"] },
//!     { "pattern": "/reports", "permissions": ["reports.view"] }
//!   ]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::Metadata;
use crate::error::{GateError, Result};
use crate::fetch::UserFetcher;
use crate::gate::{GateBuilder, DEFAULT_SIGN_IN_PATH};
use crate::legacy::{legacy_rule, LegacyContext, LegacyControl, LegacyMatcher, SharedLegacyRule};
use crate::principal::Principal;
use crate::rules::{require_permission, require_role};
use crate::table::RouteOptions;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Where unauthenticated requests are redirected.
    #[serde(default = "default_sign_in_path")]
    pub sign_in_path: String,

    /// Paths that stay reachable when a request fails.
    #[serde(default)]
    pub auth_paths: Vec<String>,

    /// Gated routes.
    #[serde(default)]
    pub routes: Vec<RouteConfig>,

    /// Protected patterns for the legacy matcher.
    #[serde(default)]
    pub legacy_protected: Vec<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            sign_in_path: default_sign_in_path(),
            auth_paths: Vec::new(),
            routes: Vec::new(),
            legacy_protected: Vec::new(),
        }
    }
}

/// One gated route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Route pattern.
    pub pattern: String,

    /// Exact (default) or prefix matching.
    #[serde(default = "default_true")]
    pub exact: bool,

    /// The user must hold one of these roles.
    #[serde(default)]
    pub roles: Vec<String>,

    /// The user must hold each of these permissions.
    #[serde(default)]
    pub permissions: Vec<String>,

    /// Copied into the request metadata when the route matches.
    #[serde(default)]
    pub metadata: Metadata,
}

fn default_sign_in_path() -> String {
    DEFAULT_SIGN_IN_PATH.to_string()
}

fn default_true() -> bool {
    true
}

impl GateConfig {
    /// Parses and validates a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading gate config");
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Checks that every pattern is an absolute path.
    pub fn validate(&self) -> Result<()> {
        if !self.sign_in_path.starts_with('/') {
            return Err(GateError::Config(format!(
                "sign_in_path must start with '/': {}",
                self.sign_in_path
            )));
        }
        let patterns = self
            .routes
            .iter()
            .map(|r| &r.pattern)
            .chain(&self.auth_paths)
            .chain(&self.legacy_protected);
        for pattern in patterns {
            if !pattern.starts_with('/') {
                return Err(GateError::Config(format!(
                    "pattern must start with '/': {pattern:?}"
                )));
            }
        }
        Ok(())
    }

    /// Registers the configured routes, auth paths and sign-in page.
    pub fn apply<T>(&self, builder: GateBuilder<T>) -> GateBuilder<T>
    where
        T: Principal + Send + Sync + 'static,
    {
        let builder = self
            .routes
            .iter()
            .fold(builder, |builder, route| {
                builder.route(&route.pattern, route.options())
            });
        builder
            .register_auth_paths(self.auth_paths.iter().cloned())
            .sign_in_path(self.sign_in_path.clone())
    }

    /// Builds a legacy matcher from the same routes.
    ///
    /// Prefix routes become `/*` patterns. Routes with roles or permissions
    /// redirect users lacking them to the sign-in page.
    pub fn legacy_matcher<T>(&self, fetcher: impl UserFetcher<T> + 'static) -> LegacyMatcher<T>
    where
        T: Principal + Send + Sync + 'static,
    {
        let matcher = LegacyMatcher::new(fetcher).protect(self.legacy_protected.iter().cloned());
        self.routes.iter().fold(matcher, |matcher, route| {
            let mut rules = Vec::new();
            if !route.roles.is_empty() {
                rules.push(legacy_role_rule(route.roles.clone(), self.sign_in_path.clone()));
            }
            if !route.permissions.is_empty() {
                rules.push(legacy_permission_rule(
                    route.permissions.clone(),
                    self.sign_in_path.clone(),
                ));
            }
            matcher.route(&route.legacy_pattern(), rules)
        })
    }
}

impl RouteConfig {
    fn options<T>(&self) -> RouteOptions<T>
    where
        T: Principal + Send + Sync + 'static,
    {
        let mut options = RouteOptions::new().exact(self.exact);
        if !self.roles.is_empty() {
            options = options.rule(require_role(self.roles.iter().cloned()));
        }
        for permission in &self.permissions {
            options = options.rule(require_permission(permission.clone()));
        }
        options.metadata = self.metadata.clone();
        options
    }

    fn legacy_pattern(&self) -> String {
        if self.exact || self.pattern.ends_with("/*") {
            self.pattern.clone()
        } else {
            format!("{}/*", self.pattern.trim_end_matches('/'))
        }
    }
}

fn legacy_role_rule<T>(roles: Vec<String>, sign_in: String) -> SharedLegacyRule<T>
where
    T: Principal + Sync + 'static,
{
    legacy_rule(move |ctx: &LegacyContext<T>, control: &mut LegacyControl| {
        let allowed = ctx
            .data
            .as_ref()
            .is_some_and(|user| roles.iter().any(|role| user.has_role(role)));
        if allowed {
            control.next();
        } else {
            control.redirect(sign_in.clone(), None);
        }
        Ok(())
    })
}

fn legacy_permission_rule<T>(permissions: Vec<String>, sign_in: String) -> SharedLegacyRule<T>
where
    T: Principal + Sync + 'static,
{
    legacy_rule(move |ctx: &LegacyContext<T>, control: &mut LegacyControl| {
        let allowed = ctx.data.as_ref().is_some_and(|user| {
            permissions
                .iter()
                .all(|permission| user.has_permission(permission))
        });
        if allowed {
            control.next();
        } else {
            control.redirect(sign_in.clone(), None);
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::User;
    use crate::request::Request;

    const CONFIG: &str = r#"{
        "sign_in_path": "/login",
        "auth_paths": ["/login", "/api/*"],
        "routes": [
            { "pattern": "/admin", "exact": false, "roles": ["admin"], "metadata": { "section": "admin" } },
            { "pattern": "/reports", "permissions": ["reports.view"] }
        ],
        "legacy_protected": ["/admin/*"]
    }"#;

    fn member(_req: Request) -> futures::future::Ready<Result<Option<User>>> {
        futures::future::ready(Ok(Some(User::new("m").with_role("member"))))
    }

    #[test]
    fn test_parse_defaults() {
        let config = GateConfig::from_json(r#"{"routes": [{"pattern": "/a"}]}"#).unwrap();
        assert_eq!(config.sign_in_path, "/sign-in");
        assert!(config.routes[0].exact);
        assert!(config.routes[0].roles.is_empty());
    }

    #[test]
    fn test_relative_pattern_is_rejected() {
        let err = GateConfig::from_json(r#"{"routes": [{"pattern": "admin"}]}"#).unwrap_err();
        assert!(matches!(err, GateError::Config(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = GateConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, GateError::Io(_)));
    }

    #[tokio::test]
    async fn test_apply_builds_gate() {
        let config = GateConfig::from_json(CONFIG).unwrap();
        let gate = config.apply(GateBuilder::new(member)).build();

        assert_eq!(gate.table().len(), 2);
        assert_eq!(gate.sign_in(), "/login");
        assert!(gate.is_auth_path("/api/items"));

        let res = gate.handle(Request::get("/admin/users")).await;
        assert_eq!(res.status, 403);
        let res = gate.handle(Request::get("/reports")).await;
        assert_eq!(res.status, 403);
        let res = gate.handle(Request::get("/")).await;
        assert!(res.is_pass_through());
    }

    #[tokio::test]
    async fn test_legacy_matcher_from_config() {
        let config = GateConfig::from_json(CONFIG).unwrap();
        let matcher = config.legacy_matcher(member);

        let order: Vec<_> = matcher.patterns().collect();
        assert_eq!(order, ["/reports", "/admin/*"]);

        let res = matcher.handle(Request::get("/admin/users")).await.unwrap();
        assert_eq!(res.location(), Some("/login"));
    }

    #[tokio::test]
    async fn test_legacy_matcher_enforces_permissions() {
        let config = GateConfig::from_json(CONFIG).unwrap();

        let res = config
            .legacy_matcher(member)
            .handle(Request::get("/reports"))
            .await
            .unwrap();
        assert_eq!(res.location(), Some("/login"));

        let viewer = |_req: Request| {
            futures::future::ready(Ok::<_, GateError>(Some(
                User::new("v").with_permission("reports.view"),
            )))
        };
        let res = config
            .legacy_matcher(viewer)
            .handle(Request::get("/reports"))
            .await
            .unwrap();
        assert!(res.is_pass_through());
    }
}
