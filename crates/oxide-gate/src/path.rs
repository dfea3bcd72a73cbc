//! Path pattern matching.
//!
//! Pattern syntax:
//! - `/users` - literal segments
//! - `/users/[id]` - bracket parameter, bound positionally
//! - `/docs/*` - trailing wildcard, only meaningful as the final segment
//!
//! Matching itself depends on the [`MatchKind`] a route was registered with:
//! exact routes compare byte-for-byte, prefix routes match the prefix and
//! anything below it. Bracket parameters are extracted for both kinds but
//! never widen what an exact route matches.

use crate::request::Params;

/// Name under which the wildcard remainder of a prefix match is bound.
pub const WILDCARD_PARAM: &str = "*";

/// How a route pattern is compared against request paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// `path == pattern`, no normalization.
    Exact,
    /// `path == prefix` or `path` starts with `prefix + "/"`.
    Prefix,
}

impl MatchKind {
    /// Returns the kind for an `is_exact` flag.
    pub const fn from_exact(is_exact: bool) -> Self {
        if is_exact {
            Self::Exact
        } else {
            Self::Prefix
        }
    }

    /// Returns the match kind as a string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Prefix => "prefix",
        }
    }
}

impl std::fmt::Display for MatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A segment in a path pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// A literal string segment.
    Literal(&'a str),
    /// A bracket parameter (e.g. `[id]`), holding the name.
    Param(&'a str),
    /// The `*` wildcard marker.
    Wildcard,
}

impl<'a> Segment<'a> {
    /// Classifies one `/`-separated pattern segment.
    pub fn parse(segment: &'a str) -> Self {
        if segment == "*" {
            return Self::Wildcard;
        }
        match segment.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            Some(name) if !name.is_empty() => Self::Param(name),
            _ => Self::Literal(segment),
        }
    }

    /// Returns true if this pattern segment accepts the given path segment.
    pub fn accepts(self, path_segment: &str) -> bool {
        match self {
            Self::Literal(lit) => lit == path_segment,
            Self::Param(_) | Self::Wildcard => true,
        }
    }
}

/// Counts non-empty `/`-separated segments.
pub fn segment_count(pattern: &str) -> usize {
    pattern.split('/').filter(|s| !s.is_empty()).count()
}

/// Strips one trailing `/*` from a pattern, if present.
pub fn strip_wildcard(pattern: &str) -> &str {
    pattern.strip_suffix("/*").unwrap_or(pattern)
}

/// Derives the stored prefix of a prefix route: the pattern without a
/// trailing `/*` and without a trailing slash.
pub fn normalize_prefix(pattern: &str) -> String {
    let base = strip_wildcard(pattern);
    base.strip_suffix('/').unwrap_or(base).to_string()
}

/// Returns true if `path` equals `prefix` or lies below it.
pub fn is_under_prefix(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Decides whether `path` satisfies `pattern`.
///
/// `prefix` is the normalized prefix stored at registration; when absent it
/// is derived from the pattern.
pub fn matches(path: &str, pattern: &str, kind: MatchKind, prefix: Option<&str>) -> bool {
    match kind {
        MatchKind::Exact => path == pattern,
        MatchKind::Prefix => match prefix {
            Some(prefix) => is_under_prefix(path, prefix),
            None => is_under_prefix(path, &normalize_prefix(pattern)),
        },
    }
}

/// Returns what follows the prefix in `path_segments`, joined with `/`.
///
/// The prefix is consumed segment by segment, so bracket segments in it
/// accept any value. `None` when the path does not lie under the prefix.
fn remainder(path_segments: &[&str], prefix: &str) -> Option<String> {
    let prefix_segments: Vec<&str> = prefix.split('/').collect();
    if path_segments.len() < prefix_segments.len() {
        return None;
    }
    let under = prefix_segments
        .iter()
        .zip(path_segments)
        .all(|(pattern, segment)| Segment::parse(pattern).accepts(segment));
    under.then(|| path_segments[prefix_segments.len()..].join("/"))
}

/// Extracts bracket and wildcard parameters.
///
/// Bracket segments bind to the path segment at the same index, or to the
/// empty string when the path is shorter. Prefix routes additionally bind
/// `*` to the path segments after the prefix's own segments.
pub fn extract_params(path: &str, pattern: &str, kind: MatchKind, prefix: Option<&str>) -> Params {
    let mut params = Params::new();
    let path_segments: Vec<&str> = path.split('/').collect();

    for (i, segment) in pattern.split('/').enumerate() {
        if let Segment::Param(name) = Segment::parse(segment) {
            params.insert(name, path_segments.get(i).copied().unwrap_or(""));
        }
    }

    if kind == MatchKind::Prefix {
        let derived;
        let prefix = match prefix {
            Some(prefix) => prefix,
            None => {
                derived = normalize_prefix(pattern);
                &derived
            }
        };
        if let Some(rest) = remainder(&path_segments, prefix) {
            params.insert(WILDCARD_PARAM, rest);
        }
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_parse() {
        assert_eq!(Segment::parse("users"), Segment::Literal("users"));
        assert_eq!(Segment::parse("[id]"), Segment::Param("id"));
        assert_eq!(Segment::parse("*"), Segment::Wildcard);
        assert_eq!(Segment::parse("[]"), Segment::Literal("[]"));
        assert_eq!(Segment::parse("[id"), Segment::Literal("[id"));
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("/docs/*"), "/docs");
        assert_eq!(normalize_prefix("/docs/"), "/docs");
        assert_eq!(normalize_prefix("/docs"), "/docs");
        assert_eq!(normalize_prefix("/"), "");
    }

    #[test]
    fn test_exact_is_byte_for_byte() {
        assert!(matches("/users", "/users", MatchKind::Exact, None));
        assert!(!matches("/users/", "/users", MatchKind::Exact, None));
        assert!(!matches("/users/42", "/users/[id]", MatchKind::Exact, None));
    }

    #[test]
    fn test_prefix_boundaries() {
        assert!(matches("/admin", "/admin", MatchKind::Prefix, Some("/admin")));
        assert!(matches("/admin/users", "/admin/*", MatchKind::Prefix, None));
        assert!(!matches("/administrator", "/admin", MatchKind::Prefix, None));
        assert!(matches("/anything", "/", MatchKind::Prefix, Some("")));
    }

    #[test]
    fn test_extract_bracket_params() {
        let params = extract_params("/users/42", "/users/[id]", MatchKind::Exact, None);
        assert_eq!(params.get("id"), Some("42"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_extract_missing_segment_binds_empty() {
        let params = extract_params("/users", "/users/[id]", MatchKind::Exact, None);
        assert_eq!(params.get("id"), Some(""));
    }

    #[test]
    fn test_extract_wildcard() {
        let params = extract_params("/docs/a/b", "/docs", MatchKind::Prefix, Some("/docs"));
        assert_eq!(params.get("*"), Some("a/b"));

        let params = extract_params("/docs", "/docs", MatchKind::Prefix, Some("/docs"));
        assert_eq!(params.get("*"), Some(""));
    }

    #[test]
    fn test_extract_mixed_bracket_and_wildcard() {
        let params = extract_params(
            "/org/acme/files/x/y",
            "/org/[org]/files/*",
            MatchKind::Prefix,
            None,
        );
        assert_eq!(params.get("org"), Some("acme"));
        assert_eq!(params.get("*"), Some("x/y"));

        let params =
            extract_params("/org/acme/files", "/org/[org]/files/*", MatchKind::Prefix, None);
        assert_eq!(params.get("*"), Some(""));
    }

    #[test]
    fn test_extract_wildcard_from_root_prefix() {
        let params = extract_params("/anything/below", "/", MatchKind::Prefix, Some(""));
        assert_eq!(params.get("*"), Some("anything/below"));
    }

    #[test]
    fn test_extract_wildcard_skipped_outside_prefix() {
        let params = extract_params("/other/x", "/docs/*", MatchKind::Prefix, None);
        assert_eq!(params.get("*"), None);
    }
}
