//! Route precedence.
//!
//! Lower values are tried first. Exact routes get `segments * 10`, prefix
//! routes get `1000 + (100 - segments)`, so deeper prefixes outrank
//! shallower ones and exact routes outrank prefix routes below the
//! [`MAX_PREFIX_DEPTH`] ceiling. Deeper patterns are not supported.

use crate::path::{segment_count, strip_wildcard};

/// Offset separating prefix priorities from exact priorities.
pub const PREFIX_BASE: i32 = 1000;

/// Segment ceiling for prefix priorities.
pub const MAX_PREFIX_DEPTH: i32 = 100;

/// Spread between exact priorities of adjacent depths.
pub const EXACT_STEP: i32 = 10;

/// Computes the priority of a pattern.
pub fn priority(pattern: &str, is_exact: bool) -> i32 {
    if is_exact {
        depth(pattern) * EXACT_STEP
    } else {
        PREFIX_BASE + (MAX_PREFIX_DEPTH - depth(strip_wildcard(pattern)))
    }
}

fn depth(pattern: &str) -> i32 {
    i32::try_from(segment_count(pattern)).unwrap_or(i32::MAX / EXACT_STEP)
}
