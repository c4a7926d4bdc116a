//! # Route Patterns
//!
//! Path templates composed of literal segments and `:name` parameter
//! segments, compiled once at registration time and matched
//! segment-for-segment against request paths.
//!
//! Matching is a pure function: no side effects, safe to call
//! concurrently and repeatedly. A non-matching path is an expected
//! outcome (`None`), not an error.

use crate::error::{Error, Result};
use std::collections::HashMap;

/// One segment of a compiled pattern
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Must match the candidate segment byte-for-byte
    Literal(String),
    /// Matches any non-empty candidate segment and binds it under the name
    Param(String),
}

/// A compiled path template such as `/users/:id`
///
/// Immutable after parsing; owned by the route table entry that
/// registered it.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Compile a path template
    ///
    /// Splits the pattern on `/`; any segment starting with `:` becomes a
    /// named parameter, everything else is a literal. Parameter names must
    /// be unique within one pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] for structurally invalid input:
    /// an empty pattern, a pattern not starting with `/`, an empty
    /// segment, an unnamed parameter (`:`), or a duplicated parameter name.
    pub fn parse(pattern: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidPath {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        if pattern.is_empty() {
            return Err(invalid("pattern is empty"));
        }
        let Some(rest) = pattern.strip_prefix('/') else {
            return Err(invalid("pattern must start with '/'"));
        };

        let mut segments = Vec::new();
        let mut seen = Vec::new();
        if !rest.is_empty() {
            for part in rest.split('/') {
                if part.is_empty() {
                    return Err(invalid("empty segment"));
                }
                if let Some(name) = part.strip_prefix(':') {
                    if name.is_empty() {
                        return Err(invalid("empty parameter name"));
                    }
                    if seen.contains(&name) {
                        return Err(invalid("duplicate parameter name"));
                    }
                    seen.push(name);
                    segments.push(Segment::Param(name.to_string()));
                } else {
                    segments.push(Segment::Literal(part.to_string()));
                }
            }
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    /// Match a concrete path against this pattern
    ///
    /// Requires equal segment counts. Literal segments compare
    /// byte-for-byte; parameter segments bind any non-empty candidate
    /// segment. An empty candidate segment never matches a parameter.
    ///
    /// Returns the parameter bindings on success, `None` otherwise.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<HashMap<String, String>> {
        let candidate = split_path(path)?;
        if candidate.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(candidate) {
            match segment {
                Segment::Literal(literal) => {
                    if literal != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(params)
    }

    /// The original pattern text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Number of segments in the pattern
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }
}

/// Split a request path into segments; `None` if it does not start with `/`
fn split_path(path: &str) -> Option<Vec<&str>> {
    let rest = path.strip_prefix('/')?;
    if rest.is_empty() {
        return Some(Vec::new());
    }
    Some(rest.split('/').collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_literals_and_params() {
        let pattern = RoutePattern::parse("/users/:id/posts").unwrap();
        assert_eq!(pattern.segment_count(), 3);
        assert_eq!(pattern.as_str(), "/users/:id/posts");
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!(RoutePattern::parse("").is_err());
        assert!(RoutePattern::parse("users").is_err());
        assert!(RoutePattern::parse("/users//posts").is_err());
        assert!(RoutePattern::parse("/users/:").is_err());
        assert!(RoutePattern::parse("/a/:x/b/:x").is_err());
    }

    #[test]
    fn test_match_binds_parameters() {
        let pattern = RoutePattern::parse("/a/:x/b/:y").unwrap();
        let params = pattern.match_path("/a/1/b/2").unwrap();
        assert_eq!(params.get("x").map(String::as_str), Some("1"));
        assert_eq!(params.get("y").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_match_wrong_segment_count() {
        let pattern = RoutePattern::parse("/a/:x/b/:y").unwrap();
        assert!(pattern.match_path("/a/1/b").is_none());
        assert!(pattern.match_path("/a/1/b/2/3").is_none());
    }

    #[test]
    fn test_match_literal_mismatch() {
        let pattern = RoutePattern::parse("/a/:x/b/:y").unwrap();
        assert!(pattern.match_path("/a/1/c/2").is_none());
    }

    #[test]
    fn test_match_rejects_empty_parameter_segment() {
        let pattern = RoutePattern::parse("/a/:x/b/:y").unwrap();
        assert!(pattern.match_path("/a//b/2").is_none());
    }

    #[test]
    fn test_match_root() {
        let pattern = RoutePattern::parse("/").unwrap();
        assert!(pattern.match_path("/").is_some());
        assert!(pattern.match_path("/a").is_none());
    }

    #[test]
    fn test_match_trailing_slash_differs() {
        let pattern = RoutePattern::parse("/users").unwrap();
        assert!(pattern.match_path("/users").is_some());
        assert!(pattern.match_path("/users/").is_none());
    }

    #[test]
    fn test_match_is_repeatable() {
        let pattern = RoutePattern::parse("/users/:id").unwrap();
        let first = pattern.match_path("/users/7").unwrap();
        let second = pattern.match_path("/users/7").unwrap();
        assert_eq!(first, second);
    }
}
