//
//  router.rs
//  routegraph
//
//  Created by hak (tharun)
//

//! Hono-style path patterns compiled to regular expressions.
//!
//! Supported syntax: literal segments, `:param`, `:param?`,
//! `:param{regex}`, OpenAPI `{param}` and `*`. One trailing slash is ignored.
//!
//! This is an ordered first-match approximation of Hono's routers, not a
//! port of them. Router options such as `strict` and `getPath` are not
//! modelled, host and header based routing is not supported, and a custom
//! `:param{regex}` is handed to the `regex` crate as written, so patterns
//! using lookaround or backreferences fail to compile here.

use regex::Regex;

use crate::error::{Result, RouteGraphError};

/// A compiled route path.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    exact: Regex,
    prefix: Regex,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        let body = pattern_body(pattern)?;
        let compile = |source: String| {
            Regex::new(&source).map_err(|e| RouteGraphError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
        };
        Ok(Self {
            raw: pattern.to_string(),
            exact: compile(format!("^{body}/?$"))?,
            prefix: compile(format!("^{body}(?P<rest>/.*)?$"))?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the whole of `path` matches.
    pub fn matches(&self, path: &str) -> bool {
        self.exact.is_match(path)
    }

    /// Whether `path` lies under this pattern (middleware scope).
    pub fn matches_prefix(&self, path: &str) -> bool {
        self.prefix.is_match(path)
    }

    /// Remainder of `path` below this pattern, for mounted routers.
    pub fn strip_prefix(&self, path: &str) -> Option<String> {
        let captures = self.prefix.captures(path)?;
        let rest = captures.name("rest").map_or("", |m| m.as_str());
        Some(if rest.is_empty() { "/".to_string() } else { rest.to_string() })
    }
}

/// Regex source for `pattern`, without anchors. The root pattern is empty.
fn pattern_body(pattern: &str) -> Result<String> {
    let segments = split_segments(pattern).map_err(|reason| RouteGraphError::InvalidPattern {
        pattern: pattern.to_string(),
        reason,
    })?;

    let mut body = String::new();
    let last = segments.len().saturating_sub(1);
    for (i, segment) in segments.iter().enumerate() {
        if segment == "*" {
            body.push_str(if i == last { "(?:/.*)?" } else { "/.*" });
        } else if segment.len() > 2 && segment.starts_with('{') && segment.ends_with('}') {
            // OpenAPI-style `{id}`
            body.push_str("/(?:[^/]+)");
        } else if let Some(param) = segment.strip_prefix(':') {
            let (param, optional) = match param.strip_suffix('?') {
                Some(param) => (param, true),
                None => (param, false),
            };
            let matcher = match (param.find('{'), param.ends_with('}')) {
                (Some(open), true) => param[open + 1..param.len() - 1].to_string(),
                _ => "[^/]+".to_string(),
            };
            if optional {
                body.push_str(&format!("(?:/(?:{matcher}))?"));
            } else {
                body.push_str(&format!("/(?:{matcher})"));
            }
        } else {
            body.push('/');
            body.push_str(&regex::escape(segment).replace("\\*", ".*"));
        }
    }
    Ok(body)
}

/// Non-empty `/`-separated segments, keeping `/` inside `{...}` intact.
fn split_segments(pattern: &str) -> std::result::Result<Vec<String>, String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in pattern.chars() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| "unbalanced `}`".to_string())?;
            }
            '/' if depth == 0 => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    if depth != 0 {
        return Err("unbalanced `{`".to_string());
    }
    if !current.is_empty() {
        segments.push(current);
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(p: &str) -> PathPattern {
        PathPattern::parse(p).unwrap()
    }

    #[test]
    fn test_params_and_trailing_slash() {
        let p = pattern("/users/:id");
        assert!(p.matches("/users/1"));
        assert!(p.matches("/users/1/"));
        assert!(!p.matches("/users"));
        assert!(!p.matches("/users/1/posts"));

        assert!(pattern("/").matches("/"));
        assert!(pattern("").matches("/"));
    }

    #[test]
    fn test_optional_and_custom_params() {
        let optional = pattern("/api/animal/:type?");
        assert!(optional.matches("/api/animal"));
        assert!(optional.matches("/api/animal/cat"));

        let numeric = pattern("/post/:id{[0-9]+}");
        assert!(numeric.matches("/post/42"));
        assert!(!numeric.matches("/post/abc"));

        let slashy = pattern("/files/:path{.+/.+}");
        assert!(slashy.matches("/files/a/b"));

        let openapi = pattern("/users/{id}");
        assert!(openapi.matches("/users/42"));
        assert!(!openapi.matches("/users"));
    }

    #[test]
    fn test_wildcards() {
        let all = pattern("*");
        assert!(all.matches("/anything/at/all"));
        assert!(all.matches("/"));

        let scoped = pattern("/api/*");
        assert!(scoped.matches("/api/users"));
        assert!(scoped.matches("/api"));
        assert!(!scoped.matches("/other"));
    }

    #[test]
    fn test_prefix_matching_and_stripping() {
        let mount = pattern("/user");
        assert_eq!(mount.strip_prefix("/user/1").as_deref(), Some("/1"));
        assert_eq!(mount.strip_prefix("/user").as_deref(), Some("/"));
        assert_eq!(mount.strip_prefix("/users/1"), None);
        assert!(mount.matches_prefix("/user/1/posts"));

        let root = pattern("/");
        assert_eq!(root.strip_prefix("/a/b").as_deref(), Some("/a/b"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            PathPattern::parse("/post/:id{[0-9+}"),
            Err(RouteGraphError::InvalidPattern { .. })
        ));
        assert!(PathPattern::parse("/post/:id{x").is_err());
    }

    #[test]
    fn test_lookaround_params_are_rejected() {
        assert!(matches!(
            PathPattern::parse("/files/:name{(?!index).+}"),
            Err(RouteGraphError::InvalidPattern { .. })
        ));
    }
}
