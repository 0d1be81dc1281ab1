//! Route matching logic.
//!
//! # Responsibilities
//! - Match request method (GET also answers HEAD)
//! - Match exact endpoint paths
//! - Match mount prefixes on path segment boundaries
//!
//! # Design Decisions
//! - Case-insensitive and trailing-slash tolerant unless configured otherwise
//! - Mount prefixes ignore `strict`: `/api/auth/` and `/api/auth` both enter the group
//! - No regex to guarantee O(n) matching

use axum::body::Body;
use axum::http::{Method, Request};
use serde::{Deserialize, Serialize};

/// Path comparison settings shared by every route in a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingOptions {
    /// Treat `/Foo` and `/foo` as different paths.
    pub case_sensitive: bool,
    /// Treat `/foo` and `/foo/` as different paths.
    pub strict: bool,
}

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &Request<Body>, options: &RoutingOptions) -> bool;
}

/// Matches the request method.
#[derive(Debug, Clone)]
pub struct MethodMatcher {
    method: Method,
}

impl MethodMatcher {
    pub fn new(method: Method) -> Self {
        Self { method }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, req: &Request<Body>, _options: &RoutingOptions) -> bool {
        req.method() == self.method
            || (self.method == Method::GET && req.method() == Method::HEAD)
    }
}

/// Matches one exact path.
#[derive(Debug, Clone)]
pub struct ExactPathMatcher {
    path: String,
}

impl ExactPathMatcher {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Matcher for ExactPathMatcher {
    fn matches(&self, req: &Request<Body>, options: &RoutingOptions) -> bool {
        let expected = trim_trailing_slash(&self.path, options);
        let actual = trim_trailing_slash(req.uri().path(), options);
        eq_path(expected, actual, options)
    }
}

/// Matches a mount prefix and yields the remainder of the path.
#[derive(Debug, Clone)]
pub struct MountPrefixMatcher {
    prefix: String,
}

impl MountPrefixMatcher {
    /// The prefix is stored without a trailing slash; `/` mounts at the root.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = prefix.trim_end_matches('/');
        Self {
            prefix: prefix.to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        if self.prefix.is_empty() {
            "/"
        } else {
            &self.prefix
        }
    }

    /// The path as seen from inside the mounted group, if `path` is under this prefix.
    pub fn strip<'p>(&self, path: &'p str, options: &RoutingOptions) -> Option<&'p str> {
        let head = path.get(..self.prefix.len())?;
        if !eq_path(head, &self.prefix, options) {
            return None;
        }
        let rest = &path[self.prefix.len()..];
        if rest.is_empty() {
            Some("/")
        } else if rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }
}

impl Matcher for MountPrefixMatcher {
    fn matches(&self, req: &Request<Body>, options: &RoutingOptions) -> bool {
        self.strip(req.uri().path(), options).is_some()
    }
}

fn trim_trailing_slash<'p>(path: &'p str, options: &RoutingOptions) -> &'p str {
    if !options.strict && path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

fn eq_path(a: &str, b: &str, options: &RoutingOptions) -> bool {
    if options.case_sensitive {
        a == b
    } else {
        a.eq_ignore_ascii_case(b)
    }
}
