//! Parameter namespace paths.
//!
//! Every node evaluated in a pass is bound to a scope like
//! `"parameters/Transition/StateA/"`. A child scope is the parent scope with
//! the child's name and a trailing separator appended; a parameter key is
//! the scope with the parameter name appended (no trailing separator).
//! Nodes inside a blend-tree container are scoped under the *container's*
//! scope, so their parameters sit flat beside the container's own.

use std::fmt;

pub const SEPARATOR: char = '/';

/// Root scope for a tree's parameters.
pub const ROOT_SCOPE: &str = "parameters/";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopedPath(String);

impl ScopedPath {
    pub fn root() -> ScopedPath {
        ScopedPath(ROOT_SCOPE.to_string())
    }

    /// Scope of a child node: `"{self}{name}/"`.
    pub fn join(&self, name: &str) -> ScopedPath {
        let mut s = String::with_capacity(self.0.len() + name.len() + 1);
        s.push_str(&self.0);
        s.push_str(name);
        s.push(SEPARATOR);
        ScopedPath(s)
    }

    /// Full key of a parameter declared in this scope: `"{self}{name}"`.
    pub fn param(&self, name: &str) -> String {
        format!("{}{}", self.0, name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
