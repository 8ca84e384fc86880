//! Hierarchical namespaces in which blocks create their artifacts.
//!
//! Scopes are plain values threaded explicitly through construction; there is
//! no ambient "current scope". The namespace registry itself lives in the
//! [`Graph`], so two scopes with the same absolute path in the same graph are
//! the same namespace entry.
//!
//! Entering with `reuse = true` yields an *alias* of an existing entry, never a
//! copy: state looked up through one alias is the same handle seen through all
//! of them, so a value written through one is visible through every other.

use std::fmt;

use regex::Regex;
use tracing::debug;

use crate::error::{BloxError, BloxResult};
use crate::graph::Graph;

/// Separator between scope path components.
pub const SEPARATOR: char = '/';

#[derive(Clone)]
pub struct Scope {
    graph: Graph,
    relative: String,
    absolute: String,
    reuse: bool,
}

impl Scope {
    /// The unnamed root of `graph`'s namespace tree.
    pub fn root(graph: &Graph) -> Self {
        Self { graph: graph.clone(), relative: String::new(), absolute: String::new(), reuse: false }
    }

    /// Enter the child namespace `name`.
    ///
    /// Without reuse the entry must not exist yet (`ScopeCollision`); with
    /// reuse it must (`NothingToReuse`). Reuse is inherited by child scopes.
    pub fn enter(&self, name: &str, reuse: bool) -> BloxResult<Scope> {
        if name.is_empty() || name.contains(SEPARATOR) {
            return Err(BloxError::InvalidScopeName { name: name.to_string() });
        }
        let absolute = self.join(name);
        let reuse = reuse || self.reuse;
        if reuse {
            if !self.graph.has_scope(&absolute) {
                return Err(BloxError::NothingToReuse { path: absolute });
            }
        } else if !self.graph.register_scope(&absolute) {
            return Err(BloxError::ScopeCollision { path: absolute });
        }
        debug!(scope = %absolute, reuse, "entered scope");
        Ok(Scope { graph: self.graph.clone(), relative: name.to_string(), absolute, reuse })
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn relative_name(&self) -> &str {
        &self.relative
    }

    pub fn absolute_path(&self) -> &str {
        &self.absolute
    }

    pub fn is_reuse(&self) -> bool {
        self.reuse
    }

    pub fn is_root(&self) -> bool {
        self.absolute.is_empty()
    }

    /// Qualify `name` with this scope's absolute path.
    pub fn join(&self, name: &str) -> String {
        if self.absolute.is_empty() {
            name.to_string()
        } else {
            format!("{}{SEPARATOR}{name}", self.absolute)
        }
    }

    /// Prefix shared by every artifact created directly or transitively in this scope.
    ///
    /// Empty for the root, whose namespace holds every artifact of the graph.
    pub fn exact_path(&self) -> String {
        if self.is_root() {
            return String::new();
        }
        format!("{}{SEPARATOR}", self.absolute)
    }

    /// Anchored pattern matching artifacts under this exact absolute path.
    pub fn exact_pattern(&self) -> BloxResult<Regex> {
        Ok(Regex::new(&format!("^{}", regex::escape(&self.exact_path())))?)
    }

    /// Pattern matching artifacts under any scope with this relative name.
    ///
    /// The root has no name; its pattern matches everything.
    pub fn relative_pattern(&self) -> BloxResult<Regex> {
        if self.is_root() {
            return Ok(Regex::new("^")?);
        }
        Ok(Regex::new(&format!(
            "(^|{sep}){}{sep}",
            regex::escape(&self.relative),
            sep = regex::escape(&SEPARATOR.to_string())
        ))?)
    }

    /// True when both scopes denote the same namespace entry.
    pub fn aliases(&self, other: &Scope) -> bool {
        self == other
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        self.graph.id() == other.graph.id() && self.absolute == other.absolute
    }
}

impl Eq for Scope {}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("graph", &self.graph.id())
            .field("absolute", &self.absolute)
            .field("reuse", &self.reuse)
            .finish()
    }
}
