//! Route table: ordered path patterns with their components and access
//! requirements.
//!
//! DESIGN
//! ======
//! Patterns are `/`-separated static segments and `:name` parameters. The
//! first matching entry wins; the `*` fallback only applies when nothing else
//! matches, wherever it was declared. All validation happens in
//! [`RouteTableBuilder::build`], so a bad role name or a duplicate path stops
//! the app at startup instead of surfacing on some later navigation.

#[cfg(test)]
#[path = "table_test.rs"]
mod table_test;

use crate::access::{InvalidRequiredRole, RequiredRole, RouteRequirement};

pub const FALLBACK_PATH: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteTableError {
    #[error("route {path} requires unknown role: {source}")]
    UnknownRole {
        path: String,
        #[source]
        source: InvalidRequiredRole,
    },
    #[error("route path declared twice: {0}")]
    DuplicatePath(String),
    #[error("invalid route path: {0}")]
    InvalidPath(String),
    #[error("more than one fallback route")]
    DuplicateFallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
}

/// Parsed route path such as `/product/:id`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RoutePattern {
    segments: Vec<Segment>,
}

impl RoutePattern {
    fn parse(raw: &str) -> Result<Self, RouteTableError> {
        if !raw.starts_with('/') {
            return Err(RouteTableError::InvalidPath(raw.to_owned()));
        }
        let mut segments = Vec::new();
        for part in raw.split('/').filter(|p| !p.is_empty()) {
            let segment = match part.strip_prefix(':') {
                Some("") => return Err(RouteTableError::InvalidPath(raw.to_owned())),
                Some(name) => Segment::Param(name.to_owned()),
                None if part.contains('*') => return Err(RouteTableError::InvalidPath(raw.to_owned())),
                None => Segment::Static(part.to_owned()),
            };
            segments.push(segment);
        }
        Ok(Self { segments })
    }

    /// Shape used for duplicate detection: `/a/:x` and `/a/:y` collide.
    fn shape(&self) -> Vec<Option<&str>> {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Static(name) => Some(name.as_str()),
                Segment::Param(_) => None,
            })
            .collect()
    }

    fn matches(&self, parts: &[&str]) -> Option<Vec<(String, String)>> {
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut params = Vec::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Static(name) if name == part => {}
                Segment::Static(_) => return None,
                Segment::Param(name) => params.push((name.clone(), (*part).to_owned())),
            }
        }
        Some(params)
    }
}

#[derive(Debug, Clone)]
struct RouteEntry<C> {
    pattern: RoutePattern,
    component: C,
    requirement: RouteRequirement,
}

/// A resolved navigation target.
#[derive(Debug)]
pub struct RouteMatch<'a, C> {
    pub component: &'a C,
    pub requirement: RouteRequirement,
    pub params: Vec<(String, String)>,
    /// Set when only the `*` entry matched.
    pub fallback: bool,
}

#[derive(Debug, Clone)]
pub struct RouteTable<C> {
    entries: Vec<RouteEntry<C>>,
    fallback: Option<C>,
}

impl<C> RouteTable<C> {
    #[must_use]
    pub fn builder() -> RouteTableBuilder<C> {
        RouteTableBuilder { pending: Vec::new() }
    }

    /// Find the entry for `path`. Query strings and fragments are ignored.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<RouteMatch<'_, C>> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();

        self.entries
            .iter()
            .find_map(|entry| {
                entry.pattern.matches(&parts).map(|params| RouteMatch {
                    component: &entry.component,
                    requirement: entry.requirement,
                    params,
                    fallback: false,
                })
            })
            .or_else(|| {
                self.fallback.as_ref().map(|component| RouteMatch {
                    component,
                    requirement: RouteRequirement::None,
                    params: Vec::new(),
                    fallback: true,
                })
            })
    }
}

/// Collects route declarations; every check runs in [`Self::build`].
pub struct RouteTableBuilder<C> {
    pending: Vec<(String, C, Result<RouteRequirement, InvalidRequiredRole>)>,
}

impl<C> RouteTableBuilder<C> {
    /// Public route. `path` may be `*` for the fallback.
    #[must_use]
    pub fn route(mut self, path: &str, component: C) -> Self {
        self.pending.push((path.to_owned(), component, Ok(RouteRequirement::None)));
        self
    }

    /// Route gated behind `role` (`user` or `admin`).
    #[must_use]
    pub fn protected(mut self, path: &str, component: C, role: &str) -> Self {
        let requirement = role.parse::<RequiredRole>().map(RouteRequirement::Role);
        self.pending.push((path.to_owned(), component, requirement));
        self
    }

    /// # Errors
    ///
    /// Returns the first invalid declaration, in declaration order.
    pub fn build(self) -> Result<RouteTable<C>, RouteTableError> {
        let mut entries: Vec<RouteEntry<C>> = Vec::with_capacity(self.pending.len());
        let mut fallback = None;

        for (path, component, requirement) in self.pending {
            let requirement =
                requirement.map_err(|source| RouteTableError::UnknownRole { path: path.clone(), source })?;

            if path == FALLBACK_PATH {
                if fallback.is_some() {
                    return Err(RouteTableError::DuplicateFallback);
                }
                fallback = Some(component);
                continue;
            }

            let pattern = RoutePattern::parse(&path)?;
            if entries.iter().any(|e| e.pattern.shape() == pattern.shape()) {
                return Err(RouteTableError::DuplicatePath(path));
            }
            entries.push(RouteEntry { pattern, component, requirement });
        }

        Ok(RouteTable { entries, fallback })
    }
}
