//! Load paths bounding reference expansion.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ResolveError;

/// Load path that expands every reference at every depth.
pub const ALL: &str = "ALL";

/// A set of dotted field paths such as `owner` or `passengers.spouse`.
///
/// At each depth a reference field is followed when its name equals the
/// first segment of some path (ignoring case). The paths for the next depth
/// drop that first segment; single-segment paths end there. [`ALL`] matches
/// every field and never ends.
///
/// ```
/// use docmesh::LoadPaths;
///
/// let paths = LoadPaths::new(["owner", "passengers.spouse"]);
/// assert!(paths.matches("owner"));
/// assert!(paths.matches("Passengers"));
///
/// let next = paths.next();
/// assert!(next.matches("spouse"));
/// assert!(!next.matches("owner"));
/// assert!(next.next().is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadPaths(Vec<String>);

impl LoadPaths {
    /// Builds a path set, skipping blank entries.
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            paths
                .into_iter()
                .map(|p| p.into().trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        )
    }

    /// The unbounded path set.
    pub fn all() -> Self {
        Self(vec![ALL.to_string()])
    }

    /// No references are followed.
    pub fn none() -> Self {
        Self::default()
    }

    /// Parses a comma-separated list, rejecting empty path segments.
    pub fn parse(spec: &str) -> Result<Self, ResolveError> {
        let paths = Self::new(spec.split(','));
        for path in &paths.0 {
            if path.split('.').any(|segment| segment.trim().is_empty()) {
                return Err(ResolveError::InvalidLoadPath { path: path.clone() });
            }
        }
        Ok(paths)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_all(&self) -> bool {
        self.0.iter().any(|p| p == ALL)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns true if references in field `name` are followed at this depth.
    pub fn matches(&self, name: &str) -> bool {
        self.0.iter().any(|path| {
            path == ALL
                || path
                    .split('.')
                    .next()
                    .is_some_and(|first| first.eq_ignore_ascii_case(name))
        })
    }

    /// The paths for the next depth.
    pub fn next(&self) -> Self {
        Self(
            self.0
                .iter()
                .filter_map(|path| {
                    if path == ALL {
                        Some(path.clone())
                    } else {
                        path.split_once('.').map(|(_, rest)| rest.to_string())
                    }
                })
                .collect(),
        )
    }

    /// Adds the paths of `other` that are not already present.
    pub fn extend(&mut self, other: &LoadPaths) {
        for path in &other.0 {
            if !self.0.contains(path) {
                self.0.push(path.clone());
            }
        }
    }
}

impl fmt::Display for LoadPaths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}

impl<S: Into<String>> FromIterator<S> for LoadPaths {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}
