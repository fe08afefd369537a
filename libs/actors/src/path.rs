//! Actor Paths
//!
//! Stable, hierarchical, human-readable actor identifiers of the form
//! `system:/top/child/grandchild`. Two paths are equal iff their string
//! forms match.

use crate::error::{ActorError, Result};
use std::fmt;
use std::sync::Arc;

/// Separator between path segments
pub const SEPARATOR: char = '/';

/// System name used by the sentinel paths
const SENTINEL_SYSTEM: &str = "dead";

/// Immutable actor path
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorPath {
    /// `system:/a/b` rendered once at creation
    full: Arc<str>,
    /// Byte offset of the first `/` in `full`
    split: usize,
}

impl ActorPath {
    /// Path of a top-level actor
    pub fn root(system: &str, name: &str) -> Result<Self> {
        validate_name(name)?;
        Ok(Self::from_parts(system, &format!("{}{}", SEPARATOR, name)))
    }

    /// Path of a child of `self`
    pub fn child(&self, name: &str) -> Result<Self> {
        validate_name(name)?;
        Ok(Self::from_parts(
            self.system(),
            &format!("{}{}{}", self.elements_str(), SEPARATOR, name),
        ))
    }

    /// Path used by the no-sender and dead-letter sentinels
    pub(crate) fn sentinel(tag: &str) -> Self {
        Self::from_parts(SENTINEL_SYSTEM, &format!("/dead/{}", tag))
    }

    fn from_parts(system: &str, elements: &str) -> Self {
        Self {
            full: Arc::from(format!("{}:{}", system, elements)),
            split: system.len() + 1,
        }
    }

    /// Parse `system:/a/b`, or `/a/b` relative to `default_system`
    pub fn parse(text: &str, default_system: &str) -> Option<Self> {
        let (system, elements) = match text.find(':') {
            Some(idx) => (&text[..idx], &text[idx + 1..]),
            None => (default_system, text),
        };

        if system.is_empty() || !elements.starts_with(SEPARATOR) {
            return None;
        }
        if elements[1..].split(SEPARATOR).any(str::is_empty) {
            return None;
        }
        Some(Self::from_parts(system, elements))
    }

    /// Owning system name
    pub fn system(&self) -> &str {
        &self.full[..self.split - 1]
    }

    /// Slash-separated element part, e.g. `/a/b`
    pub fn elements_str(&self) -> &str {
        &self.full[self.split..]
    }

    /// Individual segments, top-level first
    pub fn elements(&self) -> impl Iterator<Item = &str> {
        self.elements_str()[1..].split(SEPARATOR)
    }

    /// Last segment
    pub fn name(&self) -> &str {
        let elements = self.elements_str();
        match elements.rfind(SEPARATOR) {
            Some(idx) => &elements[idx + 1..],
            None => elements,
        }
    }

    /// Number of segments below the system root
    pub fn depth(&self) -> usize {
        self.elements().count()
    }

    /// Full string form, used as the registry key
    pub fn as_str(&self) -> &str {
        &self.full
    }
}

/// Reject names that would break path parsing
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ActorError::invalid_name(name, "name must not be empty"));
    }
    if name.contains(SEPARATOR) {
        return Err(ActorError::invalid_name(name, "name must not contain '/'"));
    }
    Ok(())
}

impl fmt::Display for ActorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

impl fmt::Debug for ActorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorPath({})", self.full)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_and_child() {
        let root = ActorPath::root("app", "accounts").unwrap();
        assert_eq!(root.to_string(), "app:/accounts");
        assert_eq!(root.system(), "app");
        assert_eq!(root.name(), "accounts");
        assert_eq!(root.depth(), 1);

        let child = root.child("42").unwrap();
        assert_eq!(child.as_str(), "app:/accounts/42");
        assert_eq!(child.elements().collect::<Vec<_>>(), vec!["accounts", "42"]);
        assert_eq!(child.name(), "42");
        assert_eq!(child.depth(), 2);
    }

    #[test]
    fn test_invalid_names_rejected() {
        assert!(ActorPath::root("app", "").is_err());
        assert!(ActorPath::root("app", "a/b").is_err());

        let root = ActorPath::root("app", "a").unwrap();
        match root.child("x/y").unwrap_err() {
            ActorError::InvalidName { name, .. } => assert_eq!(name, "x/y"),
            other => panic!("Expected InvalidName, got {:?}", other),
        }
    }

    #[test]
    fn test_equality_is_by_string_form() {
        let a = ActorPath::root("app", "ui").unwrap();
        let b = ActorPath::parse("app:/ui", "other").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, ActorPath::root("app2", "ui").unwrap());
    }

    #[test]
    fn test_parse() {
        let relative = ActorPath::parse("/a/b", "app").unwrap();
        assert_eq!(relative.as_str(), "app:/a/b");

        assert!(ActorPath::parse("", "app").is_none());
        assert!(ActorPath::parse("a/b", "app").is_none());
        assert!(ActorPath::parse("/a//b", "app").is_none());
        assert!(ActorPath::parse("/", "app").is_none());
        assert!(ActorPath::parse(":/a", "app").is_none());
    }

    #[test]
    fn test_sentinel() {
        let path = ActorPath::sentinel("deadLetters");
        assert_eq!(path.as_str(), "dead:/dead/deadLetters");
        assert_eq!(path.name(), "deadLetters");
    }
}
