//! Hierarchical tags.
//!
//! A `Tag` is a slash-delimited path (`"Status/Debuff/Burn"`) split into
//! segments once, when it is loaded into a `TagRegistry`. Tags can only be
//! obtained from a registry, so holding a `Tag` proves it was loaded.
//!
//! Hierarchy tests follow the prefix rule of [`Tag::is_sub_tag_of`]: a tag is
//! a *sub tag* of another when its segments are a prefix of the other's.
//! With that naming the shorter, more general tag is the "sub" tag.

use crate::error::StatError;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Separator between tag segments.
pub const TAG_SEPARATOR: char = '/';

#[derive(Debug)]
struct TagData {
    path: Box<str>,
    segments: Box<[Box<str>]>,
}

/// An interned hierarchical tag.
///
/// Cloning is a reference-count bump. Two tags are equal when their segment
/// sequences match exactly; tags from the same registry short-circuit on
/// pointer identity.
#[derive(Clone)]
pub struct Tag(Arc<TagData>);

impl Tag {
    fn parse(path: &str) -> Result<Self, StatError> {
        if path.is_empty() {
            return Err(StatError::InvalidTagPath(path.to_string()));
        }
        let segments: Box<[Box<str>]> = path
            .split(TAG_SEPARATOR)
            .map(Box::from)
            .collect::<Vec<_>>()
            .into_boxed_slice();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(StatError::InvalidTagPath(path.to_string()));
        }
        Ok(Self(Arc::new(TagData {
            path: Box::from(path),
            segments,
        })))
    }

    /// The full path, e.g. `"Status/Debuff/Burn"`.
    pub fn path(&self) -> &str {
        &self.0.path
    }

    /// The path segments, e.g. `["Status", "Debuff", "Burn"]`.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.segments.iter().map(|s| s.as_ref())
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.0.segments.len()
    }

    /// `true` when this tag's segments are a prefix of `other`'s.
    ///
    /// ```rust
    /// use statfx::TagRegistry;
    ///
    /// let mut registry = TagRegistry::new();
    /// registry.load_tags(["A", "A/B/C"]).unwrap();
    /// let a = registry.resolve("A").unwrap();
    /// let abc = registry.resolve("A/B/C").unwrap();
    ///
    /// assert!(a.is_sub_tag_of(&abc));
    /// assert!(!abc.is_sub_tag_of(&a));
    /// assert!(a.is_sub_tag_of(&a));
    /// ```
    pub fn is_sub_tag_of(&self, other: &Tag) -> bool {
        let mine = &self.0.segments;
        let theirs = &other.0.segments;
        mine.len() <= theirs.len() && mine.iter().zip(theirs.iter()).all(|(a, b)| a == b)
    }

    /// `true` when both tags have the same segment sequence.
    pub fn is_exact(&self, other: &Tag) -> bool {
        self == other
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.segments == other.0.segments
    }
}

impl Eq for Tag {}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.path.hash(state);
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self.0.path)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.path)
    }
}

/// The tag identity service.
///
/// Loads tag paths once and hands out the interned [`Tag`] for a path.
/// Registries are plain values passed to whoever needs to resolve paths;
/// there is no process-wide instance.
#[derive(Debug, Default)]
pub struct TagRegistry {
    tags: HashMap<Box<str>, Tag>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a batch of tag paths.
    ///
    /// Paths that are already loaded are skipped. Returns the number of newly
    /// loaded tags. The first invalid path aborts the batch; tags before it
    /// stay loaded.
    pub fn load_tags<I, S>(&mut self, paths: I) -> Result<usize, StatError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut loaded = 0;
        for path in paths {
            let path = path.as_ref();
            if self.tags.contains_key(path) {
                continue;
            }
            let tag = Tag::parse(path)?;
            self.tags.insert(Box::from(path), tag);
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Look up a loaded tag.
    pub fn resolve(&self, path: &str) -> Result<Tag, StatError> {
        self.tags.get(path).cloned().ok_or_else(|| {
            tracing::warn!(path, "requested tag is not loaded");
            StatError::UnknownTag(path.to_string())
        })
    }

    /// Resolve several paths, failing on the first unknown one.
    pub fn resolve_all<I, S>(&self, paths: I) -> Result<Vec<Tag>, StatError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        paths.into_iter().map(|p| self.resolve(p.as_ref())).collect()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.tags.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Every loaded tag, in no particular order.
    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.tags.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TagRegistry {
        let mut registry = TagRegistry::new();
        registry
            .load_tags(["A", "A/B", "A/B/C", "A/X", "Status/Debuff/Burn"])
            .unwrap();
        registry
    }

    #[test]
    fn test_segments_and_depth() {
        let tag = registry().resolve("Status/Debuff/Burn").unwrap();
        assert_eq!(tag.depth(), 3);
        assert_eq!(tag.segments().collect::<Vec<_>>(), vec!["Status", "Debuff", "Burn"]);
        assert_eq!(tag.path(), "Status/Debuff/Burn");
    }

    #[test]
    fn test_prefix_rule() {
        let r = registry();
        let a = r.resolve("A").unwrap();
        let ab = r.resolve("A/B").unwrap();
        let abc = r.resolve("A/B/C").unwrap();
        let ax = r.resolve("A/X").unwrap();

        assert!(a.is_sub_tag_of(&abc));
        assert!(ab.is_sub_tag_of(&abc));
        assert!(!abc.is_sub_tag_of(&a));
        assert!(!ax.is_sub_tag_of(&abc));
    }

    #[test]
    fn test_equality_across_registries() {
        let a = registry().resolve("A/B").unwrap();
        let b = registry().resolve("A/B").unwrap();
        assert_eq!(a, b);
        assert!(a.is_exact(&b));
    }

    #[test]
    fn test_segment_prefix_is_not_string_prefix() {
        let mut r = TagRegistry::new();
        r.load_tags(["Fire", "FireBall"]).unwrap();
        let fire = r.resolve("Fire").unwrap();
        let fireball = r.resolve("FireBall").unwrap();
        assert!(!fire.is_sub_tag_of(&fireball));
    }

    #[test]
    fn test_unknown_tag() {
        assert_eq!(
            registry().resolve("Nope"),
            Err(StatError::UnknownTag("Nope".to_string()))
        );
    }

    #[test]
    fn test_invalid_paths() {
        let mut r = TagRegistry::new();
        assert!(matches!(r.load_tags([""]), Err(StatError::InvalidTagPath(_))));
        assert!(matches!(r.load_tags(["A//B"]), Err(StatError::InvalidTagPath(_))));
        assert!(matches!(r.load_tags(["A/"]), Err(StatError::InvalidTagPath(_))));
    }

    #[test]
    fn test_reload_is_idempotent() {
        let mut r = registry();
        let before = r.len();
        assert_eq!(r.load_tags(["A", "A/B", "New"]).unwrap(), 1);
        assert_eq!(r.len(), before + 1);
    }
}
