//! Tag multisets.
//!
//! `TagSet` counts how many times each tag was added. Every mutation emits
//! one [`TagChange`] per distinct tag it touched, batches included: adding
//! `[burn, burn, stun]` notifies `burn 0 -> 2` and `stun 0 -> 1`.

use crate::events::{Observers, SubscriptionId};
use crate::tag::Tag;
use std::collections::HashMap;

/// Count change of one tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagChange {
    pub tag: Tag,
    pub previous: u32,
    pub current: u32,
}

/// A multiset of tags with change notification.
///
/// # Examples
///
/// ```rust
/// use statfx::{TagRegistry, TagSet};
///
/// let mut registry = TagRegistry::new();
/// registry.load_tags(["Status", "Status/Burn"]).unwrap();
/// let burn = registry.resolve("Status/Burn").unwrap();
/// let status = registry.resolve("Status").unwrap();
///
/// let mut tags = TagSet::new();
/// tags.add(&burn);
/// tags.add(&burn);
/// assert_eq!(tags.count(&burn), 2);
/// assert!(tags.has_any_super_of(&status));
/// ```
#[derive(Debug, Default)]
pub struct TagSet {
    counts: HashMap<Tag, u32>,
    observers: Observers<TagChange>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set (without subscribers) from a list of tags.
    pub fn from_tags<'a, I>(tags: I) -> Self
    where
        I: IntoIterator<Item = &'a Tag>,
    {
        let mut set = Self::new();
        for tag in tags {
            *set.counts.entry(tag.clone()).or_insert(0) += 1;
        }
        set
    }

    /// Compose several sets into a fresh one by summing counts.
    pub fn merged<'a, I>(sets: I) -> Self
    where
        I: IntoIterator<Item = &'a TagSet>,
    {
        let mut merged = Self::new();
        for set in sets {
            for (tag, count) in &set.counts {
                *merged.counts.entry(tag.clone()).or_insert(0) += count;
            }
        }
        merged
    }

    /// Add one occurrence of `tag`. Returns the new count.
    pub fn add(&mut self, tag: &Tag) -> u32 {
        self.add_count(tag, 1)
    }

    /// Add `count` occurrences of `tag`. Returns the new count.
    pub fn add_count(&mut self, tag: &Tag, count: u32) -> u32 {
        if count == 0 {
            return self.count(tag);
        }
        let change = self.shift(tag, count as i64);
        let current = change.current;
        self.observers.emit(&change);
        current
    }

    /// Remove one occurrence of `tag`. Returns the new count.
    ///
    /// Removing a tag that is not present does nothing and notifies no one.
    pub fn remove(&mut self, tag: &Tag) -> u32 {
        self.remove_count(tag, 1)
    }

    /// Remove up to `count` occurrences of `tag`. Returns the new count.
    pub fn remove_count(&mut self, tag: &Tag, count: u32) -> u32 {
        if count == 0 || !self.counts.contains_key(tag) {
            return self.count(tag);
        }
        let change = self.shift(tag, -(count as i64));
        let current = change.current;
        self.observers.emit(&change);
        current
    }

    /// Add every tag in `tags`, notifying once per distinct tag.
    pub fn add_batch<'a, I>(&mut self, tags: I)
    where
        I: IntoIterator<Item = &'a Tag>,
    {
        let changes: Vec<TagChange> = tally(tags)
            .into_iter()
            .map(|(tag, n)| self.shift(&tag, n as i64))
            .collect();
        for change in &changes {
            self.observers.emit(change);
        }
    }

    /// Remove every tag in `tags`, notifying once per distinct tag that was
    /// actually present.
    pub fn remove_batch<'a, I>(&mut self, tags: I)
    where
        I: IntoIterator<Item = &'a Tag>,
    {
        let present: Vec<(Tag, u32)> = tally(tags)
            .into_iter()
            .filter(|(tag, _)| self.counts.contains_key(tag))
            .collect();
        let changes: Vec<TagChange> = present
            .into_iter()
            .map(|(tag, n)| self.shift(&tag, -(n as i64)))
            .collect();
        for change in &changes {
            self.observers.emit(change);
        }
    }

    fn shift(&mut self, tag: &Tag, delta: i64) -> TagChange {
        let previous = self.count(tag);
        let current = (previous as i64 + delta).clamp(0, u32::MAX as i64) as u32;
        if current == 0 {
            self.counts.remove(tag);
        } else {
            self.counts.insert(tag.clone(), current);
        }
        TagChange {
            tag: tag.clone(),
            previous,
            current,
        }
    }

    /// Occurrences of exactly `tag`.
    pub fn count(&self, tag: &Tag) -> u32 {
        self.counts.get(tag).copied().unwrap_or(0)
    }

    /// Number of distinct tags.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Distinct tags with their counts, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&Tag, u32)> {
        self.counts.iter().map(|(tag, count)| (tag, *count))
    }

    /// `true` if `tag` is a sub tag of any member.
    pub fn has_any_super_of(&self, tag: &Tag) -> bool {
        self.counts.keys().any(|member| tag.is_sub_tag_of(member))
    }

    /// `true` if `tag` is a sub tag of every member (vacuously true when
    /// empty).
    pub fn has_all_super_of(&self, tag: &Tag) -> bool {
        self.counts.keys().all(|member| tag.is_sub_tag_of(member))
    }

    /// `true` if `tag` itself is a member.
    pub fn has_exact(&self, tag: &Tag) -> bool {
        self.counts.contains_key(tag)
    }

    /// `true` if every distinct member of this set is an exact member of
    /// `other`. Counts are not compared.
    pub fn is_subset_of(&self, other: &TagSet) -> bool {
        self.counts.keys().all(|tag| other.has_exact(tag))
    }

    /// `true` if the two sets share at least one exact member.
    pub fn intersects(&self, other: &TagSet) -> bool {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small.counts.keys().any(|tag| large.has_exact(tag))
    }

    /// Subscribe to count changes.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&TagChange) + 'static,
    {
        self.observers.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }
}

/// Count occurrences per distinct tag, keeping first-seen order.
fn tally<'a, I>(tags: I) -> Vec<(Tag, u32)>
where
    I: IntoIterator<Item = &'a Tag>,
{
    let mut index: HashMap<&'a Tag, usize> = HashMap::new();
    let mut counted: Vec<(Tag, u32)> = Vec::new();
    for tag in tags {
        match index.get(tag) {
            Some(&i) => counted[i].1 += 1,
            None => {
                index.insert(tag, counted.len());
                counted.push((tag.clone(), 1));
            }
        }
    }
    counted
}
