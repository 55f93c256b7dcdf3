//! Stat identifier module.
//!
//! Provides the `StatId` type, the key every stat, modifier and constraint
//! is registered under. Uses `Arc<str>` so cloning an id into events and
//! modifier lists never copies the string.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::sync::Arc;

/// Interned string identifier for stats.
///
/// Ids compare by string content, so `"hp"` built twice is the same stat.
///
/// # Examples
///
/// ```rust
/// use statfx::StatId;
///
/// let hp = StatId::from_str("hp");
/// let hp2: StatId = "hp".into();
/// let hp3: StatId = String::from("hp").into();
///
/// assert_eq!(hp, hp2);
/// assert_eq!(hp, hp3);
/// ```
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct StatId(Arc<str>);

impl Serialize for StatId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.as_ref().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StatId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(StatId::from(s))
    }
}

impl StatId {
    /// Create a new `StatId` from a string slice.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Self {
        Self(Arc::from(s))
    }

    /// Get the string representation of this `StatId`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for StatId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StatId {
    fn from(s: &str) -> Self {
        Self::from_str(s)
    }
}

impl From<String> for StatId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<&StatId> for StatId {
    fn from(id: &StatId) -> Self {
        id.clone()
    }
}

impl std::fmt::Display for StatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
