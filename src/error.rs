//! Error types for the stat, effect and tag engine.
//!
//! Most gameplay paths never fail: unknown stats are created on demand and
//! rejected dependency registrations are logged and skipped. `StatError`
//! covers what is left: tag identity problems, registration rejections that
//! are also reported to the caller, and template/config problems.

use crate::constraint::ConstraintId;
use crate::stat_id::StatId;
use thiserror::Error;

/// Errors reported by the engine.
///
/// # Examples
///
/// ```rust
/// use statfx::StatError;
///
/// let err = StatError::UnknownTag("Status/Burn".to_string());
/// assert_eq!(err.to_string(), "Unknown tag: Status/Burn");
/// ```
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StatError {
    /// A tag path was requested that was never loaded into the registry.
    #[error("Unknown tag: {0}")]
    UnknownTag(String),

    /// A tag path is empty or has an empty segment (`"A//B"`, `"A/"`).
    #[error("Invalid tag path: {0:?}")]
    InvalidTagPath(String),

    /// A constraint was made to depend on its own target stat.
    #[error("Recursive dependency is not allowed: {0}")]
    RecursiveDependency(StatId),

    /// The reverse edge between the two stats already exists.
    #[error("Cyclic dependency detected: {target} already constrains {dependency}")]
    CyclicDependency { dependency: StatId, target: StatId },

    /// The constraint id is not (or no longer) registered.
    #[error("Unknown constraint: {0:?}")]
    UnknownConstraint(ConstraintId),

    /// A modifier override points outside the group's profiles or modifiers.
    #[error("Invalid modifier override: profile #{profile}, modifier #{modifier}")]
    InvalidOverride { profile: usize, modifier: usize },

    /// A template or sheet could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for StatError {
    fn from(err: serde_json::Error) -> Self {
        StatError::Config(err.to_string())
    }
}
