//! # statfx - Stat, Timed-Effect and Tag Engine for Game Entities
//!
//! An attribute engine for RPG-style game entities that provides:
//! - **Layered stats**: base values, ordered temporary modifiers, constraints
//!   and custom getters
//! - **Timed effects**: stacking buffs and debuffs with duration tracks
//! - **Hierarchical tags**: slash-delimited labels with prefix queries
//!
//! ## Core Concepts
//!
//! ### Stat Pipeline
//!
//! Every stat has a stored base value and a computed apply value:
//!
//! ```text
//! write  → [base constraints] → base value → [dependents re-clamped]
//! query  → base / custom getter → [modifiers by priority] → [apply constraints]
//! ```
//!
//! 1. **Modifiers** are `Instant` (folded into the base once) or `Temporary`
//!    (re-evaluated on every query, highest priority first)
//! 2. **Constraints** clamp or cast values on the base stage, the apply stage,
//!    or both, and can read other stats
//! 3. **Custom getters** replace the seed of the apply computation
//!
//! ### Effects
//!
//! An [`EffectInstance`] carries modifiers and tags. Applied to a
//! [`StatObject`], it pushes them into the object's core and temporary tag
//! layer; ticking it down to zero stacks retracts them again.
//!
//! ### Single-threaded
//!
//! Everything runs synchronously on the caller's thread. Durations are
//! simulation time driven by the `dt` passed to
//! [`StatObject::tick_effect_duration`]. Change callbacks fire while the
//! emitter is mid-update; see [`events`].
//!
//! ## Example
//!
//! ```rust
//! use statfx::*;
//!
//! let mut registry = TagRegistry::new();
//! registry.load_tags(["Status/Buff/Haste"]).unwrap();
//! let haste_tag = registry.resolve("Status/Buff/Haste").unwrap();
//!
//! let speed = StatId::from_str("speed");
//! let mut hero = StatObject::new("hero");
//! hero.initialize_stats([(speed.clone(), 100.0)]);
//!
//! // +20% speed for 5 seconds, up to 2 stacks
//! let haste = || {
//!     EffectInstance::new("haste", 5.0)
//!         .with_modifiers(vec![StatModifier::new(speed.clone(), CalcOperator::Mul, 1.2)])
//!         .with_tags(vec![haste_tag.clone()])
//!         .with_stacking(2)
//! };
//! hero.apply_effect(haste());
//! hero.apply_effect(haste());
//! assert!((hero.get_stat_apply_value(&speed) - 140.0).abs() < 1e-9);
//!
//! let status = registry.resolve("Status/Buff/Haste").unwrap();
//! assert!(hero.get_apply_tags().has_exact(&status));
//!
//! hero.tick_effect_duration(5.0);
//! assert_eq!(hero.get_stat_apply_value(&speed), 100.0);
//! ```
//!
//! ## Modules
//!
//! - [`stat_id`] - Stat identifier type
//! - [`modifier`] - Stat modifiers
//! - [`constraint`] - Value range and cast constraints
//! - [`graph`] - Constraint dependency graph
//! - [`getter`] - Custom getters
//! - [`core`] - The stat core
//! - [`effect`] - Effect instances and stacking
//! - [`profile`] - Effect templates
//! - [`object`] - The stat object
//! - [`tag`] / [`tag_set`] - Tags and tag multisets
//! - [`table`] - Named value lookup
//! - [`events`] - Observer lists
//! - [`error`] - Error types

pub mod constraint;
pub mod core;
pub mod effect;
pub mod error;
pub mod events;
pub mod getter;
pub mod graph;
pub mod modifier;
pub mod object;
pub mod profile;
pub mod stat_id;
pub mod table;
pub mod tag;
pub mod tag_set;

// Re-export main types for convenience
pub use crate::core::{ApplyValueChanged, BaseValueChanged, StatCore, StatInfo};
pub use error::StatError;
pub use object::{EffectHandle, EffectUpdate, EffectUpdateKind, StatObject, StatSheet};
pub use stat_id::StatId;

// Re-export modifiers, constraints and getters
pub use constraint::{
    CastKind, ConstraintId, ConstraintKind, ConstraintRule, ConstraintStage, RangeBound,
    StatConstraint, ValueRange,
};
pub use getter::{CustomGetter, ModifierSource, StatGetter};
pub use modifier::{CalcOperator, CalcPolicy, ModPolicy, ModifierHandle, StatModifier};

// Re-export effect types
pub use effect::{
    DurationPolicy, EffectEvent, EffectInstance, EffectState, StackDurationPolicy,
    StackModifierPolicy, StackOutPolicy, StackResult,
};
pub use profile::{EffectGroup, EffectProfile, ModifierOverride, ParamValue};

// Re-export tag types
pub use tag::{Tag, TagRegistry};
pub use tag_set::{TagChange, TagSet};
