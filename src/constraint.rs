//! Stat constraints.
//!
//! Constraints are value rules enforced on a stat at two points: when its
//! base value is written (base stage) and at the end of every apply-value
//! query (apply stage). Each stage can be switched on independently.
//!
//! The built-in rules are a value range, whose bounds may come from other
//! stats, and a numeric cast. Anything else plugs in through
//! [`ConstraintRule`].

use crate::core::StatCore;
use crate::stat_id::StatId;
use std::fmt;
use std::rc::Rc;

/// Registration id of a constraint in one `StatCore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintId(pub(crate) u64);

/// The point in the pipeline a constraint is evaluated at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintStage {
    Base,
    Apply,
}

/// Where a range bound comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum RangeBound {
    Const(f64),
    /// The base value of another stat.
    StatBase(StatId),
    /// The apply value of another stat.
    StatApply(StatId),
}

impl RangeBound {
    /// Current value of the bound.
    pub fn resolve(&self, core: &mut StatCore) -> f64 {
        match self {
            RangeBound::Const(v) => *v,
            RangeBound::StatBase(id) => core.get_base_value(id),
            RangeBound::StatApply(id) => core.get_apply_value(id),
        }
    }

    /// The stat this bound reads, if any.
    pub fn source_stat(&self) -> Option<&StatId> {
        match self {
            RangeBound::Const(_) => None,
            RangeBound::StatBase(id) | RangeBound::StatApply(id) => Some(id),
        }
    }
}

/// Clamp to `[min, max]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueRange {
    pub min: RangeBound,
    pub max: RangeBound,
}

impl ValueRange {
    pub fn new(min: RangeBound, max: RangeBound) -> Self {
        Self { min, max }
    }

    /// Clamp `value`. The lower bound is checked first, so an inverted range
    /// yields `min`. NaN passes through unchanged.
    pub fn clamp(&self, core: &mut StatCore, value: f64) -> f64 {
        let min = self.min.resolve(core);
        let max = self.max.resolve(core);
        if value < min {
            min
        } else if value > max {
            max
        } else {
            value
        }
    }
}

/// Numeric casts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    IntFloor,
    IntCeil,
    /// `floor(v)`, plus one when the remainder `v % 1` is at least one half.
    IntRoundHalfUp,
    /// Round half to even.
    IntRoundBanker,
    /// `-1` for negative values, `1` otherwise.
    Bool,
}

impl CastKind {
    pub fn cast(self, value: f64) -> f64 {
        match self {
            CastKind::IntFloor => value.floor(),
            CastKind::IntCeil => value.ceil(),
            CastKind::IntRoundHalfUp => {
                value.floor() + if value % 1.0 >= 0.5 { 1.0 } else { 0.0 }
            }
            CastKind::IntRoundBanker => value.round_ties_even(),
            CastKind::Bool => {
                if value < 0.0 {
                    -1.0
                } else {
                    1.0
                }
            }
        }
    }
}

/// Extension point for constraint rules beyond the built-in ones.
pub trait ConstraintRule {
    /// Transform `value` for the constrained stat.
    fn process(&self, core: &mut StatCore, value: f64) -> f64;

    /// Stats whose base changes should re-trigger this rule.
    fn depends_on(&self) -> Vec<StatId> {
        Vec::new()
    }

    fn description(&self) -> String;
}

/// The rule a constraint applies.
#[derive(Clone)]
pub enum ConstraintKind {
    ValueRange(ValueRange),
    TypeCast(CastKind),
    Custom(Rc<dyn ConstraintRule>),
}

impl fmt::Debug for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintKind::ValueRange(range) => f.debug_tuple("ValueRange").field(range).finish(),
            ConstraintKind::TypeCast(kind) => f.debug_tuple("TypeCast").field(kind).finish(),
            ConstraintKind::Custom(rule) => {
                f.debug_tuple("Custom").field(&rule.description()).finish()
            }
        }
    }
}

/// A constraint on one stat.
///
/// # Examples
///
/// ```rust
/// use statfx::{RangeBound, StatConstraint, StatCore, StatId};
///
/// let mut core = StatCore::new();
/// let hp = StatId::from_str("hp");
/// core.modify_base_value(&hp, 150.0);
///
/// // hp in [0, 100], on both stages
/// core.add_constraint(StatConstraint::value_range(
///     hp.clone(),
///     RangeBound::Const(0.0),
///     RangeBound::Const(100.0),
/// ));
///
/// assert_eq!(core.get_base_value(&hp), 100.0);
/// ```
#[derive(Debug, Clone)]
pub struct StatConstraint {
    target: StatId,
    on_base: bool,
    on_apply: bool,
    kind: ConstraintKind,
}

impl StatConstraint {
    /// A constraint active on both stages.
    pub fn new(target: impl Into<StatId>, kind: ConstraintKind) -> Self {
        Self {
            target: target.into(),
            on_base: true,
            on_apply: true,
            kind,
        }
    }

    pub fn value_range(target: impl Into<StatId>, min: RangeBound, max: RangeBound) -> Self {
        Self::new(target, ConstraintKind::ValueRange(ValueRange::new(min, max)))
    }

    pub fn type_cast(target: impl Into<StatId>, kind: CastKind) -> Self {
        Self::new(target, ConstraintKind::TypeCast(kind))
    }

    pub fn custom(target: impl Into<StatId>, rule: Rc<dyn ConstraintRule>) -> Self {
        Self::new(target, ConstraintKind::Custom(rule))
    }

    /// Choose which stages the constraint runs on.
    pub fn with_stages(mut self, on_base: bool, on_apply: bool) -> Self {
        self.on_base = on_base;
        self.on_apply = on_apply;
        self
    }

    pub fn target(&self) -> &StatId {
        &self.target
    }

    pub fn kind(&self) -> &ConstraintKind {
        &self.kind
    }

    pub fn applies_to(&self, stage: ConstraintStage) -> bool {
        match stage {
            ConstraintStage::Base => self.on_base,
            ConstraintStage::Apply => self.on_apply,
        }
    }

    /// Run the rule on `value`.
    pub fn process(&self, core: &mut StatCore, value: f64) -> f64 {
        match &self.kind {
            ConstraintKind::ValueRange(range) => range.clamp(core, value),
            ConstraintKind::TypeCast(kind) => kind.cast(value),
            ConstraintKind::Custom(rule) => rule.process(core, value),
        }
    }

    /// Stats this constraint reads.
    pub fn depends_on(&self) -> Vec<StatId> {
        match &self.kind {
            ConstraintKind::ValueRange(range) => [&range.min, &range.max]
                .into_iter()
                .filter_map(RangeBound::source_stat)
                .fold(Vec::new(), |mut deps, id| {
                    if !deps.contains(id) {
                        deps.push(id.clone());
                    }
                    deps
                }),
            ConstraintKind::TypeCast(_) => Vec::new(),
            ConstraintKind::Custom(rule) => rule.depends_on(),
        }
    }

    pub fn description(&self) -> String {
        match &self.kind {
            ConstraintKind::ValueRange(range) => {
                format!("{} in [{:?}, {:?}]", self.target, range.min, range.max)
            }
            ConstraintKind::TypeCast(kind) => format!("{} as {:?}", self.target, kind),
            ConstraintKind::Custom(rule) => rule.description(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_casts() {
        assert_eq!(CastKind::IntFloor.cast(2.7), 2.0);
        assert_eq!(CastKind::IntCeil.cast(2.1), 3.0);
        assert_eq!(CastKind::IntRoundHalfUp.cast(2.5), 3.0);
        assert_eq!(CastKind::IntRoundHalfUp.cast(2.49), 2.0);
        assert_eq!(CastKind::IntRoundBanker.cast(2.5), 2.0);
        assert_eq!(CastKind::IntRoundBanker.cast(3.5), 4.0);
        assert_eq!(CastKind::Bool.cast(-0.1), -1.0);
        assert_eq!(CastKind::Bool.cast(0.0), 1.0);
    }

    #[test]
    fn test_round_half_up_negative_uses_truncated_remainder() {
        // -2.5 % 1 == -0.5, so no increment after flooring to -3
        assert_eq!(CastKind::IntRoundHalfUp.cast(-2.5), -3.0);
        assert_eq!(CastKind::IntRoundHalfUp.cast(-2.0), -2.0);
    }

    #[test]
    fn test_value_range_const() {
        let mut core = StatCore::new();
        let range = ValueRange::new(RangeBound::Const(0.0), RangeBound::Const(10.0));
        assert_eq!(range.clamp(&mut core, -5.0), 0.0);
        assert_eq!(range.clamp(&mut core, 15.0), 10.0);
        assert_eq!(range.clamp(&mut core, 5.0), 5.0);
    }

    #[test]
    fn test_value_range_inverted_does_not_panic() {
        let mut core = StatCore::new();
        let range = ValueRange::new(RangeBound::Const(10.0), RangeBound::Const(0.0));
        assert_eq!(range.clamp(&mut core, 5.0), 10.0);
    }

    #[test]
    fn test_value_range_reads_other_stats() {
        let mut core = StatCore::new();
        let cap = StatId::from_str("cap");
        core.modify_base_value(&cap, 40.0);
        let range = ValueRange::new(RangeBound::Const(0.0), RangeBound::StatBase(cap.clone()));
        assert_eq!(range.clamp(&mut core, 50.0), 40.0);
    }

    #[test]
    fn test_depends_on_deduplicates() {
        let cap = StatId::from_str("cap");
        let c = StatConstraint::value_range(
            "hp",
            RangeBound::StatBase(cap.clone()),
            RangeBound::StatApply(cap.clone()),
        );
        assert_eq!(c.depends_on(), vec![cap]);

        let cast = StatConstraint::type_cast("hp", CastKind::IntFloor);
        assert!(cast.depends_on().is_empty());
    }

    #[test]
    fn test_stages() {
        let c = StatConstraint::type_cast("hp", CastKind::IntFloor).with_stages(false, true);
        assert!(!c.applies_to(ConstraintStage::Base));
        assert!(c.applies_to(ConstraintStage::Apply));
    }

    struct Halve;

    impl ConstraintRule for Halve {
        fn process(&self, _core: &mut StatCore, value: f64) -> f64 {
            value / 2.0
        }

        fn description(&self) -> String {
            "halve".to_string()
        }
    }

    #[test]
    fn test_custom_rule() {
        let mut core = StatCore::new();
        let c = StatConstraint::custom("hp", Rc::new(Halve));
        assert_eq!(c.process(&mut core, 10.0), 5.0);
        assert_eq!(c.description(), "halve");
    }
}
