//! Stat modifiers.
//!
//! A `StatModifier` describes one value transform: which stat it targets,
//! the operator and coefficient, whether it is folded into the base value
//! once (`Instant`) or kept and re-evaluated on every query (`Temporary`),
//! and how it chains with the modifiers before it.
//!
//! Modifiers are immutable once built. The core assigns each retained
//! temporary modifier a [`ModifierHandle`] and an insertion timestamp.

use crate::stat_id::StatId;
use serde::{Deserialize, Serialize};

/// Binary operator used by modifiers and combined getters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CalcOperator {
    Add,
    Mul,
    Div,
    Sub,
}

impl CalcOperator {
    /// Apply the operator. Division by zero follows IEEE semantics.
    ///
    /// ```rust
    /// use statfx::CalcOperator;
    ///
    /// assert_eq!(CalcOperator::Sub.apply(10.0, 4.0), 6.0);
    /// assert!(CalcOperator::Div.apply(1.0, 0.0).is_infinite());
    /// ```
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            CalcOperator::Add => a + b,
            CalcOperator::Mul => a * b,
            CalcOperator::Div => a / b,
            CalcOperator::Sub => a - b,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CalcOperator::Add => "+",
            CalcOperator::Mul => "×",
            CalcOperator::Div => "÷",
            CalcOperator::Sub => "-",
        }
    }
}

/// Whether a modifier is folded into the base value or kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModPolicy {
    /// Applied once to the base value, then discarded.
    Instant,
    /// Kept in the active list and evaluated on every apply-value query.
    #[default]
    Temporary,
}

/// How a modifier chains with the running total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CalcPolicy {
    /// The change `op` makes to the base value, `op(base, coefficient) - base`,
    /// is added to the running total.
    #[default]
    CalcWithBase,
    /// `op(total, coefficient)` replaces the running total.
    CalcWithResult,
}

/// Handle of one retained modifier entry in a `StatCore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModifierHandle(pub(crate) u64);

/// A stat modifier.
///
/// # Examples
///
/// ```rust
/// use statfx::{CalcOperator, CalcPolicy, StatModifier};
///
/// // +5 flat, evaluated before lower-priority modifiers
/// let flat = StatModifier::new("atk", CalcOperator::Add, 5.0).with_priority(10);
///
/// // ×2 on whatever the chain has produced so far
/// let double = StatModifier::new("atk", CalcOperator::Mul, 2.0)
///     .with_calc_policy(CalcPolicy::CalcWithResult);
///
/// assert_eq!(flat.priority(), 10);
/// assert_eq!(double.calc_policy(), CalcPolicy::CalcWithResult);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatModifier {
    target: StatId,
    coefficient: f64,
    operator: CalcOperator,
    #[serde(default)]
    policy: ModPolicy,
    #[serde(default)]
    calc: CalcPolicy,
    #[serde(default)]
    priority: i32,
}

impl StatModifier {
    /// A temporary `CalcWithBase` modifier at priority 0.
    pub fn new(target: impl Into<StatId>, operator: CalcOperator, coefficient: f64) -> Self {
        Self {
            target: target.into(),
            coefficient,
            operator,
            policy: ModPolicy::Temporary,
            calc: CalcPolicy::CalcWithBase,
            priority: 0,
        }
    }

    /// An instant modifier, folded into the base value when added.
    pub fn instant(target: impl Into<StatId>, operator: CalcOperator, coefficient: f64) -> Self {
        Self::new(target, operator, coefficient).with_policy(ModPolicy::Instant)
    }

    pub fn with_policy(mut self, policy: ModPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_calc_policy(mut self, calc: CalcPolicy) -> Self {
        self.calc = calc;
        self
    }

    /// Higher priorities run first.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_coefficient(mut self, coefficient: f64) -> Self {
        self.coefficient = coefficient;
        self
    }

    pub fn target(&self) -> &StatId {
        &self.target
    }

    pub fn coefficient(&self) -> f64 {
        self.coefficient
    }

    pub fn operator(&self) -> CalcOperator {
        self.operator
    }

    pub fn policy(&self) -> ModPolicy {
        self.policy
    }

    pub fn calc_policy(&self) -> CalcPolicy {
        self.calc
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Fold this modifier into a running total.
    ///
    /// `base` is the stat's raw base value, `total` the value produced by the
    /// modifiers before this one.
    pub fn fold(&self, base: f64, total: f64) -> f64 {
        match self.calc {
            CalcPolicy::CalcWithBase => {
                total + (self.operator.apply(base, self.coefficient) - base)
            }
            CalcPolicy::CalcWithResult => self.operator.apply(total, self.coefficient),
        }
    }

    pub fn description(&self) -> String {
        let chain = match self.calc {
            CalcPolicy::CalcWithBase => "base",
            CalcPolicy::CalcWithResult => "result",
        };
        format!(
            "{} {}{:.2} ({chain}, p{})",
            self.target,
            self.operator.symbol(),
            self.coefficient,
            self.priority
        )
    }
}

/// A retained temporary modifier.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveModifier {
    pub handle: ModifierHandle,
    pub timestamp: u32,
    pub modifier: StatModifier,
}
