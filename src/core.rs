//! The stat computation core.
//!
//! `StatCore` owns every stat's base value, the active temporary modifiers,
//! the registered constraints with their dependency graph, and custom
//! getters. It runs two pipelines:
//!
//! - **Base**: [`StatCore::modify_base_value`] runs base-stage constraints in
//!   registration order, stores the result, re-processes constraints that
//!   depend on the stat, then notifies `BaseValueChanged` and
//!   `ApplyValueChanged`.
//! - **Apply**: [`StatCore::get_apply_value`] seeds from the base value (or a
//!   custom getter), folds temporary modifiers ordered by priority
//!   (descending) then insertion timestamp (ascending), and finishes with the
//!   apply-stage constraints.
//!
//! Stats are created on first reference with a base value of `0.0` and are
//! never deleted. Reads therefore take `&mut self`.

use crate::constraint::{ConstraintId, ConstraintStage, StatConstraint};
use crate::error::StatError;
use crate::events::{Observers, SubscriptionId};
use crate::getter::{CustomGetter, ModifierSource};
use crate::graph::DependencyGraph;
use crate::modifier::{ActiveModifier, CalcPolicy, ModPolicy, ModifierHandle, StatModifier};
use crate::stat_id::StatId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::rc::Rc;

/// The stored base value of one stat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatInfo {
    pub id: StatId,
    pub value: f64,
}

/// A stat's base value was written.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseValueChanged {
    pub stat: StatId,
    pub value: f64,
    pub previous: f64,
}

/// A stat's apply value may have changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyValueChanged {
    pub stat: StatId,
    pub base: f64,
    pub apply: f64,
}

/// Stat storage and computation.
///
/// # Examples
///
/// ```rust
/// use statfx::{CalcOperator, CalcPolicy, StatCore, StatId, StatModifier};
///
/// let mut core = StatCore::new();
/// let atk = StatId::from_str("atk");
/// core.modify_base_value(&atk, 10.0);
///
/// core.add_modifier(StatModifier::new(atk.clone(), CalcOperator::Add, 5.0));
/// core.add_modifier(
///     StatModifier::new(atk.clone(), CalcOperator::Mul, 2.0)
///         .with_calc_policy(CalcPolicy::CalcWithResult),
/// );
///
/// assert_eq!(core.get_base_value(&atk), 10.0);
/// assert_eq!(core.get_apply_value(&atk), 30.0);
/// ```
#[derive(Debug, Default)]
pub struct StatCore {
    stats: HashMap<StatId, StatInfo>,
    constraints: HashMap<ConstraintId, Rc<StatConstraint>>,
    constraints_by_target: HashMap<StatId, Vec<ConstraintId>>,
    graph: DependencyGraph,
    getters: HashMap<StatId, CustomGetter>,
    modifiers: Vec<ActiveModifier>,
    timestamp_counter: u32,
    next_handle: u64,
    next_constraint: u64,
    on_base_changed: Observers<BaseValueChanged>,
    on_apply_changed: Observers<ApplyValueChanged>,
}

impl StatCore {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- stats ----

    /// Register a stat with an initial base value, bypassing constraints and
    /// notifications. Returns `false` if the stat already exists.
    pub fn add_stat(&mut self, stat_id: &StatId, initial: f64) -> bool {
        if self.stats.contains_key(stat_id) {
            return false;
        }
        tracing::debug!(stat = %stat_id, initial, "stat added");
        self.stats.insert(
            stat_id.clone(),
            StatInfo {
                id: stat_id.clone(),
                value: initial,
            },
        );
        true
    }

    pub fn contains_stat(&self, stat_id: &StatId) -> bool {
        self.stats.contains_key(stat_id)
    }

    pub fn stat_info(&self, stat_id: &StatId) -> Option<&StatInfo> {
        self.stats.get(stat_id)
    }

    pub fn stat_ids(&self) -> impl Iterator<Item = &StatId> {
        self.stats.keys()
    }

    fn ensure_stat(&mut self, stat_id: &StatId) {
        if !self.stats.contains_key(stat_id) {
            tracing::debug!(stat = %stat_id, "unknown stat referenced, created with base 0");
            self.stats.insert(
                stat_id.clone(),
                StatInfo {
                    id: stat_id.clone(),
                    value: 0.0,
                },
            );
        }
    }

    fn base_of(&self, stat_id: &StatId) -> f64 {
        self.stats.get(stat_id).map_or(0.0, |info| info.value)
    }

    fn write_base(&mut self, stat_id: &StatId, value: f64) {
        self.ensure_stat(stat_id);
        if let Some(info) = self.stats.get_mut(stat_id) {
            info.value = value;
        }
    }

    /// Base value of a stat, creating it if unseen.
    pub fn get_base_value(&mut self, stat_id: &StatId) -> f64 {
        self.ensure_stat(stat_id);
        self.base_of(stat_id)
    }

    /// Write a base value through the base-stage constraints.
    pub fn modify_base_value(&mut self, stat_id: &StatId, value: f64) {
        let previous = self.get_base_value(stat_id);
        let value = self.run_constraints(stat_id, value, ConstraintStage::Base);
        self.write_base(stat_id, value);
        self.resolve_dependents(stat_id);
        self.notify_changed(stat_id, previous);
    }

    /// Computed value of a stat: getter seed, modifiers, apply-stage
    /// constraints.
    pub fn get_apply_value(&mut self, stat_id: &StatId) -> f64 {
        let base = self.get_base_value(stat_id);
        let getter = self.getters.get(stat_id).cloned();
        let (seed, source) = match &getter {
            Some(getter) => (
                getter.process(self, stat_id, base),
                getter.modifier_source().clone(),
            ),
            None => (base, ModifierSource::Own),
        };

        let hook = match source {
            ModifierSource::Own => Some(stat_id.clone()),
            ModifierSource::Hook(id) => Some(id),
            ModifierSource::Ignore => None,
        };
        let total = match hook {
            Some(hook) => self
                .sorted_modifiers(&hook)
                .into_iter()
                .fold(seed, |total, modifier| modifier.fold(base, total)),
            None => seed,
        };

        self.run_constraints(stat_id, total, ConstraintStage::Apply)
    }

    /// Apply value of every known stat.
    pub fn all_apply_values(&mut self) -> HashMap<StatId, f64> {
        let ids: Vec<StatId> = self.stats.keys().cloned().collect();
        ids.into_iter()
            .map(|id| {
                let value = self.get_apply_value(&id);
                (id, value)
            })
            .collect()
    }

    // ---- modifiers ----

    /// Add a modifier.
    ///
    /// Instant modifiers compute `op(base or apply, coefficient)` and write it
    /// as the new base value; nothing is retained and `None` is returned.
    /// Temporary modifiers are retained under a fresh handle.
    pub fn add_modifier(&mut self, modifier: StatModifier) -> Option<ModifierHandle> {
        let target = modifier.target().clone();
        match modifier.policy() {
            ModPolicy::Instant => {
                let current = match modifier.calc_policy() {
                    CalcPolicy::CalcWithBase => self.get_base_value(&target),
                    CalcPolicy::CalcWithResult => self.get_apply_value(&target),
                };
                let value = modifier.operator().apply(current, modifier.coefficient());
                self.modify_base_value(&target, value);
                None
            }
            ModPolicy::Temporary => {
                self.ensure_stat(&target);
                let handle = ModifierHandle(self.next_handle);
                self.next_handle += 1;
                let timestamp = self.issue_timestamp();
                self.modifiers.push(ActiveModifier {
                    handle,
                    timestamp,
                    modifier,
                });
                self.notify_apply_changed(&target);
                Some(handle)
            }
        }
    }

    /// Push another entry sharing `handle`'s modifier and handle, with a new
    /// timestamp. Returns `false` for an unknown handle.
    pub fn duplicate_modifier(&mut self, handle: ModifierHandle) -> bool {
        let Some(modifier) = self
            .modifiers
            .iter()
            .find(|entry| entry.handle == handle)
            .map(|entry| entry.modifier.clone())
        else {
            return false;
        };
        let target = modifier.target().clone();
        let timestamp = self.issue_timestamp();
        self.modifiers.push(ActiveModifier {
            handle,
            timestamp,
            modifier,
        });
        self.notify_apply_changed(&target);
        true
    }

    /// Remove the first entry with `handle`.
    ///
    /// Fires `ApplyValueChanged` for the modifier's target. An unknown handle
    /// has no target, so nothing is removed and no event fires.
    pub fn remove_modifier(&mut self, handle: ModifierHandle) -> bool {
        match self.modifiers.iter().position(|entry| entry.handle == handle) {
            Some(index) => {
                let removed = self.modifiers.remove(index);
                self.notify_apply_changed(removed.modifier.target());
                true
            }
            None => false,
        }
    }

    /// Remove every entry with `handle`. Returns how many were removed.
    ///
    /// As with [`remove_modifier`](Self::remove_modifier), an unknown handle
    /// removes nothing and fires no event.
    pub fn remove_all_modifiers(&mut self, handle: ModifierHandle) -> usize {
        let target = self
            .modifiers
            .iter()
            .find(|entry| entry.handle == handle)
            .map(|entry| entry.modifier.target().clone());
        let before = self.modifiers.len();
        self.modifiers.retain(|entry| entry.handle != handle);
        let removed = before - self.modifiers.len();
        if let Some(target) = target {
            self.notify_apply_changed(&target);
        }
        removed
    }

    pub fn active_modifiers(&self) -> &[ActiveModifier] {
        &self.modifiers
    }

    fn sorted_modifiers(&self, target: &StatId) -> Vec<StatModifier> {
        let mut applied: Vec<&ActiveModifier> = self
            .modifiers
            .iter()
            .filter(|entry| entry.modifier.target() == target)
            .collect();
        applied.sort_by(|a, b| {
            b.modifier
                .priority()
                .cmp(&a.modifier.priority())
                .then(a.timestamp.cmp(&b.timestamp))
        });
        applied.into_iter().map(|entry| entry.modifier.clone()).collect()
    }

    /// Next insertion timestamp. When the counter is exhausted, the active
    /// list is renumbered by index and counting resumes after it.
    fn issue_timestamp(&mut self) -> u32 {
        if self.timestamp_counter == u32::MAX {
            for (index, entry) in self.modifiers.iter_mut().enumerate() {
                entry.timestamp = index as u32;
            }
            self.timestamp_counter = self.modifiers.len() as u32;
        }
        let timestamp = self.timestamp_counter;
        self.timestamp_counter += 1;
        timestamp
    }

    // ---- constraints ----

    /// Register a constraint and re-normalize its target's base value.
    pub fn add_constraint(&mut self, constraint: StatConstraint) -> ConstraintId {
        let target = constraint.target().clone();
        self.ensure_stat(&target);

        let id = ConstraintId(self.next_constraint);
        self.next_constraint += 1;
        self.constraints.insert(id, Rc::new(constraint));
        self.constraints_by_target
            .entry(target.clone())
            .or_default()
            .push(id);

        let current = self.base_of(&target);
        self.modify_base_value(&target, current);
        id
    }

    /// Register a constraint together with a dependency edge for every stat
    /// it reads. Nothing is registered if any edge would be rejected.
    pub fn add_constraint_with_dependencies(
        &mut self,
        constraint: StatConstraint,
    ) -> Result<ConstraintId, StatError> {
        let dependencies = constraint.depends_on();
        for dependency in &dependencies {
            self.check_dependency(dependency, constraint.target())?;
        }
        let id = self.add_constraint(constraint);
        for dependency in &dependencies {
            self.add_dependency(dependency, id)?;
        }
        Ok(id)
    }

    /// Unregister a constraint and every dependency edge carrying it.
    pub fn remove_constraint(&mut self, id: ConstraintId) -> bool {
        let Some(constraint) = self.constraints.remove(&id) else {
            return false;
        };
        if let Some(ids) = self.constraints_by_target.get_mut(constraint.target()) {
            ids.retain(|other| *other != id);
        }
        self.graph.remove_constraint(id);
        true
    }

    pub fn constraint(&self, id: ConstraintId) -> Option<&StatConstraint> {
        self.constraints.get(&id).map(Rc::as_ref)
    }

    /// Constraints on `stat_id`, in registration order.
    pub fn constraints_for(&self, stat_id: &StatId) -> Vec<ConstraintId> {
        self.constraints_by_target
            .get(stat_id)
            .cloned()
            .unwrap_or_default()
    }

    fn run_constraints(&mut self, stat_id: &StatId, value: f64, stage: ConstraintStage) -> f64 {
        let Some(ids) = self.constraints_by_target.get(stat_id) else {
            return value;
        };
        let active: Vec<Rc<StatConstraint>> = ids
            .iter()
            .filter_map(|id| self.constraints.get(id))
            .filter(|constraint| constraint.applies_to(stage))
            .cloned()
            .collect();
        active
            .iter()
            .fold(value, |value, constraint| constraint.process(self, value))
    }

    // ---- dependencies ----

    fn check_dependency(&self, dependency: &StatId, target: &StatId) -> Result<(), StatError> {
        if dependency == target {
            tracing::warn!(stat = %target, "recursive dependency is not allowed, add failed");
            return Err(StatError::RecursiveDependency(target.clone()));
        }
        if self.graph.has_edge(target, dependency) {
            tracing::warn!(
                dependency = %dependency,
                target = %target,
                "cyclic dependency detected, add failed"
            );
            return Err(StatError::CyclicDependency {
                dependency: dependency.clone(),
                target: target.clone(),
            });
        }
        Ok(())
    }

    /// Re-process `constraint` whenever `dependency`'s base value changes.
    ///
    /// Self-dependencies and edges whose reverse already exists are rejected
    /// (logged and returned). Longer cycles are not detected here; see
    /// [`StatCore::dependency_cycle`]. On success the dependents of
    /// `dependency` are resolved immediately.
    pub fn add_dependency(
        &mut self,
        dependency: &StatId,
        constraint: ConstraintId,
    ) -> Result<(), StatError> {
        let Some(target) = self.constraints.get(&constraint).map(|c| c.target().clone()) else {
            tracing::warn!(?constraint, "dependency on unknown constraint, add failed");
            return Err(StatError::UnknownConstraint(constraint));
        };
        self.ensure_stat(dependency);
        self.check_dependency(dependency, &target)?;

        self.graph.add_edge(dependency.clone(), target, constraint);
        self.resolve_dependents(dependency);
        Ok(())
    }

    pub fn remove_dependency(&mut self, dependency: &StatId, constraint: ConstraintId) -> bool {
        self.graph.remove_edge(dependency, constraint)
    }

    /// A dependency cycle longer than two stats, if one was registered.
    pub fn dependency_cycle(&self) -> Option<Vec<StatId>> {
        self.graph.find_cycle()
    }

    /// Re-process every base-stage constraint that depends on `stat_id` and
    /// notify once per affected stat. Does not cascade further.
    fn resolve_dependents(&mut self, stat_id: &StatId) {
        let ids = self.graph.dependents_of(stat_id);
        if ids.is_empty() {
            return;
        }

        let mut pending: Vec<(StatId, f64)> = Vec::new();
        for id in ids {
            let Some(constraint) = self.constraints.get(&id).cloned() else {
                continue;
            };
            if !constraint.applies_to(ConstraintStage::Base) {
                continue;
            }
            let target = constraint.target().clone();
            let current = self.base_of(&target);
            if !pending.iter().any(|(stat, _)| *stat == target) {
                pending.push((target.clone(), current));
            }
            let value = constraint.process(self, current);
            self.write_base(&target, value);
        }

        for (target, previous) in pending {
            self.notify_changed(&target, previous);
        }
    }

    // ---- custom getters ----

    /// Install a getter, returning the one it replaces.
    pub fn set_custom_getter(
        &mut self,
        stat_id: &StatId,
        getter: CustomGetter,
    ) -> Option<CustomGetter> {
        self.getters.insert(stat_id.clone(), getter)
    }

    pub fn remove_custom_getter(&mut self, stat_id: &StatId) -> Option<CustomGetter> {
        self.getters.remove(stat_id)
    }

    // ---- events ----

    fn notify_changed(&mut self, stat_id: &StatId, previous: f64) {
        let value = self.base_of(stat_id);
        self.on_base_changed.emit(&BaseValueChanged {
            stat: stat_id.clone(),
            value,
            previous,
        });
        self.notify_apply_changed(stat_id);
    }

    fn notify_apply_changed(&mut self, stat_id: &StatId) {
        let apply = self.get_apply_value(stat_id);
        let base = self.base_of(stat_id);
        self.on_apply_changed.emit(&ApplyValueChanged {
            stat: stat_id.clone(),
            base,
            apply,
        });
    }

    pub fn subscribe_base_changed<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&BaseValueChanged) + 'static,
    {
        self.on_base_changed.subscribe(callback)
    }

    pub fn unsubscribe_base_changed(&mut self, id: SubscriptionId) -> bool {
        self.on_base_changed.unsubscribe(id)
    }

    pub fn subscribe_apply_changed<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&ApplyValueChanged) + 'static,
    {
        self.on_apply_changed.subscribe(callback)
    }

    pub fn unsubscribe_apply_changed(&mut self, id: SubscriptionId) -> bool {
        self.on_apply_changed.unsubscribe(id)
    }
}
