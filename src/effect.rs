//! Timed effects and their stacking state machine.
//!
//! An `EffectInstance` bundles modifiers and tags with a duration. Once added
//! to a `StatObject` it is ticked with a caller-supplied `dt` and expires when
//! its stack count reaches zero.
//!
//! Stacking has two duration models:
//!
//! - `Independent`: one track per stack. Below the cap a new stack adds a
//!   track; at the cap the smallest track is replaced.
//! - `Combined`: one shared track. Below the cap a new stack increments the
//!   count and resets the track; at the cap only the track is reset.

use crate::events::{Observers, SubscriptionId};
use crate::modifier::StatModifier;
use crate::tag::Tag;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DurationPolicy {
    /// Counts down with each tick.
    #[default]
    Manual,
    /// Never expires on its own.
    Infinite,
}

/// What a depleted shared track does under `Combined` stacking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StackOutPolicy {
    /// Drop one stack and restart the track.
    #[default]
    RemoveSingleStack,
    /// Drop every stack.
    ClearAllStack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StackDurationPolicy {
    /// One duration track per stack.
    #[default]
    Independent,
    /// One duration track shared by all stacks.
    Combined,
}

/// Whether every stack applies the effect's modifiers and tags again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StackModifierPolicy {
    /// Each stack applies its own copy.
    #[default]
    Cumulative,
    /// Only the first stack applies them.
    Once,
}

/// Outcome of [`EffectInstance::try_add_stack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackResult {
    /// Stacking is off or the effect ids differ.
    AddFail,
    /// A new stack was added.
    Stack,
    /// At the cap; the smallest independent track was replaced.
    RefreshSmallest,
    /// At the cap; the shared track was reset.
    ResetDuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectState {
    /// Built, not yet applied to an object.
    Pending,
    Active,
    /// Stack count reached zero.
    Expired,
}

/// Notifications from a single instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectEvent {
    /// Some stacks ran out but the effect is still active.
    RemovedStack { removed: u32, remaining: u32 },
    Expired,
}

/// A live effect.
///
/// # Examples
///
/// ```rust
/// use statfx::effect::{EffectInstance, StackDurationPolicy, StackResult};
///
/// let mut burn = EffectInstance::new("burn", 5.0)
///     .with_stacking(2)
///     .with_stack_duration_policy(StackDurationPolicy::Independent);
///
/// assert_eq!(burn.try_add_stack(&EffectInstance::new("burn", 3.0)), StackResult::Stack);
/// assert_eq!(burn.durations(), &[5.0, 3.0]);
///
/// assert!(!burn.tick_duration(3.0));
/// assert_eq!(burn.stack_count(), 1);
/// assert!(burn.tick_duration(2.0));
/// ```
pub struct EffectInstance {
    effect_id: String,
    group_id: Option<String>,
    caster: Option<String>,
    modifiers: Vec<StatModifier>,
    tags: Vec<Tag>,
    duration_policy: DurationPolicy,
    defined_duration: f64,
    max_stack: u32,
    use_stacking: bool,
    stack_out_policy: StackOutPolicy,
    stack_duration_policy: StackDurationPolicy,
    stack_modifier_policy: StackModifierPolicy,
    durations: Vec<f64>,
    stack_count: u32,
    state: EffectState,
    observers: Observers<EffectEvent>,
}

impl EffectInstance {
    /// A single-stack, non-stacking effect lasting `duration`.
    pub fn new(effect_id: impl Into<String>, duration: f64) -> Self {
        Self {
            effect_id: effect_id.into(),
            group_id: None,
            caster: None,
            modifiers: Vec::new(),
            tags: Vec::new(),
            duration_policy: DurationPolicy::Manual,
            defined_duration: duration,
            max_stack: 1,
            use_stacking: false,
            stack_out_policy: StackOutPolicy::default(),
            stack_duration_policy: StackDurationPolicy::default(),
            stack_modifier_policy: StackModifierPolicy::default(),
            durations: vec![duration],
            stack_count: 1,
            state: EffectState::Pending,
            observers: Observers::new(),
        }
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// Attribute the effect to a caster, by key. The caster is not owned.
    pub fn with_caster(mut self, caster: impl Into<String>) -> Self {
        self.caster = Some(caster.into());
        self
    }

    pub fn with_modifiers(mut self, modifiers: Vec<StatModifier>) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_tags(mut self, tags: Vec<Tag>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_duration_policy(mut self, policy: DurationPolicy) -> Self {
        self.duration_policy = policy;
        self
    }

    /// Enable stacking up to `max_stack` (at least 1).
    pub fn with_stacking(mut self, max_stack: u32) -> Self {
        self.use_stacking = true;
        self.max_stack = max_stack.max(1);
        self
    }

    pub fn with_stack_out_policy(mut self, policy: StackOutPolicy) -> Self {
        self.stack_out_policy = policy;
        self
    }

    pub fn with_stack_duration_policy(mut self, policy: StackDurationPolicy) -> Self {
        self.stack_duration_policy = policy;
        self
    }

    pub fn with_stack_modifier_policy(mut self, policy: StackModifierPolicy) -> Self {
        self.stack_modifier_policy = policy;
        self
    }

    pub fn effect_id(&self) -> &str {
        &self.effect_id
    }

    pub fn group_id(&self) -> Option<&str> {
        self.group_id.as_deref()
    }

    pub fn caster(&self) -> Option<&str> {
        self.caster.as_deref()
    }

    pub fn modifiers(&self) -> &[StatModifier] {
        &self.modifiers
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn duration_policy(&self) -> DurationPolicy {
        self.duration_policy
    }

    pub fn defined_duration(&self) -> f64 {
        self.defined_duration
    }

    pub fn max_stack(&self) -> u32 {
        self.max_stack
    }

    pub fn use_stacking(&self) -> bool {
        self.use_stacking
    }

    pub fn stack_out_policy(&self) -> StackOutPolicy {
        self.stack_out_policy
    }

    pub fn stack_duration_policy(&self) -> StackDurationPolicy {
        self.stack_duration_policy
    }

    pub fn stack_modifier_policy(&self) -> StackModifierPolicy {
        self.stack_modifier_policy
    }

    /// Remaining duration of each track.
    pub fn durations(&self) -> &[f64] {
        &self.durations
    }

    pub fn stack_count(&self) -> u32 {
        self.stack_count
    }

    pub fn state(&self) -> EffectState {
        self.state
    }

    pub(crate) fn activate(&mut self) {
        if self.state == EffectState::Pending {
            self.state = EffectState::Active;
        }
    }

    /// Duration shown for the effect: the longest remaining track, or
    /// `f64::MAX` for infinite effects.
    pub fn represent_duration(&self) -> f64 {
        match self.duration_policy {
            DurationPolicy::Manual => self.durations.iter().copied().fold(0.0, f64::max),
            DurationPolicy::Infinite => f64::MAX,
        }
    }

    /// Try to merge `incoming` into this instance as another stack.
    pub fn try_add_stack(&mut self, incoming: &EffectInstance) -> StackResult {
        if !self.use_stacking || self.effect_id != incoming.effect_id {
            return StackResult::AddFail;
        }
        let duration = incoming.defined_duration;
        let below_cap = self.stack_count < self.max_stack;

        let result = match self.stack_duration_policy {
            StackDurationPolicy::Independent if below_cap => {
                self.stack_count += 1;
                self.durations.push(duration);
                StackResult::Stack
            }
            StackDurationPolicy::Independent => {
                if let Some(smallest) = self
                    .durations
                    .iter_mut()
                    .min_by(|a, b| a.total_cmp(b))
                {
                    *smallest = duration;
                }
                StackResult::RefreshSmallest
            }
            StackDurationPolicy::Combined => {
                self.reset_shared_track(duration);
                if below_cap {
                    self.stack_count += 1;
                    StackResult::Stack
                } else {
                    StackResult::ResetDuration
                }
            }
        };
        tracing::debug!(
            effect = %self.effect_id,
            stacks = self.stack_count,
            ?result,
            "stack added"
        );
        result
    }

    fn reset_shared_track(&mut self, duration: f64) {
        self.durations.clear();
        self.durations.push(duration);
    }

    /// Advance the effect by `dt`. Returns `true` once the effect has expired.
    pub fn tick_duration(&mut self, dt: f64) -> bool {
        self.tick_tracks(dt).0
    }

    /// [`tick_duration`](Self::tick_duration), also returning the indices of
    /// the independent tracks that ran out, ascending. Combined effects
    /// report no indices.
    pub(crate) fn tick_tracks(&mut self, dt: f64) -> (bool, Vec<usize>) {
        if self.state == EffectState::Expired {
            return (true, Vec::new());
        }
        if self.duration_policy == DurationPolicy::Infinite {
            return (false, Vec::new());
        }

        let before = self.stack_count;
        let ran_out = match self.stack_duration_policy {
            StackDurationPolicy::Independent => {
                for track in self.durations.iter_mut() {
                    *track -= dt;
                }
                let ran_out: Vec<usize> = self
                    .durations
                    .iter()
                    .enumerate()
                    .filter(|(_, track)| **track <= 0.0)
                    .map(|(index, _)| index)
                    .collect();
                self.durations.retain(|track| *track > 0.0);
                self.stack_count = self.stack_count.saturating_sub(ran_out.len() as u32);
                ran_out
            }
            StackDurationPolicy::Combined => {
                match self.durations.first_mut() {
                    None => self.stack_count = 0,
                    Some(track) => {
                        *track -= dt;
                        if *track <= 0.0 {
                            self.stack_out();
                        }
                    }
                }
                Vec::new()
            }
        };
        (self.settle(before), ran_out)
    }

    fn stack_out(&mut self) {
        match self.stack_out_policy {
            StackOutPolicy::RemoveSingleStack => {
                self.stack_count = self.stack_count.saturating_sub(1);
            }
            StackOutPolicy::ClearAllStack => self.stack_count = 0,
        }
        if self.stack_count > 0 {
            let defined = self.defined_duration;
            self.reset_shared_track(defined);
        } else {
            self.durations.clear();
        }
    }

    /// Remove `n` stacks outright, as a dispel would. Independent tracks are
    /// dropped shortest first; the rest keep their order. Returns `true` if
    /// the effect expired.
    pub fn force_remove_stack(&mut self, n: u32) -> bool {
        self.force_remove_tracks(n).0
    }

    /// [`force_remove_stack`](Self::force_remove_stack), also returning the
    /// indices of the dropped independent tracks, ascending.
    pub(crate) fn force_remove_tracks(&mut self, n: u32) -> (bool, Vec<usize>) {
        if self.state == EffectState::Expired {
            return (true, Vec::new());
        }
        let before = self.stack_count;
        self.stack_count = self.stack_count.saturating_sub(n);
        let dropped = match self.stack_duration_policy {
            StackDurationPolicy::Independent => {
                let mut by_length: Vec<usize> = (0..self.durations.len()).collect();
                by_length.sort_by(|a, b| self.durations[*a].total_cmp(&self.durations[*b]));
                let mut dropped: Vec<usize> = by_length
                    .into_iter()
                    .take((before - self.stack_count) as usize)
                    .collect();
                dropped.sort_unstable();
                for &index in dropped.iter().rev() {
                    self.durations.remove(index);
                }
                dropped
            }
            StackDurationPolicy::Combined => {
                if self.stack_count == 0 {
                    self.durations.clear();
                }
                Vec::new()
            }
        };
        (self.settle(before), dropped)
    }

    fn settle(&mut self, before: u32) -> bool {
        if self.stack_count == 0 {
            self.state = EffectState::Expired;
            tracing::debug!(effect = %self.effect_id, "effect expired");
            self.observers.emit(&EffectEvent::Expired);
            return true;
        }
        if self.stack_count < before {
            let event = EffectEvent::RemovedStack {
                removed: before - self.stack_count,
                remaining: self.stack_count,
            };
            tracing::debug!(effect = %self.effect_id, ?event, "stacks removed");
            self.observers.emit(&event);
        }
        false
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&EffectEvent) + 'static,
    {
        self.observers.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }
}

impl fmt::Debug for EffectInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectInstance")
            .field("effect_id", &self.effect_id)
            .field("group_id", &self.group_id)
            .field("stack_count", &self.stack_count)
            .field("durations", &self.durations)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn independent(id: &str, duration: f64, max: u32) -> EffectInstance {
        EffectInstance::new(id, duration)
            .with_stacking(max)
            .with_stack_duration_policy(StackDurationPolicy::Independent)
    }

    fn combined(id: &str, duration: f64, max: u32) -> EffectInstance {
        EffectInstance::new(id, duration)
            .with_stacking(max)
            .with_stack_duration_policy(StackDurationPolicy::Combined)
    }

    #[test]
    fn test_add_fail() {
        let mut plain = EffectInstance::new("a", 1.0);
        assert_eq!(plain.try_add_stack(&EffectInstance::new("a", 1.0)), StackResult::AddFail);

        let mut stacking = independent("a", 1.0, 3);
        assert_eq!(stacking.try_add_stack(&independent("b", 1.0, 3)), StackResult::AddFail);
        assert_eq!(stacking.stack_count(), 1);
    }

    #[test]
    fn test_independent_refreshes_smallest_at_cap() {
        let mut effect = independent("e", 5.0, 2);
        assert_eq!(effect.try_add_stack(&independent("e", 3.0, 2)), StackResult::Stack);
        assert_eq!(effect.durations(), &[5.0, 3.0]);

        assert_eq!(
            effect.try_add_stack(&independent("e", 10.0, 2)),
            StackResult::RefreshSmallest
        );
        assert_eq!(effect.durations(), &[5.0, 10.0]);
        assert_eq!(effect.stack_count(), 2);
    }

    #[test]
    fn test_combined_resets_shared_track() {
        let mut effect = combined("e", 4.0, 2);
        effect.tick_duration(1.0);
        assert_eq!(effect.try_add_stack(&combined("e", 4.0, 2)), StackResult::Stack);
        assert_eq!(effect.durations(), &[4.0]);

        effect.tick_duration(1.0);
        assert_eq!(
            effect.try_add_stack(&combined("e", 6.0, 2)),
            StackResult::ResetDuration
        );
        assert_eq!(effect.durations(), &[6.0]);
        assert_eq!(effect.stack_count(), 2);
    }

    #[test]
    fn test_combined_remove_single_stack() {
        let mut effect = combined("e", 2.0, 3);
        effect.try_add_stack(&combined("e", 2.0, 3));
        effect.try_add_stack(&combined("e", 2.0, 3));

        assert!(!effect.tick_duration(2.0));
        assert_eq!(effect.stack_count(), 2);
        assert_eq!(effect.durations(), &[2.0]);
        assert!(!effect.tick_duration(2.0));
        assert!(effect.tick_duration(2.0));
        assert_eq!(effect.state(), EffectState::Expired);
    }

    #[test]
    fn test_combined_clear_all() {
        let mut effect = combined("e", 2.0, 3).with_stack_out_policy(StackOutPolicy::ClearAllStack);
        effect.try_add_stack(&combined("e", 2.0, 3));
        assert!(effect.tick_duration(2.5));
        assert_eq!(effect.stack_count(), 0);
    }

    #[test]
    fn test_infinite_never_expires() {
        let mut effect =
            EffectInstance::new("aura", 1.0).with_duration_policy(DurationPolicy::Infinite);
        assert!(!effect.tick_duration(1_000.0));
        assert_eq!(effect.represent_duration(), f64::MAX);
        assert!(effect.force_remove_stack(1));
    }

    #[test]
    fn test_represent_duration_is_longest_track() {
        let mut effect = independent("e", 2.0, 3);
        effect.try_add_stack(&independent("e", 7.0, 3));
        effect.try_add_stack(&independent("e", 4.0, 3));
        assert_eq!(effect.represent_duration(), 7.0);
    }

    #[test]
    fn test_force_remove_drops_shortest_tracks() {
        let mut effect = independent("e", 2.0, 3);
        effect.try_add_stack(&independent("e", 7.0, 3));
        effect.try_add_stack(&independent("e", 4.0, 3));

        assert!(!effect.force_remove_stack(2));
        assert_eq!(effect.durations(), &[7.0]);
        assert_eq!(effect.stack_count(), 1);
        assert!(effect.force_remove_stack(5));
    }

    #[test]
    fn test_force_remove_keeps_track_order() {
        let mut effect = independent("e", 6.0, 3);
        effect.try_add_stack(&independent("e", 1.0, 3));
        effect.try_add_stack(&independent("e", 4.0, 3));

        assert_eq!(effect.force_remove_tracks(1), (false, vec![1]));
        assert_eq!(effect.durations(), &[6.0, 4.0]);
    }

    #[test]
    fn test_tick_reports_tracks_that_ran_out() {
        let mut effect = independent("e", 3.0, 3);
        effect.try_add_stack(&independent("e", 1.0, 3));
        effect.try_add_stack(&independent("e", 5.0, 3));

        assert_eq!(effect.tick_tracks(1.0), (false, vec![1]));
        assert_eq!(effect.durations(), &[2.0, 4.0]);
        assert_eq!(effect.tick_tracks(4.0), (true, vec![0, 1]));

        let mut shared = combined("e", 1.0, 2);
        shared.try_add_stack(&combined("e", 1.0, 2));
        assert_eq!(shared.tick_tracks(1.0), (false, Vec::new()));
        assert_eq!(shared.stack_count(), 1);
    }

    #[test]
    fn test_events() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut effect = independent("e", 1.0, 2);
        effect.try_add_stack(&independent("e", 3.0, 2));
        let sink = events.clone();
        effect.subscribe(move |e| sink.borrow_mut().push(*e));

        effect.tick_duration(1.0);
        effect.tick_duration(2.0);

        assert_eq!(
            *events.borrow(),
            vec![
                EffectEvent::RemovedStack {
                    removed: 1,
                    remaining: 1
                },
                EffectEvent::Expired,
            ]
        );
    }
}
