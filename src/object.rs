//! The stat object: one game entity's stats, tags and live effects.
//!
//! A `StatObject` owns a [`StatCore`], three tag layers (permanent, manual,
//! and temporary tags contributed by effects) and the list of active effect
//! instances. Applying an effect pushes its modifiers into the core and its
//! tags into the temporary layer; removing or expiring it retracts exactly
//! what was pushed.
//!
//! Listeners can subscribe per stat id, per tag, and to effect updates.
//! Per-tag listeners see the composed count over all three layers.

use crate::core::{ApplyValueChanged, StatCore};
use crate::effect::{EffectInstance, StackDurationPolicy, StackModifierPolicy, StackResult};
use crate::error::StatError;
use crate::events::{Observers, SubscriptionId};
use crate::modifier::{ModifierHandle, StatModifier};
use crate::stat_id::StatId;
use crate::tag::{Tag, TagRegistry};
use crate::tag_set::{TagChange, TagSet};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

/// Handle of an effect applied to one `StatObject`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectUpdateKind {
    /// A new instance was registered.
    Add,
    /// An existing instance gained a stack.
    Stack,
    /// At the stack cap; the smallest duration track was replaced.
    RefreshSmallest,
    /// At the stack cap; the shared duration track was reset.
    ResetDuration,
    /// Some stacks ran out or were dispelled.
    RemovedStack,
    /// The instance was ticked.
    Refresh,
    /// The instance was removed.
    Remove,
}

/// Notification about one effect on a `StatObject`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectUpdate {
    pub handle: EffectHandle,
    pub effect_id: String,
    pub kind: EffectUpdateKind,
}

/// Initial base values and permanent tags for a `StatObject`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatSheet {
    #[serde(default)]
    pub stats: BTreeMap<String, f64>,
    /// Tag paths.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl StatSheet {
    pub fn from_json(json: &str) -> Result<Self, StatError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// What one stack of an effect pushed into the object.
#[derive(Debug, Default)]
struct AppliedStack {
    modifiers: Vec<ModifierHandle>,
    tags: Vec<Tag>,
}

#[derive(Debug)]
struct ActiveEffect {
    handle: EffectHandle,
    instance: EffectInstance,
    stacks: Vec<AppliedStack>,
}

#[derive(Debug, Clone, Copy)]
enum TagLayer {
    Permanent,
    Manual,
    Temporary,
}

type StatListeners = Rc<RefCell<HashMap<StatId, Observers<ApplyValueChanged>>>>;

/// A game entity's stats, tags and effects.
///
/// # Examples
///
/// ```rust
/// use statfx::{CalcOperator, EffectInstance, StatId, StatModifier, StatObject};
///
/// let atk = StatId::from_str("atk");
/// let mut hero = StatObject::new("hero");
/// hero.initialize_stats([(atk.clone(), 10.0)]);
///
/// let rage = EffectInstance::new("rage", 3.0)
///     .with_modifiers(vec![StatModifier::new(atk.clone(), CalcOperator::Add, 5.0)]);
/// hero.apply_effect(rage);
/// assert_eq!(hero.get_stat_apply_value(&atk), 15.0);
///
/// hero.tick_effect_duration(3.0);
/// assert_eq!(hero.get_stat_apply_value(&atk), 10.0);
/// assert_eq!(hero.effect_count(), 0);
/// ```
#[derive(Debug)]
pub struct StatObject {
    key: String,
    core: StatCore,
    permanent_tags: TagSet,
    manual_tags: TagSet,
    temporary_tags: TagSet,
    effects: Vec<ActiveEffect>,
    next_effect: u64,
    on_effect_update: Observers<EffectUpdate>,
    stat_listeners: StatListeners,
    tag_listeners: HashMap<Tag, Observers<TagChange>>,
}

impl StatObject {
    /// Create an empty object. `key` identifies it as a caster.
    pub fn new(key: impl Into<String>) -> Self {
        let mut core = StatCore::new();
        let stat_listeners: StatListeners = Rc::default();
        let relay = stat_listeners.clone();
        core.subscribe_apply_changed(move |change| {
            if let Some(observers) = relay.borrow_mut().get_mut(&change.stat) {
                observers.emit(change);
            }
        });

        Self {
            key: key.into(),
            core,
            permanent_tags: TagSet::new(),
            manual_tags: TagSet::new(),
            temporary_tags: TagSet::new(),
            effects: Vec::new(),
            next_effect: 0,
            on_effect_update: Observers::new(),
            stat_listeners,
            tag_listeners: HashMap::new(),
        }
    }

    /// Create an object seeded from a sheet. Fails with `UnknownTag` if a
    /// permanent tag path is not loaded.
    pub fn from_sheet(
        key: impl Into<String>,
        sheet: &StatSheet,
        registry: &TagRegistry,
    ) -> Result<Self, StatError> {
        let tags = registry.resolve_all(&sheet.tags)?;
        let mut object = Self::new(key);
        object.initialize_stats(
            sheet
                .stats
                .iter()
                .map(|(id, value)| (StatId::from_str(id), *value)),
        );
        object.permanent_tags.add_batch(&tags);
        Ok(object)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn core(&self) -> &StatCore {
        &self.core
    }

    /// Direct access to the core, for constraints and custom getters.
    pub fn core_mut(&mut self) -> &mut StatCore {
        &mut self.core
    }

    // ---- stats ----

    /// Write base values through the core.
    pub fn initialize_stats<I>(&mut self, stats: I)
    where
        I: IntoIterator<Item = (StatId, f64)>,
    {
        for (id, value) in stats {
            self.core.modify_base_value(&id, value);
        }
    }

    pub fn get_stat_base_value(&mut self, stat_id: &StatId) -> f64 {
        self.core.get_base_value(stat_id)
    }

    pub fn get_stat_apply_value(&mut self, stat_id: &StatId) -> f64 {
        self.core.get_apply_value(stat_id)
    }

    /// Observe apply-value changes of one stat.
    pub fn subscribe_stat<F>(&mut self, stat_id: &StatId, callback: F) -> SubscriptionId
    where
        F: FnMut(&ApplyValueChanged) + 'static,
    {
        self.stat_listeners
            .borrow_mut()
            .entry(stat_id.clone())
            .or_default()
            .subscribe(callback)
    }

    pub fn unsubscribe_stat(&mut self, stat_id: &StatId, id: SubscriptionId) -> bool {
        self.stat_listeners
            .borrow_mut()
            .get_mut(stat_id)
            .is_some_and(|observers| observers.unsubscribe(id))
    }

    // ---- tags ----

    /// Permanent, manual and temporary tags composed into a fresh set.
    pub fn get_apply_tags(&self) -> TagSet {
        TagSet::merged([&self.permanent_tags, &self.manual_tags, &self.temporary_tags])
    }

    pub fn permanent_tags(&self) -> &TagSet {
        &self.permanent_tags
    }

    pub fn manual_tags(&self) -> &TagSet {
        &self.manual_tags
    }

    /// Tags contributed by active effects.
    pub fn temporary_tags(&self) -> &TagSet {
        &self.temporary_tags
    }

    pub fn add_manual_tag(&mut self, tag: &Tag) {
        self.change_tags(TagLayer::Manual, std::slice::from_ref(tag), true);
    }

    pub fn remove_manual_tag(&mut self, tag: &Tag) {
        self.change_tags(TagLayer::Manual, std::slice::from_ref(tag), false);
    }

    pub fn add_permanent_tag(&mut self, tag: &Tag) {
        self.change_tags(TagLayer::Permanent, std::slice::from_ref(tag), true);
    }

    pub fn remove_permanent_tag(&mut self, tag: &Tag) {
        self.change_tags(TagLayer::Permanent, std::slice::from_ref(tag), false);
    }

    /// Observe the composed count of one tag.
    pub fn subscribe_tag<F>(&mut self, tag: &Tag, callback: F) -> SubscriptionId
    where
        F: FnMut(&TagChange) + 'static,
    {
        self.tag_listeners
            .entry(tag.clone())
            .or_default()
            .subscribe(callback)
    }

    pub fn unsubscribe_tag(&mut self, tag: &Tag, id: SubscriptionId) -> bool {
        self.tag_listeners
            .get_mut(tag)
            .is_some_and(|observers| observers.unsubscribe(id))
    }

    fn composed_count(&self, tag: &Tag) -> u32 {
        self.permanent_tags.count(tag)
            + self.manual_tags.count(tag)
            + self.temporary_tags.count(tag)
    }

    fn change_tags(&mut self, layer: TagLayer, tags: &[Tag], add: bool) {
        if tags.is_empty() {
            return;
        }
        let mut tracked: Vec<(Tag, u32)> = Vec::new();
        for tag in tags {
            if self.tag_listeners.contains_key(tag) && !tracked.iter().any(|(t, _)| t == tag) {
                tracked.push((tag.clone(), self.composed_count(tag)));
            }
        }

        let set = match layer {
            TagLayer::Permanent => &mut self.permanent_tags,
            TagLayer::Manual => &mut self.manual_tags,
            TagLayer::Temporary => &mut self.temporary_tags,
        };
        if add {
            set.add_batch(tags);
        } else {
            set.remove_batch(tags);
        }

        for (tag, previous) in tracked {
            let current = self.composed_count(&tag);
            if current == previous {
                continue;
            }
            if let Some(observers) = self.tag_listeners.get_mut(&tag) {
                observers.emit(&TagChange {
                    tag,
                    previous,
                    current,
                });
            }
        }
    }

    // ---- effects ----

    /// Apply an effect.
    ///
    /// A stacking instance whose id matches an active effect is merged into
    /// it: a new stack pushes another copy of the modifiers and tags (only
    /// the first under [`StackModifierPolicy::Once`]); a duration refresh
    /// pushes nothing. Anything else is registered as a new effect.
    pub fn apply_effect(
        &mut self,
        mut instance: EffectInstance,
    ) -> (EffectHandle, EffectUpdateKind) {
        if instance.use_stacking() {
            if let Some(index) = self.effects.iter().position(|active| {
                active.instance.use_stacking()
                    && active.instance.effect_id() == instance.effect_id()
            }) {
                let result = self.effects[index].instance.try_add_stack(&instance);
                let kind = match result {
                    StackResult::Stack => Some(EffectUpdateKind::Stack),
                    StackResult::RefreshSmallest => Some(EffectUpdateKind::RefreshSmallest),
                    StackResult::ResetDuration => Some(EffectUpdateKind::ResetDuration),
                    StackResult::AddFail => None,
                };
                if let Some(kind) = kind {
                    if kind == EffectUpdateKind::Stack {
                        let stack = match self.effects[index].instance.stack_modifier_policy() {
                            StackModifierPolicy::Cumulative => {
                                self.push_stack(instance.modifiers(), instance.tags())
                            }
                            StackModifierPolicy::Once => AppliedStack::default(),
                        };
                        self.effects[index].stacks.push(stack);
                    }
                    let handle = self.effects[index].handle;
                    self.notify_effect(handle, instance.effect_id(), kind);
                    return (handle, kind);
                }
            }
        }

        instance.activate();
        let handle = EffectHandle(self.next_effect);
        self.next_effect += 1;
        let stack = self.push_stack(instance.modifiers(), instance.tags());
        let effect_id = instance.effect_id().to_string();
        self.effects.push(ActiveEffect {
            handle,
            instance,
            stacks: vec![stack],
        });
        tracing::debug!(object = %self.key, effect = %effect_id, "effect applied");
        self.notify_effect(handle, &effect_id, EffectUpdateKind::Add);
        (handle, EffectUpdateKind::Add)
    }

    /// Remove an effect and retract everything it pushed.
    pub fn remove_effect(&mut self, handle: EffectHandle) -> bool {
        let Some(index) = self.index_of(handle) else {
            return false;
        };
        let effect = self.effects.remove(index);
        for stack in effect.stacks {
            self.retract_stack(stack);
        }
        tracing::debug!(
            object = %self.key,
            effect = %effect.instance.effect_id(),
            "effect removed"
        );
        self.notify_effect(handle, effect.instance.effect_id(), EffectUpdateKind::Remove);
        true
    }

    /// Remove `n` stacks from an effect, shortest independent tracks first.
    /// Returns the resulting update, or `None` for an unknown handle or when
    /// no stack was removed.
    pub fn dispel(&mut self, handle: EffectHandle, n: u32) -> Option<EffectUpdateKind> {
        let index = self.index_of(handle)?;
        let instance = &mut self.effects[index].instance;
        let before = instance.stack_count();
        let (expired, tracks) = instance.force_remove_tracks(n);
        if expired {
            self.remove_effect(handle);
            return Some(EffectUpdateKind::Remove);
        }
        let removed = before - self.effects[index].instance.stack_count();
        if removed == 0 {
            return None;
        }
        self.drop_stacks(index, removed, &tracks);
        Some(EffectUpdateKind::RemovedStack)
    }

    /// Advance every active effect by `dt`, removing the ones that expire.
    pub fn tick_effect_duration(&mut self, dt: f64) {
        let handles: Vec<EffectHandle> = self.effects.iter().map(|e| e.handle).collect();
        for handle in handles {
            let Some(index) = self.index_of(handle) else {
                continue;
            };
            let instance = &mut self.effects[index].instance;
            let before = instance.stack_count();
            let (expired, tracks) = instance.tick_tracks(dt);
            let after = instance.stack_count();
            let effect_id = instance.effect_id().to_string();

            if expired {
                self.remove_effect(handle);
            } else if after < before {
                self.drop_stacks(index, before - after, &tracks);
            }
            self.notify_effect(handle, &effect_id, EffectUpdateKind::Refresh);
        }
    }

    pub fn effect(&self, handle: EffectHandle) -> Option<&EffectInstance> {
        self.index_of(handle).map(|index| &self.effects[index].instance)
    }

    /// Handle of the active effect with `effect_id`, if any.
    pub fn find_effect(&self, effect_id: &str) -> Option<EffectHandle> {
        self.effects
            .iter()
            .find(|active| active.instance.effect_id() == effect_id)
            .map(|active| active.handle)
    }

    /// Active effects in application order.
    pub fn effects(&self) -> impl Iterator<Item = (EffectHandle, &EffectInstance)> {
        self.effects
            .iter()
            .map(|active| (active.handle, &active.instance))
    }

    pub fn effect_count(&self) -> usize {
        self.effects.len()
    }

    pub fn subscribe_effect_updates<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&EffectUpdate) + 'static,
    {
        self.on_effect_update.subscribe(callback)
    }

    pub fn unsubscribe_effect_updates(&mut self, id: SubscriptionId) -> bool {
        self.on_effect_update.unsubscribe(id)
    }

    fn index_of(&self, handle: EffectHandle) -> Option<usize> {
        self.effects.iter().position(|active| active.handle == handle)
    }

    fn push_stack(&mut self, modifiers: &[StatModifier], tags: &[Tag]) -> AppliedStack {
        let modifiers = modifiers
            .iter()
            .filter_map(|modifier| self.core.add_modifier(modifier.clone()))
            .collect();
        self.change_tags(TagLayer::Temporary, tags, true);
        AppliedStack {
            modifiers,
            tags: tags.to_vec(),
        }
    }

    fn retract_stack(&mut self, stack: AppliedStack) {
        for handle in stack.modifiers {
            self.core.remove_modifier(handle);
        }
        self.change_tags(TagLayer::Temporary, &stack.tags, false);
    }

    /// Retract `removed` stack records of the effect at `index` and notify
    /// `RemovedStack`.
    ///
    /// Independent cumulative stacks keep one record per duration track, so
    /// the records at the lost `tracks` go. Otherwise the most recently
    /// pushed records go first.
    fn drop_stacks(&mut self, index: usize, removed: u32, tracks: &[usize]) {
        let effect = &mut self.effects[index];
        let by_track = effect.instance.stack_duration_policy() == StackDurationPolicy::Independent
            && effect.instance.stack_modifier_policy() == StackModifierPolicy::Cumulative
            && tracks.len() == removed as usize
            && tracks.iter().all(|&track| track < effect.stacks.len());
        let dropped: Vec<AppliedStack> = if by_track {
            tracks
                .iter()
                .rev()
                .map(|&track| effect.stacks.remove(track))
                .collect()
        } else {
            let keep = effect.stacks.len().saturating_sub(removed as usize);
            effect.stacks.drain(keep..).collect()
        };
        let handle = effect.handle;
        let effect_id = effect.instance.effect_id().to_string();
        for stack in dropped {
            self.retract_stack(stack);
        }
        self.notify_effect(handle, &effect_id, EffectUpdateKind::RemovedStack);
    }

    fn notify_effect(&mut self, handle: EffectHandle, effect_id: &str, kind: EffectUpdateKind) {
        self.on_effect_update.emit(&EffectUpdate {
            handle,
            effect_id: effect_id.to_string(),
            kind,
        });
    }
}
