use statfx::table::{ValueLookup, ValueTable};
use statfx::*;
use std::cell::RefCell;
use std::rc::Rc;

fn registry() -> TagRegistry {
    let mut registry = TagRegistry::new();
    registry
        .load_tags([
            "Status/Debuff",
            "Status/Debuff/Poison",
            "Status/Buff/Shield",
            "Element/Fire",
        ])
        .unwrap();
    registry
}

fn poison(duration: f64) -> EffectInstance {
    EffectInstance::new("poison", duration)
        .with_modifiers(vec![StatModifier::new("regen", CalcOperator::Sub, 2.0)])
        .with_stacking(2)
        .with_stack_duration_policy(StackDurationPolicy::Independent)
}

/// At the cap, an independent stack replaces the smallest track.
#[test]
fn test_stacking_cap_independent_refresh() {
    let mut object = StatObject::new("target");
    let (handle, kind) = object.apply_effect(poison(5.0));
    assert_eq!(kind, EffectUpdateKind::Add);
    assert_eq!(object.apply_effect(poison(3.0)).1, EffectUpdateKind::Stack);
    assert_eq!(object.effect(handle).unwrap().durations(), &[5.0, 3.0]);

    let (same, kind) = object.apply_effect(poison(10.0));
    assert_eq!(same, handle);
    assert_eq!(kind, EffectUpdateKind::RefreshSmallest);

    let effect = object.effect(handle).unwrap();
    assert_eq!(effect.durations(), &[5.0, 10.0]);
    assert_eq!(effect.stack_count(), 2);
    // the refresh did not push a third copy
    assert_eq!(object.get_stat_apply_value(&StatId::from_str("regen")), -4.0);
}

/// A combined track loses one stack per depletion.
#[test]
fn test_combined_stack_out_one_at_a_time() {
    let frenzy = || {
        EffectInstance::new("frenzy", 2.0)
            .with_modifiers(vec![StatModifier::new("haste", CalcOperator::Add, 1.0)])
            .with_stacking(3)
            .with_stack_duration_policy(StackDurationPolicy::Combined)
            .with_stack_out_policy(StackOutPolicy::RemoveSingleStack)
    };
    let haste = StatId::from_str("haste");
    let mut object = StatObject::new("target");
    let (handle, _) = object.apply_effect(frenzy());
    object.apply_effect(frenzy());
    object.apply_effect(frenzy());
    assert_eq!(object.get_stat_apply_value(&haste), 3.0);

    let expired = Rc::new(RefCell::new(false));
    let sink = expired.clone();
    object.subscribe_effect_updates(move |u| {
        if u.kind == EffectUpdateKind::Remove {
            *sink.borrow_mut() = true;
        }
    });

    for remaining in [2, 1] {
        object.tick_effect_duration(2.0);
        let effect = object.effect(handle).unwrap();
        assert_eq!(effect.stack_count(), remaining);
        assert_eq!(effect.durations(), &[2.0]);
        assert_eq!(object.get_stat_apply_value(&haste), remaining as f64);
        assert!(!*expired.borrow());
    }

    object.tick_effect_duration(2.0);
    assert!(*expired.borrow());
    assert!(object.effect(handle).is_none());
    assert_eq!(object.get_stat_apply_value(&haste), 0.0);
}

/// At the cap, a combined stack only resets the shared track.
#[test]
fn test_combined_at_cap_resets_duration() {
    let ward = |duration: f64| {
        EffectInstance::new("ward", duration)
            .with_modifiers(vec![StatModifier::new("armor", CalcOperator::Add, 10.0)])
            .with_stacking(1)
            .with_stack_duration_policy(StackDurationPolicy::Combined)
    };
    let mut object = StatObject::new("target");
    let (handle, _) = object.apply_effect(ward(4.0));
    object.tick_effect_duration(3.0);
    assert_eq!(object.apply_effect(ward(4.0)).1, EffectUpdateKind::ResetDuration);
    assert_eq!(object.effect(handle).unwrap().represent_duration(), 4.0);
    assert_eq!(object.get_stat_apply_value(&StatId::from_str("armor")), 10.0);
}

/// No modifier survives its effect's expiry.
#[test]
fn test_expiry_retracts_modifiers_and_tags() {
    let registry = registry();
    let poison_tag = registry.resolve("Status/Debuff/Poison").unwrap();
    let debuff = registry.resolve("Status/Debuff").unwrap();

    let mut object = StatObject::new("target");
    object.apply_effect(poison(1.0).with_tags(vec![poison_tag.clone()]));
    object.apply_effect(poison(2.0).with_tags(vec![poison_tag.clone()]));
    assert!(object.get_apply_tags().has_any_super_of(&debuff));
    assert_eq!(object.core().active_modifiers().len(), 2);

    object.tick_effect_duration(1.0);
    assert_eq!(object.core().active_modifiers().len(), 1);
    assert_eq!(object.temporary_tags().count(&poison_tag), 1);

    object.tick_effect_duration(1.0);
    assert!(object.core().active_modifiers().is_empty());
    assert!(object.temporary_tags().is_empty());
    assert_eq!(object.effect_count(), 0);
}

/// Infinite effects are only removed explicitly.
#[test]
fn test_infinite_effect_and_manual_removal() {
    let mut object = StatObject::new("target");
    let (handle, _) = object.apply_effect(
        EffectInstance::new("aura", 0.0)
            .with_duration_policy(DurationPolicy::Infinite)
            .with_modifiers(vec![StatModifier::new("str", CalcOperator::Add, 3.0)]),
    );
    object.tick_effect_duration(1_000_000.0);
    assert_eq!(object.effect(handle).unwrap().represent_duration(), f64::MAX);
    assert_eq!(object.get_stat_apply_value(&StatId::from_str("str")), 3.0);

    assert!(object.remove_effect(handle));
    assert_eq!(object.get_stat_apply_value(&StatId::from_str("str")), 0.0);
}

/// Dispelling some stacks retracts only those stacks.
#[test]
fn test_dispel_partial() {
    let mut object = StatObject::new("target");
    let regen = StatId::from_str("regen");
    let (handle, _) = object.apply_effect(poison(5.0));
    object.apply_effect(poison(1.0));
    assert_eq!(object.get_stat_apply_value(&regen), -4.0);

    assert_eq!(object.dispel(handle, 1), Some(EffectUpdateKind::RemovedStack));
    let effect = object.effect(handle).unwrap();
    assert_eq!(effect.stack_count(), 1);
    assert_eq!(effect.durations(), &[5.0]);
    assert_eq!(object.get_stat_apply_value(&regen), -2.0);
}

/// Instances built from a group stack by composite id.
#[test]
fn test_group_instances_stack_on_object() {
    let registry = registry();
    let mut table = ValueTable::new("params");
    table.set_number("fire_stacks", 2.0);
    table.set_number("fire_dps", 3.0);

    let json = r#"{
        "id": "immolate",
        "profiles": [
            { "id": "burn", "tags": ["Element/Fire"], "modifiers": [
                { "target": "hp_regen", "coefficient": 1.0, "operator": "Sub" } ] }
        ],
        "overrides": [ { "profile": 0, "modifier": 0, "value": { "key": "fire_dps" } } ],
        "duration": 6.0,
        "use_stacking": true,
        "max_stack": { "key": "fire_stacks" }
    }"#;
    let group = EffectGroup::from_json(json).unwrap();

    let regen = StatId::from_str("hp_regen");
    let mut object = StatObject::new("target");
    for _ in 0..3 {
        for instance in group.build_instances(Some("warlock"), &registry, &table).unwrap() {
            object.apply_effect(instance);
        }
    }

    let handle = object.find_effect("immolate%0%burn").unwrap();
    let effect = object.effect(handle).unwrap();
    assert_eq!(effect.stack_count(), 2);
    assert_eq!(effect.caster(), Some("warlock"));
    assert_eq!(object.get_stat_apply_value(&regen), -6.0);
}

/// A caster's table can change between casts.
#[test]
fn test_dynamic_duration_read_at_build_time() {
    let registry = registry();
    let mut table = ValueTable::new("params");
    let mut profile = EffectProfile::new("shield");
    profile.timing.duration = ParamValue::dynamic("shield_time");

    table.set_number("shield_time", 2.0);
    let short = profile.build_instance(None, &registry, &table).unwrap();
    table.set_number("shield_time", 9.0);
    let long = profile.build_instance(None, &registry, &table).unwrap();

    assert_eq!(short.defined_duration(), 2.0);
    assert_eq!(long.defined_duration(), 9.0);
}

fn venom(duration: f64, dps: f64) -> EffectInstance {
    EffectInstance::new("venom", duration)
        .with_modifiers(vec![StatModifier::new("regen", CalcOperator::Sub, dps)])
        .with_stacking(3)
        .with_stack_duration_policy(StackDurationPolicy::Independent)
}

/// A run-out track takes its own cast's modifiers with it.
#[test]
fn test_expired_track_retracts_its_own_stack() {
    let regen = StatId::from_str("regen");
    let mut object = StatObject::new("target");
    let (handle, _) = object.apply_effect(venom(1.0, 3.0));
    object.apply_effect(venom(10.0, 5.0));
    assert_eq!(object.get_stat_apply_value(&regen), -8.0);

    object.tick_effect_duration(1.0);
    assert_eq!(object.effect(handle).unwrap().durations(), &[9.0]);
    assert_eq!(object.get_stat_apply_value(&regen), -5.0);
}

/// Dispel removes the shortest track's stack, not the newest one.
#[test]
fn test_dispel_retracts_shortest_track_stack() {
    let regen = StatId::from_str("regen");
    let mut object = StatObject::new("target");
    let (handle, _) = object.apply_effect(venom(2.0, 3.0));
    object.apply_effect(venom(8.0, 5.0));
    object.apply_effect(venom(6.0, 7.0));

    assert_eq!(object.dispel(handle, 1), Some(EffectUpdateKind::RemovedStack));
    assert_eq!(object.effect(handle).unwrap().durations(), &[8.0, 6.0]);
    assert_eq!(object.get_stat_apply_value(&regen), -12.0);

    object.tick_effect_duration(6.0);
    assert_eq!(object.get_stat_apply_value(&regen), -5.0);
}

/// Dispelling zero stacks is a no-op.
#[test]
fn test_dispel_nothing_is_silent() {
    let mut object = StatObject::new("target");
    let (handle, _) = object.apply_effect(poison(5.0));
    let updates = Rc::new(RefCell::new(Vec::new()));
    let sink = updates.clone();
    object.subscribe_effect_updates(move |u| sink.borrow_mut().push(u.kind));

    assert_eq!(object.dispel(handle, 0), None);
    assert_eq!(object.effect(handle).unwrap().stack_count(), 1);
    assert!(updates.borrow().is_empty());
}
