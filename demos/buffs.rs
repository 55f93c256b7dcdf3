//! Buffs example: a hero with a clamped health pool, a stacking poison and a
//! data-driven shield.
//!
//! This example demonstrates:
//! - Loading a stat sheet and tags from JSON
//! - Dependency constraints (hp clamped to max hp)
//! - Stacking effects ticking down
//! - Building effects from a JSON profile with caster parameters
//!
//! Run with `RUST_LOG=statfx=debug cargo run --example buffs` to see the
//! engine's own logs.

use statfx::table::{ValueLookup, ValueTable};
use statfx::*;

fn main() -> Result<(), StatError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Buffs Demo ===\n");

    let mut registry = TagRegistry::new();
    registry.load_tags([
        "Class/Warrior",
        "Status/Debuff/Poison",
        "Status/Buff/Shield",
    ])?;

    let sheet = StatSheet::from_json(
        r#"{ "stats": { "max_hp": 120, "hp": 120, "armor": 5 }, "tags": ["Class/Warrior"] }"#,
    )?;
    let mut hero = StatObject::from_sheet("hero", &sheet, &registry)?;

    let hp = StatId::from_str("hp");
    let max_hp = StatId::from_str("max_hp");
    let armor = StatId::from_str("armor");

    // ===== Constraints =====
    println!("1. HP clamped to max HP\n");

    hero.core_mut()
        .add_constraint_with_dependencies(StatConstraint::value_range(
            hp.clone(),
            RangeBound::Const(0.0),
            RangeBound::StatBase(max_hp.clone()),
        ))?;
    hero.subscribe_stat(&hp, |change| {
        println!("  hp apply value: {:.1}", change.apply);
    });

    hero.core_mut().modify_base_value(&max_hp, 80.0);
    println!("  max_hp lowered to 80, hp is now {:.1}\n", hero.get_stat_base_value(&hp));

    // ===== Stacking =====
    println!("2. Poison stacks\n");

    let poison_tag = registry.resolve("Status/Debuff/Poison")?;
    let poison = |duration: f64| {
        EffectInstance::new("poison", duration)
            .with_modifiers(vec![StatModifier::new(armor.clone(), CalcOperator::Sub, 2.0)])
            .with_tags(vec![poison_tag.clone()])
            .with_stacking(3)
    };
    hero.subscribe_effect_updates(|update| {
        println!("  [{}] {:?}", update.effect_id, update.kind);
    });

    for duration in [3.0, 2.0, 1.0] {
        hero.apply_effect(poison(duration));
    }
    println!("  armor with 3 stacks: {:.1}", hero.get_stat_apply_value(&armor));

    for second in 1..=3 {
        hero.tick_effect_duration(1.0);
        println!(
            "  t={second}s armor {:.1}, poison tags {}",
            hero.get_stat_apply_value(&armor),
            hero.temporary_tags().count(&poison_tag)
        );
    }
    println!();

    // ===== Profiles =====
    println!("3. Shield from a profile\n");

    let profile = EffectProfile::from_json(
        r#"{
            "id": "shield",
            "name": "Arcane Shield",
            "tags": ["Status/Buff/Shield"],
            "modifiers": [
                { "target": "armor", "coefficient": 15.0, "operator": "Add" }
            ],
            "duration": { "key": "shield_time" }
        }"#,
    )?;

    let mut caster = ValueTable::new("mage");
    caster.set_number("shield_time", 4.0);

    let instance = profile.build_instance(Some("mage"), &registry, &caster)?;
    let (handle, _) = hero.apply_effect(instance);
    println!("  armor shielded: {:.1}", hero.get_stat_apply_value(&armor));

    let shield = registry.resolve("Status/Buff/Shield")?;
    println!(
        "  shielded: {}, remaining {:.1}s",
        hero.get_apply_tags().has_exact(&shield),
        hero.effect(handle).map_or(0.0, |e| e.represent_duration())
    );

    hero.tick_effect_duration(4.0);
    println!("  armor after shield: {:.1}", hero.get_stat_apply_value(&armor));

    println!("\n=== Demo Complete ===");
    Ok(())
}
