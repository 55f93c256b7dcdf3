//! Effect templates.
//!
//! `EffectProfile` and `EffectGroup` are plain serde data describing effects
//! to build at cast time. Numeric settings are [`ParamValue`]s: either a
//! constant or a key resolved against a [`ValueLookup`] when the instance is
//! built. Tag paths are resolved through a [`TagRegistry`].
//!
//! ```json
//! {
//!   "id": "ignite",
//!   "profiles": [
//!     { "id": "burn", "modifiers": [
//!         { "target": "hp_regen", "coefficient": -2.0, "operator": "Add" } ] }
//!   ],
//!   "overrides": [ { "profile": 0, "modifier": 0, "value": { "key": "burn_dps" } } ],
//!   "tags": ["Status/Debuff/Burn"],
//!   "duration": 4.0,
//!   "use_stacking": true,
//!   "max_stack": 3
//! }
//! ```

use crate::effect::{
    DurationPolicy, EffectInstance, StackDurationPolicy, StackModifierPolicy, StackOutPolicy,
};
use crate::error::StatError;
use crate::modifier::StatModifier;
use crate::table::ValueLookup;
use crate::tag::{Tag, TagRegistry};
use serde::{Deserialize, Serialize};

/// A numeric template parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Const(f64),
    /// Read from the value lookup at build time.
    Dynamic { key: String },
}

impl ParamValue {
    pub fn dynamic(key: impl Into<String>) -> Self {
        ParamValue::Dynamic { key: key.into() }
    }

    pub fn resolve(&self, lookup: &dyn ValueLookup) -> f64 {
        match self {
            ParamValue::Const(value) => *value,
            ParamValue::Dynamic { key } => lookup.get_number(key),
        }
    }

    /// Resolve as a stack cap. Values below one become one.
    fn resolve_stack(&self, lookup: &dyn ValueLookup) -> u32 {
        (self.resolve(lookup) as u32).max(1)
    }
}

impl Default for ParamValue {
    fn default() -> Self {
        ParamValue::Const(0.0)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Const(value)
    }
}

fn one() -> ParamValue {
    ParamValue::Const(1.0)
}

/// Duration and stacking settings shared by profiles and groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectTiming {
    #[serde(default)]
    pub duration_policy: DurationPolicy,
    #[serde(default)]
    pub duration: ParamValue,
    #[serde(default)]
    pub use_stacking: bool,
    #[serde(default = "one")]
    pub max_stack: ParamValue,
    #[serde(default)]
    pub stack_out_policy: StackOutPolicy,
    #[serde(default)]
    pub stack_duration_policy: StackDurationPolicy,
    #[serde(default)]
    pub stack_modifier_policy: StackModifierPolicy,
}

impl Default for EffectTiming {
    fn default() -> Self {
        Self {
            duration_policy: DurationPolicy::default(),
            duration: ParamValue::default(),
            use_stacking: false,
            max_stack: one(),
            stack_out_policy: StackOutPolicy::default(),
            stack_duration_policy: StackDurationPolicy::default(),
            stack_modifier_policy: StackModifierPolicy::default(),
        }
    }
}

impl EffectTiming {
    fn build(
        &self,
        effect_id: String,
        modifiers: Vec<StatModifier>,
        tags: Vec<Tag>,
        lookup: &dyn ValueLookup,
    ) -> EffectInstance {
        let mut instance = EffectInstance::new(effect_id, self.duration.resolve(lookup))
            .with_modifiers(modifiers)
            .with_tags(tags)
            .with_duration_policy(self.duration_policy)
            .with_stack_out_policy(self.stack_out_policy)
            .with_stack_duration_policy(self.stack_duration_policy)
            .with_stack_modifier_policy(self.stack_modifier_policy);
        if self.use_stacking {
            instance = instance.with_stacking(self.max_stack.resolve_stack(lookup));
        }
        instance
    }
}

/// Template for a single effect.
///
/// # Examples
///
/// ```rust
/// use statfx::profile::{EffectProfile, ParamValue};
/// use statfx::table::{ValueLookup, ValueTable};
/// use statfx::{CalcOperator, StatModifier, TagRegistry};
///
/// let mut registry = TagRegistry::new();
/// registry.load_tags(["Buff/Haste"]).unwrap();
/// let mut table = ValueTable::new("params");
/// table.set_number("haste_time", 8.0);
///
/// let mut haste = EffectProfile::new("haste");
/// haste.modifiers.push(StatModifier::new("speed", CalcOperator::Mul, 1.25));
/// haste.tags.push("Buff/Haste".to_string());
/// haste.timing.duration = ParamValue::dynamic("haste_time");
///
/// let instance = haste.build_instance(Some("caster"), &registry, &table).unwrap();
/// assert_eq!(instance.defined_duration(), 8.0);
/// assert_eq!(instance.caster(), Some("caster"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectProfile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub modifiers: Vec<StatModifier>,
    /// Tag paths.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub timing: EffectTiming,
}

impl EffectProfile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            description: String::new(),
            modifiers: Vec::new(),
            tags: Vec::new(),
            timing: EffectTiming::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, StatError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build a live instance. Fails with `UnknownTag` if a tag path is not
    /// loaded in `registry`.
    pub fn build_instance(
        &self,
        caster: Option<&str>,
        registry: &TagRegistry,
        lookup: &dyn ValueLookup,
    ) -> Result<EffectInstance, StatError> {
        let tags = registry.resolve_all(&self.tags)?;
        let mut instance = self
            .timing
            .build(self.id.clone(), self.modifiers.clone(), tags, lookup);
        if let Some(caster) = caster {
            instance = instance.with_caster(caster);
        }
        tracing::debug!(effect = %self.id, "effect instance built");
        Ok(instance)
    }
}

/// Replace one profile modifier's coefficient within a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierOverride {
    /// Index into the group's profiles.
    pub profile: usize,
    /// Index into that profile's modifiers.
    pub modifier: usize,
    pub value: ParamValue,
}

/// A set of profiles cast together, with group-level tags, timing and
/// coefficient overrides. The group's timing replaces each profile's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectGroup {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub profiles: Vec<EffectProfile>,
    #[serde(default)]
    pub overrides: Vec<ModifierOverride>,
    /// Tag paths appended to every profile's tags.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub timing: EffectTiming,
}

impl EffectGroup {
    pub fn new(id: impl Into<String>, profiles: Vec<EffectProfile>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            description: String::new(),
            profiles,
            overrides: Vec::new(),
            tags: Vec::new(),
            timing: EffectTiming::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, StatError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Composite id of the instance built from profile `index`.
    pub fn effect_id(&self, index: usize) -> Option<String> {
        self.profiles
            .get(index)
            .map(|profile| format!("{}%{}%{}", self.id, index, profile.id))
    }

    /// Build one instance per profile.
    pub fn build_instances(
        &self,
        caster: Option<&str>,
        registry: &TagRegistry,
        lookup: &dyn ValueLookup,
    ) -> Result<Vec<EffectInstance>, StatError> {
        for o in &self.overrides {
            let valid = self
                .profiles
                .get(o.profile)
                .is_some_and(|profile| o.modifier < profile.modifiers.len());
            if !valid {
                return Err(StatError::InvalidOverride {
                    profile: o.profile,
                    modifier: o.modifier,
                });
            }
        }
        let group_tags = registry.resolve_all(&self.tags)?;

        let mut instances = Vec::with_capacity(self.profiles.len());
        for (index, profile) in self.profiles.iter().enumerate() {
            let mut modifiers = profile.modifiers.clone();
            for o in self.overrides.iter().filter(|o| o.profile == index) {
                let coefficient = o.value.resolve(lookup);
                modifiers[o.modifier] = modifiers[o.modifier].clone().with_coefficient(coefficient);
            }

            let mut tags = registry.resolve_all(&profile.tags)?;
            tags.extend(group_tags.iter().cloned());

            let effect_id = format!("{}%{}%{}", self.id, index, profile.id);
            let mut instance = self
                .timing
                .build(effect_id, modifiers, tags, lookup)
                .with_group(self.id.clone());
            if let Some(caster) = caster {
                instance = instance.with_caster(caster);
            }
            instances.push(instance);
        }
        tracing::debug!(group = %self.id, count = instances.len(), "effect group built");
        Ok(instances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifier::CalcOperator;
    use crate::table::ValueTable;

    fn registry() -> TagRegistry {
        let mut registry = TagRegistry::new();
        registry
            .load_tags(["Status/Debuff/Burn", "Element/Fire"])
            .unwrap();
        registry
    }

    #[test]
    fn test_param_value_json() {
        let c: ParamValue = serde_json::from_str("2.5").unwrap();
        assert_eq!(c, ParamValue::Const(2.5));
        let d: ParamValue = serde_json::from_str(r#"{"key":"dur"}"#).unwrap();
        assert_eq!(d, ParamValue::dynamic("dur"));
    }

    #[test]
    fn test_stack_cap_is_at_least_one() {
        let table = ValueTable::new("t");
        assert_eq!(ParamValue::Const(0.0).resolve_stack(&table), 1);
        assert_eq!(ParamValue::Const(-3.0).resolve_stack(&table), 1);
        assert_eq!(ParamValue::Const(4.9).resolve_stack(&table), 4);
    }

    #[test]
    fn test_profile_unknown_tag() {
        let mut profile = EffectProfile::new("x");
        profile.tags.push("Nope".to_string());
        let err = profile
            .build_instance(None, &registry(), &ValueTable::new("t"))
            .unwrap_err();
        assert_eq!(err, StatError::UnknownTag("Nope".to_string()));
    }

    #[test]
    fn test_profile_from_json_defaults() {
        let profile = EffectProfile::from_json(r#"{"id":"slow","duration":3.0}"#).unwrap();
        assert_eq!(profile.timing.duration, ParamValue::Const(3.0));
        assert_eq!(profile.timing.max_stack, ParamValue::Const(1.0));
        assert!(!profile.timing.use_stacking);

        let instance = profile
            .build_instance(None, &registry(), &ValueTable::new("t"))
            .unwrap();
        assert_eq!(instance.effect_id(), "slow");
        assert!(!instance.use_stacking());
    }

    #[test]
    fn test_group_builds_composite_ids_and_overrides() {
        let mut burn = EffectProfile::new("burn");
        burn.modifiers
            .push(StatModifier::new("hp_regen", CalcOperator::Add, -1.0));
        burn.tags.push("Status/Debuff/Burn".to_string());
        let mut scorch = EffectProfile::new("scorch");
        scorch
            .modifiers
            .push(StatModifier::new("def", CalcOperator::Sub, 2.0));

        let mut group = EffectGroup::new("ignite", vec![burn, scorch]);
        group.tags.push("Element/Fire".to_string());
        group.overrides.push(ModifierOverride {
            profile: 0,
            modifier: 0,
            value: ParamValue::dynamic("burn_dps"),
        });
        group.timing.duration = ParamValue::Const(4.0);
        group.timing.use_stacking = true;
        group.timing.max_stack = ParamValue::Const(3.0);

        let mut table = ValueTable::new("t");
        table.set_number("burn_dps", -5.0);
        let instances = group
            .build_instances(Some("mage"), &registry(), &table)
            .unwrap();

        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].effect_id(), "ignite%0%burn");
        assert_eq!(instances[1].effect_id(), "ignite%1%scorch");
        assert_eq!(group.effect_id(1).as_deref(), Some("ignite%1%scorch"));
        assert_eq!(instances[0].modifiers()[0].coefficient(), -5.0);
        assert_eq!(instances[1].modifiers()[0].coefficient(), 2.0);
        assert_eq!(instances[0].tags().len(), 2);
        assert_eq!(instances[1].tags()[0].path(), "Element/Fire");
        assert_eq!(instances[0].group_id(), Some("ignite"));
        assert_eq!(instances[0].max_stack(), 3);
        assert_eq!(instances[1].defined_duration(), 4.0);
        assert_eq!(instances[1].caster(), Some("mage"));
    }

    #[test]
    fn test_group_rejects_bad_override() {
        let mut group = EffectGroup::new("g", vec![EffectProfile::new("p")]);
        group.overrides.push(ModifierOverride {
            profile: 0,
            modifier: 2,
            value: ParamValue::Const(1.0),
        });
        let err = group
            .build_instances(None, &registry(), &ValueTable::new("t"))
            .unwrap_err();
        assert_eq!(
            err,
            StatError::InvalidOverride {
                profile: 0,
                modifier: 2
            }
        );
    }

    #[test]
    fn test_group_from_json() {
        let json = r#"{
            "id": "ignite",
            "profiles": [
                { "id": "burn", "modifiers": [
                    { "target": "hp_regen", "coefficient": -2.0, "operator": "Add" } ] }
            ],
            "overrides": [ { "profile": 0, "modifier": 0, "value": { "key": "burn_dps" } } ],
            "tags": ["Status/Debuff/Burn"],
            "duration": 4.0,
            "use_stacking": true,
            "max_stack": 3,
            "stack_duration_policy": "Combined"
        }"#;
        let group = EffectGroup::from_json(json).unwrap();
        assert_eq!(group.profiles.len(), 1);
        assert_eq!(group.timing.stack_duration_policy, StackDurationPolicy::Combined);
        assert_eq!(group.overrides[0].value, ParamValue::dynamic("burn_dps"));
    }
}
