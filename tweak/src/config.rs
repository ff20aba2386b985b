//! Deserialization types and builders for converting the override yaml
//! format into [`KeyOverride`]s, [`KeyOverrideCycle`]s and
//! [`PresetOverride`]s.
//!
//! ```yaml
//! namespace: hud
//! variables:
//!   mode: 0
//!
//! aim:
//!   type: hold
//!   key: rmb
//!   convergence: 0.3
//!   transition: 250
//!   transition_type: cosine
//!
//! zoom:
//!   type: cycle
//!   key: z
//!   back: shift+z
//!   separation: 20, 50, 80
//!   $mode: [0, 1, ~]
//! ```

use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use log::{debug, warn};
use serde::Deserialize;
use serde_yml::{Mapping, Value};
use yaml_merge_keys::{MergeKeyError, merge_keys_serde_yml};

use crate::motion::TransitionType;
use crate::overrides::{
    KeyBehavior, KeyOverride, KeyOverrideCycle, Override, PresetOverride,
    TransitionSpec,
};
use crate::params::{ParamSlot, ParamSlotError, ParamValues};
use crate::script::{CommandLists, Condition, Expression};
use crate::variables::Variables;

//------------------------------------------------------------------------------
// Top-level Types
//------------------------------------------------------------------------------

/// Uses [`IndexMap`] so overrides are built in the order they are declared
pub type ConfigFile = IndexMap<String, MaybeSectionConfig>;

#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum MaybeSectionConfig {
    Section(SectionConfig),
    Other(Value),
}

#[derive(Deserialize, Debug)]
pub struct SectionConfig {
    #[serde(rename = "type")]
    pub section_type: SectionType,
    #[serde(flatten)]
    pub config: Value,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub enum SectionType {
    #[serde(rename = "toggle")]
    Toggle,
    #[serde(rename = "hold")]
    Hold,
    #[serde(rename = "activate")]
    Activate,
    #[serde(rename = "cycle")]
    Cycle,
    #[serde(rename = "preset")]
    Preset,
}

impl SectionType {
    fn key_behavior(&self) -> Option<KeyBehavior> {
        match self {
            Self::Toggle => Some(KeyBehavior::Toggle),
            Self::Hold => Some(KeyBehavior::Hold),
            Self::Activate => Some(KeyBehavior::Activate),
            Self::Cycle | Self::Preset => None,
        }
    }

    fn allows(&self, section_key: &str) -> bool {
        match section_key {
            "type" => true,
            "key" => !matches!(self, Self::Preset),
            "back" | "wrap" => matches!(self, Self::Cycle),
            "unique_triggers_required" => matches!(self, Self::Preset),
            _ => false,
        }
    }
}

/// Keys that configure the section itself rather than any one override.
const SECTION_KEYS: [&str; 5] =
    ["type", "key", "back", "wrap", "unique_triggers_required"];

/// What a key binding name dispatches to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Binding {
    Key(String),
    Cycle(String),
    CycleBack(String),
}

#[derive(Debug, Default)]
pub struct LoadedOverrides {
    pub keys: IndexMap<String, KeyOverride>,
    pub cycles: IndexMap<String, KeyOverrideCycle>,
    pub presets: IndexMap<String, PresetOverride>,
    /// Normalized binding name to every listener bound to it
    pub bindings: IndexMap<String, Vec<Binding>>,
    /// Indexed param vectors the sink must provide
    pub reserved_params: usize,
}

impl LoadedOverrides {
    fn bind(&mut self, binding: &str, target: Binding) {
        self.bindings
            .entry(normalize_binding(binding))
            .or_default()
            .push(target);
    }

    pub fn len(&self) -> usize {
        self.keys.len() + self.cycles.len() + self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn normalize_binding(binding: &str) -> String {
    binding.trim().to_ascii_lowercase()
}

//------------------------------------------------------------------------------
// Errors
//------------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Yaml(serde_yml::Error),
    MergeKeys(MergeKeyError),
    NotAMapping,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => {
                write!(f, "failed to read override file: {}", err)
            }
            Self::Yaml(err) => {
                write!(f, "failed to parse override file: {}", err)
            }
            Self::MergeKeys(err) => {
                write!(f, "failed to process YAML merge keys: {}", err)
            }
            Self::NotAMapping => write!(f, "top-level YAML must be a mapping"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Yaml(err) => Some(err),
            Self::MergeKeys(err) => Some(err),
            Self::NotAMapping => None,
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_yml::Error> for ConfigError {
    fn from(err: serde_yml::Error) -> Self {
        Self::Yaml(err)
    }
}

impl From<MergeKeyError> for ConfigError {
    fn from(err: MergeKeyError) -> Self {
        Self::MergeKeys(err)
    }
}

//------------------------------------------------------------------------------
// Loading
//------------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct OverrideConfig {
    file: ConfigFile,
}

impl OverrideConfig {
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let raw: Value = serde_yml::from_str(yaml)?;
        let merged = merge_keys_serde_yml(raw)?;

        if merged.is_null() {
            return Ok(Self::default());
        }
        if !merged.is_mapping() {
            return Err(ConfigError::NotAMapping);
        }

        Ok(Self {
            file: serde_yml::from_value(merged)?,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path)?;
        Self::parse(&source)
    }

    pub fn namespace(&self) -> &str {
        match self.file.get("namespace") {
            Some(MaybeSectionConfig::Other(Value::String(ns))) => ns.trim(),
            _ => "",
        }
    }

    /// Declares the file's variables, then builds every section. Problems
    /// inside a section are logged and that field falls back to its default.
    pub fn build(
        &self,
        variables: &mut Variables,
        commands: &CommandLists,
    ) -> LoadedOverrides {
        let scope = self.namespace();

        if let Some(config) = self.file.get("variables") {
            declare_variables(config, scope, variables);
        }

        let builder = SectionBuilder {
            scope,
            variables,
            commands,
        };
        let mut loaded = LoadedOverrides::default();

        for (name, config) in &self.file {
            if name == "namespace" || name == "variables" {
                continue;
            }

            let section = match config {
                MaybeSectionConfig::Section(section) => section,
                MaybeSectionConfig::Other(_) => {
                    warn!("Skipping [{}]: missing or unknown type", name);
                    continue;
                }
            };

            let Some(map) = section.config.as_mapping() else {
                continue;
            };

            builder.check_section_keys(name, section.section_type, map);

            match section.section_type {
                SectionType::Cycle => {
                    let cycle = builder.cycle(name, map);
                    if let Some(key) = get_scalar_string(map, "key") {
                        loaded.bind(&key, Binding::Cycle(name.clone()));
                    }
                    if let Some(back) = get_scalar_string(map, "back") {
                        loaded.bind(&back, Binding::CycleBack(name.clone()));
                    }
                    for preset in cycle.presets() {
                        loaded.reserved_params = loaded
                            .reserved_params
                            .max(preset.targets().reserved_params());
                    }
                    loaded.cycles.insert(name.clone(), cycle);
                }
                SectionType::Preset => {
                    let ovr = builder.single(name, map);
                    let required = get_u32(map, "unique_triggers_required")
                        .unwrap_or(0) as usize;
                    loaded.reserved_params = loaded
                        .reserved_params
                        .max(ovr.targets().reserved_params());
                    let preset = PresetOverride::new(ovr, required);
                    loaded.presets.insert(name.clone(), preset);
                }
                section_type => {
                    let behavior =
                        section_type.key_behavior().unwrap_or_default();
                    let ovr = builder.single(name, map);
                    match get_scalar_string(map, "key") {
                        Some(key) => {
                            loaded.bind(&key, Binding::Key(name.clone()))
                        }
                        None => warn!("[{}] has no key binding", name),
                    }
                    loaded.reserved_params = loaded
                        .reserved_params
                        .max(ovr.targets().reserved_params());
                    loaded
                        .keys
                        .insert(name.clone(), KeyOverride::new(behavior, ovr));
                }
            }
        }

        debug!(
            "Loaded {} overrides, {} bindings",
            loaded.len(),
            loaded.bindings.len()
        );

        loaded
    }
}

fn declare_variables(
    config: &MaybeSectionConfig,
    scope: &str,
    vars: &mut Variables,
) {
    let MaybeSectionConfig::Other(Value::Mapping(map)) = config else {
        warn!("[variables] must be a mapping of name: value");
        return;
    };

    for (key, value) in map {
        let Some(name) = key.as_str() else {
            continue;
        };
        match as_f32(value) {
            Some(initial) => {
                vars.declare(scope, name, initial);
            }
            None => warn!("[variables] {}: not a number", name),
        }
    }
}

//------------------------------------------------------------------------------
// Section Builders
//------------------------------------------------------------------------------

struct SectionBuilder<'a> {
    scope: &'a str,
    variables: &'a Variables,
    commands: &'a CommandLists,
}

impl SectionBuilder<'_> {
    fn check_section_keys(
        &self,
        section: &str,
        section_type: SectionType,
        map: &Mapping,
    ) {
        for key in map.keys().filter_map(Value::as_str) {
            if SECTION_KEYS.contains(&key) && !section_type.allows(key) {
                warn!("[{}] {} does not apply to this type", section, key);
            }
        }
    }

    fn cycle(&self, name: &str, map: &Mapping) -> KeyOverrideCycle {
        let wrap = get_bool(map, "wrap").unwrap_or(true);
        let presets = expand_cycle(map)
            .iter()
            .enumerate()
            .map(|(i, preset)| {
                self.single(&format!("{}[{}]", name, i), preset)
            })
            .collect();

        KeyOverrideCycle::new(name, presets, wrap)
    }

    fn single(&self, name: &str, map: &Mapping) -> Override {
        let mut targets = ParamValues::default();
        let mut transition = TransitionSpec::instant();
        let mut release = TransitionSpec::instant();
        let mut condition: Option<Arc<dyn Condition>> = None;
        let mut run = None;

        for (key, value) in map {
            let Some(key) = key.as_str() else {
                warn!("[{}] ignoring non-string key {:?}", name, key);
                continue;
            };

            match key {
                _ if SECTION_KEYS.contains(&key) => {}
                "separation" => {
                    targets.separation = self.float(name, key, value);
                }
                "convergence" => {
                    targets.convergence = self.float(name, key, value);
                }
                "transition" => {
                    transition.duration_ms = self.millis(name, key, value);
                }
                "release_transition" => {
                    release.duration_ms = self.millis(name, key, value);
                }
                "transition_type" => {
                    transition.kind = self.transition_type(name, key, value);
                }
                "release_transition_type" => {
                    release.kind = self.transition_type(name, key, value);
                }
                "condition" => condition = self.condition(name, value),
                "run" => {
                    run = scalar_string(value).and_then(|command| {
                        let found = self.commands.get(&command);
                        if found.is_none() {
                            warn!(
                                "[{}] run: no command list named {}",
                                name, command
                            );
                        }
                        found
                    });
                }
                _ if key.starts_with('$') => {
                    let Some(id) = self.variables.resolve(self.scope, key)
                    else {
                        warn!("[{}] undeclared variable {}", name, key);
                        continue;
                    };
                    if let Some(v) = self.float(name, key, value) {
                        targets.vars.insert(id, v);
                    }
                }
                _ => match key.parse::<ParamSlot>() {
                    Ok(slot) => {
                        if let Some(v) = self.float(name, key, value) {
                            targets.params.insert(slot, v);
                        }
                    }
                    Err(ParamSlotError::NotAParam) => {
                        warn!("[{}] unrecognized key {}", name, key);
                    }
                    Err(err) => warn!("[{}] {}: {}", name, key, err),
                },
            }
        }

        let mut ovr = Override::new(name, targets)
            .with_transition(transition)
            .with_release_transition(release);

        if let Some(condition) = condition {
            ovr = ovr.with_condition(condition);
        }
        if let Some(run) = run {
            ovr = ovr.with_run(run);
        }

        ovr
    }

    fn float(&self, section: &str, key: &str, value: &Value) -> Option<f32> {
        let parsed = as_f32(value);
        if parsed.is_none() {
            warn!("[{}] {}: expected a number, got {:?}", section, key, value);
        }
        parsed
    }

    fn millis(&self, section: &str, key: &str, value: &Value) -> u32 {
        as_u32(value).unwrap_or_else(|| {
            warn!(
                "[{}] {}: expected milliseconds, got {:?}",
                section, key, value
            );
            0
        })
    }

    fn transition_type(
        &self,
        section: &str,
        key: &str,
        value: &Value,
    ) -> TransitionType {
        scalar_string(value)
            .and_then(|s| s.parse::<TransitionType>().ok())
            .unwrap_or_else(|| {
                warn!(
                    "[{}] {}: expected one of {:?}, got {:?}",
                    section,
                    key,
                    TransitionType::NAMES,
                    value
                );
                TransitionType::default()
            })
    }

    fn condition(
        &self,
        section: &str,
        value: &Value,
    ) -> Option<Arc<dyn Condition>> {
        let source = scalar_string(value)?;

        match Expression::parse(&source, self.scope, self.variables) {
            Ok(expression) => Some(Arc::new(expression)),
            Err(err) => {
                warn!(
                    "[{}] condition \"{}\": {}; treating as unconditional",
                    section, source, err
                );
                None
            }
        }
    }
}

/// Turns a cycle section into one mapping per preset. Every per-preset field
/// is a list; the longest list sets the preset count, shorter lists repeat
/// their last entry and blank entries leave the field at its default.
fn expand_cycle(map: &Mapping) -> Vec<Mapping> {
    let lists: Vec<(&Value, Vec<Option<Value>>)> = map
        .iter()
        .filter(|(key, _)| {
            key.as_str().is_none_or(|k| !SECTION_KEYS.contains(&k))
        })
        .map(|(key, value)| (key, list_entries(value)))
        .collect();

    let count = lists.iter().map(|(_, list)| list.len()).max().unwrap_or(0);

    (0..count)
        .map(|i| {
            let mut preset = Mapping::new();
            for (key, list) in &lists {
                if let Some(Some(entry)) = list.get(i).or(list.last()) {
                    preset.insert((*key).clone(), entry.clone());
                }
            }
            preset
        })
        .collect()
}

fn list_entries(value: &Value) -> Vec<Option<Value>> {
    match value {
        Value::Null => vec![],
        Value::String(s) if s.trim().is_empty() => vec![],
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .map(|token| {
                (!token.is_empty()).then(|| Value::String(token.to_string()))
            })
            .collect(),
        Value::Sequence(items) => items
            .iter()
            .map(|item| (!item.is_null()).then(|| item.clone()))
            .collect(),
        other => vec![Some(other.clone())],
    }
}

//------------------------------------------------------------------------------
// Helper Functions
//------------------------------------------------------------------------------

fn as_f32(value: &Value) -> Option<f32> {
    match value {
        Value::Number(number) => number.as_f64().map(|v| v as f32),
        Value::String(text) => text.trim().parse::<f32>().ok(),
        _ => None,
    }
}

fn as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => {
            number.as_u64().and_then(|v| u32::try_from(v).ok())
        }
        Value::String(text) => text.trim().parse::<u32>().ok(),
        _ => None,
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn get_scalar_string(mapping: &Mapping, key: &str) -> Option<String> {
    mapping
        .get(Value::String(key.to_string()))
        .and_then(scalar_string)
}

fn get_bool(mapping: &Mapping, key: &str) -> Option<bool> {
    mapping
        .get(Value::String(key.to_string()))
        .and_then(|value| match value {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            Value::Number(n) => n.as_f64().map(|v| v != 0.0),
            _ => None,
        })
}

fn get_u32(mapping: &Mapping, key: &str) -> Option<u32> {
    mapping.get(Value::String(key.to_string())).and_then(as_u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overrides::InputListener;
    use crate::overrides::override_core::tests::Harness;
    use crate::params::{Component, ParameterKey};

    fn build(yaml: &str) -> (LoadedOverrides, Variables) {
        let mut variables = Variables::default();
        let config = OverrideConfig::parse(yaml).expect("valid config");
        let loaded = config.build(&mut variables, &CommandLists::default());
        (loaded, variables)
    }

    #[test]
    fn builds_key_overrides_with_bindings() {
        let (loaded, _) = build(
            r#"
aim:
  type: hold
  key: RMB
  convergence: 0.3
  transition: 250
  transition_type: cosine
  x2: 1.5

hud:
  type: toggle
  key: h
  separation: "0"
            "#,
        );

        let aim = &loaded.keys["aim"];
        assert_eq!(aim.behavior(), KeyBehavior::Hold);
        assert_eq!(aim.inner().targets().convergence, Some(0.3));
        assert_eq!(
            aim.inner().transition(),
            TransitionSpec::new(250, TransitionType::Cosine)
        );
        assert_eq!(
            aim.inner()
                .targets()
                .get(ParameterKey::Indexed(ParamSlot::new(2, Component::X))),
            Some(1.5)
        );
        assert_eq!(loaded.bindings["rmb"], vec![Binding::Key("aim".into())]);
        assert_eq!(loaded.keys["hud"].inner().targets().separation, Some(0.0));
        assert_eq!(loaded.reserved_params, 3);
    }

    #[test]
    fn merge_keys_share_fields() {
        let (loaded, _) = build(
            r#"
base: &base
  transition: 100
  release_transition: 200

a:
  <<: *base
  type: toggle
  key: a
  separation: 10
            "#,
        );

        let a = loaded.keys["a"].inner();
        assert_eq!(a.transition().duration_ms, 100);
        assert_eq!(a.release_transition().duration_ms, 200);
    }

    #[test]
    fn cycle_lists_expand_in_lock_step() {
        let (loaded, vars) = build(
            r#"
namespace: hud
variables:
  mode: 0

zoom:
  type: cycle
  key: z
  back: shift+z
  wrap: false
  separation: 20, , 80
  convergence: [1.0, 2.0]
  $mode: 3
            "#,
        );

        let cycle = &loaded.cycles["zoom"];
        assert!(!cycle.wraps());
        assert_eq!(cycle.len(), 3);

        let mode = vars.resolve("hud", "mode").unwrap();
        let presets = cycle.presets();
        assert_eq!(presets[0].targets().separation, Some(20.0));
        assert_eq!(presets[1].targets().separation, None);
        assert_eq!(presets[2].targets().separation, Some(80.0));
        assert_eq!(presets[2].targets().convergence, Some(2.0));
        assert_eq!(presets[2].targets().vars[&mode], 3.0);
        assert_eq!(
            loaded.bindings["shift+z"],
            vec![Binding::CycleBack("zoom".into())]
        );
    }

    #[test]
    fn empty_cycle_has_no_presets() {
        let (loaded, _) = build(
            r#"
c:
  type: cycle
  key: c
  separation: ""
            "#,
        );
        assert!(loaded.cycles["c"].is_empty());
    }

    #[test]
    fn bad_fields_fall_back_to_defaults() {
        let (loaded, _) = build(
            r#"
p:
  type: preset
  unique_triggers_required: 2
  separation: banana
  transition: -5
  transition_type: bouncy
  condition: $nope == 1
  $nope: 1
  x9999: 1
  color: red
            "#,
        );

        let p = &loaded.presets["p"];
        assert_eq!(p.unique_triggers_required(), 2);
        assert!(p.inner().targets().is_empty());
        assert!(!p.inner().is_conditional());
        assert_eq!(p.inner().transition(), TransitionSpec::instant());
    }

    #[test]
    fn unknown_sections_are_skipped() {
        let (loaded, _) = build(
            r#"
mystery:
  type: wobble
  separation: 1
plain: 5
            "#,
        );
        assert!(loaded.is_empty());
    }

    #[test]
    fn rejects_unusable_documents() {
        assert!(matches!(
            OverrideConfig::parse("- a\n- b\n"),
            Err(ConfigError::NotAMapping)
        ));
        assert!(matches!(
            OverrideConfig::parse("a: [unclosed"),
            Err(ConfigError::Yaml(_))
        ));
        assert!(OverrideConfig::parse("").is_ok());
    }

    #[test]
    fn conditions_resolve_namespace_variables() {
        let (mut loaded, vars) = build(
            r#"
namespace: hud
variables:
  $menu: 1
gated:
  type: toggle
  key: g
  condition: not $menu
  separation: 1
            "#,
        );

        let mut h = Harness::new(0.0, 0.0);
        h.variables = vars;
        let menu = h.variables.resolve("hud", "menu").unwrap();
        let gated = loaded.keys.get_mut("gated").unwrap();
        assert!(gated.inner().is_conditional());

        gated.down_event(&mut h.ctx());
        assert!(!gated.inner().is_active());

        h.variables.set(menu, 0.0);
        gated.down_event(&mut h.ctx());
        assert!(gated.inner().is_active());
    }
}
