//! The frame driver. Owns the sink, the variables, the transition scheduler
//! and the save areas, and lends them to overrides one event at a time.

use std::path::{Path, PathBuf};

use log::{debug, info, trace, warn};

use crate::config::{
    Binding, ConfigError, LoadedOverrides, OverrideConfig, normalize_binding,
};
use crate::motion::Clock;
use crate::overrides::{
    Context, CycleBack, GlobalSave, InputListener, TransitionSpec, Transitions,
    TriggerId,
};
use crate::script::CommandLists;
use crate::sink::ParameterSink;
use crate::variables::Variables;

/// Single point of entry for input events and the per-frame tick.
///
/// All events of a frame (`key_down`, `key_up`, `trigger_preset`, ...) must be
/// delivered before that frame's [`Self::frame`] call so that transitions
/// scheduled by them start from the pre-event values.
#[derive(Debug)]
pub struct OverrideHub<S: ParameterSink, C: Clock> {
    sink: S,
    clock: C,
    variables: Variables,
    transitions: Transitions,
    saves: GlobalSave,
    commands: CommandLists,
    overrides: LoadedOverrides,
    path: Option<PathBuf>,
}

impl<S: ParameterSink, C: Clock> OverrideHub<S, C> {
    pub fn new(sink: S, clock: C) -> Self {
        Self {
            sink,
            clock,
            variables: Variables::default(),
            transitions: Transitions::default(),
            saves: GlobalSave::default(),
            commands: CommandLists::default(),
            overrides: LoadedOverrides::default(),
            path: None,
        }
    }

    /// Command lists must be registered before loading so `run:` can
    /// resolve them.
    pub fn with_command_lists(mut self, commands: CommandLists) -> Self {
        self.commands = commands;
        self
    }

    pub fn load_str(&mut self, yaml: &str) -> Result<(), ConfigError> {
        let config = OverrideConfig::parse(yaml)?;
        self.install(&config);
        Ok(())
    }

    pub fn load_path(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let config = OverrideConfig::load(path)?;
        self.path = Some(path.to_path_buf());
        self.install(&config);
        Ok(())
    }

    /// Replaces every override with the ones in `yaml`. Whatever the old
    /// overrides saved is put back first so an override that happens to be
    /// active cannot leak its values into the new defaults. On a parse error
    /// the current overrides stay in place.
    pub fn reload_str(&mut self, yaml: &str) -> Result<(), ConfigError> {
        let config = OverrideConfig::parse(yaml)?;
        self.reset();
        self.install(&config);
        Ok(())
    }

    /// Re-reads the file given to [`Self::load_path`].
    pub fn reload(&mut self) -> Result<(), ConfigError> {
        let Some(path) = self.path.clone() else {
            warn!("Reload requested but no override file was loaded");
            return Ok(());
        };

        info!("Reloading overrides from {}", path.display());
        let config = OverrideConfig::load(&path)?;
        self.reset();
        self.install(&config);
        Ok(())
    }

    fn reset(&mut self) {
        info!("Resetting overrides");
        self.saves.reset(
            &mut self.transitions,
            &mut self.sink,
            &mut self.variables,
        );
    }

    fn install(&mut self, config: &OverrideConfig) {
        let loaded = config.build(&mut self.variables, &self.commands);

        if loaded.reserved_params > 0 {
            self.sink.reserve_indexed_params(loaded.reserved_params);
        }

        info!(
            "Loaded {} key overrides, {} cycles, {} presets",
            loaded.keys.len(),
            loaded.cycles.len(),
            loaded.presets.len()
        );

        self.overrides = loaded;
    }

    fn split(&mut self) -> (Context<'_>, &mut LoadedOverrides) {
        let ctx = Context {
            sink: &mut self.sink,
            variables: &mut self.variables,
            transitions: &mut self.transitions,
            saves: &mut self.saves,
            now_ms: self.clock.now_ms(),
        };
        (ctx, &mut self.overrides)
    }

    pub fn key_down(&mut self, binding: &str) {
        self.dispatch(binding, true);
    }

    pub fn key_up(&mut self, binding: &str) {
        self.dispatch(binding, false);
    }

    fn dispatch(&mut self, binding: &str, down: bool) {
        let binding = normalize_binding(binding);
        let (mut ctx, overrides) = self.split();
        let LoadedOverrides {
            keys,
            cycles,
            bindings,
            ..
        } = overrides;

        let Some(targets) = bindings.get(&binding) else {
            trace!("Nothing bound to {}", binding);
            return;
        };

        for target in targets {
            match target {
                Binding::Key(name) => {
                    if let Some(key) = keys.get_mut(name) {
                        fire(key, &mut ctx, down);
                    }
                }
                Binding::Cycle(name) => {
                    if let Some(cycle) = cycles.get_mut(name) {
                        fire(cycle, &mut ctx, down);
                    }
                }
                Binding::CycleBack(name) => {
                    if let Some(cycle) = cycles.get_mut(name) {
                        fire(&mut CycleBack(cycle), &mut ctx, down);
                    }
                }
            }
        }
    }

    /// Steps the named cycle backwards, as its `back` binding would.
    pub fn cycle_back(&mut self, name: &str) {
        let (mut ctx, overrides) = self.split();
        match overrides.cycles.get_mut(name) {
            Some(cycle) => cycle.back_event(&mut ctx),
            None => debug!("No cycle named {}", name),
        }
    }

    /// Returns false if there is no preset called `name`.
    pub fn trigger_preset(&mut self, name: &str, source: TriggerId) -> bool {
        match self.overrides.presets.get_mut(name) {
            Some(preset) => {
                preset.trigger(source);
                true
            }
            None => {
                debug!("No preset named {}", name);
                false
            }
        }
    }

    pub fn exclude_preset(&mut self, name: &str) -> bool {
        match self.overrides.presets.get_mut(name) {
            Some(preset) => {
                preset.exclude();
                true
            }
            None => {
                debug!("No preset named {}", name);
                false
            }
        }
    }

    /// The per-frame tick: settle presets against this frame's triggers,
    /// then advance every transition.
    pub fn frame(&mut self) {
        let (mut ctx, overrides) = self.split();
        let now = ctx.now_ms;

        for preset in overrides.presets.values_mut() {
            preset.update(&mut ctx);
        }

        self.transitions.update(now, &mut self.sink, &mut self.variables);
    }

    /// True for held or toggled key overrides and triggered presets. Cycles
    /// and fire-and-forget overrides are never active.
    pub fn is_active(&self, name: &str) -> bool {
        if let Some(key) = self.overrides.keys.get(name) {
            return key.inner().is_active();
        }
        self.overrides
            .presets
            .get(name)
            .is_some_and(|preset| preset.is_active())
    }

    /// Default activation transition of a key override, preset or the first
    /// preset of a cycle.
    pub fn transition_of(&self, name: &str) -> Option<TransitionSpec> {
        self.overrides
            .keys
            .get(name)
            .map(|k| k.inner().transition())
            .or_else(|| {
                self.overrides
                    .presets
                    .get(name)
                    .map(|p| p.inner().transition())
            })
            .or_else(|| {
                self.overrides
                    .cycles
                    .get(name)
                    .and_then(|c| c.presets().first())
                    .map(|o| o.transition())
            })
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut Variables {
        &mut self.variables
    }

    pub fn transitions(&self) -> &Transitions {
        &self.transitions
    }

    pub fn global_save(&self) -> &GlobalSave {
        &self.saves
    }

    pub fn overrides(&self) -> &LoadedOverrides {
        &self.overrides
    }

    pub fn command_lists_mut(&mut self) -> &mut CommandLists {
        &mut self.commands
    }
}

fn fire(listener: &mut dyn InputListener, ctx: &mut Context, down: bool) {
    if down {
        listener.down_event(ctx);
    } else {
        listener.up_event(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::ManualClock;
    use crate::params::ParameterKey;
    use crate::sink::MemorySink;

    const YAML: &str = r#"
aim:
  type: hold
  key: rmb
  convergence: 4
  transition: 100

zoom:
  type: cycle
  key: z
  back: x
  separation: 10, 20, 30
"#;

    fn hub() -> (OverrideHub<MemorySink, ManualClock>, ManualClock) {
        let clock = ManualClock::new(0);
        let sink = MemorySink::new(50.0, 1.0);
        let mut hub = OverrideHub::new(sink, clock.clone());
        hub.load_str(YAML).unwrap();
        (hub, clock)
    }

    #[test]
    fn hold_binding_animates_and_restores() {
        let (mut hub, clock) = hub();

        hub.key_down("RMB");
        assert!(hub.is_active("aim"));
        clock.advance(50);
        hub.frame();
        assert_eq!(hub.sink().convergence, 2.5);

        hub.key_up("rmb");
        clock.advance(100);
        hub.frame();
        assert_eq!(hub.sink().convergence, 1.0);
        assert!(hub.global_save().is_empty());
    }

    #[test]
    fn cycle_bindings_walk_both_ways() {
        let (mut hub, _) = hub();

        hub.key_down("z");
        hub.key_down("z");
        hub.frame();
        assert_eq!(hub.sink().separation, 20.0);

        hub.key_down("x");
        hub.frame();
        assert_eq!(hub.sink().separation, 10.0);

        hub.cycle_back("zoom");
        hub.frame();
        assert_eq!(hub.sink().separation, 30.0);
        assert!(!hub.is_active("zoom"));
    }

    #[test]
    fn unbound_keys_are_ignored() {
        let (mut hub, _) = hub();
        hub.key_down("q");
        hub.key_up("q");
        hub.frame();
        assert!(hub.transitions().is_idle());
        assert!(!hub.trigger_preset("missing", TriggerId(0)));
    }

    #[test]
    fn reload_restores_active_values_first() {
        let (mut hub, clock) = hub();

        hub.key_down("rmb");
        clock.advance(100);
        hub.frame();
        assert_eq!(hub.sink().convergence, 4.0);
        assert_eq!(hub.global_save().refcount(ParameterKey::Convergence), 1);

        hub.reload_str("other:\n  type: toggle\n  key: o\n  separation: 0\n")
            .unwrap();

        assert_eq!(hub.sink().convergence, 1.0);
        assert!(hub.global_save().is_empty());
        assert!(!hub.is_active("aim"));
        assert!(hub.overrides().keys.contains_key("other"));
    }

    #[test]
    fn failed_reload_keeps_current_overrides() {
        let (mut hub, _) = hub();
        assert!(hub.reload_str("- not\n- a mapping\n").is_err());
        assert!(hub.overrides().keys.contains_key("aim"));
    }
}
