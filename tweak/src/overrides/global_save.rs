//! Reference-counted record of the value each parameter had before any
//! override touched it.
//!
//! Several overrides may target the same parameter and be released in any
//! order. Every override keeps a local copy of what it replaced; the global
//! slot additionally remembers the value from before the *first* holder and
//! hands it back only to the *last* holder to release, which is what finally
//! puts the parameter back where it started.

use log::{debug, info, warn};

use crate::core::util::HashMap;
use crate::params::{ParamValues, ParameterKey};
use crate::sink::ParameterSink;
use crate::variables::Variables;

use super::transition::Transitions;

/// Outcome of releasing one reference.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Release {
    /// Other holders remain; the caller restores its own local value.
    Shared,
    /// This was the last holder. Carries the value saved by the first one
    /// (absent if it could not be read at the time).
    Last(Option<f32>),
    /// Released more often than saved. Reported and clamped.
    Underflow,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GlobalSaveParam {
    saved: Option<f32>,
    refcount: u32,
}

impl GlobalSaveParam {
    /// First activation wins: only the 0 -> 1 transition captures a value.
    pub fn save(&mut self, candidate: Option<f32>) {
        if self.refcount == 0 {
            self.saved = candidate;
        }
        self.refcount += 1;
    }

    /// Last deactivation wins: only the 1 -> 0 transition returns a value.
    pub fn restore(&mut self) -> Release {
        debug_assert!(
            self.refcount > 0,
            "GlobalSaveParam released more often than saved"
        );

        if self.refcount == 0 {
            warn!("BUG! GlobalSaveParam refcount < 0, clamping to 0");
            self.saved = None;
            return Release::Underflow;
        }

        self.refcount -= 1;

        if self.refcount == 0 {
            Release::Last(self.saved.take())
        } else {
            Release::Shared
        }
    }

    /// Forgets every holder and returns whatever was saved.
    pub fn reset(&mut self) -> Option<f32> {
        self.refcount = 0;
        self.saved.take()
    }

    pub fn refcount(&self) -> u32 {
        self.refcount
    }

    pub fn saved(&self) -> Option<f32> {
        self.saved
    }
}

/// The value to remember for `key` right now: the target of an in-flight
/// transition if there is one, so a half-finished animation is never taken
/// for the original, otherwise the live value.
pub fn snapshot_value(
    key: ParameterKey,
    transitions: &Transitions,
    sink: &dyn ParameterSink,
    variables: &Variables,
) -> Option<f32> {
    if let Some(target) = transitions.in_flight_target(key) {
        return Some(target);
    }

    match key {
        ParameterKey::Separation => sink
            .separation()
            .map_err(|err| debug!("Reading separation failed: {}", err))
            .ok(),
        ParameterKey::Convergence => sink
            .convergence()
            .map_err(|err| debug!("Reading convergence failed: {}", err))
            .ok(),
        ParameterKey::Indexed(slot) => Some(sink.indexed_param(slot)),
        ParameterKey::Var(id) => Some(variables.get(id)),
    }
}

#[derive(Debug, Default)]
pub struct GlobalSave {
    slots: HashMap<ParameterKey, GlobalSaveParam>,
}

impl GlobalSave {
    /// Snapshots every key `targets` touches into `local` and takes a
    /// reference on the matching global slot. Must run before the activation
    /// transition is scheduled so the snapshot predates it.
    pub fn save(
        &mut self,
        targets: &ParamValues,
        local: &mut ParamValues,
        transitions: &Transitions,
        sink: &dyn ParameterSink,
        variables: &Variables,
    ) {
        for key in targets.keys() {
            let value = snapshot_value(key, transitions, sink, variables);

            match value {
                Some(v) => local.set(key, v),
                None => local.remove(key),
            }

            self.slots.entry(key).or_default().save(value);
        }
    }

    /// Releases this override's reference on every key it touches. Where it
    /// was the last holder, `local` is overwritten with the global value so
    /// the true original comes back even if releases happened out of order
    /// or a local value was captured mid-transition.
    pub fn restore(&mut self, targets: &ParamValues, local: &mut ParamValues) {
        for key in targets.keys() {
            let Some(slot) = self.slots.get_mut(&key) else {
                debug!("No save area for {}, using local value", key);
                continue;
            };

            match slot.restore() {
                Release::Shared => {}
                Release::Last(value) => {
                    if let Some(v) = value {
                        local.set(key, v);
                    }
                    self.slots.remove(&key);
                    debug!("Removed {} save area", key);
                }
                Release::Underflow => {
                    self.slots.remove(&key);
                }
            }
        }
    }

    /// Used on configuration reload. Puts every saved parameter back (or, if
    /// nothing is saved but a transition is moving it, jumps to that
    /// transition's target) so a currently active override cannot become the
    /// new default, then stops all transitions.
    pub fn reset(
        &mut self,
        transitions: &mut Transitions,
        sink: &mut dyn ParameterSink,
        variables: &mut Variables,
    ) {
        let mut keys: Vec<ParameterKey> = self.slots.keys().copied().collect();
        for key in [ParameterKey::Separation, ParameterKey::Convergence] {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys.sort();

        let mut publish = false;

        for key in keys {
            let saved = self.slots.get_mut(&key).and_then(|s| s.reset());
            let Some(value) =
                saved.or_else(|| transitions.in_flight_target(key))
            else {
                continue;
            };

            info!("Restoring {} to {:.2}", key, value);

            match key {
                ParameterKey::Separation => {
                    if let Err(err) = sink.set_separation(value) {
                        debug!("Setting separation failed: {}", err);
                    }
                }
                ParameterKey::Convergence => {
                    if let Err(err) = sink.set_convergence(value) {
                        debug!("Setting convergence failed: {}", err);
                    }
                }
                ParameterKey::Indexed(slot) => {
                    sink.set_indexed_param(slot, value);
                    publish = true;
                }
                ParameterKey::Var(id) => variables.set(id, value),
            }
        }

        if publish {
            sink.publish_indexed_params();
        }

        self.slots.clear();
        transitions.stop();
    }

    pub fn get(&self, key: ParameterKey) -> Option<&GlobalSaveParam> {
        self.slots.get(&key)
    }

    pub fn refcount(&self, key: ParameterKey) -> u32 {
        self.slots.get(&key).map_or(0, GlobalSaveParam::refcount)
    }

    pub fn saved(&self, key: ParameterKey) -> Option<f32> {
        self.slots.get(&key).and_then(GlobalSaveParam::saved)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::TransitionType;
    use crate::overrides::transition::TransitionSpec;
    use crate::sink::MemorySink;

    #[test]
    fn first_save_wins_and_last_restore_returns_it() {
        let mut slot = GlobalSaveParam::default();
        slot.save(Some(1.0));
        slot.save(Some(2.0));
        assert_eq!(slot.refcount(), 2);
        assert_eq!(slot.saved(), Some(1.0));

        assert_eq!(slot.restore(), Release::Shared);
        assert_eq!(slot.restore(), Release::Last(Some(1.0)));
        assert_eq!(slot.refcount(), 0);
        assert_eq!(slot.saved(), None);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "released more"))]
    fn restore_without_save_clamps() {
        let mut slot = GlobalSaveParam::default();
        assert_eq!(slot.restore(), Release::Underflow);
        assert_eq!(slot.refcount(), 0);
    }

    #[test]
    fn snapshot_prefers_in_flight_target() {
        let mut sink = MemorySink::new(100.0, 1.0);
        let mut vars = Variables::default();
        let mut transitions = Transitions::default();
        let targets = ParamValues {
            separation: Some(50.0),
            ..Default::default()
        };

        transitions.schedule(
            &targets,
            TransitionSpec::new(1000, TransitionType::Linear),
            0,
            &sink,
            &vars,
        );
        transitions.update(500, &mut sink, &mut vars);
        assert_eq!(sink.separation, 75.0);

        let value = snapshot_value(
            ParameterKey::Separation,
            &transitions,
            &sink,
            &vars,
        );
        assert_eq!(value, Some(50.0));

        let value = snapshot_value(
            ParameterKey::Convergence,
            &transitions,
            &sink,
            &vars,
        );
        assert_eq!(value, Some(1.0));
    }

    #[test]
    fn unreadable_value_still_takes_a_reference() {
        let mut sink = MemorySink::new(10.0, 1.0);
        sink.available = false;
        let vars = Variables::default();
        let transitions = Transitions::default();
        let mut saves = GlobalSave::default();
        let targets = ParamValues {
            separation: Some(50.0),
            ..Default::default()
        };
        let mut local = ParamValues::default();

        saves.save(&targets, &mut local, &transitions, &sink, &vars);

        assert_eq!(saves.refcount(ParameterKey::Separation), 1);
        assert_eq!(local.separation, None);

        saves.restore(&targets, &mut local);
        assert!(saves.is_empty());
        assert_eq!(local.separation, None);
    }

    #[test]
    fn reset_restores_saved_values_and_stops_transitions() {
        let mut sink = MemorySink::new(10.0, 1.0);
        let mut vars = Variables::default();
        let fov = vars.declare("", "fov", 90.0);
        let mut transitions = Transitions::default();
        let mut saves = GlobalSave::default();
        let mut targets = ParamValues {
            separation: Some(50.0),
            ..Default::default()
        };
        targets.vars.insert(fov, 30.0);
        let mut local = ParamValues::default();

        saves.save(&targets, &mut local, &transitions, &sink, &vars);
        transitions.schedule(
            &targets,
            TransitionSpec::instant(),
            0,
            &sink,
            &vars,
        );
        transitions.update(0, &mut sink, &mut vars);
        assert_eq!(sink.separation, 50.0);
        assert_eq!(vars.get(fov), 30.0);

        let converge = ParamValues {
            convergence: Some(4.0),
            ..Default::default()
        };
        transitions.schedule(
            &converge,
            TransitionSpec::new(100, TransitionType::Linear),
            0,
            &sink,
            &vars,
        );

        saves.reset(&mut transitions, &mut sink, &mut vars);

        assert_eq!(sink.separation, 10.0);
        assert_eq!(sink.convergence, 4.0);
        assert_eq!(vars.get(fov), 90.0);
        assert!(saves.is_empty());
        assert!(transitions.is_idle());
    }
}
