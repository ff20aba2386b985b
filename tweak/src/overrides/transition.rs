//! Time-based interpolation of overridden parameters. There is one
//! [`Transitions`] per frame driver and at most one in-flight
//! [`TransitionParam`] per parameter; scheduling again replaces it.

use std::fmt::Write;

use log::{debug, info};

use crate::core::util::{HashMap, lerp};
use crate::motion::TransitionType;
use crate::params::{ParamSlot, ParamValues, ParameterKey, VarId};
use crate::sink::ParameterSink;
use crate::variables::Variables;

/// Duration and easing for one direction of an override.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransitionSpec {
    /// 0 means the target is applied on the next tick.
    pub duration_ms: u32,
    pub kind: TransitionType,
}

impl TransitionSpec {
    pub fn new(duration_ms: u32, kind: TransitionType) -> Self {
        Self { duration_ms, kind }
    }

    pub fn instant() -> Self {
        Self::default()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransitionParam {
    pub start: f32,
    pub target: f32,
    pub activated_at: u64,
    pub duration_ms: u32,
    pub kind: TransitionType,
    retired: bool,
}

impl Default for TransitionParam {
    fn default() -> Self {
        Self {
            start: 0.0,
            target: 0.0,
            activated_at: 0,
            duration_ms: 0,
            kind: TransitionType::Linear,
            retired: true,
        }
    }
}

impl TransitionParam {
    pub fn new(
        start: f32,
        target: f32,
        activated_at: u64,
        spec: TransitionSpec,
    ) -> Self {
        Self {
            start,
            target,
            activated_at,
            duration_ms: spec.duration_ms,
            kind: spec.kind,
            retired: false,
        }
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    /// The value the parameter is heading to, while still moving.
    pub fn in_flight_target(&self) -> Option<f32> {
        (!self.retired).then_some(self.target)
    }

    /// Value for `now`, or `None` once retired. The tick that reaches the
    /// target returns it exactly and retires the transition.
    pub fn step(&mut self, now: u64) -> Option<f32> {
        if self.retired {
            return None;
        }

        if self.duration_ms == 0 {
            self.retired = true;
            return Some(self.target);
        }

        let elapsed = now.saturating_sub(self.activated_at);
        let progress = elapsed as f32 / self.duration_ms as f32;

        if progress >= 1.0 {
            self.retired = true;
            return Some(self.target);
        }

        Some(lerp(self.start, self.target, self.kind.apply(progress)))
    }

    fn retire(&mut self) {
        self.retired = true;
    }
}

/// The transition scheduler. Separation and convergence keep their last
/// transition around after it retires; indexed parameters and variables are
/// dropped from their maps as soon as they arrive.
#[derive(Debug, Default)]
pub struct Transitions {
    separation: TransitionParam,
    convergence: TransitionParam,
    params: HashMap<ParamSlot, TransitionParam>,
    vars: HashMap<VarId, TransitionParam>,
}

impl Transitions {
    /// Starts (or restarts) a transition for every key present in `targets`,
    /// beginning at the parameter's current live value.
    pub fn schedule(
        &mut self,
        targets: &ParamValues,
        spec: TransitionSpec,
        now: u64,
        sink: &dyn ParameterSink,
        variables: &Variables,
    ) {
        if targets.is_empty() {
            return;
        }

        let mut line = String::from("Override");
        if spec.duration_ms > 0 {
            let _ = write!(
                line,
                " transition: {}ms transition_type: {}",
                spec.duration_ms, spec.kind
            );
        }

        if let Some(target) = targets.separation {
            let current = sink.separation().unwrap_or_else(|err| {
                debug!("Reading separation failed: {}", err);
                target
            });
            let _ =
                write!(line, " separation: {:.2} -> {:.2}", current, target);
            self.separation = TransitionParam::new(current, target, now, spec);
        }

        if let Some(target) = targets.convergence {
            let current = sink.convergence().unwrap_or_else(|err| {
                debug!("Reading convergence failed: {}", err);
                target
            });
            let _ =
                write!(line, " convergence: {:.2} -> {:.2}", current, target);
            self.convergence = TransitionParam::new(current, target, now, spec);
        }

        for (slot, &target) in &targets.params {
            let current = sink.indexed_param(*slot);
            let _ =
                write!(line, " {}: {:.2} -> {:.2}", slot, current, target);
            self.params.insert(
                *slot,
                TransitionParam::new(current, target, now, spec),
            );
        }

        for (id, &target) in &targets.vars {
            let current = variables.get(*id);
            let _ = write!(
                line,
                " ${}: {:.2} -> {:.2}",
                variables.name(*id),
                current,
                target
            );
            self.vars
                .insert(*id, TransitionParam::new(current, target, now, spec));
        }

        info!("{}", line);
    }

    /// Advances every in-flight transition to `now` and writes the results.
    /// Indexed parameters are published once, after all of them are written.
    pub fn update(
        &mut self,
        now: u64,
        sink: &mut dyn ParameterSink,
        variables: &mut Variables,
    ) {
        if let Some(value) = self.separation.step(now) {
            debug!("Transitioning separation to {:.2}", value);
            if let Err(err) = sink.set_separation(value) {
                debug!("Setting separation failed: {}", err);
            }
        }

        if let Some(value) = self.convergence.step(now) {
            debug!("Transitioning convergence to {:.2}", value);
            if let Err(err) = sink.set_convergence(value) {
                debug!("Setting convergence failed: {}", err);
            }
        }

        if !self.params.is_empty() {
            let mut line = String::new();
            self.params.retain(|slot, transition| {
                if let Some(value) = transition.step(now) {
                    sink.set_indexed_param(*slot, value);
                    let _ = write!(line, " {}={:.2}", slot, value);
                }
                !transition.is_retired()
            });
            debug!("Indexed params remapped to{}", line);
            sink.publish_indexed_params();
        }

        if !self.vars.is_empty() {
            let mut line = String::new();
            self.vars.retain(|id, transition| {
                if let Some(value) = transition.step(now) {
                    variables.set(*id, value);
                    let _ = write!(
                        line,
                        " ${}={:.2}",
                        variables.name(*id),
                        value
                    );
                }
                !transition.is_retired()
            });
            debug!("Variables remapped to{}", line);
        }
    }

    /// Drops every in-flight transition so nothing keeps writing after a
    /// configuration reload.
    pub fn stop(&mut self) {
        self.params.clear();
        self.vars.clear();
        self.separation.retire();
        self.convergence.retire();
    }

    pub fn get(&self, key: ParameterKey) -> Option<&TransitionParam> {
        match key {
            ParameterKey::Separation => Some(&self.separation),
            ParameterKey::Convergence => Some(&self.convergence),
            ParameterKey::Indexed(slot) => self.params.get(&slot),
            ParameterKey::Var(id) => self.vars.get(&id),
        }
    }

    pub fn in_flight_target(&self, key: ParameterKey) -> Option<f32> {
        self.get(key).and_then(TransitionParam::in_flight_target)
    }

    /// True when no transition would change anything on the next tick.
    pub fn is_idle(&self) -> bool {
        self.separation.is_retired()
            && self.convergence.is_retired()
            && self.params.is_empty()
            && self.vars.is_empty()
    }
}
