use std::fmt;
use std::sync::Arc;

use log::info;

use crate::params::ParamValues;
use crate::script::{Condition, RunCommand};
use crate::sink::ParameterSink;
use crate::variables::Variables;

use super::global_save::GlobalSave;
use super::transition::{TransitionSpec, Transitions};

/// Everything an override touches while changing state. Owned by the frame
/// driver and lent out for the duration of one event.
pub struct Context<'a> {
    pub sink: &'a mut dyn ParameterSink,
    pub variables: &'a mut Variables,
    pub transitions: &'a mut Transitions,
    pub saves: &'a mut GlobalSave,
    pub now_ms: u64,
}

impl Context<'_> {
    fn schedule(&mut self, targets: &ParamValues, spec: TransitionSpec) {
        self.transitions.schedule(
            targets,
            spec,
            self.now_ms,
            &*self.sink,
            self.variables,
        );
    }
}

/// A named set of parameter targets that can be switched on and off.
#[derive(Clone)]
pub struct Override {
    name: String,
    targets: ParamValues,
    saved: ParamValues,
    condition: Option<Arc<dyn Condition>>,
    transition: TransitionSpec,
    release_transition: TransitionSpec,
    run: Option<RunCommand>,
    active: bool,
}

impl fmt::Debug for Override {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Override")
            .field("name", &self.name)
            .field("targets", &self.targets)
            .field("saved", &self.saved)
            .field("conditional", &self.condition.is_some())
            .field("transition", &self.transition)
            .field("release_transition", &self.release_transition)
            .field("run", &self.run)
            .field("active", &self.active)
            .finish()
    }
}

impl Override {
    pub fn new(name: &str, targets: ParamValues) -> Self {
        Self {
            name: name.to_string(),
            targets,
            saved: ParamValues::default(),
            condition: None,
            transition: TransitionSpec::instant(),
            release_transition: TransitionSpec::instant(),
            run: None,
            active: false,
        }
    }

    pub fn with_condition(mut self, condition: Arc<dyn Condition>) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_transition(mut self, spec: TransitionSpec) -> Self {
        self.transition = spec;
        self
    }

    pub fn with_release_transition(mut self, spec: TransitionSpec) -> Self {
        self.release_transition = spec;
        self
    }

    pub fn with_run(mut self, run: RunCommand) -> Self {
        self.run = Some(run);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn targets(&self) -> &ParamValues {
        &self.targets
    }

    /// Values in effect right before this override's last activation.
    pub fn saved(&self) -> &ParamValues {
        &self.saved
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }

    pub fn transition(&self) -> TransitionSpec {
        self.transition
    }

    pub fn release_transition(&self) -> TransitionSpec {
        self.release_transition
    }

    fn condition_met(&self, variables: &Variables) -> bool {
        self.condition
            .as_ref()
            .is_none_or(|c| c.evaluate(variables) != 0.0)
    }

    /// Moves every target parameter towards this override's values.
    ///
    /// With `requires_explicit_deactivate` the override becomes active and
    /// takes a save reference on each parameter. Without it the activation is
    /// a pulse: both command lists run back to back and neither `active` nor
    /// the save areas are touched.
    pub fn activate(
        &mut self,
        ctx: &mut Context,
        requires_explicit_deactivate: bool,
    ) {
        if !self.condition_met(ctx.variables) {
            info!("Skipping {} activation: condition not met", self.name);
            return;
        }

        info!("{} activation -->", self.name);

        if requires_explicit_deactivate {
            self.active = true;
            ctx.saves.save(
                &self.targets,
                &mut self.saved,
                ctx.transitions,
                &*ctx.sink,
                ctx.variables,
            );
        }

        ctx.schedule(&self.targets, self.transition);

        if let Some(run) = &self.run {
            run.activate.run(ctx.variables);
            if !requires_explicit_deactivate {
                if let Some(deactivate) = &run.deactivate {
                    deactivate.run(ctx.variables);
                }
            }
        }
    }

    pub fn deactivate(&mut self, ctx: &mut Context) {
        if !self.active {
            info!("Skipping {} deactivation: not active", self.name);
            return;
        }

        info!("{} deactivation <--", self.name);

        self.active = false;
        ctx.saves.restore(&self.targets, &mut self.saved);

        ctx.schedule(&self.saved, self.release_transition);

        if let Some(deactivate) =
            self.run.as_ref().and_then(|r| r.deactivate.as_ref())
        {
            deactivate.run(ctx.variables);
        }
    }

    pub fn toggle(&mut self, ctx: &mut Context) {
        if !self.condition_met(ctx.variables) {
            info!("Skipping {} toggle: condition not met", self.name);
            return;
        }

        if self.active {
            self.deactivate(ctx);
        } else {
            self.activate(ctx, true);
        }
    }
}
