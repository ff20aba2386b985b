use log::debug;

use crate::core::util::HashSet;

use super::override_core::{Context, Override};

/// Identifies whatever fired a trigger (a draw call, a shader, a script
/// line). Presets requiring several unique triggers count distinct ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TriggerId(pub u64);

/// An override that stays active only while something keeps triggering it,
/// evaluated once per frame.
#[derive(Clone, Debug)]
pub struct PresetOverride {
    ovr: Override,
    unique_triggers_required: usize,
    triggers_this_frame: HashSet<TriggerId>,
    triggered: bool,
    excluded: bool,
}

impl PresetOverride {
    pub fn new(ovr: Override, unique_triggers_required: usize) -> Self {
        Self {
            ovr,
            unique_triggers_required,
            triggers_this_frame: HashSet::default(),
            triggered: false,
            excluded: false,
        }
    }

    pub fn inner(&self) -> &Override {
        &self.ovr
    }

    pub fn name(&self) -> &str {
        self.ovr.name()
    }

    pub fn is_active(&self) -> bool {
        self.ovr.is_active()
    }

    pub fn unique_triggers_required(&self) -> usize {
        self.unique_triggers_required
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    pub fn trigger(&mut self, source: TriggerId) {
        if self.unique_triggers_required == 0 {
            self.triggered = true;
            return;
        }

        self.triggers_this_frame.insert(source);
        if self.triggers_this_frame.len() >= self.unique_triggers_required {
            self.triggered = true;
        }
    }

    /// Vetoes activation for the current frame.
    pub fn exclude(&mut self) {
        self.excluded = true;
    }

    /// Must be called exactly once per frame, after all triggers for it.
    pub fn update(&mut self, ctx: &mut Context) {
        let wanted = self.triggered && !self.excluded;

        if !self.ovr.is_active() && wanted {
            self.ovr.activate(ctx, true);
        } else if self.ovr.is_active() && !wanted {
            self.ovr.deactivate(ctx);
        } else if self.excluded {
            debug!("{}: excluded this frame", self.ovr.name());
        }

        self.triggers_this_frame.clear();
        self.triggered = false;
        self.excluded = false;
    }
}
