use std::fmt;
use std::str::FromStr;

use log::{debug, info};

use super::override_core::{Context, Override};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyBehavior {
    #[default]
    Toggle,
    Hold,
    /// Fire-and-forget: activates on every press, never deactivates.
    Activate,
}

impl FromStr for KeyBehavior {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "toggle" => Ok(Self::Toggle),
            "hold" => Ok(Self::Hold),
            "activate" => Ok(Self::Activate),
            other => Err(format!("unknown key behavior \"{}\"", other)),
        }
    }
}

impl fmt::Display for KeyBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Toggle => "toggle",
            Self::Hold => "hold",
            Self::Activate => "activate",
        };
        write!(f, "{}", name)
    }
}

/// Something a key binding can drive.
pub trait InputListener {
    fn down_event(&mut self, ctx: &mut Context);

    fn up_event(&mut self, _ctx: &mut Context) {}
}

#[derive(Clone, Debug)]
pub struct KeyOverride {
    behavior: KeyBehavior,
    ovr: Override,
}

impl KeyOverride {
    pub fn new(behavior: KeyBehavior, ovr: Override) -> Self {
        Self { behavior, ovr }
    }

    pub fn behavior(&self) -> KeyBehavior {
        self.behavior
    }

    pub fn inner(&self) -> &Override {
        &self.ovr
    }

    pub fn inner_mut(&mut self) -> &mut Override {
        &mut self.ovr
    }
}

impl InputListener for KeyOverride {
    fn down_event(&mut self, ctx: &mut Context) {
        match self.behavior {
            KeyBehavior::Toggle => self.ovr.toggle(ctx),
            KeyBehavior::Hold => self.ovr.activate(ctx, true),
            KeyBehavior::Activate => self.ovr.activate(ctx, false),
        }
    }

    fn up_event(&mut self, ctx: &mut Context) {
        if self.behavior == KeyBehavior::Hold {
            self.ovr.deactivate(ctx);
        }
    }
}

/// Steps through a list of presets, one per key press. Every preset is a
/// pulse activation; the previous one is never explicitly released.
#[derive(Clone, Debug)]
pub struct KeyOverrideCycle {
    name: String,
    presets: Vec<Override>,
    current: Option<usize>,
    wrap: bool,
}

impl KeyOverrideCycle {
    pub fn new(name: &str, presets: Vec<Override>, wrap: bool) -> Self {
        Self {
            name: name.to_string(),
            presets,
            current: None,
            wrap,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn wraps(&self) -> bool {
        self.wrap
    }

    pub fn presets(&self) -> &[Override] {
        &self.presets
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn next(&mut self, ctx: &mut Context) {
        let count = self.presets.len();
        if count == 0 {
            return;
        }

        let next = match self.current {
            None => 0,
            Some(i) if self.wrap => (i + 1) % count,
            Some(i) if i + 1 < count => i + 1,
            Some(_) => {
                debug!("{}: already at last preset", self.name);
                return;
            }
        };

        self.select(next, ctx);
    }

    pub fn back_event(&mut self, ctx: &mut Context) {
        let count = self.presets.len();
        if count == 0 {
            return;
        }

        let previous = match self.current {
            None => count - 1,
            Some(0) if self.wrap => count - 1,
            Some(0) => {
                debug!("{}: already at first preset", self.name);
                return;
            }
            Some(i) => i - 1,
        };

        self.select(previous, ctx);
    }

    fn select(&mut self, index: usize, ctx: &mut Context) {
        info!("{}: preset {}/{}", self.name, index + 1, self.presets.len());
        self.current = Some(index);
        self.presets[index].activate(ctx, false);
    }
}

impl InputListener for KeyOverrideCycle {
    fn down_event(&mut self, ctx: &mut Context) {
        self.next(ctx);
    }
}

/// A second binding for a cycle that walks it backwards.
pub struct CycleBack<'a>(pub &'a mut KeyOverrideCycle);

impl InputListener for CycleBack<'_> {
    fn down_event(&mut self, ctx: &mut Context) {
        self.0.back_event(ctx);
    }
}
