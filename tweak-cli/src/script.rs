//! Scripted input for a headless run.
//!
//! ```yaml
//! events:
//!   - { frame: 0, down: rmb }
//!   - { frame: 30, up: rmb }
//!   - { frame: 10, until: 40, trigger: { preset: shadows, source: 1 } }
//!   - { frame: 60, reload: true }
//! ```

use std::error::Error;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tweak::prelude::*;

#[derive(Deserialize, Debug, Default)]
pub struct Script {
    #[serde(default)]
    pub events: Vec<Event>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Event {
    pub frame: u64,
    /// Last frame a `trigger` is repeated on. Presets are level triggered so
    /// a held trigger has to be sent every frame.
    #[serde(default)]
    pub until: Option<u64>,
    #[serde(default)]
    pub down: Option<String>,
    #[serde(default)]
    pub up: Option<String>,
    #[serde(default)]
    pub back: Option<String>,
    #[serde(default)]
    pub trigger: Option<TriggerEvent>,
    #[serde(default)]
    pub exclude: Option<String>,
    #[serde(default)]
    pub reload: bool,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TriggerEvent {
    pub preset: String,
    #[serde(default)]
    pub source: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Down(String),
    Up(String),
    Back(String),
    Trigger(String, TriggerId),
    Exclude(String),
    Reload,
}

impl Event {
    pub fn action(&self) -> Result<Action, String> {
        let mut actions = vec![];

        if let Some(binding) = &self.down {
            actions.push(Action::Down(binding.clone()));
        }
        if let Some(binding) = &self.up {
            actions.push(Action::Up(binding.clone()));
        }
        if let Some(cycle) = &self.back {
            actions.push(Action::Back(cycle.clone()));
        }
        if let Some(trigger) = &self.trigger {
            actions.push(Action::Trigger(
                trigger.preset.clone(),
                TriggerId(trigger.source),
            ));
        }
        if let Some(preset) = &self.exclude {
            actions.push(Action::Exclude(preset.clone()));
        }
        if self.reload {
            actions.push(Action::Reload);
        }

        match actions.len() {
            1 => Ok(actions.remove(0)),
            0 => Err(format!("event at frame {} does nothing", self.frame)),
            n => Err(format!(
                "event at frame {} has {} actions, expected one",
                self.frame, n
            )),
        }
    }

    pub fn fires_on(&self, frame: u64) -> bool {
        match (self.until, &self.trigger) {
            (Some(until), Some(_)) => (self.frame..=until).contains(&frame),
            _ => self.frame == frame,
        }
    }

    pub fn last_frame(&self) -> u64 {
        self.until.unwrap_or(self.frame).max(self.frame)
    }
}

impl Script {
    pub fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(yaml: &str) -> Result<Self, Box<dyn Error>> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let script: Self = serde_yml::from_str(yaml)?;
        for event in &script.events {
            event.action()?;
        }
        Ok(script)
    }

    pub fn last_frame(&self) -> Option<u64> {
        self.events.iter().map(Event::last_frame).max()
    }

    pub fn actions_for(&self, frame: u64) -> Vec<Action> {
        self.events
            .iter()
            .filter(|event| event.fires_on(frame))
            .filter_map(|event| event.action().ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_event_kind() {
        let script = Script::parse(
            r#"
events:
  - { frame: 0, down: rmb }
  - { frame: 2, up: rmb }
  - { frame: 3, back: zoom }
  - { frame: 4, exclude: hud }
  - { frame: 5, reload: true }
  - { frame: 1, until: 3, trigger: { preset: hud, source: 7 } }
"#,
        )
        .unwrap();

        assert_eq!(script.last_frame(), Some(5));
        assert_eq!(script.actions_for(0), vec![Action::Down("rmb".into())]);
        assert_eq!(
            script.actions_for(3),
            vec![
                Action::Back("zoom".into()),
                Action::Trigger("hud".into(), TriggerId(7)),
            ]
        );
        assert_eq!(script.actions_for(5), vec![Action::Reload]);
        assert!(script.actions_for(6).is_empty());
    }

    #[test]
    fn until_only_repeats_triggers() {
        let script =
            Script::parse("events:\n  - { frame: 1, until: 4, down: a }\n")
                .unwrap();
        assert_eq!(script.actions_for(1).len(), 1);
        assert!(script.actions_for(2).is_empty());
    }

    #[test]
    fn rejects_ambiguous_events() {
        assert!(
            Script::parse("events:\n  - { frame: 1, down: a, up: a }\n")
                .is_err()
        );
        assert!(Script::parse("events:\n  - { frame: 1 }\n").is_err());
    }

    #[test]
    fn empty_script_has_no_events() {
        let script = Script::parse("").unwrap();
        assert!(script.events.is_empty());
        assert_eq!(script.last_frame(), None);
    }
}
