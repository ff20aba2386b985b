//! The consumer side: whatever actually holds the live separation,
//! convergence and indexed parameter values.

use std::fmt;

use crate::params::ParamSlot;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkError {
    /// The device or session is not currently reachable.
    Unavailable,
    /// The device refused the call with a backend status code.
    Rejected(i32),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "parameter sink unavailable"),
            Self::Rejected(code) => {
                write!(f, "parameter sink rejected call: {}", code)
            }
        }
    }
}

impl std::error::Error for SinkError {}

/// Narrow get/set contract the override engine drives. Separation and
/// convergence calls may fail; indexed parameters live in a plain table that
/// becomes visible to the consumer on [`Self::publish_indexed_params`].
pub trait ParameterSink {
    fn separation(&self) -> Result<f32, SinkError>;
    fn set_separation(&mut self, value: f32) -> Result<(), SinkError>;
    fn convergence(&self) -> Result<f32, SinkError>;
    fn set_convergence(&mut self, value: f32) -> Result<(), SinkError>;

    fn indexed_param(&self, slot: ParamSlot) -> f32;
    fn set_indexed_param(&mut self, slot: ParamSlot, value: f32);

    /// Grow the table so `count` vectors are addressable.
    fn reserve_indexed_params(&mut self, count: usize);

    /// Push the whole table to the consumer. May be an expensive
    /// synchronization point, so callers batch writes before publishing.
    fn publish_indexed_params(&mut self);
}

/// In-memory sink. `available = false` makes every separation/convergence
/// call fail, which is how tests simulate a lost device.
#[derive(Clone, Debug)]
pub struct MemorySink {
    pub separation: f32,
    pub convergence: f32,
    pub params: Vec<[f32; 4]>,
    pub available: bool,
    pub publish_count: usize,
    published: Vec<[f32; 4]>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl MemorySink {
    pub fn new(separation: f32, convergence: f32) -> Self {
        Self {
            separation,
            convergence,
            params: vec![],
            available: true,
            publish_count: 0,
            published: vec![],
        }
    }

    /// The table as the consumer last saw it.
    pub fn published(&self) -> &[[f32; 4]] {
        &self.published
    }

    fn check(&self) -> Result<(), SinkError> {
        if self.available {
            Ok(())
        } else {
            Err(SinkError::Unavailable)
        }
    }
}

impl ParameterSink for MemorySink {
    fn separation(&self) -> Result<f32, SinkError> {
        self.check()?;
        Ok(self.separation)
    }

    fn set_separation(&mut self, value: f32) -> Result<(), SinkError> {
        self.check()?;
        self.separation = value;
        Ok(())
    }

    fn convergence(&self) -> Result<f32, SinkError> {
        self.check()?;
        Ok(self.convergence)
    }

    fn set_convergence(&mut self, value: f32) -> Result<(), SinkError> {
        self.check()?;
        self.convergence = value;
        Ok(())
    }

    fn indexed_param(&self, slot: ParamSlot) -> f32 {
        self.params
            .get(slot.index)
            .map_or(0.0, |v| v[slot.component.offset()])
    }

    fn set_indexed_param(&mut self, slot: ParamSlot, value: f32) {
        if slot.index >= self.params.len() {
            self.reserve_indexed_params(slot.index + 1);
        }
        self.params[slot.index][slot.component.offset()] = value;
    }

    fn reserve_indexed_params(&mut self, count: usize) {
        if count > self.params.len() {
            self.params.resize(count, [0.0; 4]);
        }
    }

    fn publish_indexed_params(&mut self) {
        self.published.clone_from(&self.params);
        self.publish_count += 1;
    }
}
