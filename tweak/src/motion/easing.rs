//! Easing curves available to override transitions.

use std::f64::consts::PI;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransitionType {
    #[default]
    Linear,

    /// Half a cosine period, slow at both ends.
    Cosine,
}

impl TransitionType {
    pub const NAMES: &[&str] = &["linear", "cosine"];

    /// Maps linear progress in `0.0..=1.0` onto the curve.
    pub fn apply(&self, t: f32) -> f32 {
        match self {
            Self::Linear => linear(t),
            Self::Cosine => cosine(t),
        }
    }
}

impl FromStr for TransitionType {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(Self::Linear),
            "cosine" => Ok(Self::Cosine),
            _ => Err(format!(
                "Unknown transition type: {} (expected one of {:?})",
                name,
                Self::NAMES
            )),
        }
    }
}

impl Display for TransitionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        let s = match self {
            Self::Linear => "linear",
            Self::Cosine => "cosine",
        };

        write!(f, "{}", s)
    }
}

pub fn linear(t: f32) -> f32 {
    t
}

pub fn cosine(t: f32) -> f32 {
    ((1.0 - (t as f64 * PI).cos()) / 2.0) as f32
}
