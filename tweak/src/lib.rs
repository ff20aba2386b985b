//! Runtime parameter overrides: named sets of target values bound to keys,
//! cycles and per-frame triggers, applied with eased transitions and
//! restored through a reference-counted save area.
//!
//! ```rust
//! use tweak::prelude::*;
//!
//! let clock = ManualClock::new(0);
//! let mut hub = OverrideHub::new(MemorySink::new(50.0, 1.0), clock.clone());
//! hub.load_str("aim:\n  type: hold\n  key: rmb\n  convergence: 4\n")?;
//!
//! hub.key_down("rmb");
//! hub.frame();
//! assert_eq!(hub.sink().convergence, 4.0);
//! # Ok::<(), ConfigError>(())
//! ```

pub mod config;
pub mod core;
pub mod hub;
pub mod motion;
pub mod overrides;
pub mod params;
pub mod script;
pub mod sink;
pub mod variables;

pub mod prelude {
    pub use crate::core::prelude::*;
}
