pub mod global_save;
pub mod key_override;
pub mod override_core;
pub mod preset;
pub mod transition;

pub use global_save::*;
pub use key_override::*;
pub use override_core::*;
pub use preset::*;
pub use transition::*;
