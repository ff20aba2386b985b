pub mod clock;
pub mod easing;

pub use clock::*;
pub use easing::*;
