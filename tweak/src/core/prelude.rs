pub use crate::config::*;
pub use crate::core::logging::init_logger;
pub use crate::core::logging::{debug, error, info, trace, warn};
pub use crate::core::util::HashMap;
pub use crate::core::util::HashSet;
pub use crate::core::util::lerp;
pub use crate::hub::OverrideHub;
pub use crate::motion::*;
pub use crate::overrides::*;
pub use crate::params::*;
pub use crate::script::*;
pub use crate::sink::*;
pub use crate::variables::*;
