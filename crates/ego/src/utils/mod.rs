mod cstr_pof;
mod misc;

pub use cstr_pof::*;
pub use misc::*;

/// Environment variable used to set the log level
pub const MOEGO_LOG: &str = "MOEGO_LOG";
