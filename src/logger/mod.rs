//! Process-wide `tracing` setup for binaries. The library itself only emits
//! events; hosts decide how to collect them.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};
