pub mod logging;
pub mod run_log;

pub use logging::*;
pub use run_log::*;
