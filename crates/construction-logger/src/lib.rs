pub mod log;
pub mod severity;
pub mod time;

pub use log::{enabled, log, min_severity};
pub use severity::LogSeverity;
