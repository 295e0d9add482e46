use crate::severity::LogSeverity;
use crate::time::now;
use once_cell::sync::Lazy;
use std::env;

/// Environment variable holding the minimum severity that gets printed.
pub const LOG_ENV_VAR: &str = "CONSTRUCTION_LOG";

static MIN_SEVERITY: Lazy<LogSeverity> = Lazy::new(|| {
    env::var(LOG_ENV_VAR)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(LogSeverity::Info)
});

/// The threshold read from `CONSTRUCTION_LOG`, `Info` when unset or unparsable.
pub fn min_severity() -> LogSeverity {
    *MIN_SEVERITY
}

pub fn enabled(log_severity: LogSeverity) -> bool {
    log_severity >= min_severity()
}

/// Formats one log line without the trailing newline.
pub fn format_line(msg: &str, log_severity: LogSeverity) -> String {
    format!("[{}] {} {}", log_severity, now(), msg)
}

/// Prints `msg` to stderr when `log_severity` meets the configured threshold.
pub fn log(msg: String, log_severity: LogSeverity) {
    if enabled(log_severity) {
        eprintln!("{}", format_line(&msg, log_severity));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_line_prefix() {
        let line = format_line("wrote 3 sections", LogSeverity::Warning);
        assert!(line.starts_with("[WARNING] "));
        assert!(line.ends_with(" wrote 3 sections"));
    }

    #[test]
    fn test_fatal_always_enabled() {
        assert!(enabled(LogSeverity::Fatal));
    }
}
