use std::io::IsTerminal;

use time::UtcOffset;

use crate::logger::format::LoggerFormat;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directive, e.g. `info` or `concron=debug,axum=warn`.
    pub level: String,
    pub with_targets: bool,
    pub use_color: bool,
    /// Timestamp offset. `None` tries the local offset at install time and falls back to UTC.
    pub offset: Option<UtcOffset>,
}

impl LoggerConfig {
    /// Settings used by the agent binary: `debug` level in debug mode, `info` otherwise.
    pub fn daemon(debug: bool, format: LoggerFormat, offset: Option<UtcOffset>) -> Self {
        Self {
            format,
            level: if debug { "debug" } else { "info" }.to_string(),
            offset,
            ..Default::default()
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: true,
            use_color: std::io::stdout().is_terminal(),
            offset: None,
        }
    }
}
