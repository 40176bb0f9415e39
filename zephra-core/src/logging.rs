//! Structured logging setup using the `tracing` ecosystem.
//!
//! Console output goes to stderr so command output on stdout stays clean
//! for `--format json`. The file sink rotates daily and can emit JSON.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{ZephraError, ZephraResult};

/// Crates whose debug output drowns out ours.
const QUIET_TARGETS: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn", "rustls=warn", "r2d2=warn"];

/// Keeps the non-blocking file writer alive; dropping it flushes the log.
pub struct LogGuard {
    _file: WorkerGuard,
}

/// Build the filter directive for a configured level.
///
/// `verbose` forces debug for the workspace crates. A level that already
/// contains per-target directives (`zephra_services=trace`) is used as is.
pub fn filter_directive(level: &str, verbose: bool) -> String {
    let level = level.trim();
    if level.contains('=') {
        return level.to_string();
    }
    let base = if verbose {
        "debug"
    } else if level.is_empty() {
        "info"
    } else {
        level
    };
    std::iter::once(base.to_string())
        .chain(QUIET_TARGETS.iter().map(|t| t.to_string()))
        .collect::<Vec<_>>()
        .join(",")
}

fn build_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber: compact stderr plus a daily-rolling file
/// (`zephra.log.YYYY-MM-DD`) in `log_dir`.
pub fn init_logging(config: &LoggingConfig, log_dir: &Path, verbose: bool) -> ZephraResult<LogGuard> {
    std::fs::create_dir_all(log_dir)?;

    let (writer, guard) = tracing_appender::non_blocking(rolling::daily(log_dir, "zephra.log"));
    let directive = filter_directive(&config.level, verbose);

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .without_time()
        .compact();

    let (json_file, text_file) = if config.json_output {
        let layer = fmt::layer()
            .with_writer(writer)
            .json()
            .with_current_span(false)
            .with_file(true)
            .with_line_number(true);
        (Some(layer), None)
    } else {
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_file(true)
            .with_line_number(true);
        (None, Some(layer))
    };

    tracing_subscriber::registry()
        .with(build_filter(&directive))
        .with(console)
        .with(json_file)
        .with(text_file)
        .try_init()
        .map_err(|e| ZephraError::Internal(format!("logger already installed: {e}")))?;

    tracing::debug!(filter = %directive, dir = %log_dir.display(), "logging initialized");

    Ok(LogGuard { _file: guard })
}

/// Console-only logger for tests; repeated calls are ignored.
pub fn init_console_logging(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(build_filter(&filter_directive(level, false)))
        .with(fmt::layer().with_test_writer().compact())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive_quiets_http_stack() {
        let d = filter_directive("warn", false);
        assert!(d.starts_with("warn,"));
        assert!(d.contains("reqwest=warn"));
    }

    #[test]
    fn test_verbose_overrides_level() {
        assert!(filter_directive("error", true).starts_with("debug,"));
        assert!(filter_directive("", false).starts_with("info,"));
    }

    #[test]
    fn test_target_directives_pass_through() {
        assert_eq!(filter_directive("zephra_services=trace", true), "zephra_services=trace");
    }

    #[test]
    fn test_console_logging_is_reentrant() {
        init_console_logging("debug");
        init_console_logging("info");
    }
}
