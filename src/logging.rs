/*!
 * Logging and tracing initialization
 */

use std::fs::File;
use std::path::Path;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::error::{AgentError, Result};
use crate::settings::RuntimeSettings;

/// Initialize structured logging based on settings
pub fn init_logging(settings: &RuntimeSettings) -> Result<()> {
    let log_level = settings.log_level.to_tracing_level();

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("outpost={}", log_level)))
        .map_err(|e| AgentError::Settings(format!("Failed to create log filter: {}", e)))?;

    if let Some(ref log_path) = settings.log_file {
        init_file_logging(log_path, env_filter)?;
    } else {
        init_stdout_logging(env_filter);
    }

    Ok(())
}

/// Initialize logging to stdout
fn init_stdout_logging(env_filter: EnvFilter) {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// Initialize logging to a file, one JSON object per line
fn init_file_logging(log_path: &Path, env_filter: EnvFilter) -> Result<()> {
    let file = File::create(log_path)
        .map_err(|e| AgentError::Settings(format!("Failed to create log file: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_writer(file)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(false)
        .json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}

/// Human-readable sleep announcement, e.g. `Dead for 2.50 minutes (next run at: 14:03:12)`
pub fn sleep_message(delay: Duration, now: chrono::DateTime<chrono::Local>) -> String {
    let next = now + chrono::Duration::seconds(delay.as_secs() as i64);
    format!(
        "Dead for {:.2} minutes (next run at: {})",
        delay.as_secs_f64() / 60.0,
        next.format("%H:%M:%S")
    )
}

/// Log how long the agent is about to sleep
pub fn log_sleep(delay: Duration) {
    info!(delay_secs = delay.as_secs(), "{}", sleep_message(delay, chrono::Local::now()));
}

/// Initialize logging for tests
#[cfg(test)]
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("outpost=debug"));

        let fmt_layer = fmt::layer().with_test_writer().with_target(false).compact();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .ok();
    });
}
