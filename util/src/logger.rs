//! Logger initialisation
//!
//! Log lines are prefixed with the number of seconds since the session epoch
//! and a coloured level tag, and are written to both stdout and the session's
//! log file. Debug and trace lines also carry their target module.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use colored::{ColoredString, Colorize};
use log::{info, Level, Record};
use std::fmt::Arguments;
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Targets which log every frame, capped so a trace-level session log stays
/// readable.
const PER_FRAME_TARGETS: [(&str, LevelFilter); 2] = [
    ("comms_if::can", LevelFilter::Debug),
    ("dbw_lib::veh_state", LevelFilter::Debug),
];

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Expected a log level of at least `INFO`, found `{0}`")]
    InvalidMinLogLevel(LevelFilter),

    #[error("Error initialising the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(log::SetLoggerError),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
///
/// `min_level` must include `INFO`. Must only be called once per process.
pub fn logger_init(min_level: LevelFilter, session: &session::Session) -> Result<(), LoggerInitError> {
    if min_level < Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level));
    }

    let log_file = fern::log_file(&session.log_file_path).map_err(LoggerInitError::LogFileInitError)?;

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| out.finish(format_args!("{}", format_line(message, record))))
        .level(min_level);

    for (target, level) in PER_FRAME_TARGETS.iter() {
        dispatch = dispatch.level_for(*target, (*level).min(min_level));
    }

    dispatch
        .chain(std::io::stdout())
        .chain(log_file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    if let Some(epoch) = session::get_epoch() {
        info!("    Session epoch: {}", epoch);
    }
    info!("    Log level: {:?}", min_level);
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn format_line(message: &Arguments, record: &Record) -> String {
    let elapsed = session::get_elapsed_seconds();
    let tag = level_to_str(record.level());

    if record.level() > Level::Info {
        format!("[{:10.6} {}] {}: {}", elapsed, tag, record.target(), message)
    } else {
        format!("[{:10.6} {}] {}", elapsed, tag, message)
    }
}

/// Get the string representation of a log level
fn level_to_str(level: Level) -> ColoredString {
    match level {
        Level::Trace => "TRC".dimmed().italic(),
        Level::Debug => "DBG".dimmed(),
        Level::Info => "INF".normal(),
        Level::Warn => "WRN".yellow(),
        Level::Error => "ERR".red().bold(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_level_tags() {
        colored::control::set_override(false);

        assert_eq!(level_to_str(Level::Warn).to_string(), "WRN");
        assert_eq!(level_to_str(Level::Trace).to_string(), "TRC");
    }
}
