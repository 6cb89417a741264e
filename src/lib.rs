//! bsmtrace keeps an eye on the kernel audit pipe.
//!
//! The audit pipe drops records as soon as its queue is full and truncates
//! the ones which don't fit the reader. `bsmtraced` polls the pipe counters,
//! warns about every loss and grows the pipe queue when records are dropped,
//! reporting statistics to the operator along the way.
//!
//! ```sh
//! # Run in the foreground, reporting on the console
//! bsmtraced -F
//!
//! # Ask a running daemon for a statistics report
//! pkill -USR1 bsmtraced
//! ```
//!
//! The monitoring logic lives in the [`pipe_monitor`] crate, the access to
//! the pipe in [`audit_pipe`]. This crate wires them to the configuration
//! file, the command line, logging and signals.

use pipe_monitor::RunMode;

pub mod bsmtraced;
pub mod cli;
mod logger;
pub mod utils;

pub use logger::OperatorLogger;

pub mod metadata {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

/// Init logger. We log from info level and above.
///
/// Records go to syslog (facility auth) and, in the foreground, to stderr
/// too. If RUST_LOG is set it overrides `override_log_level`.
pub fn init_logger(
    mode: RunMode,
    override_log_level: Option<log::LevelFilter>,
) -> Result<(), log::SetLoggerError> {
    let console = logger::console_logger(override_log_level);
    let syslog = logger::syslog_logger(mode);
    OperatorLogger::new(mode, console, syslog).install()
}
