use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use pipe_monitor::{
    RunMode,
    syslog::{self, Facility, Syslog},
};

/// Routes log records to the operator.
///
/// Records always go to syslog when it's reachable, with the log level
/// mapped to a syslog severity. In the foreground they are also printed on
/// stderr, unless stderr is the journal already. Without syslog everything
/// goes to stderr.
pub struct OperatorLogger {
    console: env_logger::Logger,
    console_enabled: bool,
    syslog: Option<Syslog>,
}

impl OperatorLogger {
    pub fn new(mode: RunMode, console: env_logger::Logger, syslog: Option<Syslog>) -> Self {
        let console_enabled = mode == RunMode::Foreground || syslog.is_none();
        Self {
            console,
            console_enabled,
            syslog,
        }
    }

    pub fn filter(&self) -> LevelFilter {
        self.console.filter()
    }

    pub fn install(self) -> Result<(), SetLoggerError> {
        log::set_max_level(self.filter());
        log::set_boxed_logger(Box::new(self))
    }
}

impl Log for OperatorLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.console.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.console.matches(record) {
            return;
        }

        if self.console_enabled {
            self.console.log(record);
        }

        if let Some(syslog) = &self.syslog {
            // Nowhere left to report a broken syslog socket.
            let _ = syslog.send(record.level().into(), &record.args().to_string());
        }
    }

    fn flush(&self) {
        self.console.flush();
    }
}

/// Build the stderr logger. If RUST_LOG is set, we assume the user wants to
/// debug something and use env_logger default behaviour.
pub fn console_logger(override_log_level: Option<LevelFilter>) -> env_logger::Logger {
    if std::env::var_os("RUST_LOG").is_some() {
        env_logger::Builder::from_default_env().build()
    } else {
        let level_filter = override_log_level.unwrap_or(LevelFilter::Info);
        env_logger::builder().filter_level(level_filter).build()
    }
}

/// Syslog connection for log records, `None` if there is no syslog or if
/// stderr already ends up in the journal.
pub fn syslog_logger(mode: RunMode) -> Option<Syslog> {
    if mode == RunMode::Foreground && syslog::stderr_is_journal() {
        return None;
    }
    Syslog::connect(Facility::Auth).ok()
}

#[cfg(test)]
mod tests {
    use std::os::unix::net::UnixDatagram;

    use super::*;

    fn logger(mode: RunMode, syslog: Option<Syslog>) -> OperatorLogger {
        let console = env_logger::builder()
            .filter_level(LevelFilter::Info)
            .is_test(true)
            .build();
        OperatorLogger::new(mode, console, syslog)
    }

    #[test]
    fn warnings_reach_syslog() {
        let (tx, rx) = UnixDatagram::pair().unwrap();
        let logger = logger(RunMode::Daemon, Some(Syslog::from_socket(tx, Facility::Auth)));
        assert!(!logger.console_enabled);

        logger.log(
            &Record::builder()
                .level(log::Level::Warn)
                .args(format_args!("audit pipe truncated 2 records, delta 2"))
                .build(),
        );

        let mut buf = [0u8; 256];
        let len = rx.recv(&mut buf).unwrap();
        let msg = std::str::from_utf8(&buf[..len]).unwrap();
        assert!(msg.starts_with("<36>bsmtrace["));
        assert!(msg.ends_with("audit pipe truncated 2 records, delta 2"));
    }

    #[test]
    fn filtered_records_are_dropped() {
        let (tx, rx) = UnixDatagram::pair().unwrap();
        rx.set_nonblocking(true).unwrap();
        let logger = logger(RunMode::Daemon, Some(Syslog::from_socket(tx, Facility::Auth)));

        logger.log(
            &Record::builder()
                .level(log::Level::Debug)
                .args(format_args!("healthy"))
                .build(),
        );

        let mut buf = [0u8; 64];
        assert!(rx.recv(&mut buf).is_err());
    }

    #[test]
    fn console_without_syslog() {
        assert!(logger(RunMode::Daemon, None).console_enabled);
        assert!(logger(RunMode::Foreground, None).console_enabled);
    }
}
