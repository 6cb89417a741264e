use std::{
    fmt,
    io::{self, Stderr, Write},
};

use audit_pipe::PipeStatistics;

use crate::syslog::{Facility, Severity, Syslog};

/// How the daemon was started, which decides where operator output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Attached to a terminal: reports go to stderr.
    Foreground,
    /// Detached: reports go to syslog.
    Daemon,
}

impl RunMode {
    pub fn from_foreground_flag(foreground: bool) -> Self {
        if foreground {
            RunMode::Foreground
        } else {
            RunMode::Daemon
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Foreground => f.write_str("foreground"),
            RunMode::Daemon => f.write_str("daemon"),
        }
    }
}

/// Destination of statistics reports.
pub trait ReportSink {
    fn report(&mut self, statistics: &PipeStatistics) -> io::Result<()>;
}

/// Three human readable lines per report.
pub fn console_report(statistics: &PipeStatistics) -> String {
    format!(
        "audit record drops {}\naudit record reads {}\naudit record truncates {}\n",
        statistics.drops, statistics.reads, statistics.truncates
    )
}

/// A single line per report, for syslog.
pub fn syslog_report(statistics: &PipeStatistics) -> String {
    format!(
        "audit record drops={} reads={} truncates={}",
        statistics.drops, statistics.reads, statistics.truncates
    )
}

/// Writes reports to a console stream, stderr by default.
#[derive(Debug)]
pub struct ConsoleSink<W = Stderr> {
    out: W,
}

impl ConsoleSink {
    pub fn stderr() -> Self {
        Self { out: io::stderr() }
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for ConsoleSink<W> {
    fn report(&mut self, statistics: &PipeStatistics) -> io::Result<()> {
        self.out.write_all(console_report(statistics).as_bytes())?;
        self.out.flush()
    }
}

/// Sends reports to syslog at informational severity.
///
/// A sink opened with [`SyslogSink::connect`] reconnects once when a send
/// fails, which is what happens after syslogd restarts.
#[derive(Debug)]
pub struct SyslogSink {
    syslog: Syslog,
    reconnect: bool,
}

impl SyslogSink {
    pub fn connect() -> io::Result<Self> {
        Ok(Self {
            syslog: Syslog::connect(Facility::Auth)?,
            reconnect: true,
        })
    }

    /// Use an already connected syslog, without reconnecting on failures.
    pub fn new(syslog: Syslog) -> Self {
        Self {
            syslog,
            reconnect: false,
        }
    }
}

impl ReportSink for SyslogSink {
    fn report(&mut self, statistics: &PipeStatistics) -> io::Result<()> {
        let msg = syslog_report(statistics);
        match self.syslog.send(Severity::Info, &msg) {
            Err(err) if self.reconnect => {
                log::debug!("Syslog send failed: {err}, reconnecting");
                self.syslog = Syslog::connect(Facility::Auth)?;
                self.syslog.send(Severity::Info, &msg)
            }
            result => result,
        }
    }
}

/// Sink matching the run mode. Without a reachable syslog, daemon reports
/// go to stderr.
pub fn sink_for(mode: RunMode) -> Box<dyn ReportSink + Send> {
    match mode {
        RunMode::Foreground => Box::new(ConsoleSink::stderr()),
        RunMode::Daemon => match SyslogSink::connect() {
            Ok(sink) => Box::new(sink),
            Err(err) => {
                log::warn!("Syslog unavailable: {err}, reporting statistics on stderr");
                Box::new(ConsoleSink::stderr())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::net::UnixDatagram;

    use super::*;

    const STATS: PipeStatistics = PipeStatistics {
        reads: 1024,
        drops: 12,
        truncates: 2,
    };

    #[test]
    fn console_sink_writes_three_lines() {
        let mut sink = ConsoleSink::new(Vec::new());
        sink.report(&STATS).unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            out.lines().collect::<Vec<_>>(),
            vec![
                "audit record drops 12",
                "audit record reads 1024",
                "audit record truncates 2",
            ]
        );
    }

    #[test]
    fn syslog_sink_sends_one_info_message() {
        let (tx, rx) = UnixDatagram::pair().unwrap();
        let mut sink = SyslogSink::new(Syslog::from_socket(tx, Facility::Auth));
        sink.report(&STATS).unwrap();

        let mut buf = [0u8; 256];
        let len = rx.recv(&mut buf).unwrap();
        let msg = std::str::from_utf8(&buf[..len]).unwrap();
        assert!(msg.starts_with("<38>bsmtrace["));
        assert!(msg.ends_with("]: audit record drops=12 reads=1024 truncates=2"));
    }

    #[test]
    fn dead_syslog_socket_is_an_error() {
        let (tx, rx) = UnixDatagram::pair().unwrap();
        drop(rx);
        let mut sink = SyslogSink::new(Syslog::from_socket(tx, Facility::Auth));
        assert!(sink.report(&STATS).is_err());
    }

    #[test]
    fn run_mode() {
        assert_eq!(RunMode::from_foreground_flag(true), RunMode::Foreground);
        assert_eq!(RunMode::from_foreground_flag(false), RunMode::Daemon);
        assert_eq!(RunMode::Daemon.to_string(), "daemon");
    }
}
