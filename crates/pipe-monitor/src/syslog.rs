//! Minimal syslog client over the local datagram socket.

use std::{
    env,
    fs::File,
    io,
    os::{
        fd::AsFd,
        unix::{fs::MetadataExt, net::UnixDatagram},
    },
};

const UNIX_SOCK_PATHS: [&str; 3] = ["/dev/log", "/var/run/syslog", "/var/run/log"];

/// Tag prepended to every message.
pub const IDENT: &str = "bsmtrace";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facility {
    Auth = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Alert = 1,
    Warning = 4,
    Info = 6,
    Debug = 7,
}

impl From<log::Level> for Severity {
    fn from(level: log::Level) -> Self {
        match level {
            // Errors reaching the operator are the fatal ones.
            log::Level::Error => Severity::Alert,
            log::Level::Warn => Severity::Warning,
            log::Level::Info => Severity::Info,
            log::Level::Debug | log::Level::Trace => Severity::Debug,
        }
    }
}

/// facility * 8 + severity
pub fn priority(facility: Facility, severity: Severity) -> u8 {
    facility as u8 * 8 + severity as u8
}

/// Format a message the way syslogd expects it on the local socket.
pub fn format_message(facility: Facility, severity: Severity, pid: u32, msg: &str) -> String {
    format!("<{}>{IDENT}[{pid}]: {msg}", priority(facility, severity))
}

#[derive(Debug)]
pub struct Syslog {
    sock: UnixDatagram,
    facility: Facility,
    pid: u32,
}

impl Syslog {
    /// Connect to the first local syslog socket which accepts us.
    pub fn connect(facility: Facility) -> io::Result<Self> {
        let sock = UnixDatagram::unbound()?;
        UNIX_SOCK_PATHS
            .iter()
            .find_map(|path| sock.connect(path).ok())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no syslog socket found"))?;
        Ok(Self::from_socket(sock, facility))
    }

    /// Use an already connected socket.
    pub fn from_socket(sock: UnixDatagram, facility: Facility) -> Self {
        Self {
            sock,
            facility,
            pid: std::process::id(),
        }
    }

    pub fn send(&self, severity: Severity, msg: &str) -> io::Result<()> {
        let out = format_message(self.facility, severity, self.pid, msg);
        self.sock.send(out.as_bytes())?;
        Ok(())
    }
}

/// Whether stderr is already captured by the systemd journal, in which case
/// writing to syslog too would log every line twice.
pub fn stderr_is_journal() -> bool {
    io::stderr()
        .as_fd()
        .try_clone_to_owned()
        .and_then(|fd| File::from(fd).metadata())
        .map(|meta| format!("{}:{}", meta.dev(), meta.ino()))
        .ok()
        .and_then(|stderr| {
            env::var_os("JOURNAL_STREAM").map(|s| s.to_string_lossy() == stderr.as_str())
        })
        .unwrap_or(false)
}
