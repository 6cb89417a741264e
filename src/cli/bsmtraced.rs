use std::path::PathBuf;

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use pipe_monitor::RunMode;

pub const NAME: &str = "bsmtraced";

#[derive(Parser, Debug, Clone)]
#[clap(name = NAME)]
#[clap(about = "Audit pipe loss monitor")]
#[clap(disable_help_subcommand = true)]
pub struct BsmtracedOpts {
    /// Run in the foreground: report to the console instead of syslog
    #[clap(short = 'F', long)]
    pub foreground: bool,

    /// Location of the configuration file
    #[clap(short = 'f', long)]
    pub config_file: Option<PathBuf>,

    /// Audit pipe to monitor, overrides the configuration file
    #[clap(short = 'a', long)]
    pub audit_pipe: Option<PathBuf>,

    /// Print debugging messages
    #[clap(short, long)]
    pub debug: bool,

    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,
}

impl BsmtracedOpts {
    pub fn run_mode(&self) -> RunMode {
        RunMode::from_foreground_flag(self.foreground)
    }

    /// Log level from `-v`/`-q`, raised to debug by `-d`.
    pub fn log_level_filter(&self) -> log::LevelFilter {
        let level = self.verbosity.log_level_filter();
        if self.debug {
            level.max(log::LevelFilter::Debug)
        } else {
            level
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_daemon_mode() {
        let opts = BsmtracedOpts::try_parse_from([NAME]).unwrap();
        assert_eq!(opts.run_mode(), RunMode::Daemon);
        assert_eq!(opts.log_level_filter(), log::LevelFilter::Info);
        assert_eq!(opts.config_file, None);
    }

    #[test]
    fn short_flags() {
        let opts = BsmtracedOpts::try_parse_from([
            NAME,
            "-F",
            "-d",
            "-a",
            "/dev/auditpipe1",
            "-f",
            "/tmp/bsmtrace.ini",
        ])
        .unwrap();
        assert_eq!(opts.run_mode(), RunMode::Foreground);
        assert_eq!(opts.log_level_filter(), log::LevelFilter::Debug);
        assert_eq!(opts.audit_pipe, Some(PathBuf::from("/dev/auditpipe1")));
        assert_eq!(opts.config_file, Some(PathBuf::from("/tmp/bsmtrace.ini")));
    }

    #[test]
    fn debug_never_lowers_verbosity() {
        let opts = BsmtracedOpts::try_parse_from([NAME, "-d", "-vv"]).unwrap();
        assert_eq!(opts.log_level_filter(), log::LevelFilter::Trace);
    }

    #[test]
    fn quiet_flag() {
        let opts = BsmtracedOpts::try_parse_from([NAME, "-q"]).unwrap();
        assert_eq!(opts.log_level_filter(), log::LevelFilter::Warn);
    }
}
