use anyhow::Result;
use bsmtrace::cli::bsmtraced::BsmtracedOpts;
use clap::Parser;

#[path = "_common/clap_version.rs"]
mod clap_version;

#[derive(Parser, Debug, Clone)]
#[clap(about = "Audit pipe loss monitor")]
#[clap(version = clap_version::bsmtrace_clap_version())]
#[clap(disable_help_subcommand = true)]
struct Opts {
    #[command(flatten)]
    pub daemon_opts: BsmtracedOpts,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let opts = Opts::parse();
    let daemon_opts = &opts.daemon_opts;

    if let Err(e) = bsmtrace::init_logger(
        daemon_opts.run_mode(),
        Some(daemon_opts.log_level_filter()),
    ) {
        eprintln!("bsmtraced: failed to initialize logging: {e}");
    }

    match bsmtrace::bsmtraced::bsmtraced_run(daemon_opts).await {
        Ok(_) => std::process::exit(0),
        Err(e) => {
            bsmtrace::utils::report_error(&e);
            std::process::exit(1);
        }
    }
}
