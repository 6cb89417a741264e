use std::{future::Future, time::Duration};

use anyhow::{Context, Result, ensure};
use audit_pipe::{AuditPipe, AuditPipeDevice};
use nix::unistd::geteuid;
use pipe_monitor::PipeMonitor;
use tokio::{
    signal::unix::{Signal, SignalKind, signal},
    sync::mpsc,
    time::{self, Interval, MissedTickBehavior},
};

use crate::cli::bsmtraced::BsmtracedOpts;

mod config;

pub use config::{BsmtraceConfig, ConfigError, PIPE_SECTION, PipeConfig, SectionConfig};

pub async fn bsmtraced_run(options: &BsmtracedOpts) -> Result<()> {
    log::trace!("bsmtraced options: {:?}", options);

    ensure!(geteuid().is_root(), "You must run this as root user!!!");

    let config = if let Some(custom_file) = &options.config_file {
        BsmtraceConfig::with_custom_file(custom_file)?
    } else {
        BsmtraceConfig::new()?
    };

    let mut pipe_config = config
        .pipe_config()
        .with_context(|| format!("Invalid [{PIPE_SECTION}] configuration"))?;
    if let Some(path) = &options.audit_pipe {
        pipe_config.path = path.clone();
    }

    let mut pipe = AuditPipeDevice::open(&pipe_config.path)?;
    let mut monitor = PipeMonitor::for_pipe(&pipe, options.run_mode());

    if let Some(limit) = pipe_config.initial_queue_limit {
        if monitor.capabilities().queue_limits {
            apply_initial_queue_limit(&mut pipe, limit)?;
        } else {
            log::warn!("Ignoring initial_queue_limit, the audit pipe has no queue limit controls");
        }
    }

    let (tx_report, rx_report) = mpsc::channel(1);
    forward_signal(SignalKind::user_defined1(), tx_report)?;

    let sig_int = signal(SignalKind::interrupt())?;
    let sig_term = signal(SignalKind::terminate())?;
    let sig_hup = signal(SignalKind::hangup())?;

    log::info!(
        "Monitoring audit pipe {} ({} mode)",
        pipe.path().display(),
        options.run_mode()
    );

    run_monitor(
        &mut pipe,
        &mut monitor,
        &pipe_config,
        rx_report,
        shutdown_signal(sig_int, sig_term, sig_hup),
    )
    .await
}

/// Poll the pipe until `shutdown` completes.
///
/// Loss checks and periodic reports follow the configured intervals, extra
/// reports are produced for every message on `rx_report`. The first failing
/// pipe query ends the loop: the pipe state is unknown from there on. Report
/// output failures don't.
pub async fn run_monitor<P, F>(
    pipe: &mut P,
    monitor: &mut PipeMonitor,
    config: &PipeConfig,
    mut rx_report: mpsc::Receiver<()>,
    shutdown: F,
) -> Result<()>
where
    P: AuditPipe + ?Sized,
    F: Future<Output = ()>,
{
    let mut loss_check = ticker(config.loss_check_interval);
    let mut stats = config.stats_interval.map(ticker);

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            Some(()) = rx_report.recv() => {
                monitor.report(&*pipe).context("Error reporting audit pipe statistics")?;
            }
            _ = loss_check.tick() => {
                monitor.check_loss(&mut *pipe).context("Error checking audit pipe loss")?;
            }
            _ = next_tick(&mut stats) => {
                monitor.report(&*pipe).context("Error reporting audit pipe statistics")?;
            }
        }
    }

    if config.report_on_exit {
        monitor.report(&*pipe).context("Error reporting audit pipe statistics")?;
    }

    Ok(())
}

/// Set the queue limit configured for start-up, clamped to what the pipe
/// allows.
pub fn apply_initial_queue_limit<P: AuditPipe + ?Sized>(pipe: &mut P, limit: u32) -> Result<()> {
    let capacity = pipe.query_queue_capacity()?;
    let clamped = limit.clamp(1, capacity.max.max(1));
    if clamped != limit {
        log::warn!(
            "initial_queue_limit {limit} out of range, using {clamped} (maximum {})",
            capacity.max
        );
    }

    if clamped == capacity.current {
        return Ok(());
    }

    pipe.set_queue_capacity(clamped)?;
    log::info!("resized queue to {clamped} records");
    Ok(())
}

fn ticker(period: Duration) -> Interval {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Turn every delivery of `kind` into a message on `tx`.
fn forward_signal(kind: SignalKind, tx: mpsc::Sender<()>) -> Result<()> {
    let mut sig = signal(kind)?;
    tokio::spawn(async move {
        while sig.recv().await.is_some() {
            log::trace!("{kind:?} received");
            // A report is already pending if the channel is full.
            if let Err(mpsc::error::TrySendError::Closed(())) = tx.try_send(()) {
                break;
            }
        }
    });
    Ok(())
}

async fn shutdown_signal(mut sig_int: Signal, mut sig_term: Signal, mut sig_hup: Signal) {
    tokio::select! {
        _ = sig_int.recv() => log::trace!("SIGINT received"),
        _ = sig_term.recv() => log::trace!("SIGTERM received"),
        _ = sig_hup.recv() => log::trace!("SIGHUP received"),
    }
    log::info!("Terminating bsmtraced...");
}
