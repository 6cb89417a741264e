//! Loss monitoring for the kernel audit pipe.
//!
//! When the reader of an audit pipe can't keep up, the kernel silently drops
//! records once the pipe queue is full, and truncates records which don't fit
//! the reader buffer. This crate watches the pipe counters and reacts:
//!
//! - the [`BackpressureController`] compares the counters with the previous
//!   poll, logs new loss and doubles the queue limit when records are dropped;
//! - the [`StatisticsReporter`] periodically hands a snapshot of the counters
//!   to the operator, on the console or through syslog depending on the
//!   [`RunMode`].
//!
//! Both are synchronous and driven by the caller, which owns the pipe and
//! decides the polling cadence. Failed pipe queries are returned as
//! [`MonitorError`] and whether they terminate the process is up to the
//! caller. A failing report sink only produces a warning.
//!
//! ```no_run
//! use audit_pipe::AuditPipeDevice;
//! use pipe_monitor::{PipeMonitor, RunMode};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut pipe = AuditPipeDevice::open(AuditPipeDevice::DEFAULT_PATH)?;
//! let mut monitor = PipeMonitor::for_pipe(&pipe, RunMode::Foreground);
//! loop {
//!     monitor.check_loss(&mut pipe)?;
//!     std::thread::sleep(std::time::Duration::from_secs(1));
//! }
//! # }
//! ```

use audit_pipe::{AuditPipe, PipeCapabilities, PipeStatistics};

mod baseline;
mod controller;
mod error;
mod reporter;
pub mod sink;
pub mod syslog;

pub use baseline::{LossBaseline, LossEvent, LossKind};
pub use controller::{BackpressureController, PollOutcome, Resize, next_capacity};
pub use error::MonitorError;
pub use reporter::{StatisticsReporter, report_statistics};
pub use sink::{ReportSink, RunMode};

/// Controller and reporter for one pipe, built from what the pipe supports.
///
/// A pipe without loss counters or queue limit controls gets no controller;
/// a pipe without the three counters gets no reporter. The missing part
/// turns into a no-op.
#[derive(Debug)]
pub struct PipeMonitor {
    capabilities: PipeCapabilities,
    controller: Option<BackpressureController>,
    reporter: Option<StatisticsReporter>,
}

impl PipeMonitor {
    pub fn new(capabilities: PipeCapabilities, sink: Box<dyn ReportSink + Send>) -> Self {
        let controller = capabilities
            .backpressure()
            .then(BackpressureController::new);
        let reporter = capabilities
            .statistics()
            .then(|| StatisticsReporter::new(sink));

        if controller.is_none() {
            log::warn!("Audit pipe doesn't expose loss counters and queue limits, queue growth disabled");
        }
        if reporter.is_none() {
            log::warn!("Audit pipe doesn't expose delivery counters, statistics reports disabled");
        }

        Self {
            capabilities,
            controller,
            reporter,
        }
    }

    /// Probe the pipe and route reports according to `mode`.
    pub fn for_pipe<P: AuditPipe + ?Sized>(pipe: &P, mode: RunMode) -> Self {
        let capabilities = PipeCapabilities::probe(pipe);
        Self::new(capabilities, sink::sink_for(mode))
    }

    pub fn capabilities(&self) -> PipeCapabilities {
        self.capabilities
    }

    /// Run one loss check. `None` when queue growth is disabled.
    pub fn check_loss<P: AuditPipe + ?Sized>(
        &mut self,
        pipe: &mut P,
    ) -> Result<Option<PollOutcome>, MonitorError> {
        self.controller
            .as_mut()
            .map(|controller| controller.poll(pipe))
            .transpose()
    }

    /// Report the counters. `None` when reports are disabled.
    pub fn report<P: AuditPipe + ?Sized>(
        &mut self,
        pipe: &P,
    ) -> Result<Option<PipeStatistics>, MonitorError> {
        self.reporter
            .as_mut()
            .map(|reporter| reporter.report(pipe))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use audit_pipe::{Errno, PipeOp, QueueCapacity, mock::MockAuditPipe};

    use super::*;
    use crate::sink::ConsoleSink;

    fn pipe() -> MockAuditPipe {
        MockAuditPipe::new(QueueCapacity {
            current: 64,
            max: 512,
        })
        .with_statistics(2, 0)
    }

    fn monitor(pipe: &MockAuditPipe) -> PipeMonitor {
        PipeMonitor::new(
            PipeCapabilities::probe(pipe),
            Box::new(ConsoleSink::new(std::io::sink())),
        )
    }

    #[test]
    fn fully_capable_pipe() {
        let mut pipe = pipe();
        let mut monitor = monitor(&pipe);

        let outcome = monitor.check_loss(&mut pipe).unwrap().unwrap();
        assert_eq!(outcome.resize, Some(Resize::Grown { from: 64, to: 128 }));
        assert_eq!(monitor.report(&pipe).unwrap(), Some(pipe.statistics));
    }

    #[test]
    fn no_queue_limits_disables_growth_only() {
        let mut pipe = pipe();
        pipe.fail(PipeOp::GetQueueLimit, Errno::ENOTTY);
        let mut monitor = monitor(&pipe);

        assert_eq!(monitor.check_loss(&mut pipe).unwrap(), None);
        assert!(pipe.set_calls.is_empty());
        assert_eq!(monitor.report(&pipe).unwrap(), Some(pipe.statistics));
    }

    #[test]
    fn no_counters_disables_everything() {
        let mut pipe = pipe();
        pipe.fail(PipeOp::GetDrops, Errno::ENOTTY);
        let mut monitor = monitor(&pipe);

        assert_eq!(monitor.check_loss(&mut pipe).unwrap(), None);
        assert_eq!(monitor.report(&pipe).unwrap(), None);
    }
}
