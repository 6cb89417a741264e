use std::io;

use audit_pipe::{AuditPipe, PipeStatistics};

use crate::{
    MonitorError,
    sink::{ConsoleSink, ReportSink, RunMode, sink_for},
};

/// Periodic snapshot of the pipe counters for the operator.
///
/// Read-only: the reporter never touches the loss baseline, so it can run at
/// any cadence next to the [`BackpressureController`](crate::BackpressureController).
///
/// A sink that fails is replaced by the fallback sink, stderr unless told
/// otherwise. Losing a report never stops the monitor.
pub struct StatisticsReporter {
    sink: Box<dyn ReportSink + Send>,
    fallback: Option<Box<dyn ReportSink + Send>>,
}

impl StatisticsReporter {
    pub fn new(sink: Box<dyn ReportSink + Send>) -> Self {
        Self::with_fallback(sink, Box::new(ConsoleSink::stderr()))
    }

    pub fn with_fallback(
        sink: Box<dyn ReportSink + Send>,
        fallback: Box<dyn ReportSink + Send>,
    ) -> Self {
        Self {
            sink,
            fallback: Some(fallback),
        }
    }

    pub fn for_mode(mode: RunMode) -> Self {
        Self::new(sink_for(mode))
    }

    /// Query the three counters and hand them to the sink.
    ///
    /// Only a failed pipe query is an error.
    pub fn report<P: AuditPipe + ?Sized>(
        &mut self,
        pipe: &P,
    ) -> Result<PipeStatistics, MonitorError> {
        let statistics = pipe.query_statistics()?;
        if let Err(err) = self.sink.report(&statistics) {
            self.sink_failed(err, &statistics);
        }
        Ok(statistics)
    }

    fn sink_failed(&mut self, err: io::Error, statistics: &PipeStatistics) {
        let Some(fallback) = self.fallback.take() else {
            log::warn!("Writing statistics report failed: {err}");
            return;
        };
        log::warn!("Writing statistics report failed: {err}, switching to fallback output");
        self.sink = fallback;
        if let Err(err) = self.sink.report(statistics) {
            log::warn!("Writing statistics report failed: {err}");
        }
    }
}

impl std::fmt::Debug for StatisticsReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatisticsReporter").finish_non_exhaustive()
    }
}

/// One-off report routed according to `mode`.
pub fn report_statistics<P: AuditPipe + ?Sized>(
    pipe: &P,
    mode: RunMode,
) -> Result<PipeStatistics, MonitorError> {
    StatisticsReporter::for_mode(mode).report(pipe)
}

#[cfg(test)]
mod tests {
    use std::{
        os::unix::net::UnixDatagram,
        sync::{Arc, Mutex},
    };

    use audit_pipe::{Errno, PipeOp, QueueCapacity, mock::MockAuditPipe};

    use crate::{
        sink::SyslogSink,
        syslog::{Facility, Syslog},
    };

    use super::*;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<PipeStatistics>>>);

    impl ReportSink for Recorder {
        fn report(&mut self, statistics: &PipeStatistics) -> io::Result<()> {
            self.0.lock().unwrap().push(*statistics);
            Ok(())
        }
    }

    struct Broken;

    impl ReportSink for Broken {
        fn report(&mut self, _: &PipeStatistics) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    fn pipe() -> MockAuditPipe {
        let mut pipe = MockAuditPipe::new(QueueCapacity {
            current: 100,
            max: 1000,
        });
        pipe.statistics = PipeStatistics {
            reads: 40,
            drops: 3,
            truncates: 1,
        };
        pipe
    }

    #[test]
    fn reports_current_counters() {
        let recorder = Recorder::default();
        let mut reporter = StatisticsReporter::new(Box::new(recorder.clone()));
        let pipe = pipe();

        let statistics = reporter.report(&pipe).unwrap();

        assert_eq!(statistics, pipe.statistics);
        assert_eq!(*recorder.0.lock().unwrap(), vec![pipe.statistics]);
        assert!(pipe.set_calls.is_empty());
    }

    #[test]
    fn query_failure_reports_nothing() {
        let recorder = Recorder::default();
        let mut reporter = StatisticsReporter::new(Box::new(recorder.clone()));
        let mut pipe = pipe();
        pipe.fail(PipeOp::GetDrops, Errno::EBADF);

        let err = reporter.report(&pipe).unwrap_err();

        assert!(matches!(err, MonitorError::Channel(_)));
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[test]
    fn dead_sink_falls_back() {
        let fallback = Recorder::default();
        let mut reporter =
            StatisticsReporter::with_fallback(Box::new(Broken), Box::new(fallback.clone()));
        let pipe = pipe();

        assert_eq!(reporter.report(&pipe).unwrap(), pipe.statistics);
        assert_eq!(reporter.report(&pipe).unwrap(), pipe.statistics);

        assert_eq!(
            *fallback.0.lock().unwrap(),
            vec![pipe.statistics, pipe.statistics]
        );
    }

    #[test]
    fn closed_syslog_socket_falls_back() {
        let (tx, rx) = UnixDatagram::pair().unwrap();
        drop(rx);
        let syslog = SyslogSink::new(Syslog::from_socket(tx, Facility::Auth));
        let fallback = Recorder::default();
        let mut reporter =
            StatisticsReporter::with_fallback(Box::new(syslog), Box::new(fallback.clone()));

        let statistics = reporter.report(&pipe()).unwrap();

        assert_eq!(*fallback.0.lock().unwrap(), vec![statistics]);
    }

    #[test]
    fn broken_fallback_is_not_an_error() {
        let mut reporter = StatisticsReporter::with_fallback(Box::new(Broken), Box::new(Broken));
        let pipe = pipe();
        assert_eq!(reporter.report(&pipe).unwrap(), pipe.statistics);
        assert_eq!(reporter.report(&pipe).unwrap(), pipe.statistics);
    }

    #[test]
    fn one_off_foreground_report() {
        let pipe = pipe();
        assert_eq!(
            report_statistics(&pipe, RunMode::Foreground).unwrap(),
            pipe.statistics
        );
        assert!(pipe.set_calls.is_empty());
    }

    #[test]
    fn one_off_report_needs_the_counters() {
        let mut pipe = pipe();
        pipe.fail(PipeOp::GetTruncates, Errno::ENOTTY);
        let err = report_statistics(&pipe, RunMode::Foreground).unwrap_err();
        assert!(matches!(err, MonitorError::Channel(_)));
    }
}
