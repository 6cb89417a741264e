use crate::{AuditPipe, PipeOp};

/// Control operations answered by an open audit pipe.
///
/// Older audit pipe drivers don't expose the loss counters or the queue
/// limit controls. Instead of compiling support in or out, the monitor probes
/// the pipe once and only builds the parts it can drive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipeCapabilities {
    pub reads: bool,
    pub drops: bool,
    pub truncates: bool,
    pub queue_limits: bool,
}

impl PipeCapabilities {
    /// Probe the pipe with read-only queries.
    ///
    /// Setting the limit can't be probed without side effects, so it's
    /// assumed to be available whenever both limits can be read.
    pub fn probe<P: AuditPipe + ?Sized>(pipe: &P) -> Self {
        let check = |op: PipeOp, res: Result<(), crate::ChannelQueryError>| match res {
            Ok(()) => true,
            Err(err) => {
                log::warn!("Audit pipe doesn't support {op}: {err}");
                false
            }
        };

        Self {
            reads: check(PipeOp::GetReads, pipe.get_reads().map(drop)),
            drops: check(PipeOp::GetDrops, pipe.get_drops().map(drop)),
            truncates: check(PipeOp::GetTruncates, pipe.get_truncates().map(drop)),
            queue_limits: check(PipeOp::GetQueueLimit, pipe.get_queue_limit().map(drop))
                && check(
                    PipeOp::GetQueueLimitMax,
                    pipe.get_queue_limit_max().map(drop),
                ),
        }
    }

    /// All three delivery counters are available.
    pub fn statistics(&self) -> bool {
        self.reads && self.drops && self.truncates
    }

    /// Loss can be detected and the queue can be resized.
    pub fn backpressure(&self) -> bool {
        self.statistics() && self.queue_limits
    }

    pub fn full() -> Self {
        Self {
            reads: true,
            drops: true,
            truncates: true,
            queue_limits: true,
        }
    }
}
