use audit_pipe::{AuditPipe, QueueCapacity};

use crate::{
    MonitorError,
    baseline::{LossBaseline, LossEvent},
};

/// What a queue growth attempt ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resize {
    Grown { from: u32, to: u32 },
    /// The queue is already as long as the pipe allows.
    AtCeiling { max: u32 },
}

/// Result of a single [`BackpressureController::poll`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOutcome {
    pub truncated: Option<LossEvent>,
    pub dropped: Option<LossEvent>,
    /// Only attempted when records were dropped.
    pub resize: Option<Resize>,
}

impl PollOutcome {
    /// No loss since the previous poll.
    pub fn is_quiet(&self) -> bool {
        self.truncated.is_none() && self.dropped.is_none()
    }
}

/// Grows the audit pipe queue when the kernel starts dropping records.
///
/// Every poll compares the pipe counters with the [`LossBaseline`] left by the
/// previous one. Truncated records are only logged: a longer queue doesn't
/// help with records that are too big. Dropped records mean the reader can't
/// keep up, so the queue limit is doubled, up to the maximum the pipe allows.
/// Doubling reaches any ceiling in a logarithmic number of ioctls.
///
/// One controller tracks one pipe. The caller owns the pipe and the polling
/// cadence.
#[derive(Debug, Default)]
pub struct BackpressureController {
    baseline: LossBaseline,
}

impl BackpressureController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_baseline(baseline: LossBaseline) -> Self {
        Self { baseline }
    }

    pub fn baseline(&self) -> LossBaseline {
        self.baseline
    }

    /// Check the pipe for new loss and react to it.
    ///
    /// A failed statistics query leaves the baseline untouched. A failure
    /// while resizing happens after the drop baseline moved forward, so the
    /// same loss isn't reported twice.
    pub fn poll<P: AuditPipe + ?Sized>(
        &mut self,
        pipe: &mut P,
    ) -> Result<PollOutcome, MonitorError> {
        let statistics = pipe.query_statistics()?;
        let mut outcome = PollOutcome::default();

        // Truncated records are not handled, but we want to know about them.
        if let Some(event) = self.baseline.record_truncates(statistics.truncates) {
            log::warn!("{event}");
            outcome.truncated = Some(event);
        }

        let Some(event) = self.baseline.record_drops(statistics.drops) else {
            return Ok(outcome);
        };
        log::warn!("{event}");
        outcome.dropped = Some(event);

        outcome.resize = Some(grow_queue(pipe)?);
        Ok(outcome)
    }
}

/// Next queue limit after a loss: twice the current one, capped at the
/// maximum. An empty queue grows to a single record.
pub fn next_capacity(capacity: QueueCapacity) -> u32 {
    capacity.current.saturating_mul(2).max(1).min(capacity.max)
}

fn grow_queue<P: AuditPipe + ?Sized>(pipe: &mut P) -> Result<Resize, MonitorError> {
    let capacity = pipe.query_queue_capacity()?;
    if capacity.current > capacity.max {
        return Err(MonitorError::CapacityInvariant {
            current: capacity.current,
            max: capacity.max,
        });
    }

    // Nothing more to log, the drop warning is already out.
    if capacity.at_ceiling() {
        return Ok(Resize::AtCeiling { max: capacity.max });
    }

    let new_current = next_capacity(capacity);
    pipe.set_queue_capacity(new_current)?;
    log::info!("resized queue to {new_current} records");

    Ok(Resize::Grown {
        from: capacity.current,
        to: new_current,
    })
}
