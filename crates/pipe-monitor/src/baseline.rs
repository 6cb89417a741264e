use std::fmt;

/// Which kind of record loss was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossKind {
    /// The queue was full and records were thrown away.
    Dropped,
    /// Records were too big for the reader and got cut.
    Truncated,
}

/// Loss observed by a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LossEvent {
    pub kind: LossKind,
    /// Cumulative counter reported by the pipe.
    pub total: u64,
    /// Growth since the previous baseline.
    pub delta: u64,
}

impl fmt::Display for LossEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LossKind::Dropped => write!(
                f,
                "audit pipe dropped a total of {} records, delta {} since last interval",
                self.total, self.delta
            ),
            LossKind::Truncated => write!(
                f,
                "audit pipe truncated {} records, delta {} since last interval",
                self.total, self.delta
            ),
        }
    }
}

/// Drop and truncate counters seen by the previous poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LossBaseline {
    pub last_drops: u64,
    pub last_truncates: u64,
}

impl LossBaseline {
    pub fn new(last_drops: u64, last_truncates: u64) -> Self {
        Self {
            last_drops,
            last_truncates,
        }
    }

    /// Move the drop baseline forward, returning the loss if there was any.
    pub fn record_drops(&mut self, drops: u64) -> Option<LossEvent> {
        advance(&mut self.last_drops, drops, LossKind::Dropped)
    }

    /// Move the truncate baseline forward, returning the loss if there was any.
    pub fn record_truncates(&mut self, truncates: u64) -> Option<LossEvent> {
        advance(&mut self.last_truncates, truncates, LossKind::Truncated)
    }
}

fn advance(last: &mut u64, current: u64, kind: LossKind) -> Option<LossEvent> {
    let Some(delta) = current.checked_sub(*last) else {
        // The kernel counters only grow for the lifetime of a descriptor.
        // Keep the baseline where it is rather than move it backwards.
        log::debug!("{kind:?} counter went backwards: {current} < {last}");
        return None;
    };

    if delta == 0 {
        return None;
    }

    *last = current;
    Some(LossEvent {
        kind,
        total: current,
        delta,
    })
}
