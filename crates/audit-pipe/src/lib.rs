//! Query interface over the kernel audit pipe (`/dev/auditpipe`).
//!
//! The audit pipe is a bounded in-kernel queue of BSM audit records. Besides
//! the record stream itself it exposes a handful of control operations: three
//! cumulative delivery counters and the queue length limit. This crate wraps
//! those operations behind the [`AuditPipe`] trait so that the monitoring
//! logic can be exercised without a kernel:
//!
//! - [`AuditPipeDevice`] talks to a real pipe through ioctls;
//! - `MockAuditPipe` (feature `test-utils`) is a scripted in-memory pipe.
//!
//! No interpretation happens here: every failure is reported as a
//! [`ChannelQueryError`] and it's up to the caller to decide what to do.

use std::{fmt, io, path::PathBuf};

use thiserror::Error;

mod capabilities;
mod device;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use capabilities::PipeCapabilities;
pub use device::AuditPipeDevice;
pub use nix::errno::Errno;

/// Cumulative counters reported by the kernel since the pipe was opened.
///
/// Every field is monotonically non-decreasing across successive queries on
/// the same descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipeStatistics {
    /// Records read by userspace.
    pub reads: u64,
    /// Records dropped because the queue was full.
    pub drops: u64,
    /// Records truncated because they didn't fit the read buffer.
    pub truncates: u64,
}

/// Current and maximum queue length of the pipe, in records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCapacity {
    pub current: u32,
    pub max: u32,
}

impl QueueCapacity {
    pub fn at_ceiling(&self) -> bool {
        self.current == self.max
    }
}

/// A single control operation supported by the audit pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipeOp {
    GetReads,
    GetDrops,
    GetTruncates,
    GetQueueLimit,
    GetQueueLimitMax,
    SetQueueLimit,
}

impl PipeOp {
    /// Name of the ioctl backing this operation.
    pub fn ioctl_name(&self) -> &'static str {
        match self {
            PipeOp::GetReads => "AUDITPIPE_GET_READS",
            PipeOp::GetDrops => "AUDITPIPE_GET_DROPS",
            PipeOp::GetTruncates => "AUDITPIPE_GET_TRUNCATES",
            PipeOp::GetQueueLimit => "AUDITPIPE_GET_QLIMIT",
            PipeOp::GetQueueLimitMax => "AUDITPIPE_GET_QLIMIT_MAX",
            PipeOp::SetQueueLimit => "AUDITPIPE_SET_QLIMIT",
        }
    }
}

impl fmt::Display for PipeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ioctl_name())
    }
}

#[derive(Debug, Error)]
pub enum ChannelQueryError {
    #[error("{op}: {source}")]
    Ioctl {
        op: PipeOp,
        #[source]
        source: Errno,
    },
    #[error("failed to open audit pipe {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ChannelQueryError {
    pub fn ioctl(op: PipeOp, source: Errno) -> Self {
        Self::Ioctl { op, source }
    }

    /// The operation which failed, if the error comes from a pipe query.
    pub fn op(&self) -> Option<PipeOp> {
        match self {
            Self::Ioctl { op, .. } => Some(*op),
            Self::Open { .. } => None,
        }
    }
}

/// Control operations of an open audit pipe.
///
/// Every primitive is a single synchronous request against the pipe and may
/// fail on its own. The provided methods group them the way the monitor
/// needs them: all counters or none, both limits or none.
pub trait AuditPipe {
    fn get_reads(&self) -> Result<u64, ChannelQueryError>;

    fn get_drops(&self) -> Result<u64, ChannelQueryError>;

    fn get_truncates(&self) -> Result<u64, ChannelQueryError>;

    fn get_queue_limit(&self) -> Result<u32, ChannelQueryError>;

    fn get_queue_limit_max(&self) -> Result<u32, ChannelQueryError>;

    fn set_queue_limit(&mut self, limit: u32) -> Result<(), ChannelQueryError>;

    /// Fetch the three delivery counters. No partial result is returned.
    fn query_statistics(&self) -> Result<PipeStatistics, ChannelQueryError> {
        Ok(PipeStatistics {
            reads: self.get_reads()?,
            drops: self.get_drops()?,
            truncates: self.get_truncates()?,
        })
    }

    /// Fetch the current and maximum queue limits together.
    fn query_queue_capacity(&self) -> Result<QueueCapacity, ChannelQueryError> {
        Ok(QueueCapacity {
            current: self.get_queue_limit()?,
            max: self.get_queue_limit_max()?,
        })
    }

    /// Apply a new queue limit.
    ///
    /// The value is not checked against the maximum: the caller must take it
    /// from a fresh [`QueueCapacity`].
    fn set_queue_capacity(&mut self, new_current: u32) -> Result<(), ChannelQueryError> {
        self.set_queue_limit(new_current)
    }
}
