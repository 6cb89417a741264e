//! In-memory audit pipe for tests.

use std::collections::HashMap;

use nix::errno::Errno;

use crate::{AuditPipe, ChannelQueryError, PipeOp, PipeStatistics, QueueCapacity};

/// Scripted [`AuditPipe`]: tests set the counters directly between polls and
/// inspect the queue limit requests made by the code under test.
#[derive(Debug, Clone, Default)]
pub struct MockAuditPipe {
    pub statistics: PipeStatistics,
    pub capacity: QueueCapacity,
    /// Every value passed to `set_queue_limit`, in order.
    pub set_calls: Vec<u32>,
    failures: HashMap<PipeOp, Errno>,
}

impl MockAuditPipe {
    pub fn new(capacity: QueueCapacity) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    pub fn with_statistics(mut self, drops: u64, truncates: u64) -> Self {
        self.set_loss(drops, truncates);
        self
    }

    /// Update the loss counters, as the kernel would after dropping or
    /// truncating records.
    pub fn set_loss(&mut self, drops: u64, truncates: u64) {
        self.statistics.drops = drops;
        self.statistics.truncates = truncates;
    }

    /// Make every further call of `op` fail with `errno`.
    pub fn fail(&mut self, op: PipeOp, errno: Errno) {
        self.failures.insert(op, errno);
    }

    pub fn recover(&mut self, op: PipeOp) {
        self.failures.remove(&op);
    }

    fn check(&self, op: PipeOp) -> Result<(), ChannelQueryError> {
        match self.failures.get(&op) {
            Some(errno) => Err(ChannelQueryError::ioctl(op, *errno)),
            None => Ok(()),
        }
    }
}

impl AuditPipe for MockAuditPipe {
    fn get_reads(&self) -> Result<u64, ChannelQueryError> {
        self.check(PipeOp::GetReads)?;
        Ok(self.statistics.reads)
    }

    fn get_drops(&self) -> Result<u64, ChannelQueryError> {
        self.check(PipeOp::GetDrops)?;
        Ok(self.statistics.drops)
    }

    fn get_truncates(&self) -> Result<u64, ChannelQueryError> {
        self.check(PipeOp::GetTruncates)?;
        Ok(self.statistics.truncates)
    }

    fn get_queue_limit(&self) -> Result<u32, ChannelQueryError> {
        self.check(PipeOp::GetQueueLimit)?;
        Ok(self.capacity.current)
    }

    fn get_queue_limit_max(&self) -> Result<u32, ChannelQueryError> {
        self.check(PipeOp::GetQueueLimitMax)?;
        Ok(self.capacity.max)
    }

    fn set_queue_limit(&mut self, limit: u32) -> Result<(), ChannelQueryError> {
        self.check(PipeOp::SetQueueLimit)?;
        self.set_calls.push(limit);
        self.capacity.current = limit;
        Ok(())
    }
}
