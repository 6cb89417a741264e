use audit_pipe::ChannelQueryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// The pipe didn't answer a query. The monitor can't tell what state the
    /// pipe is in anymore.
    #[error(transparent)]
    Channel(#[from] ChannelQueryError),
    #[error("audit pipe queue limit {current} exceeds its maximum {max}")]
    CapacityInvariant { current: u32, max: u32 },
}
