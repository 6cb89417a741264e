use std::{
    fs::{File, OpenOptions},
    os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd},
    path::{Path, PathBuf},
};

use nix::libc::{c_int, c_uint};

use crate::{AuditPipe, ChannelQueryError, PipeOp};

/// ioctl requests understood by the audit pipe driver (`audit_ioctl.h`).
mod ioctl {
    use nix::libc::c_uint;
    use nix::{ioctl_read, ioctl_write_ptr};

    const AUDITPIPE_IOBASE: u8 = b'A';

    ioctl_read!(get_qlimit, AUDITPIPE_IOBASE, 2, c_uint);
    ioctl_write_ptr!(set_qlimit, AUDITPIPE_IOBASE, 3, c_uint);
    ioctl_read!(get_qlimit_max, AUDITPIPE_IOBASE, 5, c_uint);
    ioctl_read!(get_reads, AUDITPIPE_IOBASE, 101, u64);
    ioctl_read!(get_drops, AUDITPIPE_IOBASE, 102, u64);
    ioctl_read!(get_truncates, AUDITPIPE_IOBASE, 103, u64);
}

type ReadRequest<T> = unsafe fn(c_int, *mut T) -> nix::Result<c_int>;

/// An opened audit pipe device.
///
/// Every opened descriptor gets its own queue and its own set of counters
/// from the kernel, so statistics start at zero on open.
#[derive(Debug)]
pub struct AuditPipeDevice {
    file: File,
    path: PathBuf,
}

impl AuditPipeDevice {
    pub const DEFAULT_PATH: &'static str = "/dev/auditpipe";

    /// Open the pipe read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ChannelQueryError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .open(&path)
            .map_err(|source| ChannelQueryError::Open {
                path: path.clone(),
                source,
            })?;

        log::debug!("Opened audit pipe {}", path.display());

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Underlying file, for the code consuming the record stream.
    pub fn file(&self) -> &File {
        &self.file
    }

    fn read<T: Default>(&self, op: PipeOp, request: ReadRequest<T>) -> Result<T, ChannelQueryError> {
        let mut value = T::default();
        // SAFETY: the descriptor is owned by `self.file` and stays open for
        // the whole call; `value` is a valid out pointer of the type the
        // request expects.
        unsafe { request(self.file.as_raw_fd(), &mut value) }
            .map_err(|errno| ChannelQueryError::ioctl(op, errno))?;
        Ok(value)
    }
}

impl AuditPipe for AuditPipeDevice {
    fn get_reads(&self) -> Result<u64, ChannelQueryError> {
        self.read(PipeOp::GetReads, ioctl::get_reads)
    }

    fn get_drops(&self) -> Result<u64, ChannelQueryError> {
        self.read(PipeOp::GetDrops, ioctl::get_drops)
    }

    fn get_truncates(&self) -> Result<u64, ChannelQueryError> {
        self.read(PipeOp::GetTruncates, ioctl::get_truncates)
    }

    fn get_queue_limit(&self) -> Result<u32, ChannelQueryError> {
        self.read::<c_uint>(PipeOp::GetQueueLimit, ioctl::get_qlimit)
    }

    fn get_queue_limit_max(&self) -> Result<u32, ChannelQueryError> {
        self.read::<c_uint>(PipeOp::GetQueueLimitMax, ioctl::get_qlimit_max)
    }

    fn set_queue_limit(&mut self, limit: u32) -> Result<(), ChannelQueryError> {
        let limit: c_uint = limit;
        // SAFETY: see `read`; the driver only reads through the pointer.
        unsafe { ioctl::set_qlimit(self.file.as_raw_fd(), &limit) }
            .map_err(|errno| ChannelQueryError::ioctl(PipeOp::SetQueueLimit, errno))?;
        Ok(())
    }
}

impl AsFd for AuditPipeDevice {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl AsRawFd for AuditPipeDevice {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}
