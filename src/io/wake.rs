use std::io;
use std::os::fd::RawFd;

use crate::error::{IoEngineError, IoResult};

/// A pipe used purely to interrupt a thread blocked in `EventQueue::wait`.
///
/// One write of a single byte is all that's needed: the corresponding read
/// on `read_fd`, armed as a `Submission::WorkerWake`, completes and `wait`
/// returns `(None, Ok(()))` so the caller's loop can re-check its stop
/// flag. Matches the self-pipe idiom the original uses for OS signal
/// delivery, reused here for plain cross-thread wakeups.
pub(crate) struct WakePipe {
    pub(crate) read_fd: RawFd,
    write_fd: RawFd,
}

impl WakePipe {
    pub(crate) fn new() -> IoResult<Self> {
        let mut fds = [0i32; 2];
        let ret = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK | libc::O_CLOEXEC) };
        if ret != 0 {
            return Err(IoEngineError::Internal(io::Error::last_os_error()));
        }
        Ok(Self {
            read_fd: fds[0],
            write_fd: fds[1],
        })
    }

    pub(crate) fn waker(&self) -> Waker {
        Waker { write_fd: self.write_fd }
    }
}

impl Drop for WakePipe {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.read_fd);
            libc::close(self.write_fd);
        }
    }
}

/// A cheap, `Send + Sync` handle that can interrupt the owning
/// `EventQueue`'s `wait()` from any thread.
#[derive(Clone, Copy)]
pub struct Waker {
    write_fd: RawFd,
}

impl Waker {
    #[cfg(test)]
    pub(crate) fn for_test(write_fd: RawFd) -> Self {
        Waker { write_fd }
    }

    pub fn wake(&self) {
        let byte = 1u8;
        unsafe {
            libc::write(self.write_fd, &byte as *const u8 as *const libc::c_void, 1);
        }
    }
}

unsafe impl Send for Waker {}
unsafe impl Sync for Waker {}
