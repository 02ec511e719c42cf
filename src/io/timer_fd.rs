use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

use crate::error::{IoEngineError, IoResult};

/// A Linux `timerfd`, armed as a single-shot relative timeout and rearmed
/// by the caller after each completion (`EventQueue::submit_timer_tick`).
/// Mirrors the original's direct `<sys/timerfd.h>` use; kept as a thin
/// `libc` wrapper rather than reaching for `nix::sys::timerfd` so the
/// dependency surface for a one-syscall concern stays minimal.
pub(crate) struct TimerFd {
    fd: RawFd,
}

impl TimerFd {
    pub(crate) fn new() -> IoResult<Self> {
        let fd = unsafe { libc::timerfd_create(libc::CLOCK_MONOTONIC, libc::TFD_NONBLOCK | libc::TFD_CLOEXEC) };
        if fd < 0 {
            return Err(IoEngineError::Internal(io::Error::last_os_error()));
        }
        Ok(Self { fd })
    }

    pub(crate) fn fd(&self) -> RawFd {
        self.fd
    }

    /// Arms the timer to fire once, `period` from now. A zero period
    /// disarms it (matching `timerfd_settime`'s all-zero-means-disarm
    /// contract), which is how `TcpServer::run` implements `tick_period =
    /// 0` disabling the timer entirely.
    pub(crate) fn arm(&self, period: Duration) -> IoResult<()> {
        let spec = libc::itimerspec {
            it_interval: libc::timespec { tv_sec: 0, tv_nsec: 0 },
            it_value: libc::timespec {
                tv_sec: period.as_secs() as i64,
                tv_nsec: period.subsec_nanos() as i64,
            },
        };
        let ret = unsafe { libc::timerfd_settime(self.fd, 0, &spec, std::ptr::null_mut()) };
        if ret != 0 {
            return Err(IoEngineError::Internal(io::Error::last_os_error()));
        }
        Ok(())
    }
}

impl Drop for TimerFd {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}
