use std::io;
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicI32, Ordering};

use nix::sys::signal::{self, SigHandler, Signal};

use crate::error::{IoEngineError, IoResult};

/// Written by the (async-signal-safe) OS handler, read by whoever owns
/// `read_fd`. A process has exactly one set of signal dispositions, so
/// this has to be a static regardless of how the rest of the engine models
/// ownership; every other part of signal handling — the pipe, the
/// registration call, the read side — lives on an explicit `SignalSelfPipe`
/// owned by `TcpServer`, per the redesign away from the original's
/// singleton `SignalEvent`.
static PIPE_WRITE_FD: AtomicI32 = AtomicI32::new(-1);

extern "C" fn deliver(sig: libc::c_int) {
    let fd = PIPE_WRITE_FD.load(Ordering::Relaxed);
    if fd >= 0 {
        let byte = sig as u8;
        unsafe {
            libc::write(fd, &byte as *const u8 as *const libc::c_void, 1);
        }
    }
}

/// A self-pipe fed by a process-wide OS signal handler.
///
/// `register` installs the handler for one signal number; every
/// registered signal shares the same pipe, so a burst of distinct signals
/// is serialized through it one byte at a time, each byte carrying the
/// signal number that produced it.
pub(crate) struct SignalSelfPipe {
    pub(crate) read_fd: RawFd,
    write_fd: RawFd,
}

impl SignalSelfPipe {
    pub(crate) fn new() -> IoResult<Self> {
        let mut fds = [0i32; 2];
        let ret = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK | libc::O_CLOEXEC) };
        if ret != 0 {
            return Err(IoEngineError::Internal(io::Error::last_os_error()));
        }
        PIPE_WRITE_FD.store(fds[1], Ordering::Relaxed);
        Ok(Self {
            read_fd: fds[0],
            write_fd: fds[1],
        })
    }

    pub(crate) fn register(&self, sig: i32) -> IoResult<()> {
        let signal = Signal::try_from(sig)
            .map_err(|_| IoEngineError::Internal(io::Error::from(io::ErrorKind::InvalidInput)))?;
        unsafe { signal::signal(signal, SigHandler::Handler(deliver)) }
            .map_err(|errno| IoEngineError::Internal(io::Error::from_raw_os_error(errno as i32)))?;
        Ok(())
    }
}

impl Drop for SignalSelfPipe {
    fn drop(&mut self) {
        PIPE_WRITE_FD.store(-1, Ordering::Relaxed);
        unsafe {
            libc::close(self.read_fd);
            libc::close(self.write_fd);
        }
    }
}
