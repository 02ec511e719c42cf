use std::io;
use std::os::fd::RawFd;
use std::ptr;
use std::time::Duration;

use io_uring::{opcode, types, IoUring};

use super::event::{Completion, Submission};
use super::signal::SignalSelfPipe;
use super::timer_fd::TimerFd;
use super::wake::{Waker, WakePipe};
use crate::error::{IoEngineError, IoResult};
use crate::net::{Acceptor, ConnId, Connection, PipelineStage};

/// A thin domain wrapper over one `io_uring` submission/completion ring:
/// submit accept / read / write / close / timer-read / signal-pipe-read,
/// wait for one completion and classify it.
///
/// Every submission carries a boxed [`Submission`] as its `user_data`,
/// reclaimed the moment the matching completion is seen — the Rust
/// replacement for the original's opaque `Event*` threaded through
/// `io_uring_sqe::user_data`.
pub struct EventQueue {
    ring: IoUring,
    chunk_len: usize,
    wake: WakePipe,
    signal_pipe: Option<SignalSelfPipe>,
    timer: Option<TimerFd>,
    wake_scratch: Box<[u8; 1]>,
    signal_scratch: Box<[u8; 1]>,
    timer_scratch: Box<[u8; 8]>,
}

fn classify_err(res: i32) -> IoEngineError {
    let errno = -res;
    if errno == libc::ECONNRESET || errno == libc::ENOTCONN {
        IoEngineError::PeerClosed
    } else {
        IoEngineError::Internal(io::Error::from_raw_os_error(errno))
    }
}

impl EventQueue {
    pub fn new(ring_entries: u32, chunk_len: usize) -> IoResult<Self> {
        let ring = IoUring::new(ring_entries).map_err(IoEngineError::Internal)?;
        let wake = WakePipe::new()?;
        let mut queue = Self {
            ring,
            chunk_len,
            wake,
            signal_pipe: None,
            timer: None,
            wake_scratch: Box::new([0u8; 1]),
            signal_scratch: Box::new([0u8; 1]),
            timer_scratch: Box::new([0u8; 8]),
        };
        queue.arm_wake_read()?;
        Ok(queue)
    }

    /// A cheap, thread-safe handle that interrupts a blocked `wait()`.
    pub fn waker(&self) -> Waker {
        self.wake.waker()
    }

    fn push(&mut self, entry: io_uring::squeue::Entry) -> IoResult<()> {
        unsafe {
            self.ring
                .submission()
                .push(&entry)
                .map_err(|_| IoEngineError::SubmitQueueFull)?;
        }
        self.ring.submit().map_err(IoEngineError::Internal)?;
        Ok(())
    }

    fn submit_boxed(
        &mut self,
        sub: Box<Submission>,
        build: impl FnOnce(u64) -> io_uring::squeue::Entry,
    ) -> IoResult<()> {
        let data = sub.into_raw();
        let entry = build(data);
        match self.push(entry) {
            Ok(()) => Ok(()),
            Err(e) => {
                unsafe { drop(Submission::from_raw(data)) };
                Err(e)
            }
        }
    }

    fn arm_wake_read(&mut self) -> IoResult<()> {
        let read_fd = self.wake.read_fd;
        let ptr = self.wake_scratch.as_mut_ptr();
        self.submit_boxed(Box::new(Submission::WorkerWake), |data| {
            opcode::Read::new(types::Fd(read_fd), ptr, 1).build().user_data(data)
        })
    }

    pub fn submit_accept(&mut self, acceptor: &Acceptor) -> IoResult<()> {
        let fd = acceptor.fd();
        self.submit_boxed(Box::new(Submission::Accept), |data| {
            opcode::Accept::new(types::Fd(fd), ptr::null_mut(), ptr::null_mut())
                .build()
                .user_data(data)
        })
    }

    /// Submits a vectored read or write for `conn`, depending on its
    /// current [`PipelineStage`].
    pub fn submit_io(&mut self, id: ConnId, conn: &mut Connection) -> IoResult<()> {
        let fd = conn.fd();
        match conn.stage() {
            PipelineStage::AwaitingRead => {
                let vectors = conn.input_mut().materialize_writable_vectors();
                let iov_ptr = vectors.as_ptr();
                let iov_len = vectors.len() as u32;
                self.submit_boxed(Box::new(Submission::Read { conn: id, vectors }), |data| {
                    opcode::Readv::new(types::Fd(fd), iov_ptr, iov_len)
                        .build()
                        .user_data(data)
                })
            }
            PipelineStage::AwaitingWrite => {
                let vectors = conn.output().materialize_readable_vectors();
                let iov_ptr = vectors.as_ptr();
                let iov_len = vectors.len() as u32;
                self.submit_boxed(Box::new(Submission::Write { conn: id, vectors }), |data| {
                    opcode::Writev::new(types::Fd(fd), iov_ptr, iov_len)
                        .build()
                        .user_data(data)
                })
            }
        }
    }

    pub fn submit_close(&mut self, id: ConnId, fd: RawFd) -> IoResult<()> {
        self.submit_boxed(Box::new(Submission::Close { conn: id }), |data| {
            opcode::Close::new(types::Fd(fd)).build().user_data(data)
        })
    }

    /// Installs a handler for `sig` that feeds the shared self-pipe, and —
    /// the first time this is called — arms the pipe's read. Later calls
    /// just add another signal to the same pipe rather than double-arming
    /// the read, since at most one read on it is ever outstanding.
    pub fn submit_signal(&mut self, sig: i32) -> IoResult<()> {
        let needs_arm = self.signal_pipe.is_none();
        if needs_arm {
            self.signal_pipe = Some(SignalSelfPipe::new()?);
        }
        self.signal_pipe.as_ref().unwrap().register(sig)?;
        if needs_arm {
            let read_fd = self.signal_pipe.as_ref().unwrap().read_fd;
            let ptr = self.signal_scratch.as_mut_ptr();
            self.submit_boxed(Box::new(Submission::SignalRead), |data| {
                opcode::Read::new(types::Fd(read_fd), ptr, 1).build().user_data(data)
            })?;
        }
        Ok(())
    }

    /// Arms the monotonic single-shot timer to fire after `period` and
    /// submits a read on it. A zero period is a no-op, matching
    /// `tick_period = 0` disabling the timer.
    pub fn submit_timer_tick(&mut self, period: Duration) -> IoResult<()> {
        if period.is_zero() {
            return Ok(());
        }
        if self.timer.is_none() {
            self.timer = Some(TimerFd::new()?);
        }
        let timer = self.timer.as_ref().unwrap();
        timer.arm(period)?;
        let fd = timer.fd();
        let ptr = self.timer_scratch.as_mut_ptr();
        self.submit_boxed(Box::new(Submission::TimerTick), |data| {
            opcode::Read::new(types::Fd(fd), ptr, 8).build().user_data(data)
        })
    }

    /// Blocks until one completion is consumed, then classifies it.
    pub fn wait(&mut self) -> (Option<Completion>, IoResult<()>) {
        loop {
            let mut cq = self.ring.completion();
            cq.sync();
            let next = cq.next();
            drop(cq);

            let cqe = match next {
                Some(c) => c,
                None => {
                    if let Err(e) = self.ring.submit_and_wait(1) {
                        if e.kind() == io::ErrorKind::Interrupted {
                            continue;
                        }
                        return (None, Err(IoEngineError::Internal(e)));
                    }
                    let mut cq = self.ring.completion();
                    cq.sync();
                    match cq.next() {
                        Some(c) => c,
                        None => continue,
                    }
                }
            };

            let data = cqe.user_data();
            if data == 0 {
                return (None, Ok(()));
            }
            let res = cqe.result();
            let submission = unsafe { Submission::from_raw(data) };

            match *submission {
                Submission::Accept => {
                    if res < 0 {
                        return (None, Err(classify_err(res)));
                    }
                    let conn = Connection::from_accepted(res, self.chunk_len);
                    return (Some(Completion::Accept(conn)), Ok(()));
                }
                Submission::Read { conn, vectors } => {
                    drop(vectors);
                    if res < 0 {
                        return (
                            Some(Completion::Read { conn, transferred: 0 }),
                            Err(classify_err(res)),
                        );
                    }
                    return (
                        Some(Completion::Read { conn, transferred: res as usize }),
                        Ok(()),
                    );
                }
                Submission::Write { conn, vectors } => {
                    drop(vectors);
                    if res < 0 {
                        return (
                            Some(Completion::Write { conn, transferred: 0 }),
                            Err(classify_err(res)),
                        );
                    }
                    return (
                        Some(Completion::Write { conn, transferred: res as usize }),
                        Ok(()),
                    );
                }
                Submission::Close { conn } => {
                    return (Some(Completion::Closed(conn)), Ok(()));
                }
                Submission::WorkerWake => {
                    let _ = self.arm_wake_read();
                    return (None, Ok(()));
                }
                Submission::SignalRead => {
                    let sig = self.signal_scratch[0] as i32;
                    if let Some(pipe) = &self.signal_pipe {
                        let read_fd = pipe.read_fd;
                        let ptr = self.signal_scratch.as_mut_ptr();
                        let _ = self.submit_boxed(Box::new(Submission::SignalRead), |data| {
                            opcode::Read::new(types::Fd(read_fd), ptr, 1).build().user_data(data)
                        });
                    }
                    return (Some(Completion::Signal(sig)), Ok(()));
                }
                Submission::TimerTick => {
                    return (Some(Completion::Tick), Ok(()));
                }
            }
        }
    }
}
