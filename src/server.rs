//! `TcpServer`: the main-thread dispatcher that owns the accept/timer/
//! signal `EventQueue`, the idle-timeout [`Timer`] and the [`WorkerPool`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::queue::SegQueue;

use crate::config::{ServerConfig, SIGNAL_TABLE_LEN};
use crate::error::{IoEngineError, IoResult};
use crate::io::{Completion, EventQueue, Waker};
use crate::net::{Acceptor, ConnToken};
use crate::pool::WorkerPool;
use crate::timer::{TimeoutCallback, Timer};
use crate::worker::{ErrorCallback, ReadCallback, WriteCallback};

pub type SignalCallback = Box<dyn FnMut(i32) + Send>;

/// A cheap, cloneable handle that requests orderly shutdown from any
/// thread, including from inside a registered signal or timeout callback.
#[derive(Clone)]
pub struct StopHandle {
    stop: Arc<AtomicBool>,
    waker: Waker,
}

impl StopHandle {
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
        self.waker.wake();
    }
}

/// Owns the `Acceptor`, the `Timer`, the `WorkerPool` and a main
/// `EventQueue` whose role is strictly accept demultiplexing, periodic
/// tick and signal delivery — never application I/O, which happens only
/// on worker threads.
pub struct TcpServer {
    acceptor: Acceptor,
    queue: EventQueue,
    timer: Timer,
    pool: WorkerPool,
    closed_notify: Arc<SegQueue<ConnToken>>,
    signal_table: Vec<Option<SignalCallback>>,
    stop: Arc<AtomicBool>,
}

impl TcpServer {
    pub fn new(config: ServerConfig) -> IoResult<Self> {
        let acceptor = Acceptor::bind(config.port, config.backlog)?;
        let queue = EventQueue::new(config.ring_entries, config.buffer_chunk_len)?;
        let closed_notify = Arc::new(SegQueue::new());
        let pool = WorkerPool::new(config.clone(), closed_notify.clone())?;
        Ok(Self {
            acceptor,
            queue,
            timer: Timer::new(),
            pool,
            closed_notify,
            signal_table: (0..SIGNAL_TABLE_LEN).map(|_| None).collect(),
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The port actually bound; useful when `config.port == 0` asked the
    /// kernel to pick one.
    pub fn local_port(&self) -> IoResult<u16> {
        self.acceptor.local_port()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle { stop: self.stop.clone(), waker: self.queue.waker() }
    }

    /// Requests orderly shutdown. Callable from any thread; idempotent.
    pub fn stop(&self) {
        self.stop_handle().stop();
    }

    pub fn set_read_callback(&mut self, cb: ReadCallback) {
        self.pool.set_read_callback(cb);
    }

    pub fn set_write_callback(&mut self, cb: WriteCallback) {
        self.pool.set_write_callback(cb);
    }

    pub fn set_error_callback(&mut self, cb: ErrorCallback) {
        self.pool.set_error_callback(cb);
    }

    /// Sets the per-connection idle timeout and its callback. A connection
    /// with no traffic for `idle_period` fires `cb` on the main thread,
    /// which typically calls `handle.close()`.
    pub fn set_timeout_callback(&mut self, cb: TimeoutCallback, idle_period: Duration) {
        self.timer.register_timeout_callback(cb, idle_period);
    }

    /// Registers a callback for OS signal `sig`, which must be in `[1, 32)`.
    /// Installs (or reuses) the shared signal self-pipe.
    pub fn set_signal_callback(&mut self, sig: i32, cb: SignalCallback) -> IoResult<()> {
        if sig <= 0 || sig as usize >= SIGNAL_TABLE_LEN {
            return Err(IoEngineError::Internal(std::io::Error::from(
                std::io::ErrorKind::InvalidInput,
            )));
        }
        self.signal_table[sig as usize] = Some(cb);
        self.queue.submit_signal(sig)
    }

    /// Starts the worker pool and blocks the caller running the main loop
    /// until `stop()` is called. `tick_period = Duration::ZERO` disables
    /// the idle timer entirely.
    pub fn run(&mut self, tick_period: Duration) -> IoResult<()> {
        self.pool.start();
        self.queue.submit_accept(&self.acceptor)?;
        self.queue.submit_timer_tick(tick_period)?;

        while !self.stop.load(Ordering::Relaxed) {
            self.drain_closed_notify();

            let (completion, result) = self.queue.wait();
            let Some(completion) = completion else {
                continue;
            };

            match completion {
                Completion::Accept(conn) => {
                    match result {
                        Ok(()) => {
                            let handle = self.pool.put_new_connection(conn);
                            self.timer.add(handle);
                        }
                        Err(e) => tracing::warn!(error = %e, "accept completion carried an error"),
                    }
                    if let Err(e) = self.queue.submit_accept(&self.acceptor) {
                        tracing::warn!(error = %e, "failed to rearm accept");
                    }
                }
                Completion::Tick => {
                    self.timer.tick();
                    if let Err(e) = self.queue.submit_timer_tick(tick_period) {
                        tracing::warn!(error = %e, "failed to rearm idle timer");
                    }
                }
                Completion::Signal(sig) => match result {
                    Ok(()) => {
                        if sig > 0 && (sig as usize) < self.signal_table.len() {
                            if let Some(cb) = &mut self.signal_table[sig as usize] {
                                cb(sig);
                            }
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "signal completion carried an error"),
                },
                Completion::Read { .. } | Completion::Write { .. } | Completion::Closed(_) => {
                    tracing::warn!("main event queue produced an unexpected worker-only completion");
                }
            }
        }

        self.pool.shutdown();
        self.drain_closed_notify();
        Ok(())
    }

    fn drain_closed_notify(&mut self) {
        while let Some(token) = self.closed_notify.pop() {
            self.timer.remove(token);
        }
    }
}
