//! `IoService`: one worker's completion loop, driving every connection it
//! owns through the read -> callback -> write -> callback -> (close)
//! pipeline described in [`crate::net::Connection`].

use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam::queue::SegQueue;
use slab::Slab;

use crate::config::ServerConfig;
use crate::error::{IoEngineError, IoResult};
use crate::io::{Completion, EventQueue, Waker};
use crate::net::{ConnId, Connection, ConnToken, PipelineStage};

pub type ReadCallback = Arc<dyn Fn(&mut Connection) + Send + Sync>;
pub type WriteCallback = Arc<dyn Fn(&mut Connection) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&mut Connection, &IoEngineError) + Send + Sync>;

/// One worker thread's state: its own `io_uring` ring, its slab of owned
/// connections, and the queues through which the main thread and other
/// workers hand it work without touching its state directly.
pub struct IoService {
    queue: EventQueue,
    conns: Slab<Connection>,
    token_index: HashMap<ConnToken, usize>,
    incoming: Arc<SegQueue<Connection>>,
    close_requests: Arc<SegQueue<ConnToken>>,
    closed_notify: Arc<SegQueue<ConnToken>>,
    pending_closes: VecDeque<ConnId>,
    read_cb: Option<ReadCallback>,
    write_cb: Option<WriteCallback>,
    error_cb: Option<ErrorCallback>,
    stop: Arc<AtomicBool>,
}

impl IoService {
    pub fn new(
        config: &ServerConfig,
        incoming: Arc<SegQueue<Connection>>,
        close_requests: Arc<SegQueue<ConnToken>>,
        closed_notify: Arc<SegQueue<ConnToken>>,
        stop: Arc<AtomicBool>,
    ) -> IoResult<Self> {
        let queue = EventQueue::new(config.ring_entries, config.buffer_chunk_len)?;
        Ok(Self {
            queue,
            conns: Slab::new(),
            token_index: HashMap::new(),
            incoming,
            close_requests,
            closed_notify,
            pending_closes: VecDeque::new(),
            read_cb: None,
            write_cb: None,
            error_cb: None,
            stop,
        })
    }

    /// A handle that interrupts this worker's blocked `wait()`, cheap
    /// enough to hand to [`crate::pool::WorkerPool`] before the worker's
    /// `IoService` is moved onto its own thread.
    pub fn waker(&self) -> Waker {
        self.queue.waker()
    }

    pub fn set_read_callback(&mut self, cb: ReadCallback) {
        self.read_cb = Some(cb);
    }

    pub fn set_write_callback(&mut self, cb: WriteCallback) {
        self.write_cb = Some(cb);
    }

    pub fn set_error_callback(&mut self, cb: ErrorCallback) {
        self.error_cb = Some(cb);
    }

    fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// The worker thread body: `while !stop { run_once() }`.
    pub fn run(&mut self) {
        tracing::debug!("worker started");
        while !self.should_stop() {
            self.run_once();
        }
        tracing::debug!("worker stopped");
    }

    /// Drains cross-thread handoffs, then consumes and dispatches exactly
    /// one completion from this worker's `EventQueue`.
    pub fn run_once(&mut self) {
        self.drain_incoming();
        self.drain_close_requests();
        self.retry_pending_closes();

        let (completion, result) = self.queue.wait();
        let Some(completion) = completion else {
            return;
        };

        match completion {
            Completion::Accept(_) => {
                tracing::warn!("worker event queue produced an unexpected accept completion");
            }
            Completion::Read { conn, transferred } => self.on_read(conn, transferred, result),
            Completion::Write { conn, transferred } => self.on_write(conn, transferred, result),
            Completion::Closed(conn) => self.on_closed(conn),
            Completion::Tick | Completion::Signal(_) => {
                tracing::warn!("worker event queue produced an unexpected tick/signal completion");
            }
        }
    }

    fn drain_incoming(&mut self) {
        while let Some(conn) = self.incoming.pop() {
            self.register_connection(conn);
        }
    }

    fn drain_close_requests(&mut self) {
        while let Some(token) = self.close_requests.pop() {
            let Some(&key) = self.token_index.get(&token) else {
                continue;
            };
            if let Some(conn) = self.conns.get_mut(key) {
                conn.close();
                self.begin_close(ConnId::from_slab_key(key));
            }
        }
    }

    fn retry_pending_closes(&mut self) {
        if self.pending_closes.is_empty() {
            return;
        }
        let mut still_pending = VecDeque::new();
        while let Some(id) = self.pending_closes.pop_front() {
            let key = id.slab_key();
            if !self.conns.contains(key) {
                continue;
            }
            let fd = self.conns[key].fd();
            match self.queue.submit_close(id, fd) {
                Ok(()) => self.conns[key].mark_close_submitted(),
                Err(IoEngineError::SubmitQueueFull) => still_pending.push_back(id),
                Err(e) => {
                    tracing::warn!(error = %e, "close submission failed, dropping connection record");
                    self.forget_connection(id);
                }
            }
        }
        self.pending_closes = still_pending;
    }

    /// Registers a freshly accepted (or handed-off) connection and submits
    /// its first read, per `register_connection`'s contract.
    pub fn register_connection(&mut self, conn: Connection) {
        let token = conn.token();
        let key = self.conns.insert(conn);
        self.token_index.insert(token, key);
        let id = ConnId::from_slab_key(key);
        if let Err(e) = self.queue.submit_io(id, &mut self.conns[key]) {
            tracing::warn!(error = %e, "failed to submit initial read for new connection");
            self.begin_close(id);
        }
    }

    fn begin_close(&mut self, id: ConnId) {
        let key = id.slab_key();
        if !self.conns.contains(key) || self.conns[key].close_submitted() {
            return;
        }
        let fd = self.conns[key].fd();
        match self.queue.submit_close(id, fd) {
            Ok(()) => self.conns[key].mark_close_submitted(),
            Err(IoEngineError::SubmitQueueFull) => {
                tracing::debug!("submission queue full, retrying close next loop iteration");
                self.conns[key].close();
                self.pending_closes.push_back(id);
            }
            Err(e) => {
                tracing::warn!(error = %e, "close submission failed, dropping connection record");
                self.forget_connection(id);
            }
        }
    }

    /// Used only when the kernel will never produce a matching `CLOSED`
    /// completion (submitting the close itself failed outright) — erases
    /// the slab entry directly rather than waiting for a completion that
    /// isn't coming.
    fn forget_connection(&mut self, id: ConnId) {
        if let Some(conn) = self.conns.try_remove(id.slab_key()) {
            self.token_index.remove(&conn.token());
            self.closed_notify.push(conn.token());
        }
    }

    fn on_read(&mut self, id: ConnId, transferred: usize, result: IoResult<()>) {
        let key = id.slab_key();
        if !self.conns.contains(key) {
            return;
        }

        if let Err(e) = result {
            self.fire_error(id, e);
            self.begin_close(id);
            return;
        }

        self.conns[key].input_mut().advance_writable(transferred);

        if transferred == 0 {
            self.fire_error(id, IoEngineError::PeerClosed);
            self.begin_close(id);
            return;
        }

        self.invoke_read_callback(id);
        if !self.conns.contains(key) {
            return;
        }
        if self.conns[key].is_closing() {
            self.begin_close(id);
            return;
        }

        self.conns[key].set_stage(PipelineStage::AwaitingWrite);
        if let Err(e) = self.queue.submit_io(id, &mut self.conns[key]) {
            self.fire_error(id, e);
            self.begin_close(id);
        }
    }

    fn on_write(&mut self, id: ConnId, transferred: usize, result: IoResult<()>) {
        let key = id.slab_key();
        if !self.conns.contains(key) {
            return;
        }

        if let Err(e) = result {
            self.fire_error(id, e);
            self.begin_close(id);
            return;
        }

        self.conns[key].output_mut().advance_readable(transferred);
        self.invoke_write_callback(id);
        if !self.conns.contains(key) {
            return;
        }
        if self.conns[key].is_closing() {
            self.begin_close(id);
        }
    }

    fn on_closed(&mut self, id: ConnId) {
        if let Some(conn) = self.conns.try_remove(id.slab_key()) {
            self.token_index.remove(&conn.token());
            self.closed_notify.push(conn.token());
        }
    }

    fn invoke_read_callback(&mut self, id: ConnId) {
        if let Some(cb) = self.read_cb.clone() {
            self.invoke_guarded(id, move |conn| cb(conn));
        }
    }

    fn invoke_write_callback(&mut self, id: ConnId) {
        if let Some(cb) = self.write_cb.clone() {
            self.invoke_guarded(id, move |conn| cb(conn));
        }
    }

    /// Runs `f` against the connection's state behind `catch_unwind`, per
    /// the port's panic-isolation policy (SPEC_FULL §10.2): one
    /// misbehaving callback closes its own connection instead of taking
    /// the worker thread down.
    fn invoke_guarded(&mut self, id: ConnId, f: impl FnOnce(&mut Connection)) {
        let key = id.slab_key();
        if !self.conns.contains(key) {
            return;
        }
        let conn = &mut self.conns[key];
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(conn)));
        if let Err(payload) = outcome {
            let message = panic_message(&payload);
            tracing::error!(panic = %message, "user callback panicked");
            self.fire_error(id, IoEngineError::WorkerPanicked(message));
            self.begin_close(id);
        }
    }

    fn fire_error(&mut self, id: ConnId, err: IoEngineError) {
        let key = id.slab_key();
        if !self.conns.contains(key) {
            return;
        }
        tracing::debug!(error = %err, "connection error");
        if let Some(cb) = self.error_cb.clone() {
            let conn = &mut self.conns[key];
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| cb(conn, &err)));
            if let Err(payload) = outcome {
                tracing::error!(panic = %panic_message(&payload), "error callback panicked");
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
