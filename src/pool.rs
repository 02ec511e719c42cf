//! Round-robin distribution of accepted connections across a fixed set of
//! [`IoService`] worker threads.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::queue::SegQueue;

use crate::config::ServerConfig;
use crate::error::IoResult;
use crate::io::Waker;
use crate::net::{ConnHandle, Connection, ConnToken};
use crate::worker::{ErrorCallback, IoService, ReadCallback, WriteCallback};

struct WorkerHandle {
    incoming: Arc<SegQueue<Connection>>,
    close_requests: Arc<SegQueue<ConnToken>>,
    waker: Waker,
    join: Option<JoinHandle<()>>,
}

/// Owns every worker thread and the queues used to hand connections (and
/// close requests) to them. `set_read_callback`/`set_write_callback`/
/// `set_error_callback` fan out to every worker so the callback the
/// embedder registers runs no matter which worker ends up owning a given
/// connection.
pub struct WorkerPool {
    config: ServerConfig,
    stop: Arc<AtomicBool>,
    next_worker: AtomicUsize,
    services: Vec<IoService>,
    handles: Vec<WorkerHandle>,
}

impl WorkerPool {
    /// Builds every worker's `IoService` up front (so its `Waker` and
    /// queues exist before any thread is spawned), but does not start the
    /// threads yet — that happens in [`WorkerPool::start`].
    pub fn new(config: ServerConfig, closed_notify: Arc<SegQueue<ConnToken>>) -> IoResult<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let mut services = Vec::with_capacity(config.thread_count);
        let mut handles = Vec::with_capacity(config.thread_count);

        for _ in 0..config.thread_count {
            let incoming = Arc::new(SegQueue::new());
            let close_requests = Arc::new(SegQueue::new());
            let service = IoService::new(
                &config,
                incoming.clone(),
                close_requests.clone(),
                closed_notify.clone(),
                stop.clone(),
            )?;
            let waker = service.waker();
            services.push(service);
            handles.push(WorkerHandle {
                incoming,
                close_requests,
                waker,
                join: None,
            });
        }

        Ok(Self {
            config,
            stop,
            next_worker: AtomicUsize::new(0),
            services,
            handles,
        })
    }

    pub fn set_read_callback(&mut self, cb: ReadCallback) {
        for service in &mut self.services {
            service.set_read_callback(cb.clone());
        }
    }

    pub fn set_write_callback(&mut self, cb: WriteCallback) {
        for service in &mut self.services {
            service.set_write_callback(cb.clone());
        }
    }

    pub fn set_error_callback(&mut self, cb: ErrorCallback) {
        for service in &mut self.services {
            service.set_error_callback(cb.clone());
        }
    }

    /// Spawns one OS thread per worker, each running `while !stop { .. }`.
    /// When `config.pin_worker_threads` is set, worker `i` is pinned to the
    /// `i`-th core reported by `core_affinity`, cycling if there are fewer
    /// cores than workers.
    pub fn start(&mut self) {
        let core_ids = if self.config.pin_worker_threads {
            core_affinity::get_core_ids()
        } else {
            None
        };

        for (idx, mut service) in std::mem::take(&mut self.services).into_iter().enumerate() {
            let core = core_ids
                .as_ref()
                .filter(|ids| !ids.is_empty())
                .map(|ids| ids[idx % ids.len()]);
            let join = std::thread::Builder::new()
                .name(format!("io-worker-{idx}"))
                .spawn(move || {
                    if let Some(core) = core {
                        core_affinity::set_for_current(core);
                    }
                    service.run();
                })
                .expect("failed to spawn worker thread");
            self.handles[idx].join = Some(join);
        }
    }

    /// Picks the next worker by round robin and hands it `conn`, returning
    /// a [`ConnHandle`] the caller can register with the idle timer or
    /// hold onto for an out-of-band close.
    pub fn put_new_connection(&self, conn: Connection) -> ConnHandle {
        let idx = self.next_worker.fetch_add(1, Ordering::Relaxed) % self.handles.len();
        let handle = &self.handles[idx];
        let token = conn.token();
        handle.incoming.push(conn);
        handle.waker.wake();
        ConnHandle::new(token, handle.close_requests.clone(), handle.waker)
    }

    /// Requests every worker to stop, wakes each one out of a blocked
    /// `wait()`, then joins all the threads. Idempotent: calling this
    /// twice (or when `start` was never called) is a no-op the second time.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        for handle in &self.handles {
            handle.waker.wake();
        }
        for handle in &mut self.handles {
            if let Some(join) = handle.join.take() {
                let _ = join.join();
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
