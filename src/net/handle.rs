use std::sync::Arc;

use crossbeam::queue::SegQueue;

use super::connection::ConnToken;
use crate::io::Waker;

/// A cross-thread reference to a connection, independent of whichever
/// worker owns its slab slot.
///
/// Handed to the [`crate::timer::Timer`] on registration and returned to
/// the embedder from `put_new_connection`, so a timeout callback (running
/// on the main thread) or any other external caller can request a close
/// without touching the worker's own `ConnId`-keyed state directly.
#[derive(Clone)]
pub struct ConnHandle {
    token: ConnToken,
    close_requests: Arc<SegQueue<ConnToken>>,
    waker: Waker,
}

impl ConnHandle {
    pub(crate) fn new(token: ConnToken, close_requests: Arc<SegQueue<ConnToken>>, waker: Waker) -> Self {
        Self { token, close_requests, waker }
    }

    pub fn token(&self) -> ConnToken {
        self.token
    }

    /// Requests that the owning worker close this connection. Safe to call
    /// from any thread, including the one that owns the connection.
    pub fn close(&self) {
        self.close_requests.push(self.token);
        self.waker.wake();
    }
}
