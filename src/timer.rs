//! The idle-timeout wheel: an ordered set of `(deadline, connection)`
//! entries, ticked once per `tick_period` by [`crate::server::TcpServer`].

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::net::{ConnHandle, ConnToken};

static NEXT_SEQ: AtomicU64 = AtomicU64::new(0);

/// One pending deadline. `seq` breaks ties between entries sharing a
/// deadline (two connections can register in the same tick) so the set
/// never silently collapses them.
struct TimerEntry {
    deadline: Instant,
    seq: u64,
    handle: ConnHandle,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.deadline, self.seq).cmp(&(other.deadline, other.seq))
    }
}

pub type TimeoutCallback = Box<dyn FnMut(ConnHandle) + Send>;

/// Ordered set of pending idle-timeout deadlines, draining everything due
/// on each `tick()`.
pub struct Timer {
    entries: BTreeSet<TimerEntry>,
    callback: Option<TimeoutCallback>,
    default_period: Duration,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            entries: BTreeSet::new(),
            callback: None,
            default_period: Duration::ZERO,
        }
    }

    /// Stores the timeout callback and the default per-connection idle
    /// period newly registered connections are given.
    pub fn register_timeout_callback(&mut self, cb: TimeoutCallback, period: Duration) {
        self.callback = Some(cb);
        self.default_period = period;
    }

    /// Inserts `(now + default_period, handle)`. A no-op when no timeout
    /// callback has been registered, matching an idle timeout that was
    /// never opted into.
    pub fn add(&mut self, handle: ConnHandle) {
        if self.callback.is_none() {
            return;
        }
        let seq = NEXT_SEQ.fetch_add(1, Ordering::Relaxed);
        let deadline = Instant::now() + self.default_period;
        self.entries.insert(TimerEntry { deadline, seq, handle });
    }

    /// Removes every entry for `token`. A connection only ever has one
    /// outstanding entry, but this scans defensively rather than assuming it.
    pub fn remove(&mut self, token: ConnToken) {
        self.entries.retain(|entry| entry.handle.token() != token);
    }

    /// Drains every entry whose deadline has passed, invoking the timeout
    /// callback with each one's handle.
    pub fn tick(&mut self) {
        let now = Instant::now();
        while matches!(self.entries.iter().next(), Some(entry) if entry.deadline <= now) {
            let entry = self.entries.pop_first().expect("checked non-empty above");
            if let Some(cb) = &mut self.callback {
                cb(entry.handle);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Waker;
    use crate::net::Connection;
    use crossbeam::queue::SegQueue;
    use std::sync::Arc;
    use std::thread::sleep;

    // `-1` is never dereferenced: these tests never call `ConnHandle::close`,
    // only `Timer::add`/`remove`/`tick`, none of which touch the waker.
    fn fake_handle() -> ConnHandle {
        let conn = Connection::from_accepted(-1, 16);
        let token = conn.token();
        std::mem::forget(conn);
        ConnHandle::new(token, Arc::new(SegQueue::new()), Waker::for_test(-1))
    }

    #[test]
    fn add_without_callback_is_a_noop() {
        let mut timer = Timer::new();
        timer.add(fake_handle());
        assert!(timer.is_empty());
    }

    #[test]
    fn tick_drains_expired_entries_in_deadline_order() {
        let fired = Arc::new(std::sync::Mutex::new(Vec::new()));
        let fired_cb = fired.clone();
        let mut timer = Timer::new();
        timer.register_timeout_callback(
            Box::new(move |handle| fired_cb.lock().unwrap().push(handle.token())),
            Duration::from_millis(5),
        );

        let first = fake_handle();
        let first_token = first.token();
        timer.add(first);
        sleep(Duration::from_millis(2));
        let second = fake_handle();
        let second_token = second.token();
        timer.add(second);

        sleep(Duration::from_millis(10));
        timer.tick();

        assert!(timer.is_empty());
        assert_eq!(*fired.lock().unwrap(), vec![first_token, second_token]);
    }

    #[test]
    fn remove_drops_pending_entry_before_it_fires() {
        let fired = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let fired_cb = fired.clone();
        let mut timer = Timer::new();
        timer.register_timeout_callback(
            Box::new(move |_| {
                fired_cb.fetch_add(1, Ordering::Relaxed);
            }),
            Duration::from_millis(5),
        );

        let handle = fake_handle();
        let token = handle.token();
        timer.add(handle);
        timer.remove(token);

        sleep(Duration::from_millis(10));
        timer.tick();

        assert_eq!(fired.load(Ordering::Relaxed), 0);
        assert!(timer.is_empty());
    }
}
