use crate::buf::PinnedVectors;
use crate::net::{Connection, ConnId};

/// State carried through the kernel as a submission's `user_data`.
///
/// This is the Rust-side replacement for the original's opaque
/// `Connection*`/tag pair threaded through `io_uring_sqe::user_data`: each
/// submission owns everything it needs to interpret its own completion,
/// boxed and leaked for the round trip, then reclaimed (and dropped) the
/// moment the completion is handled. A vectored read or write keeps its
/// [`PinnedVectors`] alive here for exactly that span.
pub(crate) enum Submission {
    Accept,
    Read { conn: ConnId, vectors: PinnedVectors },
    Write { conn: ConnId, vectors: PinnedVectors },
    Close { conn: ConnId },
    WorkerWake,
    SignalRead,
    TimerTick,
}

impl Submission {
    pub(crate) fn into_raw(self: Box<Self>) -> u64 {
        Box::into_raw(self) as u64
    }

    /// # Safety
    /// `data` must be a pointer previously produced by [`Submission::into_raw`]
    /// and not yet reclaimed.
    pub(crate) unsafe fn from_raw(data: u64) -> Box<Self> {
        Box::from_raw(data as *mut Submission)
    }
}

/// What [`super::EventQueue::wait`] handed back for one completion.
///
/// Tags follow the original event-queue's taxonomy (ACCEPT/READ/WRITE/
/// CLOSED/TIMEOUT/SIGNAL); EMPTY is represented by `wait` returning `None`
/// and CLOSING never leaves the connection's own pipeline state, so
/// neither needs a variant here.
pub enum Completion {
    Accept(Connection),
    Read { conn: ConnId, transferred: usize },
    Write { conn: ConnId, transferred: usize },
    Closed(ConnId),
    Tick,
    Signal(i32),
}
