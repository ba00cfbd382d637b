//! Response tracking across the two bridge directions.
//!
//! The master direction arms the tracker when it regenerates a header; the
//! slave direction records the first reply byte and derives the latency. The
//! whole record sits behind one mutex and every transition is a single locked
//! update, so the two threads never observe a half-written state.

use parking_lot::Mutex;

use crate::lin::MAX_LIN_ID;

/// Snapshot of the tracker record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackerState {
    /// A header was sent and its reply is still outstanding or in progress.
    pub expecting: bool,
    /// The first reply byte arrived.
    pub got: bool,
    /// Protected ID of the last regenerated header.
    pub pid: u8,
    /// When the header was sent (µs).
    pub sent_at_us: u64,
}

impl TrackerState {
    /// 6-bit ID of the last regenerated header.
    pub fn id(&self) -> u8 {
        self.pid & MAX_LIN_ID
    }
}

/// First reply byte of an armed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseLatency {
    /// Protected ID the reply belongs to
    pub pid: u8,
    /// Header send to first reply byte (µs)
    pub latency_us: u64,
}

impl ResponseLatency {
    /// 6-bit ID the reply belongs to.
    pub fn id(&self) -> u8 {
        self.pid & MAX_LIN_ID
    }
}

/// Shared header/reply bookkeeping.
#[derive(Debug, Default)]
pub struct ResponseTracker {
    state: Mutex<TrackerState>,
}

impl ResponseTracker {
    /// Create an idle tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current record.
    pub fn snapshot(&self) -> TrackerState {
        *self.state.lock()
    }

    /// A header with `pid` was sent at `now_us`.
    pub fn arm(&self, pid: u8, now_us: u64) {
        *self.state.lock() = TrackerState {
            expecting: true,
            got: false,
            pid,
            sent_at_us: now_us,
        };
    }

    /// A byte arrived on the slave side.
    ///
    /// Returns the latency for the first byte of an armed reply, `None` for
    /// every other byte.
    pub fn record_reply(&self, now_us: u64) -> Option<ResponseLatency> {
        let mut state = self.state.lock();
        if !state.expecting || state.got {
            return None;
        }
        state.got = true;
        Some(ResponseLatency {
            pid: state.pid,
            latency_us: now_us.saturating_sub(state.sent_at_us),
        })
    }

    /// A new break arrived on the master side.
    ///
    /// Clears the record. Returns the protected ID of a header whose reply
    /// never started.
    pub fn on_break(&self) -> Option<u8> {
        let mut state = self.state.lock();
        let missed = (state.expecting && !state.got).then_some(state.pid);
        state.expecting = false;
        state.got = false;
        missed
    }

    /// Give up on a reply that has not started within `timeout_us`.
    ///
    /// Returns the protected ID when the deadline passed. Only used when a
    /// response timeout is configured.
    pub fn expire(&self, now_us: u64, timeout_us: u64) -> Option<u8> {
        let mut state = self.state.lock();
        if state.expecting && !state.got && now_us.saturating_sub(state.sent_at_us) >= timeout_us
        {
            state.expecting = false;
            return Some(state.pid);
        }
        None
    }
}
