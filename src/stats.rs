//! Per-link counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters updated by one forwarder and read by anyone.
#[derive(Debug, Default)]
pub struct LinkStats {
    frames: AtomicU64,
    forwarded_bytes: AtomicU64,
    dropped_bytes: AtomicU64,
    parity_errors: AtomicU64,
    sync_abandoned: AtomicU64,
    overflows: AtomicU64,
    truncated_frames: AtomicU64,
    responses: AtomicU64,
    no_responses: AtomicU64,
    tx_errors: AtomicU64,
}

/// Counter kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Counter {
    Frames,
    ForwardedBytes,
    DroppedBytes,
    ParityErrors,
    SyncAbandoned,
    Overflows,
    TruncatedFrames,
    Responses,
    NoResponses,
    TxErrors,
}

impl LinkStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, counter: Counter) -> &AtomicU64 {
        match counter {
            Counter::Frames => &self.frames,
            Counter::ForwardedBytes => &self.forwarded_bytes,
            Counter::DroppedBytes => &self.dropped_bytes,
            Counter::ParityErrors => &self.parity_errors,
            Counter::SyncAbandoned => &self.sync_abandoned,
            Counter::Overflows => &self.overflows,
            Counter::TruncatedFrames => &self.truncated_frames,
            Counter::Responses => &self.responses,
            Counter::NoResponses => &self.no_responses,
            Counter::TxErrors => &self.tx_errors,
        }
    }

    #[inline]
    pub(crate) fn add(&self, counter: Counter, n: u64) {
        self.counter(counter).fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn bump(&self, counter: Counter) {
        self.add(counter, 1);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        let get = |c| self.counter(c).load(Ordering::Relaxed);
        StatsSnapshot {
            frames: get(Counter::Frames),
            forwarded_bytes: get(Counter::ForwardedBytes),
            dropped_bytes: get(Counter::DroppedBytes),
            parity_errors: get(Counter::ParityErrors),
            sync_abandoned: get(Counter::SyncAbandoned),
            overflows: get(Counter::Overflows),
            truncated_frames: get(Counter::TruncatedFrames),
            responses: get(Counter::Responses),
            no_responses: get(Counter::NoResponses),
            tx_errors: get(Counter::TxErrors),
        }
    }
}

/// Copy of a link's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatsSnapshot {
    /// Completed frames (master: header + response, sniffer: analyzed)
    pub frames: u64,
    /// Bytes written to the output bus, headers included
    pub forwarded_bytes: u64,
    /// Bytes received outside a frame and not forwarded
    pub dropped_bytes: u64,
    /// Protected IDs with bad parity
    pub parity_errors: u64,
    /// Breaks without a usable sync byte
    pub sync_abandoned: u64,
    /// Receive buffer overflows
    pub overflows: u64,
    /// Frames longer than the assembler
    pub truncated_frames: u64,
    /// Replies that started after a regenerated header
    pub responses: u64,
    /// Regenerated headers without reply
    pub no_responses: u64,
    /// Failed writes to the output bus
    pub tx_errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = LinkStats::new();
        stats.bump(Counter::Frames);
        stats.add(Counter::ForwardedBytes, 3);
        stats.bump(Counter::NoResponses);
        let snap = stats.snapshot();
        assert_eq!(snap.frames, 1);
        assert_eq!(snap.forwarded_bytes, 3);
        assert_eq!(snap.no_responses, 1);
        assert_eq!(snap.tx_errors, 0);
    }
}
