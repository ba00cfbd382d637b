//! Break/sync/ID header decoding shared by the master forwarder and the sniffer.
//!
//! The decoder owns the [`LinkState`] and the [`FrameAssembler`] of one
//! direction. It only classifies bytes; what happens to them (forwarding,
//! header regeneration, reporting) is decided by the caller from the
//! returned [`Step`].
//!
//! ```text
//!            break                 0x55               pid ok          byte
//!   Idle ----------> GotBreak ------------> GotSync ----------> GotId -----> Data
//!    ^                  |  0x00: ignored       |                            |  ^
//!    |                  |  stray: tolerated    | parity error (strict)      +--+
//!    +------------------+  within the window   |                           byte
//!    +---------------------------------------- +
//! ```

use super::assembler::FrameAssembler;
use super::frame::{FrameView, SYNC_BYTE};
use super::protocol::parity_check;

/// Non-sync bytes tolerated after a break before giving up.
pub const DEFAULT_MAX_SYNC_STRAYS: u8 = 3;

/// Time after a break during which stray bytes are tolerated (microseconds).
pub const DEFAULT_SYNC_WINDOW_US: u64 = 600;

/// Decoding state of one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LinkState {
    /// Between frames.
    #[default]
    Idle,
    /// A break was seen; waiting for the sync byte.
    GotBreak,
    /// Sync accepted; next byte is the protected ID.
    GotSync,
    /// Protected ID accepted; response not started.
    GotId,
    /// Inside the response.
    Data,
}

/// Decoder tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Stray bytes tolerated after a break.
    pub max_sync_strays: u8,
    /// Window after the break in which strays are tolerated (µs).
    pub sync_window_us: u64,
    /// Discard frames whose protected ID has bad parity.
    ///
    /// The bridge discards them; the sniffer keeps them for analysis.
    pub strict_parity: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_sync_strays: DEFAULT_MAX_SYNC_STRAYS,
            sync_window_us: DEFAULT_SYNC_WINDOW_US,
            strict_parity: true,
        }
    }
}

/// Classification of one received byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Byte received while idle (not anchored to a break).
    Unframed(u8),
    /// 0x00 right after a break, the tail of the break itself.
    BreakNoise,
    /// Sync byte accepted.
    Sync,
    /// Non-sync byte after a break, still within tolerance.
    Stray {
        /// Strays seen since the break, including this one
        count: u8,
    },
    /// Too many strays, or too late: the frame was abandoned.
    SyncAbandoned {
        /// The offending byte
        byte: u8,
        /// Strays seen since the break, including this one
        strays: u8,
        /// Time since the break (µs)
        elapsed_us: u64,
    },
    /// Protected ID with valid parity.
    Header {
        /// Protected ID byte
        pid: u8,
    },
    /// Protected ID with bad parity.
    ParityError {
        /// Protected ID byte as received
        pid: u8,
        /// True when the frame was discarded (strict parity)
        discarded: bool,
    },
    /// Response byte (data or checksum).
    Response {
        /// The byte
        byte: u8,
        /// False when the assembler was full and the byte was not stored
        stored: bool,
    },
}

/// Timestamps of the header of the frame in flight (µs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeaderTiming {
    /// When the break was seen
    pub break_at_us: u64,
    /// When the sync byte was accepted
    pub sync_at_us: Option<u64>,
    /// When the protected ID was received
    pub id_at_us: Option<u64>,
}

impl HeaderTiming {
    /// Break to sync delay.
    pub fn break_to_sync_us(&self) -> Option<u64> {
        self.sync_at_us
            .map(|sync| sync.saturating_sub(self.break_at_us))
    }

    /// Sync to protected ID delay.
    pub fn sync_to_id_us(&self) -> Option<u64> {
        match (self.sync_at_us, self.id_at_us) {
            (Some(sync), Some(id)) => Some(id.saturating_sub(sync)),
            _ => None,
        }
    }
}

/// Break-anchored frame decoder for one direction.
#[derive(Debug, Clone, Default)]
pub struct HeaderDecoder {
    config: DecoderConfig,
    state: LinkState,
    assembler: FrameAssembler,
    timing: HeaderTiming,
    strays: u8,
}

impl HeaderDecoder {
    /// Create a decoder in the idle state.
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Current state.
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Bytes collected for the frame in flight.
    pub fn assembler(&self) -> &FrameAssembler {
        &self.assembler
    }

    /// Header timestamps of the frame in flight.
    pub fn timing(&self) -> HeaderTiming {
        self.timing
    }

    /// The frame that a break (or shutdown) would complete now, if any.
    ///
    /// Only frames that reached the response phase count as complete.
    pub fn pending_frame(&self) -> Option<FrameView<'_>> {
        (self.state == LinkState::Data && !self.assembler.is_empty())
            .then(|| self.assembler.as_frame())
    }

    /// Start a new frame.
    pub fn on_break(&mut self, now_us: u64) {
        self.assembler.reset();
        self.strays = 0;
        self.timing = HeaderTiming {
            break_at_us: now_us,
            sync_at_us: None,
            id_at_us: None,
        };
        self.state = LinkState::GotBreak;
    }

    /// Drop the frame in flight and go idle.
    pub fn reset(&mut self) {
        self.assembler.reset();
        self.strays = 0;
        self.state = LinkState::Idle;
    }

    /// Classify one received byte and advance the state.
    pub fn on_byte(&mut self, byte: u8, now_us: u64) -> Step {
        match self.state {
            LinkState::Idle => Step::Unframed(byte),
            LinkState::GotBreak => self.on_sync_search(byte, now_us),
            LinkState::GotSync => self.on_pid(byte, now_us),
            LinkState::GotId | LinkState::Data => {
                self.state = LinkState::Data;
                let stored = self.assembler.push(byte);
                Step::Response { byte, stored }
            }
        }
    }

    fn on_sync_search(&mut self, byte: u8, now_us: u64) -> Step {
        match byte {
            0x00 => Step::BreakNoise,
            SYNC_BYTE => {
                self.assembler.push(byte);
                self.timing.sync_at_us = Some(now_us);
                self.state = LinkState::GotSync;
                Step::Sync
            }
            _ => {
                self.strays = self.strays.saturating_add(1);
                let elapsed_us = now_us.saturating_sub(self.timing.break_at_us);
                if self.strays > self.config.max_sync_strays
                    || elapsed_us > self.config.sync_window_us
                {
                    let strays = self.strays;
                    self.reset();
                    Step::SyncAbandoned {
                        byte,
                        strays,
                        elapsed_us,
                    }
                } else {
                    Step::Stray { count: self.strays }
                }
            }
        }
    }

    fn on_pid(&mut self, pid: u8, now_us: u64) -> Step {
        if !parity_check(pid) {
            if self.config.strict_parity {
                self.reset();
                return Step::ParityError {
                    pid,
                    discarded: true,
                };
            }
            self.accept_pid(pid, now_us);
            return Step::ParityError {
                pid,
                discarded: false,
            };
        }
        self.accept_pid(pid, now_us);
        Step::Header { pid }
    }

    fn accept_pid(&mut self, pid: u8, now_us: u64) {
        self.assembler.push(pid);
        self.timing.id_at_us = Some(now_us);
        self.state = LinkState::GotId;
    }
}
