//! User-visible bridge events.
//!
//! Every anomaly and every completed frame becomes a [`Report`]. Its
//! `Display` form is the line handed to the [`LogSink`](crate::sink::LogSink).

use std::fmt;
use std::sync::Arc;

use crate::lin::{HexBytes, MAX_LIN_ID};
use crate::sniffer::FrameAnalysis;

/// One event worth telling the operator about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    /// A frame completed on a master link.
    Frame {
        /// Link name
        link: Arc<str>,
        /// Protected ID
        pid: u8,
        /// Every byte after the protected ID
        response: Vec<u8>,
        /// More bytes arrived than the assembler holds
        truncated: bool,
    },
    /// The first reply byte for a regenerated header arrived.
    Response {
        /// Link name (slave side)
        link: Arc<str>,
        /// Protected ID of the header
        pid: u8,
        /// Header to first reply byte (µs)
        latency_us: u64,
    },
    /// Reply bytes relayed on a slave link.
    Reply {
        /// Link name (slave side)
        link: Arc<str>,
        /// Protected ID of the header
        pid: u8,
        /// Relayed bytes
        bytes: Vec<u8>,
    },
    /// A regenerated header got no reply.
    NoResponse {
        /// Link name (master side)
        link: Arc<str>,
        /// Protected ID of the header
        pid: u8,
        /// Detected by the response timer rather than the next break
        timed_out: bool,
    },
    /// A protected ID failed its parity check.
    ParityError {
        /// Link name
        link: Arc<str>,
        /// Protected ID as received
        pid: u8,
        /// The frame was dropped
        discarded: bool,
    },
    /// No sync byte within the tolerated window after a break.
    SyncAbandoned {
        /// Link name
        link: Arc<str>,
        /// Stray bytes seen
        strays: u8,
        /// Time since the break (µs)
        elapsed_us: u64,
    },
    /// The receive buffer overflowed and was flushed.
    Overflow {
        /// Link name
        link: Arc<str>,
        /// Queued events dropped with the flush
        dropped_events: usize,
    },
    /// Writing to the output bus failed.
    TxError {
        /// Link name (the forwarder that tried to send)
        link: Arc<str>,
        /// Driver message
        reason: String,
    },
    /// Sniffer analysis of a completed frame.
    Analysis {
        /// Link name
        link: Arc<str>,
        /// The analysis
        analysis: FrameAnalysis,
        /// Include timing and checksum details
        detailed: bool,
    },
}

impl Report {
    /// Severity for log backends.
    pub fn level(&self) -> log::Level {
        match self {
            Report::Frame { .. }
            | Report::Response { .. }
            | Report::Reply { .. }
            | Report::Analysis { .. } => log::Level::Info,
            Report::NoResponse { .. }
            | Report::ParityError { .. }
            | Report::SyncAbandoned { .. }
            | Report::Overflow { .. } => log::Level::Warn,
            Report::TxError { .. } => log::Level::Error,
        }
    }

    /// Link the report belongs to.
    pub fn link(&self) -> &str {
        match self {
            Report::Frame { link, .. }
            | Report::Response { link, .. }
            | Report::Reply { link, .. }
            | Report::NoResponse { link, .. }
            | Report::ParityError { link, .. }
            | Report::SyncAbandoned { link, .. }
            | Report::Overflow { link, .. }
            | Report::TxError { link, .. }
            | Report::Analysis { link, .. } => link,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::Frame {
                link,
                pid,
                response,
                truncated,
            } => {
                write!(
                    f,
                    "[{link}] ID=0x{:02X} Data={}",
                    pid & MAX_LIN_ID,
                    HexBytes(response)
                )?;
                if *truncated {
                    f.write_str(" (truncated)")?;
                }
                Ok(())
            }
            Report::Response {
                link,
                pid,
                latency_us,
            } => write!(
                f,
                "[{link}] Response for ID 0x{:02X} after {}.{:03} ms",
                pid & MAX_LIN_ID,
                latency_us / 1000,
                latency_us % 1000
            ),
            Report::Reply { link, pid, bytes } => write!(
                f,
                "[{link}] Reply ID=0x{:02X} Data={}",
                pid & MAX_LIN_ID,
                HexBytes(bytes)
            ),
            Report::NoResponse {
                link,
                pid,
                timed_out,
            } => {
                write!(f, "[{link}] No response for ID 0x{:02X}", pid & MAX_LIN_ID)?;
                if *timed_out {
                    f.write_str(" (timeout)")?;
                }
                Ok(())
            }
            Report::ParityError {
                link,
                pid,
                discarded,
            } => {
                write!(
                    f,
                    "[{link}] Parity error: PID=0x{pid:02X} (ID 0x{:02X})",
                    pid & MAX_LIN_ID
                )?;
                if *discarded {
                    f.write_str(", frame discarded")?;
                }
                Ok(())
            }
            Report::SyncAbandoned {
                link,
                strays,
                elapsed_us,
            } => write!(
                f,
                "[{link}] Sync abandoned: {strays} stray bytes, {elapsed_us} us after break"
            ),
            Report::Overflow {
                link,
                dropped_events,
            } => write!(
                f,
                "[{link}] RX overflow: input flushed, {dropped_events} queued events dropped"
            ),
            Report::TxError { link, reason } => write!(f, "[{link}] TX error: {reason}"),
            Report::Analysis {
                link,
                analysis,
                detailed,
            } => {
                write!(f, "[{link}] ")?;
                if *detailed {
                    write!(f, "{}", analysis.detailed())
                } else {
                    write!(f, "{analysis}")
                }
            }
        }
    }
}
