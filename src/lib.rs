#![forbid(unsafe_code)]
#![cfg_attr(not(feature = "std"), no_std)]

//! # lin-bridge
//!
//! A gateway that sits between a LIN master and its slaves on two separate
//! physical buses and forwards traffic in both directions.
//!
//! The master side is decoded byte by byte: every valid header (break, sync
//! `0x55`, protected ID) is regenerated on the slave bus with a pin-level
//! break, and the response bytes that follow are relayed verbatim. The slave
//! side is a transparent relay that measures how long the slave took to
//! answer. Headers that never get an answer are reported. A passive sniffer
//! mode observes one bus and reports per-frame parity, checksum and timing
//! analysis without writing anything.
//!
//! ## Features
//!
//! - **Codec**: protected ID parity, classic and enhanced checksums
//! - **Header regeneration**: break ≥ 13 bit times driven at pin level
//! - **Resynchronization**: tolerant sync search after a break, recovery
//!   from overflow and framing errors without ever stopping
//! - **Response tracking**: latency and no-response detection across the
//!   two directions
//! - **Sniffer**: read-only frame analysis
//! - **Sinks**: `log` facade, UDP syslog collector, in-memory capture
//!
//! ## Quick Start
//!
//! ```no_run
//! use lin_bridge::{GatewayConfig, Result};
//! use lin_bridge::bridge::Gateway;
//! use lin_bridge::bus::sim::SimDriver;
//!
//! fn main() -> Result<()> {
//!     let config = GatewayConfig::from_file("bridge.json")?;
//!     let mut driver = SimDriver::new();
//!     let handle = Gateway::new(config).launch(&mut driver)?;
//!
//!     std::thread::sleep(std::time::Duration::from_secs(10));
//!     println!("{:?}", handle.stats("lin1_to_lin2"));
//!     handle.join();
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`lin`] | Frames, codec, frame assembly, header decoding (`no_std`) |
//! | `bus` | Bus event source and transmit abstractions, simulated bus |
//! | `forwarder` | Master and slave forwarding engine |
//! | `sniffer` | Passive frame analysis |
//! | `tracker` | Header/reply bookkeeping shared by both directions |
//! | `bridge` | Threads, pin setup and the [`GatewayHandle`](bridge::GatewayHandle) |
//! | `config` | [`GatewayConfig`] and JSON loading |
//! | [`error`] | Error types and [`Result`] alias |
//!
//! Without the `std` feature only [`lin`] and [`error`] are available.
//!
//! ## Error Handling
//!
//! Startup failures (serial driver, configuration, thread spawn) return
//! [`Result<T>`]. Protocol anomalies on the bus never do: they are reported
//! through the configured sink and the forwarder resynchronizes on its own.

extern crate alloc;

pub mod error;
pub mod lin;

#[cfg(feature = "std")]
pub mod bridge;
#[cfg(feature = "std")]
pub mod bus;
#[cfg(feature = "std")]
pub mod clock;
#[cfg(feature = "std")]
pub mod config;
#[cfg(feature = "std")]
pub mod forwarder;
#[cfg(feature = "std")]
pub mod readiness;
#[cfg(feature = "std")]
pub mod report;
#[cfg(feature = "std")]
pub mod sink;
#[cfg(feature = "std")]
pub mod sniffer;
#[cfg(feature = "std")]
pub mod stats;
#[cfg(feature = "std")]
pub mod tracker;

// Re-export commonly used types at the crate root
pub use error::{Error, Result};
pub use lin::{ChecksumMatch, ChecksumType, LinFrame, LinkState, parity_check, parity_encode};

#[cfg(feature = "std")]
pub use bridge::{Bridge, Gateway, GatewayHandle};
#[cfg(feature = "std")]
pub use config::{GatewayConfig, LinkConfig, LinkRole, LogConfig, RunMode, TimingConfig};
#[cfg(feature = "std")]
pub use forwarder::{ForwarderOptions, LinkContext, LinkForwarder};
#[cfg(feature = "std")]
pub use report::Report;
#[cfg(feature = "std")]
pub use sink::LogSink;
#[cfg(feature = "std")]
pub use sniffer::{FrameAnalysis, Sniffer};
#[cfg(feature = "std")]
pub use stats::StatsSnapshot;
