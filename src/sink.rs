//! Logging sinks.
//!
//! The forwarders know nothing about where their reports end up. They hand
//! text to a [`LogSink`]; the sink may print it, mirror it to a syslog
//! collector over UDP, or keep it for a test to inspect.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use lin_bridge::sink::{LogFacadeSink, LogSink, MemorySink, TeeSink};
//!
//! let memory = Arc::new(MemorySink::new());
//! let sink = TeeSink::new()
//!     .with(Arc::new(LogFacadeSink))
//!     .with(memory.clone());
//! sink.log("[lin1] ID=0x01 Data=11 22 CC");
//! assert!(memory.contains("ID=0x01"));
//! ```

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::report::Report;

/// `log` target used for bus reports.
pub const LOG_TARGET: &str = "lin_bridge::bus";

/// Destination for report lines.
pub trait LogSink: Send + Sync {
    /// Emit one line.
    fn log(&self, text: &str);

    /// Emit a report. The default renders it and calls [`log`](Self::log).
    fn report(&self, report: &Report) {
        self.log(&report.to_string());
    }
}

/// Forwards lines to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFacadeSink;

impl LogSink for LogFacadeSink {
    fn log(&self, text: &str) {
        log::info!(target: LOG_TARGET, "{text}");
    }

    fn report(&self, report: &Report) {
        log::log!(target: LOG_TARGET, report.level(), "{report}");
    }
}

/// Mirrors each line as one UDP datagram to a remote collector.
///
/// Send failures are dropped: a missing collector must never slow the bus.
#[derive(Debug)]
pub struct UdpSink {
    socket: UdpSocket,
    collector: SocketAddr,
}

impl UdpSink {
    /// Bind an ephemeral local socket aimed at `collector` (e.g. `"192.168.1.100:514"`).
    pub fn connect(collector: &str) -> Result<Self> {
        let collector = collector
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| Error::InvalidConfig(format!("cannot resolve collector {collector}")))?;
        let bind: SocketAddr = if collector.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind)?;
        socket.set_nonblocking(true)?;
        Ok(Self { socket, collector })
    }

    /// Address datagrams are sent to.
    pub fn collector(&self) -> SocketAddr {
        self.collector
    }
}

impl LogSink for UdpSink {
    fn log(&self, text: &str) {
        if let Err(e) = self.socket.send_to(text.as_bytes(), self.collector) {
            log::debug!("[udp-sink] send to {} failed: {e}", self.collector);
        }
    }
}

/// Fans every line out to several sinks.
#[derive(Default)]
pub struct TeeSink {
    sinks: Vec<Arc<dyn LogSink>>,
}

impl TeeSink {
    /// Create an empty tee.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    pub fn with(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Number of attached sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// True when no sink is attached.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl LogSink for TeeSink {
    fn log(&self, text: &str) {
        for sink in &self.sinks {
            sink.log(text);
        }
    }

    fn report(&self, report: &Report) {
        for sink in &self.sinks {
            sink.report(report);
        }
    }
}

/// Keeps every line in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all lines so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// True when any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|l| l.contains(needle))
    }

    /// Number of lines containing `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.lines.lock().iter().filter(|l| l.contains(needle)).count()
    }

    /// Drop all lines.
    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl LogSink for MemorySink {
    fn log(&self, text: &str) {
        self.lines.lock().push(text.to_string());
    }
}
