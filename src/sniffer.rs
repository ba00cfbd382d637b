//! Passive frame analyzer for a single bus.
//!
//! The sniffer runs the same break/sync/ID decoding as the master forwarder
//! but never writes. Frames whose protected ID fails parity are kept, and the
//! verdict ends up in the [`FrameAnalysis`]. On each completed frame the
//! analysis is reported through the [`LogSink`].
//!
//! ```
//! use std::sync::Arc;
//! use lin_bridge::bus::sim::SimBus;
//! use lin_bridge::clock::ManualClock;
//! use lin_bridge::sink::MemorySink;
//! use lin_bridge::sniffer::{Sniffer, SnifferOptions};
//!
//! let (bus, link) = SimBus::new("lin1");
//! let clock = Arc::new(ManualClock::new(0));
//! let sink = Arc::new(MemorySink::new());
//! let mut sniffer = Sniffer::new(link.input, sink.clone(), clock, SnifferOptions::default());
//!
//! bus.send_break();
//! bus.send_bytes(&[0x55, 0xC1, 0x11, 0x22, 0xCC]);
//! bus.send_break();
//! sniffer.process_pending();
//! assert!(sink.contains("ID=0x01"));
//! ```

use std::fmt;
use std::sync::Arc;

use crossbeam::channel::{Receiver, select};

use crate::bus::{BusEvent, BusInput};
use crate::clock::Clock;
use crate::lin::{
    ChecksumMatch, DecoderConfig, FrameView, HeaderDecoder, HeaderTiming, HexBytes, LinkState,
    Step,
};
use crate::readiness::ReadinessGate;
use crate::report::Report;
use crate::sink::LogSink;
use crate::stats::{Counter, LinkStats};

/// Behavior switches of a sniffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnifferOptions {
    /// Sync-search tuning (`strict_parity` is normally off)
    pub decoder: DecoderConfig,
    /// Report timing and checksum details
    pub detailed: bool,
}

impl Default for SnifferOptions {
    fn default() -> Self {
        Self {
            decoder: DecoderConfig {
                strict_parity: false,
                ..DecoderConfig::default()
            },
            detailed: true,
        }
    }
}

/// What the sniffer learned about one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameAnalysis {
    /// Protected ID as received
    pub pid: u8,
    /// 6-bit frame ID
    pub id: u8,
    /// Parity bits matched the ID
    pub parity_ok: bool,
    /// Break to sync byte (µs)
    pub break_to_sync_us: Option<u64>,
    /// Sync byte to protected ID (µs)
    pub sync_to_id_us: Option<u64>,
    /// Data bytes (response without the checksum)
    pub data: Vec<u8>,
    /// Trailing response byte
    pub checksum: Option<u8>,
    /// Which checksum formula explains the trailing byte
    pub checksum_match: Option<ChecksumMatch>,
}

impl FrameAnalysis {
    /// Analyze a collected frame. Returns `None` when no protected ID was seen.
    pub fn from_view(view: FrameView<'_>, timing: HeaderTiming) -> Option<Self> {
        let pid = view.pid()?;
        let data = view.data();
        let checksum = view.checksum();
        Some(Self {
            pid,
            id: view.id()?,
            parity_ok: view.parity_ok(),
            break_to_sync_us: timing.break_to_sync_us(),
            sync_to_id_us: timing.sync_to_id_us(),
            data: data.to_vec(),
            checksum,
            checksum_match: checksum.map(|cs| ChecksumMatch::evaluate(pid, data, cs)),
        })
    }

    /// Header only, no reply seen.
    pub fn is_header_only(&self) -> bool {
        self.checksum.is_none()
    }

    /// Multi-field rendering with timing and checksum verdict.
    pub fn detailed(&self) -> Detailed<'_> {
        Detailed(self)
    }
}

impl fmt::Display for FrameAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID=0x{:02X} Data={}", self.id, HexBytes(&self.data))?;
        if let Some(cs) = self.checksum {
            write!(f, " CS=0x{cs:02X}")?;
        }
        if !self.parity_ok {
            f.write_str(" (parity error)")?;
        }
        Ok(())
    }
}

/// Detailed rendering of a [`FrameAnalysis`].
pub struct Detailed<'a>(&'a FrameAnalysis);

impl fmt::Display for Detailed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = self.0;
        write!(
            f,
            "ID=0x{:02X} PID=0x{:02X} parity={}",
            a.id,
            a.pid,
            if a.parity_ok { "ok" } else { "ERROR" }
        )?;
        match a.break_to_sync_us {
            Some(us) => write!(f, " break->sync={us}us")?,
            None => f.write_str(" break->sync=?")?,
        }
        match a.sync_to_id_us {
            Some(us) => write!(f, " sync->id={us}us")?,
            None => f.write_str(" sync->id=?")?,
        }
        write!(f, " len={} Data={}", a.data.len(), HexBytes(&a.data))?;
        match (a.checksum, a.checksum_match) {
            (Some(cs), Some(verdict)) => write!(f, " CS=0x{cs:02X} ({})", verdict.as_str()),
            _ => f.write_str(" no response"),
        }
    }
}

/// Read-only analyzer for one bus.
pub struct Sniffer {
    name: Arc<str>,
    input: BusInput,
    decoder: HeaderDecoder,
    sink: Arc<dyn LogSink>,
    clock: Arc<dyn Clock>,
    gate: ReadinessGate,
    options: SnifferOptions,
    stats: Arc<LinkStats>,
    last: Option<FrameAnalysis>,
}

impl Sniffer {
    /// Create a sniffer reading `input`. Reports carry the input's name.
    pub fn new(
        input: BusInput,
        sink: Arc<dyn LogSink>,
        clock: Arc<dyn Clock>,
        options: SnifferOptions,
    ) -> Self {
        Self {
            name: Arc::from(input.name()),
            input,
            decoder: HeaderDecoder::new(options.decoder),
            sink,
            clock,
            gate: ReadinessGate::open(),
            options,
            stats: Arc::new(LinkStats::new()),
            last: None,
        }
    }

    /// Hold back all traffic until the gate opens.
    pub fn with_gate(mut self, gate: ReadinessGate) -> Self {
        self.gate = gate;
        self
    }

    /// Observed link name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decoder state.
    pub fn state(&self) -> LinkState {
        self.decoder.state()
    }

    /// Most recent analysis.
    pub fn last_analysis(&self) -> Option<&FrameAnalysis> {
        self.last.as_ref()
    }

    /// Shared handle to this sniffer's counters.
    pub fn stats(&self) -> Arc<LinkStats> {
        self.stats.clone()
    }

    /// Process one bus event.
    pub fn handle(&mut self, event: BusEvent) {
        if !self.gate.is_open() {
            self.input.flush();
            self.decoder.reset();
            return;
        }

        match event {
            BusEvent::Overflow => {
                let dropped_events = self.input.flush();
                self.decoder.reset();
                self.stats.bump(Counter::Overflows);
                self.sink.report(&Report::Overflow {
                    link: self.name.clone(),
                    dropped_events,
                });
            }
            BusEvent::Break | BusEvent::FramingError => {
                self.complete_frame();
                self.decoder.on_break(self.clock.now_us());
            }
            BusEvent::Data(n) => {
                for _ in 0..n {
                    let Some(byte) = self.input.read_byte() else {
                        break;
                    };
                    self.on_byte(byte);
                }
            }
        }
    }

    /// Process every queued event without blocking.
    pub fn process_pending(&mut self) -> usize {
        let events = self.input.events().clone();
        let mut handled = 0;
        while let Ok(event) = events.try_recv() {
            self.handle(event);
            handled += 1;
        }
        handled
    }

    /// Block on the event queue until it disconnects or `shutdown` fires.
    pub fn run(mut self, shutdown: Receiver<()>) {
        log::info!("[{}] sniffing (read only)", self.name);
        let events = self.input.events().clone();
        loop {
            select! {
                recv(events) -> event => match event {
                    Ok(event) => self.handle(event),
                    Err(_) => {
                        log::warn!("[{}] event source disconnected", self.name);
                        break;
                    }
                },
                recv(shutdown) -> _ => break,
            }
        }
        self.finish();
        log::info!("[{}] sniffer stopped", self.name);
    }

    /// Analyze whatever is still in flight.
    pub fn finish(&mut self) {
        self.complete_frame();
        self.decoder.reset();
    }

    fn on_byte(&mut self, byte: u8) {
        match self.decoder.on_byte(byte, self.clock.now_us()) {
            Step::Unframed(_) | Step::Stray { .. } => self.stats.bump(Counter::DroppedBytes),
            Step::SyncAbandoned {
                strays, elapsed_us, ..
            } => {
                self.stats.bump(Counter::SyncAbandoned);
                self.stats.bump(Counter::DroppedBytes);
                self.sink.report(&Report::SyncAbandoned {
                    link: self.name.clone(),
                    strays,
                    elapsed_us,
                });
            }
            Step::ParityError { pid, discarded } => {
                self.stats.bump(Counter::ParityErrors);
                if discarded {
                    self.sink.report(&Report::ParityError {
                        link: self.name.clone(),
                        pid,
                        discarded,
                    });
                }
            }
            Step::BreakNoise | Step::Sync | Step::Header { .. } | Step::Response { .. } => {}
        }
    }

    fn complete_frame(&mut self) {
        // Header-only frames are analyzed too.
        if !matches!(self.decoder.state(), LinkState::GotId | LinkState::Data) {
            return;
        }
        let Some(analysis) =
            FrameAnalysis::from_view(self.decoder.assembler().as_frame(), self.decoder.timing())
        else {
            return;
        };
        self.stats.bump(Counter::Frames);
        if self.decoder.assembler().truncated() {
            self.stats.bump(Counter::TruncatedFrames);
        }
        self.sink.report(&Report::Analysis {
            link: self.name.clone(),
            analysis: analysis.clone(),
            detailed: self.options.detailed,
        });
        self.last = Some(analysis);
    }
}

impl fmt::Debug for Sniffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sniffer")
            .field("name", &self.name)
            .field("state", &self.decoder.state())
            .field("last", &self.last)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lin::{FrameAssembler, checksum_enhanced, parity_encode};

    fn view_of(bytes: &[u8]) -> FrameAssembler {
        let mut asm = FrameAssembler::new();
        for &b in bytes {
            asm.push(b);
        }
        asm
    }

    #[test]
    fn test_analysis_of_enhanced_frame() {
        let pid = parity_encode(0x01);
        let cs = checksum_enhanced(pid, &[0x11, 0x22]);
        let asm = view_of(&[0x55, pid, 0x11, 0x22, cs]);
        let timing = HeaderTiming {
            break_at_us: 0,
            sync_at_us: Some(1_100),
            id_at_us: Some(2_140),
        };
        let a = FrameAnalysis::from_view(asm.as_frame(), timing).unwrap();
        assert_eq!(a.id, 0x01);
        assert!(a.parity_ok);
        assert_eq!(a.data, vec![0x11, 0x22]);
        assert_eq!(a.checksum_match, Some(ChecksumMatch::Enhanced));
        assert_eq!(a.break_to_sync_us, Some(1_100));
        assert_eq!(a.sync_to_id_us, Some(1_040));
        assert!(!a.is_header_only());
        assert!(a.detailed().to_string().contains("break->sync=1100us"));
        assert!(a.detailed().to_string().contains("(enhanced)"));
    }

    #[test]
    fn test_header_only_analysis() {
        let asm = view_of(&[0x55, 0xC1]);
        let a = FrameAnalysis::from_view(asm.as_frame(), HeaderTiming::default()).unwrap();
        assert!(a.is_header_only());
        assert_eq!(a.checksum_match, None);
        assert_eq!(a.to_string(), "ID=0x01 Data=");
        assert!(a.detailed().to_string().ends_with("no response"));
    }

    #[test]
    fn test_summary_flags_parity() {
        let asm = view_of(&[0x55, 0x01, 0xAA]);
        let a = FrameAnalysis::from_view(asm.as_frame(), HeaderTiming::default()).unwrap();
        assert!(!a.parity_ok);
        assert_eq!(a.to_string(), "ID=0x01 Data= CS=0xAA (parity error)");
    }

    #[test]
    fn test_sync_only_has_no_analysis() {
        let asm = view_of(&[0x55]);
        assert!(FrameAnalysis::from_view(asm.as_frame(), HeaderTiming::default()).is_none());
    }
}
