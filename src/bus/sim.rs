//! In-memory LIN bus for tests and demos.
//!
//! A [`SimBus`] is the far side of a [`PhysicalLink`]: it injects what the
//! serial driver would report (breaks, bytes, overflows) and records what the
//! bridge puts on the wire, including the measured length of every break.
//!
//! ```
//! use lin_bridge::bus::sim::SimBus;
//!
//! let (bus, link) = SimBus::new("lin1");
//! bus.send_break();
//! bus.send_bytes(&[0x55, 0xC1]);
//! assert_eq!(link.input.events().len(), 2);
//! assert!(bus.wire().is_empty());
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;

use super::{
    BreakPin, BusEvent, BusInput, LinDriver, LinRx, PhysicalLink, PinBreakTx, PinSetup,
    SerialSettings, UartTx,
};
use crate::error::{Error, Result};

/// Something the bridge put on a simulated wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireEvent {
    /// The TX pin was held low for `low`.
    Break {
        /// Measured low time
        low: Duration,
    },
    /// A byte went out through the UART.
    Byte(u8),
}

#[derive(Debug, Default)]
struct Shared {
    rx_fifo: Mutex<VecDeque<u8>>,
    wire: Mutex<Vec<WireEvent>>,
    fail_tx: AtomicBool,
    flushes: AtomicUsize,
    pin_setups: AtomicUsize,
}

/// Test-side handle of a simulated link.
#[derive(Debug, Clone)]
pub struct SimBus {
    name: String,
    events: Sender<BusEvent>,
    shared: Arc<Shared>,
}

impl SimBus {
    /// Create a simulated bus and the link the bridge consumes.
    pub fn new(name: &str) -> (SimBus, PhysicalLink) {
        let (events_tx, events_rx) = channel::unbounded();
        let shared = Arc::new(Shared::default());

        let rx = SimRx {
            shared: shared.clone(),
        };
        let output = PinBreakTx::new(
            SimUart {
                name: name.to_string(),
                shared: shared.clone(),
            },
            SimPin {
                name: name.to_string(),
                shared: shared.clone(),
                low_since: None,
            },
        );
        let link = PhysicalLink {
            name: name.to_string(),
            input: BusInput::new(name, events_rx, Box::new(rx)),
            output: Box::new(output),
            pin_setup: Some(Box::new(SimPinSetup {
                shared: shared.clone(),
            })),
        };
        let bus = SimBus {
            name: name.to_string(),
            events: events_tx,
            shared,
        };
        (bus, link)
    }

    /// Link name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn emit(&self, event: BusEvent) {
        // the receiving link may already be gone; the event is then irrelevant
        let _ = self.events.send(event);
    }

    /// Report a break.
    pub fn send_break(&self) {
        self.emit(BusEvent::Break);
    }

    /// Report a framing error.
    pub fn framing_error(&self) {
        self.emit(BusEvent::FramingError);
    }

    /// Put bytes in the receive buffer and report them as one data event.
    pub fn send_bytes(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.shared.rx_fifo.lock().extend(bytes.iter().copied());
        self.emit(BusEvent::Data(bytes.len()));
    }

    /// Report a receive buffer overflow.
    pub fn overflow(&self) {
        self.emit(BusEvent::Overflow);
    }

    /// Everything written to the wire so far.
    pub fn wire(&self) -> Vec<WireEvent> {
        self.shared.wire.lock().clone()
    }

    /// Take and clear the wire record.
    pub fn take_wire(&self) -> Vec<WireEvent> {
        std::mem::take(&mut *self.shared.wire.lock())
    }

    /// Only the bytes written to the wire.
    pub fn written_bytes(&self) -> Vec<u8> {
        self.shared
            .wire
            .lock()
            .iter()
            .filter_map(|e| match e {
                WireEvent::Byte(b) => Some(*b),
                WireEvent::Break { .. } => None,
            })
            .collect()
    }

    /// Bytes still sitting in the receive buffer.
    pub fn pending_rx(&self) -> usize {
        self.shared.rx_fifo.lock().len()
    }

    /// How often the receive buffer was flushed.
    pub fn flush_count(&self) -> usize {
        self.shared.flushes.load(Ordering::SeqCst)
    }

    /// How often the pin setup ran.
    pub fn pin_setup_count(&self) -> usize {
        self.shared.pin_setups.load(Ordering::SeqCst)
    }

    /// Make every transmit on this link fail.
    pub fn set_tx_failure(&self, fail: bool) {
        self.shared.fail_tx.store(fail, Ordering::SeqCst);
    }
}

struct SimRx {
    shared: Arc<Shared>,
}

impl LinRx for SimRx {
    fn read_byte(&mut self) -> Option<u8> {
        self.shared.rx_fifo.lock().pop_front()
    }

    fn flush_input(&mut self) {
        self.shared.rx_fifo.lock().clear();
        self.shared.flushes.fetch_add(1, Ordering::SeqCst);
    }
}

struct SimUart {
    name: String,
    shared: Arc<Shared>,
}

impl UartTx for SimUart {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if self.shared.fail_tx.load(Ordering::SeqCst) {
            return Err(Error::Transmit {
                link: self.name.clone(),
                reason: "simulated UART failure".into(),
            });
        }
        self.shared
            .wire
            .lock()
            .extend(bytes.iter().map(|&b| WireEvent::Byte(b)));
        Ok(())
    }
}

struct SimPin {
    name: String,
    shared: Arc<Shared>,
    low_since: Option<Instant>,
}

impl BreakPin for SimPin {
    fn drive_low(&mut self) -> Result<()> {
        if self.shared.fail_tx.load(Ordering::SeqCst) {
            return Err(Error::Transmit {
                link: self.name.clone(),
                reason: "simulated pin failure".into(),
            });
        }
        self.low_since = Some(Instant::now());
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        if let Some(since) = self.low_since.take() {
            self.shared.wire.lock().push(WireEvent::Break {
                low: since.elapsed(),
            });
        }
        Ok(())
    }
}

struct SimPinSetup {
    shared: Arc<Shared>,
}

impl PinSetup for SimPinSetup {
    fn finalize(&mut self) -> Result<()> {
        self.shared.pin_setups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// [`LinDriver`] handing out simulated links.
#[derive(Debug, Default)]
pub struct SimDriver {
    buses: HashMap<String, SimBus>,
    failing: Vec<String>,
}

impl SimDriver {
    /// Create a driver with no links.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make opening `name` fail, as if the UART could not be installed.
    pub fn fail_on(mut self, name: &str) -> Self {
        self.failing.push(name.to_string());
        self
    }

    /// The test-side handle of an opened link.
    pub fn bus(&self, name: &str) -> Option<SimBus> {
        self.buses.get(name).cloned()
    }
}

impl LinDriver for SimDriver {
    fn open(&mut self, name: &str, settings: &SerialSettings) -> Result<PhysicalLink> {
        settings.validate().map_err(|e| Error::SerialInit {
            link: name.to_string(),
            reason: e.to_string(),
        })?;
        if self.failing.iter().any(|n| n == name) {
            return Err(Error::SerialInit {
                link: name.to_string(),
                reason: "simulated driver install failure".into(),
            });
        }
        let (bus, link) = SimBus::new(name);
        self.buses.insert(name.to_string(), bus);
        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::LinTx;

    #[test]
    fn test_injected_bytes_readable() {
        let (bus, mut link) = SimBus::new("lin1");
        bus.send_bytes(&[0x55, 0xC1]);
        assert_eq!(link.input.events().try_recv(), Ok(BusEvent::Data(2)));
        assert_eq!(link.input.read_byte(), Some(0x55));
        assert_eq!(link.input.read_byte(), Some(0xC1));
        assert_eq!(link.input.read_byte(), None);
    }

    #[test]
    fn test_flush_drops_bytes_and_events() {
        let (bus, mut link) = SimBus::new("lin1");
        bus.send_bytes(&[1, 2, 3]);
        bus.send_break();
        assert_eq!(link.input.flush(), 2);
        assert_eq!(bus.pending_rx(), 0);
        assert_eq!(bus.flush_count(), 1);
    }

    #[test]
    fn test_header_on_wire() {
        let (bus, mut link) = SimBus::new("lin2");
        link.output
            .send_header(0xC1, Duration::from_micros(1500))
            .unwrap();
        let wire = bus.wire();
        assert_eq!(wire.len(), 3);
        match wire[0] {
            WireEvent::Break { low } => assert!(low >= Duration::from_micros(1500)),
            other => panic!("expected break, got {other:?}"),
        }
        assert_eq!(&wire[1..], &[WireEvent::Byte(0x55), WireEvent::Byte(0xC1)]);
    }

    #[test]
    fn test_tx_failure() {
        let (bus, mut link) = SimBus::new("lin2");
        bus.set_tx_failure(true);
        assert!(matches!(
            link.output.write(&[0x11]),
            Err(Error::Transmit { .. })
        ));
        assert!(bus.wire().is_empty());
    }

    #[test]
    fn test_driver_failure() {
        let mut driver = SimDriver::new().fail_on("lin2");
        assert!(driver.open("lin1", &SerialSettings::default()).is_ok());
        assert!(matches!(
            driver.open("lin2", &SerialSettings::default()),
            Err(Error::SerialInit { .. })
        ));
        assert!(driver.bus("lin1").is_some());
        assert!(driver.bus("lin2").is_none());
    }
}
