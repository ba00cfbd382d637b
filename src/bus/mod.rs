//! Bus event source abstraction.
//!
//! A physical LIN link is a UART plus the TX pin the UART drives. The serial
//! driver (interrupt layer) pushes [`BusEvent`]s into a channel and keeps the
//! received bytes in its own buffer, read back through [`LinRx`]. The transmit
//! side is a [`LinTx`]: ordinary bytes through the UART, breaks through the pin.
//!
//! ```text
//!   serial ISR --events--> BusInput { Receiver<BusEvent>, LinRx } --> forwarder
//!                                                                       |
//!   UART TX <-- bytes --+                                               |
//!                       +---- PinBreakTx { UartTx, BreakPin } <---------+
//!   TX pin  <-- break --+
//! ```
//!
//! Platform code implements [`UartTx`], [`BreakPin`], [`LinRx`] and
//! [`LinDriver`]. The [`sim`] module provides an in-memory implementation.

mod serial;
pub mod sim;

pub use serial::{DEFAULT_BAUD_RATE, LIN_BREAK_BITS, SerialSettings};

use std::fmt;
use std::time::Duration;

use crossbeam::channel::Receiver;

use crate::clock::spin_wait;
use crate::error::Result;

/// Event delivered by the serial interrupt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusEvent {
    /// The receiver detected a break condition.
    Break,
    /// A byte had no valid stop bit; on a LIN bus this is how most UARTs see a break.
    FramingError,
    /// `n` bytes are waiting in the receive buffer.
    Data(usize),
    /// The receive buffer overflowed; its content is unreliable.
    Overflow,
}

/// Receive side of a serial line.
pub trait LinRx: Send {
    /// Take one byte from the driver's receive buffer without blocking.
    fn read_byte(&mut self) -> Option<u8>;

    /// Discard everything in the receive buffer.
    fn flush_input(&mut self);
}

/// Transmit side of a LIN link.
pub trait LinTx: Send {
    /// Write bytes through the UART.
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Hold the line low for `low`, then release it.
    fn send_break(&mut self, low: Duration) -> Result<()>;

    /// Break followed by sync and protected ID.
    fn send_header(&mut self, pid: u8, break_low: Duration) -> Result<()> {
        self.send_break(break_low)?;
        self.write(&[crate::lin::SYNC_BYTE, pid])
    }
}

/// Raw UART transmitter.
pub trait UartTx: Send {
    /// Queue bytes for transmission.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;
}

/// GPIO control of the TX pin.
///
/// A UART cannot hold the line low for the 13+ bit times a LIN break needs,
/// so the break is produced by taking the pin over directly.
pub trait BreakPin: Send {
    /// Switch the pin to output and drive it low.
    fn drive_low(&mut self) -> Result<()>;

    /// Hand the pin back to the UART (idle high).
    fn release(&mut self) -> Result<()>;
}

/// [`LinTx`] that generates breaks at pin level.
pub struct PinBreakTx<U, P> {
    uart: U,
    pin: P,
}

impl<U: UartTx, P: BreakPin> PinBreakTx<U, P> {
    /// Combine a UART and the pin it drives.
    pub fn new(uart: U, pin: P) -> Self {
        Self { uart, pin }
    }
}

impl<U: UartTx, P: BreakPin> LinTx for PinBreakTx<U, P> {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.uart.write_bytes(bytes)
    }

    fn send_break(&mut self, low: Duration) -> Result<()> {
        self.pin.drive_low()?;
        spin_wait(low);
        self.pin.release()
    }
}

/// Finalizes GPIO direction/pull configuration after the driver started.
pub trait PinSetup: Send {
    /// Run the configuration. Called once, from the pin setup thread.
    fn finalize(&mut self) -> Result<()>;
}

/// Input half of a physical link: event queue plus byte access.
pub struct BusInput {
    name: String,
    events: Receiver<BusEvent>,
    rx: Box<dyn LinRx>,
}

impl BusInput {
    /// Wrap a driver's event queue and receive buffer.
    pub fn new(name: impl Into<String>, events: Receiver<BusEvent>, rx: Box<dyn LinRx>) -> Self {
        Self {
            name: name.into(),
            events,
            rx,
        }
    }

    /// Physical link name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The event queue.
    pub fn events(&self) -> &Receiver<BusEvent> {
        &self.events
    }

    /// Take one received byte.
    pub fn read_byte(&mut self) -> Option<u8> {
        self.rx.read_byte()
    }

    /// Flush the receive buffer and drop every queued event.
    ///
    /// Returns the number of dropped events.
    pub fn flush(&mut self) -> usize {
        self.rx.flush_input();
        self.events.try_iter().count()
    }
}

impl fmt::Debug for BusInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusInput")
            .field("name", &self.name)
            .field("queued", &self.events.len())
            .finish_non_exhaustive()
    }
}

/// A configured serial line with its TX pin.
pub struct PhysicalLink {
    /// Link name, e.g. "lin1"
    pub name: String,
    /// Receive half
    pub input: BusInput,
    /// Transmit half
    pub output: Box<dyn LinTx>,
    /// Deferred pin configuration, run by the pin setup thread
    pub pin_setup: Option<Box<dyn PinSetup>>,
}

impl fmt::Debug for PhysicalLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicalLink")
            .field("name", &self.name)
            .field("input", &self.input)
            .field("pin_setup", &self.pin_setup.is_some())
            .finish_non_exhaustive()
    }
}

/// Opens physical links by name.
pub trait LinDriver {
    /// Install the serial driver for `name` with `settings`.
    ///
    /// Failure is fatal for the link: implementations return
    /// [`Error::SerialInit`](crate::Error::SerialInit).
    fn open(&mut self, name: &str, settings: &SerialSettings) -> Result<PhysicalLink>;
}
