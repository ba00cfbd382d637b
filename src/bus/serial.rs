//! Serial line settings for a LIN link.

use std::time::Duration;

use crate::error::{Error, Result};

/// LIN baud rate used by the bridge.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Minimum break length in bit times.
pub const LIN_BREAK_BITS: u32 = 13;

/// Bits per UART symbol: start + 8 data + stop.
const BITS_PER_SYMBOL: u32 = 10;

/// UART configuration of one physical link (8N1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SerialSettings {
    /// Baud rate in bit/s.
    pub baud_rate: u32,
    /// Data bits per symbol. LIN requires 8.
    pub data_bits: u8,
    /// Stop bits. LIN requires 1.
    pub stop_bits: u8,
    /// Receive idle timeout in symbol times; flushes a frame at end of packet.
    pub rx_timeout_symbols: u8,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: 8,
            stop_bits: 1,
            rx_timeout_symbols: 2,
        }
    }
}

impl SerialSettings {
    /// Reject settings a LIN UART cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            return Err(Error::InvalidConfig("baud rate must be non-zero".into()));
        }
        if self.data_bits != 8 {
            return Err(Error::InvalidConfig(format!(
                "LIN requires 8 data bits, got {}",
                self.data_bits
            )));
        }
        if self.stop_bits != 1 {
            return Err(Error::InvalidConfig(format!(
                "LIN requires 1 stop bit, got {}",
                self.stop_bits
            )));
        }
        if self.rx_timeout_symbols == 0 {
            return Err(Error::InvalidConfig(
                "rx timeout must be at least one symbol".into(),
            ));
        }
        Ok(())
    }

    /// Duration of one bit.
    pub fn bit_time(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / self.baud_rate.max(1) as u64)
    }

    /// Shortest break the bus accepts (13 bit times).
    pub fn min_break(&self) -> Duration {
        self.bit_time() * LIN_BREAK_BITS
    }

    /// Receive idle timeout as a duration.
    pub fn rx_timeout(&self) -> Duration {
        self.bit_time() * (BITS_PER_SYMBOL * self.rx_timeout_symbols as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid_9600_8n1() {
        let s = SerialSettings::default();
        assert_eq!(s.baud_rate, 9600);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_min_break_at_9600() {
        let s = SerialSettings::default();
        // 13 bits at 9600 baud is about 1354 µs
        assert_eq!(s.min_break().as_micros(), 1354);
        assert!(Duration::from_micros(1500) > s.min_break());
    }

    #[test]
    fn test_rx_timeout_two_symbols() {
        let s = SerialSettings::default();
        assert_eq!(s.rx_timeout().as_micros(), 2083);
    }

    #[test]
    fn test_invalid_settings() {
        let bad = [
            SerialSettings {
                baud_rate: 0,
                ..Default::default()
            },
            SerialSettings {
                data_bits: 7,
                ..Default::default()
            },
            SerialSettings {
                stop_bits: 2,
                ..Default::default()
            },
            SerialSettings {
                rx_timeout_symbols: 0,
                ..Default::default()
            },
        ];
        for s in bad {
            assert!(matches!(s.validate(), Err(Error::InvalidConfig(_))));
        }
    }
}
