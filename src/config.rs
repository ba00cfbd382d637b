//! Gateway configuration.
//!
//! One [`GatewayConfig`] describes a deployment: which mode runs, how the
//! UARTs are set up, which link plays which role, the timing constants of the
//! header regeneration and where reports go. The defaults reproduce the
//! classic two-bus bridge at 9600 baud.
//!
//! # JSON
//!
//! ```
//! # #[cfg(feature = "serde")] {
//! use lin_bridge::{GatewayConfig, RunMode};
//!
//! let config = GatewayConfig::from_json_str(r#"{
//!     "mode": { "sniffer": { "link": "lin1" } },
//!     "logging": { "udp_collector": "127.0.0.1:5514", "sniffer_detail": false }
//! }"#).unwrap();
//! assert_eq!(config.mode, RunMode::Sniffer { link: "lin1".into() });
//! assert_eq!(config.serial.baud_rate, 9600);
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::bus::SerialSettings;
use crate::error::{Error, Result};
use crate::forwarder::ForwarderOptions;
use crate::lin::{DEFAULT_MAX_SYNC_STRAYS, DEFAULT_SYNC_WINDOW_US, DecoderConfig};
use crate::sink::{LogFacadeSink, LogSink, TeeSink, UdpSink};
use crate::sniffer::SnifferOptions;

/// Name of the first physical link.
pub const LIN1: &str = "lin1";
/// Name of the second physical link.
pub const LIN2: &str = "lin2";

/// Role of one forwarding direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum LinkRole {
    /// Reads the master's bus and regenerates headers on the other bus.
    Master,
    /// Relays slave replies back byte by byte.
    Slave,
}

/// What the gateway runs. Exactly one mode is active.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum RunMode {
    /// Two forwarders bridging the buses.
    #[default]
    Bridge,
    /// A read-only analyzer on one bus.
    Sniffer {
        /// Physical link to observe
        link: String,
    },
}

/// One forwarding direction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkConfig {
    /// Name used in every report line
    pub name: String,
    /// Physical link read from
    pub input: String,
    /// Physical link written to
    pub output: String,
    /// Forwarding role
    pub role: LinkRole,
}

impl LinkConfig {
    /// Build a direction description.
    pub fn new(name: &str, input: &str, output: &str, role: LinkRole) -> Self {
        Self {
            name: name.to_string(),
            input: input.to_string(),
            output: output.to_string(),
            role,
        }
    }
}

/// Timing constants of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TimingConfig {
    /// Low time of a regenerated break (µs)
    pub break_low_us: u64,
    /// Stray-byte window after a break (µs)
    pub sync_window_us: u64,
    /// Stray bytes tolerated inside the window
    pub max_sync_strays: u8,
    /// Delay before the pin setup thread finalizes GPIO configuration (ms)
    pub pin_setup_delay_ms: u64,
    /// Report a missing reply after this long instead of at the next break (µs)
    pub response_timeout_us: Option<u64>,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            break_low_us: 1500,
            sync_window_us: DEFAULT_SYNC_WINDOW_US,
            max_sync_strays: DEFAULT_MAX_SYNC_STRAYS,
            pin_setup_delay_ms: 100,
            response_timeout_us: None,
        }
    }
}

/// Where reports go and which are emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LogConfig {
    /// Send reports to the `log` facade
    pub console: bool,
    /// Mirror reports to a UDP collector, e.g. `"192.168.1.100:514"`
    pub udp_collector: Option<String>,
    /// Report every completed frame (anomalies are always reported)
    pub log_frames: bool,
    /// Sniffer reports include timing and checksum details
    pub sniffer_detail: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console: true,
            udp_collector: None,
            log_frames: true,
            sniffer_detail: true,
        }
    }
}

impl LogConfig {
    /// Build the sink described by this configuration.
    ///
    /// An unreachable collector is logged and skipped.
    pub fn build_sink(&self) -> Arc<dyn LogSink> {
        let mut tee = TeeSink::new();
        if self.console {
            tee = tee.with(Arc::new(LogFacadeSink));
        }
        if let Some(collector) = &self.udp_collector {
            match UdpSink::connect(collector) {
                Ok(sink) => {
                    log::info!("[config] mirroring reports to {}", sink.collector());
                    tee = tee.with(Arc::new(sink));
                }
                Err(e) => log::warn!("[config] UDP collector {collector} unavailable: {e}"),
            }
        }
        Arc::new(tee)
    }
}

/// Complete gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GatewayConfig {
    /// Active mode
    pub mode: RunMode,
    /// UART settings shared by every link
    pub serial: SerialSettings,
    /// Physical links to open
    pub buses: Vec<String>,
    /// Forwarding directions (bridge mode)
    pub links: Vec<LinkConfig>,
    /// State machine timing
    pub timing: TimingConfig,
    /// Reporting
    pub logging: LogConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Bridge,
            serial: SerialSettings::default(),
            buses: vec![LIN1.to_string(), LIN2.to_string()],
            links: vec![
                LinkConfig::new("lin1_to_lin2", LIN1, LIN2, LinkRole::Master),
                LinkConfig::new("lin2_to_lin1", LIN2, LIN1, LinkRole::Slave),
            ],
            timing: TimingConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Parse a JSON configuration. Missing fields take their defaults.
    #[cfg(feature = "serde")]
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    #[cfg(feature = "serde")]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Serialize to pretty JSON.
    #[cfg(feature = "serde")]
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the configuration for consistency.
    pub fn validate(&self) -> Result<()> {
        self.serial.validate()?;

        let min_break = self.serial.min_break();
        if self.break_low() < min_break {
            return Err(Error::InvalidConfig(format!(
                "break of {} us is shorter than 13 bit times ({} us)",
                self.timing.break_low_us,
                min_break.as_micros()
            )));
        }

        for (i, bus) in self.buses.iter().enumerate() {
            if self.buses[..i].contains(bus) {
                return Err(Error::InvalidConfig(format!("bus {bus} listed twice")));
            }
        }

        match &self.mode {
            RunMode::Sniffer { link } => self.require_bus(link),
            RunMode::Bridge => self.validate_bridge(),
        }
    }

    fn require_bus(&self, name: &str) -> Result<()> {
        if self.buses.iter().any(|b| b == name) {
            Ok(())
        } else {
            Err(Error::InvalidConfig(format!("unknown bus {name}")))
        }
    }

    fn validate_bridge(&self) -> Result<()> {
        let (master, slave) = self.bridge_links()?;
        for link in [master, slave] {
            self.require_bus(&link.input)?;
            self.require_bus(&link.output)?;
            if link.input == link.output {
                return Err(Error::InvalidConfig(format!(
                    "link {} reads and writes the same bus",
                    link.name
                )));
            }
        }
        if master.input != slave.output || master.output != slave.input {
            return Err(Error::InvalidConfig(
                "master and slave links must cross the same two buses".into(),
            ));
        }
        if master.name == slave.name {
            return Err(Error::InvalidConfig("link names must differ".into()));
        }
        Ok(())
    }

    /// The master and slave directions of the bridge.
    pub fn bridge_links(&self) -> Result<(&LinkConfig, &LinkConfig)> {
        if self.links.len() != 2 {
            return Err(Error::InvalidConfig(format!(
                "bridge needs exactly 2 links, got {}",
                self.links.len()
            )));
        }
        let master = self.links.iter().find(|l| l.role == LinkRole::Master);
        let slave = self.links.iter().find(|l| l.role == LinkRole::Slave);
        match (master, slave) {
            (Some(m), Some(s)) => Ok((m, s)),
            _ => Err(Error::InvalidConfig(
                "bridge needs one master and one slave link".into(),
            )),
        }
    }

    /// Regenerated break length.
    pub fn break_low(&self) -> Duration {
        Duration::from_micros(self.timing.break_low_us)
    }

    /// Delay before pin setup is finalized.
    pub fn pin_setup_delay(&self) -> Duration {
        Duration::from_millis(self.timing.pin_setup_delay_ms)
    }

    /// Forwarder options derived from this configuration.
    pub fn forwarder_options(&self) -> ForwarderOptions {
        ForwarderOptions {
            break_low: self.break_low(),
            decoder: DecoderConfig {
                max_sync_strays: self.timing.max_sync_strays,
                sync_window_us: self.timing.sync_window_us,
                strict_parity: true,
            },
            log_frames: self.logging.log_frames,
            response_timeout: self.timing.response_timeout_us.map(Duration::from_micros),
        }
    }

    /// Sniffer options derived from this configuration.
    pub fn sniffer_options(&self) -> SnifferOptions {
        SnifferOptions {
            decoder: DecoderConfig {
                max_sync_strays: self.timing.max_sync_strays,
                sync_window_us: self.timing.sync_window_us,
                strict_parity: false,
            },
            detailed: self.logging.sniffer_detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid_bridge() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
        let (master, slave) = config.bridge_links().unwrap();
        assert_eq!(master.input, LIN1);
        assert_eq!(slave.input, LIN2);
        assert_eq!(config.break_low(), Duration::from_micros(1500));
    }

    #[test]
    fn test_short_break_rejected() {
        let mut config = GatewayConfig::default();
        config.timing.break_low_us = 1000;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_bridge_needs_master_and_slave() {
        let mut config = GatewayConfig::default();
        config.links[1].role = LinkRole::Master;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bridge_links_must_cross() {
        let mut config = GatewayConfig::default();
        config.links[1].output = LIN2.to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sniffer_unknown_bus() {
        let config = GatewayConfig {
            mode: RunMode::Sniffer {
                link: "lin9".into(),
            },
            ..GatewayConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_options_follow_config() {
        let mut config = GatewayConfig::default();
        config.timing.response_timeout_us = Some(50_000);
        config.logging.log_frames = false;
        let opts = config.forwarder_options();
        assert_eq!(opts.response_timeout, Some(Duration::from_millis(50)));
        assert!(!opts.log_frames);
        assert!(opts.decoder.strict_parity);
        assert!(!config.sniffer_options().decoder.strict_parity);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_defaults_and_overrides() {
        let config = GatewayConfig::from_json_str(
            r#"{ "timing": { "sync_window_us": 800 }, "logging": { "log_frames": false } }"#,
        )
        .unwrap();
        assert_eq!(config.mode, RunMode::Bridge);
        assert_eq!(config.timing.sync_window_us, 800);
        assert_eq!(config.timing.break_low_us, 1500);
        assert!(!config.logging.log_frames);
        assert!(config.logging.console);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.json");
        let config = GatewayConfig::default();
        std::fs::write(&path, config.to_json_string().unwrap()).unwrap();
        assert_eq!(GatewayConfig::from_file(&path).unwrap(), config);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_invalid() {
        assert!(matches!(
            GatewayConfig::from_json_str("{ not json"),
            Err(Error::ConfigParse(_))
        ));
        assert!(matches!(
            GatewayConfig::from_json_str(r#"{ "serial": { "baud_rate": 0 } }"#),
            Err(Error::InvalidConfig(_))
        ));
    }
}
