//! Error types for the LIN bridge.
//!
//! This module defines the [`Error`] enum which represents the failures that
//! can stop a bridge or sniffer from starting. Protocol anomalies on the bus
//! (bad parity, stray bytes after a break, receive overflow) are *not* errors:
//! they are recovered inside the forwarders and surface as
//! [`Report`](crate::report::Report)s through the logging sink.
//!
//! # Example
//!
//! ```no_run
//! use lin_bridge::{Error, GatewayConfig};
//!
//! match GatewayConfig::from_file("bridge.json") {
//!     Ok(config) => println!("mode: {:?}", config.mode),
//!     Err(Error::ConfigParse(msg)) => eprintln!("bad config: {msg}"),
//!     Err(e) => eprintln!("{e}"),
//! }
//! ```

use core::fmt;

use alloc::string::String;

/// Errors that can occur while configuring or starting a LIN link.
#[derive(Debug)]
pub enum Error {
    /// The serial line of a physical link could not be configured.
    ///
    /// This is fatal for the direction that reads from the link: without a
    /// working UART there is no frame traffic to bridge.
    SerialInit {
        /// Name of the physical link (e.g. "lin1")
        link: String,
        /// Driver supplied reason
        reason: String,
    },

    /// Finalizing the GPIO configuration of a link failed.
    PinSetup {
        /// Name of the physical link
        link: String,
        /// Driver supplied reason
        reason: String,
    },

    /// Writing to the output bus, or driving its break pin, failed.
    Transmit {
        /// Name of the physical link
        link: String,
        /// Driver supplied reason
        reason: String,
    },

    /// The configuration is inconsistent (unknown link name, zero baud rate, ...).
    InvalidConfig(String),

    /// The configuration file could not be parsed.
    ConfigParse(String),

    /// A forwarding thread could not be spawned.
    #[cfg(feature = "std")]
    ThreadSpawn(std::io::Error),

    /// An I/O error occurred (config file, UDP collector socket).
    #[cfg(feature = "std")]
    IOError(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SerialInit { link, reason } => {
                write!(f, "Serial initialization failed on {link}: {reason}")
            }
            Error::PinSetup { link, reason } => {
                write!(f, "Pin setup failed on {link}: {reason}")
            }
            Error::Transmit { link, reason } => write!(f, "Transmit failed on {link}: {reason}"),
            Error::InvalidConfig(s) => write!(f, "Invalid configuration: {s}"),
            Error::ConfigParse(s) => write!(f, "Configuration parse error: {s}"),
            #[cfg(feature = "std")]
            Error::ThreadSpawn(e) => write!(f, "Failed to spawn forwarding thread: {e}"),
            #[cfg(feature = "std")]
            Error::IOError(e) => write!(f, "I/O error: {e}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ThreadSpawn(e) | Error::IOError(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(feature = "std")]
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IOError(err)
    }
}

#[cfg(feature = "std")]
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ConfigParse(alloc::format!("{err}"))
    }
}

/// A specialized Result type for bridge operations.
pub type Result<T> = core::result::Result<T, Error>;
