//! LIN protocol layer: frames, codec, frame assembly and header decoding.
//!
//! Everything in this module is `no_std` and allocation free, so it can run
//! in the interrupt-adjacent part of a firmware as well as on a host.
//!
//! # LIN Protocol Overview
//!
//! LIN is a low-cost, single-wire serial network used in automotive applications
//! for communication between sensors, actuators, and ECUs:
//!
//! - Single master, multiple slave architecture
//! - The master sends a header: break, sync (0x55), protected ID
//! - The addressed slave answers with up to 8 data bytes and a checksum
//! - Baud rates: typically 9600, 10400, or 19200 bps
//!
//! # Example
//!
//! ```
//! use lin_bridge::lin::{HeaderDecoder, DecoderConfig, Step, parity_encode};
//!
//! let mut decoder = HeaderDecoder::new(DecoderConfig::default());
//! decoder.on_break(0);
//! assert_eq!(decoder.on_byte(0x55, 1_100), Step::Sync);
//! let pid = parity_encode(0x01);
//! assert_eq!(decoder.on_byte(pid, 2_200), Step::Header { pid });
//! ```

pub mod assembler;
pub mod decoder;
pub mod frame;
pub mod protocol;

pub use assembler::{ASSEMBLER_CAPACITY, FrameAssembler};
pub use decoder::{
    DEFAULT_MAX_SYNC_STRAYS, DEFAULT_SYNC_WINDOW_US, DecoderConfig, HeaderDecoder, HeaderTiming,
    LinkState, Step,
};
pub use frame::{
    ChecksumType, FrameView, HexBytes, LinFrame, MAX_FRAME_LEN, MAX_LIN_DATA_LEN, MAX_LIN_ID,
    SYNC_BYTE,
};
pub use protocol::{
    ChecksumMatch, checksum_classic, checksum_enhanced, parity_check, parity_encode,
};
