//! LIN frame types and constants.
//!
//! A LIN frame on the wire is `[sync(0x55), pid, data(0-8), checksum]`, preceded
//! by a break. [`LinFrame`] is the owned, decoded form; [`FrameView`] is the
//! borrowed view a [`FrameAssembler`](super::FrameAssembler) hands out over the
//! bytes it collected since the last break.

use core::fmt;

use super::protocol::{checksum_classic, checksum_enhanced, parity_check, parity_encode};

/// Sync byte that follows every break.
pub const SYNC_BYTE: u8 = 0x55;

/// Maximum LIN frame data size (8 bytes).
pub const MAX_LIN_DATA_LEN: usize = 8;

/// LIN frame ID range (0-63, 6 bits).
pub const MAX_LIN_ID: u8 = 63;

/// Largest frame on the wire after the break: sync + pid + 8 data + checksum.
pub const MAX_FRAME_LEN: usize = 2 + MAX_LIN_DATA_LEN + 1;

/// LIN checksum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[repr(u8)]
pub enum ChecksumType {
    /// Classic checksum (LIN 1.x) - sum of data bytes only.
    #[default]
    Classic = 0,
    /// Enhanced checksum (LIN 2.x) - sum of protected ID and data bytes.
    Enhanced = 1,
}

impl ChecksumType {
    /// Create from raw byte value.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Enhanced,
            _ => Self::Classic,
        }
    }

    /// Compute the checksum of `data` using this formula.
    ///
    /// `pid` is ignored for [`ChecksumType::Classic`].
    pub fn compute(self, pid: u8, data: &[u8]) -> u8 {
        match self {
            Self::Classic => checksum_classic(data),
            Self::Enhanced => checksum_enhanced(pid, data),
        }
    }
}

/// A decoded LIN frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinFrame {
    /// LIN frame ID (0-63, 6 bits).
    pub id: u8,
    /// Frame data (up to 8 bytes).
    pub data: [u8; MAX_LIN_DATA_LEN],
    /// Actual data length.
    pub data_len: u8,
    /// Checksum byte.
    pub checksum: u8,
    /// Checksum formula the frame was built with.
    pub checksum_type: ChecksumType,
}

impl LinFrame {
    /// Create a new LIN frame with a zero checksum.
    ///
    /// The ID is masked to 6 bits and data beyond 8 bytes is truncated.
    pub fn new(id: u8, data: &[u8]) -> Self {
        let mut frame_data = [0u8; MAX_LIN_DATA_LEN];
        let len = data.len().min(MAX_LIN_DATA_LEN);
        frame_data[..len].copy_from_slice(&data[..len]);

        Self {
            id: id & MAX_LIN_ID,
            data: frame_data,
            data_len: len as u8,
            checksum: 0,
            checksum_type: ChecksumType::Classic,
        }
    }

    /// Create a LIN frame with classic checksum.
    pub fn with_classic_checksum(id: u8, data: &[u8]) -> Self {
        let mut frame = Self::new(id, data);
        frame.checksum = checksum_classic(frame.data());
        frame
    }

    /// Create a LIN frame with enhanced checksum.
    pub fn with_enhanced_checksum(id: u8, data: &[u8]) -> Self {
        let mut frame = Self::new(id, data);
        frame.checksum = checksum_enhanced(frame.protected_id(), frame.data());
        frame.checksum_type = ChecksumType::Enhanced;
        frame
    }

    /// Get the protected ID (ID with parity bits).
    pub fn protected_id(&self) -> u8 {
        parity_encode(self.id)
    }

    /// Get the data slice.
    pub fn data(&self) -> &[u8] {
        &self.data[..self.data_len as usize]
    }

    /// Check the stored checksum against the given formula.
    pub fn verify(&self, checksum_type: ChecksumType) -> bool {
        checksum_type.compute(self.protected_id(), self.data()) == self.checksum
    }

    /// Serialize the frame as it appears on the wire after the break.
    ///
    /// Returns the buffer and the number of valid bytes in it.
    pub fn to_wire_bytes(&self) -> ([u8; MAX_FRAME_LEN], usize) {
        let mut bytes = [0u8; MAX_FRAME_LEN];
        bytes[0] = SYNC_BYTE;
        bytes[1] = self.protected_id();
        let len = self.data_len as usize;
        bytes[2..2 + len].copy_from_slice(self.data());
        bytes[2 + len] = self.checksum;
        (bytes, 3 + len)
    }
}

impl Default for LinFrame {
    fn default() -> Self {
        Self::new(0, &[])
    }
}

/// Borrowed view over the bytes of a frame collected since the last break.
///
/// The layout is `[sync, pid, response...]`. The bridge has no schedule
/// table, so the last response byte is taken to be the checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameView<'a> {
    bytes: &'a [u8],
}

impl<'a> FrameView<'a> {
    /// Wrap raw frame bytes.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// All collected bytes.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Number of collected bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The sync byte, if one was collected.
    pub fn sync(&self) -> Option<u8> {
        self.bytes.first().copied()
    }

    /// Protected ID byte (ID with parity bits).
    pub fn pid(&self) -> Option<u8> {
        self.bytes.get(1).copied()
    }

    /// 6-bit frame ID.
    pub fn id(&self) -> Option<u8> {
        self.pid().map(|pid| pid & MAX_LIN_ID)
    }

    /// True when the protected ID carries valid parity bits.
    pub fn parity_ok(&self) -> bool {
        self.pid().is_some_and(parity_check)
    }

    /// Every byte after the protected ID (data followed by checksum).
    pub fn response(&self) -> &'a [u8] {
        self.bytes.get(2..).unwrap_or(&[])
    }

    /// Data bytes, i.e. the response without its trailing checksum.
    pub fn data(&self) -> &'a [u8] {
        let response = self.response();
        &response[..response.len().saturating_sub(1)]
    }

    /// The trailing checksum byte.
    pub fn checksum(&self) -> Option<u8> {
        self.response().last().copied()
    }

    /// Convert to an owned frame.
    ///
    /// Returns `None` when no ID or checksum was collected, or when the data
    /// part exceeds 8 bytes.
    pub fn to_frame(&self, checksum_type: ChecksumType) -> Option<LinFrame> {
        let id = self.id()?;
        let checksum = self.checksum()?;
        if self.data().len() > MAX_LIN_DATA_LEN {
            return None;
        }
        let mut frame = LinFrame::new(id, self.data());
        frame.checksum = checksum;
        frame.checksum_type = checksum_type;
        Some(frame)
    }
}

/// Formats bytes as space separated uppercase hex, e.g. `11 22 CC`.
pub struct HexBytes<'a>(pub &'a [u8]);

impl fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}
