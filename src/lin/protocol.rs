//! LIN protocol codec: protected ID parity and checksums.
//!
//! All functions are pure. Detecting a mismatch is the caller's job.

use super::frame::MAX_LIN_ID;

/// Compute the protected ID for a 6-bit frame ID.
///
/// P0 = ID0 ^ ID1 ^ ID2 ^ ID4, P1 = !(ID1 ^ ID3 ^ ID4 ^ ID5). The two upper
/// bits of `id` are ignored.
#[inline]
pub fn parity_encode(id: u8) -> u8 {
    let id = id & MAX_LIN_ID;
    let p0 = (id ^ (id >> 1) ^ (id >> 2) ^ (id >> 4)) & 0x01;
    let p1 = !((id >> 1) ^ (id >> 3) ^ (id >> 4) ^ (id >> 5)) & 0x01;
    (p1 << 7) | (p0 << 6) | id
}

/// Check that the parity bits of a protected ID match its low 6 bits.
#[inline]
pub fn parity_check(pid: u8) -> bool {
    parity_encode(pid & MAX_LIN_ID) == pid
}

/// Inverted 8-bit sum with end-around carry, starting from `seed`.
#[inline]
fn inverted_carry_sum(seed: u8, data: &[u8]) -> u8 {
    let mut sum = seed as u16;
    for &b in data {
        sum += b as u16;
        if sum > 0xFF {
            sum -= 0xFF;
        }
    }
    !(sum as u8)
}

/// Classic checksum (LIN 1.x): data bytes only.
#[inline]
pub fn checksum_classic(data: &[u8]) -> u8 {
    inverted_carry_sum(0, data)
}

/// Enhanced checksum (LIN 2.x): protected ID followed by the data bytes.
#[inline]
pub fn checksum_enhanced(pid: u8, data: &[u8]) -> u8 {
    inverted_carry_sum(pid, data)
}

/// Which checksum formula (if any) explains a received checksum byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ChecksumMatch {
    /// Only the classic formula matches.
    Classic,
    /// Only the enhanced formula matches.
    Enhanced,
    /// Both formulas yield the same value and it matches.
    Both,
    /// Neither formula matches.
    Neither,
}

impl ChecksumMatch {
    /// Compare `received` against both formulas.
    pub fn evaluate(pid: u8, data: &[u8], received: u8) -> Self {
        let classic = checksum_classic(data) == received;
        let enhanced = checksum_enhanced(pid, data) == received;
        match (classic, enhanced) {
            (true, true) => Self::Both,
            (true, false) => Self::Classic,
            (false, true) => Self::Enhanced,
            (false, false) => Self::Neither,
        }
    }

    /// True unless neither formula matched.
    pub fn is_valid(self) -> bool {
        self != Self::Neither
    }

    /// Short lowercase name used in log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::Enhanced => "enhanced",
            Self::Both => "classic+enhanced",
            Self::Neither => "none",
        }
    }
}
