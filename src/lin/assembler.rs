//! Bounded per-direction buffer for the frame currently in flight.

use heapless::Vec;

use super::frame::FrameView;

/// Bytes reserved per assembler. A LIN frame needs at most
/// [`MAX_FRAME_LEN`](super::MAX_FRAME_LEN) bytes; the rest absorbs
/// long responses from non-conforming slaves.
pub const ASSEMBLER_CAPACITY: usize = 20;

/// Accumulates the bytes of one frame after a break.
///
/// Never allocates. Bytes pushed past capacity are dropped and the assembler
/// remembers that the frame was truncated until the next [`reset`](Self::reset).
#[derive(Debug, Default, Clone)]
pub struct FrameAssembler {
    buf: Vec<u8, ASSEMBLER_CAPACITY>,
    truncated: bool,
}

impl FrameAssembler {
    /// Create an empty assembler.
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            truncated: false,
        }
    }

    /// Drop all collected bytes.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.truncated = false;
    }

    /// Append a byte. Returns `false` (and drops the byte) when full.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.buf.push(byte).is_err() {
            self.truncated = true;
            return false;
        }
        true
    }

    /// View the collected bytes as a frame.
    pub fn as_frame(&self) -> FrameView<'_> {
        FrameView::new(&self.buf)
    }

    /// Number of collected bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when no bytes were collected since the last reset.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// True when a push was refused since the last reset.
    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_view() {
        let mut asm = FrameAssembler::new();
        assert!(asm.is_empty());
        for b in [0x55, 0xC1, 0x11, 0xCC] {
            assert!(asm.push(b));
        }
        let frame = asm.as_frame();
        assert_eq!(frame.id(), Some(0x01));
        assert_eq!(frame.data(), &[0x11]);
        assert_eq!(frame.checksum(), Some(0xCC));
    }

    #[test]
    fn test_overflow_is_truncation_not_failure() {
        let mut asm = FrameAssembler::new();
        for i in 0..ASSEMBLER_CAPACITY {
            assert!(asm.push(i as u8));
        }
        assert!(!asm.truncated());
        assert!(!asm.push(0xAA));
        assert!(asm.truncated());
        assert_eq!(asm.len(), ASSEMBLER_CAPACITY);
        assert_eq!(asm.as_frame().as_bytes().last(), Some(&((ASSEMBLER_CAPACITY - 1) as u8)));
    }

    #[test]
    fn test_reset_clears_truncation() {
        let mut asm = FrameAssembler::new();
        for _ in 0..=ASSEMBLER_CAPACITY {
            asm.push(0);
        }
        asm.reset();
        assert!(asm.is_empty());
        assert!(!asm.truncated());
    }
}
