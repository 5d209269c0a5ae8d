//! CRC-32 primitive and block normalization
//!
//! Every byte written to the code sink between two tags is folded into a
//! running CRC-32 so merge-back can detect edited blocks. Before a byte
//! reaches the checksum it passes a normalization rule that makes the CRC
//! insensitive to edits no compiler cares about:
//!
//! - carriage returns are dropped anywhere,
//! - whitespace at the start of a line is dropped up to the first
//!   non-whitespace byte,
//! - newlines are kept.
//!
//! The emitter and the merge-back scanner must share this exact rule, or a
//! freshly emitted file would already read as modified.

/// Update a CRC-32 (IEEE 802.3 polynomial, reflected) over `data`.
///
/// `crc32(0, b"")` is `0`, and feeding data incrementally produces the same
/// value as one call over the concatenation.
pub fn crc32(seed: u32, data: &[u8]) -> u32 {
    let mut crc = !seed;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}

/// Running checksum of one tagged block, with normalization.
#[derive(Debug, Clone)]
pub struct BlockChecksum {
    crc: u32,
    line_start: bool,
}

impl Default for BlockChecksum {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockChecksum {
    /// Start a fresh block at the beginning of a line.
    pub fn new() -> Self {
        Self {
            crc: crc32(0, b""),
            line_start: true,
        }
    }

    /// Fold `data` into the checksum under the normalization rule.
    pub fn add(&mut self, data: &[u8]) {
        for &b in data {
            if b == b'\r' {
                continue;
            }
            if self.line_start {
                if b == b'\n' {
                    // blank line: the newline itself still counts
                    self.crc = crc32(self.crc, &[b]);
                    continue;
                }
                if b.is_ascii_whitespace() {
                    continue;
                }
                self.line_start = false;
            } else if b == b'\n' {
                self.line_start = true;
            }
            self.crc = crc32(self.crc, &[b]);
        }
    }

    /// The CRC of everything added since the last reset.
    pub fn value(&self) -> u32 {
        self.crc
    }

    /// Start the next block. The scanner and the tagger both call this after
    /// every tag line.
    pub fn reset(&mut self) {
        self.crc = crc32(0, b"");
        self.line_start = true;
    }
}
