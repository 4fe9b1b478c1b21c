//! Hex Formatting Utilities
//!
//! Allocation-free conversions used by register and memory dumps.

use core::fmt;

/// Nibble 0-9 maps to '0'-'9', nibble 10-15 maps to 'a'-'f'
#[inline]
#[must_use]
pub fn nibble_to_hex(nibble: u8) -> char {
    if nibble < 10 {
        (b'0' + nibble) as char
    } else {
        (b'a' + (nibble - 10)) as char
    }
}

/// Formats a 32-bit register or memory word as `0x` followed by 8 lowercase digits.
#[must_use]
pub fn format_hex32(val: u32, buf: &mut [u8; 10]) -> &str {
    buf[0] = b'0';
    buf[1] = b'x';
    for i in 0..8 {
        let nibble = ((val >> ((7 - i) * 4)) & 0xf) as u8;
        buf[2 + i] = nibble_to_hex(nibble) as u8;
    }
    // SAFETY: buf contains only ASCII hex chars, always valid UTF-8
    unsafe { core::str::from_utf8_unchecked(&buf[..]) }
}

/// Display adapter printing 32-bit words, four per line, each line prefixed
/// with the byte offset of its first word.
pub struct WordDump<'a> {
    words: &'a [u32],
}

impl<'a> WordDump<'a> {
    pub const WORDS_PER_LINE: usize = 4;

    #[must_use]
    pub fn new(words: &'a [u32]) -> Self {
        Self { words }
    }
}

impl fmt::Display for WordDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = [0u8; 10];
        for (line, chunk) in self.words.chunks(Self::WORDS_PER_LINE).enumerate() {
            if line > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{:04x}:", line * Self::WORDS_PER_LINE * 4)?;
            for word in chunk {
                write!(f, " {}", format_hex32(*word, &mut buf))?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nibble_to_hex_digits() {
        assert_eq!(nibble_to_hex(0), '0');
        assert_eq!(nibble_to_hex(9), '9');
    }

    #[test]
    fn test_nibble_to_hex_letters() {
        assert_eq!(nibble_to_hex(10), 'a');
        assert_eq!(nibble_to_hex(15), 'f');
    }

    #[test]
    fn test_format_hex32_pattern() {
        let mut buf = [0u8; 10];
        assert_eq!(format_hex32(0xAA00_0003, &mut buf), "0xaa000003");
        assert_eq!(format_hex32(0, &mut buf), "0x00000000");
    }

    /// Tests: four words per line with byte offsets, partial last line
    #[test]
    fn test_word_dump_layout() {
        let words = [0xBB00_0000, 0xBB00_0001, 0xBB00_0002, 0xBB00_0003, 0xBB00_0004];
        let out = std::format!("{}", WordDump::new(&words));
        assert_eq!(
            out,
            "0000: 0xbb000000 0xbb000001 0xbb000002 0xbb000003\n0010: 0xbb000004"
        );
    }

    #[test]
    fn test_word_dump_empty() {
        assert_eq!(std::format!("{}", WordDump::new(&[])), "");
    }
}
