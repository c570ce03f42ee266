//! General stuff.

use crate::error::Error;

/// Brings [unlikely](core::intrinsics::unlikely) to stable rust.
#[inline(always)]
pub(crate) const fn unlikely(b: bool) -> bool {
    #[allow(clippy::needless_bool, clippy::bool_to_int_with_if)]
    if (1i32).checked_div(if b { 0 } else { 1 }).is_none() {
        true
    } else {
        false
    }
}

#[cfg(any(feature = "base64", test))]
#[inline]
pub(crate) fn encode_base64<T: AsRef<[u8]>>(data: T) -> String {
    use base64::Engine;
    fn encode_base64_impl(data: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(data)
    }
    encode_base64_impl(data.as_ref())
}

#[cfg(any(feature = "base64", test))]
#[inline]
pub(crate) fn decode_base64<T: AsRef<[u8]>>(data: T) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    fn decode_base64_impl(data: &[u8]) -> Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD.decode(data)
    }
    decode_base64_impl(data.as_ref())
}

/// Decodes either standard or url-safe base64 into the fixed size buffer.
#[cfg(any(feature = "base64", test))]
pub(crate) fn decode_base64_any_slice(
    data: &[u8],
    target: &mut [u8],
) -> Result<usize, base64::DecodeSliceError> {
    use base64::engine::general_purpose::{STANDARD, URL_SAFE};
    use base64::Engine;

    let is_url_safe = data.iter().any(|c| matches!(c, b'-' | b'_'));
    let engine = if is_url_safe { &URL_SAFE } else { &STANDARD };
    engine.decode_slice(data, target)
}

/// CRC16 (XMODEM) over the specified bytes.
pub(crate) fn crc_16(data: &[u8]) -> u16 {
    let mut crc: u32 = 0;
    for c in data {
        let t = c ^ ((crc >> 8) as u8);
        crc = (CRC16_TABLE[t as usize] ^ ((crc << 8) as u16)) as u32;
    }
    crc as u16
}

static CRC16_TABLE: [u16; 256] = [
    0x0000, 0x1021, 0x2042, 0x3063, 0x4084, 0x50a5, 0x60c6, 0x70e7, 0x8108, 0x9129, 0xa14a, 0xb16b,
    0xc18c, 0xd1ad, 0xe1ce, 0xf1ef, 0x1231, 0x0210, 0x3273, 0x2252, 0x52b5, 0x4294, 0x72f7, 0x62d6,
    0x9339, 0x8318, 0xb37b, 0xa35a, 0xd3bd, 0xc39c, 0xf3ff, 0xe3de, 0x2462, 0x3443, 0x0420, 0x1401,
    0x64e6, 0x74c7, 0x44a4, 0x5485, 0xa56a, 0xb54b, 0x8528, 0x9509, 0xe5ee, 0xf5cf, 0xc5ac, 0xd58d,
    0x3653, 0x2672, 0x1611, 0x0630, 0x76d7, 0x66f6, 0x5695, 0x46b4, 0xb75b, 0xa77a, 0x9719, 0x8738,
    0xf7df, 0xe7fe, 0xd79d, 0xc7bc, 0x48c4, 0x58e5, 0x6886, 0x78a7, 0x0840, 0x1861, 0x2802, 0x3823,
    0xc9cc, 0xd9ed, 0xe98e, 0xf9af, 0x8948, 0x9969, 0xa90a, 0xb92b, 0x5af5, 0x4ad4, 0x7ab7, 0x6a96,
    0x1a71, 0x0a50, 0x3a33, 0x2a12, 0xdbfd, 0xcbdc, 0xfbbf, 0xeb9e, 0x9b79, 0x8b58, 0xbb3b, 0xab1a,
    0x6ca6, 0x7c87, 0x4ce4, 0x5cc5, 0x2c22, 0x3c03, 0x0c60, 0x1c41, 0xedae, 0xfd8f, 0xcdec, 0xddcd,
    0xad2a, 0xbd0b, 0x8d68, 0x9d49, 0x7e97, 0x6eb6, 0x5ed5, 0x4ef4, 0x3e13, 0x2e32, 0x1e51, 0x0e70,
    0xff9f, 0xefbe, 0xdfdd, 0xcffc, 0xbf1b, 0xaf3a, 0x9f59, 0x8f78, 0x9188, 0x81a9, 0xb1ca, 0xa1eb,
    0xd10c, 0xc12d, 0xf14e, 0xe16f, 0x1080, 0x00a1, 0x30c2, 0x20e3, 0x5004, 0x4025, 0x7046, 0x6067,
    0x83b9, 0x9398, 0xa3fb, 0xb3da, 0xc33d, 0xd31c, 0xe37f, 0xf35e, 0x02b1, 0x1290, 0x22f3, 0x32d2,
    0x4235, 0x5214, 0x6277, 0x7256, 0xb5ea, 0xa5cb, 0x95a8, 0x8589, 0xf56e, 0xe54f, 0xd52c, 0xc50d,
    0x34e2, 0x24c3, 0x14a0, 0x0481, 0x7466, 0x6447, 0x5424, 0x4405, 0xa7db, 0xb7fa, 0x8799, 0x97b8,
    0xe75f, 0xf77e, 0xc71d, 0xd73c, 0x26d3, 0x36f2, 0x0691, 0x16b0, 0x6657, 0x7676, 0x4615, 0x5634,
    0xd94c, 0xc96d, 0xf90e, 0xe92f, 0x99c8, 0x89e9, 0xb98a, 0xa9ab, 0x5844, 0x4865, 0x7806, 0x6827,
    0x18c0, 0x08e1, 0x3882, 0x28a3, 0xcb7d, 0xdb5c, 0xeb3f, 0xfb1e, 0x8bf9, 0x9bd8, 0xabbb, 0xbb9a,
    0x4a75, 0x5a54, 0x6a37, 0x7a16, 0x0af1, 0x1ad0, 0x2ab3, 0x3a92, 0xfd2e, 0xed0f, 0xdd6c, 0xcd4d,
    0xbdaa, 0xad8b, 0x9de8, 0x8dc9, 0x7c26, 0x6c07, 0x5c64, 0x4c45, 0x3ca2, 0x2c83, 0x1ce0, 0x0cc1,
    0xef1f, 0xff3e, 0xcf5d, 0xdf7c, 0xaf9b, 0xbfba, 0x8fd9, 0x9ff8, 0x6e17, 0x7e36, 0x4e55, 0x5e74,
    0x2e93, 0x3eb2, 0x0ed1, 0x1ef0,
];

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum IterStatus {
    /// Iterator is still valid.
    Valid,
    /// Iterator started with a pruned branch cell.
    Pruned,
    /// Dictionary has invalid structure.
    Broken,
}

impl IterStatus {
    #[inline]
    pub(crate) const fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }

    #[inline]
    pub(crate) const fn is_pruned(self) -> bool {
        matches!(self, Self::Pruned)
    }
}

/// A wrapper around arbitrary data with the specified bit length.
///
/// Displayed as hex with a trailing `_` when the last nibble is incomplete.
pub struct Bitstring<'a> {
    /// Underlying bytes (without the completion tag).
    pub bytes: &'a [u8],
    /// Length of data in bits.
    pub bit_len: u16,
}

impl Bitstring<'_> {
    /// Parses a bitstring from a hex string with an optional `_` completion tag.
    ///
    /// Returns the parsed data and the bit length.
    pub fn from_hex_str(s: &str) -> Result<(Vec<u8>, u16), Error> {
        if !s.is_ascii() || s.len() > 128 * 2 + 1 {
            return Err(Error::InvalidData);
        }

        let (s, with_tag) = match s.strip_suffix('_') {
            Some(s) => (s, true),
            None => (s, false),
        };

        let bit_len = (s.len() * 4) as u16;
        let data = if s.len() % 2 != 0 {
            let mut padded = String::with_capacity(s.len() + 1);
            padded.push_str(s);
            padded.push('0');
            hex::decode(padded)
        } else {
            hex::decode(s)
        };
        let Ok(mut data) = data else {
            return Err(Error::InvalidData);
        };

        let mut bit_len = bit_len;
        if with_tag {
            // Strip the completion tag: the lowest set bit and everything after it.
            let mut rest = bit_len;
            while rest > 0 {
                let index = (rest - 1) as usize;
                let bit = data[index / 8] >> (7 - index % 8) & 1;
                rest -= 1;
                if bit != 0 {
                    break;
                }
            }
            bit_len = rest;

            data.truncate((bit_len as usize + 7) / 8);
            if bit_len % 8 != 0 {
                if let Some(last) = data.last_mut() {
                    *last &= 0xff << (8 - bit_len % 8);
                }
            }
        }

        Ok((data, bit_len))
    }
}

impl std::fmt::Display for Bitstring<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bit_len = std::cmp::min(self.bit_len as usize, self.bytes.len() * 8);
        let full_nibbles = bit_len / 4;

        for i in 0..full_nibbles {
            let byte = self.bytes[i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0xf };
            ok!(write!(f, "{nibble:x}"));
        }

        let rem = bit_len % 4;
        if rem != 0 {
            let byte = self.bytes[full_nibbles / 2];
            let nibble = if full_nibbles % 2 == 0 { byte >> 4 } else { byte & 0xf };
            // Keep `rem` data bits and append the completion tag.
            let nibble = (nibble & (0xf << (4 - rem))) | (1 << (3 - rem));
            ok!(write!(f, "{nibble:x}_"));
        }

        Ok(())
    }
}

impl std::fmt::Binary for Bitstring<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bit_len = std::cmp::min(self.bit_len as usize, self.bytes.len() * 8);
        for i in 0..bit_len {
            let bit = (self.bytes[i / 8] >> (7 - i % 8)) & 1;
            ok!(write!(f, "{bit}"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc16_matches_xmodem() {
        assert_eq!(crc_16(b"123456789"), 0x31c3);
        assert_eq!(crc_16(&[]), 0);
    }

    #[test]
    fn bitstring_hex_roundtrip() -> anyhow::Result<()> {
        for (hex, bits) in [("", 0), ("ab", 8), ("abc", 12), ("a_", 2), ("4_", 1), ("ff8_", 8)] {
            let (data, bit_len) = Bitstring::from_hex_str(hex)?;
            assert_eq!(bit_len, bits, "{hex}");

            let printed = Bitstring {
                bytes: &data,
                bit_len,
            }
            .to_string();
            let (reparsed, reparsed_len) = Bitstring::from_hex_str(&printed)?;
            assert_eq!(reparsed_len, bit_len);
            assert_eq!(reparsed, data);
        }

        assert!(Bitstring::from_hex_str("zz").is_err());
        Ok(())
    }

    #[test]
    fn bitstring_binary() {
        let bits = Bitstring {
            bytes: &[0b1010_0000],
            bit_len: 3,
        };
        assert_eq!(format!("{bits:b}"), "101");
    }
}
