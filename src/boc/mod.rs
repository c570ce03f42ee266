//! BOC (Bag Of Cells) implementation.

use crate::cell::{Cell, CellBuilder, CellContext, DefaultCellContext, Load, Store};

/// BOC decoder implementation.
pub mod de;
/// BOC encoder implementation.
pub mod ser;

#[cfg(feature = "serde")]
mod serde;

#[cfg(test)]
mod tests;

/// BOC file magic number.
#[derive(Default, Debug, Copy, Clone, Eq, PartialEq)]
pub enum BocTag {
    /// Single root, cells index, no CRC32.
    Indexed,
    /// Single root, cells index, with CRC32.
    IndexedCrc32,
    /// Multiple roots, optional cells index, optional CRC32.
    #[default]
    Generic,
}

impl BocTag {
    const INDEXED: [u8; 4] = [0x68, 0xff, 0x65, 0xf3];
    const INDEXED_CRC32: [u8; 4] = [0xac, 0xc3, 0xa7, 0x28];
    const GENERIC: [u8; 4] = [0xb5, 0xee, 0x9c, 0x72];

    /// Tries to match bytes with BOC tag.
    pub const fn from_bytes(data: [u8; 4]) -> Option<Self> {
        match data {
            Self::GENERIC => Some(Self::Generic),
            Self::INDEXED_CRC32 => Some(Self::IndexedCrc32),
            Self::INDEXED => Some(Self::Indexed),
            _ => None,
        }
    }

    /// Converts BOC tag to bytes.
    pub const fn to_bytes(self) -> [u8; 4] {
        match self {
            Self::Indexed => Self::INDEXED,
            Self::IndexedCrc32 => Self::INDEXED_CRC32,
            Self::Generic => Self::GENERIC,
        }
    }
}

/// BOC (Bag Of Cells) helper.
pub struct Boc;

impl Boc {
    /// Encodes the specified cell tree as BOC and
    /// returns the `base64` encoded bytes as a string.
    #[cfg(any(feature = "base64", test))]
    pub fn encode_base64(cell: &Cell) -> String {
        crate::util::encode_base64(Self::encode(cell))
    }

    /// Encodes the specified cell tree as BOC.
    pub fn encode(cell: &Cell) -> Vec<u8> {
        Self::encode_ext(cell, false)
    }

    /// Encodes the specified cell tree as BOC, optionally appending the CRC32C checksum.
    pub fn encode_ext(cell: &Cell, with_crc: bool) -> Vec<u8> {
        let mut result = Vec::new();
        ser::BocHeader::new(cell)
            .with_crc(with_crc)
            .encode(&mut result);
        result
    }

    /// Decodes a `base64` encoded BOC into a cell tree
    /// using the default cell context.
    #[cfg(any(feature = "base64", test))]
    #[inline]
    pub fn decode_base64<T: AsRef<[u8]>>(data: T) -> Result<Cell, de::Error> {
        fn decode_base64_impl(data: &[u8]) -> Result<Cell, de::Error> {
            match crate::util::decode_base64(data) {
                Ok(data) => Boc::decode_ext(data.as_slice(), &mut DefaultCellContext),
                Err(_) => Err(de::Error::UnknownBocTag),
            }
        }
        decode_base64_impl(data.as_ref())
    }

    /// Decodes a cell tree using the default cell context.
    #[inline]
    pub fn decode<T>(data: T) -> Result<Cell, de::Error>
    where
        T: AsRef<[u8]>,
    {
        fn decode_impl(data: &[u8]) -> Result<Cell, de::Error> {
            Boc::decode_ext(data, &mut DefaultCellContext)
        }
        decode_impl(data.as_ref())
    }

    /// Decodes a cell tree with a single root using the specified cell context.
    pub fn decode_ext(data: &[u8], context: &mut dyn CellContext) -> Result<Cell, de::Error> {
        let header = ok!(de::BocHeader::decode(data, &de::Options::exact(1)));

        let Some(&root) = header.roots().first() else {
            return Err(de::Error::RootCellNotFound);
        };

        let cells = ok!(header.finalize(context));
        match cells.get(root) {
            Some(root) => Ok(root),
            None => Err(de::Error::RootOutOfBounds),
        }
    }
}

/// Helper for encoding and decoding typed values as BOC.
pub struct BocRepr;

impl BocRepr {
    /// Encodes the specified value as BOC and
    /// returns the `base64` encoded bytes as a string.
    #[cfg(any(feature = "base64", test))]
    pub fn encode_base64<T: Store>(data: T) -> Result<String, crate::error::Error> {
        let boc = ok!(Self::encode(data));
        Ok(crate::util::encode_base64(boc))
    }

    /// Encodes the specified value as BOC.
    pub fn encode<T: Store>(data: T) -> Result<Vec<u8>, crate::error::Error> {
        let context = &mut Cell::empty_context();
        let mut builder = CellBuilder::new();
        ok!(data.store_into(&mut builder, context));
        let cell = ok!(builder.build_ext(context));
        Ok(Boc::encode(&cell))
    }

    /// Decodes a value from the `base64` encoded BOC.
    #[cfg(any(feature = "base64", test))]
    pub fn decode_base64<T, D>(data: D) -> Result<T, BocReprError>
    where
        for<'a> T: Load<'a>,
        D: AsRef<[u8]>,
    {
        let cell = match Boc::decode_base64(data) {
            Ok(cell) => cell,
            Err(e) => return Err(BocReprError::InvalidBoc(e)),
        };
        Self::parse(&cell)
    }

    /// Decodes a value from the BOC.
    pub fn decode<T, D>(data: D) -> Result<T, BocReprError>
    where
        for<'a> T: Load<'a>,
        D: AsRef<[u8]>,
    {
        let cell = match Boc::decode(data) {
            Ok(cell) => cell,
            Err(e) => return Err(BocReprError::InvalidBoc(e)),
        };
        Self::parse(&cell)
    }

    fn parse<T>(cell: &Cell) -> Result<T, BocReprError>
    where
        for<'a> T: Load<'a>,
    {
        let mut slice = match cell.as_slice() {
            Ok(slice) => slice,
            Err(e) => return Err(BocReprError::InvalidData(e)),
        };
        match T::load_from(&mut slice) {
            Ok(data) => Ok(data),
            Err(e) => Err(BocReprError::InvalidData(e)),
        }
    }
}

/// Error type for BOC repr decoding related errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BocReprError {
    /// Failed to decode BOC.
    #[error("invalid BOC")]
    InvalidBoc(#[source] de::Error),
    /// Failed to decode data from cells.
    #[error("failed to decode object from cells")]
    InvalidData(#[source] crate::error::Error),
}
