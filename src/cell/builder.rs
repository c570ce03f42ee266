use num_bigint::{BigInt, BigUint, Sign};
use smallvec::SmallVec;

use crate::cell::{
    Cell, CellContext, CellDescriptor, CellParts, CellSlice, CellType, DefaultCellContext,
    HashBytes, LevelMask, Store, MAX_BIT_LEN, MAX_REF_COUNT,
};
use crate::error::Error;
use crate::util::{unlikely, Bitstring};

/// Builder for constructing cells with densely packed data.
///
/// Every store operation either fully succeeds or leaves the builder untouched.
#[derive(Clone)]
pub struct CellBuilder {
    data: [u8; 128],
    bit_len: u16,
    is_exotic: bool,
    references: SmallVec<[Cell; MAX_REF_COUNT]>,
}

impl Default for CellBuilder {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Eq for CellBuilder {}

impl PartialEq for CellBuilder {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.bit_len == other.bit_len
            && self.is_exotic == other.is_exotic
            && self.data == other.data
            && self.references.as_slice() == other.references.as_slice()
    }
}

impl std::fmt::Debug for CellBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellBuilder")
            .field("data", &self.display_data().to_string())
            .field("bit_len", &self.bit_len)
            .field("is_exotic", &self.is_exotic)
            .field("references", &self.references.as_slice())
            .finish()
    }
}

impl CellBuilder {
    /// Builds a new cell from the specified data using the default cell context.
    #[inline]
    pub fn build_from<T>(data: T) -> Result<Cell, Error>
    where
        T: Store,
    {
        Self::build_from_ext(data, &mut DefaultCellContext)
    }

    /// Builds a new cell from the specified data using the provided cell context.
    pub fn build_from_ext<T>(data: T, context: &mut dyn CellContext) -> Result<Cell, Error>
    where
        T: Store,
    {
        let mut builder = Self::new();
        ok!(data.store_into(&mut builder, context));
        builder.build_ext(context)
    }

    /// Creates an empty cell builder.
    pub fn new() -> Self {
        Self {
            data: [0; 128],
            bit_len: 0,
            is_exotic: false,
            references: SmallVec::new(),
        }
    }

    /// Tries to create a cell builder with the specified data.
    ///
    /// NOTE: if `bits` is greater than `bytes * 8`, pads the value with zeros (as high bits).
    pub fn from_raw_data(value: &[u8], bits: u16) -> Result<Self, Error> {
        let mut res = Self::new();
        ok!(res.store_raw(value, bits));
        Ok(res)
    }

    /// Returns a slice which contains only builder data bits and no references.
    pub fn as_data_slice(&self) -> CellSlice<'_> {
        CellSlice::from_raw_parts(&self.data, &[], self.bit_len)
    }

    /// Returns a slice which contains builder data and references.
    pub fn as_full_slice(&self) -> CellSlice<'_> {
        CellSlice::from_raw_parts(&self.data, &self.references, self.bit_len)
    }

    /// Returns an underlying cell data.
    #[inline]
    pub const fn raw_data(&self) -> &[u8; 128] {
        &self.data
    }

    /// Returns the data size of this cell in bits.
    #[inline]
    pub const fn bit_len(&self) -> u16 {
        self.bit_len
    }

    /// Returns child cell references.
    #[inline]
    pub fn references(&self) -> &[Cell] {
        &self.references
    }

    /// Returns remaining data capacity in bits.
    #[inline]
    pub const fn spare_bits_capacity(&self) -> u16 {
        MAX_BIT_LEN - self.bit_len
    }

    /// Returns remaining references capacity.
    #[inline]
    pub fn spare_refs_capacity(&self) -> u8 {
        (MAX_REF_COUNT - self.references.len()) as u8
    }

    /// Returns true if there is enough remaining capacity to fit `bits` and `refs`.
    #[inline]
    pub fn has_capacity(&self, bits: u16, refs: u8) -> bool {
        self.bit_len as usize + bits as usize <= MAX_BIT_LEN as usize
            && self.references.len() + refs as usize <= MAX_REF_COUNT
    }

    /// Returns whether this cell will be built as an exotic.
    #[inline]
    pub const fn is_exotic(&self) -> bool {
        self.is_exotic
    }

    /// Marks this cell as exotic.
    #[inline]
    pub fn set_exotic(&mut self, is_exotic: bool) {
        self.is_exotic = is_exotic;
    }

    /// Computes the cell level mask from children.
    pub fn compute_level_mask(&self) -> LevelMask {
        let mut children_mask = LevelMask::EMPTY;
        for child in &self.references {
            children_mask |= child.level_mask();
        }
        children_mask
    }

    /// Tries to store the specified number of zero bits in the cell.
    pub fn store_zeros(&mut self, bits: u16) -> Result<(), Error> {
        if self.has_capacity(bits, 0) {
            // Bits beyond `bit_len` are always zero
            self.bit_len += bits;
            Ok(())
        } else {
            Err(Error::CellOverflow)
        }
    }

    /// Tries to store the specified number of set bits in the cell.
    pub fn store_ones(&mut self, bits: u16) -> Result<(), Error> {
        if !self.has_capacity(bits, 0) {
            return Err(Error::CellOverflow);
        }

        const ONES: [u8; 128] = [0xff; 128];
        self.store_raw(&ONES, bits)
    }

    /// Tries to store one zero bit in the cell.
    #[inline]
    pub fn store_bit_zero(&mut self) -> Result<(), Error> {
        self.store_zeros(1)
    }

    /// Tries to store one non-zero bit in the cell.
    pub fn store_bit_one(&mut self) -> Result<(), Error> {
        if self.bit_len < MAX_BIT_LEN {
            let q = (self.bit_len / 8) as usize;
            let r = self.bit_len % 8;
            self.data[q] |= 1 << (7 - r);
            self.bit_len += 1;
            Ok(())
        } else {
            Err(Error::CellOverflow)
        }
    }

    /// Tries to store one bit in the cell.
    #[inline]
    pub fn store_bit(&mut self, value: bool) -> Result<(), Error> {
        if value {
            self.store_bit_one()
        } else {
            self.store_bit_zero()
        }
    }

    /// Tries to store `u8` in the cell.
    pub fn store_u8(&mut self, value: u8) -> Result<(), Error> {
        self.store_raw(&[value], 8)
    }

    /// Tries to store `u16` in the cell.
    pub fn store_u16(&mut self, value: u16) -> Result<(), Error> {
        self.store_raw(&value.to_be_bytes(), 16)
    }

    /// Tries to store `u32` in the cell.
    pub fn store_u32(&mut self, value: u32) -> Result<(), Error> {
        self.store_raw(&value.to_be_bytes(), 32)
    }

    /// Tries to store `u64` in the cell.
    pub fn store_u64(&mut self, value: u64) -> Result<(), Error> {
        self.store_raw(&value.to_be_bytes(), 64)
    }

    /// Tries to store `u128` in the cell.
    pub fn store_u128(&mut self, value: u128) -> Result<(), Error> {
        self.store_raw(&value.to_be_bytes(), 128)
    }

    /// Tries to store 32 bytes in the cell.
    pub fn store_u256(&mut self, value: &HashBytes) -> Result<(), Error> {
        self.store_raw(value.as_slice(), 256)
    }

    /// Tries to store `u8` in the cell, but only the specified number of bits.
    ///
    /// Fails with [`Error::IntOverflow`] if the value does not fit into `bits`.
    pub fn store_small_uint(&mut self, value: u8, bits: u16) -> Result<(), Error> {
        if bits > 8 {
            return self.store_uint(value as u64, bits);
        }
        if unlikely(bits < 8 && value >> bits != 0) {
            return Err(Error::IntOverflow);
        }
        if bits == 0 {
            return Ok(());
        }
        self.store_raw(&[value << (8 - bits)], bits)
    }

    /// Tries to store `u64` in the cell, but only the specified number of bits.
    ///
    /// Widths above 64 bits are padded with leading zeros.
    /// Fails with [`Error::IntOverflow`] if the value does not fit into `bits`.
    pub fn store_uint(&mut self, value: u64, bits: u16) -> Result<(), Error> {
        if unlikely(bits < 64 && value >> bits != 0) {
            return Err(Error::IntOverflow);
        }
        if unlikely(!self.has_capacity(bits, 0)) {
            return Err(Error::CellOverflow);
        }
        if bits == 0 {
            return Ok(());
        }

        let mut bits = bits;
        if bits > 64 {
            ok!(self.store_zeros(bits - 64));
            bits = 64;
        }

        let bytes = (value << (64 - bits)).to_be_bytes();
        self.store_raw(&bytes, bits)
    }

    /// Tries to store `i64` in the cell as a two's complement integer
    /// of the specified number of bits.
    ///
    /// Fails with [`Error::IntOverflow`] if the value does not fit into `bits`.
    pub fn store_int(&mut self, value: i64, bits: u16) -> Result<(), Error> {
        if bits == 0 {
            return if value == 0 {
                Ok(())
            } else {
                Err(Error::IntOverflow)
            };
        }
        if bits < 64 {
            let bound = 1i64 << (bits - 1);
            if unlikely(value < -bound || value >= bound) {
                return Err(Error::IntOverflow);
            }
        }
        if unlikely(!self.has_capacity(bits, 0)) {
            return Err(Error::CellOverflow);
        }

        let mut bits = bits;
        if bits > 64 {
            let padding = bits - 64;
            ok!(if value < 0 {
                self.store_ones(padding)
            } else {
                self.store_zeros(padding)
            });
            bits = 64;
        }

        let bytes = ((value as u64) << (64 - bits)).to_be_bytes();
        self.store_raw(&bytes, bits)
    }

    /// Tries to store a big integer in the cell as a two's complement integer
    /// of the specified number of bits (or as an unsigned integer if `signed` is false).
    ///
    /// Fails with [`Error::IntOverflow`] if the value does not fit into `bits`.
    pub fn store_bigint(&mut self, value: &BigInt, bits: u16, signed: bool) -> Result<(), Error> {
        if unlikely(!bigint_fits(value, bits, signed)) {
            return Err(Error::IntOverflow);
        }
        if unlikely(!self.has_capacity(bits, 0)) {
            return Err(Error::CellOverflow);
        }
        if bits == 0 {
            return Ok(());
        }

        let unsigned = if value.sign() == Sign::Minus {
            // Two's complement: 2^bits - |value|
            (BigUint::from(1u8) << bits) - value.magnitude()
        } else {
            value.magnitude().clone()
        };
        self.store_biguint_unchecked(&unsigned, bits)
    }

    /// Tries to store an unsigned big integer in the cell.
    ///
    /// Fails with [`Error::IntOverflow`] if the value does not fit into `bits`.
    pub fn store_biguint(&mut self, value: &BigUint, bits: u16) -> Result<(), Error> {
        if unlikely(value.bits() > bits as u64) {
            return Err(Error::IntOverflow);
        }
        if unlikely(!self.has_capacity(bits, 0)) {
            return Err(Error::CellOverflow);
        }
        if bits == 0 {
            return Ok(());
        }
        self.store_biguint_unchecked(value, bits)
    }

    fn store_biguint_unchecked(&mut self, value: &BigUint, bits: u16) -> Result<(), Error> {
        let byte_len = ((bits + 7) / 8) as usize;

        // Align the value to the left edge of the byte buffer
        let aligned = value << (byte_len * 8 - bits as usize);
        let bytes = aligned.to_bytes_be();
        if unlikely(bytes.len() > byte_len) {
            return Err(Error::IntOverflow);
        }

        let mut buffer = [0u8; 128];
        buffer[byte_len - bytes.len()..byte_len].copy_from_slice(&bytes);
        self.store_raw(&buffer[..byte_len], bits)
    }

    /// Tries to store bytes in the cell (but only the specified number of bits).
    ///
    /// NOTE: if `bits` is greater than `value.len() * 8`, pads the value with zeros (as high bits).
    pub fn store_raw(&mut self, value: &[u8], bits: u16) -> Result<(), Error> {
        if unlikely(!self.has_capacity(bits, 0)) {
            return Err(Error::CellOverflow);
        }

        let available = (value.len() * 8).min(u16::MAX as usize) as u16;
        let mut bits = bits;
        if bits > available {
            ok!(self.store_zeros(bits - available));
            bits = available;
        }
        if bits == 0 {
            return Ok(());
        }

        let q = (self.bit_len / 8) as usize;
        let r = self.bit_len % 8;
        let byte_len = ((bits + 7) / 8) as usize;
        let value = &value[..byte_len];

        if r == 0 {
            self.data[q..q + byte_len].copy_from_slice(value);
        } else {
            // yyyxxxxx|xxx00000
            for (i, byte) in value.iter().enumerate() {
                self.data[q + i] |= byte >> r;
                if q + i + 1 < self.data.len() {
                    self.data[q + i + 1] = byte << (8 - r);
                }
            }
        }

        let touched_end = std::cmp::min(q + byte_len + 1, self.data.len());
        self.bit_len += bits;

        // Clear everything written past the new end
        let used_bytes = ((self.bit_len + 7) / 8) as usize;
        if used_bytes < touched_end {
            self.data[used_bytes..touched_end].fill(0);
        }
        let rem = self.bit_len % 8;
        if rem != 0 {
            self.data[used_bytes - 1] &= 0xff << (8 - rem);
        }

        Ok(())
    }

    /// Tries to store all data bits of the specified cell slice.
    pub fn store_slice_data(&mut self, value: &CellSlice<'_>) -> Result<(), Error> {
        let bits = value.remaining_bits();
        if unlikely(!self.has_capacity(bits, 0)) {
            return Err(Error::CellOverflow);
        }

        let mut buffer = [0u8; 128];
        let data = ok!(value.get_raw(0, &mut buffer, bits));
        self.store_raw(data, bits)
    }

    /// Tries to store the remaining slice data and references in the cell.
    pub fn store_slice(&mut self, value: &CellSlice<'_>) -> Result<(), Error> {
        if unlikely(!self.has_capacity(value.remaining_bits(), value.remaining_refs())) {
            return Err(Error::CellOverflow);
        }

        ok!(self.store_slice_data(value));
        for cell in value.references() {
            ok!(self.store_reference(cell.clone()));
        }
        Ok(())
    }

    /// Tries to append a builder (its data and references).
    pub fn store_builder(&mut self, builder: &CellBuilder) -> Result<(), Error> {
        self.store_slice(&builder.as_full_slice())
    }

    /// Tries to store a child in the cell.
    ///
    /// Fails with [`Error::CellOverflow`] if there are already 4 references.
    pub fn store_reference(&mut self, cell: Cell) -> Result<(), Error> {
        if self.references.len() < MAX_REF_COUNT {
            self.references.push(cell);
            Ok(())
        } else {
            Err(Error::CellOverflow)
        }
    }

    /// Returns an object which will display data as a bitstring
    /// with a termination bit.
    #[inline]
    pub fn display_data(&self) -> Bitstring<'_> {
        Bitstring {
            bytes: &self.data,
            bit_len: self.bit_len,
        }
    }

    /// Tries to build a new cell using the default cell context.
    #[inline]
    pub fn build(self) -> Result<Cell, Error> {
        self.build_ext(&mut DefaultCellContext)
    }

    /// Tries to build a new cell using the specified cell context.
    pub fn build_ext(mut self, context: &mut dyn CellContext) -> Result<Cell, Error> {
        debug_assert!(self.bit_len <= MAX_BIT_LEN);
        debug_assert!(self.references.len() <= MAX_REF_COUNT);

        let children_mask = self.compute_level_mask();

        let level_mask = if self.is_exotic {
            // Exotic cells describe their level themselves
            match CellType::from_byte_exotic(self.data[0]) {
                Some(CellType::PrunedBranch) => LevelMask::new(self.data[1]),
                Some(CellType::MerkleProof | CellType::MerkleUpdate) => children_mask.virtualize(1),
                Some(CellType::LibraryReference) => LevelMask::EMPTY,
                _ => return Err(Error::InvalidCell),
            }
        } else {
            children_mask
        };

        let d1 = CellDescriptor::compute_d1(
            level_mask,
            self.is_exotic,
            self.references.len() as u8,
        );
        let d2 = CellDescriptor::compute_d2(self.bit_len);

        let rem = self.bit_len % 8;
        let last_byte = (self.bit_len / 8) as usize;
        if rem > 0 {
            let last_byte = &mut self.data[last_byte];

            // x0000000 - rem=1, tag_mask=01000000, data_mask=11000000
            // xx000000 - rem=2, tag_mask=00100000, data_mask=11100000
            // xxx00000 - rem=3, tag_mask=00010000, data_mask=11110000
            // xxxx0000 - rem=4, tag_mask=00001000, data_mask=11111000
            // xxxxx000 - rem=5, tag_mask=00000100, data_mask=11111100
            // xxxxxx00 - rem=6, tag_mask=00000010, data_mask=11111110
            // xxxxxxx0 - rem=7, tag_mask=00000001, data_mask=11111111
            let tag_mask: u8 = 1 << (7 - rem);
            let data_mask = !(tag_mask - 1);

            // xxxxyyyy & data_mask -> xxxxy000 | tag_mask -> xxxx1000
            *last_byte = (*last_byte & data_mask) | tag_mask;
        }

        let byte_len = ((self.bit_len + 7) / 8) as usize;
        let data = &self.data[..byte_len];

        context.finalize_cell(CellParts {
            bit_len: self.bit_len,
            descriptor: CellDescriptor { d1, d2 },
            children_mask,
            references: self.references,
            data,
        })
    }
}

fn bigint_fits(value: &BigInt, bits: u16, signed: bool) -> bool {
    let bits = bits as u64;
    match value.sign() {
        Sign::NoSign => true,
        Sign::Plus if signed => value.bits() < bits,
        Sign::Plus => value.bits() <= bits,
        Sign::Minus if signed => {
            // -2^(bits-1) is the lowest value, so check |value| - 1
            let magnitude = value.magnitude() - 1u32;
            magnitude.bits() < bits
        }
        Sign::Minus => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_uint_checks_range() {
        let mut builder = CellBuilder::new();
        assert_eq!(builder.store_uint(256, 8), Err(Error::IntOverflow));
        assert_eq!(builder.bit_len(), 0);

        builder.store_uint(255, 8).unwrap();
        assert_eq!(builder.bit_len(), 8);

        let cell = builder.build().unwrap();
        assert_eq!(cell.as_slice().unwrap().load_uint(8).unwrap(), 255);
    }

    #[test]
    fn store_int_checks_range() {
        let mut builder = CellBuilder::new();
        assert_eq!(builder.store_int(128, 8), Err(Error::IntOverflow));
        assert_eq!(builder.store_int(-129, 8), Err(Error::IntOverflow));
        builder.store_int(-128, 8).unwrap();
        builder.store_int(127, 8).unwrap();
        builder.store_int(-1, 3).unwrap();
        assert_eq!(builder.store_int(1, 0), Err(Error::IntOverflow));

        let cell = builder.build().unwrap();
        let mut slice = cell.as_slice().unwrap();
        assert_eq!(slice.load_int(8).unwrap(), -128);
        assert_eq!(slice.load_int(8).unwrap(), 127);
        assert_eq!(slice.load_int(3).unwrap(), -1);
        assert!(slice.is_data_empty());
    }

    #[test]
    fn capacity_is_enforced() {
        let mut builder = CellBuilder::new();
        builder.store_zeros(MAX_BIT_LEN).unwrap();
        assert_eq!(builder.store_bit_one(), Err(Error::CellOverflow));
        assert_eq!(builder.store_bit_zero(), Err(Error::CellOverflow));
        assert_eq!(builder.store_u8(1), Err(Error::CellOverflow));

        let mut builder = CellBuilder::new();
        assert_eq!(builder.store_zeros(1024), Err(Error::CellOverflow));

        for _ in 0..MAX_REF_COUNT {
            builder.store_reference(Cell::empty_cell()).unwrap();
        }
        assert_eq!(
            builder.store_reference(Cell::empty_cell()),
            Err(Error::CellOverflow)
        );
    }

    #[test]
    fn unaligned_raw_stores() {
        let mut builder = CellBuilder::new();
        builder.store_bit_one().unwrap();
        builder.store_raw(&[0xab, 0xcd], 12).unwrap();
        builder.store_small_uint(0b101, 3).unwrap();
        assert_eq!(builder.bit_len(), 16);
        assert_eq!(&builder.raw_data()[..3], &[0xd5, 0xe5, 0x00]);
    }

    #[test]
    fn completion_tag() {
        let mut builder = CellBuilder::new();
        builder.store_small_uint(0b1, 1).unwrap();
        let cell = builder.build().unwrap();
        assert_eq!(cell.data(), &[0b1100_0000]);
        assert_eq!(cell.descriptor().d2, 1);

        let mut builder = CellBuilder::new();
        builder.store_u8(0xff).unwrap();
        let cell = builder.build().unwrap();
        assert_eq!(cell.data(), &[0xff]);
        assert_eq!(cell.descriptor().d2, 2);
    }

    #[test]
    fn store_bigints() {
        let mut builder = CellBuilder::new();
        let max = (BigInt::from(1) << 256) - 1;
        builder.store_bigint(&max, 257, true).unwrap();
        assert_eq!(
            builder.store_bigint(&(BigInt::from(1) << 256), 257, true),
            Err(Error::IntOverflow)
        );
        let min: BigInt = -(BigInt::from(1) << 256u32);
        builder.store_bigint(&min, 257, true).unwrap();
        assert_eq!(
            builder.store_bigint(&(min.clone() - 1), 257, true),
            Err(Error::IntOverflow)
        );
        assert_eq!(
            builder.store_bigint(&BigInt::from(-1), 8, false),
            Err(Error::IntOverflow)
        );

        let cell = builder.build().unwrap();
        let mut slice = cell.as_slice().unwrap();
        assert_eq!(slice.load_bigint(257, true).unwrap(), max);
        assert_eq!(slice.load_bigint(257, true).unwrap(), min);
    }
}
