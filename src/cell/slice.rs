use num_bigint::{BigInt, BigUint};

use crate::cell::{Cell, CellBuilder, HashBytes};
use crate::error::Error;
use crate::util::unlikely;

/// A read-only view for a subrange of a cell.
///
/// Reads advance the window start monotonically, they never move back.
#[derive(Clone, Copy)]
pub struct CellSlice<'a> {
    data: &'a [u8],
    references: &'a [Cell],
    bits_window_start: u16,
    bits_window_end: u16,
    refs_window_start: u8,
    refs_window_end: u8,
}

impl Default for CellSlice<'_> {
    #[inline]
    fn default() -> Self {
        Self::from_raw_parts(&[], &[], 0)
    }
}

impl<'a> CellSlice<'a> {
    /// Constructs a new cell slice from the specified cell.
    ///
    /// Returns an error if the cell is exotic.
    pub fn new(cell: &'a Cell) -> Result<Self, Error> {
        let descriptor = cell.descriptor();
        if unlikely(descriptor.is_exotic()) {
            return Err(if descriptor.is_pruned_branch() {
                Error::PrunedBranchAccess
            } else {
                Error::InvalidCell
            });
        }
        Ok(Self::new_allow_exotic(cell))
    }

    /// Constructs a new cell slice from the specified cell, even if it is exotic.
    pub fn new_allow_exotic(cell: &'a Cell) -> Self {
        Self::from_raw_parts(cell.data(), cell.references(), cell.bit_len())
    }

    /// Constructs a slice over raw bits and references.
    pub(crate) fn from_raw_parts(data: &'a [u8], references: &'a [Cell], bit_len: u16) -> Self {
        Self {
            data,
            references,
            bits_window_start: 0,
            bits_window_end: bit_len,
            refs_window_start: 0,
            refs_window_end: references.len() as u8,
        }
    }

    /// Returns whether there are no data bits and refs left.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.is_data_empty() && self.is_refs_empty()
    }

    /// Returns whether there are no bits of data left.
    #[inline]
    pub const fn is_data_empty(&self) -> bool {
        self.bits_window_start >= self.bits_window_end
    }

    /// Returns whether there are no references left.
    #[inline]
    pub const fn is_refs_empty(&self) -> bool {
        self.refs_window_start >= self.refs_window_end
    }

    /// Returns the number of remaining bits of data in the slice.
    #[inline]
    pub const fn remaining_bits(&self) -> u16 {
        self.bits_window_end.saturating_sub(self.bits_window_start)
    }

    /// Returns the number of remaining references in the slice.
    #[inline]
    pub const fn remaining_refs(&self) -> u8 {
        self.refs_window_end.saturating_sub(self.refs_window_start)
    }

    /// Returns the start of the data window.
    #[inline]
    pub const fn offset_bits(&self) -> u16 {
        self.bits_window_start
    }

    /// Returns the start of the references window.
    #[inline]
    pub const fn offset_refs(&self) -> u8 {
        self.refs_window_start
    }

    /// Returns true if the slice contains at least `bits` and `refs`.
    #[inline]
    pub const fn has_remaining(&self, bits: u16, refs: u8) -> bool {
        self.bits_window_start as usize + bits as usize <= self.bits_window_end as usize
            && self.refs_window_start as usize + refs as usize <= self.refs_window_end as usize
    }

    /// Returns the remaining references.
    pub fn references(&self) -> &'a [Cell] {
        if self.is_refs_empty() {
            return &[];
        }
        &self.references[self.refs_window_start as usize..self.refs_window_end as usize]
    }

    /// Returns an error if the slice has any unread bits or references.
    pub fn end_parse(&self) -> Result<(), Error> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::TrailingData)
        }
    }

    /// Tries to advance the start of data and refs windows.
    pub fn skip_first(&mut self, bits: u16, refs: u8) -> Result<(), Error> {
        if unlikely(!self.has_remaining(bits, 0)) {
            return Err(Error::CellUnderflow);
        }
        if unlikely(!self.has_remaining(0, refs)) {
            return Err(Error::RefUnderflow);
        }
        self.bits_window_start += bits;
        self.refs_window_start += refs;
        Ok(())
    }

    /// Returns a slice starting at the same bits and refs offsets,
    /// and containing no more than `bits` of data and `refs` of children.
    pub fn get_prefix(&self, bits: u16, refs: u8) -> Self {
        Self {
            bits_window_end: std::cmp::min(self.bits_window_start + bits, self.bits_window_end),
            refs_window_end: std::cmp::min(self.refs_window_start + refs, self.refs_window_end),
            ..*self
        }
    }

    /// Returns a subslice with the first `bits` and `refs` and advances this slice.
    pub fn load_prefix(&mut self, bits: u16, refs: u8) -> Result<Self, Error> {
        let prefix = self.get_prefix(bits, refs);
        ok!(self.skip_first(bits, refs));
        Ok(prefix)
    }

    /// Returns the rest of the slice, leaving this one empty.
    pub fn load_remaining(&mut self) -> Self {
        let result = *self;
        self.bits_window_start = self.bits_window_end;
        self.refs_window_start = self.refs_window_end;
        result
    }

    /// Tries to read the bit at the specified offset (relative to the current bits window).
    pub fn get_bit(&self, offset: u16) -> Result<bool, Error> {
        if self.bits_window_start as usize + (offset as usize) < self.bits_window_end as usize {
            let index = self.bits_window_start + offset;
            let byte = self.data[(index / 8) as usize];
            Ok((byte >> (7 - index % 8)) & 1 != 0)
        } else {
            Err(Error::CellUnderflow)
        }
    }

    /// Tries to read the next bit, incrementing the bits window start.
    pub fn load_bit(&mut self) -> Result<bool, Error> {
        let bit = ok!(self.get_bit(0));
        self.bits_window_start += 1;
        Ok(bit)
    }

    /// Reads `bits` starting from `offset` into the left-aligned `target` buffer.
    ///
    /// Returns the filled part of the buffer.
    pub fn get_raw<'b>(
        &self,
        offset: u16,
        target: &'b mut [u8],
        bits: u16,
    ) -> Result<&'b mut [u8], Error> {
        if bits == 0 {
            return Ok(&mut target[..0]);
        }

        let start = self.bits_window_start as usize + offset as usize;
        let byte_len = ((bits + 7) / 8) as usize;
        if unlikely(start + bits as usize > self.bits_window_end as usize || target.len() < byte_len)
        {
            return Err(Error::CellUnderflow);
        }

        let q = start / 8;
        let r = (start % 8) as u32;
        let target = &mut target[..byte_len];

        if r == 0 {
            target.copy_from_slice(&self.data[q..q + byte_len]);
        } else {
            // xxxyyyyy|yyyzzzzz -> yyyyyyyy
            for (i, byte) in target.iter_mut().enumerate() {
                let hi = self.data[q + i] << r;
                let lo = match self.data.get(q + i + 1) {
                    Some(next) => next >> (8 - r),
                    None => 0,
                };
                *byte = hi | lo;
            }
        }

        let rem = bits % 8;
        if rem != 0 {
            target[byte_len - 1] &= 0xff << (8 - rem);
        }

        Ok(target)
    }

    /// Reads `bits` into the left-aligned `target` buffer and advances the window.
    pub fn load_raw<'b>(&mut self, target: &'b mut [u8], bits: u16) -> Result<&'b mut [u8], Error> {
        let data = ok!(self.get_raw(0, target, bits));
        self.bits_window_start += bits;
        Ok(data)
    }

    /// Reads `u64` from the cell (but only the specified number of bits)
    /// starting from the `offset`.
    pub fn get_uint(&self, offset: u16, bits: u16) -> Result<u64, Error> {
        if bits == 0 {
            return Ok(0);
        }
        if unlikely(bits > 64) {
            return Err(Error::IntOverflow);
        }

        let mut buffer = [0u8; 8];
        ok!(self.get_raw(offset, &mut buffer, bits));
        Ok(u64::from_be_bytes(buffer) >> (64 - bits))
    }

    /// Reads `u64` from the cell (but only the specified number of bits)
    /// and advances the window.
    pub fn load_uint(&mut self, bits: u16) -> Result<u64, Error> {
        let value = ok!(self.get_uint(0, bits));
        self.bits_window_start += bits;
        Ok(value)
    }

    /// Reads `u8` from the cell (but only the specified number of bits).
    pub fn load_small_uint(&mut self, bits: u16) -> Result<u8, Error> {
        if unlikely(bits > 8) {
            return Err(Error::IntOverflow);
        }
        Ok(ok!(self.load_uint(bits)) as u8)
    }

    /// Reads a two's complement `i64` of the specified number of bits
    /// and advances the window.
    pub fn load_int(&mut self, bits: u16) -> Result<i64, Error> {
        if bits == 0 {
            return Ok(0);
        }
        if unlikely(bits > 64) {
            return Err(Error::IntOverflow);
        }

        let mut buffer = [0u8; 8];
        ok!(self.load_raw(&mut buffer, bits));
        Ok(i64::from_be_bytes(buffer) >> (64 - bits))
    }

    /// Reads `u8` and advances the window.
    #[inline]
    pub fn load_u8(&mut self) -> Result<u8, Error> {
        self.load_small_uint(8)
    }

    /// Reads `u16` and advances the window.
    #[inline]
    pub fn load_u16(&mut self) -> Result<u16, Error> {
        Ok(ok!(self.load_uint(16)) as u16)
    }

    /// Reads `u32` and advances the window.
    #[inline]
    pub fn load_u32(&mut self) -> Result<u32, Error> {
        Ok(ok!(self.load_uint(32)) as u32)
    }

    /// Reads `u64` and advances the window.
    #[inline]
    pub fn load_u64(&mut self) -> Result<u64, Error> {
        self.load_uint(64)
    }

    /// Reads `u128` and advances the window.
    pub fn load_u128(&mut self) -> Result<u128, Error> {
        let mut buffer = [0u8; 16];
        ok!(self.load_raw(&mut buffer, 128));
        Ok(u128::from_be_bytes(buffer))
    }

    /// Reads 32 bytes and advances the window.
    pub fn load_u256(&mut self) -> Result<HashBytes, Error> {
        let mut buffer = HashBytes::ZERO;
        ok!(self.load_raw(&mut buffer.0, 256));
        Ok(buffer)
    }

    /// Reads a big integer of the specified number of bits, as a two's complement
    /// integer when `signed` is true.
    pub fn load_bigint(&mut self, bits: u16, signed: bool) -> Result<BigInt, Error> {
        if bits == 0 {
            return Ok(BigInt::default());
        }

        let mut buffer = [0u8; 128];
        let raw = ok!(self.load_raw(&mut buffer, bits));
        let is_negative = signed && raw[0] & 0x80 != 0;

        let value = BigUint::from_bytes_be(raw) >> (raw.len() * 8 - bits as usize);
        let value = BigInt::from(value);
        Ok(if is_negative {
            value - (BigInt::from(1) << bits)
        } else {
            value
        })
    }

    /// Reads an unsigned big integer of the specified number of bits.
    pub fn load_biguint(&mut self, bits: u16) -> Result<BigUint, Error> {
        if bits == 0 {
            return Ok(BigUint::default());
        }

        let mut buffer = [0u8; 128];
        let raw = ok!(self.load_raw(&mut buffer, bits));
        Ok(BigUint::from_bytes_be(raw) >> (raw.len() * 8 - bits as usize))
    }

    /// Returns a reference to the Nth child cell (relative to this slice's refs window).
    pub fn get_reference(&self, index: u8) -> Result<&'a Cell, Error> {
        if self.refs_window_start as usize + (index as usize) < self.refs_window_end as usize {
            Ok(&self.references[(self.refs_window_start + index) as usize])
        } else {
            Err(Error::RefUnderflow)
        }
    }

    /// Returns a reference to the next child cell, advancing the refs window.
    pub fn load_reference(&mut self) -> Result<&'a Cell, Error> {
        let cell = ok!(self.get_reference(0));
        self.refs_window_start += 1;
        Ok(cell)
    }

    /// Returns the next child cell, advancing the refs window.
    pub fn load_reference_cloned(&mut self) -> Result<Cell, Error> {
        match self.load_reference() {
            Ok(cell) => Ok(cell.clone()),
            Err(e) => Err(e),
        }
    }

    /// Returns the next child cell as a slice, advancing the refs window.
    pub fn load_reference_as_slice(&mut self) -> Result<CellSlice<'a>, Error> {
        match self.load_reference() {
            Ok(cell) => cell.as_slice(),
            Err(e) => Err(e),
        }
    }

    /// Checks whether all remaining data bits are the same.
    ///
    /// Returns the value of these bits or `None` if they differ (or the slice is empty).
    pub fn test_uniform(&self) -> Option<bool> {
        let bits = self.remaining_bits();
        if bits == 0 {
            return None;
        }

        let mut buffer = [0u8; 128];
        let raw = self.get_raw(0, &mut buffer, bits).ok()?;

        let value = raw[0] & 0x80 != 0;
        let expected = if value { 0xff } else { 0x00 };

        let full = (bits / 8) as usize;
        if raw[..full].iter().any(|byte| *byte != expected) {
            return None;
        }

        let rem = bits % 8;
        if rem != 0 {
            let mask = 0xffu8 << (8 - rem);
            if raw[full] & mask != expected & mask {
                return None;
            }
        }

        Some(value)
    }

    /// Returns the length of the longest common data prefix of two slices.
    pub fn common_data_prefix_len(&self, other: &CellSlice<'_>) -> u16 {
        let bits = std::cmp::min(self.remaining_bits(), other.remaining_bits());

        let mut lhs = [0u8; 128];
        let mut rhs = [0u8; 128];
        let (Ok(lhs), Ok(rhs)) = (
            self.get_raw(0, &mut lhs, bits),
            other.get_raw(0, &mut rhs, bits),
        ) else {
            return 0;
        };

        for (i, (a, b)) in lhs.iter().zip(rhs.iter()).enumerate() {
            if a != b {
                let same = i as u16 * 8 + (a ^ b).leading_zeros() as u16;
                return std::cmp::min(same, bits);
            }
        }
        bits
    }

    /// Copies the remaining data bits and references into a new builder.
    pub fn to_builder(&self) -> Result<CellBuilder, Error> {
        let mut builder = CellBuilder::new();
        ok!(builder.store_slice(self));
        Ok(builder)
    }
}

impl std::fmt::Debug for CellSlice<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut buffer = [0u8; 128];
        let bits = self.remaining_bits();
        let data = match self.get_raw(0, &mut buffer, bits) {
            Ok(data) => crate::util::Bitstring {
                bytes: data,
                bit_len: bits,
            }
            .to_string(),
            Err(_) => String::new(),
        };

        f.debug_struct("CellSlice")
            .field("data", &data)
            .field("bits", &bits)
            .field("refs", &self.references())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_cell<F>(f: F) -> Cell
    where
        F: FnOnce(&mut CellBuilder) -> Result<(), Error>,
    {
        let mut builder = CellBuilder::new();
        f(&mut builder).unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn reads_past_end_fail() {
        let cell = build_cell(|b| b.store_small_uint(0b101, 3));
        let mut slice = cell.as_slice().unwrap();

        assert_eq!(slice.load_uint(4), Err(Error::CellUnderflow));
        assert_eq!(slice.remaining_bits(), 3);
        assert_eq!(slice.load_uint(3).unwrap(), 0b101);
        assert_eq!(slice.load_bit(), Err(Error::CellUnderflow));
        assert_eq!(slice.load_reference().unwrap_err(), Error::RefUnderflow);
    }

    #[test]
    fn end_parse_detects_trailing_data() {
        let child = Cell::empty_cell();
        let cell = build_cell(|b| {
            b.store_u8(0xaa)?;
            b.store_bit_one()?;
            b.store_reference(child.clone())
        });

        let mut slice = cell.as_slice().unwrap();
        assert_eq!(slice.load_u8().unwrap(), 0xaa);
        assert_eq!(slice.end_parse(), Err(Error::TrailingData));
        assert!(slice.load_bit().unwrap());
        assert_eq!(slice.end_parse(), Err(Error::TrailingData));
        assert_eq!(slice.load_reference().unwrap(), &child);
        slice.end_parse().unwrap();
    }

    #[test]
    fn unaligned_reads() {
        let cell = build_cell(|b| {
            b.store_small_uint(0b011, 3)?;
            b.store_u32(0xdeadbeef)?;
            b.store_int(-5, 7)
        });

        let mut slice = cell.as_slice().unwrap();
        assert_eq!(slice.get_bit(1).unwrap(), true);
        slice.skip_first(3, 0).unwrap();
        assert_eq!(slice.load_u32().unwrap(), 0xdeadbeef);
        assert_eq!(slice.load_int(7).unwrap(), -5);
        assert!(slice.is_empty());
    }

    #[test]
    fn uniform_and_prefix() {
        let a = CellBuilder::from_raw_data(&[0xff, 0xc0], 10).unwrap();
        assert_eq!(a.as_data_slice().test_uniform(), Some(true));

        let b = CellBuilder::from_raw_data(&[0x00, 0x00], 13).unwrap();
        assert_eq!(b.as_data_slice().test_uniform(), Some(false));

        let c = CellBuilder::from_raw_data(&[0xf0, 0x00], 12).unwrap();
        assert_eq!(c.as_data_slice().test_uniform(), None);

        assert_eq!(a.as_data_slice().common_data_prefix_len(&c.as_data_slice()), 4);
        assert_eq!(a.as_data_slice().common_data_prefix_len(&a.as_data_slice()), 10);
        assert_eq!(b.as_data_slice().common_data_prefix_len(&c.as_data_slice()), 0);
    }

    #[test]
    fn exotic_cells_are_not_sliced() {
        let mut builder = CellBuilder::new();
        builder.set_exotic(true);
        builder.store_u8(2).unwrap();
        builder.store_u256(&HashBytes([0x11; 32])).unwrap();
        let library = builder.build().unwrap();

        assert_eq!(library.as_slice().unwrap_err(), Error::InvalidCell);
        assert_eq!(library.as_slice_allow_exotic().remaining_bits(), 8 + 256);
    }
}
