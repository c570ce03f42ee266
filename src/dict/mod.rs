//! Dictionary implementation.

use crate::cell::*;
use crate::error::Error;
use crate::num::{IntN, UintN};
use crate::util::unlikely;

pub use self::raw::{RawDict, RawIter};
pub use self::typed::{Dict, Iter, Keys, Values};

mod raw;
mod typed;

/// Type which can be used as a dictionary key.
pub trait DictKey: Sized {
    /// Length in bits for a dictionary key.
    const BITS: u16;

    /// Whether the key is a two's complement integer.
    ///
    /// Negative keys have the high bit set, so signed keys
    /// are iterated starting from the right root branch.
    const SIGNED: bool = false;

    /// Creates a key from a raw builder data.
    fn from_raw_data(raw_data: &[u8; 128]) -> Option<Self>;
}

macro_rules! impl_dict_key {
    ($($ty:ty => $bits:literal $(, $signed:literal)? => |$raw_data:ident| $expr:expr),*,) => {
        $(impl DictKey for $ty {
            const BITS: u16 = $bits;
            $(const SIGNED: bool = $signed;)?

            #[inline]
            fn from_raw_data($raw_data: &[u8; 128]) -> Option<Self> {
                $expr
            }
        })*
    };
}

impl_dict_key! {
    bool => 1 => |d| Some(d[0] & 0x80 != 0),
    u8 => 8 => |d| Some(d[0]),
    i8 => 8, true => |d| Some(d[0] as i8),
    u16 => 16 => |d| Some(u16::from_be_bytes([d[0], d[1]])),
    i16 => 16, true => |d| Some(i16::from_be_bytes([d[0], d[1]])),
    u32 => 32 => |d| d[..4].try_into().ok().map(u32::from_be_bytes),
    i32 => 32, true => |d| d[..4].try_into().ok().map(i32::from_be_bytes),
    u64 => 64 => |d| d[..8].try_into().ok().map(u64::from_be_bytes),
    i64 => 64, true => |d| d[..8].try_into().ok().map(i64::from_be_bytes),
    u128 => 128 => |d| d[..16].try_into().ok().map(u128::from_be_bytes),
    i128 => 128, true => |d| d[..16].try_into().ok().map(i128::from_be_bytes),
    HashBytes => 256 => |d| Some(HashBytes::from_slice(&d[..32])),
}

impl<const BITS: u16> DictKey for IntN<BITS> {
    const BITS: u16 = BITS;
    const SIGNED: bool = true;

    fn from_raw_data(raw_data: &[u8; 128]) -> Option<Self> {
        let mut slice = CellSlice::from_raw_parts(raw_data, &[], BITS);
        Self::load_from(&mut slice).ok()
    }
}

impl<const BITS: u16> DictKey for UintN<BITS> {
    const BITS: u16 = BITS;

    fn from_raw_data(raw_data: &[u8; 128]) -> Option<Self> {
        let mut slice = CellSlice::from_raw_parts(raw_data, &[], BITS);
        Self::load_from(&mut slice).ok()
    }
}

/// Builds a dictionary from entries with raw keys of `key_bit_len` bits.
///
/// Entries may come in any order. Duplicate keys are rejected with [`Error::InvalidDict`].
pub fn build_dict_from_entries(
    mut entries: Vec<(CellBuilder, CellBuilder)>,
    key_bit_len: u16,
    context: &mut dyn CellContext,
) -> Result<Option<Cell>, Error> {
    if entries.iter().any(|(key, _)| key.bit_len() != key_bit_len) {
        return Err(Error::CellUnderflow);
    }

    let byte_len = (key_bit_len as usize + 7) / 8;
    entries.sort_unstable_by(|(a, _), (b, _)| {
        a.raw_data()[..byte_len].cmp(&b.raw_data()[..byte_len])
    });

    if entries
        .windows(2)
        .any(|pair| pair[0].0.raw_data()[..byte_len] == pair[1].0.raw_data()[..byte_len])
    {
        return Err(Error::InvalidDict);
    }

    if entries.is_empty() {
        return Ok(None);
    }

    let root = ok!(build_node(&entries, 0, key_bit_len, context));
    tracing::debug!(entries = entries.len(), key_bit_len, "built dictionary");
    Ok(Some(root))
}

/// Builds a subtree for the sorted entries which share the first `offset` key bits.
fn build_node(
    entries: &[(CellBuilder, CellBuilder)],
    offset: u16,
    key_bit_len: u16,
    context: &mut dyn CellContext,
) -> Result<Cell, Error> {
    fn key_suffix(key: &CellBuilder, offset: u16) -> Result<CellSlice<'_>, Error> {
        let mut slice = key.as_data_slice();
        ok!(slice.skip_first(offset, 0));
        Ok(slice)
    }

    let mut builder = CellBuilder::new();
    match entries {
        [] => return Err(Error::InvalidDict),
        [(key, value)] => {
            ok!(write_label(&ok!(key_suffix(key, offset)), key_bit_len, &mut builder));
            ok!(builder.store_builder(value));
        }
        [(first, _), .., (last, _)] => {
            let first = ok!(key_suffix(first, offset));
            let lcp_len = first.common_data_prefix_len(&ok!(key_suffix(last, offset)));
            if unlikely(lcp_len >= key_bit_len) {
                return Err(Error::InvalidDict);
            }

            ok!(write_label(&first.get_prefix(lcp_len, 0), key_bit_len, &mut builder));

            let fork_bit = offset + lcp_len;
            let mid = entries.partition_point(|(key, _)| {
                !matches!(key.as_data_slice().get_bit(fork_bit), Ok(true))
            });

            let child_bit_len = key_bit_len - lcp_len - 1;
            let left = ok!(build_node(
                &entries[..mid],
                fork_bit + 1,
                child_bit_len,
                context
            ));
            let right = ok!(build_node(
                &entries[mid..],
                fork_bit + 1,
                child_bit_len,
                context
            ));
            ok!(builder.store_reference(left));
            ok!(builder.store_reference(right));
        }
    }
    builder.build_ext(context)
}

/// Returns a `CellSlice` of the value corresponding to the key.
pub fn dict_get<'a>(
    root: Option<&'a Cell>,
    key_bit_len: u16,
    mut key: CellSlice<'_>,
) -> Result<Option<CellSlice<'a>>, Error> {
    if key.remaining_bits() != key_bit_len {
        return Err(Error::CellUnderflow);
    }

    let mut data = match root {
        Some(root) => ok!(root.as_slice()),
        None => return Ok(None),
    };

    let mut remaining_bit_len = key_bit_len;
    loop {
        // Read the key part written in the current edge
        let prefix = ok!(read_label(&mut data, remaining_bit_len));
        let prefix_len = prefix.remaining_bits();
        if key.common_data_prefix_len(&prefix) < prefix_len {
            return Ok(None);
        }

        ok!(key.skip_first(prefix_len, 0));
        remaining_bit_len -= prefix_len;
        if remaining_bit_len == 0 {
            return Ok(Some(data));
        }

        ok!(check_fork(&data));

        // Load next child based on the next bit
        let child_index = ok!(key.load_bit()) as u8;
        remaining_bit_len -= 1;
        data = ok!(ok!(data.get_reference(child_index)).as_slice());
    }
}

/// Reports malformed trie data as [`Error::InvalidDict`].
///
/// Pruned branches are not a part of the dictionary data and keep their error.
pub(crate) fn invalid_dict(error: Error) -> Error {
    match error {
        Error::PrunedBranchAccess => error,
        _ => Error::InvalidDict,
    }
}

/// Checks that nothing but two child references is left after the fork label.
fn check_fork(data: &CellSlice<'_>) -> Result<(), Error> {
    if unlikely(!data.is_data_empty() || data.remaining_refs() != 2) {
        return Err(Error::InvalidDict);
    }
    Ok(())
}

/// Writes the shortest label for the key part (`hml_short`, `hml_long` or `hml_same`).
///
/// `hml_same` is used only when it is strictly shorter than both other
/// forms, `hml_short` wins ties with `hml_long`.
pub(crate) fn write_label(
    key: &CellSlice<'_>,
    key_bit_len: u16,
    label: &mut CellBuilder,
) -> Result<(), Error> {
    let bits_for_len = bits_for_len(key_bit_len);
    let remaining_bits = key.remaining_bits();
    if unlikely(remaining_bits > key_bit_len) {
        return Err(Error::InvalidDict);
    }

    let hml_short_len = 2 + 2 * remaining_bits;
    let hml_long_len = 2 + bits_for_len + remaining_bits;
    let hml_same_len = 3 + bits_for_len;

    if hml_same_len < hml_long_len && hml_same_len < hml_short_len {
        if let Some(bit) = key.test_uniform() {
            return write_hml_same(bit, remaining_bits, bits_for_len, label);
        }
    }

    if hml_short_len <= MAX_BIT_LEN && hml_short_len <= hml_long_len {
        ok!(write_hml_short_tag(remaining_bits, label));
    } else if hml_long_len <= MAX_BIT_LEN {
        ok!(write_hml_long_tag(remaining_bits, bits_for_len, label));
    } else {
        return Err(Error::CellOverflow);
    }
    label.store_slice_data(key)
}

/// Reads an edge label for the key with `key_bit_len` remaining bits.
pub(crate) fn read_label<'a>(
    label: &mut CellSlice<'a>,
    key_bit_len: u16,
) -> Result<CellSlice<'a>, Error> {
    let bits_for_len = bits_for_len(key_bit_len);

    let result = if !ok!(label.load_bit()) {
        read_hml_short(label, key_bit_len)
    } else if !ok!(label.load_bit()) {
        read_hml_long(label, bits_for_len)
    } else {
        read_hml_same(label, bits_for_len)
    };

    match result {
        Ok(prefix) if prefix.remaining_bits() <= key_bit_len => Ok(prefix),
        Ok(_) => Err(Error::InvalidDict),
        Err(e) => Err(e),
    }
}

#[inline]
const fn bits_for_len(key_bit_len: u16) -> u16 {
    16 - key_bit_len.leading_zeros() as u16
}

fn write_hml_short_tag(len: u16, label: &mut CellBuilder) -> Result<(), Error> {
    ok!(label.store_bit_zero());
    ok!(label.store_ones(len));
    label.store_bit_zero()
}

fn read_hml_short<'a>(label: &mut CellSlice<'a>, key_bit_len: u16) -> Result<CellSlice<'a>, Error> {
    let mut len = 0;
    while ok!(label.load_bit()) {
        len += 1;
        if unlikely(len > key_bit_len) {
            return Err(Error::InvalidDict);
        }
    }
    label.load_prefix(len, 0)
}

fn write_hml_long_tag(len: u16, bits_for_len: u16, label: &mut CellBuilder) -> Result<(), Error> {
    ok!(label.store_bit_one());
    ok!(label.store_bit_zero());
    label.store_uint(len as u64, bits_for_len)
}

fn read_hml_long<'a>(label: &mut CellSlice<'a>, bits_for_len: u16) -> Result<CellSlice<'a>, Error> {
    let len = ok!(label.load_uint(bits_for_len)) as u16;
    label.load_prefix(len, 0)
}

fn write_hml_same(
    bit: bool,
    len: u16,
    bits_for_len: u16,
    label: &mut CellBuilder,
) -> Result<(), Error> {
    ok!(label.store_small_uint(0b110 | bit as u8, 3));
    label.store_uint(len as u64, bits_for_len)
}

fn read_hml_same<'a>(label: &mut CellSlice<'a>, bits_for_len: u16) -> Result<CellSlice<'a>, Error> {
    let data: &'static [u8; 128] = match ok!(label.load_bit()) {
        false => &ALL_ZEROS,
        true => &ALL_ONES,
    };
    let len = ok!(label.load_uint(bits_for_len)) as u16;
    if unlikely(len > MAX_BIT_LEN) {
        return Err(Error::InvalidDict);
    }
    Ok(CellSlice::from_raw_parts(data, &[], len))
}

static ALL_ZEROS: [u8; 128] = [0x00; 128];
static ALL_ONES: [u8; 128] = [0xff; 128];
