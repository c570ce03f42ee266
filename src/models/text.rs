//! Text payloads.

use crate::cell::*;
use crate::error::Error;

/// UTF-8 string stored as a chain of cells.
///
/// Bytes fill the rest of the current cell and spill into a child
/// reference, which is filled the same way.
///
/// ```text
/// tail#_ {bn:#} b:(bits bn) = SnakeData ~0;
/// cons#_ {bn:#} {n:#} b:(bits bn) next:^(SnakeData ~n) = SnakeData ~(n + 1);
/// ```
#[derive(Debug, Default, Clone, Eq, PartialEq, Hash)]
pub struct SnakeString(pub String);

impl SnakeString {
    /// Returns the inner string.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Store for SnakeString {
    fn store_into(
        &self,
        builder: &mut CellBuilder,
        context: &mut dyn CellContext,
    ) -> Result<(), Error> {
        store_snake_bytes(builder, self.0.as_bytes(), context)
    }
}

impl<'a> Load<'a> for SnakeString {
    fn load_from(slice: &mut CellSlice<'a>) -> Result<Self, Error> {
        let bytes = ok!(load_snake_bytes(slice));
        match String::from_utf8(bytes) {
            Ok(s) => Ok(Self(s)),
            Err(_) => Err(Error::InvalidData),
        }
    }
}

impl From<String> for SnakeString {
    #[inline]
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SnakeString {
    #[inline]
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Text comment: a zero opcode followed by a snake string.
#[derive(Debug, Default, Clone, Eq, PartialEq, Hash)]
pub struct TextComment(pub String);

impl TextComment {
    /// Comment opcode.
    pub const TAG: u32 = 0;
}

impl Store for TextComment {
    fn store_into(
        &self,
        builder: &mut CellBuilder,
        context: &mut dyn CellContext,
    ) -> Result<(), Error> {
        ok!(builder.store_u32(Self::TAG));
        store_snake_bytes(builder, self.0.as_bytes(), context)
    }
}

impl<'a> Load<'a> for TextComment {
    fn load_from(slice: &mut CellSlice<'a>) -> Result<Self, Error> {
        if ok!(slice.load_u32()) != Self::TAG {
            return Err(Error::InvalidTag);
        }
        SnakeString::load_from(slice).map(|s| Self(s.0))
    }
}

/// Stores bytes into the builder, spilling the rest into a chain of refs.
pub fn store_snake_bytes(
    builder: &mut CellBuilder,
    bytes: &[u8],
    context: &mut dyn CellContext,
) -> Result<(), Error> {
    const CHUNK_LEN: usize = (MAX_BIT_LEN / 8) as usize;

    let head_len = std::cmp::min(bytes.len(), (builder.spare_bits_capacity() / 8) as usize);
    let (head, tail) = bytes.split_at(head_len);

    ok!(builder.store_raw(head, (head.len() * 8) as u16));
    if tail.is_empty() {
        return Ok(());
    }
    if builder.spare_refs_capacity() == 0 {
        return Err(Error::CellOverflow);
    }

    // Build the chain from the last chunk
    let mut child = None::<Cell>;
    for chunk in tail.chunks(CHUNK_LEN).rev() {
        let mut cell = CellBuilder::new();
        ok!(cell.store_raw(chunk, (chunk.len() * 8) as u16));
        if let Some(child) = child.take() {
            ok!(cell.store_reference(child));
        }
        child = Some(ok!(cell.build_ext(context)));
    }

    match child {
        Some(child) => builder.store_reference(child),
        None => Ok(()),
    }
}

/// Loads the remaining data of the slice and all nested refs as bytes.
pub fn load_snake_bytes(slice: &mut CellSlice<'_>) -> Result<Vec<u8>, Error> {
    let mut result = Vec::new();
    let mut current = *slice;
    loop {
        let bits = current.remaining_bits();
        if bits % 8 != 0 {
            return Err(Error::InvalidData);
        }

        let offset = result.len();
        result.resize(offset + (bits / 8) as usize, 0);
        ok!(current.load_raw(&mut result[offset..], bits));

        match current.remaining_refs() {
            0 => break,
            1 => current = ok!(current.load_reference_as_slice()),
            _ => return Err(Error::InvalidData),
        }
    }

    // The outer slice is fully consumed
    ok!(slice.skip_first(slice.remaining_bits(), slice.remaining_refs()));
    Ok(result)
}
