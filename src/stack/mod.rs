//! Tuple (stack) codec used for get-method arguments and results.

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::cell::{Cell, CellBuilder, Load};
use crate::dict::{Dict, DictKey};
use crate::error::Error;
use crate::models::{MsgAddress, StdAddr};
use crate::num::Tokens;

/// Stack entry.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum TupleItem {
    /// Null value.
    Null,
    /// Signed 257-bit integer.
    Int(BigInt),
    /// Integer which is not a number (the result of an overflow).
    NaN,
    /// Cell.
    Cell(Cell),
    /// Slice over the whole cell.
    Slice(Cell),
    /// Finalized cell builder.
    Builder(Cell),
    /// Nested tuple.
    Tuple(Vec<TupleItem>),
}

impl TupleItem {
    /// Returns the kind of this entry.
    pub const fn kind(&self) -> TupleItemKind {
        match self {
            Self::Null => TupleItemKind::Null,
            Self::Int(_) => TupleItemKind::Int,
            Self::NaN => TupleItemKind::NaN,
            Self::Cell(_) => TupleItemKind::Cell,
            Self::Slice(_) => TupleItemKind::Slice,
            Self::Builder(_) => TupleItemKind::Builder,
            Self::Tuple(_) => TupleItemKind::Tuple,
        }
    }
}

/// Kind of the stack entry.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum TupleItemKind {
    /// [`TupleItem::Null`].
    Null,
    /// [`TupleItem::Int`].
    Int,
    /// [`TupleItem::NaN`].
    NaN,
    /// [`TupleItem::Cell`].
    Cell,
    /// [`TupleItem::Slice`].
    Slice,
    /// [`TupleItem::Builder`].
    Builder,
    /// [`TupleItem::Tuple`].
    Tuple,
    /// Any of cell, slice or builder.
    AnyCell,
}

impl std::fmt::Display for TupleItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Null => "null",
            Self::Int => "int",
            Self::NaN => "nan",
            Self::Cell => "cell",
            Self::Slice => "slice",
            Self::Builder => "builder",
            Self::Tuple => "tuple",
            Self::AnyCell => "cell, slice or builder",
        })
    }
}

/// Error type for tuple reading and writing.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum TupleError {
    /// Stored entry has a different kind.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Requested kind.
        expected: TupleItemKind,
        /// Stored kind.
        actual: TupleItemKind,
    },
    /// All entries were already consumed.
    #[error("stack underflow")]
    StackUnderflow,
    /// Cell entry does not contain a standard address.
    #[error("invalid address")]
    InvalidAddress,
    /// Integer entry does not fit into the target type.
    #[error("integer is out of range")]
    IntOverflow,
    /// Cell-level error.
    #[error(transparent)]
    Cell(#[from] Error),
}

/// A data structure that can be written as stack entries.
pub trait StoreTuple {
    /// Appends entries for all fields in declaration order.
    fn write_tuple(&self, builder: &mut TupleBuilder) -> Result<(), TupleError>;
}

/// A data structure that can be read from stack entries.
pub trait LoadTuple: Sized {
    /// Consumes entries for all fields in declaration order.
    fn read_tuple(reader: &mut TupleReader) -> Result<Self, TupleError>;
}

/// Stack entries builder.
#[derive(Debug, Default, Clone)]
pub struct TupleBuilder {
    items: Vec<TupleItem>,
}

impl TupleBuilder {
    /// Creates an empty builder.
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Appends an integer.
    pub fn write_int<T: Into<BigInt>>(&mut self, value: T) {
        self.items.push(TupleItem::Int(value.into()));
    }

    /// Appends an integer or null.
    pub fn write_int_opt<T: Into<BigInt>>(&mut self, value: Option<T>) {
        self.items.push(match value {
            Some(value) => TupleItem::Int(value.into()),
            None => TupleItem::Null,
        });
    }

    /// Appends a boolean as `-1` (true) or `0` (false).
    pub fn write_bool(&mut self, value: bool) {
        self.write_int(if value { -1 } else { 0 });
    }

    /// Appends an address as a slice.
    pub fn write_address(&mut self, value: &StdAddr) -> Result<(), TupleError> {
        let cell = CellBuilder::build_from(value)?;
        self.items.push(TupleItem::Slice(cell));
        Ok(())
    }

    /// Appends an address as a slice or null.
    pub fn write_address_opt(&mut self, value: Option<&StdAddr>) -> Result<(), TupleError> {
        match value {
            Some(value) => self.write_address(value),
            None => {
                self.items.push(TupleItem::Null);
                Ok(())
            }
        }
    }

    /// Appends a cell.
    pub fn write_cell(&mut self, value: Cell) {
        self.items.push(TupleItem::Cell(value));
    }

    /// Appends a cell or null.
    pub fn write_cell_opt(&mut self, value: Option<Cell>) {
        self.items.push(match value {
            Some(cell) => TupleItem::Cell(cell),
            None => TupleItem::Null,
        });
    }

    /// Appends a slice over the whole cell.
    pub fn write_slice(&mut self, value: Cell) {
        self.items.push(TupleItem::Slice(value));
    }

    /// Appends a slice or null.
    pub fn write_slice_opt(&mut self, value: Option<Cell>) {
        self.items.push(match value {
            Some(cell) => TupleItem::Slice(cell),
            None => TupleItem::Null,
        });
    }

    /// Appends a finalized builder.
    pub fn write_builder(&mut self, value: Cell) {
        self.items.push(TupleItem::Builder(value));
    }

    /// Appends a nested tuple.
    pub fn write_tuple(&mut self, value: Vec<TupleItem>) {
        self.items.push(TupleItem::Tuple(value));
    }

    /// Appends entries of the value.
    pub fn write<T: StoreTuple + ?Sized>(&mut self, value: &T) -> Result<(), TupleError> {
        value.write_tuple(self)
    }

    /// Returns the number of written entries.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing was written.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns written entries.
    pub fn build(self) -> Vec<TupleItem> {
        self.items
    }
}

/// Stack entries reader.
///
/// Entries are consumed in the order they were written.
#[derive(Debug, Clone)]
pub struct TupleReader {
    items: std::vec::IntoIter<TupleItem>,
}

impl TupleReader {
    /// Creates a reader over the entries.
    pub fn new(items: Vec<TupleItem>) -> Self {
        Self {
            items: items.into_iter(),
        }
    }

    /// Returns the number of entries left.
    pub fn remaining(&self) -> usize {
        self.items.len()
    }

    /// Returns the next entry without consuming it.
    pub fn peek(&self) -> Result<&TupleItem, TupleError> {
        match self.items.as_slice().first() {
            Some(item) => Ok(item),
            None => Err(TupleError::StackUnderflow),
        }
    }

    /// Consumes the next entry.
    pub fn pop(&mut self) -> Result<TupleItem, TupleError> {
        match self.items.next() {
            Some(item) => Ok(item),
            None => Err(TupleError::StackUnderflow),
        }
    }

    /// Consumes an integer.
    pub fn read_int(&mut self) -> Result<BigInt, TupleError> {
        match ok!(self.pop()) {
            TupleItem::Int(value) => Ok(value),
            item => Err(type_mismatch(TupleItemKind::Int, &item)),
        }
    }

    /// Consumes an integer or null.
    pub fn read_int_opt(&mut self) -> Result<Option<BigInt>, TupleError> {
        match ok!(self.pop()) {
            TupleItem::Null => Ok(None),
            TupleItem::Int(value) => Ok(Some(value)),
            item => Err(type_mismatch(TupleItemKind::Int, &item)),
        }
    }

    /// Consumes an integer and converts it into the target type.
    pub fn read_int_as<T: TryFrom<BigInt>>(&mut self) -> Result<T, TupleError> {
        match T::try_from(ok!(self.read_int())) {
            Ok(value) => Ok(value),
            Err(_) => Err(TupleError::IntOverflow),
        }
    }

    /// Consumes an integer as an amount of tokens.
    pub fn read_tokens(&mut self) -> Result<Tokens, TupleError> {
        let value = ok!(self.read_int());
        if value.is_negative() {
            return Err(TupleError::IntOverflow);
        }
        match value.to_u128().map(Tokens::new) {
            Some(tokens) if tokens.is_valid() => Ok(tokens),
            _ => Err(TupleError::IntOverflow),
        }
    }

    /// Consumes an integer as a boolean. Any non-zero value is `true`.
    pub fn read_bool(&mut self) -> Result<bool, TupleError> {
        Ok(!ok!(self.read_int()).is_zero())
    }

    /// Consumes a cell, slice or builder.
    pub fn read_cell(&mut self) -> Result<Cell, TupleError> {
        match ok!(self.pop()) {
            TupleItem::Cell(cell) | TupleItem::Slice(cell) | TupleItem::Builder(cell) => Ok(cell),
            item => Err(type_mismatch(TupleItemKind::AnyCell, &item)),
        }
    }

    /// Consumes a cell, slice, builder or null.
    pub fn read_cell_opt(&mut self) -> Result<Option<Cell>, TupleError> {
        match ok!(self.pop()) {
            TupleItem::Null => Ok(None),
            TupleItem::Cell(cell) | TupleItem::Slice(cell) | TupleItem::Builder(cell) => {
                Ok(Some(cell))
            }
            item => Err(type_mismatch(TupleItemKind::AnyCell, &item)),
        }
    }

    /// Consumes a dictionary root stored in a cell-like entry or null.
    ///
    /// The whole trie is checked before returning.
    pub fn read_dict<K, V>(&mut self) -> Result<Dict<K, V>, TupleError>
    where
        K: DictKey,
        V: for<'b> Load<'b>,
    {
        let root = ok!(self.read_cell_opt());
        Dict::try_from_raw(root).map_err(TupleError::Cell)
    }

    /// Consumes a standard address stored in a cell-like entry.
    pub fn read_address(&mut self) -> Result<StdAddr, TupleError> {
        let cell = ok!(self.read_cell());
        parse_address(&cell)
    }

    /// Consumes a standard address, null or an empty address slice.
    pub fn read_address_opt(&mut self) -> Result<Option<StdAddr>, TupleError> {
        match ok!(self.read_cell_opt()) {
            Some(cell) => parse_address_opt(&cell),
            None => Ok(None),
        }
    }

    /// Consumes a nested tuple and returns a reader over it.
    pub fn read_tuple(&mut self) -> Result<TupleReader, TupleError> {
        match ok!(self.pop()) {
            TupleItem::Tuple(items) => Ok(TupleReader::new(items)),
            item => Err(type_mismatch(TupleItemKind::Tuple, &item)),
        }
    }

    /// Consumes entries of the value.
    pub fn read<T: LoadTuple>(&mut self) -> Result<T, TupleError> {
        T::read_tuple(self)
    }
}

impl From<Vec<TupleItem>> for TupleReader {
    #[inline]
    fn from(items: Vec<TupleItem>) -> Self {
        Self::new(items)
    }
}

fn type_mismatch(expected: TupleItemKind, item: &TupleItem) -> TupleError {
    TupleError::TypeMismatch {
        expected,
        actual: item.kind(),
    }
}

fn parse_address(cell: &Cell) -> Result<StdAddr, TupleError> {
    match ok!(parse_address_opt(cell)) {
        Some(addr) => Ok(addr),
        None => Err(TupleError::InvalidAddress),
    }
}

/// Reads a standard address or `addr_none`.
fn parse_address_opt(cell: &Cell) -> Result<Option<StdAddr>, TupleError> {
    let Ok(mut slice) = cell.as_slice() else {
        return Err(TupleError::InvalidAddress);
    };
    match MsgAddress::load_from(&mut slice) {
        Ok(MsgAddress::None) => Ok(None),
        Ok(MsgAddress::Std(addr)) => Ok(Some(addr)),
        Ok(MsgAddress::Ext(_)) | Err(_) => Err(TupleError::InvalidAddress),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::HashBytes;
    use crate::models::ExtAddr;

    #[test]
    fn entries_are_read_in_order() -> anyhow::Result<()> {
        let addr = StdAddr::new(0, HashBytes([0x11; 32]));
        let cell = CellBuilder::build_from(123u32)?;

        let mut builder = TupleBuilder::new();
        builder.write_int(42);
        builder.write_bool(true);
        builder.write_bool(false);
        builder.write_address(&addr)?;
        builder.write_cell(cell.clone());
        builder.write_cell_opt(None);
        builder.write_int_opt(None::<i32>);
        let items = builder.build();
        assert_eq!(items.len(), 7);
        assert_eq!(items[1], TupleItem::Int(BigInt::from(-1)));

        let mut reader = TupleReader::new(items);
        assert_eq!(reader.read_int()?, BigInt::from(42));
        assert!(reader.read_bool()?);
        assert!(!reader.read_bool()?);
        assert_eq!(reader.read_address()?, addr);
        assert_eq!(reader.read_cell()?, cell);
        assert_eq!(reader.read_cell_opt()?, None);
        assert_eq!(reader.read_int_opt()?, None);
        assert_eq!(reader.remaining(), 0);
        assert_eq!(reader.read_int(), Err(TupleError::StackUnderflow));
        Ok(())
    }

    #[test]
    fn type_mismatch_is_reported() -> anyhow::Result<()> {
        let mut reader = TupleReader::new(vec![
            TupleItem::Null,
            TupleItem::Int(BigInt::from(1)),
            TupleItem::NaN,
        ]);

        assert_eq!(
            reader.read_int(),
            Err(TupleError::TypeMismatch {
                expected: TupleItemKind::Int,
                actual: TupleItemKind::Null,
            })
        );
        assert_eq!(
            reader.read_cell(),
            Err(TupleError::TypeMismatch {
                expected: TupleItemKind::AnyCell,
                actual: TupleItemKind::Int,
            })
        );
        assert!(matches!(
            reader.read_int_opt(),
            Err(TupleError::TypeMismatch {
                actual: TupleItemKind::NaN,
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn cell_like_entries() -> anyhow::Result<()> {
        let cell = CellBuilder::build_from(0xdeadbeefu32)?;
        let mut reader = TupleReader::new(vec![
            TupleItem::Slice(cell.clone()),
            TupleItem::Builder(cell.clone()),
            TupleItem::Cell(cell.clone()),
        ]);
        for _ in 0..3 {
            assert_eq!(reader.read_cell()?, cell);
        }

        // Not an address
        let mut reader = TupleReader::new(vec![TupleItem::Slice(cell)]);
        assert_eq!(reader.read_address(), Err(TupleError::InvalidAddress));
        Ok(())
    }

    #[test]
    fn optional_addresses() -> anyhow::Result<()> {
        let addr = StdAddr::new(-1, HashBytes([0x22; 32]));
        let none = CellBuilder::build_from(MsgAddress::None)?;
        let ext = CellBuilder::build_from(MsgAddress::Ext(
            ExtAddr::new(8, vec![0xab]).unwrap(),
        ))?;

        let mut builder = TupleBuilder::new();
        builder.write_address_opt(Some(&addr))?;
        builder.write_address_opt(None)?;
        let mut items = builder.build();
        items.push(TupleItem::Slice(none.clone()));
        items.push(TupleItem::Slice(ext.clone()));

        let mut reader = TupleReader::new(items);
        assert_eq!(reader.read_address_opt()?, Some(addr));
        assert_eq!(reader.read_address_opt()?, None);
        assert_eq!(reader.read_address_opt()?, None);
        assert_eq!(reader.read_address_opt(), Err(TupleError::InvalidAddress));

        // Required addresses must be standard
        let mut reader = TupleReader::new(vec![TupleItem::Slice(none), TupleItem::Slice(ext)]);
        assert_eq!(reader.read_address(), Err(TupleError::InvalidAddress));
        assert_eq!(reader.read_address(), Err(TupleError::InvalidAddress));
        Ok(())
    }

    #[test]
    fn int_conversions() -> anyhow::Result<()> {
        let mut reader = TupleReader::new(vec![
            TupleItem::Int(BigInt::from(255)),
            TupleItem::Int(BigInt::from(256)),
            TupleItem::Int(BigInt::from(1) << 120),
            TupleItem::Int(BigInt::from(-1)),
        ]);
        assert_eq!(reader.read_int_as::<u8>()?, 255);
        assert_eq!(reader.read_int_as::<u8>(), Err(TupleError::IntOverflow));
        assert_eq!(reader.read_tokens(), Err(TupleError::IntOverflow));
        assert_eq!(reader.read_tokens(), Err(TupleError::IntOverflow));
        Ok(())
    }

    #[test]
    fn nested_tuple() -> anyhow::Result<()> {
        let mut inner = TupleBuilder::new();
        inner.write_int(1);
        inner.write_int(2);

        let mut builder = TupleBuilder::new();
        builder.write_tuple(inner.build());
        builder.write_int(3);

        let mut reader = TupleReader::new(builder.build());
        let mut inner = reader.read_tuple()?;
        assert_eq!(inner.remaining(), 2);
        assert_eq!(inner.read_int_as::<u32>()?, 1);
        assert_eq!(inner.read_int_as::<u32>()?, 2);
        assert_eq!(reader.read_int_as::<u32>()?, 3);
        Ok(())
    }
}
