//! Cell tree implementation.

use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use smallvec::SmallVec;

use crate::error::{Error, ParseHashBytesError};
use crate::util::Bitstring;

pub use self::builder::CellBuilder;
pub use self::cell_context::{CellContext, CellParts, DedupCellContext, DefaultCellContext};
pub use self::descriptor::CellDescriptor;
pub use self::level_mask::LevelMask;
pub use self::slice::CellSlice;

/// Cell builder.
mod builder;

/// Cell finalization and hashing.
mod cell_context;

mod descriptor;
mod level_mask;

/// Cell view utils.
mod slice;

#[cfg(test)]
mod tests;

/// Maximum number of child cells.
pub const MAX_REF_COUNT: usize = 4;

/// Maximum number of data bits in one cell.
pub const MAX_BIT_LEN: u16 = 1023;

/// A data structure that can be serialized into cells.
pub trait Store {
    /// Tries to store itself into the cell builder.
    fn store_into(
        &self,
        builder: &mut CellBuilder,
        context: &mut dyn CellContext,
    ) -> Result<(), Error>;
}

impl<T: Store + ?Sized> Store for &T {
    #[inline]
    fn store_into(
        &self,
        builder: &mut CellBuilder,
        context: &mut dyn CellContext,
    ) -> Result<(), Error> {
        <T as Store>::store_into(self, builder, context)
    }
}

impl<T: Store + ?Sized> Store for Box<T> {
    #[inline]
    fn store_into(
        &self,
        builder: &mut CellBuilder,
        context: &mut dyn CellContext,
    ) -> Result<(), Error> {
        <T as Store>::store_into(self.as_ref(), builder, context)
    }
}

impl Store for () {
    #[inline]
    fn store_into(&self, _: &mut CellBuilder, _: &mut dyn CellContext) -> Result<(), Error> {
        Ok(())
    }
}

/// Stores the presence bit followed by the value itself.
impl<T: Store> Store for Option<T> {
    fn store_into(
        &self,
        builder: &mut CellBuilder,
        context: &mut dyn CellContext,
    ) -> Result<(), Error> {
        match self {
            Some(value) => {
                ok!(builder.store_bit_one());
                value.store_into(builder, context)
            }
            None => builder.store_bit_zero(),
        }
    }
}

/// A data structure that can be deserialized from cells.
pub trait Load<'a>: Sized {
    /// Tries to load itself from a cell slice.
    fn load_from(slice: &mut CellSlice<'a>) -> Result<Self, Error>;
}

impl<'a, T: Load<'a>> Load<'a> for Box<T> {
    #[inline]
    fn load_from(slice: &mut CellSlice<'a>) -> Result<Self, Error> {
        match <T as Load>::load_from(slice) {
            Ok(value) => Ok(Box::new(value)),
            Err(e) => Err(e),
        }
    }
}

impl<'a> Load<'a> for () {
    #[inline]
    fn load_from(_: &mut CellSlice<'a>) -> Result<Self, Error> {
        Ok(())
    }
}

/// Reads the presence bit and the value itself when the bit is set.
impl<'a, T: Load<'a>> Load<'a> for Option<T> {
    fn load_from(slice: &mut CellSlice<'a>) -> Result<Self, Error> {
        if ok!(slice.load_bit()) {
            match T::load_from(slice) {
                Ok(value) => Ok(Some(value)),
                Err(e) => Err(e),
            }
        } else {
            Ok(None)
        }
    }
}

macro_rules! impl_primitive_store {
    ($($type:ty => |$b:ident, $v:ident| $expr:expr),*$(,)?) => {
        $(impl Store for $type {
            #[inline]
            fn store_into(&self,
                $b: &mut CellBuilder,
                _: &mut dyn CellContext
            ) -> Result<(), Error> {
                let $v = self;
                $expr
            }
        })*
    };
}

impl_primitive_store! {
    bool => |b, v| b.store_bit(*v),
    u8 => |b, v| b.store_u8(*v),
    i8 => |b, v| b.store_u8(*v as u8),
    u16 => |b, v| b.store_u16(*v),
    i16 => |b, v| b.store_u16(*v as u16),
    u32 => |b, v| b.store_u32(*v),
    i32 => |b, v| b.store_u32(*v as u32),
    u64 => |b, v| b.store_u64(*v),
    i64 => |b, v| b.store_u64(*v as u64),
    u128 => |b, v| b.store_u128(*v),
    i128 => |b, v| b.store_u128(*v as u128),
    HashBytes => |b, v| b.store_u256(v),
    Cell => |b, v| b.store_reference(v.clone()),
}

macro_rules! impl_primitive_load {
    ($($type:ty => |$s:ident| $expr:expr),*$(,)?) => {
        $(impl<'a> Load<'a> for $type {
            #[inline]
            fn load_from($s: &mut CellSlice<'a>) -> Result<Self, Error> {
                $expr
            }
        })*
    };
}

impl_primitive_load! {
    bool => |s| s.load_bit(),
    u8 => |s| s.load_u8(),
    i8 => |s| Ok(ok!(s.load_u8()) as i8),
    u16 => |s| s.load_u16(),
    i16 => |s| Ok(ok!(s.load_u16()) as i16),
    u32 => |s| s.load_u32(),
    i32 => |s| Ok(ok!(s.load_u32()) as i32),
    u64 => |s| s.load_u64(),
    i64 => |s| Ok(ok!(s.load_u64()) as i64),
    u128 => |s| s.load_u128(),
    i128 => |s| Ok(ok!(s.load_u128()) as i128),
    HashBytes => |s| s.load_u256(),
    Cell => |s| s.load_reference_cloned(),
}

/// Cell type.
#[derive(Default, Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellType {
    /// Cell of this type just stores data and references.
    #[default]
    Ordinary,
    /// Exotic cell which was pruned from the original tree of cells
    /// when a Merkle proof has been created.
    PrunedBranch,
    /// Exotic cell with a reference to the cell with a library.
    LibraryReference,
    /// Exotic cell with one hash and one reference.
    MerkleProof,
    /// Exotic cell with two hashes and two references.
    MerkleUpdate,
}

impl CellType {
    /// Returns whether this cell type is Merkle proof or Merkle update.
    #[inline]
    pub const fn is_merkle(self) -> bool {
        matches!(self, Self::MerkleProof | Self::MerkleUpdate)
    }

    /// Returns whether the cell is not [`Ordinary`].
    ///
    /// [`Ordinary`]: CellType::Ordinary
    #[inline]
    pub const fn is_exotic(self) -> bool {
        !matches!(self, Self::Ordinary)
    }

    /// Returns whether the cell is a pruned branch.
    #[inline]
    pub const fn is_pruned_branch(self) -> bool {
        matches!(self, Self::PrunedBranch)
    }

    /// Encodes cell type as byte (the first data byte of an exotic cell).
    #[inline]
    pub const fn to_byte(self) -> u8 {
        match self {
            CellType::Ordinary => 0xff,
            CellType::PrunedBranch => 1,
            CellType::LibraryReference => 2,
            CellType::MerkleProof => 3,
            CellType::MerkleUpdate => 4,
        }
    }

    /// Decodes any cell type from byte.
    #[inline]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0xff => CellType::Ordinary,
            1 => CellType::PrunedBranch,
            2 => CellType::LibraryReference,
            3 => CellType::MerkleProof,
            4 => CellType::MerkleUpdate,
            _ => return None,
        })
    }

    /// Decodes exotic cell type from byte.
    #[inline]
    pub const fn from_byte_exotic(byte: u8) -> Option<Self> {
        Some(match byte {
            1 => CellType::PrunedBranch,
            2 => CellType::LibraryReference,
            3 => CellType::MerkleProof,
            4 => CellType::MerkleUpdate,
            _ => return None,
        })
    }
}

impl From<CellType> for u8 {
    #[inline]
    fn from(cell_type: CellType) -> u8 {
        cell_type.to_byte()
    }
}

/// Immutable node of the tree of cells.
///
/// Cloning is cheap: all clones share the same allocation.
/// Two cells are equal when their representation hashes are equal.
#[derive(Clone)]
#[repr(transparent)]
pub struct Cell(Arc<CellInner>);

struct CellInner {
    descriptor: CellDescriptor,
    bit_len: u16,
    /// Padded data with the completion tag.
    data: Box<[u8]>,
    references: SmallVec<[Cell; MAX_REF_COUNT]>,
    /// Hash and depth for each significant level.
    hashes: SmallVec<[(HashBytes, u16); 4]>,
}

impl Cell {
    /// Hash of the ordinary cell without data and references.
    pub const EMPTY_CELL_HASH: HashBytes = HashBytes([
        0x96, 0xa2, 0x96, 0xd2, 0x24, 0xf2, 0x85, 0xc6, 0x7b, 0xee, 0x93, 0xc3, 0x0f, 0x8a, 0x30,
        0x91, 0x57, 0xf0, 0xda, 0xa3, 0x5d, 0xc5, 0xb8, 0x7e, 0x41, 0x0b, 0x78, 0x63, 0x0a, 0x09,
        0xcf, 0xc7,
    ]);

    /// Returns an ordinary cell without data and references.
    pub fn empty_cell() -> Cell {
        Self::empty_cell_ref().clone()
    }

    /// Returns a static reference to the empty cell.
    pub fn empty_cell_ref() -> &'static Cell {
        static EMPTY_CELL: OnceLock<Cell> = OnceLock::new();
        EMPTY_CELL.get_or_init(|| {
            Cell(Arc::new(CellInner {
                descriptor: CellDescriptor::new([0, 0]),
                bit_len: 0,
                data: Box::default(),
                references: SmallVec::new(),
                hashes: smallvec::smallvec![(Self::EMPTY_CELL_HASH, 0)],
            }))
        })
    }

    /// Returns a context which simply computes hashes of new cells.
    #[inline]
    pub fn empty_context() -> DefaultCellContext {
        DefaultCellContext
    }

    pub(crate) fn from_parts(
        descriptor: CellDescriptor,
        bit_len: u16,
        data: Box<[u8]>,
        references: SmallVec<[Cell; MAX_REF_COUNT]>,
        hashes: SmallVec<[(HashBytes, u16); 4]>,
    ) -> Self {
        debug_assert!(!hashes.is_empty());
        Self(Arc::new(CellInner {
            descriptor,
            bit_len,
            data,
            references,
            hashes,
        }))
    }

    /// Returns cell descriptor.
    #[inline]
    pub fn descriptor(&self) -> CellDescriptor {
        self.0.descriptor
    }

    /// Computes cell type from descriptor bytes.
    #[inline]
    pub fn cell_type(&self) -> CellType {
        self.0.descriptor.cell_type()
    }

    /// Computes the cell level from the level mask.
    #[inline]
    pub fn level(&self) -> u8 {
        self.0.descriptor.level_mask().level()
    }

    /// Computes the level mask from the descriptor bytes.
    #[inline]
    pub fn level_mask(&self) -> LevelMask {
        self.0.descriptor.level_mask()
    }

    /// Returns whether the cell is not [`Ordinary`].
    ///
    /// [`Ordinary`]: CellType::Ordinary
    #[inline]
    pub fn is_exotic(&self) -> bool {
        self.0.descriptor.is_exotic()
    }

    /// Returns the raw data of this cell (with the completion tag if unaligned).
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.0.data
    }

    /// Returns the data size of this cell in bits.
    #[inline]
    pub fn bit_len(&self) -> u16 {
        self.0.bit_len
    }

    /// Returns the number of child cells.
    #[inline]
    pub fn reference_count(&self) -> u8 {
        self.0.references.len() as u8
    }

    /// Returns a reference to the Nth child cell.
    #[inline]
    pub fn reference(&self, index: u8) -> Option<&Cell> {
        self.0.references.get(index as usize)
    }

    /// Returns the Nth child cell.
    #[inline]
    pub fn reference_cloned(&self, index: u8) -> Option<Cell> {
        self.0.references.get(index as usize).cloned()
    }

    /// Returns all child cells.
    #[inline]
    pub fn references(&self) -> &[Cell] {
        &self.0.references
    }

    /// Returns cell hash for the specified level.
    ///
    /// Cell representation hash is the hash at the maximum level ([`LevelMask::MAX_LEVEL`]).
    /// Use `repr_hash` as a simple alias for this.
    pub fn hash(&self, level: u8) -> HashBytes {
        let descriptor = self.0.descriptor;
        let hash_index = descriptor.level_mask().hash_index(level);

        if descriptor.is_pruned_branch() && hash_index != descriptor.level_mask().level() {
            // Lower hashes of pruned branches are stored in the data.
            let offset = 2 + hash_index as usize * 32;
            let mut hash = [0u8; 32];
            hash.copy_from_slice(&self.0.data[offset..offset + 32]);
            HashBytes(hash)
        } else {
            let index = std::cmp::min(hash_index as usize, self.0.hashes.len() - 1);
            self.0.hashes[index].0
        }
    }

    /// Returns cell depth for the specified level.
    pub fn depth(&self, level: u8) -> u16 {
        let descriptor = self.0.descriptor;
        let level_mask = descriptor.level_mask();
        let hash_index = level_mask.hash_index(level);

        if descriptor.is_pruned_branch() && hash_index != level_mask.level() {
            let offset = 2 + level_mask.level() as usize * 32 + hash_index as usize * 2;
            u16::from_be_bytes([self.0.data[offset], self.0.data[offset + 1]])
        } else {
            let index = std::cmp::min(hash_index as usize, self.0.hashes.len() - 1);
            self.0.hashes[index].1
        }
    }

    /// Returns cell representation hash.
    #[inline]
    pub fn repr_hash(&self) -> &HashBytes {
        let hashes = &self.0.hashes;
        &hashes[hashes.len() - 1].0
    }

    /// Returns cell representation depth.
    #[inline]
    pub fn repr_depth(&self) -> u16 {
        let hashes = &self.0.hashes;
        hashes[hashes.len() - 1].1
    }

    /// Returns true if the cell is empty (no bits, no refs).
    pub fn is_empty(&self) -> bool {
        self.repr_hash() == &Self::EMPTY_CELL_HASH
    }

    /// Returns whether two cells share the same allocation.
    #[inline]
    pub fn ptr_eq(&self, other: &Cell) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Creates a new [`CellSlice`] from this cell.
    ///
    /// Returns an error if the cell is exotic.
    pub fn as_slice(&self) -> Result<CellSlice<'_>, Error> {
        CellSlice::new(self)
    }

    /// Creates a new [`CellSlice`] from this cell, even if it is exotic.
    pub fn as_slice_allow_exotic(&self) -> CellSlice<'_> {
        CellSlice::new_allow_exotic(self)
    }

    /// Parses the cell data into the specified type.
    ///
    /// Does not require the whole cell to be consumed.
    pub fn parse<'a, T: Load<'a>>(&'a self) -> Result<T, Error> {
        let mut slice = ok!(self.as_slice());
        T::load_from(&mut slice)
    }

    /// Parses the cell data into the specified type
    /// and checks that nothing is left after it.
    pub fn parse_exact<'a, T: Load<'a>>(&'a self) -> Result<T, Error> {
        let mut slice = ok!(self.as_slice());
        let value = ok!(T::load_from(&mut slice));
        ok!(slice.end_parse());
        Ok(value)
    }

    /// Counts unique cells and total data bits of the tree.
    pub fn compute_unique_stats(&self) -> (u64, u64) {
        let mut visited = ahash::HashSet::<&HashBytes>::default();
        let mut stack = vec![self];
        let mut bits = 0u64;

        while let Some(cell) = stack.pop() {
            if !visited.insert(cell.repr_hash()) {
                continue;
            }
            bits += cell.bit_len() as u64;
            stack.extend(cell.references());
        }

        (visited.len() as u64, bits)
    }

    /// Returns an object that implements [`Display`] for printing only
    /// the root cell of the cell tree.
    ///
    /// [`Display`]: std::fmt::Display
    #[inline]
    pub fn display_root(&self) -> DisplayCellRoot<'_> {
        DisplayCellRoot {
            cell: self,
            level: 0,
        }
    }

    /// Returns an object that implements [`Display`] for printing all
    /// cells in the cell tree.
    ///
    /// [`Display`]: std::fmt::Display
    #[inline]
    pub fn display_tree(&self) -> DisplayCellTree<'_> {
        DisplayCellTree(self)
    }

    /// Returns an object which will display cell data as a bitstring
    /// with a termination bit.
    #[inline]
    pub fn display_data(&self) -> Bitstring<'_> {
        Bitstring {
            bytes: self.data(),
            bit_len: self.bit_len(),
        }
    }
}

impl Default for Cell {
    #[inline]
    fn default() -> Self {
        Cell::empty_cell()
    }
}

impl Eq for Cell {}

impl PartialEq for Cell {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.repr_hash() == other.repr_hash()
    }
}

impl std::hash::Hash for Cell {
    #[inline]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.repr_hash().hash(state)
    }
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cell")
            .field("ty", &self.cell_type())
            .field("hash", self.repr_hash())
            .finish()
    }
}

/// Helper struct to print only the root cell in the cell tree.
#[derive(Clone, Copy)]
pub struct DisplayCellRoot<'a> {
    cell: &'a Cell,
    level: usize,
}

impl std::fmt::Display for DisplayCellRoot<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = hex::encode(self.cell.data());

        let indent = self.level * 2;
        if f.alternate() {
            f.write_fmt(format_args!("{:indent$}{data}\n", ""))
        } else {
            let repr_depth = self.cell.repr_depth();
            let repr_hash = self.cell.repr_hash();
            let descriptor = self.cell.descriptor();
            f.write_fmt(format_args!(
                "{:indent$}{:?}: {data}\n{:indent$}bits: {:>4}, refs: {}, l: {:?}, depth: {}, hash: {}\n",
                "",
                descriptor.cell_type(),
                "",
                self.cell.bit_len(),
                descriptor.reference_count(),
                descriptor.level_mask(),
                repr_depth,
                repr_hash,
            ))
        }
    }
}

/// Helper struct to print all cells in the cell tree.
#[derive(Clone, Copy)]
pub struct DisplayCellTree<'a>(&'a Cell);

impl std::fmt::Display for DisplayCellTree<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut stack = vec![(0, self.0)];

        while let Some((level, cell)) = stack.pop() {
            ok!(std::fmt::Display::fmt(&DisplayCellRoot { cell, level }, f));

            for child in cell.references().iter().rev() {
                stack.push((level + 1, child));
            }
        }

        Ok(())
    }
}

/// Type alias for a cell hash.
pub type CellHash = HashBytes;

/// Array of 32 bytes.
#[derive(Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct HashBytes(pub [u8; 32]);

impl HashBytes {
    /// Array of zero bytes.
    pub const ZERO: Self = Self([0; 32]);

    /// Converts slice to a hash bytes.
    ///
    /// # Panics
    ///
    /// Panics if the length of the slice is not 32 bytes.
    #[inline]
    pub fn from_slice(slice: &[u8]) -> Self {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Self(bytes)
    }

    /// Returns a byte slice.
    #[inline(always)]
    pub const fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }

    /// Returns an internal array.
    #[inline(always)]
    pub const fn as_array(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for HashBytes {
    #[inline(always)]
    fn from(value: [u8; 32]) -> Self {
        Self(value)
    }
}

impl From<HashBytes> for [u8; 32] {
    #[inline(always)]
    fn from(value: HashBytes) -> Self {
        value.0
    }
}

impl From<sha2::digest::Output<sha2::Sha256>> for HashBytes {
    #[inline(always)]
    fn from(value: sha2::digest::Output<sha2::Sha256>) -> Self {
        Self(value.into())
    }
}

impl AsRef<[u8]> for HashBytes {
    #[inline(always)]
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl PartialEq<[u8; 32]> for HashBytes {
    #[inline(always)]
    fn eq(&self, other: &[u8; 32]) -> bool {
        &self.0 == other
    }
}

impl FromStr for HashBytes {
    type Err = ParseHashBytesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut result = Self::ZERO;
        match s.len() {
            64 => hex::decode_to_slice(s, &mut result.0)?,
            66 => hex::decode_to_slice(&s[2..], &mut result.0)?,
            #[cfg(feature = "base64")]
            44 => {
                let decoded = crate::util::decode_base64_any_slice(s.as_bytes(), &mut result.0)?;
                if decoded != 32 {
                    return Err(ParseHashBytesError::UnexpectedStringLength);
                }
            }
            _ => return Err(ParseHashBytesError::UnexpectedStringLength),
        }
        Ok(result)
    }
}

impl std::fmt::Display for HashBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut output = [0u8; 64];
        // NOTE: the output buffer always fits 32 bytes as hex
        if hex::encode_to_slice(self.0, &mut output).is_err() {
            return Err(std::fmt::Error);
        }
        match std::str::from_utf8(&output) {
            Ok(s) => f.write_str(s),
            Err(_) => Err(std::fmt::Error),
        }
    }
}

impl std::fmt::Debug for HashBytes {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for HashBytes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for HashBytes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{Error, Visitor};

        struct HashBytesHexVisitor;

        impl Visitor<'_> for HashBytesHexVisitor {
            type Value = HashBytes;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("hex-encoded byte array of size 32")
            }

            fn visit_str<E: Error>(self, value: &str) -> Result<Self::Value, E> {
                HashBytes::from_str(value).map_err(E::custom)
            }
        }

        struct HashBytesRawVisitor;

        impl Visitor<'_> for HashBytesRawVisitor {
            type Value = HashBytes;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_fmt(format_args!("a byte array of size 32"))
            }

            fn visit_bytes<E: Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                let bytes: [u8; 32] = v
                    .try_into()
                    .map_err(|_| E::invalid_length(v.len(), &self))?;
                Ok(HashBytes(bytes))
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_str(HashBytesHexVisitor)
        } else {
            deserializer.deserialize_bytes(HashBytesRawVisitor)
        }
    }
}
