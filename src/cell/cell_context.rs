use sha2::digest::Digest;
use smallvec::SmallVec;

use crate::cell::{Cell, CellDescriptor, CellType, HashBytes, LevelMask, MAX_REF_COUNT};
use crate::error::Error;
use crate::util::unlikely;

/// Turns validated cell parts into a shared cell.
pub trait CellContext {
    /// Builds a new cell from cell parts.
    fn finalize_cell(&mut self, cell: CellParts<'_>) -> Result<Cell, Error>;
}

/// Partially assembled cell.
pub struct CellParts<'a> {
    /// Length of this cell's data in bits.
    pub bit_len: u16,

    /// Well-formed cell descriptor.
    pub descriptor: CellDescriptor,

    /// Bitwise OR of child level masks.
    pub children_mask: LevelMask,

    /// Array of child cells.
    ///
    /// NOTE: it is guaranteed that the length of the array is consistent
    /// with the descriptor.
    pub references: SmallVec<[Cell; MAX_REF_COUNT]>,

    /// Cell data slice (with the completion tag).
    pub data: &'a [u8],
}

impl CellParts<'_> {
    /// Validates cell and computes all hashes.
    pub fn compute_hashes(&self) -> Result<SmallVec<[(HashBytes, u16); 4]>, Error> {
        const HASH_BITS: usize = 256;
        const DEPTH_BITS: usize = 16;

        let mut descriptor = self.descriptor;
        let bit_len = self.bit_len as usize;
        let level_mask = descriptor.level_mask();
        let level = level_mask.level() as usize;

        let references = self.references.as_slice();

        let (cell_type, computed_level_mask) = if unlikely(descriptor.is_exotic()) {
            let Some(&first_byte) = self.data.first() else {
                return Err(Error::InvalidCell);
            };

            match CellType::from_byte_exotic(first_byte) {
                // 8 bits type, 8 bits level mask, level x (hash, depth)
                Some(CellType::PrunedBranch) => {
                    if unlikely(level == 0) {
                        return Err(Error::InvalidCell);
                    }

                    let expected_bit_len = 8 + 8 + level * (HASH_BITS + DEPTH_BITS);
                    if unlikely(bit_len != expected_bit_len || !references.is_empty()) {
                        return Err(Error::InvalidCell);
                    }

                    let stored_mask = self.data.get(1).copied().unwrap_or_default();
                    if unlikely(level_mask != stored_mask) {
                        return Err(Error::InvalidCell);
                    }

                    (CellType::PrunedBranch, level_mask)
                }
                // 8 bits type, hash, depth
                Some(CellType::MerkleProof) => {
                    const EXPECTED_BIT_LEN: usize = 8 + HASH_BITS + DEPTH_BITS;
                    if unlikely(bit_len != EXPECTED_BIT_LEN || references.len() != 1) {
                        return Err(Error::InvalidCell);
                    }

                    (CellType::MerkleProof, self.children_mask.virtualize(1))
                }
                // 8 bits type, 2 x (hash, depth)
                Some(CellType::MerkleUpdate) => {
                    const EXPECTED_BIT_LEN: usize = 8 + 2 * (HASH_BITS + DEPTH_BITS);
                    if unlikely(bit_len != EXPECTED_BIT_LEN || references.len() != 2) {
                        return Err(Error::InvalidCell);
                    }

                    (CellType::MerkleUpdate, self.children_mask.virtualize(1))
                }
                // 8 bits type, hash
                Some(CellType::LibraryReference) => {
                    const EXPECTED_BIT_LEN: usize = 8 + HASH_BITS;
                    if unlikely(bit_len != EXPECTED_BIT_LEN || !references.is_empty()) {
                        return Err(Error::InvalidCell);
                    }

                    (CellType::LibraryReference, LevelMask::EMPTY)
                }
                _ => return Err(Error::InvalidCell),
            }
        } else {
            (CellType::Ordinary, self.children_mask)
        };

        if unlikely(computed_level_mask != level_mask) {
            return Err(Error::InvalidCell);
        }

        let level_offset = cell_type.is_merkle() as u8;
        let is_pruned = cell_type.is_pruned_branch();

        let mut hashes = SmallVec::<[(HashBytes, u16); 4]>::new();

        for level in 0..4 {
            // Pruned branches keep only the representation hash,
            // other cells skip insignificant levels
            if level != 0 && (is_pruned || !level_mask.contains(level)) {
                continue;
            }

            let mut hasher = sha2::Sha256::new();

            let level_mask = if is_pruned {
                level_mask
            } else {
                LevelMask::from_level(level)
            };

            descriptor.d1 &= !(CellDescriptor::LEVEL_MASK | CellDescriptor::STORE_HASHES_MASK);
            descriptor.d1 |= level_mask.to_byte() << 5;
            hasher.update([descriptor.d1, descriptor.d2]);

            match hashes.last() {
                Some((prev_hash, _)) if level != 0 => hasher.update(prev_hash.as_slice()),
                _ => hasher.update(self.data),
            }

            let mut depth = 0;
            for child in references {
                let child_depth = child.depth(level + level_offset);
                let next_depth = match child_depth.checked_add(1) {
                    Some(next_depth) => next_depth,
                    None => return Err(Error::DepthOverflow),
                };
                depth = std::cmp::max(depth, next_depth);

                hasher.update(child_depth.to_be_bytes());
            }

            for child in references {
                let child_hash = child.hash(level + level_offset);
                hasher.update(child_hash.as_slice());
            }

            let hash = HashBytes::from(hasher.finalize());
            hashes.push((hash, depth));
        }

        Ok(hashes)
    }

    fn into_cell(self, hashes: SmallVec<[(HashBytes, u16); 4]>) -> Cell {
        Cell::from_parts(
            self.descriptor,
            self.bit_len,
            Box::from(self.data),
            self.references,
            hashes,
        )
    }
}

/// Cell context which only validates and hashes new cells.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCellContext;

impl CellContext for DefaultCellContext {
    fn finalize_cell(&mut self, cell: CellParts<'_>) -> Result<Cell, Error> {
        let hashes = ok!(cell.compute_hashes());
        Ok(cell.into_cell(hashes))
    }
}

/// Cell context which reuses already built cells with the same hash.
///
/// Equal subtrees end up sharing a single allocation.
#[derive(Debug, Default)]
pub struct DedupCellContext {
    cells: ahash::HashMap<HashBytes, Cell>,
}

impl DedupCellContext {
    /// Returns the number of unique cells built so far.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true if no cells were built yet.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl CellContext for DedupCellContext {
    fn finalize_cell(&mut self, cell: CellParts<'_>) -> Result<Cell, Error> {
        let hashes = ok!(cell.compute_hashes());
        let Some((repr_hash, _)) = hashes.last().copied() else {
            return Err(Error::InvalidCell);
        };

        if let Some(existing) = self.cells.get(&repr_hash) {
            tracing::trace!(%repr_hash, "reused existing cell");
            return Ok(existing.clone());
        }

        let cell = cell.into_cell(hashes);
        self.cells.insert(repr_hash, cell.clone());
        Ok(cell)
    }
}
