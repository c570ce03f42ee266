use super::BocTag;
use crate::cell::{Cell, HashBytes};

/// Intermediate BOC serializer state.
pub struct BocHeader<'a> {
    root_rev_indices: Vec<u32>,
    rev_indices: ahash::HashMap<&'a HashBytes, u32>,
    rev_cells: Vec<&'a Cell>,
    total_data_size: u64,
    reference_count: u64,
    cell_count: u32,
    include_crc: bool,
}

impl<'a> BocHeader<'a> {
    /// Creates an intermediate BOC serializer state with a single root.
    pub fn new(root: &'a Cell) -> Self {
        let mut res = Self {
            root_rev_indices: Default::default(),
            rev_indices: Default::default(),
            rev_cells: Default::default(),
            total_data_size: 0,
            reference_count: 0,
            cell_count: 0,
            include_crc: false,
        };
        res.add_root(root);
        res
    }

    /// Adds an additional root to the state.
    pub fn add_root(&mut self, root: &'a Cell) {
        let root_rev_index = self.fill(root);
        self.root_rev_indices.push(root_rev_index);
    }

    /// Includes CRC32C checksum in the encoded BOC.
    #[inline]
    pub fn with_crc(mut self, include_crc: bool) -> Self {
        self.include_crc = include_crc;
        self
    }

    /// Returns the number of unique cells.
    #[inline]
    pub fn cell_count(&self) -> u32 {
        self.cell_count
    }

    /// Encodes cell trees into bytes.
    pub fn encode(self, target: &mut Vec<u8>) {
        let root_count = self.root_rev_indices.len();

        let ref_size = number_of_bytes_to_fit(self.cell_count as u64);
        let total_cells_size: u64 = self.total_data_size
            + (self.cell_count as u64 * 2) // all descriptor bytes
            + (ref_size as u64 * self.reference_count);
        let offset_size = number_of_bytes_to_fit(total_cells_size);

        debug_assert!((1..=4).contains(&ref_size));
        debug_assert!((1..=8).contains(&offset_size));

        let flags = (ref_size as u8) | (u8::from(self.include_crc) * 0b0100_0000);

        // 4 bytes - BOC tag
        // 1 byte - flags
        // 1 byte - offset size
        // {ref_size} - cell count
        // {ref_size} - root count
        // {ref_size} - absent cell count
        // {offset_size} - total cells size
        // root_count * {ref_size} - root indices
        // {total_cells_size} - cells
        // include_crc * 4 - optional CRC32
        let total_size = 4
            + 2
            + (ref_size as u64) * (3 + root_count as u64)
            + (offset_size as u64)
            + total_cells_size
            + u64::from(self.include_crc) * 4;

        let start = target.len();
        target.reserve(total_size as usize);

        target.extend_from_slice(&BocTag::Generic.to_bytes());
        target.extend_from_slice(&[flags, offset_size as u8]);
        target.extend_from_slice(&self.cell_count.to_be_bytes()[4 - ref_size..]);
        target.extend_from_slice(&(root_count as u32).to_be_bytes()[4 - ref_size..]);
        target.extend_from_slice(&[0; 4][4 - ref_size..]);
        target.extend_from_slice(&total_cells_size.to_be_bytes()[8 - offset_size..]);

        for rev_index in &self.root_rev_indices {
            let root_index = self.cell_count - rev_index - 1;
            target.extend_from_slice(&root_index.to_be_bytes()[4 - ref_size..]);
        }

        for cell in self.rev_cells.iter().rev() {
            let descriptor = cell.descriptor();
            target.extend_from_slice(&[descriptor.d1, descriptor.d2]);
            target.extend_from_slice(cell.data());
            for child in cell.references() {
                if let Some(rev_index) = self.rev_indices.get(child.repr_hash()) {
                    let index = self.cell_count - *rev_index - 1;
                    target.extend_from_slice(&index.to_be_bytes()[4 - ref_size..]);
                } else {
                    debug_assert!(false, "child not found");
                }
            }
        }

        if self.include_crc {
            let crc = crc32c::crc32c(&target[start..]);
            target.extend_from_slice(&crc.to_le_bytes());
        }

        tracing::debug!(
            cells = self.cell_count,
            roots = root_count,
            size = target.len() - start,
            "encoded BOC"
        );
    }

    /// Adds all unique cells of the tree so that every cell
    /// is placed after its children (in reversed order).
    fn fill(&mut self, root: &'a Cell) -> u32 {
        if let Some(index) = self.rev_indices.get(root.repr_hash()) {
            return *index;
        }

        let mut stack: Vec<(&'a Cell, usize)> = vec![(root, 0)];
        while let Some(top) = stack.last_mut() {
            let (cell, next) = *top;
            if let Some(child) = cell.references().get(next) {
                top.1 += 1;
                if !self.rev_indices.contains_key(child.repr_hash()) {
                    stack.push((child, 0));
                }
                continue;
            }

            stack.pop();
            self.add_cell(cell);
        }

        self.cell_count - 1
    }

    fn add_cell(&mut self, cell: &'a Cell) {
        if self.rev_indices.contains_key(cell.repr_hash()) {
            return;
        }

        self.rev_indices.insert(cell.repr_hash(), self.cell_count);
        self.rev_cells.push(cell);

        let descriptor = cell.descriptor();
        self.total_data_size += descriptor.byte_len() as u64;
        self.reference_count += descriptor.reference_count() as u64;
        self.cell_count += 1;
    }
}

fn number_of_bytes_to_fit(l: u64) -> usize {
    std::cmp::max(1, (8 - l.leading_zeros() / 8) as usize)
}
