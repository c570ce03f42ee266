use super::*;

fn leaf(value: u32) -> Cell {
    let mut builder = CellBuilder::new();
    builder.store_u32(value).unwrap();
    builder.build().unwrap()
}

fn node(data: u8, children: &[Cell]) -> Cell {
    let mut builder = CellBuilder::new();
    builder.store_u8(data).unwrap();
    for child in children {
        builder.store_reference(child.clone()).unwrap();
    }
    builder.build().unwrap()
}

fn make_pruned_branch(cell: &Cell) -> Cell {
    let mut builder = CellBuilder::new();
    builder.set_exotic(true);
    builder.store_u8(CellType::PrunedBranch.to_byte()).unwrap();
    builder.store_u8(LevelMask::from_level(1).to_byte()).unwrap();
    builder.store_u256(&cell.hash(0)).unwrap();
    builder.store_u16(cell.depth(0)).unwrap();
    builder.build().unwrap()
}

fn make_merkle_proof(cell: &Cell) -> Cell {
    let mut builder = CellBuilder::new();
    builder.set_exotic(true);
    builder.store_u8(CellType::MerkleProof.to_byte()).unwrap();
    builder.store_u256(&cell.hash(0)).unwrap();
    builder.store_u16(cell.depth(0)).unwrap();
    builder.store_reference(cell.clone()).unwrap();
    builder.build().unwrap()
}

#[test]
fn empty_cell_hash() {
    let cell = CellBuilder::new().build().unwrap();
    assert_eq!(cell.repr_hash(), &Cell::EMPTY_CELL_HASH);
    assert_eq!(cell, Cell::empty_cell());
    assert!(cell.is_empty());
    assert_eq!(cell.repr_depth(), 0);
    assert_eq!(
        Cell::EMPTY_CELL_HASH.to_string(),
        "96a296d224f285c67bee93c30f8a309157f0daa35dc5b87e410b78630a09cfc7"
    );
}

#[test]
fn hash_depends_on_content() {
    let a = node(1, &[leaf(1), leaf(2)]);
    let b = node(1, &[leaf(1), leaf(2)]);
    let c = node(1, &[leaf(2), leaf(1)]);
    let d = node(2, &[leaf(1), leaf(2)]);

    assert_eq!(a, b);
    assert!(!a.ptr_eq(&b));
    assert_ne!(a, c);
    assert_ne!(a, d);
    assert_eq!(a.repr_depth(), 1);
    assert_eq!(node(0, &[a.clone()]).repr_depth(), 2);
}

#[test]
fn unaligned_data_affects_hash() {
    let mut builder = CellBuilder::new();
    builder.store_zeros(7).unwrap();
    let seven = builder.build().unwrap();

    let mut builder = CellBuilder::new();
    builder.store_zeros(8).unwrap();
    let eight = builder.build().unwrap();

    assert_eq!(seven.data(), &[0b0000_0001]);
    assert_eq!(eight.data(), &[0]);
    assert_ne!(seven, eight);
}

#[test]
fn pruned_branch_keeps_original_hash() {
    let original = node(7, &[leaf(1), node(8, &[leaf(2)])]);
    let pruned = make_pruned_branch(&original);

    assert_eq!(pruned.cell_type(), CellType::PrunedBranch);
    assert_eq!(pruned.level(), 1);
    assert_eq!(pruned.hash(0), *original.repr_hash());
    assert_eq!(pruned.depth(0), original.repr_depth());
    assert_ne!(pruned.repr_hash(), original.repr_hash());
    assert_eq!(pruned.hash(1), *pruned.repr_hash());
    assert_eq!(pruned.hash(3), *pruned.repr_hash());
    assert_eq!(pruned.as_slice().unwrap_err(), Error::PrunedBranchAccess);
}

#[test]
fn merkle_proof_hides_level() {
    let left = leaf(1);
    let right = node(8, &[leaf(2), leaf(3)]);
    let original = node(7, &[left.clone(), right.clone()]);

    // Replacing a subtree with its pruned branch keeps the level 0 hash
    let partial = node(7, &[left, make_pruned_branch(&right)]);
    assert_eq!(partial.level(), 1);
    assert_eq!(partial.hash(0), *original.repr_hash());
    assert_eq!(partial.depth(0), original.repr_depth());
    assert_ne!(partial.repr_hash(), original.repr_hash());

    let proof = make_merkle_proof(&partial);
    assert_eq!(proof.cell_type(), CellType::MerkleProof);
    assert_eq!(proof.level(), 0);

    let mut data = proof.as_slice_allow_exotic();
    data.skip_first(8, 0).unwrap();
    assert_eq!(data.load_u256().unwrap(), *original.repr_hash());
}

#[test]
fn malformed_exotic_cells_are_rejected() {
    // Pruned branch without stored hashes
    let mut builder = CellBuilder::new();
    builder.set_exotic(true);
    builder.store_u8(1).unwrap();
    builder.store_u8(1).unwrap();
    assert_eq!(builder.build().unwrap_err(), Error::InvalidCell);

    // Merkle proof without a child
    let mut builder = CellBuilder::new();
    builder.set_exotic(true);
    builder.store_u8(3).unwrap();
    builder.store_u256(&HashBytes::ZERO).unwrap();
    builder.store_u16(0).unwrap();
    assert_eq!(builder.build().unwrap_err(), Error::InvalidCell);

    // Unknown exotic type
    let mut builder = CellBuilder::new();
    builder.set_exotic(true);
    builder.store_u8(0x42).unwrap();
    assert_eq!(builder.build().unwrap_err(), Error::InvalidCell);
}

#[test]
fn dedup_context_shares_cells() {
    let mut context = DedupCellContext::default();

    let build = |context: &mut DedupCellContext| {
        let mut builder = CellBuilder::new();
        builder.store_u64(0xdeadbeef).unwrap();
        builder.store_reference(leaf(1)).unwrap();
        builder.build_ext(context).unwrap()
    };

    let first = build(&mut context);
    let second = build(&mut context);
    assert!(first.ptr_eq(&second));
    assert_eq!(context.len(), 1);

    let other = CellBuilder::build_from_ext(123u32, &mut context).unwrap();
    assert!(!other.ptr_eq(&first));
    assert_eq!(context.len(), 2);
}

#[test]
fn unique_stats_skip_shared_subtrees() {
    let shared = leaf(42);
    let root = node(0, &[shared.clone(), node(1, &[shared.clone()]), shared]);

    let (cells, bits) = root.compute_unique_stats();
    assert_eq!(cells, 3);
    assert_eq!(bits, 8 + 8 + 32);
}

#[test]
fn hash_bytes_from_str() -> anyhow::Result<()> {
    let hex = "96a296d224f285c67bee93c30f8a309157f0daa35dc5b87e410b78630a09cfc7";
    let hash: HashBytes = hex.parse()?;
    assert_eq!(hash, Cell::EMPTY_CELL_HASH);

    let prefixed: HashBytes = format!("0x{hex}").parse()?;
    assert_eq!(prefixed, hash);

    #[cfg(feature = "base64")]
    {
        let encoded = crate::util::encode_base64(hash.as_slice());
        assert_eq!(encoded.parse::<HashBytes>()?, hash);
    }

    assert!(matches!(
        "abcd".parse::<HashBytes>(),
        Err(ParseHashBytesError::UnexpectedStringLength)
    ));
    Ok(())
}

#[test]
fn display_tree() {
    let root = node(0xab, &[leaf(1)]);
    let text = root.display_tree().to_string();
    assert!(text.contains("Ordinary: ab"));
    assert!(text.contains("00000001"));
    assert_eq!(root.display_data().to_string(), "ab");
}
