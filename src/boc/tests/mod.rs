use super::*;
use crate::cell::{CellType, DedupCellContext, HashBytes};

const SPLITTER_CODE: &[u8] = include_bytes!("splitter_code.boc");
const SPLITTER_INIT: &[u8] = include_bytes!("splitter_init.boc");
const SPLITTER_SYSTEM: &[u8] = include_bytes!("splitter_system.boc");

const DICT_BOC: &str =
    "te6ccgEBCAEAMAABAcABAgPPQAUCAgEgBAMACQAAADqgAAkAAABQYAIBIAcGAAkAAAAe4AAJAAAAbCA=";

const MERKLE_PROOF_BOC: &str = "te6ccgECBQEAARwACUYDcijLZ4hNbjcLQiThSx8fvxTaVufKbXsXRYbyiUZApXoADQEiccAJ2Y4sgpswmr6/odN0WmKosRtoIzobXRBE9uCeOA1nuXKSo06DG3E/cAAAdbacX3gRQHLHOx0TQAQCAdURYfZ8pYDdK5k1lnsEEJ4OmIYB/AiU4UX3zVZTToFyVwAAAYRmS/s2iLD7PlLAbpXMmss9gghPB0xDAP4ESnCi++arKadAuSuAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAACAsAMARaACLD7PlLAbpXMmss9gghPB0xDAP4ESnCi++arKadAuSuAQKEgBAYDWxHxKJVQ8mzl7cXFvP64eLF0kcXTFLiwZvYlkQrEFAAw=";

const MERKLE_UPDATE_BOC: &str = "te6ccgECEAEAARwACooEmiQq0C+sMHHtQMrhM1KQs0bAR0to7UTxJ/BQaQGQ83mYWpNZrI3tjuzPRZkP0y+odW6SpuxZc6qHEJbPhzX/oAAFAAUIASEBwAIiA85AAwoiASAEDCIBIAUOAgEgBwYACQAAAAKgAAkAAAAAYCEBwAkiA85ACwooSAEBGK24YcgkheIaweTweCPOdGONsG1894aroQWmpQQGjHEAASIBIA0MKEgBAcoZQygrtOJrqvmwmN7NXJy91VsFFfgo/bXAJjbPwI+zAAIiASAPDihIAQGIedrQvLIQIcZHiObah2QWYzPcsgz02CKj0RfEEjv9NwABKEgBAf96V360Wpctur/NPJVfI6Mc5W43dmQzVmLGk0RxKb5RAAE=";

fn hash(s: &str) -> HashBytes {
    s.parse().unwrap()
}

#[test]
fn decode_contract_code() {
    let code = Boc::decode(SPLITTER_CODE).unwrap();
    assert_eq!(
        code.repr_hash(),
        &hash("012222bced417835ced0a734387a5eec168bc35a297f1ec8b4f4927b4a2113e5")
    );
    assert_eq!(code.repr_depth(), 16);
    assert_eq!(code.compute_unique_stats().0, 78);

    let init = Boc::decode(SPLITTER_INIT).unwrap();
    assert_eq!(
        init.repr_hash(),
        &hash("eb44b719009caa55bffe8f5ff09ac0445b5042f3cd7e41ea284eace146a7607c")
    );
    assert_eq!(init.repr_depth(), 5);
}

#[test]
fn boc_with_crc() {
    // Encoded with a checksum
    let system = Boc::decode(SPLITTER_SYSTEM).unwrap();
    assert_eq!(
        system.repr_hash(),
        &hash("4a800b7856467f321813c08fc885f2cbd3385988d5b40a84d08d8c9433173058")
    );

    let mut corrupted = SPLITTER_SYSTEM.to_vec();
    let last_byte = corrupted.last_mut().unwrap();
    *last_byte = !*last_byte;
    assert_eq!(Boc::decode(&corrupted), Err(de::Error::InvalidChecksum));

    let without_crc = Boc::encode(&system);
    let with_crc = Boc::encode_ext(&system, true);
    assert_eq!(without_crc.len() + 4, with_crc.len());
    assert_eq!(with_crc[4] & 0b0100_0000, 0b0100_0000);
    assert_eq!(Boc::decode(&with_crc).unwrap(), system);
    assert_eq!(Boc::decode(&without_crc).unwrap(), system);
}

#[test]
fn canonical_encoding() {
    for boc in [DICT_BOC, "te6ccgEBAQEABQAABb23wA=="] {
        let data = crate::util::decode_base64(boc).unwrap();
        let cell = Boc::decode(&data).unwrap();
        assert_eq!(Boc::encode(&cell), data);
        assert_eq!(Boc::encode_base64(&cell), boc);
    }

    let cell = Boc::decode_base64("te6ccgEBAQEABQAABb23wA==").unwrap();
    let mut slice = cell.as_slice().unwrap();
    assert_eq!(slice.remaining_bits(), 17);
    assert!(slice.is_refs_empty());
    assert_eq!(slice.get_uint(0, 8).unwrap(), 0xbd);
    assert_eq!(slice.get_uint(8, 8).unwrap(), 0xb7);
    assert!(slice.get_uint(16, 2).is_err());
    assert!(slice.load_bit().unwrap());
}

#[test]
fn reencoded_tree_is_equal() {
    for boc in [SPLITTER_CODE, SPLITTER_INIT, SPLITTER_SYSTEM] {
        let cell = Boc::decode(boc).unwrap();
        let encoded = Boc::encode(&cell);
        let decoded = Boc::decode(&encoded).unwrap();
        assert_eq!(decoded, cell);
        assert_eq!(decoded.repr_depth(), cell.repr_depth());

        // Stable after the first pass
        assert_eq!(Boc::encode(&decoded), encoded);
    }
}

#[test]
fn merkle_proof_matches_stored_hash() {
    let proof = Boc::decode_base64(MERKLE_PROOF_BOC).unwrap();
    assert_eq!(proof.cell_type(), CellType::MerkleProof);
    assert_eq!(proof.level(), 0);
    assert!(proof.as_slice().is_err());

    let child = proof.reference(0).unwrap();
    assert_eq!(child.level(), 1);

    let mut data = proof.as_slice_allow_exotic();
    assert_eq!(data.load_u8().unwrap(), 3);
    assert_eq!(data.load_u256().unwrap(), child.hash(0));
    assert_eq!(data.load_u16().unwrap(), child.depth(0));
    assert_eq!(child.depth(0), 13);

    let encoded = Boc::encode(&proof);
    assert_eq!(Boc::decode(encoded).unwrap(), proof);
}

#[test]
fn merkle_update_matches_stored_hashes() {
    let update = Boc::decode_base64(MERKLE_UPDATE_BOC).unwrap();
    assert_eq!(update.cell_type(), CellType::MerkleUpdate);
    assert_eq!(update.reference_count(), 2);

    let mut data = update.as_slice_allow_exotic();
    assert_eq!(data.load_u8().unwrap(), 4);
    let old_hash = data.load_u256().unwrap();
    let new_hash = data.load_u256().unwrap();
    assert_eq!(old_hash, update.reference(0).unwrap().hash(0));
    assert_eq!(new_hash, update.reference(1).unwrap().hash(0));

    let encoded = Boc::encode(&update);
    assert_eq!(Boc::decode(encoded).unwrap(), update);
}

#[test]
fn dedup_context_while_decoding() {
    let mut context = DedupCellContext::default();
    let data = crate::util::decode_base64(DICT_BOC).unwrap();

    let first = Boc::decode_ext(&data, &mut context).unwrap();
    let unique = context.len();
    let second = Boc::decode_ext(&data, &mut context).unwrap();

    assert!(first.ptr_eq(&second));
    assert_eq!(context.len(), unique);
    assert_eq!(unique, 8);
}

#[test]
fn multiple_roots() {
    let first = CellBuilder::build_from(1u32).unwrap();
    let second = CellBuilder::build_from(&first).unwrap();

    let mut header = ser::BocHeader::new(&first);
    header.add_root(&second);
    assert_eq!(header.cell_count(), 2);

    let mut encoded = Vec::new();
    header.encode(&mut encoded);

    assert_eq!(Boc::decode(&encoded), Err(de::Error::TooManyRootCells));

    let header = de::BocHeader::decode(&encoded, &de::Options::exact(2)).unwrap();
    let cells = header.finalize(&mut DefaultCellContext).unwrap();
    let roots = header
        .roots()
        .iter()
        .map(|index| cells.get(*index).unwrap())
        .collect::<Vec<_>>();
    assert_eq!(roots, [first, second]);

    assert!(matches!(
        de::BocHeader::decode(&encoded, &de::Options::exact(3)),
        Err(de::Error::TooFewRootCells)
    ));
}

#[test]
fn malformed_bocs() {
    assert_eq!(Boc::decode(&[] as &[u8]), Err(de::Error::UnexpectedEof));
    assert_eq!(
        Boc::decode([0xde, 0xad, 0xbe, 0xef, 0x01, 0x01]),
        Err(de::Error::UnknownBocTag)
    );

    let truncated = &SPLITTER_CODE[..SPLITTER_CODE.len() - 1];
    assert_eq!(Boc::decode(truncated), Err(de::Error::UnexpectedEof));

    // Child with a smaller index than its parent
    let invalid_order = [
        0xb5, 0xee, 0x9c, 0x72, 0x01, 0x01, 0x02, 0x01, 0x00, 0x05, 0x01, //
        0x00, 0x00, //
        0x01, 0x00, 0x00,
    ];
    assert_eq!(Boc::decode(invalid_order), Err(de::Error::InvalidRefOrder));

    let absent = [0xb5, 0xee, 0x9c, 0x72, 0x01, 0x01, 0x02, 0x01, 0x01, 0x05];
    assert_eq!(
        Boc::decode(absent),
        Err(de::Error::AbsentCellsNotSupported)
    );

    let invalid_ref_size = [0xb5, 0xee, 0x9c, 0x72, 0x05, 0x01];
    assert_eq!(
        Boc::decode(invalid_ref_size),
        Err(de::Error::InvalidRefSize)
    );

    // Unaligned cell without the completion tag
    let unnormalized = [
        0xb5, 0xee, 0x9c, 0x72, 0x01, 0x01, 0x01, 0x01, 0x00, 0x03, 0x00, //
        0x00, 0x01, 0x80,
    ];
    assert_eq!(Boc::decode(unnormalized), Err(de::Error::UnnormalizedCell));
}

#[test]
fn boc_repr() -> anyhow::Result<()> {
    let encoded = BocRepr::encode(0xdeadbeef_u32)?;
    let decoded: u32 = BocRepr::decode(&encoded)?;
    assert_eq!(decoded, 0xdeadbeef);

    let encoded = BocRepr::encode_base64(Some(HashBytes([0x55; 32])))?;
    let decoded: Option<HashBytes> = BocRepr::decode_base64(encoded)?;
    assert_eq!(decoded, Some(HashBytes([0x55; 32])));

    assert!(matches!(
        BocRepr::decode::<u64, _>(BocRepr::encode(1u8)?),
        Err(BocReprError::InvalidData(crate::error::Error::CellUnderflow))
    ));
    Ok(())
}

#[cfg(feature = "serde")]
#[derive(::serde::Serialize, ::serde::Deserialize)]
struct SerdeWithHashBytes {
    some_hash: HashBytes,
}

#[cfg(feature = "serde")]
#[derive(::serde::Serialize, ::serde::Deserialize)]
struct SerdeWithCellContainer {
    #[serde(with = "Boc")]
    some_cell: Cell,
}

#[cfg(feature = "serde")]
#[derive(::serde::Serialize, ::serde::Deserialize)]
struct SerdeWithRepr {
    #[serde(with = "BocRepr")]
    value: u64,
}

#[cfg(feature = "serde")]
#[test]
fn hex_bytes() {
    let hash = HashBytes([0xab; 32]);

    let test = format!(r#"{{"some_hash":"{hash}"}}"#);
    let SerdeWithHashBytes { some_hash } = serde_json::from_str(&test).unwrap();
    assert_eq!(some_hash, hash);

    let serialized = serde_json::to_string(&SerdeWithHashBytes { some_hash }).unwrap();
    assert_eq!(serialized, test);
}

#[cfg(feature = "serde")]
#[test]
fn struct_with_cell() {
    let test = format!(r#"{{"some_cell":"{DICT_BOC}"}}"#);
    let SerdeWithCellContainer { some_cell } = serde_json::from_str(&test).unwrap();

    let original = Boc::decode_base64(DICT_BOC).unwrap();
    assert_eq!(some_cell, original);

    let serialized = serde_json::to_string(&SerdeWithCellContainer { some_cell }).unwrap();
    assert_eq!(serialized, test);
}

#[cfg(feature = "serde")]
#[test]
fn struct_with_repr() {
    let serialized = serde_json::to_string(&SerdeWithRepr { value: 42 }).unwrap();
    let SerdeWithRepr { value } = serde_json::from_str(&serialized).unwrap();
    assert_eq!(value, 42);
}
