//! Cell primitives, TLB codecs and message types for the Splitter contract.
//!
//! ## Layout
//!
//! - [`cell`]: cells, builders, slices and the [`Store`]/[`Load`] codec traits.
//! - [`boc`]: bag of cells serialization.
//! - [`dict`]: dictionaries with fixed-length keys.
//! - [`num`]: coins and fixed-width big integers.
//! - [`stack`]: get-method arguments and results.
//! - [`models`]: contract records, inbound messages and getters.
//!
//! [`Store`]: cell::Store
//! [`Load`]: cell::Load

macro_rules! ok {
    ($e:expr $(,)?) => {
        match $e {
            core::result::Result::Ok(val) => val,
            core::result::Result::Err(err) => return core::result::Result::Err(err),
        }
    };
}

pub use self::boc::Boc;
pub use self::cell::{Cell, CellBuilder, CellDescriptor, CellSlice, HashBytes, LevelMask};

pub mod boc;
pub mod cell;
pub mod dict;
pub mod error;
pub mod models;
pub mod num;
pub mod prelude;
pub mod stack;
pub mod util;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MembersDict, MembersChangeMessage, SplitterMessage};
    use crate::num::{Int257, Tokens};

    #[test]
    fn correct_deserialization() {
        let cell = Boc::decode_base64(
            "te6ccgEBCAEAMAABAcABAgPPQAUCAgEgBAMACQAAADqgAAkAAABQYAIBIAcGAAkAAAAe4AAJAAAAbCA=",
        )
        .unwrap();
        println!("{}", cell.display_tree());

        let mut slice = cell.as_slice().unwrap();
        assert_eq!(slice.remaining_bits(), 1);
        assert!(slice.load_bit().unwrap());
        assert_eq!(slice.remaining_refs(), 1);
        assert!(slice.load_reference().is_ok());
        assert!(slice.end_parse().is_ok());
    }

    #[test]
    fn cell_slices() {
        let cell = Boc::decode_base64("te6ccgEBAQEABQAABb23wA==").unwrap();

        let mut slice = cell.as_slice().unwrap();
        assert!(!slice.is_data_empty());
        assert_eq!(slice.remaining_bits(), 17);
        assert!(slice.is_refs_empty());
        assert_eq!(slice.remaining_refs(), 0);
        assert!(slice.load_reference().is_err());

        assert!(slice.get_bit(0).unwrap());
        assert_eq!(slice.get_uint(0, 8).unwrap(), 0xbd);
        assert_eq!(slice.get_uint(8, 8).unwrap(), 0xb7);
        assert!(slice.get_uint(16, 2).is_err());

        assert_eq!(slice.load_u8().unwrap(), 0xbd);
        assert_eq!(slice.load_u8().unwrap(), 0xb7);
        assert!(slice.load_bit().unwrap());
        assert!(slice.end_parse().is_ok());
    }

    #[test]
    fn message_through_boc() -> anyhow::Result<()> {
        let members = MembersDict::try_from_entries([
            (Int257::new(1)?, Int257::new(2)?),
            (Int257::new(3)?, Int257::new(4)?),
        ])?;
        let msg = SplitterMessage::from(MembersChangeMessage {
            query_id: 1,
            gas_limit: Tokens::new(1_000_000),
            members,
            denominator: Int257::new(6)?,
        });

        let boc = Boc::encode_base64(&msg.to_body()?);
        let body = Boc::decode_base64(boc)?;
        assert_eq!(SplitterMessage::from_body(&body)?, msg);
        Ok(())
    }
}
