//! The `splitter-types` prelude.
//!
//! This brings into scope a number of traits and commonly used types.

pub use crate::boc::{Boc, BocRepr};
pub use crate::cell::{
    Cell, CellBuilder, CellContext, CellDescriptor, CellHash, CellSlice, CellType,
    DedupCellContext, DefaultCellContext, HashBytes, Load, Store,
};
pub use crate::dict::{Dict, RawDict};
pub use crate::stack::{LoadTuple, StoreTuple, TupleBuilder, TupleItem, TupleReader};
