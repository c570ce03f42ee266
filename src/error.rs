//! Common error types.

/// Error type for cell related errors.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// There were not enough bits in the cell slice.
    #[error("cell underflow")]
    CellUnderflow,
    /// There were not enough refs in the cell slice.
    #[error("cell references underflow")]
    RefUnderflow,
    /// There were not enough bits or refs capacity in the cell builder.
    #[error("cell overflow")]
    CellOverflow,
    /// Something tried to load a pruned branch cell.
    #[error("pruned branch access")]
    PrunedBranchAccess,
    /// Cell contains invalid descriptor or data.
    #[error("invalid cell")]
    InvalidCell,
    /// Data does not satisfy some constraints.
    #[error("invalid data")]
    InvalidData,
    /// Unknown TLB tag.
    #[error("invalid tag")]
    InvalidTag,
    /// Slice still has unread bits or refs after a fixed-shape decode.
    #[error("unexpected trailing data")]
    TrailingData,
    /// Dictionary trie is structurally invalid.
    #[error("invalid dictionary")]
    InvalidDict,
    /// Tree of cells is too deep.
    #[error("cell depth overflow")]
    DepthOverflow,
    /// Integer does not fit into the specified number of bits.
    #[error("integer does not fit into the target bit width")]
    IntOverflow,
}

/// Error type for integer parsing related errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseIntError {
    /// Error while parsing underlying type.
    #[error("cannot parse underlying integer")]
    InvalidString(#[source] std::num::ParseIntError),
    /// Error while parsing a big integer.
    #[error("cannot parse big integer")]
    InvalidBigInt(#[source] num_bigint::ParseBigIntError),
    /// Underlying integer type does not fit into the target type.
    #[error("underlying integer is too large to fit in target type")]
    Overflow,
}

/// Error type for hash bytes parsing related errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseHashBytesError {
    /// Failed to parse base64 encoded bytes.
    #[cfg(feature = "base64")]
    #[error("invalid base64 string")]
    InvalidBase64(#[from] base64::DecodeSliceError),
    /// Failed to parse hex encoded bytes.
    #[error("invalid hex string")]
    InvalidHex(#[from] hex::FromHexError),
    /// Error for an unexpected string length.
    #[error("expected string of 44, 64 or 66 bytes")]
    UnexpectedStringLength,
}

/// Error type for address parsing related errors.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ParseAddrError {
    /// Tried to parse an empty string.
    #[error("cannot parse address from an empty string")]
    Empty,
    /// Workchain id is too large.
    #[error("workchain id is too large to fit in target type")]
    InvalidWorkchain,
    /// Invalid account id hex.
    #[error("cannot parse account id")]
    InvalidAccountId,
    /// Too many address parts.
    #[error("unexpected address part")]
    UnexpectedPart,
    /// Unexpected or invalid address format.
    #[error("invalid address format")]
    BadFormat,
    /// User-friendly address checksum mismatch.
    #[error("invalid address checksum")]
    InvalidChecksum,
}
