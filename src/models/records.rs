//! Splitter contract records.

use num_bigint::{BigInt, Sign};
use splitter_types_proc::{Load, Store};

use crate::cell::*;
use crate::dict::Dict;
use crate::error::Error;
use crate::models::address::StdAddr;
use crate::num::{Int257, Tokens};
use crate::stack::{LoadTuple, StoreTuple, TupleBuilder, TupleError, TupleReader};

/// Members dictionary: member address hash to its share.
pub type MembersDict = Dict<Int257, Int257>;

/// Contract code and data.
#[derive(Debug, Clone, Eq, PartialEq, Store, Load)]
pub struct StateInit {
    /// Contract code.
    pub code: Cell,
    /// Contract persistent data.
    pub data: Cell,
}

impl StateInit {
    /// Builds the account state init cell.
    ///
    /// ```text
    /// _ split_depth:(Maybe (## 5)) special:(Maybe TickTock)
    ///   code:(Maybe ^Cell) data:(Maybe ^Cell)
    ///   library:(HashmapE 256 SimpleLib) = StateInit;
    /// ```
    pub fn build_account_state(&self) -> Result<Cell, Error> {
        let mut builder = CellBuilder::new();
        ok!(builder.store_zeros(2));
        ok!(builder.store_bit_one());
        ok!(builder.store_reference(self.code.clone()));
        ok!(builder.store_bit_one());
        ok!(builder.store_reference(self.data.clone()));
        ok!(builder.store_bit_zero());
        builder.build()
    }

    /// Computes the address of the contract deployed with this state.
    pub fn compute_address(&self, workchain: i8) -> Result<StdAddr, Error> {
        let cell = ok!(self.build_account_state());
        Ok(StdAddr::new(workchain, *cell.repr_hash()))
    }
}

impl StoreTuple for StateInit {
    fn write_tuple(&self, builder: &mut TupleBuilder) -> Result<(), TupleError> {
        builder.write_cell(self.code.clone());
        builder.write_cell(self.data.clone());
        Ok(())
    }
}

impl LoadTuple for StateInit {
    fn read_tuple(reader: &mut TupleReader) -> Result<Self, TupleError> {
        Ok(Self {
            code: ok!(reader.read_cell()),
            data: ok!(reader.read_cell()),
        })
    }
}

/// Inbound message context.
#[derive(Debug, Clone, Eq, PartialEq, Store, Load)]
pub struct Context {
    /// Whether the message was bounced.
    pub bounced: bool,
    /// Message sender.
    pub sender: StdAddr,
    /// Attached value.
    pub value: Int257,
    /// Raw message body.
    pub raw: Cell,
}

impl StoreTuple for Context {
    fn write_tuple(&self, builder: &mut TupleBuilder) -> Result<(), TupleError> {
        builder.write_bool(self.bounced);
        ok!(builder.write_address(&self.sender));
        builder.write_int(self.value.clone());
        builder.write_slice(self.raw.clone());
        Ok(())
    }
}

impl LoadTuple for Context {
    fn read_tuple(reader: &mut TupleReader) -> Result<Self, TupleError> {
        Ok(Self {
            bounced: ok!(reader.read_bool()),
            sender: ok!(reader.read_address()),
            value: ok!(reader.read_int_as()),
            raw: ok!(reader.read_cell()),
        })
    }
}

/// Outbound message parameters.
#[derive(Debug, Clone, Eq, PartialEq, Store, Load)]
pub struct SendParameters {
    /// Whether the message should bounce on failure.
    pub bounce: bool,
    /// Destination.
    pub to: StdAddr,
    /// Attached value.
    pub value: Int257,
    /// Send mode.
    pub mode: Int257,
    /// Optional message body.
    pub body: Option<Cell>,
    /// Optional code of the deployed contract.
    pub code: Option<Cell>,
    /// Optional data of the deployed contract.
    pub data: Option<Cell>,
}

impl StoreTuple for SendParameters {
    fn write_tuple(&self, builder: &mut TupleBuilder) -> Result<(), TupleError> {
        builder.write_bool(self.bounce);
        ok!(builder.write_address(&self.to));
        builder.write_int(self.value.clone());
        builder.write_int(self.mode.clone());
        builder.write_cell_opt(self.body.clone());
        builder.write_cell_opt(self.code.clone());
        builder.write_cell_opt(self.data.clone());
        Ok(())
    }
}

impl LoadTuple for SendParameters {
    fn read_tuple(reader: &mut TupleReader) -> Result<Self, TupleError> {
        Ok(Self {
            bounce: ok!(reader.read_bool()),
            to: ok!(reader.read_address()),
            value: ok!(reader.read_int_as()),
            mode: ok!(reader.read_int_as()),
            body: ok!(reader.read_cell_opt()),
            code: ok!(reader.read_cell_opt()),
            data: ok!(reader.read_cell_opt()),
        })
    }
}

/// Deploy request.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Store, Load)]
#[tlb(tag = "#946a98b6")]
pub struct Deploy {
    /// Query id.
    pub query_id: u64,
}

/// Deploy confirmation.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Store, Load)]
#[tlb(tag = "#aff90f57")]
pub struct DeployOk {
    /// Query id of the [`Deploy`] request.
    pub query_id: u64,
}

/// Owner change request.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Store, Load)]
#[tlb(tag = "#0f474d03")]
pub struct ChangeOwner {
    /// New owner address.
    pub new_owner: StdAddr,
}

impl StoreTuple for ChangeOwner {
    fn write_tuple(&self, builder: &mut TupleBuilder) -> Result<(), TupleError> {
        builder.write_address(&self.new_owner)
    }
}

impl LoadTuple for ChangeOwner {
    fn read_tuple(reader: &mut TupleReader) -> Result<Self, TupleError> {
        Ok(Self {
            new_owner: ok!(reader.read_address()),
        })
    }
}

/// Dictionary lookup result.
#[derive(Debug, Clone, Eq, PartialEq, Store, Load)]
pub struct DictLookupResult {
    /// Found key.
    pub key: Option<Int257>,
    /// Found value.
    pub value: Option<Cell>,
    /// Whether the lookup succeeded.
    pub found: bool,
}

impl StoreTuple for DictLookupResult {
    fn write_tuple(&self, builder: &mut TupleBuilder) -> Result<(), TupleError> {
        builder.write_int_opt(self.key.clone());
        builder.write_slice_opt(self.value.clone());
        builder.write_bool(self.found);
        Ok(())
    }
}

impl LoadTuple for DictLookupResult {
    fn read_tuple(reader: &mut TupleReader) -> Result<Self, TupleError> {
        let key = match ok!(reader.read_int_opt()) {
            Some(key) => match Int257::try_from(key) {
                Ok(key) => Some(key),
                Err(_) => return Err(TupleError::IntOverflow),
            },
            None => None,
        };
        Ok(Self {
            key,
            value: ok!(reader.read_cell_opt()),
            found: ok!(reader.read_bool()),
        })
    }
}

/// Address split into parts.
#[derive(Debug, Clone, Eq, PartialEq, Store, Load)]
pub struct ParsedAddress {
    /// Workchain id.
    pub wc: Int257,
    /// Account id as an integer.
    pub hash: Int257,
}

impl ParsedAddress {
    /// Splits the standard address.
    pub fn from_std(addr: &StdAddr) -> Result<Self, Error> {
        let hash = BigInt::from_bytes_be(Sign::Plus, addr.address.as_slice());
        Ok(Self {
            wc: ok!(Int257::new(addr.workchain)),
            hash: ok!(Int257::new(hash)),
        })
    }
}

/// Command forwarded to the managed pool.
#[derive(Debug, Clone, Eq, PartialEq, Store, Load)]
#[tlb(tag = "#7f5863a0")]
pub struct PoolCommandMessage {
    /// Query id.
    pub query_id: u64,
    /// Value to attach.
    pub value: Tokens,
    /// Send mode.
    pub mode: u8,
    /// Whether the forwarded message should bounce.
    pub bounce: bool,
    /// Forwarded message body.
    pub body: Cell,
}

impl StoreTuple for PoolCommandMessage {
    fn write_tuple(&self, builder: &mut TupleBuilder) -> Result<(), TupleError> {
        builder.write_int(self.query_id);
        builder.write_int(self.value.into_inner());
        builder.write_int(self.mode);
        builder.write_bool(self.bounce);
        builder.write_cell(self.body.clone());
        Ok(())
    }
}

impl LoadTuple for PoolCommandMessage {
    fn read_tuple(reader: &mut TupleReader) -> Result<Self, TupleError> {
        Ok(Self {
            query_id: ok!(reader.read_int_as()),
            value: ok!(reader.read_tokens()),
            mode: ok!(reader.read_int_as()),
            bounce: ok!(reader.read_bool()),
            body: ok!(reader.read_cell()),
        })
    }
}

/// New members set.
#[derive(Debug, Clone, Eq, PartialEq, Store, Load)]
pub struct MembersChangeInfo {
    /// Member shares.
    pub members: MembersDict,
    /// Shares denominator.
    pub denominator: Int257,
}

impl StoreTuple for MembersChangeInfo {
    fn write_tuple(&self, builder: &mut TupleBuilder) -> Result<(), TupleError> {
        builder.write_cell_opt(self.members.root().clone());
        builder.write_int(self.denominator.clone());
        Ok(())
    }
}

impl LoadTuple for MembersChangeInfo {
    fn read_tuple(reader: &mut TupleReader) -> Result<Self, TupleError> {
        Ok(Self {
            members: ok!(reader.read_dict()),
            denominator: ok!(reader.read_int_as()),
        })
    }
}

/// Members set change request.
#[derive(Debug, Clone, Eq, PartialEq, Store, Load)]
#[tlb(tag = "#64995268")]
pub struct MembersChangeMessage {
    /// Query id.
    pub query_id: u64,
    /// Gas limit for the forwarded message.
    pub gas_limit: Tokens,
    /// Member shares.
    pub members: MembersDict,
    /// Shares denominator.
    pub denominator: Int257,
}

impl StoreTuple for MembersChangeMessage {
    fn write_tuple(&self, builder: &mut TupleBuilder) -> Result<(), TupleError> {
        builder.write_int(self.query_id);
        builder.write_int(self.gas_limit.into_inner());
        builder.write_cell_opt(self.members.root().clone());
        builder.write_int(self.denominator.clone());
        Ok(())
    }
}

impl LoadTuple for MembersChangeMessage {
    fn read_tuple(reader: &mut TupleReader) -> Result<Self, TupleError> {
        Ok(Self {
            query_id: ok!(reader.read_int_as()),
            gas_limit: ok!(reader.read_tokens()),
            members: ok!(reader.read_dict()),
            denominator: ok!(reader.read_int_as()),
        })
    }
}

/// Stake withdrawal request.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Store, Load)]
#[tlb(tag = "#da803efd")]
pub struct WithdrawStake {
    /// Query id.
    pub query_id: u64,
    /// Gas limit for the forwarded message.
    pub gas_limit: Tokens,
    /// Amount to withdraw.
    pub stake: Tokens,
}

impl StoreTuple for WithdrawStake {
    fn write_tuple(&self, builder: &mut TupleBuilder) -> Result<(), TupleError> {
        builder.write_int(self.query_id);
        builder.write_int(self.gas_limit.into_inner());
        builder.write_int(self.stake.into_inner());
        Ok(())
    }
}

impl LoadTuple for WithdrawStake {
    fn read_tuple(reader: &mut TupleReader) -> Result<Self, TupleError> {
        Ok(Self {
            query_id: ok!(reader.read_int_as()),
            gas_limit: ok!(reader.read_tokens()),
            stake: ok!(reader.read_tokens()),
        })
    }
}

/// Stake was withdrawn.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Store, Load)]
#[tlb(tag = "#23d421e1")]
pub struct WithdrawStakeResponse {
    /// Query id of the [`WithdrawStake`] request.
    pub query_id: u64,
}

/// Stake withdrawal was postponed.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Store, Load)]
#[tlb(tag = "#74bb3427")]
pub struct WithdrawStakeDelayed {
    /// Query id of the [`WithdrawStake`] request.
    pub query_id: u64,
}

macro_rules! impl_query_id_tuple {
    ($($ty:ident),*$(,)?) => {$(
        impl StoreTuple for $ty {
            #[inline]
            fn write_tuple(&self, builder: &mut TupleBuilder) -> Result<(), TupleError> {
                builder.write_int(self.query_id);
                Ok(())
            }
        }

        impl LoadTuple for $ty {
            #[inline]
            fn read_tuple(reader: &mut TupleReader) -> Result<Self, TupleError> {
                Ok(Self {
                    query_id: ok!(reader.read_int_as()),
                })
            }
        }
    )*};
}

impl_query_id_tuple!(Deploy, DeployOk, WithdrawStakeResponse, WithdrawStakeDelayed);

impl StoreTuple for ParsedAddress {
    fn write_tuple(&self, builder: &mut TupleBuilder) -> Result<(), TupleError> {
        builder.write_int(self.wc.clone());
        builder.write_int(self.hash.clone());
        Ok(())
    }
}

impl LoadTuple for ParsedAddress {
    fn read_tuple(reader: &mut TupleReader) -> Result<Self, TupleError> {
        Ok(Self {
            wc: ok!(reader.read_int_as()),
            hash: ok!(reader.read_int_as()),
        })
    }
}
