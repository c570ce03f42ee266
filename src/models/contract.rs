//! Splitter contract interface.

use num_bigint::BigInt;

use crate::cell::*;
use crate::dict::Dict;
use crate::error::Error;
use crate::models::address::StdAddr;
use crate::models::records::MembersDict;
use crate::num::{Int257, Uint257};
use crate::stack::{LoadTuple, StoreTuple, TupleBuilder, TupleError, TupleItem, TupleReader};
use crate::util::crc_16;

/// Computes the id of the get-method with the specified name.
pub fn method_id(name: &str) -> u32 {
    crc_16(name.as_bytes()) as u32 | 0x10000
}

/// Contract exit code.
///
/// Codes below 128 are reported by the VM, the rest by the contract itself.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum SplitterExitCode {
    StackUnderflow,
    StackOverflow,
    IntegerOverflow,
    IntegerOutOfRange,
    InvalidOpcode,
    TypeCheckError,
    CellOverflow,
    CellUnderflow,
    DictionaryError,
    OutOfGas,
    MethodIdNotFound,
    InvalidAction,
    NotEnoughTon,
    NotEnoughExtraCurrencies,
    NullReference,
    InvalidSerializationPrefix,
    InvalidIncomingMessage,
    ConstraintsError,
    AccessDenied,
    ContractStopped,
    InvalidArgument,
    CodeNotFound,
    InvalidAddress,
    NotEnoughBalanceToWithdraw,
    NotMemberOrAdmin,
    NotMember,
    AdminOnly,
}

impl SplitterExitCode {
    /// Returns a known exit code.
    pub const fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            2 => Self::StackUnderflow,
            3 => Self::StackOverflow,
            4 => Self::IntegerOverflow,
            5 => Self::IntegerOutOfRange,
            6 => Self::InvalidOpcode,
            7 => Self::TypeCheckError,
            8 => Self::CellOverflow,
            9 => Self::CellUnderflow,
            10 => Self::DictionaryError,
            13 => Self::OutOfGas,
            32 => Self::MethodIdNotFound,
            34 => Self::InvalidAction,
            37 => Self::NotEnoughTon,
            38 => Self::NotEnoughExtraCurrencies,
            128 => Self::NullReference,
            129 => Self::InvalidSerializationPrefix,
            130 => Self::InvalidIncomingMessage,
            131 => Self::ConstraintsError,
            132 => Self::AccessDenied,
            133 => Self::ContractStopped,
            134 => Self::InvalidArgument,
            135 => Self::CodeNotFound,
            136 => Self::InvalidAddress,
            14720 => Self::NotEnoughBalanceToWithdraw,
            16466 => Self::NotMemberOrAdmin,
            17253 => Self::NotMember,
            25422 => Self::AdminOnly,
            _ => return None,
        })
    }

    /// Returns the numeric exit code.
    pub const fn code(&self) -> i32 {
        match self {
            Self::StackUnderflow => 2,
            Self::StackOverflow => 3,
            Self::IntegerOverflow => 4,
            Self::IntegerOutOfRange => 5,
            Self::InvalidOpcode => 6,
            Self::TypeCheckError => 7,
            Self::CellOverflow => 8,
            Self::CellUnderflow => 9,
            Self::DictionaryError => 10,
            Self::OutOfGas => 13,
            Self::MethodIdNotFound => 32,
            Self::InvalidAction => 34,
            Self::NotEnoughTon => 37,
            Self::NotEnoughExtraCurrencies => 38,
            Self::NullReference => 128,
            Self::InvalidSerializationPrefix => 129,
            Self::InvalidIncomingMessage => 130,
            Self::ConstraintsError => 131,
            Self::AccessDenied => 132,
            Self::ContractStopped => 133,
            Self::InvalidArgument => 134,
            Self::CodeNotFound => 135,
            Self::InvalidAddress => 136,
            Self::NotEnoughBalanceToWithdraw => 14720,
            Self::NotMemberOrAdmin => 16466,
            Self::NotMember => 17253,
            Self::AdminOnly => 25422,
        }
    }

    /// Returns the message reported by the contract.
    pub const fn message(&self) -> &'static str {
        match self {
            // NOTE: the typo is a part of the deployed error table
            Self::StackUnderflow => "Stack undeflow",
            Self::StackOverflow => "Stack overflow",
            Self::IntegerOverflow => "Integer overflow",
            Self::IntegerOutOfRange => "Integer out of expected range",
            Self::InvalidOpcode => "Invalid opcode",
            Self::TypeCheckError => "Type check error",
            Self::CellOverflow => "Cell overflow",
            Self::CellUnderflow => "Cell underflow",
            Self::DictionaryError => "Dictionary error",
            Self::OutOfGas => "Out of gas error",
            Self::MethodIdNotFound => "Method ID not found",
            Self::InvalidAction => "Action is invalid or not supported",
            Self::NotEnoughTon => "Not enough TON",
            Self::NotEnoughExtraCurrencies => "Not enough extra-currencies",
            Self::NullReference => "Null reference exception",
            Self::InvalidSerializationPrefix => "Invalid serialization prefix",
            Self::InvalidIncomingMessage => "Invalid incoming message",
            Self::ConstraintsError => "Constraints error",
            Self::AccessDenied => "Access denied",
            Self::ContractStopped => "Contract stopped",
            Self::InvalidArgument => "Invalid argument",
            Self::CodeNotFound => "Code of a contract was not found",
            Self::InvalidAddress => "Invalid address",
            Self::NotEnoughBalanceToWithdraw => "Not enough balance to withdraw",
            Self::NotMemberOrAdmin => "You are not a member or admin",
            Self::NotMember => "You are not a member",
            Self::AdminOnly => "Admin only",
        }
    }
}

impl std::fmt::Display for SplitterExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (exit code {})", self.message(), self.code())
    }
}

impl std::error::Error for SplitterExitCode {}

/// Contract get-method call.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SplitterGetter {
    /// Share of the member with the specified address.
    MemberShare(StdAddr),
    /// Number of members.
    MembersCount,
    /// Number of votes required for a decision.
    MinimumVotes,
    /// All member shares.
    Members,
}

impl SplitterGetter {
    /// Returns the get-method name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::MemberShare(_) => "memberShare",
            Self::MembersCount => "membersCount",
            Self::MinimumVotes => "minimumVotes",
            Self::Members => "members",
        }
    }

    /// Returns the get-method id.
    pub fn method_id(&self) -> u32 {
        method_id(self.name())
    }

    /// Builds the arguments stack.
    pub fn args(&self) -> Result<Vec<TupleItem>, TupleError> {
        let mut builder = TupleBuilder::default();
        if let Self::MemberShare(addr) = self {
            ok!(builder.write_address(addr));
        }
        Ok(builder.build())
    }
}

/// Parses the result of `memberShare`.
pub fn parse_member_share(stack: Vec<TupleItem>) -> Result<BigInt, TupleError> {
    TupleReader::new(stack).read_int()
}

/// Parses the result of `membersCount`.
pub fn parse_members_count(stack: Vec<TupleItem>) -> Result<BigInt, TupleError> {
    TupleReader::new(stack).read_int()
}

/// Parses the result of `minimumVotes`.
pub fn parse_minimum_votes(stack: Vec<TupleItem>) -> Result<BigInt, TupleError> {
    TupleReader::new(stack).read_int()
}

/// Parses the result of `members`.
pub fn parse_members(stack: Vec<TupleItem>) -> Result<MembersDict, TupleError> {
    TupleReader::new(stack).read_dict()
}

/// Arguments of the contract `init` method.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SplitterInitArgs {
    /// Contract system cell.
    pub system: Cell,
    /// Managed pool.
    pub managable: StdAddr,
    /// Contract admin.
    pub admin: StdAddr,
    /// Initial member shares.
    pub members: MembersDict,
    /// Shares denominator.
    pub denominator: Int257,
    /// Withdrawal fee.
    pub withdraw_fee: Int257,
}

impl StoreTuple for SplitterInitArgs {
    fn write_tuple(&self, builder: &mut TupleBuilder) -> Result<(), TupleError> {
        builder.write_cell(self.system.clone());
        ok!(builder.write_address(&self.managable));
        ok!(builder.write_address(&self.admin));
        builder.write_cell_opt(self.members.root().clone());
        builder.write_int(self.denominator.clone());
        builder.write_int(self.withdraw_fee.clone());
        Ok(())
    }
}

impl LoadTuple for SplitterInitArgs {
    fn read_tuple(reader: &mut TupleReader) -> Result<Self, TupleError> {
        Ok(Self {
            system: ok!(reader.read_cell()),
            managable: ok!(reader.read_address()),
            admin: ok!(reader.read_address()),
            members: ok!(reader.read_dict()),
            denominator: ok!(reader.read_int_as()),
            withdraw_fee: ok!(reader.read_int_as()),
        })
    }
}

/// Persistent data of the DAO contract.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DaoStorage {
    /// Managed pool.
    pub managable: StdAddr,
    /// Member shares.
    pub members: Dict<Uint257, Uint257>,
    /// Shares denominator.
    pub denominator: Uint257,
    /// Withdrawal fee.
    pub withdraw_fee: Uint257,
}

impl DaoStorage {
    /// Parses the contract data cell.
    pub fn from_data(data: &Cell) -> Result<Self, Error> {
        data.parse_exact::<Self>()
    }
}

impl<'a> Load<'a> for DaoStorage {
    fn load_from(slice: &mut CellSlice<'a>) -> Result<Self, Error> {
        // System cell and the init flag
        ok!(slice.skip_first(1, 1));

        let result = Self {
            managable: ok!(StdAddr::load_from(slice)),
            members: ok!(Dict::load_from(slice)),
            denominator: ok!(Uint257::load_from(slice)),
            withdraw_fee: ok!(Uint257::load_from(slice)),
        };
        ok!(slice.end_parse());
        Ok(result)
    }
}
