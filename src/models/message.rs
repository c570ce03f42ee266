//! Inbound message dispatch.

use std::str::FromStr;

use crate::cell::*;
use crate::error::Error;
use crate::models::records::*;
use crate::models::text::TextComment;

/// Known text command.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum SplitterCommand {
    /// `Topup DAO`
    TopupDao,
    /// `Terminated`
    Terminated,
    /// `Withdraw`
    Withdraw,
    /// `Gift`
    Gift,
}

impl SplitterCommand {
    /// All known commands.
    pub const ALL: [Self; 4] = [Self::TopupDao, Self::Terminated, Self::Withdraw, Self::Gift];

    /// Returns the text of the command.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TopupDao => "Topup DAO",
            Self::Terminated => "Terminated",
            Self::Withdraw => "Withdraw",
            Self::Gift => "Gift",
        }
    }
}

impl FromStr for SplitterCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Topup DAO" => Ok(Self::TopupDao),
            "Terminated" => Ok(Self::Terminated),
            "Withdraw" => Ok(Self::Withdraw),
            "Gift" => Ok(Self::Gift),
            _ => Err(Error::InvalidData),
        }
    }
}

impl std::fmt::Display for SplitterCommand {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message body accepted by the contract.
///
/// Tagged records are selected by the leading 32-bit opcode. Opcode `0`
/// is a text comment, which is either one of [`SplitterCommand`] or an
/// arbitrary text. Anything else is kept as is.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SplitterMessage {
    /// [`Deploy`] request.
    Deploy(Deploy),
    /// [`DeployOk`] confirmation.
    DeployOk(DeployOk),
    /// [`ChangeOwner`] request.
    ChangeOwner(ChangeOwner),
    /// [`PoolCommandMessage`].
    PoolCommand(PoolCommandMessage),
    /// [`MembersChangeMessage`].
    MembersChange(MembersChangeMessage),
    /// [`WithdrawStake`] request.
    WithdrawStake(WithdrawStake),
    /// [`WithdrawStakeResponse`].
    WithdrawStakeResponse(WithdrawStakeResponse),
    /// [`WithdrawStakeDelayed`].
    WithdrawStakeDelayed(WithdrawStakeDelayed),
    /// Known text command.
    Command(SplitterCommand),
    /// Arbitrary text comment.
    Comment(String),
    /// Unrecognized body (including the opcode).
    Unknown(Cell),
}

impl SplitterMessage {
    /// Opcode of [`Deploy`].
    pub const DEPLOY: u32 = 0x946a98b6;
    /// Opcode of [`DeployOk`].
    pub const DEPLOY_OK: u32 = 0xaff90f57;
    /// Opcode of [`ChangeOwner`].
    pub const CHANGE_OWNER: u32 = 0x0f474d03;
    /// Opcode of [`PoolCommandMessage`].
    pub const POOL_COMMAND: u32 = 0x7f5863a0;
    /// Opcode of [`MembersChangeMessage`].
    pub const MEMBERS_CHANGE: u32 = 0x64995268;
    /// Opcode of [`WithdrawStake`].
    pub const WITHDRAW_STAKE: u32 = 0xda803efd;
    /// Opcode of [`WithdrawStakeResponse`].
    pub const WITHDRAW_STAKE_RESPONSE: u32 = 0x23d421e1;
    /// Opcode of [`WithdrawStakeDelayed`].
    pub const WITHDRAW_STAKE_DELAYED: u32 = 0x74bb3427;

    /// Returns the leading opcode of the body, if any.
    pub fn opcode(&self) -> Option<u32> {
        Some(match self {
            Self::Deploy(_) => Self::DEPLOY,
            Self::DeployOk(_) => Self::DEPLOY_OK,
            Self::ChangeOwner(_) => Self::CHANGE_OWNER,
            Self::PoolCommand(_) => Self::POOL_COMMAND,
            Self::MembersChange(_) => Self::MEMBERS_CHANGE,
            Self::WithdrawStake(_) => Self::WITHDRAW_STAKE,
            Self::WithdrawStakeResponse(_) => Self::WITHDRAW_STAKE_RESPONSE,
            Self::WithdrawStakeDelayed(_) => Self::WITHDRAW_STAKE_DELAYED,
            Self::Command(_) | Self::Comment(_) => TextComment::TAG,
            Self::Unknown(body) => match body.as_slice_allow_exotic().get_uint(0, 32) {
                Ok(opcode) => opcode as u32,
                Err(_) => return None,
            },
        })
    }

    /// Parses the message body.
    pub fn from_body(body: &Cell) -> Result<Self, Error> {
        match body.as_slice() {
            Ok(mut slice) => Self::load_from(&mut slice),
            Err(_) => Ok(Self::Unknown(body.clone())),
        }
    }

    /// Builds the message body.
    pub fn to_body(&self) -> Result<Cell, Error> {
        CellBuilder::build_from(self)
    }
}

impl Store for SplitterMessage {
    fn store_into(
        &self,
        builder: &mut CellBuilder,
        context: &mut dyn CellContext,
    ) -> Result<(), Error> {
        match self {
            Self::Deploy(msg) => msg.store_into(builder, context),
            Self::DeployOk(msg) => msg.store_into(builder, context),
            Self::ChangeOwner(msg) => msg.store_into(builder, context),
            Self::PoolCommand(msg) => msg.store_into(builder, context),
            Self::MembersChange(msg) => msg.store_into(builder, context),
            Self::WithdrawStake(msg) => msg.store_into(builder, context),
            Self::WithdrawStakeResponse(msg) => msg.store_into(builder, context),
            Self::WithdrawStakeDelayed(msg) => msg.store_into(builder, context),
            Self::Command(command) => {
                TextComment(command.as_str().to_owned()).store_into(builder, context)
            }
            Self::Comment(text) => TextComment(text.clone()).store_into(builder, context),
            Self::Unknown(body) => builder.store_slice(&body.as_slice_allow_exotic()),
        }
    }
}

impl<'a> Load<'a> for SplitterMessage {
    fn load_from(slice: &mut CellSlice<'a>) -> Result<Self, Error> {
        let Ok(opcode) = slice.get_uint(0, 32) else {
            return load_unknown(slice, None);
        };

        Ok(match opcode as u32 {
            Self::DEPLOY => Self::Deploy(ok!(Deploy::load_from(slice))),
            Self::DEPLOY_OK => Self::DeployOk(ok!(DeployOk::load_from(slice))),
            Self::CHANGE_OWNER => Self::ChangeOwner(ok!(ChangeOwner::load_from(slice))),
            Self::POOL_COMMAND => Self::PoolCommand(ok!(PoolCommandMessage::load_from(slice))),
            Self::MEMBERS_CHANGE => {
                Self::MembersChange(ok!(MembersChangeMessage::load_from(slice)))
            }
            Self::WITHDRAW_STAKE => Self::WithdrawStake(ok!(WithdrawStake::load_from(slice))),
            Self::WITHDRAW_STAKE_RESPONSE => {
                Self::WithdrawStakeResponse(ok!(WithdrawStakeResponse::load_from(slice)))
            }
            Self::WITHDRAW_STAKE_DELAYED => {
                Self::WithdrawStakeDelayed(ok!(WithdrawStakeDelayed::load_from(slice)))
            }
            TextComment::TAG => {
                let mut comment_slice = *slice;
                match TextComment::load_from(&mut comment_slice) {
                    Ok(TextComment(text)) => {
                        *slice = comment_slice;
                        match SplitterCommand::from_str(&text) {
                            Ok(command) => Self::Command(command),
                            Err(_) => Self::Comment(text),
                        }
                    }
                    Err(_) => return load_unknown(slice, Some(TextComment::TAG)),
                }
            }
            opcode => return load_unknown(slice, Some(opcode)),
        })
    }
}

fn load_unknown(slice: &mut CellSlice<'_>, opcode: Option<u32>) -> Result<SplitterMessage, Error> {
    tracing::trace!(?opcode, bits = slice.remaining_bits(), "unknown message body");

    let mut builder = CellBuilder::new();
    ok!(builder.store_slice(slice));
    let body = ok!(builder.build());
    ok!(slice.skip_first(slice.remaining_bits(), slice.remaining_refs()));
    Ok(SplitterMessage::Unknown(body))
}

impl From<SplitterCommand> for SplitterMessage {
    #[inline]
    fn from(value: SplitterCommand) -> Self {
        Self::Command(value)
    }
}

macro_rules! impl_from_record {
    ($($ty:ident => $variant:ident),*$(,)?) => {$(
        impl From<$ty> for SplitterMessage {
            #[inline]
            fn from(value: $ty) -> Self {
                Self::$variant(value)
            }
        }
    )*};
}

impl_from_record! {
    Deploy => Deploy,
    DeployOk => DeployOk,
    ChangeOwner => ChangeOwner,
    PoolCommandMessage => PoolCommand,
    MembersChangeMessage => MembersChange,
    WithdrawStake => WithdrawStake,
    WithdrawStakeResponse => WithdrawStakeResponse,
    WithdrawStakeDelayed => WithdrawStakeDelayed,
}
