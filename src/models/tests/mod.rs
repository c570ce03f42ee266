use super::*;
use crate::error::Error;
use crate::num::{Int257, Tokens};
use crate::prelude::*;
use crate::stack::{TupleBuilder, TupleError, TupleItem, TupleReader};

const SPLITTER_CODE: &[u8] = include_bytes!("../../boc/tests/splitter_code.boc");

fn addr(byte: u8) -> StdAddr {
    StdAddr::new(0, HashBytes([byte; 32]))
}

fn members() -> MembersDict {
    MembersDict::try_from_entries([
        (Int257::new(1).unwrap(), Int257::new(50).unwrap()),
        (Int257::new(-1).unwrap(), Int257::new(25).unwrap()),
        (Int257::new(100).unwrap(), Int257::new(25).unwrap()),
    ])
    .unwrap()
}

fn check_record<T>(value: T) -> Cell
where
    T: Store + for<'a> Load<'a> + Eq + std::fmt::Debug,
{
    let cell = CellBuilder::build_from(&value).unwrap();
    let parsed = cell.parse_exact::<T>().unwrap();
    assert_eq!(parsed, value);
    cell
}

fn check_tuple<T>(value: T) -> Vec<TupleItem>
where
    T: StoreTuple + LoadTuple + Eq + std::fmt::Debug,
{
    let mut builder = TupleBuilder::default();
    builder.write(&value).unwrap();
    let stack = builder.build();

    let mut reader = TupleReader::new(stack.clone());
    assert_eq!(reader.read::<T>().unwrap(), value);
    assert_eq!(reader.remaining(), 0);
    stack
}

#[test]
fn deploy_layout() -> anyhow::Result<()> {
    let cell = check_record(Deploy { query_id: 123 });
    assert_eq!(cell.bit_len(), 32 + 64);

    let mut slice = cell.as_slice()?;
    assert_eq!(slice.load_u32()?, 2490013878);
    assert_eq!(slice.load_u64()?, 123);

    check_tuple(Deploy { query_id: 123 });
    Ok(())
}

#[test]
fn deploy_tag_is_not_accepted_by_other_records() -> anyhow::Result<()> {
    let cell = CellBuilder::build_from(Deploy { query_id: 1 })?;
    assert_eq!(cell.parse::<Deploy>()?, Deploy { query_id: 1 });

    assert_eq!(cell.parse::<DeployOk>().unwrap_err(), Error::InvalidTag);
    assert_eq!(cell.parse::<ChangeOwner>().unwrap_err(), Error::InvalidTag);
    assert_eq!(
        cell.parse::<PoolCommandMessage>().unwrap_err(),
        Error::InvalidTag
    );
    assert_eq!(
        cell.parse::<MembersChangeMessage>().unwrap_err(),
        Error::InvalidTag
    );
    assert_eq!(cell.parse::<WithdrawStake>().unwrap_err(), Error::InvalidTag);
    assert_eq!(
        cell.parse::<WithdrawStakeResponse>().unwrap_err(),
        Error::InvalidTag
    );
    assert_eq!(
        cell.parse::<WithdrawStakeDelayed>().unwrap_err(),
        Error::InvalidTag
    );
    assert_eq!(cell.parse::<TextComment>().unwrap_err(), Error::InvalidTag);

    assert_eq!(
        SplitterMessage::from_body(&cell)?,
        SplitterMessage::Deploy(Deploy { query_id: 1 })
    );
    Ok(())
}

#[test]
fn tagged_records() {
    check_record(DeployOk { query_id: u64::MAX });
    check_record(ChangeOwner { new_owner: addr(1) });
    check_record(WithdrawStake {
        query_id: 1,
        gas_limit: Tokens::new(100_000_000),
        stake: Tokens::new(10_000_000_000),
    });
    check_record(WithdrawStakeResponse { query_id: 2 });
    check_record(WithdrawStakeDelayed { query_id: 3 });

    let cell = check_record(MembersChangeMessage {
        query_id: 4,
        gas_limit: Tokens::ZERO,
        members: members(),
        denominator: Int257::new(100).unwrap(),
    });
    assert_eq!(cell.bit_len(), 32 + 64 + 4 + 1 + 257);
    assert_eq!(cell.reference_count(), 1);

    // Empty dictionary is a single zero bit
    let cell = check_record(MembersChangeMessage {
        query_id: 4,
        gas_limit: Tokens::ZERO,
        members: Dict::new(),
        denominator: Int257::new(100).unwrap(),
    });
    assert_eq!(cell.reference_count(), 0);
}

#[test]
fn corrupt_members_are_rejected() -> anyhow::Result<()> {
    // Fork with a single child reference
    let root = {
        let mut builder = CellBuilder::new();
        builder.store_small_uint(0b00, 2)?;
        builder.store_reference(CellBuilder::build_from(Int257::new(1)?)?)?;
        builder.build()?
    };

    let mut builder = CellBuilder::new();
    builder.store_u32(SplitterMessage::MEMBERS_CHANGE)?;
    builder.store_u64(1)?;
    Tokens::ZERO.store_into(&mut builder, &mut DefaultCellContext)?;
    builder.store_bit_one()?;
    builder.store_reference(root.clone())?;
    Int257::new(100)?.store_into(&mut builder, &mut DefaultCellContext)?;
    let body = builder.build()?;

    assert_eq!(
        SplitterMessage::from_body(&body).unwrap_err(),
        Error::InvalidDict
    );
    assert_eq!(
        body.parse::<MembersChangeMessage>().unwrap_err(),
        Error::InvalidDict
    );

    let stack = vec![TupleItem::Cell(root), TupleItem::Int(100.into())];
    assert_eq!(
        TupleReader::new(stack).read::<MembersChangeInfo>().unwrap_err(),
        TupleError::Cell(Error::InvalidDict)
    );
    Ok(())
}

#[test]
fn pool_command_layout() -> anyhow::Result<()> {
    let body = CellBuilder::build_from(TextComment("Deposit".to_owned()))?;
    let msg = PoolCommandMessage {
        query_id: 10,
        value: Tokens::new(0x1234),
        mode: 3,
        bounce: true,
        body: body.clone(),
    };
    let cell = check_record(msg.clone());
    assert_eq!(cell.bit_len(), 32 + 64 + (4 + 16) + 8 + 1);
    assert_eq!(cell.reference(0), Some(&body));

    let mut slice = cell.as_slice()?;
    slice.skip_first(32 + 64, 0)?;
    assert_eq!(slice.load_small_uint(4)?, 2);
    assert_eq!(slice.load_u16()?, 0x1234);
    assert_eq!(slice.load_u8()?, 3);
    assert!(slice.load_bit()?);

    let stack = check_tuple(msg);
    assert_eq!(stack[3], TupleItem::Int((-1).into()));
    assert_eq!(stack[4], TupleItem::Cell(body));
    Ok(())
}

#[test]
fn optional_fields() -> anyhow::Result<()> {
    let params = SendParameters {
        bounce: false,
        to: addr(2),
        value: Int257::new(1_000_000_000u64)?,
        mode: Int257::new(64)?,
        body: None,
        code: None,
        data: None,
    };
    let cell = check_record(params.clone());
    assert_eq!(cell.bit_len(), 1 + 267 + 257 + 257 + 3);
    assert_eq!(cell.reference_count(), 0);

    let body = CellBuilder::build_from(1u32)?;
    let params = SendParameters {
        body: Some(body.clone()),
        ..params
    };
    let cell = check_record(params.clone());
    assert_eq!(cell.reference_count(), 1);

    let mut slice = cell.as_slice()?;
    slice.skip_first(1 + 267 + 257 + 257, 0)?;
    assert!(slice.load_bit()?);
    assert!(!slice.load_bit()?);
    assert!(!slice.load_bit()?);

    let stack = check_tuple(params);
    assert_eq!(stack[4], TupleItem::Cell(body));
    assert_eq!(stack[5], TupleItem::Null);
    Ok(())
}

#[test]
fn untagged_records() -> anyhow::Result<()> {
    let raw = CellBuilder::build_from(0xdeadu16)?;

    let context = Context {
        bounced: true,
        sender: addr(3),
        value: Int257::new(-5)?,
        raw: raw.clone(),
    };
    check_record(context.clone());
    let stack = check_tuple(context);
    assert_eq!(stack[3], TupleItem::Slice(raw.clone()));

    let lookup = DictLookupResult {
        key: Some(Int257::new(7)?),
        value: Some(raw.clone()),
        found: true,
    };
    check_record(lookup.clone());
    check_tuple(lookup);
    check_tuple(DictLookupResult {
        key: None,
        value: None,
        found: false,
    });

    let info = MembersChangeInfo {
        members: members(),
        denominator: Int257::new(100)?,
    };
    check_record(info.clone());
    check_tuple(info);

    let parsed = ParsedAddress::from_std(&StdAddr::new(-1, HashBytes([0xff; 32])))?;
    assert_eq!(parsed.wc, Int257::new(-1)?);
    assert!(parsed.hash.as_bigint() > &num_bigint::BigInt::from(0));
    check_record(parsed);
    Ok(())
}

#[test]
fn state_init_address() -> anyhow::Result<()> {
    let code = Boc::decode(SPLITTER_CODE)?;
    let data = CellBuilder::build_from(addr(4))?;

    let init = StateInit {
        code: code.clone(),
        data: data.clone(),
    };
    let cell = check_record(init.clone());
    assert_eq!(cell.bit_len(), 0);
    assert_eq!(cell.reference_count(), 2);

    let account_state = init.build_account_state()?;
    assert_eq!(account_state.bit_len(), 5);
    assert_eq!(account_state.reference(0), Some(&code));
    assert_eq!(account_state.reference(1), Some(&data));

    let address = init.compute_address(0)?;
    assert_eq!(address.workchain, 0);
    assert_eq!(&address.address, account_state.repr_hash());

    // Different data gives a different address
    let other = StateInit {
        code,
        data: CellBuilder::build_from(addr(5))?,
    };
    assert_ne!(other.compute_address(0)?, address);

    check_tuple(init);
    Ok(())
}

#[test]
fn dispatch_text_commands() -> anyhow::Result<()> {
    for command in SplitterCommand::ALL {
        let body = SplitterMessage::from(command).to_body()?;
        assert_eq!(body.parse::<TextComment>()?.0, command.as_str());
        assert_eq!(
            SplitterMessage::from_body(&body)?,
            SplitterMessage::Command(command)
        );
    }

    let body = CellBuilder::build_from(TextComment("hello".to_owned()))?;
    let msg = SplitterMessage::from_body(&body)?;
    assert_eq!(msg, SplitterMessage::Comment("hello".to_owned()));
    assert_eq!(msg.opcode(), Some(0));
    assert_eq!(msg.to_body()?, body);

    // Commands are case sensitive
    let body = CellBuilder::build_from(TextComment("withdraw".to_owned()))?;
    assert_eq!(
        SplitterMessage::from_body(&body)?,
        SplitterMessage::Comment("withdraw".to_owned())
    );
    Ok(())
}

#[test]
fn dispatch_records() -> anyhow::Result<()> {
    let messages: Vec<SplitterMessage> = vec![
        Deploy { query_id: 1 }.into(),
        DeployOk { query_id: 2 }.into(),
        ChangeOwner { new_owner: addr(6) }.into(),
        PoolCommandMessage {
            query_id: 3,
            value: Tokens::new(1),
            mode: 0,
            bounce: false,
            body: Cell::empty_cell(),
        }
        .into(),
        MembersChangeMessage {
            query_id: 4,
            gas_limit: Tokens::new(5),
            members: members(),
            denominator: Int257::new(100)?,
        }
        .into(),
        WithdrawStake {
            query_id: 5,
            gas_limit: Tokens::new(6),
            stake: Tokens::new(7),
        }
        .into(),
        WithdrawStakeResponse { query_id: 6 }.into(),
        WithdrawStakeDelayed { query_id: 7 }.into(),
    ];

    for msg in messages {
        let body = msg.to_body()?;
        let opcode = body.as_slice()?.load_u32()?;
        assert_eq!(msg.opcode(), Some(opcode));

        let parsed = SplitterMessage::from_body(&body)?;
        assert_eq!(parsed, msg);
        assert_eq!(parsed.to_body()?, body);
    }
    Ok(())
}

#[test]
fn dispatch_unknown() -> anyhow::Result<()> {
    // Unknown opcode
    let mut builder = CellBuilder::new();
    builder.store_u32(0x12345678)?;
    builder.store_u8(1)?;
    builder.store_reference(Cell::empty_cell())?;
    let body = builder.build()?;
    let msg = SplitterMessage::from_body(&body)?;
    assert_eq!(msg, SplitterMessage::Unknown(body.clone()));
    assert_eq!(msg.opcode(), Some(0x12345678));
    assert_eq!(msg.to_body()?, body);

    // Too short for an opcode
    let body = CellBuilder::build_from(0xffu8)?;
    let msg = SplitterMessage::from_body(&body)?;
    assert_eq!(msg, SplitterMessage::Unknown(body));
    assert_eq!(msg.opcode(), None);

    // Zero opcode with a non-text payload
    let mut builder = CellBuilder::new();
    builder.store_u32(0)?;
    builder.store_u16(0xffff)?;
    let body = builder.build()?;
    assert_eq!(
        SplitterMessage::from_body(&body)?,
        SplitterMessage::Unknown(body)
    );

    // Known opcode with a malformed payload is an error
    let body = CellBuilder::build_from(SplitterMessage::WITHDRAW_STAKE)?;
    assert_eq!(
        SplitterMessage::from_body(&body).unwrap_err(),
        Error::CellUnderflow
    );
    Ok(())
}
