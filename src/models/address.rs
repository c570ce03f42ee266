//! Message address models.

use std::str::FromStr;

use crate::cell::*;
use crate::error::{Error, ParseAddrError};
use crate::util::unlikely;

/// Message address.
///
/// # TLB scheme
///
/// ```text
/// addr_none$00 = MsgAddressExt;
/// addr_extern$01 len:(## 9) external_address:(bits len) = MsgAddressExt;
/// addr_std$10 anycast:(Maybe Anycast) workchain_id:int8 address:bits256 = MsgAddressInt;
/// addr_var$11 anycast:(Maybe Anycast) addr_len:(## 9) workchain_id:int32
///     address:(bits addr_len) = MsgAddressInt;
/// ```
///
/// Variable-length internal addresses and anycast info are not supported.
#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum MsgAddress {
    /// Empty address.
    #[default]
    None,
    /// Standard internal address.
    Std(StdAddr),
    /// External address.
    Ext(ExtAddr),
}

impl MsgAddress {
    /// Returns the number of data bits that this address occupies.
    pub const fn bit_len(&self) -> u16 {
        match self {
            Self::None => 2,
            Self::Std(addr) => addr.bit_len(),
            Self::Ext(addr) => addr.bit_len(),
        }
    }

    /// Returns the standard address if any.
    pub const fn as_std(&self) -> Option<&StdAddr> {
        match self {
            Self::Std(addr) => Some(addr),
            _ => None,
        }
    }

    /// Returns `true` if this is an empty address.
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl From<StdAddr> for MsgAddress {
    #[inline]
    fn from(value: StdAddr) -> Self {
        Self::Std(value)
    }
}

impl From<ExtAddr> for MsgAddress {
    #[inline]
    fn from(value: ExtAddr) -> Self {
        Self::Ext(value)
    }
}

impl Store for MsgAddress {
    fn store_into(
        &self,
        builder: &mut CellBuilder,
        context: &mut dyn CellContext,
    ) -> Result<(), Error> {
        match self {
            Self::None => builder.store_zeros(2),
            Self::Std(addr) => addr.store_into(builder, context),
            Self::Ext(addr) => addr.store_into(builder, context),
        }
    }
}

impl<'a> Load<'a> for MsgAddress {
    fn load_from(slice: &mut CellSlice<'a>) -> Result<Self, Error> {
        match ok!(slice.load_small_uint(2)) {
            0b00 => Ok(Self::None),
            0b01 => ExtAddr::load_data(slice).map(Self::Ext),
            0b10 => StdAddr::load_data(slice).map(Self::Std),
            _ => Err(Error::InvalidTag),
        }
    }
}

impl std::fmt::Display for MsgAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Std(addr) => std::fmt::Display::fmt(addr, f),
            Self::Ext(addr) => std::fmt::Display::fmt(addr, f),
        }
    }
}

/// Standard internal address.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct StdAddr {
    /// Workchain id (one-byte range).
    pub workchain: i8,
    /// Account id.
    pub address: HashBytes,
}

impl StdAddr {
    /// The number of data bits that address occupies.
    ///
    /// - 2 bits id (`0b10`)
    /// - 1 bit Maybe None
    /// - 8 bits workchain
    /// - 256 bits address
    pub const BITS: u16 = 2 + 1 + 8 + 256;

    /// Masterchain workchain id.
    pub const MASTERCHAIN_WORKCHAIN: i8 = -1;

    /// Base workchain id.
    pub const BASECHAIN_WORKCHAIN: i8 = 0;

    /// Constructs a new standard address.
    #[inline]
    pub const fn new(workchain: i8, address: HashBytes) -> Self {
        Self { workchain, address }
    }

    /// Returns `true` if this address is for a masterchain block.
    #[inline]
    pub const fn is_masterchain(&self) -> bool {
        self.workchain == Self::MASTERCHAIN_WORKCHAIN
    }

    /// Returns the number of data bits that this address occupies.
    #[inline]
    pub const fn bit_len(&self) -> u16 {
        Self::BITS
    }

    /// Reads the address after the `0b10` tag.
    fn load_data(slice: &mut CellSlice<'_>) -> Result<Self, Error> {
        if unlikely(ok!(slice.load_bit())) {
            // Anycast info is not supported
            return Err(Error::InvalidData);
        }
        Ok(Self {
            workchain: ok!(slice.load_u8()) as i8,
            address: ok!(slice.load_u256()),
        })
    }

    /// Parses a user-friendly base64 address.
    #[cfg(feature = "base64")]
    pub fn from_base64(s: &str) -> Result<(Self, Base64StdAddrFlags), ParseAddrError> {
        if s.len() != 48 {
            return Err(ParseAddrError::BadFormat);
        }

        let mut buffer = [0u8; 36];
        match crate::util::decode_base64_any_slice(s.as_bytes(), &mut buffer) {
            Ok(36) => {}
            _ => return Err(ParseAddrError::BadFormat),
        }

        let crc = crate::util::crc_16(&buffer[..34]);
        if buffer[34..] != crc.to_be_bytes() {
            return Err(ParseAddrError::InvalidChecksum);
        }

        let flags = buffer[0];
        let testnet = flags & Base64StdAddrFlags::TESTNET_FLAG != 0;
        let bounceable = match flags & !Base64StdAddrFlags::TESTNET_FLAG {
            Base64StdAddrFlags::BOUNCEABLE_TAG => true,
            Base64StdAddrFlags::NON_BOUNCEABLE_TAG => false,
            _ => return Err(ParseAddrError::BadFormat),
        };

        let mut address = HashBytes::ZERO;
        address.0.copy_from_slice(&buffer[2..34]);

        let addr = Self::new(buffer[1] as i8, address);
        let flags = Base64StdAddrFlags {
            testnet,
            base64_url: s.bytes().any(|c| matches!(c, b'-' | b'_')),
            bounceable,
        };
        Ok((addr, flags))
    }

    /// Encodes the address into the user-friendly base64 form.
    #[cfg(feature = "base64")]
    pub fn to_base64(&self, flags: Base64StdAddrFlags) -> String {
        use base64::engine::general_purpose::{STANDARD, URL_SAFE};
        use base64::Engine;

        let mut buffer = [0u8; 36];
        buffer[0] = flags.tag();
        buffer[1] = self.workchain as u8;
        buffer[2..34].copy_from_slice(self.address.as_slice());
        let crc = crate::util::crc_16(&buffer[..34]);
        buffer[34..].copy_from_slice(&crc.to_be_bytes());

        let engine = if flags.base64_url { &URL_SAFE } else { &STANDARD };
        engine.encode(buffer)
    }
}

impl std::fmt::Display for StdAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}:{}", self.workchain, self.address))
    }
}

impl FromStr for StdAddr {
    type Err = ParseAddrError;

    /// Parses either a raw `workchain:hex` address or a user-friendly
    /// base64 address.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseAddrError::Empty);
        }

        #[cfg(feature = "base64")]
        if s.len() == 48 && !s.contains(':') {
            return Self::from_base64(s).map(|(addr, _)| addr);
        }

        let mut result = Self::default();

        let mut parts = s.split(':');
        match parts.next() {
            Some(part) => match part.parse() {
                Ok(workchain) => result.workchain = workchain,
                Err(_) => return Err(ParseAddrError::InvalidWorkchain),
            },
            None => return Err(ParseAddrError::Empty),
        }

        match parts.next() {
            Some(part) => match hex::decode_to_slice(part, &mut result.address.0) {
                Ok(()) => {}
                Err(_) => return Err(ParseAddrError::InvalidAccountId),
            },
            None => return Err(ParseAddrError::InvalidAccountId),
        }

        if parts.next().is_none() {
            Ok(result)
        } else {
            Err(ParseAddrError::UnexpectedPart)
        }
    }
}

impl Store for StdAddr {
    fn store_into(&self, builder: &mut CellBuilder, _: &mut dyn CellContext) -> Result<(), Error> {
        if !builder.has_capacity(self.bit_len(), 0) {
            return Err(Error::CellOverflow);
        }
        ok!(builder.store_small_uint(0b100, 3));
        ok!(builder.store_u8(self.workchain as u8));
        builder.store_u256(&self.address)
    }
}

impl<'a> Load<'a> for StdAddr {
    fn load_from(slice: &mut CellSlice<'a>) -> Result<Self, Error> {
        if ok!(slice.load_small_uint(2)) != 0b10 {
            return Err(Error::InvalidTag);
        }
        Self::load_data(slice)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for StdAddr {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            (self.workchain, &self.address).serialize(serializer)
        }
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for StdAddr {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{Error, Visitor};

        struct StdAddrVisitor;

        impl Visitor<'_> for StdAddrVisitor {
            type Value = StdAddr;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a standard address")
            }

            fn visit_str<E: Error>(self, value: &str) -> Result<Self::Value, E> {
                StdAddr::from_str(value).map_err(E::custom)
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_str(StdAddrVisitor)
        } else {
            <(i8, HashBytes)>::deserialize(deserializer)
                .map(|(workchain, address)| Self::new(workchain, address))
        }
    }
}

/// Flags of the user-friendly address form.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct Base64StdAddrFlags {
    /// Address belongs to testnet.
    pub testnet: bool,
    /// Use url-safe base64 alphabet.
    pub base64_url: bool,
    /// Whether to set `bounce` flag when sending messages to this address.
    pub bounceable: bool,
}

impl Base64StdAddrFlags {
    const BOUNCEABLE_TAG: u8 = 0x11;
    const NON_BOUNCEABLE_TAG: u8 = 0x51;
    const TESTNET_FLAG: u8 = 0x80;

    /// Returns the leading byte of the user-friendly form.
    pub const fn tag(&self) -> u8 {
        let tag = if self.bounceable {
            Self::BOUNCEABLE_TAG
        } else {
            Self::NON_BOUNCEABLE_TAG
        };
        if self.testnet {
            tag | Self::TESTNET_FLAG
        } else {
            tag
        }
    }
}

/// External address.
#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ExtAddr {
    /// Number of bits stored in data.
    pub data_bit_len: u16,
    /// External address data.
    pub data: Vec<u8>,
}

impl ExtAddr {
    /// The maximum number of data bits.
    pub const MAX_DATA_BIT_LEN: u16 = (1 << 9) - 1;

    /// Creates non-empty external address.
    pub fn new<T>(data_bit_len: u16, data: T) -> Option<Self>
    where
        T: Into<Vec<u8>>,
    {
        let data = data.into();
        if data_bit_len <= Self::MAX_DATA_BIT_LEN && data.len() * 8 >= data_bit_len as usize {
            Some(Self { data_bit_len, data })
        } else {
            None
        }
    }

    /// Returns the number of data bits that this address occupies.
    pub const fn bit_len(&self) -> u16 {
        2 + 9 + self.data_bit_len
    }

    /// Reads the address after the `0b01` tag.
    fn load_data(slice: &mut CellSlice<'_>) -> Result<Self, Error> {
        let data_bit_len = ok!(slice.load_uint(9)) as u16;
        let mut data = vec![0; data_bit_len.div_ceil(8) as usize];
        ok!(slice.load_raw(&mut data, data_bit_len));
        Ok(Self { data_bit_len, data })
    }
}

impl std::fmt::Display for ExtAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bitstring = crate::util::Bitstring {
            bytes: &self.data,
            bit_len: self.data_bit_len,
        };
        f.write_fmt(format_args!(":{bitstring}"))
    }
}

impl Store for ExtAddr {
    fn store_into(&self, builder: &mut CellBuilder, _: &mut dyn CellContext) -> Result<(), Error> {
        if !builder.has_capacity(self.bit_len(), 0) {
            return Err(Error::CellOverflow);
        }
        ok!(builder.store_small_uint(0b01, 2));
        ok!(builder.store_uint(self.data_bit_len as u64, 9));
        builder.store_raw(&self.data, self.data_bit_len)
    }
}

impl<'a> Load<'a> for ExtAddr {
    fn load_from(slice: &mut CellSlice<'a>) -> Result<Self, Error> {
        if ok!(slice.load_small_uint(2)) != 0b01 {
            return Err(Error::InvalidTag);
        }
        Self::load_data(slice)
    }
}
