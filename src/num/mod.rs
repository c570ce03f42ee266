//! Integer types used in contract models.

use num_bigint::{BigInt, BigUint, Sign};

use crate::cell::*;
use crate::error::{Error, ParseIntError};
use crate::util::unlikely;

/// Variable-length 120-bit integer, the "coins" encoding.
///
/// Stored as 4 bits of the byte length followed by the
/// big-endian bytes of the value.
#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Tokens(u128);

impl Tokens {
    /// Zero amount.
    pub const ZERO: Self = Tokens(0);

    /// The largest value that can be represented by this integer type.
    pub const MAX: Self = Tokens((1 << (15 * 8)) - 1);

    /// The number of data bits that the length occupies.
    pub const LEN_BITS: u16 = 4;

    /// The maximum number of data bits that this struct occupies.
    pub const MAX_BITS: u16 = Self::LEN_BITS + 15 * 8;

    /// Creates a new integer value from a primitive integer.
    #[inline]
    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    /// Converts integer into an underlying primitive integer.
    #[inline]
    pub const fn into_inner(self) -> u128 {
        self.0
    }

    /// Returns `true` if an underlying primitive integer is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if an underlying primitive integer fits into the repr.
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.0 <= Self::MAX.0
    }

    /// Returns the number of data bits that this struct occupies.
    /// Returns `None` if an underlying primitive integer is too large.
    pub const fn bit_len(&self) -> Option<u16> {
        let bytes = (16 - self.0.leading_zeros() / 8) as u16;
        if unlikely(bytes > 15) {
            None
        } else {
            Some(Self::LEN_BITS + bytes * 8)
        }
    }
}

impl From<Tokens> for u128 {
    #[inline]
    fn from(value: Tokens) -> Self {
        value.0
    }
}

impl TryFrom<u128> for Tokens {
    type Error = ParseIntError;

    #[inline]
    fn try_from(inner: u128) -> Result<Self, Self::Error> {
        let result = Self::new(inner);
        if result.is_valid() {
            Ok(result)
        } else {
            Err(ParseIntError::Overflow)
        }
    }
}

impl std::str::FromStr for Tokens {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match u128::from_str(s) {
            Ok(inner) => Self::try_from(inner),
            Err(e) => Err(ParseIntError::InvalidString(e)),
        }
    }
}

impl std::fmt::Display for Tokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl Store for Tokens {
    fn store_into(&self, builder: &mut CellBuilder, _: &mut dyn CellContext) -> Result<(), Error> {
        let bytes = (16 - self.0.leading_zeros() / 8) as u8;
        if unlikely(bytes > 15) {
            return Err(Error::IntOverflow);
        }

        let bits = bytes as u16 * 8;
        if unlikely(!builder.has_capacity(Self::LEN_BITS + bits, 0)) {
            return Err(Error::CellOverflow);
        }

        ok!(builder.store_small_uint(bytes, Self::LEN_BITS));
        store_u128(builder, self.0, bits)
    }
}

impl<'a> Load<'a> for Tokens {
    fn load_from(slice: &mut CellSlice<'a>) -> Result<Self, Error> {
        let bytes = ok!(slice.load_small_uint(Self::LEN_BITS));
        match load_u128(slice, bytes) {
            Ok(value) => Ok(Self(value)),
            Err(e) => Err(e),
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Tokens {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if serializer.is_human_readable() {
            serializer.collect_str(&self.0)
        } else {
            self.0.serialize(serializer)
        }
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Tokens {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{Error, Unexpected, Visitor};

        struct Expected;

        impl serde::de::Expected for Expected {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("Tokens")
            }
        }

        struct TokensVisitor;

        impl Visitor<'_> for TokensVisitor {
            type Value = u128;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a string with a number")
            }

            fn visit_str<E: Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }
        }

        let res = Self::new(ok!(if deserializer.is_human_readable() {
            deserializer.deserialize_str(TokensVisitor)
        } else {
            u128::deserialize(deserializer)
        }));

        if res.is_valid() {
            Ok(res)
        } else {
            Err(D::Error::invalid_type(
                Unexpected::Other("big number"),
                &Expected,
            ))
        }
    }
}

fn store_u128(builder: &mut CellBuilder, value: u128, mut bits: u16) -> Result<(), Error> {
    if let Some(high_bits) = bits.checked_sub(64) {
        ok!(builder.store_uint((value >> 64) as u64, high_bits));
        bits -= high_bits;
    }
    builder.store_uint(value as u64, bits)
}

fn load_u128(slice: &mut CellSlice<'_>, mut bytes: u8) -> Result<u128, Error> {
    let mut result: u128 = 0;
    if let Some(high_bytes) = bytes.checked_sub(8) {
        if high_bytes > 0 {
            result = (ok!(slice.load_uint(high_bytes as u16 * 8)) as u128) << 64;
            bytes -= high_bytes;
        }
    }

    match slice.load_uint(bytes as u16 * 8) {
        Ok(value) => Ok(result | value as u128),
        Err(e) => Err(e),
    }
}

/// Fixed-width two's complement integer of `BITS` bits.
#[derive(Debug, Default, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[repr(transparent)]
pub struct IntN<const BITS: u16>(BigInt);

/// Fixed-width unsigned integer of `BITS` bits.
#[derive(Debug, Default, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[repr(transparent)]
pub struct UintN<const BITS: u16>(BigUint);

/// Signed 257-bit integer, the native stack integer width.
pub type Int257 = IntN<257>;

/// Unsigned 256-bit integer stored in 257 bits.
pub type Uint257 = UintN<257>;

impl<const BITS: u16> IntN<BITS> {
    /// The number of data bits that this struct occupies.
    pub const BITS: u16 = BITS;

    /// Wraps a big integer, failing if it does not fit into `BITS`.
    pub fn new<T: Into<BigInt>>(value: T) -> Result<Self, Error> {
        let value = value.into();
        if unlikely(!int_fits(&value, BITS)) {
            return Err(Error::IntOverflow);
        }
        Ok(Self(value))
    }

    /// Returns `true` if the value is zero.
    pub fn is_zero(&self) -> bool {
        self.0.sign() == Sign::NoSign
    }

    /// Returns the underlying big integer.
    #[inline]
    pub fn as_bigint(&self) -> &BigInt {
        &self.0
    }

    /// Converts into the underlying big integer.
    #[inline]
    pub fn into_inner(self) -> BigInt {
        self.0
    }
}

impl<const BITS: u16> UintN<BITS> {
    /// The number of data bits that this struct occupies.
    pub const BITS: u16 = BITS;

    /// Wraps a big unsigned integer, failing if it does not fit into `BITS`.
    pub fn new<T: Into<BigUint>>(value: T) -> Result<Self, Error> {
        let value = value.into();
        if unlikely(value.bits() > BITS as u64) {
            return Err(Error::IntOverflow);
        }
        Ok(Self(value))
    }

    /// Returns `true` if the value is zero.
    pub fn is_zero(&self) -> bool {
        self.0.bits() == 0
    }

    /// Returns the underlying big integer.
    #[inline]
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    /// Converts into the underlying big integer.
    #[inline]
    pub fn into_inner(self) -> BigUint {
        self.0
    }

    /// Converts into a signed integer.
    pub fn to_bigint(&self) -> BigInt {
        BigInt::from(self.0.clone())
    }
}

fn int_fits(value: &BigInt, bits: u16) -> bool {
    if bits == 0 {
        return value.sign() == Sign::NoSign;
    }
    let magnitude_bits = value.magnitude().bits();
    match value.sign() {
        Sign::NoSign => true,
        Sign::Plus => magnitude_bits < bits as u64,
        // -2^(bits-1) is the only value with `bits` magnitude bits that fits
        Sign::Minus => {
            magnitude_bits < bits as u64
                || (magnitude_bits == bits as u64
                    && value.magnitude().trailing_zeros() == Some(bits as u64 - 1))
        }
    }
}

impl<const BITS: u16> From<IntN<BITS>> for BigInt {
    #[inline]
    fn from(value: IntN<BITS>) -> Self {
        value.0
    }
}

impl<const BITS: u16> From<UintN<BITS>> for BigUint {
    #[inline]
    fn from(value: UintN<BITS>) -> Self {
        value.0
    }
}

impl<const BITS: u16> TryFrom<BigInt> for IntN<BITS> {
    type Error = Error;

    #[inline]
    fn try_from(value: BigInt) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<const BITS: u16> TryFrom<BigInt> for UintN<BITS> {
    type Error = Error;

    fn try_from(value: BigInt) -> Result<Self, Self::Error> {
        match value.to_biguint() {
            Some(value) => Self::new(value),
            None => Err(Error::IntOverflow),
        }
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty),*$(,)?) => {
        $(impl<const BITS: u16> TryFrom<$ty> for IntN<BITS> {
            type Error = Error;

            #[inline]
            fn try_from(value: $ty) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        })*
    };
}

impl_from_primitive!(i8, i16, i32, i64, i128, u8, u16, u32, u64, u128);

impl<const BITS: u16> std::str::FromStr for IntN<BITS> {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<BigInt>() {
            Ok(value) => Self::new(value).map_err(|_| ParseIntError::Overflow),
            Err(e) => Err(ParseIntError::InvalidBigInt(e)),
        }
    }
}

impl<const BITS: u16> std::str::FromStr for UintN<BITS> {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<BigUint>() {
            Ok(value) => Self::new(value).map_err(|_| ParseIntError::Overflow),
            Err(e) => Err(ParseIntError::InvalidBigInt(e)),
        }
    }
}

impl<const BITS: u16> std::fmt::Display for IntN<BITS> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl<const BITS: u16> std::fmt::Display for UintN<BITS> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl<const BITS: u16> Store for IntN<BITS> {
    #[inline]
    fn store_into(&self, builder: &mut CellBuilder, _: &mut dyn CellContext) -> Result<(), Error> {
        builder.store_bigint(&self.0, BITS, true)
    }
}

impl<'a, const BITS: u16> Load<'a> for IntN<BITS> {
    #[inline]
    fn load_from(slice: &mut CellSlice<'a>) -> Result<Self, Error> {
        match slice.load_bigint(BITS, true) {
            Ok(value) => Ok(Self(value)),
            Err(e) => Err(e),
        }
    }
}

impl<const BITS: u16> Store for UintN<BITS> {
    #[inline]
    fn store_into(&self, builder: &mut CellBuilder, _: &mut dyn CellContext) -> Result<(), Error> {
        builder.store_biguint(&self.0, BITS)
    }
}

impl<'a, const BITS: u16> Load<'a> for UintN<BITS> {
    #[inline]
    fn load_from(slice: &mut CellSlice<'a>) -> Result<Self, Error> {
        match slice.load_biguint(BITS) {
            Ok(value) => Ok(Self(value)),
            Err(e) => Err(e),
        }
    }
}

#[cfg(feature = "serde")]
macro_rules! impl_bigint_serde {
    ($ident:ident) => {
        impl<const BITS: u16> serde::Serialize for $ident<BITS> {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.collect_str(&self.0)
            }
        }

        impl<'de, const BITS: u16> serde::Deserialize<'de> for $ident<BITS> {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                use serde::de::{Error, Visitor};

                struct BigIntVisitor<const BITS: u16>;

                impl<const BITS: u16> Visitor<'_> for BigIntVisitor<BITS> {
                    type Value = $ident<BITS>;

                    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                        f.write_str("a string with a number")
                    }

                    fn visit_str<E: Error>(self, v: &str) -> Result<Self::Value, E> {
                        v.parse().map_err(E::custom)
                    }
                }

                deserializer.deserialize_str(BigIntVisitor::<BITS>)
            }
        }
    };
}

#[cfg(feature = "serde")]
impl_bigint_serde!(IntN);
#[cfg(feature = "serde")]
impl_bigint_serde!(UintN);

#[cfg(test)]
mod tests {
    use super::*;

    fn store<T: Store>(value: &T) -> Result<Cell, Error> {
        let mut builder = CellBuilder::new();
        value.store_into(&mut builder, &mut Cell::empty_context())?;
        builder.build()
    }

    #[test]
    fn tokens_conversions() {
        assert_eq!(u128::from(Tokens::new(10)), 10);
        assert_eq!(Tokens::try_from(Tokens::MAX.into_inner()).unwrap(), Tokens::MAX);
        assert!(matches!(
            Tokens::try_from(Tokens::MAX.into_inner() + 1),
            Err(ParseIntError::Overflow)
        ));
        assert!(!Tokens::new(u128::MAX).is_valid());
        assert_eq!(Tokens::new(u128::MAX).bit_len(), None);
        assert_eq!(Tokens::new(1_000_000_000).to_string(), "1000000000");
    }

    #[test]
    fn tokens_serialization() {
        for i in 0..128 {
            let value = Tokens::new(1 << i);
            if value <= Tokens::MAX {
                let cell = store(&value).unwrap();
                assert_eq!(value.bit_len().unwrap(), cell.bit_len());
                let len = cell.as_slice().unwrap().load_small_uint(4).unwrap();
                assert_eq!(len as u16 * 8 + 4, cell.bit_len());
            } else {
                assert_eq!(store(&value).unwrap_err(), Error::IntOverflow);
            }
        }

        // Zero is just the empty length prefix
        let cell = store(&Tokens::ZERO).unwrap();
        assert_eq!(cell.bit_len(), 4);
        assert_eq!(cell.as_slice().unwrap().load_small_uint(4).unwrap(), 0);
    }

    #[test]
    fn tokens_deserialization() {
        let mut value = Tokens::new(0xabcdef89abcdefdeadbeeffafacafe);
        for _ in 0..=120 {
            let cell = store(&value).unwrap();
            let parsed = Tokens::load_from(&mut cell.as_slice().unwrap()).unwrap();
            assert_eq!(parsed, value);
            value = Tokens::new(value.into_inner() >> 1);
        }
    }

    #[test]
    fn tokens_from_str() {
        assert_eq!(
            "1000000000".parse::<Tokens>().unwrap(),
            Tokens::new(1_000_000_000)
        );
        assert!(matches!(
            "1329227995784915872903807060280344576".parse::<Tokens>(),
            Err(ParseIntError::Overflow)
        ));
        assert!(matches!(
            "abc".parse::<Tokens>(),
            Err(ParseIntError::InvalidString(_))
        ));
    }

    #[test]
    fn int257_bounds() {
        let max: BigInt = (BigInt::from(1) << 256u32) - 1;
        let min: BigInt = -(BigInt::from(1) << 256u32);

        assert!(Int257::new(max.clone()).is_ok());
        assert!(Int257::new(min.clone()).is_ok());
        assert_eq!(Int257::new(&max + 1).unwrap_err(), Error::IntOverflow);
        assert_eq!(Int257::new(&min - 1).unwrap_err(), Error::IntOverflow);

        for value in [max, min, BigInt::from(-1), BigInt::from(0), BigInt::from(12345)] {
            let value = Int257::new(value).unwrap();
            let cell = store(&value).unwrap();
            assert_eq!(cell.bit_len(), 257);
            let parsed = Int257::load_from(&mut cell.as_slice().unwrap()).unwrap();
            assert_eq!(parsed, value);
        }
    }

    #[test]
    fn small_signed_widths() {
        type Int8 = IntN<8>;
        assert!(Int8::try_from(127).is_ok());
        assert!(Int8::try_from(-128).is_ok());
        assert!(Int8::try_from(128).is_err());
        assert!(Int8::try_from(-129).is_err());

        let cell = store(&Int8::try_from(-1).unwrap()).unwrap();
        assert_eq!(cell.data(), &[0xff]);
    }

    #[test]
    fn uint257_serialization() {
        let max = (BigUint::from(1u8) << 257u32) - 1u8;
        let value = Uint257::new(max.clone()).unwrap();
        let cell = store(&value).unwrap();
        assert_eq!(cell.bit_len(), 257);
        assert_eq!(Uint257::load_from(&mut cell.as_slice().unwrap()).unwrap(), value);

        assert_eq!(Uint257::new(max + 1u8).unwrap_err(), Error::IntOverflow);
        assert!(Uint257::try_from(BigInt::from(-1)).is_err());
    }

    #[test]
    fn bigint_from_str() {
        let value = "-115792089237316195423570985008687907853269984665640564039457584007913129639936"
            .parse::<Int257>()
            .unwrap();
        assert_eq!(value.as_bigint(), &-(BigInt::from(1) << 256u32));
        assert_eq!(value.to_string().parse::<Int257>().unwrap(), value);

        assert!(matches!(
            "-1".parse::<Uint257>(),
            Err(ParseIntError::InvalidBigInt(_))
        ));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_representation() -> anyhow::Result<()> {
        let tokens = Tokens::new(123_000_000_000);
        assert_eq!(serde_json::to_string(&tokens)?, "\"123000000000\"");
        assert_eq!(serde_json::from_str::<Tokens>("\"123000000000\"")?, tokens);

        let value = Int257::try_from(-42)?;
        assert_eq!(serde_json::to_string(&value)?, "\"-42\"");
        assert_eq!(serde_json::from_str::<Int257>("\"-42\"")?, value);
        Ok(())
    }
}
