use crate::cell::*;
use crate::error::Error;
use crate::util::{unlikely, IterStatus};

use super::{build_dict_from_entries, check_fork, dict_get, invalid_dict, read_label};

/// Dictionary with fixed length keys (where `N` is a number of bits in each key).
///
/// # TLB scheme
///
/// ```text
/// hm_edge#_ {n:#} {X:Type} {l:#} {m:#} label:(HmLabel ~l n)
///           {n = (~m) + l} node:(HashmapNode m X) = Hashmap n X;
///
/// hmn_leaf#_ {X:Type} value:X = HashmapNode 0 X;
/// hmn_fork#_ {n:#} {X:Type} left:^(Hashmap n X)
///            right:^(Hashmap n X) = HashmapNode (n + 1) X;
///
/// hml_short$0 {m:#} {n:#} len:(Unary ~n) {n <= m} s:(n * Bit) = HmLabel ~n m;
/// hml_long$10 {m:#} n:(#<= m) s:(n * Bit) = HmLabel ~n m;
/// hml_same$11 {m:#} v:Bit n:(#<= m) = HmLabel ~n m;
///
/// hme_empty$0 {n:#} {X:Type} = HashmapE n X;
/// hme_root$1 {n:#} {X:Type} root:^(Hashmap n X) = HashmapE n X;
/// ```
#[derive(Default, Clone, Eq, PartialEq)]
pub struct RawDict<const N: u16>(pub(crate) Option<Cell>);

impl<'a, const N: u16> Load<'a> for RawDict<N> {
    #[inline]
    fn load_from(slice: &mut CellSlice<'a>) -> Result<Self, Error> {
        let dict = Self(ok!(<_>::load_from(slice)));
        ok!(dict.validate());
        Ok(dict)
    }
}

impl<const N: u16> Store for RawDict<N> {
    #[inline]
    fn store_into(
        &self,
        builder: &mut CellBuilder,
        context: &mut dyn CellContext,
    ) -> Result<(), Error> {
        self.0.store_into(builder, context)
    }
}

impl<const N: u16> From<Option<Cell>> for RawDict<N> {
    #[inline]
    fn from(value: Option<Cell>) -> Self {
        Self(value)
    }
}

impl<const N: u16> std::fmt::Debug for RawDict<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawDict")
            .field("key_bit_len", &N)
            .field("root", &self.0)
            .finish()
    }
}

impl<const N: u16> RawDict<N> {
    /// Creates an empty dictionary.
    pub const fn new() -> Self {
        Self(None)
    }

    /// Returns `true` if the dictionary contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Returns the underlying root cell of the dictionary.
    #[inline]
    pub const fn root(&self) -> &Option<Cell> {
        &self.0
    }

    /// Builds a dictionary from raw keys and values.
    pub fn try_from_entries(
        entries: Vec<(CellBuilder, CellBuilder)>,
        context: &mut dyn CellContext,
    ) -> Result<Self, Error> {
        match build_dict_from_entries(entries, N, context) {
            Ok(root) => Ok(Self(root)),
            Err(e) => Err(e),
        }
    }

    /// Returns a `CellSlice` of the value corresponding to the key.
    pub fn get<'a>(&'a self, key: CellSlice<'_>) -> Result<Option<CellSlice<'a>>, Error> {
        dict_get(self.0.as_ref(), N, key)
    }

    /// Returns `true` if the dictionary contains a value for the specified key.
    pub fn contains_key(&self, key: CellSlice<'_>) -> Result<bool, Error> {
        Ok(ok!(self.get(key)).is_some())
    }

    /// Walks the whole trie checking every label and fork.
    ///
    /// Fails with [`Error::InvalidDict`] on malformed trie data.
    pub fn validate(&self) -> Result<(), Error> {
        for entry in self.iter() {
            if let Err(e) = entry {
                return Err(invalid_dict(e));
            }
        }
        Ok(())
    }

    /// Gets an iterator over the entries of the dictionary, sorted by key.
    /// The iterator element type is `Result<(CellBuilder, CellSlice)>`.
    ///
    /// If the dictionary is invalid, finishes after the first invalid element,
    /// returning an error.
    pub fn iter(&'_ self) -> RawIter<'_> {
        RawIter::new(&self.0, N)
    }
}

/// An iterator over the entries of a [`RawDict`] or a [`Dict`].
///
/// [`Dict`]: crate::dict::Dict
#[derive(Clone)]
pub struct RawIter<'a> {
    segments: Vec<IterSegment<'a>>,
    status: IterStatus,
    signed: bool,
}

impl<'a> RawIter<'a> {
    /// Creates an iterator over the entries of a dictionary.
    pub fn new(root: &'a Option<Cell>, bit_len: u16) -> Self {
        Self::new_ext(root, bit_len, false)
    }

    /// Creates an iterator which treats keys as signed integers
    /// when `signed` is set.
    pub fn new_ext(root: &'a Option<Cell>, bit_len: u16, signed: bool) -> Self {
        let mut segments = Vec::new();

        // Push root segment if any
        if let Some(root) = root {
            let Ok(data) = root.as_slice() else {
                return Self {
                    segments,
                    status: IterStatus::Pruned,
                    signed,
                };
            };

            segments.push(IterSegment {
                data,
                key: CellBuilder::new(),
                remaining_bit_len: bit_len,
            });
        }

        Self {
            segments,
            status: IterStatus::Valid,
            signed,
        }
    }

    /// Changes the behavior of the iterator to reverse the high bit.
    #[inline]
    pub fn signed(mut self) -> Self {
        self.signed = true;
        self
    }

    /// Returns whether the iterator treats keys as signed integers.
    #[inline]
    pub fn is_signed(&self) -> bool {
        self.signed
    }

    #[inline]
    pub(crate) fn finish(&mut self, err: Error) -> Error {
        self.status = IterStatus::Broken;
        err
    }
}

impl<'a> Iterator for RawIter<'a> {
    type Item = Result<(CellBuilder, CellSlice<'a>), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if unlikely(!self.status.is_valid()) {
            return if self.status.is_pruned() {
                self.status = IterStatus::Broken;
                Some(Err(Error::PrunedBranchAccess))
            } else {
                None
            };
        }

        fn next_impl<'a>(
            segments: &mut Vec<IterSegment<'a>>,
            signed: bool,
        ) -> Result<Option<(CellBuilder, CellSlice<'a>)>, Error> {
            loop {
                let Some(IterSegment {
                    mut data,
                    mut key,
                    remaining_bit_len,
                }) = segments.pop()
                else {
                    return Ok(None);
                };

                // Read the next key part from the latest segment
                let prefix = ok!(read_label(&mut data, remaining_bit_len));
                ok!(key.store_slice_data(&prefix));

                let remaining_bit_len = remaining_bit_len - prefix.remaining_bits();
                if remaining_bit_len == 0 {
                    return Ok(Some((key, data)));
                }

                ok!(check_fork(&data));

                // Right branch is visited after the left one, unless
                // it holds the negative half of signed keys
                let order = if signed && key.bit_len() == 0 {
                    [false, true]
                } else {
                    [true, false]
                };
                for bit in order {
                    let child = ok!(ok!(data.get_reference(bit as u8)).as_slice());
                    let mut child_key = key.clone();
                    ok!(child_key.store_bit(bit));
                    segments.push(IterSegment {
                        data: child,
                        key: child_key,
                        remaining_bit_len: remaining_bit_len - 1,
                    });
                }
            }
        }

        match next_impl(&mut self.segments, self.signed) {
            Ok(res) => res.map(Ok),
            Err(e) => Some(Err(self.finish(e))),
        }
    }
}

#[derive(Clone)]
struct IterSegment<'a> {
    data: CellSlice<'a>,
    key: CellBuilder,
    remaining_bit_len: u16,
}
