use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::marker::PhantomData;

use crate::cell::*;
use crate::error::Error;

use super::raw::RawIter;
use super::{build_dict_from_entries, dict_get, invalid_dict, DictKey};

/// Typed dictionary with fixed length keys.
///
/// Values are stored inline in the trie leaves.
pub struct Dict<K, V> {
    pub(crate) root: Option<Cell>,
    _key: PhantomData<K>,
    _value: PhantomData<V>,
}

impl<'a, K, V> Load<'a> for Dict<K, V>
where
    K: DictKey,
    V: for<'b> Load<'b>,
{
    #[inline]
    fn load_from(slice: &mut CellSlice<'a>) -> Result<Self, Error> {
        Self::try_from_raw(ok!(<_>::load_from(slice)))
    }
}

impl<K, V> Store for Dict<K, V> {
    #[inline]
    fn store_into(
        &self,
        builder: &mut CellBuilder,
        context: &mut dyn CellContext,
    ) -> Result<(), Error> {
        self.root.store_into(builder, context)
    }
}

impl<K, V> Default for Dict<K, V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for Dict<K, V> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            _key: PhantomData,
            _value: PhantomData,
        }
    }
}

impl<K, V> Eq for Dict<K, V> {}

impl<K, V> PartialEq for Dict<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
    }
}

impl<K, V> From<Option<Cell>> for Dict<K, V> {
    #[inline]
    fn from(dict: Option<Cell>) -> Self {
        Self::from_raw(dict)
    }
}

impl<K, V> std::fmt::Debug for Dict<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dict").field("root", &self.root).finish()
    }
}

impl<K, V> Dict<K, V> {
    /// Creates an empty dictionary
    pub const fn new() -> Self {
        Self {
            root: None,
            _key: PhantomData,
            _value: PhantomData,
        }
    }

    /// Creates a dictionary from the root cell (or an empty one).
    ///
    /// The trie is not checked, use [`Dict::try_from_raw`] for untrusted cells.
    pub const fn from_raw(root: Option<Cell>) -> Self {
        Self {
            root,
            _key: PhantomData,
            _value: PhantomData,
        }
    }

    /// Returns `true` if the dictionary contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns the underlying root cell of the dictionary.
    #[inline]
    pub const fn root(&self) -> &Option<Cell> {
        &self.root
    }

    /// Converts into the underlying root cell of the dictionary.
    #[inline]
    pub fn into_root(self) -> Option<Cell> {
        self.root
    }
}

impl<K, V> Dict<K, V>
where
    K: Store + DictKey,
    V: Store,
{
    /// Builds a dictionary from key-value pairs in any order.
    ///
    /// Fails with [`Error::InvalidDict`] on duplicate keys.
    pub fn try_from_entries<I, Q, T>(entries: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (Q, T)>,
        Q: Borrow<K>,
        T: Borrow<V>,
    {
        Self::try_from_entries_ext(entries, &mut Cell::empty_context())
    }

    /// Builds a dictionary from key-value pairs using the specified cell context.
    pub fn try_from_entries_ext<I, Q, T>(
        entries: I,
        context: &mut dyn CellContext,
    ) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (Q, T)>,
        Q: Borrow<K>,
        T: Borrow<V>,
    {
        let mut raw = Vec::new();
        for (key, value) in entries {
            let mut key_builder = CellBuilder::new();
            ok!(key.borrow().store_into(&mut key_builder, context));
            let mut value_builder = CellBuilder::new();
            ok!(value.borrow().store_into(&mut value_builder, context));
            raw.push((key_builder, value_builder));
        }

        match build_dict_from_entries(raw, K::BITS, context) {
            Ok(root) => Ok(Self::from_raw(root)),
            Err(e) => Err(e),
        }
    }

    /// Builds a dictionary from the sorted map.
    pub fn try_from_btree(sorted: &BTreeMap<K, V>) -> Result<Self, Error> {
        Self::try_from_entries(sorted.iter())
    }
}

impl<K, V> Dict<K, V>
where
    K: DictKey,
    V: for<'b> Load<'b>,
{
    /// Creates a dictionary from the root cell, checking the whole trie.
    ///
    /// Fails with [`Error::InvalidDict`] if any label, fork, key or value
    /// is malformed.
    pub fn try_from_raw(root: Option<Cell>) -> Result<Self, Error> {
        let dict = Self::from_raw(root);
        ok!(dict.validate());
        Ok(dict)
    }

    /// Walks the trie once, loading every key and value.
    pub fn validate(&self) -> Result<(), Error> {
        for entry in RawIter::new(&self.root, K::BITS) {
            let (key, mut value) = match entry {
                Ok(entry) => entry,
                Err(e) => return Err(invalid_dict(e)),
            };
            if K::from_raw_data(key.raw_data()).is_none() {
                return Err(Error::InvalidDict);
            }
            if let Err(e) = load_leaf_value::<V>(&mut value) {
                return Err(invalid_dict(e));
            }
        }
        Ok(())
    }
}

impl<K, V> Dict<K, V>
where
    K: Store + DictKey,
{
    /// Returns `true` if the dictionary contains a value for the specified key.
    pub fn contains_key<Q>(&self, key: Q) -> Result<bool, Error>
    where
        Q: Borrow<K>,
    {
        let key = ok!(CellBuilder::build_from(key.borrow()));
        let key = ok!(key.as_slice());
        Ok(ok!(dict_get(self.root.as_ref(), K::BITS, key)).is_some())
    }

    /// Returns the value corresponding to the key.
    ///
    /// Fails with [`Error::InvalidDict`] if the value does not
    /// occupy the whole leaf.
    pub fn get<'a, Q>(&'a self, key: Q) -> Result<Option<V>, Error>
    where
        Q: Borrow<K>,
        V: Load<'a>,
    {
        let key = ok!(CellBuilder::build_from(key.borrow()));
        let key = ok!(key.as_slice());
        match ok!(dict_get(self.root.as_ref(), K::BITS, key)) {
            Some(mut value) => load_leaf_value(&mut value).map(Some),
            None => Ok(None),
        }
    }

    /// Gets an iterator over the entries of the dictionary in ascending key order.
    /// The iterator element type is `Result<(K, V)>`.
    ///
    /// If the dictionary is invalid, finishes after the first invalid element,
    /// returning an error.
    pub fn iter<'a>(&'a self) -> Iter<'a, K, V>
    where
        V: Load<'a>,
    {
        Iter::new(&self.root)
    }

    /// Gets an iterator over the keys of the dictionary in ascending order.
    /// The iterator element type is `Result<K>`.
    pub fn keys(&'_ self) -> Keys<'_, K> {
        Keys::new(&self.root)
    }

    /// Collects all entries into a sorted map.
    pub fn to_btree<'a>(&'a self) -> Result<BTreeMap<K, V>, Error>
    where
        K: Ord,
        V: Load<'a>,
    {
        self.iter().collect()
    }

    /// Counts entries of the dictionary.
    pub fn len(&self) -> Result<usize, Error> {
        let mut len = 0;
        for entry in RawIter::new(&self.root, K::BITS) {
            ok!(entry);
            len += 1;
        }
        Ok(len)
    }
}

impl<K, V> Dict<K, V>
where
    K: DictKey,
{
    /// Gets an iterator over the values of the dictionary in ascending key order.
    /// The iterator element type is `Result<V>`.
    pub fn values<'a>(&'a self) -> Values<'a, V>
    where
        V: Load<'a>,
    {
        Values::new(&self.root, K::BITS, K::SIGNED)
    }
}

fn load_leaf_value<'a, V: Load<'a>>(slice: &mut CellSlice<'a>) -> Result<V, Error> {
    let value = ok!(V::load_from(slice));
    if !slice.is_empty() {
        return Err(Error::InvalidDict);
    }
    Ok(value)
}

/// An iterator over the entries of a [`Dict`].
///
/// This struct is created by the [`iter`] method on [`Dict`].
///
/// [`iter`]: Dict::iter
pub struct Iter<'a, K, V> {
    inner: RawIter<'a>,
    _key: PhantomData<K>,
    _value: PhantomData<V>,
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _key: PhantomData,
            _value: PhantomData,
        }
    }
}

impl<'a, K, V> Iter<'a, K, V>
where
    K: DictKey,
{
    /// Creates an iterator over the entries of a dictionary.
    pub fn new(root: &'a Option<Cell>) -> Self {
        Self {
            inner: RawIter::new_ext(root, K::BITS, K::SIGNED),
            _key: PhantomData,
            _value: PhantomData,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V>
where
    K: DictKey,
    V: Load<'a>,
{
    type Item = Result<(K, V), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(match self.inner.next()? {
            Ok((key, mut value)) => {
                let Some(key) = K::from_raw_data(key.raw_data()) else {
                    return Some(Err(self.inner.finish(Error::CellUnderflow)));
                };
                match load_leaf_value(&mut value) {
                    Ok(value) => Ok((key, value)),
                    Err(e) => Err(self.inner.finish(e)),
                }
            }
            Err(e) => Err(e),
        })
    }
}

/// An iterator over the keys of a [`Dict`].
///
/// This struct is created by the [`keys`] method on [`Dict`].
///
/// [`keys`]: Dict::keys
pub struct Keys<'a, K> {
    inner: RawIter<'a>,
    _key: PhantomData<K>,
}

impl<'a, K> Keys<'a, K>
where
    K: DictKey,
{
    /// Creates an iterator over the keys of a dictionary.
    pub fn new(root: &'a Option<Cell>) -> Self {
        Self {
            inner: RawIter::new_ext(root, K::BITS, K::SIGNED),
            _key: PhantomData,
        }
    }
}

impl<K> Iterator for Keys<'_, K>
where
    K: DictKey,
{
    type Item = Result<K, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(match self.inner.next()? {
            Ok((key, _)) => match K::from_raw_data(key.raw_data()) {
                Some(key) => Ok(key),
                None => Err(self.inner.finish(Error::CellUnderflow)),
            },
            Err(e) => Err(e),
        })
    }
}

/// An iterator over the values of a [`Dict`].
///
/// This struct is created by the [`values`] method on [`Dict`].
///
/// [`values`]: Dict::values
pub struct Values<'a, V> {
    inner: RawIter<'a>,
    _value: PhantomData<V>,
}

impl<'a, V> Values<'a, V> {
    /// Creates an iterator over the values of a dictionary.
    pub fn new(root: &'a Option<Cell>, bit_len: u16, signed: bool) -> Self {
        Self {
            inner: RawIter::new_ext(root, bit_len, signed),
            _value: PhantomData,
        }
    }
}

impl<'a, V> Iterator for Values<'a, V>
where
    V: Load<'a>,
{
    type Item = Result<V, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(match self.inner.next()? {
            Ok((_, mut value)) => match load_leaf_value(&mut value) {
                Ok(value) => Ok(value),
                Err(e) => Err(self.inner.finish(e)),
            },
            Err(e) => Err(e),
        })
    }
}
