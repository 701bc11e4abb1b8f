// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Fixed-width word-array bit-set.
//!
//! States, operator preconditions/effects and landmark tables are all bit-sets
//! over a dense id range whose width is known once the model is loaded. The
//! width is fixed at construction; binary operations require equal widths and
//! bits past `len` are kept zero so that equality and hashing stay canonical.

use std::fmt;

const WORD_BITS: usize = u64::BITS as usize;

#[inline]
const fn words_for(len: usize) -> usize {
    len.div_ceil(WORD_BITS)
}

/// Fixed-width set of `usize` ids in `[0, len)`.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct BitSet {
    words: Vec<u64>,
    len: usize,
}

impl BitSet {
    /// Creates an empty set over `[0, len)`.
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; words_for(len)],
            len,
        }
    }

    /// Creates the universal set over `[0, len)`.
    pub fn full(len: usize) -> Self {
        let mut set = Self {
            words: vec![u64::MAX; words_for(len)],
            len,
        };
        set.clear_tail();
        set
    }

    /// Creates a set over `[0, len)` containing `ids`. Ids `>= len` are ignored.
    pub fn from_indices<I>(len: usize, ids: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        let mut set = Self::new(len);
        for id in ids {
            set.insert(id);
        }
        set
    }

    /// Width of the set (number of addressable ids).
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when no bit is set.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Returns `true` when every bit in `[0, len)` is set.
    pub fn is_full(&self) -> bool {
        self.count_ones() == self.len
    }

    /// Raw backing words (little-endian bit order within each word).
    #[inline]
    pub fn as_words(&self) -> &[u64] {
        &self.words
    }

    /// Sets `id`. Returns `true` if the bit was newly set; ids `>= len` are ignored.
    #[inline]
    pub fn insert(&mut self, id: usize) -> bool {
        if id >= self.len {
            return false;
        }
        let (w, mask) = (id / WORD_BITS, 1u64 << (id % WORD_BITS));
        let fresh = self.words[w] & mask == 0;
        self.words[w] |= mask;
        fresh
    }

    /// Clears `id`. Returns `true` if the bit was previously set.
    #[inline]
    pub fn remove(&mut self, id: usize) -> bool {
        if id >= self.len {
            return false;
        }
        let (w, mask) = (id / WORD_BITS, 1u64 << (id % WORD_BITS));
        let had = self.words[w] & mask != 0;
        self.words[w] &= !mask;
        had
    }

    /// Returns `true` if `id` is set.
    #[inline]
    pub fn contains(&self, id: usize) -> bool {
        id < self.len && self.words[id / WORD_BITS] & (1u64 << (id % WORD_BITS)) != 0
    }

    /// Clears every bit.
    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// In-place union. Returns `true` if any bit was added.
    pub fn union_with(&mut self, other: &Self) -> bool {
        debug_assert_eq!(self.len, other.len, "bit-set width mismatch");
        let mut changed = false;
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            let next = *a | *b;
            changed |= next != *a;
            *a = next;
        }
        changed
    }

    /// In-place intersection.
    pub fn intersect_with(&mut self, other: &Self) {
        debug_assert_eq!(self.len, other.len, "bit-set width mismatch");
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a &= *b;
        }
    }

    /// In-place difference (`self & !other`).
    pub fn difference_with(&mut self, other: &Self) {
        debug_assert_eq!(self.len, other.len, "bit-set width mismatch");
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a &= !*b;
        }
    }

    /// Returns `true` if every bit of `self` is also set in `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        debug_assert_eq!(self.len, other.len, "bit-set width mismatch");
        self.words
            .iter()
            .zip(&other.words)
            .all(|(a, b)| a & !b == 0)
    }

    /// Returns `true` if `self` and `other` share no bit.
    pub fn is_disjoint(&self, other: &Self) -> bool {
        debug_assert_eq!(self.len, other.len, "bit-set width mismatch");
        self.words.iter().zip(&other.words).all(|(a, b)| a & b == 0)
    }

    /// Number of bits set in both `self` and `other`.
    pub fn intersection_count(&self, other: &Self) -> usize {
        debug_assert_eq!(self.len, other.len, "bit-set width mismatch");
        self.words
            .iter()
            .zip(&other.words)
            .map(|(a, b)| (a & b).count_ones() as usize)
            .sum()
    }

    /// Copy of `self` re-widthed to `len`: truncates (masking high ids) or zero-extends.
    pub fn resized(&self, len: usize) -> Self {
        let mut words = self.words.clone();
        words.resize(words_for(len), 0);
        let mut set = Self { words, len };
        set.clear_tail();
        set
    }

    /// Iterates over set ids in ascending order.
    pub fn iter_ones(&self) -> Ones<'_> {
        Ones {
            words: &self.words,
            index: 0,
            current: self.words.first().copied().unwrap_or(0),
        }
    }

    fn clear_tail(&mut self) {
        let rem = self.len % WORD_BITS;
        if rem != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << rem) - 1;
            }
        }
    }
}

impl fmt::Debug for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter_ones()).finish()
    }
}

/// Ascending iterator over the ids of a [`BitSet`].
#[derive(Debug, Clone)]
pub struct Ones<'a> {
    words: &'a [u64],
    index: usize,
    current: u64,
}

impl Iterator for Ones<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        loop {
            if self.current != 0 {
                let bit = self.current.trailing_zeros() as usize;
                self.current &= self.current - 1;
                return Some(self.index * WORD_BITS + bit);
            }
            self.index += 1;
            self.current = *self.words.get(self.index)?;
        }
    }
}
