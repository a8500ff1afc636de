//! Fixed-width bitsets over leaf indices.
//!
//! Every leaf of the shared label set owns one bit position, so one side of a
//! split is just a bitset. Comparing two splits then reduces to XOR and
//! popcount over a handful of machine words.
//!
//! For leaves [A, B, C, D] mapped to indices [0, 1, 2, 3]:
//! - Side {A, C} → bitset `0b0101` (bits 0 and 2 set)
//! - Side {B, C, D} → bitset `0b1110` (bits 1, 2, 3 set)

/// A compact bitset for representing which leaves lie on one side of a split.
///
/// Bits live in `Vec<u64>` words so trees of any size fit; each word holds
/// 64 leaf indices. Bits at or above the leaf count are always zero, which
/// keeps equality, ordering and hashing meaningful.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Bitset(pub Vec<u64>);

impl Bitset {
    /// Empty bitset of `words` u64 words, enough for `64 * words` leaves.
    ///
    /// ```
    /// # use tree_matching_distance::bitset::Bitset;
    /// let side = Bitset::zeros(130usize.div_ceil(64));
    /// assert_eq!(side.0.len(), 3);
    /// assert_eq!(side.count_ones(), 0);
    /// ```
    pub fn zeros(words: usize) -> Self {
        Bitset(vec![0; words])
    }

    /// Bitset of `words` words with the given leaf indices set.
    ///
    /// ```
    /// # use tree_matching_distance::bitset::Bitset;
    /// // side {B, D} of leaves [A, B, C, D]
    /// let side = Bitset::from_indices(1, [1, 3]);
    /// assert_eq!(side.0[0], 0b1010);
    /// ```
    pub fn from_indices<I>(words: usize, indices: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        let mut out = Bitset::zeros(words);
        for idx in indices {
            out.set(idx);
        }
        out
    }

    /// Puts leaf `idx` on this side.
    #[inline]
    pub fn set(&mut self, idx: usize) {
        self.0[idx / 64] |= 1u64 << (idx % 64);
    }

    /// Whether leaf `idx` is on this side.
    #[inline]
    pub fn contains(&self, idx: usize) -> bool {
        self.0
            .get(idx / 64)
            .is_some_and(|w| w & (1u64 << (idx % 64)) != 0)
    }

    /// Adds every leaf of `other` to this side.
    ///
    /// Used to accumulate the leaves below a node from its children.
    #[inline]
    pub fn or_assign(&mut self, other: &Bitset) {
        self.0
            .iter_mut()
            .zip(&other.0)
            .for_each(|(mine, theirs)| *mine |= theirs);
    }

    /// Number of leaves on this side.
    #[inline]
    pub fn count_ones(&self) -> usize {
        self.0.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Size of the symmetric difference `|self Δ other|`.
    ///
    /// ```
    /// # use tree_matching_distance::bitset::Bitset;
    /// let ab = Bitset::from_indices(1, [0, 1]);
    /// let bc = Bitset::from_indices(1, [1, 2]);
    /// assert_eq!(ab.symmetric_difference_len(&bc), 2);
    /// ```
    #[inline]
    pub fn symmetric_difference_len(&self, other: &Bitset) -> usize {
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| (a ^ b).count_ones() as usize)
            .sum()
    }

    /// The other side of the split: every leaf in `0..num_leaves` not in `self`.
    ///
    /// Bits past `num_leaves` stay cleared.
    ///
    /// ```
    /// # use tree_matching_distance::bitset::Bitset;
    /// let ab = Bitset::from_indices(1, [0, 1]);
    /// assert_eq!(ab.complement(4).0[0], 0b1100);
    /// ```
    pub fn complement(&self, num_leaves: usize) -> Bitset {
        let mut out = Bitset(self.0.iter().map(|w| !w).collect());
        let tail = num_leaves & 63;
        let full_words = num_leaves >> 6;
        for (i, w) in out.0.iter_mut().enumerate() {
            if i > full_words || (i == full_words && tail == 0) {
                *w = 0;
            } else if i == full_words {
                *w &= (1u64 << tail) - 1;
            }
        }
        out
    }

    /// Indices of the leaves present, ascending.
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().enumerate().flat_map(|(w, &word)| {
            (0..64).filter(move |b| word & (1u64 << b) != 0).map(move |b| (w << 6) | b)
        })
    }
}
