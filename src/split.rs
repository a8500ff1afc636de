//! Canonical bipartitions of the shared leaf set.
//!
//! # What is a split?
//! Removing one edge from an unrooted tree cuts its leaves into two groups:
//! ```text
//!   A --\             /-- C
//!        x ------- y
//!   B --/             \-- D
//! ```
//! The edge `x-y` induces the split `{A,B} | {C,D}`. Pendant edges give
//! *trivial* splits such as `{A} | {B,C,D}`; only internal edges give
//! non-trivial ones, where both sides hold at least two leaves.
//!
//! # Canonical form
//! A split is unordered, so `{A,B}|{C,D}` and `{C,D}|{A,B}` must compare
//! equal. We always store the side that does NOT contain leaf index 0, the
//! first label in sorted order. Two splits are equal exactly when their
//! stored bitsets are equal, whatever tree or traversal produced them.
//!
//! # Why labels and not node ids
//! Node ids depend on how a tree was parsed. Labels do not, so bit positions
//! come from a [`LeafIndex`] built from the sorted label set and shared by
//! both trees of a comparison.

use crate::bitset::Bitset;
use crate::error::DistanceError;
use itertools::Itertools;
use std::collections::{BTreeSet, HashMap};

/// Sorted leaf labels and their bit positions.
///
/// Built once per comparison (or per batch of comparisons over the same
/// taxa) and handed to every extraction, so both trees agree on which bit
/// stands for which leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafIndex {
    labels: Vec<String>,
    positions: HashMap<String, usize>,
}

impl LeafIndex {
    /// Index a set of labels. Order of the input does not matter.
    ///
    /// # Errors
    /// `DegenerateTree` if a label occurs twice.
    pub fn from_labels<I>(labels: I) -> Result<Self, DistanceError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut labels: Vec<String> = labels.into_iter().collect();
        labels.sort();
        if let Some((dup, _)) = labels.iter().tuple_windows().find(|(a, b)| a == b) {
            return Err(DistanceError::DegenerateTree(format!(
                "leaf label '{dup}' occurs more than once"
            )));
        }
        let positions = labels
            .iter()
            .enumerate()
            .map(|(idx, label)| (label.clone(), idx))
            .collect();
        Ok(LeafIndex { labels, positions })
    }

    /// Index the label set shared by two trees.
    ///
    /// # Errors
    /// `DegenerateTree` for duplicated labels within one tree,
    /// `IncompatibleLeafSets` when the two sets differ.
    pub fn shared(first: Vec<String>, second: Vec<String>) -> Result<Self, DistanceError> {
        let index = Self::from_labels(first)?;
        let other = Self::from_labels(second)?;
        if index.labels == other.labels {
            return Ok(index);
        }

        let a: BTreeSet<&String> = index.labels.iter().collect();
        let b: BTreeSet<&String> = other.labels.iter().collect();
        Err(DistanceError::IncompatibleLeafSets {
            only_in_first: a.difference(&b).map(|s| s.to_string()).collect(),
            only_in_second: b.difference(&a).map(|s| s.to_string()).collect(),
        })
    }

    /// Whether `labels` is exactly this leaf set.
    ///
    /// # Errors
    /// Same as [`LeafIndex::shared`].
    pub fn check(&self, labels: Vec<String>) -> Result<(), DistanceError> {
        Self::shared(self.labels.clone(), labels).map(|_| ())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of u64 words a split bitset needs.
    pub fn words(&self) -> usize {
        self.labels.len().div_ceil(64)
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.positions.get(label).copied()
    }

    pub fn label(&self, idx: usize) -> Option<&str> {
        self.labels.get(idx).map(String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// One edge of a tree, as a bipartition of the leaf set.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    /// Side without leaf 0.
    bits: Bitset,
    num_leaves: usize,
    smaller_side: usize,
    /// Branch length of the edge, if the tree carries one.
    pub length: Option<f64>,
}

impl Split {
    /// Canonicalise one side of an edge into a split.
    ///
    /// `side` may be either side of the bipartition. Returns `None` when it
    /// is empty or holds every leaf: such an edge separates nothing.
    ///
    /// ```
    /// # use tree_matching_distance::bitset::Bitset;
    /// # use tree_matching_distance::split::Split;
    /// // Leaves A=0, B=1, C=2, D=3
    /// let mut ab = Bitset::zeros(1);
    /// ab.set(0);
    /// ab.set(1);
    /// let mut cd = Bitset::zeros(1);
    /// cd.set(2);
    /// cd.set(3);
    ///
    /// let s1 = Split::from_side(ab, 4, None).unwrap();
    /// let s2 = Split::from_side(cd, 4, None).unwrap();
    /// assert_eq!(s1.bits(), s2.bits());
    /// assert_eq!(s1.bits().0[0], 0b1100);
    /// ```
    pub fn from_side(side: Bitset, num_leaves: usize, length: Option<f64>) -> Option<Self> {
        let count = side.count_ones();
        if count == 0 || count >= num_leaves {
            return None;
        }
        let (bits, count) = if side.contains(0) {
            (side.complement(num_leaves), num_leaves - count)
        } else {
            (side, count)
        };
        Some(Split {
            bits,
            num_leaves,
            smaller_side: count.min(num_leaves - count),
            length,
        })
    }

    /// Canonical bitset: the side without leaf 0.
    pub fn bits(&self) -> &Bitset {
        &self.bits
    }

    pub fn num_leaves(&self) -> usize {
        self.num_leaves
    }

    /// Size of the smaller side.
    pub fn smaller_side(&self) -> usize {
        self.smaller_side
    }

    /// A pendant edge: one side is a single leaf.
    pub fn is_trivial(&self) -> bool {
        self.smaller_side == 1
    }

    /// Cost of leaving this split unmatched: the number of leaves that must
    /// change side to collapse the edge, i.e. the smaller side's size.
    pub fn self_cost(&self) -> usize {
        self.smaller_side
    }

    /// Fewest leaves that must change side to turn `self` into `other`.
    ///
    /// `min(|S Δ T|, L − |S Δ T|)`: the second term is the same count taken
    /// against the other orientation of `other`.
    pub fn leaf_moves(&self, other: &Split) -> usize {
        let d = self.bits.symmetric_difference_len(&other.bits);
        d.min(self.num_leaves - d)
    }

    /// The same bipartition with its branch length dropped.
    pub fn without_length(&self) -> Split {
        Split {
            length: None,
            ..self.clone()
        }
    }

    /// Both sides as label lists; the first side holds the smallest label.
    pub fn sides<'a>(&self, leaves: &'a LeafIndex) -> (Vec<&'a str>, Vec<&'a str>) {
        (0..self.num_leaves)
            .filter_map(|idx| leaves.label(idx).map(|label| (idx, label)))
            .partition_map(|(idx, label)| {
                if self.bits.contains(idx) {
                    itertools::Either::Right(label)
                } else {
                    itertools::Either::Left(label)
                }
            })
    }

    /// `A B | C D E` rendering for diagnostics.
    pub fn describe(&self, leaves: &LeafIndex) -> String {
        let (left, right) = self.sides(leaves);
        format!("{} | {}", left.iter().join(" "), right.iter().join(" "))
    }
}
