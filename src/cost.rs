//! Pairwise dissimilarity between the internal edges of two trees.
//!
//! # Unit cost
//! The cost of pairing split `a` with split `b` is the fewest leaves that
//! must change side to turn one into the other:
//!
//! ```text
//! cost(a, b) = min(|A Δ B|, L − |A Δ B|)
//! ```
//!
//! where `A`, `B` are the canonical sides and `L` the number of leaves. The
//! second term is the first one taken against the flipped orientation of `b`.
//! With bitsets this is an XOR and a popcount per word.
//!
//! A split left unmatched pays its *self-cost*, the size of its smaller side:
//! the moves needed to collapse it into a star.
//!
//! # Length-weighted cost
//! [`LengthWeighted`] scales the same move counts by branch lengths. It is
//! one policy behind the [`SplitCost`] trait; a different weighting only
//! needs another implementation.

use crate::split::Split;
use rayon::prelude::*;
use std::fmt;
use std::str::FromStr;

/// Matrices with at least this many cells are filled in parallel.
const PARALLEL_FILL_CELLS: usize = 1 << 14;

/// How edge lengths enter the distance.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum WeightingMode {
    /// Topology only; the distance is an integer count of leaf moves.
    #[default]
    Unit,
    /// Moves are scaled by branch lengths and length differences add up.
    LengthWeighted,
}

impl WeightingMode {
    /// Cost policy implementing this mode.
    pub fn policy(self) -> &'static dyn SplitCost {
        match self {
            WeightingMode::Unit => &Unit,
            WeightingMode::LengthWeighted => &LengthWeighted,
        }
    }

    pub fn needs_lengths(self) -> bool {
        matches!(self, WeightingMode::LengthWeighted)
    }
}

impl fmt::Display for WeightingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightingMode::Unit => write!(f, "unit"),
            WeightingMode::LengthWeighted => write!(f, "length-weighted"),
        }
    }
}

impl FromStr for WeightingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unit" => Ok(WeightingMode::Unit),
            "length-weighted" | "length_weighted" | "weighted" => Ok(WeightingMode::LengthWeighted),
            other => Err(format!(
                "unknown weighting mode '{other}' (expected 'unit' or 'length-weighted')"
            )),
        }
    }
}

/// Cost policy for pairing, dropping and pre-matching splits.
///
/// Implementations must be symmetric in `pair`, non-negative, and keep
/// `pair(a, b) <= unmatched(a) + unmatched(b)`; the solver relies on the
/// last one to pad only the smaller side of the problem.
pub trait SplitCost: Send + Sync {
    /// Cost of matching internal edge `a` of one tree to `b` of the other.
    fn pair(&self, a: &Split, b: &Split) -> f64;

    /// Cost of leaving an internal edge unmatched.
    fn unmatched(&self, split: &Split) -> f64;

    /// Contribution of a pendant edge pair, already matched by leaf identity.
    fn pendant(&self, _a: &Split, _b: &Split) -> f64 {
        0.0
    }
}

/// Topology-only costs.
#[derive(Copy, Clone, Debug, Default)]
pub struct Unit;

impl SplitCost for Unit {
    fn pair(&self, a: &Split, b: &Split) -> f64 {
        a.leaf_moves(b) as f64
    }

    fn unmatched(&self, split: &Split) -> f64 {
        split.self_cost() as f64
    }
}

/// Branch-length aware costs.
///
/// - pair: `moves(a, b) · (1 + min(l_a, l_b)) + |l_a − l_b|`
/// - unmatched: `self_cost(a) + (self_cost(a) + 1) · l_a`
/// - pendant: `|l_a − l_b|`
///
/// The unit cost is always part of the total, so different topologies stay
/// apart even when their internal edges have zero length. Identical splits
/// cost only their length difference, so a tree compared with a rescaled
/// copy of itself is at a positive distance. Missing lengths count as 0.0;
/// callers validate them first.
#[derive(Copy, Clone, Debug, Default)]
pub struct LengthWeighted;

impl SplitCost for LengthWeighted {
    fn pair(&self, a: &Split, b: &Split) -> f64 {
        let la = a.length.unwrap_or(0.0);
        let lb = b.length.unwrap_or(0.0);
        a.leaf_moves(b) as f64 * (1.0 + la.min(lb)) + (la - lb).abs()
    }

    fn unmatched(&self, split: &Split) -> f64 {
        let own = split.self_cost() as f64;
        own + (own + 1.0) * split.length.unwrap_or(0.0)
    }

    fn pendant(&self, a: &Split, b: &Split) -> f64 {
        (a.length.unwrap_or(0.0) - b.length.unwrap_or(0.0)).abs()
    }
}

/// Dense row-major matrix: rows are splits of the first tree, columns
/// splits of the second.
#[derive(Debug, Clone, PartialEq)]
pub struct CostMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl CostMatrix {
    /// Wrap row-major `data` of shape `rows × cols`.
    #[cfg(test)]
    pub(crate) fn from_parts(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        assert_eq!(data.len(), rows * cols, "cost matrix shape mismatch");
        CostMatrix { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Swap the roles of the two trees.
    pub fn transpose(&self) -> CostMatrix {
        let mut data = Vec::with_capacity(self.data.len());
        for col in 0..self.cols {
            data.extend((0..self.rows).map(|row| self.get(row, col)));
        }
        CostMatrix {
            rows: self.cols,
            cols: self.rows,
            data,
        }
    }
}

/// Build the cost matrix between two split sets, plus each split's
/// unmatched cost.
///
/// Large matrices are filled row-parallel; every cell depends only on its
/// two splits, so the result is the same either way.
pub fn build_cost_matrix<C>(a: &[Split], b: &[Split], cost: &C) -> (CostMatrix, Vec<f64>, Vec<f64>)
where
    C: SplitCost + ?Sized,
{
    let rows = a.len();
    let cols = b.len();
    let mut data = vec![0.0f64; rows * cols];

    let fill_row = |(split_a, row): (&Split, &mut [f64])| {
        for (cell, split_b) in row.iter_mut().zip(b) {
            *cell = cost.pair(split_a, split_b);
        }
    };

    if cols > 0 {
        if rows * cols >= PARALLEL_FILL_CELLS {
            a.par_iter().zip(data.par_chunks_mut(cols)).for_each(fill_row);
        } else {
            a.iter().zip(data.chunks_mut(cols)).for_each(fill_row);
        }
    }

    let self_a = a.iter().map(|s| cost.unmatched(s)).collect();
    let self_b = b.iter().map(|s| cost.unmatched(s)).collect();

    (CostMatrix { rows, cols, data }, self_a, self_b)
}
