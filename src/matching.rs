//! Minimum-cost assignment between two split sets.
//!
//! # Problem
//! Given an `m × k` cost matrix and a drop cost for every row and column,
//! pair rows with distinct columns (or leave them unpaired) so that the sum
//! of paired costs plus drop costs is minimal.
//!
//! # Reduction to a square assignment
//! The smaller side is padded with dummy entries until the matrix is
//! `n × n`, `n = max(m, k)`:
//!
//! ```text
//!             b0     b1     b2
//!        a0 [ c00    c01    c02 ]
//!        a1 [ c10    c11    c12 ]
//!   dummy   [ drop_b0 drop_b1 drop_b2 ]
//! ```
//!
//! A real entry paired with a dummy is "unmatched" and pays its drop cost.
//! Because every cost policy keeps `pair(a, b) <= drop(a) + drop(b)`,
//! leaving a real row and a real column both unmatched is never better than
//! pairing them, so this padding finds the same optimum as the fully
//! symmetric `(m + k)`-sized formulation.
//!
//! # Solver
//! The padded square matrix goes to the Hungarian (Kuhn-Munkres) solver of
//! the `munkres` crate, O(n³) in `n`.

use crate::cost::CostMatrix;
use crate::error::DistanceError;
use munkres::{Position, WeightMatrix, solve_assignment};

/// Outcome for one entry of either split set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Assignment {
    /// Row `a` is paired with column `b`.
    Matched { a: usize, b: usize, cost: f64 },
    /// Row `a` is left unmatched.
    UnmatchedA { a: usize, cost: f64 },
    /// Column `b` is left unmatched.
    UnmatchedB { b: usize, cost: f64 },
}

impl Assignment {
    pub fn cost(&self) -> f64 {
        match *self {
            Assignment::Matched { cost, .. }
            | Assignment::UnmatchedA { cost, .. }
            | Assignment::UnmatchedB { cost, .. } => cost,
        }
    }
}

/// An optimal assignment and its total cost.
///
/// Only `total_cost` is meaningful to callers comparing trees; when several
/// assignments are optimal, which one is returned is unspecified.
#[derive(Debug, Clone, PartialEq)]
pub struct Matching {
    pub total_cost: f64,
    pub assignments: Vec<Assignment>,
}

impl Matching {
    /// Pairs `(a, b)` that were matched to each other.
    pub fn matched_pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.assignments.iter().filter_map(|asg| match *asg {
            Assignment::Matched { a, b, .. } => Some((a, b)),
            _ => None,
        })
    }

    pub fn unmatched_count(&self) -> usize {
        self.assignments
            .iter()
            .filter(|asg| !matches!(asg, Assignment::Matched { .. }))
            .count()
    }
}

/// Solve the assignment between the rows and columns of `costs`.
///
/// `drop_a[i]` is the cost of leaving row `i` unmatched, `drop_b[j]` that of
/// column `j`. If either side is empty everything on the other side is
/// unmatched; if both are, the total is 0.
///
/// # Errors
/// `InternalSolverFailure` if the dimensions disagree, a cost is not finite,
/// or the solver reports no complete assignment.
pub fn solve(costs: &CostMatrix, drop_a: &[f64], drop_b: &[f64]) -> Result<Matching, DistanceError> {
    let rows = drop_a.len();
    let cols = drop_b.len();
    if costs.rows() != rows || costs.cols() != cols {
        return Err(DistanceError::InternalSolverFailure(format!(
            "cost matrix is {}x{} but {rows} row and {cols} column drop costs were given",
            costs.rows(),
            costs.cols()
        )));
    }
    if let Some(bad) = drop_a
        .iter()
        .chain(drop_b)
        .chain((0..rows).flat_map(|i| costs.row(i)))
        .find(|c| !c.is_finite())
    {
        return Err(DistanceError::InternalSolverFailure(format!(
            "cost {bad} is not finite"
        )));
    }

    if rows == 0 || cols == 0 {
        let assignments: Vec<Assignment> = drop_a
            .iter()
            .enumerate()
            .map(|(a, &cost)| Assignment::UnmatchedA { a, cost })
            .chain(
                drop_b
                    .iter()
                    .enumerate()
                    .map(|(b, &cost)| Assignment::UnmatchedB { b, cost }),
            )
            .collect();
        return Ok(finish(assignments));
    }

    let n = rows.max(cols);
    let cell = |i: usize, j: usize| -> f64 {
        match (i < rows, j < cols) {
            (true, true) => costs.get(i, j),
            (true, false) => drop_a[i],
            (false, true) => drop_b[j],
            (false, false) => 0.0,
        }
    };

    let mut weights = WeightMatrix::from_fn(n, |(i, j)| cell(i, j));
    let positions = solve_assignment(&mut weights).map_err(|e| {
        DistanceError::InternalSolverFailure(format!("{n}x{n} assignment: {e:?}"))
    })?;
    if positions.len() != n {
        return Err(DistanceError::InternalSolverFailure(format!(
            "{} of {n} rows assigned",
            positions.len()
        )));
    }

    let assignments = positions
        .into_iter()
        .filter_map(|Position { row: i, column: j }| {
            let cost = cell(i, j);
            match (i < rows, j < cols) {
                (true, true) => Some(Assignment::Matched { a: i, b: j, cost }),
                (true, false) => Some(Assignment::UnmatchedA { a: i, cost }),
                (false, true) => Some(Assignment::UnmatchedB { b: j, cost }),
                (false, false) => None,
            }
        })
        .collect();
    Ok(finish(assignments))
}

/// Total is recomputed from the chosen cells, smallest first, so integer
/// costs sum exactly and the same costs give the same total in any order.
fn finish(assignments: Vec<Assignment>) -> Matching {
    let mut costs: Vec<f64> = assignments.iter().map(Assignment::cost).collect();
    costs.sort_by(f64::total_cmp);
    Matching {
        total_cost: costs.into_iter().sum(),
        assignments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitset::Bitset;
    use crate::cost::{Unit, build_cost_matrix};
    use crate::split::Split;
    use itertools::Itertools;

    fn matrix(rows: &[&[f64]]) -> CostMatrix {
        let cols = rows.first().map_or(0, |r| r.len());
        let data: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        CostMatrix::from_parts(rows.len(), cols, data)
    }

    /// Exhaustive optimum over every way of pairing rows with columns.
    fn brute_force(costs: &CostMatrix, drop_a: &[f64], drop_b: &[f64]) -> f64 {
        let (m, k) = (drop_a.len(), drop_b.len());
        let n = m.max(k);
        let cell = |i: usize, j: usize| match (i < m, j < k) {
            (true, true) => costs.get(i, j),
            (true, false) => drop_a[i],
            (false, true) => drop_b[j],
            (false, false) => 0.0,
        };
        (0..n)
            .permutations(n)
            .map(|perm| perm.iter().enumerate().map(|(i, &j)| cell(i, j)).sum::<f64>())
            .fold(f64::INFINITY, f64::min)
    }

    #[test]
    fn test_square_assignment() {
        let m = matrix(&[&[4.0, 1.0, 3.0], &[2.0, 0.0, 5.0], &[3.0, 2.0, 2.0]]);
        let result = solve(&m, &[10.0; 3], &[10.0; 3]).unwrap();
        assert_eq!(result.total_cost, 5.0);
        assert_eq!(result.matched_pairs().count(), 3);
        assert_eq!(result.unmatched_count(), 0);
    }

    #[test]
    fn test_cheap_drop_beats_expensive_pair() {
        // One row, two columns: pairing a0 with b1 costs 1, dropping b0 costs 1.
        let m = matrix(&[&[5.0, 1.0]]);
        let result = solve(&m, &[3.0], &[1.0, 2.0]).unwrap();
        assert_eq!(result.total_cost, 2.0);
        assert_eq!(result.matched_pairs().collect::<Vec<_>>(), vec![(0, 1)]);
        assert!(result
            .assignments
            .contains(&Assignment::UnmatchedB { b: 0, cost: 1.0 }));
    }

    #[test]
    fn test_empty_sides() {
        let empty = matrix(&[]);
        let both = solve(&empty, &[], &[]).unwrap();
        assert_eq!(both.total_cost, 0.0);
        assert!(both.assignments.is_empty());

        let only_b = CostMatrix::from_parts(0, 2, Vec::new());
        let result = solve(&only_b, &[], &[2.0, 3.0]).unwrap();
        assert_eq!(result.total_cost, 5.0);
        assert_eq!(result.unmatched_count(), 2);

        let only_a = CostMatrix::from_parts(3, 0, Vec::new());
        let result = solve(&only_a, &[1.0, 1.0, 2.0], &[]).unwrap();
        assert_eq!(result.total_cost, 4.0);
    }

    #[test]
    fn test_non_finite_cost_is_solver_failure() {
        let m = matrix(&[&[f64::NAN]]);
        let err = solve(&m, &[1.0], &[1.0]).unwrap_err();
        assert!(matches!(err, DistanceError::InternalSolverFailure(_)));
    }

    #[test]
    fn test_dimension_mismatch_is_solver_failure() {
        let m = matrix(&[&[1.0, 2.0]]);
        let err = solve(&m, &[1.0], &[1.0]).unwrap_err();
        assert!(matches!(err, DistanceError::InternalSolverFailure(_)));
    }

    #[test]
    fn test_matches_brute_force() {
        // Deterministic pseudo-random matrices of every shape up to 5x5.
        let mut state = 0x2545_f491_4f6c_dd1du64;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state % 9) as f64
        };

        for (m, k) in (0..=5).cartesian_product(0..=5) {
            let rows: Vec<Vec<f64>> = (0..m).map(|_| (0..k).map(|_| next()).collect()).collect();
            let drop_a: Vec<f64> = (0..m).map(|_| next()).collect();
            let drop_b: Vec<f64> = (0..k).map(|_| next()).collect();
            let data = rows.iter().flatten().copied().collect();
            let costs = CostMatrix::from_parts(m, k, data);

            let result = solve(&costs, &drop_a, &drop_b).unwrap();
            assert_eq!(result.total_cost, brute_force(&costs, &drop_a, &drop_b), "{m}x{k}");
        }
    }

    #[test]
    fn test_identical_split_sets_match_at_zero() {
        let n = 7;
        let split = |side: &[usize]| {
            let mut bits = Bitset::zeros(1);
            side.iter().for_each(|&i| bits.set(i));
            Split::from_side(bits, n, None).unwrap()
        };
        let splits = vec![split(&[0, 1]), split(&[0, 1, 2]), split(&[4, 5]), split(&[4, 5, 6])];
        let (m, da, db) = build_cost_matrix(&splits, &splits, &Unit);
        let result = solve(&m, &da, &db).unwrap();
        assert_eq!(result.total_cost, 0.0);
        assert_eq!(result.matched_pairs().count(), 4);
    }
}
