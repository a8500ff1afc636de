//! Matching distance between phylogenetic trees.
//!
//! # The metric
//! Every internal edge of a tree is a split of the leaf set. The matching
//! distance pairs the splits of two trees one-to-one (some may stay
//! unpaired) so that the total number of leaf moves needed to turn each
//! split into its partner is as small as possible:
//!
//! ```text
//! Tree 1:  ((A,B),(C,D))     split AB|CD
//! Tree 2:  ((A,C),(B,D))     split AC|BD
//!
//! AB|CD -> AC|BD  swaps B and C: 2 moves
//! dropping both splits would cost 2 + 2
//! distance = 2
//! ```
//!
//! Unlike Robinson-Foulds, which only counts splits that differ, a split that
//! is almost right costs almost nothing, so the distance degrades gracefully
//! under small rearrangements. In unit mode it is a metric on tree
//! topologies over a fixed leaf set.
//!
//! # Pipeline
//! 1. Validate both leaf sets and index them ([`LeafIndex`]).
//! 2. Extract one [`TreeSnapshot`] per tree.
//! 3. Build the [cost matrix](crate::cost::build_cost_matrix).
//! 4. [Solve](crate::matching::solve) the assignment.
//! 5. [`aggregate`] the matching with the pendant-edge term.

use crate::cost::{SplitCost, WeightingMode, build_cost_matrix};
use crate::error::DistanceError;
use crate::matching::{Matching, solve};
use crate::snapshot::TreeSnapshot;
use crate::split::LeafIndex;
use crate::topology::TreeTopology;
use itertools::{EitherOrBoth, Itertools};
use log::{debug, warn};
use rayon::prelude::*;
use std::cmp::Ordering;

/// Compute the matching distance between two trees.
///
/// # Errors
/// - `DegenerateTree` if a tree has fewer than 2 leaves, an unnamed or
///   duplicated leaf, or (length-weighted mode) an edge without a usable
///   branch length.
/// - `IncompatibleLeafSets` if the trees are over different taxa.
/// - `InternalSolverFailure` if the assignment could not be solved.
/// - `Tree` if a tree object is malformed.
///
/// ```
/// use phylotree::tree::Tree;
/// use tree_matching_distance::{WeightingMode, matching_distance};
///
/// let t1 = Tree::from_newick("((A,B),(C,D));").unwrap();
/// let t2 = Tree::from_newick("((A,C),(B,D));").unwrap();
/// assert_eq!(matching_distance(&t1, &t2, WeightingMode::Unit).unwrap(), 2.0);
/// assert_eq!(matching_distance(&t1, &t1, WeightingMode::Unit).unwrap(), 0.0);
/// ```
pub fn matching_distance<A, B>(
    tree_a: &A,
    tree_b: &B,
    mode: WeightingMode,
) -> Result<f64, DistanceError>
where
    A: TreeTopology + ?Sized,
    B: TreeTopology + ?Sized,
{
    let labels_a = checked_leaf_labels(tree_a, "first")?;
    let labels_b = checked_leaf_labels(tree_b, "second")?;
    let leaves = LeafIndex::shared(labels_a, labels_b)?;

    let snap_a = TreeSnapshot::from_tree(tree_a, &leaves)?;
    let snap_b = TreeSnapshot::from_tree(tree_b, &leaves)?;

    distance_from_snapshots(&snap_a, &snap_b, &leaves, mode)
}

/// Compute the matching distance from two pre-computed snapshots.
///
/// Both snapshots must have been extracted with `leaves`.
///
/// # Errors
/// As [`matching_distance`], minus the leaf set checks already done while
/// extracting.
pub fn distance_from_snapshots(
    a: &TreeSnapshot,
    b: &TreeSnapshot,
    leaves: &LeafIndex,
    mode: WeightingMode,
) -> Result<f64, DistanceError> {
    if a.num_leaves != leaves.len() || b.num_leaves != leaves.len() {
        return Err(DistanceError::InternalSolverFailure(format!(
            "snapshots over {} and {} leaves compared with an index of {}",
            a.num_leaves,
            b.num_leaves,
            leaves.len()
        )));
    }
    if mode.needs_lengths() {
        a.require_lengths(leaves)?;
        b.require_lengths(leaves)?;
    }

    // Solve the same problem whichever tree came first.
    let (a, b) = match a.cmp_edges(b) {
        Ordering::Greater => (b, a),
        _ => (a, b),
    };

    let policy = mode.policy();
    let (costs, drop_a, drop_b) = build_cost_matrix(&a.splits, &b.splits, policy);
    let matching = solve(&costs, &drop_a, &drop_b)?;
    let pendant = pendant_cost(a, b, policy);

    debug!(
        "{mode} matching over {}x{} splits: {} matched, {} unmatched, cost {}",
        a.splits.len(),
        b.splits.len(),
        matching.matched_pairs().count(),
        matching.unmatched_count(),
        matching.total_cost
    );

    aggregate(&matching, pendant, mode)
}

/// Combine the matching total with the pendant-edge contribution.
///
/// Pendant edges are paired by leaf identity, so in unit mode they add
/// nothing; in length-weighted mode they add their length differences.
///
/// # Errors
/// `InternalSolverFailure` if the result is negative or not finite.
pub fn aggregate(
    matching: &Matching,
    pendant_cost: f64,
    mode: WeightingMode,
) -> Result<f64, DistanceError> {
    let total = match mode {
        WeightingMode::Unit => matching.total_cost,
        WeightingMode::LengthWeighted => matching.total_cost + pendant_cost,
    };
    if !total.is_finite() || total < 0.0 {
        return Err(DistanceError::InternalSolverFailure(format!(
            "distance {total} is not a non-negative number"
        )));
    }
    // -0.0 would print as a negative distance
    Ok(total + 0.0)
}

/// Sum of the policy's pendant cost over edges paired by leaf.
///
/// Both pendant lists are sorted by canonical bitset, so a merge pairs them.
fn pendant_cost(a: &TreeSnapshot, b: &TreeSnapshot, policy: &dyn SplitCost) -> f64 {
    a.pendants
        .iter()
        .merge_join_by(&b.pendants, |x, y| x.bits().cmp(y.bits()))
        .map(|pair| match pair {
            EitherOrBoth::Both(x, y) => policy.pendant(x, y),
            EitherOrBoth::Left(s) | EitherOrBoth::Right(s) => policy.pendant(s, &s.without_length()),
        })
        .sum()
}

fn checked_leaf_labels<T>(tree: &T, which: &str) -> Result<Vec<String>, DistanceError>
where
    T: TreeTopology + ?Sized,
{
    let labels = tree.leaf_labels()?;
    if labels.len() < 2 {
        return Err(DistanceError::DegenerateTree(format!(
            "{which} tree has {} leaves, at least 2 are needed",
            labels.len()
        )));
    }
    Ok(labels)
}

/// Index the shared leaf set of `trees` and extract every snapshot once.
///
/// Snapshots are built sequentially: tree objects need not be `Sync`, the
/// snapshots are.
///
/// # Errors
/// The first validation or extraction failure; the offending tree's index
/// is logged.
pub fn build_snapshots<T>(trees: &[T]) -> Result<(LeafIndex, Vec<TreeSnapshot>), DistanceError>
where
    T: TreeTopology,
{
    let Some(first) = trees.first() else {
        return Ok((LeafIndex::from_labels(Vec::new())?, Vec::new()));
    };
    let leaves = LeafIndex::from_labels(checked_leaf_labels(first, "first")?)?;

    let snapshots = trees
        .iter()
        .enumerate()
        .map(|(idx, tree)| {
            leaves
                .check(checked_leaf_labels(tree, "input")?)
                .and_then(|_| TreeSnapshot::from_tree(tree, &leaves))
                .inspect_err(|e| warn!("tree {idx}: {e}"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((leaves, snapshots))
}

/// Matching distance for every pair `i < j` of `trees`, computed in parallel.
///
/// # Errors
/// The first failure of any comparison; no partial results.
pub fn pairwise_matching_distances<T>(
    trees: &[T],
    mode: WeightingMode,
) -> Result<Vec<(usize, usize, f64)>, DistanceError>
where
    T: TreeTopology,
{
    let (leaves, snaps) = build_snapshots(trees)?;
    pairwise_from_snapshots(&snaps, &leaves, mode)
}

/// [`pairwise_matching_distances`] over snapshots that are already built.
pub fn pairwise_from_snapshots(
    snaps: &[TreeSnapshot],
    leaves: &LeafIndex,
    mode: WeightingMode,
) -> Result<Vec<(usize, usize, f64)>, DistanceError> {
    let n = snaps.len();
    (0..n)
        .into_par_iter()
        .flat_map_iter(|i| (i + 1..n).map(move |j| (i, j)))
        .map(|(i, j)| {
            distance_from_snapshots(&snaps[i], &snaps[j], leaves, mode).map(|d| (i, j, d))
        })
        .collect()
}

/// Matching distance from `reference` to each of `trees`, e.g. bootstrap
/// replicates against the tree they support.
///
/// # Errors
/// The first failure of any comparison; no partial results.
pub fn distances_to_reference<R, T>(
    reference: &R,
    trees: &[T],
    mode: WeightingMode,
) -> Result<Vec<f64>, DistanceError>
where
    R: TreeTopology + ?Sized,
    T: TreeTopology,
{
    let leaves = LeafIndex::from_labels(checked_leaf_labels(reference, "reference")?)?;
    let reference = TreeSnapshot::from_tree(reference, &leaves)?;

    let snaps = trees
        .iter()
        .enumerate()
        .map(|(idx, tree)| {
            leaves
                .check(checked_leaf_labels(tree, "input")?)
                .and_then(|_| TreeSnapshot::from_tree(tree, &leaves))
                .inspect_err(|e| warn!("tree {idx}: {e}"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    snaps
        .par_iter()
        .map(|snap| distance_from_snapshots(&reference, snap, &leaves, mode))
        .collect()
}

/// Assemble a symmetric `n × n` matrix from `(i, j, d)` triples.
pub fn distance_matrix(n: usize, pairs: &[(usize, usize, f64)]) -> Vec<Vec<f64>> {
    let mut mat = vec![vec![0.0f64; n]; n];
    for &(i, j, d) in pairs {
        mat[i][j] = d;
        mat[j][i] = d;
    }
    mat
}
