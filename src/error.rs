//! Structured failures of a tree comparison.

use phylotree::tree::TreeError;
use thiserror::Error;

/// Everything that can stop a matching distance from being computed.
///
/// None of these are retried: a comparison is a pure function of its two
/// trees, so running it again cannot change the outcome.
#[derive(Debug, Error)]
pub enum DistanceError {
    /// The two trees do not share the same set of leaf labels.
    #[error(
        "trees have different leaf sets (only in first: [{}], only in second: [{}])",
        only_in_first.join(", "),
        only_in_second.join(", ")
    )]
    IncompatibleLeafSets {
        only_in_first: Vec<String>,
        only_in_second: Vec<String>,
    },

    /// A tree cannot take part in a comparison: too few leaves, unnamed or
    /// duplicated leaves, or branch lengths missing where the mode needs them.
    #[error("degenerate tree: {0}")]
    DegenerateTree(String),

    /// The assignment solver produced no feasible matching.
    #[error("assignment solver failed: {0}")]
    InternalSolverFailure(String),

    /// The tree object itself is malformed (e.g. it has no root).
    #[error("malformed tree: {0}")]
    Tree(#[from] TreeError),
}
