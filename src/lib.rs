//! Crate root: module orchestration and public re-exports.
//!
//! Modules:
//! - `topology`: the read-only tree view the extractor walks.
//! - `bitset`: compact bitset representation for tree partitions.
//! - `split`: leaf indexing and canonical splits.
//! - `snapshot`: split snapshots of whole trees, unrooted.
//! - `cost`: weighting policies and the split-to-split cost matrix.
//! - `matching`: minimum-cost assignment with unmatched splits.
//! - `distances`: the matching distance, single and batch.
//! - `io`: reading BEAST/NEXUS and Newick files, writing TSV tables.
//! - `error`: the error type shared by the above.
//! - `api`: Python bindings via `pyo3` (gated behind "python" feature).

pub mod bitset;
pub mod cost;
pub mod distances;
pub mod error;
pub mod io;
pub mod matching;
pub mod snapshot;
pub mod split;
pub mod topology;

#[cfg(feature = "python")]
pub mod api;

// Re-export frequently used types & functions
pub use bitset::Bitset;
pub use cost::{SplitCost, WeightingMode};
pub use distances::{
    distance_from_snapshots, distances_to_reference, matching_distance,
    pairwise_matching_distances,
};
pub use error::DistanceError;
pub use io::{read_beast_trees, read_newick_trees, read_trees, write_matrix_tsv};
pub use snapshot::TreeSnapshot;
pub use split::{LeafIndex, Split};
pub use topology::TreeTopology;
