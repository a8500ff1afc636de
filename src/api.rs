//! Python binding layer for the matching distance.
//!
//! Provides a two-tree comparison on Newick strings and a pairwise matrix
//! over BEAST/NEXUS or Newick tree files.

use phylotree::tree::Tree as PhyloTree;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::cost::WeightingMode;
use crate::distances::{distance_matrix, pairwise_matching_distances};
use crate::io::read_trees;

fn parse_mode(mode: &str) -> PyResult<WeightingMode> {
    mode.parse().map_err(PyValueError::new_err)
}

fn parse_tree(newick: &str) -> PyResult<PhyloTree> {
    PhyloTree::from_newick(newick)
        .map_err(|e| PyValueError::new_err(format!("Failed to parse Newick '{newick}': {e}")))
}

/// Compute the matching distance between two Newick trees.
///
/// Args:
///     newick_a: First tree as a Newick string
///     newick_b: Second tree as a Newick string
///     mode: "unit" (default) or "length-weighted"
///
/// Returns:
///     The distance as a float
///
/// Raises:
///     ValueError: If a tree does not parse, the leaf sets differ, or the
///     trees cannot be compared
#[pyfunction]
#[pyo3(signature = (newick_a, newick_b, mode="unit"))]
fn matching_distance(newick_a: &str, newick_b: &str, mode: &str) -> PyResult<f64> {
    let mode = parse_mode(mode)?;
    let tree_a = parse_tree(newick_a)?;
    let tree_b = parse_tree(newick_b)?;

    crate::distances::matching_distance(&tree_a, &tree_b, mode)
        .map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Compute pairwise matching distances from multiple tree files.
///
/// Args:
///     paths: List of file paths to BEAST/NEXUS or Newick tree files
///     burnin_trees: Number of trees to skip at the beginning of each file (default: 0)
///     burnin_states: Minimum STATE value to keep trees (default: 0)
///     use_real_taxa: Use TRANSLATE block for taxon names when available (default: True)
///     mode: "unit" (default) or "length-weighted"
///
/// Returns:
///     A tuple of (tree_names, distance_matrix) where:
///     - tree_names is a list of tree identifiers
///     - distance_matrix is a 2D list of matching distances
///
/// Raises:
///     ValueError: If no trees are found, trees have different leaf sets, or
///     a comparison fails
#[pyfunction]
#[pyo3(signature = (paths, burnin_trees=0, burnin_states=0, use_real_taxa=true, mode="unit"))]
fn pairwise_matching_distance(
    paths: Vec<String>,
    burnin_trees: usize,
    burnin_states: usize,
    use_real_taxa: bool,
    mode: &str,
) -> PyResult<(Vec<String>, Vec<Vec<f64>>)> {
    let mode = parse_mode(mode)?;
    let (tree_names, trees) = read_all_trees(&paths, burnin_trees, burnin_states, use_real_taxa)?;

    if trees.len() < 2 {
        return Err(PyValueError::new_err(
            "Need at least 2 trees to compute pairwise distances",
        ));
    }

    let pairs = pairwise_matching_distances(&trees, mode)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;

    Ok((tree_names, distance_matrix(trees.len(), &pairs)))
}

/// Read trees from every file, prefixing names with the file position.
fn read_all_trees(
    paths: &[String],
    burnin_trees: usize,
    burnin_states: usize,
    use_real_taxa: bool,
) -> PyResult<(Vec<String>, Vec<PhyloTree>)> {
    let mut all_tree_names = Vec::new();
    let mut all_trees = Vec::new();

    for (file_idx, path) in paths.iter().enumerate() {
        let named_trees = read_trees(path, burnin_trees, burnin_states, use_real_taxa)
            .map_err(|e| PyValueError::new_err(format!("Failed to read '{path}': {e}")))?;

        if named_trees.is_empty() {
            return Err(PyValueError::new_err(format!(
                "No trees found in file '{path}' after burnin removal"
            )));
        }

        for (name, tree) in named_trees {
            all_tree_names.push(format!("file{file_idx}_{name}"));
            all_trees.push(tree);
        }
    }

    Ok((all_tree_names, all_trees))
}

/// Python module definition
#[pymodule]
fn tree_matching_distance(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(matching_distance, m)?)?;
    m.add_function(wrap_pyfunction!(pairwise_matching_distance, m)?)?;
    Ok(())
}
