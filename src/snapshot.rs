//! Extract split snapshots from phylogenetic trees.
//!
//! # Overview
//! A [`TreeSnapshot`] holds every edge of a tree as a canonical [`Split`],
//! together with its branch length. Non-trivial splits (internal edges) are
//! what the matching compares; trivial ones (pendant edges) are kept apart
//! because leaf identity already pairs them across trees.
//!
//! Snapshots are immutable values, so many comparisons can read the same
//! snapshot in parallel.
//!
//! # Unrooted view
//! Trees are compared unrooted. A bifurcating root joins two edges that
//! separate the same leaves:
//! ```text
//!        root
//!       /    \
//!   {A,B}    {C,D}   both edges induce {A,B} | {C,D}
//! ```
//! Such edges, and chains through unary nodes, are merged into one split
//! whose length is the sum of the pieces.

use crate::bitset::Bitset;
use crate::error::DistanceError;
use crate::split::{LeafIndex, Split};
use crate::topology::TreeTopology;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// All edges of one tree as canonical splits.
#[derive(Debug, Clone)]
pub struct TreeSnapshot {
    /// Internal edges, ordered by canonical bitset.
    pub splits: Vec<Split>,

    /// Pendant edges, ordered by canonical bitset.
    pub pendants: Vec<Split>,

    /// Size of the leaf set the bitsets are indexed over.
    pub num_leaves: usize,
}

impl TreeSnapshot {
    /// Extract a snapshot from a tree.
    ///
    /// # Algorithm
    /// 1. Walk the tree once from its root, children before parents.
    /// 2. A leaf gets a bitset with its own index set; an internal node ORs
    ///    its children's bitsets. Each child bitset is consumed once, so the
    ///    pass is linear in the number of nodes.
    /// 3. Every non-root node's bitset is one side of the edge above it;
    ///    canonicalise it and merge edges that induce the same bipartition.
    /// 4. Split the result into pendant and internal edges.
    ///
    /// # Errors
    /// - `DegenerateTree` for an unnamed leaf or a node reached twice.
    /// - `IncompatibleLeafSets` for a leaf missing from `leaves`.
    /// - `Tree` if the tree object reports a malformed node.
    pub fn from_tree<T>(tree: &T, leaves: &LeafIndex) -> Result<Self, DistanceError>
    where
        T: TreeTopology + ?Sized,
    {
        let num_leaves = leaves.len();
        let words = leaves.words();
        let root = tree.root()?;

        let order = Self::parents_first(tree, root)?;

        // Leaves below each node whose parent has not been processed yet.
        let mut pending: HashMap<usize, Bitset> = HashMap::new();
        let mut edges: BTreeMap<Bitset, Split> = BTreeMap::new();

        for &node_id in order.iter().rev() {
            let bitset = Self::leaves_below(tree, node_id, leaves, words, &mut pending)?;

            if node_id != root {
                let length = tree.branch_length(node_id)?;
                if let Some(split) = Split::from_side(bitset.clone(), num_leaves, length) {
                    Self::merge_edge(&mut edges, split);
                }
            }

            pending.insert(node_id, bitset);
        }

        let (pendants, splits): (Vec<Split>, Vec<Split>) =
            edges.into_values().partition(Split::is_trivial);

        Ok(TreeSnapshot {
            splits,
            pendants,
            num_leaves,
        })
    }

    /// Node ids in an order where every parent precedes its children.
    fn parents_first<T>(tree: &T, root: usize) -> Result<Vec<usize>, DistanceError>
    where
        T: TreeTopology + ?Sized,
    {
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(node_id) = stack.pop() {
            order.push(node_id);
            stack.extend_from_slice(tree.children(node_id)?);
        }
        Ok(order)
    }

    /// Bitset of the leaves below `node_id`.
    ///
    /// - **Leaf**: a single bit at the leaf's index
    /// - **Internal node**: OR of the (already computed) child bitsets
    fn leaves_below<T>(
        tree: &T,
        node_id: usize,
        leaves: &LeafIndex,
        words: usize,
        pending: &mut HashMap<usize, Bitset>,
    ) -> Result<Bitset, DistanceError>
    where
        T: TreeTopology + ?Sized,
    {
        let children = tree.children(node_id)?;
        let mut bitset = Bitset::zeros(words);

        if children.is_empty() {
            let label = tree.label(node_id)?.ok_or_else(|| {
                DistanceError::DegenerateTree(format!("leaf node {node_id} has no label"))
            })?;
            let idx = leaves
                .index_of(label)
                .ok_or_else(|| DistanceError::IncompatibleLeafSets {
                    only_in_first: vec![label.to_string()],
                    only_in_second: Vec::new(),
                })?;
            bitset.set(idx);
            return Ok(bitset);
        }

        for child_id in children {
            let child = pending.remove(child_id).ok_or_else(|| {
                DistanceError::DegenerateTree(format!(
                    "node {child_id} is reachable along more than one path"
                ))
            })?;
            bitset.or_assign(&child);
        }
        Ok(bitset)
    }

    /// Insert `split`, joining it with an edge that induces the same bipartition.
    ///
    /// A merged edge only has a length if every piece had one.
    fn merge_edge(edges: &mut BTreeMap<Bitset, Split>, split: Split) {
        match edges.get_mut(split.bits()) {
            Some(existing) => {
                existing.length = match (existing.length, split.length) {
                    (Some(a), Some(b)) => Some(a + b),
                    _ => None,
                };
            }
            None => {
                edges.insert(split.bits().clone(), split);
            }
        }
    }

    /// Every edge, internal and pendant.
    pub fn edges(&self) -> impl Iterator<Item = &Split> {
        self.splits.iter().chain(&self.pendants)
    }

    /// Total order on snapshots by their edges (bitsets, then lengths).
    ///
    /// Equal only for snapshots with the same edges and bit-identical lengths.
    pub fn cmp_edges(&self, other: &TreeSnapshot) -> Ordering {
        let key = |s: &Split| (s.bits().clone(), s.length.map(f64::to_bits));
        self.edges().map(key).cmp(other.edges().map(key))
    }

    /// A fully resolved unrooted tree has `L - 3` internal edges.
    pub fn is_resolved(&self) -> bool {
        self.num_leaves < 4 || self.splits.len() == self.num_leaves - 3
    }

    /// Check that every edge carries a usable branch length.
    ///
    /// # Errors
    /// `DegenerateTree` naming the first edge whose length is missing,
    /// negative or not finite.
    pub fn require_lengths(&self, leaves: &LeafIndex) -> Result<(), DistanceError> {
        for split in self.edges() {
            match split.length {
                Some(l) if l.is_finite() && l >= 0.0 => {}
                Some(l) => {
                    return Err(DistanceError::DegenerateTree(format!(
                        "edge {} has invalid branch length {l}",
                        split.describe(leaves)
                    )));
                }
                None => {
                    return Err(DistanceError::DegenerateTree(format!(
                        "edge {} has no branch length",
                        split.describe(leaves)
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phylotree::tree::Tree as PhyloTree;

    fn snapshot(newick: &str) -> (LeafIndex, TreeSnapshot) {
        let tree = PhyloTree::from_newick(newick).unwrap();
        let leaves = LeafIndex::from_labels(tree.leaf_labels().unwrap()).unwrap();
        let snap = TreeSnapshot::from_tree(&tree, &leaves).unwrap();
        (leaves, snap)
    }

    fn described(leaves: &LeafIndex, splits: &[Split]) -> Vec<String> {
        splits.iter().map(|s| s.describe(leaves)).collect()
    }

    /// ```text
    ///           root
    ///          /  |  \
    ///      node1  C   node2
    ///      /   \      /   \
    ///     A     B   node3  F
    ///               /   \
    ///              D     E
    /// ```
    ///
    /// Leaves A=0 .. F=5. Internal edges:
    ///
    /// | Edge  | Below     | Canonical | Split          |
    /// |-------|-----------|-----------|----------------|
    /// | node1 | {A,B}     | {C,D,E,F} | A B  \| C D E F |
    /// | node3 | {D,E}     | {D,E}     | A B C \| D E    |
    /// | node2 | {D,E,F}   | {D,E,F}   | A B C \| D E F  |
    #[test]
    fn test_unrooted_binary_tree() {
        let (leaves, snap) = snapshot("((A,B),C,((D,E),F));");
        assert_eq!(snap.num_leaves, 6);
        assert_eq!(snap.pendants.len(), 6);
        assert!(snap.is_resolved());

        let mut got = described(&leaves, &snap.splits);
        got.sort();
        assert_eq!(got, vec!["A B C | D E", "A B C | D E F", "A B | C D E F"]);
    }

    #[test]
    fn test_rooted_edges_merge() {
        let (leaves, snap) = snapshot("((A:1,B:1):0.5,(C:1,D:1):0.25);");
        assert_eq!(snap.splits.len(), 1);
        assert_eq!(described(&leaves, &snap.splits), vec!["A B | C D"]);
        assert_eq!(snap.splits[0].length, Some(0.75));
    }

    #[test]
    fn test_merge_keeps_missing_length_missing() {
        let (_, snap) = snapshot("((A:1,B:1):0.5,(C:1,D:1));");
        assert_eq!(snap.splits[0].length, None);
    }

    #[test]
    fn test_independent_of_representation() {
        let (_, a) = snapshot("((A,B),(C,D));");
        let (_, b) = snapshot("((D,C),(B,A));");
        let (_, c) = snapshot("(A,B,(C,D));");
        let bits = |s: &TreeSnapshot| s.splits.iter().map(|x| x.bits().clone()).collect::<Vec<_>>();
        assert_eq!(bits(&a), bits(&b));
        assert_eq!(bits(&a), bits(&c));
    }

    #[test]
    fn test_polytomy_has_no_internal_edges() {
        let (_, snap) = snapshot("(A,B,C,D,E);");
        assert!(snap.splits.is_empty());
        assert_eq!(snap.pendants.len(), 5);
        assert!(!snap.is_resolved());
    }

    #[test]
    fn test_three_leaves() {
        let (_, snap) = snapshot("(A,B,C);");
        assert!(snap.splits.is_empty());
        assert_eq!(snap.pendants.len(), 3);
        assert!(snap.is_resolved());
    }

    #[test]
    fn test_two_leaves_share_one_edge() {
        let (_, snap) = snapshot("(A:1,B:2);");
        assert!(snap.splits.is_empty());
        assert_eq!(snap.pendants.len(), 1);
        assert_eq!(snap.pendants[0].length, Some(3.0));
    }

    #[test]
    fn test_unary_node_merges_into_pendant() {
        let (leaves, snap) = snapshot("((A:1,B:1):1,((C:0.5):0.25,D:1):1,E:1);");
        let c = snap
            .pendants
            .iter()
            .find(|s| s.describe(&leaves) == "A B D E | C")
            .unwrap();
        assert_eq!(c.length, Some(0.75));
        assert_eq!(snap.splits.len(), 2);
    }

    #[test]
    fn test_foreign_leaf_rejected() {
        let tree = PhyloTree::from_newick("((A,B),(C,Q));").unwrap();
        let leaves = LeafIndex::from_labels(
            ["A", "B", "C", "D"].iter().map(|s| s.to_string()),
        )
        .unwrap();
        let err = TreeSnapshot::from_tree(&tree, &leaves).unwrap_err();
        assert!(matches!(err, DistanceError::IncompatibleLeafSets { .. }));
    }

    #[test]
    fn test_require_lengths() {
        let (leaves, snap) = snapshot("((A:1,B:1):1,(C:1,D:1):1);");
        assert!(snap.require_lengths(&leaves).is_ok());

        let (leaves, snap) = snapshot("((A:1,B),(C:1,D:1):1);");
        let err = snap.require_lengths(&leaves).unwrap_err();
        assert!(err.to_string().contains("no branch length"));
    }

    #[test]
    fn test_cmp_edges() {
        let (_, a) = snapshot("((A:1,B:1):1,(C:1,D:1):1);");
        let (_, same) = snapshot("((D:1,C:1):1,(B:1,A:1):1);");
        let (_, longer) = snapshot("((A:1,B:1):1,(C:1,D:1):2);");
        assert_eq!(a.cmp_edges(&same), Ordering::Equal);
        assert_ne!(a.cmp_edges(&longer), Ordering::Equal);
        assert_eq!(a.cmp_edges(&longer), longer.cmp_edges(&a).reverse());
    }

    #[test]
    fn test_many_leaves_cross_word_boundary() {
        // Caterpillar over 70 taxa: 67 internal edges.
        let names: Vec<String> = (0..70).map(|i| format!("t{i:02}")).collect();
        let mut newick = names[0].clone();
        for name in &names[1..] {
            newick = format!("({newick},{name})");
        }
        newick.push(';');

        let (leaves, snap) = snapshot(&newick);
        assert_eq!(leaves.words(), 2);
        assert_eq!(snap.splits.len(), 67);
        assert_eq!(snap.pendants.len(), 70);
        assert!(snap.is_resolved());
    }
}
