//! Read-only view of a tree that the split extractor walks.
//!
//! The distance code never looks at a concrete tree type. It only needs a
//! root, child lists, names on the tips and, for length-weighted comparisons,
//! the length of the edge above each node. [`TreeTopology`] is that view; it
//! is implemented here for `phylotree`'s [`Tree`](PhyloTree).

use crate::error::DistanceError;
use phylotree::tree::Tree as PhyloTree;

/// Minimal capability interface over a (possibly rooted) tree.
///
/// Node handles are `usize`. A node with no children is a leaf; the root is
/// only a traversal starting point and induces no split of its own.
pub trait TreeTopology {
    /// Handle of the node traversal starts from.
    fn root(&self) -> Result<usize, DistanceError>;

    /// Children of `node`; empty for leaves.
    fn children(&self, node: usize) -> Result<&[usize], DistanceError>;

    /// Name of `node`, if any. Leaves must be named.
    fn label(&self, node: usize) -> Result<Option<&str>, DistanceError>;

    /// Length of the edge between `node` and its parent.
    fn branch_length(&self, node: usize) -> Result<Option<f64>, DistanceError>;

    /// Labels of every leaf, in traversal order.
    ///
    /// # Errors
    /// `DegenerateTree` if a leaf has no name.
    fn leaf_labels(&self) -> Result<Vec<String>, DistanceError> {
        let mut labels = Vec::new();
        let mut stack = vec![self.root()?];
        while let Some(node) = stack.pop() {
            let children = self.children(node)?;
            if children.is_empty() {
                let name = self.label(node)?.ok_or_else(|| {
                    DistanceError::DegenerateTree(format!("leaf node {node} has no label"))
                })?;
                labels.push(name.to_string());
            } else {
                stack.extend(children.iter().rev());
            }
        }
        Ok(labels)
    }
}

impl TreeTopology for PhyloTree {
    fn root(&self) -> Result<usize, DistanceError> {
        Ok(self.get_root()?)
    }

    fn children(&self, node: usize) -> Result<&[usize], DistanceError> {
        Ok(&self.get(&node)?.children)
    }

    fn label(&self, node: usize) -> Result<Option<&str>, DistanceError> {
        Ok(self.get(&node)?.name.as_deref())
    }

    fn branch_length(&self, node: usize) -> Result<Option<f64>, DistanceError> {
        Ok(self.get(&node)?.parent_edge)
    }
}
