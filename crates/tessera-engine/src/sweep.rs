//! Eager release of hardware resources held by a widget tree.
//!
//! The tree itself knows what each node holds; the engine only walks it.

/// Two-method view of a widget tree.
pub trait ResourceTree {
    type Node: Clone;

    /// Releases GPU-backed state held by `node` (cached recordings, layers).
    fn release_node_resources(&mut self, node: &Self::Node);

    /// Children of `node`, in draw order.
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;
}

/// Pre-order walk from `root`: each node is released before its children.
///
/// Iterative, so depth is bounded by heap rather than the caller's stack.
/// Cycles are the tree's responsibility. Returns the number of nodes visited.
pub fn release_resources<T>(tree: &mut T, root: T::Node) -> usize
where
    T: ResourceTree + ?Sized,
{
    let mut stack = vec![root];
    let mut visited = 0usize;

    while let Some(node) = stack.pop() {
        tree.release_node_resources(&node);
        visited += 1;

        let children = tree.children(&node);
        // Reversed so the first child is popped next.
        stack.extend(children.into_iter().rev());
    }

    log::debug!("released hardware resources of {visited} nodes");
    visited
}
