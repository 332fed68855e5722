use super::{Node, SpatialKey};

/// freelist of recycled tree nodes. clearing or rebuilding a large index
/// releases every node here so the next build reuses the allocations,
/// including the item and child vector capacities.
#[derive(Debug)]
pub(crate) struct NodePool<T> {
    enabled: bool,
    free: Vec<Box<Node<T>>>,
}

/// recycled nodes kept per tree; past this the allocator takes over
const MAX_POOLED_NODES: usize = 4096;

impl<T: SpatialKey> NodePool<T> {
    pub(crate) fn new(enabled: bool) -> NodePool<T> {
        NodePool {
            enabled,
            free: Vec::new(),
        }
    }

    pub(crate) fn acquire(&mut self, is_leaf: bool) -> Box<Node<T>> {
        match self.free.pop() {
            Some(mut node) => {
                node.is_leaf = is_leaf;
                node.bounds = Default::default();
                node
            }
            None => Box::new(Node::new(is_leaf)),
        }
    }

    /// tear a subtree down into the freelist
    pub(crate) fn release_tree(&mut self, mut node: Box<Node<T>>) {
        let children = std::mem::take(&mut node.children);
        for child in children {
            self.release_tree(child);
        }
        node.items.clear();
        if self.enabled && self.free.len() < MAX_POOLED_NODES {
            self.free.push(node);
        }
    }

    #[cfg(test)]
    pub(crate) fn pooled(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounding_box::BoundingBox;
    use crate::rtree::{RTree, RTreeOptions};

    #[test]
    fn test_cleared_nodes_return_to_pool() {
        let mut tree: RTree<usize> = RTree::new(RTreeOptions {
            enable_node_pool: true,
            ..RTreeOptions::default()
        });
        for i in 0..200 {
            tree.insert(i, BoundingBox::from_point(i as f64, i as f64));
        }
        tree.clear();
        assert!(tree.pool_mut().pooled() > 0);
    }

    #[test]
    fn test_disabled_pool_keeps_nothing() {
        let mut pool: NodePool<usize> = NodePool::new(false);
        pool.release_tree(Box::new(Node::new(true)));
        assert_eq!(pool.pooled(), 0);
    }

    #[test]
    fn test_acquire_reuses_released_node() {
        let mut pool: NodePool<usize> = NodePool::new(true);
        pool.release_tree(Box::new(Node::new(true)));
        assert_eq!(pool.pooled(), 1);
        let node = pool.acquire(false);
        assert!(!node.is_leaf);
        assert_eq!(pool.pooled(), 0);
    }
}
