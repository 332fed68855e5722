mod bulk;
mod pool;
mod query_cache;
mod serialize;

use std::sync::Mutex;

use crate::bounding_box::BoundingBox;
use pool::NodePool;
use query_cache::QueryCache;

pub use serialize::{validate_stream, INDEX_MAGIC, INDEX_VERSION, MAX_DESERIALIZATION_DEPTH};

/// fanout limits shared by incremental insertion and bulk loading
pub const MIN_ITEMS: usize = 4;
pub const MAX_ITEMS: usize = 16;

/// payload stored at the leaves. the tree only ever holds entity indices,
/// so the wire representation is a single little-endian u64.
pub trait SpatialKey: Copy + PartialEq {
    fn to_raw(self) -> u64;
    fn from_raw(raw: u64) -> Self;
}

impl SpatialKey for u64 {
    fn to_raw(self) -> u64 {
        self
    }
    fn from_raw(raw: u64) -> u64 {
        raw
    }
}

impl SpatialKey for u32 {
    fn to_raw(self) -> u64 {
        self as u64
    }
    fn from_raw(raw: u64) -> u32 {
        raw as u32
    }
}

impl SpatialKey for usize {
    fn to_raw(self) -> u64 {
        self as u64
    }
    fn from_raw(raw: u64) -> usize {
        raw as usize
    }
}

/// runtime behavior switches. these travel with the serialized tree so a
/// cache restore reproduces the same configuration it was built with.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RTreeOptions {
    /// build balanced trees in one pass when the full entry set is known
    pub enable_bulk_load: bool,
    /// keep an LRU cache of quantized range queries
    pub enable_query_cache: bool,
    /// recycle interior nodes across rebuilds
    pub enable_node_pool: bool,
    /// order bulk-load entries along a space-filling curve before packing
    pub enable_space_filling_sort: bool,
    pub cache_capacity: usize,
    pub cache_quantum: f64,
}

impl Default for RTreeOptions {
    fn default() -> Self {
        RTreeOptions {
            enable_bulk_load: true,
            enable_query_cache: true,
            enable_node_pool: true,
            enable_space_filling_sort: true,
            cache_capacity: 1024,
            cache_quantum: 1e-5,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Item<T> {
    pub(crate) data: T,
    pub(crate) bounds: BoundingBox,
}

#[derive(Debug)]
pub(crate) struct Node<T> {
    pub(crate) bounds: BoundingBox,
    pub(crate) is_leaf: bool,
    pub(crate) items: Vec<Item<T>>,
    pub(crate) children: Vec<Box<Node<T>>>,
}

impl<T: SpatialKey> Node<T> {
    pub(crate) fn new(is_leaf: bool) -> Node<T> {
        Node {
            bounds: BoundingBox::default(),
            is_leaf,
            items: Vec::new(),
            children: Vec::new(),
        }
    }

    /// recompute this node's bounds as the union over its items or children
    pub(crate) fn update_bounds(&mut self) {
        if self.is_leaf {
            let mut iter = self.items.iter();
            self.bounds = match iter.next() {
                None => BoundingBox::default(),
                Some(first) => {
                    let mut bounds = first.bounds;
                    for item in iter {
                        bounds.expand(&item.bounds);
                    }
                    bounds
                }
            };
        } else {
            let mut iter = self.children.iter();
            self.bounds = match iter.next() {
                None => BoundingBox::default(),
                Some(first) => {
                    let mut bounds = first.bounds;
                    for child in iter {
                        bounds.expand(&child.bounds);
                    }
                    bounds
                }
            };
        }
    }
}

/// height-balanced tree of axis-aligned bounding boxes over entity indices.
/// supports incremental insertion, one-pass bulk loading, and rectangular
/// range queries with an optional quantized LRU result cache.
pub struct RTree<T: SpatialKey> {
    root: Box<Node<T>>,
    options: RTreeOptions,
    pool: NodePool<T>,
    cache: Option<Mutex<QueryCache<T>>>,
}

impl<T: SpatialKey> Default for RTree<T> {
    fn default() -> Self {
        RTree::new(RTreeOptions::default())
    }
}

impl<T: SpatialKey> RTree<T> {
    pub fn new(options: RTreeOptions) -> RTree<T> {
        RTree {
            root: Box::new(Node::new(true)),
            pool: NodePool::new(options.enable_node_pool),
            cache: QueryCache::from_options(&options).map(Mutex::new),
            options,
        }
    }

    pub fn options(&self) -> &RTreeOptions {
        &self.options
    }

    /// insert a single entry, splitting along the descent path on overflow
    pub fn insert(&mut self, data: T, bounds: BoundingBox) {
        self.invalidate_cache();
        let item = Item { data, bounds };
        if let Some(sibling) = insert_recursive(&mut self.root, item, &mut self.pool) {
            self.promote_root(sibling);
        }
    }

    /// collect every entry whose bounds intersect `bounds`
    pub fn query(&self, bounds: &BoundingBox) -> Vec<T> {
        let mut results = Vec::new();
        self.query_into(bounds, &mut results);
        results
    }

    /// append matching entries to a caller-supplied buffer in traversal order
    pub fn query_into(&self, bounds: &BoundingBox, results: &mut Vec<T>) {
        if let Some(cache) = &self.cache {
            if let Ok(mut cache) = cache.lock() {
                if let Some(key) = cache.key_for(bounds) {
                    if let Some(hit) = cache.get(&key) {
                        results.extend_from_slice(&hit);
                        return;
                    }
                    let mut fresh = Vec::new();
                    query_recursive(&self.root, bounds, &mut fresh);
                    results.extend_from_slice(&fresh);
                    cache.put(key, fresh);
                    return;
                }
            }
        }
        query_recursive(&self.root, bounds, results);
    }

    pub fn query_rect(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Vec<T> {
        self.query(&BoundingBox::new(min_x, min_y, max_x, max_y))
    }

    /// drop all entries, returning interior nodes to the pool
    pub fn clear(&mut self) {
        self.invalidate_cache();
        let old_root = std::mem::replace(&mut self.root, Box::new(Node::new(true)));
        self.pool.release_tree(old_root);
    }

    /// total number of stored entries
    pub fn len(&self) -> usize {
        count_items(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// height of the tree; a lone leaf root has depth 1
    pub fn depth(&self) -> usize {
        node_depth(&self.root)
    }

    pub fn bounds(&self) -> BoundingBox {
        self.root.bounds
    }

    /// structural invariant check: every node's bounds must cover all of its
    /// descendants, leaves hold only items and interior nodes only children.
    /// failures are logged and reported, never panicked on, because a broken
    /// tree typically arrives from a damaged cache file.
    pub fn validate_structure(&self) -> bool {
        validate_node(&self.root, None, 0)
    }

    fn promote_root(&mut self, sibling: Box<Node<T>>) {
        let mut new_root = self.pool.acquire(false);
        let old_root = std::mem::replace(&mut self.root, Box::new(Node::new(true)));
        new_root.children.push(old_root);
        new_root.children.push(sibling);
        new_root.update_bounds();
        self.root = new_root;
    }

    pub(crate) fn invalidate_cache(&mut self) {
        if let Some(cache) = &self.cache {
            if let Ok(mut cache) = cache.lock() {
                cache.clear();
            }
        }
    }

    pub(crate) fn replace_root(&mut self, root: Box<Node<T>>) {
        let old_root = std::mem::replace(&mut self.root, root);
        self.pool.release_tree(old_root);
    }

    pub(crate) fn root(&self) -> &Node<T> {
        &self.root
    }

    pub(crate) fn pool_mut(&mut self) -> &mut NodePool<T> {
        &mut self.pool
    }

    pub(crate) fn reset_runtime(&mut self, options: RTreeOptions) {
        self.pool = NodePool::new(options.enable_node_pool);
        self.cache = QueryCache::from_options(&options).map(Mutex::new);
        self.options = options;
    }
}

fn insert_recursive<T: SpatialKey>(
    node: &mut Node<T>,
    item: Item<T>,
    pool: &mut NodePool<T>,
) -> Option<Box<Node<T>>> {
    if node.is_leaf {
        node.items.push(item);
        if node.items.len() > MAX_ITEMS {
            return Some(split_leaf(node, pool));
        }
        node.update_bounds();
        return None;
    }

    let target = match choose_subtree(node, &item.bounds) {
        Some(index) => index,
        None => {
            // interior node with no children can only appear transiently;
            // give it a fresh leaf to descend into
            node.children.push(pool.acquire(true));
            node.children.len() - 1
        }
    };

    if let Some(overflow) = insert_recursive(&mut node.children[target], item, pool) {
        node.children.push(overflow);
        if node.children.len() > MAX_ITEMS {
            return Some(split_internal(node, pool));
        }
    }
    node.update_bounds();
    None
}

/// pick the child whose bounds grow least when enlarged to cover `bounds`,
/// breaking near-ties by the smaller existing area
fn choose_subtree<T: SpatialKey>(node: &Node<T>, bounds: &BoundingBox) -> Option<usize> {
    const TIE_EPSILON: f64 = 1e-9;

    let mut best: Option<usize> = None;
    let mut min_expansion = f64::MAX;
    for (index, child) in node.children.iter().enumerate() {
        let expansion = child.bounds.merged(bounds).area() - child.bounds.area();
        match best {
            None => {
                best = Some(index);
                min_expansion = expansion;
            }
            Some(current) => {
                if expansion < min_expansion {
                    best = Some(index);
                    min_expansion = expansion;
                } else if (expansion - min_expansion).abs() < TIE_EPSILON
                    && child.bounds.area() < node.children[current].bounds.area()
                {
                    best = Some(index);
                }
            }
        }
    }
    best
}

fn x_midpoint(bounds: &BoundingBox) -> f64 {
    (bounds.min_x + bounds.max_x) * 0.5
}

fn split_leaf<T: SpatialKey>(node: &mut Node<T>, pool: &mut NodePool<T>) -> Box<Node<T>> {
    node.items
        .sort_by(|lhs, rhs| x_midpoint(&lhs.bounds).total_cmp(&x_midpoint(&rhs.bounds)));
    let mid = node.items.len() / 2;
    let mut sibling = pool.acquire(true);
    sibling.items = node.items.split_off(mid);
    node.update_bounds();
    sibling.update_bounds();
    sibling
}

fn split_internal<T: SpatialKey>(node: &mut Node<T>, pool: &mut NodePool<T>) -> Box<Node<T>> {
    node.children
        .sort_by(|lhs, rhs| x_midpoint(&lhs.bounds).total_cmp(&x_midpoint(&rhs.bounds)));
    let mid = node.children.len() / 2;
    let mut sibling = pool.acquire(false);
    sibling.children = node.children.split_off(mid);
    node.update_bounds();
    sibling.update_bounds();
    sibling
}

fn query_recursive<T: SpatialKey>(node: &Node<T>, bounds: &BoundingBox, results: &mut Vec<T>) {
    if !node.bounds.intersects(bounds) {
        return;
    }
    if node.is_leaf {
        for item in &node.items {
            if item.bounds.intersects(bounds) {
                results.push(item.data);
            }
        }
    } else {
        for child in &node.children {
            query_recursive(child, bounds, results);
        }
    }
}

fn count_items<T: SpatialKey>(node: &Node<T>) -> usize {
    if node.is_leaf {
        node.items.len()
    } else {
        node.children.iter().map(|child| count_items(child)).sum()
    }
}

fn node_depth<T: SpatialKey>(node: &Node<T>) -> usize {
    if node.is_leaf {
        1
    } else {
        1 + node
            .children
            .iter()
            .map(|child| node_depth(child))
            .max()
            .unwrap_or(0)
    }
}

fn validate_node<T: SpatialKey>(
    node: &Node<T>,
    parent_bounds: Option<&BoundingBox>,
    depth: usize,
) -> bool {
    if let Some(parent) = parent_bounds {
        if !parent.covers(&node.bounds) {
            log::warn!(
                "spatial index validation failed: node bounds escape parent at depth {depth}"
            );
            return false;
        }
    }
    if node.is_leaf {
        if !node.children.is_empty() {
            log::warn!("spatial index validation failed: leaf with children at depth {depth}");
            return false;
        }
        for item in &node.items {
            if !node.bounds.covers(&item.bounds) {
                log::warn!(
                    "spatial index validation failed: item bounds escape leaf at depth {depth}"
                );
                return false;
            }
        }
        return true;
    }
    if !node.items.is_empty() {
        log::warn!("spatial index validation failed: interior node with items at depth {depth}");
        return false;
    }
    node.children
        .iter()
        .all(|child| validate_node(child, Some(&node.bounds), depth + 1))
}
