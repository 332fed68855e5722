use std::io::{Read, Write};

use super::{Item, Node, RTree, RTreeOptions, SpatialKey};
use crate::bounding_box::BoundingBox;
use crate::spatial_error::SpatialError;

pub const INDEX_MAGIC: &[u8; 6] = b"GISRT1";
pub const INDEX_VERSION: u32 = 1;

/// a well-formed tree packed at full fanout never gets anywhere near this;
/// exceeding it means the stream loops or lies about its structure
pub const MAX_DESERIALIZATION_DEPTH: usize = 100;

/// leaf item counts above this indicate a malformed length field
const MAX_REASONABLE_ITEMS: u64 = 1_000_000;

/// far above the fanout limit; a count past this is corruption, not a tree
const MAX_REASONABLE_CHILDREN: u64 = 1_000;

impl<T: SpatialKey> RTree<T> {
    /// write the tree as a self-describing stream: magic, version, runtime
    /// options, then the preorder node walk
    pub fn serialize<W: Write>(&self, out: &mut W) -> Result<(), SpatialError> {
        out.write_all(INDEX_MAGIC)?;
        out.write_all(&INDEX_VERSION.to_le_bytes())?;
        write_options(out, self.options())?;
        write_node(out, self.root())?;
        Ok(())
    }

    /// replace this tree's contents from a serialized stream. the stream is
    /// parsed completely before the tree is touched, so a corruption error
    /// leaves the current contents intact.
    pub fn deserialize<R: Read>(&mut self, input: &mut R) -> Result<(), SpatialError> {
        let options = read_header(input)?;
        let root = read_node::<T, R>(input, 0)?;
        self.reset_runtime(options);
        match root {
            Some(root) => self.replace_root(root),
            None => self.replace_root(Box::new(Node::new(true))),
        }
        Ok(())
    }
}

/// dry parse of a serialized tree: runs the full defensive validation
/// without building nodes. used by cache deep validation.
pub fn validate_stream<R: Read>(input: &mut R) -> Result<(), SpatialError> {
    read_header(input)?;
    skip_node(input, 0)?;
    Ok(())
}

fn read_header<R: Read>(input: &mut R) -> Result<RTreeOptions, SpatialError> {
    let mut magic = [0u8; 6];
    input.read_exact(&mut magic)?;
    if &magic != INDEX_MAGIC {
        return Err(SpatialError::InvalidMagic);
    }
    let version = read_u32(input)?;
    if version != INDEX_VERSION {
        return Err(SpatialError::UnsupportedVersion(version));
    }
    read_options(input)
}

fn write_options<W: Write>(out: &mut W, options: &RTreeOptions) -> Result<(), SpatialError> {
    write_bool(out, options.enable_bulk_load)?;
    write_bool(out, options.enable_query_cache)?;
    write_bool(out, options.enable_node_pool)?;
    write_bool(out, options.enable_space_filling_sort)?;
    out.write_all(&(options.cache_capacity as u64).to_le_bytes())?;
    out.write_all(&options.cache_quantum.to_le_bytes())?;
    Ok(())
}

fn read_options<R: Read>(input: &mut R) -> Result<RTreeOptions, SpatialError> {
    let enable_bulk_load = read_bool(input)?;
    let enable_query_cache = read_bool(input)?;
    let enable_node_pool = read_bool(input)?;
    let enable_space_filling_sort = read_bool(input)?;
    let cache_capacity = read_u64(input)? as usize;
    let cache_quantum = read_f64(input)?;
    Ok(RTreeOptions {
        enable_bulk_load,
        enable_query_cache,
        enable_node_pool,
        enable_space_filling_sort,
        cache_capacity,
        cache_quantum,
    })
}

fn write_node<T: SpatialKey, W: Write>(out: &mut W, node: &Node<T>) -> Result<(), SpatialError> {
    // present marker; readers also accept an absent node here
    write_bool(out, false)?;
    write_bool(out, node.is_leaf)?;
    write_bounds(out, &node.bounds)?;
    if node.is_leaf {
        out.write_all(&(node.items.len() as u64).to_le_bytes())?;
        for item in &node.items {
            out.write_all(&item.data.to_raw().to_le_bytes())?;
            write_bounds(out, &item.bounds)?;
        }
    } else {
        out.write_all(&(node.children.len() as u64).to_le_bytes())?;
        for child in &node.children {
            write_node(out, child)?;
        }
    }
    Ok(())
}

fn read_node<T: SpatialKey, R: Read>(
    input: &mut R,
    depth: usize,
) -> Result<Option<Box<Node<T>>>, SpatialError> {
    if depth > MAX_DESERIALIZATION_DEPTH {
        return Err(SpatialError::DepthExceeded(MAX_DESERIALIZATION_DEPTH));
    }
    if read_bool(input)? {
        return Ok(None);
    }

    let is_leaf = read_bool(input)?;
    let bounds = read_bounds(input)?;
    if !bounds.is_finite() {
        return Err(SpatialError::NonFiniteBounds(depth));
    }

    let mut node = Box::new(Node::new(is_leaf));
    node.bounds = bounds;

    if is_leaf {
        let count = read_u64(input)?;
        if count > MAX_REASONABLE_ITEMS {
            return Err(SpatialError::ItemCountExceeded { count, depth });
        }
        node.items.reserve(count as usize);
        for _ in 0..count {
            let data = T::from_raw(read_u64(input)?);
            let item_bounds = read_bounds(input)?;
            if !item_bounds.is_finite() {
                return Err(SpatialError::NonFiniteBounds(depth));
            }
            node.items.push(Item {
                data,
                bounds: item_bounds,
            });
        }
    } else {
        let count = read_u64(input)?;
        if count > MAX_REASONABLE_CHILDREN {
            return Err(SpatialError::ChildCountExceeded { count, depth });
        }
        node.children.reserve(count as usize);
        for _ in 0..count {
            match read_node(input, depth + 1)? {
                Some(child) => node.children.push(child),
                None => node.children.push(Box::new(Node::new(true))),
            }
        }
    }
    Ok(Some(node))
}

/// same walk and checks as `read_node`, no allocation
fn skip_node<R: Read>(input: &mut R, depth: usize) -> Result<(), SpatialError> {
    if depth > MAX_DESERIALIZATION_DEPTH {
        return Err(SpatialError::DepthExceeded(MAX_DESERIALIZATION_DEPTH));
    }
    if read_bool(input)? {
        return Ok(());
    }
    let is_leaf = read_bool(input)?;
    let bounds = read_bounds(input)?;
    if !bounds.is_finite() {
        return Err(SpatialError::NonFiniteBounds(depth));
    }
    let count = read_u64(input)?;
    if is_leaf {
        if count > MAX_REASONABLE_ITEMS {
            return Err(SpatialError::ItemCountExceeded { count, depth });
        }
        for _ in 0..count {
            read_u64(input)?;
            let item_bounds = read_bounds(input)?;
            if !item_bounds.is_finite() {
                return Err(SpatialError::NonFiniteBounds(depth));
            }
        }
    } else {
        if count > MAX_REASONABLE_CHILDREN {
            return Err(SpatialError::ChildCountExceeded { count, depth });
        }
        for _ in 0..count {
            skip_node(input, depth + 1)?;
        }
    }
    Ok(())
}

fn write_bounds<W: Write>(out: &mut W, bounds: &BoundingBox) -> Result<(), SpatialError> {
    out.write_all(&bounds.min_x.to_le_bytes())?;
    out.write_all(&bounds.min_y.to_le_bytes())?;
    out.write_all(&bounds.max_x.to_le_bytes())?;
    out.write_all(&bounds.max_y.to_le_bytes())?;
    Ok(())
}

fn read_bounds<R: Read>(input: &mut R) -> Result<BoundingBox, SpatialError> {
    let min_x = read_f64(input)?;
    let min_y = read_f64(input)?;
    let max_x = read_f64(input)?;
    let max_y = read_f64(input)?;
    Ok(BoundingBox::new(min_x, min_y, max_x, max_y))
}

fn write_bool<W: Write>(out: &mut W, value: bool) -> Result<(), SpatialError> {
    out.write_all(&[value as u8])?;
    Ok(())
}

fn read_bool<R: Read>(input: &mut R) -> Result<bool, SpatialError> {
    let mut byte = [0u8; 1];
    input.read_exact(&mut byte)?;
    Ok(byte[0] != 0)
}

fn read_u32<R: Read>(input: &mut R) -> Result<u32, SpatialError> {
    let mut bytes = [0u8; 4];
    input.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_u64<R: Read>(input: &mut R) -> Result<u64, SpatialError> {
    let mut bytes = [0u8; 8];
    input.read_exact(&mut bytes)?;
    Ok(u64::from_le_bytes(bytes))
}

fn read_f64<R: Read>(input: &mut R) -> Result<f64, SpatialError> {
    let mut bytes = [0u8; 8];
    input.read_exact(&mut bytes)?;
    Ok(f64::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtree::MAX_ITEMS;
    use std::io::Cursor;

    fn sample_tree() -> RTree<usize> {
        let entries: Vec<(usize, BoundingBox)> = (0..300)
            .map(|i| {
                let x = (i % 20) as f64;
                let y = (i / 20) as f64;
                (i, BoundingBox::new(x, y, x + 0.25, y + 0.25))
            })
            .collect();
        let mut tree = RTree::default();
        tree.bulk_load(entries);
        tree
    }

    fn serialized(tree: &RTree<usize>) -> Vec<u8> {
        let mut buffer = Vec::new();
        tree.serialize(&mut buffer).expect("serialize to memory");
        buffer
    }

    #[test]
    fn test_round_trip_preserves_queries_and_options() {
        let tree = sample_tree();
        let bytes = serialized(&tree);

        let mut restored: RTree<usize> = RTree::default();
        restored
            .deserialize(&mut Cursor::new(&bytes))
            .expect("stream is valid");

        assert_eq!(restored.len(), tree.len());
        assert_eq!(restored.depth(), tree.depth());
        assert_eq!(restored.options(), tree.options());
        assert!(restored.validate_structure());

        let window = BoundingBox::new(2.0, 1.0, 9.0, 8.0);
        let mut a = tree.query(&window);
        let mut b = restored.query(&window);
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_tree_round_trip() {
        let tree: RTree<usize> = RTree::default();
        let bytes = serialized(&tree);
        let mut restored: RTree<usize> = RTree::default();
        restored
            .deserialize(&mut Cursor::new(&bytes))
            .expect("stream is valid");
        assert!(restored.is_empty());
    }

    #[test]
    fn test_bad_magic_is_rejected() {
        let mut bytes = serialized(&sample_tree());
        bytes[0] = b'X';
        let mut tree: RTree<usize> = RTree::default();
        let err = tree
            .deserialize(&mut Cursor::new(&bytes))
            .expect_err("magic mismatch");
        assert!(matches!(err, SpatialError::InvalidMagic));
        assert!(err.is_corruption());
    }

    #[test]
    fn test_version_mismatch_is_rejected() {
        let mut bytes = serialized(&sample_tree());
        bytes[6] = 99;
        let mut tree: RTree<usize> = RTree::default();
        let err = tree
            .deserialize(&mut Cursor::new(&bytes))
            .expect_err("version mismatch");
        assert!(matches!(err, SpatialError::UnsupportedVersion(_)));
    }

    #[test]
    fn test_truncated_stream_is_rejected() {
        let bytes = serialized(&sample_tree());
        let truncated = &bytes[..bytes.len() / 2];
        let mut tree: RTree<usize> = RTree::default();
        let err = tree
            .deserialize(&mut Cursor::new(truncated))
            .expect_err("short read");
        assert!(matches!(err, SpatialError::Io { .. }));
        assert!(err.is_corruption());
    }

    #[test]
    fn test_failed_deserialize_leaves_tree_untouched() {
        let mut bytes = serialized(&sample_tree());
        bytes[0] = b'X';
        let mut tree: RTree<usize> = RTree::default();
        tree.insert(77, BoundingBox::from_point(3.0, 3.0));
        let _ = tree.deserialize(&mut Cursor::new(&bytes)).expect_err("bad");
        assert_eq!(tree.len(), 1, "existing contents survive a bad stream");
    }

    #[test]
    fn test_excessive_depth_is_rejected() {
        // hand-craft a chain of single-child interior nodes deeper than
        // the limit
        let mut bytes = Vec::new();
        bytes.extend_from_slice(INDEX_MAGIC);
        bytes.extend_from_slice(&INDEX_VERSION.to_le_bytes());
        let options = RTreeOptions::default();
        write_options(&mut bytes, &options).expect("write to memory");
        for _ in 0..(MAX_DESERIALIZATION_DEPTH + 2) {
            bytes.push(0); // present
            bytes.push(0); // interior
            for coord in [0.0f64, 0.0, 1.0, 1.0] {
                bytes.extend_from_slice(&coord.to_le_bytes());
            }
            bytes.extend_from_slice(&1u64.to_le_bytes()); // one child
        }
        let mut tree: RTree<usize> = RTree::default();
        let err = tree
            .deserialize(&mut Cursor::new(&bytes))
            .expect_err("depth bomb");
        assert!(matches!(err, SpatialError::DepthExceeded(_)));
        assert!(validate_stream(&mut Cursor::new(&bytes)).is_err());
    }

    #[test]
    fn test_implausible_child_count_is_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(INDEX_MAGIC);
        bytes.extend_from_slice(&INDEX_VERSION.to_le_bytes());
        write_options(&mut bytes, &RTreeOptions::default()).expect("write to memory");
        bytes.push(0); // present
        bytes.push(0); // interior
        for coord in [0.0f64, 0.0, 1.0, 1.0] {
            bytes.extend_from_slice(&coord.to_le_bytes());
        }
        bytes.extend_from_slice(&5_000u64.to_le_bytes());
        let mut tree: RTree<usize> = RTree::default();
        let err = tree
            .deserialize(&mut Cursor::new(&bytes))
            .expect_err("child bomb");
        assert!(matches!(
            err,
            SpatialError::ChildCountExceeded { count: 5_000, .. }
        ));
        assert!(MAX_REASONABLE_CHILDREN as usize > MAX_ITEMS);
    }

    #[test]
    fn test_nan_bounds_are_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(INDEX_MAGIC);
        bytes.extend_from_slice(&INDEX_VERSION.to_le_bytes());
        write_options(&mut bytes, &RTreeOptions::default()).expect("write to memory");
        bytes.push(0); // present
        bytes.push(1); // leaf
        bytes.extend_from_slice(&f64::NAN.to_le_bytes());
        for coord in [0.0f64, 1.0, 1.0] {
            bytes.extend_from_slice(&coord.to_le_bytes());
        }
        bytes.extend_from_slice(&0u64.to_le_bytes());
        let mut tree: RTree<usize> = RTree::default();
        let err = tree
            .deserialize(&mut Cursor::new(&bytes))
            .expect_err("nan bounds");
        assert!(matches!(err, SpatialError::NonFiniteBounds(0)));
    }

    #[test]
    fn test_validate_stream_accepts_good_stream() {
        let bytes = serialized(&sample_tree());
        validate_stream(&mut Cursor::new(&bytes)).expect("stream is valid");
    }
}
