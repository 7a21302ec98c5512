//! Whole-hierarchy walks, independent of ray casting.
//!
//! Useful for inspection, statistics and debugging. Visitors receive the
//! node's address together with the node.
//!
//! The `_from` variants locate their start node by comparing node values
//! in a linear scan, so they cost O(n) before the walk even begins. Callers
//! that start from the same node repeatedly should keep its address and use
//! the `_at` variants.

use log::trace;

use crate::bvh::{BvhNode, Hierarchy, NodeKind};
use crate::stack::{TraversalStack, VISITOR_STACK_SIZE};

/// Visit every node below (and including) `start`, parent before children,
/// first child before second.
pub fn traverse_depth_first_at<H, F>(bvh: &H, start: u32, mut visitor: F)
where
    H: Hierarchy + ?Sized,
    F: FnMut(u32, &BvhNode),
{
    let mut stack = TraversalStack::<VISITOR_STACK_SIZE>::new();
    let mut addr = start;

    loop {
        let node = bvh.node(addr);
        visitor(addr, node);

        match node.kind {
            NodeKind::Inner { children } => {
                stack.push(children[1]);
                addr = children[0];
            }
            NodeKind::Leaf { .. } => match stack.pop() {
                Some(next) => addr = next,
                None => break,
            },
        }
    }
}

/// Visit every node of the hierarchy, starting at the root.
pub fn traverse_depth_first<H, F>(bvh: &H, visitor: F)
where
    H: Hierarchy + ?Sized,
    F: FnMut(u32, &BvhNode),
{
    traverse_depth_first_at(bvh, 0, visitor);
}

/// Visit the subtree rooted at the first node equal to `node`.
///
/// If no node compares equal, the walk starts at the root.
pub fn traverse_depth_first_from<H, F>(bvh: &H, node: &BvhNode, visitor: F)
where
    H: Hierarchy + ?Sized,
    F: FnMut(u32, &BvhNode),
{
    let start = find_node(bvh, node).unwrap_or_else(|| {
        trace!("start node not found, walking from the root");
        0
    });
    traverse_depth_first_at(bvh, start, visitor);
}

/// Visit every leaf, left to right.
pub fn traverse_leaves<H, F>(bvh: &H, mut visitor: F)
where
    H: Hierarchy + ?Sized,
    F: FnMut(u32, &BvhNode),
{
    traverse_depth_first(bvh, |addr, node| {
        if node.is_leaf() {
            visitor(addr, node);
        }
    });
}

/// Visit every leaf below the first node equal to `node`.
pub fn traverse_leaves_from<H, F>(bvh: &H, node: &BvhNode, mut visitor: F)
where
    H: Hierarchy + ?Sized,
    F: FnMut(u32, &BvhNode),
{
    traverse_depth_first_from(bvh, node, |addr, n| {
        if n.is_leaf() {
            visitor(addr, n);
        }
    });
}

/// Visit the ancestors of the node at `addr`, nearest first, ending at the
/// root. The node itself is not visited.
///
/// Scans the node array backwards from `addr` looking for the inner node
/// that references the tracked address, so parents must be stored before
/// their children (as [`crate::bvh::validate`] requires). O(n).
pub fn traverse_parents_at<H, F>(bvh: &H, addr: u32, mut visitor: F)
where
    H: Hierarchy + ?Sized,
    F: FnMut(u32, &BvhNode),
{
    let nodes = bvh.nodes();
    let mut tracked = addr;

    for (i, candidate) in nodes[..=addr as usize].iter().enumerate().rev() {
        if let NodeKind::Inner { children } = candidate.kind {
            if children.contains(&tracked) {
                let parent = i as u32;
                visitor(parent, candidate);
                tracked = parent;
            }
        }
    }
}

/// Visit the ancestors of the last node equal to `node`, nearest first.
///
/// Visits nothing if no node compares equal.
pub fn traverse_parents<H, F>(bvh: &H, node: &BvhNode, visitor: F)
where
    H: Hierarchy + ?Sized,
    F: FnMut(u32, &BvhNode),
{
    match bvh.nodes().iter().rposition(|n| n == node) {
        Some(addr) => traverse_parents_at(bvh, addr as u32, visitor),
        None => trace!("parent walk target not found"),
    }
}

fn find_node<H: Hierarchy + ?Sized>(bvh: &H, node: &BvhNode) -> Option<u32> {
    bvh.nodes().iter().position(|n| n == node).map(|i| i as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::Bvh;
    use raywalk_math::{Aabb3, Point3};

    fn cube(lo: f64, hi: f64) -> Aabb3 {
        Aabb3::new(Point3::new(lo, lo, lo), Point3::new(hi, hi, hi))
    }

    //        0
    //      /   \
    //     1     4
    //    / \   / \
    //   2   3 5   6
    fn balanced() -> Bvh<()> {
        Bvh::from_parts(
            vec![
                BvhNode::inner(cube(0.0, 4.0), 1, 4),
                BvhNode::inner(cube(0.0, 2.0), 2, 3),
                BvhNode::leaf(cube(0.0, 1.0), 0, 1),
                BvhNode::leaf(cube(1.0, 2.0), 1, 2),
                BvhNode::inner(cube(2.0, 4.0), 5, 6),
                BvhNode::leaf(cube(2.0, 3.0), 2, 3),
                BvhNode::leaf(cube(3.0, 4.0), 3, 4),
            ],
            vec![(); 4],
        )
        .unwrap()
    }

    fn collect(f: impl FnOnce(&mut dyn FnMut(u32, &BvhNode))) -> Vec<u32> {
        let mut seen = Vec::new();
        f(&mut |addr, _| seen.push(addr));
        seen
    }

    #[test]
    fn test_depth_first_order() {
        let bvh = balanced();
        let order = collect(|v| traverse_depth_first(&bvh, v));
        assert_eq!(order, vec![0, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_depth_first_from_subtree() {
        let bvh = balanced();
        let start = *bvh.node(4);
        let order = collect(|v| traverse_depth_first_from(&bvh, &start, v));
        assert_eq!(order, vec![4, 5, 6]);
    }

    #[test]
    fn test_depth_first_from_unknown_node_walks_root() {
        let bvh = balanced();
        let stranger = BvhNode::leaf(cube(9.0, 10.0), 0, 1);
        let order = collect(|v| traverse_depth_first_from(&bvh, &stranger, v));
        assert_eq!(order.len(), 7);
    }

    #[test]
    fn test_leaves() {
        let bvh = balanced();
        assert_eq!(collect(|v| traverse_leaves(&bvh, v)), vec![2, 3, 5, 6]);
        let start = *bvh.node(1);
        assert_eq!(collect(|v| traverse_leaves_from(&bvh, &start, v)), vec![2, 3]);
    }

    #[test]
    fn test_single_leaf_root() {
        let bvh = Bvh::from_parts(vec![BvhNode::leaf(cube(0.0, 1.0), 0, 1)], vec![()]).unwrap();
        assert_eq!(collect(|v| traverse_depth_first(&bvh, v)), vec![0]);
        assert_eq!(collect(|v| traverse_leaves(&bvh, v)), vec![0]);
        assert!(collect(|v| traverse_parents(&bvh, bvh.node(0), v)).is_empty());
    }

    #[test]
    fn test_parents_leaf_to_root() {
        let bvh = balanced();
        let leaf = *bvh.node(6);
        assert_eq!(collect(|v| traverse_parents(&bvh, &leaf, v)), vec![4, 0]);
        assert_eq!(collect(|v| traverse_parents_at(&bvh, 3, v)), vec![1, 0]);
    }

    #[test]
    fn test_parents_of_unknown_node() {
        let bvh = balanced();
        let stranger = BvhNode::leaf(cube(9.0, 10.0), 0, 1);
        assert!(collect(|v| traverse_parents(&bvh, &stranger, v)).is_empty());
    }
}
