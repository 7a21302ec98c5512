//! Flat bounding volume hierarchy.
//!
//! Nodes live in one array addressed by `u32`, node 0 being the root. Inner
//! nodes reference two children; leaves reference a contiguous range of the
//! primitive array. The traversal code only reads through the [`Hierarchy`]
//! trait, so callers can keep nodes and primitives in their own storage and
//! hand out a [`BvhRef`].

use log::debug;
use raywalk_math::Aabb3;
use serde::{Deserialize, Serialize};

use crate::error::{BvhError, Result};
use crate::stack::INTERSECT_STACK_SIZE;
use crate::traverse::traverse_depth_first;

/// Payload of a node: either two children or a primitive range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Inner node with two child addresses.
    Inner {
        /// Addresses of the two children.
        children: [u32; 2],
    },
    /// Leaf covering primitives `first..last`.
    Leaf {
        /// First primitive index (inclusive).
        first: u32,
        /// Last primitive index (exclusive).
        last: u32,
    },
}

/// A hierarchy node: its bounding volume plus payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BvhNode {
    /// Box enclosing everything below this node.
    pub bounds: Aabb3,
    /// Children or primitive range.
    pub kind: NodeKind,
}

impl BvhNode {
    /// Create an inner node.
    pub fn inner(bounds: Aabb3, left: u32, right: u32) -> Self {
        Self {
            bounds,
            kind: NodeKind::Inner {
                children: [left, right],
            },
        }
    }

    /// Create a leaf over primitives `first..last`.
    pub fn leaf(bounds: Aabb3, first: u32, last: u32) -> Self {
        Self {
            bounds,
            kind: NodeKind::Leaf { first, last },
        }
    }

    /// Bounding volume of this node.
    #[inline]
    pub fn bounds(&self) -> &Aabb3 {
        &self.bounds
    }

    /// True for leaves.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    /// True for inner nodes.
    #[inline]
    pub fn is_inner(&self) -> bool {
        matches!(self.kind, NodeKind::Inner { .. })
    }

    /// Address of child 0 or 1, or `None` for a leaf.
    #[inline]
    pub fn child(&self, index: usize) -> Option<u32> {
        match self.kind {
            NodeKind::Inner { children } => Some(children[index]),
            NodeKind::Leaf { .. } => None,
        }
    }

    /// Primitive range of a leaf, or `None` for an inner node.
    #[inline]
    pub fn primitive_range(&self) -> Option<std::ops::Range<u32>> {
        match self.kind {
            NodeKind::Leaf { first, last } => Some(first..last),
            NodeKind::Inner { .. } => None,
        }
    }
}

/// Read-only access to a hierarchy and its primitives.
///
/// Implementations must uphold the builder contract: node 0 is the root,
/// child addresses and leaf ranges are in bounds, and the nodes form a tree
/// no deeper than [`INTERSECT_STACK_SIZE`]. Traversal does not re-check any
/// of this.
pub trait Hierarchy {
    /// Primitive type stored in the leaves.
    type Primitive;

    /// All nodes; index 0 is the root.
    fn nodes(&self) -> &[BvhNode];

    /// All primitives, in leaf order.
    fn primitives(&self) -> &[Self::Primitive];

    /// Node at `addr`.
    #[inline]
    fn node(&self, addr: u32) -> &BvhNode {
        &self.nodes()[addr as usize]
    }

    /// Primitive at `index`.
    #[inline]
    fn primitive(&self, index: u32) -> &Self::Primitive {
        &self.primitives()[index as usize]
    }
}

/// Hierarchy owning its nodes and primitives.
#[derive(Debug, Clone)]
pub struct Bvh<P> {
    nodes: Vec<BvhNode>,
    primitives: Vec<P>,
}

impl<P> Bvh<P> {
    /// Wrap prebuilt nodes and primitives after validating the tree shape.
    pub fn from_parts(nodes: Vec<BvhNode>, primitives: Vec<P>) -> Result<Self> {
        let depth = validate(&nodes, primitives.len())?;
        debug!(
            "accepted hierarchy: {} nodes, {} primitives, depth {}",
            nodes.len(),
            primitives.len(),
            depth
        );
        Ok(Self { nodes, primitives })
    }

    /// Wrap prebuilt nodes and primitives without validation.
    ///
    /// The caller guarantees the [`Hierarchy`] contract. Violations make
    /// queries return garbage or panic on an index; they are never memory
    /// unsafe.
    pub fn from_parts_unchecked(nodes: Vec<BvhNode>, primitives: Vec<P>) -> Self {
        Self { nodes, primitives }
    }

    /// Decompose into nodes and primitives.
    pub fn into_parts(self) -> (Vec<BvhNode>, Vec<P>) {
        (self.nodes, self.primitives)
    }

    /// Bounds of the whole hierarchy.
    pub fn bounds(&self) -> Aabb3 {
        self.nodes
            .first()
            .map(|root| root.bounds)
            .unwrap_or_else(Aabb3::empty)
    }

    /// Borrowed view of this hierarchy.
    pub fn as_view(&self) -> BvhRef<'_, P> {
        BvhRef {
            nodes: &self.nodes,
            primitives: &self.primitives,
        }
    }

    /// Shape statistics.
    pub fn stats(&self) -> BvhStats {
        BvhStats::compute(self)
    }
}

impl<P> Hierarchy for Bvh<P> {
    type Primitive = P;

    #[inline]
    fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    #[inline]
    fn primitives(&self) -> &[P] {
        &self.primitives
    }
}

/// Hierarchy borrowed from caller-owned slices.
#[derive(Debug)]
pub struct BvhRef<'a, P> {
    nodes: &'a [BvhNode],
    primitives: &'a [P],
}

impl<P> Clone for BvhRef<'_, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for BvhRef<'_, P> {}

impl<'a, P> BvhRef<'a, P> {
    /// Borrow prebuilt nodes and primitives after validating the tree shape.
    pub fn new(nodes: &'a [BvhNode], primitives: &'a [P]) -> Result<Self> {
        validate(nodes, primitives.len())?;
        Ok(Self { nodes, primitives })
    }

    /// Borrow prebuilt nodes and primitives without validation.
    pub fn new_unchecked(nodes: &'a [BvhNode], primitives: &'a [P]) -> Self {
        Self { nodes, primitives }
    }
}

impl<P> Hierarchy for BvhRef<'_, P> {
    type Primitive = P;

    #[inline]
    fn nodes(&self) -> &[BvhNode] {
        self.nodes
    }

    #[inline]
    fn primitives(&self) -> &[P] {
        self.primitives
    }
}

/// Check the builder contract and return the depth of the deepest node.
///
/// Requires parents to be stored before their children, which also rules
/// out cycles and is what [`crate::traverse::traverse_parents`] relies on.
pub fn validate(nodes: &[BvhNode], primitive_count: usize) -> Result<usize> {
    if nodes.is_empty() {
        return Err(BvhError::EmptyHierarchy);
    }

    let node_count = nodes.len();
    let mut depth: Vec<Option<usize>> = vec![None; node_count];
    depth[0] = Some(0);
    let mut max_depth = 0;

    for (i, node) in nodes.iter().enumerate() {
        let addr = i as u32;
        // Parents precede children, so every reachable node has its depth by now
        let Some(node_depth) = depth[i] else {
            return Err(BvhError::Unreachable { node: addr });
        };
        max_depth = max_depth.max(node_depth);

        match node.kind {
            NodeKind::Inner { children } => {
                for child in children {
                    if child as usize >= node_count {
                        return Err(BvhError::ChildOutOfRange {
                            node: addr,
                            child,
                            node_count,
                        });
                    }
                    if child <= addr {
                        return Err(BvhError::ParentAfterChild {
                            parent: addr,
                            child,
                        });
                    }
                    let slot = &mut depth[child as usize];
                    if slot.is_some() {
                        return Err(BvhError::MultipleParents { node: child });
                    }
                    *slot = Some(node_depth + 1);
                }
            }
            NodeKind::Leaf { first, last } => {
                if first > last || last as usize > primitive_count {
                    return Err(BvhError::LeafRangeOutOfBounds {
                        node: addr,
                        first,
                        last,
                        primitive_count,
                    });
                }
            }
        }
    }

    if max_depth > INTERSECT_STACK_SIZE {
        return Err(BvhError::TooDeep {
            depth: max_depth,
            limit: INTERSECT_STACK_SIZE,
        });
    }

    Ok(max_depth)
}

/// Shape statistics of a hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BvhStats {
    /// Number of nodes reachable from the root.
    pub node_count: usize,
    /// Number of leaves.
    pub leaf_count: usize,
    /// Number of primitive references over all leaves.
    pub primitive_count: usize,
    /// Depth of the deepest leaf (root is 0).
    pub max_depth: usize,
    /// Largest number of primitives in one leaf.
    pub max_leaf_size: usize,
}

impl BvhStats {
    /// Gather statistics by walking the whole hierarchy.
    pub fn compute<H: Hierarchy + ?Sized>(bvh: &H) -> Self {
        let mut stats = BvhStats::default();
        let mut depth = vec![0usize; bvh.nodes().len()];

        traverse_depth_first(bvh, |addr, node| {
            stats.node_count += 1;
            let d = depth[addr as usize];
            match node.kind {
                NodeKind::Inner { children } => {
                    for child in children {
                        depth[child as usize] = d + 1;
                    }
                }
                NodeKind::Leaf { first, last } => {
                    let size = last.saturating_sub(first) as usize;
                    stats.leaf_count += 1;
                    stats.primitive_count += size;
                    stats.max_leaf_size = stats.max_leaf_size.max(size);
                    stats.max_depth = stats.max_depth.max(d);
                }
            }
        });

        stats
    }
}
