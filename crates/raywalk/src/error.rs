//! Error types for hierarchy validation and construction.
//!
//! Nothing on the traversal hot path returns these: a query over a valid
//! hierarchy cannot fail, and "no hit" is a result, not an error.

use thiserror::Error;

/// Errors raised while building or validating a hierarchy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BvhError {
    /// No primitives were supplied to the builder.
    #[error("cannot build a hierarchy over zero primitives")]
    NoPrimitives,

    /// The node array is empty (node 0 must be the root).
    #[error("hierarchy has no nodes")]
    EmptyHierarchy,

    /// An inner node references a child outside the node array.
    #[error("node {node} references child {child}, but only {node_count} nodes exist")]
    ChildOutOfRange {
        /// Address of the offending inner node.
        node: u32,
        /// The out-of-range child address.
        child: u32,
        /// Length of the node array.
        node_count: usize,
    },

    /// A leaf's primitive range is inverted or exceeds the primitive array.
    #[error("leaf {node} covers primitives {first}..{last}, but only {primitive_count} exist")]
    LeafRangeOutOfBounds {
        /// Address of the offending leaf.
        node: u32,
        /// First primitive index (inclusive).
        first: u32,
        /// Last primitive index (exclusive).
        last: u32,
        /// Length of the primitive array.
        primitive_count: usize,
    },

    /// A node is referenced as a child by more than one inner node.
    #[error("node {node} has more than one parent")]
    MultipleParents {
        /// Address of the shared node.
        node: u32,
    },

    /// An inner node references a child stored at or before its own address.
    #[error("node {parent} references child {child} stored at or before it")]
    ParentAfterChild {
        /// Address of the inner node.
        parent: u32,
        /// Address of the child.
        child: u32,
    },

    /// A non-root node is not referenced by any inner node.
    #[error("node {node} is unreachable from the root")]
    Unreachable {
        /// Address of the orphaned node.
        node: u32,
    },

    /// The hierarchy is deeper than the intersection stack can hold.
    #[error("hierarchy depth {depth} exceeds the traversal stack capacity of {limit}")]
    TooDeep {
        /// Depth of the deepest node (root is depth 0).
        depth: usize,
        /// Maximum supported depth.
        limit: usize,
    },

    /// Builder options are unusable.
    #[error("invalid build options: {0}")]
    InvalidOptions(String),
}

/// Result type for hierarchy operations.
pub type Result<T> = std::result::Result<T, BvhError>;
