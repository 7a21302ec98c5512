//! Fixed-capacity stack of pending node addresses.
//!
//! Traversal never allocates: the stack is an inline array plus a top index.
//! Its capacity bounds the hierarchy depth a walk supports. Pushing onto a
//! full stack is a precondition violation: it trips a debug assertion, and
//! in release builds the array bounds check panics.

/// Capacity used by the intersection engine.
///
/// The near-first walk holds at most one deferred sibling per level, so this
/// is also the maximum supported hierarchy depth.
pub const INTERSECT_STACK_SIZE: usize = 32;

/// Capacity used by the generic visitor walks.
pub const VISITOR_STACK_SIZE: usize = 64;

/// LIFO of node addresses with a compile-time capacity.
#[derive(Debug, Clone)]
pub struct TraversalStack<const CAP: usize> {
    entries: [u32; CAP],
    len: usize,
}

impl<const CAP: usize> TraversalStack<CAP> {
    /// Create an empty stack.
    #[inline]
    pub fn new() -> Self {
        Self {
            entries: [0; CAP],
            len: 0,
        }
    }

    /// Push a node address.
    #[inline]
    pub fn push(&mut self, addr: u32) {
        debug_assert!(
            self.len < CAP,
            "traversal stack overflow: hierarchy deeper than {CAP} levels"
        );
        self.entries[self.len] = addr;
        self.len += 1;
    }

    /// Pop the most recently pushed address.
    #[inline]
    pub fn pop(&mut self) -> Option<u32> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        Some(self.entries[self.len])
    }

    /// True if no address is pending.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of pending addresses.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Maximum number of pending addresses.
    #[inline]
    pub const fn capacity(&self) -> usize {
        CAP
    }
}

impl<const CAP: usize> Default for TraversalStack<CAP> {
    fn default() -> Self {
        Self::new()
    }
}
