//! Ray / hierarchy intersection.
//!
//! Depth-first walk with an explicit stack. At each inner node both child
//! boxes are tested; when both may still hold something closer than the
//! current best, the nearer child is entered first and the farther one is
//! deferred on the stack, so good hits are found early and prune the rest.
//!
//! What happens after a successful update is decided by the traversal mode,
//! a type parameter resolved at compile time:
//!
//! - [`ClosestHit`] keeps the nearest hit and drains the stack.
//! - [`AnyHit`] stops at the first accepted hit.
//! - [`MultiHit<K>`] collects distinct primitives, kept sorted by distance,
//!   and stops once all K slots are filled. Leaves are visited near-first,
//!   but with overlapping boxes the first K hits found need not be the K
//!   nearest overall.

use crate::bvh::{Hierarchy, NodeKind};
use crate::hit::{box_is_closer, BoxHitLanes, Distances, HitLanes, IsCloser, MaskOf, UpdateCondition};
use crate::intersect::{DefaultIntersector, Intersector, Primitive, RayLanes};
use crate::packet::LaneMask;
use crate::stack::{TraversalStack, INTERSECT_STACK_SIZE};

/// Result accumulator and exit policy of one traversal mode.
pub trait TraversalState<H: HitLanes> {
    /// What the query returns.
    type Output;

    /// Empty ("miss") state.
    fn new() -> Self;

    /// The record a candidate has to beat.
    fn threshold(&self) -> &H;

    /// Merge `candidate` into the state in the lanes set in `mask`.
    fn update(&mut self, candidate: &H, mask: MaskOf<H>);

    /// True once the traversal may return without draining the stack.
    fn should_exit(&self) -> bool;

    /// Produce the query result.
    fn finish(self) -> Self::Output;
}

/// A traversal mode: selects the accumulator and exit policy.
pub trait TraversalMode {
    /// Accumulator for hit records of type `H`.
    type State<H: HitLanes>: TraversalState<H>;
}

/// Result type of mode `M` for hit records `H`.
pub type ModeOutput<M, H> = <<M as TraversalMode>::State<H> as TraversalState<H>>::Output;

/// Return the nearest hit.
#[derive(Debug, Clone, Copy)]
pub struct ClosestHit;

/// Return as soon as any hit is accepted.
#[derive(Debug, Clone, Copy)]
pub struct AnyHit;

/// Return the first `K` hits on distinct primitives found in near-first
/// order, sorted by distance.
#[derive(Debug, Clone, Copy)]
pub struct MultiHit<const K: usize>;

impl TraversalMode for ClosestHit {
    type State<H: HitLanes> = ClosestState<H>;
}

impl TraversalMode for AnyHit {
    type State<H: HitLanes> = AnyState<H>;
}

impl<const K: usize> TraversalMode for MultiHit<K> {
    type State<H: HitLanes> = MultiHitState<H, K>;
}

/// Accumulator of [`ClosestHit`].
#[derive(Debug, Clone, Copy)]
pub struct ClosestState<H>(H);

impl<H: HitLanes> TraversalState<H> for ClosestState<H> {
    type Output = H;

    #[inline]
    fn new() -> Self {
        Self(H::miss())
    }

    #[inline]
    fn threshold(&self) -> &H {
        &self.0
    }

    #[inline]
    fn update(&mut self, candidate: &H, mask: MaskOf<H>) {
        self.0 = H::select(mask, candidate, &self.0);
    }

    #[inline]
    fn should_exit(&self) -> bool {
        false
    }

    #[inline]
    fn finish(self) -> H {
        self.0
    }
}

/// Accumulator of [`AnyHit`].
#[derive(Debug, Clone, Copy)]
pub struct AnyState<H>(H);

impl<H: HitLanes> TraversalState<H> for AnyState<H> {
    type Output = MaskOf<H>;

    #[inline]
    fn new() -> Self {
        Self(H::miss())
    }

    #[inline]
    fn threshold(&self) -> &H {
        &self.0
    }

    #[inline]
    fn update(&mut self, candidate: &H, mask: MaskOf<H>) {
        self.0 = H::select(mask, candidate, &self.0);
    }

    #[inline]
    fn should_exit(&self) -> bool {
        self.0.is_hit().all()
    }

    #[inline]
    fn finish(self) -> MaskOf<H> {
        self.0.is_hit()
    }
}

/// Accumulator of [`MultiHit`]: up to `K` records sorted by distance, misses
/// at the tail.
#[derive(Debug, Clone, Copy)]
pub struct MultiHitState<H, const K: usize> {
    hits: [H; K],
}

impl<H: HitLanes, const K: usize> TraversalState<H> for MultiHitState<H, K> {
    type Output = [H; K];

    #[inline]
    fn new() -> Self {
        const { assert!(K > 0, "multi-hit traversal needs at least one slot") };
        Self { hits: [H::miss(); K] }
    }

    /// The K-th best hit; a candidate must beat it to enter the list.
    #[inline]
    fn threshold(&self) -> &H {
        &self.hits[K - 1]
    }

    fn update(&mut self, candidate: &H, mask: MaskOf<H>) {
        // A primitive already in a lane's list is not reported twice
        let mut active = mask;
        for slot in &self.hits {
            active = active & !(slot.is_hit() & slot.same_primitive(candidate));
        }

        // Sorted insertion, lane-wise. Once a lane has inserted, every later
        // slot in that lane shifts down by one.
        let mut carry = *candidate;
        let mut shifting = <MaskOf<H> as LaneMask>::splat(false);
        for slot in self.hits.iter_mut() {
            let closer = carry.distance().lt(slot.distance());
            let take = active & (shifting | closer);
            let displaced = *slot;
            *slot = H::select(take, &carry, slot);
            carry = H::select(take, &displaced, &carry);
            shifting = shifting | take;
        }
    }

    #[inline]
    fn should_exit(&self) -> bool {
        self.hits[K - 1].is_hit().all()
    }

    #[inline]
    fn finish(self) -> [H; K] {
        self.hits
    }
}

/// Hit record produced for ray type `R` by intersector `I` over hierarchy `B`.
pub type HitOf<R, B, I> = <R as RayLanes>::Hit<<I as Intersector<R, <B as Hierarchy>::Primitive>>::Attributes>;

/// Intersect a ray (or packet) with a hierarchy.
///
/// `max_t` excludes hits at or beyond that distance; `cond` decides whether
/// a candidate replaces the current best. The mode `M` fixes the result
/// shape and the early-exit policy.
///
/// The hierarchy must satisfy the [`Hierarchy`] contract; nothing is
/// validated here.
pub fn intersect_with<M, R, B, I, C>(
    ray: &R,
    bvh: &B,
    intersector: &mut I,
    max_t: f64,
    cond: C,
) -> ModeOutput<M, HitOf<R, B, I>>
where
    M: TraversalMode,
    R: RayLanes,
    B: Hierarchy + ?Sized,
    I: Intersector<R, B::Primitive>,
    C: UpdateCondition,
{
    let mut state = <M::State<HitOf<R, B, I>> as TraversalState<_>>::new();

    let mut stack = TraversalStack::<INTERSECT_STACK_SIZE>::new();
    stack.push(0);

    let inv_dir = ray.inv_direction();

    'next: while let Some(addr) = stack.pop() {
        let mut node = bvh.node(addr);

        while let NodeKind::Inner { children } = node.kind {
            let hr1 = intersector.intersect_bounds(ray, bvh.node(children[0]).bounds(), &inv_dir);
            let hr2 = intersector.intersect_bounds(ray, bvh.node(children[1]).bounds(), &inv_dir);

            let b1 = box_is_closer(&hr1, state.threshold(), max_t).any();
            let b2 = box_is_closer(&hr2, state.threshold(), max_t).any();

            node = match (b1, b2) {
                (true, true) => {
                    // Ties go to the first child
                    let near = usize::from(hr2.tnear().lt(hr1.tnear()).all());
                    stack.push(children[1 - near]);
                    bvh.node(children[near])
                }
                (true, false) => bvh.node(children[0]),
                (false, true) => bvh.node(children[1]),
                (false, false) => continue 'next,
            };
        }

        let NodeKind::Leaf { first, last } = node.kind else {
            continue;
        };

        for i in first..last {
            let mut hr = intersector.intersect_primitive(ray, bvh.primitive(i));
            hr.set_primitive(i);

            let closer = cond.check(&hr, state.threshold(), max_t);
            if !R::BATCHED && !closer.any() {
                continue;
            }

            state.update(&hr, closer);

            if state.should_exit() {
                return state.finish();
            }
        }
    }

    state.finish()
}

/// Closest hit with no distance limit and a custom update condition.
pub fn intersect_closest<R, B, I, C>(
    ray: &R,
    bvh: &B,
    intersector: &mut I,
    cond: C,
) -> HitOf<R, B, I>
where
    R: RayLanes,
    B: Hierarchy + ?Sized,
    I: Intersector<R, B::Primitive>,
    C: UpdateCondition,
{
    intersect_with::<ClosestHit, R, B, I, C>(ray, bvh, intersector, f64::MAX, cond)
}

/// Closest hit using each primitive's own intersection test.
pub fn intersect<R, B>(ray: &R, bvh: &B) -> R::Hit<<B::Primitive as Primitive>::Attributes>
where
    R: RayLanes,
    B: Hierarchy + ?Sized,
    B::Primitive: Primitive,
{
    intersect_closest(ray, bvh, &mut DefaultIntersector, IsCloser)
}

/// True (per lane) if anything is hit closer than `max_t`.
///
/// Suited to shadow and occlusion queries: traversal stops at the first
/// accepted hit.
pub fn intersect_any<R, B, I>(
    ray: &R,
    bvh: &B,
    intersector: &mut I,
    max_t: f64,
) -> <R::Distance as Distances>::Mask
where
    R: RayLanes,
    B: Hierarchy + ?Sized,
    I: Intersector<R, B::Primitive>,
{
    intersect_with::<AnyHit, R, B, I, IsCloser>(ray, bvh, intersector, max_t, IsCloser)
}

/// Up to `K` hits on distinct primitives closer than `max_t`, sorted by
/// distance. Unused slots are misses.
///
/// Traversal stops as soon as `K` hits are held, so these are the first `K`
/// found in near-first order. When boxes overlap, a farther hit may be
/// reported while a nearer one in a deferred subtree is never visited.
pub fn intersect_multi<const K: usize, R, B, I>(
    ray: &R,
    bvh: &B,
    intersector: &mut I,
    max_t: f64,
) -> [HitOf<R, B, I>; K]
where
    R: RayLanes,
    B: Hierarchy + ?Sized,
    I: Intersector<R, B::Primitive>,
{
    intersect_with::<MultiHit<K>, R, B, I, IsCloser>(ray, bvh, intersector, max_t, IsCloser)
}
