//! Hit records and the comparison predicates that drive traversal.
//!
//! Scalar and packet records share the [`HitLanes`] surface so that the
//! "is this candidate closer than the current best" decisions are written
//! once and evaluated lane-wise.

use std::array;
use std::fmt::Debug;

use crate::packet::{LaneMask, Mask, PacketBoxHit, PacketHitRecord};
use crate::ray::BoxHit;

/// Hit distances of one ray (`f64`) or of a packet (`[f64; N]`).
pub trait Distances: Copy + Debug {
    /// Mask produced by lane-wise comparisons.
    type Mask: LaneMask;

    /// The same distance in every lane.
    fn splat(value: f64) -> Self;

    /// Lane-wise `self < other`.
    fn lt(self, other: Self) -> Self::Mask;

    /// Lane-wise `self <= other`.
    fn le(self, other: Self) -> Self::Mask;
}

impl Distances for f64 {
    type Mask = bool;

    #[inline]
    fn splat(value: f64) -> Self {
        value
    }

    #[inline]
    fn lt(self, other: Self) -> bool {
        self < other
    }

    #[inline]
    fn le(self, other: Self) -> bool {
        self <= other
    }
}

impl<const N: usize> Distances for [f64; N] {
    type Mask = Mask<N>;

    #[inline]
    fn splat(value: f64) -> Self {
        [value; N]
    }

    #[inline]
    fn lt(self, other: Self) -> Mask<N> {
        Mask::from_fn(|i| self[i] < other[i])
    }

    #[inline]
    fn le(self, other: Self) -> Mask<N> {
        Mask::from_fn(|i| self[i] <= other[i])
    }
}

/// Lane mask type of a hit record.
pub type MaskOf<H> = <<H as HitLanes>::Distance as Distances>::Mask;

/// Operations the traversal needs from a ray/primitive hit record.
pub trait HitLanes: Copy {
    /// Distance representation (scalar or per lane).
    type Distance: Distances;

    /// A record with no valid lane and infinite distance.
    fn miss() -> Self;

    /// Lanes holding a valid hit.
    fn is_hit(&self) -> MaskOf<Self>;

    /// Hit distance per lane (`+inf` where missed).
    fn distance(&self) -> Self::Distance;

    /// Lanes in which both records refer to the same primitive.
    fn same_primitive(&self, other: &Self) -> MaskOf<Self>;

    /// Tag every lane with the index of the primitive that produced it.
    fn set_primitive(&mut self, index: u32);

    /// Lane-wise blend: `a` where `mask` is set, `b` elsewhere.
    fn select(mask: MaskOf<Self>, a: &Self, b: &Self) -> Self;
}

/// Operations the traversal needs from a ray/box record.
pub trait BoxHitLanes: Copy {
    /// Distance representation (scalar or per lane).
    type Distance: Distances;

    /// Lanes whose interval is non-empty.
    fn is_hit(&self) -> <Self::Distance as Distances>::Mask;

    /// Entry distance per lane.
    fn tnear(&self) -> Self::Distance;
}

/// Result of a single ray/primitive or ray/hierarchy test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitRecord<A = ()> {
    /// Whether the record holds a valid hit.
    pub hit: bool,
    /// Distance along the ray (`+inf` when missed).
    pub t: f64,
    /// Index of the primitive that was hit.
    pub prim_id: u32,
    /// Intersector-supplied attributes (barycentrics, uv, ...).
    pub attributes: A,
}

impl<A: Default> HitRecord<A> {
    /// The "no hit" record.
    pub fn miss() -> Self {
        Self {
            hit: false,
            t: f64::INFINITY,
            prim_id: u32::MAX,
            attributes: A::default(),
        }
    }

    /// A valid hit at distance `t`. The primitive index is filled in by the
    /// traversal.
    pub fn new(t: f64, attributes: A) -> Self {
        Self {
            hit: true,
            t,
            prim_id: 0,
            attributes,
        }
    }

    /// Index of the hit primitive, if any.
    pub fn primitive(&self) -> Option<u32> {
        self.hit.then_some(self.prim_id)
    }
}

impl<A: Default> Default for HitRecord<A> {
    fn default() -> Self {
        Self::miss()
    }
}

impl<A: Copy + Default> HitLanes for HitRecord<A> {
    type Distance = f64;

    #[inline]
    fn miss() -> Self {
        HitRecord::miss()
    }

    #[inline]
    fn is_hit(&self) -> bool {
        self.hit
    }

    #[inline]
    fn distance(&self) -> f64 {
        self.t
    }

    #[inline]
    fn same_primitive(&self, other: &Self) -> bool {
        self.prim_id == other.prim_id
    }

    #[inline]
    fn set_primitive(&mut self, index: u32) {
        self.prim_id = index;
    }

    #[inline]
    fn select(mask: bool, a: &Self, b: &Self) -> Self {
        if mask {
            *a
        } else {
            *b
        }
    }
}

impl<A: Copy + Default, const N: usize> HitLanes for PacketHitRecord<A, N> {
    type Distance = [f64; N];

    #[inline]
    fn miss() -> Self {
        PacketHitRecord::miss()
    }

    #[inline]
    fn is_hit(&self) -> Mask<N> {
        self.hit
    }

    #[inline]
    fn distance(&self) -> [f64; N] {
        self.t
    }

    #[inline]
    fn same_primitive(&self, other: &Self) -> Mask<N> {
        Mask::from_fn(|i| self.prim_id[i] == other.prim_id[i])
    }

    #[inline]
    fn set_primitive(&mut self, index: u32) {
        self.prim_id = [index; N];
    }

    #[inline]
    fn select(mask: Mask<N>, a: &Self, b: &Self) -> Self {
        let pick = |i: usize| if mask.0[i] { a } else { b };
        Self {
            hit: Mask::from_fn(|i| pick(i).hit.0[i]),
            t: array::from_fn(|i| pick(i).t[i]),
            prim_id: array::from_fn(|i| pick(i).prim_id[i]),
            attributes: array::from_fn(|i| pick(i).attributes[i]),
        }
    }
}

impl BoxHitLanes for BoxHit {
    type Distance = f64;

    #[inline]
    fn is_hit(&self) -> bool {
        self.hit
    }

    #[inline]
    fn tnear(&self) -> f64 {
        self.tnear
    }
}

impl<const N: usize> BoxHitLanes for PacketBoxHit<N> {
    type Distance = [f64; N];

    #[inline]
    fn is_hit(&self) -> Mask<N> {
        self.hit
    }

    #[inline]
    fn tnear(&self) -> [f64; N] {
        self.tnear
    }
}

/// Lanes where `candidate` is a valid hit strictly closer than `best` and
/// than `max_t`.
#[inline]
pub fn is_closer<H: HitLanes>(candidate: &H, best: &H, max_t: f64) -> MaskOf<H> {
    let t = candidate.distance();
    candidate.is_hit() & t.lt(best.distance()) & t.lt(<H::Distance as Distances>::splat(max_t))
}

/// Like [`is_closer`], but a tie with `best` also counts.
#[inline]
pub fn is_closer_or_equal<H: HitLanes>(candidate: &H, best: &H, max_t: f64) -> MaskOf<H> {
    let t = candidate.distance();
    candidate.is_hit() & t.le(best.distance()) & t.lt(<H::Distance as Distances>::splat(max_t))
}

/// Lanes where a box may still contain something closer than `best` and
/// than `max_t`.
#[inline]
pub fn box_is_closer<B, H>(candidate: &B, best: &H, max_t: f64) -> MaskOf<H>
where
    B: BoxHitLanes,
    H: HitLanes<Distance = B::Distance>,
{
    let tnear = candidate.tnear();
    candidate.is_hit() & tnear.lt(best.distance()) & tnear.lt(<B::Distance as Distances>::splat(max_t))
}

/// Decides whether a candidate replaces the current best.
///
/// The traversal compares every primitive candidate against the entry it
/// must beat (the single best hit, or the K-th best in multi-hit mode).
pub trait UpdateCondition {
    /// Lanes in which `candidate` should replace `best`.
    fn check<H: HitLanes>(&self, candidate: &H, best: &H, max_t: f64) -> MaskOf<H>;
}

/// Replace only on a strictly closer hit. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsCloser;

impl UpdateCondition for IsCloser {
    #[inline]
    fn check<H: HitLanes>(&self, candidate: &H, best: &H, max_t: f64) -> MaskOf<H> {
        is_closer(candidate, best, max_t)
    }
}

/// Replace on a closer or equally close hit; the last one found wins ties.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsCloserOrEqual;

impl UpdateCondition for IsCloserOrEqual {
    #[inline]
    fn check<H: HitLanes>(&self, candidate: &H, best: &H, max_t: f64) -> MaskOf<H> {
        is_closer_or_equal(candidate, best, max_t)
    }
}
