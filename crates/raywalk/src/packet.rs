//! Lane masks and fixed-width ray packets.
//!
//! A packet is traversed in lockstep: every control decision is made once
//! for all lanes by reducing a lane-wise comparison with [`LaneMask::any`]
//! or [`LaneMask::all`]. A plain `bool` is the one-lane mask, which lets the
//! same engine code serve single rays.

use std::array;
use std::fmt::Debug;
use std::ops::{BitAnd, BitOr, Not};

use raywalk_math::{Aabb3, Vec3};

use crate::hit::HitRecord;
use crate::ray::{slab_test, BoxHit, Ray};

/// Lane-wise boolean with explicit reductions.
pub trait LaneMask:
    Copy + Debug + BitAnd<Output = Self> + BitOr<Output = Self> + Not<Output = Self>
{
    /// Number of lanes.
    const LANES: usize;

    /// A mask with every lane set to `value`.
    fn splat(value: bool) -> Self;

    /// True if at least one lane is set.
    fn any(self) -> bool;

    /// True if every lane is set.
    fn all(self) -> bool;

    /// True if no lane is set.
    #[inline]
    fn none(self) -> bool {
        !self.any()
    }
}

impl LaneMask for bool {
    const LANES: usize = 1;

    #[inline]
    fn splat(value: bool) -> Self {
        value
    }

    #[inline]
    fn any(self) -> bool {
        self
    }

    #[inline]
    fn all(self) -> bool {
        self
    }
}

/// Mask over `N` packet lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mask<const N: usize>(pub [bool; N]);

impl<const N: usize> Mask<N> {
    /// Build a mask from a per-lane predicate.
    #[inline]
    pub fn from_fn(f: impl FnMut(usize) -> bool) -> Self {
        Self(array::from_fn(f))
    }

    /// Value of a single lane.
    #[inline]
    pub fn lane(&self, lane: usize) -> bool {
        self.0[lane]
    }

    /// Number of set lanes.
    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&b| b).count()
    }
}

impl<const N: usize> BitAnd for Mask<N> {
    type Output = Self;

    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self::from_fn(|i| self.0[i] & rhs.0[i])
    }
}

impl<const N: usize> BitOr for Mask<N> {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self::from_fn(|i| self.0[i] | rhs.0[i])
    }
}

impl<const N: usize> Not for Mask<N> {
    type Output = Self;

    #[inline]
    fn not(self) -> Self {
        Self::from_fn(|i| !self.0[i])
    }
}

impl<const N: usize> LaneMask for Mask<N> {
    const LANES: usize = N;

    #[inline]
    fn splat(value: bool) -> Self {
        Self([value; N])
    }

    #[inline]
    fn any(self) -> bool {
        self.0.iter().any(|&b| b)
    }

    #[inline]
    fn all(self) -> bool {
        self.0.iter().all(|&b| b)
    }
}

/// `N` rays traversed in lockstep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayPacket<const N: usize> {
    /// One ray per lane.
    pub rays: [Ray; N],
}

impl<const N: usize> RayPacket<N> {
    /// Create a packet from per-lane rays.
    pub fn new(rays: [Ray; N]) -> Self {
        Self { rays }
    }

    /// A packet carrying the same ray in every lane.
    pub fn splat(ray: Ray) -> Self {
        Self { rays: [ray; N] }
    }

    /// The ray in one lane.
    #[inline]
    pub fn lane(&self, lane: usize) -> &Ray {
        &self.rays[lane]
    }

    /// Per-lane reciprocal directions.
    #[inline]
    pub fn inv_direction(&self) -> [Vec3; N] {
        array::from_fn(|i| self.rays[i].inv_direction())
    }

    /// Slab test of every lane against one box.
    #[inline]
    pub fn intersect_aabb(&self, aabb: &Aabb3, inv_dir: &[Vec3; N]) -> PacketBoxHit<N> {
        let lanes: [BoxHit; N] = array::from_fn(|i| slab_test(&self.rays[i].origin, &inv_dir[i], aabb));
        PacketBoxHit {
            hit: Mask::from_fn(|i| lanes[i].hit),
            tnear: array::from_fn(|i| lanes[i].tnear),
            tfar: array::from_fn(|i| lanes[i].tfar),
        }
    }
}

/// Lane-wise ray-box result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketBoxHit<const N: usize> {
    /// Lanes whose interval is non-empty.
    pub hit: Mask<N>,
    /// Entry parameter per lane.
    pub tnear: [f64; N],
    /// Exit parameter per lane.
    pub tfar: [f64; N],
}

/// Lane-wise hit record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketHitRecord<A, const N: usize> {
    /// Lanes holding a valid hit.
    pub hit: Mask<N>,
    /// Hit distance per lane (`+inf` where missed).
    pub t: [f64; N],
    /// Primitive index per lane.
    pub prim_id: [u32; N],
    /// Intersector-supplied attributes per lane.
    pub attributes: [A; N],
}

impl<A: Copy + Default, const N: usize> PacketHitRecord<A, N> {
    /// A record with no valid lane.
    pub fn miss() -> Self {
        Self::from_lanes(array::from_fn(|_| HitRecord::miss()))
    }

    /// Assemble a packet record from scalar per-lane records.
    pub fn from_lanes(lanes: [HitRecord<A>; N]) -> Self {
        Self {
            hit: Mask::from_fn(|i| lanes[i].hit),
            t: array::from_fn(|i| lanes[i].t),
            prim_id: array::from_fn(|i| lanes[i].prim_id),
            attributes: array::from_fn(|i| lanes[i].attributes),
        }
    }

    /// Extract a single lane as a scalar record.
    pub fn lane(&self, lane: usize) -> HitRecord<A> {
        HitRecord {
            hit: self.hit.0[lane],
            t: self.t[lane],
            prim_id: self.prim_id[lane],
            attributes: self.attributes[lane],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raywalk_math::Point3;

    #[test]
    fn test_mask_reductions() {
        let m = Mask([true, false, true, true]);
        assert!(m.any());
        assert!(!m.all());
        assert_eq!(m.count(), 3);
        assert!(Mask::<4>::splat(true).all());
        assert!(Mask::<4>::splat(false).none());
        assert_eq!(!m, Mask([false, true, false, false]));
        assert_eq!(m & !m, Mask::splat(false));
        assert_eq!(m | !m, Mask::splat(true));
    }

    #[test]
    fn test_bool_is_single_lane_mask() {
        assert_eq!(<bool as LaneMask>::LANES, 1);
        assert!(LaneMask::any(true));
        assert!(LaneMask::all(true));
        assert!(LaneMask::none(false));
    }

    #[test]
    fn test_packet_box_lanes() {
        let aabb = Aabb3::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let packet = RayPacket::new([
            Ray::new(Point3::new(-2.0, 0.5, 0.5), Vec3::new(1.0, 0.0, 0.0)),
            Ray::new(Point3::new(-2.0, 5.0, 0.5), Vec3::new(1.0, 0.0, 0.0)),
        ]);
        let bh = packet.intersect_aabb(&aabb, &packet.inv_direction());
        assert_eq!(bh.hit, Mask([true, false]));
        assert!((bh.tnear[0] - 2.0).abs() < 1e-12);
        assert!((bh.tfar[0] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_packet_hit_lanes() {
        let mut lanes = [HitRecord::<()>::miss(); 3];
        lanes[1] = HitRecord::new(4.0, ());
        let packet = PacketHitRecord::from_lanes(lanes);
        assert_eq!(packet.hit, Mask([false, true, false]));
        assert_eq!(packet.lane(1).t, 4.0);
        assert_eq!(packet.lane(0).t, f64::INFINITY);
        assert_eq!(PacketHitRecord::<(), 3>::miss().hit, Mask::splat(false));
    }
}
