//! Primitive and intersector capabilities.
//!
//! The traversal never looks inside a primitive. It asks an [`Intersector`]
//! for a hit record per (ray, primitive) and per (ray, box) pair. The
//! [`DefaultIntersector`] forwards to the primitive's own [`Primitive`]
//! test; custom intersectors can count calls, filter primitives, or attach
//! their own attributes.

mod sphere;
mod triangle;

pub use sphere::Sphere;
pub use triangle::{Barycentric, Triangle};

use std::array;

use raywalk_math::{Aabb3, Vec3};

use crate::hit::{BoxHitLanes, Distances, HitLanes, HitRecord};
use crate::packet::{PacketBoxHit, PacketHitRecord, RayPacket};
use crate::ray::{BoxHit, Ray};

/// Geometry that can be bounded and tested against a single ray.
pub trait Primitive {
    /// Extra data reported with a hit (barycentrics, uv, ...).
    type Attributes: Copy + Default;

    /// Box enclosing the primitive.
    fn bounds(&self) -> Aabb3;

    /// Nearest intersection at `t >= 0`, or a miss.
    fn intersect(&self, ray: &Ray) -> HitRecord<Self::Attributes>;
}

impl<P: Primitive + ?Sized> Primitive for &P {
    type Attributes = P::Attributes;

    #[inline]
    fn bounds(&self) -> Aabb3 {
        (**self).bounds()
    }

    #[inline]
    fn intersect(&self, ray: &Ray) -> HitRecord<P::Attributes> {
        (**self).intersect(ray)
    }
}

/// A single ray or a lockstep packet, as seen by the traversal.
pub trait RayLanes {
    /// Distance representation (`f64` or `[f64; N]`).
    type Distance: Distances;
    /// Precomputed reciprocal direction(s).
    type InvDir;
    /// Ray-box record.
    type BoxHit: BoxHitLanes<Distance = Self::Distance>;
    /// Ray-primitive record carrying attributes `A`.
    type Hit<A: Copy + Default>: HitLanes<Distance = Self::Distance>;

    /// True for multi-lane packets. Batched traversal always runs the update
    /// step instead of skipping candidates no lane accepted.
    const BATCHED: bool;

    /// Reciprocal direction(s), computed once per query.
    fn inv_direction(&self) -> Self::InvDir;

    /// Slab test against one box.
    fn test_bounds(&self, bounds: &Aabb3, inv_dir: &Self::InvDir) -> Self::BoxHit;

    /// Primitive test using the primitive's own intersection routine.
    fn test_primitive<P: Primitive + ?Sized>(&self, primitive: &P) -> Self::Hit<P::Attributes>;
}

impl RayLanes for Ray {
    type Distance = f64;
    type InvDir = Vec3;
    type BoxHit = BoxHit;
    type Hit<A: Copy + Default> = HitRecord<A>;

    const BATCHED: bool = false;

    #[inline]
    fn inv_direction(&self) -> Vec3 {
        Ray::inv_direction(self)
    }

    #[inline]
    fn test_bounds(&self, bounds: &Aabb3, inv_dir: &Vec3) -> BoxHit {
        self.intersect_aabb(bounds, inv_dir)
    }

    #[inline]
    fn test_primitive<P: Primitive + ?Sized>(&self, primitive: &P) -> HitRecord<P::Attributes> {
        primitive.intersect(self)
    }
}

impl<const N: usize> RayLanes for RayPacket<N> {
    type Distance = [f64; N];
    type InvDir = [Vec3; N];
    type BoxHit = PacketBoxHit<N>;
    type Hit<A: Copy + Default> = PacketHitRecord<A, N>;

    const BATCHED: bool = true;

    #[inline]
    fn inv_direction(&self) -> [Vec3; N] {
        RayPacket::inv_direction(self)
    }

    #[inline]
    fn test_bounds(&self, bounds: &Aabb3, inv_dir: &[Vec3; N]) -> PacketBoxHit<N> {
        self.intersect_aabb(bounds, inv_dir)
    }

    #[inline]
    fn test_primitive<P: Primitive + ?Sized>(
        &self,
        primitive: &P,
    ) -> PacketHitRecord<P::Attributes, N> {
        PacketHitRecord::from_lanes(array::from_fn(|i| primitive.intersect(&self.rays[i])))
    }
}

/// Ray-primitive and ray-box tests used by the traversal.
pub trait Intersector<R: RayLanes, P: ?Sized> {
    /// Attributes attached to primitive hits.
    type Attributes: Copy + Default;

    /// Test the ray against one primitive.
    fn intersect_primitive(&mut self, ray: &R, primitive: &P) -> R::Hit<Self::Attributes>;

    /// Test the ray against a child's bounding volume.
    #[inline]
    fn intersect_bounds(&mut self, ray: &R, bounds: &Aabb3, inv_dir: &R::InvDir) -> R::BoxHit {
        ray.test_bounds(bounds, inv_dir)
    }
}

/// Uses each primitive's own [`Primitive::intersect`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultIntersector;

impl<R: RayLanes, P: Primitive + ?Sized> Intersector<R, P> for DefaultIntersector {
    type Attributes = P::Attributes;

    #[inline]
    fn intersect_primitive(&mut self, ray: &R, primitive: &P) -> R::Hit<P::Attributes> {
        ray.test_primitive(primitive)
    }
}

impl<R: RayLanes, P: ?Sized, I: Intersector<R, P>> Intersector<R, P> for &mut I {
    type Attributes = I::Attributes;

    #[inline]
    fn intersect_primitive(&mut self, ray: &R, primitive: &P) -> R::Hit<I::Attributes> {
        (**self).intersect_primitive(ray, primitive)
    }

    #[inline]
    fn intersect_bounds(&mut self, ray: &R, bounds: &Aabb3, inv_dir: &R::InvDir) -> R::BoxHit {
        (**self).intersect_bounds(ray, bounds, inv_dir)
    }
}
