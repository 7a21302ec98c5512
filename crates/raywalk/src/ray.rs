//! Ray representation and the ray-box slab test.

use raywalk_math::{Aabb3, Point3, Vec3};

/// A ray in 3D space defined by origin and direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Origin point of the ray.
    pub origin: Point3,
    /// Direction of the ray. Hit distances are measured in multiples of it.
    pub direction: Vec3,
}

impl Ray {
    /// Create a new ray from origin and direction.
    ///
    /// The direction will be normalized, so hit distances are Euclidean.
    pub fn new(origin: Point3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Create a ray keeping `direction` exactly as given.
    ///
    /// Zero components are allowed; the box test absorbs the resulting
    /// infinities.
    pub fn new_unnormalized(origin: Point3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Evaluate the ray at parameter `t`: `origin + t * direction`.
    #[inline]
    pub fn at(&self, t: f64) -> Point3 {
        self.origin + t * self.direction
    }

    /// Component-wise reciprocal of the direction.
    ///
    /// A zero component yields a signed infinity.
    #[inline]
    pub fn inv_direction(&self) -> Vec3 {
        Vec3::new(
            1.0 / self.direction.x,
            1.0 / self.direction.y,
            1.0 / self.direction.z,
        )
    }

    /// Test the ray against an AABB using the slab method.
    ///
    /// `inv_dir` must be [`Ray::inv_direction`] of this ray; it is taken as a
    /// parameter so a traversal computes it once per query.
    #[inline]
    pub fn intersect_aabb(&self, aabb: &Aabb3, inv_dir: &Vec3) -> BoxHit {
        slab_test(&self.origin, inv_dir, aabb)
    }
}

/// Result of a ray-box test: the parametric interval the ray spends inside
/// the box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxHit {
    /// Whether the interval is non-empty and not entirely behind the origin.
    pub hit: bool,
    /// Entry parameter. Negative when the origin is inside the box.
    pub tnear: f64,
    /// Exit parameter.
    pub tfar: f64,
}

/// Slab test shared by scalar rays and packet lanes.
///
/// `0 * inf` products (origin on a slab plane of an axis the ray is parallel
/// to) produce NaN, which `f64::min`/`f64::max` discard in favour of the other
/// operand, so the interval stays well-defined.
#[inline]
pub(crate) fn slab_test(origin: &Point3, inv_dir: &Vec3, aabb: &Aabb3) -> BoxHit {
    let t1 = (aabb.min - origin).component_mul(inv_dir);
    let t2 = (aabb.max - origin).component_mul(inv_dir);

    let tnear = t1.x.min(t2.x).max(t1.y.min(t2.y)).max(t1.z.min(t2.z));
    let tfar = t1.x.max(t2.x).min(t1.y.max(t2.y)).min(t1.z.max(t2.z));

    BoxHit {
        hit: tfar >= tnear && tfar >= 0.0,
        tnear,
        tfar,
    }
}
