//! Ray-sphere intersection (quadratic equation).

use raywalk_math::{Aabb3, Point3, Vec3};
use serde::{Deserialize, Serialize};

use super::Primitive;
use crate::hit::HitRecord;
use crate::ray::Ray;

/// A sphere given by center and radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    /// Center point.
    pub center: Point3,
    /// Radius.
    pub radius: f64,
}

impl Sphere {
    /// Create a sphere.
    pub fn new(center: Point3, radius: f64) -> Self {
        Self { center, radius }
    }
}

impl Primitive for Sphere {
    type Attributes = ();

    fn bounds(&self) -> Aabb3 {
        let r = Vec3::repeat(self.radius.abs());
        Aabb3::new(self.center - r, self.center + r)
    }

    /// Returns the entry point, or the exit point when the origin is inside.
    fn intersect(&self, ray: &Ray) -> HitRecord {
        let oc = ray.origin - self.center;
        let d = &ray.direction;

        // Quadratic: |oc + t*d|^2 = r^2, with the factor 2 folded into b
        let a = d.dot(d);
        let b = oc.dot(d);
        let c = oc.dot(&oc) - self.radius * self.radius;

        let discriminant = b * b - a * c;
        if discriminant < 0.0 || a == 0.0 {
            return HitRecord::miss();
        }

        let sqrt_disc = discriminant.sqrt();
        let t1 = (-b - sqrt_disc) / a;
        let t2 = (-b + sqrt_disc) / a;

        if t1 >= 0.0 {
            HitRecord::new(t1, ())
        } else if t2 >= 0.0 {
            HitRecord::new(t2, ())
        } else {
            HitRecord::miss()
        }
    }
}
