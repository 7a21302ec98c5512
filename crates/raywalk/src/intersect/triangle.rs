//! Ray-triangle intersection (Möller–Trumbore).

use raywalk_math::{Aabb3, Point3};
use serde::{Deserialize, Serialize};

use super::Primitive;
use crate::hit::HitRecord;
use crate::ray::Ray;

/// Determinants below this are treated as a ray parallel to the triangle.
const EPSILON: f64 = 1e-12;

/// Barycentric coordinates of a triangle hit.
///
/// The hit point is `(1 - u - v) * v0 + u * v1 + v * v2`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Barycentric {
    /// Weight of the second vertex.
    pub u: f64,
    /// Weight of the third vertex.
    pub v: f64,
}

/// A triangle given by its three vertices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    /// Vertex positions.
    pub vertices: [Point3; 3],
}

impl Triangle {
    /// Create a triangle.
    pub fn new(v0: Point3, v1: Point3, v2: Point3) -> Self {
        Self {
            vertices: [v0, v1, v2],
        }
    }
}

impl Primitive for Triangle {
    type Attributes = Barycentric;

    fn bounds(&self) -> Aabb3 {
        Aabb3::from_points(&self.vertices)
    }

    fn intersect(&self, ray: &Ray) -> HitRecord<Barycentric> {
        let [v0, v1, v2] = &self.vertices;
        let e1 = v1 - v0;
        let e2 = v2 - v0;

        let pvec = ray.direction.cross(&e2);
        let det = e1.dot(&pvec);
        if det.abs() < EPSILON {
            return HitRecord::miss();
        }
        let inv_det = 1.0 / det;

        let tvec = ray.origin - v0;
        let u = tvec.dot(&pvec) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return HitRecord::miss();
        }

        let qvec = tvec.cross(&e1);
        let v = ray.direction.dot(&qvec) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return HitRecord::miss();
        }

        let t = e2.dot(&qvec) * inv_det;
        if t < 0.0 {
            return HitRecord::miss();
        }

        HitRecord::new(t, Barycentric { u, v })
    }
}
