//! Seeded random scenes and ray sets.

use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::Rng;
use raywalk::{Ray, Sphere, Triangle};
use raywalk_math::{Point3, Vec3};
use serde::Serialize;

/// Half-extent of the cube primitives are scattered in.
pub const SCENE_EXTENT: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneKind {
    Spheres,
    Triangles,
}

fn random_point(rng: &mut StdRng, extent: f64) -> Point3 {
    Point3::new(
        rng.gen_range(-extent..extent),
        rng.gen_range(-extent..extent),
        rng.gen_range(-extent..extent),
    )
}

pub fn spheres(rng: &mut StdRng, count: usize) -> Vec<Sphere> {
    (0..count)
        .map(|_| Sphere::new(random_point(rng, SCENE_EXTENT), rng.gen_range(0.5..2.5)))
        .collect()
}

/// Small triangles with random orientation.
pub fn triangles(rng: &mut StdRng, count: usize) -> Vec<Triangle> {
    (0..count)
        .map(|_| {
            let v0 = random_point(rng, SCENE_EXTENT);
            let v1 = v0 + random_point(rng, 3.0).coords;
            let v2 = v0 + random_point(rng, 3.0).coords;
            Triangle::new(v0, v1, v2)
        })
        .collect()
}

/// Rays from points on a sphere around the scene, aimed at random points
/// inside it.
pub fn rays(rng: &mut StdRng, count: usize) -> Vec<Ray> {
    (0..count)
        .map(|_| {
            let mut dir = random_point(rng, 1.0).coords;
            if dir.norm_squared() < 1e-6 {
                dir = Vec3::z();
            }
            let origin = Point3::origin() + dir.normalize() * SCENE_EXTENT * 2.0;
            let target = random_point(rng, SCENE_EXTENT * 0.5);
            Ray::new(origin, target - origin)
        })
        .collect()
}
