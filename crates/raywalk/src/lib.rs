#![warn(missing_docs)]

//! Ray / bounding-volume-hierarchy traversal.
//!
//! This crate answers "which primitive does this ray hit first (or within
//! the K closest), and where?" for a single ray or a lockstep packet of
//! rays against an immutable, already-built BVH.
//!
//! # Architecture
//!
//! - [`Ray`], [`RayPacket`] - single rays and fixed-width ray batches
//! - [`Mask`] - lane masks with `any`/`all` reductions for packets
//! - [`HitRecord`], [`PacketHitRecord`] - per-candidate results and the
//!   comparison predicates ([`is_closer`], [`UpdateCondition`])
//! - [`bvh`] - flat node array, the [`Hierarchy`] trait and validation
//! - [`build`] - reference binned-SAH builder
//! - [`intersect`] - primitive and intersector capabilities
//! - [`traversal`] - the near-first, early-exiting intersection engine
//! - [`traverse`] - generic depth-first, leaf and parent-chain walks
//!
//! # Example
//!
//! ```
//! use raywalk::{intersect, BuildOptions, Bvh, Ray, Sphere};
//! use raywalk_math::{Point3, Vec3};
//!
//! let spheres = (0..8)
//!     .map(|i| Sphere::new(Point3::new(i as f64 * 3.0, 0.0, 0.0), 1.0))
//!     .collect();
//! let bvh = Bvh::build(spheres, &BuildOptions::default()).unwrap();
//!
//! let ray = Ray::new(Point3::new(-10.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
//! let hit = intersect(&ray, &bvh);
//! assert!(hit.hit);
//! assert!((hit.t - 9.0).abs() < 1e-9);
//! ```

pub mod build;
pub mod bvh;
pub mod error;
mod hit;
pub mod intersect;
mod packet;
mod ray;
pub mod stack;
pub mod traversal;
pub mod traverse;

pub use build::BuildOptions;
pub use bvh::{Bvh, BvhNode, BvhRef, BvhStats, Hierarchy, NodeKind};
pub use error::{BvhError, Result};
pub use hit::{
    box_is_closer, is_closer, is_closer_or_equal, BoxHitLanes, Distances, HitLanes, HitRecord,
    IsCloser, IsCloserOrEqual, MaskOf, UpdateCondition,
};
pub use intersect::{
    Barycentric, DefaultIntersector, Intersector, Primitive, RayLanes, Sphere, Triangle,
};
pub use packet::{LaneMask, Mask, PacketBoxHit, PacketHitRecord, RayPacket};
pub use ray::{BoxHit, Ray};
pub use traversal::{
    intersect, intersect_any, intersect_closest, intersect_multi, intersect_with, AnyHit,
    ClosestHit, MultiHit, TraversalMode,
};
