//! End-to-end checks of the query engine against brute force and against
//! instrumented intersectors.

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use raywalk::traverse::{traverse_leaves, traverse_parents, traverse_parents_at};
use raywalk::{
    intersect, intersect_any, intersect_multi, intersect_with, BuildOptions, Bvh, BvhNode,
    ClosestHit, DefaultIntersector, Hierarchy, HitRecord, Intersector, IsCloser, Mask, Primitive,
    Ray, RayPacket, Sphere, Triangle,
};
use raywalk_math::{Aabb3, Point3, Vec3};

/// Forwards to the primitive's own test and counts calls.
#[derive(Default)]
struct Counting {
    primitive_tests: usize,
}

impl Intersector<Ray, Sphere> for Counting {
    type Attributes = ();

    fn intersect_primitive(&mut self, ray: &Ray, primitive: &Sphere) -> HitRecord {
        self.primitive_tests += 1;
        primitive.intersect(ray)
    }
}

fn random_spheres(rng: &mut StdRng, n: usize) -> Vec<Sphere> {
    (0..n)
        .map(|_| {
            let center = Point3::new(
                rng.gen_range(-50.0..50.0),
                rng.gen_range(-50.0..50.0),
                rng.gen_range(-50.0..50.0),
            );
            Sphere::new(center, rng.gen_range(0.2..3.0))
        })
        .collect()
}

fn random_ray(rng: &mut StdRng) -> Ray {
    let origin = Point3::new(
        rng.gen_range(-80.0..80.0),
        rng.gen_range(-80.0..80.0),
        rng.gen_range(-80.0..80.0),
    );
    let target = Point3::new(
        rng.gen_range(-40.0..40.0),
        rng.gen_range(-40.0..40.0),
        rng.gen_range(-40.0..40.0),
    );
    Ray::new(origin, target - origin)
}

/// A single leaf holding every primitive: the traversal degenerates to a
/// linear scan.
fn flat<P: Primitive>(primitives: Vec<P>) -> Bvh<P> {
    let bounds: Aabb3 = primitives.iter().map(|p| p.bounds()).fold(Aabb3::empty(), |a, b| a.union(&b));
    let count = primitives.len() as u32;
    Bvh::from_parts(vec![BvhNode::leaf(bounds, 0, count)], primitives).unwrap()
}

fn brute_force<P: Primitive>(primitives: &[P], ray: &Ray) -> HitRecord<P::Attributes> {
    let mut best = HitRecord::miss();
    for (i, p) in primitives.iter().enumerate() {
        let mut hr = p.intersect(ray);
        if hr.hit && hr.t < best.t {
            hr.prim_id = i as u32;
            best = hr;
        }
    }
    best
}

fn spheres_along_x(n: usize, spacing: f64, radius: f64) -> Vec<Sphere> {
    (1..=n)
        .map(|i| Sphere::new(Point3::new(i as f64 * spacing, 0.0, 0.0), radius))
        .collect()
}

fn ray_along_x() -> Ray {
    Ray::new(Point3::origin(), Vec3::new(1.0, 0.0, 0.0))
}

#[test]
fn test_closest_hit_matches_brute_force() {
    let mut rng = StdRng::seed_from_u64(7);
    let input = random_spheres(&mut rng, 300);
    let (bvh, order) = Bvh::build_indexed(input.clone(), &BuildOptions::default()).unwrap();

    let mut hits = 0;
    for _ in 0..500 {
        let ray = random_ray(&mut rng);
        let expected = brute_force(&input, &ray);
        let got = intersect(&ray, &bvh);

        assert_eq!(got.hit, expected.hit);
        if expected.hit {
            hits += 1;
            assert_relative_eq!(got.t, expected.t, epsilon = 1e-9);
            assert_eq!(order[got.prim_id as usize], expected.prim_id);
        }
    }
    assert!(hits > 0, "scene too sparse to exercise hits");
}

#[test]
fn test_closest_hit_independent_of_hierarchy_shape() {
    let mut rng = StdRng::seed_from_u64(11);
    let spheres = random_spheres(&mut rng, 200);
    let built = Bvh::build(spheres, &BuildOptions { max_leaf_size: 1, max_depth: 32 }).unwrap();
    let linear = flat(built.primitives().to_vec());

    for _ in 0..300 {
        let ray = random_ray(&mut rng);
        assert_eq!(intersect(&ray, &built), intersect(&ray, &linear));
    }
}

#[test]
fn test_triangle_hits_carry_barycentrics() {
    let mut rng = StdRng::seed_from_u64(3);
    let triangles: Vec<Triangle> = (0..150)
        .map(|_| {
            let base = Point3::new(
                rng.gen_range(-20.0..20.0),
                rng.gen_range(-20.0..20.0),
                rng.gen_range(-20.0..20.0),
            );
            let jitter = |rng: &mut StdRng| {
                Vec3::new(
                    rng.gen_range(-4.0..4.0),
                    rng.gen_range(-4.0..4.0),
                    rng.gen_range(-4.0..4.0),
                )
            };
            Triangle::new(base, base + jitter(&mut rng), base + jitter(&mut rng))
        })
        .collect();
    let bvh = Bvh::build(triangles, &BuildOptions::default()).unwrap();

    let mut hits = 0;
    for _ in 0..400 {
        let ray = random_ray(&mut rng);
        let expected = brute_force(bvh.primitives(), &ray);
        let got = intersect(&ray, &bvh);
        assert_eq!(got, expected);

        if got.hit {
            hits += 1;
            let [v0, v1, v2] = bvh.primitive(got.prim_id).vertices;
            let bc = got.attributes;
            let p = v0 + (v1 - v0) * bc.u + (v2 - v0) * bc.v;
            assert_relative_eq!(p, ray.at(got.t), epsilon = 1e-6);
        }
    }
    assert!(hits > 0);
}

#[test]
fn test_near_first_prunes_far_leaves() {
    let bvh = Bvh::build(spheres_along_x(64, 2.0, 0.5), &BuildOptions::default()).unwrap();
    let mut counter = Counting::default();

    let hit = intersect_with::<ClosestHit, _, _, _, _>(
        &ray_along_x(),
        &bvh,
        &mut counter,
        f64::MAX,
        IsCloser,
    );

    assert!(hit.hit);
    assert_relative_eq!(hit.t, 1.5, epsilon = 1e-12);
    // Leaves deferred next to the nearest one are tested, the rest is pruned
    assert!(counter.primitive_tests < 16, "tested {}", counter.primitive_tests);
}

/// Root over two single-sphere leaves, stored in the given order.
fn two_leaves(first: (Sphere, Aabb3), second: (Sphere, Aabb3)) -> Bvh<Sphere> {
    Bvh::from_parts(
        vec![
            BvhNode::inner(first.1.union(&second.1), 1, 2),
            BvhNode::leaf(first.1, 0, 1),
            BvhNode::leaf(second.1, 1, 2),
        ],
        vec![first.0, second.0],
    )
    .unwrap()
}

#[test]
fn test_near_child_entered_first_when_stored_second() {
    let far = Sphere::new(Point3::new(8.0, 0.0, 0.0), 0.5);
    let near = Sphere::new(Point3::new(2.0, 0.0, 0.0), 0.5);
    let bvh = two_leaves((far, far.bounds()), (near, near.bounds()));

    let [first] =
        intersect_multi::<1, _, _, _>(&ray_along_x(), &bvh, &mut DefaultIntersector, f64::MAX);
    assert_eq!(first.primitive(), Some(1));
    assert_relative_eq!(first.t, 1.5, epsilon = 1e-12);

    // Reversed ray: the stored-first child is now the near one
    let back = Ray::new(Point3::new(10.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0));
    let [first] =
        intersect_multi::<1, _, _, _>(&back, &bvh, &mut DefaultIntersector, f64::MAX);
    assert_eq!(first.primitive(), Some(0));
    assert_relative_eq!(first.t, 1.5, epsilon = 1e-12);
}

#[test]
fn test_multi_hit_stops_at_first_found_with_overlapping_boxes() {
    // The oversized box starts nearer, but its sphere lies behind the other one
    let hidden = Sphere::new(Point3::new(9.0, 0.0, 0.0), 1.0);
    let loose = Aabb3::new(Point3::new(0.5, -1.0, -1.0), Point3::new(10.0, 1.0, 1.0));
    let front = Sphere::new(Point3::new(4.0, 0.0, 0.0), 1.0);
    let bvh = two_leaves((front, front.bounds()), (hidden, loose));

    let [first] =
        intersect_multi::<1, _, _, _>(&ray_along_x(), &bvh, &mut DefaultIntersector, f64::MAX);
    assert_eq!(first.primitive(), Some(1));
    assert_relative_eq!(first.t, 8.0, epsilon = 1e-12);

    let closest = intersect(&ray_along_x(), &bvh);
    assert_eq!(closest.primitive(), Some(0));
    assert_relative_eq!(closest.t, 3.0, epsilon = 1e-12);
}

#[test]
fn test_max_distance_clips_hits() {
    let bvh = Bvh::build(spheres_along_x(5, 2.0, 0.5), &BuildOptions::default()).unwrap();
    let ray = ray_along_x();
    let query = |max_t: f64| {
        intersect_with::<ClosestHit, _, _, _, _>(&ray, &bvh, &mut DefaultIntersector, max_t, IsCloser)
    };

    // Nearest surface is at t = 1.5
    assert!(!query(1.5).hit);
    assert!(!query(1.0).hit);
    let hit = query(1.6);
    assert!(hit.hit);
    assert_relative_eq!(hit.t, 1.5, epsilon = 1e-12);

    assert!(!intersect_any(&ray, &bvh, &mut DefaultIntersector, 1.5));
    assert!(intersect_any(&ray, &bvh, &mut DefaultIntersector, 1.6));

    let hits = intersect_multi::<3, _, _, _>(&ray, &bvh, &mut DefaultIntersector, 4.0);
    assert!(hits[0].hit);
    assert!(hits[1].hit);
    assert!(!hits[2].hit);
}

#[test]
fn test_multi_hit_returns_nearest_in_order() {
    // Surfaces at t = 1, 2, 3, 4, 5
    let spheres: Vec<Sphere> = (1..=5)
        .map(|i| Sphere::new(Point3::new(i as f64 + 0.25, 0.0, 0.0), 0.25))
        .collect();
    let options = BuildOptions {
        max_leaf_size: 1,
        ..BuildOptions::default()
    };
    let bvh = Bvh::build(spheres, &options).unwrap();

    let hits = intersect_multi::<3, _, _, _>(&ray_along_x(), &bvh, &mut DefaultIntersector, f64::MAX);

    let distances: Vec<f64> = hits.iter().map(|h| h.t).collect();
    assert!(hits.iter().all(|h| h.hit));
    for (got, want) in distances.iter().zip([1.0, 2.0, 3.0]) {
        assert_relative_eq!(*got, want, epsilon = 1e-12);
    }
    assert_ne!(hits[0].prim_id, hits[1].prim_id);
    assert_ne!(hits[1].prim_id, hits[2].prim_id);
    assert_ne!(hits[0].prim_id, hits[2].prim_id);
}

#[test]
fn test_multi_hit_unfilled_slots_are_misses() {
    let bvh = Bvh::build(spheres_along_x(2, 2.0, 0.5), &BuildOptions::default()).unwrap();
    let hits = intersect_multi::<4, _, _, _>(&ray_along_x(), &bvh, &mut DefaultIntersector, f64::MAX);

    assert!(hits[0].hit && hits[1].hit);
    assert!(hits[0].t <= hits[1].t);
    assert_eq!(hits[2], HitRecord::miss());
    assert_eq!(hits[3], HitRecord::miss());
}

#[test]
fn test_any_hit_short_circuits() {
    let bvh = Bvh::build(spheres_along_x(1000, 2.0, 0.5), &BuildOptions::default()).unwrap();
    let mut counter = Counting::default();

    assert!(intersect_any(&ray_along_x(), &bvh, &mut counter, f64::MAX));
    assert!(counter.primitive_tests < 1000);
    assert!(counter.primitive_tests <= 4, "tested {}", counter.primitive_tests);

    let away = Ray::new(Point3::origin(), Vec3::new(-1.0, 0.0, 0.0));
    let mut counter = Counting::default();
    assert!(!intersect_any(&away, &bvh, &mut counter, f64::MAX));
    assert_eq!(counter.primitive_tests, 0);
}

#[test]
fn test_uniform_packet_matches_scalar() {
    let mut rng = StdRng::seed_from_u64(19);
    let bvh = Bvh::build(random_spheres(&mut rng, 250), &BuildOptions::default()).unwrap();

    for _ in 0..100 {
        let ray = random_ray(&mut rng);
        let scalar = intersect(&ray, &bvh);
        let packet = intersect(&RayPacket::<4>::splat(ray), &bvh);
        for lane in 0..4 {
            assert_eq!(packet.lane(lane), scalar);
        }
    }
}

#[test]
fn test_divergent_packet_matches_scalar_per_lane() {
    let mut rng = StdRng::seed_from_u64(23);
    let bvh = Bvh::build(random_spheres(&mut rng, 250), &BuildOptions::default()).unwrap();

    for _ in 0..100 {
        let packet = RayPacket::new([
            random_ray(&mut rng),
            random_ray(&mut rng),
            random_ray(&mut rng),
            random_ray(&mut rng),
        ]);
        let closest = intersect(&packet, &bvh);
        let any = intersect_any(&packet, &bvh, &mut DefaultIntersector, 60.0);

        let expected_any = Mask::from_fn(|lane| {
            intersect_any(packet.lane(lane), &bvh, &mut DefaultIntersector, 60.0)
        });
        assert_eq!(any, expected_any);
        for lane in 0..4 {
            assert_eq!(closest.lane(lane), intersect(packet.lane(lane), &bvh));
        }
    }
}

#[test]
fn test_leaf_to_root_chains() {
    let mut rng = StdRng::seed_from_u64(5);
    let bvh = Bvh::build(random_spheres(&mut rng, 120), &BuildOptions::default()).unwrap();

    traverse_leaves(&bvh, |addr, leaf| {
        let mut chain = Vec::new();
        traverse_parents_at(&bvh, addr, |parent, node| {
            assert!(node.is_inner());
            chain.push(parent);
        });

        assert_eq!(chain.last().copied(), Some(0));
        let mut deduped = chain.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), chain.len());
        assert!(chain.windows(2).all(|w| w[0] > w[1]));

        let mut by_value = Vec::new();
        traverse_parents(&bvh, leaf, |parent, _| by_value.push(parent));
        assert_eq!(by_value, chain);
    });
}

#[test]
fn test_built_depth_fits_stack() {
    let mut rng = StdRng::seed_from_u64(13);
    let options = BuildOptions {
        max_leaf_size: 1,
        max_depth: 32,
    };
    let bvh = Bvh::build(random_spheres(&mut rng, 4000), &options).unwrap();
    let stats = bvh.stats();
    assert!(stats.max_depth <= 32);
    assert_eq!(stats.primitive_count, 4000);

    let ray = random_ray(&mut rng);
    assert_eq!(intersect(&ray, &bvh), brute_force(bvh.primitives(), &ray));
}
