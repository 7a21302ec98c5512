//! Batch ray queries with instrumentation.

use std::time::Instant;

use anyhow::{bail, Result};
use clap::ValueEnum;
use log::{debug, info};
use raywalk::{
    intersect_any, intersect_multi, intersect_with, Bvh, ClosestHit, Distances, HitRecord,
    Intersector, IsCloser, Mask, PacketHitRecord, Primitive, Ray, RayLanes, RayPacket,
};
use raywalk_math::Aabb3;
use serde::Serialize;

/// Multi-hit capacities compiled into the binary.
pub const SUPPORTED_K: [usize; 5] = [1, 2, 4, 8, 16];

/// Packet width used by `--packet`.
pub const PACKET_WIDTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Nearest hit per ray
    Closest,
    /// Occlusion test per ray
    Any,
    /// First K distinct hits per ray, near-first
    Multi,
}

#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub mode: Mode,
    pub k: usize,
    pub max_distance: f64,
    pub packet: bool,
}

impl QueryOptions {
    pub fn validate(&self) -> Result<()> {
        if self.mode == Mode::Multi && !SUPPORTED_K.contains(&self.k) {
            bail!("unsupported -k {}; choose one of {:?}", self.k, SUPPORTED_K);
        }
        if self.max_distance.is_nan() || self.max_distance <= 0.0 {
            bail!("--max-distance must be positive, got {}", self.max_distance);
        }
        Ok(())
    }
}

/// Forwards to the default tests and counts them.
#[derive(Debug, Default)]
pub struct Counting {
    pub primitive_tests: u64,
    pub box_tests: u64,
}

impl<R: RayLanes, P: Primitive> Intersector<R, P> for Counting {
    type Attributes = P::Attributes;

    fn intersect_primitive(&mut self, ray: &R, primitive: &P) -> R::Hit<P::Attributes> {
        self.primitive_tests += 1;
        ray.test_primitive(primitive)
    }

    fn intersect_bounds(&mut self, ray: &R, bounds: &Aabb3, inv_dir: &R::InvDir) -> R::BoxHit {
        self.box_tests += 1;
        ray.test_bounds(bounds, inv_dir)
    }
}

/// Scalar view of one lane's result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RayOutcome {
    pub hits: usize,
    pub nearest: Option<f64>,
    pub nearest_primitive: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryReport {
    pub mode: Mode,
    pub rays: usize,
    pub packet_width: usize,
    pub rays_hit: usize,
    pub total_hits: usize,
    pub mean_nearest: Option<f64>,
    pub primitive_tests: u64,
    pub box_tests: u64,
    pub elapsed_ms: f64,
}

/// Split a (possibly batched) record into scalar lane records.
trait SplitLanes<A> {
    fn split(&self) -> Vec<HitRecord<A>>;
}

impl<A: Copy + Default> SplitLanes<A> for HitRecord<A> {
    fn split(&self) -> Vec<HitRecord<A>> {
        vec![*self]
    }
}

impl<A: Copy + Default, const N: usize> SplitLanes<A> for PacketHitRecord<A, N> {
    fn split(&self) -> Vec<HitRecord<A>> {
        (0..N).map(|i| self.lane(i)).collect()
    }
}

trait SplitMask {
    fn split(&self) -> Vec<bool>;
}

impl SplitMask for bool {
    fn split(&self) -> Vec<bool> {
        vec![*self]
    }
}

impl<const N: usize> SplitMask for Mask<N> {
    fn split(&self) -> Vec<bool> {
        self.0.to_vec()
    }
}

fn from_hits<A>(hits: &[HitRecord<A>]) -> RayOutcome {
    let nearest = hits.iter().filter(|h| h.hit).min_by(|a, b| a.t.total_cmp(&b.t));
    RayOutcome {
        hits: hits.iter().filter(|h| h.hit).count(),
        nearest: nearest.map(|h| h.t),
        nearest_primitive: nearest.map(|h| h.prim_id),
    }
}

fn multi_lanes<const K: usize, R, P>(
    ray: &R,
    bvh: &Bvh<P>,
    counter: &mut Counting,
    max_t: f64,
) -> Vec<RayOutcome>
where
    R: RayLanes,
    P: Primitive,
    R::Hit<P::Attributes>: SplitLanes<P::Attributes>,
{
    let slots = intersect_multi::<K, R, _, _>(ray, bvh, counter, max_t);
    let per_slot: Vec<Vec<HitRecord<P::Attributes>>> = slots.iter().map(|s| s.split()).collect();
    let lanes = per_slot.first().map_or(0, Vec::len);

    (0..lanes)
        .map(|lane| {
            let hits: Vec<_> = per_slot.iter().map(|slot| slot[lane]).collect();
            from_hits(&hits)
        })
        .collect()
}

/// Run one query and return one outcome per lane.
fn query_lanes<R, P>(
    ray: &R,
    bvh: &Bvh<P>,
    counter: &mut Counting,
    options: &QueryOptions,
) -> Vec<RayOutcome>
where
    R: RayLanes,
    P: Primitive,
    R::Hit<P::Attributes>: SplitLanes<P::Attributes>,
    <R::Distance as Distances>::Mask: SplitMask,
{
    let max_t = options.max_distance;
    match options.mode {
        Mode::Closest => {
            let hit =
                intersect_with::<ClosestHit, R, _, _, _>(ray, bvh, &mut *counter, max_t, IsCloser);
            hit.split().iter().map(|h| from_hits(std::slice::from_ref(h))).collect()
        }
        Mode::Any => intersect_any(ray, bvh, counter, max_t)
            .split()
            .into_iter()
            .map(|hit| RayOutcome {
                hits: usize::from(hit),
                ..RayOutcome::default()
            })
            .collect(),
        Mode::Multi => match options.k {
            1 => multi_lanes::<1, R, P>(ray, bvh, counter, max_t),
            2 => multi_lanes::<2, R, P>(ray, bvh, counter, max_t),
            4 => multi_lanes::<4, R, P>(ray, bvh, counter, max_t),
            8 => multi_lanes::<8, R, P>(ray, bvh, counter, max_t),
            _ => multi_lanes::<16, R, P>(ray, bvh, counter, max_t),
        },
    }
}

/// Run every ray through the hierarchy and summarize.
pub fn run<P: Primitive>(
    bvh: &Bvh<P>,
    rays: &[Ray],
    options: &QueryOptions,
) -> Result<(QueryReport, Vec<RayOutcome>)> {
    options.validate()?;

    let mut counter = Counting::default();
    let start = Instant::now();

    let outcomes: Vec<RayOutcome> = if options.packet {
        let mut outcomes = Vec::with_capacity(rays.len());
        for chunk in rays.chunks(PACKET_WIDTH) {
            // Pad the last packet with copies of its final ray
            let packet: RayPacket<PACKET_WIDTH> =
                RayPacket::new(std::array::from_fn(|i| chunk[i.min(chunk.len() - 1)]));
            let lanes = query_lanes(&packet, bvh, &mut counter, options);
            outcomes.extend(lanes.into_iter().take(chunk.len()));
        }
        outcomes
    } else {
        rays.iter()
            .flat_map(|ray| query_lanes(ray, bvh, &mut counter, options))
            .collect()
    };

    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    let nearest: Vec<f64> = outcomes.iter().filter_map(|o| o.nearest).collect();
    let report = QueryReport {
        mode: options.mode,
        rays: rays.len(),
        packet_width: if options.packet { PACKET_WIDTH } else { 1 },
        rays_hit: outcomes.iter().filter(|o| o.hits > 0).count(),
        total_hits: outcomes.iter().map(|o| o.hits).sum(),
        mean_nearest: (!nearest.is_empty()).then(|| nearest.iter().sum::<f64>() / nearest.len() as f64),
        primitive_tests: counter.primitive_tests,
        box_tests: counter.box_tests,
        elapsed_ms,
    };

    debug!("query counters: {:?}", counter);
    info!(
        "{} rays, {} hit, {:.2} ms",
        report.rays, report.rays_hit, report.elapsed_ms
    );

    Ok((report, outcomes))
}
