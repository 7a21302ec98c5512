//! Reference BVH builder using a binned Surface Area Heuristic (SAH).
//!
//! Nodes are emitted depth-first: a parent is stored before its children,
//! which is what validation and the parent-chain walk expect. The depth is
//! capped so the result always fits the intersection stack.

use log::debug;
use raywalk_math::{Aabb3, Axis, Point3};
use serde::{Deserialize, Serialize};

use crate::bvh::{Bvh, BvhNode};
use crate::error::{BvhError, Result};
use crate::intersect::Primitive;
use crate::stack::INTERSECT_STACK_SIZE;

/// Number of centroid buckets evaluated per axis.
const NUM_BUCKETS: usize = 12;

/// Relative cost of visiting an inner node versus testing one primitive.
const TRAVERSAL_COST: f64 = 0.125;

/// Builder parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Stop splitting once a node holds at most this many primitives.
    pub max_leaf_size: usize,
    /// Maximum leaf depth; deeper nodes become leaves regardless of size.
    pub max_depth: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            max_leaf_size: 4,
            max_depth: 24,
        }
    }
}

impl BuildOptions {
    /// Validate options.
    pub fn validate(&self) -> Result<()> {
        if self.max_leaf_size == 0 {
            return Err(BvhError::InvalidOptions(
                "max_leaf_size must be at least 1".into(),
            ));
        }
        if self.max_depth > INTERSECT_STACK_SIZE {
            return Err(BvhError::InvalidOptions(format!(
                "max_depth {} exceeds the traversal stack capacity of {}",
                self.max_depth, INTERSECT_STACK_SIZE
            )));
        }
        Ok(())
    }
}

/// Per-primitive data the builder sorts around.
#[derive(Debug, Clone, Copy)]
struct BuildItem {
    index: usize,
    bounds: Aabb3,
    centroid: Point3,
}

impl<P: Primitive> Bvh<P> {
    /// Build a hierarchy over `primitives`.
    ///
    /// Primitives are reordered into leaf order; hit records index the
    /// reordered array. Use [`Bvh::build_indexed`] to map back.
    pub fn build(primitives: Vec<P>, options: &BuildOptions) -> Result<Self> {
        Self::build_indexed(primitives, options).map(|(bvh, _)| bvh)
    }

    /// Build a hierarchy and also return, for each stored primitive, its
    /// index in the input vector.
    pub fn build_indexed(primitives: Vec<P>, options: &BuildOptions) -> Result<(Self, Vec<u32>)> {
        options.validate()?;
        if primitives.is_empty() {
            return Err(BvhError::NoPrimitives);
        }

        let mut items: Vec<BuildItem> = primitives
            .iter()
            .enumerate()
            .map(|(index, p)| {
                let bounds = p.bounds();
                BuildItem {
                    index,
                    bounds,
                    centroid: bounds.centroid(),
                }
            })
            .collect();

        let mut nodes = Vec::with_capacity(2 * items.len() / options.max_leaf_size.max(1) + 1);
        build_node(&mut items, 0, 0, options, &mut nodes);

        let order: Vec<u32> = items.iter().map(|item| item.index as u32).collect();
        let primitives = reorder(primitives, &items);

        debug!(
            "built hierarchy: {} primitives, {} nodes",
            primitives.len(),
            nodes.len()
        );

        Ok((Bvh::from_parts_unchecked(nodes, primitives), order))
    }
}

/// Move primitives into the order the builder left `items` in.
fn reorder<P>(primitives: Vec<P>, items: &[BuildItem]) -> Vec<P> {
    let mut rank = vec![0usize; items.len()];
    for (position, item) in items.iter().enumerate() {
        rank[item.index] = position;
    }

    let mut keyed: Vec<(usize, P)> = primitives
        .into_iter()
        .enumerate()
        .map(|(i, p)| (rank[i], p))
        .collect();
    keyed.sort_unstable_by_key(|(position, _)| *position);
    keyed.into_iter().map(|(_, p)| p).collect()
}

/// Build the subtree over `items` (which occupy primitive slots starting at
/// `offset`) and return its address.
fn build_node(
    items: &mut [BuildItem],
    offset: usize,
    depth: usize,
    options: &BuildOptions,
    nodes: &mut Vec<BvhNode>,
) -> u32 {
    let bounds: Aabb3 = items.iter().map(|item| &item.bounds).collect();
    let addr = nodes.len() as u32;

    if items.len() <= options.max_leaf_size || depth >= options.max_depth {
        nodes.push(BvhNode::leaf(
            bounds,
            offset as u32,
            (offset + items.len()) as u32,
        ));
        return addr;
    }

    // Reserve this node's slot so it precedes its children
    nodes.push(BvhNode::leaf(bounds, 0, 0));

    let mid = match find_best_split(items) {
        Some((axis, pos)) => partition_items(items, axis, pos),
        None => 0,
    };

    // Fallback if partition fails: median split along the widest centroid axis
    let mid = if mid == 0 || mid == items.len() {
        let axis = centroid_bounds(items).longest_axis();
        let mid = items.len() / 2;
        items.select_nth_unstable_by(mid, |a, b| {
            a.centroid[axis.index()].total_cmp(&b.centroid[axis.index()])
        });
        mid
    } else {
        mid
    };

    let (left_items, right_items) = items.split_at_mut(mid);
    let left = build_node(left_items, offset, depth + 1, options, nodes);
    let right = build_node(right_items, offset + mid, depth + 1, options, nodes);

    nodes[addr as usize] = BvhNode::inner(bounds, left, right);
    addr
}

fn centroid_bounds(items: &[BuildItem]) -> Aabb3 {
    Aabb3::from_points(items.iter().map(|item| &item.centroid))
}

/// Find the best split axis and position using SAH over centroid buckets.
///
/// Returns `None` when all centroids coincide.
fn find_best_split(items: &[BuildItem]) -> Option<(Axis, f64)> {
    let cbounds = centroid_bounds(items);
    let node_area = items
        .iter()
        .map(|item| &item.bounds)
        .collect::<Aabb3>()
        .surface_area();

    let mut best: Option<(Axis, f64)> = None;
    let mut best_cost = f64::INFINITY;

    for axis in Axis::ALL {
        let a = axis.index();
        let axis_min = cbounds.min[a];
        let axis_extent = cbounds.max[a] - axis_min;
        if axis_extent < 1e-12 {
            continue;
        }

        let mut bucket_counts = [0usize; NUM_BUCKETS];
        let mut bucket_bounds = [Aabb3::empty(); NUM_BUCKETS];

        for item in items {
            let b = ((item.centroid[a] - axis_min) / axis_extent * NUM_BUCKETS as f64) as usize;
            let b = b.min(NUM_BUCKETS - 1);
            bucket_counts[b] += 1;
            bucket_bounds[b].include_aabb(&item.bounds);
        }

        for split in 1..NUM_BUCKETS {
            let left_count: usize = bucket_counts[..split].iter().sum();
            let right_count: usize = bucket_counts[split..].iter().sum();
            if left_count == 0 || right_count == 0 {
                continue;
            }

            let left_area = bucket_bounds[..split].iter().collect::<Aabb3>().surface_area();
            let right_area = bucket_bounds[split..].iter().collect::<Aabb3>().surface_area();

            // Degenerate (flat or point) nodes have no area to weigh by
            let cost = if node_area > 0.0 {
                TRAVERSAL_COST
                    + left_area / node_area * left_count as f64
                    + right_area / node_area * right_count as f64
            } else {
                TRAVERSAL_COST + left_count.max(right_count) as f64
            };

            if cost < best_cost {
                best_cost = cost;
                best = Some((axis, axis_min + (split as f64 / NUM_BUCKETS as f64) * axis_extent));
            }
        }
    }

    best
}

/// Partition items by centroid along an axis; returns the split index.
fn partition_items(items: &mut [BuildItem], axis: Axis, pos: f64) -> usize {
    let a = axis.index();
    let mut left = 0;
    let mut right = items.len();

    while left < right {
        if items[left].centroid[a] < pos {
            left += 1;
        } else {
            right -= 1;
            items.swap(left, right);
        }
    }

    left
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::{validate, Hierarchy};
    use crate::intersect::Sphere;
    use crate::traverse::traverse_leaves;

    fn row_of_spheres(n: usize) -> Vec<Sphere> {
        (0..n)
            .map(|i| Sphere::new(Point3::new(i as f64 * 2.0, 0.0, 0.0), 0.5))
            .collect()
    }

    #[test]
    fn test_build_single_primitive() {
        let bvh = Bvh::build(row_of_spheres(1), &BuildOptions::default()).unwrap();
        assert_eq!(bvh.nodes().len(), 1);
        assert!(bvh.node(0).is_leaf());
    }

    #[test]
    fn test_build_empty_fails() {
        let result = Bvh::<Sphere>::build(Vec::new(), &BuildOptions::default());
        assert_eq!(result.err(), Some(BvhError::NoPrimitives));
    }

    #[test]
    fn test_build_is_valid_and_covers_all_primitives() {
        let bvh = Bvh::build(row_of_spheres(100), &BuildOptions::default()).unwrap();
        assert!(validate(bvh.nodes(), bvh.primitives().len()).is_ok());

        let mut covered = vec![false; 100];
        traverse_leaves(&bvh, |_, leaf| {
            let range = leaf.primitive_range().unwrap();
            assert!(range.len() <= 4);
            for i in range {
                assert!(!covered[i as usize]);
                covered[i as usize] = true;
            }
        });
        assert!(covered.iter().all(|&c| c));
    }

    #[test]
    fn test_node_bounds_contain_children() {
        let bvh = Bvh::build(row_of_spheres(37), &BuildOptions::default()).unwrap();
        for node in bvh.nodes() {
            if let crate::bvh::NodeKind::Inner { children } = node.kind {
                for c in children {
                    assert!(node.bounds.contains_aabb(&bvh.node(c).bounds));
                }
            } else {
                for i in node.primitive_range().unwrap() {
                    assert!(node.bounds.contains_aabb(&bvh.primitive(i).bounds()));
                }
            }
        }
    }

    #[test]
    fn test_build_indexed_maps_back() {
        let input = row_of_spheres(20);
        let (bvh, order) = Bvh::build_indexed(input.clone(), &BuildOptions::default()).unwrap();
        assert_eq!(order.len(), 20);
        for (position, &original) in order.iter().enumerate() {
            assert_eq!(bvh.primitive(position as u32), &input[original as usize]);
        }
    }

    #[test]
    fn test_coincident_centroids_still_split() {
        let spheres = vec![Sphere::new(Point3::origin(), 1.0); 9];
        let bvh = Bvh::build(spheres, &BuildOptions { max_leaf_size: 2, max_depth: 24 }).unwrap();
        assert!(bvh.node(0).is_inner());
        assert!(validate(bvh.nodes(), 9).is_ok());
    }

    #[test]
    fn test_depth_limit() {
        let options = BuildOptions {
            max_leaf_size: 1,
            max_depth: 3,
        };
        let bvh = Bvh::build(row_of_spheres(64), &options).unwrap();
        assert!(bvh.stats().max_depth <= 3);
        assert_eq!(bvh.stats().primitive_count, 64);
    }

    #[test]
    fn test_invalid_options() {
        let zero_leaf = BuildOptions {
            max_leaf_size: 0,
            ..BuildOptions::default()
        };
        assert!(matches!(zero_leaf.validate(), Err(BvhError::InvalidOptions(_))));
        let too_deep = BuildOptions {
            max_depth: INTERSECT_STACK_SIZE + 1,
            ..BuildOptions::default()
        };
        assert!(Bvh::build(row_of_spheres(4), &too_deep).is_err());
    }

    #[test]
    fn test_options_from_partial_json() {
        let options: BuildOptions = serde_json::from_str(r#"{ "max_leaf_size": 8 }"#).unwrap();
        assert_eq!(options.max_leaf_size, 8);
        assert_eq!(options.max_depth, BuildOptions::default().max_depth);
    }
}
