//! raywalk CLI - build random scenes and run BVH ray queries.
//!
//! Useful for eyeballing hierarchy quality and traversal cost without
//! writing a harness.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use raywalk::{BuildOptions, Bvh, BvhStats, Primitive};
use serde::Serialize;

mod query;
mod scene;

use query::{Mode, QueryOptions, QueryReport};
use scene::SceneKind;

#[derive(Parser)]
#[command(name = "raywalk")]
#[command(about = "Ray/BVH traversal playground", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct SceneArgs {
    /// Number of primitives to scatter
    #[arg(long, default_value_t = 10_000)]
    primitives: usize,
    /// Primitive type
    #[arg(long, value_enum, default_value_t = SceneKind::Spheres)]
    kind: SceneKind,
    /// RNG seed for scene and rays
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// Largest number of primitives per leaf
    #[arg(long, default_value_t = BuildOptions::default().max_leaf_size)]
    leaf_size: usize,
    /// Depth at which the builder stops splitting
    #[arg(long, default_value_t = BuildOptions::default().max_depth)]
    max_depth: usize,
    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a hierarchy and print its shape statistics
    Stats {
        #[command(flatten)]
        scene: SceneArgs,
    },
    /// Build a hierarchy and cast a batch of rays into it
    Query {
        #[command(flatten)]
        scene: SceneArgs,
        /// Number of rays
        #[arg(long, default_value_t = 1024)]
        rays: usize,
        /// Traversal mode
        #[arg(long, value_enum, default_value_t = Mode::Closest)]
        mode: Mode,
        /// Hits kept per ray in multi mode
        #[arg(short, default_value_t = 4)]
        k: usize,
        /// Ignore hits at or beyond this distance
        #[arg(long, default_value_t = f64::MAX)]
        max_distance: f64,
        /// Trace rays in packets instead of one at a time
        #[arg(long)]
        packet: bool,
        /// Also print one line per ray
        #[arg(long)]
        per_ray: bool,
    },
}

#[derive(Serialize)]
struct StatsOutput {
    kind: SceneKind,
    seed: u64,
    stats: BvhStats,
}

#[derive(Serialize)]
struct QueryOutput<'a> {
    kind: SceneKind,
    seed: u64,
    stats: BvhStats,
    report: &'a QueryReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    rays: Option<&'a [query::RayOutcome]>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Stats { scene: args } => match args.kind {
            SceneKind::Spheres => show_stats(&args, scene::spheres),
            SceneKind::Triangles => show_stats(&args, scene::triangles),
        },
        Commands::Query {
            scene: args,
            rays,
            mode,
            k,
            max_distance,
            packet,
            per_ray,
        } => {
            let options = QueryOptions {
                mode,
                k,
                max_distance,
                packet,
            };
            options.validate()?;
            match args.kind {
                SceneKind::Spheres => run_query(&args, scene::spheres, rays, &options, per_ray),
                SceneKind::Triangles => run_query(&args, scene::triangles, rays, &options, per_ray),
            }
        }
    }
}

fn build_scene<P: Primitive>(
    args: &SceneArgs,
    rng: &mut StdRng,
    generate: fn(&mut StdRng, usize) -> Vec<P>,
) -> Result<Bvh<P>> {
    let options = BuildOptions {
        max_leaf_size: args.leaf_size,
        max_depth: args.max_depth,
    };
    let primitives = generate(rng, args.primitives);
    let bvh = Bvh::build(primitives, &options)
        .with_context(|| format!("building hierarchy over {} primitives", args.primitives))?;
    info!("built {:?} scene with seed {}", args.kind, args.seed);
    Ok(bvh)
}

fn show_stats<P: Primitive>(
    args: &SceneArgs,
    generate: fn(&mut StdRng, usize) -> Vec<P>,
) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(args.seed);
    let bvh = build_scene(args, &mut rng, generate)?;
    let stats = bvh.stats();

    if args.json {
        let out = StatsOutput {
            kind: args.kind,
            seed: args.seed,
            stats,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("Primitives:    {}", stats.primitive_count);
        println!("Nodes:         {}", stats.node_count);
        println!("Leaves:        {}", stats.leaf_count);
        println!("Max depth:     {}", stats.max_depth);
        println!("Max leaf size: {}", stats.max_leaf_size);
    }

    Ok(())
}

fn run_query<P: Primitive>(
    args: &SceneArgs,
    generate: fn(&mut StdRng, usize) -> Vec<P>,
    ray_count: usize,
    options: &QueryOptions,
    per_ray: bool,
) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(args.seed);
    let bvh = build_scene(args, &mut rng, generate)?;
    let rays = scene::rays(&mut rng, ray_count);

    let (report, outcomes) = query::run(&bvh, &rays, options)?;

    if args.json {
        let out = QueryOutput {
            kind: args.kind,
            seed: args.seed,
            stats: bvh.stats(),
            report: &report,
            rays: per_ray.then_some(outcomes.as_slice()),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Mode:            {:?}", report.mode);
    println!("Rays:            {} (packet width {})", report.rays, report.packet_width);
    println!("Rays hit:        {}", report.rays_hit);
    println!("Total hits:      {}", report.total_hits);
    if let Some(mean) = report.mean_nearest {
        println!("Mean nearest t:  {:.4}", mean);
    }
    println!("Primitive tests: {}", report.primitive_tests);
    println!("Box tests:       {}", report.box_tests);
    println!("Elapsed:         {:.3} ms", report.elapsed_ms);

    if per_ray {
        for (i, outcome) in outcomes.iter().enumerate() {
            match (outcome.nearest, outcome.nearest_primitive) {
                (Some(t), Some(prim)) => {
                    println!("{i:>6}: {} hit(s), nearest t={t:.4} primitive {prim}", outcome.hits)
                }
                _ if outcome.hits > 0 => println!("{i:>6}: occluded"),
                _ => println!("{i:>6}: miss"),
            }
        }
    }

    Ok(())
}
