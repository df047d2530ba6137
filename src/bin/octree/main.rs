//! 八叉树构建测试
//!
//! Usage: octree <classic|hashmap|morton> <random|grid|spiral> <num_points>
//!
//! 在 (-10,-10,-10)-(10,10,10) 内生成点，构建指定的八叉树，
//! 输出构建耗时及统计信息，并导出 octree_<distribution>.vtk。

mod distribution;

use std::path::PathBuf;
use std::process;
use std::time::Instant;

use clap::Parser;
use parry3d::bounding_volume::Aabb;

use pi_octree::{load_points, new_octree, Octree, Point, TreeConfig, TreeKind};

use distribution::Distribution;

#[derive(Parser, Debug)]
#[command(name = "octree", about = "Build a point octree and export it to VTK")]
struct Args {
    /// Tree type: classic, hashmap or morton
    #[arg(value_parser = str::parse::<TreeKind>)]
    tree: TreeKind,

    /// Distribution type
    #[arg(value_enum)]
    distribution: Distribution,

    /// Number of points to generate
    num_points: usize,

    /// Max points per leaf before split (0 = default)
    #[arg(long, default_value_t = 0)]
    max_points: usize,

    /// Max tree depth (0 = default)
    #[arg(long, default_value_t = 0)]
    deep: usize,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            process::exit(code);
        }
    };

    let aabb = Aabb::new(Point::new(-10.0, -10.0, -10.0), Point::new(10.0, 10.0, 10.0));
    let points = args
        .distribution
        .generate(&mut rand::thread_rng(), args.num_points, &aabb);

    let mut tree = new_octree(
        args.tree,
        aabb,
        TreeConfig::new(args.max_points, args.deep),
    );

    let start = Instant::now();
    let rejected = load_points(tree.as_mut(), points.iter().copied());
    let elapsed = start.elapsed();

    println!();
    println!("Build time: {} ms", elapsed.as_millis());
    if rejected > 0 {
        log::warn!("{} of {} points were outside the octree bounds", rejected, points.len());
    }
    println!("=== {} Octree Statistics ===", tree.name());
    println!("{}", tree.statistics());

    let path = PathBuf::from(format!("octree_{}.vtk", args.distribution.as_str()));
    if tree.export_vtk(&path).is_ok() {
        println!("Octree exported to {}", path.display());
        println!("Open this file in ParaView to visualize the octree structure!");
    }
}

#[test]
fn test_parse_args() {
    let args = Args::try_parse_from(["octree", "morton", "grid", "27", "--deep", "5"]).unwrap();
    assert_eq!(args.tree, TreeKind::Morton);
    assert_eq!(args.distribution, Distribution::Grid);
    assert_eq!((args.num_points, args.max_points, args.deep), (27, 0, 5));
    assert!(Args::try_parse_from(["octree", "quad", "grid", "27"]).is_err());
    assert!(Args::try_parse_from(["octree", "classic", "grid"]).is_err());
}
