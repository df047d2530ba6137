use pcg_rand::Pcg32;
use rand::{Rng, SeedableRng};

use parry3d::bounding_volume::Aabb;
use pi_octree::vtk::write_vtk;
use pi_octree::*;

const KINDS: [TreeKind; 3] = [TreeKind::Classic, TreeKind::Hashmap, TreeKind::Morton];

fn root() -> Aabb {
    Aabb::new(Point::new(-10.0, -10.0, -10.0), Point::new(10.0, 10.0, 10.0))
}

// 边长不是二进制小数，中心点的计算有舍入
fn odd_root() -> Aabb {
    Aabb::new(Point::new(0.1, 0.1, 0.1), Point::new(0.7, 0.7, 0.7))
}

fn sorted(mut points: Vec<Point>) -> Vec<Point> {
    points.sort_by(|a, b| (a.x, a.y, a.z).partial_cmp(&(b.x, b.y, b.z)).unwrap());
    points
}

fn random_points(rng: &mut Pcg32, count: usize) -> Vec<Point> {
    random_points_in(rng, count, &root())
}

fn random_points_in(rng: &mut Pcg32, count: usize, aabb: &Aabb) -> Vec<Point> {
    (0..count)
        .map(|_| {
            Point::new(
                rng.gen_range(aabb.mins.x..=aabb.maxs.x),
                rng.gen_range(aabb.mins.y..=aabb.maxs.y),
                rng.gen_range(aabb.mins.z..=aabb.maxs.z),
            )
        })
        .collect()
}

fn build(kind: TreeKind, points: &[Point]) -> Box<dyn Octree> {
    build_in(kind, root(), points)
}

fn build_in(kind: TreeKind, aabb: Aabb, points: &[Point]) -> Box<dyn Octree> {
    let mut tree = new_octree(kind, aabb, TreeConfig::default());
    assert_eq!(load_points(tree.as_mut(), points.iter().copied()), 0);
    tree
}

fn brute_force(points: &[Point], min: Point, max: Point) -> Vec<Point> {
    sorted(
        points
            .iter()
            .copied()
            .filter(|p| p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y && p.z >= min.z && p.z <= max.z)
            .collect(),
    )
}

fn random_box(rng: &mut Pcg32, aabb: &Aabb) -> (Point, Point) {
    // 查询框可以超出根包围盒
    let pad = (aabb.maxs - aabb.mins) * 0.1;
    let (lo, hi) = (aabb.mins - pad, aabb.maxs + pad);
    let mut corner = || {
        Point::new(
            rng.gen_range(lo.x..hi.x),
            rng.gen_range(lo.y..hi.y),
            rng.gen_range(lo.z..hi.z),
        )
    };
    let (a, b) = (corner(), corner());
    (
        Point::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
        Point::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
    )
}

#[test]
fn test_points_preserved() {
    let mut rng = Pcg32::seed_from_u64(1111);
    let mut points = random_points(&mut rng, 2000);
    // 重复的点
    let dup = points[..20].to_vec();
    points.extend(dup);
    let expect = sorted(points.clone());
    for kind in KINDS {
        let tree = build(kind, &points);
        let traversal = tree.traverse();
        assert_eq!(sorted(traversal.points), expect, "{}", kind);
        assert_eq!(traversal.boxes.len(), traversal.layers.len());
        assert_eq!(tree.statistics().total_points, points.len());
    }
}

#[test]
fn test_range_query_matches_brute_force() {
    let mut rng = Pcg32::seed_from_u64(2222);
    let points = random_points(&mut rng, 1500);
    let trees: Vec<Box<dyn Octree>> = KINDS.iter().map(|k| build(*k, &points)).collect();
    for _ in 0..50 {
        let (min, max) = random_box(&mut rng, &root());
        let expect = brute_force(&points, min, max);
        for tree in trees.iter() {
            assert_eq!(sorted(tree.range_query(min, max)), expect, "{}", tree.name());
        }
    }
    // 整个根包围盒
    for tree in trees.iter() {
        assert_eq!(tree.range_query(root().mins, root().maxs).len(), points.len());
    }
}

#[test]
fn test_statistics_invariants() {
    let mut rng = Pcg32::seed_from_u64(3333);
    let points = random_points(&mut rng, 1000);
    let stats: Vec<Statistics> = KINDS
        .iter()
        .map(|k| {
            let tree = build(*k, &points);
            let s = tree.statistics();
            let traversal = tree.traverse();
            assert_eq!(s.leaf_nodes + s.internal_nodes(), s.total_nodes);
            assert_eq!(s.total_points, points.len());
            assert_eq!(s.total_nodes, traversal.boxes.len());
            assert_eq!(s.max_depth, traversal.layers.iter().copied().max().unwrap());
            assert_eq!(traversal.layers[0], 0);
            s
        })
        .collect();
    // 三者的分裂决策一致，经典实现只是多了空的子节点
    let (classic, hash, morton) = (stats[0], stats[1], stats[2]);
    assert_eq!(hash, morton);
    assert_eq!(classic.internal_nodes(), hash.internal_nodes());
    assert_eq!(classic.max_depth, hash.max_depth);
    assert_eq!(classic.total_nodes, 1 + 8 * classic.internal_nodes());
    assert!(hash.total_nodes < classic.total_nodes);
}

#[test]
fn test_same_layout_hash_morton() {
    // 整数坐标，分割面上的点都可以精确表达
    let mut rng = Pcg32::seed_from_u64(4444);
    let points: Vec<Point> = (0..300)
        .map(|_| {
            Point::new(
                rng.gen_range(-10..=10) as f32,
                rng.gen_range(-10..=10) as f32,
                rng.gen_range(-10..=10) as f32,
            )
        })
        .collect();
    let hash = build(TreeKind::Hashmap, &points).traverse();
    let morton = build(TreeKind::Morton, &points).traverse();
    assert_eq!(hash.boxes, morton.boxes);
    assert_eq!(hash.layers, morton.layers);
    assert_eq!(hash.points, morton.points);
}

#[test]
fn test_two_points_split() {
    for kind in KINDS {
        let tree = build(kind, &[Point::new(1.0, 1.0, 1.0), Point::new(2.0, 2.0, 2.0)]);
        let s = tree.statistics();
        assert!(s.total_nodes > 1);
        assert_eq!(s.total_points, 2);
    }
}

#[test]
fn test_out_of_bounds_rejected() {
    for kind in KINDS {
        let mut tree = new_octree(kind, root(), TreeConfig::default());
        let r = tree.insert(Point::new(20.0, 20.0, 20.0));
        assert!(matches!(r, Err(OctreeError::OutOfBounds { .. })));
        // 边界上的点可以插入
        tree.insert(Point::new(10.0, -10.0, 10.0)).unwrap();
        let rejected = load_points(tree.as_mut(), vec![Point::new(0.0, 0.0, 10.5), Point::new(0.0, 0.0, 0.0)]);
        assert_eq!(rejected, 1);
        assert_eq!(tree.statistics().total_points, 2);
    }
}

#[test]
fn test_coincident_points_terminate() {
    for kind in KINDS {
        let mut tree = new_octree(kind, root(), TreeConfig::default());
        for _ in 0..100 {
            tree.insert(Point::new(3.3, -4.4, 5.5)).unwrap();
        }
        let s = tree.statistics();
        assert_eq!(s.total_points, 100);
        assert_eq!(s.max_depth, DEEP_MAX);
        assert_eq!(s.internal_nodes(), DEEP_MAX);
        assert_eq!(tree.range_query(Point::new(3.3, -4.4, 5.5), Point::new(3.3, -4.4, 5.5)).len(), 100);
    }
}

#[test]
fn test_single_point_export() {
    for kind in KINDS {
        let tree = build(kind, &[Point::new(1.0, 2.0, 3.0)]);
        let traversal = tree.traverse();
        assert_eq!(traversal.points.len(), 1);
        assert_eq!(traversal.boxes, vec![root()]);
        assert_eq!(traversal.layers, vec![0]);

        let mut out = Vec::new();
        write_vtk(&mut out, "Octree Visualization", &traversal).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("POINTS 9 float\n"));
        assert!(text.contains("CELLS 2 11\n"));
        assert!(text.ends_with("LOOKUP_TABLE default\n-1\n0\n"));
    }
}

#[test]
fn test_max_points_policy() {
    let mut rng = Pcg32::seed_from_u64(5555);
    let points = random_points(&mut rng, 500);
    for kind in KINDS {
        let mut tree = new_octree(kind, root(), TreeConfig::new(8, 2));
        load_points(tree.as_mut(), points.iter().copied());
        let s = tree.statistics();
        assert!(s.max_depth <= 2);
        assert_eq!(s.total_points, 500);
        assert!(s.average_points_per_leaf() > 1.0);
    }
}

#[test]
fn test_odd_root_degenerate_query() {
    let p = Point::new(0.49056515, 0.5110243, 0.26266232);
    for kind in KINDS {
        let tree = build_in(kind, odd_root(), &[p, p]);
        assert_eq!(tree.range_query(p, p), vec![p, p], "{}", kind);
        assert_eq!(tree.statistics().total_points, 2);
    }
}

#[test]
fn test_odd_root_morton_leaf_boxes() {
    let mut rng = Pcg32::seed_from_u64(6666);
    let mut points = random_points_in(&mut rng, 3000, &odd_root());
    let dup = points[..10].to_vec();
    points.extend(dup);
    let mut tree = MortonOctree::new(odd_root(), TreeConfig::default());
    assert_eq!(tree.load(points.iter().copied()), 0);
    let mut count = 0;
    for (key, node) in tree.iter() {
        if let MortonNode::Leaf(leaf) = node {
            let aabb = tree.node_aabb(key);
            for (_, p) in leaf.iter() {
                assert!(contains(&aabb, p), "point {:?} outside leaf {:?}", p, aabb);
                count += 1;
            }
        }
    }
    assert_eq!(count, points.len());
    // 单点查询都能找回自己
    for p in points.iter() {
        assert!(tree.range_query(*p, *p).contains(p));
    }
}

#[test]
fn test_odd_root_range_query_matches_brute_force() {
    let mut rng = Pcg32::seed_from_u64(7777);
    let aabb = odd_root();
    let points = random_points_in(&mut rng, 1500, &aabb);
    let trees: Vec<Box<dyn Octree>> = KINDS.iter().map(|k| build_in(*k, aabb, &points)).collect();
    for _ in 0..50 {
        let (min, max) = random_box(&mut rng, &aabb);
        let expect = brute_force(&points, min, max);
        for tree in trees.iter() {
            assert_eq!(sorted(tree.range_query(min, max)), expect, "{}", tree.name());
        }
    }
    let hash = trees[1].traverse();
    let morton = trees[2].traverse();
    assert_eq!(hash.boxes, morton.boxes);
    assert_eq!(hash.points, morton.points);
    assert_eq!(trees[1].statistics(), trees[2].statistics());
}
