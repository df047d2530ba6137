//! Morton八叉树（线性八叉树）
//! 节点不持有子节点的引用，全部放在以位置键为键的平表中。
//! 向下走一层就是在键后面加3位，再查一次表；父节点的键由右移3位得到，不需要反向引用。
//! 点插入时先沿路由算出最深一层的位置键，和点一起存放，分裂时不用再计算。

use ahash::AHashMap;
use parry3d::bounding_volume::Aabb;

use crate::error::OctreeError;
use crate::morton::{self, key_aabb, key_depth, point_key, MAX_DEPTH, ROOT_KEY};
use crate::oct_helper::{contains, create_child, intersects, Point};
use crate::tree::{check_bounds, check_saturated, query_aabb, Octree, Statistics, Traversal, TreeConfig};

#[derive(Debug, Clone)]
pub enum MortonNode {
    /// 叶子上的点，及其最深一层的位置键
    Leaf(Vec<(u64, Point)>),
    /// 分支节点，已创建的子节点的掩码
    Branch(u8),
}

/// Morton八叉树
#[derive(Debug, Clone)]
pub struct MortonOctree {
    map: AHashMap<u64, MortonNode>,
    aabb: Aabb,
    config: TreeConfig,
}

// 最深一层的位置键在指定层的那一段
#[inline]
fn segment(code: u64, layer: usize) -> usize {
    morton::octant(morton::ancestor(code, MAX_DEPTH - layer))
}

// 掩码中已创建的子节点编号
#[inline]
fn mask_childs(mask: u8) -> impl Iterator<Item = usize> {
    (0..8).filter(move |i| mask & (1u8 << i) != 0)
}

impl MortonOctree {
    pub fn new(aabb: Aabb, config: TreeConfig) -> Self {
        let mut map = AHashMap::new();
        map.insert(ROOT_KEY, MortonNode::Leaf(Vec::new()));
        MortonOctree { map, aabb, config }
    }

    /// 节点数量
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn get(&self, key: u64) -> Option<&MortonNode> {
        self.map.get(&key)
    }

    /// 遍历所有节点，无序
    pub fn iter(&self) -> impl Iterator<Item = (u64, &MortonNode)> {
        self.map.iter().map(|(key, node)| (*key, node))
    }

    /// 节点的包围盒
    pub fn node_aabb(&self, key: u64) -> Aabb {
        key_aabb(&self.aabb, key)
    }

    // 从指定节点开始向下放置点
    fn down(&mut self, mut key: u64, code: u64, point: Point) {
        loop {
            let layer = key_depth(key);
            let i = match self.map.get_mut(&key) {
                Some(MortonNode::Leaf(points)) => {
                    points.push((code, point));
                    if self.config.should_split(points.len(), layer) {
                        self.split(key);
                    } else {
                        check_saturated(&self.config, points.len(), layer);
                    }
                    return;
                }
                Some(MortonNode::Branch(mask)) => {
                    let i = segment(code, layer + 1);
                    *mask |= 1u8 << i;
                    i
                }
                None => {
                    // 子节点在第一次用到时创建
                    self.map.insert(key, MortonNode::Leaf(vec![(code, point)]));
                    return;
                }
            };
            key = morton::child(key, i);
        }
    }

    // 只为有点的段创建子节点，点逐个向下放
    fn split(&mut self, key: u64) {
        let points = match self.map.insert(key, MortonNode::Branch(0)) {
            Some(MortonNode::Leaf(points)) => points,
            Some(branch) => {
                self.map.insert(key, branch);
                return;
            }
            None => return,
        };
        for (code, p) in points {
            self.down(key, code, p);
        }
    }

    fn query(&self, key: u64, aabb: &Aabb, node_aabb: &Aabb, result: &mut Vec<Point>) {
        if !intersects(node_aabb, aabb) {
            return;
        }
        match self.map.get(&key) {
            Some(MortonNode::Leaf(points)) => {
                result.extend(points.iter().map(|(_, p)| *p).filter(|p| contains(aabb, p)));
            }
            Some(MortonNode::Branch(mask)) => {
                for i in mask_childs(*mask) {
                    let child = create_child(node_aabb, i);
                    self.query(morton::child(key, i), aabb, &child, result);
                }
            }
            None => (),
        }
    }

    fn collect_nodes(&self, key: u64, node_aabb: &Aabb, traversal: &mut Traversal) {
        let layer = key_depth(key);
        match self.map.get(&key) {
            Some(MortonNode::Leaf(points)) => {
                traversal.push_node(node_aabb, layer, &[]);
                traversal.points.extend(points.iter().map(|(_, p)| *p));
            }
            Some(MortonNode::Branch(mask)) => {
                traversal.push_node(node_aabb, layer, &[]);
                for i in mask_childs(*mask) {
                    let child = create_child(node_aabb, i);
                    self.collect_nodes(morton::child(key, i), &child, traversal);
                }
            }
            None => (),
        }
    }
}

impl Octree for MortonOctree {
    fn name(&self) -> &'static str {
        "morton"
    }

    fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    fn config(&self) -> &TreeConfig {
        &self.config
    }

    fn insert(&mut self, point: Point) -> Result<(), OctreeError> {
        check_bounds(&self.aabb, &point)?;
        let code = point_key(&self.aabb, &point);
        self.down(ROOT_KEY, code, point);
        Ok(())
    }

    fn range_query(&self, min: Point, max: Point) -> Vec<Point> {
        let mut result = Vec::new();
        self.query(ROOT_KEY, &query_aabb(min, max), &self.aabb, &mut result);
        result
    }

    /// 平表直接扫描，深度由位置键算出
    fn statistics(&self) -> Statistics {
        let mut stats = Statistics::default();
        for (key, node) in self.map.iter() {
            match node {
                MortonNode::Leaf(points) => stats.add_node(key_depth(*key), true, points.len()),
                MortonNode::Branch(_) => stats.add_node(key_depth(*key), false, 0),
            }
        }
        stats
    }

    fn traverse(&self) -> Traversal {
        let mut traversal = Traversal::default();
        self.collect_nodes(ROOT_KEY, &self.aabb, &mut traversal);
        traversal
    }
}

#[test]
fn test_morton_split() {
    let aabb = Aabb::new(Point::new(-10.0, -10.0, -10.0), Point::new(10.0, 10.0, 10.0));
    let mut tree = MortonOctree::new(aabb, TreeConfig::default());
    tree.insert(Point::new(1.0, 1.0, 1.0)).unwrap();
    tree.insert(Point::new(2.0, 2.0, 2.0)).unwrap();
    let stats = tree.statistics();
    assert_eq!(stats.total_nodes, 6);
    assert_eq!(stats.leaf_nodes, 2);
    assert_eq!(stats.total_points, 2);
    assert_eq!(stats.max_depth, 4);

    // 根 -> 7 -> 0 -> 0 -> {0, 7}
    let parent = morton::child(morton::child(morton::child(ROOT_KEY, 7), 0), 0);
    assert!(matches!(tree.get(parent), Some(MortonNode::Branch(0b1000_0001))));
    let leaf = morton::child(parent, 7);
    match tree.get(leaf) {
        Some(MortonNode::Leaf(points)) => {
            assert_eq!(points.len(), 1);
            assert_eq!(points[0].1, Point::new(2.0, 2.0, 2.0));
            // 点的最深位置键的祖先就是所在叶子
            assert_eq!(morton::ancestor(points[0].0, MAX_DEPTH - 4), leaf);
        }
        n => panic!("unexpected node: {:?}", n),
    }
    assert_eq!(morton::parent(leaf), parent);
    assert_eq!(
        tree.node_aabb(leaf),
        Aabb::new(Point::new(1.25, 1.25, 1.25), Point::new(2.5, 2.5, 2.5))
    );
}

#[test]
fn test_morton_leaf_points_inside() {
    let aabb = Aabb::new(Point::new(-8.0, -8.0, -8.0), Point::new(8.0, 8.0, 8.0));
    let mut tree = MortonOctree::new(aabb, TreeConfig::new(2, 0));
    for x in -4..=4 {
        for y in -2..=2 {
            tree.insert(Point::new(x as f32 * 2.0, y as f32 * 4.0, 1.0)).unwrap();
        }
    }
    assert!(tree.insert(Point::new(0.0, 9.0, 0.0)).is_err());
    let stats = tree.statistics();
    assert_eq!(stats.total_points, 45);
    assert_eq!(stats.total_nodes, tree.len());
    for (key, node) in tree.map.iter() {
        match node {
            MortonNode::Leaf(points) => {
                assert!(points.len() <= 2);
                let ab = tree.node_aabb(*key);
                for (code, p) in points {
                    assert!(contains(&ab, p));
                    assert_eq!(morton::ancestor(*code, MAX_DEPTH - key_depth(*key)), *key);
                }
            }
            MortonNode::Branch(mask) => {
                assert_ne!(*mask, 0);
                for i in mask_childs(*mask) {
                    assert!(tree.get(morton::child(*key, i)).is_some());
                }
            }
        }
    }
}

#[test]
fn test_morton_saturated_leaf() {
    let aabb = Aabb::new(Point::new(0.1, 0.1, 0.1), Point::new(0.7, 0.7, 0.7));
    let mut tree = MortonOctree::new(aabb, TreeConfig::new(1, 5));
    let p = Point::new(0.49056515, 0.5110243, 0.26266232);
    for _ in 0..10 {
        tree.insert(p).unwrap();
    }
    let stats = tree.statistics();
    assert_eq!(stats.total_nodes, 6);
    assert_eq!(stats.max_depth, 5);
    let leaf = morton::ancestor(point_key(&aabb, &p), MAX_DEPTH - 5);
    match tree.get(leaf) {
        Some(MortonNode::Leaf(points)) => assert_eq!(points.len(), 10),
        n => panic!("unexpected node: {:?}", n),
    }
    assert!(contains(&tree.node_aabb(leaf), &p));
    assert_eq!(tree.range_query(p, p).len(), 10);
}
