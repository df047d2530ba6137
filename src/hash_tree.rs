//! 哈希八叉树
//! 子节点放在以卦限编号为键的稀疏表中，只创建有点落入的卦限。
//! 范围查询时先判断包围盒是否相交，不相交的子树直接跳过。

use ahash::AHashMap;
use parry3d::bounding_volume::Aabb;

use crate::error::OctreeError;
use crate::oct_helper::{contains, create_child, get_child, intersects, Point};
use crate::tree::{check_bounds, check_saturated, query_aabb, Octree, Statistics, Traversal, TreeConfig};

#[derive(Debug, Clone)]
pub struct HashNode {
    aabb: Aabb,
    layer: usize,
    points: Vec<Point>,                   // 叶子上的点，分支节点为空
    childs: AHashMap<usize, Box<HashNode>>, // 为空表示叶子
}

impl HashNode {
    fn new(aabb: Aabb, layer: usize) -> Self {
        HashNode {
            aabb,
            layer,
            points: Vec::new(),
            childs: AHashMap::new(),
        }
    }

    #[inline]
    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.childs.is_empty()
    }

    /// 指定卦限的子节点
    #[inline]
    pub fn child(&self, octant: usize) -> Option<&HashNode> {
        self.childs.get(&octant).map(|c| c.as_ref())
    }

    /// 按卦限编号的顺序遍历已创建的子节点
    pub fn iter_childs(&self) -> impl Iterator<Item = (usize, &HashNode)> {
        (0..8).filter_map(move |i| self.child(i).map(|c| (i, c)))
    }

    fn insert(&mut self, point: Point, config: &TreeConfig) {
        if self.is_leaf() {
            self.points.push(point);
            if config.should_split(self.points.len(), self.layer) {
                self.split(config);
            } else {
                check_saturated(config, self.points.len(), self.layer);
            }
            return;
        }
        let i = get_child(&point, &self.aabb);
        let (aabb, layer) = (&self.aabb, self.layer + 1);
        self.childs
            .entry(i)
            .or_insert_with(|| Box::new(HashNode::new(create_child(aabb, i), layer)))
            .insert(point, config);
    }

    // 先按卦限分组，只为有点的卦限创建子节点，再把点逐个插入
    fn split(&mut self, config: &TreeConfig) {
        let mut groups: AHashMap<usize, Vec<Point>> = AHashMap::new();
        for p in self.points.drain(..) {
            groups.entry(get_child(&p, &self.aabb)).or_default().push(p);
        }
        for (i, points) in groups {
            let mut child = Box::new(HashNode::new(create_child(&self.aabb, i), self.layer + 1));
            for p in points {
                child.insert(p, config);
            }
            self.childs.insert(i, child);
        }
    }

    fn query(&self, aabb: &Aabb, result: &mut Vec<Point>) {
        if !intersects(&self.aabb, aabb) {
            return;
        }
        result.extend(self.points.iter().filter(|p| contains(aabb, p)));
        for child in self.childs.values() {
            child.query(aabb, result);
        }
    }

    fn collect_statistics(&self, stats: &mut Statistics) {
        stats.add_node(self.layer, self.is_leaf(), self.points.len());
        for child in self.childs.values() {
            child.collect_statistics(stats);
        }
    }

    fn collect_nodes(&self, traversal: &mut Traversal) {
        traversal.push_node(&self.aabb, self.layer, &self.points);
        for (_, child) in self.iter_childs() {
            child.collect_nodes(traversal);
        }
    }
}

/// 哈希八叉树
#[derive(Debug, Clone)]
pub struct HashOctree {
    root: HashNode,
    config: TreeConfig,
}

impl HashOctree {
    pub fn new(aabb: Aabb, config: TreeConfig) -> Self {
        HashOctree {
            root: HashNode::new(aabb, 0),
            config,
        }
    }

    pub fn root(&self) -> &HashNode {
        &self.root
    }
}

impl Octree for HashOctree {
    fn name(&self) -> &'static str {
        "hashmap"
    }

    fn aabb(&self) -> &Aabb {
        &self.root.aabb
    }

    fn config(&self) -> &TreeConfig {
        &self.config
    }

    fn insert(&mut self, point: Point) -> Result<(), OctreeError> {
        check_bounds(&self.root.aabb, &point)?;
        self.root.insert(point, &self.config);
        Ok(())
    }

    fn range_query(&self, min: Point, max: Point) -> Vec<Point> {
        let mut result = Vec::new();
        self.root.query(&query_aabb(min, max), &mut result);
        result
    }

    fn statistics(&self) -> Statistics {
        let mut stats = Statistics::default();
        self.root.collect_statistics(&mut stats);
        stats
    }

    fn traverse(&self) -> Traversal {
        let mut traversal = Traversal::default();
        self.root.collect_nodes(&mut traversal);
        traversal
    }
}

#[cfg(test)]
fn check_node(node: &HashNode) {
    if node.is_leaf() {
        for p in node.points.iter() {
            assert!(contains(node.aabb(), p));
        }
        return;
    }
    assert!(node.points.is_empty());
    for (i, child) in node.iter_childs() {
        assert_eq!(*child.aabb(), create_child(node.aabb(), i));
        assert_eq!(child.layer, node.layer + 1);
        check_node(child);
    }
}

#[test]
fn test_hash_sparse_split() {
    let aabb = Aabb::new(Point::new(-10.0, -10.0, -10.0), Point::new(10.0, 10.0, 10.0));
    let mut tree = HashOctree::new(aabb, TreeConfig::default());
    tree.insert(Point::new(1.0, 1.0, 1.0)).unwrap();
    tree.insert(Point::new(2.0, 2.0, 2.0)).unwrap();
    let stats = tree.statistics();
    assert!(stats.total_nodes > 1);
    assert_eq!(stats.total_points, 2);
    // 每层只创建有点的卦限，第4层分开成两个叶子
    assert_eq!(stats.total_nodes, 6);
    assert_eq!(stats.leaf_nodes, 2);
    assert_eq!(stats.max_depth, 4);
    check_node(tree.root());

    tree.insert(Point::new(-5.0, -5.0, -5.0)).unwrap();
    assert_eq!(tree.root().childs.len(), 2);
    assert!(tree.root().child(0).unwrap().is_leaf());
    check_node(tree.root());
}

#[test]
fn test_hash_prune_query() {
    let aabb = Aabb::new(Point::new(0.0, 0.0, 0.0), Point::new(16.0, 16.0, 16.0));
    let mut tree = HashOctree::new(aabb, TreeConfig::default());
    for i in 0..16 {
        tree.insert(Point::new(i as f32, i as f32, 15.0 - i as f32)).unwrap();
    }
    let r = tree.range_query(Point::new(3.0, 3.0, 0.0), Point::new(5.0, 5.0, 16.0));
    assert_eq!(r.len(), 3);
    assert!(r.iter().all(|p| p.x >= 3.0 && p.x <= 5.0));
    let r = tree.range_query(Point::new(20.0, 20.0, 20.0), Point::new(30.0, 30.0, 30.0));
    assert!(r.is_empty());
    // 退化成一个点的查询框
    let r = tree.range_query(Point::new(8.0, 8.0, 7.0), Point::new(8.0, 8.0, 7.0));
    assert_eq!(r, vec![Point::new(8.0, 8.0, 7.0)]);
    check_node(tree.root());
}

#[test]
fn test_hash_coincident_points() {
    let aabb = Aabb::new(Point::new(-1.0, -1.0, -1.0), Point::new(1.0, 1.0, 1.0));
    let mut tree = HashOctree::new(aabb, TreeConfig::new(1, 6));
    for _ in 0..50 {
        tree.insert(Point::new(0.3, 0.3, 0.3)).unwrap();
    }
    let stats = tree.statistics();
    assert_eq!(stats.total_points, 50);
    assert_eq!(stats.max_depth, 6);
    assert_eq!(stats.total_nodes, 7);
    assert_eq!(stats.leaf_nodes, 1);
}
