//! 经典八叉树
//! 分裂时一次创建全部8个子节点，哪怕其中没有点，用内存换取简单。
//! 采用SlotMap存放节点，子节点用键引用，节点只被父节点持有，树销毁时整体释放。

use std::mem;

use parry3d::bounding_volume::Aabb;
use pi_slotmap::{DefaultKey, Key, SlotMap};

use crate::error::OctreeError;
use crate::oct_helper::{contains, create_child, get_child, make_childs, Point};
use crate::tree::{check_bounds, check_saturated, query_aabb, Octree, Statistics, Traversal, TreeConfig};

/// 经典八叉树
pub type ClassicOctree = ClassicTree<DefaultKey>;

pub struct ClassicTree<K: Key> {
    slab: SlotMap<K, ClassicNode<K>>, // 所有节点
    root_key: K,
    aabb: Aabb, // 根包围盒
    config: TreeConfig,
}

#[derive(Debug, Clone)]
pub struct ClassicNode<K: Key> {
    aabb: Aabb,            // 包围盒
    layer: usize,          // 第几层，根为0
    content: Content<K>,   // 点列表或子节点
}

#[derive(Debug, Clone)]
enum Content<K> {
    Leaf(Vec<Point>),
    Branch([K; 8]), // null表示子节点尚未创建
}

impl<K: Key> ClassicNode<K> {
    #[inline]
    fn new(aabb: Aabb, layer: usize) -> Self {
        ClassicNode {
            aabb,
            layer,
            content: Content::Leaf(Vec::new()),
        }
    }

    #[inline]
    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.content, Content::Leaf(_))
    }
}

impl<K: Key> ClassicTree<K> {
    pub fn new(aabb: Aabb, config: TreeConfig) -> Self {
        let mut slab = SlotMap::with_key();
        let root_key = slab.insert(ClassicNode::new(aabb, 0));
        ClassicTree {
            slab,
            root_key,
            aabb,
            config,
        }
    }

    /// 节点数量
    pub fn len(&self) -> usize {
        self.slab.len()
    }

    pub fn root_key(&self) -> K {
        self.root_key
    }

    pub fn get(&self, id: K) -> Option<&ClassicNode<K>> {
        self.slab.get(id)
    }

    /// 节点的子节点键，叶子返回None
    pub fn childs(&self, id: K) -> Option<[K; 8]> {
        match self.slab.get(id) {
            Some(ClassicNode {
                content: Content::Branch(childs),
                ..
            }) => Some(*childs),
            _ => None,
        }
    }

    // 从指定节点开始向下放置点
    fn down(&mut self, mut id: K, point: Point) {
        loop {
            let node = match self.slab.get_mut(id) {
                Some(node) => node,
                _ => return,
            };
            let (i, aabb, layer) = match node.content {
                Content::Leaf(ref mut points) => {
                    points.push(point);
                    if self.config.should_split(points.len(), node.layer) {
                        self.split(id);
                    } else {
                        check_saturated(&self.config, points.len(), node.layer);
                    }
                    return;
                }
                Content::Branch(ref childs) => {
                    let i = get_child(&point, &node.aabb);
                    if !childs[i].is_null() {
                        id = childs[i];
                        continue;
                    }
                    (i, create_child(&node.aabb, i), node.layer + 1)
                }
            };
            // 子节点在第一次用到时创建
            let child = self.slab.insert(ClassicNode::new(aabb, layer));
            if let Some(ClassicNode {
                content: Content::Branch(childs),
                ..
            }) = self.slab.get_mut(id)
            {
                childs[i] = child;
            }
            id = child;
        }
    }

    // 分裂叶子，一次创建全部8个子节点，再把点分下去
    fn split(&mut self, id: K) {
        let (aabb, layer, points) = match self.slab.get_mut(id) {
            Some(node) => {
                let points = match mem::replace(&mut node.content, Content::Branch([K::null(); 8])) {
                    Content::Leaf(points) => points,
                    Content::Branch(childs) => {
                        node.content = Content::Branch(childs);
                        return;
                    }
                };
                (node.aabb, node.layer, points)
            }
            _ => return,
        };
        let mut childs = [K::null(); 8];
        for (i, ab) in make_childs(&aabb).into_iter().enumerate() {
            childs[i] = self.slab.insert(ClassicNode::new(ab, layer + 1));
        }
        if let Some(node) = self.slab.get_mut(id) {
            node.content = Content::Branch(childs);
        }
        for p in points {
            self.down(childs[get_child(&p, &aabb)], p);
        }
    }

    fn collect_points(&self, id: K, result: &mut Vec<Point>) {
        let node = match self.slab.get(id) {
            Some(node) => node,
            _ => return,
        };
        match node.content {
            Content::Leaf(ref points) => result.extend_from_slice(points),
            Content::Branch(ref childs) => {
                for child in childs.iter().filter(|k| !k.is_null()) {
                    self.collect_points(*child, result);
                }
            }
        }
    }

    fn collect_statistics(&self, id: K, stats: &mut Statistics) {
        let node = match self.slab.get(id) {
            Some(node) => node,
            _ => return,
        };
        match node.content {
            Content::Leaf(ref points) => stats.add_node(node.layer, true, points.len()),
            Content::Branch(ref childs) => {
                stats.add_node(node.layer, false, 0);
                for child in childs.iter().filter(|k| !k.is_null()) {
                    self.collect_statistics(*child, stats);
                }
            }
        }
    }

    fn collect_nodes(&self, id: K, traversal: &mut Traversal) {
        let node = match self.slab.get(id) {
            Some(node) => node,
            _ => return,
        };
        match node.content {
            Content::Leaf(ref points) => traversal.push_node(&node.aabb, node.layer, points),
            Content::Branch(ref childs) => {
                traversal.push_node(&node.aabb, node.layer, &[]);
                for child in childs.iter().filter(|k| !k.is_null()) {
                    self.collect_nodes(*child, traversal);
                }
            }
        }
    }
}

impl<K: Key> Octree for ClassicTree<K> {
    fn name(&self) -> &'static str {
        "classic"
    }

    fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    fn config(&self) -> &TreeConfig {
        &self.config
    }

    fn insert(&mut self, point: Point) -> Result<(), OctreeError> {
        check_bounds(self.aabb(), &point)?;
        self.down(self.root_key, point);
        Ok(())
    }

    /// 先收集全部的点再过滤，复杂度和总点数成正比
    fn range_query(&self, min: Point, max: Point) -> Vec<Point> {
        let aabb = query_aabb(min, max);
        let mut all = Vec::new();
        self.collect_points(self.root_key, &mut all);
        all.retain(|p| contains(&aabb, p));
        all
    }

    fn statistics(&self) -> Statistics {
        let mut stats = Statistics::default();
        self.collect_statistics(self.root_key, &mut stats);
        stats
    }

    fn traverse(&self) -> Traversal {
        let mut traversal = Traversal::default();
        self.collect_nodes(self.root_key, &mut traversal);
        traversal
    }
}

#[cfg(test)]
fn check_partition(tree: &ClassicOctree, id: DefaultKey) {
    let node = tree.get(id).unwrap();
    match tree.childs(id) {
        Some(childs) => {
            let expect = make_childs(node.aabb());
            for i in 0..8 {
                assert!(!childs[i].is_null());
                assert_eq!(*tree.get(childs[i]).unwrap().aabb(), expect[i]);
                check_partition(tree, childs[i]);
            }
        }
        None => assert!(node.is_leaf()),
    }
}

#[test]
fn test_classic_split() {
    let aabb = Aabb::new(Point::new(-10.0, -10.0, -10.0), Point::new(10.0, 10.0, 10.0));
    let mut tree = ClassicOctree::new(aabb, TreeConfig::default());
    tree.insert(Point::new(1.0, 1.0, 1.0)).unwrap();
    assert_eq!(tree.len(), 1);
    tree.insert(Point::new(2.0, 2.0, 2.0)).unwrap();
    let stats = tree.statistics();
    println!("{}", stats);
    assert!(stats.total_nodes > 1);
    assert_eq!(stats.total_points, 2);
    // 两个点一直落在同一个卦限，直到第4层才分开： 1 + 8 * 4
    assert_eq!(stats.total_nodes, 33);
    assert_eq!(stats.leaf_nodes, 29);
    assert_eq!(stats.max_depth, 4);
    assert_eq!(tree.len(), stats.total_nodes);
    check_partition(&tree, tree.root_key());
}

#[test]
fn test_classic_out_of_bounds() {
    let aabb = Aabb::new(Point::new(-10.0, -10.0, -10.0), Point::new(10.0, 10.0, 10.0));
    let mut tree = ClassicOctree::new(aabb, TreeConfig::default());
    match tree.insert(Point::new(20.0, 20.0, 20.0)) {
        Err(OctreeError::OutOfBounds { x, .. }) => assert_eq!(x, 20.0),
        r => panic!("unexpected: {:?}", r),
    }
    let stats = tree.statistics();
    assert_eq!(stats.total_points, 0);
    assert_eq!(stats.total_nodes, 1);
}

#[test]
fn test_classic_range_query() {
    let aabb = Aabb::new(Point::new(0.0, 0.0, 0.0), Point::new(8.0, 8.0, 8.0));
    let mut tree = ClassicOctree::new(aabb, TreeConfig::default());
    let mut count = 0;
    for x in 0..4 {
        for y in 0..4 {
            for z in 0..4 {
                tree.insert(Point::new(x as f32 * 2.0 + 1.0, y as f32 * 2.0 + 1.0, z as f32 * 2.0 + 1.0)).unwrap();
                count += 1;
            }
        }
    }
    assert_eq!(tree.statistics().total_points, count);
    let mut r = tree.range_query(Point::new(0.0, 0.0, 0.0), Point::new(3.0, 3.0, 1.0));
    r.sort_by(|a, b| (a.x, a.y, a.z).partial_cmp(&(b.x, b.y, b.z)).unwrap());
    assert_eq!(
        r,
        vec![
            Point::new(1.0, 1.0, 1.0),
            Point::new(1.0, 3.0, 1.0),
            Point::new(3.0, 1.0, 1.0),
            Point::new(3.0, 3.0, 1.0),
        ]
    );
    check_partition(&tree, tree.root_key());
}
