//! 点八叉树的公共约定
//! 三种实现（经典、哈希、Morton）编码同一棵逻辑树：叶子存点，超过阈值就按中心点分成八份。
//! 插入、范围查询、统计、导出遍历的行为在三者之间保持一致。

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use parry3d::bounding_volume::Aabb;

use crate::classic::ClassicOctree;
use crate::error::OctreeError;
use crate::hash_tree::HashOctree;
use crate::morton::MAX_DEPTH;
use crate::morton_tree::MortonOctree;
use crate::oct_helper::Point;
use crate::vtk;

/// 叶子默认最多容纳的点数，超过即分裂
pub const MAX_POINTS: usize = 1;
/// 最大深度，到达该层的叶子不再分裂。 等于Morton位置键能表达的最大深度
pub const DEEP_MAX: usize = MAX_DEPTH;

/// 树的分裂策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeConfig {
    max_points: usize,
    deep: usize,
}

impl TreeConfig {
    /// 叶子的点数阈值及深度限制，传0表示使用默认值，深度不会超过 DEEP_MAX
    pub fn new(max_points: usize, deep: usize) -> Self {
        let max_points = if max_points == 0 {
            MAX_POINTS
        } else {
            max_points
        };
        let deep = if deep == 0 || deep > DEEP_MAX {
            DEEP_MAX
        } else {
            deep
        };
        TreeConfig { max_points, deep }
    }

    #[inline]
    pub fn max_points(&self) -> usize {
        self.max_points
    }

    #[inline]
    pub fn deep(&self) -> usize {
        self.deep
    }

    /// 指定层的叶子在容纳count个点时是否应该分裂
    #[inline]
    pub fn should_split(&self, count: usize, layer: usize) -> bool {
        count > self.max_points && layer < self.deep
    }

    /// 叶子到达深度限制后，点数超过阈值也不再分裂
    #[inline]
    pub fn is_saturated(&self, count: usize, layer: usize) -> bool {
        count > self.max_points && layer >= self.deep
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        TreeConfig::new(0, 0)
    }
}

/// 树的统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    pub total_nodes: usize,
    pub leaf_nodes: usize,
    pub total_points: usize,
    /// 根为0
    pub max_depth: usize,
}

impl Statistics {
    /// 累加一个节点
    #[inline]
    pub fn add_node(&mut self, layer: usize, leaf: bool, points: usize) {
        self.total_nodes += 1;
        self.total_points += points;
        if leaf {
            self.leaf_nodes += 1;
        }
        self.max_depth = self.max_depth.max(layer);
    }

    pub fn internal_nodes(&self) -> usize {
        self.total_nodes - self.leaf_nodes
    }

    pub fn average_points_per_leaf(&self) -> f32 {
        if self.leaf_nodes == 0 {
            return 0.0;
        }
        self.total_points as f32 / self.leaf_nodes as f32
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total nodes: {}", self.total_nodes)?;
        writeln!(f, "Leaf nodes: {}", self.leaf_nodes)?;
        writeln!(f, "Internal nodes: {}", self.internal_nodes())?;
        writeln!(f, "Total points: {}", self.total_points)?;
        writeln!(f, "Maximum depth: {}", self.max_depth)?;
        write!(f, "Average points per leaf: {}", self.average_points_per_leaf())
    }
}

/// 先序遍历的结果，供导出使用
#[derive(Debug, Clone, Default)]
pub struct Traversal {
    /// 所有叶子上的点
    pub points: Vec<Point>,
    /// 所有节点的包围盒
    pub boxes: Vec<Aabb>,
    /// 和boxes一一对应的层
    pub layers: Vec<usize>,
}

impl Traversal {
    #[inline]
    pub fn push_node(&mut self, aabb: &Aabb, layer: usize, points: &[Point]) {
        self.boxes.push(*aabb);
        self.layers.push(layer);
        self.points.extend_from_slice(points);
    }
}

/// 八叉树的公共接口
/// 单线程使用，只读操作之间可以并行，但不能和插入并行
pub trait Octree {
    /// 实现的名称
    fn name(&self) -> &'static str;

    /// 根包围盒
    fn aabb(&self) -> &Aabb;

    fn config(&self) -> &TreeConfig;

    /// 插入一个点，根包围盒外的点被丢弃，并返回错误
    fn insert(&mut self, point: Point) -> Result<(), OctreeError>;

    /// 查询包围盒内（含边界）的所有点，无序
    fn range_query(&self, min: Point, max: Point) -> Vec<Point>;

    fn statistics(&self) -> Statistics;

    /// 先序遍历所有节点
    fn traverse(&self) -> Traversal;

    /// 依次插入，被丢弃的点只记录日志，返回被丢弃的数量
    fn load<I: IntoIterator<Item = Point>>(&mut self, points: I) -> usize
    where
        Self: Sized,
    {
        load_points(self, points)
    }

    /// 导出为 legacy VTK 文本格式
    fn export_vtk(&self, path: &Path) -> Result<(), OctreeError> {
        let traversal = self.traverse();
        vtk::export_vtk(path, vtk_title(self.name()), &traversal)
    }
}

/// 依次插入，被丢弃的点只记录日志，返回被丢弃的数量
pub fn load_points<T, I>(tree: &mut T, points: I) -> usize
where
    T: Octree + ?Sized,
    I: IntoIterator<Item = Point>,
{
    points
        .into_iter()
        .filter(|p| tree.insert(*p).is_err())
        .count()
}

/// 检查并记录插入的点是否在根包围盒内
pub(crate) fn check_bounds(aabb: &Aabb, point: &Point) -> Result<(), OctreeError> {
    if crate::oct_helper::contains(aabb, point) {
        return Ok(());
    }
    log::warn!(
        "Point ({}, {}, {}) is outside node bounds",
        point.x,
        point.y,
        point.z
    );
    Err(OctreeError::OutOfBounds {
        x: point.x,
        y: point.y,
        z: point.z,
    })
}

/// 叶子在深度限制处继续追加点时记录日志
pub(crate) fn check_saturated(config: &TreeConfig, count: usize, layer: usize) {
    if config.is_saturated(count, layer) {
        log::debug!(
            "leaf at layer {} is saturated, holding {} points",
            layer,
            count
        );
    }
}

/// 范围查询用的包围盒
#[inline]
pub(crate) fn query_aabb(min: Point, max: Point) -> Aabb {
    Aabb::new(min, max)
}

fn vtk_title(name: &str) -> &'static str {
    match name {
        "hashmap" => "Octree Visualization (HashMap Implementation)",
        "morton" => "Octree Visualization (Morton Implementation)",
        _ => "Octree Visualization",
    }
}

/// 八叉树的实现种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeKind {
    Classic,
    Hashmap,
    Morton,
}

impl TreeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TreeKind::Classic => "classic",
            TreeKind::Hashmap => "hashmap",
            TreeKind::Morton => "morton",
        }
    }
}

impl FromStr for TreeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "classic" => Ok(TreeKind::Classic),
            "hashmap" => Ok(TreeKind::Hashmap),
            "morton" => Ok(TreeKind::Morton),
            _ => Err(format!("invalid tree type: {}", s)),
        }
    }
}

impl fmt::Display for TreeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 构建指定种类的空树
pub fn new_octree(kind: TreeKind, aabb: Aabb, config: TreeConfig) -> Box<dyn Octree> {
    match kind {
        TreeKind::Classic => Box::new(ClassicOctree::new(aabb, config)),
        TreeKind::Hashmap => Box::new(HashOctree::new(aabb, config)),
        TreeKind::Morton => Box::new(MortonOctree::new(aabb, config)),
    }
}

#[test]
fn test_config() {
    let c = TreeConfig::default();
    assert_eq!((c.max_points(), c.deep()), (MAX_POINTS, DEEP_MAX));
    let c = TreeConfig::new(4, 100);
    assert_eq!((c.max_points(), c.deep()), (4, DEEP_MAX));
    let c = TreeConfig::new(0, 3);
    assert!(c.should_split(2, 2));
    assert!(!c.should_split(2, 3));
    assert!(!c.should_split(1, 0));
    assert!(c.is_saturated(2, 3));
    assert!(!c.is_saturated(1, 3));
    assert!(!c.is_saturated(2, 2));
}

#[test]
fn test_statistics() {
    let mut s = Statistics::default();
    assert_eq!(s.average_points_per_leaf(), 0.0);
    s.add_node(0, false, 0);
    s.add_node(1, true, 3);
    s.add_node(1, true, 0);
    s.add_node(2, true, 1);
    assert_eq!(s.internal_nodes(), 1);
    assert_eq!(s.leaf_nodes + s.internal_nodes(), s.total_nodes);
    assert_eq!(s.max_depth, 2);
    assert_eq!(s.average_points_per_leaf(), 4.0 / 3.0);
    let text = s.to_string();
    assert!(text.starts_with("Total nodes: 4\n"));
    assert!(text.contains("Internal nodes: 1\n"));
}

#[test]
fn test_tree_kind() {
    for kind in [TreeKind::Classic, TreeKind::Hashmap, TreeKind::Morton] {
        assert_eq!(kind.as_str().parse::<TreeKind>(), Ok(kind));
        let tree = new_octree(kind, Aabb::new(Point::origin(), Point::new(1.0, 1.0, 1.0)), TreeConfig::default());
        assert_eq!(tree.name(), kind.as_str());
    }
    assert!("quad".parse::<TreeKind>().is_err());
}
