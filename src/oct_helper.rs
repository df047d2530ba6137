//! 八叉相关接口
//! 点、包围盒的判定，以及八叉子节点的划分。
//! 子节点编号采用二进制掩码， child&1 == 0 表示x为小，否则为大； child&2 对应y， child&4 对应z。

use nalgebra::Point3;
use parry3d::bounding_volume::Aabb;
use parry3d::math::Real;

/// 点
pub type Point = Point3<Real>;

#[inline]
fn center(aabb: &Aabb) -> Point {
    let two: Real = 2.0;
    Point::new(
        (aabb.mins.x + aabb.maxs.x) / two,
        (aabb.mins.y + aabb.maxs.y) / two,
        (aabb.mins.z + aabb.maxs.z) / two,
    )
}

/// 判断点是否在aabb内，边界上的点也算在内
#[inline]
pub fn contains(aabb: &Aabb, point: &Point) -> bool {
    point.x >= aabb.mins.x
        && point.x <= aabb.maxs.x
        && point.y >= aabb.mins.y
        && point.y <= aabb.maxs.y
        && point.z >= aabb.mins.z
        && point.z <= aabb.maxs.z
}

/// 判断2个aabb是否相交，只有在某一轴上分离才不相交，贴边也算相交
#[inline]
pub fn intersects(a: &Aabb, b: &Aabb) -> bool {
    !(a.maxs.x < b.mins.x
        || a.mins.x > b.maxs.x
        || a.maxs.y < b.mins.y
        || a.mins.y > b.maxs.y
        || a.maxs.z < b.mins.z
        || a.mins.z > b.maxs.z)
}

/// 判断点所在的子节点
/// 大于中心点的轴置位，等于中心点的落在小的一侧
#[inline]
pub fn get_child(point: &Point, aabb: &Aabb) -> usize {
    let c = center(aabb);
    let mut i: usize = 0;
    if point.x > c.x {
        i += 1;
    }
    if point.y > c.y {
        i += 2;
    }
    if point.z > c.z {
        i += 4;
    }
    i
}

/// 指定创建aabb的子节点
pub fn create_child(aabb: &Aabb, index: usize) -> Aabb {
    let c = center(aabb);
    macro_rules! lo {
        ($bit:expr, $c:ident) => {
            if index & $bit != 0 {
                c.$c
            } else {
                aabb.mins.$c
            }
        };
    }
    macro_rules! hi {
        ($bit:expr, $c:ident) => {
            if index & $bit != 0 {
                aabb.maxs.$c
            } else {
                c.$c
            }
        };
    }
    Aabb::new(
        Point::new(lo!(1, x), lo!(2, y), lo!(4, z)),
        Point::new(hi!(1, x), hi!(2, y), hi!(4, z)),
    )
}

/// 创建aabb的子节点集合
pub fn make_childs(aabb: &Aabb) -> [Aabb; 8] {
    let mut i = 0;
    [(); 8].map(|_| {
        let ab = create_child(aabb, i);
        i += 1;
        ab
    })
}

/// 包围盒的8个顶点，顺序为 VTK 六面体的顶点顺序
pub fn corners(aabb: &Aabb) -> [Point; 8] {
    let (a, b) = (&aabb.mins, &aabb.maxs);
    [
        Point::new(a.x, a.y, a.z),
        Point::new(b.x, a.y, a.z),
        Point::new(b.x, b.y, a.z),
        Point::new(a.x, b.y, a.z),
        Point::new(a.x, a.y, b.z),
        Point::new(b.x, a.y, b.z),
        Point::new(b.x, b.y, b.z),
        Point::new(a.x, b.y, b.z),
    ]
}

#[test]
fn test_get_child() {
    let aabb = Aabb::new(Point::new(-10.0, -10.0, -10.0), Point::new(10.0, 10.0, 10.0));
    assert_eq!(get_child(&Point::new(1.0, 1.0, 1.0), &aabb), 7);
    assert_eq!(get_child(&Point::new(-1.0, -1.0, -1.0), &aabb), 0);
    assert_eq!(get_child(&Point::new(1.0, -1.0, -1.0), &aabb), 1);
    assert_eq!(get_child(&Point::new(-1.0, 1.0, -1.0), &aabb), 2);
    assert_eq!(get_child(&Point::new(-1.0, -1.0, 1.0), &aabb), 4);
    // 中心面上的点落在小的一侧，且多次判定结果不变
    for _ in 0..3 {
        assert_eq!(get_child(&Point::new(0.0, 0.0, 0.0), &aabb), 0);
        assert_eq!(get_child(&Point::new(0.0, 5.0, 0.0), &aabb), 2);
    }
}

#[test]
fn test_childs_partition() {
    let aabb = Aabb::new(Point::new(-4.0, 0.0, 2.0), Point::new(4.0, 2.0, 10.0));
    let childs = make_childs(&aabb);
    let mut volume = 0.0;
    for (i, ab) in childs.iter().enumerate() {
        assert_eq!(*ab, create_child(&aabb, i));
        let e = ab.maxs - ab.mins;
        volume += e.x * e.y * e.z;
        // 子节点的中心点一定路由到自己
        assert_eq!(get_child(&center(ab), &aabb), i);
        for (j, other) in childs.iter().enumerate() {
            if i == j {
                continue;
            }
            // 内部不重叠
            let overlap = (ab.maxs.x.min(other.maxs.x) - ab.mins.x.max(other.mins.x)).max(0.0)
                * (ab.maxs.y.min(other.maxs.y) - ab.mins.y.max(other.mins.y)).max(0.0)
                * (ab.maxs.z.min(other.maxs.z) - ab.mins.z.max(other.mins.z)).max(0.0);
            assert_eq!(overlap, 0.0);
        }
    }
    let e = aabb.maxs - aabb.mins;
    assert_eq!(volume, e.x * e.y * e.z);
    assert_eq!(childs[0].mins, aabb.mins);
    assert_eq!(childs[7].maxs, aabb.maxs);
    assert_eq!(childs[7].mins, Point::new(0.0, 1.0, 6.0));
}

#[test]
fn test_contains_intersects() {
    let aabb = Aabb::new(Point::new(0.0, 0.0, 0.0), Point::new(1.0, 1.0, 1.0));
    assert!(contains(&aabb, &Point::new(1.0, 0.0, 0.5)));
    assert!(!contains(&aabb, &Point::new(1.0001, 0.0, 0.5)));
    let touching = Aabb::new(Point::new(1.0, 1.0, 1.0), Point::new(2.0, 2.0, 2.0));
    assert!(intersects(&aabb, &touching));
    let apart = Aabb::new(Point::new(0.0, 0.0, 1.5), Point::new(2.0, 2.0, 2.0));
    assert!(!intersects(&aabb, &apart));
    assert_eq!(corners(&aabb)[6], Point::new(1.0, 1.0, 1.0));
}
