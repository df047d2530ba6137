//! Morton编码（Z序）
//! 每轴21位的格子坐标交错成一个u64，每3位一组，组内 bit0 为x， bit1 为y， bit2 为z，正好是八叉子节点的编号。
//! 位置键在编码前加一个哨兵位： 1 << 3d | code，根为1，右移3位即得到父节点的键。

use parry3d::bounding_volume::Aabb;

use crate::oct_helper::{create_child, get_child, Point};

/// 可编码的最大深度
pub const MAX_DEPTH: usize = 21;
/// 根节点的位置键
pub const ROOT_KEY: u64 = 1;

const CELL_MAX: u64 = (1 << MAX_DEPTH) - 1;

/// 将21位整数的每一位展开到每3位中的最低位
#[inline]
fn spread_bits(x: u32) -> u64 {
    let mut x = x as u64 & CELL_MAX;
    x = (x | (x << 32)) & 0x1f00000000ffff;
    x = (x | (x << 16)) & 0x1f0000ff0000ff;
    x = (x | (x << 8)) & 0x100f00f00f00f00f;
    x = (x | (x << 4)) & 0x10c30c30c30c30c3;
    x = (x | (x << 2)) & 0x1249249249249249;
    x
}

/// spread_bits 的逆运算
#[inline]
fn compact_bits(x: u64) -> u32 {
    let mut x = x & 0x1249249249249249;
    x = (x | (x >> 2)) & 0x10c30c30c30c30c3;
    x = (x | (x >> 4)) & 0x100f00f00f00f00f;
    x = (x | (x >> 8)) & 0x1f0000ff0000ff;
    x = (x | (x >> 16)) & 0x1f00000000ffff;
    x = (x | (x >> 32)) & CELL_MAX;
    x as u32
}

/// 交错3个轴的格子坐标，每轴最多21位
#[inline]
pub fn encode(x: u32, y: u32, z: u32) -> u64 {
    spread_bits(x) | (spread_bits(y) << 1) | (spread_bits(z) << 2)
}

/// 还原3个轴的格子坐标
#[inline]
pub fn decode(code: u64) -> (u32, u32, u32) {
    (compact_bits(code), compact_bits(code >> 1), compact_bits(code >> 2))
}

/// 指定深度的格子坐标的位置键
#[inline]
pub fn location_key(x: u32, y: u32, z: u32, depth: usize) -> u64 {
    (1u64 << (3 * depth)) | encode(x, y, z)
}

/// 位置键所在的深度
#[inline]
pub fn key_depth(key: u64) -> usize {
    (63 - key.leading_zeros() as usize) / 3
}

/// 父节点的位置键
#[inline]
pub fn parent(key: u64) -> u64 {
    key >> 3
}

/// 向上k层的祖先位置键
#[inline]
pub fn ancestor(key: u64, k: usize) -> u64 {
    key >> (3 * k)
}

/// 子节点的位置键
#[inline]
pub fn child(key: u64, octant: usize) -> u64 {
    (key << 3) | octant as u64
}

/// 位置键的最后一段，即在父节点中的子节点编号
#[inline]
pub fn octant(key: u64) -> usize {
    (key & 7) as usize
}

/// 位置键对应的格子坐标及深度
pub fn decode_key(key: u64) -> (u32, u32, u32, usize) {
    let depth = key_depth(key);
    let (x, y, z) = decode(key ^ (1u64 << (3 * depth)));
    (x, y, z, depth)
}

/// 计算点在根包围盒内最深一层的位置键
/// 逐层用 get_child 路由并划分包围盒，和 key_aabb 及其它实现的划分完全一致
pub fn point_key(root: &Aabb, point: &Point) -> u64 {
    let mut key = ROOT_KEY;
    let mut aabb = *root;
    for _ in 0..MAX_DEPTH {
        let i = get_child(point, &aabb);
        key = child(key, i);
        aabb = create_child(&aabb, i);
    }
    key
}

/// 由位置键推出节点的包围盒，从根开始逐段划分
pub fn key_aabb(root: &Aabb, key: u64) -> Aabb {
    let depth = key_depth(key);
    let mut aabb = *root;
    for layer in (0..depth).rev() {
        aabb = create_child(&aabb, octant(key >> (3 * layer)));
    }
    aabb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oct_helper::contains;

    #[test]
    fn test_interleave() {
        assert_eq!(encode(0, 0, 0), 0);
        assert_eq!(encode(1, 0, 0), 1);
        assert_eq!(encode(0, 1, 0), 2);
        assert_eq!(encode(0, 0, 1), 4);
        assert_eq!(encode(1, 1, 1), 7);
        // 高位的层在高位
        assert_eq!(encode(2, 0, 1), 0b001_100);
        let max = CELL_MAX as u32;
        assert_eq!(decode(encode(max, 0, max)), (max, 0, max));
        assert_eq!(decode(encode(123456, 7, 2097150)), (123456, 7, 2097150));
    }

    #[test]
    fn test_location_key() {
        assert_eq!(location_key(0, 0, 0, 0), ROOT_KEY);
        let key = location_key(5, 3, 6, 3);
        assert_eq!(key_depth(key), 3);
        assert_eq!(decode_key(key), (5, 3, 6, 3));
        // 右移3位 = 上一层
        assert_eq!(parent(key), location_key(2, 1, 3, 2));
        assert_eq!(ancestor(key, 2), location_key(1, 0, 1, 1));
        assert_eq!(ancestor(key, 3), ROOT_KEY);
        assert_eq!(parent(child(key, 6)), key);
        assert_eq!(octant(child(key, 6)), 6);
        let deepest = location_key(CELL_MAX as u32, CELL_MAX as u32, CELL_MAX as u32, MAX_DEPTH);
        assert_eq!(deepest, u64::MAX);
        assert_eq!(key_depth(deepest), MAX_DEPTH);
    }

    #[test]
    fn test_point_key_matches_router() {
        let root = Aabb::new(Point::new(-10.0, -10.0, -10.0), Point::new(10.0, 10.0, 10.0));
        let points = [
            Point::new(0.0, 0.0, 0.0),
            Point::new(1.0, 1.0, 1.0),
            Point::new(-10.0, 10.0, -10.0),
            Point::new(5.0, -5.0, 2.5),
            Point::new(-3.3, 7.1, 9.99),
        ];
        for p in points.iter() {
            let key = point_key(&root, p);
            let mut aabb = root;
            for layer in 1..=MAX_DEPTH {
                let k = ancestor(key, MAX_DEPTH - layer);
                let i = get_child(p, &aabb);
                assert_eq!(octant(k), i, "point {:?} layer {}", p, layer);
                aabb = create_child(&aabb, i);
                assert_eq!(key_aabb(&root, k), aabb);
            }
        }
    }

    #[test]
    fn test_point_key_inside_box() {
        // 边长不是二进制小数的根包围盒
        let root = Aabb::new(Point::new(0.1, 0.1, 0.1), Point::new(0.7, 0.7, 0.7));
        let points = [
            Point::new(0.49056515, 0.5110243, 0.26266232),
            Point::new(0.4, 0.4, 0.4),
            Point::new(0.1, 0.7, 0.3),
            Point::new(0.69999, 0.123456, 0.55555),
        ];
        for p in points.iter() {
            let key = point_key(&root, p);
            assert_eq!(key_depth(key), MAX_DEPTH);
            for k in 0..=MAX_DEPTH {
                assert!(contains(&key_aabb(&root, ancestor(key, k)), p), "point {:?} up {}", p, k);
            }
        }
    }

    #[test]
    fn test_flat_axis() {
        let root = Aabb::new(Point::new(0.0, 0.0, 1.0), Point::new(4.0, 4.0, 1.0));
        let key = point_key(&root, &Point::new(3.0, 1.0, 1.0));
        let (_, _, z, _) = decode_key(key);
        assert_eq!(z, 0);
    }
}
