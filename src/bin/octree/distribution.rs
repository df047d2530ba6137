//! 测试用的点分布

use clap::ValueEnum;
use parry3d::bounding_volume::Aabb;
use rand::Rng;

use pi_octree::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Distribution {
    /// Random points in 3D space
    Random,
    /// Points in a regular 3D grid
    Grid,
    /// Points in a 3D spiral pattern
    Spiral,
}

impl Distribution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Distribution::Random => "random",
            Distribution::Grid => "grid",
            Distribution::Spiral => "spiral",
        }
    }

    pub fn generate<R: Rng>(&self, rng: &mut R, count: usize, aabb: &Aabb) -> Vec<Point> {
        match self {
            Distribution::Random => random_points(rng, count, aabb),
            Distribution::Grid => grid_points((count as f64).cbrt() as usize, aabb),
            Distribution::Spiral => spiral_points(count, aabb),
        }
    }
}

/// 包围盒内均匀分布的随机点
pub fn random_points<R: Rng>(rng: &mut R, count: usize, aabb: &Aabb) -> Vec<Point> {
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

/// 每边per_side个点的规则网格，少于2个时只有最小角一个点
pub fn grid_points(per_side: usize, aabb: &Aabb) -> Vec<Point> {
    if per_side == 0 {
        return Vec::new();
    }
    let step = if per_side < 2 {
        (aabb.maxs - aabb.mins) * 0.0
    } else {
        (aabb.maxs - aabb.mins) / (per_side - 1) as f32
    };
    let mut points = Vec::with_capacity(per_side * per_side * per_side);
    for x in 0..per_side {
        for y in 0..per_side {
            for z in 0..per_side {
                points.push(Point::new(
                    aabb.mins.x + x as f32 * step.x,
                    aabb.mins.y + y as f32 * step.y,
                    aabb.mins.z + z as f32 * step.z,
                ));
            }
        }
    }
    points
}

/// 绕z轴的螺旋线，半径逐渐收缩，z逐渐升高，点多时会超出包围盒
pub fn spiral_points(count: usize, aabb: &Aabb) -> Vec<Point> {
    let center = nalgebra::center(&aabb.mins, &aabb.maxs);
    let e = aabb.maxs - aabb.mins;
    let radius = e.x.min(e.y).min(e.z) / 2.0;
    (0..count)
        .map(|i| {
            let t = i as f32 * 0.1;
            let r = radius * (1.0 - i as f32 / count as f32);
            Point::new(center.x + r * t.cos(), center.y + r * t.sin(), center.z + t * 0.1)
        })
        .collect()
}
