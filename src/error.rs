//! 错误类型

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OctreeError {
    /// 插入的点在根包围盒外，该点被丢弃
    #[error("point ({x}, {y}, {z}) is outside node bounds")]
    OutOfBounds { x: f32, y: f32, z: f32 },

    /// 导出文件无法打开或写入
    #[error("could not write {}: {source}", path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
