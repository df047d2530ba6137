//! 导出为 legacy VTK 文本格式（UNSTRUCTURED_GRID），可直接用 ParaView 打开。
//! 先写所有的点，再写每个节点包围盒的8个顶点；单元依次为每个点一个顶点单元、每个包围盒一个六面体单元。
//! 单元数据 OctreeLevel 记录层，点单元固定为 -1。

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::error::OctreeError;
use crate::oct_helper::corners;
use crate::tree::Traversal;

const VTK_VERTEX: u8 = 1;
const VTK_HEXAHEDRON: u8 = 12;
/// 点单元的层
pub const POINT_LEVEL: i32 = -1;

/// 写入任意输出
pub fn write_vtk<W: Write>(w: &mut W, title: &str, traversal: &Traversal) -> io::Result<()> {
    let points = traversal.points.len();
    let boxes = traversal.boxes.len();

    writeln!(w, "# vtk DataFile Version 3.0")?;
    writeln!(w, "{}", title)?;
    writeln!(w, "ASCII")?;
    writeln!(w, "DATASET UNSTRUCTURED_GRID")?;
    writeln!(w)?;

    writeln!(w, "POINTS {} float", points + boxes * 8)?;
    for p in traversal.points.iter() {
        writeln!(w, "{:.6} {:.6} {:.6}", p.x, p.y, p.z)?;
    }
    for aabb in traversal.boxes.iter() {
        for c in corners(aabb).iter() {
            writeln!(w, "{:.6} {:.6} {:.6}", c.x, c.y, c.z)?;
        }
    }

    let cells = points + boxes;
    // 顶点单元占2个数，六面体占9个数
    writeln!(w)?;
    writeln!(w, "CELLS {} {}", cells, points * 2 + boxes * 9)?;
    for i in 0..points {
        writeln!(w, "1 {}", i)?;
    }
    for i in 0..boxes {
        let s = points + i * 8;
        write!(w, "8")?;
        for j in s..s + 8 {
            write!(w, " {}", j)?;
        }
        writeln!(w)?;
    }

    writeln!(w)?;
    writeln!(w, "CELL_TYPES {}", cells)?;
    for _ in 0..points {
        writeln!(w, "{}", VTK_VERTEX)?;
    }
    for _ in 0..boxes {
        writeln!(w, "{}", VTK_HEXAHEDRON)?;
    }

    writeln!(w)?;
    writeln!(w, "CELL_DATA {}", cells)?;
    writeln!(w, "SCALARS OctreeLevel int 1")?;
    writeln!(w, "LOOKUP_TABLE default")?;
    for _ in 0..points {
        writeln!(w, "{}", POINT_LEVEL)?;
    }
    for layer in traversal.layers.iter() {
        writeln!(w, "{}", layer)?;
    }
    Ok(())
}

/// 写入文件，失败时记录日志并返回错误
pub fn export_vtk(path: &Path, title: &str, traversal: &Traversal) -> Result<(), OctreeError> {
    let to_err = |source: io::Error| {
        log::error!("Could not write {}: {}", path.display(), source);
        OctreeError::Export {
            path: path.to_path_buf(),
            source,
        }
    };
    let file = File::create(path).map_err(to_err)?;
    let mut w = BufWriter::new(file);
    write_vtk(&mut w, title, traversal)
        .and_then(|_| w.flush())
        .map_err(to_err)?;
    log::info!(
        "Octree exported to {} ({} points, {} boxes)",
        path.display(),
        traversal.points.len(),
        traversal.boxes.len()
    );
    Ok(())
}
