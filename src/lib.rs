//! 点八叉树
//！采用二进制掩码 表达xyz的大小， child&1 == 0 表示x为小，否则为大。
//！同一棵逻辑树有三种存储方式：经典（分裂时一次创建8个子节点，节点放在SlotMap中）、
//！哈希（只创建有点的子节点）、Morton（以位置键为键的平表）。

pub mod classic;
pub mod error;
pub mod hash_tree;
pub mod morton;
pub mod morton_tree;
pub mod oct_helper;
pub mod tree;
pub mod vtk;

pub use classic::*;
pub use error::*;
pub use hash_tree::*;
pub use morton_tree::*;
pub use oct_helper::*;
pub use tree::*;
