//! Orca 目标解析层
//!
//! 将任务的目标列表 (资产名、组名混合) 解析为确定的主机集合，
//! 并基于解析结果构建交给编排后端的清单。

pub mod group_index;
pub mod inventory;
pub mod resolver;

pub use group_index::GroupIndex;
pub use inventory::{Inventory, InventoryBuilder, InventoryGroup, InventoryHost, UNGROUPED};
pub use resolver::{ResolvedTargets, TargetResolver};

use thiserror::Error;

/// 目标解析错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("任务 '{task}' 的目标 '{target}' 不是已声明的资产或组")]
    UnknownTarget { task: String, target: String },

    #[error("任务 '{task}' 的目标解析结果为空")]
    EmptyTarget { task: String },
}

pub type Result<T> = std::result::Result<T, ResolveError>;
