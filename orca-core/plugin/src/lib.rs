//! Orca 插件层
//!
//! 供应插件 (Provisioner) 与编排插件 (Orchestrator) 是引擎唯一的扩展点。
//! 注册表在启动时按名称登记插件实例，调度器通过 [`Dispatcher`] 调用，
//! 调用带超时，后端错误统一转换为 [`PluginError`] 并保留原始诊断信息。

pub mod dispatch;
pub mod local;
pub mod registry;
pub mod traits;

pub use dispatch::Dispatcher;
pub use local::LocalShellOrchestrator;
pub use registry::PluginRegistry;
pub use traits::{ActionResult, Orchestrator, Provisioner, TaskInvocation};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 插件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    Provisioner,
    Orchestrator,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginKind::Provisioner => write!(f, "供应"),
            PluginKind::Orchestrator => write!(f, "编排"),
        }
    }
}

/// 插件层错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PluginError {
    #[error("{kind}插件 '{name}' 未注册")]
    UnknownPlugin { kind: PluginKind, name: String },

    #[error("{kind}插件 '{name}' 已注册")]
    AlreadyRegistered { kind: PluginKind, name: String },

    #[error("资源 '{resource}' 供应操作失败: {message}")]
    Provision {
        resource: String,
        message: String,
        /// 不可恢复的失败，调度器需要取消其余供应操作
        fatal: bool,
    },

    #[error("任务 '{task}' 执行失败: {message}")]
    Orchestration { task: String, message: String },

    #[error("插件调用超时: {target} ({seconds}s)")]
    Timeout { target: String, seconds: u64 },
}

impl PluginError {
    /// 是否为不可恢复的供应失败
    pub fn is_fatal(&self) -> bool {
        matches!(self, PluginError::Provision { fatal: true, .. })
    }
}

pub type Result<T> = std::result::Result<T, PluginError>;

/// 插件实现返回的错误
///
/// 实现内部可以使用 `anyhow`，通过 `?` 自动转换为 `Failed`
#[derive(Error, Debug)]
pub enum BackendError {
    /// 普通失败，只影响当前资源/任务
    #[error("{0}")]
    Failed(String),

    /// 不可恢复的失败 (如配额耗尽、凭据失效)
    #[error("{0}")]
    Unrecoverable(String),
}

impl From<anyhow::Error> for BackendError {
    fn from(err: anyhow::Error) -> Self {
        BackendError::Failed(format!("{:#}", err))
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::Failed(err.to_string())
    }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;
