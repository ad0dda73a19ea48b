//! Orca 流水线
//!
//! 按 LOAD → PROVISION → ORCHESTRATE → EXECUTE → REPORT → CLEANUP 的顺序
//! 驱动插件，汇总每个资源/任务的结果，给出最终状态与退出码。

pub mod config;
pub mod connections;
pub mod inject;
pub mod phase;
pub mod report;
pub mod scheduler;

pub use config::{ExecutionConfig, LoggingConfig, PipelineConfig, SelectionConfig, TemplateConfig};
pub use connections::ConnectionStore;
pub use inject::{DataInjector, InjectError};
pub use phase::Phase;
pub use report::{PhaseReport, PhaseStatus, RunResult, RunStatus, TaskReport, TaskStatus};
pub use scheduler::Pipeline;

use orca_descriptor::DescriptorError;
use orca_plugin::PluginError;
use thiserror::Error;

/// 退出码
pub mod exit_code {
    pub const SUCCEEDED: i32 = 0;
    pub const FAILED: i32 = 1;
    pub const TEMPLATE: i32 = 2;
    pub const SYNTAX: i32 = 3;
    pub const VALIDATION: i32 = 4;
    pub const UNKNOWN_PLUGIN: i32 = 5;
    pub const USAGE: i32 = 6;
}

/// 加载阶段的致命错误
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error("配置错误: {0}")]
    Config(String),
}

impl EngineError {
    /// 对应的进程退出码
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::Descriptor(DescriptorError::Template(_)) => exit_code::TEMPLATE,
            EngineError::Descriptor(DescriptorError::Syntax(_)) => exit_code::SYNTAX,
            EngineError::Descriptor(DescriptorError::Validation { .. }) => exit_code::VALIDATION,
            EngineError::Descriptor(_) => exit_code::USAGE,
            EngineError::Plugin(PluginError::UnknownPlugin { .. }) => exit_code::UNKNOWN_PLUGIN,
            EngineError::Plugin(_) => exit_code::FAILED,
            EngineError::Config(_) => exit_code::USAGE,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
