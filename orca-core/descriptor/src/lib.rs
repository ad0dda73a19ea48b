//! Orca 描述文件层
//!
//! 负责场景描述文件 (SDF) 的完整加载流程：
//! 1. 合并变量数据源 (后者覆盖前者)
//! 2. 模板渲染 (`{{var}}` 占位符)
//! 3. YAML/JSON 结构解析
//! 4. 构建不可变的资源模型并校验结构约束

pub mod builder;
pub mod document;
pub mod loader;
pub mod model;
pub mod template;
pub mod vars;

pub use builder::{ModelBuilder, NoRequirements, ProviderRequirements};
pub use document::{parse_document, RawAsset, RawDescriptor, RawGroup, RawTask, StringList};
pub use loader::DescriptorLoader;
pub use model::{
    mask_credentials, Asset, ConnectionAttributes, Group, ResourceModel, Task, TaskKind,
    ALL_TARGETS,
};
pub use template::TemplateRenderer;
pub use vars::{merge_sources, VarMap, VarSource};

use thiserror::Error;

/// 描述文件层错误
#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("模板渲染失败: {0}")]
    Template(String),

    #[error("描述文件语法错误: {0}")]
    Syntax(String),

    #[error("描述文件校验失败 [{entity}]: {reason}")]
    Validation { entity: String, reason: String },

    #[error("变量数据加载失败 ({origin}): {reason}")]
    Vars { origin: String, reason: String },

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),
}

impl DescriptorError {
    /// 创建校验错误
    pub fn validation(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        DescriptorError::Validation {
            entity: entity.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn vars(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        DescriptorError::Vars {
            origin: origin.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DescriptorError>;
