//! 描述文件原始结构
//!
//! 与 YAML 一一对应的反序列化结构，不做语义校验。
//! 语义校验与类型化在 [`crate::builder`] 中完成。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{DescriptorError, Result};

/// 字符串列表 - 支持 YAML 列表或逗号分隔字符串
///
/// `hosts: web, db` 与 `hosts: [web, db]` 等价
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringList {
    One(String),
    Many(Vec<String>),
}

impl Default for StringList {
    fn default() -> Self {
        StringList::Many(Vec::new())
    }
}

impl StringList {
    /// 展开为去除空白的列表 (保留顺序与重复项)
    pub fn to_vec(&self) -> Vec<String> {
        let items: Vec<&str> = match self {
            StringList::One(s) => s.split(',').collect(),
            StringList::Many(v) => v.iter().flat_map(|s| s.split(',')).collect(),
        };

        items
            .into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.to_vec().is_empty()
    }
}

/// 场景描述文件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawDescriptor {
    /// 场景名称
    #[serde(default)]
    pub name: Option<String>,

    /// 场景描述
    #[serde(default)]
    pub description: Option<String>,

    /// 显式声明的组
    #[serde(default)]
    pub groups: Vec<RawGroup>,

    /// 资产 (待供应或静态主机)
    #[serde(default, alias = "assets")]
    pub provision: Vec<RawAsset>,

    /// 编排任务
    #[serde(default)]
    pub orchestrate: Vec<RawTask>,

    /// 执行任务
    #[serde(default)]
    pub execute: Vec<RawTask>,

    /// 报告任务
    #[serde(default)]
    pub report: Vec<RawTask>,
}

/// 显式组声明
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawGroup {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// 显式成员 (可选，与资产自身的 groups 字段取并集)
    #[serde(default)]
    pub members: StringList,
}

/// 资产声明
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAsset {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub groups: StringList,

    /// 供应插件名称，静态主机不填写
    #[serde(default)]
    pub provisioner: Option<String>,

    /// 云平台标识参数 (对引擎不透明)
    #[serde(default)]
    pub provider: Option<Value>,

    #[serde(default)]
    pub labels: StringList,

    // 静态主机连接信息
    #[serde(default)]
    pub ip_address: Option<String>,

    #[serde(default)]
    pub hostname: Option<String>,

    #[serde(default)]
    pub credentials: Option<Map<String, Value>>,

    #[serde(default)]
    pub connection: Option<Map<String, Value>>,

    /// 其余字段原样保留，交给供应插件解释
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// 编排/执行/报告任务声明
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTask {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// 插件名称
    #[serde(default, alias = "orchestrator", alias = "executor", alias = "importer")]
    pub plugin: Option<String>,

    /// 目标 (资产名与组名混合)
    #[serde(default, alias = "hosts")]
    pub targets: StringList,

    /// 是否为必需任务 (默认 true)
    #[serde(default)]
    pub required: Option<bool>,

    /// 是否允许目标为空
    #[serde(default)]
    pub allow_empty: bool,

    /// 插件调用超时 (秒)
    #[serde(default)]
    pub timeout: Option<u64>,

    #[serde(default)]
    pub labels: StringList,

    /// 报告任务引用的执行任务
    #[serde(default)]
    pub executes: StringList,

    /// 清理阶段执行的动作参数
    #[serde(default)]
    pub cleanup: Option<Map<String, Value>>,

    /// 其余字段作为插件参数
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

/// 解析渲染后的描述文件文本
pub fn parse_document(text: &str) -> Result<RawDescriptor> {
    if text.trim().is_empty() {
        return Err(DescriptorError::Syntax("描述文件内容为空".to_string()));
    }

    serde_yaml::from_str(text).map_err(|e| DescriptorError::Syntax(e.to_string()))
}
