//! 插件抽象接口

use async_trait::async_trait;
use orca_descriptor::{Asset, ConnectionAttributes, TaskKind};
use orca_resolver::Inventory;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::BackendResult;

/// 供应插件
///
/// 负责创建与销毁资产，创建成功后返回连接属性
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// 插件名称 (注册键)
    fn name(&self) -> &str;

    /// 插件版本
    fn version(&self) -> &str;

    /// 资产声明是否必须包含 provider 属性
    fn requires_provider(&self) -> bool {
        false
    }

    /// 创建资产
    async fn create(&self, asset: &Asset) -> BackendResult<ConnectionAttributes>;

    /// 销毁资产
    async fn delete(&self, asset: &Asset) -> BackendResult<()>;
}

/// 编排插件
///
/// 编排、执行、报告任务都通过该接口调用
#[async_trait]
pub trait Orchestrator: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// 执行任务动作
    async fn run(&self, invocation: &TaskInvocation, inventory: &Inventory) -> BackendResult<ActionResult>;
}

/// 一次任务调用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInvocation {
    /// 任务名称
    pub name: String,

    pub kind: TaskKind,

    /// 是否为清理动作
    #[serde(default)]
    pub cleanup: bool,

    /// 已完成数据注入的参数
    pub params: Map<String, Value>,

    /// 解析后的目标主机
    pub hosts: Vec<String>,

    /// 附加上下文 (报告任务携带所引用执行任务的状态)
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl TaskInvocation {
    pub fn new(name: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            name: name.into(),
            kind,
            cleanup: false,
            params: Map::new(),
            hosts: Vec::new(),
            context: Map::new(),
        }
    }

    /// 读取字符串参数
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}

/// 动作结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    /// 后端输出
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ActionResult {
    pub fn with_output(output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
        }
    }
}
