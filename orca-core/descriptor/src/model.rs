//! 资源模型
//!
//! 由 [`crate::ModelBuilder`] 构建，构建完成后只读。
//! 组只是标签，不拥有资产；组成员关系由解析层按需重建。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// 保留目标关键字，展开为全部资产
pub const ALL_TARGETS: &str = "all";

const MASKED_VALUE: &str = "******";
const SENSITIVE_KEYS: [&str; 4] = ["password", "token", "key", "secret"];

/// 资产连接属性
///
/// 静态资产在加载时即可用；待供应资产由供应阶段写入。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub credentials: Map<String, Value>,

    /// 其他连接变量 (端口、元数据、地址列表等)
    #[serde(default, flatten)]
    pub variables: Map<String, Value>,
}

impl ConnectionAttributes {
    pub fn with_ip(ip_address: impl Into<String>) -> Self {
        Self {
            ip_address: Some(ip_address.into()),
            ..Default::default()
        }
    }

    pub fn with_credential(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.credentials.insert(key.into(), value.into());
        self
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// 可用于连接的地址 (优先 IP)
    pub fn address(&self) -> Option<&str> {
        self.ip_address.as_deref().or(self.hostname.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.ip_address.is_none()
            && self.hostname.is_none()
            && self.credentials.is_empty()
            && self.variables.is_empty()
    }

    /// 敏感字段已脱敏的副本，用于日志与展示
    pub fn masked(&self) -> Self {
        Self {
            ip_address: self.ip_address.clone(),
            hostname: self.hostname.clone(),
            credentials: mask_credentials(&self.credentials),
            variables: mask_credentials(&self.variables),
        }
    }

    /// 转为 JSON 对象 (variables 平铺到顶层)
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// 对键名包含 password/token/key/secret 的字段脱敏 (递归处理嵌套对象)
pub fn mask_credentials(values: &Map<String, Value>) -> Map<String, Value> {
    values
        .iter()
        .map(|(k, v)| {
            let lower = k.to_lowercase();
            let masked = if SENSITIVE_KEYS.iter().any(|s| lower.contains(s)) {
                Value::String(MASKED_VALUE.to_string())
            } else if let Value::Object(inner) = v {
                Value::Object(mask_credentials(inner))
            } else {
                v.clone()
            };
            (k.clone(), masked)
        })
        .collect()
}

/// 资产
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// 所属组 (声明顺序)
    #[serde(default)]
    pub groups: Vec<String>,

    /// 供应插件名称，静态资产为 None
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioner: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<Value>,

    #[serde(default)]
    pub labels: Vec<String>,

    /// 不透明的供应属性
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,

    /// 静态资产的连接属性
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_connection: Option<ConnectionAttributes>,
}

impl Asset {
    pub fn is_provisionable(&self) -> bool {
        self.provisioner.is_some()
    }

    pub fn is_static(&self) -> bool {
        self.static_connection.is_some()
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}

/// 组
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// 在组声明中显式列出的成员
    #[serde(default)]
    pub members: Vec<String>,
}

/// 任务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Orchestrate,
    Execute,
    Report,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [TaskKind::Orchestrate, TaskKind::Execute, TaskKind::Report];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Orchestrate => "orchestrate",
            TaskKind::Execute => "execute",
            TaskKind::Report => "report",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 编排/执行/报告任务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub kind: TaskKind,

    /// 插件名称
    pub plugin: String,

    /// 原始目标列表 (资产名、组名或 all)
    #[serde(default)]
    pub targets: Vec<String>,

    pub required: bool,

    pub allow_empty: bool,

    /// 插件调用超时 (秒)，None 使用全局配置
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(default)]
    pub labels: Vec<String>,

    /// 报告任务引用的执行任务
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub executes: Vec<String>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanup: Option<Map<String, Value>>,
}

impl Task {
    pub fn has_any_label(&self, labels: &[String]) -> bool {
        self.labels.iter().any(|l| labels.contains(l))
    }
}

/// 不可变资源模型
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceModel {
    name: String,
    description: Option<String>,
    assets: Vec<Asset>,
    groups: Vec<Group>,
    orchestrate: Vec<Task>,
    execute: Vec<Task>,
    report: Vec<Task>,
}

impl ResourceModel {
    pub(crate) fn new(
        name: String,
        description: Option<String>,
        assets: Vec<Asset>,
        groups: Vec<Group>,
        tasks: [Vec<Task>; 3],
    ) -> Self {
        let [orchestrate, execute, report] = tasks;
        Self {
            name,
            description,
            assets,
            groups,
            orchestrate,
            execute,
            report,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// 全部资产 (声明顺序)
    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn asset(&self, name: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.name == name)
    }

    /// 全部组 (显式声明在前，其余按资产中首次出现的顺序)
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn is_group(&self, name: &str) -> bool {
        self.group(name).is_some()
    }

    pub fn tasks(&self, kind: TaskKind) -> &[Task] {
        match kind {
            TaskKind::Orchestrate => &self.orchestrate,
            TaskKind::Execute => &self.execute,
            TaskKind::Report => &self.report,
        }
    }

    pub fn task(&self, kind: TaskKind, name: &str) -> Option<&Task> {
        self.tasks(kind).iter().find(|t| t.name == name)
    }

    /// 需要供应的资产 (声明顺序)
    pub fn provisionable_assets(&self) -> Vec<&Asset> {
        self.assets.iter().filter(|a| a.is_provisionable()).collect()
    }

    /// 插件名称集合: (供应插件, 编排类插件)
    pub fn plugin_names(&self) -> (Vec<String>, Vec<String>) {
        let mut seen = HashSet::new();
        let provisioners = self
            .assets
            .iter()
            .filter_map(|a| a.provisioner.clone())
            .filter(|p| seen.insert(p.clone()))
            .collect();

        let mut seen = HashSet::new();
        let orchestrators = TaskKind::ALL
            .iter()
            .flat_map(|k| self.tasks(*k).iter())
            .map(|t| t.plugin.clone())
            .filter(|p| seen.insert(p.clone()))
            .collect();

        (provisioners, orchestrators)
    }

    /// 标签到资源/任务的映射
    ///
    /// 值为 `asset:<name>` 或 `<kind>:<name>` 形式
    pub fn labels(&self) -> BTreeMap<String, Vec<String>> {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for asset in &self.assets {
            for label in &asset.labels {
                map.entry(label.clone())
                    .or_default()
                    .push(format!("asset:{}", asset.name));
            }
        }

        for kind in TaskKind::ALL {
            for task in self.tasks(kind) {
                for label in &task.labels {
                    map.entry(label.clone())
                        .or_default()
                        .push(format!("{}:{}", kind, task.name));
                }
            }
        }

        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mask_credentials() {
        let creds = json!({
            "user": "root",
            "password": "secret",
            "api_token": "abc",
            "ssh": { "private_key": "---", "port": 22 }
        });
        let masked = mask_credentials(creds.as_object().unwrap());

        assert_eq!(masked["user"], "root");
        assert_eq!(masked["password"], MASKED_VALUE);
        assert_eq!(masked["api_token"], MASKED_VALUE);
        assert_eq!(masked["ssh"]["private_key"], MASKED_VALUE);
        assert_eq!(masked["ssh"]["port"], 22);
    }

    #[test]
    fn test_connection_address_prefers_ip() {
        let mut conn = ConnectionAttributes::with_ip("10.0.0.1");
        conn.hostname = Some("h1.local".to_string());
        assert_eq!(conn.address(), Some("10.0.0.1"));

        conn.ip_address = None;
        assert_eq!(conn.address(), Some("h1.local"));
        assert!(!conn.is_empty());
        assert!(ConnectionAttributes::default().is_empty());
    }

    #[test]
    fn test_connection_value_flattens_variables() {
        let conn = ConnectionAttributes::with_ip("10.0.0.1")
            .with_variable("addresses", json!(["10.0.0.1", "192.168.0.1"]))
            .with_credential("password", "pw");

        let value = conn.to_value();
        assert_eq!(value["ip_address"], "10.0.0.1");
        assert_eq!(value["addresses"][1], "192.168.0.1");
        assert_eq!(conn.masked().to_value()["credentials"]["password"], MASKED_VALUE);
    }
}
