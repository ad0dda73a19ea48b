//! 编排清单
//!
//! 每个目标资产一条主机记录 (含连接属性)，每个组一条成员列表。
//! 不属于任何组的资产进入 `ungrouped` 组，保证可单独寻址。

use orca_descriptor::{ConnectionAttributes, ResourceModel};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Write as _;

use crate::resolver::ResolvedTargets;

/// 无组主机所在的组名
pub const UNGROUPED: &str = "ungrouped";

/// 清单主机
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryHost {
    pub name: String,

    /// 所属组 (仅包含本次解析涉及的组)
    pub groups: Vec<String>,

    pub connection: ConnectionAttributes,
}

/// 清单组
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryGroup {
    pub name: String,
    pub hosts: Vec<String>,
}

/// 编排清单
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub hosts: Vec<InventoryHost>,
    pub groups: Vec<InventoryGroup>,
}

impl Inventory {
    pub fn host(&self, name: &str) -> Option<&InventoryHost> {
        self.hosts.iter().find(|h| h.name == name)
    }

    pub fn group(&self, name: &str) -> Option<&InventoryGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn host_names(&self) -> Vec<String> {
        self.hosts.iter().map(|h| h.name.clone()).collect()
    }

    /// 敏感字段脱敏后的副本
    pub fn masked(&self) -> Self {
        Self {
            hosts: self
                .hosts
                .iter()
                .map(|h| InventoryHost {
                    connection: h.connection.masked(),
                    ..h.clone()
                })
                .collect(),
            groups: self.groups.clone(),
        }
    }

    /// 导出为 JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// 导出为 INI 风格的主机清单 (凭据已脱敏)
    ///
    /// ```text
    /// h1 ip_address=10.0.0.1 user=root
    ///
    /// [web]
    /// h1
    /// ```
    pub fn to_ini(&self) -> String {
        let mut out = String::new();

        for host in &self.hosts {
            let _ = writeln!(out, "{}", host_line(host));
        }

        for group in &self.groups {
            let _ = writeln!(out, "\n[{}]", group.name);
            for host in &group.hosts {
                let _ = writeln!(out, "{}", host);
            }
        }

        out
    }
}

fn host_line(host: &InventoryHost) -> String {
    let conn = host.connection.masked();
    let mut parts = vec![host.name.clone()];

    if let Some(ip) = &conn.ip_address {
        parts.push(format!("ip_address={}", ip));
    }
    if let Some(hostname) = &conn.hostname {
        parts.push(format!("hostname={}", hostname));
    }
    for (key, value) in conn.credentials.iter().chain(conn.variables.iter()) {
        parts.push(format!("{}={}", key, ini_value(value)));
    }

    parts.join(" ")
}

fn ini_value(value: &Value) -> String {
    match value {
        Value::String(s) if s.contains(char::is_whitespace) => format!("'{}'", s),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 清单构建器
///
/// 无状态，相同输入得到相同清单
pub struct InventoryBuilder;

impl InventoryBuilder {
    /// 构建清单
    ///
    /// `connections` 为供应阶段写入的连接属性，静态资产使用声明中的属性
    pub fn build(
        model: &ResourceModel,
        resolved: &ResolvedTargets,
        connections: &HashMap<String, ConnectionAttributes>,
    ) -> Inventory {
        let hosts: Vec<InventoryHost> = resolved
            .assets
            .iter()
            .map(|name| {
                let connection = connections
                    .get(name)
                    .cloned()
                    .or_else(|| model.asset(name).and_then(|a| a.static_connection.clone()))
                    .unwrap_or_default();

                let groups = resolved
                    .groups
                    .iter()
                    .filter(|(_, members)| members.contains(name))
                    .map(|(group, _)| group.clone())
                    .collect();

                InventoryHost {
                    name: name.clone(),
                    groups,
                    connection,
                }
            })
            .collect();

        let mut groups: Vec<InventoryGroup> = resolved
            .groups
            .iter()
            .map(|(name, members)| InventoryGroup {
                name: name.clone(),
                hosts: members.clone(),
            })
            .collect();

        let ungrouped: Vec<String> = hosts
            .iter()
            .filter(|h| h.groups.is_empty())
            .map(|h| h.name.clone())
            .collect();
        if !ungrouped.is_empty() {
            // 用户声明了同名组时并入该组，组名保持唯一
            match groups.iter_mut().find(|g| g.name == UNGROUPED) {
                Some(group) => {
                    for host in ungrouped {
                        if !group.hosts.contains(&host) {
                            group.hosts.push(host);
                        }
                    }
                }
                None => groups.push(InventoryGroup {
                    name: UNGROUPED.to_string(),
                    hosts: ungrouped,
                }),
            }
        }

        Inventory { hosts, groups }
    }
}
