//! 任务参数数据注入
//!
//! 字符串参数中的 `{ <资产>.<路径> }` 在调用插件前替换为资产属性值，
//! 例如 `{ h1.ip_address }`、`{ h1.metadata.role }`、`{ h1.addresses[1] }`。
//! JSONPath 形式的表达式 (`{.a}`、`{$..x}`、`{ range .items }`) 保持原样。

use orca_descriptor::{ConnectionAttributes, ResourceModel};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

const EXPRESSION: &str = r"\{\s*([A-Za-z0-9_][\w-]*)((?:\.[A-Za-z_][\w-]*|\[\d+\])+)\s*\}";
const SEGMENT: &str = r"\.([A-Za-z_][\w-]*)|\[(\d+)\]";

/// 数据注入错误
#[derive(Error, Debug, Clone, PartialEq)]
#[error("数据注入失败 '{expression}': {reason}")]
pub struct InjectError {
    pub expression: String,
    pub reason: String,
}

impl InjectError {
    fn new(expression: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            reason: reason.into(),
        }
    }
}

/// 数据注入器
pub struct DataInjector {
    expression: Regex,
    segment: Regex,
    assets: HashMap<String, Value>,
}

impl DataInjector {
    /// 基于资源模型与当前连接属性构建
    ///
    /// 每个资产的可见属性 = 供应属性 + name/groups + 连接属性 (后者覆盖前者)
    pub fn new(
        model: &ResourceModel,
        connections: &HashMap<String, ConnectionAttributes>,
    ) -> Result<Self, InjectError> {
        let expression =
            Regex::new(EXPRESSION).map_err(|e| InjectError::new(EXPRESSION, e.to_string()))?;
        let segment = Regex::new(SEGMENT).map_err(|e| InjectError::new(SEGMENT, e.to_string()))?;

        let assets = model
            .assets()
            .iter()
            .map(|asset| {
                let mut view = asset.attributes.clone();
                view.insert("name".to_string(), Value::String(asset.name.clone()));
                view.insert(
                    "groups".to_string(),
                    Value::Array(asset.groups.iter().cloned().map(Value::String).collect()),
                );
                if let Some(Value::Object(conn)) = connections.get(&asset.name).map(|c| c.to_value()) {
                    view.extend(conn);
                }
                (asset.name.clone(), Value::Object(view))
            })
            .collect();

        Ok(Self {
            expression,
            segment,
            assets,
        })
    }

    /// 对参数表递归注入
    pub fn inject(&self, params: &Map<String, Value>) -> Result<Map<String, Value>, InjectError> {
        let mut injected = Map::with_capacity(params.len());
        for (key, value) in params {
            injected.insert(key.clone(), self.inject_value(value)?);
        }
        Ok(injected)
    }

    fn inject_value(&self, value: &Value) -> Result<Value, InjectError> {
        match value {
            Value::String(s) => self.inject_str(s),
            Value::Array(items) => items
                .iter()
                .map(|v| self.inject_value(v))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => self.inject(map).map(Value::Object),
            other => Ok(other.clone()),
        }
    }

    /// 注入单个字符串
    ///
    /// 整个字符串恰好是一个表达式时保留属性的原始类型，否则按文本替换
    pub fn inject_str(&self, text: &str) -> Result<Value, InjectError> {
        if let Some(caps) = self.expression.captures(text) {
            if caps.get(0).map(|m| m.as_str()) == Some(text.trim()) {
                return self.lookup(&caps[0], &caps[1], &caps[2]);
            }
        }

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in self.expression.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&text[last..whole.start()]);
            match self.lookup(whole.as_str(), &caps[1], &caps[2])? {
                Value::String(s) => out.push_str(&s),
                other => out.push_str(&other.to_string()),
            }
            last = whole.end();
        }
        out.push_str(&text[last..]);

        Ok(Value::String(out))
    }

    fn lookup(&self, expression: &str, asset: &str, path: &str) -> Result<Value, InjectError> {
        let mut current = self
            .assets
            .get(asset)
            .ok_or_else(|| InjectError::new(expression, format!("资产 '{}' 未声明", asset)))?;

        for seg in self.segment.captures_iter(path) {
            let next = match (seg.get(1), seg.get(2)) {
                (Some(key), _) => current.get(key.as_str()),
                (None, Some(index)) => index
                    .as_str()
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| current.get(i)),
                (None, None) => None,
            };
            current = next.ok_or_else(|| {
                InjectError::new(expression, format!("路径 '{}' 不存在", seg.get(0).map_or("", |m| m.as_str())))
            })?;
        }

        Ok(current.clone())
    }
}
