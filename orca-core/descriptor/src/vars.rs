//! 变量数据源
//!
//! 每个数据源是一组键值对，按传入顺序合并，键冲突时后面的数据源覆盖前面的。

use serde_json::Value;
use std::path::Path;
use tracing::debug;

use crate::{DescriptorError, Result};

/// 合并后的变量表
pub type VarMap = serde_json::Map<String, Value>;

/// 变量数据源
#[derive(Debug, Clone, PartialEq)]
pub struct VarSource {
    /// 来源描述 (文件路径、"inline"、"env" 等)，用于错误信息
    pub origin: String,

    /// 顶层键值对
    pub values: VarMap,
}

impl VarSource {
    pub fn new(origin: impl Into<String>, values: VarMap) -> Self {
        Self {
            origin: origin.into(),
            values,
        }
    }

    /// 从键值对构建
    pub fn from_pairs<I, K, V>(origin: impl Into<String>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::new(origin, values)
    }

    /// 从 JSON 字符串加载
    pub fn from_json_str(origin: impl Into<String>, json: &str) -> Result<Self> {
        let origin = origin.into();
        let value: Value =
            serde_json::from_str(json).map_err(|e| DescriptorError::vars(&origin, e.to_string()))?;
        Self::from_value(origin, value)
    }

    /// 从 YAML 字符串加载
    pub fn from_yaml_str(origin: impl Into<String>, yaml: &str) -> Result<Self> {
        let origin = origin.into();
        if yaml.trim().is_empty() {
            return Ok(Self::new(origin, VarMap::new()));
        }
        let value: Value =
            serde_yaml::from_str(yaml).map_err(|e| DescriptorError::vars(&origin, e.to_string()))?;
        Self::from_value(origin, value)
    }

    /// 从文件加载 (.json 使用 JSON 解析，其余按 YAML 解析)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let origin = path.display().to_string();
        let content = std::fs::read_to_string(path)?;

        debug!("加载变量文件: {}", origin);

        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            Self::from_json_str(origin, &content)
        } else {
            Self::from_yaml_str(origin, &content)
        }
    }

    /// 解析命令行参数: 已存在的文件路径按文件加载，否则按内联 JSON 解析
    pub fn from_arg(arg: &str) -> Result<Self> {
        let path = Path::new(arg);
        if path.is_file() {
            Self::from_file(path)
        } else {
            Self::from_json_str("inline", arg)
        }
    }

    /// 当前进程环境变量
    pub fn from_env() -> Self {
        Self::from_pairs("env", std::env::vars())
    }

    fn from_value(origin: String, value: Value) -> Result<Self> {
        match value {
            Value::Object(values) => Ok(Self::new(origin, values)),
            Value::Null => Ok(Self::new(origin, VarMap::new())),
            other => Err(DescriptorError::vars(
                origin,
                format!("变量数据必须是键值映射, 实际为: {}", json_type_name(&other)),
            )),
        }
    }
}

/// 按顺序合并数据源，后者覆盖前者
pub fn merge_sources(sources: &[VarSource]) -> VarMap {
    let mut merged = VarMap::new();
    for source in sources {
        for (key, value) in &source.values {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_later_source_overrides_earlier() {
        let sources = vec![
            VarSource::from_pairs("a", [("env", "dev"), ("region", "eu")]),
            VarSource::from_pairs("b", [("env", "prod")]),
        ];

        let merged = merge_sources(&sources);
        assert_eq!(merged["env"], json!("prod"));
        assert_eq!(merged["region"], json!("eu"));
    }

    #[test]
    fn test_empty_sources() {
        assert!(merge_sources(&[]).is_empty());
    }

    #[test]
    fn test_from_yaml_str() {
        let source = VarSource::from_yaml_str("vars.yml", "env: dev\ncount: 3\n").unwrap();
        assert_eq!(source.values["env"], json!("dev"));
        assert_eq!(source.values["count"], json!(3));
    }

    #[test]
    fn test_non_mapping_rejected() {
        let err = VarSource::from_json_str("inline", "[1, 2]").unwrap_err();
        assert!(matches!(err, DescriptorError::Vars { .. }));
        assert!(err.to_string().contains("array"));
    }

    #[test]
    fn test_from_arg_inline_json() {
        let source = VarSource::from_arg(r#"{"env": "qa"}"#).unwrap();
        assert_eq!(source.origin, "inline");
        assert_eq!(source.values["env"], json!("qa"));
    }

    #[test]
    fn test_from_arg_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vars.json");
        std::fs::write(&path, r#"{"env": "staging"}"#).unwrap();

        let source = VarSource::from_arg(path.to_str().unwrap()).unwrap();
        assert_eq!(source.values["env"], json!("staging"));
    }
}
