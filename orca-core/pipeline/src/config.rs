//! 流水线配置管理
//!
//! 支持从多个源加载配置:
//! - 环境变量 (优先级最高)
//! - 配置文件 (TOML/YAML/JSON)
//! - 默认值 (优先级最低)
//!
//! 配置文件搜索路径 (按优先级):
//! 1. `ORCA_CONFIG` 环境变量指定的路径
//! 2. `./orca.toml`、`./orca.yaml`、`./orca.json` (当前目录)
//! 3. `~/.config/orca/config.toml` (用户配置目录)
//! 4. `/etc/orca/config.toml` (系统配置目录)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::phase::Phase;

// ============================================
// 核心配置结构
// ============================================

/// 流水线配置 (顶层)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 执行配置
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// 选择配置 (标签、阶段、任务)
    #[serde(default)]
    pub selection: SelectionConfig,

    /// 模板配置
    #[serde(default)]
    pub template: TemplateConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 执行配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// 单次插件调用超时 (秒)
    #[serde(default = "default_plugin_timeout")]
    pub plugin_timeout: u64,

    /// 同一阶段最大并发任务数
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// 是否允许不相交的任务并发执行
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

/// 选择配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// 只运行带有这些标签之一的资源/任务
    #[serde(default)]
    pub labels: Vec<String>,

    /// 跳过带有这些标签之一的资源/任务
    #[serde(default)]
    pub skip_labels: Vec<String>,

    /// 要运行的阶段，为空表示全部
    #[serde(default)]
    pub phases: Vec<Phase>,

    /// 要运行的任务名称，为空表示全部
    #[serde(default)]
    pub tasks: Vec<String>,
}

/// 模板配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// 是否将进程环境变量作为最后一个变量数据源
    #[serde(default = "default_include_env")]
    pub include_env: bool,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ============================================
// 默认值函数
// ============================================

fn default_plugin_timeout() -> u64 {
    1800
}
fn default_max_concurrent() -> usize {
    10
}
fn default_parallel() -> bool {
    true
}
fn default_include_env() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            plugin_timeout: default_plugin_timeout(),
            max_concurrent: default_max_concurrent(),
            parallel: default_parallel(),
        }
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            include_env: default_include_env(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================
// 加载与校验
// ============================================

impl PipelineConfig {
    /// 从多个源加载配置 (优先级: 环境变量 > 配置文件 > 默认值)
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                tracing::debug!("加载配置文件: {:?}", path);
                Self::load_from_file(&path)?
            }
            None => {
                tracing::debug!("未找到配置文件, 使用默认配置");
                Self::default()
            }
        };

        config.apply_env_vars()?;

        Ok(config)
    }

    /// 从指定文件加载配置
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {:?}", path))?;

        let config = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => toml::from_str(&content)
                .with_context(|| format!("解析 TOML 配置失败: {:?}", path))?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .with_context(|| format!("解析 YAML 配置失败: {:?}", path))?,
            Some("json") => serde_json::from_str(&content)
                .with_context(|| format!("解析 JSON 配置失败: {:?}", path))?,
            _ => anyhow::bail!("不支持的配置文件格式: {:?}", path),
        };

        Ok(config)
    }

    /// 从指定路径字符串加载配置，并应用环境变量覆盖
    pub fn load_from_path(path: &str) -> Result<Self> {
        let mut config = Self::load_from_file(Path::new(path))?;
        config.apply_env_vars()?;
        Ok(config)
    }

    /// 查找配置文件 (按优先级搜索)
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(path) = env::var("ORCA_CONFIG") {
            let p = PathBuf::from(path);
            if p.exists() {
                return Some(p);
            }
        }

        let mut candidates = vec![
            PathBuf::from("./orca.toml"),
            PathBuf::from("./orca.yaml"),
            PathBuf::from("./orca.json"),
        ];

        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".config/orca/config.toml"));
            candidates.push(home.join(".config/orca/config.yaml"));
        }

        #[cfg(target_os = "linux")]
        candidates.push(PathBuf::from("/etc/orca/config.toml"));

        candidates.into_iter().find(|p| p.exists())
    }

    /// 从环境变量覆盖配置
    fn apply_env_vars(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(level) = lookup("ORCA_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(timeout) = lookup("ORCA_PLUGIN_TIMEOUT") {
            self.execution.plugin_timeout = timeout
                .parse()
                .context("ORCA_PLUGIN_TIMEOUT 取值无效")?;
        }
        if let Some(max) = lookup("ORCA_MAX_CONCURRENT") {
            self.execution.max_concurrent = max
                .parse()
                .context("ORCA_MAX_CONCURRENT 取值无效")?;
        }
        if let Some(parallel) = lookup("ORCA_PARALLEL") {
            self.execution.parallel = parallel.parse().unwrap_or(default_parallel());
        }
        if let Some(labels) = lookup("ORCA_LABELS") {
            self.selection.labels = split_list(&labels);
        }
        if let Some(labels) = lookup("ORCA_SKIP_LABELS") {
            self.selection.skip_labels = split_list(&labels);
        }

        Ok(())
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        if !self.selection.labels.is_empty() && !self.selection.skip_labels.is_empty() {
            anyhow::bail!("labels 与 skip_labels 不能同时指定");
        }
        if self.execution.plugin_timeout == 0 {
            anyhow::bail!("plugin_timeout 必须大于 0");
        }
        if self.execution.max_concurrent == 0 {
            anyhow::bail!("max_concurrent 必须大于 0");
        }

        Ok(())
    }

    /// 插件调用默认超时
    pub fn plugin_timeout(&self) -> Duration {
        Duration::from_secs(self.execution.plugin_timeout)
    }

    /// 同一阶段可同时运行的任务数
    pub fn worker_limit(&self) -> usize {
        if self.execution.parallel {
            self.execution.max_concurrent.max(1)
        } else {
            1
        }
    }

    /// 阶段是否被选中
    pub fn runs_phase(&self, phase: Phase) -> bool {
        phase == Phase::Load
            || self.selection.phases.is_empty()
            || self.selection.phases.contains(&phase)
    }

    /// 按标签判断资源/任务是否被选中
    pub fn selects_labels(&self, labels: &[String]) -> bool {
        if !self.selection.labels.is_empty() {
            return labels.iter().any(|l| self.selection.labels.contains(l));
        }
        !labels.iter().any(|l| self.selection.skip_labels.contains(l))
    }

    /// 按名称判断任务是否被选中
    pub fn selects_task(&self, name: &str) -> bool {
        self.selection.tasks.is_empty() || self.selection.tasks.iter().any(|t| t == name)
    }
}

/// 拆分逗号分隔的列表
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.execution.plugin_timeout, 1800);
        assert_eq!(config.execution.max_concurrent, 10);
        assert!(config.execution.parallel);
        assert!(config.template.include_env);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = PipelineConfig::default();

        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("plugin_timeout = 1800"));

        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"max_concurrent\": 10"));

        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("level: info"));
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orca.toml");
        fs::write(
            &path,
            "[execution]\nmax_concurrent = 2\n\n[selection]\nphases = [\"provision\", \"cleanup\"]\n",
        )
        .unwrap();

        let config = PipelineConfig::load_from_file(&path).unwrap();
        assert_eq!(config.execution.max_concurrent, 2);
        assert_eq!(config.execution.plugin_timeout, 1800);
        assert!(config.runs_phase(Phase::Provision));
        assert!(!config.runs_phase(Phase::Execute));
        assert!(config.runs_phase(Phase::Load));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orca.ini");
        fs::write(&path, "x").unwrap();
        assert!(PipelineConfig::load_from_file(&path).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ORCA_LOG_LEVEL", "debug"),
            ("ORCA_PLUGIN_TIMEOUT", "60"),
            ("ORCA_PARALLEL", "false"),
            ("ORCA_LABELS", "smoke, base"),
        ]
        .into_iter()
        .collect();

        let mut config = PipelineConfig::default();
        config
            .apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.plugin_timeout(), Duration::from_secs(60));
        assert_eq!(config.worker_limit(), 1);
        assert_eq!(config.selection.labels, vec!["smoke", "base"]);
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = PipelineConfig::default();
        let result = config.apply_overrides(|k| (k == "ORCA_MAX_CONCURRENT").then(|| "many".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = PipelineConfig::default();
        config.selection.labels = vec!["a".to_string()];
        config.selection.skip_labels = vec!["b".to_string()];
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.execution.max_concurrent = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.execution.plugin_timeout = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_label_selection() {
        let mut config = PipelineConfig::default();
        let tagged = vec!["smoke".to_string()];
        assert!(config.selects_labels(&tagged));
        assert!(config.selects_labels(&[]));

        config.selection.labels = vec!["smoke".to_string()];
        assert!(config.selects_labels(&tagged));
        assert!(!config.selects_labels(&[]));

        config.selection.labels.clear();
        config.selection.skip_labels = vec!["smoke".to_string()];
        assert!(!config.selects_labels(&tagged));
        assert!(config.selects_labels(&[]));
    }
}
