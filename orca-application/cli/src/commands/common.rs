//! 公共工具函数模块
//!
//! 提供各命令模块共享的功能，包括：
//! - 配置加载与命令行参数合并
//! - 场景文件与模板变量读取
//! - 插件注册表与流水线创建

use anyhow::{Context, Result};
use orca_descriptor::VarSource;
use orca_pipeline::{config::split_list, Phase, Pipeline, PipelineConfig};
use orca_plugin::PluginRegistry;
use std::fs;
use std::sync::Arc;
use tracing::debug;

use crate::ScenarioArgs;

/// 加载配置: 指定路径优先，否则按默认搜索路径
pub fn load_config(path: Option<&str>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load_from_path(path),
        None => PipelineConfig::load(),
    }
}

/// 将场景参数中的标签选择合并到配置
pub fn apply_scenario_args(config: &mut PipelineConfig, args: &ScenarioArgs) {
    if let Some(labels) = &args.labels {
        config.selection.labels = split_list(labels);
        config.selection.skip_labels.clear();
    }
    if let Some(labels) = &args.skip_labels {
        config.selection.skip_labels = split_list(labels);
        config.selection.labels.clear();
    }
}

/// 解析阶段名称，LOAD 总会执行因此不可选择
pub fn parse_phases(names: &[String]) -> Result<Vec<Phase>> {
    let mut phases = Vec::new();
    for name in names.iter().flat_map(|n| split_list(n)) {
        let phase: Phase = name.parse().map_err(anyhow::Error::msg)?;
        if !Phase::SELECTABLE.contains(&phase) {
            anyhow::bail!("阶段 {} 不可选择", phase);
        }
        if !phases.contains(&phase) {
            phases.push(phase);
        }
    }
    Ok(phases)
}

/// 读取场景文件与模板变量
pub fn read_scenario(args: &ScenarioArgs) -> Result<(String, Vec<VarSource>)> {
    let text = fs::read_to_string(&args.scenario)
        .with_context(|| format!("读取场景文件失败: {}", args.scenario))?;

    let sources = args
        .vars_data
        .iter()
        .map(|arg| VarSource::from_arg(arg).with_context(|| format!("无效的模板变量: {}", arg)))
        .collect::<Result<Vec<_>>>()?;
    debug!("模板变量来源: {} 个", sources.len());

    Ok((text, sources))
}

/// 创建插件注册表 (内置插件)
pub fn build_registry() -> PluginRegistry {
    PluginRegistry::with_builtins()
}

/// 校验配置并创建流水线
pub fn build_pipeline(config: PipelineConfig) -> Result<Pipeline> {
    config.validate().context("配置无效")?;
    Ok(Pipeline::new(Arc::new(build_registry()), config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(labels: Option<&str>, skip: Option<&str>) -> ScenarioArgs {
        ScenarioArgs {
            scenario: "demo.yaml".to_string(),
            vars_data: Vec::new(),
            labels: labels.map(str::to_string),
            skip_labels: skip.map(str::to_string),
        }
    }

    #[test]
    fn test_parse_phases() {
        let phases = parse_phases(&["cleanup".to_string(), "PROVISION,cleanup".to_string()]).unwrap();
        assert_eq!(phases, vec![Phase::Cleanup, Phase::Provision]);

        assert!(parse_phases(&["load".to_string()]).is_err());
        assert!(parse_phases(&["deploy".to_string()]).is_err());
    }

    #[test]
    fn test_cli_labels_override_config() {
        let mut config = PipelineConfig::default();
        config.selection.skip_labels = vec!["slow".to_string()];

        apply_scenario_args(&mut config, &args(Some("smoke, base"), None));
        assert_eq!(config.selection.labels, vec!["smoke", "base"]);
        assert!(config.selection.skip_labels.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_read_missing_scenario() {
        let err = read_scenario(&args(None, None)).unwrap_err();
        assert!(err.to_string().contains("demo.yaml"));
    }
}
