//! Show 命令处理

use anyhow::Result;
use colored::Colorize;
use orca_descriptor::{ResourceModel, TaskKind, ALL_TARGETS};
use orca_pipeline::{exit_code, PipelineConfig};
use orca_resolver::{InventoryBuilder, TargetResolver};
use std::collections::HashMap;

use super::common;
use crate::{InventoryFormat, ScenarioArgs, ShowAction};

pub fn handle(mut config: PipelineConfig, action: ShowAction) -> Result<i32> {
    let scenario = match &action {
        ShowAction::Labels { scenario } => scenario,
        ShowAction::Inventory { scenario, .. } => scenario,
    };
    common::apply_scenario_args(&mut config, scenario);

    let model = match load_model(config, scenario)? {
        Ok(model) => model,
        Err(code) => return Ok(code),
    };

    match action {
        ShowAction::Labels { .. } => show_labels(&model),
        ShowAction::Inventory { task, format, .. } => show_inventory(&model, task.as_deref(), format),
    }
}

/// 加载模型，加载失败时打印错误并返回对应退出码
fn load_model(config: PipelineConfig, args: &ScenarioArgs) -> Result<std::result::Result<ResourceModel, i32>> {
    let (text, sources) = common::read_scenario(args)?;
    let pipeline = common::build_pipeline(config)?;

    Ok(pipeline.load(&text, &sources).map_err(|e| {
        eprintln!("{} 场景加载失败: {}", "✗".red().bold(), e);
        e.exit_code()
    }))
}

fn show_labels(model: &ResourceModel) -> Result<i32> {
    let labels = model.labels();
    if labels.is_empty() {
        println!("{}", "场景未定义任何标签".yellow());
        return Ok(exit_code::SUCCEEDED);
    }

    println!("找到 {} 个标签:\n", labels.len().to_string().green());
    for (label, owners) in labels {
        println!("{}", label.cyan().bold());
        for owner in owners {
            println!("  {}", owner);
        }
    }

    Ok(exit_code::SUCCEEDED)
}

fn show_inventory(model: &ResourceModel, task: Option<&str>, format: InventoryFormat) -> Result<i32> {
    let resolver = TargetResolver::new(model);

    let resolved = match task {
        Some(name) => {
            let Some(task) = TaskKind::ALL.iter().find_map(|kind| model.task(*kind, name)) else {
                anyhow::bail!("任务 '{}' 未声明", name);
            };
            resolver.resolve_task(task)?
        }
        None => resolver.resolve(model.name(), &[ALL_TARGETS.to_string()], true)?,
    };

    // 未经供应，仅包含静态资产的连接属性
    let inventory = InventoryBuilder::build(model, &resolved, &HashMap::new()).masked();

    match format {
        InventoryFormat::Ini => print!("{}", inventory.to_ini()),
        InventoryFormat::Json => println!("{}", inventory.to_json()?),
    }

    Ok(exit_code::SUCCEEDED)
}
