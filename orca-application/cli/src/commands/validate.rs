//! Validate 命令处理

use anyhow::Result;
use colored::Colorize;
use orca_pipeline::PipelineConfig;

use super::{common, output};
use crate::{OutputFormat, ScenarioArgs};

pub fn handle(mut config: PipelineConfig, args: ScenarioArgs, format: Option<OutputFormat>) -> Result<i32> {
    common::apply_scenario_args(&mut config, &args);

    let (text, sources) = common::read_scenario(&args)?;
    let pipeline = common::build_pipeline(config)?;
    let result = pipeline.validate_descriptor(&text, &sources);

    if let Some(format) = format {
        println!("{}", output::render(&result, format)?);
        return Ok(result.exit_code);
    }

    if let Some(error) = &result.fatal_error {
        println!("{} 场景校验失败: {}", "✗".red().bold(), error.red());
        return Ok(result.exit_code);
    }

    println!("{} {}\n", "场景:".bold(), result.scenario.cyan().bold());
    for phase in &result.phases {
        for task in &phase.tasks {
            match &task.error {
                None => println!(
                    "{} {} {} -> {}",
                    "✓".green(),
                    task.action.bright_black(),
                    task.name,
                    task.hosts.join(", ").bright_black()
                ),
                Some(error) => println!(
                    "{} {} {}: {}",
                    "✗".red(),
                    task.action.bright_black(),
                    task.name,
                    error.red()
                ),
            }
        }
    }

    println!();
    if result.is_success() {
        println!("{} 场景校验通过", "✓".green().bold());
    } else {
        println!("{} 场景校验失败", "✗".red().bold());
    }

    Ok(result.exit_code)
}
