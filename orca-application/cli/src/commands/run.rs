//! Run 命令处理

use anyhow::Result;
use colored::Colorize;
use orca_pipeline::PipelineConfig;
use tracing::info;

use super::{common, output};
use crate::RunArgs;

pub async fn handle(mut config: PipelineConfig, args: RunArgs) -> Result<i32> {
    common::apply_scenario_args(&mut config, &args.scenario);
    if !args.tasks.is_empty() {
        config.selection.tasks = args.tasks.clone();
    }
    if !args.phases.is_empty() {
        config.selection.phases = common::parse_phases(&args.phases)?;
    }
    if let Some(timeout) = args.timeout {
        config.execution.plugin_timeout = timeout;
    }
    if args.serial {
        config.execution.parallel = false;
    }

    let (text, sources) = common::read_scenario(&args.scenario)?;
    let pipeline = common::build_pipeline(config)?;

    if args.output.is_none() {
        println!("{} {}\n", "开始执行场景:".bold(), args.scenario.scenario.cyan());
    }
    info!("运行场景文件: {}", args.scenario.scenario);

    let result = pipeline.run_descriptor(&text, &sources).await;

    output::print_result(&result, args.output)?;
    if let Some(path) = &args.report_file {
        output::write_report(&result, path, &mut std::io::stderr())?;
    }

    Ok(result.exit_code)
}
