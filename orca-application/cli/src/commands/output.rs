//! CLI 通用输出格式化模块
//!
//! 运行报告的彩色摘要、JSON/YAML 输出与报告文件写入

use anyhow::{Context, Result};
use colored::Colorize;
use orca_pipeline::{PhaseStatus, RunResult, TaskStatus};
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::OutputFormat;

/// 打印运行报告摘要
pub fn print_summary(result: &RunResult) {
    println!("\n{}", "=".repeat(60));
    println!("{}", "执行报告".bold());
    println!("{}", "=".repeat(60));
    println!();

    if !result.scenario.is_empty() {
        println!("场景名称: {}", result.scenario.cyan().bold());
    }
    println!("执行时间: {} ms", result.duration_ms.to_string().yellow());
    println!();

    for phase in &result.phases {
        let icon = match phase.status {
            PhaseStatus::Succeeded => "✓".green(),
            PhaseStatus::Failed => "✗".red(),
            PhaseStatus::Skipped => "⊘".yellow(),
        };
        let (passed, failed, skipped) = phase.counts();
        println!(
            "{} {:<12} 成功 {} / 失败 {} / 跳过 {}  ({} ms)",
            icon.bold(),
            phase.phase.to_string(),
            passed.to_string().green(),
            failed.to_string().red(),
            skipped.to_string().yellow(),
            phase.duration_ms.to_string().bright_black()
        );

        if let Some(error) = &phase.fatal_error {
            println!("   错误: {}", error.red());
        }

        for task in &phase.tasks {
            let icon = match task.status {
                TaskStatus::Success => "✓".green(),
                TaskStatus::Failed => "✗".red(),
                TaskStatus::Skipped => "⊘".yellow(),
            };
            let optional = if task.required { "" } else { " (可选)" };
            println!("   {} {} {}{}", icon, task.action.bright_black(), task.name, optional);

            if !task.hosts.is_empty() {
                println!("      主机: {}", task.hosts.join(", ").bright_black());
            }
            if let Some(output) = &task.output {
                println!("      输出: {}", output.bright_black());
            }
            if let Some(error) = &task.error {
                println!("      错误: {}", error.red());
            }
            if let Some(reason) = &task.reason {
                println!("      原因: {}", reason.bright_black());
            }
        }
    }

    // 总结
    println!();
    println!("{}", "=".repeat(60));
    let status = if result.is_success() {
        format!("{} 场景执行成功", "✓".green().bold())
    } else {
        match &result.fatal_error {
            Some(error) => format!("{} 场景执行失败: {}", "✗".red().bold(), error),
            None => format!("{} 场景执行失败", "✗".red().bold()),
        }
    };
    println!("{}", status);
    println!("退出码: {}", result.exit_code);
    println!("{}", "=".repeat(60));
}

/// 按格式序列化报告
pub fn render(result: &RunResult, format: OutputFormat) -> Result<String> {
    let text = match format {
        OutputFormat::Json => result.to_json()?,
        OutputFormat::Yaml => result.to_yaml()?,
    };
    Ok(text)
}

/// 输出报告: 指定格式时打印序列化结果，否则打印摘要
pub fn print_result(result: &RunResult, format: Option<OutputFormat>) -> Result<()> {
    match format {
        Some(format) => println!("{}", render(result, format)?),
        None => print_summary(result),
    }
    Ok(())
}

/// 报告文件格式，按扩展名选择，默认 JSON
pub fn report_format(path: &str) -> OutputFormat {
    match Path::new(path).extension().and_then(|s| s.to_str()) {
        Some("yaml") | Some("yml") => OutputFormat::Yaml,
        _ => OutputFormat::Json,
    }
}

/// 写入报告文件
///
/// 保存提示写入 `status` (通常为 stderr)，stdout 只留给报告本身
pub fn write_report(result: &RunResult, path: &str, status: &mut dyn Write) -> Result<()> {
    fs::write(path, render(result, report_format(path))?)
        .with_context(|| format!("写入报告文件失败: {}", path))?;
    writeln!(status, "{} 报告已保存: {}", "✓".green().bold(), path.cyan())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use orca_pipeline::{Phase, PhaseReport};

    fn result() -> RunResult {
        let mut result = RunResult::new("demo");
        result.add_phase(PhaseReport::from_tasks(Phase::Load, Vec::new()));
        result.finalize();
        result
    }

    #[test]
    fn test_report_format_by_extension() {
        assert!(matches!(report_format("out/report.yaml"), OutputFormat::Yaml));
        assert!(matches!(report_format("report.yml"), OutputFormat::Yaml));
        assert!(matches!(report_format("report.json"), OutputFormat::Json));
        assert!(matches!(report_format("report"), OutputFormat::Json));
    }

    #[test]
    fn test_write_report_keeps_notice_out_of_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let path = path.to_str().unwrap();

        let mut status = Vec::new();
        write_report(&result(), path, &mut status).unwrap();

        let saved = fs::read_to_string(path).unwrap();
        assert!(saved.starts_with('{'));
        assert!(!saved.contains("报告已保存"));

        let notice = String::from_utf8(status).unwrap();
        assert!(notice.contains("报告已保存"));
        assert!(notice.contains("report.json"));
    }
}
