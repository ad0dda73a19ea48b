//! Plugins 命令处理

use anyhow::Result;
use colored::Colorize;
use orca_plugin::PluginKind;

use super::common;

pub fn handle() -> Result<()> {
    let registry = common::build_registry();

    for kind in [PluginKind::Provisioner, PluginKind::Orchestrator] {
        let plugins = registry.list(kind);
        println!("{}插件 ({}):", kind, plugins.len().to_string().green());

        if plugins.is_empty() {
            println!("  {}", "(无)".bright_black());
        }
        for (name, version) in plugins {
            println!("  {} {}", name.cyan(), version.bright_black());
        }
        println!();
    }

    Ok(())
}
