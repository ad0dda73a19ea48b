//! Orca CLI 应用

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use orca_pipeline::exit_code;
use tracing::{info, Level};

mod commands;

#[derive(Parser)]
#[command(name = "orca")]
#[command(about = "Orca - 场景驱动的资源供应与编排引擎", long_about = None)]
#[command(version)]
struct Cli {
    /// 日志级别 (默认取配置文件中的 logging.level)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// 配置文件路径
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行场景
    Run(RunArgs),

    /// 校验场景 (不调用任何插件)
    Validate {
        #[command(flatten)]
        scenario: ScenarioArgs,

        /// 报告输出格式
        #[arg(short, long, value_enum)]
        output: Option<OutputFormat>,
    },

    /// 查看场景信息
    Show {
        #[command(subcommand)]
        action: ShowAction,
    },

    /// 列出已注册插件
    Plugins,
}

/// 场景来源参数
#[derive(Args)]
pub struct ScenarioArgs {
    /// 场景描述文件路径
    #[arg(short, long)]
    pub scenario: String,

    /// 模板变量 (文件路径或 JSON 字符串，可重复，后者覆盖前者)
    #[arg(long = "vars-data", value_name = "FILE|JSON")]
    pub vars_data: Vec<String>,

    /// 只运行带有这些标签的资源/任务 (逗号分隔)
    #[arg(long, conflicts_with = "skip_labels")]
    pub labels: Option<String>,

    /// 跳过带有这些标签的资源/任务 (逗号分隔)
    #[arg(long, conflicts_with = "labels")]
    pub skip_labels: Option<String>,
}

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,

    /// 只运行指定任务 (可重复)
    #[arg(short, long = "task")]
    pub tasks: Vec<String>,

    /// 只运行指定阶段 (可重复: provision/orchestrate/execute/report/cleanup)
    #[arg(short, long = "phase")]
    pub phases: Vec<String>,

    /// 单次插件调用超时 (秒)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// 串行执行阶段内任务
    #[arg(long)]
    pub serial: bool,

    /// 报告输出格式 (默认打印彩色摘要)
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// 报告写入文件 (格式按扩展名, 默认 JSON)
    #[arg(long)]
    pub report_file: Option<String>,
}

#[derive(Subcommand)]
pub enum ShowAction {
    /// 列出标签及其所属资源/任务
    Labels {
        #[command(flatten)]
        scenario: ScenarioArgs,
    },

    /// 显示编排清单 (仅包含静态连接属性，敏感字段脱敏)
    Inventory {
        #[command(flatten)]
        scenario: ScenarioArgs,

        /// 按任务的目标生成清单，默认包含全部资产
        #[arg(short, long)]
        task: Option<String>,

        /// 输出格式
        #[arg(short, long, value_enum, default_value = "ini")]
        format: InventoryFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum InventoryFormat {
    Ini,
    Json,
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { exit_code::USAGE } else { exit_code::SUCCEEDED };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "✗".red().bold(), e);
            exit_code::USAGE
        }
    };

    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let config = commands::common::load_config(cli.config.as_deref())?;

    // 初始化日志
    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    let log_level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .init();

    info!("Orca CLI 启动");

    // 处理命令
    match cli.command {
        Commands::Run(args) => commands::run::handle(config, args).await,
        Commands::Validate { scenario, output } => commands::validate::handle(config, scenario, output),
        Commands::Show { action } => commands::show::handle(config, action),
        Commands::Plugins => commands::plugins::handle().map(|_| exit_code::SUCCEEDED),
    }
}
