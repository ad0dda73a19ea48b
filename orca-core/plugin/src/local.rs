//! 内置本地编排插件
//!
//! 在控制端通过 `sh -c` 执行任务的 `command` 参数。
//! 清单以 JSON 形式通过 `ORCA_INVENTORY` 传入，目标主机通过 `ORCA_HOSTS` 传入。

use async_trait::async_trait;
use orca_resolver::Inventory;
use serde_json::Value;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::traits::{ActionResult, Orchestrator, TaskInvocation};
use crate::{BackendError, BackendResult};

/// 本地 shell 编排插件
#[derive(Debug, Default)]
pub struct LocalShellOrchestrator;

impl LocalShellOrchestrator {
    pub const NAME: &'static str = "local";

    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Orchestrator for LocalShellOrchestrator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn run(&self, invocation: &TaskInvocation, inventory: &Inventory) -> BackendResult<ActionResult> {
        let command = invocation
            .param_str("command")
            .ok_or_else(|| BackendError::Failed("缺少 command 参数".to_string()))?;

        let inventory_json = inventory
            .to_json()
            .map_err(|e| BackendError::Failed(format!("清单序列化失败: {}", e)))?;

        info!("本地执行任务 {}: {}", invocation.name, command);

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .env("ORCA_INVENTORY", inventory_json)
            .env("ORCA_HOSTS", invocation.hosts.join(","))
            .env("ORCA_TASK", &invocation.name)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = invocation.param_str("chdir") {
            cmd.current_dir(dir);
        }

        if let Some(Value::Object(env)) = invocation.params.get("environment") {
            for (key, value) in env {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                cmd.env(key, value);
            }
        }

        let output = cmd.output().await?;
        let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            let detail = if stderr.is_empty() { stdout } else { stderr };
            return Err(BackendError::Failed(format!(
                "命令退出码 {}: {}",
                code, detail
            )));
        }

        debug!("任务 {} 执行完成, 输出 {} 字节", invocation.name, stdout.len());
        Ok(ActionResult {
            output: (!stdout.is_empty()).then_some(stdout),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orca_descriptor::TaskKind;
    use serde_json::json;

    fn invocation(command: &str) -> TaskInvocation {
        let mut inv = TaskInvocation::new("t", TaskKind::Execute);
        inv.params.insert("command".to_string(), json!(command));
        inv.hosts = vec!["h1".to_string(), "h2".to_string()];
        inv
    }

    #[tokio::test]
    async fn test_run_captures_output() {
        let result = LocalShellOrchestrator::new()
            .run(&invocation("echo $ORCA_HOSTS"), &Inventory::default())
            .await
            .unwrap();
        assert_eq!(result.output.as_deref(), Some("h1,h2"));
    }

    #[tokio::test]
    async fn test_run_nonzero_exit_fails() {
        let err = LocalShellOrchestrator::new()
            .run(&invocation("echo boom >&2; exit 3"), &Inventory::default())
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains('3'));
        assert!(message.contains("boom"));
    }

    #[tokio::test]
    async fn test_missing_command() {
        let inv = TaskInvocation::new("t", TaskKind::Orchestrate);
        let err = LocalShellOrchestrator::new()
            .run(&inv, &Inventory::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Failed(_)));
    }

    #[tokio::test]
    async fn test_environment_param() {
        let mut inv = invocation("echo $GREETING");
        inv.params
            .insert("environment".to_string(), json!({ "GREETING": "hello" }));

        let result = LocalShellOrchestrator::new()
            .run(&inv, &Inventory::default())
            .await
            .unwrap();
        assert_eq!(result.output.as_deref(), Some("hello"));
    }
}
