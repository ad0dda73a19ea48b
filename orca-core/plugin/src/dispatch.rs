//! 插件调用分发
//!
//! 对调用方而言是同步语义: 等待插件返回或超时。
//! 后端错误转换为 [`PluginError`]，保留原始诊断文本。

use orca_descriptor::{Asset, ConnectionAttributes};
use orca_resolver::Inventory;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::registry::PluginRegistry;
use crate::traits::{ActionResult, TaskInvocation};
use crate::{BackendError, PluginError, Result};

/// 插件调用分发器
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<PluginRegistry>,
    default_timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<PluginRegistry>, default_timeout: Duration) -> Self {
        Self {
            registry,
            default_timeout,
        }
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// 创建资产
    pub async fn create(&self, asset: &Asset) -> Result<ConnectionAttributes> {
        let plugin = self.registry.provisioner(provisioner_name(asset)?)?;
        debug!("调用供应插件 {} 创建资产 {}", plugin.name(), asset.name);

        match timeout(self.default_timeout, plugin.create(asset)).await {
            Ok(Ok(connection)) => Ok(connection),
            Ok(Err(err)) => Err(provision_error(&asset.name, err)),
            Err(_) => Err(self.timeout_error(format!("创建资产 {}", asset.name), self.default_timeout)),
        }
    }

    /// 销毁资产
    pub async fn delete(&self, asset: &Asset) -> Result<()> {
        let plugin = self.registry.provisioner(provisioner_name(asset)?)?;
        debug!("调用供应插件 {} 销毁资产 {}", plugin.name(), asset.name);

        match timeout(self.default_timeout, plugin.delete(asset)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(provision_error(&asset.name, err)),
            Err(_) => Err(self.timeout_error(format!("销毁资产 {}", asset.name), self.default_timeout)),
        }
    }

    /// 调用编排插件执行任务
    ///
    /// `task_timeout` 为任务级超时，None 使用默认超时
    pub async fn run(
        &self,
        plugin_name: &str,
        invocation: &TaskInvocation,
        inventory: &Inventory,
        task_timeout: Option<Duration>,
    ) -> Result<ActionResult> {
        let plugin = self.registry.orchestrator(plugin_name)?;
        let limit = task_timeout.unwrap_or(self.default_timeout);
        debug!(
            "调用编排插件 {} 执行任务 {} (主机: {:?})",
            plugin_name, invocation.name, invocation.hosts
        );

        match timeout(limit, plugin.run(invocation, inventory)).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(err)) => Err(PluginError::Orchestration {
                task: invocation.name.clone(),
                message: err.to_string(),
            }),
            Err(_) => Err(self.timeout_error(format!("任务 {}", invocation.name), limit)),
        }
    }

    fn timeout_error(&self, target: String, limit: Duration) -> PluginError {
        warn!("插件调用超时: {} ({}s)", target, limit.as_secs());
        PluginError::Timeout {
            target,
            seconds: limit.as_secs(),
        }
    }
}

fn provisioner_name(asset: &Asset) -> Result<&str> {
    asset
        .provisioner
        .as_deref()
        .ok_or_else(|| PluginError::Provision {
            resource: asset.name.clone(),
            message: "资产未声明 provisioner".to_string(),
            fatal: false,
        })
}

fn provision_error(resource: &str, err: BackendError) -> PluginError {
    let fatal = matches!(err, BackendError::Unrecoverable(_));
    PluginError::Provision {
        resource: resource.to_string(),
        message: err.to_string(),
        fatal,
    }
}
