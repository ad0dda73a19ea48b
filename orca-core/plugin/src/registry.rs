//! 插件注册表

use orca_descriptor::{ProviderRequirements, ResourceModel};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::local::LocalShellOrchestrator;
use crate::traits::{Orchestrator, Provisioner};
use crate::{PluginError, PluginKind, Result};

/// 插件注册表
///
/// 启动时完成注册，之后只读。调度器只在调用期间持有插件引用。
#[derive(Default)]
pub struct PluginRegistry {
    provisioners: HashMap<String, Arc<dyn Provisioner>>,
    orchestrators: HashMap<String, Arc<dyn Orchestrator>>,
}

impl PluginRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建包含内置插件的注册表
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.orchestrators.insert(
            LocalShellOrchestrator::NAME.to_string(),
            Arc::new(LocalShellOrchestrator::new()),
        );
        registry
    }

    /// 注册供应插件
    pub fn register_provisioner(&mut self, plugin: Arc<dyn Provisioner>) -> Result<()> {
        let name = plugin.name().to_string();

        if self.provisioners.contains_key(&name) {
            warn!("供应插件 {} 已注册, 忽略重复注册", name);
            return Err(PluginError::AlreadyRegistered {
                kind: PluginKind::Provisioner,
                name,
            });
        }

        info!("注册供应插件: {} ({})", name, plugin.version());
        self.provisioners.insert(name, plugin);
        Ok(())
    }

    /// 注册编排插件
    pub fn register_orchestrator(&mut self, plugin: Arc<dyn Orchestrator>) -> Result<()> {
        let name = plugin.name().to_string();

        if self.orchestrators.contains_key(&name) {
            warn!("编排插件 {} 已注册, 忽略重复注册", name);
            return Err(PluginError::AlreadyRegistered {
                kind: PluginKind::Orchestrator,
                name,
            });
        }

        info!("注册编排插件: {} ({})", name, plugin.version());
        self.orchestrators.insert(name, plugin);
        Ok(())
    }

    /// 获取供应插件
    pub fn provisioner(&self, name: &str) -> Result<Arc<dyn Provisioner>> {
        self.provisioners
            .get(name)
            .cloned()
            .ok_or_else(|| PluginError::UnknownPlugin {
                kind: PluginKind::Provisioner,
                name: name.to_string(),
            })
    }

    /// 获取编排插件
    pub fn orchestrator(&self, name: &str) -> Result<Arc<dyn Orchestrator>> {
        self.orchestrators
            .get(name)
            .cloned()
            .ok_or_else(|| PluginError::UnknownPlugin {
                kind: PluginKind::Orchestrator,
                name: name.to_string(),
            })
    }

    pub fn is_registered(&self, kind: PluginKind, name: &str) -> bool {
        match kind {
            PluginKind::Provisioner => self.provisioners.contains_key(name),
            PluginKind::Orchestrator => self.orchestrators.contains_key(name),
        }
    }

    /// 列出已注册插件: (名称, 版本)，按名称排序
    pub fn list(&self, kind: PluginKind) -> Vec<(String, String)> {
        let mut plugins: Vec<(String, String)> = match kind {
            PluginKind::Provisioner => self
                .provisioners
                .values()
                .map(|p| (p.name().to_string(), p.version().to_string()))
                .collect(),
            PluginKind::Orchestrator => self
                .orchestrators
                .values()
                .map(|p| (p.name().to_string(), p.version().to_string()))
                .collect(),
        };
        plugins.sort();
        plugins
    }

    /// 检查模型引用的插件是否都已注册
    pub fn check_model(&self, model: &ResourceModel) -> Result<()> {
        let (provisioners, orchestrators) = model.plugin_names();

        for name in provisioners {
            self.provisioner(&name)?;
        }
        for name in orchestrators {
            self.orchestrator(&name)?;
        }

        debug!("场景 '{}' 引用的插件均已注册", model.name());
        Ok(())
    }
}

impl ProviderRequirements for PluginRegistry {
    fn requires_provider(&self, provisioner: &str) -> Option<bool> {
        self.provisioners
            .get(provisioner)
            .map(|p| p.requires_provider())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BackendResult;
    use async_trait::async_trait;
    use orca_descriptor::{parse_document, Asset, ConnectionAttributes, ModelBuilder, NoRequirements};

    struct CloudProvisioner;

    #[async_trait]
    impl Provisioner for CloudProvisioner {
        fn name(&self) -> &str {
            "cloud"
        }

        fn version(&self) -> &str {
            "1.0.0"
        }

        fn requires_provider(&self) -> bool {
            true
        }

        async fn create(&self, _asset: &Asset) -> BackendResult<ConnectionAttributes> {
            Ok(ConnectionAttributes::default())
        }

        async fn delete(&self, _asset: &Asset) -> BackendResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_registry_creation() {
        let registry = PluginRegistry::new();
        assert!(registry.list(PluginKind::Orchestrator).is_empty());

        let builtins = PluginRegistry::with_builtins();
        assert!(builtins.is_registered(PluginKind::Orchestrator, "local"));
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = PluginRegistry::new();
        registry.register_provisioner(Arc::new(CloudProvisioner)).unwrap();

        let err = registry
            .register_provisioner(Arc::new(CloudProvisioner))
            .unwrap_err();
        assert!(matches!(err, PluginError::AlreadyRegistered { .. }));
        assert_eq!(
            registry.list(PluginKind::Provisioner),
            vec![("cloud".to_string(), "1.0.0".to_string())]
        );
    }

    struct ShadowLocal;

    #[async_trait]
    impl Orchestrator for ShadowLocal {
        fn name(&self) -> &str {
            LocalShellOrchestrator::NAME
        }

        fn version(&self) -> &str {
            "9.9.9"
        }

        async fn run(
            &self,
            _invocation: &crate::TaskInvocation,
            _inventory: &orca_resolver::Inventory,
        ) -> BackendResult<crate::ActionResult> {
            Ok(crate::ActionResult::default())
        }
    }

    #[test]
    fn test_rejected_registration_keeps_builtin() {
        let mut registry = PluginRegistry::with_builtins();

        let err = registry.register_orchestrator(Arc::new(ShadowLocal)).unwrap_err();
        assert_eq!(
            err,
            PluginError::AlreadyRegistered {
                kind: PluginKind::Orchestrator,
                name: "local".to_string(),
            }
        );

        let listed = registry.list(PluginKind::Orchestrator);
        assert_eq!(listed.len(), 1);
        assert_ne!(listed[0].1, "9.9.9");
    }

    #[test]
    fn test_unknown_plugin() {
        let registry = PluginRegistry::with_builtins();
        let err = registry.provisioner("nope").err().unwrap();
        assert_eq!(
            err,
            PluginError::UnknownPlugin {
                kind: PluginKind::Provisioner,
                name: "nope".to_string()
            }
        );
    }

    #[test]
    fn test_provider_requirements() {
        let mut registry = PluginRegistry::new();
        registry.register_provisioner(Arc::new(CloudProvisioner)).unwrap();

        assert_eq!(registry.requires_provider("cloud"), Some(true));
        assert_eq!(registry.requires_provider("other"), None);
    }

    #[test]
    fn test_check_model() {
        let registry = PluginRegistry::with_builtins();
        let model = ModelBuilder::new(&NoRequirements)
            .build(
                parse_document(
                    "name: d\nprovision:\n  - name: h1\nexecute:\n  - name: t\n    executor: ansible\n    hosts: h1\n",
                )
                .unwrap(),
            )
            .unwrap();

        let err = registry.check_model(&model).unwrap_err();
        assert!(err.to_string().contains("ansible"));
    }
}
