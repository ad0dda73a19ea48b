//! 资源模型构建与结构校验

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::document::{RawAsset, RawDescriptor, RawGroup, RawTask};
use crate::model::{
    Asset, ConnectionAttributes, Group, ResourceModel, Task, TaskKind, ALL_TARGETS,
};
use crate::{DescriptorError, Result};

/// 供应插件对 provider 属性的要求
///
/// 由插件注册表实现，描述文件层不依赖具体插件。
pub trait ProviderRequirements {
    /// 插件是否要求 provider 属性，未知插件返回 None
    fn requires_provider(&self, provisioner: &str) -> Option<bool>;
}

/// 不做任何插件相关校验
pub struct NoRequirements;

impl ProviderRequirements for NoRequirements {
    fn requires_provider(&self, _provisioner: &str) -> Option<bool> {
        None
    }
}

/// 资源模型构建器
pub struct ModelBuilder<'a> {
    requirements: &'a dyn ProviderRequirements,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(requirements: &'a dyn ProviderRequirements) -> Self {
        Self { requirements }
    }

    /// 将解析后的文档转换为资源模型
    ///
    /// 遇到第一个违反结构约束的实体即返回 `Validation` 错误
    pub fn build(&self, raw: RawDescriptor) -> Result<ResourceModel> {
        let name = non_empty(raw.name.as_deref())
            .ok_or_else(|| DescriptorError::validation("场景", "缺少场景名称 name"))?;

        let assets = self.build_assets(&raw.provision)?;
        let groups = build_groups(&raw.groups, &assets)?;

        let orchestrate = build_tasks(TaskKind::Orchestrate, &raw.orchestrate, &assets, &groups)?;
        let execute = build_tasks(TaskKind::Execute, &raw.execute, &assets, &groups)?;
        let report = build_tasks(TaskKind::Report, &raw.report, &assets, &groups)?;
        check_report_references(&report, &execute)?;

        debug!(
            "资源模型构建完成: {} (资产: {}, 组: {}, 任务: {})",
            name,
            assets.len(),
            groups.len(),
            orchestrate.len() + execute.len() + report.len()
        );

        Ok(ResourceModel::new(
            name,
            raw.description,
            assets,
            groups,
            [orchestrate, execute, report],
        ))
    }

    fn build_assets(&self, raw_assets: &[RawAsset]) -> Result<Vec<Asset>> {
        let mut names = HashSet::new();
        let mut assets = Vec::with_capacity(raw_assets.len());

        for (index, raw) in raw_assets.iter().enumerate() {
            let name = non_empty(raw.name.as_deref()).ok_or_else(|| {
                DescriptorError::validation(format!("provision[{}]", index), "缺少资产名称 name")
            })?;
            let entity = format!("资产 '{}'", name);

            if name == ALL_TARGETS {
                return Err(DescriptorError::validation(entity, "'all' 为保留名称"));
            }
            if !names.insert(name.clone()) {
                return Err(DescriptorError::validation(entity, "资产名称重复"));
            }

            let groups = dedup(raw.groups.to_vec());
            if groups.iter().any(|g| g == ALL_TARGETS) {
                return Err(DescriptorError::validation(entity, "'all' 不能作为组名"));
            }

            let static_connection = static_connection(raw);
            let provisioner = non_empty(raw.provisioner.as_deref());

            match (&provisioner, &static_connection) {
                (Some(_), Some(_)) => {
                    return Err(DescriptorError::validation(
                        entity,
                        "不能同时声明 provisioner 与静态连接属性",
                    ));
                }
                (None, _) if raw.provider.is_some() => {
                    return Err(DescriptorError::validation(
                        entity,
                        "声明了 provider 但缺少 provisioner",
                    ));
                }
                (Some(p), None) => {
                    let has_provider = raw.provider.as_ref().is_some_and(|v| !v.is_null());
                    if self.requirements.requires_provider(p) == Some(true) && !has_provider {
                        return Err(DescriptorError::validation(
                            entity,
                            format!("供应插件 '{}' 需要 provider 属性", p),
                        ));
                    }
                }
                _ => {}
            }

            assets.push(Asset {
                name,
                description: raw.description.clone(),
                groups,
                provisioner,
                provider: raw.provider.clone(),
                labels: dedup(raw.labels.to_vec()),
                attributes: raw.attributes.clone(),
                static_connection,
            });
        }

        Ok(assets)
    }
}

fn build_groups(raw_groups: &[RawGroup], assets: &[Asset]) -> Result<Vec<Group>> {
    let mut groups: Vec<Group> = Vec::new();

    for (index, raw) in raw_groups.iter().enumerate() {
        let name = non_empty(raw.name.as_deref()).ok_or_else(|| {
            DescriptorError::validation(format!("groups[{}]", index), "缺少组名称 name")
        })?;
        let entity = format!("组 '{}'", name);

        if name == ALL_TARGETS {
            return Err(DescriptorError::validation(entity, "'all' 为保留名称"));
        }
        if groups.iter().any(|g| g.name == name) {
            return Err(DescriptorError::validation(entity, "组名称重复"));
        }

        let members = dedup(raw.members.to_vec());
        if let Some(missing) = members
            .iter()
            .find(|m| !assets.iter().any(|a| &a.name == *m))
        {
            return Err(DescriptorError::validation(
                entity,
                format!("成员 '{}' 未声明", missing),
            ));
        }

        groups.push(Group {
            name,
            description: raw.description.clone(),
            members,
        });
    }

    // 资产上声明的组，按首次出现顺序补齐
    for asset in assets {
        for group in &asset.groups {
            if !groups.iter().any(|g| &g.name == group) {
                groups.push(Group {
                    name: group.clone(),
                    description: None,
                    members: Vec::new(),
                });
            }
        }
    }

    for group in &groups {
        if assets.iter().any(|a| a.name == group.name) {
            warn!(
                "名称 '{}' 同时是组名与资产名，作为目标时按组解析",
                group.name
            );
        }
    }

    Ok(groups)
}

fn build_tasks(
    kind: TaskKind,
    raw_tasks: &[RawTask],
    assets: &[Asset],
    groups: &[Group],
) -> Result<Vec<Task>> {
    let mut tasks: Vec<Task> = Vec::with_capacity(raw_tasks.len());

    for (index, raw) in raw_tasks.iter().enumerate() {
        let name = non_empty(raw.name.as_deref()).ok_or_else(|| {
            DescriptorError::validation(format!("{}[{}]", kind, index), "缺少任务名称 name")
        })?;
        let entity = format!("{} 任务 '{}'", kind, name);

        if tasks.iter().any(|t| t.name == name) {
            return Err(DescriptorError::validation(entity, "任务名称重复"));
        }

        let plugin = non_empty(raw.plugin.as_deref())
            .ok_or_else(|| DescriptorError::validation(&entity, "缺少插件名称"))?;

        let targets = raw.targets.to_vec();
        for target in &targets {
            let known = target == ALL_TARGETS
                || groups.iter().any(|g| &g.name == target)
                || assets.iter().any(|a| &a.name == target);
            if !known {
                return Err(DescriptorError::validation(
                    entity,
                    format!("目标 '{}' 不是已声明的资产或组", target),
                ));
            }
        }

        let executes = dedup(raw.executes.to_vec());
        if !executes.is_empty() && kind != TaskKind::Report {
            return Err(DescriptorError::validation(
                entity,
                "只有 report 任务可以声明 executes",
            ));
        }

        if raw.timeout == Some(0) {
            return Err(DescriptorError::validation(entity, "timeout 必须大于 0"));
        }

        tasks.push(Task {
            name,
            description: raw.description.clone(),
            kind,
            plugin,
            targets,
            required: raw.required.unwrap_or(true),
            allow_empty: raw.allow_empty,
            timeout: raw.timeout,
            labels: dedup(raw.labels.to_vec()),
            executes,
            params: raw.params.clone(),
            cleanup: raw.cleanup.clone(),
        });
    }

    Ok(tasks)
}

fn check_report_references(report: &[Task], execute: &[Task]) -> Result<()> {
    for task in report {
        if let Some(missing) = task
            .executes
            .iter()
            .find(|e| !execute.iter().any(|t| &t.name == *e))
        {
            return Err(DescriptorError::validation(
                format!("report 任务 '{}'", task.name),
                format!("引用的 execute 任务 '{}' 未声明", missing),
            ));
        }
    }
    Ok(())
}

fn static_connection(raw: &RawAsset) -> Option<ConnectionAttributes> {
    if raw.ip_address.is_none()
        && raw.hostname.is_none()
        && raw.credentials.is_none()
        && raw.connection.is_none()
    {
        return None;
    }

    Some(ConnectionAttributes {
        ip_address: raw.ip_address.clone(),
        hostname: raw.hostname.clone(),
        credentials: raw.credentials.clone().unwrap_or_default(),
        variables: raw.connection.clone().unwrap_or_default(),
    })
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn dedup(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|i| seen.insert(i.clone())).collect()
}
