//! 目标解析
//!
//! 每个目标标记依次匹配:
//! 1. `all` 关键字，展开为全部资产
//! 2. 组名，展开为组的全部成员
//! 3. 资产名
//!
//! 展开结果按首次出现顺序去重。同名的组与资产按组解析。

use orca_descriptor::{ResourceModel, Task, ALL_TARGETS};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::group_index::GroupIndex;
use crate::{ResolveError, Result};

/// 解析结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTargets {
    /// 目标资产 (去重，首次出现顺序)
    pub assets: Vec<String>,

    /// 组 → 被选中的成员，仅包含至少有一个成员被选中的组
    pub groups: Vec<(String, Vec<String>)>,
}

impl ResolvedTargets {
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn contains(&self, asset: &str) -> bool {
        self.assets.iter().any(|a| a == asset)
    }

    /// 两个目标集合是否有共同资产
    pub fn overlaps(&self, other: &ResolvedTargets) -> bool {
        self.assets.iter().any(|a| other.contains(a))
    }
}

/// 目标解析器
pub struct TargetResolver<'a> {
    model: &'a ResourceModel,
    index: GroupIndex,
}

impl<'a> TargetResolver<'a> {
    pub fn new(model: &'a ResourceModel) -> Self {
        Self {
            model,
            index: GroupIndex::from_model(model),
        }
    }

    pub fn index(&self) -> &GroupIndex {
        &self.index
    }

    /// 解析任务声明的目标
    pub fn resolve_task(&self, task: &Task) -> Result<ResolvedTargets> {
        self.resolve(&task.name, &task.targets, task.allow_empty)
    }

    /// 解析目标列表
    ///
    /// 相同输入总是得到相同的有序结果
    pub fn resolve(&self, task: &str, targets: &[String], allow_empty: bool) -> Result<ResolvedTargets> {
        let mut seen = HashSet::new();
        let mut assets = Vec::new();

        for token in targets {
            let expansion: Vec<&str> = if token == ALL_TARGETS {
                self.model.assets().iter().map(|a| a.name.as_str()).collect()
            } else if let Some(members) = self.index.members(token) {
                members.iter().map(String::as_str).collect()
            } else if self.model.asset(token).is_some() {
                vec![token.as_str()]
            } else {
                return Err(ResolveError::UnknownTarget {
                    task: task.to_string(),
                    target: token.clone(),
                });
            };

            for asset in expansion {
                if seen.insert(asset) {
                    assets.push(asset.to_string());
                }
            }
        }

        if assets.is_empty() && !allow_empty {
            return Err(ResolveError::EmptyTarget {
                task: task.to_string(),
            });
        }

        let groups = self
            .index
            .group_names()
            .iter()
            .filter_map(|group| {
                let selected: Vec<String> = self
                    .index
                    .members(group)?
                    .iter()
                    .filter(|m| seen.contains(m.as_str()))
                    .cloned()
                    .collect();
                (!selected.is_empty()).then(|| (group.clone(), selected))
            })
            .collect();

        debug!("任务 '{}' 目标解析: {:?} -> {:?}", task, targets, assets);

        Ok(ResolvedTargets { assets, groups })
    }
}
