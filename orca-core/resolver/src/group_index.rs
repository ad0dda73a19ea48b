//! 组成员反向索引
//!
//! 组不拥有资产，成员关系来自资产自身的 `groups` 字段与组声明中的
//! 显式成员，两者取并集。索引可随时从模型重建。

use orca_descriptor::ResourceModel;
use std::collections::HashMap;

/// 组 → 成员资产 (资产声明顺序)
#[derive(Debug, Clone, Default)]
pub struct GroupIndex {
    order: Vec<String>,
    members: HashMap<String, Vec<String>>,
}

impl GroupIndex {
    /// 从资源模型构建索引
    pub fn from_model(model: &ResourceModel) -> Self {
        let mut order = Vec::with_capacity(model.groups().len());
        let mut members = HashMap::with_capacity(model.groups().len());

        for group in model.groups() {
            let assets: Vec<String> = model
                .assets()
                .iter()
                .filter(|a| a.in_group(&group.name) || group.members.contains(&a.name))
                .map(|a| a.name.clone())
                .collect();

            order.push(group.name.clone());
            members.insert(group.name.clone(), assets);
        }

        Self { order, members }
    }

    pub fn contains(&self, group: &str) -> bool {
        self.members.contains_key(group)
    }

    /// 组成员，未知组返回 None
    pub fn members(&self, group: &str) -> Option<&[String]> {
        self.members.get(group).map(Vec::as_slice)
    }

    /// 组名称 (模型中的顺序)
    pub fn group_names(&self) -> &[String] {
        &self.order
    }

    /// 资产所属的全部组
    pub fn groups_of(&self, asset: &str) -> Vec<&str> {
        self.order
            .iter()
            .filter(|g| {
                self.members
                    .get(*g)
                    .is_some_and(|m| m.iter().any(|a| a == asset))
            })
            .map(String::as_str)
            .collect()
    }
}
