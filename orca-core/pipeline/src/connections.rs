//! 资产连接属性存储
//!
//! 资源模型构建后只读，唯一可变的是供应阶段写入的连接属性。
//! 每个资产只允许写入一次，写入由调度器串行完成。

use orca_descriptor::{ConnectionAttributes, ResourceModel};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// 连接属性存储
#[derive(Clone, Default)]
pub struct ConnectionStore {
    inner: Arc<RwLock<HashMap<String, ConnectionAttributes>>>,
}

impl ConnectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录资产的连接属性
    ///
    /// 已存在时不覆盖，返回 false
    pub async fn record(&self, asset: &str, connection: ConnectionAttributes) -> bool {
        let mut inner = self.inner.write().await;

        if inner.contains_key(asset) {
            warn!("资产 {} 的连接属性已写入, 忽略重复写入", asset);
            return false;
        }

        debug!("记录资产 {} 连接属性: {:?}", asset, connection.masked());
        inner.insert(asset.to_string(), connection);
        true
    }

    pub async fn get(&self, asset: &str) -> Option<ConnectionAttributes> {
        self.inner.read().await.get(asset).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// 已写入的连接属性快照
    pub async fn snapshot(&self) -> HashMap<String, ConnectionAttributes> {
        self.inner.read().await.clone()
    }

    /// 供应结果与静态资产连接属性的合并视图
    pub async fn view(&self, model: &ResourceModel) -> HashMap<String, ConnectionAttributes> {
        let mut view = self.snapshot().await;
        for asset in model.assets() {
            if let Some(conn) = &asset.static_connection {
                view.entry(asset.name.clone()).or_insert_with(|| conn.clone());
            }
        }
        view
    }
}
