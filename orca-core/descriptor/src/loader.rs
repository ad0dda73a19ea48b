//! 描述文件加载器
//!
//! 变量合并 → 模板渲染 → 结构解析，失败时不返回任何部分结果。

use std::path::Path;
use tracing::{debug, info};

use crate::builder::{ModelBuilder, ProviderRequirements};
use crate::document::{parse_document, RawDescriptor};
use crate::model::ResourceModel;
use crate::template::TemplateRenderer;
use crate::vars::{merge_sources, VarSource};
use crate::Result;

/// 描述文件加载器
#[derive(Default)]
pub struct DescriptorLoader {
    renderer: TemplateRenderer,
}

impl DescriptorLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 仅渲染模板，返回展开后的文本
    pub fn render(&self, text: &str, sources: &[VarSource]) -> Result<String> {
        let vars = merge_sources(sources);
        debug!("合并变量数据源: {} 个, 共 {} 个变量", sources.len(), vars.len());
        self.renderer.render(text, &vars)
    }

    /// 渲染并解析描述文件
    pub fn load(&self, text: &str, sources: &[VarSource]) -> Result<RawDescriptor> {
        let rendered = self.render(text, sources)?;
        parse_document(&rendered)
    }

    /// 从文件加载描述文件
    pub fn load_file<P: AsRef<Path>>(&self, path: P, sources: &[VarSource]) -> Result<RawDescriptor> {
        let path = path.as_ref();
        info!("加载场景描述文件: {}", path.display());

        let text = std::fs::read_to_string(path)?;
        self.load(&text, sources)
    }

    /// 加载并构建资源模型
    pub fn load_model(
        &self,
        text: &str,
        sources: &[VarSource],
        requirements: &dyn ProviderRequirements,
    ) -> Result<ResourceModel> {
        let raw = self.load(text, sources)?;
        ModelBuilder::new(requirements).build(raw)
    }
}
