//! 描述文件模板渲染
//!
//! 在结构解析之前对原始文本做 `{{var}}` 替换。使用严格模式：
//! 引用未定义变量直接报错，不会静默渲染为空字符串。

use handlebars::{no_escape, Handlebars};

use crate::vars::VarMap;
use crate::{DescriptorError, Result};

/// 模板渲染器
pub struct TemplateRenderer {
    handlebars: Handlebars<'static>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        // 描述文件不是 HTML，保持原样输出
        handlebars.register_escape_fn(no_escape);

        Self { handlebars }
    }

    /// 渲染模板文本
    ///
    /// 错误信息包含出错位置 (行/列)
    pub fn render(&self, text: &str, vars: &VarMap) -> Result<String> {
        self.handlebars
            .render_template(text, vars)
            .map_err(|e| DescriptorError::Template(e.to_string()))
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::{merge_sources, VarSource};

    #[test]
    fn test_render_later_source_wins() {
        let vars = merge_sources(&[
            VarSource::from_pairs("first", [("env", "dev")]),
            VarSource::from_pairs("second", [("env", "prod")]),
        ]);

        let rendered = TemplateRenderer::new()
            .render("name: app-{{env}}", &vars)
            .unwrap();
        assert_eq!(rendered, "name: app-prod");
    }

    #[test]
    fn test_render_without_placeholders() {
        let rendered = TemplateRenderer::new()
            .render("name: plain\n", &VarMap::new())
            .unwrap();
        assert_eq!(rendered, "name: plain\n");
    }

    #[test]
    fn test_undefined_variable_fails() {
        let err = TemplateRenderer::new()
            .render("name: demo\nimage: {{image}}\n", &VarMap::new())
            .unwrap_err();

        assert!(matches!(err, DescriptorError::Template(_)));
        assert!(err.to_string().contains("image"));
    }

    #[test]
    fn test_undefined_variable_reports_location() {
        let text = "name: demo\nprovision:\n  - name: h1\n    image: {{missing_var}}\n";
        let err = TemplateRenderer::new().render(text, &VarMap::new()).unwrap_err();

        let message = err.to_string();
        assert!(message.contains("line 4"), "{}", message);
        assert!(message.contains("missing_var"), "{}", message);
    }

    #[test]
    fn test_malformed_expression_fails() {
        let err = TemplateRenderer::new()
            .render("name: {{#if}}", &VarMap::new())
            .unwrap_err();
        assert!(matches!(err, DescriptorError::Template(_)));
    }

    #[test]
    fn test_no_html_escaping() {
        let vars = merge_sources(&[VarSource::from_pairs("v", [("cmd", "a && b <c>")])]);
        let rendered = TemplateRenderer::new().render("{{cmd}}", &vars).unwrap();
        assert_eq!(rendered, "a && b <c>");
    }
}
