//! 运行结果报告

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::phase::Phase;

/// 运行总体状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

/// 阶段状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    Succeeded,
    Failed,
    /// 未选中或因前序失败而未运行
    Skipped,
}

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// 成功
    Success,

    /// 失败
    Failed,

    /// 跳过
    Skipped,
}

/// 单个资源/任务的结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    /// 任务名称或资产名称
    pub name: String,

    /// 动作类型 (provision/orchestrate/execute/report/cleanup/deprovision)
    pub action: String,

    pub status: TaskStatus,

    pub required: bool,

    /// 目标主机
    #[serde(default)]
    pub hosts: Vec<String>,

    /// 错误信息 (保留后端原始诊断)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// 跳过原因
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// 后端输出
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// 耗时 (毫秒)
    #[serde(default)]
    pub duration_ms: u64,
}

impl TaskReport {
    fn new(name: &str, action: &str, status: TaskStatus, required: bool) -> Self {
        Self {
            name: name.to_string(),
            action: action.to_string(),
            status,
            required,
            hosts: Vec::new(),
            error: None,
            reason: None,
            output: None,
            duration_ms: 0,
        }
    }

    /// 创建成功的结果
    pub fn success(name: &str, action: &str, required: bool) -> Self {
        Self::new(name, action, TaskStatus::Success, required)
    }

    /// 创建失败的结果
    pub fn failed(name: &str, action: &str, required: bool, error: impl Into<String>) -> Self {
        let mut report = Self::new(name, action, TaskStatus::Failed, required);
        report.error = Some(error.into());
        report
    }

    /// 创建跳过的结果
    pub fn skipped(name: &str, action: &str, required: bool, reason: impl Into<String>) -> Self {
        let mut report = Self::new(name, action, TaskStatus::Skipped, required);
        report.reason = Some(reason.into());
        report
    }

    pub fn with_hosts(mut self, hosts: Vec<String>) -> Self {
        self.hosts = hosts;
        self
    }

    pub fn with_output(mut self, output: Option<String>) -> Self {
        self.output = output;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    /// 是否为必需任务失败
    pub fn is_required_failure(&self) -> bool {
        self.required && self.status == TaskStatus::Failed
    }
}

/// 阶段结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseReport {
    pub phase: Phase,

    pub status: PhaseStatus,

    /// 导致阶段中止的致命错误
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fatal_error: Option<String>,

    pub tasks: Vec<TaskReport>,

    #[serde(default)]
    pub duration_ms: u64,
}

impl PhaseReport {
    /// 由任务结果汇总阶段状态: 任一必需任务失败则阶段失败
    pub fn from_tasks(phase: Phase, tasks: Vec<TaskReport>) -> Self {
        let status = if tasks.iter().any(TaskReport::is_required_failure) {
            PhaseStatus::Failed
        } else {
            PhaseStatus::Succeeded
        };

        Self {
            phase,
            status,
            fatal_error: None,
            tasks,
            duration_ms: 0,
        }
    }

    pub fn skipped(phase: Phase, tasks: Vec<TaskReport>) -> Self {
        Self {
            phase,
            status: PhaseStatus::Skipped,
            fatal_error: None,
            tasks,
            duration_ms: 0,
        }
    }

    /// 致命错误导致的阶段失败
    pub fn fatal(phase: Phase, error: impl Into<String>, tasks: Vec<TaskReport>) -> Self {
        Self {
            phase,
            status: PhaseStatus::Failed,
            fatal_error: Some(error.into()),
            tasks,
            duration_ms: 0,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    pub fn task(&self, name: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn is_failed(&self) -> bool {
        self.status == PhaseStatus::Failed
    }

    /// 按状态统计: (成功, 失败, 跳过)
    pub fn counts(&self) -> (usize, usize, usize) {
        self.tasks.iter().fold((0, 0, 0), |(s, f, k), t| match t.status {
            TaskStatus::Success => (s + 1, f, k),
            TaskStatus::Failed => (s, f + 1, k),
            TaskStatus::Skipped => (s, f, k + 1),
        })
    }
}

/// 运行结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// 场景名称
    pub scenario: String,

    pub status: RunStatus,

    /// 进程退出码，成功时为 0
    pub exit_code: i32,

    /// 加载阶段的致命错误
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fatal_error: Option<String>,

    pub phases: Vec<PhaseReport>,

    pub start_time: DateTime<Utc>,

    pub end_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub duration_ms: u64,
}

impl RunResult {
    /// 创建新的运行结果
    pub fn new(scenario: &str) -> Self {
        Self {
            scenario: scenario.to_string(),
            status: RunStatus::Failed,
            exit_code: 1,
            fatal_error: None,
            phases: Vec::new(),
            start_time: Utc::now(),
            end_time: None,
            duration_ms: 0,
        }
    }

    pub fn add_phase(&mut self, phase: PhaseReport) {
        self.phases.push(phase);
    }

    /// 记录致命错误及对应退出码
    pub fn set_fatal(&mut self, error: impl Into<String>, exit_code: i32) {
        self.fatal_error = Some(error.into());
        self.exit_code = exit_code;
    }

    /// 完成报告，计算总体状态与退出码
    pub fn finalize(&mut self) {
        let end_time = Utc::now();
        self.duration_ms = (end_time - self.start_time)
            .to_std()
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.end_time = Some(end_time);

        let failed = self.fatal_error.is_some() || self.phases.iter().any(PhaseReport::is_failed);
        if failed {
            self.status = RunStatus::Failed;
            if self.fatal_error.is_none() || self.exit_code == 0 {
                self.exit_code = 1;
            }
        } else {
            self.status = RunStatus::Succeeded;
            self.exit_code = 0;
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    pub fn phase(&self, phase: Phase) -> Option<&PhaseReport> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    /// 全部失败的资源/任务
    pub fn failed_tasks(&self) -> Vec<(Phase, &TaskReport)> {
        self.phases
            .iter()
            .flat_map(|p| {
                p.tasks
                    .iter()
                    .filter(|t| t.status == TaskStatus::Failed)
                    .map(move |t| (p.phase, t))
            })
            .collect()
    }

    /// 导出为 JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// 导出为 YAML
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_failure_does_not_fail_phase() {
        let phase = PhaseReport::from_tasks(
            Phase::Execute,
            vec![
                TaskReport::success("a", "execute", true),
                TaskReport::failed("b", "execute", false, "boom"),
            ],
        );
        assert_eq!(phase.status, PhaseStatus::Succeeded);
        assert_eq!(phase.counts(), (1, 1, 0));
    }

    #[test]
    fn test_required_failure_fails_run() {
        let mut result = RunResult::new("demo");
        result.add_phase(PhaseReport::from_tasks(
            Phase::Orchestrate,
            vec![TaskReport::failed("setup", "orchestrate", true, "exit 2")],
        ));
        result.finalize();

        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.exit_code, 1);
        let failed = result.failed_tasks();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, Phase::Orchestrate);
        assert_eq!(failed[0].1.error.as_deref(), Some("exit 2"));
    }

    #[test]
    fn test_fatal_exit_code_kept() {
        let mut result = RunResult::new("demo");
        result.set_fatal("模板渲染失败", 2);
        result.finalize();

        assert!(!result.is_success());
        assert_eq!(result.exit_code, 2);
    }

    #[test]
    fn test_success_exit_code() {
        let mut result = RunResult::new("demo");
        result.add_phase(PhaseReport::from_tasks(Phase::Load, Vec::new()));
        result.finalize();

        assert!(result.is_success());
        assert_eq!(result.exit_code, 0);
        assert!(result.end_time.is_some());
    }

    #[test]
    fn test_report_serialization() {
        let mut result = RunResult::new("demo");
        result.add_phase(PhaseReport::skipped(Phase::Report, Vec::new()));
        result.finalize();

        let json = result.to_json().unwrap();
        assert!(json.contains("\"status\": \"SUCCEEDED\""));
        assert!(json.contains("\"phase\": \"REPORT\""));

        let yaml = result.to_yaml().unwrap();
        assert!(yaml.contains("scenario: demo"));
    }
}
