//! 阶段调度器
//!
//! 阶段严格按顺序执行；阶段内任务按声明顺序启动，目标主机不相交的任务
//! 可以并发，相交的任务等待前面的任务完成后再启动。
//! 必需任务失败后不再启动新任务，已启动的任务运行完毕，其余记为跳过。
//! 只要 PROVISION 运行过，CLEANUP 总会运行。

use futures::future::{select_all, BoxFuture, FutureExt};
use orca_descriptor::{
    Asset, ConnectionAttributes, DescriptorLoader, ResourceModel, Task, TaskKind, VarSource,
};
use orca_plugin::{Dispatcher, PluginError, PluginRegistry, TaskInvocation};
use orca_resolver::{InventoryBuilder, ResolvedTargets, TargetResolver};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::connections::ConnectionStore;
use crate::inject::{DataInjector, InjectError};
use crate::phase::Phase;
use crate::report::{PhaseReport, RunResult, TaskReport, TaskStatus};
use crate::{EngineError, Result};

const SKIP_NOT_SELECTED: &str = "未被选中";
const SKIP_PRIOR_FAILURE: &str = "前序必需任务或阶段失败";
const SKIP_CANCELLED: &str = "已取消";

/// 流水线
pub struct Pipeline {
    config: PipelineConfig,
    dispatcher: Dispatcher,
    loader: DescriptorLoader,
}

impl Pipeline {
    pub fn new(registry: Arc<PluginRegistry>, config: PipelineConfig) -> Self {
        let dispatcher = Dispatcher::new(registry, config.plugin_timeout());
        Self {
            config,
            dispatcher,
            loader: DescriptorLoader::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn registry(&self) -> &PluginRegistry {
        self.dispatcher.registry()
    }

    /// LOAD 阶段: 渲染、解析、构建模型并检查插件
    ///
    /// 开启 `include_env` 时进程环境变量作为优先级最低的数据源
    pub fn load(&self, text: &str, sources: &[VarSource]) -> Result<ResourceModel> {
        let mut all_sources = Vec::with_capacity(sources.len() + 1);
        if self.config.template.include_env {
            all_sources.push(VarSource::from_env());
        }
        all_sources.extend_from_slice(sources);

        let model = self
            .loader
            .load_model(text, &all_sources, self.registry())?;
        self.registry().check_model(&model)?;

        info!(
            "场景 '{}' 加载完成: {} 个资产, {} 个组",
            model.name(),
            model.assets().len(),
            model.groups().len()
        );
        Ok(model)
    }

    /// 加载并运行场景
    pub async fn run_descriptor(&self, text: &str, sources: &[VarSource]) -> RunResult {
        let start = Instant::now();
        match self.load(text, sources) {
            Ok(model) => self.run_loaded(&model, start.elapsed()).await,
            Err(err) => load_failure(err),
        }
    }

    /// 运行已构建的模型
    pub async fn run_model(&self, model: &ResourceModel) -> RunResult {
        if let Err(err) = self.registry().check_model(model) {
            return load_failure(EngineError::from(err));
        }
        self.run_loaded(model, Duration::ZERO).await
    }

    /// 仅校验: 加载场景并解析每个任务的目标，不调用任何插件
    pub fn validate_descriptor(&self, text: &str, sources: &[VarSource]) -> RunResult {
        let start = Instant::now();
        let model = match self.load(text, sources) {
            Ok(model) => model,
            Err(err) => return load_failure(err),
        };

        let resolver = TargetResolver::new(&model);
        let tasks = TaskKind::ALL
            .iter()
            .flat_map(|kind| model.tasks(*kind))
            .map(|task| match resolve_targets(&model, &resolver, task) {
                Ok(resolved) => TaskReport::success(&task.name, task.kind.as_str(), task.required)
                    .with_hosts(resolved.assets),
                Err(err) => {
                    warn!("{}", err);
                    TaskReport::failed(&task.name, task.kind.as_str(), task.required, err.to_string())
                }
            })
            .collect();

        let mut result = RunResult::new(model.name());
        result.add_phase(PhaseReport::from_tasks(Phase::Load, tasks).with_duration(start.elapsed()));
        result.finalize();
        result
    }

    async fn run_loaded(&self, model: &ResourceModel, load_time: Duration) -> RunResult {
        let mut result = RunResult::new(model.name());
        result.add_phase(PhaseReport::from_tasks(Phase::Load, Vec::new()).with_duration(load_time));

        let store = ConnectionStore::new();
        let provision_selected = self.config.runs_phase(Phase::Provision);
        let mut halted = false;
        let mut attempted: Vec<String> = Vec::new();

        if provision_selected {
            let (report, started) = self.provision(model, &store).await;
            attempted = started;
            halted = report.is_failed();
            result.add_phase(report);
        } else {
            result.add_phase(PhaseReport::skipped(Phase::Provision, Vec::new()));
        }

        let mut dispatched_orchestrate: Vec<String> = Vec::new();
        let mut execute_statuses = Map::new();

        for phase in [Phase::Orchestrate, Phase::Execute, Phase::Report] {
            let Some(kind) = phase.task_kind() else { continue };
            let tasks = model.tasks(kind);

            if !self.config.runs_phase(phase) {
                result.add_phase(PhaseReport::skipped(phase, skip_all(tasks, SKIP_NOT_SELECTED)));
                continue;
            }
            if halted {
                warn!("阶段 {} 跳过: {}", phase, SKIP_PRIOR_FAILURE);
                result.add_phase(PhaseReport::skipped(phase, skip_all(tasks, SKIP_PRIOR_FAILURE)));
                continue;
            }

            let report = self.run_task_phase(phase, kind, model, &store, &execute_statuses).await;
            match kind {
                TaskKind::Orchestrate => {
                    dispatched_orchestrate = report
                        .tasks
                        .iter()
                        .filter(|t| t.status != TaskStatus::Skipped)
                        .map(|t| t.name.clone())
                        .collect();
                }
                TaskKind::Execute => {
                    execute_statuses = report
                        .tasks
                        .iter()
                        .map(|t| {
                            let status = serde_json::to_value(t.status).unwrap_or(Value::Null);
                            (t.name.clone(), status)
                        })
                        .collect();
                }
                TaskKind::Report => {}
            }

            halted = report.is_failed();
            result.add_phase(report);
        }

        if self.config.runs_phase(Phase::Cleanup) {
            let actions: Vec<&Task> = model
                .tasks(TaskKind::Orchestrate)
                .iter()
                .filter(|t| t.cleanup.is_some())
                .filter(|t| {
                    !self.config.runs_phase(Phase::Orchestrate)
                        || dispatched_orchestrate.contains(&t.name)
                })
                .collect();

            // 未运行 PROVISION 时清理全部可供应资产 (回收之前运行创建的资源)
            let assets: Vec<Asset> = if provision_selected {
                attempted
                    .iter()
                    .filter_map(|name| model.asset(name))
                    .cloned()
                    .collect()
            } else {
                model
                    .provisionable_assets()
                    .into_iter()
                    .filter(|a| self.config.selects_labels(&a.labels))
                    .cloned()
                    .collect()
            };

            let report = self.cleanup(model, &store, &actions, &assets).await;
            result.add_phase(report);
        } else {
            result.add_phase(PhaseReport::skipped(Phase::Cleanup, Vec::new()));
        }

        result.finalize();
        if result.is_success() {
            info!("场景 '{}' 执行成功", model.name());
        } else {
            error!(
                "场景 '{}' 执行失败: {} 个失败项",
                model.name(),
                result.failed_tasks().len()
            );
        }
        result
    }

    /// PROVISION 阶段
    ///
    /// 返回阶段报告与已尝试创建的资产 (声明顺序)
    async fn provision(&self, model: &ResourceModel, store: &ConnectionStore) -> (PhaseReport, Vec<String>) {
        let started_at = Instant::now();
        let assets: Vec<&Asset> = model
            .provisionable_assets()
            .into_iter()
            .filter(|a| self.config.selects_labels(&a.labels))
            .collect();
        info!("阶段 PROVISION 开始: {} 个资产", assets.len());

        let jobs: Vec<Job<CreateOutcome>> = assets
            .iter()
            .map(|asset| {
                let dispatcher = self.dispatcher.clone();
                let asset = (*asset).clone();
                Job {
                    hosts: vec![asset.name.clone()],
                    work: Work::Spawn(
                        async move {
                            let start = Instant::now();
                            let result = dispatcher.create(&asset).await;
                            (result, start.elapsed())
                        }
                        .boxed(),
                    ),
                }
            })
            .collect();

        let outcomes = run_jobs(jobs, self.config.worker_limit(), |outcome: &CreateOutcome| {
            match &outcome.0 {
                Err(err) if err.is_fatal() => Halt::Abort,
                _ => Halt::Continue,
            }
        })
        .await;

        let mut attempted = Vec::new();
        let mut fatal = None;
        let mut reports: HashMap<String, TaskReport> = HashMap::new();

        for (asset, outcome) in assets.iter().zip(outcomes) {
            let name = asset.name.as_str();
            let report = match outcome {
                JobOutcome::Done((Ok(connection), elapsed)) => {
                    attempted.push(name.to_string());
                    info!("资产 {} 供应完成: {:?}", name, connection.address());
                    store.record(name, connection).await;
                    TaskReport::success(name, "provision", true).with_duration(elapsed)
                }
                JobOutcome::Done((Err(err), elapsed)) => {
                    attempted.push(name.to_string());
                    error!("{}", err);
                    if err.is_fatal() && fatal.is_none() {
                        fatal = Some(err.to_string());
                    }
                    TaskReport::failed(name, "provision", true, err.to_string()).with_duration(elapsed)
                }
                JobOutcome::Cancelled => {
                    attempted.push(name.to_string());
                    TaskReport::skipped(name, "provision", true, SKIP_CANCELLED)
                }
                JobOutcome::NotStarted => TaskReport::skipped(name, "provision", true, SKIP_CANCELLED),
                JobOutcome::Panicked(message) => {
                    attempted.push(name.to_string());
                    TaskReport::failed(name, "provision", true, message)
                }
            };
            reports.insert(name.to_string(), report.with_hosts(vec![name.to_string()]));
        }

        // 报告按声明顺序排列，包含未被选中的资产
        let tasks = model
            .provisionable_assets()
            .into_iter()
            .map(|asset| {
                reports.remove(&asset.name).unwrap_or_else(|| {
                    TaskReport::skipped(&asset.name, "provision", true, SKIP_NOT_SELECTED)
                        .with_hosts(vec![asset.name.clone()])
                })
            })
            .collect();

        let report = match fatal {
            Some(error) => PhaseReport::fatal(Phase::Provision, error, tasks),
            None => PhaseReport::from_tasks(Phase::Provision, tasks),
        };
        info!("阶段 PROVISION 结束: {:?}", report.status);

        (report.with_duration(started_at.elapsed()), attempted)
    }

    /// ORCHESTRATE / EXECUTE / REPORT 阶段
    async fn run_task_phase(
        &self,
        phase: Phase,
        kind: TaskKind,
        model: &ResourceModel,
        store: &ConnectionStore,
        execute_statuses: &Map<String, Value>,
    ) -> PhaseReport {
        let started_at = Instant::now();
        let tasks = model.tasks(kind);
        info!("阶段 {} 开始: {} 个任务", phase, tasks.len());

        let connections = store.view(model).await;
        let resolver = TargetResolver::new(model);
        let injector = DataInjector::new(model, &connections);

        let jobs: Vec<Job<TaskReport>> = tasks
            .iter()
            .map(|task| {
                let context = report_context(task, execute_statuses);
                let env = TaskEnv {
                    model,
                    resolver: &resolver,
                    injector: &injector,
                    connections: &connections,
                };
                self.prepare_task(&env, task, context, false)
            })
            .collect();

        let outcomes = run_jobs(jobs, self.config.worker_limit(), |report: &TaskReport| {
            if report.is_required_failure() {
                Halt::Drain
            } else {
                Halt::Continue
            }
        })
        .await;

        let reports: Vec<TaskReport> = tasks
            .iter()
            .zip(outcomes)
            .map(|(task, outcome)| match outcome {
                JobOutcome::Done(report) => report,
                JobOutcome::NotStarted => {
                    TaskReport::skipped(&task.name, kind.as_str(), task.required, SKIP_PRIOR_FAILURE)
                }
                JobOutcome::Cancelled => {
                    TaskReport::skipped(&task.name, kind.as_str(), task.required, SKIP_CANCELLED)
                }
                JobOutcome::Panicked(message) => {
                    TaskReport::failed(&task.name, kind.as_str(), task.required, message)
                }
            })
            .collect();

        for report in reports.iter().filter(|r| r.status == TaskStatus::Failed) {
            error!(
                "任务 {} 失败{}: {}",
                report.name,
                if report.required { "" } else { " (可选)" },
                report.error.as_deref().unwrap_or_default()
            );
        }

        let report = PhaseReport::from_tasks(phase, reports).with_duration(started_at.elapsed());
        info!("阶段 {} 结束: {:?}", phase, report.status);
        report
    }

    /// CLEANUP 阶段
    ///
    /// 先按声明逆序执行编排任务的清理动作，再按声明逆序销毁资产，
    /// 每个资产只销毁一次。清理失败视为必需任务失败。
    async fn cleanup(
        &self,
        model: &ResourceModel,
        store: &ConnectionStore,
        actions: &[&Task],
        assets: &[Asset],
    ) -> PhaseReport {
        let started_at = Instant::now();
        info!(
            "阶段 CLEANUP 开始: {} 个清理动作, {} 个资产",
            actions.len(),
            assets.len()
        );

        let connections = store.view(model).await;
        let resolver = TargetResolver::new(model);
        let injector = DataInjector::new(model, &connections);
        let env = TaskEnv {
            model,
            resolver: &resolver,
            injector: &injector,
            connections: &connections,
        };

        let mut reports = Vec::with_capacity(actions.len() + assets.len());

        for task in actions.iter().rev() {
            let job = self.prepare_task(&env, task, Map::new(), true);
            let mut report = match job.work {
                Work::Ready(report) => report,
                Work::Spawn(future) => future.await,
            };
            report.required = true;
            if report.status == TaskStatus::Failed {
                error!("任务 {} 清理动作失败: {}", report.name, report.error.as_deref().unwrap_or_default());
            }
            reports.push(report);
        }

        for asset in assets.iter().rev() {
            let start = Instant::now();
            let report = match self.dispatcher.delete(asset).await {
                Ok(()) => {
                    info!("资产 {} 已销毁", asset.name);
                    TaskReport::success(&asset.name, "deprovision", true)
                }
                Err(err) => {
                    error!("{}", err);
                    TaskReport::failed(&asset.name, "deprovision", true, err.to_string())
                }
            };
            reports.push(
                report
                    .with_hosts(vec![asset.name.clone()])
                    .with_duration(start.elapsed()),
            );
        }

        let report = PhaseReport::from_tasks(Phase::Cleanup, reports).with_duration(started_at.elapsed());
        info!("阶段 CLEANUP 结束: {:?}", report.status);
        report
    }

    /// 准备任务调用: 筛选、目标解析、数据注入、清单构建
    ///
    /// 无需调用插件的结果 (跳过或准备失败) 直接作为就绪结果返回
    fn prepare_task(
        &self,
        env: &TaskEnv<'_>,
        task: &Task,
        context: Map<String, Value>,
        cleanup: bool,
    ) -> Job<TaskReport> {
        let action = if cleanup { "cleanup" } else { task.kind.as_str() };

        if !self.config.selects_task(&task.name) || !self.config.selects_labels(&task.labels) {
            debug!("任务 {} 未被选中", task.name);
            return Job::ready(TaskReport::skipped(&task.name, action, task.required, SKIP_NOT_SELECTED));
        }

        let resolved = match resolve_targets(env.model, env.resolver, task) {
            Ok(resolved) => resolved,
            Err(err) => {
                return Job::ready(TaskReport::failed(&task.name, action, task.required, err.to_string()));
            }
        };

        let raw_params = if cleanup {
            task.cleanup.clone().unwrap_or_default()
        } else {
            task.params.clone()
        };

        let injected = env
            .injector
            .as_ref()
            .map_err(Clone::clone)
            .and_then(|injector| injector.inject(&raw_params));
        let params = match injected {
            Ok(params) => params,
            Err(err) => {
                let err = PluginError::Orchestration {
                    task: task.name.clone(),
                    message: err.to_string(),
                };
                return Job::ready(
                    TaskReport::failed(&task.name, action, task.required, err.to_string())
                        .with_hosts(resolved.assets),
                );
            }
        };

        let inventory = InventoryBuilder::build(env.model, &resolved, env.connections);
        let invocation = TaskInvocation {
            name: task.name.clone(),
            kind: task.kind,
            cleanup,
            params,
            hosts: resolved.assets.clone(),
            context,
        };

        let dispatcher = self.dispatcher.clone();
        let plugin = task.plugin.clone();
        let timeout = task.timeout.map(Duration::from_secs);
        let required = task.required;
        let action = action.to_string();

        Job {
            hosts: resolved.assets,
            work: Work::Spawn(
                async move {
                    let start = Instant::now();
                    let report = match dispatcher.run(&plugin, &invocation, &inventory, timeout).await {
                        Ok(result) => TaskReport::success(&invocation.name, &action, required)
                            .with_output(result.output),
                        Err(err) => TaskReport::failed(&invocation.name, &action, required, err.to_string()),
                    };
                    report
                        .with_hosts(invocation.hosts.clone())
                        .with_duration(start.elapsed())
                }
                .boxed(),
            ),
        }
    }
}

/// 资产创建结果与耗时
type CreateOutcome = (orca_plugin::Result<ConnectionAttributes>, Duration);

/// 任务准备所需的只读上下文
struct TaskEnv<'a> {
    model: &'a ResourceModel,
    resolver: &'a TargetResolver<'a>,
    injector: &'a std::result::Result<DataInjector, InjectError>,
    connections: &'a HashMap<String, ConnectionAttributes>,
}

fn load_failure(err: EngineError) -> RunResult {
    error!("场景加载失败: {}", err);
    let mut result = RunResult::new("");
    result.add_phase(PhaseReport::fatal(Phase::Load, err.to_string(), Vec::new()));
    result.set_fatal(err.to_string(), err.exit_code());
    result.finalize();
    result
}

/// 解析任务目标
///
/// 未声明目标的报告任务默认使用所引用执行任务的目标并集
fn resolve_targets(
    model: &ResourceModel,
    resolver: &TargetResolver<'_>,
    task: &Task,
) -> orca_resolver::Result<ResolvedTargets> {
    if task.kind == TaskKind::Report && task.targets.is_empty() && !task.executes.is_empty() {
        let targets: Vec<String> = task
            .executes
            .iter()
            .filter_map(|name| model.task(TaskKind::Execute, name))
            .flat_map(|t| t.targets.iter().cloned())
            .collect();
        return resolver.resolve(&task.name, &targets, task.allow_empty);
    }
    resolver.resolve_task(task)
}

/// 报告任务的调用上下文: 所引用执行任务的状态
fn report_context(task: &Task, execute_statuses: &Map<String, Value>) -> Map<String, Value> {
    let mut context = Map::new();
    if task.kind != TaskKind::Report || task.executes.is_empty() {
        return context;
    }

    let statuses: Map<String, Value> = task
        .executes
        .iter()
        .map(|name| {
            let status = execute_statuses
                .get(name)
                .cloned()
                .unwrap_or_else(|| Value::String("skipped".to_string()));
            (name.clone(), status)
        })
        .collect();
    context.insert("executes".to_string(), Value::Object(statuses));
    context
}

fn skip_all(tasks: &[Task], reason: &str) -> Vec<TaskReport> {
    tasks
        .iter()
        .map(|t| TaskReport::skipped(&t.name, t.kind.as_str(), t.required, reason))
        .collect()
}

// ============================================
// 阶段内任务池
// ============================================

/// 任务结果对后续调度的影响
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Halt {
    /// 继续启动后续任务
    Continue,
    /// 不再启动新任务，等待已启动的任务完成
    Drain,
    /// 不再启动新任务，并取消已启动的任务
    Abort,
}

struct Job<T> {
    hosts: Vec<String>,
    work: Work<T>,
}

impl<T> Job<T> {
    fn ready(value: T) -> Self {
        Self {
            hosts: Vec::new(),
            work: Work::Ready(value),
        }
    }
}

enum Work<T> {
    /// 无需调用插件，结果已确定
    Ready(T),
    Spawn(BoxFuture<'static, T>),
}

enum JobOutcome<T> {
    Done(T),
    NotStarted,
    Cancelled,
    Panicked(String),
}

struct Running<T> {
    index: usize,
    hosts: Vec<String>,
    handle: JoinHandle<T>,
}

/// 按声明顺序启动任务，返回与输入一一对应的结果
async fn run_jobs<T, F>(jobs: Vec<Job<T>>, limit: usize, classify: F) -> Vec<JobOutcome<T>>
where
    T: Send + 'static,
    F: Fn(&T) -> Halt,
{
    let limit = limit.max(1);
    let mut outcomes: Vec<JobOutcome<T>> = Vec::with_capacity(jobs.len());
    outcomes.resize_with(jobs.len(), || JobOutcome::NotStarted);

    let mut running: Vec<Running<T>> = Vec::new();
    let mut halt = Halt::Continue;

    for (index, job) in jobs.into_iter().enumerate() {
        if halt != Halt::Continue {
            break;
        }

        match job.work {
            Work::Ready(value) => {
                halt = halt.max(classify(&value));
                outcomes[index] = JobOutcome::Done(value);
            }
            Work::Spawn(future) => {
                // 等待空闲槽位，且不与运行中的任务共享主机
                while running.len() >= limit || running.iter().any(|r| overlaps(&r.hosts, &job.hosts)) {
                    let (finished, output) = wait_next(&mut running).await;
                    halt = halt.max(record(&mut outcomes, finished, output, &classify));
                    if halt != Halt::Continue {
                        break;
                    }
                }
                if halt != Halt::Continue {
                    break;
                }

                running.push(Running {
                    index,
                    hosts: job.hosts,
                    handle: tokio::spawn(future),
                });
            }
        }
    }

    while !running.is_empty() {
        if halt == Halt::Abort {
            for r in running.drain(..) {
                r.handle.abort();
                outcomes[r.index] = JobOutcome::Cancelled;
            }
            break;
        }

        let (finished, output) = wait_next(&mut running).await;
        halt = halt.max(record(&mut outcomes, finished, output, &classify));
    }

    outcomes
}

async fn wait_next<T>(running: &mut Vec<Running<T>>) -> (usize, std::result::Result<T, JoinError>) {
    let (output, position, rest) = select_all(running.iter_mut().map(|r| &mut r.handle)).await;
    drop(rest);
    let finished = running.remove(position);
    (finished.index, output)
}

fn record<T, F>(
    outcomes: &mut [JobOutcome<T>],
    index: usize,
    output: std::result::Result<T, JoinError>,
    classify: &F,
) -> Halt
where
    F: Fn(&T) -> Halt,
{
    match output {
        Ok(value) => {
            let halt = classify(&value);
            outcomes[index] = JobOutcome::Done(value);
            halt
        }
        Err(err) => {
            outcomes[index] = JobOutcome::Panicked(format!("任务异常终止: {}", err));
            Halt::Drain
        }
    }
}

fn overlaps(a: &[String], b: &[String]) -> bool {
    a.iter().any(|h| b.contains(h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sleeper(hosts: &[&str], ms: u64, value: u32, active: Arc<AtomicUsize>, peak: Arc<AtomicUsize>) -> Job<u32> {
        Job {
            hosts: hosts.iter().map(|h| h.to_string()).collect(),
            work: Work::Spawn(
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    value
                }
                .boxed(),
            ),
        }
    }

    fn values(outcomes: &[JobOutcome<u32>]) -> Vec<Option<u32>> {
        outcomes
            .iter()
            .map(|o| match o {
                JobOutcome::Done(v) => Some(*v),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_disjoint_jobs_run_concurrently() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let jobs = vec![
            sleeper(&["h1"], 100, 1, active.clone(), peak.clone()),
            sleeper(&["h2"], 100, 2, active.clone(), peak.clone()),
        ];

        let outcomes = run_jobs(jobs, 4, |_| Halt::Continue).await;
        assert_eq!(values(&outcomes), vec![Some(1), Some(2)]);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_overlapping_jobs_serialized() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let jobs = vec![
            sleeper(&["h1", "h2"], 50, 1, active.clone(), peak.clone()),
            sleeper(&["h2"], 50, 2, active.clone(), peak.clone()),
        ];

        let outcomes = run_jobs(jobs, 4, |_| Halt::Continue).await;
        assert_eq!(values(&outcomes), vec![Some(1), Some(2)]);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_limit_respected() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let jobs = (0..4)
            .map(|i| sleeper(&[format!("h{}", i).as_str()], 30, i, active.clone(), peak.clone()))
            .collect();

        let outcomes = run_jobs(jobs, 2, |_| Halt::Continue).await;
        assert_eq!(outcomes.len(), 4);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_drain_stops_new_starts() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let jobs = vec![
            Job::ready(7),
            sleeper(&["h1"], 10, 1, active.clone(), peak.clone()),
        ];

        let outcomes = run_jobs(jobs, 4, |v| if *v == 7 { Halt::Drain } else { Halt::Continue }).await;
        assert_eq!(values(&outcomes), vec![Some(7), None]);
        assert!(matches!(outcomes[1], JobOutcome::NotStarted));
    }

    #[tokio::test]
    async fn test_abort_cancels_running() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let jobs = vec![
            sleeper(&["slow"], 5_000, 1, active.clone(), peak.clone()),
            sleeper(&["fast"], 10, 99, active.clone(), peak.clone()),
        ];

        let outcomes = run_jobs(jobs, 4, |v| if *v == 99 { Halt::Abort } else { Halt::Continue }).await;
        assert!(matches!(outcomes[0], JobOutcome::Cancelled));
        assert!(matches!(outcomes[1], JobOutcome::Done(99)));
    }
}
