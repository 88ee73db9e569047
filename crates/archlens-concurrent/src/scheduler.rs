use crate::balancer::{Balancer, LoadBalancingMetrics, RoundRobin, Worker, WorkerPool};
use archlens_core::{ArchLensError, Result, SchedulerSettings};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use metrics::{counter, gauge, histogram};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

type TaskWork<T> = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<T>> + Send>;

fn boxed_work<T, F, Fut>(work: F) -> TaskWork<T>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    Box::new(move || Box::pin(work()) as BoxFuture<'static, anyhow::Result<T>>)
}

/// Named unit of work for a flat fan-out.
pub struct Operation<T> {
    pub name: String,
    work: TaskWork<T>,
}

impl<T> Operation<T> {
    pub fn new<F, Fut>(name: impl Into<String>, work: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self {
            name: name.into(),
            work: boxed_work(work),
        }
    }
}

/// Named unit of work that may only start once its dependencies completed.
pub struct ScheduledTask<T> {
    pub name: String,
    pub dependencies: BTreeSet<String>,
    work: TaskWork<T>,
}

impl<T> ScheduledTask<T> {
    pub fn new<F, Fut>(name: impl Into<String>, work: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self {
            name: name.into(),
            dependencies: BTreeSet::new(),
            work: boxed_work(work),
        }
    }

    pub fn depends_on(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.insert(dependency.into());
        self
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies
            .extend(dependencies.into_iter().map(Into::into));
        self
    }
}

/// Per-task outcome. Failures are values here, never run errors.
#[derive(Debug, Clone)]
pub struct TaskResult<T> {
    pub name: String,
    pub outcome: std::result::Result<T, String>,
    /// `None` when the task never ran because a dependency failed.
    pub worker_index: Option<usize>,
    /// 1-based wave number; always 1 for balanced runs. A task failed by
    /// cascade carries the wave in which its dependency failed.
    pub wave: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Scheduler-wide completion order.
    pub completion_seq: u64,
    pub duration: Duration,
}

impl<T> TaskResult<T> {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn value(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&str> {
        self.outcome.as_ref().err().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerMetrics {
    pub current_concurrent_operations: usize,
    pub load_balancing: LoadBalancingMetrics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub worker_count: usize,
    /// Deadline for a whole run. `None` waits for every wave.
    pub run_timeout: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get().max(1),
            run_timeout: None,
        }
    }
}

impl From<&SchedulerSettings> for SchedulerConfig {
    fn from(settings: &SchedulerSettings) -> Self {
        Self {
            worker_count: settings.worker_count,
            run_timeout: settings.run_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Counts in-flight work while alive.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        let now = counter.fetch_add(1, Ordering::Relaxed) + 1;
        gauge!("archlens_scheduler_concurrent_operations").set(now as f64);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let now = self.0.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        gauge!("archlens_scheduler_concurrent_operations").set(now as f64);
    }
}

/// Dependency-aware executor over a fixed round-robin worker pool.
pub struct ConcurrentScheduler {
    pool: WorkerPool,
    balancer: Box<dyn Balancer>,
    config: SchedulerConfig,
    in_flight: Arc<AtomicUsize>,
    completion_seq: Arc<AtomicU64>,
}

impl ConcurrentScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_balancer(config, Box::new(RoundRobin::new()))
    }

    pub fn with_balancer(config: SchedulerConfig, balancer: Box<dyn Balancer>) -> Self {
        let worker_count = config.worker_count.max(1);
        info!(
            workers = worker_count,
            balancer = balancer.name(),
            timeout = ?config.run_timeout,
            "scheduler started"
        );
        Self {
            pool: WorkerPool::new(worker_count),
            balancer,
            config,
            in_flight: Arc::new(AtomicUsize::new(0)),
            completion_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn worker_count(&self) -> usize {
        self.pool.len()
    }

    pub fn metrics(&self) -> SchedulerMetrics {
        SchedulerMetrics {
            current_concurrent_operations: self.in_flight.load(Ordering::Relaxed),
            load_balancing: self.pool.metrics(),
        }
    }

    /// Run `tasks` in dependency waves. Results come back in completion order.
    ///
    /// The whole batch is checked before anything runs: duplicate names,
    /// unknown dependency names and dependency cycles abort the run with a
    /// configuration error and no task executes. A failed task fails its
    /// transitive dependents without running them.
    pub async fn execute_with_dependencies<T>(
        &self,
        tasks: Vec<ScheduledTask<T>>,
    ) -> Result<Vec<TaskResult<T>>>
    where
        T: Send + 'static,
    {
        validate_tasks(&tasks)?;
        self.with_deadline(self.run_waves(tasks)).await
    }

    /// Fan `operations` out across the pool with no ordering constraints.
    pub async fn execute_balanced<T>(
        &self,
        operations: Vec<Operation<T>>,
    ) -> Result<Vec<TaskResult<T>>>
    where
        T: Send + 'static,
    {
        let mut seen = HashSet::new();
        for op in &operations {
            if !seen.insert(op.name.as_str()) {
                return Err(ArchLensError::DuplicateTask(op.name.clone()));
            }
        }

        self.with_deadline(async {
            let count = operations.len();
            let mut set = JoinSet::new();
            for op in operations {
                self.spawn_on_worker(&mut set, op.name, op.work, 1)?;
            }
            let results = collect(&mut set).await?;
            debug!(operations = count, "balanced run finished");
            Ok(results)
        })
        .await
    }

    async fn run_waves<T>(&self, tasks: Vec<ScheduledTask<T>>) -> Result<Vec<TaskResult<T>>>
    where
        T: Send + 'static,
    {
        let total = tasks.len();
        let mut pending: BTreeMap<String, ScheduledTask<T>> =
            tasks.into_iter().map(|t| (t.name.clone(), t)).collect();
        let mut completed: HashSet<String> = HashSet::new();
        let mut failed: HashSet<String> = HashSet::new();
        let mut results = Vec::with_capacity(total);
        let mut wave = 0;

        while !pending.is_empty() {
            // Cascaded failures belong to the wave that produced the failure.
            results.extend(self.cascade_failures(&mut pending, &mut failed, wave));
            if pending.is_empty() {
                break;
            }
            wave += 1;

            let ready: Vec<String> = pending
                .values()
                .filter(|t| t.dependencies.iter().all(|d| completed.contains(d)))
                .map(|t| t.name.clone())
                .collect();

            if ready.is_empty() {
                let pending: Vec<String> = pending.into_keys().collect();
                warn!(?pending, "no runnable task left");
                return Err(ArchLensError::UnsatisfiableDependencies { pending });
            }

            debug!(wave, ready = ready.len(), remaining = pending.len(), "starting wave");
            let mut set = JoinSet::new();
            for name in ready {
                if let Some(task) = pending.remove(&name) {
                    self.spawn_on_worker(&mut set, task.name, task.work, wave)?;
                }
            }

            for result in collect(&mut set).await? {
                if result.is_success() {
                    completed.insert(result.name.clone());
                } else {
                    failed.insert(result.name.clone());
                }
                results.push(result);
            }
        }

        info!(
            tasks = total,
            waves = wave,
            failed = failed.len(),
            "dependency run finished"
        );
        Ok(results)
    }

    /// Fail, without running, every pending task downstream of a failure.
    fn cascade_failures<T>(
        &self,
        pending: &mut BTreeMap<String, ScheduledTask<T>>,
        failed: &mut HashSet<String>,
        wave: usize,
    ) -> Vec<TaskResult<T>> {
        let mut cascaded = Vec::new();
        loop {
            let doomed: Vec<(String, String)> = pending
                .values()
                .filter_map(|t| {
                    t.dependencies
                        .iter()
                        .find(|d| failed.contains(*d))
                        .map(|d| (t.name.clone(), d.clone()))
                })
                .collect();
            if doomed.is_empty() {
                return cascaded;
            }

            for (name, dependency) in doomed {
                pending.remove(&name);
                failed.insert(name.clone());
                counter!("archlens_scheduler_tasks_failed").increment(1);
                let now = Utc::now();
                cascaded.push(TaskResult {
                    name,
                    outcome: Err(format!("dependency {} failed", dependency)),
                    worker_index: None,
                    wave,
                    started_at: now,
                    completed_at: now,
                    completion_seq: self.completion_seq.fetch_add(1, Ordering::Relaxed),
                    duration: Duration::ZERO,
                });
            }
        }
    }

    fn spawn_on_worker<T>(
        &self,
        set: &mut JoinSet<TaskResult<T>>,
        name: String,
        work: TaskWork<T>,
        wave: usize,
    ) -> Result<()>
    where
        T: Send + 'static,
    {
        let worker: Arc<Worker> = self
            .balancer
            .pick(&self.pool)
            .ok_or_else(|| ArchLensError::InvalidOperation("worker pool is empty".to_string()))?;
        let in_flight = Arc::clone(&self.in_flight);
        let completion_seq = Arc::clone(&self.completion_seq);
        let submitted = Instant::now();

        set.spawn(async move {
            let run = worker
                .execute(submitted, async move {
                    let _guard = InFlight::enter(&in_flight);
                    work().await
                })
                .await;

            let outcome = match run.outcome {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(format!("{:#}", e)),
                Err(panic) => Err(panic),
            };
            let seq = completion_seq.fetch_add(1, Ordering::Relaxed);

            histogram!("archlens_scheduler_task_duration").record(run.duration);
            histogram!("archlens_scheduler_queue_wait").record(run.queue_wait);
            match &outcome {
                Ok(_) => counter!("archlens_scheduler_tasks_completed").increment(1),
                Err(error) => {
                    counter!("archlens_scheduler_tasks_failed").increment(1);
                    warn!(task = %name, worker = worker.index, %error, "task failed");
                }
            }

            TaskResult {
                name,
                outcome,
                worker_index: Some(worker.index),
                wave,
                started_at: run.started_at,
                completed_at: Utc::now(),
                completion_seq: seq,
                duration: run.duration,
            }
        });
        Ok(())
    }

    async fn with_deadline<F, R>(&self, run: F) -> Result<R>
    where
        F: Future<Output = Result<R>>,
    {
        match self.config.run_timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(?limit, "scheduler run timed out");
                    Err(ArchLensError::RunTimedOut(limit))
                }
            },
            None => run.await,
        }
    }
}

/// Join every spawned unit, ordered by completion sequence.
async fn collect<T>(set: &mut JoinSet<TaskResult<T>>) -> Result<Vec<TaskResult<T>>>
where
    T: Send + 'static,
{
    let mut results = Vec::with_capacity(set.len());
    while let Some(joined) = set.join_next().await {
        let result = joined
            .map_err(|e| ArchLensError::InvalidOperation(format!("scheduler task aborted: {}", e)))?;
        results.push(result);
    }
    results.sort_by_key(|r| r.completion_seq);
    Ok(results)
}

fn validate_tasks<T>(tasks: &[ScheduledTask<T>]) -> Result<()> {
    let mut names = HashSet::with_capacity(tasks.len());
    for task in tasks {
        if !names.insert(task.name.as_str()) {
            return Err(ArchLensError::DuplicateTask(task.name.clone()));
        }
    }
    for task in tasks {
        if let Some(missing) = task
            .dependencies
            .iter()
            .find(|d| !names.contains(d.as_str()))
        {
            return Err(ArchLensError::UnknownDependency {
                task: task.name.clone(),
                dependency: missing.clone(),
            });
        }
    }

    // Kahn's algorithm; whatever is left unsorted sits on or behind a cycle.
    let mut indegree: HashMap<&str, usize> = tasks
        .iter()
        .map(|t| (t.name.as_str(), t.dependencies.len()))
        .collect();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for task in tasks {
        for dep in &task.dependencies {
            dependents
                .entry(dep.as_str())
                .or_default()
                .push(task.name.as_str());
        }
    }

    let mut queue: VecDeque<&str> = indegree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(n, _)| *n)
        .collect();
    let mut sorted = 0;
    while let Some(name) = queue.pop_front() {
        sorted += 1;
        for &dependent in dependents.get(name).into_iter().flatten() {
            if let Some(d) = indegree.get_mut(dependent) {
                *d -= 1;
                if *d == 0 {
                    queue.push_back(dependent);
                }
            }
        }
    }

    if sorted < tasks.len() {
        let mut pending: Vec<String> = indegree
            .into_iter()
            .filter(|(_, d)| *d > 0)
            .map(|(n, _)| n.to_string())
            .collect();
        pending.sort();
        warn!(?pending, "dependency cycle detected");
        return Err(ArchLensError::UnsatisfiableDependencies { pending });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(name: &str) -> ScheduledTask<String> {
        let owned = name.to_string();
        ScheduledTask::new(name, move || async move { Ok(owned) })
    }

    #[test]
    fn test_validation_rejects_bad_batches() {
        let dup = vec![task("a"), task("a")];
        assert!(matches!(
            validate_tasks(&dup),
            Err(ArchLensError::DuplicateTask(n)) if n == "a"
        ));

        let unknown = vec![task("a").depends_on("ghost")];
        assert!(matches!(
            validate_tasks(&unknown),
            Err(ArchLensError::UnknownDependency { dependency, .. }) if dependency == "ghost"
        ));

        let cycle = vec![
            task("a").depends_on("b"),
            task("b").depends_on("a"),
            task("c"),
            task("d").depends_on("a"),
        ];
        match validate_tasks(&cycle) {
            Err(ArchLensError::UnsatisfiableDependencies { pending }) => {
                assert_eq!(pending, vec!["a", "b", "d"]);
            }
            other => panic!("expected cycle error, got {:?}", other),
        }
    }

    #[test]
    fn test_config_from_settings() {
        let settings = SchedulerSettings {
            worker_count: 3,
            run_timeout_secs: Some(5),
        };
        let config = SchedulerConfig::from(&settings);
        assert_eq!(config.worker_count, 3);
        assert_eq!(config.run_timeout, Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_self_dependency_is_a_cycle() {
        let scheduler = ConcurrentScheduler::new(SchedulerConfig {
            worker_count: 1,
            run_timeout: None,
        });
        let err = scheduler
            .execute_with_dependencies(vec![task("loop").depends_on("loop")])
            .await
            .unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_chain_runs_on_current_thread_runtime() {
        let scheduler = ConcurrentScheduler::new(SchedulerConfig {
            worker_count: 2,
            run_timeout: None,
        });
        let tasks = vec![task("second").depends_on("first"), task("first")];
        let results = tokio_test::block_on(scheduler.execute_with_dependencies(tasks)).unwrap();

        let waves: Vec<(&str, usize)> = results
            .iter()
            .map(|r| (r.name.as_str(), r.wave))
            .collect();
        assert_eq!(waves, vec![("first", 1), ("second", 2)]);
        assert_eq!(results[1].value().map(String::as_str), Some("second"));
    }
}
