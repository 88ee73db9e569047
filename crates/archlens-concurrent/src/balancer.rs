use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerId(pub Uuid);

/// One slot of the pool. A worker runs a single unit of work at a time;
/// callers queue on its permit.
#[derive(Debug)]
pub struct Worker {
    pub id: WorkerId,
    pub index: usize,
    busy: AtomicBool,
    permit: Semaphore,
    executed: AtomicU64,
    panicked: AtomicU64,
    busy_micros: AtomicU64,
    queue_wait_micros: AtomicU64,
}

/// Outcome and timing of one unit of work on a worker.
#[derive(Debug)]
pub struct WorkerRun<O> {
    /// `Err` carries the panic message if the work panicked.
    pub outcome: std::result::Result<O, String>,
    pub started_at: DateTime<Utc>,
    pub queue_wait: Duration,
    pub duration: Duration,
}

impl Worker {
    pub fn new(index: usize) -> Arc<Self> {
        Arc::new(Self {
            id: WorkerId(Uuid::new_v4()),
            index,
            busy: AtomicBool::new(false),
            permit: Semaphore::new(1),
            executed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
            busy_micros: AtomicU64::new(0),
            queue_wait_micros: AtomicU64::new(0),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Relaxed)
    }

    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    pub fn panicked(&self) -> u64 {
        self.panicked.load(Ordering::Relaxed)
    }

    pub fn busy_time(&self) -> Duration {
        Duration::from_micros(self.busy_micros.load(Ordering::Relaxed))
    }

    pub fn total_queue_wait(&self) -> Duration {
        Duration::from_micros(self.queue_wait_micros.load(Ordering::Relaxed))
    }

    /// Wait for this worker's permit, then drive `work` to completion.
    ///
    /// `submitted` is when the work was handed to the pool; the gap until
    /// the permit is granted counts as queue wait. Panics inside `work` are
    /// caught and returned as `Err`.
    pub async fn execute<F>(&self, submitted: Instant, work: F) -> WorkerRun<F::Output>
    where
        F: Future,
    {
        let _permit = match self.permit.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return WorkerRun {
                    outcome: Err(format!("worker {} is shut down", self.index)),
                    started_at: Utc::now(),
                    queue_wait: submitted.elapsed(),
                    duration: Duration::ZERO,
                }
            }
        };

        let queue_wait = submitted.elapsed();
        self.queue_wait_micros
            .fetch_add(queue_wait.as_micros() as u64, Ordering::Relaxed);

        let started_at = Utc::now();
        let busy = BusyGuard::enter(self);
        let outcome = AssertUnwindSafe(work).catch_unwind().await;
        let duration = busy.finish();

        let outcome = outcome.map_err(|payload| {
            self.panicked.fetch_add(1, Ordering::Relaxed);
            panic_message(payload)
        });

        WorkerRun {
            outcome,
            started_at,
            queue_wait,
            duration,
        }
    }
}

/// Marks a worker busy while alive. Dropping it, including when the
/// executing future is cancelled mid-run, clears the flag and records the
/// busy time.
struct BusyGuard<'a> {
    worker: &'a Worker,
    start: Instant,
}

impl<'a> BusyGuard<'a> {
    fn enter(worker: &'a Worker) -> Self {
        worker.busy.store(true, Ordering::Relaxed);
        Self {
            worker,
            start: Instant::now(),
        }
    }

    fn finish(self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        self.worker
            .busy_micros
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.worker.executed.fetch_add(1, Ordering::Relaxed);
        self.worker.busy.store(false, Ordering::Relaxed);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("task panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("task panicked: {}", s)
    } else {
        "task panicked".to_string()
    }
}

/// Chooses the worker for the next unit of work.
pub trait Balancer: Send + Sync {
    fn name(&self) -> &'static str;
    fn pick(&self, pool: &WorkerPool) -> Option<Arc<Worker>>;
}

/// Cycles through every worker in index order, ignoring load.
pub struct RoundRobin {
    idx: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self {
            idx: AtomicUsize::new(0),
        }
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

impl Balancer for RoundRobin {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn pick(&self, pool: &WorkerPool) -> Option<Arc<Worker>> {
        let workers = pool.workers();
        if workers.is_empty() {
            return None;
        }
        let i = self.idx.fetch_add(1, Ordering::Relaxed) % workers.len();
        Some(workers[i].clone())
    }
}

/// Aggregate worker telemetry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancingMetrics {
    /// Share of pool capacity spent running work since the pool started, in `[0, 1]`.
    pub worker_utilization: f64,
    pub average_queue_wait: Duration,
    pub operations_per_second: f64,
    /// Workers running something right now.
    pub active_worker_count: usize,
}

/// Fixed set of workers created once per scheduler.
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<Arc<Worker>>,
    started: Instant,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        Self {
            workers: (0..size).map(Worker::new).collect(),
            started: Instant::now(),
        }
    }

    pub fn workers(&self) -> &[Arc<Worker>] {
        &self.workers
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn metrics(&self) -> LoadBalancingMetrics {
        let uptime = self.started.elapsed();
        let executed: u64 = self.workers.iter().map(|w| w.executed()).sum();
        let busy: Duration = self.workers.iter().map(|w| w.busy_time()).sum();
        let waited: Duration = self.workers.iter().map(|w| w.total_queue_wait()).sum();

        let capacity = uptime.as_secs_f64() * self.workers.len() as f64;
        let worker_utilization = if capacity > 0.0 {
            (busy.as_secs_f64() / capacity).clamp(0.0, 1.0)
        } else {
            0.0
        };

        LoadBalancingMetrics {
            worker_utilization,
            average_queue_wait: if executed == 0 {
                Duration::ZERO
            } else {
                waited.div_f64(executed as f64)
            },
            operations_per_second: if uptime.as_secs_f64() > 0.0 {
                executed as f64 / uptime.as_secs_f64()
            } else {
                0.0
            },
            active_worker_count: self.workers.iter().filter(|w| w.is_busy()).count(),
        }
    }
}
