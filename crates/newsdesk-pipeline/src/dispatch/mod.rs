//! In-process task dispatcher.
//!
//! Jobs are JSON payloads addressed to a [`Stage`]. A fixed pool of tokio
//! workers pulls them from one bounded queue and runs the registered handler.
//!
//! Delivery is at-least-once: a handler that panics is treated as a crashed
//! worker and its job is put back on the queue, up to
//! [`DispatcherConfig::max_redeliveries`] times. Handler errors are reported
//! as job failures and never retried here; retry policy belongs to the
//! orchestration layer. There is no ordering between jobs.

mod error;
mod registry;

use std::{
  collections::HashMap,
  marker::PhantomData,
  sync::{Arc, Mutex, PoisonError},
  time::Duration,
};

use chrono::{DateTime, Utc};
use newsdesk_core::ErrorKind;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use uuid::Uuid;

pub use error::{DispatchError, JobError, JobFailure};
pub use registry::{Registry, Stage, StageDef};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
  /// Number of worker tasks.
  pub workers:          usize,
  /// Capacity of the job queue; `enqueue` waits while it is full.
  pub queue_capacity:   usize,
  /// How often a job whose handler panicked is redelivered before it is
  /// failed as crashed.
  pub max_redeliveries: u32,
  /// Finished jobs are forgotten once more than this many jobs are tracked.
  pub max_tracked_jobs: usize,
}

impl Default for DispatcherConfig {
  fn default() -> Self {
    Self {
      workers:          4,
      queue_capacity:   256,
      max_redeliveries: 2,
      max_tracked_jobs: 10_000,
    }
  }
}

// ─── Job state ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
  Queued,
  Running,
  Succeeded,
  Failed,
}

impl JobStatus {
  pub fn is_finished(self) -> bool { matches!(self, Self::Succeeded | Self::Failed) }
}

/// Point-in-time view of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
  pub job_id:      Uuid,
  pub stage:       Stage,
  pub status:      JobStatus,
  /// Number of deliveries so far (1 on the first run).
  pub attempts:    u32,
  pub enqueued_at: DateTime<Utc>,
  pub finished_at: Option<DateTime<Utc>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub output:      Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub failure:     Option<JobFailure>,
}

impl JobSnapshot {
  pub fn is_finished(&self) -> bool { self.status.is_finished() }
}

struct Job {
  id:      Uuid,
  stage:   Stage,
  payload: Value,
  attempt: u32,
}

/// State shared between the dispatcher front end and its workers.
struct Shared {
  registry: Registry,
  config:   DispatcherConfig,
  jobs:     Mutex<HashMap<Uuid, watch::Sender<JobSnapshot>>>,
}

impl Shared {
  fn update(&self, id: Uuid, f: impl FnOnce(&mut JobSnapshot)) {
    let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(tx) = jobs.get(&id) {
      tx.send_modify(f);
    }
  }

  fn track(&self, snapshot: JobSnapshot) -> watch::Receiver<JobSnapshot> {
    let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
    if jobs.len() >= self.config.max_tracked_jobs {
      jobs.retain(|_, tx| !tx.borrow().is_finished());
    }
    let (tx, rx) = watch::channel(snapshot.clone());
    jobs.insert(snapshot.job_id, tx);
    rx
  }
}

// ─── Dispatcher ──────────────────────────────────────────────────────────────

/// Handle to a running worker pool. Cloning is cheap; the pool stops once
/// every clone has been dropped and the queue has drained.
#[derive(Clone)]
pub struct Dispatcher {
  tx:     mpsc::Sender<Job>,
  shared: Arc<Shared>,
}

impl Dispatcher {
  /// Validate `registry` and spawn the worker pool. Must be called from within
  /// a tokio runtime.
  pub fn start(registry: Registry, config: DispatcherConfig) -> Result<Self, DispatchError> {
    registry.validate()?;
    if config.workers == 0 {
      return Err(DispatchError::NoWorkers);
    }

    let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
    let rx = Arc::new(tokio::sync::Mutex::new(rx));
    let shared = Arc::new(Shared { registry, config, jobs: Mutex::new(HashMap::new()) });

    for worker in 0..shared.config.workers {
      let rx = rx.clone();
      let shared = shared.clone();
      let requeue = tx.downgrade();
      tokio::spawn(async move {
        loop {
          let job = rx.lock().await.recv().await;
          let Some(job) = job else { break };
          run_job(&shared, &requeue, worker, job).await;
        }
      });
    }
    info!(workers = shared.config.workers, "dispatcher started");

    Ok(Self { tx, shared })
  }

  /// Queue one invocation of stage `D`.
  pub async fn enqueue<D: StageDef>(
    &self,
    input: D::Input,
  ) -> Result<JobHandle<D::Output>, DispatchError> {
    let payload = serde_json::to_value(input).map_err(DispatchError::Payload)?;
    let job_id = Uuid::new_v4();
    let rx = self.shared.track(JobSnapshot {
      job_id,
      stage: D::STAGE,
      status: JobStatus::Queued,
      attempts: 0,
      enqueued_at: Utc::now(),
      finished_at: None,
      output: None,
      failure: None,
    });

    let job = Job { id: job_id, stage: D::STAGE, payload, attempt: 1 };
    if self.tx.send(job).await.is_err() {
      self.shared.update(job_id, |s| {
        s.status = JobStatus::Failed;
        s.failure = Some(JobFailure::new(ErrorKind::TransientIo, "dispatcher queue is closed"));
      });
      return Err(DispatchError::Closed);
    }

    Ok(JobHandle { job_id, rx, _output: PhantomData })
  }

  /// Current state of a job, if it is still tracked.
  pub fn snapshot(&self, job_id: Uuid) -> Option<JobSnapshot> {
    let jobs = self.shared.jobs.lock().unwrap_or_else(PoisonError::into_inner);
    jobs.get(&job_id).map(|tx| tx.borrow().clone())
  }
}

async fn run_job(shared: &Shared, requeue: &mpsc::WeakSender<Job>, worker: usize, job: Job) {
  let Some(handler) = shared.registry.get(job.stage).cloned() else {
    // Unreachable after `Registry::validate`, but never leave a job hanging.
    finish(shared, job.id, Err(JobFailure::new(ErrorKind::Invalid, "no handler")));
    return;
  };

  shared.update(job.id, |s| {
    s.status = JobStatus::Running;
    s.attempts = job.attempt;
  });
  info!(stage = %job.stage, job_id = %job.id, attempt = job.attempt, worker, "job started");

  // Run the handler on its own task so a panic is contained and observable.
  let outcome = tokio::spawn(handler(job.payload.clone())).await;

  match outcome {
    Ok(Ok(output)) => {
      info!(stage = %job.stage, job_id = %job.id, "job succeeded");
      finish(shared, job.id, Ok(output));
    }
    Ok(Err(failure)) => {
      error!(stage = %job.stage, job_id = %job.id, %failure, "job failed");
      finish(shared, job.id, Err(failure));
    }
    Err(join_err) => {
      let reason = if join_err.is_panic() { "handler panicked" } else { "handler was cancelled" };
      if job.attempt <= shared.config.max_redeliveries {
        warn!(stage = %job.stage, job_id = %job.id, attempt = job.attempt, reason, "redelivering job");
        redeliver(shared, requeue, Job { attempt: job.attempt + 1, ..job });
      } else {
        error!(stage = %job.stage, job_id = %job.id, attempt = job.attempt, reason, "job crashed");
        let failure = JobFailure::new(
          ErrorKind::Crashed,
          format!("{reason} on {} deliveries", job.attempt),
        );
        finish(shared, job.id, Err(failure));
      }
    }
  }
}

fn redeliver(shared: &Shared, requeue: &mpsc::WeakSender<Job>, job: Job) {
  let id = job.id;
  shared.update(id, |s| s.status = JobStatus::Queued);
  match requeue.upgrade() {
    // Sending from a detached task keeps a full queue from stalling the worker.
    Some(tx) => {
      tokio::spawn(async move {
        let _ = tx.send(job).await;
      });
    }
    None => finish(shared, id, Err(JobFailure::new(ErrorKind::Crashed, "dispatcher shut down"))),
  }
}

fn finish(shared: &Shared, id: Uuid, result: Result<Value, JobFailure>) {
  shared.update(id, |s| {
    s.finished_at = Some(Utc::now());
    match result {
      Ok(output) => {
        s.status = JobStatus::Succeeded;
        s.output = Some(output);
      }
      Err(failure) => {
        s.status = JobStatus::Failed;
        s.failure = Some(failure);
      }
    }
  });
}

// ─── Handles ─────────────────────────────────────────────────────────────────

/// Typed handle to one enqueued job.
pub struct JobHandle<O> {
  job_id:  Uuid,
  rx:      watch::Receiver<JobSnapshot>,
  _output: PhantomData<fn() -> O>,
}

impl<O: DeserializeOwned> JobHandle<O> {
  pub fn job_id(&self) -> Uuid { self.job_id }

  pub fn snapshot(&self) -> JobSnapshot { self.rx.borrow().clone() }

  /// Wait up to `timeout` for the job to finish.
  ///
  /// A timeout does not cancel the job: it keeps running and may still
  /// complete, and the handle can be awaited again.
  pub async fn await_result(&mut self, timeout: Duration) -> Result<O, JobError> {
    let waited = tokio::time::timeout(timeout, self.rx.wait_for(JobSnapshot::is_finished)).await;
    let snapshot = match waited {
      Err(_) => return Err(JobError::Timeout(self.job_id)),
      Ok(Err(_)) => return Err(JobError::Lost(self.job_id)),
      Ok(Ok(snapshot)) => snapshot.clone(),
    };

    match (snapshot.status, snapshot.output, snapshot.failure) {
      (JobStatus::Succeeded, output, _) => {
        serde_json::from_value(output.unwrap_or(Value::Null)).map_err(JobError::Decode)
      }
      (_, _, Some(failure)) => Err(JobError::Failed(failure)),
      (_, _, None) => Err(JobError::Lost(self.job_id)),
    }
  }
}
