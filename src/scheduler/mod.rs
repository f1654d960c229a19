pub mod tasks;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info};

pub type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Cron-driven recurring jobs that never overlap themselves.
///
/// A run that fires while the previous run of the same job is still going
/// is skipped, so a hung HTTP call cannot build up a backlog of polls.
pub struct Scheduler {
    inner: JobScheduler,
}

/// Held for the duration of one job run.
struct RunGate(Arc<Mutex<()>>);

impl RunGate {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(())))
    }

    /// `None` while an earlier run still holds the gate.
    fn try_begin(&self) -> Option<OwnedMutexGuard<()>> {
        Arc::clone(&self.0).try_lock_owned().ok()
    }
}

impl Scheduler {
    pub async fn new() -> Result<Self> {
        let inner = JobScheduler::new()
            .await
            .context("Failed to create job scheduler")?;
        Ok(Self { inner })
    }

    /// Add a job on a six-field cron expression (seconds first).
    pub async fn add_exclusive_job<F>(&self, cron_expr: &str, name: &str, task: F) -> Result<()>
    where
        F: Fn() -> JobFuture + Send + Sync + 'static,
    {
        let job_name = name.to_string();
        let gate = RunGate::new();
        let job = Job::new_async(cron_expr, move |_uuid, _lock| -> JobFuture {
            let Some(running) = gate.try_begin() else {
                debug!("Previous '{}' run still in progress, skipping", job_name);
                return Box::pin(async {});
            };
            let name = job_name.clone();
            let fut = task();
            Box::pin(async move {
                debug!("Running scheduled task: {}", name);
                fut.await;
                drop(running);
            })
        })
        .with_context(|| format!("Invalid schedule '{}' for job: {}", cron_expr, name))?;

        self.inner
            .add(job)
            .await
            .with_context(|| format!("Failed to add job: {}", name))?;

        info!("Scheduled task '{}' with cron: {}", name, cron_expr);
        Ok(())
    }

    pub async fn start(&self) -> Result<()> {
        self.inner
            .start()
            .await
            .context("Failed to start scheduler")?;
        info!("Scheduler started");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner
            .shutdown()
            .await
            .context("Failed to shutdown scheduler")?;
        info!("Scheduler stopped");
        Ok(())
    }
}
