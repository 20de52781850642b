//! Periodic background jobs.

use std::future::Future;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub struct Scheduler {
    jobs: DashMap<String, JoinHandle<()>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            jobs: DashMap::new(),
        }
    }

    /// Runs `job` every `every`, first after one full interval. A job with
    /// the same id is replaced. Runs never overlap; missed ticks are skipped.
    pub fn add_job<F, Fut>(&self, id: impl Into<String>, every: Duration, job: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = id.into();
        let job_id = id.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                tracing::debug!(job = %job_id, "running scheduled job");
                job().await;
            }
        });

        if let Some(previous) = self.jobs.insert(id, handle) {
            previous.abort();
        }
    }

    pub fn remove_job(&self, id: &str) -> bool {
        match self.jobs.remove(id) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => {
                tracing::info!(job = id, "job does not exist");
                false
            }
        }
    }

    pub fn job_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.jobs.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Stops every job.
    pub fn shutdown(&self) {
        for entry in self.jobs.iter() {
            entry.value().abort();
        }
        self.jobs.clear();
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
