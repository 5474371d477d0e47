//! Bounded pool of account lookup workers.
//!
//! Jobs go through a single bounded queue shared by every worker. Each job is
//! taken by exactly one worker; no ordering is promised between jobs. The
//! caller waits a bounded time for queue space and gets its answer on the
//! oneshot channel carried by the job.

use super::account::Account;
use super::repository::{AccountRepository, RepositoryError};
use crate::config::AccountConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

/// Work accepted by the account workers.
#[derive(Debug)]
pub enum AccountJob {
    FindByUsername {
        username: String,
        respond_to: oneshot::Sender<Result<Option<Account>, RepositoryError>>,
    },
}

/// Why a job could not be handed to the workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("account job queue stayed full")]
    Timeout,
    #[error("account workers have stopped")]
    Closed,
}

/// Fixed set of tasks serving [`AccountJob`]s from one shared queue.
#[derive(Debug)]
pub struct AccountWorkerPool {
    jobs: mpsc::Sender<AccountJob>,
    consume_timeout: Duration,
    workers: Vec<JoinHandle<()>>,
}

impl AccountWorkerPool {
    /// Spawns `config.workers` workers over `repository`.
    pub fn start(repository: Arc<dyn AccountRepository>, config: &AccountConfig) -> Self {
        let worker_count = config.workers.max(1);
        let (jobs, receiver) = mpsc::channel(config.job_queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..worker_count)
            .map(|index| tokio::spawn(run_worker(index, receiver.clone(), repository.clone())))
            .collect();

        info!(
            "👷 Started {} account workers (queue capacity {})",
            worker_count, config.job_queue_capacity
        );
        Self {
            jobs,
            consume_timeout: config.job_consume_timeout(),
            workers,
        }
    }

    /// Hands `job` to the workers, waiting at most the consume timeout for space.
    pub async fn submit(&self, job: AccountJob) -> Result<(), SubmitError> {
        match self.jobs.send_timeout(job, self.consume_timeout).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(SubmitError::Timeout),
            Err(SendTimeoutError::Closed(_)) => Err(SubmitError::Closed),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Jobs waiting for a worker.
    pub fn queued(&self) -> usize {
        self.jobs.max_capacity() - self.jobs.capacity()
    }

    /// Stops the workers without waiting for jobs in flight.
    pub fn shutdown(self) {
        for worker in &self.workers {
            worker.abort();
        }
        debug!("Account workers stopped");
    }
}

async fn run_worker(
    index: usize,
    jobs: Arc<Mutex<mpsc::Receiver<AccountJob>>>,
    repository: Arc<dyn AccountRepository>,
) {
    loop {
        // Hold the lock only while waiting, so other workers can take the next job.
        let job = { jobs.lock().await.recv().await };
        let Some(job) = job else {
            break;
        };
        match job {
            AccountJob::FindByUsername { username, respond_to } => {
                trace!("Worker {} looking up '{}'", index, username);
                let result = repository.find_by_username(&username).await;
                if respond_to.send(result).is_err() {
                    debug!("Requester of '{}' stopped waiting", username);
                }
            }
        }
    }
    debug!("Account worker {} exiting", index);
}
