//! The storage worker pool: drain project queues, persist batches,
//! shut down gracefully.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::watch;

use ledger_domain::config::Config;
use ledger_kv::{KvStore, LogQueue};

const PERSIST_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);

pub struct StorageWorker {
    worker_id: usize,
    config: Arc<Config>,
    pool: PgPool,
    queue: LogQueue,
    shutdown: watch::Receiver<bool>,
    processed: u64,
    failed: u64,
}

impl StorageWorker {
    fn new(
        worker_id: usize,
        config: Arc<Config>,
        pool: PgPool,
        kv: KvStore,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let queue = LogQueue::new(kv, config.queue.max_depth);
        Self {
            worker_id,
            config,
            pool,
            queue,
            shutdown,
            processed: 0,
            failed: 0,
        }
    }

    fn should_stop(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub async fn run(mut self) {
        tracing::info!(worker_id = self.worker_id, "storage worker started");
        let mut idle_sleep = Duration::from_secs(self.config.queue.idle_sleep_secs);
        let idle_cap = Duration::from_secs(self.config.queue.pop_timeout_secs);

        while !self.should_stop() {
            match self.drain_once().await {
                Ok(drained) if drained > 0 => {
                    idle_sleep = Duration::from_secs(self.config.queue.idle_sleep_secs);
                }
                Ok(_) => {
                    // Nothing queued anywhere; back off up to the cap.
                    self.sleep(idle_sleep).await;
                    idle_sleep = (idle_sleep * 2).min(idle_cap);
                }
                Err(e) => {
                    tracing::error!(worker_id = self.worker_id, error = %e, "worker loop error");
                    self.sleep(Duration::from_secs(5)).await;
                }
            }
        }

        tracing::info!(
            worker_id = self.worker_id,
            processed = self.processed,
            failed = self.failed,
            "storage worker stopped"
        );
    }

    /// One pass over every discovered queue. Returns total records drained.
    async fn drain_once(&mut self) -> ledger_domain::Result<usize> {
        let projects = self.queue.discover_queues().await?;
        let mut drained = 0;

        for project_id in projects {
            if self.should_stop() {
                break;
            }
            let batch = self
                .queue
                .pop_batch(project_id, self.config.queue.batch_size)
                .await?;
            if batch.is_empty() {
                continue;
            }
            drained += batch.len();
            self.persist_with_retry(project_id, &batch).await;
        }
        Ok(drained)
    }

    async fn persist_with_retry(
        &mut self,
        project_id: i64,
        batch: &[ledger_domain::log::QueuedLog],
    ) {
        for attempt in 1..=PERSIST_RETRIES {
            match crate::storage::persist_batch(&self.pool, project_id, batch).await {
                Ok(()) => {
                    self.processed += batch.len() as u64;
                    tracing::info!(
                        worker_id = self.worker_id,
                        project_id,
                        batch = batch.len(),
                        total = self.processed,
                        "batch committed"
                    );
                    return;
                }
                Err(e) if attempt < PERSIST_RETRIES => {
                    tracing::warn!(
                        worker_id = self.worker_id,
                        project_id,
                        attempt,
                        error = %e,
                        "batch insert failed, retrying"
                    );
                    self.sleep(RETRY_DELAY).await;
                }
                Err(e) => {
                    self.failed += batch.len() as u64;
                    tracing::error!(
                        worker_id = self.worker_id,
                        project_id,
                        batch = batch.len(),
                        error = %e,
                        "batch dropped after retries"
                    );
                }
            }
        }
    }

    /// Sleep that wakes early on shutdown.
    async fn sleep(&mut self, duration: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.shutdown.changed() => {}
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// WorkerManager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Owns the worker tasks and the shutdown signal.
pub struct WorkerManager {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl WorkerManager {
    pub fn start(config: Arc<Config>, pool: PgPool, kv: KvStore) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let count = config.queue.worker_count;

        let handles = (0..count)
            .map(|worker_id| {
                let worker = StorageWorker::new(
                    worker_id,
                    config.clone(),
                    pool.clone(),
                    kv.clone(),
                    shutdown_rx.clone(),
                );
                tokio::spawn(worker.run())
            })
            .collect();

        tracing::info!(workers = count, "storage workers started");
        Self {
            shutdown_tx,
            handles,
        }
    }

    /// Signal shutdown and wait for in-flight batches to finish.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
        tracing::info!("all storage workers stopped");
    }
}
