//! Interval job scheduler.
//!
//! Each job runs on its own task with a fixed-period ticker. A tick that
//! arrives later than the misfire grace past its slot is skipped rather
//! than run late, and a job never overlaps itself (the tick loop awaits
//! the run). Job failures are logged and the schedule continues.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

pub struct JobScheduler {
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl JobScheduler {
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            shutdown_tx,
            shutdown_rx,
            handles: Vec::new(),
        }
    }

    pub fn register<F, Fut>(
        &mut self,
        name: &'static str,
        interval: Duration,
        misfire_grace: Duration,
        job: F,
    ) where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ledger_domain::Result<()>> + Send,
    {
        let mut shutdown = self.shutdown_rx.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last_tick: Option<Instant> = None;

            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {}
                }
                if *shutdown.borrow() {
                    break;
                }

                let now = Instant::now();
                if let Some(last) = last_tick {
                    let drift = now.saturating_duration_since(last).saturating_sub(interval);
                    if drift > misfire_grace {
                        tracing::warn!(job = name, drift_secs = drift.as_secs(), "misfired tick skipped");
                        last_tick = Some(now);
                        continue;
                    }
                }
                last_tick = Some(now);

                let started = Instant::now();
                match job().await {
                    Ok(()) => {
                        tracing::debug!(job = name, elapsed_ms = started.elapsed().as_millis() as u64, "job completed")
                    }
                    Err(e) => tracing::error!(job = name, error = %e, "job failed"),
                }
            }
            tracing::info!(job = name, "job loop stopped");
        });
        self.handles.push(handle);
        tracing::info!(job = name, interval_secs = interval.as_secs(), "job registered");
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
        tracing::info!("scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn job_runs_on_each_tick_and_stops_on_shutdown() {
        let counter = Arc::new(AtomicU32::new(0));
        let mut scheduler = JobScheduler::new();
        let c = counter.clone();
        scheduler.register(
            "test",
            Duration::from_millis(10),
            Duration::from_secs(60),
            move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
        );

        tokio::time::sleep(Duration::from_millis(60)).await;
        scheduler.shutdown().await;
        let ran = counter.load(Ordering::SeqCst);
        assert!(ran >= 2, "expected multiple runs, got {ran}");
    }

    #[tokio::test]
    async fn failing_job_keeps_scheduling() {
        let counter = Arc::new(AtomicU32::new(0));
        let mut scheduler = JobScheduler::new();
        let c = counter.clone();
        scheduler.register(
            "flaky",
            Duration::from_millis(10),
            Duration::from_secs(60),
            move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(ledger_domain::Error::internal("boom"))
                }
            },
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.shutdown().await;
        assert!(counter.load(Ordering::SeqCst) >= 2);
    }
}
