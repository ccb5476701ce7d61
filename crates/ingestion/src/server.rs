//! Ingestion servicer: validate → enrich → enqueue → notify.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tonic::{Request, Response, Status};

use ledger_domain::config::Config;
use ledger_domain::log::QueuedLog;
use ledger_kv::{KvStore, LogQueue, NotificationMessage, NotificationPublisher, RateLimiter};
use ledger_proto::convert::error_to_status;
use ledger_proto::ingestion::ingestion_service_server::IngestionService;
use ledger_proto::ingestion::*;

use crate::{enrich, validate};

pub struct IngestionServicer {
    config: Arc<Config>,
    queue: LogQueue,
    limiter: RateLimiter,
    publisher: NotificationPublisher,
}

impl IngestionServicer {
    pub fn new(config: Arc<Config>, kv: KvStore) -> Self {
        let queue = LogQueue::new(kv.clone(), config.queue.max_depth);
        let limiter = RateLimiter::new(kv.clone());
        let publisher = NotificationPublisher::new(kv);
        Self {
            config,
            queue,
            limiter,
            publisher,
        }
    }

    /// Count accepted logs against the daily quota. Counter failures must
    /// not fail an accepted ingest.
    async fn record_usage(&self, project_id: i64, accepted: i64) {
        if accepted == 0 {
            return;
        }
        if let Err(e) = self.limiter.increment_daily_usage(project_id, accepted).await {
            tracing::warn!(project_id, error = %e, "failed to increment daily usage");
        }
    }

    /// Publish qualifying events. Publish errors are logged and swallowed.
    async fn notify(&self, logs: &[QueuedLog]) {
        for log in logs {
            if !log.qualifies_for_notification() {
                continue;
            }
            let message = NotificationMessage::from_log(log);
            if let Err(e) = self.publisher.publish(&message).await {
                tracing::warn!(
                    project_id = log.project_id,
                    error = %e,
                    "failed to publish error notification"
                );
            }
        }
    }
}

#[tonic::async_trait]
impl IngestionService for IngestionServicer {
    async fn ingest_log(
        &self,
        request: Request<IngestLogRequest>,
    ) -> Result<Response<IngestLogResponse>, Status> {
        let started = Instant::now();
        let req = request.into_inner();
        let entry = req
            .log
            .ok_or_else(|| Status::invalid_argument("log is required"))?;

        let parsed = validate::parse_and_validate(&entry, &self.config.validation, Utc::now())
            .map_err(error_to_status)?;
        let processing_ms = started.elapsed().as_millis().min(i16::MAX as u128) as i16;
        let queued = enrich::enrich(parsed, req.project_id, Some(processing_ms));

        self.queue.enqueue(&queued).await.map_err(error_to_status)?;
        self.record_usage(req.project_id, 1).await;
        self.notify(std::slice::from_ref(&queued)).await;

        Ok(Response::new(IngestLogResponse {
            success: true,
            message: "Log accepted for processing".into(),
        }))
    }

    async fn ingest_log_batch(
        &self,
        request: Request<IngestLogBatchRequest>,
    ) -> Result<Response<IngestLogBatchResponse>, Status> {
        let started = Instant::now();
        let req = request.into_inner();

        if req.logs.is_empty() {
            return Err(Status::invalid_argument(
                "batch must contain at least one log entry",
            ));
        }
        let max = self.config.validation.max_batch_logs;
        if req.logs.len() > max {
            return Err(Status::invalid_argument(format!(
                "batch cannot exceed {max} log entries"
            )));
        }

        let now = Utc::now();
        let mut enriched = Vec::with_capacity(req.logs.len());
        let mut errors = Vec::new();

        for (idx, entry) in req.logs.iter().enumerate() {
            match validate::parse_and_validate(entry, &self.config.validation, now) {
                Ok(parsed) => {
                    let processing_ms =
                        started.elapsed().as_millis().min(i16::MAX as u128) as i16;
                    enriched.push(enrich::enrich(parsed, req.project_id, Some(processing_ms)));
                }
                Err(e) => {
                    tracing::debug!(project_id = req.project_id, idx, error = %e, "rejected batch entry");
                    errors.push(format!("Log {idx}: {e}"));
                }
            }
        }

        if !enriched.is_empty() {
            self.queue
                .enqueue_batch(&enriched)
                .await
                .map_err(error_to_status)?;
            self.record_usage(req.project_id, enriched.len() as i64).await;
            self.notify(&enriched).await;
        }

        Ok(Response::new(IngestLogBatchResponse {
            success: true,
            queued: enriched.len() as u32,
            failed: errors.len() as u32,
            error: if errors.is_empty() {
                None
            } else {
                Some(errors.join("; "))
            },
        }))
    }

    async fn get_queue_depth(
        &self,
        request: Request<QueueDepthRequest>,
    ) -> Result<Response<QueueDepthResponse>, Status> {
        let req = request.into_inner();
        let depth = self
            .queue
            .depth(req.project_id)
            .await
            .map_err(error_to_status)?;
        Ok(Response::new(QueueDepthResponse {
            depth: depth as u64,
        }))
    }
}
