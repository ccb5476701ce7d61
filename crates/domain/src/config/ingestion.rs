use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Validation caps
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "d_max_message")]
    pub max_message_length: usize,
    #[serde(default = "d_max_error_message")]
    pub max_error_message_length: usize,
    #[serde(default = "d_max_stack_trace")]
    pub max_stack_trace_length: usize,
    /// Cap on the serialized size of the attributes map, bytes.
    #[serde(default = "d_max_attributes")]
    pub max_attributes_bytes: usize,
    #[serde(default = "d_max_error_type")]
    pub max_error_type_length: usize,
    #[serde(default = "d_max_batch")]
    pub max_batch_logs: usize,
    /// How far in the future an event timestamp may lie, minutes.
    #[serde(default = "d_future_tolerance")]
    pub future_tolerance_minutes: i64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_message_length: d_max_message(),
            max_error_message_length: d_max_error_message(),
            max_stack_trace_length: d_max_stack_trace(),
            max_attributes_bytes: d_max_attributes(),
            max_error_type_length: d_max_error_type(),
            max_batch_logs: d_max_batch(),
            future_tolerance_minutes: d_future_tolerance(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Queue & workers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Enqueue is rejected once a project queue reaches this depth.
    #[serde(default = "d_max_depth")]
    pub max_depth: usize,
    /// Records popped per worker batch.
    #[serde(default = "d_batch_size")]
    pub batch_size: usize,
    #[serde(default = "d_worker_count")]
    pub worker_count: usize,
    /// Worker blocking-pop timeout, seconds.
    #[serde(default = "d_pop_timeout")]
    pub pop_timeout_secs: u64,
    /// Worker sleep when every queue is empty, seconds.
    #[serde(default = "d_idle_sleep")]
    pub idle_sleep_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_depth: d_max_depth(),
            batch_size: d_batch_size(),
            worker_count: d_worker_count(),
            pop_timeout_secs: d_pop_timeout(),
            idle_sleep_secs: d_idle_sleep(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Partitions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// How many months of daily partitions to keep pre-created.
    #[serde(default = "d_months_ahead")]
    pub months_ahead: u32,
    #[serde(default = "d_true")]
    pub scheduler_enabled: bool,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            months_ahead: d_months_ahead(),
            scheduler_enabled: true,
        }
    }
}

fn d_max_message() -> usize {
    10_000
}
fn d_max_error_message() -> usize {
    5_000
}
fn d_max_stack_trace() -> usize {
    50_000
}
fn d_max_attributes() -> usize {
    100_000
}
fn d_max_error_type() -> usize {
    255
}
fn d_max_batch() -> usize {
    1_000
}
fn d_future_tolerance() -> i64 {
    5
}
fn d_max_depth() -> usize {
    100_000
}
fn d_batch_size() -> usize {
    1_000
}
fn d_worker_count() -> usize {
    5
}
fn d_pop_timeout() -> u64 {
    30
}
fn d_idle_sleep() -> u64 {
    5
}
fn d_months_ahead() -> u32 {
    6
}
fn d_true() -> bool {
    true
}
