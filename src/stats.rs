use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Capacity of each rolling diagnostic buffer.
pub const SAMPLE_CAPACITY: usize = 10;

/// Buffered payloads are clipped so the buffers stay small.
const SAMPLE_CLIP_BYTES: usize = 256;

/// Which counter a validation violation lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorBucket {
    Schema,
    Value,
    Null,
}

/// Monotonically accumulating validation counters plus two bounded sample
/// windows. Derived metrics are computed on read, never stored.
#[derive(Debug)]
pub struct ValidationStats {
    total_messages: u64,
    valid_messages: u64,
    invalid_messages: u64,
    schema_errors: u64,
    value_errors: u64,
    null_errors: u64,
    sample_messages: VecDeque<String>,
    error_messages: VecDeque<String>,
    start_time: DateTime<Utc>,
}

/// Point-in-time copy of the stats for on-demand reporting.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub total_messages: u64,
    pub valid_messages: u64,
    pub invalid_messages: u64,
    pub schema_errors: u64,
    pub value_errors: u64,
    pub null_errors: u64,
    pub validation_rate: f64,
    pub duration_seconds: f64,
    pub messages_per_second: f64,
    pub recent_samples: Vec<String>,
    pub recent_errors: Vec<String>,
}

impl ValidationStats {
    pub fn new() -> Self {
        Self {
            total_messages: 0,
            valid_messages: 0,
            invalid_messages: 0,
            schema_errors: 0,
            value_errors: 0,
            null_errors: 0,
            sample_messages: VecDeque::with_capacity(SAMPLE_CAPACITY),
            error_messages: VecDeque::with_capacity(SAMPLE_CAPACITY),
            start_time: Utc::now(),
        }
    }

    /// Commit one passing message.
    pub fn record_valid(&mut self, payload: &str) {
        self.total_messages += 1;
        self.valid_messages += 1;
        push_bounded(&mut self.sample_messages, clip(payload));
    }

    /// Commit one failing message; counters increment once per violation.
    pub fn record_invalid(&mut self, description: &str, buckets: &[ErrorBucket]) {
        self.total_messages += 1;
        self.invalid_messages += 1;
        for bucket in buckets {
            match bucket {
                ErrorBucket::Schema => self.schema_errors += 1,
                ErrorBucket::Value => self.value_errors += 1,
                ErrorBucket::Null => self.null_errors += 1,
            }
        }
        push_bounded(&mut self.error_messages, clip(description));
    }

    pub fn total_messages(&self) -> u64 {
        self.total_messages
    }

    pub fn valid_messages(&self) -> u64 {
        self.valid_messages
    }

    pub fn invalid_messages(&self) -> u64 {
        self.invalid_messages
    }

    pub fn schema_errors(&self) -> u64 {
        self.schema_errors
    }

    pub fn value_errors(&self) -> u64 {
        self.value_errors
    }

    pub fn null_errors(&self) -> u64 {
        self.null_errors
    }

    /// Percentage of messages passing all validation phases.
    pub fn validation_rate(&self) -> f64 {
        if self.total_messages == 0 {
            return 0.0;
        }
        self.valid_messages as f64 / self.total_messages as f64 * 100.0
    }

    pub fn duration_seconds(&self) -> f64 {
        (Utc::now() - self.start_time).num_milliseconds() as f64 / 1000.0
    }

    pub fn messages_per_second(&self) -> f64 {
        Self::throughput(self.total_messages, self.duration_seconds())
    }

    /// Throughput over a fixed window; zero-length windows yield zero.
    pub fn throughput(total: u64, duration_seconds: f64) -> f64 {
        if duration_seconds <= 0.0 {
            return 0.0;
        }
        total as f64 / duration_seconds
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_messages: self.total_messages,
            valid_messages: self.valid_messages,
            invalid_messages: self.invalid_messages,
            schema_errors: self.schema_errors,
            value_errors: self.value_errors,
            null_errors: self.null_errors,
            validation_rate: self.validation_rate(),
            duration_seconds: self.duration_seconds(),
            messages_per_second: self.messages_per_second(),
            recent_samples: self.sample_messages.iter().cloned().collect(),
            recent_errors: self.error_messages.iter().cloned().collect(),
        }
    }
}

impl Default for ValidationStats {
    fn default() -> Self {
        Self::new()
    }
}

fn push_bounded(buffer: &mut VecDeque<String>, entry: String) {
    if buffer.len() == SAMPLE_CAPACITY {
        buffer.pop_front();
    }
    buffer.push_back(entry);
}

fn clip(text: &str) -> String {
    if text.len() <= SAMPLE_CLIP_BYTES {
        return text.to_string();
    }
    let mut end = SAMPLE_CLIP_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
