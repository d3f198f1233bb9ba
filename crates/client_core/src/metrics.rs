use std::{collections::VecDeque, time::Duration};

use chrono::{DateTime, Utc};

pub const METRICS_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMetric {
    pub method: String,
    pub path: String,
    pub duration: Duration,
    /// HTTP status of the response, `0` when none was received.
    pub status: u16,
    pub timestamp: DateTime<Utc>,
}

impl RequestMetric {
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

#[derive(Debug)]
pub struct MetricsBuffer {
    entries: VecDeque<RequestMetric>,
    capacity: usize,
}

impl Default for MetricsBuffer {
    fn default() -> Self {
        Self::with_capacity(METRICS_CAPACITY)
    }
}

impl MetricsBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, metric: RequestMetric) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(metric);
    }

    pub fn snapshot(&self) -> Vec<RequestMetric> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Mean request latency in whole milliseconds; `0` when nothing is recorded.
    pub fn average_response_ms(&self) -> u64 {
        if self.entries.is_empty() {
            return 0;
        }
        let total_ms: f64 = self
            .entries
            .iter()
            .map(|metric| metric.duration.as_secs_f64() * 1000.0)
            .sum();
        (total_ms / self.entries.len() as f64).round() as u64
    }

    pub fn error_rate(&self) -> u32 {
        if self.entries.is_empty() {
            return 0;
        }
        let errors = self.entries.iter().filter(|m| m.is_error()).count();
        ((errors as f64 / self.entries.len() as f64) * 100.0).round() as u32
    }
}

#[cfg(test)]
#[path = "tests/metrics_tests.rs"]
mod tests;
