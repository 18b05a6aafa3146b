//! Operation history, rolling statistics and health classification.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Records kept before the oldest is evicted.
pub const HISTORY_CAPACITY: usize = 1_000;

/// Trailing records used for the rolling statistics.
pub const ROLLING_WINDOW: usize = 100;

/// Rolling error rate above which the manager is unhealthy.
pub const UNHEALTHY_ERROR_RATE: f64 = 0.5;

/// Rolling error rate above which the manager is degraded.
pub const DEGRADED_ERROR_RATE: f64 = 0.2;

/// Rolling average latency (ms) above which the manager is at least degraded.
pub const SLOW_LATENCY_MS: f64 = 30_000.0;

// ─── Records ─────────────────────────────────────────────────────────────────

/// One attempt of a wrapped operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationRecord {
    pub operation: String,
    /// 0-based attempt number within one `execute_with_retry` call.
    pub attempt: u32,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    /// Backoff waited before this attempt.
    pub delay_ms: u64,
    pub success: bool,
    pub error: Option<String>,
}

/// Snapshot of the most recent terminal failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastError {
    pub operation: String,
    pub message: String,
    pub attempts: u32,
    pub timestamp: DateTime<Utc>,
}

/// Counters, rolling statistics and bounded history.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReliabilityMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Mean attempt duration over the rolling window.
    pub average_latency_ms: f64,
    /// Failed share of the rolling window.
    pub error_rate: f64,
    pub history: VecDeque<OperationRecord>,
    pub last_error: Option<LastError>,
}

impl ReliabilityMetrics {
    /// Append one attempt, evict beyond capacity, refresh rolling stats.
    pub fn record(&mut self, record: OperationRecord) {
        self.total_requests += 1;
        if record.success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }

        self.history.push_back(record);
        while self.history.len() > HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.recompute();
    }

    /// The trailing rolling window, oldest first.
    pub fn window(&self) -> impl Iterator<Item = &OperationRecord> {
        let skip = self.history.len().saturating_sub(ROLLING_WINDOW);
        self.history.iter().skip(skip)
    }

    fn recompute(&mut self) {
        let (count, latency, failures) = self.window().fold((0usize, 0u64, 0usize), |acc, r| {
            (acc.0 + 1, acc.1 + r.duration_ms, acc.2 + usize::from(!r.success))
        });

        if count == 0 {
            self.average_latency_ms = 0.0;
            self.error_rate = 0.0;
        } else {
            self.average_latency_ms = latency as f64 / count as f64;
            self.error_rate = failures as f64 / count as f64;
        }
    }

    /// Drop failure counters, failed records and the last-error snapshot.
    /// Successful history and its counters survive.
    pub fn clear_failures(&mut self) {
        self.history.retain(|r| r.success);
        self.total_requests = self.total_requests.saturating_sub(self.failed_requests);
        self.failed_requests = 0;
        self.last_error = None;
        self.recompute();
    }
}

// ─── Health ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub error_rate: f64,
    pub average_latency_ms: f64,
    pub total_requests: u64,
    pub issues: Vec<String>,
    pub last_error: Option<LastError>,
    pub checked_at: DateTime<Utc>,
}

/// Classify health from the rolling statistics alone.
pub fn classify_health(metrics: &ReliabilityMetrics) -> HealthReport {
    let mut issues = Vec::new();

    let mut status = if metrics.error_rate > UNHEALTHY_ERROR_RATE {
        issues.push(format!("error rate {:.0}% is above 50%", metrics.error_rate * 100.0));
        HealthStatus::Unhealthy
    } else if metrics.error_rate > DEGRADED_ERROR_RATE {
        issues.push(format!("error rate {:.0}% is above 20%", metrics.error_rate * 100.0));
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    if metrics.average_latency_ms > SLOW_LATENCY_MS {
        issues.push(format!(
            "average latency {:.0}ms is above {SLOW_LATENCY_MS:.0}ms",
            metrics.average_latency_ms
        ));
        if status == HealthStatus::Healthy {
            status = HealthStatus::Degraded;
        }
    }

    HealthReport {
        status,
        error_rate: metrics.error_rate,
        average_latency_ms: metrics.average_latency_ms,
        total_requests: metrics.total_requests,
        issues,
        last_error: metrics.last_error.clone(),
        checked_at: Utc::now(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn record(success: bool, duration_ms: u64) -> OperationRecord {
        OperationRecord {
            operation: "op".into(),
            attempt: 0,
            timestamp: Utc::now(),
            duration_ms,
            delay_ms: 0,
            success,
            error: (!success).then(|| "boom".to_string()),
        }
    }

    #[test]
    fn test_history_is_capped_oldest_first() {
        let mut metrics = ReliabilityMetrics::default();
        for i in 0..(HISTORY_CAPACITY as u64 + 5) {
            metrics.record(record(true, i));
        }
        assert_eq!(metrics.history.len(), HISTORY_CAPACITY);
        assert_eq!(metrics.history.front().unwrap().duration_ms, 5);
        assert_eq!(metrics.total_requests, HISTORY_CAPACITY as u64 + 5);
    }

    #[test]
    fn test_rolling_window_uses_last_hundred() {
        let mut metrics = ReliabilityMetrics::default();
        for _ in 0..50 {
            metrics.record(record(false, 10));
        }
        for _ in 0..ROLLING_WINDOW {
            metrics.record(record(true, 20));
        }
        assert_eq!(metrics.error_rate, 0.0);
        assert_eq!(metrics.average_latency_ms, 20.0);
        assert_eq!(metrics.failed_requests, 50);
    }

    #[test]
    fn test_consecutive_failures_are_unhealthy() {
        for n in [1usize, 7, 100] {
            let mut metrics = ReliabilityMetrics::default();
            for _ in 0..n {
                metrics.record(record(false, 5));
            }
            assert_eq!(metrics.error_rate, 1.0);
            assert_eq!(classify_health(&metrics).status, HealthStatus::Unhealthy);
        }
    }

    #[test]
    fn test_degraded_thresholds() {
        let mut metrics = ReliabilityMetrics::default();
        for i in 0..10 {
            metrics.record(record(i >= 3, 5));
        }
        // 3 of 10 failed
        assert_eq!(classify_health(&metrics).status, HealthStatus::Degraded);

        let mut slow = ReliabilityMetrics::default();
        slow.record(record(true, 31_000));
        let report = classify_health(&slow);
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.issues.len(), 1);

        assert_eq!(
            classify_health(&ReliabilityMetrics::default()).status,
            HealthStatus::Healthy
        );
    }

    #[test]
    fn test_clear_failures_keeps_successes() {
        let mut metrics = ReliabilityMetrics::default();
        metrics.record(record(true, 5));
        metrics.record(record(false, 5));
        metrics.record(record(true, 5));
        metrics.last_error = Some(LastError {
            operation: "op".into(),
            message: "boom".into(),
            attempts: 1,
            timestamp: Utc::now(),
        });

        metrics.clear_failures();
        assert_eq!(metrics.history.len(), 2);
        assert_eq!(metrics.successful_requests, 2);
        assert_eq!(metrics.failed_requests, 0);
        assert_eq!(metrics.total_requests, 2);
        assert_eq!(metrics.error_rate, 0.0);
        assert!(metrics.last_error.is_none());
    }
}
