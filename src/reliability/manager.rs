//! Reliability manager: bounded retry with backoff around any async
//! operation, plus the metrics and health state it feeds.
//!
//! The manager is a cheap `Clone` handle; every clone shares one state. Create
//! one per hosting context and pass it where it is needed.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;

use super::errors::ReliabilityError;
use super::metrics::{classify_health, HealthReport, LastError, OperationRecord, ReliabilityMetrics};
use super::policy::RetryPolicy;
use crate::schemas::{required_fields, SchemaId};

#[derive(Debug, Default)]
struct ManagerState {
    policy: RetryPolicy,
    metrics: ReliabilityMetrics,
}

/// Shared handle over retry policy and metrics.
#[derive(Debug, Clone, Default)]
pub struct ReliabilityManager {
    state: Arc<Mutex<ManagerState>>,
}

impl ReliabilityManager {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            state: Arc::new(Mutex::new(ManagerState {
                policy,
                metrics: ReliabilityMetrics::default(),
            })),
        }
    }

    /// The guard is never held across an `.await`.
    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.lock().policy.clone()
    }

    /// Replace the retry policy. Calls already in flight keep the old one.
    pub fn set_retry_policy(&self, policy: RetryPolicy) -> Result<(), ReliabilityError> {
        policy.validate()?;
        tracing::info!(
            max_retries = policy.max_retries,
            multiplier = policy.backoff_multiplier,
            initial_ms = policy.initial_delay.as_millis() as u64,
            max_ms = policy.max_delay.as_millis() as u64,
            "retry policy updated"
        );
        self.lock().policy = policy;
        Ok(())
    }

    // ─── Retry ───────────────────────────────────────────────────────────

    /// Run `operation` up to `max_retries + 1` times.
    ///
    /// Before attempt `k > 0` the manager sleeps for the policy's backoff.
    /// Every attempt is recorded. When all attempts fail the last cause is
    /// stored as the last-error snapshot and returned inside
    /// [`ReliabilityError::RetriesExhausted`].
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        name: &str,
        mut operation: F,
    ) -> Result<T, ReliabilityError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let policy = self.retry_policy();
        let attempts = policy.attempts();
        let mut last_error = String::new();

        for attempt in 0..attempts {
            let delay = policy.delay_for_attempt(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let started = Instant::now();
            let outcome = operation().await;
            let mut record = OperationRecord {
                operation: name.to_string(),
                attempt,
                timestamp: Utc::now(),
                duration_ms: started.elapsed().as_millis() as u64,
                delay_ms: delay.as_millis() as u64,
                success: outcome.is_ok(),
                error: None,
            };

            match outcome {
                Ok(value) => {
                    self.lock().metrics.record(record);
                    if attempt > 0 {
                        tracing::info!(operation = name, attempt, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    last_error = format!("{e:#}");
                    record.error = Some(last_error.clone());
                    self.lock().metrics.record(record);
                    tracing::warn!(
                        operation = name,
                        attempt,
                        remaining = attempts - attempt - 1,
                        error = %last_error,
                        "operation attempt failed"
                    );
                }
            }
        }

        self.lock().metrics.last_error = Some(LastError {
            operation: name.to_string(),
            message: last_error.clone(),
            attempts,
            timestamp: Utc::now(),
        });

        Err(ReliabilityError::RetriesExhausted {
            operation: name.to_string(),
            attempts,
            last_error,
        })
    }

    // ─── Validation ──────────────────────────────────────────────────────

    /// Pre-flight input check. Never retried, never recorded.
    ///
    /// The input must be a JSON object with no blank string fields and every
    /// field the schema requires.
    pub fn validate_input(
        &self,
        schema: SchemaId,
        input: &Value,
        name: &str,
    ) -> Result<(), ReliabilityError> {
        let invalid = |reason: String| ReliabilityError::Validation {
            operation: name.to_string(),
            reason,
        };

        let Some(object) = input.as_object() else {
            return Err(invalid(format!("input must be a JSON object for schema '{schema}'")));
        };

        if let Some((field, _)) = object
            .iter()
            .find(|(_, v)| v.as_str().is_some_and(|s| s.trim().is_empty()))
        {
            return Err(invalid(format!("field '{field}' must not be empty")));
        }

        if let Some(missing) = required_fields(schema)
            .iter()
            .find(|field| object.get(**field).map_or(true, Value::is_null))
        {
            return Err(invalid(format!("missing required field '{missing}'")));
        }

        Ok(())
    }

    // ─── Metrics & Health ────────────────────────────────────────────────

    /// Snapshot of the current metrics.
    pub fn metrics(&self) -> ReliabilityMetrics {
        self.lock().metrics.clone()
    }

    pub fn health_check(&self) -> HealthReport {
        classify_health(&self.lock().metrics)
    }

    /// Clear failure counters and the last error; successful history stays.
    pub fn reset_metrics(&self) {
        self.lock().metrics.clear_failures();
        tracing::info!("reliability failure metrics reset");
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reliability::metrics::HealthStatus;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn quick_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff_multiplier: 2.0,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(30),
        }
    }

    #[tokio::test]
    async fn test_always_failing_runs_max_retries_plus_one() {
        let manager = ReliabilityManager::new(quick_policy(3));
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = manager
            .execute_with_retry("flaky", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(anyhow::anyhow!("attempt {n} failed"))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result.unwrap_err() {
            ReliabilityError::RetriesExhausted {
                attempts,
                last_error,
                ..
            } => {
                assert_eq!(attempts, 4);
                assert_eq!(last_error, "attempt 3 failed");
            }
            other => panic!("unexpected {other:?}"),
        }

        let metrics = manager.metrics();
        let delays: Vec<u64> = metrics.history.iter().map(|r| r.delay_ms).collect();
        // min(10 * 2^(k-1), 30)
        assert_eq!(delays, vec![0, 10, 20, 30]);
        assert_eq!(metrics.failed_requests, 4);
        assert_eq!(metrics.last_error.unwrap().message, "attempt 3 failed");
        assert_eq!(manager.health_check().status, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let manager = ReliabilityManager::new(quick_policy(3));
        let calls = AtomicU32::new(0);

        let value = manager
            .execute_with_retry("eventually", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    anyhow::bail!("not yet");
                }
                Ok(42)
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        let metrics = manager.metrics();
        assert_eq!(metrics.total_requests, 3);
        assert_eq!(metrics.successful_requests, 1);
        assert!(metrics.last_error.is_none());
    }

    #[tokio::test]
    async fn test_zero_retries_makes_one_attempt() {
        let manager = ReliabilityManager::new(quick_policy(0));
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = manager
            .execute_with_retry("once", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(anyhow::anyhow!("nope"))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reset_keeps_successes() {
        let manager = ReliabilityManager::new(quick_policy(0));
        manager
            .execute_with_retry("ok", || async { anyhow::Ok(()) })
            .await
            .unwrap();
        let _ = manager
            .execute_with_retry("bad", || async { Err::<(), _>(anyhow::anyhow!("boom")) })
            .await;

        manager.reset_metrics();
        let metrics = manager.metrics();
        assert_eq!(metrics.history.len(), 1);
        assert_eq!(metrics.failed_requests, 0);
        assert!(metrics.last_error.is_none());
        assert_eq!(manager.health_check().status, HealthStatus::Healthy);
    }

    #[test]
    fn test_clones_share_state() {
        let manager = ReliabilityManager::default();
        let other = manager.clone();
        other.set_retry_policy(quick_policy(7)).unwrap();
        assert_eq!(manager.retry_policy().max_retries, 7);

        let bad = RetryPolicy {
            backoff_multiplier: -1.0,
            ..Default::default()
        };
        assert!(manager.set_retry_policy(bad).is_err());
        assert_eq!(manager.retry_policy().max_retries, 7);
    }

    #[test]
    fn test_validate_input() {
        let manager = ReliabilityManager::default();
        let schema = SchemaId::GenerateRoutes;

        assert!(manager
            .validate_input(schema, &json!({"task": "read a file"}), "generate_routes")
            .is_ok());

        for bad in [json!("text"), json!([1]), json!({"task": "  "}), json!({}), json!({"task": null})] {
            let err = manager.validate_input(schema, &bad, "generate_routes").unwrap_err();
            assert!(matches!(err, ReliabilityError::Validation { .. }), "{bad}");
        }

        // empty strings fail even in optional fields
        let err = manager
            .validate_input(SchemaId::ListTools, &json!({"category": ""}), "list_tools")
            .unwrap_err();
        assert!(err.to_string().contains("'category'"));

        // validation is not recorded
        assert_eq!(manager.metrics().total_requests, 0);
    }
}
