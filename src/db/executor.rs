use std::sync::Arc;
use std::time::Duration;

use crate::db::{ConnectionSource, DbError, QueryRequest, Row, SqlParam};

/// How often and how patiently a broken connection is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Result of [`Executor::execute_query`]. Failures carry only a message.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Success { rows: Vec<Row> },
    Failure { error: String },
}

/// Runs database operations, rebuilding the pool and retrying when the
/// connection breaks. Statement errors are never retried.
#[derive(Clone)]
pub struct Executor {
    source: Arc<dyn ConnectionSource>,
    policy: RetryPolicy,
}

impl Executor {
    pub fn new(source: Arc<dyn ConnectionSource>) -> Self {
        Self::with_policy(source, RetryPolicy::default())
    }

    pub fn with_policy(source: Arc<dyn ConnectionSource>, policy: RetryPolicy) -> Self {
        Self { source, policy }
    }

    /// Runs ad-hoc SQL. Every failure, including an exhausted retry budget,
    /// is folded into [`QueryOutcome::Failure`].
    pub async fn execute_query(&self, sql: &str, params: Vec<SqlParam>) -> QueryOutcome {
        let request = QueryRequest::Sql {
            sql: sql.to_string(),
            params,
        };

        match self.run(&request).await {
            Ok(rows) => QueryOutcome::Success { rows },
            Err(e) => QueryOutcome::Failure {
                error: e.to_string(),
            },
        }
    }

    /// Calls a stored procedure and returns its first result set. The last
    /// error is returned unchanged once retries are used up.
    pub async fn call_procedure(
        &self,
        name: &str,
        params: Vec<SqlParam>,
    ) -> Result<Vec<Row>, DbError> {
        let request = QueryRequest::Procedure {
            name: name.to_string(),
            params,
        };

        self.run(&request).await
    }

    /// True when a trivial query goes through on the first attempt. The pool
    /// is never reset from here.
    pub async fn test_connection(&self) -> bool {
        let request = QueryRequest::Sql {
            sql: "SELECT 1".to_string(),
            params: Vec::new(),
        };

        match self.source.run(&request).await {
            Ok(_) => {
                tracing::debug!("Database connection check succeeded");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Database connection check failed");
                false
            }
        }
    }

    async fn run(&self, request: &QueryRequest) -> Result<Vec<Row>, DbError> {
        let mut attempt = 0;

        loop {
            match self.source.run(request).await {
                Ok(rows) => return Ok(rows),
                Err(e) if e.is_transient() && attempt < self.policy.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        operation = request.describe(),
                        attempt,
                        max_retries = self.policy.max_retries,
                        error = %e,
                        "Database connection error, resetting pool and retrying"
                    );
                    self.source.reset();
                    tokio::time::sleep(self.policy.backoff).await;
                }
                Err(e) => {
                    tracing::error!(
                        operation = request.describe(),
                        attempts = attempt + 1,
                        error = %e,
                        "Database operation failed"
                    );
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::Mutex;

    /// Replays scripted attempt results and records every call.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<Vec<Row>, DbError>>>,
        log: Mutex<Vec<&'static str>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Vec<Row>, DbError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                log: Mutex::new(Vec::new()),
            })
        }

        fn log(&self) -> Vec<&'static str> {
            self.log.lock().unwrap().clone()
        }

        fn attempts(&self) -> usize {
            self.log().iter().filter(|e| **e == "run").count()
        }

        fn resets(&self) -> usize {
            self.log().iter().filter(|e| **e == "reset").count()
        }
    }

    #[async_trait]
    impl ConnectionSource for ScriptedSource {
        async fn run(&self, _request: &QueryRequest) -> Result<Vec<Row>, DbError> {
            self.log.lock().unwrap().push("run");
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(rows()))
        }

        fn reset(&self) {
            self.log.lock().unwrap().push("reset");
        }
    }

    fn rows() -> Vec<Row> {
        let row = json!({ "fncode": "F01", "egg_cnt": 1520 });
        vec![row.as_object().unwrap().clone()]
    }

    fn connection_reset() -> Result<Vec<Row>, DbError> {
        Err(sqlx::Error::Io(io::Error::from(io::ErrorKind::ConnectionReset)).into())
    }

    fn bad_column() -> Result<Vec<Row>, DbError> {
        Err(sqlx::Error::ColumnNotFound("egg_count".to_string()).into())
    }

    fn executor(source: &Arc<ScriptedSource>) -> Executor {
        Executor::with_policy(
            source.clone(),
            RetryPolicy {
                max_retries: 2,
                backoff: Duration::ZERO,
            },
        )
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.backoff, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let source = ScriptedSource::new(vec![connection_reset(), connection_reset(), Ok(rows())]);

        let outcome = executor(&source).execute_query("SELECT 1", vec![]).await;

        assert_eq!(outcome, QueryOutcome::Success { rows: rows() });
        // Pool is reset before each retry, never after the final attempt
        assert_eq!(
            source.log(),
            vec!["run", "reset", "run", "reset", "run"]
        );
    }

    #[tokio::test]
    async fn test_procedure_succeeds_after_transient_failure() {
        let source = ScriptedSource::new(vec![connection_reset(), Ok(rows())]);

        let result = executor(&source).call_procedure("GpEgg_List", vec![]).await;

        assert_eq!(result.unwrap(), rows());
        assert_eq!(source.attempts(), 2);
        assert_eq!(source.resets(), 1);
    }

    #[tokio::test]
    async fn test_non_transient_error_is_not_retried() {
        let source = ScriptedSource::new(vec![bad_column()]);

        let outcome = executor(&source)
            .execute_query("SELECT egg_count FROM GpEgg", vec![])
            .await;

        assert!(matches!(outcome, QueryOutcome::Failure { .. }));
        assert_eq!(source.attempts(), 1);
        assert_eq!(source.resets(), 0);

        let source = ScriptedSource::new(vec![bad_column()]);
        let err = executor(&source)
            .call_procedure("GpEgg_List", vec![])
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Sqlx(sqlx::Error::ColumnNotFound(_))));
        assert_eq!(source.attempts(), 1);
        assert_eq!(source.resets(), 0);
    }

    #[tokio::test]
    async fn test_execute_query_folds_exhausted_retries_into_failure() {
        let source = ScriptedSource::new(vec![
            connection_reset(),
            connection_reset(),
            connection_reset(),
        ]);

        let outcome = executor(&source).execute_query("SELECT 1", vec![]).await;

        match outcome {
            QueryOutcome::Failure { error } => assert!(!error.is_empty()),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(source.attempts(), 3);
        assert_eq!(source.resets(), 2);
    }

    #[tokio::test]
    async fn test_call_procedure_returns_last_error_unchanged() {
        let source = ScriptedSource::new(vec![
            connection_reset(),
            connection_reset(),
            Err(sqlx::Error::Io(io::Error::new(io::ErrorKind::TimedOut, "read timed out")).into()),
        ]);

        let err = executor(&source)
            .call_procedure("BreedHis_List", vec!["2024-01".into()])
            .await
            .unwrap_err();

        match err {
            DbError::Sqlx(sqlx::Error::Io(io)) => {
                assert_eq!(io.kind(), io::ErrorKind::TimedOut);
                assert_eq!(io.to_string(), "read timed out");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(source.attempts(), 3);
    }

    #[tokio::test]
    async fn test_transient_then_permanent_stops_immediately() {
        let source = ScriptedSource::new(vec![connection_reset(), bad_column(), Ok(rows())]);

        let outcome = executor(&source).execute_query("SELECT 1", vec![]).await;

        assert!(matches!(outcome, QueryOutcome::Failure { .. }));
        assert_eq!(source.log(), vec!["run", "reset", "run"]);
    }

    #[tokio::test]
    async fn test_repeated_queries_return_identical_rows() {
        let source = ScriptedSource::new(vec![]);
        let executor = executor(&source);

        let first = executor.execute_query("SELECT * FROM Fense", vec![]).await;
        let second = executor.execute_query("SELECT * FROM Fense", vec![]).await;

        assert!(matches!(first, QueryOutcome::Success { .. }));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_connection_check() {
        let healthy = ScriptedSource::new(vec![Ok(rows())]);
        assert!(executor(&healthy).test_connection().await);

        let down = ScriptedSource::new(vec![
            connection_reset(),
            connection_reset(),
            connection_reset(),
        ]);
        assert!(!executor(&down).test_connection().await);
        assert_eq!(down.log(), vec!["run"]);
    }
}
