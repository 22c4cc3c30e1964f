use async_trait::async_trait;
use futures::TryStreamExt;
use secrecy::ExposeSecret;
use sqlx::{
    mysql::{MySqlArguments, MySqlConnectOptions, MySqlPoolOptions},
    query::Query,
    Connection, Either, MySql, MySqlPool,
};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard,
};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::DatabaseConfig;
use crate::db::{row, ConnectionSource, DbError, QueryRequest, Row, SqlParam};

/// Owns the process-wide MySQL pool.
///
/// The pool is built on first use and thrown away as a whole by [`reset_pool`]
/// when a connection breaks; it is never repaired in place.
///
/// [`reset_pool`]: PoolManager::reset_pool
pub struct PoolManager {
    connect_options: MySqlConnectOptions,
    max_connections: u32,
    connect_timeout: Duration,
    keep_alive: Duration,
    slot: Mutex<Option<MySqlPool>>,
    generation: AtomicU64,
}

impl PoolManager {
    pub fn new(config: &DatabaseConfig) -> Self {
        let mut connect_options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(config.password.expose_secret());

        if let Some(name) = &config.name {
            connect_options = connect_options.database(name);
        }

        Self {
            connect_options,
            max_connections: config.max_connections,
            connect_timeout: config.connect_timeout,
            keep_alive: config.keep_alive,
            slot: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<MySqlPool>> {
        // The guarded value is a handle that stays valid even if a holder panicked
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the current pool, building it if there is none.
    ///
    /// Building is lazy: no connection is opened until one is acquired.
    pub fn get_pool(&self) -> MySqlPool {
        let mut slot = self.slot();
        if let Some(pool) = slot.as_ref() {
            return pool.clone();
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.connect_timeout)
            .test_before_acquire(true)
            .connect_lazy_with(self.connect_options.clone());

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(
            generation,
            max_connections = self.max_connections,
            "Database pool created"
        );

        *slot = Some(pool.clone());
        pool
    }

    /// Discards the current pool, if any. The old pool is closed in the
    /// background and any failure while closing it is ignored.
    pub fn reset_pool(&self) {
        let Some(pool) = self.slot().take() else {
            return;
        };

        tracing::warn!(
            generation = self.generation(),
            "Discarding database pool"
        );

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    pool.close().await;
                    tracing::debug!("Discarded database pool closed");
                });
            }
            // Outside a runtime the handle is simply dropped
            Err(_) => drop(pool),
        }
    }

    /// Number of pools built so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Closes the current pool and waits for its connections to finish.
    pub async fn close(&self) {
        let pool = self.slot().take();
        if let Some(pool) = pool {
            pool.close().await;
            tracing::info!("Database pool closed");
        }
    }

    /// Periodically pings an idle connection so the server and any proxy in
    /// between keep it open. Only idle connections are touched; a request
    /// holding the connection is never delayed. A failed ping discards the
    /// whole pool, same as a failed query.
    pub fn spawn_keep_alive(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let period = manager.keep_alive.max(Duration::from_secs(1));
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                manager.ping_idle().await;
            }
        })
    }

    async fn ping_idle(&self) {
        let (pool, generation) = {
            let slot = self.slot();
            (slot.clone(), self.generation())
        };
        let Some(pool) = pool else {
            return;
        };

        let Some(mut conn) = pool.try_acquire() else {
            return;
        };

        let result = conn.ping().await;
        drop(conn);
        self.after_ping(generation, result);
    }

    fn after_ping(&self, generation: u64, result: Result<(), sqlx::Error>) {
        let Err(e) = result else {
            return;
        };

        // The pool may already have been replaced while the ping ran
        if self.generation() != generation {
            return;
        }

        tracing::warn!(error = %e, "Keep-alive ping failed");
        self.reset_pool();
    }
}

#[async_trait]
impl ConnectionSource for PoolManager {
    async fn run(&self, request: &QueryRequest) -> Result<Vec<Row>, DbError> {
        let statement = request.statement()?;
        let pool = self.get_pool();
        let query = bind_params(sqlx::query(&statement), request.params());

        match request {
            QueryRequest::Sql { .. } => {
                let rows = query.fetch_all(&pool).await?;
                Ok(rows.iter().map(row::to_json).collect())
            }
            QueryRequest::Procedure { .. } => {
                // A CALL produces one result set per SELECT in the procedure
                // followed by a status packet; only the first set is kept.
                let mut stream = query.fetch_many(&pool);
                let mut rows = Vec::new();
                let mut first_set_done = false;

                while let Some(item) = stream.try_next().await? {
                    match item {
                        Either::Left(_) => first_set_done = true,
                        Either::Right(r) if !first_set_done => rows.push(row::to_json(&r)),
                        Either::Right(_) => {}
                    }
                }

                Ok(rows)
            }
        }
    }

    fn reset(&self) {
        self.reset_pool();
    }
}

fn bind_params<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &'q [SqlParam],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            SqlParam::Null => query.bind(None::<String>),
            SqlParam::Bool(value) => query.bind(*value),
            SqlParam::Int(value) => query.bind(*value),
            SqlParam::Float(value) => query.bind(*value),
            SqlParam::Text(value) => query.bind(value.as_str()),
        };
    }
    query
}
