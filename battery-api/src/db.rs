use crate::config::DatabaseConfig;
use crate::errors::{Error, Result};
use crate::metrics::{DB_FAILURES_TOTAL, POOL_AVAILABLE, QUERY_LATENCY_SECONDS, STORAGE_ERRORS_TOTAL};
use serde::Serialize;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgPool, PgPoolOptions};
use sqlx::Connection;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

const MAX_BACKOFF_MS: u64 = 5000;
// Slack on top of acquire + server-side statement_timeout for the client deadline.
const CLIENT_DEADLINE_GRACE: Duration = Duration::from_millis(500);

/// Availability of the backing store as seen by the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolState {
    Ready,
    Unavailable,
    Closed,
}

impl PoolState {
    fn from_u8(value: u8) -> PoolState {
        match value {
            0 => PoolState::Ready,
            1 => PoolState::Unavailable,
            _ => PoolState::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            PoolState::Ready => 0,
            PoolState::Unavailable => 1,
            PoolState::Closed => 2,
        }
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PoolState::Ready => "ready",
            PoolState::Unavailable => "unavailable",
            PoolState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Bounded set of PostgreSQL connections plus an explicit availability state.
///
/// Cloning is cheap and every clone shares the same connections and state.
/// Statements go through [`StorePool::run`]; raw connections never leave it.
#[derive(Debug, Clone)]
pub struct StorePool {
    pool: PgPool,
    connect_options: PgConnectOptions,
    state: Arc<AtomicU8>,
    acquire_timeout: Duration,
    statement_timeout: Duration,
    reconnect_attempts: u32,
    reconnect_backoff: Duration,
}

impl StorePool {
    /// Builds the pool without connecting. The state starts as
    /// `Unavailable` until [`StorePool::reconnect`] succeeds.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: &DatabaseConfig) -> Result<StorePool> {
        let options: PgConnectOptions = config.url.parse().map_err(Error::DatabaseUrl)?;
        let options = options.options([(
            "statement_timeout",
            config.statement_timeout_ms.to_string(),
        )]);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(config.acquire_timeout())
            .connect_lazy_with(options.clone());

        let store_pool = StorePool {
            pool,
            connect_options: options,
            state: Arc::new(AtomicU8::new(PoolState::Unavailable.as_u8())),
            acquire_timeout: config.acquire_timeout(),
            statement_timeout: config.statement_timeout(),
            reconnect_attempts: config.reconnect_attempts.max(1),
            reconnect_backoff: config.reconnect_backoff(),
        };
        POOL_AVAILABLE.set(0.0);
        Ok(store_pool)
    }

    /// Builds the pool and tries to reach the store with bounded backoff.
    ///
    /// If the store cannot be reached the pool is still returned, in the
    /// `Unavailable` state, so the health monitor can bring it back later.
    pub async fn open(config: &DatabaseConfig) -> Result<StorePool> {
        info!("Connecting to database at {}", config.redacted_url());
        let pool = StorePool::new(config)?;

        match pool.reconnect().await {
            Ok(()) => info!("Database connection established"),
            Err(e) => warn!("Starting with database unavailable: {}", e),
        }

        Ok(pool)
    }

    pub fn state(&self) -> PoolState {
        PoolState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_ready(&self) -> bool {
        self.state() == PoolState::Ready
    }

    fn set_state(&self, next: PoolState) {
        // Closing is final.
        let swapped = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if PoolState::from_u8(current) == PoolState::Closed && next != PoolState::Closed {
                    None
                } else {
                    Some(next.as_u8())
                }
            });

        let previous = match swapped {
            Ok(previous) => PoolState::from_u8(previous),
            Err(_) => return,
        };
        if previous != next {
            info!("Database pool state changed: {} -> {}", previous, next);
        }
        POOL_AVAILABLE.set(if next == PoolState::Ready { 1.0 } else { 0.0 });
    }

    pub fn mark_unavailable(&self) {
        self.set_state(PoolState::Unavailable);
    }

    /// Executes one statement on a pooled connection.
    ///
    /// Fails fast with [`Error::Unavailable`] unless the pool is `Ready`.
    /// Waiting for a free connection is bounded by the acquire timeout and is
    /// not an outage; connection-level failures flip the pool to `Unavailable`.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, statement: F) -> Result<T>
    where
        F: FnOnce(PgPool) -> Fut,
        Fut: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        let state = self.state();
        if state != PoolState::Ready {
            debug!("Rejecting {} while pool is {}", operation, state);
            return Err(Error::Unavailable(state));
        }

        let start = Instant::now();
        let deadline = self.client_deadline();
        let outcome = tokio::time::timeout(deadline, statement(self.pool.clone())).await;

        QUERY_LATENCY_SECONDS
            .with_label_values(&[operation])
            .observe(start.elapsed().as_secs_f64());

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                STORAGE_ERRORS_TOTAL.inc();
                if is_connection_error(&e) {
                    DB_FAILURES_TOTAL.inc();
                    error!("Connection failure during {}: {}", operation, e);
                    self.mark_unavailable();
                } else {
                    error!("Statement {} failed: {}", operation, e);
                }
                Err(Error::Database(e))
            }
            Err(_) => {
                STORAGE_ERRORS_TOTAL.inc();
                error!("Statement {} timed out after {:?}", operation, deadline);
                Err(Error::Timeout(deadline))
            }
        }
    }

    // Long enough to wait for a connection and then run a full statement.
    fn client_deadline(&self) -> Duration {
        self.acquire_timeout + self.statement_timeout + CLIENT_DEADLINE_GRACE
    }

    async fn ping(&self) -> std::result::Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map(|_| ())
    }

    /// Checks the store on a fresh connection outside the pool, so a pool
    /// with every connection busy still gets an answer.
    async fn ping_direct(&self) -> std::result::Result<(), sqlx::Error> {
        let check = async {
            let mut conn = PgConnection::connect_with(&self.connect_options).await?;
            sqlx::query("SELECT 1").execute(&mut conn).await?;
            conn.close().await
        };

        match tokio::time::timeout(self.acquire_timeout, check).await {
            Ok(result) => result,
            Err(_) => Err(sqlx::Error::PoolTimedOut),
        }
    }

    /// Pings the store until it answers, with exponential backoff, and marks
    /// the pool `Ready` on success.
    pub async fn reconnect(&self) -> Result<()> {
        let mut attempt = 0;
        let mut backoff = self.reconnect_backoff;

        loop {
            if self.state() == PoolState::Closed {
                return Err(Error::Unavailable(PoolState::Closed));
            }
            attempt += 1;

            match self.ping().await {
                Ok(()) => {
                    if attempt > 1 {
                        info!("Database reachable after {} attempts", attempt);
                    }
                    self.set_state(PoolState::Ready);
                    return Ok(());
                }
                Err(e) => {
                    DB_FAILURES_TOTAL.inc();
                    if attempt >= self.reconnect_attempts {
                        error!(
                            "Database unreachable after {} attempts: {}",
                            self.reconnect_attempts, e
                        );
                        self.mark_unavailable();
                        return Err(Error::Database(e));
                    }

                    warn!(
                        "Database ping failed (attempt {}/{}): {}. Retrying in {:?}...",
                        attempt, self.reconnect_attempts, e, backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_millis(MAX_BACKOFF_MS));
                }
            }
        }
    }

    /// Spawns a task that watches the store and restores the pool after an
    /// outage. The task ends once the pool is closed.
    pub fn spawn_health_monitor(&self, every: Duration) -> JoinHandle<()> {
        let pool = self.clone();

        tokio::spawn(async move {
            info!("Starting database health monitor every {:?}", every);
            let mut ticker = health_ticker(every);

            loop {
                ticker.tick().await;

                match pool.state() {
                    PoolState::Closed => break,
                    PoolState::Unavailable => {
                        if let Err(e) = pool.reconnect().await {
                            debug!("Database still unavailable: {}", e);
                        }
                    }
                    PoolState::Ready => {
                        let outcome = match pool.ping().await {
                            Err(sqlx::Error::PoolTimedOut) => pool.ping_direct().await,
                            other => other,
                        };
                        if let Err(e) = outcome {
                            if is_connection_error(&e) || matches!(e, sqlx::Error::PoolTimedOut) {
                                DB_FAILURES_TOTAL.inc();
                                warn!("Database health check failed: {}", e);
                                pool.mark_unavailable();
                            }
                        }
                    }
                }
            }

            info!("Database health monitor stopped");
        })
    }

    /// Closes every connection. Further statements fail with `Unavailable`.
    pub async fn close(&self) {
        self.set_state(PoolState::Closed);
        self.pool.close().await;
        info!("Database pool closed");
    }
}

// Ticks missed during a slow reconnect are not replayed back-to-back.
fn health_ticker(every: Duration) -> Interval {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

// PoolTimedOut is exhaustion, not an outage: every connection may simply be busy.
fn is_connection_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolClosed => true,
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| {
            code.starts_with("08") || // connection_exception class
            code == "57P01" || // admin_shutdown
            code == "57P03" || // cannot_connect_now
            code == "53300" // too_many_connections
        }),
        _ => false,
    }
}
