//! Unit of Work
//!
//! A unit of work owns at most one transaction at a time:
//! `idle --start--> active --commit|rollback--> idle`. [`UnitOfWorkExt::run`]
//! wraps a piece of work so that it commits on success and rolls back on any
//! error. When a transaction is already active, `run` joins it and leaves the
//! commit or rollback to whoever started it.
//!
//! Create one unit of work per request; repositories built on the same
//! [`PgUnitOfWork`] share its transaction.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{debug, error, warn};

use crate::error::{DatabaseError, UnitOfWorkError};
use crate::memory::Checkpoint;

#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Open a transaction; fails when one is already active
    async fn start(&self) -> Result<(), UnitOfWorkError>;

    /// Persist everything done since `start`; fails when idle
    async fn commit(&self) -> Result<(), UnitOfWorkError>;

    /// Discard everything done since `start`; fails when idle
    async fn rollback(&self) -> Result<(), UnitOfWorkError>;

    async fn is_active(&self) -> bool;
}

pub trait UnitOfWorkExt: UnitOfWork {
    /// Run `work` inside a transaction
    ///
    /// Starts, commits on `Ok` and rolls back on `Err` when idle. Joins the
    /// running transaction, without committing or rolling back, when active.
    fn run<Fut, T, E>(&self, work: Fut) -> impl Future<Output = Result<T, E>> + Send
    where
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: From<UnitOfWorkError> + Display + Send;
}

impl<U: UnitOfWork + ?Sized> UnitOfWorkExt for U {
    fn run<Fut, T, E>(&self, work: Fut) -> impl Future<Output = Result<T, E>> + Send
    where
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: From<UnitOfWorkError> + Display + Send,
    {
        async move {
            if self.is_active().await {
                return work.await;
            }

            self.start().await?;
            match work.await {
                Ok(value) => {
                    self.commit().await?;
                    Ok(value)
                }
                Err(e) => {
                    if let Err(rollback_err) = self.rollback().await {
                        error!(
                            error = %rollback_err,
                            original_error = %e,
                            "Failed to rollback transaction"
                        );
                    }
                    Err(e)
                }
            }
        }
    }
}

/// Connection a repository statement runs on
pub enum Session<'a> {
    /// The unit of work's open transaction
    Transaction(MappedMutexGuard<'a, Transaction<'static, Postgres>>),
    /// A pooled connection, used when no transaction is active
    Pooled(PoolConnection<Postgres>),
}

impl Session<'_> {
    pub fn connection(&mut self) -> &mut PgConnection {
        match self {
            Session::Transaction(tx) => &mut ***tx,
            Session::Pooled(conn) => &mut **conn,
        }
    }

    pub fn in_transaction(&self) -> bool {
        matches!(self, Session::Transaction(_))
    }
}

/// PostgreSQL unit of work backed by a `sqlx` transaction
#[derive(Clone)]
pub struct PgUnitOfWork {
    pool: PgPool,
    transaction: Arc<Mutex<Option<Transaction<'static, Postgres>>>>,
}

impl PgUnitOfWork {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            transaction: Arc::new(Mutex::new(None)),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Connection for the next statements: the transaction when active,
    /// otherwise a fresh pooled connection
    pub async fn session(&self) -> Result<Session<'_>, DatabaseError> {
        let guard = self.transaction.lock().await;
        match MutexGuard::try_map(guard, |slot| slot.as_mut()) {
            Ok(tx) => return Ok(Session::Transaction(tx)),
            Err(guard) => drop(guard),
        }
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(DatabaseError::Connection)?;
        Ok(Session::Pooled(conn))
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn start(&self) -> Result<(), UnitOfWorkError> {
        let mut slot = self.transaction.lock().await;
        if slot.is_some() {
            return Err(UnitOfWorkError::AlreadyStarted);
        }
        let tx = self.pool.begin().await.map_err(|e| {
            error!(error = %e, "Failed to begin transaction");
            UnitOfWorkError::Database(e)
        })?;
        *slot = Some(tx);
        debug!("Transaction started");
        Ok(())
    }

    async fn commit(&self) -> Result<(), UnitOfWorkError> {
        let tx = self
            .transaction
            .lock()
            .await
            .take()
            .ok_or(UnitOfWorkError::NotStarted)?;
        tx.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit transaction");
            UnitOfWorkError::Database(e)
        })?;
        debug!("Transaction committed");
        Ok(())
    }

    async fn rollback(&self) -> Result<(), UnitOfWorkError> {
        let tx = self
            .transaction
            .lock()
            .await
            .take()
            .ok_or(UnitOfWorkError::NotStarted)?;
        tx.rollback().await.map_err(UnitOfWorkError::Database)?;
        warn!("Transaction rolled back");
        Ok(())
    }

    async fn is_active(&self) -> bool {
        self.transaction.lock().await.is_some()
    }
}

/// Unit of work over in-memory stores
///
/// `start` checkpoints every registered store, `rollback` restores them and
/// `commit` drops the checkpoints.
#[derive(Clone, Default)]
pub struct InMemoryUnitOfWork {
    active: Arc<Mutex<bool>>,
    stores: Vec<Arc<dyn Checkpoint>>,
}

impl InMemoryUnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a store whose rows take part in the transactions
    pub fn with_store(mut self, store: impl Checkpoint + 'static) -> Self {
        self.stores.push(Arc::new(store));
        self
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn start(&self) -> Result<(), UnitOfWorkError> {
        let mut active = self.active.lock().await;
        if *active {
            return Err(UnitOfWorkError::AlreadyStarted);
        }
        for store in &self.stores {
            store.checkpoint().await;
        }
        *active = true;
        debug!(stores = self.stores.len(), "In-memory transaction started");
        Ok(())
    }

    async fn commit(&self) -> Result<(), UnitOfWorkError> {
        let mut active = self.active.lock().await;
        if !*active {
            return Err(UnitOfWorkError::NotStarted);
        }
        for store in &self.stores {
            store.release().await;
        }
        *active = false;
        debug!("In-memory transaction committed");
        Ok(())
    }

    async fn rollback(&self) -> Result<(), UnitOfWorkError> {
        let mut active = self.active.lock().await;
        if !*active {
            return Err(UnitOfWorkError::NotStarted);
        }
        for store in &self.stores {
            store.restore().await;
        }
        *active = false;
        warn!("In-memory transaction rolled back");
        Ok(())
    }

    async fn is_active(&self) -> bool {
        *self.active.lock().await
    }
}
