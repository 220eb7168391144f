//! Pool lifecycle manager and transaction controller.
//!
//! A pool owns one shared engine and a simple open/closed state machine
//! around it. Every operation other than `check`, `create` and `open`
//! requires the pool to be open. The `closed` flag is deliberately
//! unsynchronized: the pool assumes a single logical thread of control and
//! claims no thread-safety for its own state.

use crate::buffer::PersistentArrayBuffer;
use crate::core::{CheckStatus, PoolConfig, PoolError, Result, TxStage, Value};
use crate::object::PersistentObject;
use crate::storage::{HeapEngine, SharedEngine, StorageEngine};
use std::cell::Cell;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

pub struct PersistentObjectPool {
    engine: SharedEngine,
    closed: Cell<bool>,
}

impl PersistentObjectPool {
    /// A pool backed by the default file-backed heap engine.
    pub fn new(config: PoolConfig) -> Self {
        Self::with_engine(HeapEngine::new(config))
    }

    /// A pool backed by a custom storage engine.
    pub fn with_engine<E: StorageEngine + 'static>(engine: E) -> Self {
        let engine: SharedEngine = Arc::new(Mutex::new(engine));
        Self {
            engine,
            closed: Cell::new(true),
        }
    }

    fn engine(&self) -> Result<MutexGuard<'_, dyn StorageEngine + 'static>> {
        self.engine.lock().map_err(PoolError::from)
    }

    fn assert_open(&self) -> Result<()> {
        if self.closed.get() {
            return Err(PoolError::PoolClosed);
        }
        Ok(())
    }

    fn assert_closed(&self) -> Result<()> {
        if !self.closed.get() {
            return Err(PoolError::PoolOpened);
        }
        Ok(())
    }

    /// Materialize a new pool at the configured path. Valid only while
    /// closed; on engine failure the pool stays closed.
    pub fn create(&self) -> Result<()> {
        self.assert_closed()?;
        self.engine()?.create()?;
        self.closed.set(false);
        Ok(())
    }

    /// Map an existing pool. Valid only while closed; on engine failure the
    /// pool stays closed.
    pub fn open(&self) -> Result<()> {
        self.assert_closed()?;
        self.engine()?.open()?;
        self.closed.set(false);
        Ok(())
    }

    /// Release the engine mapping. Valid only while open, and fails while a
    /// transaction is still in the work stage.
    pub fn close(&self) -> Result<()> {
        self.assert_open()?;
        self.engine()?.close()?;
        self.closed.set(true);
        Ok(())
    }

    /// Advisory consistency check; works in either lifecycle state.
    pub fn check(&self) -> Result<CheckStatus> {
        self.engine()?.check()
    }

    /// Reclaim persistent objects unreachable from the root.
    pub fn gc(&self) -> Result<()> {
        self.assert_open()?;
        self.engine()?.gc()
    }

    /// Read the root slot; a persistent root comes back wrapped in a fresh
    /// `PersistentObject`. A newly created pool's root is `Value::None`.
    pub fn root(&self) -> Result<Value> {
        self.assert_open()?;
        let raw = self.engine()?.get_root()?;
        Ok(Value::from_raw(raw, &self.engine))
    }

    /// Replace the root slot. `Map`/`List` literals are deep-copied into
    /// persistent representation; a `Value::Object` argument aliases its
    /// existing persistent data.
    pub fn set_root(&self, value: Value) -> Result<()> {
        self.assert_open()?;
        self.engine()?.set_root(value.into_raw())
    }

    /// Deep-copy a `Map` or `List` literal into a new persistent object.
    pub fn create_object(&self, initial: Value) -> Result<PersistentObject> {
        self.assert_open()?;
        let handle = self.engine()?.create_object(initial.into_raw())?;
        Ok(PersistentObject::new(self.engine.clone(), handle))
    }

    /// Allocate a persistent byte region initialized from `bytes`.
    pub fn create_arraybuffer(&self, bytes: &[u8]) -> Result<PersistentArrayBuffer> {
        self.assert_open()?;
        let handle = self.engine()?.create_buffer(bytes)?;
        Ok(PersistentArrayBuffer::new(self.engine.clone(), handle))
    }

    pub fn tx_begin(&self) -> Result<()> {
        self.assert_open()?;
        self.engine()?.tx_begin()
    }

    pub fn tx_commit(&self) -> Result<()> {
        self.assert_open()?;
        self.engine()?.tx_commit()
    }

    pub fn tx_abort(&self) -> Result<()> {
        self.assert_open()?;
        self.engine()?.tx_abort()
    }

    pub fn tx_end(&self) -> Result<()> {
        self.assert_open()?;
        self.engine()?.tx_end()
    }

    pub fn tx_stage(&self) -> Result<TxStage> {
        self.assert_open()?;
        self.engine()?.tx_stage()
    }

    /// Run `body` inside one transaction, synchronously.
    ///
    /// Begins a transaction, runs the body, then commits and ends if the
    /// stage is still `Work`; otherwise aborts and fails with
    /// "transaction aborted".
    ///
    /// Hazard: an `Err` from the body propagates immediately and leaves the
    /// transaction at stage `Work`. Callers must recover explicitly with
    /// `tx_abort` + `tx_end` before reusing the pool. A body that aborts the
    /// transaction itself similarly leaves the stage at `OnAbort`, to be
    /// cleared with `tx_end`.
    pub fn transaction<F>(&self, body: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        self.assert_open()?;
        self.tx_begin()?;
        body()?;
        if self.tx_stage()? == TxStage::Work {
            self.tx_commit()?;
            self.tx_end()
        } else {
            debug!("transaction body left the work stage, aborting");
            self.tx_abort()?;
            Err(PoolError::TransactionAborted)
        }
    }
}

impl std::fmt::Debug for PersistentObjectPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentObjectPool")
            .field("closed", &self.closed.get())
            .finish()
    }
}
