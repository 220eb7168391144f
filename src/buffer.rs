//! Wrapper over one persistent byte region.
//!
//! Reads and writes go through a transient view: `write` mutates the view
//! only, and the bytes become durable through `persist` or a committed
//! transaction covering a `snapshot`ted range. The byte-level durability
//! semantics live entirely in the engine; this wrapper is pure delegation.

use crate::core::{Handle, PoolError, Result};
use crate::storage::{SharedEngine, StorageEngine};
use std::sync::MutexGuard;

#[derive(Clone)]
pub struct PersistentArrayBuffer {
    engine: SharedEngine,
    handle: Handle,
}

impl PersistentArrayBuffer {
    pub(crate) fn new(engine: SharedEngine, handle: Handle) -> Self {
        Self { engine, handle }
    }

    pub(crate) fn handle(&self) -> Handle {
        self.handle
    }

    fn engine(&self) -> Result<MutexGuard<'_, dyn StorageEngine + 'static>> {
        self.engine.lock().map_err(PoolError::from)
    }

    pub fn len(&self) -> Result<usize> {
        let engine = self.engine()?;
        if !engine.is_valid(self.handle) {
            return Err(PoolError::InvalidObject);
        }
        engine.buffer_len(self.handle)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Copy of the transient view.
    pub fn read(&self) -> Result<Vec<u8>> {
        let engine = self.engine()?;
        if !engine.is_valid(self.handle) {
            return Err(PoolError::InvalidObject);
        }
        engine.read_buffer(self.handle)
    }

    /// Write into the transient view. Not durable by itself.
    pub fn write(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        let mut engine = self.engine()?;
        if !engine.is_valid(self.handle) {
            return Err(PoolError::InvalidObject);
        }
        engine.write_buffer(self.handle, offset, bytes)
    }

    /// Mark a byte range as the pre-image for the in-flight transaction.
    pub fn snapshot(&self, offset: usize, len: usize) -> Result<()> {
        let mut engine = self.engine()?;
        if !engine.is_valid(self.handle) {
            return Err(PoolError::InvalidObject);
        }
        engine.snapshot(self.handle, offset, len)
    }

    /// Force a byte range durable outside a transaction.
    pub fn persist(&self, offset: usize, len: usize) -> Result<()> {
        let mut engine = self.engine()?;
        if !engine.is_valid(self.handle) {
            return Err(PoolError::InvalidObject);
        }
        engine.persist(self.handle, offset, len)
    }
}

impl std::fmt::Debug for PersistentArrayBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentArrayBuffer")
            .field("handle", &self.handle)
            .finish()
    }
}

impl PartialEq for PersistentArrayBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle && std::sync::Arc::ptr_eq(&self.engine, &other.engine)
    }
}
