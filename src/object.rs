//! Typed accessors over one persistent object handle.
//!
//! This is the interception layer: every get/set/delete/enumerate funnels
//! into a single-key engine call against the wrapped handle, and any nested
//! handle returned by the engine comes back wrapped in a fresh
//! `PersistentObject`. Wrapper identity is not persistent-value identity;
//! two wrappers around the same handle alias the same data.

use crate::core::{Handle, PoolError, Result, Value};
use crate::storage::{SharedEngine, StorageEngine};
use crate::validator::is_valid_string;
use std::sync::MutexGuard;

#[derive(Clone)]
pub struct PersistentObject {
    engine: SharedEngine,
    handle: Handle,
}

impl PersistentObject {
    pub(crate) fn new(engine: SharedEngine, handle: Handle) -> Self {
        Self { engine, handle }
    }

    /// The raw engine handle this wrapper refers to.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    fn engine(&self) -> Result<MutexGuard<'_, dyn StorageEngine + 'static>> {
        self.engine.lock().map_err(PoolError::from)
    }

    /// Read one property.
    ///
    /// On an array handle the reserved key `"length"` reads the
    /// engine-maintained length. A missing key reads as `Value::None`; any
    /// other engine failure propagates.
    pub fn get(&self, key: &str) -> Result<Value> {
        let engine = self.engine()?;
        if !engine.is_valid(self.handle) {
            return Err(PoolError::InvalidObject);
        }
        if key == "length" && engine.is_array(self.handle)? {
            let len = engine.get_length(self.handle)?;
            return Ok(Value::Int(len as i64));
        }
        match engine.get_property(self.handle, key) {
            Ok(raw) => {
                drop(engine);
                Ok(Value::from_raw(raw, &self.engine))
            }
            Err(PoolError::KeyNotFound) => Ok(Value::None),
            Err(err) => Err(err),
        }
    }

    /// Write one property.
    ///
    /// On an array handle the reserved key `"length"` requires an `Int`
    /// value and forwards to the engine's length setter. The key, and the
    /// value when it is a string, must pass text validation; a `Value::Object`
    /// argument is unwrapped to its handle so the write aliases the same
    /// persistent data instead of copying it.
    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut engine = self.engine()?;
        if !engine.is_valid(self.handle) {
            return Err(PoolError::InvalidObject);
        }
        if key == "length" && engine.is_array(self.handle)? {
            let Value::Int(len) = value else {
                return Err(PoolError::InvalidArrayLength);
            };
            if len < 0 {
                return Err(PoolError::InvalidArrayLength);
            }
            return engine.set_length(self.handle, len as u64);
        }
        let valid_value = match &value {
            Value::Str(s) => is_valid_string(s),
            _ => true,
        };
        if !is_valid_string(key) || !valid_value {
            return Err(PoolError::InvalidCharacters);
        }
        engine.set_property(self.handle, key, value.into_raw())
    }

    /// Delete one property. Deleting a missing key is not an error.
    pub fn delete(&self, key: &str) -> Result<()> {
        let mut engine = self.engine()?;
        if !engine.is_valid(self.handle) {
            return Err(PoolError::InvalidObject);
        }
        engine.del_property(self.handle, key)
    }

    /// The handle's own property names. An array of length 0 enumerates as
    /// exactly `["length"]`, of length 3 as `["0", "1", "2", "length"]`.
    pub fn keys(&self) -> Result<Vec<String>> {
        let engine = self.engine()?;
        if !engine.is_valid(self.handle) {
            return Err(PoolError::InvalidObject);
        }
        engine.property_names(self.handle)
    }

    pub fn is_array(&self) -> Result<bool> {
        let engine = self.engine()?;
        if !engine.is_valid(self.handle) {
            return Err(PoolError::InvalidObject);
        }
        engine.is_array(self.handle)
    }

    /// Engine-maintained array length; never cached in the wrapper.
    pub fn len(&self) -> Result<u64> {
        let engine = self.engine()?;
        if !engine.is_valid(self.handle) {
            return Err(PoolError::InvalidObject);
        }
        engine.get_length(self.handle)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Truncate or grow the array; new slots read as `Value::None`.
    pub fn set_len(&self, len: u64) -> Result<()> {
        let mut engine = self.engine()?;
        if !engine.is_valid(self.handle) {
            return Err(PoolError::InvalidObject);
        }
        engine.set_length(self.handle, len)
    }

    /// Append to an array handle. A `Value::Object` argument is unwrapped
    /// to its raw handle before delegating.
    pub fn push(&self, item: Value) -> Result<()> {
        let mut engine = self.engine()?;
        if !engine.is_valid(self.handle) {
            return Err(PoolError::InvalidObject);
        }
        if !engine.is_array(self.handle)? {
            return Err(PoolError::NotAFunction("push"));
        }
        engine.push(self.handle, item.into_raw())
    }

    /// Remove and return the last element of an array handle; `Value::None`
    /// when the array is empty.
    pub fn pop(&self) -> Result<Value> {
        let mut engine = self.engine()?;
        if !engine.is_valid(self.handle) {
            return Err(PoolError::InvalidObject);
        }
        if !engine.is_array(self.handle)? {
            return Err(PoolError::NotAFunction("pop"));
        }
        let raw = engine.pop(self.handle)?;
        drop(engine);
        Ok(Value::from_raw(raw, &self.engine))
    }
}

impl std::fmt::Debug for PersistentObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentObject")
            .field("handle", &self.handle)
            .finish()
    }
}

impl PartialEq for PersistentObject {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle && std::sync::Arc::ptr_eq(&self.engine, &other.engine)
    }
}
