use crate::core::{CheckStatus, Handle, RawValue, Result, TxStage};
use std::sync::{Arc, Mutex};

/// Storage engine trait - allows pluggable persistent backends.
///
/// The pool and the wrappers never manipulate persistent data directly;
/// every operation funnels through these primitives using the handle owned
/// by the calling wrapper. Atomicity of grouped mutations is entirely the
/// engine's responsibility once `tx_begin`/`tx_commit` bracket the calls.
pub trait StorageEngine: Send {
    // Pool lifecycle
    fn create(&mut self) -> Result<()>;
    fn open(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
    /// Consistency check; unlike every other operation this must work
    /// without an open mapping.
    fn check(&self) -> Result<CheckStatus>;

    // Root slot
    fn get_root(&self) -> Result<RawValue>;
    fn set_root(&mut self, value: RawValue) -> Result<()>;

    // Allocation
    /// Deep-copy an initial `Map` or `List` literal into persistent
    /// representation. Scalars and existing references are not accepted.
    fn create_object(&mut self, initial: RawValue) -> Result<Handle>;
    fn create_buffer(&mut self, bytes: &[u8]) -> Result<Handle>;

    // Property access on one persistent handle
    /// True while the handle refers to live persistent data in an open pool.
    fn is_valid(&self, handle: Handle) -> bool;
    fn get_property(&self, handle: Handle, key: &str) -> Result<RawValue>;
    fn set_property(&mut self, handle: Handle, key: &str, value: RawValue) -> Result<()>;
    fn del_property(&mut self, handle: Handle, key: &str) -> Result<()>;
    /// Own property names; for an array handle this is the ordered numeric
    /// indices as strings followed by `"length"`.
    fn property_names(&self, handle: Handle) -> Result<Vec<String>>;

    // Array semantics
    fn is_array(&self, handle: Handle) -> Result<bool>;
    fn get_length(&self, handle: Handle) -> Result<u64>;
    fn set_length(&mut self, handle: Handle, len: u64) -> Result<()>;
    fn push(&mut self, handle: Handle, item: RawValue) -> Result<()>;
    fn pop(&mut self, handle: Handle) -> Result<RawValue>;

    // Byte regions
    fn buffer_len(&self, handle: Handle) -> Result<usize>;
    fn read_buffer(&self, handle: Handle) -> Result<Vec<u8>>;
    /// Mutate the transient view; the bytes become durable only through
    /// `persist` or a committed transaction covering a snapshotted range.
    fn write_buffer(&mut self, handle: Handle, offset: usize, bytes: &[u8]) -> Result<()>;
    /// Record a range's pre-image for the in-flight transaction.
    fn snapshot(&mut self, handle: Handle, offset: usize, len: usize) -> Result<()>;
    /// Force a range durable outside a transaction.
    fn persist(&mut self, handle: Handle, offset: usize, len: usize) -> Result<()>;

    // Transactions
    fn tx_begin(&mut self) -> Result<()>;
    fn tx_commit(&mut self) -> Result<()>;
    fn tx_abort(&mut self) -> Result<()>;
    fn tx_end(&mut self) -> Result<()>;
    fn tx_stage(&self) -> Result<TxStage>;

    /// Reclaim persistent objects unreachable from the root.
    fn gc(&mut self) -> Result<()>;
}

/// One engine shared between a pool and all wrappers handed out by it.
pub type SharedEngine = Arc<Mutex<dyn StorageEngine>>;
