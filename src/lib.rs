// ============================================================================
// pmobj - persistent object pool
// ============================================================================

//! A persistent object store whose contents read and write like ordinary
//! in-memory structured values: objects, arrays and raw byte buffers, with
//! every mutation durably committed to a fixed-capacity pool file and
//! all-or-nothing transaction grouping on top.
//!
//! # Examples
//!
//! ```no_run
//! use pmobj::{new_pool, CheckStatus, Value, MIN_POOL_SIZE};
//!
//! # fn main() -> pmobj::Result<()> {
//! let pool = new_pool("/tmp/pmobj-pool", MIN_POOL_SIZE);
//! match pool.check()? {
//!     CheckStatus::Missing => pool.create()?,
//!     CheckStatus::Consistent => pool.open()?,
//!     CheckStatus::Inconsistent => panic!("pool is corrupt"),
//! }
//!
//! let object = pool.create_object(Value::Map(vec![
//!     ("a".to_string(), Value::Int(1)),
//! ]))?;
//! pool.set_root(Value::Object(object.clone()))?;
//!
//! pool.transaction(|| {
//!     object.set("a", Value::Int(2))?;
//!     object.set("b", Value::from("two"))
//! })?;
//!
//! pool.close()?;
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod storage;
pub mod validator;

mod buffer;
mod object;
mod pool;

// Re-export main types for convenience
pub use buffer::PersistentArrayBuffer;
pub use core::{
    CheckStatus, DEFAULT_MODE, Handle, LAYOUT, MIN_POOL_SIZE, PoolConfig, PoolError, RawValue,
    Result, TxStage, Value,
};
pub use object::PersistentObject;
pub use pool::PersistentObjectPool;
pub use storage::{HeapEngine, StorageEngine};

/// A pool at `path` with the default layout and file mode, backed by the
/// built-in heap engine. The pool starts closed; call `create()` or `open()`.
pub fn new_pool<P: AsRef<std::path::Path>>(path: P, size: u64) -> PersistentObjectPool {
    PersistentObjectPool::new(PoolConfig::new(path, size))
}
