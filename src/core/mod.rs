pub mod error;
pub mod types;
pub mod value;

pub use error::{PoolError, Result};
pub use types::{CheckStatus, DEFAULT_MODE, Handle, LAYOUT, MIN_POOL_SIZE, PoolConfig, TxStage};
pub use value::{RawValue, Value};
