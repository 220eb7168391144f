pub mod engine;
pub mod heap;
pub mod persistence;

pub use engine::{SharedEngine, StorageEngine};
pub use heap::HeapEngine;
pub use persistence::{PoolFile, PoolImage};
