//! Pool file format and atomic image persistence.
//!
//! A pool file is a fixed-capacity file: an 8-byte magic, a little-endian
//! u64 image length, a MessagePack-encoded [`PoolImage`], zero padding up to
//! the configured capacity. Saves go through a temp file in the same
//! directory, fsync, then rename, so a crashed save never corrupts the
//! previous image.

use crate::core::{CheckStatus, PoolError, RawValue, Result};
use crate::storage::heap::HeapObject;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const MAGIC: &[u8; 8] = b"PMOBJ\x00\x00\x01";
const HEADER_LEN: u64 = 16;

/// The durable state of one pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolImage {
    pub layout: String,
    pub root: RawValue,
    pub objects: HashMap<u64, HeapObject>,
    pub buffers: HashMap<u64, Vec<u8>>,
    pub next_handle: u64,
}

impl PoolImage {
    pub fn empty(layout: &str) -> Self {
        Self {
            layout: layout.to_string(),
            root: RawValue::None,
            objects: HashMap::new(),
            buffers: HashMap::new(),
            next_handle: 1,
        }
    }
}

/// One fixed-capacity pool file on disk.
pub struct PoolFile {
    path: PathBuf,
    capacity: u64,
}

impl PoolFile {
    pub fn new<P: AsRef<Path>>(path: P, capacity: u64) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            capacity,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Adopt the capacity of the existing file (used by `open`, which may be
    /// configured with size 0).
    pub fn adopt_capacity(&mut self) -> Result<()> {
        let meta = fs::metadata(&self.path)
            .map_err(|e| PoolError::IoError(format!("failed to stat pool file: {}", e)))?;
        self.capacity = meta.len();
        Ok(())
    }

    fn encode(image: &PoolImage) -> Result<Vec<u8>> {
        rmp_serde::to_vec(image)
            .map_err(|e| PoolError::EngineError(format!("failed to serialize pool image: {}", e)))
    }

    fn write_image(file: &mut File, encoded: &[u8], capacity: u64) -> Result<()> {
        file.write_all(MAGIC)
            .and_then(|_| file.write_all(&(encoded.len() as u64).to_le_bytes()))
            .and_then(|_| file.write_all(encoded))
            .map_err(|e| PoolError::IoError(format!("failed to write pool image: {}", e)))?;
        // zero padding up to the fixed pool capacity
        file.set_len(capacity)
            .map_err(|e| PoolError::IoError(format!("failed to size pool file: {}", e)))?;
        Ok(())
    }

    fn ensure_fits(&self, encoded: &[u8]) -> Result<()> {
        if HEADER_LEN + encoded.len() as u64 > self.capacity {
            return Err(PoolError::EngineError(
                "pool image exceeds pool capacity".to_string(),
            ));
        }
        Ok(())
    }

    /// Create the pool file. Fails if a file already exists at the path or
    /// the parent directory is missing.
    pub fn create(&self, image: &PoolImage, mode: u32) -> Result<()> {
        let encoded = Self::encode(image)?;
        self.ensure_fits(&encoded)?;
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode);
        }
        #[cfg(not(unix))]
        let _ = mode;
        let mut file = options
            .open(&self.path)
            .map_err(|e| PoolError::IoError(format!("failed to create pool file: {}", e)))?;
        Self::write_image(&mut file, &encoded, self.capacity)?;
        file.sync_all()
            .map_err(|e| PoolError::IoError(format!("failed to sync pool file: {}", e)))?;
        Ok(())
    }

    /// Atomically replace the pool file with a new image.
    pub fn save(&self, image: &PoolImage) -> Result<()> {
        let encoded = Self::encode(image)?;
        self.ensure_fits(&encoded)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = NamedTempFile::new_in(dir)
            .map_err(|e| PoolError::IoError(format!("failed to create temp file: {}", e)))?;
        Self::write_image(temp.as_file_mut(), &encoded, self.capacity)?;
        temp.as_file()
            .sync_all()
            .map_err(|e| PoolError::IoError(format!("failed to sync pool image: {}", e)))?;
        temp.persist(&self.path)
            .map_err(|e| PoolError::IoError(format!("failed to replace pool file: {}", e)))?;
        Ok(())
    }

    pub fn load(&self) -> Result<PoolImage> {
        let mut file = File::open(&self.path)
            .map_err(|e| PoolError::IoError(format!("failed to open pool file: {}", e)))?;
        let mut header = [0u8; HEADER_LEN as usize];
        file.read_exact(&mut header)
            .map_err(|e| PoolError::IoError(format!("failed to read pool header: {}", e)))?;
        if &header[..8] != MAGIC {
            return Err(PoolError::EngineError("not a pool file".to_string()));
        }
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&header[8..16]);
        let len = u64::from_le_bytes(len_bytes) as usize;
        let mut data = vec![0u8; len];
        file.read_exact(&mut data)
            .map_err(|e| PoolError::IoError(format!("failed to read pool image: {}", e)))?;
        rmp_serde::from_slice(&data)
            .map_err(|e| PoolError::EngineError(format!("failed to deserialize pool image: {}", e)))
    }

    /// Tri-state consistency check; never requires an open mapping.
    pub fn check(&self, layout: &str) -> CheckStatus {
        if !self.path.exists() {
            return CheckStatus::Missing;
        }
        match self.load() {
            Ok(image) if image.layout == layout => CheckStatus::Consistent,
            _ => CheckStatus::Inconsistent,
        }
    }
}
