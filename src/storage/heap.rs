//! Default storage engine: an in-memory object heap made durable as a
//! fixed-capacity pool file.
//!
//! Durability points are `close`, `tx_commit` and `persist`; mutations
//! outside a transaction live in memory until the next one. Transactions
//! take an undo copy of the root and the object heap at `tx_begin` and
//! restore it on `tx_abort`; byte-buffer views participate only through
//! explicitly snapshotted ranges.

use crate::core::{
    CheckStatus, Handle, MIN_POOL_SIZE, PoolConfig, PoolError, RawValue, Result, TxStage,
};
use crate::storage::engine::StorageEngine;
use crate::storage::persistence::{PoolFile, PoolImage};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// One persistent object: a property-keyed map (insertion-ordered) or an
/// ordered sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HeapObject {
    Map(Vec<(String, RawValue)>),
    Array(Vec<RawValue>),
}

#[derive(Debug, Clone)]
struct HeapBuffer {
    view: Vec<u8>,
    durable: Vec<u8>,
}

#[derive(Debug, Clone)]
struct HeapState {
    root: RawValue,
    objects: HashMap<u64, HeapObject>,
    buffers: HashMap<u64, HeapBuffer>,
    next_handle: u64,
}

impl HeapState {
    fn new() -> Self {
        Self {
            root: RawValue::None,
            objects: HashMap::new(),
            buffers: HashMap::new(),
            next_handle: 1,
        }
    }

    fn from_image(image: PoolImage) -> Self {
        Self {
            root: image.root,
            objects: image.objects,
            buffers: image
                .buffers
                .into_iter()
                .map(|(id, bytes)| {
                    (
                        id,
                        HeapBuffer {
                            view: bytes.clone(),
                            durable: bytes,
                        },
                    )
                })
                .collect(),
            next_handle: image.next_handle,
        }
    }
}

struct BufferSnapshot {
    handle: u64,
    offset: usize,
    bytes: Vec<u8>,
}

struct TxUndo {
    root: RawValue,
    objects: HashMap<u64, HeapObject>,
    snapshots: Vec<BufferSnapshot>,
}

pub struct HeapEngine {
    config: PoolConfig,
    file: PoolFile,
    state: Option<HeapState>,
    stage: TxStage,
    undo: Option<TxUndo>,
}

impl HeapEngine {
    pub fn new(config: PoolConfig) -> Self {
        let file = PoolFile::new(&config.path, config.size);
        Self {
            config,
            file,
            state: None,
            stage: TxStage::None,
            undo: None,
        }
    }

    fn state(&self) -> Result<&HeapState> {
        self.state.as_ref().ok_or(PoolError::PoolClosed)
    }

    fn state_mut(&mut self) -> Result<&mut HeapState> {
        self.state.as_mut().ok_or(PoolError::PoolClosed)
    }

    fn object(&self, handle: Handle) -> Result<&HeapObject> {
        self.state()?
            .objects
            .get(&handle.0)
            .ok_or(PoolError::InvalidObject)
    }

    fn array(&self, handle: Handle) -> Result<&Vec<RawValue>> {
        match self.object(handle)? {
            HeapObject::Array(items) => Ok(items),
            HeapObject::Map(_) => Err(PoolError::EngineError(format!(
                "{} is not an array",
                handle
            ))),
        }
    }

    fn array_mut(&mut self, handle: Handle) -> Result<&mut Vec<RawValue>> {
        match self
            .state_mut()?
            .objects
            .get_mut(&handle.0)
            .ok_or(PoolError::InvalidObject)?
        {
            HeapObject::Array(items) => Ok(items),
            HeapObject::Map(_) => Err(PoolError::EngineError(format!(
                "{} is not an array",
                handle
            ))),
        }
    }

    fn buffer(&self, handle: Handle) -> Result<&HeapBuffer> {
        self.state()?
            .buffers
            .get(&handle.0)
            .ok_or(PoolError::InvalidObject)
    }

    fn alloc_handle(&mut self) -> Result<Handle> {
        let state = self.state_mut()?;
        let handle = Handle(state.next_handle);
        state.next_handle += 1;
        Ok(handle)
    }

    /// Reduce a value to its stored form: scalars pass through, references
    /// are checked against the heap, `Map`/`List` literals are deep-copied
    /// into fresh objects.
    fn store_value(&mut self, value: RawValue) -> Result<RawValue> {
        match value {
            RawValue::Map(entries) => Ok(RawValue::Ref(self.alloc_map(entries)?)),
            RawValue::List(items) => Ok(RawValue::Ref(self.alloc_array(items)?)),
            RawValue::Ref(handle) => {
                let state = self.state()?;
                if state.buffers.contains_key(&handle.0) {
                    // byte regions cannot be stored inside objects or the root
                    return Err(PoolError::UnsupportedType);
                }
                if !state.objects.contains_key(&handle.0) {
                    return Err(PoolError::InvalidObject);
                }
                Ok(RawValue::Ref(handle))
            }
            scalar => Ok(scalar),
        }
    }

    fn alloc_map(&mut self, entries: Vec<(String, RawValue)>) -> Result<Handle> {
        let mut stored = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            stored.push((key, self.store_value(value)?));
        }
        let handle = self.alloc_handle()?;
        self.state_mut()?
            .objects
            .insert(handle.0, HeapObject::Map(stored));
        Ok(handle)
    }

    fn alloc_array(&mut self, items: Vec<RawValue>) -> Result<Handle> {
        let mut stored = Vec::with_capacity(items.len());
        for item in items {
            stored.push(self.store_value(item)?);
        }
        let handle = self.alloc_handle()?;
        self.state_mut()?
            .objects
            .insert(handle.0, HeapObject::Array(stored));
        Ok(handle)
    }

    fn flush(&self) -> Result<()> {
        let state = self.state()?;
        let image = PoolImage {
            layout: self.config.layout.clone(),
            root: state.root.clone(),
            objects: state.objects.clone(),
            buffers: state
                .buffers
                .iter()
                .map(|(id, buffer)| (*id, buffer.durable.clone()))
                .collect(),
            next_handle: state.next_handle,
        };
        self.file.save(&image)
    }

    fn check_range(len: usize, offset: usize, count: usize) -> Result<()> {
        let fits = offset
            .checked_add(count)
            .map(|end| end <= len)
            .unwrap_or(false);
        if !fits {
            return Err(PoolError::EngineError(format!(
                "range {}+{} out of bounds for buffer of {} bytes",
                offset, count, len
            )));
        }
        Ok(())
    }
}

impl StorageEngine for HeapEngine {
    fn create(&mut self) -> Result<()> {
        if self.state.is_some() {
            return Err(PoolError::PoolOpened);
        }
        if self.config.size < MIN_POOL_SIZE || self.file.exists() {
            return Err(PoolError::CreateFailed);
        }
        let state = HeapState::new();
        self.file = PoolFile::new(&self.config.path, self.config.size);
        if let Err(err) = self
            .file
            .create(&PoolImage::empty(&self.config.layout), self.config.mode)
        {
            debug!("pool create failed: {}", err);
            return Err(PoolError::CreateFailed);
        }
        self.state = Some(state);
        info!("created pool at {:?}", self.config.path);
        Ok(())
    }

    fn open(&mut self) -> Result<()> {
        if self.state.is_some() {
            return Err(PoolError::PoolOpened);
        }
        if !self.file.exists() {
            return Err(PoolError::OpenFailed);
        }
        if self.file.adopt_capacity().is_err() {
            return Err(PoolError::OpenFailed);
        }
        let image = match self.file.load() {
            Ok(image) => image,
            Err(err) => {
                debug!("pool open failed: {}", err);
                return Err(PoolError::OpenFailed);
            }
        };
        if image.layout != self.config.layout {
            debug!(
                "pool layout mismatch: found {:?}, expected {:?}",
                image.layout, self.config.layout
            );
            return Err(PoolError::OpenFailed);
        }
        self.state = Some(HeapState::from_image(image));
        debug!("opened pool at {:?}", self.config.path);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.state.is_none() {
            return Err(PoolError::PoolClosed);
        }
        // never flush half a transaction; the caller must abort or commit
        // and end it first
        if self.stage == TxStage::Work {
            return Err(PoolError::TransactionError(
                "cannot close with a transaction in progress".to_string(),
            ));
        }
        self.flush()?;
        self.state = None;
        self.stage = TxStage::None;
        self.undo = None;
        debug!("closed pool at {:?}", self.config.path);
        Ok(())
    }

    fn check(&self) -> Result<CheckStatus> {
        Ok(self.file.check(&self.config.layout))
    }

    fn get_root(&self) -> Result<RawValue> {
        Ok(self.state()?.root.clone())
    }

    fn set_root(&mut self, value: RawValue) -> Result<()> {
        let stored = self.store_value(value)?;
        self.state_mut()?.root = stored;
        Ok(())
    }

    fn create_object(&mut self, initial: RawValue) -> Result<Handle> {
        match initial {
            RawValue::Map(entries) => self.alloc_map(entries),
            RawValue::List(items) => self.alloc_array(items),
            // creating an object from an existing persistent reference or a
            // scalar is not supported
            _ => Err(PoolError::UnsupportedType),
        }
    }

    fn create_buffer(&mut self, bytes: &[u8]) -> Result<Handle> {
        let handle = self.alloc_handle()?;
        self.state_mut()?.buffers.insert(
            handle.0,
            HeapBuffer {
                view: bytes.to_vec(),
                durable: bytes.to_vec(),
            },
        );
        Ok(handle)
    }

    fn is_valid(&self, handle: Handle) -> bool {
        self.state.as_ref().is_some_and(|state| {
            state.objects.contains_key(&handle.0) || state.buffers.contains_key(&handle.0)
        })
    }

    fn get_property(&self, handle: Handle, key: &str) -> Result<RawValue> {
        match self.object(handle)? {
            HeapObject::Map(entries) => entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .ok_or(PoolError::KeyNotFound),
            HeapObject::Array(items) => key
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index).cloned())
                .ok_or(PoolError::KeyNotFound),
        }
    }

    fn set_property(&mut self, handle: Handle, key: &str, value: RawValue) -> Result<()> {
        let stored = self.store_value(value)?;
        let object = self
            .state_mut()?
            .objects
            .get_mut(&handle.0)
            .ok_or(PoolError::InvalidObject)?;
        match object {
            HeapObject::Map(entries) => {
                if let Some(entry) = entries.iter_mut().find(|(k, _)| k == key) {
                    entry.1 = stored;
                } else {
                    entries.push((key.to_string(), stored));
                }
            }
            HeapObject::Array(items) => {
                let index: usize = key.parse().map_err(|_| {
                    PoolError::EngineError(format!("invalid array index '{}'", key))
                })?;
                if index >= items.len() {
                    items.resize(index + 1, RawValue::None);
                }
                items[index] = stored;
            }
        }
        Ok(())
    }

    fn del_property(&mut self, handle: Handle, key: &str) -> Result<()> {
        let object = self
            .state_mut()?
            .objects
            .get_mut(&handle.0)
            .ok_or(PoolError::InvalidObject)?;
        match object {
            HeapObject::Map(entries) => {
                entries.retain(|(k, _)| k != key);
            }
            HeapObject::Array(items) => {
                // deleting an index leaves a hole, length is unchanged
                if let Ok(index) = key.parse::<usize>() {
                    if index < items.len() {
                        items[index] = RawValue::None;
                    }
                }
            }
        }
        Ok(())
    }

    fn property_names(&self, handle: Handle) -> Result<Vec<String>> {
        match self.object(handle)? {
            HeapObject::Map(entries) => Ok(entries.iter().map(|(k, _)| k.clone()).collect()),
            HeapObject::Array(items) => {
                let mut names: Vec<String> = (0..items.len()).map(|i| i.to_string()).collect();
                names.push("length".to_string());
                Ok(names)
            }
        }
    }

    fn is_array(&self, handle: Handle) -> Result<bool> {
        Ok(matches!(self.object(handle)?, HeapObject::Array(_)))
    }

    fn get_length(&self, handle: Handle) -> Result<u64> {
        Ok(self.array(handle)?.len() as u64)
    }

    fn set_length(&mut self, handle: Handle, len: u64) -> Result<()> {
        // a slot needs at least one byte of image space, so any length past
        // the pool capacity can never fit
        if len > self.config.size {
            return Err(PoolError::InvalidArrayLength);
        }
        let items = self.array_mut(handle)?;
        items.resize(len as usize, RawValue::None);
        Ok(())
    }

    fn push(&mut self, handle: Handle, item: RawValue) -> Result<()> {
        let stored = self.store_value(item)?;
        self.array_mut(handle)?.push(stored);
        Ok(())
    }

    fn pop(&mut self, handle: Handle) -> Result<RawValue> {
        Ok(self.array_mut(handle)?.pop().unwrap_or(RawValue::None))
    }

    fn buffer_len(&self, handle: Handle) -> Result<usize> {
        Ok(self.buffer(handle)?.view.len())
    }

    fn read_buffer(&self, handle: Handle) -> Result<Vec<u8>> {
        Ok(self.buffer(handle)?.view.clone())
    }

    fn write_buffer(&mut self, handle: Handle, offset: usize, bytes: &[u8]) -> Result<()> {
        let buffer = self
            .state_mut()?
            .buffers
            .get_mut(&handle.0)
            .ok_or(PoolError::InvalidObject)?;
        Self::check_range(buffer.view.len(), offset, bytes.len())?;
        buffer.view[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn snapshot(&mut self, handle: Handle, offset: usize, len: usize) -> Result<()> {
        if self.stage != TxStage::Work {
            return Err(PoolError::TransactionError(
                "snapshot requires an active transaction".to_string(),
            ));
        }
        let buffer = self.buffer(handle)?;
        Self::check_range(buffer.view.len(), offset, len)?;
        let bytes = buffer.view[offset..offset + len].to_vec();
        let undo = self.undo.as_mut().ok_or_else(|| {
            PoolError::TransactionError("missing transaction undo state".to_string())
        })?;
        undo.snapshots.push(BufferSnapshot {
            handle: handle.0,
            offset,
            bytes,
        });
        Ok(())
    }

    fn persist(&mut self, handle: Handle, offset: usize, len: usize) -> Result<()> {
        let buffer = self
            .state_mut()?
            .buffers
            .get_mut(&handle.0)
            .ok_or(PoolError::InvalidObject)?;
        Self::check_range(buffer.view.len(), offset, len)?;
        let bytes = buffer.view[offset..offset + len].to_vec();
        buffer.durable[offset..offset + len].copy_from_slice(&bytes);
        self.flush()
    }

    fn tx_begin(&mut self) -> Result<()> {
        if self.stage != TxStage::None {
            return Err(PoolError::TransactionError(format!(
                "transaction already in progress (stage {})",
                self.stage
            )));
        }
        let state = self.state()?;
        self.undo = Some(TxUndo {
            root: state.root.clone(),
            objects: state.objects.clone(),
            snapshots: Vec::new(),
        });
        self.stage = TxStage::Work;
        debug!("transaction begin");
        Ok(())
    }

    fn tx_commit(&mut self) -> Result<()> {
        if self.stage != TxStage::Work {
            return Err(PoolError::TransactionError(format!(
                "cannot commit at stage {}",
                self.stage
            )));
        }
        if let Some(undo) = self.undo.take() {
            // snapshotted buffer ranges become durable with the commit
            let state = self.state_mut()?;
            for snap in &undo.snapshots {
                if let Some(buffer) = state.buffers.get_mut(&snap.handle) {
                    let end = snap.offset + snap.bytes.len();
                    let current = buffer.view[snap.offset..end].to_vec();
                    buffer.durable[snap.offset..end].copy_from_slice(&current);
                }
            }
        }
        self.stage = TxStage::OnCommit;
        debug!("transaction commit");
        self.flush()
    }

    fn tx_abort(&mut self) -> Result<()> {
        match self.stage {
            TxStage::Work => {
                let undo = self.undo.take().ok_or_else(|| {
                    PoolError::TransactionError("missing transaction undo state".to_string())
                })?;
                let state = self.state_mut()?;
                state.root = undo.root;
                state.objects = undo.objects;
                for snap in undo.snapshots.iter().rev() {
                    if let Some(buffer) = state.buffers.get_mut(&snap.handle) {
                        let end = snap.offset + snap.bytes.len();
                        buffer.view[snap.offset..end].copy_from_slice(&snap.bytes);
                    }
                }
                self.stage = TxStage::OnAbort;
                debug!("transaction abort");
                Ok(())
            }
            // a second abort of an already-aborted transaction is a no-op
            TxStage::OnAbort => Ok(()),
            stage => Err(PoolError::TransactionError(format!(
                "cannot abort at stage {}",
                stage
            ))),
        }
    }

    fn tx_end(&mut self) -> Result<()> {
        if !self.stage.is_terminal() {
            return Err(PoolError::TransactionError(format!(
                "no transaction to end (stage {})",
                self.stage
            )));
        }
        self.stage = TxStage::None;
        debug!("transaction end");
        Ok(())
    }

    fn tx_stage(&self) -> Result<TxStage> {
        Ok(self.stage)
    }

    fn gc(&mut self) -> Result<()> {
        if self.stage != TxStage::None {
            return Err(PoolError::TransactionError(
                "garbage collection inside a transaction".to_string(),
            ));
        }
        let state = self.state_mut()?;
        let mut marked: HashSet<u64> = HashSet::new();
        let mut stack: Vec<u64> = Vec::new();
        if let RawValue::Ref(handle) = state.root {
            stack.push(handle.0);
        }
        while let Some(id) = stack.pop() {
            if !marked.insert(id) {
                continue;
            }
            let refs = match state.objects.get(&id) {
                Some(HeapObject::Map(entries)) => {
                    entries.iter().map(|(_, v)| v).collect::<Vec<_>>()
                }
                Some(HeapObject::Array(items)) => items.iter().collect(),
                None => continue,
            };
            for value in refs {
                if let RawValue::Ref(handle) = value {
                    stack.push(handle.0);
                }
            }
        }
        let before = state.objects.len();
        state.objects.retain(|id, _| marked.contains(id));
        debug!("gc reclaimed {} objects", before - state.objects.len());
        Ok(())
    }
}
