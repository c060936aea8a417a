use std::sync::Arc;

use memmap2::Mmap;

use crate::cache::ReprCache;
use crate::decoder;
use crate::error::{LogError, Result};
use crate::index::{FrameIndexEntry, IndexFiles, MessageIndexEntry};
use crate::message::MessageInstance;
use crate::schema::TypeRegistry;
use crate::stream::StreamReader;
use crate::value::Value;

/// The set of absolute indices an Accessor is restricted to.
#[derive(Debug, Clone)]
pub enum IndexMapKind {
    Range(std::ops::Range<u64>),
    Sorted(Vec<u64>),
}

impl IndexMapKind {
    pub fn len(&self) -> usize {
        match self {
            IndexMapKind::Range(r) => (r.end - r.start) as usize,
            IndexMapKind::Sorted(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, relative: usize) -> Option<u64> {
        match self {
            IndexMapKind::Range(r) => {
                let v = r.start + relative as u64;
                (v < r.end).then_some(v)
            }
            IndexMapKind::Sorted(v) => v.get(relative).copied(),
        }
    }

    /// Binary-searches this index map for `abs_index`'s relative position.
    pub fn relative_of(&self, abs_index: u64) -> Result<usize> {
        match self {
            IndexMapKind::Range(r) => {
                if abs_index >= r.start && abs_index < r.end {
                    Ok((abs_index - r.start) as usize)
                } else {
                    Err(LogError::NotInIndexMap { abs_index })
                }
            }
            IndexMapKind::Sorted(v) => v
                .binary_search(&abs_index)
                .map_err(|_| LogError::NotInIndexMap { abs_index }),
        }
    }
}

/// Index-file-backed cursor over a set of messages. Indexing by absolute
/// position repositions the cursor rather than constructing a new object,
/// matching the original's accessor-is-its-own-iterator design.
pub struct MessageAccessor {
    log_bytes: Arc<Mmap>,
    index: IndexFiles,
    index_map: IndexMapKind,
    cursor: usize,
    repr_cache: ReprCache,
}

impl MessageAccessor {
    pub fn new(log_bytes: Arc<Mmap>, index: IndexFiles, index_map: IndexMapKind, repr_cache_capacity: usize) -> Self {
        MessageAccessor { log_bytes, index, index_map, cursor: 0, repr_cache: ReprCache::new(repr_cache_capacity) }
    }

    pub fn len(&self) -> usize {
        self.index_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_map.is_empty()
    }

    pub fn index(&self) -> usize {
        self.cursor
    }

    /// Repositions the cursor to `relative`, the position within this
    /// accessor's own index map (not the absolute log index).
    pub fn seek(&mut self, relative: usize) -> Result<()> {
        if relative >= self.index_map.len() {
            return Err(LogError::NotInIndexMap { abs_index: relative as u64 });
        }
        self.cursor = relative;
        Ok(())
    }

    pub fn abs_index(&self) -> Result<u64> {
        self.index_map.get(self.cursor).ok_or(LogError::NotInIndexMap { abs_index: self.cursor as u64 })
    }

    /// Moves the cursor to the absolute index `abs_index`, failing if it is
    /// outside this accessor's index map.
    pub fn seek_abs(&mut self, abs_index: u64) -> Result<()> {
        self.cursor = self.index_map.relative_of(abs_index)?;
        Ok(())
    }

    fn current_entry(&self) -> Result<MessageIndexEntry> {
        self.index.read_message_entry(self.abs_index()?)
    }

    pub fn start_byte(&self) -> Result<u64> {
        Ok(self.current_entry()?.start_byte)
    }

    pub fn end_byte(&self) -> Result<u64> {
        Ok(self.current_entry()?.end_byte)
    }

    pub fn frame_abs_index(&self) -> Result<u64> {
        Ok(self.current_entry()?.frame_abs_index)
    }

    pub fn log_id(&self) -> Result<u8> {
        Ok(self.log_bytes[self.current_entry()?.start_byte as usize])
    }

    pub fn is_parsed(&self) -> Result<bool> {
        Ok(self.repr_cache.contains(self.abs_index()?))
    }

    /// Decodes (if not already cached) and returns this message's
    /// representation.
    pub fn repr(&mut self, registry: &TypeRegistry, class_name: &str) -> Result<Value> {
        let abs = self.abs_index()?;
        if let Some(v) = self.repr_cache.get(abs) {
            return Ok(v.clone());
        }
        let entry = self.current_entry()?;
        let body = &self.log_bytes[(entry.start_byte as usize + 4)..entry.end_byte as usize];
        let mut reader = StreamReader::new(body);
        let value = decoder::decode(registry, class_name, &mut reader, Some(body.len()))?;
        self.repr_cache.insert(abs, value.clone());
        Ok(value)
    }

    /// Builds a fully-owned snapshot of the message currently under the cursor.
    pub fn to_instance(&self, class_name: &str) -> Result<MessageInstance> {
        let abs = self.abs_index()?;
        let entry = self.current_entry()?;
        Ok(MessageInstance {
            log_id: self.log_id()?,
            class_name: class_name.to_string(),
            start_byte: entry.start_byte as usize,
            end_byte: entry.end_byte as usize,
            abs_index: abs,
            frame_abs_index: entry.frame_abs_index,
            repr: self.repr_cache.get(abs).cloned(),
        })
    }
}

/// Index-file-backed cursor over a set of frames.
pub struct FrameAccessor {
    index: IndexFiles,
    index_map: IndexMapKind,
    cursor: usize,
}

impl FrameAccessor {
    pub fn new(index: IndexFiles, index_map: IndexMapKind) -> Self {
        FrameAccessor { index, index_map, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.index_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_map.is_empty()
    }

    pub fn seek(&mut self, relative: usize) -> Result<()> {
        if relative >= self.index_map.len() {
            return Err(LogError::NotInIndexMap { abs_index: relative as u64 });
        }
        self.cursor = relative;
        Ok(())
    }

    pub fn abs_index(&self) -> Result<u64> {
        self.index_map.get(self.cursor).ok_or(LogError::NotInIndexMap { abs_index: self.cursor as u64 })
    }

    pub fn seek_abs(&mut self, abs_index: u64) -> Result<()> {
        self.cursor = self.index_map.relative_of(abs_index)?;
        Ok(())
    }

    pub fn entry(&self) -> Result<FrameIndexEntry> {
        self.index.read_frame_entry(self.abs_index()?)
    }
}
