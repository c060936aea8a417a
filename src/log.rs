use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;
use tracing::{info, instrument};

use crate::accessor::{FrameAccessor, IndexMapKind, MessageAccessor};
use crate::chunk::settings::Settings;
use crate::chunk::{self, typeinfo, uncompressed::UncompressedChunk, ChunkKind};
use crate::error::Result;
use crate::frame::FrameInstance;
use crate::index::IndexFiles;
use crate::message_id::MessageIdTable;
use crate::pipeline;
use crate::schema::TypeRegistry;
use crate::stream::StreamReader;
use crate::thread_view;
use crate::timer::Timer;
use crate::value::Value;

/// Knobs controlling how a [`Log`] is opened and parsed.
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Overrides the default `<logDir>/<logStem>_cache/` directory.
    pub cache_dir: Option<PathBuf>,
    /// When true, a message with a missing/unknown id is skipped instead of
    /// aborting the whole frame.
    pub continue_on_error: bool,
    /// Per-accessor representation cache capacity (FIFO eviction).
    pub repr_cache_capacity: usize,
    /// Whether decoded representations are persisted to the cache directory.
    pub persist_repr_cache: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        LogOptions {
            cache_dir: None,
            continue_on_error: false,
            repr_cache_capacity: 200,
            persist_repr_cache: true,
        }
    }
}

/// A fully opened log: the memory-mapped file, its schema, its MessageID
/// table, and the parsed Uncompressed chunk.
pub struct Log {
    pub bytes: Arc<Mmap>,
    pub registry: TypeRegistry,
    pub message_ids: MessageIdTable,
    pub settings: Option<Settings>,
    pub frames: Vec<FrameInstance>,
    pub threads: HashMap<String, Vec<usize>>,
    pub timers: HashMap<String, Timer>,
    pub timestamps: Vec<Option<i64>>,
    pub cache_dir: PathBuf,
    pub options: LogOptions,
    index: IndexFiles,
    /// absolute frame index -> (thread name, position within that thread),
    /// used to route a `Stopwatch` message read through a `MessageAccessor`
    /// to the right `Timer` slot.
    frame_thread_pos: HashMap<u64, (String, usize)>,
}

impl Log {
    #[instrument(skip(options), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, options: LogOptions) -> Result<Log> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        let bytes = Arc::new(mmap);

        let cache_dir = options.cache_dir.clone().unwrap_or_else(|| default_cache_dir(path));
        std::fs::create_dir_all(&cache_dir)?;
        let index = IndexFiles::new(&cache_dir);

        let mut registry = TypeRegistry::new();
        let mut settings = None;

        let mut reader = StreamReader::new(&bytes);
        let mut message_ids: Option<MessageIdTable> = None;
        let mut uncompressed: Option<UncompressedChunk> = None;

        while reader.tell() < bytes.len() {
            let magic = reader.read_u8()?;
            match chunk::dispatch(magic)? {
                ChunkKind::Settings => {
                    settings = Some(Settings::eval(&mut reader)?);
                }
                ChunkKind::TypeInfo => {
                    typeinfo::eval(&mut reader, &mut registry)?;
                    message_ids = Some(MessageIdTable::from_registry(&registry)?);
                }
                ChunkKind::Uncompressed => {
                    let ids = message_ids
                        .as_ref()
                        .ok_or_else(|| crate::error::LogError::IndexCorrupt(
                            "Uncompressed chunk encountered before TypeInfo chunk".to_string(),
                        ))?;

                    // Validate whatever is already on disk and truncate back
                    // to the last consistent entry-aligned boundary rather
                    // than blindly clearing it; `eval` then skips
                    // re-appending anything at or below those counts.
                    index.ensure_valid()?;
                    let base_frame_count = index.frame_count()?;
                    let base_message_count = index.message_count()?;

                    let chunk = UncompressedChunk::eval(
                        &mut reader,
                        &bytes,
                        &registry,
                        ids,
                        &index,
                        options.continue_on_error,
                        base_frame_count,
                        base_message_count,
                    )?;
                    uncompressed = Some(chunk);
                }
            }
        }

        let mut chunk = uncompressed.unwrap_or_else(|| UncompressedChunk {
            frames: Vec::new(),
            threads: HashMap::new(),
            timers: HashMap::new(),
            timestamps: Vec::new(),
        });

        pipeline::parse_bytes(
            &mut chunk.frames,
            &bytes,
            &registry,
            &chunk.threads,
            &mut chunk.timers,
            options.persist_repr_cache.then_some(cache_dir.as_path()),
            options.persist_repr_cache,
            options.continue_on_error,
        )?;

        // Timestamps are derived from decoded `FrameInfo.time` fields, so
        // this can only run once the pipeline above has populated `repr`.
        chunk.timestamps = thread_view::compute_timestamps(&chunk.frames, &bytes);

        let mut frame_thread_pos: HashMap<u64, (String, usize)> = HashMap::new();
        for (thread_name, indices) in &chunk.threads {
            for (pos_in_thread, &frame_idx) in indices.iter().enumerate() {
                frame_thread_pos.insert(frame_idx as u64, (thread_name.clone(), pos_in_thread));
            }
        }

        info!(frames = chunk.frames.len(), "log opened");

        Ok(Log {
            bytes,
            registry,
            message_ids: message_ids
                .ok_or_else(|| crate::error::LogError::IndexCorrupt("log has no TypeInfo chunk".to_string()))?,
            settings,
            frames: chunk.frames,
            threads: chunk.threads,
            timers: chunk.timers,
            timestamps: chunk.timestamps,
            cache_dir,
            options,
            index,
            frame_thread_pos,
        })
    }

    pub fn open_default(path: impl AsRef<Path>) -> Result<Log> {
        Log::open(path, LogOptions::default())
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn thread_frames(&self, thread_name: &str) -> Option<&[usize]> {
        self.threads.get(thread_name).map(Vec::as_slice)
    }

    pub fn timestamp_of(&self, frame_index: usize) -> Option<i64> {
        self.timestamps.get(frame_index).copied().flatten()
    }

    /// An index-file-backed cursor over every message in the log, for random
    /// access without holding the whole decoded frame tree in memory.
    pub fn message_accessor(&self) -> Result<MessageAccessor> {
        let count = self.index.message_count()?;
        Ok(MessageAccessor::new(
            Arc::clone(&self.bytes),
            self.index.clone(),
            IndexMapKind::Range(0..count),
            self.options.repr_cache_capacity,
        ))
    }

    /// An index-file-backed cursor over every frame in the log.
    pub fn frame_accessor(&self) -> Result<FrameAccessor> {
        let count = self.index.frame_count()?;
        Ok(FrameAccessor::new(self.index.clone(), IndexMapKind::Range(0..count)))
    }

    /// An index-file-backed cursor restricted to one thread's frames.
    pub fn thread_frame_accessor(&self, thread_name: &str) -> Option<FrameAccessor> {
        let indices = self.threads.get(thread_name)?;
        let sorted: Vec<u64> = indices.iter().map(|&i| i as u64).collect();
        Some(FrameAccessor::new(self.index.clone(), IndexMapKind::Sorted(sorted)))
    }

    /// Decodes the message currently under `accessor`'s cursor, routing
    /// `Stopwatch` messages through the already-aggregated `Timer` instead
    /// of the raw per-message sample list, the same substitution
    /// `pipeline::parse_bytes` applies to owned `MessageInstance`s.
    pub fn accessor_repr(&self, accessor: &mut MessageAccessor, class_name: &str) -> Result<Value> {
        if class_name == "Stopwatch" {
            if let Ok(frame_abs) = accessor.frame_abs_index() {
                if let Some((thread_name, pos_in_thread)) = self.frame_thread_pos.get(&frame_abs) {
                    if let Some(timer) = self.timers.get(thread_name) {
                        return Ok(timer.get_stopwatch(*pos_in_thread));
                    }
                }
            }
        }
        accessor.repr(&self.registry, class_name)
    }
}

fn default_cache_dir(log_path: &Path) -> PathBuf {
    let parent = log_path.parent().unwrap_or_else(|| Path::new("."));
    let stem = log_path.file_stem().and_then(|s| s.to_str()).unwrap_or("log");
    parent.join(format!("{stem}_cache"))
}
