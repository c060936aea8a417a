use std::collections::HashMap;

use tracing::{debug, instrument};

use crate::error::Result;
use crate::frame::FrameInstance;
use crate::index::{FrameIndexEntry, IndexFiles, MessageIndexEntry};
use crate::message_id::MessageIdTable;
use crate::schema::TypeRegistry;
use crate::stream::StreamReader;
use crate::timer::Timer;

/// A fully evaluated Uncompressed chunk: every frame, grouped by thread, with
/// per-thread Stopwatch aggregation and back-filled timestamps.
pub struct UncompressedChunk {
    pub frames: Vec<FrameInstance>,
    /// thread name -> indices into `frames`, in whole-log order.
    pub threads: HashMap<String, Vec<usize>>,
    pub timers: HashMap<String, Timer>,
    /// parallel to `frames`.
    pub timestamps: Vec<Option<i64>>,
}

impl UncompressedChunk {
    /// Evaluates the chunk body starting at `reader`'s position (after the
    /// magic byte has already been consumed by the dispatcher).
    ///
    /// The queue header's `usedSize`/`hasIndex` fields are read per the
    /// resolved Open Question: prefer `min(usedSize, fileRemaining)` as the
    /// stop point and simply stop parsing at the first short read rather
    /// than treating a truncated trailing frame as an error.
    /// `base_frame_count`/`base_message_count` are the counts `ensure_valid`
    /// already confirmed are correctly on disk; entries at or below those
    /// counts are not re-appended, so a reopen after a clean prior run
    /// doesn't duplicate or corrupt the index. The in-memory frame list is
    /// still rebuilt in full on every open (see DESIGN.md's Root Log entry
    /// for why byte-range parse-skipping is not implemented).
    #[instrument(name = "chunk.eval_uncompressed", skip_all)]
    pub fn eval(
        reader: &mut StreamReader<'_>,
        log_bytes: &[u8],
        registry: &TypeRegistry,
        ids: &MessageIdTable,
        index: &IndexFiles,
        continue_on_error: bool,
        base_frame_count: u64,
        base_message_count: u64,
    ) -> Result<UncompressedChunk> {
        let (a, _b, c) = reader.read_queue_header()?;
        let used_size = (u64::from(a) << 32) | u64::from(c);
        let header_end = reader.tell() as u64;
        let file_remaining = log_bytes.len() as u64 - header_end;
        let stop_at = header_end + used_size.min(file_remaining);

        let mut frames = Vec::new();
        let mut abs_message_counter: u64 = 0;
        let mut abs_frame_counter: u64 = 0;

        while (reader.tell() as u64) < stop_at {
            let frame_offset = reader.tell();
            let mut frame = match FrameInstance::eval(reader, log_bytes, frame_offset, ids, continue_on_error) {
                Ok(f) => f,
                Err(crate::error::LogError::ShortRead { .. }) => break,
                Err(e) => return Err(e),
            };

            frame.abs_index = abs_frame_counter;
            frame.abs_message_offset = abs_message_counter;

            let first_msg_abs = abs_message_counter;
            for dummy in &frame.dummy_messages {
                if abs_message_counter >= base_message_count {
                    index.append_message(&MessageIndexEntry {
                        abs_index: abs_message_counter,
                        frame_abs_index: abs_frame_counter,
                        start_byte: dummy.start_byte as u64,
                        end_byte: dummy.end_byte as u64,
                    })?;
                }
                abs_message_counter += 1;
            }
            for msg in &mut frame.messages {
                msg.abs_index = abs_message_counter;
                msg.frame_abs_index = abs_frame_counter;
                if abs_message_counter >= base_message_count {
                    index.append_message(&MessageIndexEntry {
                        abs_index: abs_message_counter,
                        frame_abs_index: abs_frame_counter,
                        start_byte: msg.start_byte as u64,
                        end_byte: msg.end_byte as u64,
                    })?;
                }
                abs_message_counter += 1;
            }
            let end_msg_abs = abs_message_counter;

            if abs_frame_counter >= base_frame_count {
                let thread_name = frame.thread_name(log_bytes);
                index.append_frame(&FrameIndexEntry {
                    abs_index: abs_frame_counter,
                    thread_name,
                    first_msg_abs_index: first_msg_abs as u32,
                    end_msg_abs_index: end_msg_abs as u32,
                })?;
            }

            frames.push(frame);
            abs_frame_counter += 1;
        }

        let mut threads: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, frame) in frames.iter().enumerate() {
            threads.entry(frame.thread_name(log_bytes)).or_default().push(i);
        }

        // Stopwatch samples are merged in once the parse-and-cache pipeline
        // (see `crate::pipeline`) has decoded the relevant messages; at eval
        // time we only reserve each thread's frame-index-in-thread slots.
        let mut timers: HashMap<String, Timer> = HashMap::new();
        for (thread_name, indices) in &threads {
            let timer = timers.entry(thread_name.clone()).or_insert_with(Timer::new);
            timer.init_storage(0..indices.len());
        }

        // Timestamps depend on decoded `FrameInfo.time` fields, which the
        // parse-and-cache pipeline fills in after this eval returns (see
        // `crate::thread_view::compute_timestamps`, called from `Log::open`);
        // placeholder here, one slot per frame.
        let timestamps = vec![None; frames.len()];

        debug!(
            frames = frames.len(),
            messages = abs_message_counter,
            threads = threads.len(),
            "uncompressed chunk evaluated"
        );

        Ok(UncompressedChunk { frames, threads, timers, timestamps })
    }
}
