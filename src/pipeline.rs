use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::decoder;
use crate::error::Result;
use crate::frame::FrameInstance;
use crate::schema::TypeRegistry;
use crate::stream::StreamReader;
use crate::timer::Timer;
use crate::value::Value;

/// Summary counts logged after a `parse_bytes` batch, matching the kind of
/// bookkeeping the original's progress bar reported.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParseSummary {
    pub already_parsed: usize,
    pub loaded_from_cache: usize,
    pub newly_parsed: usize,
    /// Decode failures skipped because `continue_on_error` was set; `0` if
    /// it was not, since in that case the first failure aborts the batch.
    pub decode_errors: usize,
}

/// Decodes every not-yet-parsed message across `frames` in parallel, merges
/// Stopwatch samples into `timers`, and optionally persists each new
/// representation to `cache_dir`.
///
/// `threads` maps a thread name to its frame indices (in whole-log order),
/// used only to compute each frame's position-in-thread for Timer merging.
///
/// When `continue_on_error` is set, a message that fails to decode is
/// skipped (left unparsed) and counted in `ParseSummary::decode_errors`
/// instead of aborting the whole batch.
pub fn parse_bytes(
    frames: &mut [FrameInstance],
    log_bytes: &[u8],
    registry: &TypeRegistry,
    threads: &HashMap<String, Vec<usize>>,
    timers: &mut HashMap<String, Timer>,
    cache_dir: Option<&Path>,
    persist_repr_cache: bool,
    continue_on_error: bool,
) -> Result<ParseSummary> {
    let mut frame_of_message: HashMap<(usize, usize), (usize, usize)> = HashMap::new();
    for indices in threads.values() {
        for (pos_in_thread, &frame_idx) in indices.iter().enumerate() {
            for msg_idx in 0..frames[frame_idx].messages.len() {
                frame_of_message.insert((frame_idx, msg_idx), (frame_idx, pos_in_thread));
            }
        }
    }

    let mut summary = ParseSummary::default();
    let mut work: Vec<(usize, usize)> = Vec::new();
    let mut from_cache: Vec<(usize, usize, Value)> = Vec::new();

    for (frame_idx, frame) in frames.iter().enumerate() {
        for (msg_idx, msg) in frame.messages.iter().enumerate() {
            if msg.repr.is_some() {
                summary.already_parsed += 1;
            } else if let Some(v) = cache_dir.and_then(|dir| load_cached(dir, msg.abs_index)) {
                summary.loaded_from_cache += 1;
                from_cache.push((frame_idx, msg_idx, v));
            } else {
                work.push((frame_idx, msg_idx));
            }
        }
    }

    for (frame_idx, msg_idx, value) in from_cache {
        let repr = merge_stopwatch(
            &frames[frame_idx].messages[msg_idx].class_name,
            frame_idx,
            msg_idx,
            value,
            log_bytes,
            frames,
            &frame_of_message,
            timers,
        );
        frames[frame_idx].messages[msg_idx].repr = Some(repr);
    }

    if work.is_empty() {
        debug!(
            already_parsed = summary.already_parsed,
            loaded_from_cache = summary.loaded_from_cache,
            "parse_bytes: nothing left to decode"
        );
        return Ok(summary);
    }

    let decoded: Vec<Result<Value>> = work
        .par_iter()
        .map(|&(frame_idx, msg_idx)| {
            let msg = &frames[frame_idx].messages[msg_idx];
            let body = &log_bytes[msg.start_byte + 4..msg.end_byte];
            let mut reader = StreamReader::new(body);
            decoder::decode(registry, &msg.class_name, &mut reader, Some(body.len()))
        })
        .collect();

    for (&(frame_idx, msg_idx), result) in work.iter().zip(decoded.into_iter()) {
        let value = match result {
            Ok(v) => v,
            Err(e) if continue_on_error => {
                warn!(frame_idx, msg_idx, error = %e, "skipping message that failed to decode");
                summary.decode_errors += 1;
                continue;
            }
            Err(e) => return Err(e),
        };
        summary.newly_parsed += 1;

        if let Some(dir) = cache_dir {
            if persist_repr_cache {
                let abs_index = frames[frame_idx].messages[msg_idx].abs_index;
                persist_cached(dir, abs_index, &value);
            }
        }

        let class_name = frames[frame_idx].messages[msg_idx].class_name.clone();
        let repr = merge_stopwatch(&class_name, frame_idx, msg_idx, value, log_bytes, frames, &frame_of_message, timers);
        frames[frame_idx].messages[msg_idx].repr = Some(repr);
    }

    debug!(
        already_parsed = summary.already_parsed,
        loaded_from_cache = summary.loaded_from_cache,
        newly_parsed = summary.newly_parsed,
        "parse_bytes: batch complete"
    );
    Ok(summary)
}

/// A `Stopwatch` message's representation is replaced by the per-thread
/// `Timer`'s aggregated view at this frame's position in its thread, rather
/// than exposing the raw decoded sample list directly.
#[allow(clippy::too_many_arguments)]
fn merge_stopwatch(
    class_name: &str,
    frame_idx: usize,
    msg_idx: usize,
    value: Value,
    log_bytes: &[u8],
    frames: &[FrameInstance],
    frame_of_message: &HashMap<(usize, usize), (usize, usize)>,
    timers: &mut HashMap<String, Timer>,
) -> Value {
    if class_name != "Stopwatch" {
        return value;
    }
    let Some(&(_, pos_in_thread)) = frame_of_message.get(&(frame_idx, msg_idx)) else {
        return value;
    };
    let thread_name = frames[frame_idx].thread_name(log_bytes);
    let timer = timers.entry(thread_name).or_insert_with(Timer::new);
    timer.parse_stopwatch(&value, pos_in_thread);
    timer.get_stopwatch(pos_in_thread)
}

fn repr_cache_path(dir: &Path, abs_index: u64) -> PathBuf {
    dir.join(format!("message_{abs_index}.json"))
}

fn load_cached(dir: &Path, abs_index: u64) -> Option<Value> {
    let path = repr_cache_path(dir, abs_index);
    let bytes = std::fs::read(path).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn persist_cached(dir: &Path, abs_index: u64, value: &Value) {
    let path = repr_cache_path(dir, abs_index);
    let tmp = path.with_extension("json.tmp");
    if let Ok(bytes) = serde_json::to_vec(value) {
        if std::fs::write(&tmp, bytes).is_ok() {
            let _ = std::fs::rename(&tmp, &path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message_id::MessageIdTable;

    fn ids() -> MessageIdTable {
        let mut r = TypeRegistry::new();
        r.register_enum(
            "MessageID",
            vec!["undefined".into(), "idFrameBegin".into(), "idFrameFinished".into(), "idCameraImage".into()],
        );
        MessageIdTable::from_registry(&r).unwrap()
    }

    fn push_msg(buf: &mut Vec<u8>, log_id: u8, body: &[u8]) {
        buf.push(log_id);
        let len = body.len() as u32;
        buf.push((len & 0xff) as u8);
        buf.push(((len >> 8) & 0xff) as u8);
        buf.push(((len >> 16) & 0xff) as u8);
        buf.extend_from_slice(body);
    }

    fn sentinel_body(n: u32, thread: &str) -> Vec<u8> {
        let mut b = n.to_le_bytes().to_vec();
        b.extend_from_slice(thread.as_bytes());
        b
    }

    #[test]
    fn decodes_unparsed_messages_in_order() {
        let mut buf = Vec::new();
        push_msg(&mut buf, 1, &sentinel_body(0, "Cognition"));
        let mut img = 7u32.to_le_bytes().to_vec();
        img.extend(7u32.to_le_bytes());
        img.extend(0u32.to_le_bytes());
        img.extend(std::iter::repeat(9u8).take(7 * 7 * 2));
        push_msg(&mut buf, 3, &img);
        push_msg(&mut buf, 2, &sentinel_body(0, "Cognition"));

        let ids = ids();
        let mut reader = StreamReader::new(&buf);
        let frame = FrameInstance::eval(&mut reader, &buf, 0, &ids, false).unwrap();
        let mut frames = vec![frame];

        let registry = TypeRegistry::new();
        let mut threads = HashMap::new();
        threads.insert("Cognition".to_string(), vec![0usize]);
        let mut timers = HashMap::new();

        let summary = parse_bytes(&mut frames, &buf, &registry, &threads, &mut timers, None, false, false).unwrap();
        assert_eq!(summary.newly_parsed, 3);
        assert!(frames[0].messages[1].repr.is_some());
    }

    #[test]
    fn continue_on_error_skips_undecodable_messages_instead_of_aborting() {
        // idCameraImage here has no registered record/primitive and isn't a
        // recognized builtin override, so it fails to decode.
        let mut r = TypeRegistry::new();
        r.register_enum(
            "MessageID",
            vec!["undefined".into(), "idFrameBegin".into(), "idFrameFinished".into(), "idBogus".into()],
        );
        let ids = MessageIdTable::from_registry(&r).unwrap();

        let mut buf = Vec::new();
        push_msg(&mut buf, 1, &sentinel_body(0, "Cognition"));
        push_msg(&mut buf, 3, &[1, 2, 3]);
        push_msg(&mut buf, 2, &sentinel_body(0, "Cognition"));

        let mut reader = StreamReader::new(&buf);
        let frame = FrameInstance::eval(&mut reader, &buf, 0, &ids, false).unwrap();
        let mut frames = vec![frame];

        let registry = TypeRegistry::new();
        let mut threads = HashMap::new();
        threads.insert("Cognition".to_string(), vec![0usize]);
        let mut timers = HashMap::new();

        let summary = parse_bytes(&mut frames, &buf, &registry, &threads, &mut timers, None, false, true).unwrap();
        assert_eq!(summary.decode_errors, 1);
        assert_eq!(summary.newly_parsed, 2);
        assert!(frames[0].messages[1].repr.is_none());
    }
}
