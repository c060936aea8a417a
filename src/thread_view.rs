use crate::frame::FrameInstance;

/// Threads whose frames carry their own `FrameInfo.time` field. Every other
/// thread's frame timestamps are synthesized by [`backfill_timestamps`].
pub const THREADS_WITH_TIMESTAMP: [&str; 5] = ["Upper", "Lower", "Motion", "Audio", "Cognition"];

pub fn thread_has_own_timestamp(thread_name: &str) -> bool {
    THREADS_WITH_TIMESTAMP.contains(&thread_name)
}

/// Minimal per-frame facts needed to synthesize timestamps, in whole-log order.
#[derive(Debug, Clone)]
pub struct FrameMeta {
    pub thread_name: String,
    /// `Some` only for frames on a [`THREADS_WITH_TIMESTAMP`] thread.
    pub own_timestamp: Option<i64>,
}

/// Computes a timestamp for every frame in whole-log order.
///
/// Frames on a timestamped thread use their own value. Every other frame's
/// timestamp is synthesized by scanning neighboring frames, alternating
/// distance `-1, +1, -2, +2, …` (sign `-1` first, starting at distance 1)
/// until a timestamped-thread neighbor is found, then adding the signed
/// distance to that neighbor's timestamp.
pub fn backfill_timestamps(frames: &[FrameMeta]) -> Vec<Option<i64>> {
    let mut out: Vec<Option<i64>> = frames.iter().map(|f| f.own_timestamp).collect();

    for idx in 0..frames.len() {
        if out[idx].is_some() {
            continue;
        }
        out[idx] = synthesize(frames, idx);
    }
    out
}

/// Builds `FrameMeta`s from already-decoded frames (`repr` must be populated
/// by the parse-and-cache pipeline first) and back-fills a timestamp for
/// every frame in whole-log order.
pub fn compute_timestamps(frames: &[FrameInstance], log_bytes: &[u8]) -> Vec<Option<i64>> {
    let metas: Vec<FrameMeta> = frames
        .iter()
        .map(|f| {
            let thread_name = f.thread_name(log_bytes);
            let own_timestamp = if thread_has_own_timestamp(&thread_name) {
                f.messages
                    .iter()
                    .find(|m| m.class_name == "FrameInfo")
                    .and_then(|m| m.repr.as_ref())
                    .and_then(|v| v.field("time"))
                    .and_then(|v| v.as_u32())
                    .map(i64::from)
            } else {
                None
            };
            FrameMeta { thread_name, own_timestamp }
        })
        .collect();
    backfill_timestamps(&metas)
}

fn synthesize(frames: &[FrameMeta], idx: usize) -> Option<i64> {
    let len = frames.len() as i64;
    let mut sign: i64 = -1;
    let mut distance: i64 = 1;

    while distance <= len {
        let cand = idx as i64 + sign * distance;
        if cand >= 0 && cand < len {
            let cand_idx = cand as usize;
            if thread_has_own_timestamp(&frames[cand_idx].thread_name) {
                if let Some(t) = frames[cand_idx].own_timestamp {
                    return Some(t + sign * distance);
                }
            }
        }
        if sign == -1 {
            sign = 1;
        } else {
            sign = -1;
            distance += 1;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(thread: &str, ts: Option<i64>) -> FrameMeta {
        FrameMeta { thread_name: thread.to_string(), own_timestamp: ts }
    }

    #[test]
    fn own_timestamp_threads_keep_their_value() {
        let frames = vec![meta("Cognition", Some(100))];
        let out = backfill_timestamps(&frames);
        assert_eq!(out[0], Some(100));
    }

    #[test]
    fn scans_backward_first_then_forward() {
        // Index 1 (Debug) has no own timestamp; index 0 (Cognition) is the
        // nearest backward neighbor at distance 1: 100 + (-1) = 99.
        let frames = vec![meta("Cognition", Some(100)), meta("Debug", None)];
        let out = backfill_timestamps(&frames);
        assert_eq!(out[1], Some(99));
    }

    #[test]
    fn falls_forward_when_no_backward_neighbor() {
        let frames = vec![meta("Debug", None), meta("Cognition", Some(200))];
        let out = backfill_timestamps(&frames);
        // idx 0: distance 1 backward is out of range, forward gives 200 + 1.
        assert_eq!(out[0], Some(201));
    }

    #[test]
    fn no_timestamped_thread_anywhere_yields_none() {
        let frames = vec![meta("Debug", None), meta("Debug", None)];
        let out = backfill_timestamps(&frames);
        assert_eq!(out, vec![None, None]);
    }
}
