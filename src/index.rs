use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{instrument, trace};

use crate::error::Result;

pub const MESSAGE_ENTRY_LEN: usize = 32;
pub const FRAME_ENTRY_LEN: usize = 40;
const THREAD_NAME_FIXED_LEN: usize = 24;

/// One row of the message index: `(absIndex, frameAbsIndex, startByte, endByte)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageIndexEntry {
    pub abs_index: u64,
    pub frame_abs_index: u64,
    pub start_byte: u64,
    pub end_byte: u64,
}

impl MessageIndexEntry {
    pub fn encode(&self) -> [u8; MESSAGE_ENTRY_LEN] {
        let mut out = [0u8; MESSAGE_ENTRY_LEN];
        out[0..8].copy_from_slice(&self.abs_index.to_le_bytes());
        out[8..16].copy_from_slice(&self.frame_abs_index.to_le_bytes());
        out[16..24].copy_from_slice(&self.start_byte.to_le_bytes());
        out[24..32].copy_from_slice(&self.end_byte.to_le_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> MessageIndexEntry {
        debug_assert_eq!(bytes.len(), MESSAGE_ENTRY_LEN);
        let w = |r: std::ops::Range<usize>| u64::from_le_bytes(bytes[r].try_into().unwrap());
        MessageIndexEntry {
            abs_index: w(0..8),
            frame_abs_index: w(8..16),
            start_byte: w(16..24),
            end_byte: w(24..32),
        }
    }
}

/// One row of the frame index: `(absIndex, threadName, firstMsgAbsIndex, endMsgAbsIndex)`.
/// 40 bytes, not 32: a full 24-byte thread name plus two 32-bit message
/// bounds does not fit in four u64 words alongside `absIndex`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameIndexEntry {
    pub abs_index: u64,
    pub thread_name: String,
    pub first_msg_abs_index: u32,
    pub end_msg_abs_index: u32,
}

impl FrameIndexEntry {
    pub fn encode(&self) -> [u8; FRAME_ENTRY_LEN] {
        let mut out = [0u8; FRAME_ENTRY_LEN];
        out[0..8].copy_from_slice(&self.abs_index.to_le_bytes());
        let name_bytes = self.thread_name.as_bytes();
        let n = name_bytes.len().min(THREAD_NAME_FIXED_LEN);
        out[8..8 + n].copy_from_slice(&name_bytes[..n]);
        out[32..36].copy_from_slice(&self.first_msg_abs_index.to_le_bytes());
        out[36..40].copy_from_slice(&self.end_msg_abs_index.to_le_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> FrameIndexEntry {
        debug_assert_eq!(bytes.len(), FRAME_ENTRY_LEN);
        let abs_index = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
        let name_raw = &bytes[8..32];
        let nul_at = name_raw.iter().position(|&b| b == 0).unwrap_or(name_raw.len());
        let thread_name = String::from_utf8_lossy(&name_raw[..nul_at]).into_owned();
        let first_msg_abs_index = u32::from_le_bytes(bytes[32..36].try_into().unwrap());
        let end_msg_abs_index = u32::from_le_bytes(bytes[36..40].try_into().unwrap());
        FrameIndexEntry { abs_index, thread_name, first_msg_abs_index, end_msg_abs_index }
    }
}

/// Append-only on-disk index of message and frame locations.
#[derive(Debug, Clone)]
pub struct IndexFiles {
    pub message_path: std::path::PathBuf,
    pub frame_path: std::path::PathBuf,
}

impl IndexFiles {
    pub fn new(cache_dir: &Path) -> IndexFiles {
        IndexFiles {
            message_path: cache_dir.join("messageIndexFile.cache"),
            frame_path: cache_dir.join("frameIndexFile.cache"),
        }
    }

    pub fn message_count(&self) -> Result<u64> {
        Ok(file_len(&self.message_path)? / MESSAGE_ENTRY_LEN as u64)
    }

    pub fn frame_count(&self) -> Result<u64> {
        Ok(file_len(&self.frame_path)? / FRAME_ENTRY_LEN as u64)
    }

    pub fn read_message_entry(&self, abs_index: u64) -> Result<MessageIndexEntry> {
        let mut f = File::open(&self.message_path)?;
        f.seek(SeekFrom::Start(abs_index * MESSAGE_ENTRY_LEN as u64))?;
        let mut buf = [0u8; MESSAGE_ENTRY_LEN];
        f.read_exact(&mut buf)?;
        Ok(MessageIndexEntry::decode(&buf))
    }

    pub fn read_frame_entry(&self, abs_index: u64) -> Result<FrameIndexEntry> {
        let mut f = File::open(&self.frame_path)?;
        f.seek(SeekFrom::Start(abs_index * FRAME_ENTRY_LEN as u64))?;
        let mut buf = [0u8; FRAME_ENTRY_LEN];
        f.read_exact(&mut buf)?;
        Ok(FrameIndexEntry::decode(&buf))
    }

    pub fn append_message(&self, entry: &MessageIndexEntry) -> Result<()> {
        let mut f = OpenOptions::new().create(true).append(true).open(&self.message_path)?;
        f.write_all(&entry.encode())?;
        Ok(())
    }

    pub fn append_frame(&self, entry: &FrameIndexEntry) -> Result<()> {
        let mut f = OpenOptions::new().create(true).append(true).open(&self.frame_path)?;
        f.write_all(&entry.encode())?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.message_path.exists() {
            std::fs::remove_file(&self.message_path)?;
        }
        if self.frame_path.exists() {
            std::fs::remove_file(&self.frame_path)?;
        }
        Ok(())
    }

    fn truncate(&self, frames: u64, messages: u64) -> Result<()> {
        if let Ok(f) = OpenOptions::new().write(true).open(&self.frame_path) {
            f.set_len(frames * FRAME_ENTRY_LEN as u64)?;
        }
        if let Ok(f) = OpenOptions::new().write(true).open(&self.message_path) {
            f.set_len(messages * MESSAGE_ENTRY_LEN as u64)?;
        }
        Ok(())
    }

    /// Validates the tail of both index files, truncating to the last
    /// consistent entry-aligned boundary on any failure.
    ///
    /// Mirrors `UncompressedChunk.ensureIndexFilesValid`: this is an
    /// iterative worklist, not a simple reverse scan, because finding a
    /// frame whose own stored `absIndex` is wrong means the whole tail from
    /// one frame earlier is suspect and must be rechecked.
    #[instrument(name = "index.validate", skip(self))]
    pub fn ensure_valid(&self) -> Result<()> {
        let frame_count = self.frame_count()?;
        if frame_count == 0 {
            return Ok(());
        }
        let message_count = self.message_count()?;
        let mut last_frame_index = frame_count - 1;
        let mut frame_truncate_pos = frame_count;
        let mut message_truncate_pos = message_count;
        let mut worklist = vec![last_frame_index];
        let mut i = 0usize;

        while i < worklist.len() {
            let frame_idx = worklist[i];
            i += 1;

            let entry = match self.read_frame_entry(frame_idx) {
                Ok(e) => e,
                Err(_) => {
                    trace!(frame_idx, "frame entry unreadable, truncating here");
                    frame_truncate_pos = frame_idx;
                    message_truncate_pos = message_truncate_pos.min(0);
                    continue;
                }
            };

            if entry.abs_index != frame_idx {
                trace!(frame_idx, stored = entry.abs_index, "frame absIndex mismatch, rewinding worklist");
                if frame_idx == 0 {
                    frame_truncate_pos = 0;
                    message_truncate_pos = 0;
                    break;
                }
                last_frame_index = frame_idx - 1;
                worklist = vec![last_frame_index];
                i = 0;
                continue;
            }

            let mut frame_ok = true;
            for msg_abs in entry.first_msg_abs_index as u64..entry.end_msg_abs_index as u64 {
                if !self.validate_message(msg_abs, frame_idx) {
                    frame_ok = false;
                    break;
                }
            }

            if !frame_ok {
                trace!(frame_idx, "frame's message range failed validation, truncating here");
                frame_truncate_pos = frame_idx;
                message_truncate_pos = entry.first_msg_abs_index as u64;
                if frame_idx > 0 {
                    worklist.push(frame_idx - 1);
                }
                continue;
            }

            if frame_idx == last_frame_index {
                frame_truncate_pos = frame_truncate_pos.min(frame_idx + 1);
                message_truncate_pos = message_truncate_pos.min(entry.end_msg_abs_index as u64);
            }
        }

        self.truncate(frame_truncate_pos, message_truncate_pos)
    }

    fn validate_message(&self, abs_index: u64, frame_index: u64) -> bool {
        let entry = match self.read_message_entry(abs_index) {
            Ok(e) => e,
            Err(_) => return false,
        };
        entry.abs_index == abs_index && entry.frame_abs_index == frame_index
    }
}

fn file_len(path: &Path) -> Result<u64> {
    Ok(std::fs::metadata(path).map(|m| m.len()).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_entry_round_trip() {
        let e = MessageIndexEntry { abs_index: 5, frame_abs_index: 2, start_byte: 100, end_byte: 140 };
        let bytes = e.encode();
        assert_eq!(bytes.len(), MESSAGE_ENTRY_LEN);
        assert_eq!(MessageIndexEntry::decode(&bytes), e);
    }

    #[test]
    fn frame_index_round_trip() {
        let e = FrameIndexEntry {
            abs_index: 3,
            thread_name: "Cognition".to_string(),
            first_msg_abs_index: 10,
            end_msg_abs_index: 25,
        };
        let bytes = e.encode();
        assert_eq!(bytes.len(), FRAME_ENTRY_LEN);
        let decoded = FrameIndexEntry::decode(&bytes);
        assert_eq!(decoded, e);
    }

    #[test]
    fn frame_index_thread_name_truncates_at_24_bytes() {
        let long_name = "a".repeat(40);
        let e = FrameIndexEntry {
            abs_index: 0,
            thread_name: long_name.clone(),
            first_msg_abs_index: 0,
            end_msg_abs_index: 0,
        };
        let decoded = FrameIndexEntry::decode(&e.encode());
        assert_eq!(decoded.thread_name, "a".repeat(THREAD_NAME_FIXED_LEN));
    }

    #[test]
    fn ensure_valid_on_missing_files_is_noop() {
        let dir = std::env::temp_dir().join(format!("bhlog-idx-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let idx = IndexFiles::new(&dir);
        idx.ensure_valid().unwrap();
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn ensure_valid_truncates_bad_tail_frame() {
        let dir = std::env::temp_dir().join(format!("bhlog-idx-test2-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let idx = IndexFiles::new(&dir);

        idx.append_message(&MessageIndexEntry { abs_index: 0, frame_abs_index: 0, start_byte: 0, end_byte: 10 })
            .unwrap();
        idx.append_message(&MessageIndexEntry { abs_index: 1, frame_abs_index: 0, start_byte: 10, end_byte: 20 })
            .unwrap();
        idx.append_frame(&FrameIndexEntry {
            abs_index: 0,
            thread_name: "Cognition".into(),
            first_msg_abs_index: 0,
            end_msg_abs_index: 2,
        })
        .unwrap();

        // A second, corrupt frame entry: claims absIndex 1 but references a
        // message range containing an entry with the wrong frame_abs_index.
        idx.append_message(&MessageIndexEntry { abs_index: 2, frame_abs_index: 99, start_byte: 20, end_byte: 30 })
            .unwrap();
        idx.append_frame(&FrameIndexEntry {
            abs_index: 1,
            thread_name: "Cognition".into(),
            first_msg_abs_index: 2,
            end_msg_abs_index: 3,
        })
        .unwrap();

        idx.ensure_valid().unwrap();

        assert_eq!(idx.frame_count().unwrap(), 1);
        assert_eq!(idx.message_count().unwrap(), 2);
        std::fs::remove_dir_all(&dir).ok();
    }
}
