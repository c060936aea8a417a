use tracing::trace;

use crate::error::{LogError, Result};
use crate::message::MessageInstance;
use crate::message_id::MessageIdTable;
use crate::stream::StreamReader;

/// A parsed frame: `[FrameBegin, message.., FrameFinished]`, plus any
/// messages reclassified as dummies by the double-begin recovery rule.
#[derive(Debug, Clone)]
pub struct FrameInstance {
    pub start_byte: usize,
    pub end_byte: usize,
    pub messages: Vec<MessageInstance>,
    pub dummy_messages: Vec<MessageInstance>,
    pub abs_index: u64,
    /// Position within the whole log's message stream, counting dummies.
    pub abs_message_offset: u64,
}

impl FrameInstance {
    /// Parses one frame starting at `reader`'s current position (absolute
    /// offset `offset` into the log). `log_bytes` is the full mapped log,
    /// used to compare FrameBegin/FrameFinished tail bytes.
    pub fn eval(
        reader: &mut StreamReader<'_>,
        log_bytes: &[u8],
        offset: usize,
        ids: &MessageIdTable,
        continue_on_error: bool,
    ) -> Result<FrameInstance> {
        let mut messages: Vec<MessageInstance> = Vec::new();
        let mut dummy_messages: Vec<MessageInstance> = Vec::new();

        loop {
            let msg = match MessageInstance::read(reader, ids) {
                Ok(m) => m,
                Err(LogError::MessageWithoutId { .. } | LogError::UnknownMessageId { .. }) if continue_on_error => {
                    // The header's length field is still trustworthy even
                    // when its id is not; `MessageInstance::read` already
                    // consumed the payload, so the stream is resynchronized
                    // and we simply drop this one message.
                    continue;
                }
                Err(e) => return Err(e),
            };

            let is_begin = msg.log_id == ids.id_frame_begin();
            let is_finished = msg.log_id == ids.id_frame_finished();

            if is_begin && !messages.is_empty() {
                // Double-begin recovery: everything accumulated so far
                // becomes a dummy sequence; parsing restarts at this begin.
                trace!(frame_start = offset, reclassified = messages.len(), "double begin, recovering");
                dummy_messages.append(&mut messages);
                messages.push(msg);
                continue;
            }

            messages.push(msg);

            if is_finished {
                let begin = &messages[0];
                let finished = messages.last().unwrap();
                if begin.log_id != ids.id_frame_begin() {
                    return Err(LogError::FrameBeginEndMismatch { frame_start: offset });
                }
                let begin_tail = &begin.body_bytes(log_bytes)[4..];
                let finished_tail = &finished.body_bytes(log_bytes)[4..];
                if begin_tail != finished_tail {
                    return Err(LogError::FrameBeginEndMismatch { frame_start: offset });
                }
                break;
            }
        }

        let end_byte = reader.tell();
        Ok(FrameInstance {
            start_byte: offset,
            end_byte,
            messages,
            dummy_messages,
            abs_index: 0,
            abs_message_offset: 0,
        })
    }

    pub fn thread_name(&self, log_bytes: &[u8]) -> String {
        let finished = self.messages.last().expect("frame always has a FrameFinished message");
        String::from_utf8_lossy(&finished.body_bytes(log_bytes)[4..]).into_owned()
    }

    pub fn num_messages(&self) -> usize {
        self.messages.len()
    }

    pub fn has_image(&self) -> bool {
        self.messages.iter().any(|m| m.class_name == "CameraImage" || m.class_name == "JPEGImage")
    }

    pub fn class_names(&self) -> Vec<&str> {
        self.messages.iter().map(|m| m.class_name.as_str()).collect()
    }
}
