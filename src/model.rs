use indexmap::IndexMap;

use crate::frame::FrameInstance;
use crate::message::MessageInstance;
use crate::value::Value;

/// The capability contract shared by every owning Instance and index-backed
/// Accessor view over a frame or message. Call sites are generic over this
/// trait rather than holding trait objects, since Instance and Accessor
/// differ enough in lifetime/ownership that an object-safe interface would
/// need to erase useful information.
pub trait LogView {
    fn start_byte(&self) -> usize;
    fn end_byte(&self) -> usize;
    fn log_id(&self) -> u8;
    fn class_name(&self) -> &str;
    fn as_dict(&self) -> Value;
    fn children_len(&self) -> usize;
}

impl LogView for MessageInstance {
    fn start_byte(&self) -> usize {
        self.start_byte
    }

    fn end_byte(&self) -> usize {
        self.end_byte
    }

    fn log_id(&self) -> u8 {
        self.log_id
    }

    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn as_dict(&self) -> Value {
        self.repr.clone().unwrap_or_else(|| Value::Record(IndexMap::new()))
    }

    fn children_len(&self) -> usize {
        0
    }
}

impl LogView for FrameInstance {
    fn start_byte(&self) -> usize {
        self.start_byte
    }

    fn end_byte(&self) -> usize {
        self.end_byte
    }

    fn log_id(&self) -> u8 {
        self.messages.first().map(|m| m.log_id).unwrap_or(0)
    }

    fn class_name(&self) -> &str {
        "Frame"
    }

    fn as_dict(&self) -> Value {
        let mut reprs = IndexMap::new();
        for m in &self.messages {
            reprs.insert(m.class_name.clone(), m.as_dict());
        }
        Value::Record(IndexMap::from_iter([("ReprsDict".to_string(), Value::Record(reprs))]))
    }

    fn children_len(&self) -> usize {
        self.messages.len()
    }
}
