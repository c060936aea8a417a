use crate::decoder;
use crate::error::Result;
use crate::message_id::MessageIdTable;
use crate::schema::TypeRegistry;
use crate::stream::StreamReader;
use crate::value::Value;

/// One message header: a log-local id byte followed by a 3-byte length.
pub struct MessageHeader {
    pub log_id: u8,
    pub payload_len: usize,
}

impl MessageHeader {
    pub fn read(reader: &mut StreamReader<'_>) -> Result<MessageHeader> {
        let log_id = reader.read_u8()?;
        let payload_len = reader.read_u24()? as usize;
        Ok(MessageHeader { log_id, payload_len })
    }
}

/// An owned, fully decoded message within a frame.
///
/// `abs_index` and `frame_abs_index` are filled in once the owning frame and
/// the whole-log position are known; they default to 0 at construction and
/// are assigned by the uncompressed-chunk evaluator.
#[derive(Debug, Clone)]
pub struct MessageInstance {
    pub log_id: u8,
    pub class_name: String,
    pub start_byte: usize,
    pub end_byte: usize,
    pub abs_index: u64,
    pub frame_abs_index: u64,
    pub repr: Option<Value>,
}

impl MessageInstance {
    /// Reads one message starting at `reader`'s current position. The
    /// returned instance's body bytes are `[start_byte+4, end_byte)`;
    /// representation decoding is deferred (see [`crate::decoder`]).
    pub fn read(reader: &mut StreamReader<'_>, ids: &MessageIdTable) -> Result<MessageInstance> {
        let start_byte = reader.tell();
        let header = MessageHeader::read(reader)?;
        let class_name_result = ids.class_name(header.log_id, start_byte).map(str::to_string);
        reader.read_bytes(header.payload_len)?;
        let end_byte = reader.tell();
        let class_name = class_name_result?;
        Ok(MessageInstance {
            log_id: header.log_id,
            class_name,
            start_byte,
            end_byte,
            abs_index: 0,
            frame_abs_index: 0,
            repr: None,
        })
    }

    /// The raw body bytes (excluding the 4-byte header) of this message
    /// within `log_bytes`, the whole mapped log.
    pub fn body_bytes<'a>(&self, log_bytes: &'a [u8]) -> &'a [u8] {
        &log_bytes[self.start_byte + 4..self.end_byte]
    }

    pub fn is_parsed(&self) -> bool {
        self.repr.is_some()
    }

    /// Decodes this message's representation from `log_bytes` and caches it.
    pub fn parse(&mut self, registry: &TypeRegistry, log_bytes: &[u8]) -> Result<&Value> {
        if self.repr.is_none() {
            let body = self.body_bytes(log_bytes);
            let mut reader = StreamReader::new(body);
            let value = decoder::decode(registry, &self.class_name, &mut reader, Some(body.len()))?;
            self.repr = Some(value);
        }
        Ok(self.repr.as_ref().unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> MessageIdTable {
        let mut r = TypeRegistry::new();
        r.register_enum(
            "MessageID",
            vec!["undefined".into(), "idFrameBegin".into(), "idFrameFinished".into(), "idCameraImage".into()],
        );
        MessageIdTable::from_registry(&r).unwrap()
    }

    #[test]
    fn reads_header_and_body() {
        let mut buf = vec![3u8, 4, 0, 0];
        buf.extend_from_slice(&[1, 2, 3, 4]);
        let mut reader = StreamReader::new(&buf);
        let msg = MessageInstance::read(&mut reader, &ids()).unwrap();
        assert_eq!(msg.class_name, "CameraImage");
        assert_eq!(msg.start_byte, 0);
        assert_eq!(msg.end_byte, buf.len());
        assert_eq!(msg.body_bytes(&buf), &[1, 2, 3, 4]);
    }
}
