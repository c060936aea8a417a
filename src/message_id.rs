use crate::error::{LogError, Result};
use crate::schema::TypeRegistry;

pub const NO_ID: u8 = 255;
const FRAME_BEGIN_ORDINAL: u8 = 1;
const FRAME_FINISHED_ORDINAL: u8 = 2;

/// View over the log's embedded `MessageID` enum: maps a log-local id byte to
/// a class name (the enum value name with its `id` prefix stripped) and
/// pins the two sentinel ordinals the frame parser depends on.
pub struct MessageIdTable {
    values: Vec<String>,
}

impl MessageIdTable {
    /// Builds the table from the registry's `MessageID` enum and validates
    /// that `idFrameBegin`/`idFrameFinished` sit at their framework-fixed
    /// ordinals (1 and 2).
    pub fn from_registry(registry: &TypeRegistry) -> Result<Self> {
        let desc = registry.enum_of("MessageID")?;
        let table = MessageIdTable { values: desc.values.clone() };
        let begin = table.values.get(FRAME_BEGIN_ORDINAL as usize);
        let finished = table.values.get(FRAME_FINISHED_ORDINAL as usize);
        if begin.map(String::as_str) != Some("idFrameBegin") || finished.map(String::as_str) != Some("idFrameFinished") {
            return Err(LogError::IndexCorrupt(
                "MessageID enum does not place idFrameBegin/idFrameFinished at ordinals 1/2".to_string(),
            ));
        }
        Ok(table)
    }

    pub fn id_frame_begin(&self) -> u8 {
        FRAME_BEGIN_ORDINAL
    }

    pub fn id_frame_finished(&self) -> u8 {
        FRAME_FINISHED_ORDINAL
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The raw enum value name for `id`, e.g. `"idFrameBegin"`. `at` is the
    /// message's start byte, reported back in the error on failure.
    pub fn enum_name(&self, id: u8, at: usize) -> Result<&str> {
        if id == NO_ID {
            return Err(LogError::MessageWithoutId { at });
        }
        self.values
            .get(id as usize)
            .map(String::as_str)
            .ok_or(LogError::UnknownMessageId { id, at })
    }

    /// The class name for `id`: the enum value name with its leading `id`
    /// prefix stripped, e.g. `"FrameBegin"`. `at` is the message's start byte.
    pub fn class_name(&self, id: u8, at: usize) -> Result<&str> {
        let raw = self.enum_name(id, at)?;
        Ok(raw.strip_prefix("id").unwrap_or(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(values: Vec<&str>) -> TypeRegistry {
        let mut r = TypeRegistry::new();
        r.register_enum("MessageID", values.into_iter().map(String::from).collect());
        r
    }

    #[test]
    fn validates_fixed_ordinals() {
        let r = registry_with(vec!["undefined", "idFrameBegin", "idFrameFinished", "idCameraImage"]);
        let table = MessageIdTable::from_registry(&r).unwrap();
        assert_eq!(table.class_name(1, 0).unwrap(), "FrameBegin");
        assert_eq!(table.class_name(3, 0).unwrap(), "CameraImage");
    }

    #[test]
    fn rejects_misplaced_sentinels() {
        let r = registry_with(vec!["undefined", "idCameraImage", "idFrameBegin"]);
        assert!(MessageIdTable::from_registry(&r).is_err());
    }

    #[test]
    fn no_id_marker_errors() {
        let r = registry_with(vec!["undefined", "idFrameBegin", "idFrameFinished"]);
        let table = MessageIdTable::from_registry(&r).unwrap();
        assert!(matches!(table.enum_name(NO_ID, 0), Err(LogError::MessageWithoutId { .. })));
    }

    #[test]
    fn reports_actual_start_byte_on_error() {
        let r = registry_with(vec!["undefined", "idFrameBegin", "idFrameFinished"]);
        let table = MessageIdTable::from_registry(&r).unwrap();
        match table.enum_name(NO_ID, 42) {
            Err(LogError::MessageWithoutId { at }) => assert_eq!(at, 42),
            other => panic!("expected MessageWithoutId, got {other:?}"),
        }
        match table.class_name(9, 77) {
            Err(LogError::UnknownMessageId { at, .. }) => assert_eq!(at, 77),
            other => panic!("expected UnknownMessageId, got {other:?}"),
        }
    }
}
