pub mod settings;
pub mod typeinfo;
pub mod uncompressed;

use num_enum::TryFromPrimitive;

use crate::error::{LogError, Result};

/// Chunk magic byte values.
///
/// The original framework's `Chunk` module (which assigns these numbers) was
/// not available for grounding; these are implementation-defined and merely
/// need to be internally consistent and distinct, which the dispatcher tests
/// below pin.
pub const SETTINGS_MAGIC: u8 = 0x01;
pub const TYPEINFO_MAGIC: u8 = 0x02;
pub const UNCOMPRESSED_MAGIC: u8 = 0x03;

/// High bit of the TypeInfo chunk's primitive-count word: when set, type
/// names in this log are already demangled/unified and no canonicalization
/// should be applied at registration time.
pub const TYPES_ALREADY_UNIFIED_BIT: u32 = 0x8000_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum ChunkKind {
    Settings = SETTINGS_MAGIC,
    TypeInfo = TYPEINFO_MAGIC,
    Uncompressed = UNCOMPRESSED_MAGIC,
}

pub fn dispatch(magic: u8) -> Result<ChunkKind> {
    ChunkKind::try_from(magic).map_err(|_| LogError::BadMagic(magic))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_known_magics() {
        assert_eq!(dispatch(SETTINGS_MAGIC).unwrap(), ChunkKind::Settings);
        assert_eq!(dispatch(TYPEINFO_MAGIC).unwrap(), ChunkKind::TypeInfo);
        assert_eq!(dispatch(UNCOMPRESSED_MAGIC).unwrap(), ChunkKind::Uncompressed);
    }

    #[test]
    fn rejects_unknown_magic() {
        assert!(matches!(dispatch(0xee), Err(LogError::BadMagic(0xee))));
    }
}
