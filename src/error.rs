use std::fmt;

/// Errors produced while parsing or navigating a log.
#[derive(Debug)]
pub enum LogError {
    /// A chunk dispatcher byte did not match any known chunk kind.
    BadMagic(u8),
    /// A read ran past the end of the mapped region.
    ShortRead { at: usize, wanted: usize, len: usize },
    /// A message header carried the reserved "no id" marker (255).
    MessageWithoutId { at: usize },
    /// A message header's id has no corresponding MessageID entry.
    UnknownMessageId { id: u8, at: usize },
    /// A frame's closing FrameFinished body did not match its opening FrameBegin.
    FrameBeginEndMismatch { frame_start: usize },
    /// A record or array decode did not consume exactly the declared span.
    PayloadSizeMismatch { expected_end: usize, actual_end: usize },
    /// An enum byte value had no corresponding name.
    BadEnum { type_name: String, value: u8 },
    /// A type name was referenced but never registered by the TypeInfo chunk.
    UnknownType(String),
    /// The on-disk index files are internally inconsistent; recovered internally
    /// and never surfaced across `Log::open`.
    IndexCorrupt(String),
    /// An absolute index was requested from an accessor whose `indexMap` does
    /// not contain it.
    NotInIndexMap { abs_index: u64 },
    /// A type-table count word disagreed with the number of entries actually read.
    CountMismatch { what: &'static str, declared: u32, actual: u32 },
    Io(std::io::Error),
}

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogError::BadMagic(b) => write!(f, "unrecognized chunk magic byte 0x{b:02x}"),
            LogError::ShortRead { at, wanted, len } => {
                write!(f, "short read at offset {at}: wanted {wanted} bytes, buffer has {len}")
            }
            LogError::MessageWithoutId { at } => {
                write!(f, "message at offset {at} has the reserved \"no id\" marker (255)")
            }
            LogError::UnknownMessageId { id, at } => {
                write!(f, "message at offset {at} references unknown id {id}")
            }
            LogError::FrameBeginEndMismatch { frame_start } => {
                write!(f, "frame starting at offset {frame_start}: FrameFinished body did not match FrameBegin")
            }
            LogError::PayloadSizeMismatch { expected_end, actual_end } => write!(
                f,
                "decode consumed up to offset {actual_end}, expected exactly {expected_end}"
            ),
            LogError::BadEnum { type_name, value } => {
                write!(f, "enum `{type_name}` has no value at ordinal {value}")
            }
            LogError::UnknownType(name) => write!(f, "reference to unregistered type `{name}`"),
            LogError::IndexCorrupt(why) => write!(f, "index files are inconsistent: {why}"),
            LogError::NotInIndexMap { abs_index } => {
                write!(f, "absolute index {abs_index} is not present in this accessor's index map")
            }
            LogError::CountMismatch { what, declared, actual } => write!(
                f,
                "{what}: declared count {declared} does not match {actual} entries actually read"
            ),
            LogError::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}

impl std::error::Error for LogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LogError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for LogError {
    fn from(e: std::io::Error) -> Self {
        LogError::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, LogError>;
