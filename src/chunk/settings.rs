use tracing::instrument;

use crate::error::Result;
use crate::stream::StreamReader;

/// Fixed header fields of a Settings chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub player_number: u8,
    pub scenario: String,
    pub location: String,
    pub body_id: String,
    pub head_id: String,
    pub build_string: String,
}

impl Settings {
    #[instrument(name = "chunk.eval_settings", skip(reader))]
    pub fn eval(reader: &mut StreamReader<'_>) -> Result<Settings> {
        Ok(Settings {
            player_number: reader.read_u8()?,
            scenario: reader.read_string()?,
            location: reader.read_string()?,
            body_id: reader.read_string()?,
            head_id: reader.read_string()?,
            build_string: reader.read_string()?,
        })
    }
}
