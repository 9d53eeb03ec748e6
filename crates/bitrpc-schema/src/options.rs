use serde::{Deserialize, Serialize};

/// Limits applied to fields that carry no explicit `MaxLength` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializerOptions {
    /// Default maximum array length. Default: `i32::MAX`.
    pub max_array_length: usize,
    /// Default maximum string length, in UTF-16 code units. Default: 32767.
    pub max_string_length: usize,
    /// Deepest nesting of arrays and compound values accepted. Default: 64.
    pub max_depth: usize,
}

impl Default for SerializerOptions {
    fn default() -> Self {
        Self {
            max_array_length: i32::MAX as usize,
            max_string_length: i16::MAX as usize,
            max_depth: 64,
        }
    }
}
