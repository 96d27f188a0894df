use crate::types::{
    ByteOrder, Limits, DEFAULT_ENCODE_BUFFER_SIZE, MAX_ARRAY_LENGTH, MAX_SCHEMA_DEPTH,
    MAX_STRING_LENGTH,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackConfig {
    /// Initial size of the encode buffer; each schema raises it to the
    /// largest payload it has produced.
    pub encode_buffer_size: usize,
    /// Upper bound on a decoded array's length prefix. Items that take no
    /// bytes on the wire are bounded by nothing else.
    pub max_array_length: usize,
    pub max_string_length: usize,
    pub max_schema_depth: usize,
    /// Byte order used when a schema is derived from a record type.
    pub default_byte_order: ByteOrder,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            encode_buffer_size: DEFAULT_ENCODE_BUFFER_SIZE,
            max_array_length: MAX_ARRAY_LENGTH,
            max_string_length: MAX_STRING_LENGTH,
            max_schema_depth: MAX_SCHEMA_DEPTH,
            default_byte_order: ByteOrder::Little,
        }
    }
}

impl PackConfig {
    pub fn limits(&self) -> Limits {
        Limits {
            max_string_length: self.max_string_length,
            max_array_length: self.max_array_length,
        }
    }
}
