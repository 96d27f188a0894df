//! 线格式公共类型
//!
//! 字节序标记与解码时使用的默认上限。

use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_ENCODE_BUFFER_SIZE: usize = 512;
pub const MIN_BUFFER_CAPACITY: usize = 64;

pub const MAX_SCHEMA_DEPTH: usize = 100;
pub const MAX_STRING_LENGTH: usize = 16 * 1024 * 1024;
pub const MAX_ARRAY_LENGTH: usize = 1_000_000;

/// 多字节数值的字节序
///
/// 模式中以 `le` / `be` 后缀声明，缺省为小端。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    /// 模式类型名使用的后缀
    pub fn suffix(&self) -> &'static str {
        match self {
            ByteOrder::Little => "le",
            ByteOrder::Big => "be",
        }
    }

    /// 解析 `le` / `be` 后缀（大小写不敏感）
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        if suffix.eq_ignore_ascii_case("le") {
            Some(ByteOrder::Little)
        } else if suffix.eq_ignore_ascii_case("be") {
            Some(ByteOrder::Big)
        } else {
            None
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteOrder::Little => write!(f, "little-endian"),
            ByteOrder::Big => write!(f, "big-endian"),
        }
    }
}

/// 解码时对输入中长度前缀的限制
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_string_length: usize,
    pub max_array_length: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_string_length: MAX_STRING_LENGTH,
            max_array_length: MAX_ARRAY_LENGTH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_roundtrip() {
        for order in [ByteOrder::Little, ByteOrder::Big] {
            assert_eq!(ByteOrder::from_suffix(order.suffix()), Some(order));
        }
        assert_eq!(ByteOrder::from_suffix("BE"), Some(ByteOrder::Big));
        assert_eq!(ByteOrder::from_suffix("xx"), None);
    }

    #[test]
    fn test_serde_names() {
        let text = serde_json::to_string(&ByteOrder::Big).unwrap();
        assert_eq!(text, "\"big\"");
        let order: ByteOrder = serde_json::from_str("\"little\"").unwrap();
        assert_eq!(order, ByteOrder::Little);
    }
}
