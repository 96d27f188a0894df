//! 动态值类型模块
//!
//! [`Value`] 是动态路径使用的通用树：对象、数组与带宽度的数值叶子。
//! 对象使用 `IndexMap` 保持键顺序，键使用 `CompactString` 优化短字符串。

use compact_str::CompactString;
use indexmap::IndexMap;
use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// 对象值的有序映射
pub type Map = IndexMap<CompactString, Value>;

/// 动态值
///
/// 解码结果按模式声明的宽度给出数值变体，例如 `uint32le` 解码为 `Uint32`。
///
/// # 示例
///
/// ```rust,ignore
/// use jsonpack_core::Value;
///
/// let value = Value::from(serde_json::json!({"name": "ab", "area": 888}));
/// assert_eq!(value.get("name").and_then(Value::as_str), Some("ab"));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// 空值，编码时写出对应类型的零值
    #[default]
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Float32(f32),
    Float64(f64),
    String(CompactString),
    Array(Vec<Value>),
    Object(Map),
}

impl Value {
    /// 获取值的类型名称
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int8(_) => "int8",
            Value::Int16(_) => "int16",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Uint8(_) => "uint8",
            Value::Uint16(_) => "uint16",
            Value::Uint32(_) => "uint32",
            Value::Uint64(_) => "uint64",
            Value::Float32(_) => "float32",
            Value::Float64(_) => "float64",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_number(&self) -> bool {
        self.as_f64().is_some()
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// 尝试获取整数值
    ///
    /// # Brief
    /// 任意整数变体都被放宽为 i128，浮点数不参与
    ///
    /// # Returns
    /// `Some(i128)` 如果是整数类型，否则 `None`
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Value::Int8(n) => Some(n as i128),
            Value::Int16(n) => Some(n as i128),
            Value::Int32(n) => Some(n as i128),
            Value::Int64(n) => Some(n as i128),
            Value::Uint8(n) => Some(n as i128),
            Value::Uint16(n) => Some(n as i128),
            Value::Uint32(n) => Some(n as i128),
            Value::Uint64(n) => Some(n as i128),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_i128().and_then(|n| i64::try_from(n).ok())
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_i128().and_then(|n| u64::try_from(n).ok())
    }

    /// 尝试获取 f64 值
    ///
    /// # Brief
    /// 如果值是数值类型，返回 f64 值（支持自动类型转换）
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float32(n) => Some(n as f64),
            Value::Float64(n) => Some(n),
            _ => self.as_i128().map(|n| n as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// 获取指定键的值
    ///
    /// # Arguments
    /// * `key` - 键名（对象）或索引字符串（数组）
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(key),
            Value::Array(arr) => key.parse::<usize>().ok().and_then(|i| arr.get(i)),
            _ => None,
        }
    }

    /// 按点分隔路径获取嵌套值，如 `"user.tags.0"`
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        path.split('.').try_fold(self, |current, part| current.get(part))
    }

    /// 按数值语义比较
    ///
    /// # Brief
    /// 数值变体之间按数值比较，宽度不同也视为相等；容器逐项递归比较。
    /// 任一侧是 `Float32` 时在 f32 精度下比较。
    pub fn numeric_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.numeric_eq(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a
                        .iter()
                        .all(|(k, v)| b.get(k).map_or(false, |w| v.numeric_eq(w)))
            }
            _ => {
                if let (Some(x), Some(y)) = (self.as_i128(), other.as_i128()) {
                    return x == y;
                }
                match (self.as_f64(), other.as_f64()) {
                    (Some(x), Some(y)) => {
                        if matches!(self, Value::Float32(_)) || matches!(other, Value::Float32(_)) {
                            let (x, y) = (x as f32, y as f32);
                            x == y || (x.is_nan() && y.is_nan())
                        } else {
                            x == y || (x.is_nan() && y.is_nan())
                        }
                    }
                    _ => self == other,
                }
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int8(n) => write!(f, "{}", n),
            Value::Int16(n) => write!(f, "{}", n),
            Value::Int32(n) => write!(f, "{}", n),
            Value::Int64(n) => write!(f, "{}", n),
            Value::Uint8(n) => write!(f, "{}", n),
            Value::Uint16(n) => write!(f, "{}", n),
            Value::Uint32(n) => write!(f, "{}", n),
            Value::Uint64(n) => write!(f, "{}", n),
            Value::Float32(n) => write!(f, "{}", n),
            Value::Float64(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Array(arr) => {
                write!(f, "[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Object(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "\"{}\": {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

// ============================================================================
// serde 支持 - 结构体字段可以直接使用 Value 承载动态部分
// ============================================================================

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int8(n) => serializer.serialize_i8(*n),
            Value::Int16(n) => serializer.serialize_i16(*n),
            Value::Int32(n) => serializer.serialize_i32(*n),
            Value::Int64(n) => serializer.serialize_i64(*n),
            Value::Uint8(n) => serializer.serialize_u8(*n),
            Value::Uint16(n) => serializer.serialize_u16(*n),
            Value::Uint32(n) => serializer.serialize_u32(*n),
            Value::Uint64(n) => serializer.serialize_u64(*n),
            Value::Float32(n) => serializer.serialize_f32(*n),
            Value::Float64(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(arr) => {
                let mut seq = serializer.serialize_seq(Some(arr.len()))?;
                for v in arr {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            Value::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k.as_str(), v)?;
                }
                out.end()
            }
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("any JSON-shaped value")
    }

    fn visit_bool<E>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i8<E>(self, v: i8) -> Result<Value, E> {
        Ok(Value::Int8(v))
    }

    fn visit_i16<E>(self, v: i16) -> Result<Value, E> {
        Ok(Value::Int16(v))
    }

    fn visit_i32<E>(self, v: i32) -> Result<Value, E> {
        Ok(Value::Int32(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Int64(v))
    }

    fn visit_u8<E>(self, v: u8) -> Result<Value, E> {
        Ok(Value::Uint8(v))
    }

    fn visit_u16<E>(self, v: u16) -> Result<Value, E> {
        Ok(Value::Uint16(v))
    }

    fn visit_u32<E>(self, v: u32) -> Result<Value, E> {
        Ok(Value::Uint32(v))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Value, E> {
        Ok(match i64::try_from(v) {
            Ok(n) => Value::Int64(n),
            Err(_) => Value::Uint64(v),
        })
    }

    fn visit_f32<E>(self, v: f32) -> Result<Value, E> {
        Ok(Value::Float32(v))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float64(v))
    }

    fn visit_str<E>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(CompactString::from(v)))
    }

    fn visit_string<E>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(CompactString::from(v)))
    }

    fn visit_unit<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut arr = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(4096));
        while let Some(v) = seq.next_element()? {
            arr.push(v);
        }
        Ok(Value::Array(arr))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut map = Map::with_capacity(access.size_hint().unwrap_or(0).min(4096));
        while let Some((k, v)) = access.next_entry::<CompactString, Value>()? {
            map.insert(k, v);
        }
        Ok(Value::Object(map))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

// ============================================================================
// From 特征实现
// ============================================================================

macro_rules! from_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

from_primitive! {
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => Uint8,
    u16 => Uint16,
    u32 => Uint32,
    u64 => Uint64,
    f32 => Float32,
    f64 => Float64,
    CompactString => String,
    Map => Object,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(CompactString::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(CompactString::from(v))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// ============================================================================
// JSON 互转支持
// ============================================================================

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int64(i)
                } else if let Some(u) = n.as_u64() {
                    Value::Uint64(u)
                } else if let Some(f) = n.as_f64() {
                    Value::Float64(f)
                } else {
                    Value::Null
                }
            }
            serde_json::Value::String(s) => Value::String(CompactString::from(s)),
            serde_json::Value::Array(arr) => Value::Array(arr.into_iter().map(Into::into).collect()),
            serde_json::Value::Object(obj) => Value::Object(
                obj.into_iter()
                    .map(|(k, v)| (CompactString::from(k), v.into()))
                    .collect(),
            ),
        }
    }
}

fn json_float(n: f64) -> serde_json::Value {
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int8(n) => n.into(),
            Value::Int16(n) => n.into(),
            Value::Int32(n) => n.into(),
            Value::Int64(n) => n.into(),
            Value::Uint8(n) => n.into(),
            Value::Uint16(n) => n.into(),
            Value::Uint32(n) => n.into(),
            Value::Uint64(n) => n.into(),
            // 经由十进制文本转换，避免 0.1f32 显示为 0.10000000149011612
            Value::Float32(n) => n
                .to_string()
                .parse::<f64>()
                .map(json_float)
                .unwrap_or(serde_json::Value::Null),
            Value::Float64(n) => json_float(n),
            Value::String(s) => serde_json::Value::String(s.into_string()),
            Value::Array(arr) => serde_json::Value::Array(arr.into_iter().map(Into::into).collect()),
            Value::Object(map) => serde_json::Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k.into_string(), v.into()))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json() {
        let value = Value::from(json!({
            "name": "sapporo",
            "age": 16,
            "big": u64::MAX,
            "ratio": 0.5,
            "tags": ["a", "b"],
            "none": null
        }));
        assert_eq!(value.get("name").and_then(Value::as_str), Some("sapporo"));
        assert_eq!(value.get("age"), Some(&Value::Int64(16)));
        assert_eq!(value.get("big"), Some(&Value::Uint64(u64::MAX)));
        assert_eq!(value.get("ratio"), Some(&Value::Float64(0.5)));
        assert_eq!(value.get_path("tags.1").and_then(Value::as_str), Some("b"));
        assert!(value.get("none").map_or(false, Value::is_null));
        assert!(value.get_path("tags.9").is_none());
    }

    #[test]
    fn test_json_roundtrip() {
        let value = Value::from(json!({"b": 1, "a": [true, "x"]}));
        let back = serde_json::Value::from(value.clone());
        assert_eq!(Value::from(back), value);
    }

    #[test]
    fn test_float32_to_json() {
        let json = serde_json::Value::from(Value::Float32(0.1));
        assert_eq!(json, json!(0.1));
    }

    #[test]
    fn test_numeric_eq() {
        assert!(Value::Uint64(888).numeric_eq(&Value::Uint32(888)));
        assert!(Value::Int8(-1).numeric_eq(&Value::Int64(-1)));
        assert!(Value::Float64(2.0).numeric_eq(&Value::Int16(2)));
        assert!(Value::Float64(1.1).numeric_eq(&Value::Float32(1.1)));
        assert!(!Value::Float64(1.1).numeric_eq(&Value::Float64(1.2)));
        assert!(!Value::Int64(1).numeric_eq(&Value::from("1")));

        let a = Value::from(json!({"x": [1, 2], "y": "s"}));
        let mut b = Map::new();
        b.insert("y".into(), Value::from("s"));
        b.insert("x".into(), Value::from(vec![1u8, 2u8]));
        assert!(a.numeric_eq(&Value::Object(b)));
    }

    #[test]
    fn test_serde_json_through_value() {
        let value: Value = serde_json::from_str(r#"{"n": -5, "list": [1.5]}"#).unwrap();
        assert_eq!(value.get("n"), Some(&Value::Int64(-5)));
        let text = serde_json::to_string(&value).unwrap();
        assert_eq!(text, r#"{"n":-5,"list":[1.5]}"#);
    }

    #[test]
    fn test_display() {
        let value = Value::from(json!({"a": [1, "b"], "c": null}));
        assert_eq!(value.to_string(), r#"{"a": [1, "b"], "c": null}"#);
    }
}
