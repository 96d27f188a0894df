//! 操作树模块
//!
//! 编译后的模式。每个节点是 `Object | Array | Leaf` 之一，
//! 动态路径的编码/解码处理函数按节点类型模式匹配分派。

use crate::buffer::{Buffer, Reader};
use crate::definition::LeafKind;
use crate::value::{Map, Value};
use crate::{CodecError, CodecResult};
use compact_str::CompactString;
use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// 子节点按 `order` 顺序排列
    Object(IndexMap<CompactString, OpNode>),
    Array(Box<OpNode>),
    Leaf(LeafKind),
}

/// 操作树节点
///
/// 编译后不可变，被所有调用与所有绑定类型共享。
#[derive(Debug, Clone, PartialEq)]
pub struct OpNode {
    name: CompactString,
    op: Operation,
    min_size: usize,
}

const ZEROS: [u8; 64] = [0u8; 64];

impl OpNode {
    pub fn new(name: &str, op: Operation) -> Self {
        let min_size = match &op {
            Operation::Leaf(kind) => kind.min_size(),
            // 空数组只有一个字节的长度前缀
            Operation::Array(_) => 1,
            Operation::Object(children) => children.values().map(|c| c.min_size).sum(),
        };
        Self {
            name: CompactString::from(name),
            op,
            min_size,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn op(&self) -> &Operation {
        &self.op
    }

    /// 该节点的值在线上的最小字节数，也就是零值的字节数
    pub fn min_size(&self) -> usize {
        self.min_size
    }

    pub fn children(&self) -> Option<&IndexMap<CompactString, OpNode>> {
        match &self.op {
            Operation::Object(children) => Some(children),
            _ => None,
        }
    }

    pub fn item(&self) -> Option<&OpNode> {
        match &self.op {
            Operation::Array(item) => Some(item),
            _ => None,
        }
    }

    /// 节点类型名，用于错误信息
    pub fn kind_name(&self) -> &'static str {
        match &self.op {
            Operation::Object(_) => "object",
            Operation::Array(_) => "array",
            Operation::Leaf(kind) => kind.label(),
        }
    }

    /// 写出零值
    ///
    /// # Brief
    /// false、0、空字符串、空数组以及全零对象在线上都是全零字节，
    /// 长度恰好为 `min_size`
    pub fn encode_zero(&self, buf: &mut Buffer) {
        let mut left = self.min_size;
        while left > 0 {
            let n = left.min(ZEROS.len());
            buf.write_bytes(&ZEROS[..n]);
            left -= n;
        }
    }

    /// 动态路径编码
    ///
    /// # Arguments
    /// * `buf` - 输出缓冲区
    /// * `value` - 待编码的值；`None` 与 `Value::Null` 写出零值
    pub fn encode_value(&self, buf: &mut Buffer, value: Option<&Value>) -> CodecResult<()> {
        let value = match value {
            None | Some(Value::Null) => {
                self.encode_zero(buf);
                return Ok(());
            }
            Some(v) => v,
        };
        match &self.op {
            Operation::Object(children) => {
                let map = match value {
                    Value::Object(map) => map,
                    other => return Err(self.wrong_type(other.type_name())),
                };
                for child in children.values() {
                    child.encode_value(buf, map.get(child.name()))?;
                }
                Ok(())
            }
            Operation::Array(item) => {
                let arr = match value {
                    Value::Array(arr) => arr,
                    other => return Err(self.wrong_type(other.type_name())),
                };
                buf.write_var_uint(arr.len() as u64);
                for v in arr {
                    item.encode_value(buf, Some(v))?;
                }
                Ok(())
            }
            Operation::Leaf(kind) => encode_leaf(buf, *kind, value),
        }
    }

    pub(crate) fn wrong_type(&self, actual: &str) -> CodecError {
        CodecError::WrongType {
            expected: self.kind_name(),
            actual: actual.to_string(),
        }
    }

    /// 动态路径解码为新值
    pub fn decode_value(&self, reader: &mut Reader<'_>) -> CodecResult<Value> {
        let mut value = Value::Null;
        self.decode_value_into(reader, &mut value)?;
        Ok(value)
    }

    /// 动态路径解码到已有的值
    ///
    /// # Brief
    /// 目标中同类型的容器被复用：对象保留已有条目并原地解码、删除模式之外的键；
    /// 数组截断或扩展到新长度，已有元素原地解码
    pub fn decode_value_into(&self, reader: &mut Reader<'_>, dest: &mut Value) -> CodecResult<()> {
        match &self.op {
            Operation::Leaf(kind) => decode_leaf(reader, *kind, dest),
            Operation::Array(item) => {
                let count = reader.read_len(item.min_size)?;
                if !matches!(dest, Value::Array(_)) {
                    *dest = Value::Array(Vec::with_capacity(count));
                }
                if let Value::Array(arr) = dest {
                    arr.truncate(count);
                    for slot in arr.iter_mut() {
                        item.decode_value_into(reader, slot)?;
                    }
                    arr.reserve(count - arr.len());
                    while arr.len() < count {
                        arr.push(item.decode_value(reader)?);
                    }
                }
                Ok(())
            }
            Operation::Object(children) => {
                if !matches!(dest, Value::Object(_)) {
                    *dest = Value::Object(Map::with_capacity(children.len()));
                }
                if let Value::Object(map) = dest {
                    for (name, child) in children {
                        let slot = map.entry(name.clone()).or_insert(Value::Null);
                        child.decode_value_into(reader, slot)?;
                    }
                    if map.len() != children.len() {
                        map.retain(|k, _| children.contains_key(k));
                    }
                    if !map.keys().eq(children.keys()) {
                        map.sort_by(|a, _, b, _| {
                            children.get_index_of(a).cmp(&children.get_index_of(b))
                        });
                    }
                }
                Ok(())
            }
        }
    }

    /// 按模式跳过一个值，不做 UTF-8 校验也不分配内存
    pub fn skip(&self, reader: &mut Reader<'_>) -> CodecResult<()> {
        match &self.op {
            Operation::Leaf(LeafKind::String) => {
                let len = reader.read_var_uint()?;
                reader.skip(usize::try_from(len).unwrap_or(usize::MAX))?;
            }
            Operation::Leaf(kind) => reader.skip(kind.min_size())?,
            Operation::Array(item) => {
                let count = reader.read_len(item.min_size)?;
                for _ in 0..count {
                    item.skip(reader)?;
                }
            }
            Operation::Object(children) => {
                for child in children.values() {
                    child.skip(reader)?;
                }
            }
        }
        Ok(())
    }
}

fn type_assertion(kind: LeafKind, actual: impl std::fmt::Display) -> CodecError {
    CodecError::TypeAssertion {
        expected: kind.label(),
        actual: actual.to_string(),
    }
}

/// 写出整数，超出类型范围时报错；浮点类型接受整数
pub(crate) fn write_int(buf: &mut Buffer, kind: LeafKind, n: i128) -> CodecResult<()> {
    macro_rules! fit {
        ($ty:ty) => {
            <$ty>::try_from(n).map_err(|_| type_assertion(kind, format_args!("integer {}", n)))?
        };
    }
    match kind {
        LeafKind::Int8 => buf.write_i8(fit!(i8)),
        LeafKind::Uint8 => buf.write_u8(fit!(u8)),
        LeafKind::Int16(o) => buf.write_i16(fit!(i16), o),
        LeafKind::Int32(o) => buf.write_i32(fit!(i32), o),
        LeafKind::Int64(o) => buf.write_i64(fit!(i64), o),
        LeafKind::Uint16(o) => buf.write_u16(fit!(u16), o),
        LeafKind::Uint32(o) => buf.write_u32(fit!(u32), o),
        LeafKind::Uint64(o) => buf.write_u64(fit!(u64), o),
        LeafKind::Float32(o) => buf.write_f32(n as f32, o),
        LeafKind::Float64(o) => buf.write_f64(n as f64, o),
        LeafKind::Boolean | LeafKind::String => {
            return Err(type_assertion(kind, format_args!("integer {}", n)))
        }
    }
    Ok(())
}

/// 写出浮点数；整数类型只接受没有小数部分的有限值
pub(crate) fn write_float(buf: &mut Buffer, kind: LeafKind, f: f64) -> CodecResult<()> {
    match kind {
        LeafKind::Float32(o) => buf.write_f32(f as f32, o),
        LeafKind::Float64(o) => buf.write_f64(f, o),
        _ if kind.is_integer() && f.is_finite() && f.fract() == 0.0 => {
            return write_int(buf, kind, f as i128)
        }
        _ => return Err(type_assertion(kind, format_args!("float {}", f))),
    }
    Ok(())
}

fn encode_leaf(buf: &mut Buffer, kind: LeafKind, value: &Value) -> CodecResult<()> {
    match (kind, value) {
        (LeafKind::Boolean, Value::Bool(b)) => {
            buf.write_bool(*b);
            Ok(())
        }
        (LeafKind::String, Value::String(s)) => {
            buf.write_str(s);
            Ok(())
        }
        (LeafKind::Float32(o), Value::Float32(f)) => {
            buf.write_f32(*f, o);
            Ok(())
        }
        (LeafKind::Boolean | LeafKind::String, other) => Err(type_assertion(kind, other.type_name())),
        (_, Value::Float32(f)) => write_float(buf, kind, *f as f64),
        (_, Value::Float64(f)) => write_float(buf, kind, *f),
        (_, other) => match other.as_i128() {
            Some(n) => write_int(buf, kind, n),
            None => Err(type_assertion(kind, other.type_name())),
        },
    }
}

fn decode_leaf(reader: &mut Reader<'_>, kind: LeafKind, dest: &mut Value) -> CodecResult<()> {
    let value = match kind {
        LeafKind::Boolean => Value::Bool(reader.read_bool()?),
        LeafKind::String => {
            let s = reader.read_str()?;
            if let Value::String(existing) = dest {
                existing.clear();
                existing.push_str(s);
                return Ok(());
            }
            Value::String(CompactString::from(s))
        }
        LeafKind::Int8 => Value::Int8(reader.read_i8()?),
        LeafKind::Uint8 => Value::Uint8(reader.read_u8()?),
        LeafKind::Int16(o) => Value::Int16(reader.read_i16(o)?),
        LeafKind::Int32(o) => Value::Int32(reader.read_i32(o)?),
        LeafKind::Int64(o) => Value::Int64(reader.read_i64(o)?),
        LeafKind::Uint16(o) => Value::Uint16(reader.read_u16(o)?),
        LeafKind::Uint32(o) => Value::Uint32(reader.read_u32(o)?),
        LeafKind::Uint64(o) => Value::Uint64(reader.read_u64(o)?),
        LeafKind::Float32(o) => Value::Float32(reader.read_f32(o)?),
        LeafKind::Float64(o) => Value::Float64(reader.read_f64(o)?),
    };
    *dest = value;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;
    use serde_json::json;

    fn root(schema: serde_json::Value) -> OpNode {
        Compiler::default().compile(&schema).unwrap().1
    }

    fn info() -> OpNode {
        root(json!({
            "type": "object",
            "properties": {"name": {"type": "string"}, "area": {"type": "uint32le"}},
            "order": ["name", "area"]
        }))
    }

    fn encode(op: &OpNode, value: &Value) -> CodecResult<Vec<u8>> {
        let mut buf = Buffer::with_capacity(0);
        op.encode_value(&mut buf, Some(value))?;
        Ok(buf.as_slice().to_vec())
    }

    #[test]
    fn test_encode_object() {
        let value = Value::from(json!({"name": "ab", "area": 888}));
        assert_eq!(
            encode(&info(), &value).unwrap(),
            [0x02, b'a', b'b', 0x78, 0x03, 0x00, 0x00]
        );
    }

    #[test]
    fn test_encode_array() {
        let op = root(json!({"type": "array", "items": {"type": "uint8"}}));
        let value = Value::from(json!([1, 2, 3]));
        assert_eq!(encode(&op, &value).unwrap(), [0x03, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_absent_and_null_write_zero() {
        let op = root(json!({
            "type": "object",
            "properties": {
                "flag": "bool",
                "name": "string",
                "list": {"type": "array", "items": "int64le"},
                "inner": {"type": "object", "properties": {"x": "uint16be"}, "order": ["x"]}
            },
            "order": ["flag", "name", "list", "inner"]
        }));
        let value = Value::from(json!({"name": null}));
        let bytes = encode(&op, &value).unwrap();
        assert_eq!(bytes, [0x00, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(bytes.len(), op.min_size());
    }

    #[test]
    fn test_numeric_coercion() {
        let op = root(json!({
            "type": "object",
            "properties": {"a": "int8", "b": "uint16be", "c": "float32le", "d": "float64be"},
            "order": ["a", "b", "c", "d"]
        }));
        let value = Value::from(json!({"a": -2.0, "b": 258, "c": 1, "d": 0.5}));
        let bytes = encode(&op, &value).unwrap();
        let mut expected = vec![0xfe, 0x01, 0x02];
        expected.extend_from_slice(&1.0f32.to_le_bytes());
        expected.extend_from_slice(&0.5f64.to_be_bytes());
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_type_errors() {
        let op = info();
        assert!(matches!(
            encode(&op, &Value::from(json!({"name": 1}))),
            Err(CodecError::TypeAssertion { expected: "string", .. })
        ));
        assert!(matches!(
            encode(&op, &Value::from(json!({"area": -1}))),
            Err(CodecError::TypeAssertion { expected: "uint32", .. })
        ));
        assert!(matches!(
            encode(&op, &Value::from(json!({"area": 1.5}))),
            Err(CodecError::TypeAssertion { expected: "uint32", .. })
        ));
        assert!(matches!(
            encode(&op, &Value::from(json!([1]))),
            Err(CodecError::WrongType { expected: "object", .. })
        ));
    }

    #[test]
    fn test_decode_typed_values() {
        let op = info();
        let mut reader = Reader::new(&[0x02, b'a', b'b', 0x78, 0x03, 0x00, 0x00]);
        let value = op.decode_value(&mut reader).unwrap();
        assert_eq!(value.get("name"), Some(&Value::from("ab")));
        assert_eq!(value.get("area"), Some(&Value::Uint32(888)));
        assert!(reader.is_empty());
    }

    #[test]
    fn test_decode_into_reuses_containers() {
        let op = info();
        let mut dest = Value::from(json!({"area": 1, "stale": true, "name": "old"}));
        let mut reader = Reader::new(&[0x01, b'z', 0x05, 0x00, 0x00, 0x00]);
        op.decode_value_into(&mut reader, &mut dest).unwrap();

        let map = dest.as_object().unwrap();
        let keys: Vec<&str> = map.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, ["name", "area"]);
        assert_eq!(map["name"], Value::from("z"));
        assert_eq!(map["area"], Value::Uint32(5));

        let list = root(json!({"type": "array", "items": "uint8"}));
        let mut dest = Value::from(json!([9, 9, 9, 9]));
        list.decode_value_into(&mut Reader::new(&[0x02, 0x01, 0x02]), &mut dest)
            .unwrap();
        assert_eq!(dest, Value::Array(vec![Value::Uint8(1), Value::Uint8(2)]));
    }

    #[test]
    fn test_hostile_length_prefix() {
        let op = root(json!({"type": "array", "items": "uint64le"}));
        let mut reader = Reader::new(&[0xff, 0xff, 0x03, 0x00]);
        assert!(matches!(
            op.decode_value(&mut reader),
            Err(CodecError::Buffer(crate::BufferError::InvalidLength { .. }))
        ));
    }

    #[test]
    fn test_skip() {
        let op = root(json!({
            "type": "object",
            "properties": {"s": "string", "l": {"type": "array", "items": "int16le"}, "b": "bool"},
            "order": ["s", "l", "b"]
        }));
        let data = [0x02, b'h', b'i', 0x02, 0x01, 0x00, 0x02, 0x00, 0x01, 0xaa];
        let mut reader = Reader::new(&data);
        op.skip(&mut reader).unwrap();
        assert_eq!(reader.offset(), 9);
        assert_eq!(reader.read_u8().unwrap(), 0xaa);
    }
}
