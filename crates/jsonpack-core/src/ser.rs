use crate::binder::StructOp;
use crate::buffer::Buffer;
use crate::definition::LeafKind;
use crate::operation::{write_float, write_int, OpNode, Operation};
use crate::{CodecError, CodecResult};
use compact_str::{CompactString, ToCompactString};
use indexmap::IndexMap;
use serde::ser::{self, Impossible, Serialize, Serializer as _};
use std::fmt;

/// 沿操作树编码的 serde 序列化器
///
/// `bind` 是值类型的绑定结果，子节点的绑定随编码一同下传；
/// 没有绑定时全部按名称解析。
pub struct Serializer<'a> {
    buf: &'a mut Buffer,
    op: &'a OpNode,
    bind: Option<&'a StructOp>,
}

impl<'a> Serializer<'a> {
    pub fn new(buf: &'a mut Buffer, op: &'a OpNode, bind: Option<&'a StructOp>) -> Self {
        Self { buf, op, bind }
    }

    fn leaf(&self, actual: &str) -> CodecResult<LeafKind> {
        match self.op.op() {
            Operation::Leaf(kind) => Ok(*kind),
            _ => Err(self.op.wrong_type(actual)),
        }
    }
}

/// 按操作树把任意 `Serialize` 值写入缓冲区
pub fn to_buffer<T: Serialize + ?Sized>(
    value: &T,
    op: &OpNode,
    bind: Option<&StructOp>,
    buf: &mut Buffer,
) -> CodecResult<()> {
    value.serialize(Serializer::new(buf, op, bind))
}

impl ser::Error for CodecError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        CodecError::Custom(msg.to_string())
    }
}

fn mismatch(kind: LeafKind, actual: &str) -> CodecError {
    CodecError::TypeAssertion {
        expected: kind.label(),
        actual: actual.to_string(),
    }
}

impl<'a> ser::Serializer for Serializer<'a> {
    type Ok = ();
    type Error = CodecError;
    type SerializeSeq = SeqEncoder<'a>;
    type SerializeTuple = SeqEncoder<'a>;
    type SerializeTupleStruct = SeqEncoder<'a>;
    type SerializeTupleVariant = Impossible<(), CodecError>;
    type SerializeMap = ObjectEncoder<'a>;
    type SerializeStruct = ObjectEncoder<'a>;
    type SerializeStructVariant = Impossible<(), CodecError>;

    fn serialize_bool(self, v: bool) -> CodecResult<()> {
        match self.leaf("bool")? {
            LeafKind::Boolean => {
                self.buf.write_bool(v);
                Ok(())
            }
            kind => Err(mismatch(kind, "bool")),
        }
    }

    fn serialize_i8(self, v: i8) -> CodecResult<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i16(self, v: i16) -> CodecResult<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i32(self, v: i32) -> CodecResult<()> {
        self.serialize_i64(v as i64)
    }

    fn serialize_i64(self, v: i64) -> CodecResult<()> {
        self.serialize_i128(v as i128)
    }

    fn serialize_i128(self, v: i128) -> CodecResult<()> {
        let kind = self.leaf("integer")?;
        write_int(self.buf, kind, v)
    }

    fn serialize_u8(self, v: u8) -> CodecResult<()> {
        self.serialize_i128(v as i128)
    }

    fn serialize_u16(self, v: u16) -> CodecResult<()> {
        self.serialize_i128(v as i128)
    }

    fn serialize_u32(self, v: u32) -> CodecResult<()> {
        self.serialize_i128(v as i128)
    }

    fn serialize_u64(self, v: u64) -> CodecResult<()> {
        self.serialize_i128(v as i128)
    }

    fn serialize_u128(self, v: u128) -> CodecResult<()> {
        let kind = self.leaf("integer")?;
        let v = i128::try_from(v).map_err(|_| mismatch(kind, "u128"))?;
        write_int(self.buf, kind, v)
    }

    fn serialize_f32(self, v: f32) -> CodecResult<()> {
        match self.leaf("float")? {
            LeafKind::Float32(order) => {
                self.buf.write_f32(v, order);
                Ok(())
            }
            kind => write_float(self.buf, kind, v as f64),
        }
    }

    fn serialize_f64(self, v: f64) -> CodecResult<()> {
        let kind = self.leaf("float")?;
        write_float(self.buf, kind, v)
    }

    fn serialize_char(self, v: char) -> CodecResult<()> {
        self.serialize_str(v.encode_utf8(&mut [0u8; 4]))
    }

    fn serialize_str(self, v: &str) -> CodecResult<()> {
        match self.leaf("string")? {
            LeafKind::String => {
                self.buf.write_str(v);
                Ok(())
            }
            kind => Err(mismatch(kind, "string")),
        }
    }

    fn serialize_bytes(self, v: &[u8]) -> CodecResult<()> {
        let kind = match self.op.item().map(OpNode::op) {
            Some(Operation::Leaf(kind)) => *kind,
            _ => return Err(self.op.wrong_type("bytes")),
        };
        self.buf.write_var_uint(v.len() as u64);
        if kind == LeafKind::Uint8 {
            self.buf.write_bytes(v);
            return Ok(());
        }
        for b in v {
            write_int(self.buf, kind, *b as i128)?;
        }
        Ok(())
    }

    fn serialize_none(self) -> CodecResult<()> {
        self.op.encode_zero(self.buf);
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> CodecResult<()> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> CodecResult<()> {
        self.op.encode_zero(self.buf);
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> CodecResult<()> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> CodecResult<()> {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> CodecResult<()> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _value: &T,
    ) -> CodecResult<()> {
        Err(CodecError::UnknownType(format!("enum {}::{}", name, variant)))
    }

    fn serialize_seq(self, len: Option<usize>) -> CodecResult<SeqEncoder<'a>> {
        SeqEncoder::new(self.buf, self.op, self.bind, len)
    }

    fn serialize_tuple(self, len: usize) -> CodecResult<SeqEncoder<'a>> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> CodecResult<SeqEncoder<'a>> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> CodecResult<Self::SerializeTupleVariant> {
        Err(CodecError::UnknownType(format!("enum {}::{}", name, variant)))
    }

    fn serialize_map(self, _len: Option<usize>) -> CodecResult<ObjectEncoder<'a>> {
        ObjectEncoder::new(self.buf, self.op, self.bind, "map")
    }

    fn serialize_struct(self, name: &'static str, _len: usize) -> CodecResult<ObjectEncoder<'a>> {
        ObjectEncoder::new(self.buf, self.op, self.bind, name)
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> CodecResult<Self::SerializeStructVariant> {
        Err(CodecError::UnknownType(format!("enum {}::{}", name, variant)))
    }
}

/// 数组编码
///
/// 长度未知时元素先写入暂存区，结束时再补写长度前缀。
pub struct SeqEncoder<'a> {
    buf: &'a mut Buffer,
    item: &'a OpNode,
    item_bind: Option<&'a StructOp>,
    declared: Option<usize>,
    count: usize,
    staging: Option<Buffer>,
}

impl<'a> SeqEncoder<'a> {
    fn new(
        buf: &'a mut Buffer,
        op: &'a OpNode,
        bind: Option<&'a StructOp>,
        len: Option<usize>,
    ) -> CodecResult<Self> {
        let item = op.item().ok_or_else(|| op.wrong_type("sequence"))?;
        let staging = match len {
            Some(n) => {
                buf.write_var_uint(n as u64);
                None
            }
            None => Some(Buffer::with_capacity(0)),
        };
        Ok(Self {
            buf,
            item,
            item_bind: bind.and_then(StructOp::item),
            declared: len,
            count: 0,
            staging,
        })
    }

    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> CodecResult<()> {
        let target = match &mut self.staging {
            Some(staging) => staging,
            None => &mut *self.buf,
        };
        value.serialize(Serializer::new(target, self.item, self.item_bind))?;
        self.count += 1;
        Ok(())
    }

    fn finish(self) -> CodecResult<()> {
        match self.staging {
            Some(staging) => {
                self.buf.write_var_uint(self.count as u64);
                self.buf.write_bytes(staging.as_slice());
                Ok(())
            }
            None if self.declared == Some(self.count) => Ok(()),
            None => Err(CodecError::LengthMismatch {
                declared: self.declared.unwrap_or(0),
                actual: self.count,
            }),
        }
    }
}

impl<'a> ser::SerializeSeq for SeqEncoder<'a> {
    type Ok = ();
    type Error = CodecError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> CodecResult<()> {
        self.push(value)
    }

    fn end(self) -> CodecResult<()> {
        self.finish()
    }
}

impl<'a> ser::SerializeTuple for SeqEncoder<'a> {
    type Ok = ();
    type Error = CodecError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> CodecResult<()> {
        self.push(value)
    }

    fn end(self) -> CodecResult<()> {
        self.finish()
    }
}

impl<'a> ser::SerializeTupleStruct for SeqEncoder<'a> {
    type Ok = ();
    type Error = CodecError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> CodecResult<()> {
        self.push(value)
    }

    fn end(self) -> CodecResult<()> {
        self.finish()
    }
}

/// 对象编码
///
/// 按名称解析子节点。属性按 `order` 顺序到达时直接写入；
/// 提前到达的属性先暂存，轮到它时再写出；结束时缺失的属性写零值，
/// 带展开字段的结构体缺失属性则报 `StructFieldNonExist`。
/// 模式之外的名称被忽略。
pub struct ObjectEncoder<'a> {
    buf: &'a mut Buffer,
    children: &'a IndexMap<CompactString, OpNode>,
    binds: &'a [StructOp],
    flattened: Option<&'a str>,
    next: usize,
    pending: Vec<Option<Buffer>>,
    key: Option<Option<usize>>,
}

impl<'a> ObjectEncoder<'a> {
    fn new(
        buf: &'a mut Buffer,
        op: &'a OpNode,
        bind: Option<&'a StructOp>,
        actual: &str,
    ) -> CodecResult<Self> {
        let children = op.children().ok_or_else(|| op.wrong_type(actual))?;
        Ok(Self {
            buf,
            children,
            binds: bind.map(StructOp::children).unwrap_or_default(),
            flattened: bind.and_then(StructOp::flattened),
            next: 0,
            pending: Vec::new(),
            key: None,
        })
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        match self.children.get_index(self.next) {
            Some((k, _)) if k.as_str() == name => Some(self.next),
            _ => self.children.get_index_of(name),
        }
    }

    fn write_child<T: Serialize + ?Sized>(&mut self, index: usize, value: &T) -> CodecResult<()> {
        let Some((name, child)) = self.children.get_index(index) else {
            return Ok(());
        };
        let staged = self.pending.get(index).map_or(false, Option::is_some);
        if index < self.next || staged {
            return Err(CodecError::AmbiguousField(name.to_string()));
        }

        let bind = self.binds.get(index);
        if index == self.next {
            value.serialize(Serializer::new(self.buf, child, bind))?;
            self.next += 1;
            while let Some(staged) = self.pending.get_mut(self.next).and_then(Option::take) {
                self.buf.write_bytes(staged.as_slice());
                self.next += 1;
            }
        } else {
            if self.pending.is_empty() {
                self.pending.resize_with(self.children.len(), || None);
            }
            let mut staging = Buffer::with_capacity(child.min_size());
            value.serialize(Serializer::new(&mut staging, child, bind))?;
            self.pending[index] = Some(staging);
        }
        Ok(())
    }

    fn finish(mut self) -> CodecResult<()> {
        let children = self.children;
        for (index, (name, child)) in children.iter().enumerate().skip(self.next) {
            match (self.pending.get_mut(index).and_then(Option::take), self.flattened) {
                (Some(staged), _) => self.buf.write_bytes(staged.as_slice()),
                (None, Some(type_name)) => {
                    return Err(CodecError::StructFieldNonExist {
                        type_name: type_name.to_string(),
                        field: name.to_string(),
                    })
                }
                (None, None) => child.encode_zero(self.buf),
            }
        }
        Ok(())
    }
}

impl<'a> ser::SerializeStruct for ObjectEncoder<'a> {
    type Ok = ();
    type Error = CodecError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> CodecResult<()> {
        match self.index_of(key) {
            Some(index) => self.write_child(index, value),
            None => Ok(()),
        }
    }

    fn end(self) -> CodecResult<()> {
        self.finish()
    }
}

impl<'a> ser::SerializeMap for ObjectEncoder<'a> {
    type Ok = ();
    type Error = CodecError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> CodecResult<()> {
        let name = key.serialize(KeyName)?;
        self.key = Some(self.index_of(&name));
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> CodecResult<()> {
        match self.key.take() {
            Some(Some(index)) => self.write_child(index, value),
            Some(None) => Ok(()),
            None => Err(CodecError::Custom(
                "serialize_value called before serialize_key".to_string(),
            )),
        }
    }

    fn end(self) -> CodecResult<()> {
        self.finish()
    }
}

/// 把映射的键转换为属性名
struct KeyName;

fn bad_key(actual: &str) -> CodecError {
    CodecError::WrongType {
        expected: "string",
        actual: format!("{} key", actual),
    }
}

impl ser::Serializer for KeyName {
    type Ok = CompactString;
    type Error = CodecError;
    type SerializeSeq = Impossible<CompactString, CodecError>;
    type SerializeTuple = Impossible<CompactString, CodecError>;
    type SerializeTupleStruct = Impossible<CompactString, CodecError>;
    type SerializeTupleVariant = Impossible<CompactString, CodecError>;
    type SerializeMap = Impossible<CompactString, CodecError>;
    type SerializeStruct = Impossible<CompactString, CodecError>;
    type SerializeStructVariant = Impossible<CompactString, CodecError>;

    fn serialize_str(self, v: &str) -> CodecResult<CompactString> {
        Ok(CompactString::from(v))
    }

    fn serialize_char(self, v: char) -> CodecResult<CompactString> {
        Ok(v.to_compact_string())
    }

    fn serialize_bool(self, v: bool) -> CodecResult<CompactString> {
        Ok(v.to_compact_string())
    }

    fn serialize_i8(self, v: i8) -> CodecResult<CompactString> {
        Ok(v.to_compact_string())
    }

    fn serialize_i16(self, v: i16) -> CodecResult<CompactString> {
        Ok(v.to_compact_string())
    }

    fn serialize_i32(self, v: i32) -> CodecResult<CompactString> {
        Ok(v.to_compact_string())
    }

    fn serialize_i64(self, v: i64) -> CodecResult<CompactString> {
        Ok(v.to_compact_string())
    }

    fn serialize_u8(self, v: u8) -> CodecResult<CompactString> {
        Ok(v.to_compact_string())
    }

    fn serialize_u16(self, v: u16) -> CodecResult<CompactString> {
        Ok(v.to_compact_string())
    }

    fn serialize_u32(self, v: u32) -> CodecResult<CompactString> {
        Ok(v.to_compact_string())
    }

    fn serialize_u64(self, v: u64) -> CodecResult<CompactString> {
        Ok(v.to_compact_string())
    }

    fn serialize_f32(self, _v: f32) -> CodecResult<CompactString> {
        Err(bad_key("float"))
    }

    fn serialize_f64(self, _v: f64) -> CodecResult<CompactString> {
        Err(bad_key("float"))
    }

    fn serialize_bytes(self, _v: &[u8]) -> CodecResult<CompactString> {
        Err(bad_key("bytes"))
    }

    fn serialize_none(self) -> CodecResult<CompactString> {
        Err(bad_key("none"))
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> CodecResult<CompactString> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> CodecResult<CompactString> {
        Err(bad_key("unit"))
    }

    fn serialize_unit_struct(self, name: &'static str) -> CodecResult<CompactString> {
        Err(bad_key(name))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> CodecResult<CompactString> {
        Ok(CompactString::from(variant))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> CodecResult<CompactString> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> CodecResult<CompactString> {
        Err(bad_key(name))
    }

    fn serialize_seq(self, _len: Option<usize>) -> CodecResult<Self::SerializeSeq> {
        Err(bad_key("sequence"))
    }

    fn serialize_tuple(self, _len: usize) -> CodecResult<Self::SerializeTuple> {
        Err(bad_key("tuple"))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> CodecResult<Self::SerializeTupleStruct> {
        Err(bad_key(name))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> CodecResult<Self::SerializeTupleVariant> {
        Err(bad_key(name))
    }

    fn serialize_map(self, _len: Option<usize>) -> CodecResult<Self::SerializeMap> {
        Err(bad_key("map"))
    }

    fn serialize_struct(self, name: &'static str, _len: usize) -> CodecResult<Self::SerializeStruct> {
        Err(bad_key(name))
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> CodecResult<Self::SerializeStructVariant> {
        Err(bad_key(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder;
    use crate::compiler::Compiler;
    use crate::value::Value;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::collections::BTreeMap;

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

    fn encode<T: Serialize + ?Sized>(op: &OpNode, value: &T) -> CodecResult<Vec<u8>> {
        let mut buf = Buffer::with_capacity(0);
        to_buffer(value, op, None, &mut buf)?;
        Ok(buf.as_slice().to_vec())
    }

    #[derive(Serialize)]
    struct Info {
        name: String,
        area: u64,
    }

    #[derive(Serialize)]
    struct Reordered {
        extra: bool,
        area: u16,
        name: &'static str,
    }

    #[test]
    fn test_struct_encode() {
        let value = Info {
            name: "ab".to_string(),
            area: 888,
        };
        assert_eq!(
            encode(&info(), &value).unwrap(),
            [0x02, b'a', b'b', 0x78, 0x03, 0x00, 0x00]
        );

        let reordered = Reordered {
            extra: true,
            area: 888,
            name: "ab",
        };
        assert_eq!(
            encode(&info(), &reordered).unwrap(),
            [0x02, b'a', b'b', 0x78, 0x03, 0x00, 0x00]
        );
    }

    #[test]
    fn test_matches_dynamic_path() {
        let value = Value::from(json!({"area": 888, "ignored": [1], "name": "ab"}));
        let mut dynamic = Buffer::with_capacity(0);
        info().encode_value(&mut dynamic, Some(&value)).unwrap();
        assert_eq!(encode(&info(), &value).unwrap(), dynamic.as_slice());
    }

    #[test]
    fn test_map_encode() {
        let mut map = BTreeMap::new();
        map.insert("area", 1u32);
        assert_eq!(encode(&info(), &map).unwrap(), [0x00, 0x01, 0x00, 0x00, 0x00]);
    }

    #[derive(Serialize)]
    struct Skipping {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        area: Option<u32>,
    }

    #[test]
    fn test_none_and_skipped_write_zero() {
        let value = Skipping {
            name: None,
            area: None,
        };
        assert_eq!(encode(&info(), &value).unwrap(), [0x00, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_array_encode() {
        let op = root(json!({"type": "array", "items": {"type": "uint8"}}));
        assert_eq!(encode(&op, &vec![1u8, 2, 3]).unwrap(), [0x03, 0x01, 0x02, 0x03]);
        assert_eq!(encode(&op, &[1u8, 2, 3]).unwrap(), [0x03, 0x01, 0x02, 0x03]);
        assert_eq!(encode(&op, &Raw(&[1, 2, 3])).unwrap(), [0x03, 0x01, 0x02, 0x03]);
    }

    struct Raw<'a>(&'a [u8]);

    impl Serialize for Raw<'_> {
        fn serialize<S: ser::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_bytes(self.0)
        }
    }

    struct Unsized;

    impl Serialize for Unsized {
        fn serialize<S: ser::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_seq((1u8..=3).filter(|_| true))
        }
    }

    #[test]
    fn test_unknown_length_sequence() {
        let op = root(json!({"type": "array", "items": "uint8"}));
        assert_eq!(encode(&op, &Unsized).unwrap(), [0x03, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_enum_as_string() {
        #[derive(Serialize)]
        enum Color {
            Red,
        }
        #[derive(Serialize)]
        struct Paint {
            name: Color,
            area: u8,
        }
        let bytes = encode(&info(), &Paint { name: Color::Red, area: 1 }).unwrap();
        assert_eq!(bytes, [0x03, b'R', b'e', b'd', 0x01, 0x00, 0x00, 0x00]);
    }

    #[derive(Serialize, Deserialize)]
    struct Base {
        name: String,
    }

    #[derive(Serialize, Deserialize)]
    struct Located {
        area: u32,
        #[serde(flatten)]
        base: Base,
    }

    #[derive(Serialize)]
    struct Unlocated {
        #[serde(flatten)]
        base: Base,
    }

    #[test]
    fn test_flattened_record() {
        let op = info();
        let bind = binder::build::<Located>(&op).unwrap();
        let value = Located {
            area: 888,
            base: Base {
                name: "ab".to_string(),
            },
        };
        let mut buf = Buffer::with_capacity(0);
        to_buffer(&value, &op, Some(&bind), &mut buf).unwrap();
        assert_eq!(buf.as_slice(), [0x02, b'a', b'b', 0x78, 0x03, 0x00, 0x00]);

        // 带展开字段的值缺少属性时不能静默写零
        let partial = Unlocated {
            base: Base {
                name: "ab".to_string(),
            },
        };
        let mut buf = Buffer::with_capacity(0);
        assert!(matches!(
            to_buffer(&partial, &op, Some(&bind), &mut buf),
            Err(CodecError::StructFieldNonExist { type_name, field })
                if type_name == "Located" && field == "area"
        ));

        // 没有绑定的映射仍写零值
        assert_eq!(encode(&op, &partial).unwrap(), [0x02, b'a', b'b', 0, 0, 0, 0]);
    }

    struct Twice;

    impl Serialize for Twice {
        fn serialize<S: ser::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            use serde::ser::SerializeMap;
            let mut map = serializer.serialize_map(None)?;
            map.serialize_entry("area", &1u32)?;
            map.serialize_entry("area", &2u32)?;
            map.end()
        }
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            encode(&info(), &Twice),
            Err(CodecError::AmbiguousField(name)) if name == "area"
        ));

        #[derive(Serialize)]
        struct Negative {
            name: String,
            area: i32,
        }
        let value = Negative {
            name: String::new(),
            area: -1,
        };
        assert!(matches!(
            encode(&info(), &value),
            Err(CodecError::TypeAssertion { expected: "uint32", .. })
        ));
        assert!(matches!(
            encode(&info(), &vec![1u8]),
            Err(CodecError::WrongType { expected: "object", .. })
        ));
    }
}
