use crate::binder::{Placeholder, StructOp};
use crate::buffer::Reader;
use crate::definition::LeafKind;
use crate::operation::{OpNode, Operation};
use crate::{CodecError, CodecResult};
use compact_str::CompactString;
use serde::de::value::BorrowedStrDeserializer;
use serde::de::{
    self, Deserializer as _, DeserializeSeed, IntoDeserializer, MapAccess, SeqAccess, Visitor,
};
use serde::forward_to_deserialize_any;
use std::fmt;

/// 按操作树从字节流还原任意 `Deserialize` 值
///
/// `bind` 是目标类型的绑定结果。结构体中模式之外的字段由绑定记录，
/// 读完模式属性后为它们补上占位值；没有绑定时这些字段按类型自身的缺省规则处理。
pub struct Deserializer<'de, 'a> {
    reader: &'a mut Reader<'de>,
    op: &'a OpNode,
    bind: Option<&'a StructOp>,
}

impl<'de, 'a> Deserializer<'de, 'a> {
    pub fn new(reader: &'a mut Reader<'de>, op: &'a OpNode, bind: Option<&'a StructOp>) -> Self {
        Self { reader, op, bind }
    }
}

pub fn from_reader<'de, T>(
    reader: &mut Reader<'de>,
    op: &OpNode,
    bind: Option<&StructOp>,
) -> CodecResult<T>
where
    T: de::Deserialize<'de>,
{
    T::deserialize(Deserializer::new(reader, op, bind))
}

impl de::Error for CodecError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        CodecError::Custom(msg.to_string())
    }
}

impl<'de, 'a> de::Deserializer<'de> for Deserializer<'de, 'a> {
    type Error = CodecError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> CodecResult<V::Value> {
        match self.op.op() {
            Operation::Leaf(kind) => {
                let r = self.reader;
                match *kind {
                    LeafKind::Boolean => visitor.visit_bool(r.read_bool()?),
                    LeafKind::String => visitor.visit_borrowed_str(r.read_str()?),
                    LeafKind::Int8 => visitor.visit_i8(r.read_i8()?),
                    LeafKind::Uint8 => visitor.visit_u8(r.read_u8()?),
                    LeafKind::Int16(o) => visitor.visit_i16(r.read_i16(o)?),
                    LeafKind::Int32(o) => visitor.visit_i32(r.read_i32(o)?),
                    LeafKind::Int64(o) => visitor.visit_i64(r.read_i64(o)?),
                    LeafKind::Uint16(o) => visitor.visit_u16(r.read_u16(o)?),
                    LeafKind::Uint32(o) => visitor.visit_u32(r.read_u32(o)?),
                    LeafKind::Uint64(o) => visitor.visit_u64(r.read_u64(o)?),
                    LeafKind::Float32(o) => visitor.visit_f32(r.read_f32(o)?),
                    LeafKind::Float64(o) => visitor.visit_f64(r.read_f64(o)?),
                }
            }
            Operation::Array(item) => {
                let remaining = self.reader.read_len(item.min_size())?;
                let mut seq = SeqDecoder {
                    reader: self.reader,
                    item,
                    bind: self.bind.and_then(StructOp::item),
                    remaining,
                };
                let value = visitor.visit_seq(&mut seq)?;
                seq.finish()?;
                Ok(value)
            }
            Operation::Object(children) => {
                let mut map = MapDecoder {
                    reader: self.reader,
                    children: children.values(),
                    index: 0,
                    bind: self.bind,
                    unbound: self.bind.map(StructOp::unbound).unwrap_or_default().iter(),
                    pending: Pending::None,
                };
                let value = visitor.visit_map(&mut map)?;
                map.finish()?;
                Ok(value)
            }
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> CodecResult<V::Value> {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> CodecResult<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> CodecResult<V::Value> {
        match self.op.item().map(OpNode::op) {
            Some(Operation::Leaf(LeafKind::Uint8)) => {
                let len = self.reader.read_len(1)?;
                visitor.visit_borrowed_bytes(self.reader.read_bytes(len)?)
            }
            _ => self.deserialize_any(visitor),
        }
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> CodecResult<V::Value> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> CodecResult<V::Value> {
        match self.op.op() {
            Operation::Leaf(LeafKind::String) => {
                let variant = self.reader.read_str()?;
                visitor.visit_enum(BorrowedStrDeserializer::<CodecError>::new(variant))
            }
            _ => Err(self.op.wrong_type("enum")),
        }
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> CodecResult<V::Value> {
        self.op.skip(self.reader)?;
        visitor.visit_unit()
    }

    fn is_human_readable(&self) -> bool {
        false
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        unit unit_struct seq tuple tuple_struct map struct identifier
    }
}

struct SeqDecoder<'de, 'a> {
    reader: &'a mut Reader<'de>,
    item: &'a OpNode,
    bind: Option<&'a StructOp>,
    remaining: usize,
}

impl<'de, 'a> SeqDecoder<'de, 'a> {
    /// 跳过访问者没有读取的元素
    fn finish(self) -> CodecResult<()> {
        for _ in 0..self.remaining {
            self.item.skip(self.reader)?;
        }
        Ok(())
    }
}

impl<'de, 'a> SeqAccess<'de> for SeqDecoder<'de, 'a> {
    type Error = CodecError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> CodecResult<Option<T::Value>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        seed.deserialize(Deserializer::new(&mut *self.reader, self.item, self.bind))
            .map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.remaining)
    }
}

enum Pending<'a> {
    None,
    Child(&'a OpNode, Option<&'a StructOp>),
    Unbound,
}

struct MapDecoder<'de, 'a> {
    reader: &'a mut Reader<'de>,
    children: indexmap::map::Values<'a, CompactString, OpNode>,
    index: usize,
    bind: Option<&'a StructOp>,
    unbound: std::slice::Iter<'a, &'static str>,
    pending: Pending<'a>,
}

impl<'de, 'a> MapDecoder<'de, 'a> {
    /// 跳过访问者没有读取的属性，保证读取位置落在对象末尾
    fn finish(self) -> CodecResult<()> {
        if let Pending::Child(op, _) = self.pending {
            op.skip(self.reader)?;
        }
        for child in self.children {
            child.skip(self.reader)?;
        }
        Ok(())
    }
}

impl<'de, 'a> MapAccess<'de> for MapDecoder<'de, 'a> {
    type Error = CodecError;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> CodecResult<Option<K::Value>> {
        if let Some(child) = self.children.next() {
            let bind = self.bind.and_then(|b| b.child(self.index));
            self.index += 1;
            self.pending = Pending::Child(child, bind);
            let name: de::value::StrDeserializer<'_, CodecError> = child.name().into_deserializer();
            return seed.deserialize(name).map(Some);
        }
        if let Some(field) = self.unbound.next() {
            self.pending = Pending::Unbound;
            let name: de::value::StrDeserializer<'_, CodecError> = (*field).into_deserializer();
            return seed.deserialize(name).map(Some);
        }
        Ok(None)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> CodecResult<V::Value> {
        match std::mem::replace(&mut self.pending, Pending::None) {
            Pending::Child(op, bind) => {
                seed.deserialize(Deserializer::new(&mut *self.reader, op, bind))
            }
            Pending::Unbound => seed.deserialize(Placeholder::new(1)),
            Pending::None => Err(CodecError::Custom("value requested before key".to_string())),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.children.len() + self.unbound.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder;
    use crate::compiler::Compiler;
    use crate::value::Value;
    use crate::BufferError;
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

    const INFO_BYTES: [u8; 7] = [0x02, b'a', b'b', 0x78, 0x03, 0x00, 0x00];

    fn decode<'de, T: Deserialize<'de>>(op: &OpNode, bind: Option<&StructOp>, data: &'de [u8]) -> CodecResult<T> {
        from_reader(&mut Reader::new(data), op, bind)
    }

    #[derive(Deserialize, Debug, PartialEq)]
    struct Info {
        name: String,
        area: u64,
    }

    #[test]
    fn test_struct_decode() {
        let info: Info = decode(&info(), None, &INFO_BYTES).unwrap();
        assert_eq!(
            info,
            Info {
                name: "ab".to_string(),
                area: 888
            }
        );
    }

    #[derive(Deserialize, Debug, PartialEq)]
    struct Borrowed<'a> {
        area: u32,
        name: &'a str,
    }

    #[test]
    fn test_borrowed_str() {
        let value: Borrowed<'_> = decode(&info(), None, &INFO_BYTES).unwrap();
        assert_eq!(value, Borrowed { area: 888, name: "ab" });
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Extended {
        name: String,
        area: u32,
        note: String,
        count: u16,
        tags: Option<Vec<String>>,
    }

    #[test]
    fn test_unbound_fields_get_zero_values() {
        let op = info();
        let bind = binder::build::<Extended>(&op).unwrap();
        let value: Extended = decode(&op, Some(&bind), &INFO_BYTES).unwrap();
        assert_eq!(
            value,
            Extended {
                name: "ab".to_string(),
                area: 888,
                note: String::new(),
                count: 0,
                tags: None,
            }
        );
    }

    #[test]
    fn test_dynamic_targets() {
        let value: Value = decode(&info(), None, &INFO_BYTES).unwrap();
        assert_eq!(value.get("area"), Some(&Value::Uint32(888)));

        let json: serde_json::Value = decode(&info(), None, &INFO_BYTES).unwrap();
        assert_eq!(json, json!({"name": "ab", "area": 888}));

        let map: BTreeMap<String, serde_json::Value> = decode(&info(), None, &INFO_BYTES).unwrap();
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_sequences() {
        let op = root(json!({"type": "array", "items": "uint8"}));
        let data = [0x03, 0x01, 0x02, 0x03];
        let list: Vec<u8> = decode(&op, None, &data).unwrap();
        assert_eq!(list, [1, 2, 3]);

        // 多出的元素被跳过
        let pair: (u8, u8) = decode(&op, None, &data).unwrap();
        assert_eq!(pair, (1, 2));

        let mut reader = Reader::new(&data);
        let _: [u8; 2] = from_reader(&mut reader, &op, None).unwrap();
        assert!(reader.is_empty());
    }

    #[test]
    fn test_enum_from_string() {
        #[derive(Deserialize, Debug, PartialEq)]
        enum Color {
            Red,
            Green,
        }
        let op = root(json!({"type": "array", "items": "string"}));
        let data = [0x02, 0x03, b'R', b'e', b'd', 0x05, b'G', b'r', b'e', b'e', b'n'];
        let colors: Vec<Color> = decode(&op, None, &data).unwrap();
        assert_eq!(colors, [Color::Red, Color::Green]);

        let data = [0x01, 0x04, b'B', b'l', b'u', b'e'];
        assert!(decode::<Vec<Color>>(&op, None, &data).is_err());
    }

    #[test]
    fn test_truncated_input() {
        let err = decode::<Info>(&info(), None, &INFO_BYTES[..5]).unwrap_err();
        assert!(matches!(err, CodecError::Buffer(BufferError::Overread { .. })));
    }
}
