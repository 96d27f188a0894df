//! 从 Rust 类型推导模式
//!
//! 对 `T` 驱动一次不带模式引导的 `T::deserialize`，按 serde 数据模型记录每个字段的类型。
//! 字段顺序即声明顺序，多字节数值使用调用方给定的字节序。
//! 映射、无类型值与携带数据的枚举无法表示为固定布局，推导时报错；
//! 递归类型会触发嵌套深度上限。

use crate::binder;
use crate::definition::{LeafKind, SchemaNode};
use crate::{SchemaError, SchemaResult};
use indexmap::IndexMap;
use jsonpack_common::{ByteOrder, MAX_SCHEMA_DEPTH};
use serde::de::value::StrDeserializer;
use serde::de::{
    self, DeserializeOwned, DeserializeSeed, EnumAccess, IntoDeserializer, MapAccess, SeqAccess,
    VariantAccess, Visitor,
};
use serde::Deserializer;
use std::fmt;

impl de::Error for SchemaError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        SchemaError::Derive(msg.to_string())
    }
}

impl SchemaNode {
    /// 按类型 `T` 的 serde 结构推导模式
    ///
    /// # Brief
    /// `i8`/`u8` 映射为单字节整数，其余数值带字节序；`String` 与 `char` 映射为 string；
    /// `Vec<T>`、切片与同构元组映射为数组；结构体映射为对象，`order` 为字段声明顺序；
    /// `Option`、`Box` 与 newtype 透明；只有单元变体的枚举映射为 string
    ///
    /// # Arguments
    /// * `order` - 多字节数值使用的字节序
    ///
    /// # Returns
    /// 顶层必须是结构体或序列，否则返回 `SchemaError::InvalidRootType`
    pub fn derive<T: DeserializeOwned>(order: ByteOrder) -> SchemaResult<SchemaNode> {
        let mut slot = None;
        T::deserialize(DeriveTracer {
            order,
            slot: &mut slot,
            depth: 1,
        })?;
        match slot {
            Some(SchemaNode::Leaf(kind)) => Err(SchemaError::InvalidRootType(kind.to_string())),
            Some(node) => Ok(node),
            None => Err(SchemaError::Derive(format!(
                "type {} produced no schema",
                std::any::type_name::<T>()
            ))),
        }
    }
}

fn unsupported(what: &str) -> SchemaError {
    SchemaError::Derive(format!("{} has no fixed binary layout", what))
}

fn key(name: &str) -> StrDeserializer<'_, SchemaError> {
    name.into_deserializer()
}

struct DeriveTracer<'a> {
    order: ByteOrder,
    slot: &'a mut Option<SchemaNode>,
    depth: usize,
}

impl<'a> DeriveTracer<'a> {
    fn nested<'b>(&self, slot: &'b mut Option<SchemaNode>) -> SchemaResult<DeriveTracer<'b>> {
        if self.depth >= MAX_SCHEMA_DEPTH {
            return Err(SchemaError::TooDeep(MAX_SCHEMA_DEPTH));
        }
        Ok(DeriveTracer {
            order: self.order,
            slot,
            depth: self.depth + 1,
        })
    }

    fn deeper(self) -> SchemaResult<Self> {
        if self.depth >= MAX_SCHEMA_DEPTH {
            return Err(SchemaError::TooDeep(MAX_SCHEMA_DEPTH));
        }
        Ok(DeriveTracer {
            depth: self.depth + 1,
            ..self
        })
    }

    fn leaf(self, kind: LeafKind) {
        *self.slot = Some(SchemaNode::Leaf(kind));
    }

    fn sequence<'de, V: Visitor<'de>>(self, len: usize, visitor: V) -> SchemaResult<V::Value> {
        let mut slots = Vec::with_capacity(len);
        let value = visitor.visit_seq(TraceSeq {
            parent: &self,
            remaining: len,
            slots: &mut slots,
        })?;
        let mut items = slots.into_iter().flatten();
        let first = items
            .next()
            .ok_or_else(|| SchemaError::Derive("empty tuple has no element type".to_string()))?;
        if items.any(|other| other != first) {
            return Err(unsupported("heterogeneous tuple"));
        }
        *self.slot = Some(SchemaNode::array(first));
        Ok(value)
    }
}

macro_rules! derive_leaf {
    ($($method:ident => $visit:ident($zero:expr), $kind:expr;)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> SchemaResult<V::Value> {
                let kind = $kind(self.order);
                self.leaf(kind);
                visitor.$visit($zero)
            }
        )*
    };
}

impl<'de, 'a> Deserializer<'de> for DeriveTracer<'a> {
    type Error = SchemaError;

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> SchemaResult<V::Value> {
        Err(unsupported("untyped value"))
    }

    derive_leaf! {
        deserialize_bool => visit_bool(false), |_| LeafKind::Boolean;
        deserialize_i8 => visit_i8(0), |_| LeafKind::Int8;
        deserialize_u8 => visit_u8(0), |_| LeafKind::Uint8;
        deserialize_i16 => visit_i16(0), LeafKind::Int16;
        deserialize_i32 => visit_i32(0), LeafKind::Int32;
        deserialize_i64 => visit_i64(0), LeafKind::Int64;
        deserialize_u16 => visit_u16(0), LeafKind::Uint16;
        deserialize_u32 => visit_u32(0), LeafKind::Uint32;
        deserialize_u64 => visit_u64(0), LeafKind::Uint64;
        deserialize_f32 => visit_f32(0.0), LeafKind::Float32;
        deserialize_f64 => visit_f64(0.0), LeafKind::Float64;
        deserialize_char => visit_char('\0'), |_| LeafKind::String;
        deserialize_str => visit_str(""), |_| LeafKind::String;
        deserialize_string => visit_str(""), |_| LeafKind::String;
    }

    fn deserialize_i128<V: Visitor<'de>>(self, _visitor: V) -> SchemaResult<V::Value> {
        Err(unsupported("i128"))
    }

    fn deserialize_u128<V: Visitor<'de>>(self, _visitor: V) -> SchemaResult<V::Value> {
        Err(unsupported("u128"))
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> SchemaResult<V::Value> {
        *self.slot = Some(SchemaNode::array(SchemaNode::Leaf(LeafKind::Uint8)));
        visitor.visit_bytes(&[])
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> SchemaResult<V::Value> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> SchemaResult<V::Value> {
        visitor.visit_some(self.deeper()?)
    }

    fn deserialize_unit<V: Visitor<'de>>(self, _visitor: V) -> SchemaResult<V::Value> {
        Err(unsupported("()"))
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        _visitor: V,
    ) -> SchemaResult<V::Value> {
        Err(unsupported(name))
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> SchemaResult<V::Value> {
        visitor.visit_newtype_struct(self.deeper()?)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> SchemaResult<V::Value> {
        self.sequence(1, visitor)
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, len: usize, visitor: V) -> SchemaResult<V::Value> {
        self.sequence(len, visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> SchemaResult<V::Value> {
        self.sequence(len, visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> SchemaResult<V::Value> {
        // 含展开字段的结构体也以映射出现，字段集合无法从类型得知
        match binder::flattened_record(&visitor) {
            Some(name) => Err(unsupported(&format!("{} with flattened fields", name))),
            None => Err(unsupported("map")),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> SchemaResult<V::Value> {
        if fields.is_empty() {
            return Err(unsupported(name));
        }
        let mut slots = vec![None; fields.len()];
        let value = visitor.visit_map(TraceFields {
            parent: &self,
            fields: fields.iter().zip(slots.iter_mut()),
            pending: None,
        })?;

        let mut properties = IndexMap::with_capacity(fields.len());
        for (field, slot) in fields.iter().zip(slots) {
            let node = slot.ok_or_else(|| {
                SchemaError::Derive(format!("field {}.{} was not traced", name, field))
            })?;
            properties.insert(field.to_string(), node);
        }
        *self.slot = Some(SchemaNode::object(properties));
        Ok(value)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> SchemaResult<V::Value> {
        let variant = variants.first().copied().ok_or_else(|| unsupported(name))?;
        *self.slot = Some(SchemaNode::Leaf(LeafKind::String));
        visitor.visit_enum(UnitVariant { name, variant })
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> SchemaResult<V::Value> {
        visitor.visit_str("")
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> SchemaResult<V::Value> {
        visitor.visit_unit()
    }
}

struct TraceSeq<'p, 'a, 's> {
    parent: &'p DeriveTracer<'a>,
    remaining: usize,
    slots: &'s mut Vec<Option<SchemaNode>>,
}

impl<'de, 'p, 'a, 's> SeqAccess<'de> for TraceSeq<'p, 'a, 's> {
    type Error = SchemaError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> SchemaResult<Option<T::Value>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        self.slots.push(None);
        let slot = match self.slots.last_mut() {
            Some(slot) => slot,
            None => return Ok(None),
        };
        seed.deserialize(self.parent.nested(slot)?).map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.remaining)
    }
}

struct TraceFields<'p, 'a, 's> {
    parent: &'p DeriveTracer<'a>,
    fields: std::iter::Zip<
        std::slice::Iter<'static, &'static str>,
        std::slice::IterMut<'s, Option<SchemaNode>>,
    >,
    pending: Option<&'s mut Option<SchemaNode>>,
}

impl<'de, 'p, 'a, 's> MapAccess<'de> for TraceFields<'p, 'a, 's> {
    type Error = SchemaError;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> SchemaResult<Option<K::Value>> {
        match self.fields.next() {
            Some((field, slot)) => {
                self.pending = Some(slot);
                seed.deserialize(key(field)).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> SchemaResult<V::Value> {
        match self.pending.take() {
            Some(slot) => seed.deserialize(self.parent.nested(slot)?),
            None => Err(SchemaError::Derive("value requested before key".to_string())),
        }
    }
}

/// 只接受单元变体的枚举访问
struct UnitVariant {
    name: &'static str,
    variant: &'static str,
}

impl UnitVariant {
    fn reject(&self) -> SchemaError {
        unsupported(&format!("enum {} with data variants", self.name))
    }
}

impl<'de> EnumAccess<'de> for UnitVariant {
    type Error = SchemaError;
    type Variant = Self;

    fn variant_seed<V: DeserializeSeed<'de>>(self, seed: V) -> SchemaResult<(V::Value, Self)> {
        let value = seed.deserialize(key(self.variant))?;
        Ok((value, self))
    }
}

impl<'de> VariantAccess<'de> for UnitVariant {
    type Error = SchemaError;

    fn unit_variant(self) -> SchemaResult<()> {
        Ok(())
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, _seed: T) -> SchemaResult<T::Value> {
        Err(self.reject())
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, _visitor: V) -> SchemaResult<V::Value> {
        Err(self.reject())
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> SchemaResult<V::Value> {
        Err(self.reject())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::HashMap;

    #[allow(dead_code)]
    #[derive(Deserialize)]
    enum Kind {
        City,
        Village,
    }

    #[allow(dead_code)]
    #[derive(Deserialize)]
    struct Point(f32, f32);

    #[allow(dead_code)]
    #[derive(Deserialize)]
    struct Area {
        name: String,
        #[serde(rename = "area")]
        size: u32,
        flag: bool,
        level: i8,
        kind: Kind,
        center: Option<Point>,
        codes: Vec<u16>,
        #[serde(skip)]
        cache: u64,
        inner: Inner,
    }

    #[allow(dead_code)]
    #[derive(Deserialize)]
    struct Inner {
        x: Box<f64>,
        raw: [u8; 2],
    }

    #[test]
    fn test_derive_struct() {
        let node = SchemaNode::derive::<Area>(ByteOrder::Big).unwrap();
        assert_eq!(
            node.to_json(),
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "area": {"type": "uint32be"},
                    "flag": {"type": "boolean"},
                    "level": {"type": "int8"},
                    "kind": {"type": "string"},
                    "center": {"type": "array", "items": {"type": "float32be"}},
                    "codes": {"type": "array", "items": {"type": "uint16be"}},
                    "inner": {
                        "type": "object",
                        "properties": {
                            "x": {"type": "float64be"},
                            "raw": {"type": "array", "items": {"type": "uint8"}}
                        },
                        "order": ["x", "raw"]
                    }
                },
                "order": ["name", "area", "flag", "level", "kind", "center", "codes", "inner"]
            })
        );
    }

    #[test]
    fn test_derive_sequence_root() {
        let node = SchemaNode::derive::<Vec<Vec<i64>>>(ByteOrder::Little).unwrap();
        assert_eq!(
            node,
            SchemaNode::array(SchemaNode::array(SchemaNode::leaf(LeafKind::Int64(
                ByteOrder::Little
            ))))
        );
    }

    #[allow(dead_code)]
    #[derive(Deserialize)]
    struct WithMap {
        attrs: HashMap<String, String>,
    }

    #[allow(dead_code)]
    #[derive(Deserialize)]
    struct Located {
        area: u32,
        #[serde(flatten)]
        attrs: WithMap,
    }

    #[allow(dead_code)]
    #[derive(Deserialize)]
    enum Shape {
        Circle(f64),
    }

    #[allow(dead_code)]
    #[derive(Deserialize)]
    struct WithShape {
        shape: Shape,
    }

    #[allow(dead_code)]
    #[derive(Deserialize)]
    struct Recursive {
        next: Option<Box<Recursive>>,
    }

    #[test]
    fn test_derive_errors() {
        assert!(matches!(
            SchemaNode::derive::<u32>(ByteOrder::Little),
            Err(SchemaError::InvalidRootType(t)) if t == "uint32le"
        ));
        assert!(matches!(
            SchemaNode::derive::<WithMap>(ByteOrder::Little),
            Err(SchemaError::Derive(_))
        ));
        assert!(matches!(
            SchemaNode::derive::<Located>(ByteOrder::Little),
            Err(SchemaError::Derive(m)) if m.starts_with("Located with flattened fields")
        ));
        assert!(matches!(
            SchemaNode::derive::<WithShape>(ByteOrder::Little),
            Err(SchemaError::Derive(_))
        ));
        assert!(matches!(
            SchemaNode::derive::<(u8, String)>(ByteOrder::Little),
            Err(SchemaError::Derive(_))
        ));
        assert!(matches!(
            SchemaNode::derive::<Recursive>(ByteOrder::Little),
            Err(SchemaError::TooDeep(_))
        ));
    }
}
