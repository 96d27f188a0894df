//! 结构体绑定模块
//!
//! 对具体类型 `T` 驱动一次 `T::deserialize`，由操作树引导，
//! 在同一次遍历中检查每个模式属性都能映射到 `T` 的字段，并记录为 [`StructOp`] 影子树。
//!
//! 字段按 serde 名称匹配（`rename` 覆盖名称，`skip` 的字段不出现）。
//! 模式之外的字段用占位值填充，不参与绑定。
//!
//! 带 `#[serde(flatten)]` 的结构体以映射的形式出现，字段列表只能从序列化结果得知，
//! 因此这类类型绑定后还要把占位样本编码一遍，校验每个模式属性都有对应字段。

use crate::buffer::Buffer;
use crate::definition::LeafKind;
use crate::operation::{OpNode, Operation};
use crate::ser;
use crate::{CodecError, CodecResult};
use compact_str::CompactString;
use jsonpack_common::MAX_SCHEMA_DEPTH;
use serde::de::value::StrDeserializer;
use serde::de::{
    DeserializeOwned, DeserializeSeed, EnumAccess, IntoDeserializer, MapAccess, SeqAccess,
    VariantAccess, Visitor,
};
use serde::{Deserializer, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// 绑定结果，与操作树按下标同步遍历
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructOp {
    /// 字段声明为 `Option<_>`
    pub optional: bool,
    pub kind: StructKind,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum StructKind {
    /// 结构体，`children` 与对象节点的子节点一一对应
    Record {
        type_name: &'static str,
        children: Vec<StructOp>,
        /// 模式中没有的字段，解码时填充占位值
        unbound: Vec<&'static str>,
    },
    /// 带展开字段的结构体，`children` 与对象节点的子节点一一对应
    Flattened {
        type_name: String,
        children: Vec<StructOp>,
    },
    Sequence(Box<StructOp>),
    Leaf,
    /// 映射或无类型值，运行时按名称解析
    #[default]
    Dynamic,
}

impl StructOp {
    pub fn child(&self, index: usize) -> Option<&StructOp> {
        self.children().get(index)
    }

    pub fn children(&self) -> &[StructOp] {
        match &self.kind {
            StructKind::Record { children, .. } | StructKind::Flattened { children, .. } => children,
            _ => &[],
        }
    }

    pub fn item(&self) -> Option<&StructOp> {
        match &self.kind {
            StructKind::Sequence(item) => Some(item),
            _ => None,
        }
    }

    pub fn unbound(&self) -> &[&'static str] {
        match &self.kind {
            StructKind::Record { unbound, .. } => unbound,
            _ => &[],
        }
    }

    pub fn type_name(&self) -> Option<&str> {
        match &self.kind {
            StructKind::Record { type_name, .. } => Some(type_name),
            StructKind::Flattened { type_name, .. } => Some(type_name),
            _ => None,
        }
    }

    /// 展开字段的类型名，编码时据此要求每个模式属性都被写出
    pub fn flattened(&self) -> Option<&str> {
        match &self.kind {
            StructKind::Flattened { type_name, .. } => Some(type_name),
            _ => None,
        }
    }

    fn has_flattened(&self) -> bool {
        match &self.kind {
            StructKind::Flattened { .. } => true,
            StructKind::Record { children, .. } => children.iter().any(StructOp::has_flattened),
            StructKind::Sequence(item) => item.has_flattened(),
            StructKind::Leaf | StructKind::Dynamic => false,
        }
    }
}

/// 为类型 `T` 构建绑定
///
/// # Returns
/// 模式属性在 `T` 中不存在时返回 `CodecError::StructFieldNonExist`
pub fn build<T: DeserializeOwned + Serialize>(op: &OpNode) -> CodecResult<StructOp> {
    let mut root = StructOp::default();
    let sample = T::deserialize(BindTracer {
        op,
        slot: &mut root,
    })?;
    if root.has_flattened() {
        let mut scratch = Buffer::with_capacity(op.min_size());
        ser::to_buffer(&sample, op, Some(&root), &mut scratch)?;
    }
    Ok(root)
}

/// 识别 serde 为带展开字段的结构体生成的访问器
///
/// 这类结构体经 `deserialize_map` 到达，期望描述形如 `struct Name`。
pub(crate) fn flattened_record<'de, V: Visitor<'de>>(visitor: &V) -> Option<String> {
    struct Expecting<'v, 'de, V>(&'v V, PhantomData<&'de ()>);

    impl<'v, 'de, V: Visitor<'de>> fmt::Display for Expecting<'v, 'de, V> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            self.0.expecting(f)
        }
    }

    Expecting(visitor, PhantomData)
        .to_string()
        .strip_prefix("struct ")
        .map(str::to_string)
}

fn key(name: &str) -> StrDeserializer<'_, CodecError> {
    name.into_deserializer()
}

struct BindTracer<'a> {
    op: &'a OpNode,
    slot: &'a mut StructOp,
}

impl<'a> BindTracer<'a> {
    fn leaf(self, accept: impl Fn(LeafKind) -> bool, actual: &str) -> CodecResult<()> {
        match self.op.op() {
            Operation::Leaf(kind) if accept(*kind) => {
                self.slot.kind = StructKind::Leaf;
                Ok(())
            }
            _ => Err(self.op.wrong_type(actual)),
        }
    }

    fn sequence<'de, V: Visitor<'de>>(
        self,
        len: usize,
        actual: &str,
        visitor: V,
    ) -> CodecResult<V::Value> {
        let item = self.op.item().ok_or_else(|| self.op.wrong_type(actual))?;
        let mut slots = Vec::with_capacity(len);
        let value = visitor.visit_seq(TraceSeq {
            item,
            remaining: len,
            slots: &mut slots,
        })?;
        let item_slot = slots.into_iter().next().unwrap_or_default();
        self.slot.kind = StructKind::Sequence(Box::new(item_slot));
        Ok(value)
    }
}

macro_rules! bind_primitive {
    ($($method:ident => $visit:ident($zero:expr), $accept:expr, $actual:literal;)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> CodecResult<V::Value> {
                self.leaf($accept, $actual)?;
                visitor.$visit($zero)
            }
        )*
    };
}

impl<'de, 'a> Deserializer<'de> for BindTracer<'a> {
    type Error = CodecError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> CodecResult<V::Value> {
        self.slot.kind = StructKind::Dynamic;
        Placeholder::shaped(self.op, 0).deserialize_any(visitor)
    }

    bind_primitive! {
        deserialize_bool => visit_bool(false), |k| k == LeafKind::Boolean, "bool";
        deserialize_i8 => visit_i8(0), |k: LeafKind| k.is_integer(), "i8";
        deserialize_i16 => visit_i16(0), |k: LeafKind| k.is_integer(), "i16";
        deserialize_i32 => visit_i32(0), |k: LeafKind| k.is_integer(), "i32";
        deserialize_i64 => visit_i64(0), |k: LeafKind| k.is_integer(), "i64";
        deserialize_i128 => visit_i128(0), |k: LeafKind| k.is_integer(), "i128";
        deserialize_u8 => visit_u8(0), |k: LeafKind| k.is_integer(), "u8";
        deserialize_u16 => visit_u16(0), |k: LeafKind| k.is_integer(), "u16";
        deserialize_u32 => visit_u32(0), |k: LeafKind| k.is_integer(), "u32";
        deserialize_u64 => visit_u64(0), |k: LeafKind| k.is_integer(), "u64";
        deserialize_u128 => visit_u128(0), |k: LeafKind| k.is_integer(), "u128";
        deserialize_f32 => visit_f32(0.0), |k: LeafKind| k.is_float(), "f32";
        deserialize_f64 => visit_f64(0.0), |k: LeafKind| k.is_float(), "f64";
        deserialize_char => visit_char('\0'), |k| k == LeafKind::String, "char";
        deserialize_str => visit_str(""), |k| k == LeafKind::String, "str";
        deserialize_string => visit_str(""), |k| k == LeafKind::String, "string";
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> CodecResult<V::Value> {
        match self.op.item().map(OpNode::op) {
            Some(Operation::Leaf(LeafKind::Uint8)) => {
                self.slot.kind = StructKind::Sequence(Box::new(StructOp {
                    optional: false,
                    kind: StructKind::Leaf,
                }));
                visitor.visit_bytes(&[])
            }
            _ => Err(self.op.wrong_type("bytes")),
        }
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> CodecResult<V::Value> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> CodecResult<V::Value> {
        let BindTracer { op, slot } = self;
        let value = visitor.visit_some(BindTracer {
            op,
            slot: &mut *slot,
        })?;
        slot.optional = true;
        Ok(value)
    }

    fn deserialize_unit<V: Visitor<'de>>(self, _visitor: V) -> CodecResult<V::Value> {
        Err(CodecError::UnknownType("()".to_string()))
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        _visitor: V,
    ) -> CodecResult<V::Value> {
        Err(CodecError::UnknownType(name.to_string()))
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> CodecResult<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> CodecResult<V::Value> {
        self.sequence(1, "sequence", visitor)
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, len: usize, visitor: V) -> CodecResult<V::Value> {
        self.sequence(len, "tuple", visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        len: usize,
        visitor: V,
    ) -> CodecResult<V::Value> {
        self.sequence(len, name, visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> CodecResult<V::Value> {
        let children = self.op.children().ok_or_else(|| self.op.wrong_type("map"))?;
        let Some(type_name) = flattened_record(&visitor) else {
            self.slot.kind = StructKind::Dynamic;
            return Placeholder::shaped(self.op, 0).deserialize_map(visitor);
        };
        // 结构体自身的字段照常绑定，其余属性作为缓存内容交给展开的部分
        let mut slots = vec![StructOp::default(); children.len()];
        let value = visitor.visit_map(TraceStruct {
            children: children.values().zip(slots.iter_mut()),
            unbound: NO_FIELDS.iter(),
            pending: Pending::None,
        })?;
        self.slot.kind = StructKind::Flattened {
            type_name,
            children: slots,
        };
        Ok(value)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> CodecResult<V::Value> {
        let children = self.op.children().ok_or_else(|| self.op.wrong_type(name))?;
        if let Some(missing) = children.keys().find(|k| !fields.contains(&k.as_str())) {
            return Err(CodecError::StructFieldNonExist {
                type_name: name.to_string(),
                field: missing.to_string(),
            });
        }
        let unbound: Vec<&'static str> = fields
            .iter()
            .copied()
            .filter(|f| !children.contains_key(*f))
            .collect();
        let mut slots = vec![StructOp::default(); children.len()];
        let value = visitor.visit_map(TraceStruct {
            children: children.values().zip(slots.iter_mut()),
            unbound: unbound.iter(),
            pending: Pending::None,
        })?;
        self.slot.kind = StructKind::Record {
            type_name: name,
            children: slots,
            unbound,
        };
        Ok(value)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> CodecResult<V::Value> {
        self.leaf(|k| k == LeafKind::String, name)?;
        let variant = variants
            .first()
            .copied()
            .ok_or_else(|| CodecError::UnknownType(name.to_string()))?;
        visitor.visit_enum(EnumPlaceholder {
            variant,
            strict: Some(name),
            depth: 0,
        })
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> CodecResult<V::Value> {
        visitor.visit_str("")
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> CodecResult<V::Value> {
        self.slot.kind = StructKind::Dynamic;
        visitor.visit_unit()
    }
}

struct TraceSeq<'b> {
    item: &'b OpNode,
    remaining: usize,
    slots: &'b mut Vec<StructOp>,
}

impl<'de, 'b> SeqAccess<'de> for TraceSeq<'b> {
    type Error = CodecError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> CodecResult<Option<T::Value>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        self.slots.push(StructOp::default());
        let slot = match self.slots.last_mut() {
            Some(slot) => slot,
            None => return Ok(None),
        };
        seed.deserialize(BindTracer {
            op: self.item,
            slot,
        })
        .map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.remaining)
    }
}

enum Pending<'b> {
    None,
    Bound(&'b OpNode, &'b mut StructOp),
    Unbound,
}

struct TraceStruct<'b> {
    children: std::iter::Zip<
        indexmap::map::Values<'b, CompactString, OpNode>,
        std::slice::IterMut<'b, StructOp>,
    >,
    unbound: std::slice::Iter<'b, &'static str>,
    pending: Pending<'b>,
}

impl<'de, 'b> MapAccess<'de> for TraceStruct<'b> {
    type Error = CodecError;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> CodecResult<Option<K::Value>> {
        if let Some((op, slot)) = self.children.next() {
            self.pending = Pending::Bound(op, slot);
            return seed.deserialize(key(op.name())).map(Some);
        }
        if let Some(field) = self.unbound.next() {
            self.pending = Pending::Unbound;
            return seed.deserialize(key(field)).map(Some);
        }
        Ok(None)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> CodecResult<V::Value> {
        match std::mem::replace(&mut self.pending, Pending::None) {
            Pending::Bound(op, slot) => seed.deserialize(BindTracer { op, slot }),
            Pending::Unbound => seed.deserialize(Placeholder::new(1)),
            Pending::None => Err(CodecError::Custom("value requested before key".to_string())),
        }
    }
}

/// 占位值生成器
///
/// 对任意类型产生零值：数值为 0，字符串为空，序列为空，`Option` 为 `None`，
/// 结构体的所有字段递归取占位值，枚举取第一个变体。
/// 给定 `shape` 时，无类型请求（`deserialize_any` / `deserialize_map`）按模式形状生成零值。
pub(crate) struct Placeholder<'a> {
    shape: Option<&'a OpNode>,
    depth: usize,
}

impl<'a> Placeholder<'a> {
    pub(crate) fn new(depth: usize) -> Self {
        Self { shape: None, depth }
    }

    pub(crate) fn shaped(op: &'a OpNode, depth: usize) -> Self {
        Self {
            shape: Some(op),
            depth,
        }
    }

    fn nested(&self, shape: Option<&'a OpNode>) -> CodecResult<Placeholder<'a>> {
        if self.depth >= MAX_SCHEMA_DEPTH {
            return Err(CodecError::Custom(
                "type nesting too deep for placeholder".to_string(),
            ));
        }
        Ok(Placeholder {
            shape,
            depth: self.depth + 1,
        })
    }
}

macro_rules! placeholder_primitive {
    ($($method:ident => $visit:ident($($zero:expr)?);)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> CodecResult<V::Value> {
                visitor.$visit($($zero)?)
            }
        )*
    };
}

impl<'de, 'a> Deserializer<'de> for Placeholder<'a> {
    type Error = CodecError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> CodecResult<V::Value> {
        let op = match self.shape {
            Some(op) => op,
            None => return visitor.visit_unit(),
        };
        match op.op() {
            Operation::Leaf(kind) => match *kind {
                LeafKind::Boolean => visitor.visit_bool(false),
                LeafKind::String => visitor.visit_str(""),
                LeafKind::Int8 => visitor.visit_i8(0),
                LeafKind::Uint8 => visitor.visit_u8(0),
                LeafKind::Int16(_) => visitor.visit_i16(0),
                LeafKind::Int32(_) => visitor.visit_i32(0),
                LeafKind::Int64(_) => visitor.visit_i64(0),
                LeafKind::Uint16(_) => visitor.visit_u16(0),
                LeafKind::Uint32(_) => visitor.visit_u32(0),
                LeafKind::Uint64(_) => visitor.visit_u64(0),
                LeafKind::Float32(_) => visitor.visit_f32(0.0),
                LeafKind::Float64(_) => visitor.visit_f64(0.0),
            },
            Operation::Array(_) => visitor.visit_seq(PlaceholderSeq {
                remaining: 0,
                shape: None,
                depth: self.depth,
            }),
            Operation::Object(children) => visitor.visit_map(PlaceholderMap {
                names: Names::Children(children.keys()),
                parent: Some(op),
                next: None,
                depth: self.depth,
            }),
        }
    }

    placeholder_primitive! {
        deserialize_bool => visit_bool(false);
        deserialize_i8 => visit_i8(0);
        deserialize_i16 => visit_i16(0);
        deserialize_i32 => visit_i32(0);
        deserialize_i64 => visit_i64(0);
        deserialize_i128 => visit_i128(0);
        deserialize_u8 => visit_u8(0);
        deserialize_u16 => visit_u16(0);
        deserialize_u32 => visit_u32(0);
        deserialize_u64 => visit_u64(0);
        deserialize_u128 => visit_u128(0);
        deserialize_f32 => visit_f32(0.0);
        deserialize_f64 => visit_f64(0.0);
        deserialize_char => visit_char('\0');
        deserialize_str => visit_str("");
        deserialize_string => visit_str("");
        deserialize_bytes => visit_bytes(&[]);
        deserialize_byte_buf => visit_byte_buf(Vec::new());
        deserialize_option => visit_none();
        deserialize_unit => visit_unit();
        deserialize_identifier => visit_str("");
        deserialize_ignored_any => visit_unit();
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> CodecResult<V::Value> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> CodecResult<V::Value> {
        let inner = self.nested(self.shape)?;
        visitor.visit_newtype_struct(inner)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> CodecResult<V::Value> {
        visitor.visit_seq(PlaceholderSeq {
            remaining: 0,
            shape: None,
            depth: self.depth,
        })
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, len: usize, visitor: V) -> CodecResult<V::Value> {
        visitor.visit_seq(PlaceholderSeq {
            remaining: len,
            shape: self.shape.and_then(OpNode::item),
            depth: self.depth,
        })
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> CodecResult<V::Value> {
        self.deserialize_tuple(len, visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> CodecResult<V::Value> {
        match self.shape.and_then(OpNode::children) {
            Some(children) => visitor.visit_map(PlaceholderMap {
                names: Names::Children(children.keys()),
                parent: self.shape,
                next: None,
                depth: self.depth,
            }),
            None => visitor.visit_map(PlaceholderMap {
                names: Names::Fields(NO_FIELDS.iter()),
                parent: None,
                next: None,
                depth: self.depth,
            }),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> CodecResult<V::Value> {
        visitor.visit_map(PlaceholderMap {
            names: Names::Fields(fields.iter()),
            parent: self.shape,
            next: None,
            depth: self.depth,
        })
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> CodecResult<V::Value> {
        let variant = variants
            .first()
            .copied()
            .ok_or_else(|| CodecError::UnknownType(name.to_string()))?;
        visitor.visit_enum(EnumPlaceholder {
            variant,
            strict: None,
            depth: self.depth,
        })
    }
}

struct PlaceholderSeq<'a> {
    remaining: usize,
    shape: Option<&'a OpNode>,
    depth: usize,
}

impl<'de, 'a> SeqAccess<'de> for PlaceholderSeq<'a> {
    type Error = CodecError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> CodecResult<Option<T::Value>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        let inner = Placeholder {
            shape: self.shape,
            depth: self.depth,
        }
        .nested(self.shape)?;
        seed.deserialize(inner).map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.remaining)
    }
}

const NO_FIELDS: &[&str] = &[];

enum Names<'a> {
    Fields(std::slice::Iter<'static, &'static str>),
    Children(indexmap::map::Keys<'a, CompactString, OpNode>),
}

impl<'a> Iterator for Names<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        match self {
            Names::Fields(iter) => iter.next().copied(),
            Names::Children(iter) => iter.next().map(CompactString::as_str),
        }
    }
}

struct PlaceholderMap<'a> {
    names: Names<'a>,
    parent: Option<&'a OpNode>,
    next: Option<&'a OpNode>,
    depth: usize,
}

impl<'de, 'a> MapAccess<'de> for PlaceholderMap<'a> {
    type Error = CodecError;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> CodecResult<Option<K::Value>> {
        let name = match self.names.next() {
            Some(name) => name,
            None => return Ok(None),
        };
        self.next = self
            .parent
            .and_then(OpNode::children)
            .and_then(|children| children.get(name));
        seed.deserialize(key(name)).map(Some)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> CodecResult<V::Value> {
        let shape = self.next.take();
        let inner = Placeholder {
            shape,
            depth: self.depth,
        }
        .nested(shape)?;
        seed.deserialize(inner)
    }
}

/// 枚举占位：取第一个变体
///
/// `strict` 为枚举名时只接受单元变体，用于绑定字符串叶子。
struct EnumPlaceholder {
    variant: &'static str,
    strict: Option<&'static str>,
    depth: usize,
}

impl EnumPlaceholder {
    fn check_unit(&self) -> CodecResult<()> {
        match self.strict {
            Some(name) => Err(CodecError::UnknownType(format!("enum {}", name))),
            None => Ok(()),
        }
    }
}

impl<'de> EnumAccess<'de> for EnumPlaceholder {
    type Error = CodecError;
    type Variant = Self;

    fn variant_seed<V: DeserializeSeed<'de>>(self, seed: V) -> CodecResult<(V::Value, Self)> {
        let value = seed.deserialize(key(self.variant))?;
        Ok((value, self))
    }
}

impl<'de> VariantAccess<'de> for EnumPlaceholder {
    type Error = CodecError;

    fn unit_variant(self) -> CodecResult<()> {
        Ok(())
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> CodecResult<T::Value> {
        self.check_unit()?;
        seed.deserialize(Placeholder::new(self.depth + 1))
    }

    fn tuple_variant<V: Visitor<'de>>(self, len: usize, visitor: V) -> CodecResult<V::Value> {
        self.check_unit()?;
        visitor.visit_seq(PlaceholderSeq {
            remaining: len,
            shape: None,
            depth: self.depth + 1,
        })
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> CodecResult<V::Value> {
        self.check_unit()?;
        visitor.visit_map(PlaceholderMap {
            names: Names::Fields(fields.iter()),
            parent: None,
            next: None,
            depth: self.depth + 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;
    use crate::value::Value;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::collections::HashMap;

    fn root(schema: serde_json::Value) -> OpNode {
        Compiler::default().compile(&schema).unwrap().1
    }

    fn info() -> OpNode {
        root(json!({
            "type": "object",
            "properties": {
                "name": "string",
                "area": "uint32le",
                "tags": {"type": "array", "items": "string"}
            },
            "order": ["name", "area", "tags"]
        }))
    }

    #[allow(dead_code)]
    #[derive(Serialize, Deserialize)]
    struct Info {
        area: u64,
        #[serde(rename = "name")]
        title: String,
        tags: Option<Vec<String>>,
        note: String,
        #[serde(skip)]
        cache: u32,
    }

    #[test]
    fn test_bind_record() {
        let op = build::<Info>(&info()).unwrap();
        assert_eq!(op.type_name(), Some("Info"));
        assert_eq!(op.unbound(), ["note"]);
        assert_eq!(op.child(0).map(|c| &c.kind), Some(&StructKind::Leaf));
        assert_eq!(op.child(1).map(|c| &c.kind), Some(&StructKind::Leaf));

        let tags = op.child(2).unwrap();
        assert!(tags.optional);
        assert_eq!(tags.item().map(|i| &i.kind), Some(&StructKind::Leaf));
    }

    #[allow(dead_code)]
    #[derive(Serialize, Deserialize)]
    struct Partial {
        name: String,
    }

    #[test]
    fn test_missing_field() {
        let err = build::<Partial>(&info()).unwrap_err();
        assert!(matches!(
            err,
            CodecError::StructFieldNonExist { ref type_name, ref field }
                if type_name == "Partial" && field == "area"
        ));
    }

    #[allow(dead_code)]
    #[derive(Serialize, Deserialize)]
    struct WrongLeaf {
        name: String,
        area: f32,
        tags: Vec<String>,
    }

    #[test]
    fn test_incompatible_leaf() {
        assert!(matches!(
            build::<WrongLeaf>(&info()),
            Err(CodecError::WrongType { expected: "uint32", .. })
        ));
    }

    #[allow(dead_code)]
    #[derive(Serialize, Deserialize)]
    enum Color {
        Red,
        Green,
    }

    #[allow(dead_code)]
    #[derive(Serialize, Deserialize)]
    struct Paint {
        name: Color,
        area: u32,
        tags: HashMap<String, String>,
    }

    #[test]
    fn test_enum_and_map_against_schema() {
        assert!(matches!(
            build::<Paint>(&info()),
            Err(CodecError::WrongType { expected: "array", .. })
        ));

        let op = root(json!({
            "type": "object",
            "properties": {
                "name": "string",
                "area": "uint32le",
                "tags": {"type": "object", "properties": {"a": "string"}, "order": ["a"]}
            },
            "order": ["name", "area", "tags"]
        }));
        let bound = build::<Paint>(&op).unwrap();
        assert_eq!(bound.child(0).map(|c| &c.kind), Some(&StructKind::Leaf));
        assert_eq!(bound.child(2).map(|c| &c.kind), Some(&StructKind::Dynamic));
    }

    #[allow(dead_code)]
    #[derive(Serialize, Deserialize)]
    enum Shape {
        Circle(f64),
    }

    #[allow(dead_code)]
    #[derive(Serialize, Deserialize)]
    struct Drawing {
        name: Shape,
        area: u32,
        tags: Vec<String>,
    }

    #[test]
    fn test_data_enum_rejected() {
        assert!(matches!(
            build::<Drawing>(&info()),
            Err(CodecError::UnknownType(t)) if t == "enum Shape"
        ));
    }

    #[test]
    fn test_dynamic_roots() {
        assert_eq!(build::<Value>(&info()).unwrap().kind, StructKind::Dynamic);
        assert_eq!(
            build::<serde_json::Value>(&info()).unwrap().kind,
            StructKind::Dynamic
        );
        assert!(matches!(
            build::<Vec<u8>>(&info()),
            Err(CodecError::WrongType { expected: "object", .. })
        ));
    }

    #[allow(dead_code)]
    #[derive(Serialize, Deserialize)]
    struct Node {
        label: String,
        children: Vec<Node>,
        parent: Option<Box<Node>>,
    }

    #[test]
    fn test_recursive_type() {
        let op = root(json!({
            "type": "object",
            "properties": {
                "label": "string",
                "children": {
                    "type": "array",
                    "items": {"type": "object", "properties": {"label": "string"}, "order": ["label"]}
                }
            },
            "order": ["label", "children"]
        }));
        let bound = build::<Node>(&op).unwrap();
        assert_eq!(bound.unbound(), ["parent"]);
        let item = bound.child(1).and_then(StructOp::item).unwrap();
        assert_eq!(item.unbound(), ["children", "parent"]);
    }

    #[derive(Serialize, Deserialize)]
    struct Base {
        name: String,
    }

    #[derive(Serialize, Deserialize)]
    struct Flat {
        #[serde(flatten)]
        base: Base,
    }

    #[derive(Serialize, Deserialize)]
    struct FlatFull {
        area: u32,
        #[serde(flatten)]
        base: Base,
    }

    fn named() -> OpNode {
        root(json!({
            "type": "object",
            "properties": {"name": "string", "area": "uint32le"},
            "order": ["name", "area"]
        }))
    }

    #[test]
    fn test_flattened_record_missing_field() {
        assert!(matches!(
            build::<Flat>(&named()),
            Err(CodecError::StructFieldNonExist { ref type_name, ref field })
                if type_name == "Flat" && field == "area"
        ));
    }

    #[test]
    fn test_flattened_record_bound() {
        let op = build::<FlatFull>(&named()).unwrap();
        assert_eq!(op.flattened(), Some("FlatFull"));
        assert_eq!(op.child(0).map(|c| &c.kind), Some(&StructKind::Dynamic));
        assert_eq!(op.child(1).map(|c| &c.kind), Some(&StructKind::Leaf));
        assert!(op.unbound().is_empty());

        // 真正的映射仍按名称解析
        let map = build::<HashMap<String, String>>(&named()).unwrap();
        assert_eq!(map.kind, StructKind::Dynamic);
        assert_eq!(map.flattened(), None);
    }

    #[test]
    fn test_placeholder_values() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Inner {
            a: u8,
            b: Option<String>,
            c: [u16; 2],
            d: (bool, char),
        }
        let inner = Inner::deserialize(Placeholder::new(0)).unwrap();
        assert_eq!(
            inner,
            Inner {
                a: 0,
                b: None,
                c: [0, 0],
                d: (false, '\0'),
            }
        );
    }
}
