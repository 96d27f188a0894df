//! 模式定义模块
//!
//! [`SchemaNode`] 是面向用户的模式描述，[`LeafKind`] 是叶子节点的线上类型。
//! 所有输入形式最终都先规范化为 `serde_json::Value`，再交给编译器校验。

use crate::compiler::Compiler;
use crate::SchemaResult;
use indexmap::IndexMap;
use jsonpack_common::ByteOrder;
use serde_json::json;
use std::fmt;

/// 叶子节点的线上类型
///
/// 多字节数值携带字节序，单字节类型没有字节序。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeafKind {
    Boolean,
    String,
    Int8,
    Uint8,
    Int16(ByteOrder),
    Int32(ByteOrder),
    Int64(ByteOrder),
    Uint16(ByteOrder),
    Uint32(ByteOrder),
    Uint64(ByteOrder),
    Float32(ByteOrder),
    Float64(ByteOrder),
}

impl LeafKind {
    /// 解析类型名
    ///
    /// # Brief
    /// 大小写不敏感；多字节数值可带 `le` / `be` 后缀，缺省为小端；
    /// 接受 `bool`、`float`、`double` 等别名
    ///
    /// # Arguments
    /// * `name` - 模式中 `type` 的取值
    ///
    /// # Returns
    /// 未知类型名返回 `None`
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        match name.as_str() {
            "bool" | "boolean" => return Some(LeafKind::Boolean),
            "string" => return Some(LeafKind::String),
            "int8" => return Some(LeafKind::Int8),
            "uint8" => return Some(LeafKind::Uint8),
            _ => {}
        }
        // "double" 本身以 "le" 结尾，先按完整名称匹配
        if let Some(kind) = Self::numeric(&name, ByteOrder::Little) {
            return Some(kind);
        }
        let split = name.len().checked_sub(2)?;
        let order = ByteOrder::from_suffix(name.get(split..)?)?;
        Self::numeric(&name[..split], order)
    }

    fn numeric(base: &str, order: ByteOrder) -> Option<Self> {
        Some(match base {
            "int16" => LeafKind::Int16(order),
            "int32" => LeafKind::Int32(order),
            "int64" => LeafKind::Int64(order),
            "uint16" => LeafKind::Uint16(order),
            "uint32" => LeafKind::Uint32(order),
            "uint64" => LeafKind::Uint64(order),
            "float" | "float32" => LeafKind::Float32(order),
            "double" | "float64" => LeafKind::Float64(order),
            _ => return None,
        })
    }

    /// 不带字节序后缀的类型名
    pub fn label(&self) -> &'static str {
        match self {
            LeafKind::Boolean => "boolean",
            LeafKind::String => "string",
            LeafKind::Int8 => "int8",
            LeafKind::Uint8 => "uint8",
            LeafKind::Int16(_) => "int16",
            LeafKind::Int32(_) => "int32",
            LeafKind::Int64(_) => "int64",
            LeafKind::Uint16(_) => "uint16",
            LeafKind::Uint32(_) => "uint32",
            LeafKind::Uint64(_) => "uint64",
            LeafKind::Float32(_) => "float32",
            LeafKind::Float64(_) => "float64",
        }
    }

    pub fn byte_order(&self) -> Option<ByteOrder> {
        match *self {
            LeafKind::Int16(o)
            | LeafKind::Int32(o)
            | LeafKind::Int64(o)
            | LeafKind::Uint16(o)
            | LeafKind::Uint32(o)
            | LeafKind::Uint64(o)
            | LeafKind::Float32(o)
            | LeafKind::Float64(o) => Some(o),
            _ => None,
        }
    }

    /// 定宽类型的字节数，字符串返回 `None`
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            LeafKind::String => None,
            LeafKind::Boolean | LeafKind::Int8 | LeafKind::Uint8 => Some(1),
            LeafKind::Int16(_) | LeafKind::Uint16(_) => Some(2),
            LeafKind::Int32(_) | LeafKind::Uint32(_) | LeafKind::Float32(_) => Some(4),
            LeafKind::Int64(_) | LeafKind::Uint64(_) | LeafKind::Float64(_) => Some(8),
        }
    }

    /// 线上最小字节数，字符串至少有一个字节的长度前缀
    pub fn min_size(&self) -> usize {
        self.fixed_size().unwrap_or(1)
    }

    pub fn is_integer(&self) -> bool {
        !matches!(
            self,
            LeafKind::Boolean | LeafKind::String | LeafKind::Float32(_) | LeafKind::Float64(_)
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, LeafKind::Float32(_) | LeafKind::Float64(_))
    }
}

/// 规范类型名，多字节数值带字节序后缀，如 `uint32le`
impl fmt::Display for LeafKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.byte_order() {
            Some(order) => write!(f, "{}{}", self.label(), order.suffix()),
            None => f.write_str(self.label()),
        }
    }
}

/// 模式树
///
/// 对象的 `order` 是 `properties` 键的一个排列，线上顺序严格等于 `order`。
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Object {
        properties: IndexMap<String, SchemaNode>,
        order: Vec<String>,
    },
    Array {
        items: Box<SchemaNode>,
    },
    Leaf(LeafKind),
}

impl SchemaNode {
    /// 按给定顺序构造对象节点，`order` 与属性插入顺序一致
    pub fn object<I, K>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, SchemaNode)>,
        K: Into<String>,
    {
        let properties: IndexMap<String, SchemaNode> = properties
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .collect();
        let order = properties.keys().cloned().collect();
        SchemaNode::Object { properties, order }
    }

    pub fn array(items: SchemaNode) -> Self {
        SchemaNode::Array {
            items: Box::new(items),
        }
    }

    pub fn leaf(kind: LeafKind) -> Self {
        SchemaNode::Leaf(kind)
    }

    /// 从 JSON 描述解析并校验
    pub fn from_json(json: &serde_json::Value) -> SchemaResult<Self> {
        Compiler::default().parse(json)
    }

    /// 转换回 JSON 描述
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            SchemaNode::Object { properties, order } => {
                let props: serde_json::Map<String, serde_json::Value> = properties
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect();
                json!({
                    "type": "object",
                    "properties": props,
                    "order": order,
                })
            }
            SchemaNode::Array { items } => json!({
                "type": "array",
                "items": items.to_json(),
            }),
            SchemaNode::Leaf(kind) => json!({ "type": kind.to_string() }),
        }
    }

    /// 属性或数组元素的直接子节点
    pub fn child(&self, name: &str) -> Option<&SchemaNode> {
        match self {
            SchemaNode::Object { properties, .. } => properties.get(name),
            SchemaNode::Array { items } => Some(items),
            SchemaNode::Leaf(_) => None,
        }
    }
}

/// 可以作为模式描述的输入
///
/// 文本、JSON 值与 [`SchemaNode`] 都先规范化为 JSON 映射。
pub trait SchemaSource {
    fn into_json(self) -> SchemaResult<serde_json::Value>;
}

impl SchemaSource for &str {
    fn into_json(self) -> SchemaResult<serde_json::Value> {
        Ok(serde_json::from_str(self)?)
    }
}

impl SchemaSource for &String {
    fn into_json(self) -> SchemaResult<serde_json::Value> {
        self.as_str().into_json()
    }
}

impl SchemaSource for String {
    fn into_json(self) -> SchemaResult<serde_json::Value> {
        self.as_str().into_json()
    }
}

impl SchemaSource for &[u8] {
    fn into_json(self) -> SchemaResult<serde_json::Value> {
        Ok(serde_json::from_slice(self)?)
    }
}

impl SchemaSource for serde_json::Value {
    fn into_json(self) -> SchemaResult<serde_json::Value> {
        Ok(self)
    }
}

impl SchemaSource for &serde_json::Value {
    fn into_json(self) -> SchemaResult<serde_json::Value> {
        Ok(self.clone())
    }
}

impl SchemaSource for serde_json::Map<String, serde_json::Value> {
    fn into_json(self) -> SchemaResult<serde_json::Value> {
        Ok(serde_json::Value::Object(self))
    }
}

impl SchemaSource for SchemaNode {
    fn into_json(self) -> SchemaResult<serde_json::Value> {
        Ok(self.to_json())
    }
}

impl SchemaSource for &SchemaNode {
    fn into_json(self) -> SchemaResult<serde_json::Value> {
        Ok(self.to_json())
    }
}
