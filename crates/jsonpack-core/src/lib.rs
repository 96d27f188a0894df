//! # jsonpack - 模式驱动的二进制编解码
//!
//! 先把 JSON 形状的模式描述编译成操作树，之后按模式反复编码/解码。
//! 输出不含属性名、不含类型标记，布局完全由模式决定：
//!
//! - **紧凑**：对象没有任何包裹，属性按 `order` 顺序内联写出
//! - **双路径**：`Value` 动态值与带 serde 的结构体产生逐字节相同的输出
//! - **绑定缓存**：每个具体类型只绑定一次，之后直接复用
//!
//! ## 快速开始
//!
//! ```rust,ignore
//! use jsonpack_core::{Packer, Value};
//!
//! let packer = Packer::new();
//! packer.add_schema("info", r#"{
//!     "type": "object",
//!     "properties": {"name": {"type": "string"}, "area": {"type": "uint32le"}},
//!     "order": ["name", "area"]
//! }"#)?;
//!
//! let value = Value::from(serde_json::json!({"name": "ab", "area": 888}));
//! let bytes = packer.encode_value("info", &value)?;
//! assert_eq!(&bytes[..], &[0x02, b'a', b'b', 0x78, 0x03, 0x00, 0x00]);
//! ```

pub mod binder;
pub mod buffer;
pub mod compiler;
pub mod de;
pub mod definition;
pub mod derive;
pub mod operation;
pub mod registry;
pub mod schema;
pub mod ser;
pub mod value;

pub use buffer::{Buffer, BufferError, Reader};
pub use definition::{LeafKind, SchemaNode, SchemaSource};
pub use jsonpack_common::{ByteOrder, Limits, PackConfig};
pub use operation::{OpNode, Operation};
pub use registry::Packer;
pub use schema::{Record, Schema};
pub use value::{Map, Value};

use thiserror::Error;

/// 模式编译错误
///
/// 描述模式定义本身的结构问题，编译失败的模式永远不会被注册
#[derive(Error, Debug)]
pub enum SchemaError {
    /// 模式文本不是合法 JSON
    #[error("invalid schema JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// 缺少 `type` 属性或其值不是字符串
    #[error("'type' property non-exist or invalid")]
    MissingType,

    /// 顶层类型只能是 object 或 array
    #[error("top-level type needs to be 'object' or 'array', got '{0}'")]
    InvalidRootType(String),

    #[error("'properties' property non-exist or invalid")]
    MissingProperties,

    #[error("'order' property non-exist or invalid")]
    MissingOrder,

    #[error("'items' property non-exist or invalid")]
    MissingItems,

    /// `order` 引用了未定义的属性
    #[error("'order' refers to undefined property '{0}'")]
    UndefinedProperty(String),

    /// 属性已定义但没有出现在 `order` 中
    #[error("property '{0}' is missing from 'order'")]
    UnorderedProperty(String),

    #[error("property '{0}' appears more than once in 'order'")]
    DuplicateOrder(String),

    /// 未知的叶子类型名
    #[error("unknown data type '{0}'")]
    UnknownType(String),

    /// 属性定义不是对象，也不是类型名简写
    #[error("definition of '{0}' needs to be an object or a type name")]
    InvalidDefinition(String),

    /// 嵌套层级过深
    #[error("schema nesting too deep: max {0}")]
    TooDeep(usize),

    /// 无法从结构体类型推导模式
    #[error("cannot derive schema: {0}")]
    Derive(String),
}

/// 编码/解码遍历过程中的错误
#[derive(Error, Debug)]
pub enum CodecError {
    /// 值的形状与模式节点不符
    #[error("wrong data type '{actual}', want {expected}")]
    WrongType { expected: &'static str, actual: String },

    /// 叶子值无法转换为模式声明的类型
    #[error("got data of type {actual} but wanted {expected}")]
    TypeAssertion { expected: &'static str, actual: String },

    /// 结构体缺少模式要求的字段
    #[error("struct {type_name} doesn't contain required field: '{field}'")]
    StructFieldNonExist { type_name: String, field: String },

    /// 同一对象中同名属性出现多次
    #[error("property '{0}' is provided more than once")]
    AmbiguousField(String),

    /// serde 数据模型中无法映射到模式的类型
    #[error("unknown data type '{0}'")]
    UnknownType(String),

    #[error("sequence declared {declared} elements but produced {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error(transparent)]
    Buffer(#[from] BufferError),

    /// serde 实现产生的自定义错误
    #[error("{0}")]
    Custom(String),
}

/// 对外错误类型，包装模式名与底层原因
#[derive(Error, Debug)]
pub enum PackError {
    #[error("compiling '{name}' got error: {source}")]
    Compile { name: String, source: SchemaError },

    #[error("encode with schema definition '{name}' got error: {source}")]
    Encode { name: String, source: CodecError },

    #[error("decode with schema definition '{name}' got error: {source}")]
    Decode { name: String, source: CodecError },

    #[error("schema definition '{0}' does not exist")]
    SchemaNotFound(String),
}

impl PackError {
    /// 编码/解码失败时的底层原因
    pub fn codec_error(&self) -> Option<&CodecError> {
        match self {
            PackError::Encode { source, .. } | PackError::Decode { source, .. } => Some(source),
            _ => None,
        }
    }

    /// 编译失败时的底层原因
    pub fn schema_error(&self) -> Option<&SchemaError> {
        match self {
            PackError::Compile { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type SchemaResult<T> = Result<T, SchemaError>;
pub type CodecResult<T> = Result<T, CodecError>;
pub type PackResult<T> = Result<T, PackError>;
