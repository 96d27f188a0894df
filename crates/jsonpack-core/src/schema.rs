//! 编译后的模式
//!
//! [`Schema`] 持有操作树、规范化的模式文本与按类型缓存的结构体绑定，
//! 是编码/解码的入口，也是错误唯一被包装为 [`PackError`] 的位置。

use crate::binder::{self, StructOp};
use crate::buffer::{Buffer, Reader};
use crate::compiler::Compiler;
use crate::definition::{SchemaNode, SchemaSource};
use crate::operation::OpNode;
use crate::value::Value;
use crate::{de, ser, CodecError, CodecResult, PackError, PackResult, SchemaResult};
use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use jsonpack_common::{Limits, PackConfig};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// 可以按模式编码/解码的类型
///
/// `Value` 走动态路径，其余类型经结构体绑定后走 serde 路径。
pub trait Record: Serialize + DeserializeOwned + 'static {}

impl<T: Serialize + DeserializeOwned + 'static> Record for T {}

pub struct Schema {
    name: String,
    text: String,
    definition: SchemaNode,
    root: OpNode,
    limits: Limits,
    encode_buffer_size: AtomicUsize,
    bindings: DashMap<TypeId, Arc<StructOp>>,
}

impl Schema {
    /// 使用默认配置编译模式
    pub fn compile(name: impl Into<String>, source: impl SchemaSource) -> PackResult<Self> {
        Self::compile_with(name, source, &PackConfig::default())
    }

    /// 编译模式
    ///
    /// # Arguments
    /// * `name` - 模式名称，出现在错误信息中
    /// * `source` - 模式描述：JSON 文本、JSON 值或 [`SchemaNode`]
    /// * `config` - 嵌套深度、解码上限与初始编码缓冲区大小
    ///
    /// # Returns
    /// 校验失败返回 `PackError::Compile`
    pub fn compile_with(
        name: impl Into<String>,
        source: impl SchemaSource,
        config: &PackConfig,
    ) -> PackResult<Self> {
        let name = name.into();
        let compiled = (|| -> SchemaResult<_> {
            let json = source.into_json()?;
            let (definition, root) = Compiler::new(config.max_schema_depth).compile(&json)?;
            let text = serde_json::to_string(&definition.to_json())?;
            Ok((definition, root, text))
        })();
        let (definition, root, text) = compiled.map_err(|source| PackError::Compile {
            name: name.clone(),
            source,
        })?;

        debug!("Compiled schema {}: min size {} bytes", name, root.min_size());

        Ok(Self {
            name,
            text,
            definition,
            root,
            limits: config.limits(),
            encode_buffer_size: AtomicUsize::new(config.encode_buffer_size),
            bindings: DashMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 规范化的模式文本，属性名按字典序排列
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn definition(&self) -> &SchemaNode {
        &self.definition
    }

    pub fn root(&self) -> &OpNode {
        &self.root
    }

    /// 新编码缓冲区的初始容量
    ///
    /// 每次编码后提升到见过的最大输出长度。
    pub fn encode_buffer_size(&self) -> usize {
        self.encode_buffer_size.load(Ordering::Relaxed)
    }

    pub fn set_encode_buffer_size(&self, size: usize) {
        self.encode_buffer_size.store(size, Ordering::Relaxed);
    }

    /// 已缓存绑定的类型数量
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// 获取类型 `T` 的绑定，首次调用时构建并缓存
    ///
    /// # Brief
    /// 并发的首次调用可能各自构建一次，先插入者胜出；构建失败不缓存
    pub fn struct_op<T: Record>(&self) -> CodecResult<Arc<StructOp>> {
        let id = TypeId::of::<T>();
        if let Some(op) = self.bindings.get(&id) {
            return Ok(Arc::clone(op.value()));
        }
        let op = Arc::new(binder::build::<T>(&self.root)?);
        debug!("Bound {} to schema {}", std::any::type_name::<T>(), self.name);
        Ok(Arc::clone(self.bindings.entry(id).or_insert(op).value()))
    }

    /// 编码
    ///
    /// # Brief
    /// `Value` 走动态路径，其余类型走结构体路径，两条路径输出逐字节相同。
    /// 缺失的属性、`None` 与 `Value::Null` 都写出该节点的零值，
    /// 解码端无法区分缺失与零值
    ///
    /// # Arguments
    /// * `value` - 待编码的值
    ///
    /// # Returns
    /// 编码后的字节
    pub fn encode<T: Record>(&self, value: &T) -> PackResult<Bytes> {
        let mut buf = Buffer::with_capacity(self.encode_buffer_size());
        self.write(value, &mut buf).map_err(|e| self.encode_error(e))?;
        self.encode_buffer_size.fetch_max(buf.len(), Ordering::Relaxed);
        Ok(buf.seal())
    }

    pub fn encode_value(&self, value: &Value) -> PackResult<Bytes> {
        self.encode(value)
    }

    /// 编码到调用方提供的内存，`out` 原有内容被替换
    pub fn encode_to<T: Record>(&self, value: &T, out: &mut BytesMut) -> PackResult<()> {
        let mut buf = Buffer::from_bytes_mut(std::mem::take(out));
        let result = self.write(value, &mut buf);
        *out = buf.into_bytes_mut();
        result.map_err(|e| self.encode_error(e))?;
        self.encode_buffer_size.fetch_max(out.len(), Ordering::Relaxed);
        Ok(())
    }

    fn write<T: Record>(&self, value: &T, buf: &mut Buffer) -> CodecResult<()> {
        if let Some(value) = (value as &dyn Any).downcast_ref::<Value>() {
            return self.root.encode_value(buf, Some(value));
        }
        let bind = self.struct_op::<T>()?;
        ser::to_buffer(value, &self.root, Some(&*bind), buf)
    }

    /// 解码为类型 `T`
    ///
    /// # Brief
    /// 结构体中模式之外的字段取零值；`Option` 字段总是得到 `Some`。
    /// 输入末尾多余的字节被忽略
    pub fn decode<T: Record>(&self, data: &[u8]) -> PackResult<T> {
        if TypeId::of::<T>() == TypeId::of::<Value>() {
            let value: Box<dyn Any> = Box::new(self.decode_value(data)?);
            return value.downcast::<T>().map(|v| *v).map_err(|_| {
                self.decode_error(CodecError::UnknownType(std::any::type_name::<T>().to_string()))
            });
        }
        let mut reader = Reader::with_limits(data, self.limits);
        let result = self
            .struct_op::<T>()
            .and_then(|bind| de::from_reader::<T>(&mut reader, &self.root, Some(&*bind)));
        result.map_err(|e| self.decode_error(e))
    }

    /// 解码到已有的记录
    ///
    /// # Brief
    /// 通过 `Deserialize::deserialize_in_place` 写入 `dest`，
    /// `Vec`、`String` 等支持原地反序列化的类型保留已有容量。
    /// 出错时 `dest` 可能只被写入了一部分
    pub fn decode_into_record<T: Record>(&self, data: &[u8], dest: &mut T) -> PackResult<()> {
        if let Some(dest) = (&mut *dest as &mut dyn Any).downcast_mut::<Value>() {
            return self.decode_into(data, dest);
        }
        let mut reader = Reader::with_limits(data, self.limits);
        let result = self.struct_op::<T>().and_then(|bind| {
            T::deserialize_in_place(
                de::Deserializer::new(&mut reader, &self.root, Some(&*bind)),
                dest,
            )
        });
        result.map_err(|e| self.decode_error(e))
    }

    pub fn decode_value(&self, data: &[u8]) -> PackResult<Value> {
        let mut reader = Reader::with_limits(data, self.limits);
        self.root
            .decode_value(&mut reader)
            .map_err(|e| self.decode_error(e))
    }

    /// 解码到已有的值，同类型的容器被复用
    ///
    /// 出错时 `dest` 可能只被写入了一部分。
    pub fn decode_into(&self, data: &[u8], dest: &mut Value) -> PackResult<()> {
        let mut reader = Reader::with_limits(data, self.limits);
        self.root
            .decode_value_into(&mut reader, dest)
            .map_err(|e| self.decode_error(e))
    }

    fn encode_error(&self, source: CodecError) -> PackError {
        PackError::Encode {
            name: self.name.clone(),
            source,
        }
    }

    fn decode_error(&self, source: CodecError) -> PackError {
        PackError::Decode {
            name: self.name.clone(),
            source,
        }
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("text", &self.text)
            .field("bindings", &self.bindings.len())
            .finish()
    }
}
