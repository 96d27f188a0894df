//! 模式注册表
//!
//! [`Packer`] 按名称持有编译后的模式，并提供按名称编码/解码的便捷方法。
//! 注册表是普通的值，可以有任意多个实例。

use crate::definition::{SchemaNode, SchemaSource};
use crate::schema::{Record, Schema};
use crate::value::Value;
use crate::{PackError, PackResult};
use bytes::{Bytes, BytesMut};
use jsonpack_common::{ByteOrder, PackConfig};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
pub struct Packer {
    config: PackConfig,
    schemas: RwLock<HashMap<String, Arc<Schema>>>,
}

impl Packer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PackConfig) -> Self {
        Self {
            config,
            schemas: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &PackConfig {
        &self.config
    }

    /// 编译并注册模式
    ///
    /// # Brief
    /// 同名模式只有在新模式编译成功后才会被替换
    ///
    /// # Arguments
    /// * `name` - 模式名称
    /// * `source` - 模式描述
    ///
    /// # Returns
    /// 注册后的模式
    pub fn add_schema(&self, name: &str, source: impl SchemaSource) -> PackResult<Arc<Schema>> {
        let schema = Arc::new(Schema::compile_with(name, source, &self.config)?);
        let replaced = self
            .schemas
            .write()
            .insert(name.to_string(), Arc::clone(&schema))
            .is_some();
        debug!("Registered schema {} (replaced: {})", name, replaced);
        Ok(schema)
    }

    /// 从类型 `T` 推导模式并注册，整数使用配置中的 `default_byte_order`
    pub fn add_schema_from<T: Record>(&self, name: &str) -> PackResult<Arc<Schema>> {
        self.add_schema_from_with_order::<T>(name, self.config.default_byte_order)
    }

    pub fn add_schema_from_with_order<T: Record>(
        &self,
        name: &str,
        order: ByteOrder,
    ) -> PackResult<Arc<Schema>> {
        let node = SchemaNode::derive::<T>(order).map_err(|source| PackError::Compile {
            name: name.to_string(),
            source,
        })?;
        self.add_schema(name, node)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Schema>> {
        self.schemas.read().get(name).cloned()
    }

    /// 获取模式，不存在时返回 `PackError::SchemaNotFound`
    pub fn schema(&self, name: &str) -> PackResult<Arc<Schema>> {
        self.get(name)
            .ok_or_else(|| PackError::SchemaNotFound(name.to_string()))
    }

    pub fn remove(&self, name: &str) -> PackResult<()> {
        match self.schemas.write().remove(name) {
            Some(_) => {
                debug!("Removed schema {}", name);
                Ok(())
            }
            None => Err(PackError::SchemaNotFound(name.to_string())),
        }
    }

    /// 移除所有模式
    pub fn reset(&self) {
        let mut schemas = self.schemas.write();
        debug!("Resetting registry with {} schemas", schemas.len());
        schemas.clear();
    }

    /// 已注册的模式名称，按字典序排列
    pub fn schema_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schemas.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn definition(&self, name: &str) -> PackResult<SchemaNode> {
        Ok(self.schema(name)?.definition().clone())
    }

    pub fn definition_text(&self, name: &str) -> PackResult<String> {
        Ok(self.schema(name)?.text().to_string())
    }

    /// 所有已注册的模式，按名称排列
    pub fn schemas(&self) -> Vec<Arc<Schema>> {
        let mut schemas: Vec<Arc<Schema>> = self.schemas.read().values().cloned().collect();
        schemas.sort_by(|a, b| a.name().cmp(b.name()));
        schemas
    }

    pub fn all_definitions(&self) -> BTreeMap<String, SchemaNode> {
        self.schemas
            .read()
            .iter()
            .map(|(name, schema)| (name.clone(), schema.definition().clone()))
            .collect()
    }

    pub fn all_definition_texts(&self) -> BTreeMap<String, String> {
        self.schemas
            .read()
            .iter()
            .map(|(name, schema)| (name.clone(), schema.text().to_string()))
            .collect()
    }

    pub fn encode<T: Record>(&self, name: &str, value: &T) -> PackResult<Bytes> {
        self.schema(name)?.encode(value)
    }

    /// 编码到调用方的缓冲区，见 [`Schema::encode_to`]
    pub fn encode_to<T: Record>(&self, name: &str, value: &T, out: &mut BytesMut) -> PackResult<()> {
        self.schema(name)?.encode_to(value, out)
    }

    pub fn encode_value(&self, name: &str, value: &Value) -> PackResult<Bytes> {
        self.schema(name)?.encode_value(value)
    }

    pub fn decode<T: Record>(&self, name: &str, data: &[u8]) -> PackResult<T> {
        self.schema(name)?.decode(data)
    }

    pub fn decode_value(&self, name: &str, data: &[u8]) -> PackResult<Value> {
        self.schema(name)?.decode_value(data)
    }

    pub fn decode_into(&self, name: &str, data: &[u8], dest: &mut Value) -> PackResult<()> {
        self.schema(name)?.decode_into(data, dest)
    }

    pub fn decode_into_record<T: Record>(&self, name: &str, data: &[u8], dest: &mut T) -> PackResult<()> {
        self.schema(name)?.decode_into_record(data, dest)
    }
}
