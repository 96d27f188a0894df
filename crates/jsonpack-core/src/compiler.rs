//! 模式编译器
//!
//! 两个阶段：`parse` 把 JSON 描述校验为 [`SchemaNode`]，`lower` 把模式树转换为操作树。

use crate::definition::{LeafKind, SchemaNode};
use crate::operation::{OpNode, Operation};
use crate::{SchemaError, SchemaResult};
use compact_str::CompactString;
use indexmap::IndexMap;
use jsonpack_common::MAX_SCHEMA_DEPTH;
use serde_json::Value as Json;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct Compiler {
    max_depth: usize,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(MAX_SCHEMA_DEPTH)
    }
}

impl Compiler {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// 编译 JSON 描述
    ///
    /// # Returns
    /// 校验后的模式树与对应的操作树根节点
    pub fn compile(&self, json: &Json) -> SchemaResult<(SchemaNode, OpNode)> {
        let node = self.parse(json)?;
        let root = lower("", &node);
        Ok((node, root))
    }

    /// 校验 JSON 描述，顶层必须是 object 或 array
    pub fn parse(&self, json: &Json) -> SchemaResult<SchemaNode> {
        let map = json.as_object().ok_or(SchemaError::MissingType)?;
        let ty = map
            .get("type")
            .and_then(Json::as_str)
            .ok_or(SchemaError::MissingType)?
            .to_ascii_lowercase();
        match ty.as_str() {
            "object" => self.parse_object(map, 1),
            "array" => self.parse_array(map, 1),
            _ => Err(SchemaError::InvalidRootType(ty)),
        }
    }

    fn parse_node(&self, name: &str, json: &Json, depth: usize) -> SchemaResult<SchemaNode> {
        if depth > self.max_depth {
            return Err(SchemaError::TooDeep(self.max_depth));
        }
        match json {
            // 简写：属性值直接给出类型名
            Json::String(ty) => match LeafKind::parse(ty) {
                Some(kind) => Ok(SchemaNode::Leaf(kind)),
                None if ty.eq_ignore_ascii_case("object") => Err(SchemaError::MissingProperties),
                None if ty.eq_ignore_ascii_case("array") => Err(SchemaError::MissingItems),
                None => Err(SchemaError::UnknownType(ty.clone())),
            },
            Json::Object(map) => {
                let ty = map
                    .get("type")
                    .and_then(Json::as_str)
                    .ok_or(SchemaError::MissingType)?;
                if ty.eq_ignore_ascii_case("object") {
                    self.parse_object(map, depth)
                } else if ty.eq_ignore_ascii_case("array") {
                    self.parse_array(map, depth)
                } else {
                    LeafKind::parse(ty)
                        .map(SchemaNode::Leaf)
                        .ok_or_else(|| SchemaError::UnknownType(ty.to_string()))
                }
            }
            _ => Err(SchemaError::InvalidDefinition(name.to_string())),
        }
    }

    fn parse_object(
        &self,
        map: &serde_json::Map<String, Json>,
        depth: usize,
    ) -> SchemaResult<SchemaNode> {
        let properties = map
            .get("properties")
            .and_then(Json::as_object)
            .ok_or(SchemaError::MissingProperties)?;
        let order = map
            .get("order")
            .and_then(Json::as_array)
            .ok_or(SchemaError::MissingOrder)?
            .iter()
            .map(|v| v.as_str().map(str::to_string).ok_or(SchemaError::MissingOrder))
            .collect::<SchemaResult<Vec<String>>>()?;

        let mut seen = HashSet::with_capacity(order.len());
        for name in &order {
            if !seen.insert(name.as_str()) {
                return Err(SchemaError::DuplicateOrder(name.clone()));
            }
            if !properties.contains_key(name) {
                return Err(SchemaError::UndefinedProperty(name.clone()));
            }
        }
        if let Some(name) = properties.keys().find(|k| !seen.contains(k.as_str())) {
            return Err(SchemaError::UnorderedProperty(name.clone()));
        }

        let mut children = IndexMap::with_capacity(order.len());
        for name in &order {
            let child = self.parse_node(name, &properties[name.as_str()], depth + 1)?;
            children.insert(name.clone(), child);
        }
        Ok(SchemaNode::Object {
            properties: children,
            order,
        })
    }

    fn parse_array(
        &self,
        map: &serde_json::Map<String, Json>,
        depth: usize,
    ) -> SchemaResult<SchemaNode> {
        let items = map.get("items").ok_or(SchemaError::MissingItems)?;
        let item = self.parse_node("items", items, depth + 1)?;
        Ok(SchemaNode::array(item))
    }
}

/// 把校验后的模式树转换为操作树
///
/// `name` 是父容器中查找该节点时使用的属性名，根节点与数组元素为空。
pub fn lower(name: &str, node: &SchemaNode) -> OpNode {
    let op = match node {
        SchemaNode::Leaf(kind) => Operation::Leaf(*kind),
        SchemaNode::Array { items } => Operation::Array(Box::new(lower("", items))),
        SchemaNode::Object { properties, order } => Operation::Object(
            order
                .iter()
                .filter_map(|n| {
                    properties
                        .get(n)
                        .map(|child| (CompactString::from(n.as_str()), lower(n, child)))
                })
                .collect(),
        ),
    };
    OpNode::new(name, op)
}
