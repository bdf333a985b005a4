use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::{Kind, Metadata, Resource, ResourceRef};

macro_rules! impl_resource {
    ($ty:ty, $kind:expr) => {
        impl Resource for $ty {
            const KIND: Kind = $kind;

            fn metadata(&self) -> &Metadata {
                &self.metadata
            }

            fn metadata_mut(&mut self) -> &mut Metadata {
                &mut self.metadata
            }
        }
    };
}

/// A backend the gateway can route to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Upstream {
    pub metadata: Metadata,
    #[serde(rename = "type")]
    pub upstream_type: String,
    /// Type-specific connection settings, stored as-is.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub spec: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<Function>,
}

impl Upstream {
    pub fn new(name: impl Into<String>, upstream_type: impl Into<String>) -> Self {
        Self {
            metadata: Metadata::new(name),
            upstream_type: upstream_type.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub spec: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualService {
    pub metadata: Metadata,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub routes: Vec<Route>,
}

impl VirtualService {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            metadata: Metadata::new(name),
            ..Self::default()
        }
    }
}

/// Prefix route to a single upstream function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub prefix: String,
    pub upstream: ResourceRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub metadata: Metadata,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            metadata: Metadata::new(name),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub kind: String,
    #[serde(default)]
    pub verbs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_names: Vec<String>,
}

/// A GraphQL schema document and the resolver map that backs it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub metadata: Metadata,
    pub inline_schema: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolver_map: Option<ResourceRef>,
}

impl Schema {
    pub fn new(name: impl Into<String>, inline_schema: impl Into<String>) -> Self {
        Self {
            metadata: Metadata::new(name),
            inline_schema: inline_schema.into(),
            resolver_map: None,
        }
    }
}

/// Per-type, per-field resolver configuration for a schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverMap {
    pub metadata: Metadata,
    #[serde(default)]
    pub types: BTreeMap<String, TypeResolver>,
}

impl ResolverMap {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            metadata: Metadata::new(name),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeResolver {
    #[serde(default)]
    pub fields: BTreeMap<String, FieldResolver>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FieldResolver {
    Template(TemplateResolver),
    Noop,
}

/// Renders a request to an upstream function and the response back to the field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateResolver {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_template: Option<String>,
    pub upstream: ResourceRef,
    pub function: String,
}

impl_resource!(Upstream, Kind::Upstream);
impl_resource!(VirtualService, Kind::VirtualService);
impl_resource!(Role, Kind::Role);
impl_resource!(Schema, Kind::Schema);
impl_resource!(ResolverMap, Kind::ResolverMap);
