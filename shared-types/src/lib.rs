#![cfg_attr(test, allow(clippy::unwrap_used))]

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

mod kinds;

pub use kinds::{
    FieldResolver, Function, Permission, ResolverMap, Role, Route, Schema, TemplateResolver,
    TypeResolver, Upstream, VirtualService,
};

/// Namespace used when a resource does not name one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Identity and versioning block shared by every resource kind.
///
/// `resource_version`, `uid` and `creation_timestamp` are owned by the store:
/// values supplied on create are overwritten.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Metadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self::namespaced(DEFAULT_NAMESPACE, name)
    }

    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    /// Namespace with the empty string read as [`DEFAULT_NAMESPACE`].
    pub fn effective_namespace(&self) -> &str {
        if self.namespace.is_empty() {
            DEFAULT_NAMESPACE
        } else {
            &self.namespace
        }
    }
}

/// Pointer from one resource to another of a known kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

impl ResourceRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Resource kinds the store knows how to persist.
///
/// Declaration order is the order kinds are scanned and reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Upstream,
    VirtualService,
    Role,
    Schema,
    ResolverMap,
}

impl Kind {
    pub const ALL: [Kind; 5] = [
        Kind::Upstream,
        Kind::VirtualService,
        Kind::Role,
        Kind::Schema,
        Kind::ResolverMap,
    ];

    /// Directory name under the store root.
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Upstream => "upstreams",
            Kind::VirtualService => "virtualservices",
            Kind::Role => "roles",
            Kind::Schema => "schemas",
            Kind::ResolverMap => "resolvermaps",
        }
    }

    pub fn from_dir(dir: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == dir)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-erased identity of a stored resource.
///
/// Orders by kind, then name, then namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub kind: Kind,
    pub name: String,
    pub namespace: String,
}

impl ResourceKey {
    pub fn new(kind: Kind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

/// A storable resource: a metadata block plus a kind-specific payload.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: Kind;

    fn metadata(&self) -> &Metadata;

    fn metadata_mut(&mut self) -> &mut Metadata;

    fn name(&self) -> &str {
        &self.metadata().name
    }

    fn namespace(&self) -> &str {
        self.metadata().effective_namespace()
    }

    fn resource_version(&self) -> &str {
        &self.metadata().resource_version
    }

    fn key(&self) -> ResourceKey {
        ResourceKey::new(Self::KIND, self.namespace(), self.name())
    }

    fn to_ref(&self) -> ResourceRef {
        ResourceRef::new(self.namespace(), self.name())
    }
}
