//! Canonical JSON graph model.
//!
//! The serialization form a [`Network`](super::Network) loads and saves,
//! and the shape the FBP text compiler produces. A graph names its
//! processes (each bound to a component) and keys its connections by
//! destination path:
//!
//! ```json
//! {
//!   "processes": {
//!     "Exclamate": { "component": "string-append" },
//!     "Shout": { "component": "string-uppercase" }
//!   },
//!   "connections": {
//!     "Shout.text": { "from": "Exclamate.out" },
//!     "Exclamate.second": { "data": "!" }
//!   }
//! }
//! ```

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A network's serializable shape: processes and connections.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default, skip_serializing_if = "FxHashMap::is_empty")]
    pub processes: FxHashMap<String, ProcessSpec>,
    #[serde(default, skip_serializing_if = "FxHashMap::is_empty")]
    pub connections: FxHashMap<String, ConnectionSpec>,
}

/// One process entry: the component it instantiates plus optional
/// instantiation details.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSpec {
    pub component: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports_alias: Option<FxHashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ProcessMetadata>,
}

impl ProcessSpec {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            ports_alias: None,
            metadata: None,
        }
    }
}

/// Routing hints attached by the FBP compiler's `(component:meta)`
/// annotation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<String>,
}

/// One connection entry, keyed by destination path: either a wire from
/// an upstream port or a constant.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ConnectionSpec {
    /// A wire from an upstream `process.port`.
    pub fn wire(from: impl Into<String>) -> Self {
        Self {
            from: Some(from.into()),
            data: None,
        }
    }

    /// A constant occupying the destination.
    pub fn constant(data: Value) -> Self {
        Self {
            from: None,
            data: Some(data),
        }
    }
}
