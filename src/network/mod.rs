//! Networks: named processes wired by connections.
//!
//! A [`Network`] owns a collection of named **processes** (each a
//! [`ComponentInstance`] bound to its own isolated scope) and a
//! collection of **connections** (value-forwarding wires and constant
//! bindings, at most one per destination port). It bridges to an outer
//! scope via [`probe`](Network::probe), [`import`](Network::import) and
//! [`export`](Network::export), and round-trips through the canonical
//! [`Graph`] JSON shape or the FBP text notation.
//!
//! # Examples
//!
//! ```
//! use floweave::components::{ComponentRegistry, InstanceOptions, Transformer};
//! use floweave::network::Network;
//! use serde_json::json;
//!
//! let mut registry = ComponentRegistry::new();
//! registry
//!     .register(
//!         "append",
//!         ["first", "second"],
//!         ["out"],
//!         Transformer::new(|v| {
//!             json!(format!(
//!                 "{}{}",
//!                 v[0].as_str().unwrap_or_default(),
//!                 v[1].as_str().unwrap_or_default()
//!             ))
//!         }),
//!     )
//!     .unwrap()
//!     .register(
//!         "upper",
//!         ["text"],
//!         ["out"],
//!         Transformer::new(|v| json!(v[0].as_str().unwrap_or_default().to_uppercase())),
//!     )
//!     .unwrap();
//!
//! let mut network = Network::new(registry).with_name("greeter");
//! network
//!     .process("Exclamate", "append", InstanceOptions::new())
//!     .unwrap()
//!     .process("Shout", "upper", InstanceOptions::new())
//!     .unwrap()
//!     .connection("Exclamate.out", "Shout.text")
//!     .unwrap()
//!     .data(json!("!"), "Exclamate.second")
//!     .unwrap();
//! ```

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::components::{
    ComponentError, ComponentFactory, ComponentInstance, ComponentRegistry, InstanceOptions,
    Transformer,
};
use crate::fbp::FbpError;
use crate::ports::PortDecl;
use crate::scope::{Scope, ScopeError, WatchHandle};

mod graph;
mod paths;

pub use graph::{ConnectionSpec, Graph, ProcessMetadata, ProcessSpec};
pub use paths::{parse_port_path, PortPath};

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while building or bridging a network.
#[derive(Debug, Error, Diagnostic)]
pub enum NetworkError {
    /// The process's component reference did not resolve.
    #[error("invalid component {name:?}")]
    #[diagnostic(code(floweave::network::invalid_component))]
    InvalidComponent {
        name: String,
        #[source]
        source: ComponentError,
    },

    /// A path is not of the `process.port` form.
    #[error("invalid process path: {path:?}")]
    #[diagnostic(
        code(floweave::network::invalid_process_path),
        help("paths look like `process.port`, with non-empty segments")
    )]
    InvalidProcessPath { path: String },

    /// The named process does not exist in this network.
    #[error("no process {process:?} in the network")]
    #[diagnostic(code(floweave::network::invalid_process))]
    InvalidProcess { process: String },

    /// The named port is not declared by the process's component.
    #[error("process {process:?} has no port {port:?}")]
    #[diagnostic(code(floweave::network::invalid_port))]
    InvalidPort { process: String, port: String },

    /// The destination port already has a connection.
    #[error("a connection to {to:?} is already present")]
    #[diagnostic(
        code(floweave::network::duplicate_connection),
        help("each input port accepts at most one connection or constant")
    )]
    DuplicateConnection { to: String },

    /// An import targeted an already connected port.
    #[error("importing into an already connected port: {to:?}")]
    #[diagnostic(code(floweave::network::already_connected))]
    AlreadyConnected { to: String },

    /// A graph entry is malformed.
    #[error("invalid graph: {reason}")]
    #[diagnostic(code(floweave::network::invalid_graph))]
    InvalidGraph { reason: String },

    /// Component instantiation failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Component(#[from] ComponentError),

    /// FBP source text did not compile.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Fbp(#[from] FbpError),

    /// Propagation failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Scope(#[from] ScopeError),
}

// ============================================================================
// Building blocks
// ============================================================================

/// How a process names its component: by registry name, by an already
/// built factory, or by a bare transformer (an anonymous component).
#[derive(Debug)]
pub enum ComponentRef {
    Name(String),
    Factory(ComponentFactory),
    Transformer(Transformer),
}

impl From<&str> for ComponentRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for ComponentRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<ComponentFactory> for ComponentRef {
    fn from(factory: ComponentFactory) -> Self {
        Self::Factory(factory)
    }
}

impl From<Transformer> for ComponentRef {
    fn from(transformer: Transformer) -> Self {
        Self::Transformer(transformer)
    }
}

/// An established connection occupying a destination port: a wire (holds
/// its upstream subscription) or a constant.
#[derive(Debug)]
pub struct Connection {
    from: Option<String>,
    data: Option<Value>,
    handle: Option<WatchHandle>,
}

impl Connection {
    pub fn from(&self) -> Option<&str> {
        self.from.as_deref()
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    fn teardown(&self) {
        if let Some(handle) = &self.handle {
            handle.unsubscribe();
        }
    }
}

struct ProcessEntry {
    scope: Scope,
    instance: ComponentInstance,
}

// ============================================================================
// Network
// ============================================================================

/// The owning aggregate of processes and connections.
pub struct Network {
    name: Option<String>,
    registry: ComponentRegistry,
    scope: Scope,
    processes: FxHashMap<String, ProcessEntry>,
    connections: FxHashMap<String, Connection>,
    bridges: Vec<WatchHandle>,
}

impl Network {
    /// Create an empty network with its own root scope, resolving
    /// components from `registry`.
    pub fn new(registry: ComponentRegistry) -> Self {
        Self {
            name: None,
            registry,
            scope: Scope::new(),
            processes: FxHashMap::default(),
            connections: FxHashMap::default(),
            bridges: Vec::new(),
        }
    }

    /// Create a network whose scope is an isolated child of `parent`, so
    /// one digest of the parent tree drives the network too.
    pub fn new_in(parent: &Scope, registry: ComponentRegistry) -> Self {
        let mut network = Self::new(registry);
        network.scope = parent.new_child();
        network
    }

    /// Build a network directly from a graph.
    pub fn from_graph(registry: ComponentRegistry, graph: &Graph) -> Result<Self, NetworkError> {
        let mut network = Self::new(registry);
        network.load_graph(graph)?;
        Ok(network)
    }

    /// Build a network directly from FBP source text.
    pub fn from_fbp(registry: ComponentRegistry, source: &str) -> Result<Self, NetworkError> {
        let mut network = Self::new(registry);
        network.fbp(source)?;
        Ok(network)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.registry
    }

    /// The network's own scope.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// The isolated scope of one process, when it exists.
    pub fn process_scope(&self, name: &str) -> Option<&Scope> {
        self.processes.get(name).map(|entry| &entry.scope)
    }

    /// The component instance of one process, when it exists.
    pub fn process_instance(&self, name: &str) -> Option<&ComponentInstance> {
        self.processes.get(name).map(|entry| &entry.instance)
    }

    /// Run propagation passes until the network stabilizes.
    pub fn digest(&self) -> Result<(), ScopeError> {
        self.scope.digest()
    }

    fn resolve(&self, component: ComponentRef) -> Result<ComponentFactory, NetworkError> {
        match component {
            ComponentRef::Name(name) => {
                self.registry
                    .get(&name)
                    .map_err(|source| NetworkError::InvalidComponent { name, source })
            }
            ComponentRef::Factory(factory) => Ok(factory),
            ComponentRef::Transformer(transformer) => self
                .registry
                .anonymous(transformer, None::<Vec<PortDecl>>)
                .map_err(|source| NetworkError::InvalidComponent {
                    name: "<anonymous>".to_string(),
                    source,
                }),
        }
    }

    /// Create (or replace) a named process.
    ///
    /// A replaced process is torn down first; connections still pointing
    /// at it are not removed automatically and are the caller's to
    /// manage.
    pub fn process(
        &mut self,
        name: &str,
        component: impl Into<ComponentRef>,
        options: InstanceOptions,
    ) -> Result<&mut Self, NetworkError> {
        let factory = self.resolve(component.into())?;
        if let Some(old) = self.processes.remove(name) {
            old.scope.destroy();
        }
        let scope = self.scope.new_child();
        let instance = factory.attach(&scope, options)?;
        debug!(
            process = name,
            component = instance.component_name().unwrap_or("<anonymous>"),
            "process created"
        );
        self.processes
            .insert(name.to_string(), ProcessEntry { scope, instance });
        Ok(self)
    }

    /// Wire `from`'s value into `to`; every upstream change is forwarded.
    ///
    /// At most one connection may target a destination port.
    pub fn connection(&mut self, from: &str, to: &str) -> Result<&mut Self, NetworkError> {
        let target = parse_port_path(to)?;
        let to_key = target.to_string();
        if self.connections.contains_key(&to_key) {
            return Err(NetworkError::DuplicateConnection { to: to_key });
        }
        let source = parse_port_path(from)?;
        let from_key = source.to_string();
        let dest = self
            .processes
            .get(&target.process)
            .ok_or(NetworkError::InvalidProcess {
                process: target.process.clone(),
            })?;
        let dest_scope = dest.scope.clone();
        let dest_port = target.port.clone();
        let handle = self.probe(&from_key, move |value, _old| {
            dest_scope.set(dest_port.clone(), value.clone());
        })?;
        debug!(from = %from_key, to = %to_key, "connection created");
        self.connections.insert(
            to_key,
            Connection {
                from: Some(from_key),
                data: None,
                handle: Some(handle),
            },
        );
        Ok(self)
    }

    /// Bind a constant to `to` and occupy the destination against future
    /// wiring. The value is assigned once, immediately.
    pub fn data(&mut self, value: Value, to: &str) -> Result<&mut Self, NetworkError> {
        let target = parse_port_path(to)?;
        let to_key = target.to_string();
        if self.connections.contains_key(&to_key) {
            return Err(NetworkError::DuplicateConnection { to: to_key });
        }
        let dest = self
            .processes
            .get(&target.process)
            .ok_or(NetworkError::InvalidProcess {
                process: target.process.clone(),
            })?;
        dest.scope.set(target.port.clone(), value.clone());
        debug!(to = %to_key, "constant bound");
        self.connections.insert(
            to_key,
            Connection {
                from: None,
                data: Some(value),
                handle: None,
            },
        );
        Ok(self)
    }

    /// Watch any process port and deliver `(new, old)` values to the
    /// listener. The port must be declared by the process's component.
    pub fn probe(
        &self,
        path: &str,
        listener: impl FnMut(&Value, &Value) + Send + 'static,
    ) -> Result<WatchHandle, NetworkError> {
        let path = parse_port_path(path)?;
        let entry =
            self.processes
                .get(&path.process)
                .ok_or_else(|| NetworkError::InvalidProcess {
                    process: path.process.clone(),
                })?;
        if entry.instance.get_in_named(&path.port).is_none()
            && entry.instance.get_out_named(&path.port).is_none()
        {
            return Err(NetworkError::InvalidPort {
                process: path.process,
                port: path.port,
            });
        }
        Ok(entry.scope.watch(path.port, listener))
    }

    /// Forward properties of an outer scope into input ports, ongoing.
    ///
    /// Each map entry is `destination path -> outer property name`; every
    /// destination must be currently unconnected.
    pub fn import<I, P, K>(&mut self, outer: &Scope, map: I) -> Result<&mut Self, NetworkError>
    where
        I: IntoIterator<Item = (P, K)>,
        P: AsRef<str>,
        K: Into<String>,
    {
        let mut keys = Vec::new();
        let mut forwards = Vec::new();
        for (path, outer_key) in map {
            let path = parse_port_path(path.as_ref())?;
            let to_key = path.to_string();
            if self.connections.contains_key(&to_key) {
                return Err(NetworkError::AlreadyConnected { to: to_key });
            }
            let entry =
                self.processes
                    .get(&path.process)
                    .ok_or_else(|| NetworkError::InvalidProcess {
                        process: path.process.clone(),
                    })?;
            keys.push(outer_key.into());
            forwards.push((path.port, entry.scope.clone()));
        }
        if keys.is_empty() {
            return Ok(self);
        }
        let handle = outer.watch_group(keys, move |new, _old| {
            for (i, (port, scope)) in forwards.iter().enumerate() {
                scope.set(port.clone(), new[i].clone());
            }
            Ok(())
        });
        self.bridges.push(handle);
        Ok(self)
    }

    /// Forward output ports into an outer scope's properties, ongoing.
    ///
    /// Each map entry is `outer property name -> source path`; the source
    /// must be a declared output port of its process.
    pub fn export<I, K, P>(&mut self, outer: &Scope, map: I) -> Result<&mut Self, NetworkError>
    where
        I: IntoIterator<Item = (K, P)>,
        K: Into<String>,
        P: AsRef<str>,
    {
        for (outer_key, path) in map {
            let path = parse_port_path(path.as_ref())?;
            let entry =
                self.processes
                    .get(&path.process)
                    .ok_or_else(|| NetworkError::InvalidProcess {
                        process: path.process.clone(),
                    })?;
            if entry.instance.get_out_named(&path.port).is_none() {
                return Err(NetworkError::InvalidPort {
                    process: path.process,
                    port: path.port,
                });
            }
            let outer = outer.clone();
            let outer_key = outer_key.into();
            let handle = entry
                .scope
                .watch(path.port, move |value, _old| {
                    outer.set(outer_key.clone(), value.clone())
                });
            self.bridges.push(handle);
        }
        Ok(self)
    }

    /// Remove every connection, then every process, in that order
    /// (forwarders hold references into process scopes).
    pub fn empty(&mut self) -> &mut Self {
        for (_, connection) in self.connections.drain() {
            connection.teardown();
        }
        for (_, entry) in self.processes.drain() {
            entry.scope.destroy();
        }
        self
    }

    /// Serialize the current configuration into the canonical graph
    /// shape.
    pub fn graph(&self) -> Graph {
        let mut graph = Graph::default();
        for (name, entry) in &self.processes {
            graph.processes.insert(
                name.clone(),
                ProcessSpec::new(entry.instance.component_name().unwrap_or_default()),
            );
        }
        for (to, connection) in &self.connections {
            graph.connections.insert(
                to.clone(),
                ConnectionSpec {
                    from: connection.from.clone(),
                    data: connection.data.clone(),
                },
            );
        }
        graph
    }

    /// Replace the network's configuration with `graph`: empty it, then
    /// replay the graph's processes and connections. A connection entry
    /// with both `from` and `data` wires `from`.
    pub fn load_graph(&mut self, graph: &Graph) -> Result<&mut Self, NetworkError> {
        self.empty();
        for (name, spec) in &graph.processes {
            let mut options = InstanceOptions::new();
            if let Some(alias) = &spec.ports_alias {
                options.ports_alias = alias.clone();
            }
            self.process(name, spec.component.as_str(), options)?;
        }
        for (to, spec) in &graph.connections {
            if let Some(from) = &spec.from {
                self.connection(from, to)?;
            } else if let Some(data) = &spec.data {
                self.data(data.clone(), to)?;
            } else {
                return Err(NetworkError::InvalidGraph {
                    reason: format!("connection to {to:?} has neither 'from' nor 'data'"),
                });
            }
        }
        Ok(self)
    }

    /// Replace the network's configuration with compiled FBP text.
    pub fn fbp(&mut self, source: &str) -> Result<&mut Self, NetworkError> {
        let graph = crate::fbp::compile(source)?;
        self.load_graph(&graph)
    }
}

impl Drop for Network {
    fn drop(&mut self) {
        for handle in self.bridges.drain(..) {
            handle.unsubscribe();
        }
        self.scope.destroy();
    }
}
