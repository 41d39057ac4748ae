//! # Floweave: Reactive Flow-Based Programming Engine
//!
//! Floweave lets an application describe a dataflow program as a set of
//! named **components** — pure functions with typed input/output ports —
//! wired into a **network** of **processes** connected by
//! **connections**. Inputs arrive incrementally; a process recomputes its
//! outputs when any of its watched inputs change, and execution is
//! demand-driven: a process does not run unless something actually
//! consumes one of its outputs, or inhibition is explicitly disabled.
//!
//! ## Core Concepts
//!
//! - **Components**: named, reusable computations with declared, typed
//!   ports, kept in a [`components::ComponentRegistry`]
//! - **Scopes**: the synchronous change-detection substrate driving
//!   recomputation ([`scope::Scope`])
//! - **Processes**: components bound into a network, each with its own
//!   isolated scope
//! - **Connections**: directed bindings from one process's output port
//!   (or a constant) to another's input port — at most one per
//!   destination
//! - **Graphs**: the canonical JSON shape a network serializes to and
//!   loads from, also produced by the FBP text compiler ([`fbp`])
//!
//! ## Quick Start
//!
//! ```
//! use floweave::components::{ComponentRegistry, InstanceOptions, Transformer};
//! use floweave::network::Network;
//! use serde_json::json;
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//!
//! // Register two small string components.
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
//! // Wire them into a network.
//! let mut network = Network::new(registry);
//! network
//!     .process("Exclamate", "append", InstanceOptions::new())
//!     .unwrap()
//!     .process("Shout", "upper", InstanceOptions::new())
//!     .unwrap()
//!     .connection("Exclamate.out", "Shout.text")
//!     .unwrap()
//!     .data(json!("!"), "Exclamate.second")
//!     .unwrap();
//!
//! // Demand an output, feed an input, propagate.
//! let result = Arc::new(Mutex::new(serde_json::Value::Null));
//! let sink = result.clone();
//! let _probe = network
//!     .probe("Shout.out", move |value, _old| *sink.lock() = value.clone())
//!     .unwrap();
//!
//! network
//!     .process_scope("Exclamate")
//!     .unwrap()
//!     .set("first", json!("hi"));
//! network.digest().unwrap();
//!
//! assert_eq!(*result.lock(), json!("HI!"));
//! ```
//!
//! ## Demand-Driven Activation
//!
//! Attaching a component to a scope does not make it run: the instance
//! arms its input watch only while one of its output ports is being
//! watched (by a probe, a connection, or an export). Components with no
//! output ports, and instances attached with
//! [`InstanceOptions::no_inhibition`](components::InstanceOptions),
//! always run.
//!
//! ## Cycles
//!
//! Nothing rejects a cyclic connection graph at wiring time. A cycle
//! whose values never converge shows up as
//! [`scope::ScopeError::DigestUnstable`] when propagation exceeds the
//! digest pass limit.
//!
//! ## Module Guide
//!
//! - [`ports`] - Port declarations, contracts and validation
//! - [`components`] - Definitions, registry, factories and instances
//! - [`scope`] - The observation substrate and its digest
//! - [`network`] - Processes, connections, graph load/serialize
//! - [`fbp`] - The textual graph notation compiler
//! - [`telemetry`] - Tracing subscriber setup

pub mod components;
pub mod fbp;
pub mod network;
pub mod ports;
pub mod scope;
pub mod telemetry;
