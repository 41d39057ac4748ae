//! Component model: definitions, the registry, factories and reactive
//! instances.
//!
//! A **component** is a named, reusable computation with declared, typed
//! input and output ports. The lifecycle runs:
//!
//! 1. [`ComponentRegistry::register`] validates ports and stores a
//!    [`ComponentDefinition`];
//! 2. [`ComponentRegistry::get`] resolves a definition (running its
//!    `compile` source, when present, exactly once) into a
//!    [`ComponentFactory`];
//! 3. [`ComponentFactory::attach`] binds the factory to a
//!    [`Scope`](crate::scope::Scope), yielding a [`ComponentInstance`]
//!    that recomputes reactively — or [`ComponentFactory::call`] runs it
//!    as a plain validated function.
//!
//! # Examples
//!
//! ```
//! use floweave::components::{ComponentRegistry, Transformer};
//! use serde_json::json;
//!
//! let mut registry = ComponentRegistry::new();
//! registry
//!     .register(
//!         "append",
//!         ["first", "second"],
//!         ["out"],
//!         Transformer::new(|values| {
//!             json!(format!(
//!                 "{}{}",
//!                 values[0].as_str().unwrap_or_default(),
//!                 values[1].as_str().unwrap_or_default()
//!             ))
//!         }),
//!     )
//!     .unwrap();
//!
//! let append = registry.get("append").unwrap();
//! let outs = append.call(&[json!("fbp"), json!("!")]).unwrap();
//! assert_eq!(outs["out"], json!("fbp!"));
//! ```

use miette::Diagnostic;
use thiserror::Error;

mod definition;
mod factory;
mod instance;
mod registry;

pub use definition::{
    ComponentDecl, ComponentDefinition, CompileFn, Locals, TransformFn, Transformer,
    TransformerSource,
};
pub use factory::ComponentFactory;
pub use instance::{ComponentInstance, InstanceOptions};
pub use registry::ComponentRegistry;

/// Errors raised while registering, resolving or attaching components.
#[derive(Debug, Error, Diagnostic)]
pub enum ComponentError {
    /// Component name is unusable (empty).
    #[error("invalid component name: {name:?}")]
    #[diagnostic(code(floweave::components::invalid_name))]
    InvalidComponentName { name: String },

    /// No component registered under the requested name.
    #[error("no component {name:?} found")]
    #[diagnostic(
        code(floweave::components::not_found),
        help("register the component first, or check the name for typos")
    )]
    ComponentNotFound { name: String },

    /// A declaration carried no resolvable transformer.
    #[error("invalid transformer for component {name:?}")]
    #[diagnostic(
        code(floweave::components::invalid_transformer),
        help("a component declaration needs either a transformer or a compile source")
    )]
    InvalidTransformer { name: String },

    /// Port validation failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Port(#[from] crate::ports::PortError),
}
