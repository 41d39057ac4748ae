//! Component registry: named, validated component definitions.

use rustc_hash::FxHashMap;
use tracing::debug;

use super::definition::{ComponentDecl, ComponentDefinition, Locals, Transformer};
use super::factory::ComponentFactory;
use super::ComponentError;
use crate::ports::{validate_ports, PortDecl, DEFAULT_OUT};

/// Stores named component definitions and resolves them to instantiable
/// factories.
///
/// The registry is an explicit, caller-constructed object: every network
/// is handed the registry it resolves components from, so tests can build
/// fixture registries without sharing process-wide state.
///
/// Re-registering a name replaces the previous definition (last writer
/// wins); [`list`](Self::list) preserves first-registration order.
///
/// # Examples
///
/// ```
/// use floweave::components::{ComponentRegistry, Transformer};
/// use serde_json::json;
///
/// let mut registry = ComponentRegistry::new();
/// registry
///     .register(
///         "upper",
///         ["text"],
///         ["out"],
///         Transformer::new(|values| {
///             json!(values[0].as_str().unwrap_or_default().to_uppercase())
///         }),
///     )
///     .unwrap();
///
/// let factory = registry.get("upper").unwrap();
/// assert_eq!(factory.ins()[0].name, "text");
/// ```
#[derive(Clone, Debug, Default)]
pub struct ComponentRegistry {
    definitions: FxHashMap<String, ComponentDefinition>,
    order: Vec<String>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component with explicit port lists.
    pub fn register<I, O>(
        &mut self,
        name: &str,
        ins: I,
        outs: O,
        transformer: Transformer,
    ) -> Result<&mut Self, ComponentError>
    where
        I: IntoIterator,
        I::Item: Into<PortDecl>,
        O: IntoIterator,
        O::Item: Into<PortDecl>,
    {
        let decl = ComponentDecl::new()
            .with_ins(ins)
            .with_outs(outs)
            .with_transformer(transformer);
        self.register_decl(name, decl)
    }

    /// Register a component deriving both port lists from the
    /// transformer's name hints.
    pub fn register_transformer(
        &mut self,
        name: &str,
        transformer: Transformer,
    ) -> Result<&mut Self, ComponentError> {
        self.register_decl(name, ComponentDecl::new().with_transformer(transformer))
    }

    /// Register a component from a full declaration.
    ///
    /// This is the funnel every other registration form goes through:
    /// port lists fall back to the transformer's hints, outs default to a
    /// single `"out"` port, and both lists are validated jointly.
    pub fn register_decl(
        &mut self,
        name: &str,
        decl: ComponentDecl,
    ) -> Result<&mut Self, ComponentError> {
        let definition = Self::validate_decl(Some(name), decl)?;
        if !self.definitions.contains_key(name) {
            self.order.push(name.to_string());
        }
        debug!(component = name, "component registered");
        self.definitions.insert(name.to_string(), definition);
        Ok(self)
    }

    /// Bulk registration; each entry is validated independently.
    pub fn register_all<I, N>(&mut self, entries: I) -> Result<&mut Self, ComponentError>
    where
        I: IntoIterator<Item = (N, ComponentDecl)>,
        N: AsRef<str>,
    {
        for (name, decl) in entries {
            self.register_decl(name.as_ref(), decl)?;
        }
        Ok(self)
    }

    fn validate_decl(
        name: Option<&str>,
        decl: ComponentDecl,
    ) -> Result<ComponentDefinition, ComponentError> {
        if let Some(name) = name {
            if name.is_empty() {
                return Err(ComponentError::InvalidComponentName {
                    name: name.to_string(),
                });
            }
        }
        let display = name.unwrap_or("<anonymous>").to_string();
        let source = decl
            .source
            .ok_or_else(|| ComponentError::InvalidTransformer {
                name: display.clone(),
            })?;

        let (ins_hint, outs_hint) = match &source {
            super::definition::TransformerSource::Ready(t) => (
                t.ins_hint().map(|h| h.to_vec()),
                t.outs_hint().map(|h| h.to_vec()),
            ),
            super::definition::TransformerSource::Compiled(_) => (None, None),
        };

        let ins_decls: Vec<PortDecl> = decl
            .ins
            .or_else(|| ins_hint.map(|h| h.into_iter().map(PortDecl::Name).collect()))
            .unwrap_or_default();
        let outs_decls: Vec<PortDecl> = decl
            .outs
            .or_else(|| outs_hint.map(|h| h.into_iter().map(PortDecl::Name).collect()))
            .unwrap_or_else(|| vec![PortDecl::Name(DEFAULT_OUT.to_string())]);

        let ins = validate_ports(ins_decls, &[])?;
        let outs = validate_ports(outs_decls, &ins)?;

        Ok(ComponentDefinition {
            name: name.map(str::to_string),
            ins,
            outs,
            source,
        })
    }

    /// Resolve a registered component to a factory.
    pub fn get(&self, name: &str) -> Result<ComponentFactory, ComponentError> {
        self.get_with(name, &Locals::default())
    }

    /// Resolve a registered component, feeding `locals` to its `compile`
    /// source. The source is resolved once, here.
    pub fn get_with(&self, name: &str, locals: &Locals) -> Result<ComponentFactory, ComponentError> {
        let definition = self
            .definitions
            .get(name)
            .ok_or_else(|| ComponentError::ComponentNotFound {
                name: name.to_string(),
            })?;
        Ok(ComponentFactory::from_definition(definition, locals))
    }

    /// Build an ad hoc, unregistered component from a bare transformer.
    ///
    /// Ins are derived from the transformer's input hints. Outs come from
    /// `outs` when given, else from the transformer's output hints, else
    /// the component has no output ports (and therefore always runs when
    /// attached).
    pub fn anonymous<O>(
        &self,
        transformer: Transformer,
        outs: Option<O>,
    ) -> Result<ComponentFactory, ComponentError>
    where
        O: IntoIterator,
        O::Item: Into<PortDecl>,
    {
        let mut decl = ComponentDecl::new();
        decl.outs = Some(match outs {
            Some(outs) => outs.into_iter().map(Into::into).collect(),
            None => transformer
                .outs_hint()
                .map(|h| h.iter().cloned().map(PortDecl::Name).collect())
                .unwrap_or_default(),
        });
        let decl = decl.with_transformer(transformer);
        let definition = Self::validate_decl(None, decl)?;
        Ok(ComponentFactory::from_definition(
            &definition,
            &Locals::default(),
        ))
    }

    /// Registered component names, in first-registration order.
    pub fn list(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }
}
