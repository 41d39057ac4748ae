//! Component factories: resolved definitions ready to call or attach.

use rustc_hash::FxHashMap;
use serde_json::Value;

use super::definition::{ComponentDefinition, Locals, Transformer};
use super::instance::{ComponentInstance, InstanceOptions};
use super::ComponentError;
use crate::ports::{find_port, PortError, PortSpec, DEFAULT_OUT};
use crate::scope::Scope;

/// A resolved component, carrying read-only port metadata and a ready
/// transformer.
///
/// A factory can be used two ways:
///
/// - [`call`](Self::call) runs the component as a validated pure
///   function, with no reactive wiring;
/// - [`attach`](Self::attach) binds it to a [`Scope`], producing a
///   [`ComponentInstance`] that recomputes when its watched inputs
///   change.
#[derive(Clone, Debug)]
pub struct ComponentFactory {
    name: Option<String>,
    ins: Vec<PortSpec>,
    outs: Vec<PortSpec>,
    transformer: Transformer,
}

impl ComponentFactory {
    pub(crate) fn from_definition(definition: &ComponentDefinition, locals: &Locals) -> Self {
        Self {
            name: definition.name.clone(),
            ins: definition.ins.clone(),
            outs: definition.outs.clone(),
            transformer: definition.source.resolve(locals),
        }
    }

    /// The registered component name, `None` for anonymous components.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn ins(&self) -> &[PortSpec] {
        &self.ins
    }

    pub fn outs(&self) -> &[PortSpec] {
        &self.outs
    }

    pub fn get_in_named(&self, name: &str) -> Option<&PortSpec> {
        find_port(&self.ins, name)
    }

    pub fn get_out_named(&self, name: &str) -> Option<&PortSpec> {
        find_port(&self.outs, name)
    }

    pub(crate) fn transformer(&self) -> &Transformer {
        &self.transformer
    }

    /// Run the component as a validated pure function.
    ///
    /// Positional values are checked against the input contracts, the
    /// transformer is invoked, and its return value is normalized into a
    /// map restricted to the declared out ports.
    pub fn call(&self, values: &[Value]) -> Result<FxHashMap<String, Value>, PortError> {
        run_transform(&self.ins, &self.outs, &self.transformer, values, None)
    }

    /// Bind the component to a scope, producing a reactive instance.
    pub fn attach(
        &self,
        scope: &Scope,
        options: InstanceOptions,
    ) -> Result<ComponentInstance, ComponentError> {
        ComponentInstance::attach(self, scope, options)
    }
}

/// Shared transform pipeline: validate inputs, invoke, normalize and
/// validate outputs, apply output aliasing.
///
/// A non-object return value is bare and wraps under the first declared
/// out port (or `"out"` when there are none). Keys the transformer
/// returned beyond the declared out ports are dropped; declared ports the
/// transformer omitted surface as `null`.
pub(crate) fn run_transform(
    ins: &[PortSpec],
    outs: &[PortSpec],
    transformer: &Transformer,
    values: &[Value],
    alias: Option<&FxHashMap<String, String>>,
) -> Result<FxHashMap<String, Value>, PortError> {
    for (i, port) in ins.iter().enumerate() {
        port.check(values.get(i).unwrap_or(&Value::Null))?;
    }

    let raw = transformer.invoke(values);
    let mut keyed: FxHashMap<String, Value> = match raw {
        Value::Object(map) => map.into_iter().collect(),
        bare => {
            let first = outs
                .first()
                .map(|p| p.name.clone())
                .unwrap_or_else(|| DEFAULT_OUT.to_string());
            let mut map = FxHashMap::default();
            map.insert(first, bare);
            map
        }
    };

    let mut result = FxHashMap::default();
    for port in outs {
        let value = keyed.remove(&port.name).unwrap_or(Value::Null);
        port.check(&value)?;
        let key = alias
            .and_then(|a| a.get(&port.name))
            .cloned()
            .unwrap_or_else(|| port.name.clone());
        result.insert(key, value);
    }
    Ok(result)
}
