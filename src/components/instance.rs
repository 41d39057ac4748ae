//! Reactive component instances and demand-driven activation.
//!
//! Attaching a [`ComponentFactory`](super::ComponentFactory) to a
//! [`Scope`] produces a `ComponentInstance`: a validated callable wired
//! so that a change to any watched input recomputes the outputs and
//! merges them back into the scope.
//!
//! Activation is demand-driven. An instance with output ports does not
//! run merely because its inputs exist; it arms its input watch only
//! while at least one of its (aliased) output port names has a live
//! watcher on the scope, as tracked by the scope's watcher reference
//! counts. Setting [`InstanceOptions::no_inhibition`], or declaring zero
//! output ports, opts out and keeps the instance always armed.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, trace};

use super::factory::{run_transform, ComponentFactory};
use super::ComponentError;
use crate::ports::{find_port, validate_ports, PortDecl, PortError, PortSpec};
use crate::scope::{ObserverHandle, Scope, WatchError, WatchHandle};

/// Instantiation options.
///
/// `ports_alias` maps original port names to the instance-local names
/// used for watching and writing on the scope, so several instances can
/// share one scope without key conflicts. Aliased ins and outs are
/// re-validated jointly; collisions are rejected.
#[derive(Clone, Debug, Default)]
pub struct InstanceOptions {
    pub ports_alias: FxHashMap<String, String>,
    pub no_inhibition: bool,
}

impl InstanceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alias one port.
    pub fn alias(mut self, port: impl Into<String>, to: impl Into<String>) -> Self {
        self.ports_alias.insert(port.into(), to.into());
        self
    }

    pub fn with_ports_alias(mut self, alias: FxHashMap<String, String>) -> Self {
        self.ports_alias = alias;
        self
    }

    pub fn with_no_inhibition(mut self, no_inhibition: bool) -> Self {
        self.no_inhibition = no_inhibition;
        self
    }
}

struct InstanceInner {
    component_name: Option<String>,
    /// Aliased input ports, watch order = positional order.
    ins: Vec<PortSpec>,
    /// Aliased output ports; these names carry the demand signal.
    outs: Vec<PortSpec>,
    /// Pre-alias output ports; the transformer keys its return by these.
    base_outs: Vec<PortSpec>,
    alias: FxHashMap<String, String>,
    transformer: crate::components::Transformer,
    scope: Scope,
    armed: Mutex<Option<WatchHandle>>,
    observer: Mutex<Option<ObserverHandle>>,
}

/// A component bound to a scope.
///
/// Cheap clonable handle. The instance stays live until its scope is
/// destroyed, at which point it disarms itself and releases its demand
/// observer.
#[derive(Clone)]
pub struct ComponentInstance {
    inner: Arc<InstanceInner>,
}

impl ComponentInstance {
    pub(crate) fn attach(
        factory: &ComponentFactory,
        scope: &Scope,
        options: InstanceOptions,
    ) -> Result<Self, ComponentError> {
        let alias = options.ports_alias;
        let ins = alias_ports(factory.ins(), &alias, &[])?;
        let outs = alias_ports(factory.outs(), &alias, &ins)?;

        let instance = Self {
            inner: Arc::new(InstanceInner {
                component_name: factory.name().map(str::to_string),
                ins,
                outs,
                base_outs: factory.outs().to_vec(),
                alias,
                transformer: factory.transformer().clone(),
                scope: scope.clone(),
                armed: Mutex::new(None),
                observer: Mutex::new(None),
            }),
        };
        debug!(
            component = instance.inner.component_name.as_deref().unwrap_or("<anonymous>"),
            "component attached"
        );

        // Scope teardown is the instance's end of life.
        let on_destroy = instance.clone();
        scope.on_teardown(move || on_destroy.detach());

        // Nothing to watch without inputs.
        if instance.inner.ins.is_empty() {
            return Ok(instance);
        }

        if options.no_inhibition || instance.inner.outs.is_empty() {
            let handle = instance.arm();
            *instance.inner.armed.lock() = Some(handle);
            return Ok(instance);
        }

        let out_names: Vec<String> = instance
            .inner
            .outs
            .iter()
            .map(|p| p.name.clone())
            .collect();
        let demand_target = instance.clone();
        let observer = scope.observe_watch_counts(out_names, move |_key, _count| {
            demand_target.refresh_arming();
        });
        *instance.inner.observer.lock() = Some(observer);
        // Demand may already exist when the instance arrives.
        instance.refresh_arming();

        Ok(instance)
    }

    /// Run the component as a validated function: positional inputs in,
    /// aliased output map out.
    pub fn call(&self, values: &[Value]) -> Result<FxHashMap<String, Value>, PortError> {
        let alias = (!self.inner.alias.is_empty()).then_some(&self.inner.alias);
        run_transform(
            &self.inner.ins,
            &self.inner.base_outs,
            &self.inner.transformer,
            values,
            alias,
        )
    }

    pub fn component_name(&self) -> Option<&str> {
        self.inner.component_name.as_deref()
    }

    /// Instance-local (aliased) input ports.
    pub fn ins(&self) -> &[PortSpec] {
        &self.inner.ins
    }

    /// Instance-local (aliased) output ports.
    pub fn outs(&self) -> &[PortSpec] {
        &self.inner.outs
    }

    pub fn get_in_named(&self, name: &str) -> Option<&PortSpec> {
        find_port(&self.inner.ins, name)
    }

    pub fn get_out_named(&self, name: &str) -> Option<&PortSpec> {
        find_port(&self.inner.outs, name)
    }

    /// Whether the input watch is currently armed.
    pub fn is_armed(&self) -> bool {
        self.inner.armed.lock().is_some()
    }

    /// Subscribe the input group watch: on every delivery, recompute and
    /// merge the outputs into the scope (last write wins).
    fn arm(&self) -> WatchHandle {
        let keys: Vec<String> = self.inner.ins.iter().map(|p| p.name.clone()).collect();
        let scope = self.inner.scope.clone();
        let target = self.clone();
        trace!(
            component = self.inner.component_name.as_deref().unwrap_or("<anonymous>"),
            "input watch armed"
        );
        self.inner.scope.watch_group(keys, move |new, _old| {
            let outs = target.call(new).map_err(|e| Box::new(e) as WatchError)?;
            scope.extend(outs);
            Ok(())
        })
    }

    /// Re-evaluate demand and arm or disarm accordingly.
    ///
    /// Called synchronously whenever the watcher count of one of the
    /// aliased out port names crosses zero. The fresh group watch taken
    /// when demand reappears has first-fire semantics, so no pass with a
    /// live observer misses a recomputation.
    fn refresh_arming(&self) {
        let demanded = self
            .inner
            .outs
            .iter()
            .any(|p| self.inner.scope.watch_count(&p.name) > 0);
        if demanded {
            if self.inner.armed.lock().is_some() {
                return;
            }
            // Arm outside the lock: registering the input watch raises
            // demand for the input keys, which may recursively arm other
            // instances sharing this scope.
            let handle = self.arm();
            let mut armed = self.inner.armed.lock();
            if armed.is_none() {
                *armed = Some(handle);
            } else {
                handle.unsubscribe();
            }
        } else if let Some(handle) = self.inner.armed.lock().take() {
            trace!(
                component = self.inner.component_name.as_deref().unwrap_or("<anonymous>"),
                "input watch disarmed"
            );
            handle.unsubscribe();
        }
    }

    /// Disarm and release the demand observer. Runs on scope teardown.
    fn detach(&self) {
        if let Some(handle) = self.inner.armed.lock().take() {
            handle.unsubscribe();
        }
        if let Some(observer) = self.inner.observer.lock().take() {
            observer.remove();
        }
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("component_name", &self.inner.component_name)
            .field("ins", &self.inner.ins)
            .field("outs", &self.inner.outs)
            .field("armed", &self.is_armed())
            .finish()
    }
}

/// Clone ports, apply the alias map, and re-run validation so alias
/// collisions are rejected exactly like registration-time collisions.
fn alias_ports(
    ports: &[PortSpec],
    alias: &FxHashMap<String, String>,
    other: &[PortSpec],
) -> Result<Vec<PortSpec>, ComponentError> {
    let renamed: Vec<PortDecl> = ports
        .iter()
        .map(|port| {
            let mut port = port.clone();
            if let Some(aliased) = alias.get(&port.name) {
                port.name = aliased.clone();
            }
            PortDecl::Spec(port)
        })
        .collect();
    Ok(validate_ports(renamed, other)?)
}
