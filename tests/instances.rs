mod common;

use std::sync::Arc;

use common::*;
use parking_lot::Mutex;
use serde_json::{json, Value};

use floweave::components::{ComponentError, ComponentRegistry, InstanceOptions, Transformer};
use floweave::ports::PortError;
use floweave::scope::Scope;

fn counting_registry(counter: Arc<Mutex<usize>>) -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    registry
        .register("upper", ["text"], ["out"], counting_upper(counter))
        .unwrap();
    registry
}

#[test]
fn attach_exposes_instance_port_metadata() {
    let registry = string_registry();
    let scope = Scope::new();
    let instance = registry
        .get("append")
        .unwrap()
        .attach(&scope, InstanceOptions::new())
        .unwrap();

    assert_eq!(instance.component_name(), Some("append"));
    assert!(instance.get_in_named("first").is_some());
    assert!(instance.get_out_named("out").is_some());
}

#[test]
fn instance_call_is_a_validated_pure_function() {
    let registry = string_registry();
    let scope = Scope::new();
    let instance = registry
        .get("upper")
        .unwrap()
        .attach(&scope, InstanceOptions::new())
        .unwrap();

    let outs = instance.call(&[json!("quiet")]).unwrap();
    assert_eq!(outs["out"], json!("QUIET"));
}

#[test]
fn inhibited_instance_never_runs_without_an_output_observer() {
    let counter = Arc::new(Mutex::new(0));
    let registry = counting_registry(counter.clone());
    let scope = Scope::new();
    let _instance = registry
        .get("upper")
        .unwrap()
        .attach(&scope, InstanceOptions::new())
        .unwrap();

    scope.set("text", json!("hello"));
    scope.digest().unwrap();
    scope.digest().unwrap();
    assert_eq!(*counter.lock(), 0);
}

#[test]
fn observed_instance_runs_exactly_once_per_pass_group() {
    let counter = Arc::new(Mutex::new(0));
    let registry = counting_registry(counter.clone());
    let scope = Scope::new();
    let _instance = registry
        .get("upper")
        .unwrap()
        .attach(&scope, InstanceOptions::new())
        .unwrap();

    let (seen, cb) = recorder();
    let _probe = scope.watch("out", cb);
    scope.set("text", json!("hello"));
    scope.digest().unwrap();

    assert_eq!(*counter.lock(), 1);
    assert_eq!(seen.lock().last(), Some(&json!("HELLO")));
}

#[test]
fn removing_the_observer_inhibits_again() {
    let counter = Arc::new(Mutex::new(0));
    let registry = counting_registry(counter.clone());
    let scope = Scope::new();
    let _instance = registry
        .get("upper")
        .unwrap()
        .attach(&scope, InstanceOptions::new())
        .unwrap();

    let (_seen, cb) = recorder();
    let probe = scope.watch("out", cb);
    scope.set("text", json!("one"));
    scope.digest().unwrap();
    let after_first = *counter.lock();
    assert_eq!(after_first, 1);

    probe.unsubscribe();
    scope.set("text", json!("two"));
    scope.digest().unwrap();
    assert_eq!(*counter.lock(), after_first, "no runs after the observer left");
}

#[test]
fn rearming_resumes_on_the_next_digest() {
    let counter = Arc::new(Mutex::new(0));
    let registry = counting_registry(counter.clone());
    let scope = Scope::new();
    let _instance = registry
        .get("upper")
        .unwrap()
        .attach(&scope, InstanceOptions::new())
        .unwrap();

    let (_s1, cb1) = recorder();
    let first = scope.watch("out", cb1);
    scope.set("text", json!("one"));
    scope.digest().unwrap();
    assert_eq!(*counter.lock(), 1);

    first.unsubscribe();
    scope.set("text", json!("two"));
    scope.digest().unwrap();
    assert_eq!(*counter.lock(), 1);

    let (seen, cb2) = recorder();
    let _second = scope.watch("out", cb2);
    scope.digest().unwrap();
    assert_eq!(*counter.lock(), 2, "re-armed watch fires on its first digest");
    assert_eq!(seen.lock().last(), Some(&json!("TWO")));
}

#[test]
fn no_inhibition_option_keeps_the_instance_armed() {
    let counter = Arc::new(Mutex::new(0));
    let registry = counting_registry(counter.clone());
    let scope = Scope::new();
    let _instance = registry
        .get("upper")
        .unwrap()
        .attach(&scope, InstanceOptions::new().with_no_inhibition(true))
        .unwrap();

    scope.set("text", json!("hello"));
    scope.digest().unwrap();
    assert_eq!(*counter.lock(), 1);
    assert_eq!(scope.get("out"), json!("HELLO"));
}

#[test]
fn zero_out_ports_always_run() {
    let runs = Arc::new(Mutex::new(Vec::new()));
    let sink = runs.clone();
    let registry = ComponentRegistry::new();
    let factory = registry
        .anonymous(
            Transformer::new(move |v| {
                sink.lock().push(v[0].clone());
                Value::Null
            })
            .with_ins(["input"]),
            None::<Vec<&str>>,
        )
        .unwrap();

    let scope = Scope::new();
    let _instance = factory.attach(&scope, InstanceOptions::new()).unwrap();
    scope.set("input", json!(42));
    scope.digest().unwrap();
    assert_eq!(runs.lock().last(), Some(&json!(42)));
}

#[test]
fn ports_alias_renames_watched_and_written_keys() {
    let registry = string_registry();
    let scope = Scope::new();
    let _instance = registry
        .get("upper")
        .unwrap()
        .attach(
            &scope,
            InstanceOptions::new()
                .alias("text", "aLocalModel")
                .alias("out", "anotherLocalModel")
                .with_no_inhibition(true),
        )
        .unwrap();

    scope.set("aLocalModel", json!("shout"));
    scope.digest().unwrap();
    assert_eq!(scope.get("anotherLocalModel"), json!("SHOUT"));
    assert_eq!(scope.get("out"), Value::Null);
}

#[test]
fn alias_collisions_are_rejected() {
    let registry = string_registry();
    let scope = Scope::new();
    let result = registry.get("append").unwrap().attach(
        &scope,
        InstanceOptions::new().alias("first", "second"),
    );
    assert!(matches!(
        result,
        Err(ComponentError::Port(PortError::DuplicatePort { .. }))
    ));
}

#[test]
fn aliased_observer_drives_inhibition() {
    let counter = Arc::new(Mutex::new(0));
    let registry = counting_registry(counter.clone());
    let scope = Scope::new();
    let _instance = registry
        .get("upper")
        .unwrap()
        .attach(&scope, InstanceOptions::new().alias("out", "shouted"))
        .unwrap();

    // Watching the original name is not demand for the aliased port.
    let (_s, cb) = recorder();
    let original = scope.watch("out", cb);
    scope.set("text", json!("hi"));
    scope.digest().unwrap();
    assert_eq!(*counter.lock(), 0);
    original.unsubscribe();

    let (seen, cb) = recorder();
    let _aliased = scope.watch("shouted", cb);
    scope.digest().unwrap();
    assert_eq!(*counter.lock(), 1);
    assert_eq!(seen.lock().last(), Some(&json!("HI")));
}

#[test]
fn invalid_input_fails_the_digest() {
    use floweave::ports::{PortSpec, ValueType};
    use floweave::scope::ScopeError;

    let mut registry = ComponentRegistry::new();
    registry
        .register(
            "typed",
            [PortSpec::with_type("n", ValueType::Number)],
            ["out"],
            Transformer::new(|v| v[0].clone()),
        )
        .unwrap();

    let scope = Scope::new();
    let _instance = registry
        .get("typed")
        .unwrap()
        .attach(&scope, InstanceOptions::new().with_no_inhibition(true))
        .unwrap();

    scope.set("n", json!("not a number"));
    assert!(matches!(
        scope.digest(),
        Err(ScopeError::Callback { .. })
    ));
}

#[test]
fn scope_teardown_detaches_the_instance() {
    let counter = Arc::new(Mutex::new(0));
    let registry = counting_registry(counter.clone());
    let root = Scope::new();
    let child = root.new_child();
    let instance = registry
        .get("upper")
        .unwrap()
        .attach(&child, InstanceOptions::new().with_no_inhibition(true))
        .unwrap();

    child.set("text", json!("hello"));
    root.digest().unwrap();
    assert_eq!(*counter.lock(), 1);
    assert!(instance.is_armed());

    child.destroy();
    assert!(!instance.is_armed());
    root.digest().unwrap();
    assert_eq!(*counter.lock(), 1);
}
