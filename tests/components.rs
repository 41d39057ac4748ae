mod common;

use common::*;
use serde_json::{json, Value};

use floweave::components::{
    ComponentDecl, ComponentError, ComponentRegistry, Transformer,
};
use floweave::ports::{PortContract, PortError, PortSpec, ValueType};

#[test]
fn register_with_explicit_ports() {
    let mut registry = ComponentRegistry::new();
    registry
        .register("upper", ["text"], ["out"], upper_transformer())
        .unwrap();

    let factory = registry.get("upper").unwrap();
    assert_eq!(factory.name(), Some("upper"));
    assert_eq!(factory.ins().len(), 1);
    assert_eq!(factory.ins()[0].name, "text");
    assert!(matches!(factory.ins()[0].contract, PortContract::Any));
    assert_eq!(factory.outs()[0].name, "out");
}

#[test]
fn register_derives_ports_from_transformer_hints() {
    let mut registry = ComponentRegistry::new();
    registry
        .register_transformer("append", append_transformer())
        .unwrap();

    let factory = registry.get("append").unwrap();
    let in_names: Vec<_> = factory.ins().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(in_names, ["first", "second"]);
    assert_eq!(factory.outs()[0].name, "out");
}

#[test]
fn outs_default_to_a_single_out_port() {
    let mut registry = ComponentRegistry::new();
    registry
        .register_transformer(
            "id",
            Transformer::new(|v| v.first().cloned().unwrap_or(Value::Null)).with_ins(["value"]),
        )
        .unwrap();

    let factory = registry.get("id").unwrap();
    assert_eq!(factory.outs().len(), 1);
    assert_eq!(factory.outs()[0].name, "out");
}

#[test]
fn register_all_validates_each_entry() {
    let mut registry = ComponentRegistry::new();
    registry
        .register_all([
            (
                "upper",
                ComponentDecl::new()
                    .with_ins(["text"])
                    .with_transformer(upper_transformer()),
            ),
            (
                "append",
                ComponentDecl::new()
                    .with_ins(["first", "second"])
                    .with_transformer(append_transformer()),
            ),
        ])
        .unwrap();

    assert_eq!(registry.list(), ["upper", "append"]);
}

#[test]
fn registration_without_transformer_is_rejected() {
    let mut registry = ComponentRegistry::new();
    let result = registry.register_decl("broken", ComponentDecl::new().with_ins(["a"]));
    assert!(matches!(
        result,
        Err(ComponentError::InvalidTransformer { .. })
    ));
}

#[test]
fn empty_name_is_rejected() {
    let mut registry = ComponentRegistry::new();
    let result = registry.register_transformer("", upper_transformer());
    assert!(matches!(
        result,
        Err(ComponentError::InvalidComponentName { .. })
    ));
}

#[test]
fn colliding_ins_and_outs_are_rejected() {
    let mut registry = ComponentRegistry::new();
    let result = registry.register("clash", ["x"], ["x"], upper_transformer());
    assert!(matches!(
        result,
        Err(ComponentError::Port(PortError::DuplicatePort { .. }))
    ));
}

#[test]
fn invalid_port_names_are_rejected() {
    let mut registry = ComponentRegistry::new();
    for bad in ["a.b", "has space"] {
        let result = registry.register("c", [bad], ["out"], upper_transformer());
        assert!(
            matches!(result, Err(ComponentError::Port(PortError::InvalidPort { .. }))),
            "expected {bad:?} to be rejected"
        );
    }
}

#[test]
fn unknown_component_is_reported() {
    let registry = ComponentRegistry::new();
    assert!(matches!(
        registry.get("missing"),
        Err(ComponentError::ComponentNotFound { .. })
    ));
}

#[test]
fn last_registration_wins() {
    let mut registry = ComponentRegistry::new();
    registry
        .register("c", ["text"], ["out"], upper_transformer())
        .unwrap()
        .register("c", ["first", "second"], ["out"], append_transformer())
        .unwrap();

    let factory = registry.get("c").unwrap();
    assert_eq!(factory.ins().len(), 2);
    assert_eq!(registry.list(), ["c"]);
}

#[test]
fn anonymous_components_are_not_stored() {
    let registry = ComponentRegistry::new();
    let factory = registry
        .anonymous(upper_transformer(), Some(["shout"]))
        .unwrap();
    assert_eq!(factory.name(), None);
    assert_eq!(factory.outs()[0].name, "shout");
    assert!(registry.list().is_empty());
}

#[test]
fn compile_source_resolves_per_instantiation() {
    use std::sync::Arc;
    use parking_lot::Mutex;

    let resolved = Arc::new(Mutex::new(0usize));
    let hits = resolved.clone();
    let mut registry = ComponentRegistry::new();
    registry
        .register_decl(
            "suffixer",
            ComponentDecl::new()
                .with_ins(["text"])
                .with_outs(["out"])
                .with_compile(move |locals| {
                    *hits.lock() += 1;
                    let suffix = locals
                        .get("suffix")
                        .and_then(|v| v.as_str())
                        .unwrap_or("?")
                        .to_string();
                    Transformer::new(move |v| {
                        json!(format!("{}{}", v[0].as_str().unwrap_or_default(), suffix))
                    })
                }),
        )
        .unwrap();

    assert_eq!(*resolved.lock(), 0, "compile must not run at registration");

    let locals = [("suffix".to_string(), json!("!"))].into_iter().collect();
    let factory = registry.get_with("suffixer", &locals).unwrap();
    assert_eq!(*resolved.lock(), 1);
    let outs = factory.call(&[json!("hey")]).unwrap();
    assert_eq!(outs["out"], json!("hey!"));
}

#[test]
fn call_validates_inputs() {
    let mut registry = ComponentRegistry::new();
    registry
        .register(
            "typed",
            [PortSpec::with_type("n", ValueType::Number)],
            ["out"],
            Transformer::new(|v| v[0].clone()),
        )
        .unwrap();

    let factory = registry.get("typed").unwrap();
    factory.call(&[json!(3)]).unwrap();
    // absence is not a type violation
    factory.call(&[Value::Null]).unwrap();
    assert!(matches!(
        factory.call(&[json!("three")]),
        Err(PortError::PortType { .. })
    ));
}

#[test]
fn bare_return_values_wrap_under_the_first_out_port() {
    let mut registry = ComponentRegistry::new();
    registry
        .register(
            "wrapped",
            ["x"],
            ["primary", "secondary"],
            Transformer::new(|v| v[0].clone()),
        )
        .unwrap();

    let outs = registry.get("wrapped").unwrap().call(&[json!(7)]).unwrap();
    assert_eq!(outs["primary"], json!(7));
    assert_eq!(outs["secondary"], Value::Null);
}

#[test]
fn keyed_returns_are_restricted_to_declared_ports() {
    let mut registry = ComponentRegistry::new();
    registry
        .register(
            "chatty",
            ["x"],
            ["kept"],
            Transformer::new(|v| json!({ "kept": v[0], "dropped": "noise" })),
        )
        .unwrap();

    let outs = registry.get("chatty").unwrap().call(&[json!(1)]).unwrap();
    assert_eq!(outs.len(), 1);
    assert_eq!(outs["kept"], json!(1));
}

#[test]
fn output_contracts_are_checked() {
    let mut registry = ComponentRegistry::new();
    registry
        .register(
            "lying",
            ["x"],
            [PortSpec::with_type("out", ValueType::Number)],
            Transformer::new(|_| json!("not a number")),
        )
        .unwrap();

    assert!(matches!(
        registry.get("lying").unwrap().call(&[Value::Null]),
        Err(PortError::PortType { .. })
    ));
}

#[test]
fn predicate_contracts_reject_values() {
    let mut registry = ComponentRegistry::new();
    registry
        .register(
            "evens",
            [PortSpec::with_predicate("n", |v| {
                v.as_i64().map(|n| n % 2 == 0).unwrap_or(false)
            })],
            ["out"],
            Transformer::new(|v| v[0].clone()),
        )
        .unwrap();

    let factory = registry.get("evens").unwrap();
    factory.call(&[json!(2)]).unwrap();
    assert!(factory.call(&[json!(3)]).is_err());
}

#[test]
fn registered_ports_round_trip_through_get() {
    let registry = string_registry();
    let factory = registry.get("append").unwrap();
    assert!(factory.get_in_named("first").is_some());
    assert!(factory.get_in_named("missing").is_none());
    assert!(factory.get_out_named("out").is_some());
    assert!(factory.get_out_named("first").is_none());
}
