mod common;

use std::sync::Arc;

use common::*;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use floweave::fbp::{compile, FbpError};
use floweave::network::{ConnectionSpec, Graph, Network};

#[test]
fn compiles_the_canonical_example() {
    let graph = compile("'world' -> IN1 greet(concat) OUT -> TEXT shout(upper)").unwrap();

    let mut expected = Graph::default();
    expected
        .processes
        .insert("greet".into(), floweave::network::ProcessSpec::new("concat"));
    expected
        .processes
        .insert("shout".into(), floweave::network::ProcessSpec::new("upper"));
    expected
        .connections
        .insert("greet.in1".into(), ConnectionSpec::constant(json!("world")));
    expected
        .connections
        .insert("shout.text".into(), ConnectionSpec::wire("greet.out"));

    assert_eq!(graph, expected);
}

#[test]
fn multi_line_sources_accumulate() {
    let graph = compile(
        "# feed two constants into one appender\n\
         'hi' -> FIRST greet(append)\n\
         '!' -> SECOND greet\n\
         greet OUT -> TEXT shout(upper)\n",
    )
    .unwrap();

    assert_eq!(graph.processes["greet"].component, "append");
    assert_eq!(
        graph.connections["greet.first"],
        ConnectionSpec::constant(json!("hi"))
    );
    assert_eq!(
        graph.connections["greet.second"],
        ConnectionSpec::constant(json!("!"))
    );
    assert_eq!(
        graph.connections["shout.text"],
        ConnectionSpec::wire("greet.out")
    );
}

#[test]
fn long_chains_link_pairwise() {
    let graph = compile("a OUT -> IN b(beta) OUT -> IN c(gamma)").unwrap();
    assert_eq!(graph.connections["b.in"], ConnectionSpec::wire("a.out"));
    assert_eq!(graph.connections["c.in"], ConnectionSpec::wire("b.out"));
}

#[test]
fn constants_keep_inner_punctuation() {
    let graph = compile("'hello, world!' -> IN sink(store)").unwrap();
    assert_eq!(
        graph.connections["sink.in"],
        ConnectionSpec::constant(json!("hello, world!"))
    );
}

#[test]
fn component_names_allow_dashes_and_slashes() {
    let graph = compile("'x' -> IN p(string-append/v2)").unwrap();
    assert_eq!(graph.processes["p"].component, "string-append/v2");
}

#[test]
fn reannotating_a_node_wins() {
    let graph = compile("'x' -> IN p(first)\n'y' -> IN2 p(second)").unwrap();
    assert_eq!(graph.processes["p"].component, "second");
}

#[test]
fn syntax_errors_carry_position() {
    match compile("ok OUT -> ???") {
        Err(FbpError::Syntax { line, column, .. }) => {
            assert_eq!(line, 1);
            assert!(column > 1);
        }
        other => panic!("expected a syntax error, got {other:?}"),
    }
}

#[test]
fn serialized_graphs_reload_identically() {
    let graph = compile("'world' -> IN1 greet(concat) OUT -> TEXT shout(upper)").unwrap();
    let text = serde_json::to_string(&graph).unwrap();
    let reloaded: Graph = serde_json::from_str(&text).unwrap();
    assert_eq!(graph, reloaded);
}

#[test]
fn fbp_network_end_to_end() {
    let mut network = Network::from_fbp(
        string_registry(),
        "'hi' -> FIRST greet(append)\n\
         '!' -> SECOND greet\n\
         greet OUT -> TEXT shout(upper)",
    )
    .unwrap();

    let result = Arc::new(Mutex::new(Value::Null));
    let sink = result.clone();
    let _probe = network
        .probe("shout.out", move |v, _| *sink.lock() = v.clone())
        .unwrap();
    network.digest().unwrap();

    assert_eq!(*result.lock(), json!("HI!"));
}
