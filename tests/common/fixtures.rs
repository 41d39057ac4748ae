#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use floweave::components::{ComponentRegistry, Transformer};

/// Uppercase a string input: ins `[text]`, outs `[out]`.
pub fn upper_transformer() -> Transformer {
    Transformer::new(|v| json!(v[0].as_str().unwrap_or_default().to_uppercase()))
        .with_ins(["text"])
        .with_outs(["out"])
}

/// Concatenate two string inputs: ins `[first, second]`, outs `[out]`.
pub fn append_transformer() -> Transformer {
    Transformer::new(|v| {
        json!(format!(
            "{}{}",
            v[0].as_str().unwrap_or_default(),
            v[1].as_str().unwrap_or_default()
        ))
    })
    .with_ins(["first", "second"])
    .with_outs(["out"])
}

/// A registry with the two string components most tests wire together.
pub fn string_registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    registry
        .register("upper", ["text"], ["out"], upper_transformer())
        .unwrap()
        .register(
            "append",
            ["first", "second"],
            ["out"],
            append_transformer(),
        )
        .unwrap();
    registry
}

/// Shared recorder for probe/watch callbacks: returns the log handle and
/// a callback pushing every new value into it.
#[allow(clippy::type_complexity)]
pub fn recorder() -> (
    Arc<Mutex<Vec<Value>>>,
    impl FnMut(&Value, &Value) + Send + 'static,
) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |new: &Value, _old: &Value| {
        sink.lock().push(new.clone())
    })
}

/// A transformer that counts its invocations, for activation tests.
pub fn counting_upper(counter: Arc<Mutex<usize>>) -> Transformer {
    Transformer::new(move |v| {
        *counter.lock() += 1;
        json!(v[0].as_str().unwrap_or_default().to_uppercase())
    })
    .with_ins(["text"])
    .with_outs(["out"])
}
