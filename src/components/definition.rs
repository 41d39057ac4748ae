//! Component definitions: transformers and their declared port metadata.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::ports::{PortDecl, PortSpec};

/// The callable heart of a component.
pub type TransformFn = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// Instantiation-time parameters handed to a [`compile`](TransformerSource::Compiled)
/// factory.
pub type Locals = FxHashMap<String, Value>;

/// Factory producing a [`Transformer`] lazily, once per instantiation.
pub type CompileFn = Arc<dyn Fn(&Locals) -> Transformer + Send + Sync>;

/// A pure function from positional input values to an output value,
/// optionally carrying declared port-name metadata.
///
/// Transformers receive their inputs positionally, in declared port
/// order, and return either a keyed map (a JSON object whose keys are out
/// port names) or a bare value, which callers wrap under the first out
/// port name.
///
/// The name hints play the role of declared parameter identifiers: when a
/// component is registered without explicit port lists, its ports are
/// derived from the hints attached here.
///
/// # Examples
///
/// ```
/// use floweave::components::Transformer;
/// use serde_json::json;
///
/// let upper = Transformer::new(|values| {
///     json!(values[0].as_str().unwrap_or_default().to_uppercase())
/// })
/// .with_ins(["text"]);
///
/// assert_eq!(upper.invoke(&[json!("hi")]), json!("HI"));
/// ```
#[derive(Clone)]
pub struct Transformer {
    func: TransformFn,
    ins_hint: Option<Vec<String>>,
    outs_hint: Option<Vec<String>>,
}

impl Transformer {
    pub fn new(func: impl Fn(&[Value]) -> Value + Send + Sync + 'static) -> Self {
        Self {
            func: Arc::new(func),
            ins_hint: None,
            outs_hint: None,
        }
    }

    /// Attach declared input names, in positional order.
    pub fn with_ins<I>(mut self, ins: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.ins_hint = Some(ins.into_iter().map(Into::into).collect());
        self
    }

    /// Attach declared output names.
    pub fn with_outs<I>(mut self, outs: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.outs_hint = Some(outs.into_iter().map(Into::into).collect());
        self
    }

    pub fn ins_hint(&self) -> Option<&[String]> {
        self.ins_hint.as_deref()
    }

    pub fn outs_hint(&self) -> Option<&[String]> {
        self.outs_hint.as_deref()
    }

    /// Invoke the underlying function with positional values.
    pub fn invoke(&self, values: &[Value]) -> Value {
        (self.func)(values)
    }
}

impl fmt::Debug for Transformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transformer")
            .field("ins_hint", &self.ins_hint)
            .field("outs_hint", &self.outs_hint)
            .finish_non_exhaustive()
    }
}

/// Where a definition's transformer comes from.
///
/// Exactly one of the two forms is the real function source; `Compiled`
/// is resolved once per instantiation with the instantiation-time locals.
#[derive(Clone)]
pub enum TransformerSource {
    /// A transformer ready to call.
    Ready(Transformer),
    /// A factory invoked once per instantiation.
    Compiled(CompileFn),
}

impl TransformerSource {
    pub fn resolve(&self, locals: &Locals) -> Transformer {
        match self {
            Self::Ready(transformer) => transformer.clone(),
            Self::Compiled(compile) => compile(locals),
        }
    }
}

impl fmt::Debug for TransformerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(t) => f.debug_tuple("Ready").field(t).finish(),
            Self::Compiled(_) => f.write_str("Compiled(..)"),
        }
    }
}

/// Unvalidated component declaration accepted by registration.
///
/// Missing ins fall back to the transformer's input-name hints; missing
/// outs fall back to its output hints, then to a single port named
/// `"out"`.
#[derive(Clone, Debug, Default)]
pub struct ComponentDecl {
    pub ins: Option<Vec<PortDecl>>,
    pub outs: Option<Vec<PortDecl>>,
    pub source: Option<TransformerSource>,
}

impl ComponentDecl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ins<I>(mut self, ins: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<PortDecl>,
    {
        self.ins = Some(ins.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_outs<I>(mut self, outs: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<PortDecl>,
    {
        self.outs = Some(outs.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_transformer(mut self, transformer: Transformer) -> Self {
        self.source = Some(TransformerSource::Ready(transformer));
        self
    }

    /// Declare a lazily compiled transformer.
    pub fn with_compile(
        mut self,
        compile: impl Fn(&Locals) -> Transformer + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(TransformerSource::Compiled(Arc::new(compile)));
        self
    }
}

/// A validated, registered component: ports plus transformer source.
#[derive(Clone, Debug)]
pub struct ComponentDefinition {
    /// Registered name; `None` for anonymous components.
    pub name: Option<String>,
    pub ins: Vec<PortSpec>,
    pub outs: Vec<PortSpec>,
    pub source: TransformerSource,
}
