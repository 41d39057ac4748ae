//! Compiler for the FBP text notation.
//!
//! The notation is line-oriented. A line is blank, a `#` comment, or a
//! statement: a chain of segments joined by `->`. Each segment is one of
//!
//! - an **iip** constant `'some text'`;
//! - a **leftlet** `node PORT`, naming an upstream output;
//! - a **rightlet** `PORT node`, naming a downstream input;
//! - a **bridge** `PORT node PORT`, a node consuming on its left port
//!   and feeding the rest of the chain from its right port.
//!
//! Port tokens are written in upper case (`[A-Z][A-Z0-9]*`) and are
//! lower-cased in the output; node names are alphanumeric. The first
//! mention of a node may annotate it with its component and an optional
//! routing hint: `shout(upper)` or `router(route:path)`. Re-annotating a
//! node later replaces the earlier annotation.
//!
//! Compilation is a pure function from text to the canonical
//! [`Graph`] shape:
//!
//! ```
//! use floweave::fbp::compile;
//!
//! let graph = compile("'world' -> IN1 greet(concat) OUT -> TEXT shout(upper)").unwrap();
//! assert_eq!(graph.processes["greet"].component, "concat");
//! assert_eq!(
//!     graph.connections["shout.text"].from.as_deref(),
//!     Some("greet.out")
//! );
//! assert_eq!(
//!     graph.connections["greet.in1"].data,
//!     Some(serde_json::json!("world"))
//! );
//! ```

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;
use tracing::trace;

use crate::network::{ConnectionSpec, Graph, ProcessMetadata, ProcessSpec};

/// Errors raised while compiling FBP text.
#[derive(Debug, Error, Diagnostic)]
pub enum FbpError {
    #[error("syntax error at line {line}, column {column}: expected {expected}")]
    #[diagnostic(
        code(floweave::fbp::syntax),
        help("statements are chains of segments joined by '->': constants ('text'), `node PORT`, `PORT node` and `PORT node PORT`")
    )]
    Syntax {
        line: usize,
        column: usize,
        expected: String,
    },
}

/// Compile FBP source text into a graph.
pub fn compile(source: &str) -> Result<Graph, FbpError> {
    let mut processes: FxHashMap<String, ProcessSpec> = FxHashMap::default();
    let mut items: Vec<FlatItem> = Vec::new();

    for (index, line) in source.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut cursor = Cursor::new(line, index + 1);
        parse_statement(&mut cursor, &mut processes, &mut items)?;
    }

    // The chains flatten into one interleaved stream consumed pairwise:
    // a source (wire or constant) followed by the sink path it feeds.
    let mut connections: FxHashMap<String, ConnectionSpec> = FxHashMap::default();
    let mut pending: Option<FlatItem> = None;
    for (i, item) in items.into_iter().enumerate() {
        if i % 2 == 0 {
            pending = Some(item);
        } else if let (Some(FlatItem::Source(spec)), FlatItem::Sink(path)) =
            (pending.take(), item)
        {
            trace!(to = %path, "fbp connection");
            connections.insert(path, spec);
        }
    }

    Ok(Graph {
        processes,
        connections,
    })
}

/// One element of the flattened chain stream.
enum FlatItem {
    /// A destination path.
    Sink(String),
    /// What feeds the following sink.
    Source(ConnectionSpec),
}

struct Cursor {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl Cursor {
    fn new(line: &str, number: usize) -> Self {
        Self {
            chars: line.chars().collect(),
            pos: 0,
            line: number,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c == ' ' || c == '\t') {
            self.pos += 1;
        }
    }

    fn eat(&mut self, literal: &str) -> bool {
        let end = self.pos + literal.chars().count();
        if end <= self.chars.len()
            && self.chars[self.pos..end].iter().copied().eq(literal.chars())
        {
            self.pos = end;
            true
        } else {
            false
        }
    }

    fn error(&self, expected: impl Into<String>) -> FbpError {
        FbpError::Syntax {
            line: self.line,
            column: self.pos + 1,
            expected: expected.into(),
        }
    }
}

fn parse_statement(
    cursor: &mut Cursor,
    processes: &mut FxHashMap<String, ProcessSpec>,
    items: &mut Vec<FlatItem>,
) -> Result<(), FbpError> {
    loop {
        cursor.skip_ws();
        parse_segment(cursor, processes, items)?;
        cursor.skip_ws();
        if cursor.eat("->") {
            continue;
        }
        if cursor.at_end() {
            return Ok(());
        }
        return Err(cursor.error("'->' or end of line"));
    }
}

fn parse_segment(
    cursor: &mut Cursor,
    processes: &mut FxHashMap<String, ProcessSpec>,
    items: &mut Vec<FlatItem>,
) -> Result<(), FbpError> {
    if cursor.peek() == Some('\'') {
        let data = parse_iip(cursor)?;
        items.push(FlatItem::Source(ConnectionSpec::constant(Value::String(
            data,
        ))));
        return Ok(());
    }

    // Port-led segments: a bridge when a second port follows the node,
    // else a rightlet.
    let start = cursor.pos;
    if let Some(left) = read_port(cursor) {
        cursor.skip_ws();
        if let Some((node, annotation)) = read_node(cursor)? {
            register_annotation(processes, &node, annotation);
            let save = cursor.pos;
            cursor.skip_ws();
            if let Some(right) = read_port(cursor) {
                items.push(FlatItem::Sink(format!("{node}.{left}")));
                items.push(FlatItem::Source(ConnectionSpec::wire(format!(
                    "{node}.{right}"
                ))));
                return Ok(());
            }
            cursor.pos = save;
            items.push(FlatItem::Sink(format!("{node}.{left}")));
            return Ok(());
        }
        cursor.pos = start;
    }

    // Node-led segment: a leftlet.
    if let Some((node, annotation)) = read_node(cursor)? {
        register_annotation(processes, &node, annotation);
        cursor.skip_ws();
        if let Some(port) = read_port(cursor) {
            items.push(FlatItem::Source(ConnectionSpec::wire(format!(
                "{node}.{port}"
            ))));
            return Ok(());
        }
        return Err(cursor.error("a port name"));
    }

    Err(cursor.error("a connection segment"))
}

/// `'any text'` — a constant.
fn parse_iip(cursor: &mut Cursor) -> Result<String, FbpError> {
    debug_assert_eq!(cursor.peek(), Some('\''));
    cursor.bump();
    let mut text = String::new();
    loop {
        match cursor.bump() {
            Some('\'') => return Ok(text),
            Some(c) => text.push(c),
            None => return Err(cursor.error("closing ' of a constant")),
        }
    }
}

/// `[A-Z][A-Z0-9]*` followed by a whitespace or line-end boundary;
/// lower-cased. Restores the cursor and yields `None` when the shape
/// does not match.
fn read_port(cursor: &mut Cursor) -> Option<String> {
    let start = cursor.pos;
    match cursor.peek() {
        Some(c) if c.is_ascii_uppercase() => cursor.bump(),
        _ => return None,
    };
    let mut name = String::new();
    name.push(cursor.chars[start]);
    while let Some(c) = cursor.peek() {
        if c.is_ascii_uppercase() || c.is_ascii_digit() {
            name.push(c);
            cursor.bump();
        } else {
            break;
        }
    }
    match cursor.peek() {
        None => Some(name.to_lowercase()),
        Some(c) if c == ' ' || c == '\t' => Some(name.to_lowercase()),
        _ => {
            cursor.pos = start;
            None
        }
    }
}

type Annotation = (String, Option<String>);

/// `[a-zA-Z0-9]+` with an optional `(component:meta)` annotation.
fn read_node(cursor: &mut Cursor) -> Result<Option<(String, Option<Annotation>)>, FbpError> {
    let mut name = String::new();
    while let Some(c) = cursor.peek() {
        if c.is_ascii_alphanumeric() {
            name.push(c);
            cursor.bump();
        } else {
            break;
        }
    }
    if name.is_empty() {
        return Ok(None);
    }
    if cursor.peek() != Some('(') {
        return Ok(Some((name, None)));
    }
    cursor.bump();
    let mut component = String::new();
    while let Some(c) = cursor.peek() {
        if c.is_ascii_alphabetic() || c == '/' || c == '-' {
            component.push(c);
            cursor.bump();
        } else {
            break;
        }
    }
    let meta = if cursor.peek() == Some(':') {
        cursor.bump();
        let mut meta = String::new();
        while let Some(c) = cursor.peek() {
            if c.is_ascii_alphabetic() || c == '/' {
                meta.push(c);
                cursor.bump();
            } else {
                break;
            }
        }
        if meta.is_empty() {
            return Err(cursor.error("a routing hint after ':'"));
        }
        Some(meta)
    } else {
        None
    };
    if cursor.peek() != Some(')') {
        return Err(cursor.error("')' closing the component annotation"));
    }
    cursor.bump();
    Ok(Some((name, Some((component, meta)))))
}

/// Fold a `(component:meta)` annotation into the processes map. The node
/// entry is created on first annotation; a later annotation wins.
fn register_annotation(
    processes: &mut FxHashMap<String, ProcessSpec>,
    node: &str,
    annotation: Option<Annotation>,
) {
    let Some((component, meta)) = annotation else {
        return;
    };
    let entry = processes.entry(node.to_string()).or_default();
    if !component.is_empty() {
        entry.component = component;
    }
    if let Some(meta) = meta {
        entry.metadata = Some(ProcessMetadata {
            routes: meta.split(',').map(str::to_string).collect(),
        });
    }
}
