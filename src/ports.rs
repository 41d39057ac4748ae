//! Port declarations and validation for the floweave component model.
//!
//! Every component declares its inputs and outputs as named, contracted
//! ports. This module defines the port data model ([`PortSpec`],
//! [`PortContract`]) and the validation rules shared by component
//! registration and per-instance aliasing:
//!
//! - port names are non-empty and must not contain whitespace or `.`
//!   (both are reserved for `process.port` path syntax);
//! - port names are unique case-insensitively within a list, and across
//!   a companion list when one is supplied (a component's ins and outs
//!   may never collide);
//! - declaration order is preserved, since transformers receive their
//!   inputs positionally.
//!
//! # Examples
//!
//! ```
//! use floweave::ports::{validate_ports, PortDecl, PortSpec, ValueType};
//!
//! let ins = validate_ports(
//!     [
//!         PortDecl::from("text"),
//!         PortDecl::from(PortSpec::with_type("count", ValueType::Number)),
//!     ],
//!     &[],
//! )
//! .unwrap();
//!
//! assert_eq!(ins[0].name, "text");
//! assert_eq!(ins[1].name, "count");
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;

/// Sentinel contract name accepting any value.
pub const ANY_CONTRACT: &str = "all";

/// Default output port name used when a component declares no outs.
pub const DEFAULT_OUT: &str = "out";

// ============================================================================
// Contracts
// ============================================================================

/// Runtime type of a port value.
///
/// Mirrors the non-null runtime types of [`serde_json::Value`]; `null`
/// deliberately has no variant because absent values are exempt from
/// contract checks (see [`PortContract::check`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl ValueType {
    /// Classify a value, returning `None` for `null`.
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(_) => Some(Self::String),
            Value::Number(_) => Some(Self::Number),
            Value::Bool(_) => Some(Self::Boolean),
            Value::Object(_) => Some(Self::Object),
            Value::Array(_) => Some(Self::Array),
        }
    }

    /// Lowercase name used in contract declarations and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ValueType {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(Self::String),
            "number" => Ok(Self::Number),
            "boolean" => Ok(Self::Boolean),
            "object" => Ok(Self::Object),
            "array" => Ok(Self::Array),
            other => Err(PortError::UnknownContract {
                contract: other.to_string(),
            }),
        }
    }
}

/// Predicate form of a port contract.
pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Validation contract attached to a port.
///
/// A contract is a tagged sum: accept anything, require a runtime type,
/// or delegate to a caller-supplied predicate. Dispatch always happens
/// on the tag, never on the shape of the contract value itself.
#[derive(Clone)]
pub enum PortContract {
    /// Accept any value (the `"all"` sentinel).
    Any,
    /// Require a specific runtime type for non-null values.
    Type(ValueType),
    /// Delegate to a predicate for non-null values.
    Predicate(Predicate),
}

impl PortContract {
    /// Parse a contract declaration string.
    ///
    /// `"all"` yields [`PortContract::Any`]; the five runtime type names
    /// yield [`PortContract::Type`]; anything else is rejected.
    pub fn parse(s: &str) -> Result<Self, PortError> {
        if s == ANY_CONTRACT {
            return Ok(Self::Any);
        }
        ValueType::from_str(s).map(Self::Type)
    }

    /// Check a value against this contract.
    ///
    /// `null` models an absent value and always passes: absence is not a
    /// type violation. Failures carry the owning port's name.
    pub fn check(&self, port: &str, value: &Value) -> Result<(), PortError> {
        if value.is_null() {
            return Ok(());
        }
        match self {
            Self::Any => Ok(()),
            Self::Type(expected) => {
                let found = ValueType::of(value);
                if found == Some(*expected) {
                    Ok(())
                } else {
                    Err(PortError::PortType {
                        port: port.to_string(),
                        expected: expected.name().to_string(),
                        found: found.map(|t| t.name()).unwrap_or("null").to_string(),
                    })
                }
            }
            Self::Predicate(predicate) => {
                if predicate(value) {
                    Ok(())
                } else {
                    Err(PortError::PortType {
                        port: port.to_string(),
                        expected: "predicate acceptance".to_string(),
                        found: ValueType::of(value)
                            .map(|t| t.name())
                            .unwrap_or("null")
                            .to_string(),
                    })
                }
            }
        }
    }
}

impl fmt::Debug for PortContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("Any"),
            Self::Type(t) => write!(f, "Type({t})"),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl Default for PortContract {
    fn default() -> Self {
        Self::Any
    }
}

// ============================================================================
// Port specs
// ============================================================================

/// A validated, named input or output slot of a component.
#[derive(Clone, Debug)]
pub struct PortSpec {
    /// Port name; unique case-insensitively within its component.
    pub name: String,
    /// Contract every value flowing through this port must satisfy.
    pub contract: PortContract,
}

impl PortSpec {
    /// A port accepting any value.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contract: PortContract::Any,
        }
    }

    /// A port requiring a runtime type.
    pub fn with_type(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            contract: PortContract::Type(value_type),
        }
    }

    /// A port validated by a predicate.
    pub fn with_predicate(
        name: impl Into<String>,
        predicate: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            contract: PortContract::Predicate(Arc::new(predicate)),
        }
    }

    /// Check a value against this port's contract.
    pub fn check(&self, value: &Value) -> Result<(), PortError> {
        self.contract.check(&self.name, value)
    }
}

/// Loose port declaration accepted by registration APIs.
///
/// A bare string is shorthand for a port accepting any value.
#[derive(Clone, Debug)]
pub enum PortDecl {
    /// Name-only shorthand; expands to an any-contract [`PortSpec`].
    Name(String),
    /// Full specification.
    Spec(PortSpec),
}

impl From<&str> for PortDecl {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for PortDecl {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<PortSpec> for PortDecl {
    fn from(spec: PortSpec) -> Self {
        Self::Spec(spec)
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Expand and validate a list of port declarations.
///
/// String shorthands expand to any-contract specs. Names must be
/// non-empty, free of whitespace and `.`, and unique case-insensitively
/// both within the list and against `other` (pass a component's already
/// validated ins when validating its outs). Output order equals input
/// order.
///
/// # Errors
///
/// [`PortError::InvalidPort`] for malformed names,
/// [`PortError::DuplicatePort`] for case-insensitive collisions.
pub fn validate_ports<I>(decls: I, other: &[PortSpec]) -> Result<Vec<PortSpec>, PortError>
where
    I: IntoIterator,
    I::Item: Into<PortDecl>,
{
    let mut validated: Vec<PortSpec> = Vec::new();
    for decl in decls {
        let spec = match decl.into() {
            PortDecl::Name(name) => PortSpec::new(name),
            PortDecl::Spec(spec) => spec,
        };
        if spec.name.is_empty() || spec.name.contains(char::is_whitespace) || spec.name.contains('.')
        {
            return Err(PortError::InvalidPort {
                name: spec.name.clone(),
            });
        }
        let lower = spec.name.to_lowercase();
        let collides = validated
            .iter()
            .chain(other.iter())
            .any(|vp| vp.name.to_lowercase() == lower);
        if collides {
            return Err(PortError::DuplicatePort {
                name: spec.name.clone(),
            });
        }
        validated.push(spec);
    }
    Ok(validated)
}

/// Find a port by exact (case-sensitive) name.
pub fn find_port<'a>(ports: &'a [PortSpec], name: &str) -> Option<&'a PortSpec> {
    ports.iter().find(|p| p.name == name)
}

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while declaring ports or checking values against them.
#[derive(Debug, Error, Diagnostic)]
pub enum PortError {
    /// Port name is empty or contains reserved characters.
    #[error("invalid port name: {name:?}")]
    #[diagnostic(
        code(floweave::ports::invalid_port),
        help("port names must be non-empty and must not contain whitespace or '.'")
    )]
    InvalidPort { name: String },

    /// Port name collides with another port of the same component.
    #[error("duplicate port name: {name:?}")]
    #[diagnostic(
        code(floweave::ports::duplicate_port),
        help("port names are compared case-insensitively across a component's ins and outs")
    )]
    DuplicatePort { name: String },

    /// Contract declaration names an unknown runtime type.
    #[error("unknown port contract: {contract:?}")]
    #[diagnostic(
        code(floweave::ports::unknown_contract),
        help("valid contracts are \"all\", \"string\", \"number\", \"boolean\", \"object\" and \"array\"")
    )]
    UnknownContract { contract: String },

    /// A value failed its port's contract.
    #[error("invalid value for port '{port}': expected {expected}, got {found}")]
    #[diagnostic(code(floweave::ports::port_type))]
    PortType {
        port: String,
        expected: String,
        found: String,
    },
}
