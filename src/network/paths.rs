//! `process.port` path parsing.

use std::fmt;

use super::NetworkError;

/// A parsed `process.port` destination or source.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PortPath {
    pub process: String,
    pub port: String,
}

impl fmt::Display for PortPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.process, self.port)
    }
}

/// Parse a `process.port` path.
///
/// The split happens at the last `.`; the process segment is trimmed of
/// surrounding whitespace, quotes and brackets so paths lifted out of
/// expression text still resolve. Both segments must be non-empty.
///
/// # Errors
///
/// [`NetworkError::InvalidProcessPath`] for anything else.
pub fn parse_port_path(path: &str) -> Result<PortPath, NetworkError> {
    let invalid = || NetworkError::InvalidProcessPath {
        path: path.to_string(),
    };
    if path.is_empty() || path.starts_with('.') {
        return Err(invalid());
    }
    let dot = path.rfind('.').ok_or_else(invalid)?;
    let port = &path[dot + 1..];
    if port.is_empty() {
        return Err(invalid());
    }
    let process =
        path[..dot].trim_matches(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '[' | ']'));
    if process.is_empty() {
        return Err(invalid());
    }
    Ok(PortPath {
        process: process.to_string(),
        port: port.to_string(),
    })
}
