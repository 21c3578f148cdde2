//! Error type for shader reflection

use crate::ShaderStage;
use std::fmt;

/// Errors produced while reflecting a shader entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReflectError {
    /// The WGSL source failed to parse (rendered diagnostic)
    Parse(String),
    /// The parsed module failed validation (rendered diagnostic)
    Validation(String),
    /// No entry point with this name exists in the module
    EntryPointNotFound(String),
    /// A resource global has a type that cannot be bound (global name, reason)
    UnsupportedBinding(String, &'static str),
    /// A vertex input has a type with no vertex format (input name)
    UnsupportedVertexInput(String),
    /// The entry point runs in a stage pipegpu does not drive
    UnsupportedStage(String),
}

impl ReflectError {
    /// Returns true if the error came from the WGSL front end or validator
    pub fn is_source_error(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::Validation(_))
    }
}

impl fmt::Display for ReflectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(message) => write!(f, "WGSL parse error:\n{message}"),
            Self::Validation(message) => write!(f, "WGSL validation error:\n{message}"),
            Self::EntryPointNotFound(name) => write!(f, "Entry point '{name}' not found"),
            Self::UnsupportedBinding(name, reason) => write!(f, "Resource '{name}' cannot be bound: {reason}"),
            Self::UnsupportedVertexInput(name) => write!(f, "Vertex input '{name}' has no matching vertex format"),
            Self::UnsupportedStage(name) => write!(f, "Entry point '{name}' is not a vertex, fragment or compute stage"),
        }
    }
}

impl std::error::Error for ReflectError {}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => write!(f, "vertex"),
            Self::Fragment => write!(f, "fragment"),
            Self::Compute => write!(f, "compute"),
        }
    }
}
