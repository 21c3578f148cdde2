//! Shader reflection for pipegpu
//!
//! This crate parses WGSL with `naga`, validates it, and reports for one entry
//! point which resources the stage actually touches, which vertex inputs it
//! declares, and which color outputs it writes. The compiler in `pipegpu`
//! treats this report as authoritative for "what must be bound".

mod error;
mod reflection;
mod resource;

pub use error::ReflectError;
pub use reflection::ShaderReflection;
pub use resource::{ColorOutput, InputFormat, NumericKind, ReflectedBinding, ResourceKind, SampleKind, ShaderStage, StorageAccess, TextureDimension, VertexInput};
