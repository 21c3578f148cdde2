//! Error types

use crate::{PropertyFormat, ResourceId};
use pipegpu_reflect::{ReflectError, ShaderStage};
use thiserror::Error;

/// Errors raised by resources and registries
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("{kind} {id} is not registered")]
    UnknownResource { kind: &'static str, id: ResourceId },

    #[error("{kind} {id} has a zero size")]
    ZeroSize { kind: &'static str, id: ResourceId },

    #[error("{what} of {value} reaches the device limit of {limit}")]
    LimitExceeded { what: &'static str, value: u64, limit: u64 },

    #[error("{what} of {value} is not a multiple of {alignment}")]
    Misaligned { what: &'static str, value: u64, alignment: u64 },

    #[error("write of {len} bytes at offset {offset} does not fit buffer {id} of {size} bytes")]
    WriteOutOfBounds { id: ResourceId, offset: u64, len: u64, size: u64 },

    #[error("buffer {id} is not a map buffer")]
    NotMappable { id: ResourceId },

    #[error("texture {id} requests {requested} mip levels, at most {max} are possible")]
    TooManyMipLevels { id: ResourceId, requested: u32, max: u32 },

    #[error("texture {id} has {layers} layers, layer {layer} is out of range")]
    LayerOutOfRange { id: ResourceId, layer: u32, layers: u32 },

    #[error("texture {id} has {layers} layers but {actual} layers of contents were supplied")]
    LayerCountMismatch { id: ResourceId, layers: u32, actual: usize },

    #[error("texture {id} was not created with {usage:?} usage")]
    UsageNotSupported { id: ResourceId, usage: wgpu::TextureUsages },

    #[error("texture {id} has no declared usage, call one of the use_as_* methods first")]
    UsageNotDeclared { id: ResourceId },

    #[error("texture {id} has no storage view for mip level {level}")]
    MipLevelOutOfRange { id: ResourceId, level: u32 },

    #[error("texture {id} has format {format:?}, a depth-stencil attachment needs a depth or stencil format")]
    NotDepthStencil { id: ResourceId, format: wgpu::TextureFormat },

    #[error("no surface texture is available for the current frame")]
    SurfaceUnavailable,
}

/// Errors raised while compiling a holder
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Reflect(#[from] ReflectError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("no {0} shader was supplied")]
    MissingShader(ShaderStage),

    #[error("shader {id} was created as a {expected} shader but its entry point is a {found} entry point")]
    ShaderStageMismatch { id: ResourceId, expected: ShaderStage, found: ShaderStage },

    #[error("attribute '{name}' is a {format}, attributes must be vertex buffers")]
    UnsupportedAttribute { name: String, format: PropertyFormat },

    #[error("uniform '{name}' is a {format}, which cannot be bound")]
    UnsupportedUniform { name: String, format: PropertyFormat },

    #[error("vertex input '{name}' has no assigned attribute")]
    AttributeNotAssigned { name: String },

    #[error("vertex input '{name}' has no matching vertex format")]
    UnsupportedVertexInput { name: String },

    #[error("uniform '{name}' (group {group}, binding {binding}) is not assigned")]
    UniformNotAssigned { name: String, group: u32, binding: u32 },

    #[error("uniform '{name}' is a {format} but the shader expects a {expected}")]
    UniformKindMismatch { name: String, expected: &'static str, format: PropertyFormat },

    #[error("{stage} stage uses {count} bind groups, the device allows fewer than {limit}")]
    TooManyBindGroups { stage: ShaderStage, count: usize, limit: u32 },

    #[error("bind group {group} is at or above the device limit of {limit} bind groups")]
    GroupOutOfRange { group: u32, limit: u32 },

    #[error("group {group} binding {binding} is declared as both '{first}' and '{second}'")]
    ConflictingBinding { group: u32, binding: u32, first: String, second: String },

    #[error("'{name}' is declared with different resource kinds across stages")]
    ConflictingKind { name: String },

    #[error("bind group {group} entries analysis error: the layout expects {expected} entries, {actual} were resolved")]
    BindGroupEntryMismatch { group: u32, expected: usize, actual: usize },

    #[error("invalid dispatch: {0}")]
    InvalidDispatch(String),

    #[error("fragment output @location({location}) has no color attachment")]
    MissingColorTarget { location: u32 },

    #[error("depth-stencil attachment has {actual} samples, the pipeline uses {expected}")]
    DepthSampleCountMismatch { expected: u32, actual: u32 },

    #[error("color attachment {index} has {actual} samples, the pipeline uses {expected}")]
    SampleCountMismatch { index: usize, expected: u32, actual: u32 },
}

/// Errors raised while loading a holder configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Yaml(#[from] serde_norway::Error),
}
