//! Declarative GPU pipeline compiler on top of wgpu
//!
//! Resources are created through the [`Compiler`] factories and live in
//! id-keyed registries owned by a [`Context`]. A render or compute holder is
//! compiled from shaders plus named attribute and uniform bags: the shaders
//! are reflected, every binding they use is reconciled against the bags, and
//! the bind group layouts, bind groups, vertex layouts and pipeline are
//! derived from the result. Each frame the holder records its pass with
//! [`RenderHolder::build`] or [`ComputeHolder::build`].

pub mod compile;
mod config;
mod context;
pub mod device;
mod error;
mod format;
mod holder;
mod id;
mod property;
pub mod registry;
pub mod res;

pub use compile::Compiler;
pub use config::{ColorAttachmentOptions, DepthStencilOptions, HolderConfig, PrimitiveDesc};
pub use context::{Context, Pipeline};
pub use error::{CompileError, ConfigError, ResourceError};
pub use format::{
    BlendFormat, ColorLoadStoreFormat, CompareFormat, CullFormat, DepthLoadStoreFormat, FrameStage, MultiSampleFormat, MultiSampleFormatParseError, PropertyFormat,
    StencilLoadStoreFormat, StencilStateFormat, TopologyFormat,
};
pub use holder::{ComputeHolder, ComputeHolderDesc, ComputeHook, RenderHolder, RenderHolderDesc};
pub use id::ResourceId;
pub use pipegpu_reflect::{ReflectError, ShaderReflection, ShaderStage};
pub use property::{AsProperty, Attributes, Property, Uniforms};
