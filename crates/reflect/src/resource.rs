//! Reflected resource descriptions
//!
//! Plain data types describing what a single shader entry point binds and
//! consumes. They are independent of any GPU API so that they can be dumped
//! as JSON and compared in tests.

use serde::Serialize;

/// Pipeline stage an entry point runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

/// View dimension a texture binding is declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextureDimension {
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "2d")]
    D2,
    #[serde(rename = "2d-array")]
    D2Array,
    #[serde(rename = "cube")]
    Cube,
    #[serde(rename = "cube-array")]
    CubeArray,
    #[serde(rename = "3d")]
    D3,
}

/// Sample type of a sampled texture binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    Float,
    Depth,
    Sint,
    Uint,
}

/// Access mode of a storage buffer or storage texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageAccess {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl StorageAccess {
    /// Converts naga's load/store flags into an access mode
    pub(crate) fn from_naga(access: naga::StorageAccess) -> Self {
        let load = access.contains(naga::StorageAccess::LOAD);
        let store = access.contains(naga::StorageAccess::STORE);
        match (load, store) {
            (true, true) => Self::ReadWrite,
            (false, true) => Self::WriteOnly,
            _ => Self::ReadOnly,
        }
    }
}

/// The kind of resource a binding expects
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ResourceKind {
    /// `var<uniform>`
    UniformBuffer,
    /// `var<storage, ...>`
    StorageBuffer { read_only: bool },
    /// `texture_*` sampled or depth texture
    Texture {
        dimension: TextureDimension,
        sample: SampleKind,
        multisampled: bool,
    },
    /// `texture_storage_*`
    StorageTexture {
        dimension: TextureDimension,
        access: StorageAccess,
        /// naga's name of the declared texel format, e.g. `R32Float`
        format: String,
    },
    /// `sampler` or `sampler_comparison`
    Sampler { comparison: bool },
}

impl ResourceKind {
    /// Returns true for uniform and storage buffers
    pub fn is_buffer(&self) -> bool {
        matches!(self, Self::UniformBuffer | Self::StorageBuffer { .. })
    }

    /// Short human-readable name used in diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Self::UniformBuffer => "uniform buffer",
            Self::StorageBuffer { .. } => "storage buffer",
            Self::Texture { .. } => "texture",
            Self::StorageTexture { .. } => "storage texture",
            Self::Sampler { comparison: false } => "sampler",
            Self::Sampler { comparison: true } => "comparison sampler",
        }
    }
}

/// One resource global used by an entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReflectedBinding {
    /// Global variable name in the shader
    pub name: String,
    /// `@group` index
    pub group: u32,
    /// `@binding` index
    pub binding: u32,
    /// What has to be bound at this slot
    pub kind: ResourceKind,
    /// Byte size of the bound type, for buffers
    pub size: Option<u64>,
}

/// Numeric class of a vertex input component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericKind {
    Float,
    Sint,
    Uint,
}

/// Shape of a vertex input: component kind, count and byte width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InputFormat {
    pub kind: NumericKind,
    pub components: u32,
    pub width: u32,
}

impl InputFormat {
    /// Size in bytes of one input element
    pub fn byte_size(&self) -> u32 {
        self.components * self.width
    }
}

/// A `@location` input of a vertex entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VertexInput {
    pub name: String,
    pub location: u32,
    pub format: InputFormat,
}

/// A `@location` output of a fragment entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColorOutput {
    pub location: u32,
    pub components: u32,
}
