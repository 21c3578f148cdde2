//! Named formats used in descriptors and configuration files
//!
//! Each format is a closed enum with the camelCase or kebab-case names used in
//! YAML holder configurations. The lenient formats (cull mode, blend, compare)
//! carry an `Unrecognized` variant: an unknown value is logged and replaced by
//! a safe default instead of failing the compile.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// The two fixed synchronization points around a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameStage {
    /// Before the pass is recorded
    Begin,
    /// After the pass is recorded
    Finish,
}

/// Resource kind tag of a property in an attribute or uniform bag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PropertyFormat {
    VertexBuffer,
    IndexBuffer,
    UniformBuffer,
    StorageBuffer,
    IndexedStorageBuffer,
    IndirectBuffer,
    IndexedIndirectBuffer,
    MapBuffer,
    #[serde(rename = "texture2D")]
    Texture2D,
    #[serde(rename = "textureStorage2D")]
    TextureStorage2D,
    #[serde(rename = "texture2DArray")]
    Texture2DArray,
    TextureCube,
    TextureSurface,
    TextureSampler,
}

impl fmt::Display for PropertyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::VertexBuffer => "vertexBuffer",
            Self::IndexBuffer => "indexBuffer",
            Self::UniformBuffer => "uniformBuffer",
            Self::StorageBuffer => "storageBuffer",
            Self::IndexedStorageBuffer => "indexedStorageBuffer",
            Self::IndirectBuffer => "indirectBuffer",
            Self::IndexedIndirectBuffer => "indexedIndirectBuffer",
            Self::MapBuffer => "mapBuffer",
            Self::Texture2D => "texture2D",
            Self::TextureStorage2D => "textureStorage2D",
            Self::Texture2DArray => "texture2DArray",
            Self::TextureCube => "textureCube",
            Self::TextureSurface => "textureSurface",
            Self::TextureSampler => "textureSampler",
        };
        f.write_str(name)
    }
}

/// Primitive topology
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TopologyFormat {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
}

impl TopologyFormat {
    pub fn to_wgpu(self) -> wgpu::PrimitiveTopology {
        match self {
            Self::PointList => wgpu::PrimitiveTopology::PointList,
            Self::LineList => wgpu::PrimitiveTopology::LineList,
            Self::LineStrip => wgpu::PrimitiveTopology::LineStrip,
            Self::TriangleList => wgpu::PrimitiveTopology::TriangleList,
            Self::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        }
    }

    /// Strip topologies need a strip index format when drawing indexed
    pub fn is_strip(self) -> bool {
        matches!(self, Self::LineStrip | Self::TriangleStrip)
    }
}

/// Front face winding combined with the face that gets culled
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum CullFormat {
    /// Counter-clockwise front faces, nothing culled
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "frontCCW")]
    FrontCcw,
    #[serde(rename = "frontCW")]
    FrontCw,
    #[serde(rename = "backCCW")]
    BackCcw,
    #[serde(rename = "backCW")]
    BackCw,
    #[serde(other)]
    Unrecognized,
}

impl From<&str> for CullFormat {
    fn from(value: &str) -> Self {
        match value {
            "none" => Self::None,
            "frontCCW" => Self::FrontCcw,
            "frontCW" => Self::FrontCw,
            "backCCW" => Self::BackCcw,
            "backCW" => Self::BackCw,
            _ => Self::Unrecognized,
        }
    }
}

impl CullFormat {
    /// Front face and cull mode; unrecognized values fall back to no culling
    pub fn to_wgpu(self) -> (wgpu::FrontFace, Option<wgpu::Face>) {
        match self {
            Self::None => (wgpu::FrontFace::Ccw, None),
            Self::FrontCcw => (wgpu::FrontFace::Ccw, Some(wgpu::Face::Front)),
            Self::FrontCw => (wgpu::FrontFace::Cw, Some(wgpu::Face::Front)),
            Self::BackCcw => (wgpu::FrontFace::Ccw, Some(wgpu::Face::Back)),
            Self::BackCw => (wgpu::FrontFace::Cw, Some(wgpu::Face::Back)),
            Self::Unrecognized => {
                warn!("unrecognized cull format, culling disabled");
                (wgpu::FrontFace::Ccw, None)
            }
        }
    }
}

/// Blend configuration of a color target
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum BlendFormat {
    /// Source replaces destination
    #[default]
    #[serde(rename = "opaque")]
    Opaque,
    /// `src * src.a + dst` on color and alpha
    #[serde(rename = "addAlphaSrcOneDst")]
    AddAlphaSrcOneDst,
    /// No blend state at all
    #[serde(rename = "disable")]
    Disable,
    #[serde(other)]
    Unrecognized,
}

impl BlendFormat {
    pub fn to_wgpu(self) -> Option<wgpu::BlendState> {
        match self {
            Self::Opaque => Some(wgpu::BlendState::REPLACE),
            Self::AddAlphaSrcOneDst => {
                let component = wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::SrcAlpha,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                };
                Some(wgpu::BlendState { color: component, alpha: component })
            }
            Self::Disable => None,
            Self::Unrecognized => {
                warn!("unrecognized blend format, blending disabled");
                None
            }
        }
    }
}

/// Load and store behavior of a color attachment
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ColorLoadStoreFormat {
    #[default]
    ClearStore,
    LoadStore,
}

/// Load and store behavior of the depth aspect
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DepthLoadStoreFormat {
    #[default]
    ClearStore,
    LoadStore,
}

/// Load and store behavior of the stencil aspect
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StencilLoadStoreFormat {
    ClearStore,
    #[default]
    LoadStore,
}

/// Stencil test and operations applied to both faces
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StencilStateFormat {
    /// Always pass, keep every value, masks zero
    #[default]
    AlwaysKeep,
}

impl StencilStateFormat {
    pub fn to_wgpu(self) -> wgpu::StencilState {
        match self {
            Self::AlwaysKeep => {
                let face = wgpu::StencilFaceState {
                    compare: wgpu::CompareFunction::Always,
                    fail_op: wgpu::StencilOperation::Keep,
                    depth_fail_op: wgpu::StencilOperation::Keep,
                    pass_op: wgpu::StencilOperation::Keep,
                };
                wgpu::StencilState {
                    front: face,
                    back: face,
                    read_mask: 0,
                    write_mask: 0,
                }
            }
        }
    }
}

/// Compare function for depth tests and comparison samplers
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompareFormat {
    Never,
    Less,
    Equal,
    #[default]
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
    #[serde(other)]
    Unrecognized,
}

impl CompareFormat {
    /// The compare function, or `None` for an unrecognized value
    pub fn to_wgpu(self) -> Option<wgpu::CompareFunction> {
        match self {
            Self::Never => Some(wgpu::CompareFunction::Never),
            Self::Less => Some(wgpu::CompareFunction::Less),
            Self::Equal => Some(wgpu::CompareFunction::Equal),
            Self::LessEqual => Some(wgpu::CompareFunction::LessEqual),
            Self::Greater => Some(wgpu::CompareFunction::Greater),
            Self::NotEqual => Some(wgpu::CompareFunction::NotEqual),
            Self::GreaterEqual => Some(wgpu::CompareFunction::GreaterEqual),
            Self::Always => Some(wgpu::CompareFunction::Always),
            Self::Unrecognized => None,
        }
    }
}

/// Sample count of a render pipeline and its attachments
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum MultiSampleFormat {
    #[default]
    #[serde(rename = "1x")]
    X1,
    #[serde(rename = "2x")]
    X2,
    #[serde(rename = "4x")]
    X4,
    #[serde(rename = "8x")]
    X8,
}

impl MultiSampleFormat {
    pub fn count(self) -> u32 {
        match self {
            Self::X1 => 1,
            Self::X2 => 2,
            Self::X4 => 4,
            Self::X8 => 8,
        }
    }
}

/// Error returned when parsing an unknown multisample format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiSampleFormatParseError(String);

impl fmt::Display for MultiSampleFormatParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid multisample format '{}', expected one of 1x, 2x, 4x, 8x", self.0)
    }
}

impl std::error::Error for MultiSampleFormatParseError {}

impl FromStr for MultiSampleFormat {
    type Err = MultiSampleFormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1x" => Ok(Self::X1),
            "2x" => Ok(Self::X2),
            "4x" => Ok(Self::X4),
            "8x" => Ok(Self::X8),
            other => Err(MultiSampleFormatParseError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests cull format parsing and the fallback for unknown values
    #[test]
    fn test_cull_format() {
        assert_eq!(CullFormat::from("backCCW").to_wgpu(), (wgpu::FrontFace::Ccw, Some(wgpu::Face::Back)));
        assert_eq!(CullFormat::from("frontCW").to_wgpu(), (wgpu::FrontFace::Cw, Some(wgpu::Face::Front)));

        let unknown = CullFormat::from("sideways");
        assert_eq!(unknown, CullFormat::Unrecognized);
        assert_eq!(unknown.to_wgpu(), (wgpu::FrontFace::Ccw, None));
    }

    /// Tests blend format mapping
    #[test]
    fn test_blend_format() {
        assert_eq!(BlendFormat::default().to_wgpu(), Some(wgpu::BlendState::REPLACE));
        assert_eq!(BlendFormat::Disable.to_wgpu(), None);
        assert_eq!(BlendFormat::Unrecognized.to_wgpu(), None);

        let additive = BlendFormat::AddAlphaSrcOneDst.to_wgpu().unwrap();
        assert_eq!(additive.color.src_factor, wgpu::BlendFactor::SrcAlpha);
        assert_eq!(additive.alpha.dst_factor, wgpu::BlendFactor::One);
    }

    /// Tests multisample format parsing
    #[test]
    fn test_multisample_parsing() {
        assert_eq!("4x".parse::<MultiSampleFormat>().unwrap().count(), 4);
        assert_eq!(MultiSampleFormat::default().count(), 1);
        assert!("3x".parse::<MultiSampleFormat>().is_err());
    }

    /// Tests the stencil state defaults
    #[test]
    fn test_stencil_always_keep() {
        let state = StencilStateFormat::default().to_wgpu();
        assert_eq!(state.front.compare, wgpu::CompareFunction::Always);
        assert_eq!(state.back.pass_op, wgpu::StencilOperation::Keep);
        assert_eq!(state.read_mask, 0);
        assert_eq!(state.write_mask, 0);
    }
}
