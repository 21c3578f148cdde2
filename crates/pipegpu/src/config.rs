//! Pipeline-level configuration
//!
//! The fixed-function state of a render holder (primitive state, sample count
//! and attachment options) can be written as YAML and loaded with
//! [`HolderConfig::from_yaml`]. Every field is optional and falls back to its
//! documented default.

use crate::{BlendFormat, ColorLoadStoreFormat, CompareFormat, ConfigError, CullFormat, DepthLoadStoreFormat, MultiSampleFormat, StencilLoadStoreFormat, StencilStateFormat, TopologyFormat};
use serde::{Deserialize, Serialize};

/// Topology and culling of a render pipeline
#[derive(Default, Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrimitiveDesc {
    pub topology: TopologyFormat,
    pub cull: CullFormat,
}

/// Per-pipeline options of a color attachment
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColorAttachmentOptions {
    pub blend: BlendFormat,
    pub load_store: ColorLoadStoreFormat,
    /// RGBA clear color used with `clearStore`
    pub clear_color: [f64; 4],
}

impl Default for ColorAttachmentOptions {
    fn default() -> Self {
        Self {
            blend: BlendFormat::default(),
            load_store: ColorLoadStoreFormat::default(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Per-pipeline options of a depth-stencil attachment
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DepthStencilOptions {
    pub depth_load_store: DepthLoadStoreFormat,
    pub depth_compare: CompareFormat,
    pub depth_clear_value: f32,
    /// Leaves the depth aspect untouched by the pass
    pub depth_read_only: bool,
    pub depth_bias: Option<i32>,
    pub depth_bias_slope_scale: Option<f32>,
    pub stencil_state: StencilStateFormat,
    pub stencil_load_store: StencilLoadStoreFormat,
    pub stencil_clear_value: u32,
    /// Leaves the stencil aspect untouched by the pass
    pub stencil_read_only: bool,
}

impl Default for DepthStencilOptions {
    fn default() -> Self {
        Self {
            depth_load_store: DepthLoadStoreFormat::default(),
            depth_compare: CompareFormat::default(),
            depth_clear_value: 1.0,
            depth_read_only: false,
            depth_bias: None,
            depth_bias_slope_scale: None,
            stencil_state: StencilStateFormat::default(),
            stencil_load_store: StencilLoadStoreFormat::default(),
            stencil_clear_value: 1,
            stencil_read_only: false,
        }
    }
}

/// Fixed-function state of one render holder
#[derive(Default, Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HolderConfig {
    pub primitive: PrimitiveDesc,
    pub multisample: MultiSampleFormat,
    /// Options of the color attachments, in attachment order
    pub color_attachments: Vec<ColorAttachmentOptions>,
    pub depth_stencil_attachment: Option<DepthStencilOptions>,
}

impl HolderConfig {
    /// Parses a holder configuration from YAML content
    ///
    /// # Arguments
    /// * `yaml_content` - YAML string containing the configuration
    pub fn from_yaml(yaml_content: &str) -> Result<Self, ConfigError> {
        Ok(serde_norway::from_str(yaml_content)?)
    }

    /// Parses a holder configuration from a YAML file
    ///
    /// # Arguments
    /// * `path` - Path to the YAML file
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Options of the color attachment at `index`, or the defaults
    pub fn color_attachment(&self, index: usize) -> ColorAttachmentOptions {
        self.color_attachments.get(index).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests that an empty document yields the defaults
    #[test]
    fn test_empty_config() {
        let config = HolderConfig::from_yaml("{}").unwrap();
        assert_eq!(config, HolderConfig::default());
        assert_eq!(config.color_attachment(3).clear_color, [0.0, 0.0, 0.0, 1.0]);
    }

    /// Tests parsing a full configuration
    #[test]
    fn test_full_config() {
        let yaml = r#"
primitive:
  topology: triangle-strip
  cull: backCCW
multisample: 4x
colorAttachments:
  - blend: addAlphaSrcOneDst
    loadStore: loadStore
  - clearColor: [1.0, 0.5, 0.25, 1.0]
depthStencilAttachment:
  depthCompare: greater
  depthReadOnly: true
  depthBias: 2
"#;
        let config = HolderConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.primitive.topology, TopologyFormat::TriangleStrip);
        assert_eq!(config.primitive.cull, CullFormat::BackCcw);
        assert_eq!(config.multisample.count(), 4);
        assert_eq!(config.color_attachments[0].blend, BlendFormat::AddAlphaSrcOneDst);
        assert_eq!(config.color_attachments[0].load_store, ColorLoadStoreFormat::LoadStore);
        assert_eq!(config.color_attachments[1].clear_color, [1.0, 0.5, 0.25, 1.0]);
        assert_eq!(config.color_attachments[1].blend, BlendFormat::Opaque);

        let depth = config.depth_stencil_attachment.unwrap();
        assert_eq!(depth.depth_compare, CompareFormat::Greater);
        assert!(depth.depth_read_only);
        assert_eq!(depth.depth_bias, Some(2));
        assert_eq!(depth.depth_clear_value, 1.0);
        assert_eq!(depth.stencil_load_store, StencilLoadStoreFormat::LoadStore);
    }

    /// Tests that unknown lenient values parse to their unrecognized variant
    #[test]
    fn test_lenient_values() {
        let yaml = "primitive:\n  cull: inside-out\ncolorAttachments:\n  - blend: screen\n";
        let config = HolderConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.primitive.cull, CullFormat::Unrecognized);
        assert_eq!(config.color_attachments[0].blend, BlendFormat::Unrecognized);
    }

    /// Tests that strict formats reject unknown values
    #[test]
    fn test_strict_values() {
        assert!(matches!(HolderConfig::from_yaml("multisample: 3x\n"), Err(ConfigError::Yaml(_))));
        assert!(matches!(HolderConfig::from_file("/nonexistent/holder.yaml"), Err(ConfigError::Io(_))));
    }
}
