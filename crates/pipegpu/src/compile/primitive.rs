//! Primitive and multisample state

use crate::{MultiSampleFormat, PrimitiveDesc};

/// Normalizes topology and culling into a primitive state
///
/// The strip index format is only set for strip topologies and is taken from
/// the dispatch. An unrecognized cull format logs a warning and disables culling.
///
/// # Arguments
/// * `desc` - Topology and cull format
/// * `index_format` - Index format of an indexed dispatch
pub fn parse_primitive_state(desc: &PrimitiveDesc, index_format: Option<wgpu::IndexFormat>) -> wgpu::PrimitiveState {
    let (front_face, cull_mode) = desc.cull.to_wgpu();
    wgpu::PrimitiveState {
        topology: desc.topology.to_wgpu(),
        strip_index_format: if desc.topology.is_strip() { index_format } else { None },
        front_face,
        cull_mode,
        unclipped_depth: false,
        polygon_mode: wgpu::PolygonMode::Fill,
        conservative: false,
    }
}

pub fn parse_multisample_state(format: MultiSampleFormat) -> wgpu::MultisampleState {
    wgpu::MultisampleState {
        count: format.count(),
        mask: !0,
        alpha_to_coverage_enabled: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CullFormat, TopologyFormat};

    /// Tests that an unrecognized cull mode disables culling without failing
    #[test]
    fn test_cull_fallback() {
        let desc = PrimitiveDesc {
            topology: TopologyFormat::TriangleList,
            cull: CullFormat::from("everything"),
        };
        let state = parse_primitive_state(&desc, None);
        assert_eq!(state.cull_mode, None);
        assert_eq!(state.front_face, wgpu::FrontFace::Ccw);
    }

    /// Tests that the strip index format is only kept for strips
    #[test]
    fn test_strip_index_format() {
        let list = PrimitiveDesc {
            topology: TopologyFormat::TriangleList,
            cull: CullFormat::BackCcw,
        };
        let state = parse_primitive_state(&list, Some(wgpu::IndexFormat::Uint32));
        assert_eq!(state.strip_index_format, None);
        assert_eq!(state.cull_mode, Some(wgpu::Face::Back));

        let strip = PrimitiveDesc {
            topology: TopologyFormat::TriangleStrip,
            ..list
        };
        let state = parse_primitive_state(&strip, Some(wgpu::IndexFormat::Uint32));
        assert_eq!(state.strip_index_format, Some(wgpu::IndexFormat::Uint32));
        assert_eq!(state.topology, wgpu::PrimitiveTopology::TriangleStrip);
    }

    /// Tests the multisample state
    #[test]
    fn test_multisample_state() {
        let state = parse_multisample_state(MultiSampleFormat::X4);
        assert_eq!(state.count, 4);
        assert_eq!(state.mask, u64::MAX);
    }
}
