//! Samplers

use crate::device::Device;
use crate::{CompareFormat, ResourceId};
use std::cell::OnceCell;
use std::fmt;
use tracing::{debug, warn};

/// Binding class of a sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerKind {
    Filtering,
    /// Nearest filtering everywhere, usable with unfilterable textures
    NonFiltering,
    Comparison,
}

impl SamplerKind {
    pub fn binding_type(self) -> wgpu::SamplerBindingType {
        match self {
            Self::Filtering => wgpu::SamplerBindingType::Filtering,
            Self::NonFiltering => wgpu::SamplerBindingType::NonFiltering,
            Self::Comparison => wgpu::SamplerBindingType::Comparison,
        }
    }
}

/// Sampler creation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDesc {
    pub id: Option<ResourceId>,
    pub label: Option<String>,
    /// Applied to u, v and w
    pub address_mode: wgpu::AddressMode,
    pub mag_filter: wgpu::FilterMode,
    pub min_filter: wgpu::FilterMode,
    pub mipmap_filter: wgpu::FilterMode,
    pub lod_min_clamp: f32,
    pub lod_max_clamp: f32,
    pub anisotropy_clamp: u16,
    /// Only used by comparison samplers
    pub compare: CompareFormat,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            id: None,
            label: None,
            address_mode: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            lod_min_clamp: 0.0,
            lod_max_clamp: 32.0,
            anisotropy_clamp: 1,
            compare: CompareFormat::Always,
        }
    }
}

/// A sampler created on first use
pub struct Sampler<D: Device> {
    id: ResourceId,
    kind: SamplerKind,
    desc: SamplerDesc,
    handle: OnceCell<D::Sampler>,
}

impl<D: Device> Sampler<D> {
    pub(crate) fn new(id: ResourceId, kind: SamplerKind, mut desc: SamplerDesc) -> Self {
        if kind == SamplerKind::NonFiltering {
            desc.mag_filter = wgpu::FilterMode::Nearest;
            desc.min_filter = wgpu::FilterMode::Nearest;
            desc.mipmap_filter = wgpu::FilterMode::Nearest;
            desc.anisotropy_clamp = 1;
        }
        Self {
            id,
            kind,
            desc,
            handle: OnceCell::new(),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn kind(&self) -> SamplerKind {
        self.kind
    }

    pub fn desc(&self) -> &SamplerDesc {
        &self.desc
    }

    /// Binding type used in bind group layouts
    pub fn binding_type(&self) -> wgpu::SamplerBindingType {
        self.kind.binding_type()
    }

    /// Returns the device sampler, creating it on first use
    pub fn gpu_sampler(&self, device: &D) -> D::Sampler {
        self.handle
            .get_or_init(|| {
                debug!(id = %self.id, kind = ?self.kind, "materializing sampler");
                let compare = match self.kind {
                    SamplerKind::Comparison => Some(self.desc.compare.to_wgpu().unwrap_or_else(|| {
                        warn!(id = %self.id, "unrecognized compare format, using always");
                        wgpu::CompareFunction::Always
                    })),
                    _ => None,
                };
                device.create_sampler(&wgpu::SamplerDescriptor {
                    label: self.desc.label.as_deref(),
                    address_mode_u: self.desc.address_mode,
                    address_mode_v: self.desc.address_mode,
                    address_mode_w: self.desc.address_mode,
                    mag_filter: self.desc.mag_filter,
                    min_filter: self.desc.min_filter,
                    mipmap_filter: self.desc.mipmap_filter,
                    lod_min_clamp: self.desc.lod_min_clamp,
                    lod_max_clamp: self.desc.lod_max_clamp,
                    compare,
                    anisotropy_clamp: self.desc.anisotropy_clamp,
                    border_color: None,
                })
            })
            .clone()
    }
}

impl<D: Device> fmt::Debug for Sampler<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sampler").field("id", &self.id).field("kind", &self.kind).field("desc", &self.desc).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::RecordingDevice;

    /// Tests that non-filtering samplers force nearest filtering and samplers are created once
    #[test]
    fn test_sampler_kinds() {
        let device = RecordingDevice::new();
        let sampler: Sampler<RecordingDevice> = Sampler::new(ResourceId::mint(), SamplerKind::NonFiltering, SamplerDesc::default());
        assert_eq!(sampler.desc().mag_filter, wgpu::FilterMode::Nearest);
        assert_eq!(sampler.binding_type(), wgpu::SamplerBindingType::NonFiltering);

        let first = sampler.gpu_sampler(&device);
        let second = sampler.gpu_sampler(&device);
        assert_eq!(first.serial, second.serial);
        assert_eq!(device.journal().samplers, 1);

        let comparison: Sampler<RecordingDevice> = Sampler::new(ResourceId::mint(), SamplerKind::Comparison, SamplerDesc::default());
        assert_eq!(comparison.desc().compare, CompareFormat::Always);
        assert_eq!(comparison.binding_type(), wgpu::SamplerBindingType::Comparison);
    }
}
