//! Merging reflected bindings across stages into bind group layouts

use super::UniformRecords;
use crate::context::Context;
use crate::device::Device;
use crate::res::{Buffer, BufferKind, Sampler, SamplerKind, Texture};
use crate::{CompileError, PropertyFormat};
use pipegpu_reflect::{ResourceKind, SampleKind, ShaderReflection, ShaderStage, StorageAccess, TextureDimension};
use std::num::NonZeroU64;
use std::rc::Rc;
use tracing::debug;

/// One binding of a merged group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedBinding {
    pub name: String,
    pub binding: u32,
    pub kind: ResourceKind,
    pub size: Option<u64>,
    /// Every stage that uses the binding
    pub visibility: wgpu::ShaderStages,
}

/// The union of one group index across every stage, sorted by binding
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedGroup {
    pub index: u32,
    pub bindings: Vec<MergedBinding>,
}

fn stage_flags(stage: ShaderStage) -> wgpu::ShaderStages {
    match stage {
        ShaderStage::Vertex => wgpu::ShaderStages::VERTEX,
        ShaderStage::Fragment => wgpu::ShaderStages::FRAGMENT,
        ShaderStage::Compute => wgpu::ShaderStages::COMPUTE,
    }
}

/// Merges the bindings of cooperating stages group by group
///
/// Entries are de-duplicated by name, the later stage winning, with the
/// visibility being the union of the stages. Groups below the highest used
/// index are present even when empty, so the result can be turned into a
/// contiguous pipeline layout.
///
/// # Arguments
/// * `stages` - Reflections of every stage of the pipeline
/// * `max_bind_groups` - The device's bind group limit
pub fn merge_bindings(stages: &[&ShaderReflection], max_bind_groups: u32) -> Result<Vec<MergedGroup>, CompileError> {
    for stage in stages {
        let count = stage.group_count();
        if count >= max_bind_groups as usize {
            return Err(CompileError::TooManyBindGroups {
                stage: stage.stage,
                count,
                limit: max_bind_groups,
            });
        }
        if let Some(binding) = stage.bindings.iter().find(|binding| binding.group >= max_bind_groups) {
            return Err(CompileError::GroupOutOfRange {
                group: binding.group,
                limit: max_bind_groups,
            });
        }
    }

    let mut groups = Vec::new();
    for index in 0..max_bind_groups {
        let mut bindings: Vec<MergedBinding> = Vec::new();
        for stage in stages {
            for reflected in stage.bindings.iter().filter(|binding| binding.group == index) {
                let visibility = stage_flags(stage.stage);
                match bindings.iter_mut().find(|merged| merged.name == reflected.name) {
                    Some(merged) => {
                        if merged.kind != reflected.kind {
                            return Err(CompileError::ConflictingKind { name: reflected.name.clone() });
                        }
                        merged.binding = reflected.binding;
                        merged.size = reflected.size;
                        merged.visibility |= visibility;
                    }
                    None => bindings.push(MergedBinding {
                        name: reflected.name.clone(),
                        binding: reflected.binding,
                        kind: reflected.kind.clone(),
                        size: reflected.size,
                        visibility,
                    }),
                }
            }
        }

        bindings.sort_by_key(|binding| binding.binding);
        if let Some(pair) = bindings.windows(2).find(|pair| pair[0].binding == pair[1].binding) {
            return Err(CompileError::ConflictingBinding {
                group: index,
                binding: pair[0].binding,
                first: pair[0].name.clone(),
                second: pair[1].name.clone(),
            });
        }
        groups.push(MergedGroup { index, bindings });
    }

    while groups.last().is_some_and(|group| group.bindings.is_empty()) {
        groups.pop();
    }
    Ok(groups)
}

/// A registered object a uniform name resolves to
pub(crate) enum Resolved<D: Device> {
    Buffer(Rc<Buffer<D>>),
    Texture(Rc<Texture<D>>),
    Sampler(Rc<Sampler<D>>),
}

/// Looks up the record of a merged binding and the live object behind it
///
/// Fails when the name has no record, when the record's kind cannot serve
/// the reflected kind, or when the object is not registered.
pub(crate) fn resolve<D: Device>(context: &Context<D>, records: &UniformRecords, group: u32, binding: &MergedBinding) -> Result<Resolved<D>, CompileError> {
    let record = records.get(&binding.name).ok_or_else(|| CompileError::UniformNotAssigned {
        name: binding.name.clone(),
        group,
        binding: binding.binding,
    })?;
    let mismatch = || CompileError::UniformKindMismatch {
        name: binding.name.clone(),
        expected: binding.kind.name(),
        format: record.format,
    };

    let resolved = match &binding.kind {
        ResourceKind::UniformBuffer => {
            if record.format != PropertyFormat::UniformBuffer {
                return Err(mismatch());
            }
            Resolved::Buffer(context.buffers().get(record.resource)?)
        }
        ResourceKind::StorageBuffer { .. } => {
            let buffer = match record.format {
                PropertyFormat::StorageBuffer
                | PropertyFormat::IndexedStorageBuffer
                | PropertyFormat::IndirectBuffer
                | PropertyFormat::IndexedIndirectBuffer
                | PropertyFormat::MapBuffer => context.buffers().get(record.resource)?,
                _ => return Err(mismatch()),
            };
            if buffer.kind() == BufferKind::Uniform {
                return Err(mismatch());
            }
            Resolved::Buffer(buffer)
        }
        ResourceKind::Texture { .. } | ResourceKind::StorageTexture { .. } => match record.format {
            PropertyFormat::Texture2D | PropertyFormat::TextureStorage2D | PropertyFormat::Texture2DArray | PropertyFormat::TextureCube | PropertyFormat::TextureSurface => {
                Resolved::Texture(context.textures().get(record.resource)?)
            }
            _ => return Err(mismatch()),
        },
        ResourceKind::Sampler { comparison } => {
            if record.format != PropertyFormat::TextureSampler {
                return Err(mismatch());
            }
            let sampler = context.samplers().get(record.resource)?;
            if *comparison != (sampler.kind() == SamplerKind::Comparison) {
                return Err(mismatch());
            }
            Resolved::Sampler(sampler)
        }
    };
    Ok(resolved)
}

fn view_dimension(dimension: TextureDimension) -> wgpu::TextureViewDimension {
    match dimension {
        TextureDimension::D1 => wgpu::TextureViewDimension::D1,
        TextureDimension::D2 => wgpu::TextureViewDimension::D2,
        TextureDimension::D2Array => wgpu::TextureViewDimension::D2Array,
        TextureDimension::Cube => wgpu::TextureViewDimension::Cube,
        TextureDimension::CubeArray => wgpu::TextureViewDimension::CubeArray,
        TextureDimension::D3 => wgpu::TextureViewDimension::D3,
    }
}

/// Layout entry type of a merged binding given the object bound to it
fn binding_type<D: Device>(binding: &MergedBinding, resolved: &Resolved<D>) -> Result<wgpu::BindingType, CompileError> {
    let min_binding_size = binding.size.and_then(NonZeroU64::new);
    let ty = match (&binding.kind, resolved) {
        (ResourceKind::UniformBuffer, Resolved::Buffer(_)) => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size,
        },
        (ResourceKind::StorageBuffer { read_only }, Resolved::Buffer(_)) => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: *read_only },
            has_dynamic_offset: false,
            min_binding_size,
        },
        (
            ResourceKind::Texture {
                dimension,
                sample,
                multisampled,
            },
            Resolved::Texture(texture),
        ) => {
            let sample_type = match sample {
                SampleKind::Float => wgpu::TextureSampleType::Float {
                    filterable: matches!(texture.sample_type(), Some(wgpu::TextureSampleType::Float { filterable: true })),
                },
                SampleKind::Depth => wgpu::TextureSampleType::Depth,
                SampleKind::Sint => wgpu::TextureSampleType::Sint,
                SampleKind::Uint => wgpu::TextureSampleType::Uint,
            };
            wgpu::BindingType::Texture {
                sample_type,
                view_dimension: view_dimension(*dimension),
                multisampled: *multisampled,
            }
        }
        (ResourceKind::StorageTexture { dimension, access, .. }, Resolved::Texture(texture)) => wgpu::BindingType::StorageTexture {
            access: match access {
                StorageAccess::ReadOnly => wgpu::StorageTextureAccess::ReadOnly,
                StorageAccess::WriteOnly => wgpu::StorageTextureAccess::WriteOnly,
                StorageAccess::ReadWrite => wgpu::StorageTextureAccess::ReadWrite,
            },
            format: texture.format(),
            view_dimension: view_dimension(*dimension),
        },
        (ResourceKind::Sampler { comparison: true }, Resolved::Sampler(_)) => wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
        (ResourceKind::Sampler { comparison: false }, Resolved::Sampler(sampler)) => wgpu::BindingType::Sampler(sampler.binding_type()),
        (_, resolved) => {
            return Err(CompileError::UnsupportedUniform {
                name: binding.name.clone(),
                format: match resolved {
                    Resolved::Buffer(buffer) => buffer.kind().property_format(),
                    Resolved::Texture(texture) => texture.kind().property_format(),
                    Resolved::Sampler(_) => PropertyFormat::TextureSampler,
                },
            });
        }
    };
    Ok(ty)
}

/// A merged group with its layout entries and device layout
#[derive(Debug)]
pub struct BindGroupLayoutInfo<D: Device> {
    pub group: MergedGroup,
    pub entries: Vec<wgpu::BindGroupLayoutEntry>,
    pub layout: D::BindGroupLayout,
}

/// Merges the stages and creates one device bind group layout per group
///
/// # Arguments
/// * `context` - Device and registries the uniforms are resolved against
/// * `stages` - Reflections of every stage of the pipeline
/// * `records` - Output of [`super::parse_uniform`]
pub fn parse_bind_group_layouts<D: Device>(context: &Context<D>, stages: &[&ShaderReflection], records: &UniformRecords) -> Result<Vec<BindGroupLayoutInfo<D>>, CompileError> {
    let device = context.device();
    let groups = merge_bindings(stages, device.limits().max_bind_groups)?;

    groups
        .into_iter()
        .map(|group| {
            let entries = group
                .bindings
                .iter()
                .map(|binding| {
                    let resolved = resolve(context, records, group.index, binding)?;
                    Ok(wgpu::BindGroupLayoutEntry {
                        binding: binding.binding,
                        visibility: binding.visibility,
                        ty: binding_type(binding, &resolved)?,
                        count: None,
                    })
                })
                .collect::<Result<Vec<_>, CompileError>>()?;

            let label = format!("bind group layout {}", group.index);
            let layout = device.create_bind_group_layout(Some(&label), &entries);
            debug!(group = group.index, entries = entries.len(), "created bind group layout");
            Ok(BindGroupLayoutInfo { group, entries, layout })
        })
        .collect()
}

/// Creates the pipeline layout of a list of bind group layouts
pub fn parse_pipeline_layout<D: Device>(device: &D, label: Option<&str>, layouts: &[BindGroupLayoutInfo<D>]) -> D::PipelineLayout {
    let bind_group_layouts: Vec<_> = layouts.iter().map(|info| &info.layout).collect();
    device.create_pipeline_layout(label, &bind_group_layouts)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RENDER: &str = "
struct Camera { view_proj: mat4x4<f32> }

@group(0) @binding(0) var<uniform> camera: Camera;
@group(0) @binding(1) var<uniform> model: mat4x4<f32>;
@group(2) @binding(0) var albedo: texture_2d<f32>;
@group(2) @binding(1) var albedo_sampler: sampler;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return camera.view_proj * model * vec4<f32>(position, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    let tint = camera.view_proj[0];
    return textureSample(albedo, albedo_sampler, vec2<f32>(0.5, 0.5)) * tint;
}
";

    /// Tests merging vertex and fragment bindings with gap groups
    #[test]
    fn test_merge_render_stages() {
        let vertex = ShaderReflection::from_wgsl(RENDER, "vs_main").unwrap();
        let fragment = ShaderReflection::from_wgsl(RENDER, "fs_main").unwrap();
        let groups = merge_bindings(&[&vertex, &fragment], 8).unwrap();

        assert_eq!(groups.len(), 3);
        assert!(groups[1].bindings.is_empty());

        let camera = &groups[0].bindings[0];
        assert_eq!(camera.name, "camera");
        assert_eq!(camera.visibility, wgpu::ShaderStages::VERTEX_FRAGMENT);
        assert_eq!(groups[0].bindings[1].visibility, wgpu::ShaderStages::VERTEX);
        assert_eq!(groups[2].bindings.len(), 2);
        assert_eq!(groups[2].bindings[1].visibility, wgpu::ShaderStages::FRAGMENT);
    }

    /// Tests the bind group count limit
    #[test]
    fn test_group_limit() {
        let fragment = ShaderReflection::from_wgsl(RENDER, "fs_main").unwrap();
        assert!(matches!(
            merge_bindings(&[&fragment], 2),
            Err(CompileError::TooManyBindGroups { count: 2, limit: 2, .. })
        ));
        assert!(matches!(merge_bindings(&[&fragment], 3), Ok(groups) if groups.len() == 3));

        let vertex = ShaderReflection::from_wgsl(RENDER, "vs_main").unwrap();
        assert!(matches!(
            merge_bindings(&[&vertex, &fragment], 2),
            Err(CompileError::TooManyBindGroups { stage: ShaderStage::Fragment, .. })
        ));
    }

    /// Tests that two names on one slot are rejected
    #[test]
    fn test_conflicting_binding() {
        let shader = "
@group(0) @binding(0) var<uniform> a: vec4<f32>;
@group(0) @binding(0) var<uniform> b: vec4<f32>;

@vertex
fn vs_main() -> @builtin(position) vec4<f32> { return a; }

@fragment
fn fs_main() -> @location(0) vec4<f32> { return b; }
";
        let vertex = ShaderReflection::from_wgsl(shader, "vs_main").unwrap();
        let fragment = ShaderReflection::from_wgsl(shader, "fs_main").unwrap();
        assert!(matches!(
            merge_bindings(&[&vertex, &fragment], 4),
            Err(CompileError::ConflictingBinding { group: 0, binding: 0, .. })
        ));
    }
}
