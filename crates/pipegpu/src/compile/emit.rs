//! Bind group and pipeline emission

use super::layout::{BindGroupLayoutInfo, Resolved, resolve};
use super::UniformRecords;
use crate::context::Context;
use crate::device::{BindGroupEntry, BindingResource, ComputePipelineDescriptor, Device, RenderPipelineDescriptor, VertexBufferLayout};
use crate::res::Shader;
use crate::{CompileError, ResourceError, ResourceId};
use pipegpu_reflect::ResourceKind;
use std::collections::HashMap;
use std::num::NonZeroU64;
use tracing::debug;

/// Creates one device bind group per layout
///
/// Buffers referenced by a single binding of a group are bound whole.
/// Buffers referenced by several bindings of the same group get consecutive
/// ranges, each sized by the reflected size and aligned to the device's
/// minimum offset alignment. Textures are switched to the usage the binding
/// needs before their view is taken.
///
/// # Returns
/// The bind groups in group order, or the first resolution error
pub fn emit_uniforms<D: Device>(context: &Context<D>, layouts: &[BindGroupLayoutInfo<D>], records: &UniformRecords) -> Result<Vec<D::BindGroup>, CompileError> {
    let device = context.device();
    let limits = device.limits();

    layouts
        .iter()
        .map(|info| {
            let group = &info.group;
            let mut references: HashMap<ResourceId, u32> = HashMap::new();
            for binding in &group.bindings {
                if binding.kind.is_buffer() {
                    if let Some(record) = records.get(&binding.name) {
                        *references.entry(record.resource).or_default() += 1;
                    }
                }
            }

            let mut offsets: HashMap<ResourceId, u64> = HashMap::new();
            let mut entries = Vec::with_capacity(group.bindings.len());
            for binding in &group.bindings {
                let resource = match resolve(context, records, group.index, binding)? {
                    Resolved::Buffer(buffer) => {
                        let handle = buffer.gpu_buffer(device);
                        if references.get(&buffer.id()).copied().unwrap_or(1) <= 1 {
                            BindingResource::Buffer {
                                buffer: handle,
                                offset: 0,
                                size: None,
                            }
                        } else {
                            let alignment = match binding.kind {
                                ResourceKind::UniformBuffer => limits.min_uniform_buffer_offset_alignment,
                                _ => limits.min_storage_buffer_offset_alignment,
                            } as u64;
                            let running = offsets.entry(buffer.id()).or_default();
                            let offset = running.next_multiple_of(alignment);
                            let size = binding.size.unwrap_or(0);
                            let end = offset + size;
                            if end > buffer.size() {
                                return Err(ResourceError::LimitExceeded {
                                    what: "buffer binding range",
                                    value: end,
                                    limit: buffer.size(),
                                }
                                .into());
                            }
                            *running = end;
                            BindingResource::Buffer {
                                buffer: handle,
                                offset,
                                size: NonZeroU64::new(size),
                            }
                        }
                    }
                    Resolved::Texture(texture) => {
                        match binding.kind {
                            ResourceKind::StorageTexture { .. } => texture.use_as_storage_binding(device)?,
                            _ => texture.use_as_texture_binding(device)?,
                        }
                        BindingResource::TextureView(texture.view(device)?)
                    }
                    Resolved::Sampler(sampler) => BindingResource::Sampler(sampler.gpu_sampler(device)),
                };
                entries.push(BindGroupEntry {
                    binding: binding.binding,
                    resource,
                });
            }

            if entries.len() != info.entries.len() {
                return Err(CompileError::BindGroupEntryMismatch {
                    group: group.index,
                    expected: info.entries.len(),
                    actual: entries.len(),
                });
            }

            let label = format!("bind group {}", group.index);
            debug!(group = group.index, entries = entries.len(), "created bind group");
            Ok(device.create_bind_group(Some(&label), &info.layout, &entries))
        })
        .collect()
}

/// Everything a render pipeline is made of
pub struct RenderPipelineParts<'a, D: Device> {
    pub label: Option<&'a str>,
    pub layout: &'a D::PipelineLayout,
    pub vertex_shader: &'a Shader<D>,
    pub fragment_shader: &'a Shader<D>,
    pub vertex_buffers: &'a [VertexBufferLayout],
    pub targets: &'a [Option<wgpu::ColorTargetState>],
    pub primitive: wgpu::PrimitiveState,
    pub depth_stencil: Option<wgpu::DepthStencilState>,
    pub multisample: wgpu::MultisampleState,
}

/// Creates the device render pipeline
pub fn emit_render_pipeline<D: Device>(device: &D, parts: RenderPipelineParts<'_, D>) -> D::RenderPipeline {
    let vertex_module = parts.vertex_shader.module(device);
    let fragment_module = parts.fragment_shader.module(device);
    debug!(
        label = parts.label,
        vertex = parts.vertex_shader.entry_point(),
        fragment = parts.fragment_shader.entry_point(),
        "creating render pipeline"
    );
    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: parts.label,
        layout: parts.layout,
        vertex_module: &vertex_module,
        vertex_entry_point: parts.vertex_shader.entry_point(),
        vertex_buffers: parts.vertex_buffers,
        fragment_module: &fragment_module,
        fragment_entry_point: parts.fragment_shader.entry_point(),
        targets: parts.targets,
        primitive: parts.primitive,
        depth_stencil: parts.depth_stencil,
        multisample: parts.multisample,
    })
}

/// Creates the device compute pipeline
pub fn emit_compute_pipeline<D: Device>(device: &D, label: Option<&str>, layout: &D::PipelineLayout, shader: &Shader<D>) -> D::ComputePipeline {
    let module = shader.module(device);
    debug!(label, entry_point = shader.entry_point(), "creating compute pipeline");
    device.create_compute_pipeline(&ComputePipelineDescriptor {
        label,
        layout,
        module: &module,
        entry_point: shader.entry_point(),
    })
}

#[cfg(test)]
mod tests {
    use crate::compile::{ComputeDispatchDesc, Compiler};
    use crate::device::{RecordedResource, RecordingDevice};
    use crate::holder::ComputeHolderDesc;
    use crate::res::{BufferDesc, ShaderDesc};
    use crate::{CompileError, ResourceError};

    const BLEND: &str = "
struct Params {
    weight: vec4<f32>,
}

@group(0) @binding(0) var<uniform> near: Params;
@group(0) @binding(1) var<uniform> far: Params;
@group(0) @binding(2) var<uniform> bias: Params;
@group(0) @binding(3) var<storage, read_write> result: array<vec4<f32>>;

@compute @workgroup_size(1)
fn main() {
    result[0] = near.weight + far.weight + bias.weight;
}
";

    fn buffer_entry(entries: &[(u32, RecordedResource)], binding: u32) -> (u64, Option<u64>) {
        match entries.iter().find(|(index, _)| *index == binding) {
            Some((_, RecordedResource::Buffer { offset, size, .. })) => (*offset, *size),
            other => panic!("expected a buffer at binding {binding}, got {other:?}"),
        }
    }

    /// Tests that a buffer shared by two bindings is split into aligned ranges
    #[test]
    fn test_shared_buffer_offsets() {
        let compiler = Compiler::new(RecordingDevice::new());
        let shared = compiler.create_uniform_buffer(BufferDesc::new(512)).unwrap();
        let bias = compiler.create_uniform_buffer(BufferDesc::new(16)).unwrap();
        let result = compiler.create_storage_buffer(BufferDesc::new(16)).unwrap();
        let shader = compiler.create_compute_shader(ShaderDesc::new(BLEND, "main")).unwrap();

        let mut desc = ComputeHolderDesc::new(shader, ComputeDispatchDesc::workgroups(1, 1, 1));
        desc.uniforms.assign("near", &shared).assign("far", &shared).assign("bias", &bias).assign("result", &result);
        compiler.compile_compute_holder(desc).unwrap();

        let journal = compiler.device().journal();
        let entries = &journal.bind_groups.last().unwrap().entries;
        assert_eq!(buffer_entry(entries, 0), (0, Some(16)));
        assert_eq!(buffer_entry(entries, 1), (256, Some(16)));
        assert_eq!(buffer_entry(entries, 2), (0, None));
        assert_eq!(buffer_entry(entries, 3), (0, None));
    }

    /// Tests that shared ranges running past the buffer end are rejected
    #[test]
    fn test_shared_buffer_overflow() {
        let compiler = Compiler::new(RecordingDevice::new());
        let shared = compiler.create_uniform_buffer(BufferDesc::new(64)).unwrap();
        let result = compiler.create_storage_buffer(BufferDesc::new(16)).unwrap();
        let shader = compiler.create_compute_shader(ShaderDesc::new(BLEND, "main")).unwrap();

        let mut desc = ComputeHolderDesc::new(shader, ComputeDispatchDesc::workgroups(1, 1, 1));
        desc.uniforms.assign("near", &shared).assign("far", &shared).assign("bias", &shared).assign("result", &result);
        assert!(matches!(
            compiler.compile_compute_holder(desc),
            Err(CompileError::Resource(ResourceError::LimitExceeded { what: "buffer binding range", .. }))
        ));
        assert!(compiler.context().pipelines().is_empty());
    }
}
