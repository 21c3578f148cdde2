//! `wgpu` implementation of [`Device`]

use super::{BindGroupEntry, BindingResource, ComputeCommand, ComputePipelineDescriptor, Device, RenderCommand, RenderPassDescriptor, RenderPipelineDescriptor, TextureCopy, TextureRegion};
use std::cell::{Cell, RefCell};

/// A `wgpu` device and queue plus the state of the presentation surface
///
/// Device and surface acquisition stay with the application. The frame loop
/// hands the swapchain texture of each frame to [`WgpuDevice::set_surface_texture`]
/// before building holders that render into a surface texture.
#[derive(Debug)]
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_format: wgpu::TextureFormat,
    viewport: Cell<(u32, u32)>,
    surface: RefCell<Option<(wgpu::Texture, wgpu::TextureView)>>,
}

impl WgpuDevice {
    /// Wraps an already created device and queue
    ///
    /// # Arguments
    /// * `device` - The wgpu device
    /// * `queue` - The queue belonging to `device`
    /// * `surface_format` - Format of the presentation surface, also the default texture format
    /// * `viewport` - Size of the presentation surface in physical pixels
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, surface_format: wgpu::TextureFormat, viewport: (u32, u32)) -> Self {
        Self {
            device,
            queue,
            surface_format,
            viewport: Cell::new(viewport),
            surface: RefCell::new(None),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Updates the viewport after a resize
    pub fn set_viewport(&self, width: u32, height: u32) {
        self.viewport.set((width, height));
    }

    /// Sets the swapchain texture for the current frame
    pub fn set_surface_texture(&self, texture: &wgpu::Texture) {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        *self.surface.borrow_mut() = Some((texture.clone(), view));
    }

    /// Drops the swapchain texture once the frame has been presented
    pub fn clear_surface_texture(&self) {
        self.surface.borrow_mut().take();
    }

    pub fn create_command_encoder(&self, label: Option<&str>) -> wgpu::CommandEncoder {
        self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label })
    }

    /// Finishes `encoder` and submits it to the queue
    pub fn submit(&self, encoder: wgpu::CommandEncoder) -> wgpu::SubmissionIndex {
        self.queue.submit(std::iter::once(encoder.finish()))
    }
}

impl Device for WgpuDevice {
    type Buffer = wgpu::Buffer;
    type Texture = wgpu::Texture;
    type TextureView = wgpu::TextureView;
    type Sampler = wgpu::Sampler;
    type ShaderModule = wgpu::ShaderModule;
    type BindGroupLayout = wgpu::BindGroupLayout;
    type BindGroup = wgpu::BindGroup;
    type PipelineLayout = wgpu::PipelineLayout;
    type RenderPipeline = wgpu::RenderPipeline;
    type ComputePipeline = wgpu::ComputePipeline;
    type CommandEncoder = wgpu::CommandEncoder;

    fn limits(&self) -> wgpu::Limits {
        self.device.limits()
    }

    fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_format
    }

    fn viewport(&self) -> (u32, u32) {
        self.viewport.get()
    }

    fn create_buffer(&self, desc: &wgpu::BufferDescriptor<'_>) -> wgpu::Buffer {
        self.device.create_buffer(desc)
    }

    fn write_buffer(&self, buffer: &wgpu::Buffer, offset: u64, data: &[u8]) {
        self.queue.write_buffer(buffer, offset, data);
    }

    fn create_texture(&self, desc: &wgpu::TextureDescriptor<'_>) -> wgpu::Texture {
        self.device.create_texture(desc)
    }

    fn write_texture(&self, texture: &wgpu::Texture, region: TextureRegion, data: &[u8], layout: wgpu::TexelCopyBufferLayout) {
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: region.mip_level,
                origin: region.origin,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            layout,
            region.size,
        );
    }

    fn create_texture_view(&self, texture: &wgpu::Texture, desc: &wgpu::TextureViewDescriptor<'_>) -> wgpu::TextureView {
        texture.create_view(desc)
    }

    fn create_sampler(&self, desc: &wgpu::SamplerDescriptor<'_>) -> wgpu::Sampler {
        self.device.create_sampler(desc)
    }

    fn create_shader_module(&self, label: Option<&str>, wgsl: &str) -> wgpu::ShaderModule {
        self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label,
            source: wgpu::ShaderSource::Wgsl(wgsl.into()),
        })
    }

    fn create_bind_group_layout(&self, label: Option<&str>, entries: &[wgpu::BindGroupLayoutEntry]) -> wgpu::BindGroupLayout {
        self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor { label, entries })
    }

    fn create_bind_group(&self, label: Option<&str>, layout: &wgpu::BindGroupLayout, entries: &[BindGroupEntry<Self>]) -> wgpu::BindGroup {
        let entries: Vec<_> = entries
            .iter()
            .map(|entry| wgpu::BindGroupEntry {
                binding: entry.binding,
                resource: match &entry.resource {
                    BindingResource::Buffer { buffer, offset, size } => wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer,
                        offset: *offset,
                        size: *size,
                    }),
                    BindingResource::TextureView(view) => wgpu::BindingResource::TextureView(view),
                    BindingResource::Sampler(sampler) => wgpu::BindingResource::Sampler(sampler),
                },
            })
            .collect();

        self.device.create_bind_group(&wgpu::BindGroupDescriptor { label, layout, entries: &entries })
    }

    fn create_pipeline_layout(&self, label: Option<&str>, bind_group_layouts: &[&wgpu::BindGroupLayout]) -> wgpu::PipelineLayout {
        self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label,
            bind_group_layouts,
            push_constant_ranges: &[],
        })
    }

    fn create_render_pipeline(&self, desc: &RenderPipelineDescriptor<'_, Self>) -> wgpu::RenderPipeline {
        let vertex_buffers: Vec<_> = desc.vertex_buffers.iter().map(|layout| layout.as_wgpu()).collect();

        self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: desc.label,
            layout: Some(desc.layout),
            vertex: wgpu::VertexState {
                module: desc.vertex_module,
                entry_point: Some(desc.vertex_entry_point),
                compilation_options: Default::default(),
                buffers: &vertex_buffers,
            },
            fragment: Some(wgpu::FragmentState {
                module: desc.fragment_module,
                entry_point: Some(desc.fragment_entry_point),
                compilation_options: Default::default(),
                targets: desc.targets,
            }),
            primitive: desc.primitive,
            depth_stencil: desc.depth_stencil.clone(),
            multisample: desc.multisample,
            multiview: None,
            cache: None,
        })
    }

    fn create_compute_pipeline(&self, desc: &ComputePipelineDescriptor<'_, Self>) -> wgpu::ComputePipeline {
        self.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: desc.label,
            layout: Some(desc.layout),
            module: desc.module,
            entry_point: Some(desc.entry_point),
            compilation_options: Default::default(),
            cache: None,
        })
    }

    fn current_surface(&self) -> Option<(wgpu::Texture, wgpu::TextureView)> {
        self.surface.borrow().clone()
    }

    fn encode_render_pass(&self, encoder: &mut wgpu::CommandEncoder, desc: RenderPassDescriptor<'_, Self>, commands: Vec<RenderCommand<Self>>) {
        let color_attachments: Vec<_> = desc
            .color_attachments
            .iter()
            .map(|attachment| {
                Some(wgpu::RenderPassColorAttachment {
                    view: &attachment.view,
                    resolve_target: attachment.resolve_target.as_ref(),
                    ops: attachment.ops,
                })
            })
            .collect();

        let depth_stencil_attachment = desc.depth_stencil_attachment.as_ref().map(|attachment| wgpu::RenderPassDepthStencilAttachment {
            view: &attachment.view,
            depth_ops: attachment.depth_ops,
            stencil_ops: attachment.stencil_ops,
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: desc.label,
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            ..Default::default()
        });

        for command in &commands {
            match command {
                RenderCommand::SetPipeline(pipeline) => pass.set_pipeline(pipeline),
                RenderCommand::SetBindGroup { index, bind_group } => pass.set_bind_group(*index, bind_group, &[]),
                RenderCommand::SetVertexBuffer { slot, buffer } => pass.set_vertex_buffer(*slot, buffer.slice(..)),
                RenderCommand::SetIndexBuffer { buffer, format } => pass.set_index_buffer(buffer.slice(..), *format),
                RenderCommand::Draw { vertices, instances } => pass.draw(vertices.clone(), instances.clone()),
                RenderCommand::DrawIndexed { indices, base_vertex, instances } => pass.draw_indexed(indices.clone(), *base_vertex, instances.clone()),
                RenderCommand::DrawIndirect { buffer, offset } => pass.draw_indirect(buffer, *offset),
                RenderCommand::DrawIndexedIndirect { buffer, offset } => pass.draw_indexed_indirect(buffer, *offset),
                RenderCommand::MultiDrawIndirect { buffer, offset, count } => pass.multi_draw_indirect(buffer, *offset, *count),
                RenderCommand::MultiDrawIndexedIndirect { buffer, offset, count } => pass.multi_draw_indexed_indirect(buffer, *offset, *count),
            }
        }
    }

    fn encode_compute_pass(&self, encoder: &mut wgpu::CommandEncoder, label: Option<&str>, commands: Vec<ComputeCommand<Self>>) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor { label, timestamp_writes: None });

        for command in &commands {
            match command {
                ComputeCommand::SetPipeline(pipeline) => pass.set_pipeline(pipeline),
                ComputeCommand::SetBindGroup { index, bind_group } => pass.set_bind_group(*index, bind_group, &[]),
                ComputeCommand::Dispatch { x, y, z } => pass.dispatch_workgroups(*x, *y, *z),
                ComputeCommand::DispatchIndirect { buffer, offset } => pass.dispatch_workgroups_indirect(buffer, *offset),
            }
        }
    }

    fn copy_buffer_to_buffer(&self, encoder: &mut wgpu::CommandEncoder, source: &wgpu::Buffer, destination: &wgpu::Buffer, size: u64) {
        encoder.copy_buffer_to_buffer(source, 0, destination, 0, size);
    }

    fn copy_texture_to_texture(&self, encoder: &mut wgpu::CommandEncoder, source: TextureCopy<'_, Self>, destination: TextureCopy<'_, Self>, size: wgpu::Extent3d) {
        encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: source.texture,
                mip_level: source.mip_level,
                origin: source.origin,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: destination.texture,
                mip_level: destination.mip_level,
                origin: destination.origin,
                aspect: wgpu::TextureAspect::All,
            },
            size,
        );
    }
}
