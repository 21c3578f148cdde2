//! A device that records instead of rendering
//!
//! Every object creation and every queue write lands in a [`Journal`], and every
//! encoded pass lands in the [`RecordingEncoder`]. Tests use it to check what the
//! compiler and the holders asked the GPU to do without needing an adapter.

use super::{BindGroupEntry, BindingResource, ComputeCommand, ComputePipelineDescriptor, Device, RenderCommand, RenderPassDescriptor, RenderPipelineDescriptor, TextureCopy, TextureRegion, VertexBufferLayout};
use std::cell::{Cell, Ref, RefCell};

/// A recorded buffer handle
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedBuffer {
    pub serial: u32,
    pub label: Option<String>,
    pub size: u64,
    pub usage: wgpu::BufferUsages,
}

/// A recorded texture handle
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedTexture {
    pub serial: u32,
    pub label: Option<String>,
    pub format: wgpu::TextureFormat,
    pub size: wgpu::Extent3d,
    pub mip_level_count: u32,
    pub sample_count: u32,
    pub usage: wgpu::TextureUsages,
}

/// A recorded texture view handle
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedView {
    pub serial: u32,
    pub texture: u32,
    pub dimension: Option<wgpu::TextureViewDimension>,
    pub aspect: wgpu::TextureAspect,
    pub base_mip_level: u32,
    pub mip_level_count: Option<u32>,
    pub base_array_layer: u32,
    pub array_layer_count: Option<u32>,
}

/// A recorded handle that carries nothing but its label
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedHandle {
    pub serial: u32,
    pub label: Option<String>,
}

/// What a recorded bind group entry points at
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedResource {
    Buffer { buffer: u32, offset: u64, size: Option<u64> },
    TextureView(RecordedView),
    Sampler(u32),
}

/// A recorded bind group with its entries
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedBindGroup {
    pub serial: u32,
    pub label: Option<String>,
    pub entries: Vec<(u32, RecordedResource)>,
}

/// A recorded render or compute pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPipeline {
    pub serial: u32,
    pub label: Option<String>,
    pub entry_points: Vec<String>,
    pub vertex_buffers: Vec<VertexBufferLayout>,
    pub targets: Vec<Option<wgpu::ColorTargetState>>,
    pub primitive: Option<wgpu::PrimitiveState>,
    pub depth_stencil: Option<wgpu::DepthStencilState>,
    pub sample_count: u32,
}

/// Everything a [`RecordingDevice`] has been asked to create or write
#[derive(Debug, Default)]
pub struct Journal {
    pub buffers: Vec<RecordedBuffer>,
    pub textures: Vec<RecordedTexture>,
    pub views: Vec<RecordedView>,
    pub samplers: usize,
    pub shader_modules: usize,
    pub bind_group_layouts: Vec<Vec<wgpu::BindGroupLayoutEntry>>,
    pub bind_groups: Vec<RecordedBindGroup>,
    pub pipeline_layouts: Vec<usize>,
    pub render_pipelines: Vec<RecordedPipeline>,
    pub compute_pipelines: Vec<RecordedPipeline>,
    /// (buffer serial, offset, byte length)
    pub buffer_writes: Vec<(u32, u64, usize)>,
    /// (texture serial, region, byte length)
    pub texture_writes: Vec<(u32, TextureRegion, usize)>,
}

/// A command encoded into a [`RecordingEncoder`]
#[derive(Debug)]
pub enum EncodedCommand {
    RenderPass {
        label: Option<String>,
        color_attachments: Vec<RecordedView>,
        depth_stencil_attachment: Option<RecordedView>,
        commands: Vec<RenderCommand<RecordingDevice>>,
    },
    ComputePass {
        label: Option<String>,
        commands: Vec<ComputeCommand<RecordingDevice>>,
    },
    CopyBufferToBuffer {
        source: u32,
        destination: u32,
        size: u64,
    },
    CopyTextureToTexture {
        source: u32,
        source_mip_level: u32,
        destination: u32,
        destination_mip_level: u32,
    },
}

/// Command encoder of the recording device
#[derive(Debug, Default)]
pub struct RecordingEncoder {
    pub commands: Vec<EncodedCommand>,
}

impl RecordingEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands of every encoded render pass, in encoding order
    pub fn render_passes(&self) -> Vec<&[RenderCommand<RecordingDevice>]> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                EncodedCommand::RenderPass { commands, .. } => Some(commands.as_slice()),
                _ => None,
            })
            .collect()
    }

    /// Commands of every encoded compute pass, in encoding order
    pub fn compute_passes(&self) -> Vec<&[ComputeCommand<RecordingDevice>]> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                EncodedCommand::ComputePass { commands, .. } => Some(commands.as_slice()),
                _ => None,
            })
            .collect()
    }
}

/// A [`Device`] that records calls instead of executing them
#[derive(Debug)]
pub struct RecordingDevice {
    limits: wgpu::Limits,
    surface_format: wgpu::TextureFormat,
    viewport: (u32, u32),
    next_serial: Cell<u32>,
    journal: RefCell<Journal>,
    surface: RefCell<Option<(RecordedTexture, RecordedView)>>,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDevice {
    /// Creates a recording device with default limits and a 640x480 surface
    pub fn new() -> Self {
        Self::with_limits(wgpu::Limits::default())
    }

    /// Creates a recording device reporting the given limits
    pub fn with_limits(limits: wgpu::Limits) -> Self {
        let device = Self {
            limits,
            surface_format: wgpu::TextureFormat::Bgra8Unorm,
            viewport: (640, 480),
            next_serial: Cell::new(1),
            journal: RefCell::new(Journal::default()),
            surface: RefCell::new(None),
        };
        device.next_surface_frame();
        device
    }

    /// Read access to everything recorded so far
    pub fn journal(&self) -> Ref<'_, Journal> {
        self.journal.borrow()
    }

    /// Simulates acquiring the next swapchain image
    pub fn next_surface_frame(&self) {
        let texture = RecordedTexture {
            serial: self.serial(),
            label: Some("surface".to_string()),
            format: self.surface_format,
            size: wgpu::Extent3d {
                width: self.viewport.0,
                height: self.viewport.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        };
        let view = RecordedView {
            serial: self.serial(),
            texture: texture.serial,
            dimension: None,
            aspect: wgpu::TextureAspect::All,
            base_mip_level: 0,
            mip_level_count: None,
            base_array_layer: 0,
            array_layer_count: None,
        };
        *self.surface.borrow_mut() = Some((texture, view));
    }

    /// Removes the swapchain image, as if the surface were lost
    pub fn lose_surface(&self) {
        self.surface.borrow_mut().take();
    }

    fn serial(&self) -> u32 {
        let serial = self.next_serial.get();
        self.next_serial.set(serial + 1);
        serial
    }

    fn handle(&self, label: Option<&str>) -> RecordedHandle {
        RecordedHandle {
            serial: self.serial(),
            label: label.map(str::to_string),
        }
    }
}

impl Device for RecordingDevice {
    type Buffer = RecordedBuffer;
    type Texture = RecordedTexture;
    type TextureView = RecordedView;
    type Sampler = RecordedHandle;
    type ShaderModule = RecordedHandle;
    type BindGroupLayout = RecordedHandle;
    type BindGroup = RecordedBindGroup;
    type PipelineLayout = RecordedHandle;
    type RenderPipeline = RecordedPipeline;
    type ComputePipeline = RecordedPipeline;
    type CommandEncoder = RecordingEncoder;

    fn limits(&self) -> wgpu::Limits {
        self.limits.clone()
    }

    fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_format
    }

    fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    fn create_buffer(&self, desc: &wgpu::BufferDescriptor<'_>) -> RecordedBuffer {
        let buffer = RecordedBuffer {
            serial: self.serial(),
            label: desc.label.map(str::to_string),
            size: desc.size,
            usage: desc.usage,
        };
        self.journal.borrow_mut().buffers.push(buffer.clone());
        buffer
    }

    fn write_buffer(&self, buffer: &RecordedBuffer, offset: u64, data: &[u8]) {
        self.journal.borrow_mut().buffer_writes.push((buffer.serial, offset, data.len()));
    }

    fn create_texture(&self, desc: &wgpu::TextureDescriptor<'_>) -> RecordedTexture {
        let texture = RecordedTexture {
            serial: self.serial(),
            label: desc.label.map(str::to_string),
            format: desc.format,
            size: desc.size,
            mip_level_count: desc.mip_level_count,
            sample_count: desc.sample_count,
            usage: desc.usage,
        };
        self.journal.borrow_mut().textures.push(texture.clone());
        texture
    }

    fn write_texture(&self, texture: &RecordedTexture, region: TextureRegion, data: &[u8], _layout: wgpu::TexelCopyBufferLayout) {
        self.journal.borrow_mut().texture_writes.push((texture.serial, region, data.len()));
    }

    fn create_texture_view(&self, texture: &RecordedTexture, desc: &wgpu::TextureViewDescriptor<'_>) -> RecordedView {
        let view = RecordedView {
            serial: self.serial(),
            texture: texture.serial,
            dimension: desc.dimension,
            aspect: desc.aspect,
            base_mip_level: desc.base_mip_level,
            mip_level_count: desc.mip_level_count,
            base_array_layer: desc.base_array_layer,
            array_layer_count: desc.array_layer_count,
        };
        self.journal.borrow_mut().views.push(view.clone());
        view
    }

    fn create_sampler(&self, desc: &wgpu::SamplerDescriptor<'_>) -> RecordedHandle {
        self.journal.borrow_mut().samplers += 1;
        self.handle(desc.label)
    }

    fn create_shader_module(&self, label: Option<&str>, _wgsl: &str) -> RecordedHandle {
        self.journal.borrow_mut().shader_modules += 1;
        self.handle(label)
    }

    fn create_bind_group_layout(&self, label: Option<&str>, entries: &[wgpu::BindGroupLayoutEntry]) -> RecordedHandle {
        self.journal.borrow_mut().bind_group_layouts.push(entries.to_vec());
        self.handle(label)
    }

    fn create_bind_group(&self, label: Option<&str>, _layout: &RecordedHandle, entries: &[BindGroupEntry<Self>]) -> RecordedBindGroup {
        let bind_group = RecordedBindGroup {
            serial: self.serial(),
            label: label.map(str::to_string),
            entries: entries
                .iter()
                .map(|entry| {
                    let resource = match &entry.resource {
                        BindingResource::Buffer { buffer, offset, size } => RecordedResource::Buffer {
                            buffer: buffer.serial,
                            offset: *offset,
                            size: size.map(|size| size.get()),
                        },
                        BindingResource::TextureView(view) => RecordedResource::TextureView(view.clone()),
                        BindingResource::Sampler(sampler) => RecordedResource::Sampler(sampler.serial),
                    };
                    (entry.binding, resource)
                })
                .collect(),
        };
        self.journal.borrow_mut().bind_groups.push(bind_group.clone());
        bind_group
    }

    fn create_pipeline_layout(&self, label: Option<&str>, bind_group_layouts: &[&RecordedHandle]) -> RecordedHandle {
        self.journal.borrow_mut().pipeline_layouts.push(bind_group_layouts.len());
        self.handle(label)
    }

    fn create_render_pipeline(&self, desc: &RenderPipelineDescriptor<'_, Self>) -> RecordedPipeline {
        let pipeline = RecordedPipeline {
            serial: self.serial(),
            label: desc.label.map(str::to_string),
            entry_points: vec![desc.vertex_entry_point.to_string(), desc.fragment_entry_point.to_string()],
            vertex_buffers: desc.vertex_buffers.to_vec(),
            targets: desc.targets.to_vec(),
            primitive: Some(desc.primitive),
            depth_stencil: desc.depth_stencil.clone(),
            sample_count: desc.multisample.count,
        };
        self.journal.borrow_mut().render_pipelines.push(pipeline.clone());
        pipeline
    }

    fn create_compute_pipeline(&self, desc: &ComputePipelineDescriptor<'_, Self>) -> RecordedPipeline {
        let pipeline = RecordedPipeline {
            serial: self.serial(),
            label: desc.label.map(str::to_string),
            entry_points: vec![desc.entry_point.to_string()],
            vertex_buffers: Vec::new(),
            targets: Vec::new(),
            primitive: None,
            depth_stencil: None,
            sample_count: 1,
        };
        self.journal.borrow_mut().compute_pipelines.push(pipeline.clone());
        pipeline
    }

    fn current_surface(&self) -> Option<(RecordedTexture, RecordedView)> {
        self.surface.borrow().clone()
    }

    fn encode_render_pass(&self, encoder: &mut RecordingEncoder, desc: RenderPassDescriptor<'_, Self>, commands: Vec<RenderCommand<Self>>) {
        encoder.commands.push(EncodedCommand::RenderPass {
            label: desc.label.map(str::to_string),
            color_attachments: desc.color_attachments.into_iter().map(|attachment| attachment.view).collect(),
            depth_stencil_attachment: desc.depth_stencil_attachment.map(|attachment| attachment.view),
            commands,
        });
    }

    fn encode_compute_pass(&self, encoder: &mut RecordingEncoder, label: Option<&str>, commands: Vec<ComputeCommand<Self>>) {
        encoder.commands.push(EncodedCommand::ComputePass {
            label: label.map(str::to_string),
            commands,
        });
    }

    fn copy_buffer_to_buffer(&self, encoder: &mut RecordingEncoder, source: &RecordedBuffer, destination: &RecordedBuffer, size: u64) {
        encoder.commands.push(EncodedCommand::CopyBufferToBuffer {
            source: source.serial,
            destination: destination.serial,
            size,
        });
    }

    fn copy_texture_to_texture(&self, encoder: &mut RecordingEncoder, source: TextureCopy<'_, Self>, destination: TextureCopy<'_, Self>, _size: wgpu::Extent3d) {
        encoder.commands.push(EncodedCommand::CopyTextureToTexture {
            source: source.texture.serial,
            source_mip_level: source.mip_level,
            destination: destination.texture.serial,
            destination_mip_level: destination.mip_level,
        });
    }
}
