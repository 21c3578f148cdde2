//! The device seam
//!
//! Everything pipegpu does to the GPU goes through [`Device`]. Descriptors
//! reuse the plain `wgpu` value types wherever they carry no handles, while
//! handles are associated types so that the compiler can run against the real
//! `wgpu` backend or against the recording backend used by the tests.

mod backend;
mod pass;
#[cfg(any(test, feature = "testing"))]
mod recording;

pub use backend::WgpuDevice;
pub use pass::{ComputeCommand, ComputePassRecorder, RenderCommand, RenderPassRecorder};
#[cfg(any(test, feature = "testing"))]
pub use recording::{EncodedCommand, Journal, RecordedBindGroup, RecordedBuffer, RecordedHandle, RecordedPipeline, RecordedResource, RecordedTexture, RecordedView, RecordingDevice, RecordingEncoder};

use std::fmt;
use std::num::NonZeroU64;

/// A GPU device pipegpu can compile against and encode into
pub trait Device: fmt::Debug + Sized + 'static {
    type Buffer: Clone + fmt::Debug;
    type Texture: Clone + fmt::Debug;
    type TextureView: Clone + fmt::Debug;
    type Sampler: Clone + fmt::Debug;
    type ShaderModule: Clone + fmt::Debug;
    type BindGroupLayout: Clone + fmt::Debug;
    type BindGroup: Clone + fmt::Debug;
    type PipelineLayout: Clone + fmt::Debug;
    type RenderPipeline: Clone + fmt::Debug;
    type ComputePipeline: Clone + fmt::Debug;
    type CommandEncoder;

    /// Limits the device was created with
    fn limits(&self) -> wgpu::Limits;

    /// Preferred format of the presentation surface
    fn surface_format(&self) -> wgpu::TextureFormat;

    /// Size of the presentation surface in physical pixels
    fn viewport(&self) -> (u32, u32);

    fn create_buffer(&self, desc: &wgpu::BufferDescriptor<'_>) -> Self::Buffer;

    /// Queues a write of `data` into `buffer` at `offset`
    fn write_buffer(&self, buffer: &Self::Buffer, offset: u64, data: &[u8]);

    fn create_texture(&self, desc: &wgpu::TextureDescriptor<'_>) -> Self::Texture;

    /// Queues a write of `data` into one region of `texture`
    fn write_texture(&self, texture: &Self::Texture, region: TextureRegion, data: &[u8], layout: wgpu::TexelCopyBufferLayout);

    fn create_texture_view(&self, texture: &Self::Texture, desc: &wgpu::TextureViewDescriptor<'_>) -> Self::TextureView;

    fn create_sampler(&self, desc: &wgpu::SamplerDescriptor<'_>) -> Self::Sampler;

    /// Compiles WGSL source into a device shader module
    fn create_shader_module(&self, label: Option<&str>, wgsl: &str) -> Self::ShaderModule;

    fn create_bind_group_layout(&self, label: Option<&str>, entries: &[wgpu::BindGroupLayoutEntry]) -> Self::BindGroupLayout;

    fn create_bind_group(&self, label: Option<&str>, layout: &Self::BindGroupLayout, entries: &[BindGroupEntry<Self>]) -> Self::BindGroup;

    fn create_pipeline_layout(&self, label: Option<&str>, bind_group_layouts: &[&Self::BindGroupLayout]) -> Self::PipelineLayout;

    fn create_render_pipeline(&self, desc: &RenderPipelineDescriptor<'_, Self>) -> Self::RenderPipeline;

    fn create_compute_pipeline(&self, desc: &ComputePipelineDescriptor<'_, Self>) -> Self::ComputePipeline;

    /// Texture and view of the swapchain image for the current frame, if any
    fn current_surface(&self) -> Option<(Self::Texture, Self::TextureView)>;

    /// Encodes one render pass made of the recorded commands
    fn encode_render_pass(&self, encoder: &mut Self::CommandEncoder, desc: RenderPassDescriptor<'_, Self>, commands: Vec<RenderCommand<Self>>);

    /// Encodes one compute pass made of the recorded commands
    fn encode_compute_pass(&self, encoder: &mut Self::CommandEncoder, label: Option<&str>, commands: Vec<ComputeCommand<Self>>);

    fn copy_buffer_to_buffer(&self, encoder: &mut Self::CommandEncoder, source: &Self::Buffer, destination: &Self::Buffer, size: u64);

    fn copy_texture_to_texture(&self, encoder: &mut Self::CommandEncoder, source: TextureCopy<'_, Self>, destination: TextureCopy<'_, Self>, size: wgpu::Extent3d);
}

/// Destination region of a texture write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureRegion {
    pub mip_level: u32,
    pub origin: wgpu::Origin3d,
    pub size: wgpu::Extent3d,
}

/// One side of a texture-to-texture copy
#[derive(Debug)]
pub struct TextureCopy<'a, D: Device> {
    pub texture: &'a D::Texture,
    pub mip_level: u32,
    pub origin: wgpu::Origin3d,
}

/// A resource bound into a bind group entry
#[derive(Debug)]
pub enum BindingResource<D: Device> {
    Buffer { buffer: D::Buffer, offset: u64, size: Option<NonZeroU64> },
    TextureView(D::TextureView),
    Sampler(D::Sampler),
}

/// One `@binding` slot of a bind group
#[derive(Debug)]
pub struct BindGroupEntry<D: Device> {
    pub binding: u32,
    pub resource: BindingResource<D>,
}

/// Vertex buffer layout with owned attributes
#[derive(Debug, Clone, PartialEq)]
pub struct VertexBufferLayout {
    pub array_stride: u64,
    pub step_mode: wgpu::VertexStepMode,
    pub attributes: Vec<wgpu::VertexAttribute>,
}

impl VertexBufferLayout {
    /// Borrows the layout as a `wgpu` descriptor
    pub fn as_wgpu(&self) -> wgpu::VertexBufferLayout<'_> {
        wgpu::VertexBufferLayout {
            array_stride: self.array_stride,
            step_mode: self.step_mode,
            attributes: &self.attributes,
        }
    }
}

/// Everything needed to create a render pipeline
#[derive(Debug)]
pub struct RenderPipelineDescriptor<'a, D: Device> {
    pub label: Option<&'a str>,
    pub layout: &'a D::PipelineLayout,
    pub vertex_module: &'a D::ShaderModule,
    pub vertex_entry_point: &'a str,
    pub vertex_buffers: &'a [VertexBufferLayout],
    pub fragment_module: &'a D::ShaderModule,
    pub fragment_entry_point: &'a str,
    pub targets: &'a [Option<wgpu::ColorTargetState>],
    pub primitive: wgpu::PrimitiveState,
    pub depth_stencil: Option<wgpu::DepthStencilState>,
    pub multisample: wgpu::MultisampleState,
}

/// Everything needed to create a compute pipeline
#[derive(Debug)]
pub struct ComputePipelineDescriptor<'a, D: Device> {
    pub label: Option<&'a str>,
    pub layout: &'a D::PipelineLayout,
    pub module: &'a D::ShaderModule,
    pub entry_point: &'a str,
}

/// A color target of a render pass
#[derive(Debug)]
pub struct ColorPassAttachment<D: Device> {
    pub view: D::TextureView,
    pub resolve_target: Option<D::TextureView>,
    pub ops: wgpu::Operations<wgpu::Color>,
}

/// The depth-stencil target of a render pass
#[derive(Debug)]
pub struct DepthStencilPassAttachment<D: Device> {
    pub view: D::TextureView,
    pub depth_ops: Option<wgpu::Operations<f32>>,
    pub stencil_ops: Option<wgpu::Operations<u32>>,
}

/// Targets of one render pass
#[derive(Debug)]
pub struct RenderPassDescriptor<'a, D: Device> {
    pub label: Option<&'a str>,
    pub color_attachments: Vec<ColorPassAttachment<D>>,
    pub depth_stencil_attachment: Option<DepthStencilPassAttachment<D>>,
}
