//! Resource factories
//!
//! Every factory mints an id unless the descriptor carries one, and returns
//! the already registered object when it does.

use super::Compiler;
use crate::device::Device;
use crate::res::{
    Buffer, BufferDesc, BufferKind, ColorAttachment, ColorAttachmentDesc, DepthStencilAttachment, DepthStencilAttachmentDesc, Sampler, SamplerDesc, SamplerKind, Shader,
    ShaderDesc, Texture, TextureDesc, TextureKind,
};
use crate::{ResourceError, ResourceId};
use pipegpu_reflect::ShaderStage;
use std::rc::Rc;
use tracing::debug;

impl<D: Device> Compiler<D> {
    fn create_buffer(&self, kind: BufferKind, desc: BufferDesc) -> Result<Rc<Buffer<D>>, ResourceError> {
        let id = desc.id.unwrap_or_else(ResourceId::mint);
        let limits = self.device().limits();
        self.context().buffers().get_or_try_insert_with(id, |id| {
            let buffer = Buffer::new(id, kind, desc, &limits)?;
            debug!(%id, ?kind, size = buffer.size(), "registered buffer");
            Ok(buffer)
        })
    }

    pub fn create_vertex_buffer(&self, desc: BufferDesc) -> Result<Rc<Buffer<D>>, ResourceError> {
        self.create_buffer(BufferKind::Vertex, desc)
    }

    /// Creates an index buffer of `u32` indices
    pub fn create_index_buffer(&self, desc: BufferDesc) -> Result<Rc<Buffer<D>>, ResourceError> {
        self.create_buffer(BufferKind::Index, desc)
    }

    pub fn create_uniform_buffer(&self, desc: BufferDesc) -> Result<Rc<Buffer<D>>, ResourceError> {
        self.create_buffer(BufferKind::Uniform, desc)
    }

    pub fn create_storage_buffer(&self, desc: BufferDesc) -> Result<Rc<Buffer<D>>, ResourceError> {
        self.create_buffer(BufferKind::Storage, desc)
    }

    /// Creates a storage buffer that can also be bound as an index buffer
    pub fn create_indexed_storage_buffer(&self, desc: BufferDesc) -> Result<Rc<Buffer<D>>, ResourceError> {
        self.create_buffer(BufferKind::IndexedStorage, desc)
    }

    /// Creates a buffer of non-indexed draw arguments, 16 bytes per draw
    pub fn create_indirect_buffer(&self, desc: BufferDesc) -> Result<Rc<Buffer<D>>, ResourceError> {
        self.create_buffer(BufferKind::Indirect, desc)
    }

    /// Creates a buffer of indexed draw arguments, 20 bytes per draw
    pub fn create_indexed_indirect_buffer(&self, desc: BufferDesc) -> Result<Rc<Buffer<D>>, ResourceError> {
        self.create_buffer(BufferKind::IndexedIndirect, desc)
    }

    /// Creates a storage buffer whose contents are copied into a mappable
    /// staging buffer at the end of every frame
    pub fn create_map_buffer(&self, desc: BufferDesc) -> Result<Rc<Buffer<D>>, ResourceError> {
        self.create_buffer(BufferKind::Map, desc)
    }

    fn create_texture(&self, kind: TextureKind, layers: u32, desc: TextureDesc) -> Result<Rc<Texture<D>>, ResourceError> {
        let id = desc.id.unwrap_or_else(ResourceId::mint);
        self.context().textures().get_or_try_insert_with(id, |id| {
            let texture = Texture::new(id, kind, layers, desc, self.device())?;
            debug!(%id, ?kind, width = texture.width(), height = texture.height(), mips = texture.mip_level_count(), "registered texture");
            Ok(texture)
        })
    }

    pub fn create_texture_2d(&self, desc: TextureDesc) -> Result<Rc<Texture<D>>, ResourceError> {
        self.create_texture(TextureKind::D2, 1, desc)
    }

    /// Creates a 2D texture with storage usage and one storage view per mip level
    pub fn create_storage_texture_2d(&self, desc: TextureDesc) -> Result<Rc<Texture<D>>, ResourceError> {
        self.create_texture(TextureKind::Storage2D, 1, desc)
    }

    pub fn create_texture_2d_array(&self, desc: TextureDesc, layers: u32) -> Result<Rc<Texture<D>>, ResourceError> {
        self.create_texture(TextureKind::D2Array, layers, desc)
    }

    /// Creates a cube texture; `desc.contents` holds up to six faces
    pub fn create_texture_cube(&self, desc: TextureDesc) -> Result<Rc<Texture<D>>, ResourceError> {
        self.create_texture(TextureKind::Cube, 6, desc)
    }

    /// Registers the swapchain texture of the device
    ///
    /// The texture has no device object of its own. Its view is fetched from
    /// [`Device::current_surface`] every time it is requested.
    pub fn create_surface_texture(&self, id: Option<ResourceId>) -> Result<Rc<Texture<D>>, ResourceError> {
        let id = id.unwrap_or_else(ResourceId::mint);
        self.context()
            .textures()
            .get_or_try_insert_with(id, |id| Ok(Texture::surface(id, Some("surface".to_string()), self.device())))
    }

    fn create_sampler(&self, kind: SamplerKind, desc: SamplerDesc) -> Result<Rc<Sampler<D>>, ResourceError> {
        let id = desc.id.unwrap_or_else(ResourceId::mint);
        self.context().samplers().get_or_try_insert_with(id, |id| Ok(Sampler::new(id, kind, desc)))
    }

    pub fn create_texture_sampler(&self, desc: SamplerDesc) -> Result<Rc<Sampler<D>>, ResourceError> {
        self.create_sampler(SamplerKind::Filtering, desc)
    }

    /// Creates a sampler with nearest filtering, usable with unfilterable formats
    pub fn create_non_filtering_sampler(&self, desc: SamplerDesc) -> Result<Rc<Sampler<D>>, ResourceError> {
        self.create_sampler(SamplerKind::NonFiltering, desc)
    }

    pub fn create_comparison_sampler(&self, desc: SamplerDesc) -> Result<Rc<Sampler<D>>, ResourceError> {
        self.create_sampler(SamplerKind::Comparison, desc)
    }

    fn create_shader(&self, stage: ShaderStage, desc: ShaderDesc) -> Result<Rc<Shader<D>>, ResourceError> {
        let id = desc.id.unwrap_or_else(ResourceId::mint);
        self.context().shaders().get_or_try_insert_with(id, |id| Ok(Shader::new(id, stage, desc)))
    }

    pub fn create_vertex_shader(&self, desc: ShaderDesc) -> Result<Rc<Shader<D>>, ResourceError> {
        self.create_shader(ShaderStage::Vertex, desc)
    }

    pub fn create_fragment_shader(&self, desc: ShaderDesc) -> Result<Rc<Shader<D>>, ResourceError> {
        self.create_shader(ShaderStage::Fragment, desc)
    }

    pub fn create_compute_shader(&self, desc: ShaderDesc) -> Result<Rc<Shader<D>>, ResourceError> {
        self.create_shader(ShaderStage::Compute, desc)
    }

    pub fn create_color_attachment(&self, desc: ColorAttachmentDesc<D>) -> Result<Rc<ColorAttachment<D>>, ResourceError> {
        let id = desc.id.unwrap_or_else(ResourceId::mint);
        self.context().color_attachments().get_or_try_insert_with(id, |id| Ok(ColorAttachment::new(id, desc)))
    }

    pub fn create_depth_stencil_attachment(&self, desc: DepthStencilAttachmentDesc<D>) -> Result<Rc<DepthStencilAttachment<D>>, ResourceError> {
        let id = desc.id.unwrap_or_else(ResourceId::mint);
        self.context().depth_stencil_attachments().get_or_try_insert_with(id, |id| DepthStencilAttachment::new(id, desc))
    }
}
