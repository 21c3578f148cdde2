//! The context owning the device and every registry

use crate::device::{Device, TextureCopy};
use crate::registry::Registry;
use crate::res::{Buffer, ColorAttachment, DepthStencilAttachment, Sampler, Shader, Texture};
use crate::{ResourceError, ResourceId};
use std::fmt;

/// A compiled device pipeline
#[derive(Debug)]
pub enum Pipeline<D: Device> {
    Render(D::RenderPipeline),
    Compute(D::ComputePipeline),
}

/// The device plus one registry per resource kind
///
/// Shared by the compiler and every holder it returns. All resources live as
/// long as the context does.
pub struct Context<D: Device> {
    device: D,
    buffers: Registry<Buffer<D>>,
    textures: Registry<Texture<D>>,
    samplers: Registry<Sampler<D>>,
    shaders: Registry<Shader<D>>,
    color_attachments: Registry<ColorAttachment<D>>,
    depth_stencil_attachments: Registry<DepthStencilAttachment<D>>,
    pipelines: Registry<Pipeline<D>>,
}

impl<D: Device> Context<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            buffers: Registry::new("buffer"),
            textures: Registry::new("texture"),
            samplers: Registry::new("sampler"),
            shaders: Registry::new("shader"),
            color_attachments: Registry::new("color attachment"),
            depth_stencil_attachments: Registry::new("depth-stencil attachment"),
            pipelines: Registry::new("pipeline"),
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn buffers(&self) -> &Registry<Buffer<D>> {
        &self.buffers
    }

    pub fn textures(&self) -> &Registry<Texture<D>> {
        &self.textures
    }

    pub fn samplers(&self) -> &Registry<Sampler<D>> {
        &self.samplers
    }

    pub fn shaders(&self) -> &Registry<Shader<D>> {
        &self.shaders
    }

    pub fn color_attachments(&self) -> &Registry<ColorAttachment<D>> {
        &self.color_attachments
    }

    pub fn depth_stencil_attachments(&self) -> &Registry<DepthStencilAttachment<D>> {
        &self.depth_stencil_attachments
    }

    pub fn pipelines(&self) -> &Registry<Pipeline<D>> {
        &self.pipelines
    }

    /// Encodes a copy of one whole mip level into another texture
    ///
    /// The copied extent is the size of `source_mip` of the source texture.
    ///
    /// # Arguments
    /// * `encoder` - Encoder the copy is recorded into
    /// * `source` - Texture copied from
    /// * `source_mip` - Mip level copied from
    /// * `destination` - Texture copied into
    /// * `destination_mip` - Mip level copied into
    pub fn copy_texture_to_texture(
        &self,
        encoder: &mut D::CommandEncoder,
        source: ResourceId,
        source_mip: u32,
        destination: ResourceId,
        destination_mip: u32,
    ) -> Result<(), ResourceError> {
        let source = self.textures.get(source)?;
        let destination = self.textures.get(destination)?;
        for (texture, level) in [(&source, source_mip), (&destination, destination_mip)] {
            if level >= texture.mip_level_count() {
                return Err(ResourceError::MipLevelOutOfRange { id: texture.id(), level });
            }
        }

        let source_texture = source.gpu_texture(&self.device)?;
        let destination_texture = destination.gpu_texture(&self.device)?;
        self.device.copy_texture_to_texture(
            encoder,
            TextureCopy {
                texture: &source_texture,
                mip_level: source_mip,
                origin: wgpu::Origin3d::ZERO,
            },
            TextureCopy {
                texture: &destination_texture,
                mip_level: destination_mip,
                origin: wgpu::Origin3d::ZERO,
            },
            source.mip_extent(source_mip),
        );
        Ok(())
    }
}

impl<D: Device> fmt::Debug for Context<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("device", &self.device)
            .field("buffers", &self.buffers)
            .field("textures", &self.textures)
            .field("samplers", &self.samplers)
            .field("shaders", &self.shaders)
            .field("pipelines", &self.pipelines)
            .finish()
    }
}
