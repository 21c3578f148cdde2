//! Color and depth-stencil attachments

use crate::device::{ColorPassAttachment, DepthStencilPassAttachment, Device};
use crate::res::Texture;
use crate::{ColorAttachmentOptions, ColorLoadStoreFormat, DepthLoadStoreFormat, DepthStencilOptions, ResourceError, ResourceId, StencilLoadStoreFormat};
use std::fmt;
use std::rc::Rc;
use tracing::warn;

/// Creation parameters of a color attachment
pub struct ColorAttachmentDesc<D: Device> {
    pub id: Option<ResourceId>,
    pub texture: Rc<Texture<D>>,
    /// Array layer rendered into
    pub layer: u32,
    /// Single-sampled texture the attachment resolves into
    pub resolve_target: Option<Rc<Texture<D>>>,
    pub options: ColorAttachmentOptions,
}

impl<D: Device> ColorAttachmentDesc<D> {
    pub fn new(texture: Rc<Texture<D>>) -> Self {
        Self {
            id: None,
            texture,
            layer: 0,
            resolve_target: None,
            options: ColorAttachmentOptions::default(),
        }
    }

    pub fn id(mut self, id: ResourceId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn layer(mut self, layer: u32) -> Self {
        self.layer = layer;
        self
    }

    pub fn resolve_target(mut self, texture: Rc<Texture<D>>) -> Self {
        self.resolve_target = Some(texture);
        self
    }

    pub fn options(mut self, options: ColorAttachmentOptions) -> Self {
        self.options = options;
        self
    }
}

/// A texture rendered into as a color target
pub struct ColorAttachment<D: Device> {
    id: ResourceId,
    texture: Rc<Texture<D>>,
    layer: u32,
    resolve_target: Option<Rc<Texture<D>>>,
    options: ColorAttachmentOptions,
}

impl<D: Device> ColorAttachment<D> {
    pub(crate) fn new(id: ResourceId, desc: ColorAttachmentDesc<D>) -> Self {
        Self {
            id,
            texture: desc.texture,
            layer: desc.layer,
            resolve_target: desc.resolve_target,
            options: desc.options,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn texture(&self) -> &Rc<Texture<D>> {
        &self.texture
    }

    pub fn options(&self) -> &ColorAttachmentOptions {
        &self.options
    }

    pub fn sample_count(&self) -> u32 {
        self.texture.sample_count()
    }

    /// Pipeline-level color target of the attachment
    pub fn target_state(&self) -> wgpu::ColorTargetState {
        wgpu::ColorTargetState {
            format: self.texture.format(),
            blend: self.options.blend.to_wgpu(),
            write_mask: wgpu::ColorWrites::ALL,
        }
    }

    /// Render-pass attachment for the current frame
    ///
    /// Re-derived on every call so that surface-backed attachments pick up
    /// the swapchain image of the frame.
    pub fn pass_attachment(&self, device: &D) -> Result<ColorPassAttachment<D>, ResourceError> {
        self.texture.use_as_render_attachment(device, self.layer)?;
        let view = self.texture.view(device)?;

        let resolve_target = match &self.resolve_target {
            Some(target) => {
                target.use_as_render_attachment(device, 0)?;
                Some(target.view(device)?)
            }
            None => None,
        };

        let [r, g, b, a] = self.options.clear_color;
        let load = match self.options.load_store {
            ColorLoadStoreFormat::ClearStore => wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
            ColorLoadStoreFormat::LoadStore => wgpu::LoadOp::Load,
        };

        Ok(ColorPassAttachment {
            view,
            resolve_target,
            ops: wgpu::Operations {
                load,
                store: wgpu::StoreOp::Store,
            },
        })
    }
}

impl<D: Device> fmt::Debug for ColorAttachment<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColorAttachment")
            .field("id", &self.id)
            .field("texture", &self.texture.id())
            .field("layer", &self.layer)
            .field("options", &self.options)
            .finish()
    }
}

/// Creation parameters of a depth-stencil attachment
pub struct DepthStencilAttachmentDesc<D: Device> {
    pub id: Option<ResourceId>,
    pub texture: Rc<Texture<D>>,
    pub options: DepthStencilOptions,
}

impl<D: Device> DepthStencilAttachmentDesc<D> {
    pub fn new(texture: Rc<Texture<D>>) -> Self {
        Self {
            id: None,
            texture,
            options: DepthStencilOptions::default(),
        }
    }

    pub fn id(mut self, id: ResourceId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn options(mut self, options: DepthStencilOptions) -> Self {
        self.options = options;
        self
    }
}

/// A texture used as the depth-stencil target
pub struct DepthStencilAttachment<D: Device> {
    id: ResourceId,
    texture: Rc<Texture<D>>,
    options: DepthStencilOptions,
}

impl<D: Device> DepthStencilAttachment<D> {
    pub(crate) fn new(id: ResourceId, desc: DepthStencilAttachmentDesc<D>) -> Result<Self, ResourceError> {
        let format = desc.texture.format();
        if !format.is_depth_stencil_format() {
            return Err(ResourceError::NotDepthStencil { id: desc.texture.id(), format });
        }
        Ok(Self {
            id,
            texture: desc.texture,
            options: desc.options,
        })
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn texture(&self) -> &Rc<Texture<D>> {
        &self.texture
    }

    pub fn options(&self) -> &DepthStencilOptions {
        &self.options
    }

    /// Pipeline-level depth-stencil state
    ///
    /// A `never` compare disables depth writes. An unrecognized compare falls
    /// back to `less-equal` with writes on.
    pub fn depth_stencil_state(&self) -> wgpu::DepthStencilState {
        let (depth_compare, depth_write_enabled) = match self.options.depth_compare.to_wgpu() {
            Some(wgpu::CompareFunction::Never) => (wgpu::CompareFunction::Never, false),
            Some(compare) => (compare, !self.options.depth_read_only),
            None => {
                warn!(id = %self.id, "unrecognized depth compare format, using less-equal");
                (wgpu::CompareFunction::LessEqual, true)
            }
        };

        wgpu::DepthStencilState {
            format: self.texture.format(),
            depth_write_enabled,
            depth_compare,
            stencil: self.options.stencil_state.to_wgpu(),
            bias: wgpu::DepthBiasState {
                constant: self.options.depth_bias.unwrap_or(0),
                slope_scale: self.options.depth_bias_slope_scale.unwrap_or(0.0),
                clamp: 0.0,
            },
        }
    }

    /// Render-pass attachment for the current frame
    pub fn pass_attachment(&self, device: &D) -> Result<DepthStencilPassAttachment<D>, ResourceError> {
        self.texture.use_as_render_attachment(device, 0)?;
        let view = self.texture.view(device)?;
        let format = self.texture.format();

        let depth_ops = (format.has_depth_aspect() && !self.options.depth_read_only).then(|| wgpu::Operations {
            load: match self.options.depth_load_store {
                DepthLoadStoreFormat::ClearStore => wgpu::LoadOp::Clear(self.options.depth_clear_value),
                DepthLoadStoreFormat::LoadStore => wgpu::LoadOp::Load,
            },
            store: wgpu::StoreOp::Store,
        });
        let stencil_ops = (format.has_stencil_aspect() && !self.options.stencil_read_only).then(|| wgpu::Operations {
            load: match self.options.stencil_load_store {
                StencilLoadStoreFormat::ClearStore => wgpu::LoadOp::Clear(self.options.stencil_clear_value),
                StencilLoadStoreFormat::LoadStore => wgpu::LoadOp::Load,
            },
            store: wgpu::StoreOp::Store,
        });

        Ok(DepthStencilPassAttachment { view, depth_ops, stencil_ops })
    }
}

impl<D: Device> fmt::Debug for DepthStencilAttachment<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DepthStencilAttachment")
            .field("id", &self.id)
            .field("texture", &self.texture.id())
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::RecordingDevice;
    use crate::res::{TextureDesc, TextureKind};
    use crate::{BlendFormat, CompareFormat};

    fn texture(device: &RecordingDevice, format: wgpu::TextureFormat) -> Rc<Texture<RecordingDevice>> {
        let desc = TextureDesc::new(32, 32).format(format).usage(wgpu::TextureUsages::RENDER_ATTACHMENT);
        Rc::new(Texture::new(ResourceId::mint(), TextureKind::D2, 1, desc, device).unwrap())
    }

    /// Tests the default color attachment clear and blend configuration
    #[test]
    fn test_color_defaults() {
        let device = RecordingDevice::new();
        let attachment = ColorAttachment::new(ResourceId::mint(), ColorAttachmentDesc::new(texture(&device, wgpu::TextureFormat::Rgba8Unorm)));

        let target = attachment.target_state();
        assert_eq!(target.format, wgpu::TextureFormat::Rgba8Unorm);
        assert_eq!(target.blend, Some(wgpu::BlendState::REPLACE));

        let pass = attachment.pass_attachment(&device).unwrap();
        assert_eq!(pass.ops.load, wgpu::LoadOp::Clear(wgpu::Color { r: 0.0, g: 0.0, b: 0.0, a: 1.0 }));
        assert_eq!(pass.view.mip_level_count, Some(1));

        let options = ColorAttachmentOptions {
            blend: BlendFormat::Disable,
            load_store: ColorLoadStoreFormat::LoadStore,
            ..Default::default()
        };
        let loading = ColorAttachment::new(
            ResourceId::mint(),
            ColorAttachmentDesc::new(texture(&device, wgpu::TextureFormat::Rgba8Unorm)).options(options),
        );
        assert_eq!(loading.target_state().blend, None);
        assert_eq!(loading.pass_attachment(&device).unwrap().ops.load, wgpu::LoadOp::Load);
    }

    /// Tests depth-stencil state derivation and aspect-dependent ops
    #[test]
    fn test_depth_stencil() {
        let device = RecordingDevice::new();
        let depth = DepthStencilAttachment::new(ResourceId::mint(), DepthStencilAttachmentDesc::new(texture(&device, wgpu::TextureFormat::Depth32Float))).unwrap();

        let state = depth.depth_stencil_state();
        assert_eq!(state.depth_compare, wgpu::CompareFunction::LessEqual);
        assert!(state.depth_write_enabled);

        let pass = depth.pass_attachment(&device).unwrap();
        assert_eq!(pass.depth_ops.map(|ops| ops.load), Some(wgpu::LoadOp::Clear(1.0)));
        assert!(pass.stencil_ops.is_none());

        let options = DepthStencilOptions {
            depth_compare: CompareFormat::Never,
            ..Default::default()
        };
        let never = DepthStencilAttachment::new(
            ResourceId::mint(),
            DepthStencilAttachmentDesc::new(texture(&device, wgpu::TextureFormat::Depth24PlusStencil8)).options(options),
        )
        .unwrap();
        assert!(!never.depth_stencil_state().depth_write_enabled);
        assert_eq!(never.pass_attachment(&device).unwrap().stencil_ops.map(|ops| ops.load), Some(wgpu::LoadOp::Load));

        let unrecognized = DepthStencilOptions {
            depth_compare: CompareFormat::Unrecognized,
            ..Default::default()
        };
        let fallback = DepthStencilAttachment::new(
            ResourceId::mint(),
            DepthStencilAttachmentDesc::new(texture(&device, wgpu::TextureFormat::Depth32Float)).options(unrecognized),
        )
        .unwrap();
        assert_eq!(fallback.depth_stencil_state().depth_compare, wgpu::CompareFunction::LessEqual);
    }

    /// Tests that color formats are rejected as depth-stencil attachments
    #[test]
    fn test_depth_stencil_format_check() {
        let device = RecordingDevice::new();
        let result = DepthStencilAttachment::new(ResourceId::mint(), DepthStencilAttachmentDesc::new(texture(&device, wgpu::TextureFormat::Rgba8Unorm)));
        assert!(matches!(result, Err(ResourceError::NotDepthStencil { .. })));
    }
}
