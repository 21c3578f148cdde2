//! Textures, their usage-state machine and the mip cursor

use crate::device::{Device, TextureRegion};
use crate::{FrameStage, PropertyFormat, ResourceError, ResourceId};
use bytes::Bytes;
use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, trace};

/// Shape and role of a texture, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    D2,
    /// 2D texture that can also be bound as a storage texture
    Storage2D,
    D2Array,
    Cube,
    /// The swapchain image of the current frame
    Surface,
}

impl TextureKind {
    pub fn property_format(self) -> PropertyFormat {
        match self {
            Self::D2 => PropertyFormat::Texture2D,
            Self::Storage2D => PropertyFormat::TextureStorage2D,
            Self::D2Array => PropertyFormat::Texture2DArray,
            Self::Cube => PropertyFormat::TextureCube,
            Self::Surface => PropertyFormat::TextureSurface,
        }
    }

    /// View dimension of a texture binding covering the whole texture
    fn binding_dimension(self) -> wgpu::TextureViewDimension {
        match self {
            Self::D2 | Self::Storage2D | Self::Surface => wgpu::TextureViewDimension::D2,
            Self::D2Array => wgpu::TextureViewDimension::D2Array,
            Self::Cube => wgpu::TextureViewDimension::Cube,
        }
    }

    /// View dimension of a per-mip storage view; cubes are stored as arrays
    fn storage_dimension(self) -> wgpu::TextureViewDimension {
        match self {
            Self::D2 | Self::Storage2D | Self::Surface => wgpu::TextureViewDimension::D2,
            Self::D2Array | Self::Cube => wgpu::TextureViewDimension::D2Array,
        }
    }
}

/// Currently selected usage of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureUsageMode {
    /// No usage declared yet; views cannot be requested
    #[default]
    None,
    RenderAttachment,
    TextureBinding,
    StorageBinding,
}

/// Texels written into one mip level of one layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureWrite {
    pub layer: u32,
    pub mip_level: u32,
    pub data: Bytes,
}

/// Answer of a texture host-update handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextureUpdate {
    Skip,
    Rewrite(Vec<TextureWrite>),
}

/// Host-update handler of a texture, called at both frame stages
pub type TextureHandler = Box<dyn FnMut(FrameStage) -> TextureUpdate>;

/// Creation parameters shared by the non-surface texture kinds
pub struct TextureDesc {
    pub id: Option<ResourceId>,
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Defaults to the device's surface format
    pub format: Option<wgpu::TextureFormat>,
    /// Defaults to the longest mip chain
    pub mip_level_count: Option<u32>,
    pub sample_count: u32,
    /// Usage flags added to the ones implied by the kind
    pub usage: wgpu::TextureUsages,
    /// Mip 0 contents of each layer, written once at creation
    pub contents: Vec<Bytes>,
    pub handler: Option<TextureHandler>,
}

impl TextureDesc {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            id: None,
            label: None,
            width,
            height,
            format: None,
            mip_level_count: None,
            sample_count: 1,
            usage: wgpu::TextureUsages::empty(),
            contents: Vec::new(),
            handler: None,
        }
    }

    pub fn id(mut self, id: ResourceId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn format(mut self, format: wgpu::TextureFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn mip_level_count(mut self, count: u32) -> Self {
        self.mip_level_count = Some(count);
        self
    }

    pub fn sample_count(mut self, count: u32) -> Self {
        self.sample_count = count;
        self
    }

    pub fn usage(mut self, usage: wgpu::TextureUsages) -> Self {
        self.usage = usage;
        self
    }

    /// Initial mip 0 contents, one entry per layer
    pub fn contents(mut self, layers: Vec<Bytes>) -> Self {
        self.contents = layers;
        self
    }

    pub fn handler(mut self, handler: impl FnMut(FrameStage) -> TextureUpdate + 'static) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }
}

impl fmt::Debug for TextureDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureDesc")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("mip_level_count", &self.mip_level_count)
            .field("sample_count", &self.sample_count)
            .field("usage", &self.usage)
            .field("contents", &self.contents.len())
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

/// Longest mip chain a texture of this size may request
pub fn max_mip_level_count(width: u32, height: u32) -> u32 {
    width.max(height).max(1).ilog2().max(1)
}

/// Views cached per usage plus the mip cursor
struct UsageState<D: Device> {
    mode: TextureUsageMode,
    render_layer: u32,
    render_views: HashMap<u32, D::TextureView>,
    binding_view: Option<D::TextureView>,
    storage_views: Option<Vec<D::TextureView>>,
    cursor: u32,
    auto_advance: bool,
}

/// A texture with lazily created views for each usage
pub struct Texture<D: Device> {
    id: ResourceId,
    label: Option<String>,
    kind: TextureKind,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    layers: u32,
    mip_level_count: u32,
    sample_count: u32,
    usage: wgpu::TextureUsages,
    handle: OnceCell<D::Texture>,
    contents: RefCell<Vec<Bytes>>,
    handler: RefCell<Option<TextureHandler>>,
    state: RefCell<UsageState<D>>,
}

impl<D: Device> Texture<D> {
    /// Validates `desc` and derives format, usage and mip count
    ///
    /// # Arguments
    /// * `id` - Identity of the texture
    /// * `kind` - Any kind except [`TextureKind::Surface`]
    /// * `layers` - Number of array layers
    /// * `desc` - User parameters
    /// * `device` - Supplies the default format and the limits
    pub(crate) fn new(id: ResourceId, kind: TextureKind, layers: u32, desc: TextureDesc, device: &D) -> Result<Self, ResourceError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(ResourceError::ZeroSize { kind: "texture", id });
        }

        let limits = device.limits();
        let max_dimension = desc.width.max(desc.height);
        if max_dimension > limits.max_texture_dimension_2d {
            return Err(ResourceError::LimitExceeded {
                what: "texture dimension",
                value: max_dimension as u64,
                limit: limits.max_texture_dimension_2d as u64,
            });
        }
        if layers > limits.max_texture_array_layers {
            return Err(ResourceError::LimitExceeded {
                what: "texture array layers",
                value: layers as u64,
                limit: limits.max_texture_array_layers as u64,
            });
        }

        let format = desc.format.unwrap_or_else(|| device.surface_format());
        let mut usage = desc.usage | wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::TEXTURE_BINDING;
        if kind == TextureKind::Storage2D {
            usage |= wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::COPY_SRC;
        }

        let max_mips = max_mip_level_count(desc.width, desc.height);
        let mut mip_level_count = match desc.mip_level_count {
            Some(requested) if requested > max_mips => {
                return Err(ResourceError::TooManyMipLevels { id, requested, max: max_mips });
            }
            Some(requested) => requested.max(1),
            None => max_mips,
        };
        if format.is_depth_stencil_format() {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
            mip_level_count = 1;
        }
        if desc.sample_count > 1 {
            mip_level_count = 1;
        }

        if !desc.contents.is_empty() && desc.contents.len() != layers as usize {
            return Err(ResourceError::LayerCountMismatch {
                id,
                layers,
                actual: desc.contents.len(),
            });
        }

        Ok(Self::with_parts(
            id,
            desc.label,
            kind,
            format,
            (desc.width, desc.height, layers),
            mip_level_count,
            desc.sample_count,
            usage,
            desc.contents,
            desc.handler,
        ))
    }

    /// A texture standing for the swapchain image of each frame
    pub(crate) fn surface(id: ResourceId, label: Option<String>, device: &D) -> Self {
        let (width, height) = device.viewport();
        let usage = wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        Self::with_parts(id, label, TextureKind::Surface, device.surface_format(), (width, height, 1), 1, 1, usage, Vec::new(), None)
    }

    #[allow(clippy::too_many_arguments)]
    fn with_parts(
        id: ResourceId,
        label: Option<String>,
        kind: TextureKind,
        format: wgpu::TextureFormat,
        (width, height, layers): (u32, u32, u32),
        mip_level_count: u32,
        sample_count: u32,
        usage: wgpu::TextureUsages,
        contents: Vec<Bytes>,
        handler: Option<TextureHandler>,
    ) -> Self {
        Self {
            id,
            label,
            kind,
            format,
            width,
            height,
            layers,
            mip_level_count,
            sample_count,
            usage,
            handle: OnceCell::new(),
            contents: RefCell::new(contents),
            handler: RefCell::new(handler),
            state: RefCell::new(UsageState {
                mode: TextureUsageMode::None,
                render_layer: 0,
                render_views: HashMap::new(),
                binding_view: None,
                storage_views: None,
                cursor: 0,
                auto_advance: false,
            }),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn kind(&self) -> TextureKind {
        self.kind
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layers(&self) -> u32 {
        self.layers
    }

    pub fn mip_level_count(&self) -> u32 {
        self.mip_level_count
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn usage(&self) -> wgpu::TextureUsages {
        self.usage
    }

    pub fn usage_mode(&self) -> TextureUsageMode {
        self.state.borrow().mode
    }

    /// Size of one mip level, never smaller than 1x1
    pub fn mip_extent(&self, level: u32) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: (self.width >> level).max(1),
            height: (self.height >> level).max(1),
            depth_or_array_layers: 1,
        }
    }

    /// Sample type of the full-texture binding view
    pub fn sample_type(&self) -> Option<wgpu::TextureSampleType> {
        self.format.sample_type(Some(self.binding_aspect()), None)
    }

    /// Aspect sampled through a texture binding
    fn binding_aspect(&self) -> wgpu::TextureAspect {
        if self.format.has_depth_aspect() {
            wgpu::TextureAspect::DepthOnly
        } else if self.format.has_stencil_aspect() {
            wgpu::TextureAspect::StencilOnly
        } else {
            wgpu::TextureAspect::All
        }
    }

    /// Returns the device texture, creating it and writing its initial contents on first use
    ///
    /// Surface textures return the swapchain image of the current frame.
    pub fn gpu_texture(&self, device: &D) -> Result<D::Texture, ResourceError> {
        if self.kind == TextureKind::Surface {
            return device.current_surface().map(|(texture, _)| texture).ok_or(ResourceError::SurfaceUnavailable);
        }
        if let Some(handle) = self.handle.get() {
            return Ok(handle.clone());
        }

        debug!(id = %self.id, kind = ?self.kind, format = ?self.format, width = self.width, height = self.height, "materializing texture");
        let handle = device.create_texture(&wgpu::TextureDescriptor {
            label: self.label.as_deref(),
            size: wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: self.layers,
            },
            mip_level_count: self.mip_level_count,
            sample_count: self.sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage: self.usage,
            view_formats: &[],
        });

        let contents = std::mem::take(&mut *self.contents.borrow_mut());
        if !self.format.is_depth_stencil_format() {
            for (layer, data) in contents.iter().enumerate() {
                self.write_level(device, &handle, layer as u32, 0, data);
            }
        }
        Ok(self.handle.get_or_init(|| handle).clone())
    }

    /// Queues a write of one full mip level of one layer
    fn write_level(&self, device: &D, handle: &D::Texture, layer: u32, mip_level: u32, data: &[u8]) {
        let extent = self.mip_extent(mip_level);
        let (block_width, block_height) = self.format.block_dimensions();
        let block_size = self.format.block_copy_size(None).unwrap_or(4);
        let layout = wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(extent.width.div_ceil(block_width) * block_size),
            rows_per_image: Some(extent.height.div_ceil(block_height)),
        };
        let region = TextureRegion {
            mip_level,
            origin: wgpu::Origin3d { x: 0, y: 0, z: layer },
            size: extent,
        };
        device.write_texture(handle, region, data, layout);
    }

    /// Replaces the host-update handler
    pub fn set_handler(&self, handler: impl FnMut(FrameStage) -> TextureUpdate + 'static) {
        *self.handler.borrow_mut() = Some(Box::new(handler));
    }

    /// Brings the texture up to date for one frame stage
    pub fn acquire(&self, device: &D, stage: FrameStage) -> Result<(), ResourceError> {
        let handle = self.gpu_texture(device)?;

        let update = self.handler.borrow_mut().as_mut().map(|handler| handler(stage));
        if let Some(TextureUpdate::Rewrite(writes)) = update {
            trace!(id = %self.id, ?stage, writes = writes.len(), "rewriting texture");
            for write in &writes {
                if write.layer >= self.layers {
                    return Err(ResourceError::LayerOutOfRange {
                        id: self.id,
                        layer: write.layer,
                        layers: self.layers,
                    });
                }
                if write.mip_level >= self.mip_level_count {
                    return Err(ResourceError::MipLevelOutOfRange { id: self.id, level: write.mip_level });
                }
                self.write_level(device, &handle, write.layer, write.mip_level, &write.data);
            }
        }
        Ok(())
    }

    fn require_usage(&self, usage: wgpu::TextureUsages) -> Result<(), ResourceError> {
        if self.usage.contains(usage) {
            Ok(())
        } else {
            Err(ResourceError::UsageNotSupported { id: self.id, usage })
        }
    }

    /// Selects render-attachment usage of one layer
    ///
    /// The view covers one layer and mip 0. Views of other layers stay cached.
    pub fn use_as_render_attachment(&self, device: &D, layer: u32) -> Result<(), ResourceError> {
        self.require_usage(wgpu::TextureUsages::RENDER_ATTACHMENT)?;
        if layer >= self.layers {
            return Err(ResourceError::LayerOutOfRange {
                id: self.id,
                layer,
                layers: self.layers,
            });
        }

        if self.kind != TextureKind::Surface && !self.state.borrow().render_views.contains_key(&layer) {
            let texture = self.gpu_texture(device)?;
            let view = device.create_texture_view(
                &texture,
                &wgpu::TextureViewDescriptor {
                    label: self.label.as_deref(),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_mip_level: 0,
                    mip_level_count: Some(1),
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    ..Default::default()
                },
            );
            self.state.borrow_mut().render_views.insert(layer, view);
        }

        let mut state = self.state.borrow_mut();
        state.mode = TextureUsageMode::RenderAttachment;
        state.render_layer = layer;
        Ok(())
    }

    /// Selects sampled usage; the view covers every mip and layer
    pub fn use_as_texture_binding(&self, device: &D) -> Result<(), ResourceError> {
        self.require_usage(wgpu::TextureUsages::TEXTURE_BINDING)?;

        if self.kind != TextureKind::Surface && self.state.borrow().binding_view.is_none() {
            let view = self.create_binding_view(device)?;
            self.state.borrow_mut().binding_view = Some(view);
        }

        self.state.borrow_mut().mode = TextureUsageMode::TextureBinding;
        Ok(())
    }

    fn create_binding_view(&self, device: &D) -> Result<D::TextureView, ResourceError> {
        let texture = self.gpu_texture(device)?;
        Ok(device.create_texture_view(
            &texture,
            &wgpu::TextureViewDescriptor {
                label: self.label.as_deref(),
                dimension: Some(self.kind.binding_dimension()),
                aspect: self.binding_aspect(),
                base_mip_level: 0,
                mip_level_count: Some(self.mip_level_count),
                base_array_layer: 0,
                array_layer_count: Some(self.layers),
                ..Default::default()
            },
        ))
    }

    /// Selects storage usage; one view per mip level covering every layer
    pub fn use_as_storage_binding(&self, device: &D) -> Result<(), ResourceError> {
        self.require_usage(wgpu::TextureUsages::STORAGE_BINDING)?;

        if self.state.borrow().storage_views.is_none() {
            let texture = self.gpu_texture(device)?;
            let views = (0..self.mip_level_count)
                .map(|level| {
                    device.create_texture_view(
                        &texture,
                        &wgpu::TextureViewDescriptor {
                            label: self.label.as_deref(),
                            dimension: Some(self.kind.storage_dimension()),
                            base_mip_level: level,
                            mip_level_count: Some(1),
                            base_array_layer: 0,
                            array_layer_count: Some(self.layers),
                            ..Default::default()
                        },
                    )
                })
                .collect();
            self.state.borrow_mut().storage_views = Some(views);
        }

        self.state.borrow_mut().mode = TextureUsageMode::StorageBinding;
        Ok(())
    }

    /// View for the currently selected usage
    ///
    /// Storage views follow the mip cursor; with auto-advance on, each read
    /// moves the cursor to the next mip.
    ///
    /// # Returns
    /// [`ResourceError::UsageNotDeclared`] while no usage has been selected
    pub fn view(&self, device: &D) -> Result<D::TextureView, ResourceError> {
        let mut state = self.state.borrow_mut();
        let mode = state.mode;
        match mode {
            TextureUsageMode::None => Err(ResourceError::UsageNotDeclared { id: self.id }),
            TextureUsageMode::RenderAttachment if self.kind == TextureKind::Surface => {
                device.current_surface().map(|(_, view)| view).ok_or(ResourceError::SurfaceUnavailable)
            }
            TextureUsageMode::RenderAttachment => state
                .render_views
                .get(&state.render_layer)
                .cloned()
                .ok_or(ResourceError::UsageNotDeclared { id: self.id }),
            TextureUsageMode::TextureBinding if self.kind == TextureKind::Surface => {
                drop(state);
                self.create_binding_view(device)
            }
            TextureUsageMode::TextureBinding => state.binding_view.clone().ok_or(ResourceError::UsageNotDeclared { id: self.id }),
            TextureUsageMode::StorageBinding => {
                let level = state.cursor;
                if state.auto_advance {
                    state.cursor = (level + 1) % self.mip_level_count;
                }
                state
                    .storage_views
                    .as_ref()
                    .and_then(|views| views.get(level as usize))
                    .cloned()
                    .ok_or(ResourceError::MipLevelOutOfRange { id: self.id, level })
            }
        }
    }

    /// Points the mip cursor at `level` modulo the mip count
    pub fn cursor(&self, level: u32) {
        self.state.borrow_mut().cursor = level % self.mip_level_count;
    }

    /// Mip level the next storage view read returns
    pub fn current_cursor(&self) -> u32 {
        self.state.borrow().cursor
    }

    /// Advances the mip cursor by one, wrapping at the mip count
    pub fn next_cursor(&self) -> u32 {
        let mut state = self.state.borrow_mut();
        state.cursor = (state.cursor + 1) % self.mip_level_count;
        state.cursor
    }

    /// Turns on advancing the cursor on every storage view read
    pub fn set_auto_advance(&self, enabled: bool) {
        self.state.borrow_mut().auto_advance = enabled;
    }

    /// Per-mip storage views from `start` to the last mip
    ///
    /// Selects storage usage. The iterator does not touch the mip cursor and
    /// can be restarted.
    pub fn storage_mip_views(&self, device: &D, start: u32) -> Result<StorageMipViews<D>, ResourceError> {
        self.use_as_storage_binding(device)?;
        let views = self.state.borrow().storage_views.clone().unwrap_or_default();
        Ok(StorageMipViews {
            views,
            start: start.min(self.mip_level_count),
            next: start.min(self.mip_level_count),
        })
    }
}

impl<D: Device> fmt::Debug for Texture<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("kind", &self.kind)
            .field("format", &self.format)
            .field("size", &(self.width, self.height, self.layers))
            .field("mip_level_count", &self.mip_level_count)
            .field("mode", &self.usage_mode())
            .finish()
    }
}

/// Restartable sequence of `(mip level, storage view)` pairs
pub struct StorageMipViews<D: Device> {
    views: Vec<D::TextureView>,
    start: u32,
    next: u32,
}

impl<D: Device> StorageMipViews<D> {
    /// Rewinds to the first mip of the sequence
    pub fn restart(&mut self) {
        self.next = self.start;
    }
}

impl<D: Device> Clone for StorageMipViews<D> {
    fn clone(&self) -> Self {
        Self {
            views: self.views.clone(),
            start: self.start,
            next: self.next,
        }
    }
}

impl<D: Device> Iterator for StorageMipViews<D> {
    type Item = (u32, D::TextureView);

    fn next(&mut self) -> Option<Self::Item> {
        let view = self.views.get(self.next as usize)?.clone();
        let level = self.next;
        self.next += 1;
        Some((level, view))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::RecordingDevice;

    fn storage_texture(device: &RecordingDevice, size: u32) -> Texture<RecordingDevice> {
        let desc = TextureDesc::new(size, size).format(wgpu::TextureFormat::R32Float);
        Texture::new(ResourceId::mint(), TextureKind::Storage2D, 1, desc, device).unwrap()
    }

    /// Tests default format, mip chain and usage derivation
    #[test]
    fn test_creation_defaults() {
        let device = RecordingDevice::new();
        let texture = Texture::new(ResourceId::mint(), TextureKind::D2, 1, TextureDesc::new(256, 64), &device).unwrap();
        assert_eq!(texture.format(), wgpu::TextureFormat::Bgra8Unorm);
        assert_eq!(texture.mip_level_count(), 8);
        assert!(texture.usage().contains(wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST));
        assert!(!texture.usage().contains(wgpu::TextureUsages::STORAGE_BINDING));

        let storage = storage_texture(&device, 128);
        assert_eq!(storage.mip_level_count(), 7);
        assert!(storage.usage().contains(wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::COPY_SRC));

        let depth = Texture::new(
            ResourceId::mint(),
            TextureKind::D2,
            1,
            TextureDesc::new(64, 64).format(wgpu::TextureFormat::Depth32Float),
            &device,
        )
        .unwrap();
        assert_eq!(depth.mip_level_count(), 1);
        assert!(depth.usage().contains(wgpu::TextureUsages::RENDER_ATTACHMENT));
        assert_eq!(max_mip_level_count(1, 1), 1);
    }

    /// Tests rejected creation parameters
    #[test]
    fn test_creation_errors() {
        let device = RecordingDevice::new();
        let zero = Texture::new(ResourceId::mint(), TextureKind::D2, 1, TextureDesc::new(0, 16), &device);
        assert!(matches!(zero, Err(ResourceError::ZeroSize { .. })));

        let mips = Texture::new(ResourceId::mint(), TextureKind::D2, 1, TextureDesc::new(16, 16).mip_level_count(5), &device);
        assert!(matches!(mips, Err(ResourceError::TooManyMipLevels { requested: 5, max: 4, .. })));

        let layers = Texture::new(ResourceId::mint(), TextureKind::D2Array, 3, TextureDesc::new(4, 4).contents(vec![Bytes::new()]), &device);
        assert!(matches!(layers, Err(ResourceError::LayerCountMismatch { layers: 3, actual: 1, .. })));
    }

    /// Tests that views require a declared usage and that usages are guarded by creation flags
    #[test]
    fn test_usage_guard() {
        let device = RecordingDevice::new();
        let texture = Texture::new(ResourceId::mint(), TextureKind::D2, 1, TextureDesc::new(16, 16), &device).unwrap();

        assert!(matches!(texture.view(&device), Err(ResourceError::UsageNotDeclared { .. })));
        assert!(matches!(
            texture.use_as_storage_binding(&device),
            Err(ResourceError::UsageNotSupported { usage, .. }) if usage == wgpu::TextureUsages::STORAGE_BINDING
        ));
        assert!(matches!(texture.use_as_render_attachment(&device, 0), Err(ResourceError::UsageNotSupported { .. })));
        assert_eq!(texture.usage_mode(), TextureUsageMode::None);

        texture.use_as_texture_binding(&device).unwrap();
        let view = texture.view(&device).unwrap();
        assert_eq!(view.mip_level_count, Some(4));
    }

    /// Tests switching from storage to sampled usage keeps the storage cache
    #[test]
    fn test_usage_switch() {
        let device = RecordingDevice::new();
        let texture = storage_texture(&device, 64);

        texture.use_as_storage_binding(&device).unwrap();
        let storage_view = texture.view(&device).unwrap();
        let views_after_storage = device.journal().views.len();
        assert_eq!(views_after_storage, texture.mip_level_count() as usize);

        texture.use_as_texture_binding(&device).unwrap();
        let binding_view = texture.view(&device).unwrap();
        assert_ne!(binding_view.serial, storage_view.serial);
        assert_eq!(device.journal().views.len(), views_after_storage + 1);

        texture.use_as_storage_binding(&device).unwrap();
        assert_eq!(texture.view(&device).unwrap().serial, storage_view.serial);
        assert_eq!(device.journal().views.len(), views_after_storage + 1);
    }

    /// Tests that the cursor wraps modulo the mip count
    #[test]
    fn test_cursor_modulo() {
        let device = RecordingDevice::new();
        let texture = storage_texture(&device, 16);
        texture.use_as_storage_binding(&device).unwrap();
        let mips = texture.mip_level_count();
        assert_eq!(mips, 4);

        for k in [0, 1, 3, 4, 9, 102] {
            texture.cursor(k);
            assert_eq!(texture.view(&device).unwrap().base_mip_level, k % mips);
            assert_eq!(texture.current_cursor(), k % mips);
        }

        texture.cursor(3);
        assert_eq!(texture.next_cursor(), 0);
    }

    /// Tests that auto-advance moves the cursor on each read
    #[test]
    fn test_cursor_auto_advance() {
        let device = RecordingDevice::new();
        let texture = storage_texture(&device, 16);
        texture.use_as_storage_binding(&device).unwrap();
        texture.set_auto_advance(true);
        texture.cursor(2);

        let levels: Vec<_> = (0..6).map(|_| texture.view(&device).unwrap().base_mip_level).collect();
        assert_eq!(levels, vec![2, 3, 0, 1, 2, 3]);

        texture.set_auto_advance(false);
        texture.cursor(1);
        assert_eq!(texture.view(&device).unwrap().base_mip_level, 1);
        assert_eq!(texture.view(&device).unwrap().base_mip_level, 1);
    }

    /// Tests the restartable storage view iterator
    #[test]
    fn test_storage_mip_views() {
        let device = RecordingDevice::new();
        let texture = storage_texture(&device, 32);
        texture.cursor(2);

        let mut views = texture.storage_mip_views(&device, 1).unwrap();
        let levels: Vec<_> = views.by_ref().map(|(level, view)| (level, view.base_mip_level)).collect();
        assert_eq!(levels, vec![(1, 1), (2, 2), (3, 3), (4, 4)]);
        assert!(views.next().is_none());

        views.restart();
        assert_eq!(views.next().map(|(level, _)| level), Some(1));
        assert_eq!(texture.current_cursor(), 2);
    }

    /// Tests per-layer render views and initial contents
    #[test]
    fn test_array_layers() {
        let device = RecordingDevice::new();
        let layers = vec![Bytes::from(vec![0u8; 4 * 4 * 4]); 3];
        let desc = TextureDesc::new(4, 4)
            .format(wgpu::TextureFormat::Rgba8Unorm)
            .usage(wgpu::TextureUsages::RENDER_ATTACHMENT)
            .contents(layers);
        let texture = Texture::new(ResourceId::mint(), TextureKind::D2Array, 3, desc, &device).unwrap();

        texture.use_as_render_attachment(&device, 2).unwrap();
        let view = texture.view(&device).unwrap();
        assert_eq!(view.base_array_layer, 2);
        assert_eq!(view.array_layer_count, Some(1));
        assert!(matches!(texture.use_as_render_attachment(&device, 3), Err(ResourceError::LayerOutOfRange { .. })));

        let journal = device.journal();
        assert_eq!(journal.texture_writes.len(), 3);
        assert_eq!(journal.texture_writes[2].1.origin.z, 2);
    }

    /// Tests that surface textures follow the current swapchain image
    #[test]
    fn test_surface_texture() {
        let device = RecordingDevice::new();
        let surface = Texture::surface(ResourceId::mint(), None, &device);
        assert_eq!((surface.width(), surface.height()), (640, 480));

        surface.use_as_render_attachment(&device, 0).unwrap();
        let first = surface.view(&device).unwrap();
        device.next_surface_frame();
        let second = surface.view(&device).unwrap();
        assert_ne!(first.serial, second.serial);

        device.lose_surface();
        assert!(matches!(surface.view(&device), Err(ResourceError::SurfaceUnavailable)));
    }
}
