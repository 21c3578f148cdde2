//! Buffers and their host-update channel

use crate::device::Device;
use crate::{FrameStage, PropertyFormat, ResourceError, ResourceId};
use bytes::Bytes;
use std::cell::{OnceCell, RefCell};
use std::fmt;
use tracing::{debug, trace};

/// Size of one `draw_indirect` argument block
pub const DRAW_INDIRECT_SIZE: u64 = 16;
/// Size of one `draw_indexed_indirect` argument block
pub const DRAW_INDEXED_INDIRECT_SIZE: u64 = 20;
/// Size of one `dispatch_workgroups_indirect` argument block
pub const DISPATCH_INDIRECT_SIZE: u64 = 12;

/// Role of a buffer, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    /// `Uint32` indices
    Index,
    Uniform,
    Storage,
    /// Storage that is also read as an index buffer
    IndexedStorage,
    /// Storage holding `draw_indirect` or dispatch arguments
    Indirect,
    /// Storage holding `draw_indexed_indirect` arguments
    IndexedIndirect,
    /// Storage whose contents are copied into a mappable staging buffer
    Map,
}

impl BufferKind {
    /// Device usage flags of the kind
    pub fn usage(self) -> wgpu::BufferUsages {
        use wgpu::BufferUsages as U;
        match self {
            Self::Vertex => U::VERTEX | U::COPY_DST,
            Self::Index => U::INDEX | U::COPY_DST,
            Self::Uniform => U::UNIFORM | U::COPY_DST,
            Self::Storage | Self::Map => U::STORAGE | U::COPY_DST | U::COPY_SRC,
            Self::IndexedStorage => U::STORAGE | U::INDEX | U::COPY_DST | U::COPY_SRC,
            Self::Indirect | Self::IndexedIndirect => U::STORAGE | U::INDIRECT | U::COPY_DST | U::COPY_SRC,
        }
    }

    pub fn property_format(self) -> PropertyFormat {
        match self {
            Self::Vertex => PropertyFormat::VertexBuffer,
            Self::Index => PropertyFormat::IndexBuffer,
            Self::Uniform => PropertyFormat::UniformBuffer,
            Self::Storage => PropertyFormat::StorageBuffer,
            Self::IndexedStorage => PropertyFormat::IndexedStorageBuffer,
            Self::Indirect => PropertyFormat::IndirectBuffer,
            Self::IndexedIndirect => PropertyFormat::IndexedIndirectBuffer,
            Self::Map => PropertyFormat::MapBuffer,
        }
    }

    /// Name and value of the device limit the size must stay below
    fn size_limit(self, limits: &wgpu::Limits) -> (&'static str, u64) {
        match self {
            Self::Vertex | Self::Index => ("buffer size", limits.max_buffer_size),
            Self::Uniform => ("uniform buffer binding size", limits.max_uniform_buffer_binding_size as u64),
            Self::Storage | Self::IndexedStorage | Self::Indirect | Self::IndexedIndirect | Self::Map => {
                ("storage buffer binding size", limits.max_storage_buffer_binding_size as u64)
            }
        }
    }

    /// Required multiple of the buffer size, if any
    fn size_multiple(self) -> Option<u64> {
        match self {
            Self::Index => Some(4),
            Self::Indirect => Some(DRAW_INDIRECT_SIZE),
            Self::IndexedIndirect => Some(DRAW_INDEXED_INDIRECT_SIZE),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Vertex => "vertex buffer",
            Self::Index => "index buffer",
            Self::Uniform => "uniform buffer",
            Self::Storage => "storage buffer",
            Self::IndexedStorage => "indexed storage buffer",
            Self::Indirect => "indirect buffer",
            Self::IndexedIndirect => "indexed indirect buffer",
            Self::Map => "map buffer",
        }
    }
}

/// Raw bytes written into a buffer at a byte offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferWrite {
    pub offset: u64,
    pub data: Bytes,
}

impl BufferWrite {
    pub fn new(offset: u64, data: impl Into<Bytes>) -> Self {
        Self { offset, data: data.into() }
    }

    /// Writes the bytes of a plain-old-data value
    pub fn from_pod<T: bytemuck::Pod>(offset: u64, value: &T) -> Self {
        Self::new(offset, Bytes::copy_from_slice(bytemuck::bytes_of(value)))
    }

    /// Writes the bytes of a slice of plain-old-data values
    pub fn from_slice<T: bytemuck::Pod>(offset: u64, values: &[T]) -> Self {
        Self::new(offset, Bytes::copy_from_slice(bytemuck::cast_slice(values)))
    }
}

/// Answer of a host-update handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferUpdate {
    /// Nothing changed
    Skip,
    /// Apply these writes before the stage continues
    Rewrite(Vec<BufferWrite>),
}

/// Host-update handler of a buffer, called at both frame stages
pub type BufferHandler = Box<dyn FnMut(FrameStage) -> BufferUpdate>;

/// Creation parameters shared by every buffer kind
pub struct BufferDesc {
    /// Reuse this id; a second create with the same id returns the first buffer
    pub id: Option<ResourceId>,
    pub label: Option<String>,
    pub size: u64,
    /// Contents written once when the device buffer is created
    pub contents: Option<Bytes>,
    pub handler: Option<BufferHandler>,
}

impl BufferDesc {
    /// A zero-initialized buffer of `size` bytes
    pub fn new(size: u64) -> Self {
        Self {
            id: None,
            label: None,
            size,
            contents: None,
            handler: None,
        }
    }

    /// A buffer sized to and initialized with `contents`
    pub fn with_contents(contents: impl Into<Bytes>) -> Self {
        let contents = contents.into();
        Self {
            size: contents.len() as u64,
            contents: Some(contents),
            ..Self::new(0)
        }
    }

    /// A buffer initialized with a slice of plain-old-data values
    pub fn from_slice<T: bytemuck::Pod>(values: &[T]) -> Self {
        Self::with_contents(Bytes::copy_from_slice(bytemuck::cast_slice(values)))
    }

    pub fn id(mut self, id: ResourceId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn handler(mut self, handler: impl FnMut(FrameStage) -> BufferUpdate + 'static) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }
}

impl fmt::Debug for BufferDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferDesc")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("size", &self.size)
            .field("contents", &self.contents.as_ref().map(Bytes::len))
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

/// A device buffer with lazy materialization and a host-update handler
pub struct Buffer<D: Device> {
    id: ResourceId,
    label: Option<String>,
    kind: BufferKind,
    size: u64,
    contents: RefCell<Option<Bytes>>,
    handle: OnceCell<D::Buffer>,
    staging: OnceCell<D::Buffer>,
    handler: RefCell<Option<BufferHandler>>,
}

impl<D: Device> Buffer<D> {
    /// Validates `desc` against the device limits and registers nothing on the device yet
    pub(crate) fn new(id: ResourceId, kind: BufferKind, desc: BufferDesc, limits: &wgpu::Limits) -> Result<Self, ResourceError> {
        if desc.size == 0 {
            return Err(ResourceError::ZeroSize { kind: kind.name(), id });
        }

        let (what, limit) = kind.size_limit(limits);
        if desc.size >= limit {
            return Err(ResourceError::LimitExceeded { what, value: desc.size, limit });
        }

        if let Some(multiple) = kind.size_multiple() {
            if desc.size % multiple != 0 {
                return Err(ResourceError::Misaligned {
                    what: kind.name(),
                    value: desc.size,
                    alignment: multiple,
                });
            }
        }

        if let Some(contents) = &desc.contents {
            check_write(id, desc.size, 0, contents.len() as u64)?;
        }

        Ok(Self {
            id,
            label: desc.label,
            kind,
            size: desc.size,
            contents: RefCell::new(desc.contents),
            handle: OnceCell::new(),
            staging: OnceCell::new(),
            handler: RefCell::new(desc.handler),
        })
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn usage(&self) -> wgpu::BufferUsages {
        self.kind.usage()
    }

    /// Number of `Uint32` indices the buffer holds
    pub fn index_count(&self) -> u32 {
        (self.size / 4) as u32
    }

    /// Returns the device buffer, creating it and writing its initial contents on first use
    pub fn gpu_buffer(&self, device: &D) -> D::Buffer {
        if let Some(handle) = self.handle.get() {
            return handle.clone();
        }

        debug!(id = %self.id, kind = self.kind.name(), size = self.size, "materializing buffer");
        let handle = device.create_buffer(&wgpu::BufferDescriptor {
            label: self.label.as_deref(),
            size: self.size,
            usage: self.kind.usage(),
            mapped_at_creation: false,
        });
        if let Some(contents) = self.contents.borrow_mut().take() {
            device.write_buffer(&handle, 0, &contents);
        }
        self.handle.get_or_init(|| handle).clone()
    }

    /// Returns the mappable staging buffer of a map buffer
    pub fn staging_buffer(&self, device: &D) -> Result<D::Buffer, ResourceError> {
        if self.kind != BufferKind::Map {
            return Err(ResourceError::NotMappable { id: self.id });
        }

        let staging = self.staging.get_or_init(|| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: self.label.as_deref(),
                size: self.size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });
        Ok(staging.clone())
    }

    /// Replaces the host-update handler
    pub fn set_handler(&self, handler: impl FnMut(FrameStage) -> BufferUpdate + 'static) {
        *self.handler.borrow_mut() = Some(Box::new(handler));
    }

    /// Queues one write into the buffer
    ///
    /// # Returns
    /// An error if the write leaves the buffer or is not 4-byte aligned
    pub fn write(&self, device: &D, write: &BufferWrite) -> Result<(), ResourceError> {
        check_write(self.id, self.size, write.offset, write.data.len() as u64)?;
        let handle = self.gpu_buffer(device);
        device.write_buffer(&handle, write.offset, &write.data);
        Ok(())
    }

    /// Brings the buffer up to date for one frame stage
    ///
    /// Materializes the buffer, applies whatever the handler asks for, and for
    /// map buffers at [`FrameStage::Finish`] copies the contents into the
    /// staging buffer.
    pub fn acquire(&self, device: &D, encoder: &mut D::CommandEncoder, stage: FrameStage) -> Result<(), ResourceError> {
        self.gpu_buffer(device);

        let update = self.handler.borrow_mut().as_mut().map(|handler| handler(stage));
        if let Some(BufferUpdate::Rewrite(writes)) = update {
            trace!(id = %self.id, ?stage, writes = writes.len(), "rewriting buffer");
            for write in &writes {
                self.write(device, write)?;
            }
        }

        if self.kind == BufferKind::Map && stage == FrameStage::Finish {
            let staging = self.staging_buffer(device)?;
            device.copy_buffer_to_buffer(encoder, &self.gpu_buffer(device), &staging, self.size);
        }
        Ok(())
    }
}

impl<D: Device> fmt::Debug for Buffer<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("kind", &self.kind)
            .field("size", &self.size)
            .field("materialized", &self.handle.get().is_some())
            .finish()
    }
}

fn check_write(id: ResourceId, size: u64, offset: u64, len: u64) -> Result<(), ResourceError> {
    if offset % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
        return Err(ResourceError::Misaligned {
            what: "write offset",
            value: offset,
            alignment: wgpu::COPY_BUFFER_ALIGNMENT,
        });
    }
    if len % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
        return Err(ResourceError::Misaligned {
            what: "write length",
            value: len,
            alignment: wgpu::COPY_BUFFER_ALIGNMENT,
        });
    }
    if offset.checked_add(len).is_none_or(|end| end > size) {
        return Err(ResourceError::WriteOutOfBounds { id, offset, len, size });
    }
    Ok(())
}
