//! Draw and dispatch parsing

use crate::device::{ComputePassRecorder, Device, RenderPassRecorder};
use crate::registry::Registry;
use crate::res::{Buffer, BufferKind, DISPATCH_INDIRECT_SIZE, DRAW_INDEXED_INDIRECT_SIZE, DRAW_INDIRECT_SIZE};
use crate::{CompileError, ResourceId};
use std::fmt;
use std::rc::Rc;

/// How a render holder draws
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderDispatchDesc {
    Draw { vertex_count: u32, instance_count: u32 },
    DrawIndexed { index_buffer: ResourceId, instance_count: u32 },
    DrawIndirect { indirect_buffer: ResourceId },
    DrawIndexedIndirect { index_buffer: ResourceId, indirect_buffer: ResourceId },
    MultiDrawIndirect { indirect_buffer: ResourceId, count: u32 },
    MultiDrawIndexedIndirect { index_buffer: ResourceId, indirect_buffer: ResourceId, count: u32 },
}

impl RenderDispatchDesc {
    /// A single-instance non-indexed draw
    pub fn draw(vertex_count: u32) -> Self {
        Self::Draw { vertex_count, instance_count: 1 }
    }

    /// A single-instance indexed draw over the whole index buffer
    pub fn draw_indexed(index_buffer: ResourceId) -> Self {
        Self::DrawIndexed { index_buffer, instance_count: 1 }
    }
}

/// How a compute holder dispatches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeDispatchDesc {
    Workgroups { x: u32, y: u32, z: u32 },
    Indirect { buffer: ResourceId, offset: u64 },
}

impl ComputeDispatchDesc {
    pub fn workgroups(x: u32, y: u32, z: u32) -> Self {
        Self::Workgroups { x, y, z }
    }
}

/// A draw with its buffers resolved
pub enum RenderDispatch<D: Device> {
    Draw { vertex_count: u32, instance_count: u32 },
    DrawIndexed { index: Rc<Buffer<D>>, instance_count: u32 },
    DrawIndirect { indirect: Rc<Buffer<D>> },
    DrawIndexedIndirect { index: Rc<Buffer<D>>, indirect: Rc<Buffer<D>> },
    MultiDrawIndirect { indirect: Rc<Buffer<D>>, count: u32 },
    MultiDrawIndexedIndirect { index: Rc<Buffer<D>>, indirect: Rc<Buffer<D>>, count: u32 },
}

impl<D: Device> RenderDispatch<D> {
    /// Index format of indexed draws
    pub fn index_format(&self) -> Option<wgpu::IndexFormat> {
        self.index_buffer().map(|_| wgpu::IndexFormat::Uint32)
    }

    fn index_buffer(&self) -> Option<&Rc<Buffer<D>>> {
        match self {
            Self::DrawIndexed { index, .. } | Self::DrawIndexedIndirect { index, .. } | Self::MultiDrawIndexedIndirect { index, .. } => Some(index),
            Self::Draw { .. } | Self::DrawIndirect { .. } | Self::MultiDrawIndirect { .. } => None,
        }
    }

    /// Every buffer the draw reads
    pub fn buffers(&self) -> Vec<&Rc<Buffer<D>>> {
        match self {
            Self::Draw { .. } => Vec::new(),
            Self::DrawIndexed { index, .. } => vec![index],
            Self::DrawIndirect { indirect } | Self::MultiDrawIndirect { indirect, .. } => vec![indirect],
            Self::DrawIndexedIndirect { index, indirect } | Self::MultiDrawIndexedIndirect { index, indirect, .. } => vec![index, indirect],
        }
    }

    /// Records the index buffer binding and the draw call
    pub fn record(&self, device: &D, pass: &mut RenderPassRecorder<D>) {
        if let Some(index) = self.index_buffer() {
            pass.set_index_buffer(index.gpu_buffer(device), wgpu::IndexFormat::Uint32);
        }
        match self {
            Self::Draw { vertex_count, instance_count } => pass.draw(0..*vertex_count, 0..*instance_count),
            Self::DrawIndexed { index, instance_count } => pass.draw_indexed(0..index.index_count(), 0, 0..*instance_count),
            Self::DrawIndirect { indirect } => pass.draw_indirect(indirect.gpu_buffer(device), 0),
            Self::DrawIndexedIndirect { indirect, .. } => pass.draw_indexed_indirect(indirect.gpu_buffer(device), 0),
            Self::MultiDrawIndirect { indirect, count } => pass.multi_draw_indirect(indirect.gpu_buffer(device), 0, *count),
            Self::MultiDrawIndexedIndirect { indirect, count, .. } => pass.multi_draw_indexed_indirect(indirect.gpu_buffer(device), 0, *count),
        }
    }
}

impl<D: Device> fmt::Debug for RenderDispatch<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draw { vertex_count, instance_count } => f.debug_struct("Draw").field("vertex_count", vertex_count).field("instance_count", instance_count).finish(),
            Self::DrawIndexed { index, instance_count } => f.debug_struct("DrawIndexed").field("index", &index.id()).field("instance_count", instance_count).finish(),
            Self::DrawIndirect { indirect } => f.debug_struct("DrawIndirect").field("indirect", &indirect.id()).finish(),
            Self::DrawIndexedIndirect { index, indirect } => f.debug_struct("DrawIndexedIndirect").field("index", &index.id()).field("indirect", &indirect.id()).finish(),
            Self::MultiDrawIndirect { indirect, count } => f.debug_struct("MultiDrawIndirect").field("indirect", &indirect.id()).field("count", count).finish(),
            Self::MultiDrawIndexedIndirect { index, indirect, count } => f
                .debug_struct("MultiDrawIndexedIndirect")
                .field("index", &index.id())
                .field("indirect", &indirect.id())
                .field("count", count)
                .finish(),
        }
    }
}

fn index_buffer<D: Device>(buffers: &Registry<Buffer<D>>, id: ResourceId) -> Result<Rc<Buffer<D>>, CompileError> {
    let buffer = buffers.get(id)?;
    if !buffer.usage().contains(wgpu::BufferUsages::INDEX) {
        return Err(CompileError::InvalidDispatch(format!("buffer {id} has no index usage")));
    }
    Ok(buffer)
}

fn indirect_buffer<D: Device>(buffers: &Registry<Buffer<D>>, id: ResourceId, kind: BufferKind, count: u32) -> Result<Rc<Buffer<D>>, CompileError> {
    let buffer = buffers.get(id)?;
    if buffer.kind() != kind {
        return Err(CompileError::InvalidDispatch(format!("buffer {id} is a {:?} buffer, expected {kind:?}", buffer.kind())));
    }
    let stride = match kind {
        BufferKind::IndexedIndirect => DRAW_INDEXED_INDIRECT_SIZE,
        _ => DRAW_INDIRECT_SIZE,
    };
    if count == 0 || count as u64 * stride > buffer.size() {
        return Err(CompileError::InvalidDispatch(format!(
            "{count} draws of {stride} bytes do not fit buffer {id} of {} bytes",
            buffer.size()
        )));
    }
    Ok(buffer)
}

/// Resolves a render dispatch against the buffer registry
pub fn parse_render_dispatch<D: Device>(desc: &RenderDispatchDesc, buffers: &Registry<Buffer<D>>) -> Result<RenderDispatch<D>, CompileError> {
    let dispatch = match *desc {
        RenderDispatchDesc::Draw { vertex_count, instance_count } => RenderDispatch::Draw { vertex_count, instance_count },
        RenderDispatchDesc::DrawIndexed { index_buffer: index, instance_count } => RenderDispatch::DrawIndexed {
            index: index_buffer(buffers, index)?,
            instance_count,
        },
        RenderDispatchDesc::DrawIndirect { indirect_buffer: indirect } => RenderDispatch::DrawIndirect {
            indirect: indirect_buffer(buffers, indirect, BufferKind::Indirect, 1)?,
        },
        RenderDispatchDesc::DrawIndexedIndirect {
            index_buffer: index,
            indirect_buffer: indirect,
        } => RenderDispatch::DrawIndexedIndirect {
            index: index_buffer(buffers, index)?,
            indirect: indirect_buffer(buffers, indirect, BufferKind::IndexedIndirect, 1)?,
        },
        RenderDispatchDesc::MultiDrawIndirect { indirect_buffer: indirect, count } => RenderDispatch::MultiDrawIndirect {
            indirect: indirect_buffer(buffers, indirect, BufferKind::Indirect, count)?,
            count,
        },
        RenderDispatchDesc::MultiDrawIndexedIndirect {
            index_buffer: index,
            indirect_buffer: indirect,
            count,
        } => RenderDispatch::MultiDrawIndexedIndirect {
            index: index_buffer(buffers, index)?,
            indirect: indirect_buffer(buffers, indirect, BufferKind::IndexedIndirect, count)?,
            count,
        },
    };
    Ok(dispatch)
}

/// A compute dispatch with its buffer resolved
pub enum ComputeDispatch<D: Device> {
    Workgroups { x: u32, y: u32, z: u32 },
    Indirect { buffer: Rc<Buffer<D>>, offset: u64 },
}

impl<D: Device> ComputeDispatch<D> {
    pub fn buffers(&self) -> Vec<&Rc<Buffer<D>>> {
        match self {
            Self::Workgroups { .. } => Vec::new(),
            Self::Indirect { buffer, .. } => vec![buffer],
        }
    }

    pub fn record(&self, device: &D, pass: &mut ComputePassRecorder<D>) {
        match self {
            Self::Workgroups { x, y, z } => pass.dispatch_workgroups(*x, *y, *z),
            Self::Indirect { buffer, offset } => pass.dispatch_workgroups_indirect(buffer.gpu_buffer(device), *offset),
        }
    }
}

impl<D: Device> fmt::Debug for ComputeDispatch<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Workgroups { x, y, z } => f.debug_struct("Workgroups").field("x", x).field("y", y).field("z", z).finish(),
            Self::Indirect { buffer, offset } => f.debug_struct("Indirect").field("buffer", &buffer.id()).field("offset", offset).finish(),
        }
    }
}

/// Resolves a compute dispatch and checks it against the device limits
pub fn parse_compute_dispatch<D: Device>(desc: &ComputeDispatchDesc, buffers: &Registry<Buffer<D>>, limits: &wgpu::Limits) -> Result<ComputeDispatch<D>, CompileError> {
    match *desc {
        ComputeDispatchDesc::Workgroups { x, y, z } => {
            let max = limits.max_compute_workgroups_per_dimension;
            if x > max || y > max || z > max {
                return Err(CompileError::InvalidDispatch(format!("workgroup count ({x}, {y}, {z}) exceeds the limit of {max} per dimension")));
            }
            Ok(ComputeDispatch::Workgroups { x, y, z })
        }
        ComputeDispatchDesc::Indirect { buffer: id, offset } => {
            let buffer = buffers.get(id)?;
            if !buffer.usage().contains(wgpu::BufferUsages::INDIRECT) {
                return Err(CompileError::InvalidDispatch(format!("buffer {id} has no indirect usage")));
            }
            if offset % 4 != 0 || offset + DISPATCH_INDIRECT_SIZE > buffer.size() {
                return Err(CompileError::InvalidDispatch(format!(
                    "dispatch arguments at offset {offset} do not fit buffer {id} of {} bytes",
                    buffer.size()
                )));
            }
            Ok(ComputeDispatch::Indirect { buffer, offset })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{RecordingDevice, RenderCommand};
    use crate::res::BufferDesc;

    fn register(buffers: &Registry<Buffer<RecordingDevice>>, kind: BufferKind, size: u64) -> ResourceId {
        let (id, _) = buffers.insert(|id| Buffer::new(id, kind, BufferDesc::new(size), &wgpu::Limits::default()).unwrap());
        id
    }

    /// Tests indexed draws use the whole index buffer
    #[test]
    fn test_draw_indexed() {
        let device = RecordingDevice::new();
        let buffers = Registry::new("buffer");
        let index = register(&buffers, BufferKind::Index, 24);

        let dispatch = parse_render_dispatch(&RenderDispatchDesc::draw_indexed(index), &buffers).unwrap();
        assert_eq!(dispatch.index_format(), Some(wgpu::IndexFormat::Uint32));

        let mut pass = RenderPassRecorder::new();
        dispatch.record(&device, &mut pass);
        let commands = pass.finish();
        assert!(matches!(commands[0], RenderCommand::SetIndexBuffer { format: wgpu::IndexFormat::Uint32, .. }));
        assert!(matches!(&commands[1], RenderCommand::DrawIndexed { indices, .. } if *indices == (0..6)));
    }

    /// Tests buffer role checks of indirect draws
    #[test]
    fn test_indirect_checks() {
        let buffers = Registry::new("buffer");
        let vertex = register(&buffers, BufferKind::Vertex, 64);
        let indirect = register(&buffers, BufferKind::Indirect, 32);
        let indexed_indirect = register(&buffers, BufferKind::IndexedIndirect, 40);
        let indexed_storage = register(&buffers, BufferKind::IndexedStorage, 64);

        assert!(matches!(
            parse_render_dispatch(&RenderDispatchDesc::draw_indexed(vertex), &buffers),
            Err(CompileError::InvalidDispatch(_))
        ));
        assert!(parse_render_dispatch(&RenderDispatchDesc::draw_indexed(indexed_storage), &buffers).is_ok());
        assert!(matches!(
            parse_render_dispatch(&RenderDispatchDesc::DrawIndirect { indirect_buffer: indexed_indirect }, &buffers),
            Err(CompileError::InvalidDispatch(_))
        ));
        assert!(parse_render_dispatch(&RenderDispatchDesc::MultiDrawIndirect { indirect_buffer: indirect, count: 2 }, &buffers).is_ok());
        assert!(matches!(
            parse_render_dispatch(&RenderDispatchDesc::MultiDrawIndirect { indirect_buffer: indirect, count: 3 }, &buffers),
            Err(CompileError::InvalidDispatch(_))
        ));
        assert!(
            parse_render_dispatch(
                &RenderDispatchDesc::MultiDrawIndexedIndirect {
                    index_buffer: indexed_storage,
                    indirect_buffer: indexed_indirect,
                    count: 2,
                },
                &buffers
            )
            .is_ok()
        );
    }

    /// Tests compute dispatch validation
    #[test]
    fn test_compute_dispatch() {
        let buffers = Registry::new("buffer");
        let limits = wgpu::Limits::default();
        let storage = register(&buffers, BufferKind::Storage, 16);
        let indirect = register(&buffers, BufferKind::Indirect, 16);

        assert!(parse_compute_dispatch(&ComputeDispatchDesc::workgroups(8, 8, 1), &buffers, &limits).is_ok());
        assert!(matches!(
            parse_compute_dispatch(&ComputeDispatchDesc::workgroups(limits.max_compute_workgroups_per_dimension + 1, 1, 1), &buffers, &limits),
            Err(CompileError::InvalidDispatch(_))
        ));
        assert!(matches!(
            parse_compute_dispatch(&ComputeDispatchDesc::Indirect { buffer: storage, offset: 0 }, &buffers, &limits),
            Err(CompileError::InvalidDispatch(_))
        ));
        assert!(parse_compute_dispatch(&ComputeDispatchDesc::Indirect { buffer: indirect, offset: 4 }, &buffers, &limits).is_ok());
        assert!(parse_compute_dispatch(&ComputeDispatchDesc::Indirect { buffer: indirect, offset: 8 }, &buffers, &limits).is_err());
    }
}
