//! Pass command recording
//!
//! Holders never talk to a live pass object. They record the commands of a
//! pass into a list, and the device replays the list when it encodes the pass.

use super::Device;
use std::ops::Range;

/// A command inside a render pass
#[derive(Debug)]
pub enum RenderCommand<D: Device> {
    SetPipeline(D::RenderPipeline),
    SetBindGroup { index: u32, bind_group: D::BindGroup },
    SetVertexBuffer { slot: u32, buffer: D::Buffer },
    SetIndexBuffer { buffer: D::Buffer, format: wgpu::IndexFormat },
    Draw { vertices: Range<u32>, instances: Range<u32> },
    DrawIndexed { indices: Range<u32>, base_vertex: i32, instances: Range<u32> },
    DrawIndirect { buffer: D::Buffer, offset: u64 },
    DrawIndexedIndirect { buffer: D::Buffer, offset: u64 },
    MultiDrawIndirect { buffer: D::Buffer, offset: u64, count: u32 },
    MultiDrawIndexedIndirect { buffer: D::Buffer, offset: u64, count: u32 },
}

/// A command inside a compute pass
#[derive(Debug)]
pub enum ComputeCommand<D: Device> {
    SetPipeline(D::ComputePipeline),
    SetBindGroup { index: u32, bind_group: D::BindGroup },
    Dispatch { x: u32, y: u32, z: u32 },
    DispatchIndirect { buffer: D::Buffer, offset: u64 },
}

/// Collects render pass commands with the shape of `wgpu::RenderPass`
#[derive(Debug)]
pub struct RenderPassRecorder<D: Device> {
    commands: Vec<RenderCommand<D>>,
}

impl<D: Device> Default for RenderPassRecorder<D> {
    fn default() -> Self {
        Self { commands: Vec::new() }
    }
}

impl<D: Device> RenderPassRecorder<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pipeline(&mut self, pipeline: &D::RenderPipeline) {
        self.commands.push(RenderCommand::SetPipeline(pipeline.clone()));
    }

    pub fn set_bind_group(&mut self, index: u32, bind_group: &D::BindGroup) {
        self.commands.push(RenderCommand::SetBindGroup {
            index,
            bind_group: bind_group.clone(),
        });
    }

    pub fn set_vertex_buffer(&mut self, slot: u32, buffer: D::Buffer) {
        self.commands.push(RenderCommand::SetVertexBuffer { slot, buffer });
    }

    pub fn set_index_buffer(&mut self, buffer: D::Buffer, format: wgpu::IndexFormat) {
        self.commands.push(RenderCommand::SetIndexBuffer { buffer, format });
    }

    pub fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.commands.push(RenderCommand::Draw { vertices, instances });
    }

    pub fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        self.commands.push(RenderCommand::DrawIndexed { indices, base_vertex, instances });
    }

    pub fn draw_indirect(&mut self, buffer: D::Buffer, offset: u64) {
        self.commands.push(RenderCommand::DrawIndirect { buffer, offset });
    }

    pub fn draw_indexed_indirect(&mut self, buffer: D::Buffer, offset: u64) {
        self.commands.push(RenderCommand::DrawIndexedIndirect { buffer, offset });
    }

    pub fn multi_draw_indirect(&mut self, buffer: D::Buffer, offset: u64, count: u32) {
        self.commands.push(RenderCommand::MultiDrawIndirect { buffer, offset, count });
    }

    pub fn multi_draw_indexed_indirect(&mut self, buffer: D::Buffer, offset: u64, count: u32) {
        self.commands.push(RenderCommand::MultiDrawIndexedIndirect { buffer, offset, count });
    }

    /// Number of commands recorded so far
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Ends recording and hands out the command list
    pub fn finish(self) -> Vec<RenderCommand<D>> {
        self.commands
    }
}

/// Collects compute pass commands with the shape of `wgpu::ComputePass`
#[derive(Debug)]
pub struct ComputePassRecorder<D: Device> {
    commands: Vec<ComputeCommand<D>>,
}

impl<D: Device> Default for ComputePassRecorder<D> {
    fn default() -> Self {
        Self { commands: Vec::new() }
    }
}

impl<D: Device> ComputePassRecorder<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pipeline(&mut self, pipeline: &D::ComputePipeline) {
        self.commands.push(ComputeCommand::SetPipeline(pipeline.clone()));
    }

    pub fn set_bind_group(&mut self, index: u32, bind_group: &D::BindGroup) {
        self.commands.push(ComputeCommand::SetBindGroup {
            index,
            bind_group: bind_group.clone(),
        });
    }

    pub fn dispatch_workgroups(&mut self, x: u32, y: u32, z: u32) {
        self.commands.push(ComputeCommand::Dispatch { x, y, z });
    }

    pub fn dispatch_workgroups_indirect(&mut self, buffer: D::Buffer, offset: u64) {
        self.commands.push(ComputeCommand::DispatchIndirect { buffer, offset });
    }

    /// Ends recording and hands out the command list
    pub fn finish(self) -> Vec<ComputeCommand<D>> {
        self.commands
    }
}
