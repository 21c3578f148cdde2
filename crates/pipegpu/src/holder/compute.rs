use super::sync;
use crate::compile::{ComputeDispatch, ComputeDispatchDesc, UniformSyncHandler};
use crate::context::Context;
use crate::device::{ComputePassRecorder, Device};
use crate::res::{Buffer, Shader};
use crate::{FrameStage, ResourceError, ResourceId, Uniforms};
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// Encoder-level work run right after the dispatch, e.g. a texel copy
pub type ComputeHook<D> = Box<dyn Fn(&Context<D>, &mut <D as Device>::CommandEncoder) -> Result<(), ResourceError>>;

/// Everything a compute holder is compiled from
pub struct ComputeHolderDesc<D: Device> {
    pub label: Option<String>,
    pub compute_shader: Option<Rc<Shader<D>>>,
    pub uniforms: Uniforms,
    pub dispatch: ComputeDispatchDesc,
    pub hook: Option<ComputeHook<D>>,
}

impl<D: Device> ComputeHolderDesc<D> {
    pub fn new(compute_shader: Rc<Shader<D>>, dispatch: ComputeDispatchDesc) -> Self {
        Self {
            label: None,
            compute_shader: Some(compute_shader),
            uniforms: Uniforms::new(),
            dispatch,
            hook: None,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn hook(mut self, hook: impl Fn(&Context<D>, &mut D::CommandEncoder) -> Result<(), ResourceError> + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }
}

/// A compiled compute pipeline with its bindings and dispatch
pub struct ComputeHolder<D: Device> {
    pub(crate) context: Rc<Context<D>>,
    pub(crate) label: Option<String>,
    pub(crate) pipeline_id: ResourceId,
    pub(crate) pipeline: D::ComputePipeline,
    pub(crate) bind_groups: Vec<D::BindGroup>,
    pub(crate) dispatch: ComputeDispatch<D>,
    pub(crate) hook: Option<ComputeHook<D>>,
    pub(crate) sync: UniformSyncHandler<D>,
    pub(crate) synced_buffers: Vec<Rc<Buffer<D>>>,
}

impl<D: Device> ComputeHolder<D> {
    pub fn pipeline_id(&self) -> ResourceId {
        self.pipeline_id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn bind_group_count(&self) -> usize {
        self.bind_groups.len()
    }

    pub fn dispatch(&self) -> &ComputeDispatch<D> {
        &self.dispatch
    }

    /// Records the pass into `encoder`
    ///
    /// Syncs for [`FrameStage::Begin`], records the compute pass, runs the
    /// hook, then syncs for [`FrameStage::Finish`].
    pub fn build(&self, encoder: &mut D::CommandEncoder) -> Result<(), ResourceError> {
        let device = self.context.device();
        sync(&self.context, &self.sync, &self.synced_buffers, encoder, FrameStage::Begin)?;

        let mut pass = ComputePassRecorder::new();
        pass.set_pipeline(&self.pipeline);
        for (index, bind_group) in self.bind_groups.iter().enumerate() {
            pass.set_bind_group(index as u32, bind_group);
        }
        self.dispatch.record(device, &mut pass);
        trace!(label = self.label(), dispatch = ?self.dispatch, "encoding compute pass");
        device.encode_compute_pass(encoder, self.label(), pass.finish());

        if let Some(hook) = &self.hook {
            hook(&self.context, encoder)?;
        }

        sync(&self.context, &self.sync, &self.synced_buffers, encoder, FrameStage::Finish)
    }
}

impl<D: Device> fmt::Debug for ComputeHolder<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputeHolder")
            .field("label", &self.label)
            .field("pipeline_id", &self.pipeline_id)
            .field("bind_groups", &self.bind_groups.len())
            .field("dispatch", &self.dispatch)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::Compiler;
    use crate::device::{ComputeCommand, EncodedCommand, RecordingDevice, RecordingEncoder};
    use crate::res::{BufferDesc, ShaderDesc, TextureDesc};
    use crate::{CompileError, ShaderStage};

    const FILL: &str = "
@group(0) @binding(0) var depth_out: texture_storage_2d<r32float, write>;

@compute @workgroup_size(16, 16, 1)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    textureStore(depth_out, vec2<i32>(id.xy), vec4<f32>(1.0, 0.0, 0.0, 0.0));
}
";

    const SUM: &str = "
@group(0) @binding(0) var<storage, read> values: array<f32>;
@group(0) @binding(1) var<storage, read_write> total: array<f32>;

@compute @workgroup_size(1)
fn main() {
    var sum = 0.0;
    for (var i = 0u; i < arrayLength(&values); i++) {
        sum += values[i];
    }
    total[0] = sum;
}
";

    /// Tests the 8x8x1 dispatch over a 128x128 storage texture with a copy hook
    #[test]
    fn test_compute_fill() {
        let compiler = Compiler::new(RecordingDevice::new());
        let format = wgpu::TextureFormat::R32Float;
        let depth = compiler.create_storage_texture_2d(TextureDesc::new(128, 128).format(format).label("depth")).unwrap();
        let copy = compiler.create_texture_2d(TextureDesc::new(128, 128).format(format).mip_level_count(1)).unwrap();
        assert_eq!(depth.mip_level_count(), 7);

        let shader = compiler.create_compute_shader(ShaderDesc::new(FILL, "main")).unwrap();
        let (source, destination) = (depth.id(), copy.id());
        let mut desc = ComputeHolderDesc::new(shader, ComputeDispatchDesc::workgroups(8, 8, 1))
            .label("fill")
            .hook(move |context, encoder| context.copy_texture_to_texture(encoder, source, 0, destination, 0));
        desc.uniforms.assign("depth_out", &depth);

        let holder = compiler.compile_compute_holder(desc).unwrap();
        assert_eq!(holder.bind_group_count(), 1);

        let mut encoder = RecordingEncoder::new();
        holder.build(&mut encoder).unwrap();

        assert_eq!(encoder.commands.len(), 2);
        let EncodedCommand::ComputePass { commands, .. } = &encoder.commands[0] else {
            panic!("expected the compute pass first, got {:?}", encoder.commands[0]);
        };
        let dispatches: Vec<_> = commands.iter().filter(|command| matches!(command, ComputeCommand::Dispatch { .. })).collect();
        assert_eq!(dispatches.len(), 1);
        assert!(matches!(dispatches[0], ComputeCommand::Dispatch { x: 8, y: 8, z: 1 }));
        assert!(matches!(encoder.commands[1], EncodedCommand::CopyTextureToTexture { source_mip_level: 0, destination_mip_level: 0, .. }));

        let journal = compiler.device().journal();
        let entries = &journal.bind_group_layouts[0];
        assert!(matches!(
            entries[0].ty,
            wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format: wgpu::TextureFormat::R32Float,
                ..
            }
        ));
    }

    /// Tests that a map buffer is copied to staging after the pass
    #[test]
    fn test_map_buffer_finish() {
        let compiler = Compiler::new(RecordingDevice::new());
        let values = compiler.create_storage_buffer(BufferDesc::from_slice(&[1.0f32, 2.0, 3.0, 4.0])).unwrap();
        let total = compiler.create_map_buffer(BufferDesc::new(4)).unwrap();
        let shader = compiler.create_compute_shader(ShaderDesc::new(SUM, "main")).unwrap();

        let mut desc = ComputeHolderDesc::new(shader, ComputeDispatchDesc::workgroups(1, 1, 1));
        desc.uniforms.assign("values", &values).assign("total", &total);
        let holder = compiler.compile_compute_holder(desc).unwrap();

        let mut encoder = RecordingEncoder::new();
        holder.build(&mut encoder).unwrap();
        assert_eq!(encoder.compute_passes().len(), 1);
        assert!(matches!(encoder.commands[1], EncodedCommand::CopyBufferToBuffer { size: 4, .. }));
    }

    /// Tests that a compute holder needs a compute shader
    #[test]
    fn test_compute_stage() {
        let compiler = Compiler::new(RecordingDevice::new());
        let vertex = compiler
            .create_vertex_shader(ShaderDesc::new("@vertex fn main() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0); }", "main"))
            .unwrap();
        let desc = ComputeHolderDesc::new(vertex, ComputeDispatchDesc::workgroups(1, 1, 1));
        assert!(matches!(
            compiler.compile_compute_holder(desc),
            Err(CompileError::ShaderStageMismatch { expected: ShaderStage::Compute, .. })
        ));

        let shader = compiler.create_compute_shader(ShaderDesc::new(FILL, "main")).unwrap();
        let mut desc = ComputeHolderDesc::new(shader, ComputeDispatchDesc::workgroups(1, 1, 1));
        desc.compute_shader = None;
        assert!(matches!(compiler.compile_compute_holder(desc), Err(CompileError::MissingShader(ShaderStage::Compute))));
    }

    /// Tests that the indirect buffer is synced around the pass
    #[test]
    fn test_indirect_dispatch() {
        let compiler = Compiler::new(RecordingDevice::new());
        let depth = compiler.create_storage_texture_2d(TextureDesc::new(32, 32).format(wgpu::TextureFormat::R32Float)).unwrap();
        let args = compiler.create_indirect_buffer(BufferDesc::from_slice(&[2u32, 2, 1, 0])).unwrap();
        let shader = compiler.create_compute_shader(ShaderDesc::new(FILL, "main")).unwrap();

        let mut desc = ComputeHolderDesc::new(shader, ComputeDispatchDesc::Indirect { buffer: args.id(), offset: 0 });
        desc.uniforms.assign("depth_out", &depth);
        let holder = compiler.compile_compute_holder(desc).unwrap();

        let mut encoder = RecordingEncoder::new();
        holder.build(&mut encoder).unwrap();
        let passes = encoder.compute_passes();
        assert!(matches!(passes[0].last(), Some(ComputeCommand::DispatchIndirect { offset: 0, .. })));
        assert_eq!(compiler.device().journal().buffer_writes.len(), 1);
    }
}
