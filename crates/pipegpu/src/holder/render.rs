use super::sync;
use crate::compile::{RenderDispatch, RenderDispatchDesc, UniformSyncHandler};
use crate::context::Context;
use crate::device::{Device, RenderPassDescriptor, RenderPassRecorder};
use crate::res::{Buffer, ColorAttachment, DepthStencilAttachment, Shader};
use crate::{Attributes, FrameStage, MultiSampleFormat, PrimitiveDesc, ResourceError, ResourceId, Uniforms};
use std::fmt;
use std::rc::Rc;
use tracing::{trace, warn};

/// Everything a render holder is compiled from
pub struct RenderHolderDesc<D: Device> {
    pub label: Option<String>,
    pub vertex_shader: Option<Rc<Shader<D>>>,
    pub fragment_shader: Option<Rc<Shader<D>>>,
    /// Vertex inputs by name
    pub attributes: Attributes,
    /// Resource bindings by name
    pub uniforms: Uniforms,
    pub dispatch: RenderDispatchDesc,
    pub primitive: PrimitiveDesc,
    pub multisample: MultiSampleFormat,
    pub color_attachments: Vec<Rc<ColorAttachment<D>>>,
    pub depth_stencil_attachment: Option<Rc<DepthStencilAttachment<D>>>,
}

impl<D: Device> RenderHolderDesc<D> {
    /// A descriptor with no shaders, empty bags and default pipeline state
    pub fn new(dispatch: RenderDispatchDesc) -> Self {
        Self {
            label: None,
            vertex_shader: None,
            fragment_shader: None,
            attributes: Attributes::new(),
            uniforms: Uniforms::new(),
            dispatch,
            primitive: PrimitiveDesc::default(),
            multisample: MultiSampleFormat::default(),
            color_attachments: Vec::new(),
            depth_stencil_attachment: None,
        }
    }
}

/// A compiled render pipeline with its bindings, targets and draw
pub struct RenderHolder<D: Device> {
    pub(crate) context: Rc<Context<D>>,
    pub(crate) label: Option<String>,
    pub(crate) pipeline_id: ResourceId,
    pub(crate) pipeline: D::RenderPipeline,
    pub(crate) vertex_buffers: Vec<Rc<Buffer<D>>>,
    pub(crate) bind_groups: Vec<D::BindGroup>,
    pub(crate) color_attachments: Vec<Rc<ColorAttachment<D>>>,
    pub(crate) depth_stencil_attachment: Option<Rc<DepthStencilAttachment<D>>>,
    pub(crate) dispatch: RenderDispatch<D>,
    pub(crate) sync: UniformSyncHandler<D>,
    /// Vertex and draw buffers that are not part of the uniform bag
    pub(crate) synced_buffers: Vec<Rc<Buffer<D>>>,
}

impl<D: Device> RenderHolder<D> {
    /// Id of the pipeline in the context's pipeline registry
    pub fn pipeline_id(&self) -> ResourceId {
        self.pipeline_id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Number of vertex buffer slots, one per distinct owning buffer
    pub fn vertex_buffer_count(&self) -> usize {
        self.vertex_buffers.len()
    }

    pub fn bind_group_count(&self) -> usize {
        self.bind_groups.len()
    }

    pub fn dispatch(&self) -> &RenderDispatch<D> {
        &self.dispatch
    }

    /// Records the pass into `encoder`
    ///
    /// Syncs the holder's resources for [`FrameStage::Begin`], records the
    /// render pass, then syncs for [`FrameStage::Finish`]. A holder without
    /// color attachments logs a warning and records nothing after the first sync.
    pub fn build(&self, encoder: &mut D::CommandEncoder) -> Result<(), ResourceError> {
        let device = self.context.device();
        sync(&self.context, &self.sync, &self.synced_buffers, encoder, FrameStage::Begin)?;

        if self.color_attachments.is_empty() {
            warn!(label = self.label(), "render holder has no color attachments, skipping pass");
            return Ok(());
        }

        let color_attachments = self
            .color_attachments
            .iter()
            .map(|attachment| attachment.pass_attachment(device))
            .collect::<Result<Vec<_>, _>>()?;
        let depth_stencil_attachment = self.depth_stencil_attachment.as_ref().map(|attachment| attachment.pass_attachment(device)).transpose()?;

        let mut pass = RenderPassRecorder::new();
        pass.set_pipeline(&self.pipeline);
        for (slot, buffer) in self.vertex_buffers.iter().enumerate() {
            pass.set_vertex_buffer(slot as u32, buffer.gpu_buffer(device));
        }
        for (index, bind_group) in self.bind_groups.iter().enumerate() {
            pass.set_bind_group(index as u32, bind_group);
        }
        self.dispatch.record(device, &mut pass);

        trace!(label = self.label(), commands = pass.len(), "encoding render pass");
        device.encode_render_pass(
            encoder,
            RenderPassDescriptor {
                label: self.label(),
                color_attachments,
                depth_stencil_attachment,
            },
            pass.finish(),
        );

        sync(&self.context, &self.sync, &self.synced_buffers, encoder, FrameStage::Finish)
    }
}

impl<D: Device> fmt::Debug for RenderHolder<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderHolder")
            .field("label", &self.label)
            .field("pipeline_id", &self.pipeline_id)
            .field("vertex_buffers", &self.vertex_buffers.len())
            .field("bind_groups", &self.bind_groups.len())
            .field("color_attachments", &self.color_attachments.len())
            .field("dispatch", &self.dispatch)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::Compiler;
    use crate::device::{EncodedCommand, RecordingDevice, RecordingEncoder, RenderCommand};
    use crate::res::{BufferDesc, BufferUpdate, BufferWrite, ColorAttachmentDesc, ShaderDesc, TextureDesc};
    use crate::{CompileError, ShaderStage};
    use std::cell::RefCell;

    const SHADER: &str = "
struct Camera {
    view_proj: mat4x4<f32>,
}

@group(0) @binding(0) var<uniform> camera: Camera;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return camera.view_proj * vec4<f32>(position, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 0.5, 0.0, 1.0);
}

@fragment
fn fs_depth_only() {
}
";

    struct Scene {
        compiler: Compiler<RecordingDevice>,
        desc: RenderHolderDesc<RecordingDevice>,
    }

    fn scene(fragment_entry_point: &str, handler_log: Option<Rc<RefCell<Vec<FrameStage>>>>) -> Scene {
        let compiler = Compiler::new(RecordingDevice::new());
        let positions: [[f32; 3]; 6] = [[-1.0, -1.0, 0.0], [1.0, -1.0, 0.0], [1.0, 1.0, 0.0], [-1.0, -1.0, 0.0], [1.0, 1.0, 0.0], [-1.0, 1.0, 0.0]];
        let vertices = compiler.create_vertex_buffer(BufferDesc::from_slice(&positions).label("quad")).unwrap();

        let mut camera_desc = BufferDesc::new(64).label("camera");
        if let Some(log) = handler_log {
            camera_desc = camera_desc.handler(move |stage| {
                log.borrow_mut().push(stage);
                match stage {
                    FrameStage::Begin => BufferUpdate::Rewrite(vec![BufferWrite::from_pod(0, &[1.0f32; 16])]),
                    FrameStage::Finish => BufferUpdate::Skip,
                }
            });
        }
        let camera = compiler.create_uniform_buffer(camera_desc).unwrap();

        let target = compiler
            .create_texture_2d(
                TextureDesc::new(64, 64)
                    .format(wgpu::TextureFormat::Rgba8Unorm)
                    .mip_level_count(1)
                    .usage(wgpu::TextureUsages::RENDER_ATTACHMENT),
            )
            .unwrap();
        let attachment = compiler.create_color_attachment(ColorAttachmentDesc::new(target)).unwrap();

        let vertex_shader = compiler.create_vertex_shader(ShaderDesc::new(SHADER, "vs_main")).unwrap();
        let fragment_shader = compiler.create_fragment_shader(ShaderDesc::new(SHADER, fragment_entry_point)).unwrap();

        let mut desc = RenderHolderDesc::new(RenderDispatchDesc::draw(6));
        desc.label = Some("quad".to_string());
        desc.vertex_shader = Some(vertex_shader);
        desc.fragment_shader = Some(fragment_shader);
        desc.attributes.assign("position", &vertices);
        desc.uniforms.assign("camera", &camera);
        desc.color_attachments.push(attachment);
        Scene { compiler, desc }
    }

    /// Tests the one-buffer, one-uniform, six-vertex quad end to end
    #[test]
    fn test_render_quad() {
        let Scene { compiler, desc } = scene("fs_main", None);
        let holder = compiler.compile_render_holder(desc).unwrap();
        assert_eq!(holder.vertex_buffer_count(), 1);
        assert_eq!(holder.bind_group_count(), 1);
        assert!(compiler.context().pipelines().contains(holder.pipeline_id()));

        let mut encoder = RecordingEncoder::new();
        holder.build(&mut encoder).unwrap();

        let passes = encoder.render_passes();
        assert_eq!(passes.len(), 1);
        let commands = passes[0];
        let count = |predicate: fn(&RenderCommand<RecordingDevice>) -> bool| commands.iter().filter(|command| predicate(command)).count();
        assert_eq!(count(|c| matches!(c, RenderCommand::SetBindGroup { .. })), 1);
        assert_eq!(count(|c| matches!(c, RenderCommand::SetVertexBuffer { .. })), 1);
        assert_eq!(count(|c| matches!(c, RenderCommand::Draw { .. })), 1);
        assert!(commands.iter().any(|c| matches!(c, RenderCommand::Draw { vertices, instances } if *vertices == (0..6) && *instances == (0..1))));
        assert!(matches!(commands[0], RenderCommand::SetPipeline(_)));

        let journal = compiler.device().journal();
        assert_eq!(journal.render_pipelines.len(), 1);
        assert_eq!(journal.render_pipelines[0].vertex_buffers[0].array_stride, 12);
    }

    /// Tests that the uniform handler runs once before and once after the pass
    #[test]
    fn test_sync_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let Scene { compiler, desc } = scene("fs_main", Some(log.clone()));
        let holder = compiler.compile_render_holder(desc).unwrap();

        let mut encoder = RecordingEncoder::new();
        holder.build(&mut encoder).unwrap();
        assert_eq!(*log.borrow(), vec![FrameStage::Begin, FrameStage::Finish]);
        let camera_writes = |compiler: &Compiler<RecordingDevice>| compiler.device().journal().buffer_writes.iter().filter(|(_, _, len)| *len == 64).count();
        assert_eq!(camera_writes(&compiler), 1);

        holder.build(&mut encoder).unwrap();
        assert_eq!(log.borrow().len(), 4);
        assert_eq!(camera_writes(&compiler), 2);
        assert_eq!(encoder.render_passes().len(), 2);
    }

    /// Tests that a missing uniform fails the same way on every attempt
    #[test]
    fn test_missing_uniform() {
        for _ in 0..2 {
            let Scene { compiler, mut desc } = scene("fs_main", None);
            desc.uniforms = Uniforms::new();
            let result = compiler.compile_render_holder(desc);
            assert!(matches!(result, Err(CompileError::UniformNotAssigned { ref name, group: 0, binding: 0 }) if name == "camera"));
            assert!(compiler.context().pipelines().is_empty());
        }
    }

    /// Tests that a missing attribute fails the compile
    #[test]
    fn test_missing_attribute() {
        let Scene { compiler, mut desc } = scene("fs_main", None);
        desc.attributes = Attributes::new();
        let result = compiler.compile_render_holder(desc);
        assert!(matches!(result, Err(CompileError::AttributeNotAssigned { ref name }) if name == "position"));
    }

    /// Tests that both shaders are required and must match their stage
    #[test]
    fn test_missing_shader() {
        let Scene { compiler, mut desc } = scene("fs_main", None);
        let vertex_shader = desc.vertex_shader.take();
        desc.fragment_shader = vertex_shader.clone();
        assert!(matches!(compiler.compile_render_holder(desc), Err(CompileError::MissingShader(ShaderStage::Vertex))));

        let Scene { compiler, mut desc } = scene("fs_main", None);
        desc.fragment_shader = desc.vertex_shader.clone();
        assert!(matches!(
            compiler.compile_render_holder(desc),
            Err(CompileError::ShaderStageMismatch {
                expected: ShaderStage::Fragment,
                found: ShaderStage::Vertex,
                ..
            })
        ));
    }

    /// Tests that a holder without color attachments skips its pass
    #[test]
    fn test_no_color_attachments() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let Scene { compiler, mut desc } = scene("fs_depth_only", Some(log.clone()));
        desc.color_attachments.clear();
        let holder = compiler.compile_render_holder(desc).unwrap();

        let mut encoder = RecordingEncoder::new();
        holder.build(&mut encoder).unwrap();
        assert!(encoder.commands.is_empty());
        assert_eq!(*log.borrow(), vec![FrameStage::Begin]);
    }

    /// Tests that a fragment output without a color target fails the compile
    #[test]
    fn test_missing_color_target() {
        let Scene { compiler, mut desc } = scene("fs_main", None);
        desc.color_attachments.clear();
        assert!(matches!(compiler.compile_render_holder(desc), Err(CompileError::MissingColorTarget { location: 0 })));
    }

    /// Tests that a surface attachment renders into the swapchain image of each frame
    #[test]
    fn test_surface_attachment() {
        let Scene { compiler, mut desc } = scene("fs_main", None);
        compiler.device().next_surface_frame();
        let surface = compiler.create_surface_texture(None).unwrap();
        let attachment = compiler.create_color_attachment(ColorAttachmentDesc::new(surface)).unwrap();
        desc.color_attachments = vec![attachment];
        let holder = compiler.compile_render_holder(desc).unwrap();

        let mut encoder = RecordingEncoder::new();
        holder.build(&mut encoder).unwrap();
        compiler.device().next_surface_frame();
        holder.build(&mut encoder).unwrap();

        let targets: Vec<u32> = encoder
            .commands
            .iter()
            .filter_map(|command| match command {
                EncodedCommand::RenderPass { color_attachments, .. } => Some(color_attachments[0].texture),
                _ => None,
            })
            .collect();
        assert_eq!(targets.len(), 2);
        assert_ne!(targets[0], targets[1]);

        compiler.device().lose_surface();
        assert!(matches!(holder.build(&mut encoder), Err(ResourceError::SurfaceUnavailable)));
    }
}
