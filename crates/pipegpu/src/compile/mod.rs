//! Descriptor parsing, reflection merging and pipeline emission
//!
//! A compile runs in a fixed order: the shaders are reflected, the attribute
//! and uniform bags are parsed into records, the reflected bindings of every
//! stage are merged into bind group layouts, the remaining pipeline state is
//! parsed, and finally the vertex layouts, bind groups and the device
//! pipeline are emitted. Any failure aborts the compile and nothing is
//! registered.

mod attachment;
mod attribute;
mod dispatch;
mod emit;
mod factory;
mod layout;
mod primitive;
mod uniform;

pub use attachment::{parse_color_attachments, parse_depth_stencil_state, parse_fragment_targets};
pub use attribute::{AttributeRecord, AttributeRecords, EmittedAttributes, emit_attributes, parse_attribute, vertex_format};
pub use dispatch::{ComputeDispatch, ComputeDispatchDesc, RenderDispatch, RenderDispatchDesc, parse_compute_dispatch, parse_render_dispatch};
pub use emit::{RenderPipelineParts, emit_compute_pipeline, emit_render_pipeline, emit_uniforms};
pub use layout::{BindGroupLayoutInfo, MergedBinding, MergedGroup, merge_bindings, parse_bind_group_layouts, parse_pipeline_layout};
pub use primitive::{parse_multisample_state, parse_primitive_state};
pub use uniform::{UniformRecord, UniformRecords, UniformSyncHandler, parse_uniform};

use crate::context::{Context, Pipeline};
use crate::device::Device;
use crate::holder::{ComputeHolder, ComputeHolderDesc, RenderHolder, RenderHolderDesc};
use crate::res::{Buffer, Shader};
use crate::{CompileError, ResourceId};
use pipegpu_reflect::{ShaderReflection, ShaderStage};
use std::rc::Rc;
use tracing::debug;

/// Creates resources and compiles holders against one [`Context`]
pub struct Compiler<D: Device> {
    context: Rc<Context<D>>,
}

impl<D: Device> Compiler<D> {
    /// Creates a compiler owning a fresh context around `device`
    pub fn new(device: D) -> Self {
        Self::with_context(Rc::new(Context::new(device)))
    }

    /// Creates a compiler sharing an existing context
    pub fn with_context(context: Rc<Context<D>>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &Rc<Context<D>> {
        &self.context
    }

    pub fn device(&self) -> &D {
        self.context.device()
    }

    /// Compiles a render holder
    ///
    /// # Arguments
    /// * `desc` - Shaders, attribute and uniform bags, dispatch and pipeline state
    ///
    /// # Returns
    /// The holder, or the first descriptor or reconciliation error
    pub fn compile_render_holder(&self, desc: RenderHolderDesc<D>) -> Result<RenderHolder<D>, CompileError> {
        let context = &self.context;
        let device = context.device();
        let label = desc.label.as_deref();

        let vertex_shader = desc.vertex_shader.as_ref().ok_or(CompileError::MissingShader(ShaderStage::Vertex))?;
        let fragment_shader = desc.fragment_shader.as_ref().ok_or(CompileError::MissingShader(ShaderStage::Fragment))?;
        let vertex = reflect(vertex_shader, ShaderStage::Vertex)?;
        let fragment = reflect(fragment_shader, ShaderStage::Fragment)?;

        let attributes = parse_attribute(&desc.attributes)?;
        let (uniforms, sync) = parse_uniform::<D>(&desc.uniforms)?;
        let layouts = parse_bind_group_layouts(context, &[vertex.as_ref(), fragment.as_ref()], &uniforms)?;

        let dispatch = parse_render_dispatch(&desc.dispatch, context.buffers())?;
        let primitive = parse_primitive_state(&desc.primitive, dispatch.index_format());
        let multisample = parse_multisample_state(desc.multisample);
        let targets = parse_color_attachments(&desc.color_attachments, desc.multisample)?;
        let targets = parse_fragment_targets(&fragment, &targets)?;
        let depth_stencil = parse_depth_stencil_state(desc.depth_stencil_attachment.as_deref(), desc.multisample)?;

        let pipeline_layout = parse_pipeline_layout(device, label, &layouts);
        let vertex_state = emit_attributes(&vertex, &attributes, context.buffers())?;
        let bind_groups = emit_uniforms(context, &layouts, &uniforms)?;
        let pipeline = emit_render_pipeline(
            device,
            RenderPipelineParts {
                label,
                layout: &pipeline_layout,
                vertex_shader,
                fragment_shader,
                vertex_buffers: &vertex_state.layouts,
                targets: &targets,
                primitive,
                depth_stencil,
                multisample,
            },
        );
        let (pipeline_id, _) = context.pipelines().insert(|_| Pipeline::Render(pipeline.clone()));

        let synced_buffers = unsynced_buffers(&uniforms, vertex_state.buffers.iter().chain(dispatch.buffers()));
        debug!(label, %pipeline_id, vertex_buffers = vertex_state.buffers.len(), bind_groups = bind_groups.len(), "compiled render holder");

        Ok(RenderHolder {
            context: context.clone(),
            label: desc.label,
            pipeline_id,
            pipeline,
            vertex_buffers: vertex_state.buffers,
            bind_groups,
            color_attachments: desc.color_attachments,
            depth_stencil_attachment: desc.depth_stencil_attachment,
            dispatch,
            sync,
            synced_buffers,
        })
    }

    /// Compiles a compute holder
    ///
    /// # Arguments
    /// * `desc` - Compute shader, uniform bag, dispatch and the optional post-dispatch hook
    ///
    /// # Returns
    /// The holder, or the first descriptor or reconciliation error
    pub fn compile_compute_holder(&self, desc: ComputeHolderDesc<D>) -> Result<ComputeHolder<D>, CompileError> {
        let context = &self.context;
        let device = context.device();
        let label = desc.label.as_deref();

        let shader = desc.compute_shader.as_ref().ok_or(CompileError::MissingShader(ShaderStage::Compute))?;
        let compute = reflect(shader, ShaderStage::Compute)?;

        let (uniforms, sync) = parse_uniform::<D>(&desc.uniforms)?;
        let layouts = parse_bind_group_layouts(context, &[compute.as_ref()], &uniforms)?;
        let dispatch = parse_compute_dispatch(&desc.dispatch, context.buffers(), &device.limits())?;

        let pipeline_layout = parse_pipeline_layout(device, label, &layouts);
        let bind_groups = emit_uniforms(context, &layouts, &uniforms)?;
        let pipeline = emit_compute_pipeline(device, label, &pipeline_layout, shader);
        let (pipeline_id, _) = context.pipelines().insert(|_| Pipeline::Compute(pipeline.clone()));

        let synced_buffers = unsynced_buffers(&uniforms, dispatch.buffers());
        debug!(label, %pipeline_id, bind_groups = bind_groups.len(), workgroup_size = ?compute.workgroup_size, "compiled compute holder");

        Ok(ComputeHolder {
            context: context.clone(),
            label: desc.label,
            pipeline_id,
            pipeline,
            bind_groups,
            dispatch,
            hook: desc.hook,
            sync,
            synced_buffers,
        })
    }
}

/// Reflects a shader and checks it was created for `expected`
fn reflect<D: Device>(shader: &Shader<D>, expected: ShaderStage) -> Result<Rc<ShaderReflection>, CompileError> {
    if shader.stage() != expected {
        return Err(CompileError::ShaderStageMismatch {
            id: shader.id(),
            expected,
            found: shader.stage(),
        });
    }
    let reflection = shader.reflect()?;
    if reflection.stage != expected {
        return Err(CompileError::ShaderStageMismatch {
            id: shader.id(),
            expected,
            found: reflection.stage,
        });
    }
    debug!(shader = %shader.id(), entry_point = %reflection.entry_point, bindings = reflection.bindings.len(), "reflected shader");
    Ok(reflection)
}

/// Buffers a holder reads outside of its uniform bag, without duplicates
fn unsynced_buffers<'a, D: Device>(uniforms: &UniformRecords, buffers: impl IntoIterator<Item = &'a Rc<Buffer<D>>>) -> Vec<Rc<Buffer<D>>> {
    let mut seen: Vec<ResourceId> = Vec::new();
    let mut synced = Vec::new();
    for buffer in buffers {
        if uniforms.contains_resource(buffer.id()) || seen.contains(&buffer.id()) {
            continue;
        }
        seen.push(buffer.id());
        synced.push(buffer.clone());
    }
    synced
}
