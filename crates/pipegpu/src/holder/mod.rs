//! Compiled holders
//!
//! A holder owns everything one pass needs and records that pass into an
//! encoder each time [`RenderHolder::build`] or [`ComputeHolder::build`] is
//! called. Host-side updates of the resources it reads run at exactly two
//! points: before the pass is recorded and after it.

mod compute;
mod render;

pub use compute::{ComputeHolder, ComputeHolderDesc, ComputeHook};
pub use render::{RenderHolder, RenderHolderDesc};

use crate::FrameStage;
use crate::compile::UniformSyncHandler;
use crate::context::Context;
use crate::device::Device;
use crate::res::Buffer;
use crate::ResourceError;
use std::rc::Rc;

/// Runs the uniform sync handler, then acquires the buffers outside the uniform bag
fn sync<D: Device>(
    context: &Context<D>,
    handler: &UniformSyncHandler<D>,
    buffers: &[Rc<Buffer<D>>],
    encoder: &mut D::CommandEncoder,
    stage: FrameStage,
) -> Result<(), ResourceError> {
    let device = context.device();
    handler(device, stage, encoder, context.buffers(), context.textures())?;
    for buffer in buffers {
        buffer.acquire(device, encoder, stage)?;
    }
    Ok(())
}
