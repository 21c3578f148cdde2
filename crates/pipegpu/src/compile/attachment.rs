//! Pipeline-level attachment configuration

use crate::device::Device;
use crate::res::{ColorAttachment, DepthStencilAttachment};
use crate::{CompileError, MultiSampleFormat};
use pipegpu_reflect::ShaderReflection;
use std::rc::Rc;

/// Color target of every attachment, in attachment order
///
/// # Returns
/// The targets, or [`CompileError::SampleCountMismatch`] if an attachment's
/// sample count differs from the pipeline's
pub fn parse_color_attachments<D: Device>(attachments: &[Rc<ColorAttachment<D>>], multisample: MultiSampleFormat) -> Result<Vec<Option<wgpu::ColorTargetState>>, CompileError> {
    attachments
        .iter()
        .enumerate()
        .map(|(index, attachment)| {
            if attachment.sample_count() != multisample.count() {
                return Err(CompileError::SampleCountMismatch {
                    index,
                    expected: multisample.count(),
                    actual: attachment.sample_count(),
                });
            }
            Ok(Some(attachment.target_state()))
        })
        .collect()
}

/// Checks that every fragment output has a color target
pub fn parse_fragment_targets(fragment: &ShaderReflection, targets: &[Option<wgpu::ColorTargetState>]) -> Result<Vec<Option<wgpu::ColorTargetState>>, CompileError> {
    for output in &fragment.color_outputs {
        if targets.get(output.location as usize).is_none_or(Option::is_none) {
            return Err(CompileError::MissingColorTarget { location: output.location });
        }
    }
    Ok(targets.to_vec())
}

/// Depth-stencil state of an optional attachment
pub fn parse_depth_stencil_state<D: Device>(attachment: Option<&DepthStencilAttachment<D>>, multisample: MultiSampleFormat) -> Result<Option<wgpu::DepthStencilState>, CompileError> {
    let Some(attachment) = attachment else {
        return Ok(None);
    };
    let actual = attachment.texture().sample_count();
    if actual != multisample.count() {
        return Err(CompileError::DepthSampleCountMismatch {
            expected: multisample.count(),
            actual,
        });
    }
    Ok(Some(attachment.depth_stencil_state()))
}
