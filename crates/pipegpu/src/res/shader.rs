//! Shaders with cached reflection and device module

use crate::device::Device;
use crate::ResourceId;
use pipegpu_reflect::{ReflectError, ShaderReflection, ShaderStage};
use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// WGSL source and the entry point to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderDesc {
    pub id: Option<ResourceId>,
    pub label: Option<String>,
    pub code: String,
    pub entry_point: String,
}

impl ShaderDesc {
    pub fn new(code: impl Into<String>, entry_point: impl Into<String>) -> Self {
        Self {
            id: None,
            label: None,
            code: code.into(),
            entry_point: entry_point.into(),
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
}

/// One shader entry point of a known stage
pub struct Shader<D: Device> {
    id: ResourceId,
    stage: ShaderStage,
    desc: ShaderDesc,
    reflection: OnceCell<Rc<ShaderReflection>>,
    module: OnceCell<D::ShaderModule>,
}

impl<D: Device> Shader<D> {
    pub(crate) fn new(id: ResourceId, stage: ShaderStage, desc: ShaderDesc) -> Self {
        Self {
            id,
            stage,
            desc,
            reflection: OnceCell::new(),
            module: OnceCell::new(),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Stage the shader was created for
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn label(&self) -> Option<&str> {
        self.desc.label.as_deref()
    }

    pub fn code(&self) -> &str {
        &self.desc.code
    }

    pub fn entry_point(&self) -> &str {
        &self.desc.entry_point
    }

    /// Reflects the entry point, computing it on the first call
    pub fn reflect(&self) -> Result<Rc<ShaderReflection>, ReflectError> {
        if let Some(reflection) = self.reflection.get() {
            return Ok(reflection.clone());
        }
        let reflection = Rc::new(ShaderReflection::from_wgsl(&self.desc.code, &self.desc.entry_point)?);
        debug!(
            id = %self.id,
            entry_point = %self.desc.entry_point,
            bindings = reflection.bindings.len(),
            "reflected shader"
        );
        Ok(self.reflection.get_or_init(|| reflection).clone())
    }

    /// Returns the device module, creating it on first use
    pub fn module(&self, device: &D) -> D::ShaderModule {
        self.module.get_or_init(|| device.create_shader_module(self.desc.label.as_deref(), &self.desc.code)).clone()
    }
}

impl<D: Device> fmt::Debug for Shader<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shader")
            .field("id", &self.id)
            .field("stage", &self.stage)
            .field("label", &self.desc.label)
            .field("entry_point", &self.desc.entry_point)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::RecordingDevice;

    const SHADER: &str = "
@group(0) @binding(0) var<storage, read_write> values: array<u32>;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    values[id.x] = id.x;
}
";

    /// Tests that reflection and module are computed once
    #[test]
    fn test_cached_reflection() {
        let device = RecordingDevice::new();
        let shader: Shader<RecordingDevice> = Shader::new(ResourceId::mint(), ShaderStage::Compute, ShaderDesc::new(SHADER, "main"));

        let first = shader.reflect().unwrap();
        let second = shader.reflect().unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(first.workgroup_size, [64, 1, 1]);

        shader.module(&device);
        shader.module(&device);
        assert_eq!(device.journal().shader_modules, 1);
    }

    /// Tests that a missing entry point is reported and nothing is cached
    #[test]
    fn test_missing_entry_point() {
        let shader: Shader<RecordingDevice> = Shader::new(ResourceId::mint(), ShaderStage::Compute, ShaderDesc::new(SHADER, "other"));
        assert!(matches!(shader.reflect(), Err(ReflectError::EntryPointNotFound(_))));
        assert!(shader.reflect().is_err());
    }
}
