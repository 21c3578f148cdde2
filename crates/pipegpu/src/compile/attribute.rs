//! Vertex attribute parsing and vertex buffer layout emission

use crate::device::{Device, VertexBufferLayout};
use crate::registry::Registry;
use crate::res::Buffer;
use crate::{Attributes, CompileError, PropertyFormat, ResourceId};
use pipegpu_reflect::{InputFormat, NumericKind, ShaderReflection};
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{debug, warn};

/// A vertex input name resolved to the buffer feeding it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRecord {
    pub name: String,
    pub buffer: ResourceId,
}

/// Attribute records keyed by name and grouped by owning buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeRecords {
    by_name: BTreeMap<String, AttributeRecord>,
    by_buffer: BTreeMap<ResourceId, Vec<String>>,
}

impl AttributeRecords {
    pub fn get(&self, name: &str) -> Option<&AttributeRecord> {
        self.by_name.get(name)
    }

    /// Attribute names of each owning buffer
    pub fn by_buffer(&self) -> &BTreeMap<ResourceId, Vec<String>> {
        &self.by_buffer
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Walks an attribute bag into attribute records
///
/// # Returns
/// The records, or [`CompileError::UnsupportedAttribute`] for anything that is not a vertex buffer
pub fn parse_attribute(attributes: &Attributes) -> Result<AttributeRecords, CompileError> {
    let mut records = AttributeRecords::default();
    for (name, property) in attributes.iter() {
        if property.format != PropertyFormat::VertexBuffer {
            return Err(CompileError::UnsupportedAttribute {
                name: name.to_string(),
                format: property.format,
            });
        }
        records.by_buffer.entry(property.id).or_default().push(name.to_string());
        records.by_name.insert(
            name.to_string(),
            AttributeRecord {
                name: name.to_string(),
                buffer: property.id,
            },
        );
    }
    Ok(records)
}

/// Vertex buffer layouts and the buffer bound at each slot
#[derive(Debug)]
pub struct EmittedAttributes<D: Device> {
    /// Layout of each slot
    pub layouts: Vec<VertexBufferLayout>,
    /// Buffer of each slot
    pub buffers: Vec<Rc<Buffer<D>>>,
}

/// Vertex format matching a reflected input
pub fn vertex_format(format: InputFormat) -> Option<wgpu::VertexFormat> {
    use wgpu::VertexFormat as F;
    let vertex_format = match (format.kind, format.width, format.components) {
        (NumericKind::Float, 4, 1) => F::Float32,
        (NumericKind::Float, 4, 2) => F::Float32x2,
        (NumericKind::Float, 4, 3) => F::Float32x3,
        (NumericKind::Float, 4, 4) => F::Float32x4,
        (NumericKind::Float, 2, 2) => F::Float16x2,
        (NumericKind::Float, 2, 4) => F::Float16x4,
        (NumericKind::Sint, 4, 1) => F::Sint32,
        (NumericKind::Sint, 4, 2) => F::Sint32x2,
        (NumericKind::Sint, 4, 3) => F::Sint32x3,
        (NumericKind::Sint, 4, 4) => F::Sint32x4,
        (NumericKind::Uint, 4, 1) => F::Uint32,
        (NumericKind::Uint, 4, 2) => F::Uint32x2,
        (NumericKind::Uint, 4, 3) => F::Uint32x3,
        (NumericKind::Uint, 4, 4) => F::Uint32x4,
        _ => return None,
    };
    Some(vertex_format)
}

/// Derives one interleaved vertex buffer layout per owning buffer
///
/// Inputs are taken in location order. Attributes sharing a buffer are packed
/// in that order, and slots are numbered by first use.
///
/// # Arguments
/// * `reflection` - Reflection of the vertex entry point
/// * `records` - Output of [`parse_attribute`]
/// * `buffers` - Registry the owning buffers are fetched from
pub fn emit_attributes<D: Device>(reflection: &ShaderReflection, records: &AttributeRecords, buffers: &Registry<Buffer<D>>) -> Result<EmittedAttributes<D>, CompileError> {
    let mut slots: Vec<ResourceId> = Vec::new();
    let mut layouts: Vec<VertexBufferLayout> = Vec::new();

    for input in &reflection.vertex_inputs {
        let record = records.get(&input.name).ok_or_else(|| CompileError::AttributeNotAssigned { name: input.name.clone() })?;
        let format = vertex_format(input.format).ok_or_else(|| CompileError::UnsupportedVertexInput { name: input.name.clone() })?;

        let slot = match slots.iter().position(|id| *id == record.buffer) {
            Some(slot) => slot,
            None => {
                slots.push(record.buffer);
                layouts.push(VertexBufferLayout {
                    array_stride: 0,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: Vec::new(),
                });
                slots.len() - 1
            }
        };

        let layout = &mut layouts[slot];
        layout.attributes.push(wgpu::VertexAttribute {
            format,
            offset: layout.array_stride,
            shader_location: input.location,
        });
        layout.array_stride += format.size();
    }

    for (name, record) in &records.by_name {
        if reflection.vertex_inputs.iter().all(|input| input.name != *name) {
            warn!(attribute = %name, buffer = %record.buffer, "attribute is not read by the vertex shader");
        }
    }

    let buffers = slots.iter().map(|id| buffers.get(*id)).collect::<Result<Vec<_>, _>>()?;
    debug!(slots = buffers.len(), "emitted vertex buffer layouts");
    Ok(EmittedAttributes { layouts, buffers })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::RecordingDevice;
    use crate::res::{BufferDesc, BufferKind};
    use crate::{AsProperty, Property};

    const SHADER: &str = "
struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) color: vec4<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> @builtin(position) vec4<f32> {
    return vec4<f32>(input.position + vec3<f32>(input.uv, 0.0), 1.0) * input.color;
}
";

    fn vertex_buffer(registry: &Registry<Buffer<RecordingDevice>>) -> Rc<Buffer<RecordingDevice>> {
        let (_, buffer) = registry.insert(|id| Buffer::new(id, BufferKind::Vertex, BufferDesc::new(1024), &wgpu::Limits::default()).unwrap());
        buffer
    }

    /// Tests that non-vertex-buffer properties are rejected
    #[test]
    fn test_parse_rejects_non_vertex() {
        let mut attributes = Attributes::new();
        attributes.assign(
            "position",
            &Property {
                id: ResourceId::mint(),
                format: PropertyFormat::UniformBuffer,
            },
        );
        assert!(matches!(
            parse_attribute(&attributes),
            Err(CompileError::UnsupportedAttribute { format: PropertyFormat::UniformBuffer, .. })
        ));
    }

    /// Tests interleaving attributes that share a buffer
    #[test]
    fn test_interleaved_layout() {
        let registry = Registry::new("buffer");
        let geometry = vertex_buffer(&registry);
        let colors = vertex_buffer(&registry);

        let mut attributes = Attributes::new();
        attributes.assign("position", &geometry).assign("uv", &geometry).assign("color", &colors);
        let records = parse_attribute(&attributes).unwrap();
        assert_eq!(records.by_buffer().len(), 2);
        assert_eq!(records.by_buffer()[&geometry.id()], vec!["position".to_string(), "uv".to_string()]);

        let reflection = ShaderReflection::from_wgsl(SHADER, "vs_main").unwrap();
        let emitted = emit_attributes(&reflection, &records, &registry).unwrap();
        assert_eq!(emitted.buffers.len(), 2);
        assert!(Rc::ptr_eq(&emitted.buffers[0], &geometry));

        let interleaved = &emitted.layouts[0];
        assert_eq!(interleaved.array_stride, 20);
        assert_eq!(interleaved.attributes[1].offset, 12);
        assert_eq!(interleaved.attributes[1].format, wgpu::VertexFormat::Float32x2);
        assert_eq!(emitted.layouts[1].array_stride, 16);
        assert_eq!(emitted.layouts[1].attributes[0].shader_location, 2);
    }

    /// Tests that a vertex input without a record fails
    #[test]
    fn test_missing_attribute() {
        let registry = Registry::new("buffer");
        let geometry = vertex_buffer(&registry);
        let mut attributes = Attributes::new();
        attributes.assign("position", &geometry.property());

        let records = parse_attribute(&attributes).unwrap();
        let reflection = ShaderReflection::from_wgsl(SHADER, "vs_main").unwrap();
        assert!(matches!(
            emit_attributes(&reflection, &records, &registry),
            Err(CompileError::AttributeNotAssigned { name }) if name == "uv"
        ));
    }
}
