//! WGSL entry point reflection backed by naga

use crate::{ColorOutput, InputFormat, NumericKind, ReflectError, ReflectedBinding, ResourceKind, SampleKind, ShaderStage, StorageAccess, TextureDimension, VertexInput};
use serde::Serialize;
use std::collections::BTreeMap;

/// Everything pipegpu needs to know about one shader entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShaderReflection {
    /// Entry point name
    pub entry_point: String,
    /// Stage the entry point runs in
    pub stage: ShaderStage,
    /// Resource globals the entry point reads or writes, sorted by (group, binding)
    pub bindings: Vec<ReflectedBinding>,
    /// Vertex inputs sorted by location (vertex stage only)
    pub vertex_inputs: Vec<VertexInput>,
    /// Color outputs sorted by location (fragment stage only)
    pub color_outputs: Vec<ColorOutput>,
    /// `@workgroup_size` (compute stage only, otherwise zeros)
    pub workgroup_size: [u32; 3],
}

impl ShaderReflection {
    /// Parses, validates and reflects a WGSL entry point
    ///
    /// Only globals that the entry point (or anything it calls) actually uses
    /// are reported, so two entry points in one module can report different
    /// binding sets.
    ///
    /// # Arguments
    /// * `source` - WGSL source code
    /// * `entry_point` - Name of the entry point function
    ///
    /// # Returns
    /// The reflection of the entry point, or the first parse/validation/type error
    pub fn from_wgsl(source: &str, entry_point: &str) -> Result<Self, ReflectError> {
        let module = naga::front::wgsl::parse_str(source).map_err(|e| ReflectError::Parse(e.emit_to_string(source)))?;

        let mut validator = naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::all());
        let info = validator.validate(&module).map_err(|e| ReflectError::Validation(e.emit_to_string(source)))?;

        Self::from_module(&module, &info, entry_point)
    }

    /// Reflects an entry point of an already validated module
    pub fn from_module(module: &naga::Module, info: &naga::valid::ModuleInfo, entry_point: &str) -> Result<Self, ReflectError> {
        let (index, ep) = module
            .entry_points
            .iter()
            .enumerate()
            .find(|(_, ep)| ep.name == entry_point)
            .ok_or_else(|| ReflectError::EntryPointNotFound(entry_point.to_string()))?;

        #[allow(unreachable_patterns)]
        let stage = match ep.stage {
            naga::ShaderStage::Vertex => ShaderStage::Vertex,
            naga::ShaderStage::Fragment => ShaderStage::Fragment,
            naga::ShaderStage::Compute => ShaderStage::Compute,
            _ => return Err(ReflectError::UnsupportedStage(entry_point.to_string())),
        };

        let function_info = info.get_entry_point(index);
        let mut bindings = Vec::new();
        for (handle, var) in module.global_variables.iter() {
            let Some(resource_binding) = &var.binding else {
                continue;
            };
            if function_info[handle].is_empty() {
                continue;
            }

            let name = var
                .name
                .clone()
                .unwrap_or_else(|| format!("group{}_binding{}", resource_binding.group, resource_binding.binding));
            let kind = resource_kind(module, var, &name)?;
            let size = kind.is_buffer().then(|| module.types[var.ty].inner.size(module.to_ctx()) as u64);

            bindings.push(ReflectedBinding {
                name,
                group: resource_binding.group,
                binding: resource_binding.binding,
                kind,
                size,
            });
        }
        bindings.sort_by_key(|b| (b.group, b.binding));

        let vertex_inputs = if stage == ShaderStage::Vertex { collect_vertex_inputs(module, ep)? } else { Vec::new() };
        let color_outputs = if stage == ShaderStage::Fragment { collect_color_outputs(module, ep) } else { Vec::new() };
        let workgroup_size = if stage == ShaderStage::Compute { ep.workgroup_size } else { [0; 3] };

        Ok(Self {
            entry_point: entry_point.to_string(),
            stage,
            bindings,
            vertex_inputs,
            color_outputs,
            workgroup_size,
        })
    }

    /// Groups the bindings by `@group` index
    ///
    /// # Returns
    /// A map from group index to the bindings of that group in binding order
    pub fn groups(&self) -> BTreeMap<u32, Vec<&ReflectedBinding>> {
        let mut groups: BTreeMap<u32, Vec<&ReflectedBinding>> = BTreeMap::new();
        for binding in &self.bindings {
            groups.entry(binding.group).or_default().push(binding);
        }
        groups
    }

    /// Number of distinct bind groups the entry point uses
    pub fn group_count(&self) -> usize {
        self.groups().len()
    }

    /// Looks up a binding by global name
    pub fn binding(&self, name: &str) -> Option<&ReflectedBinding> {
        self.bindings.iter().find(|b| b.name == name)
    }
}

/// Classifies a bound global variable
fn resource_kind(module: &naga::Module, var: &naga::GlobalVariable, name: &str) -> Result<ResourceKind, ReflectError> {
    match var.space {
        naga::AddressSpace::Uniform => Ok(ResourceKind::UniformBuffer),
        naga::AddressSpace::Storage { access } => Ok(ResourceKind::StorageBuffer {
            read_only: !access.contains(naga::StorageAccess::STORE),
        }),
        naga::AddressSpace::Handle => handle_kind(&module.types[var.ty].inner, name),
        _ => Err(ReflectError::UnsupportedBinding(name.to_string(), "address space cannot be bound")),
    }
}

/// Classifies an opaque handle type (texture or sampler)
fn handle_kind(inner: &naga::TypeInner, name: &str) -> Result<ResourceKind, ReflectError> {
    match *inner {
        naga::TypeInner::Sampler { comparison } => Ok(ResourceKind::Sampler { comparison }),
        naga::TypeInner::Image { dim, arrayed, ref class } => {
            let dimension = match (dim, arrayed) {
                (naga::ImageDimension::D1, false) => TextureDimension::D1,
                (naga::ImageDimension::D2, false) => TextureDimension::D2,
                (naga::ImageDimension::D2, true) => TextureDimension::D2Array,
                (naga::ImageDimension::Cube, false) => TextureDimension::Cube,
                (naga::ImageDimension::Cube, true) => TextureDimension::CubeArray,
                (naga::ImageDimension::D3, _) => TextureDimension::D3,
                (naga::ImageDimension::D1, true) => return Err(ReflectError::UnsupportedBinding(name.to_string(), "1d texture arrays do not exist")),
            };

            #[allow(unreachable_patterns)]
            let kind = match *class {
                naga::ImageClass::Sampled { kind, multi } => {
                    let sample = match kind {
                        naga::ScalarKind::Float => SampleKind::Float,
                        naga::ScalarKind::Sint => SampleKind::Sint,
                        naga::ScalarKind::Uint => SampleKind::Uint,
                        _ => return Err(ReflectError::UnsupportedBinding(name.to_string(), "texture sample type must be f32, i32 or u32")),
                    };
                    ResourceKind::Texture {
                        dimension,
                        sample,
                        multisampled: multi,
                    }
                }
                naga::ImageClass::Depth { multi } => ResourceKind::Texture {
                    dimension,
                    sample: SampleKind::Depth,
                    multisampled: multi,
                },
                naga::ImageClass::Storage { format, access } => ResourceKind::StorageTexture {
                    dimension,
                    access: StorageAccess::from_naga(access),
                    format: format!("{format:?}"),
                },
                _ => return Err(ReflectError::UnsupportedBinding(name.to_string(), "unsupported image class")),
            };
            Ok(kind)
        }
        naga::TypeInner::BindingArray { .. } => Err(ReflectError::UnsupportedBinding(name.to_string(), "binding arrays are not supported")),
        _ => Err(ReflectError::UnsupportedBinding(name.to_string(), "handle type is neither a texture nor a sampler")),
    }
}

/// Maps a scalar or vector type to an input format
fn input_format(inner: &naga::TypeInner) -> Option<InputFormat> {
    let (scalar, components) = match *inner {
        naga::TypeInner::Scalar(scalar) => (scalar, 1),
        naga::TypeInner::Vector { size, scalar } => (scalar, size as u32),
        _ => return None,
    };
    let kind = match scalar.kind {
        naga::ScalarKind::Float => NumericKind::Float,
        naga::ScalarKind::Sint => NumericKind::Sint,
        naga::ScalarKind::Uint => NumericKind::Uint,
        _ => return None,
    };
    Some(InputFormat {
        kind,
        components,
        width: scalar.width as u32,
    })
}

/// Collects `@location` arguments, looking through struct arguments
fn collect_vertex_inputs(module: &naga::Module, ep: &naga::EntryPoint) -> Result<Vec<VertexInput>, ReflectError> {
    let mut inputs = Vec::new();

    let mut push = |name: Option<&String>, ty: naga::Handle<naga::Type>, location: u32| -> Result<(), ReflectError> {
        let name = name.cloned().unwrap_or_else(|| format!("location{location}"));
        let format = input_format(&module.types[ty].inner).ok_or_else(|| ReflectError::UnsupportedVertexInput(name.clone()))?;
        inputs.push(VertexInput { name, location, format });
        Ok(())
    };

    for argument in &ep.function.arguments {
        match &argument.binding {
            Some(naga::Binding::Location { location, .. }) => push(argument.name.as_ref(), argument.ty, *location)?,
            Some(naga::Binding::BuiltIn(_)) => {}
            None => {
                if let naga::TypeInner::Struct { members, .. } = &module.types[argument.ty].inner {
                    for member in members {
                        if let Some(naga::Binding::Location { location, .. }) = &member.binding {
                            push(member.name.as_ref(), member.ty, *location)?;
                        }
                    }
                }
            }
        }
    }

    inputs.sort_by_key(|input| input.location);
    Ok(inputs)
}

/// Collects `@location` outputs of a fragment entry point
fn collect_color_outputs(module: &naga::Module, ep: &naga::EntryPoint) -> Vec<ColorOutput> {
    let Some(result) = &ep.function.result else {
        return Vec::new();
    };

    let components = |ty: naga::Handle<naga::Type>| input_format(&module.types[ty].inner).map_or(4, |f| f.components);

    let mut outputs = Vec::new();
    match &result.binding {
        Some(naga::Binding::Location { location, .. }) => outputs.push(ColorOutput {
            location: *location,
            components: components(result.ty),
        }),
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[result.ty].inner {
                for member in members {
                    if let Some(naga::Binding::Location { location, .. }) = &member.binding {
                        outputs.push(ColorOutput {
                            location: *location,
                            components: components(member.ty),
                        });
                    }
                }
            }
        }
    }
    outputs.sort_by_key(|output| output.location);
    outputs
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORWARD_WGSL: &str = r#"
struct Camera {
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
}

struct Fragment {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@group(0) @binding(0) var<uniform> model: mat4x4<f32>;
@group(0) @binding(1) var<uniform> camera: Camera;
@group(1) @binding(0) var albedo: texture_2d<f32>;
@group(1) @binding(1) var albedo_sampler: sampler;

@vertex
fn vs_main(@location(1) uv: vec2<f32>, @location(0) position: vec3<f32>) -> Fragment {
    var f: Fragment;
    f.position = camera.projection * camera.view * model * vec4<f32>(position, 1.0);
    f.uv = uv;
    return f;
}

@fragment
fn fs_main(f: Fragment) -> @location(0) vec4<f32> {
    return textureSample(albedo, albedo_sampler, f.uv);
}
"#;

    const REDUCE_WGSL: &str = r#"
@group(0) @binding(0) var input_texture: texture_2d<f32>;
@group(0) @binding(1) var output_texture: texture_storage_2d<r32float, write>;
@group(0) @binding(2) var<storage, read_write> counters: array<u32>;
@group(0) @binding(3) var depth_texture: texture_depth_2d;
@group(0) @binding(4) var shadow_sampler: sampler_comparison;

@compute @workgroup_size(8, 8, 1)
fn cp_main(@builtin(global_invocation_id) global_id: vec3<u32>) {
    let dims = textureDimensions(output_texture);
    if (global_id.x >= dims.x || global_id.y >= dims.y) {
        return;
    }
    let value = textureLoad(input_texture, vec2<i32>(global_id.xy), 0).r;
    textureStore(output_texture, vec2<i32>(global_id.xy), vec4<f32>(value, 0.0, 0.0, 1.0));
    counters[0] = 1u;
}
"#;

    /// Tests that a vertex entry point only reports the globals it uses
    #[test]
    fn test_vertex_reflection() {
        let reflection = ShaderReflection::from_wgsl(FORWARD_WGSL, "vs_main").unwrap();
        assert_eq!(reflection.stage, ShaderStage::Vertex);

        let names: Vec<_> = reflection.bindings.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["model", "camera"]);

        let camera = reflection.binding("camera").unwrap();
        assert_eq!(camera.group, 0);
        assert_eq!(camera.binding, 1);
        assert_eq!(camera.kind, ResourceKind::UniformBuffer);
        assert_eq!(camera.size, Some(128));
        assert_eq!(reflection.binding("model").unwrap().size, Some(64));
    }

    /// Tests that vertex inputs are sorted by location regardless of argument order
    #[test]
    fn test_vertex_inputs_sorted() {
        let reflection = ShaderReflection::from_wgsl(FORWARD_WGSL, "vs_main").unwrap();
        assert_eq!(reflection.vertex_inputs.len(), 2);

        let position = &reflection.vertex_inputs[0];
        assert_eq!(position.name, "position");
        assert_eq!(position.location, 0);
        assert_eq!(
            position.format,
            InputFormat {
                kind: NumericKind::Float,
                components: 3,
                width: 4
            }
        );
        assert_eq!(position.format.byte_size(), 12);

        assert_eq!(reflection.vertex_inputs[1].name, "uv");
        assert_eq!(reflection.vertex_inputs[1].format.components, 2);
    }

    /// Tests fragment reflection of a texture, a sampler and a color output
    #[test]
    fn test_fragment_reflection() {
        let reflection = ShaderReflection::from_wgsl(FORWARD_WGSL, "fs_main").unwrap();
        assert_eq!(reflection.stage, ShaderStage::Fragment);
        assert!(reflection.vertex_inputs.is_empty());
        assert_eq!(reflection.color_outputs, [ColorOutput { location: 0, components: 4 }]);

        let groups = reflection.groups();
        assert_eq!(groups.len(), 1);
        let group = &groups[&1];
        assert_eq!(group.len(), 2);
        assert_eq!(
            group[0].kind,
            ResourceKind::Texture {
                dimension: TextureDimension::D2,
                sample: SampleKind::Float,
                multisampled: false
            }
        );
        assert_eq!(group[1].kind, ResourceKind::Sampler { comparison: false });
        assert_eq!(group[1].size, None);
    }

    /// Tests compute reflection of storage textures, storage buffers and depth bindings
    #[test]
    fn test_compute_reflection() {
        let reflection = ShaderReflection::from_wgsl(REDUCE_WGSL, "cp_main").unwrap();
        assert_eq!(reflection.stage, ShaderStage::Compute);
        assert_eq!(reflection.workgroup_size, [8, 8, 1]);

        // depth_texture and shadow_sampler are declared but never used
        assert_eq!(reflection.bindings.len(), 3);
        assert_eq!(reflection.group_count(), 1);

        let output = reflection.binding("output_texture").unwrap();
        assert_eq!(
            output.kind,
            ResourceKind::StorageTexture {
                dimension: TextureDimension::D2,
                access: StorageAccess::WriteOnly,
                format: "R32Float".to_string()
            }
        );

        let counters = reflection.binding("counters").unwrap();
        assert_eq!(counters.kind, ResourceKind::StorageBuffer { read_only: false });
        assert!(counters.size.is_some());
    }

    /// Tests that unknown entry points and invalid sources are reported
    #[test]
    fn test_errors() {
        let missing = ShaderReflection::from_wgsl(FORWARD_WGSL, "main").unwrap_err();
        assert_eq!(missing, ReflectError::EntryPointNotFound("main".to_string()));

        let broken = ShaderReflection::from_wgsl("fn broken( {", "broken").unwrap_err();
        assert!(broken.is_source_error());
    }

    /// Tests that depth textures and comparison samplers reflect correctly when used
    #[test]
    fn test_depth_and_comparison() {
        let source = r#"
@group(0) @binding(0) var shadow_map: texture_depth_2d;
@group(0) @binding(1) var shadow_sampler: sampler_comparison;

@fragment
fn fs_main(@builtin(position) position: vec4<f32>) -> @location(0) vec4<f32> {
    let lit = textureSampleCompare(shadow_map, shadow_sampler, position.xy, 0.5);
    return vec4<f32>(lit, lit, lit, 1.0);
}
"#;
        let reflection = ShaderReflection::from_wgsl(source, "fs_main").unwrap();
        assert_eq!(
            reflection.binding("shadow_map").unwrap().kind,
            ResourceKind::Texture {
                dimension: TextureDimension::D2,
                sample: SampleKind::Depth,
                multisampled: false
            }
        );
        assert_eq!(reflection.binding("shadow_sampler").unwrap().kind, ResourceKind::Sampler { comparison: true });
    }
}
