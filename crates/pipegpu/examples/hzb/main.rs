//! Hierarchical max-reduction of a rendered depth field
//!
//! Renders a procedural depth field into mip 0 of an `r32float` storage
//! texture, reduces it level by level with one compute holder per mip, and
//! reads the maximum back through a map buffer.

use clap::Parser;
use pipegpu::compile::{ComputeDispatchDesc, RenderDispatchDesc};
use pipegpu::device::WgpuDevice;
use pipegpu::res::{BufferDesc, ColorAttachmentDesc, ShaderDesc, TextureDesc};
use pipegpu::{BlendFormat, ColorAttachmentOptions, Compiler, ComputeHolderDesc, RenderHolderDesc};
use std::error::Error;
use tracing::info;

const FIELD: &str = "
struct Params {
    size: vec4<f32>,
}

@group(0) @binding(0) var<uniform> params: Params;

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    return vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
}

@fragment
fn fs_main(@builtin(position) position: vec4<f32>) -> @location(0) vec4<f32> {
    let uv = position.xy / params.size.xy;
    let depth = 0.5 + 0.5 * sin(uv.x * 6.2831853) * cos(uv.y * 3.1415927);
    return vec4<f32>(depth, 0.0, 0.0, 1.0);
}
";

const REDUCE: &str = "
@group(0) @binding(0) var src: texture_storage_2d<r32float, read>;
@group(0) @binding(1) var dst: texture_storage_2d<r32float, write>;

@compute @workgroup_size(8, 8, 1)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    let size = textureDimensions(dst);
    if (id.x >= size.x || id.y >= size.y) {
        return;
    }
    let base = vec2<u32>(id.xy) * 2u;
    let a = textureLoad(src, base).r;
    let b = textureLoad(src, base + vec2<u32>(1u, 0u)).r;
    let c = textureLoad(src, base + vec2<u32>(0u, 1u)).r;
    let d = textureLoad(src, base + vec2<u32>(1u, 1u)).r;
    textureStore(dst, vec2<u32>(id.xy), vec4<f32>(max(max(a, b), max(c, d)), 0.0, 0.0, 0.0));
}
";

const COLLECT: &str = "
@group(0) @binding(0) var src: texture_storage_2d<r32float, read>;
@group(0) @binding(1) var<storage, read_write> result: array<f32>;

@compute @workgroup_size(1)
fn main() {
    let size = textureDimensions(src);
    var value = 0.0;
    for (var y = 0u; y < size.y; y++) {
        for (var x = 0u; x < size.x; x++) {
            value = max(value, textureLoad(src, vec2<u32>(x, y)).r);
        }
    }
    result[0] = value;
}
";

#[derive(Debug, Parser)]
#[command(about = "Builds a max-reduction mip chain of a procedural depth field")]
struct Args {
    /// Width and height of mip 0, a power of two
    #[arg(long, default_value_t = 128)]
    size: u32,
}

/// The same field as `fs_main`, evaluated at every pixel center
fn reference_max(size: u32) -> f32 {
    let mut max = 0.0f32;
    for y in 0..size {
        for x in 0..size {
            let u = (x as f32 + 0.5) / size as f32;
            let v = (y as f32 + 0.5) / size as f32;
            max = max.max(0.5 + 0.5 * (u * std::f32::consts::TAU).sin() * (v * std::f32::consts::PI).cos());
        }
    }
    max
}

async fn create_device(size: u32) -> Result<WgpuDevice, Box<dyn Error>> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await?;
    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("hzb"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: Default::default(),
        })
        .await?;
    info!(adapter = ?adapter.get_info().name, "created device");
    Ok(WgpuDevice::new(device, queue, wgpu::TextureFormat::Rgba8Unorm, (size, size)))
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    if !args.size.is_power_of_two() || args.size < 4 {
        return Err(format!("size must be a power of two of at least 4, got {}", args.size).into());
    }

    let compiler = Compiler::new(pollster::block_on(create_device(args.size))?);

    let depth = compiler.create_storage_texture_2d(
        TextureDesc::new(args.size, args.size)
            .label("hzb")
            .format(wgpu::TextureFormat::R32Float)
            .usage(wgpu::TextureUsages::RENDER_ATTACHMENT),
    )?;
    let mips = depth.mip_level_count();
    info!(size = args.size, mips, "created hzb texture");

    let size = args.size as f32;
    let params = compiler.create_uniform_buffer(BufferDesc::from_slice(&[size, size, 0.0, 0.0]).label("params"))?;
    let target = compiler.create_color_attachment(ColorAttachmentDesc::new(depth.clone()).options(ColorAttachmentOptions {
        blend: BlendFormat::Disable,
        ..Default::default()
    }))?;

    let mut field = RenderHolderDesc::new(RenderDispatchDesc::draw(3));
    field.label = Some("depth field".to_string());
    field.vertex_shader = Some(compiler.create_vertex_shader(ShaderDesc::new(FIELD, "vs_main"))?);
    field.fragment_shader = Some(compiler.create_fragment_shader(ShaderDesc::new(FIELD, "fs_main"))?);
    field.uniforms.assign("params", &params);
    field.color_attachments.push(target);
    let field = compiler.compile_render_holder(field)?;

    // Each reduction reads the cursor level and writes the next one.
    depth.set_auto_advance(true);
    let reduce = compiler.create_compute_shader(ShaderDesc::new(REDUCE, "main").label("reduce"))?;
    let mut reductions = Vec::new();
    for level in 0..mips - 1 {
        let extent = (args.size >> (level + 1)).max(1);
        let groups = extent.div_ceil(8);
        depth.cursor(level);

        let mut desc = ComputeHolderDesc::new(reduce.clone(), ComputeDispatchDesc::workgroups(groups, groups, 1)).label(format!("reduce {level}"));
        desc.uniforms.assign("src", &depth).assign("dst", &depth);
        reductions.push(compiler.compile_compute_holder(desc)?);
    }

    let result = compiler.create_map_buffer(BufferDesc::new(4).label("result"))?;
    depth.cursor(mips - 1);
    let mut desc = ComputeHolderDesc::new(
        compiler.create_compute_shader(ShaderDesc::new(COLLECT, "main").label("collect"))?,
        ComputeDispatchDesc::workgroups(1, 1, 1),
    )
    .label("collect");
    desc.uniforms.assign("src", &depth).assign("result", &result);
    let collect = compiler.compile_compute_holder(desc)?;

    let device = compiler.device();
    let mut encoder = device.create_command_encoder(Some("hzb"));
    field.build(&mut encoder)?;
    for reduction in &reductions {
        reduction.build(&mut encoder)?;
    }
    collect.build(&mut encoder)?;
    device.submit(encoder);

    let staging = result.staging_buffer(device)?;
    let slice = staging.slice(..);
    let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
    slice.map_async(wgpu::MapMode::Read, move |mapped| {
        let _ = sender.send(mapped);
    });
    device.device().poll(wgpu::PollType::Wait)?;
    pollster::block_on(receiver.receive()).ok_or("map callback dropped")??;

    let value = bytemuck::cast_slice::<u8, f32>(&slice.get_mapped_range())[0];
    println!("max depth: {value:.6} (reference {:.6}) over {mips} mip levels", reference_max(args.size));
    Ok(())
}
