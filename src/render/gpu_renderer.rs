//! GPU rasterizer for the flow scene.
//!
//! Uses a WebGPU compute shader to composite the depth-sorted draw list:
//! one thread per pixel walks every primitive back to front and blends the
//! ones that cover it. Output is read back into an RGBA8 [`Frame`], so the
//! host sees the same thing the software backend produces.
//!
//! Architecture:
//! - Pipeline is compiled once at start-up (the shader is static)
//! - Primitives are uploaded per frame into a read-only storage buffer
//! - Output and staging buffers are cached per surface size

use wgpu::util::DeviceExt;

use crate::error::{Result, VizError};
use crate::render::backend::{check_surface, DrawList, DrawPrim, Frame, RenderBackend, Shape};
use crate::render::SurfaceSize;

const KIND_DISC: u32 = 0;
const KIND_CAPSULE: u32 = 1;
const KIND_POLYGON: u32 = 2;

/// Polygon vertices that fit in one [`GpuPrim`].
const MAX_POLY_POINTS: usize = 10;

// ── Uniform / storage structs (must match WGSL layout exactly) ──

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Uniforms {
    clear_color: [f32; 4],
    width: u32,
    height: u32,
    prim_count: u32,
    _pad0: u32,
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct GpuPrim {
    kind: u32,
    count: u32,
    shaded: u32,
    _pad0: u32,
    color: [f32; 4],
    /// Disc: center.xy, radius. Capsule: a.xy, b.xy.
    geom: [f32; 4],
    /// Capsule: radius in x.
    extra: [f32; 4],
    /// Polygon points, two per vec4.
    poly: [[f32; 4]; MAX_POLY_POINTS / 2],
}

impl GpuPrim {
    fn from_prim(prim: &DrawPrim) -> Self {
        let mut out = GpuPrim {
            color: prim.color,
            shaded: prim.shaded as u32,
            ..<GpuPrim as bytemuck::Zeroable>::zeroed()
        };
        match &prim.shape {
            Shape::Disc { center, radius } => {
                out.kind = KIND_DISC;
                out.geom = [center.x, center.y, *radius, 0.0];
            }
            Shape::Capsule { a, b, radius } => {
                out.kind = KIND_CAPSULE;
                out.geom = [a.x, a.y, b.x, b.y];
                out.extra[0] = *radius;
            }
            Shape::Polygon { points } => {
                out.kind = KIND_POLYGON;
                let n = points.len().min(MAX_POLY_POINTS);
                out.count = n as u32;
                for (i, p) in points.iter().take(n).enumerate() {
                    let slot = &mut out.poly[i / 2];
                    let off = (i % 2) * 2;
                    slot[off] = p.x;
                    slot[off + 1] = p.y;
                }
            }
        }
        out
    }
}

// ── GPU Renderer ──

/// Persistent GPU renderer that caches device, queue and pipeline.
pub struct GpuRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    size: SurfaceSize,
    /// Largest output buffer the device can bind as storage.
    max_output_bytes: u64,
    targets: Option<Targets>,
    released: bool,
}

/// Output buffers sized for the current surface.
struct Targets {
    size: SurfaceSize,
    output: wgpu::Buffer,
    staging: wgpu::Buffer,
}

impl GpuRenderer {
    /// Initialise the GPU renderer, or report why no context is available.
    pub fn new(size: SurfaceSize) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| VizError::ContextUnavailable("no GPU adapter found".into()))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("h2-flow-viz GPU"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))
        .map_err(|e| VizError::ContextUnavailable(e.to_string()))?;

        let limits = device.limits();
        let max_output_bytes =
            (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
        check_output_bytes(size, max_output_bytes)?;

        let (pipeline, bind_group_layout) = build_pipeline(&device);

        log::info!(
            "GPU renderer initialised: {:?} ({}x{})",
            adapter.get_info().name,
            size.width,
            size.height
        );

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            size,
            max_output_bytes,
            targets: None,
            released: false,
        })
    }
}

fn output_bytes(size: SurfaceSize) -> u64 {
    size.width as u64 * size.height as u64 * 4 // u32 per pixel
}

/// The output buffer for `size` must fit in one storage binding.
pub(crate) fn check_output_bytes(size: SurfaceSize, max_output_bytes: u64) -> Result<()> {
    let needed = output_bytes(size);
    if needed > max_output_bytes {
        return Err(VizError::ContextUnavailable(format!(
            "surface {}x{} needs {} bytes of output, device allows {}",
            size.width, size.height, needed, max_output_bytes
        )));
    }
    Ok(())
}

/// Output buffers for `size`, recreated when the surface size changed.
fn ensure_targets<'a>(
    device: &wgpu::Device,
    slot: &'a mut Option<Targets>,
    size: SurfaceSize,
) -> &'a Targets {
    if slot.as_ref().map(|t| t.size) != Some(size) {
        if let Some(old) = slot.take() {
            old.output.destroy();
            old.staging.destroy();
        }
    }
    slot.get_or_insert_with(|| {
        let output_size = output_bytes(size);
        Targets {
            size,
            output: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Output Pixels"),
                size: output_size,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            }),
            staging: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Staging"),
                size: output_size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
        }
    })
}

impl RenderBackend for GpuRenderer {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn accepts(&self, size: SurfaceSize) -> bool {
        check_surface(size).is_ok() && check_output_bytes(size, self.max_output_bytes).is_ok()
    }

    fn resize(&mut self, size: SurfaceSize) {
        self.size = size;
    }

    fn draw(&mut self, list: &DrawList) -> Result<Frame> {
        if self.released {
            return Err(VizError::Disposed);
        }
        check_output_bytes(self.size, self.max_output_bytes)?;

        let size = self.size;
        let mut prims: Vec<GpuPrim> = list.prims.iter().map(GpuPrim::from_prim).collect();
        let prim_count = prims.len() as u32;
        if prims.is_empty() {
            // Storage bindings cannot be zero-sized
            prims.push(bytemuck::Zeroable::zeroed());
        }

        let uniforms = Uniforms {
            clear_color: list.clear_color,
            width: size.width,
            height: size.height,
            prim_count,
            _pad0: 0,
        };

        let uniform_buf = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Uniforms"),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let prim_buf = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Primitives"),
                contents: bytemuck::cast_slice(&prims),
                usage: wgpu::BufferUsages::STORAGE,
            });

        let device = &self.device;
        let targets = ensure_targets(device, &mut self.targets, size);
        let output_size = targets.output.size();

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Render Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: prim_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: targets.output.as_entire_binding(),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Composite Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            let wg_x = size.width.div_ceil(16);
            let wg_y = size.height.div_ceil(16);
            pass.dispatch_workgroups(wg_x, wg_y, 1);
        }

        encoder.copy_buffer_to_buffer(&targets.output, 0, &targets.staging, 0, output_size);
        self.queue.submit(std::iter::once(encoder.finish()));

        // Read back
        let buffer_slice = targets.staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |r| {
            let _ = tx.send(r);
        });
        device.poll(wgpu::Maintain::Wait);

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(VizError::ContextUnavailable(e.to_string())),
            Err(e) => return Err(VizError::ContextUnavailable(e.to_string())),
        }

        let data = buffer_slice.get_mapped_range();
        let packed: &[u32] = bytemuck::cast_slice(&data);

        // Packed u32 (RGBA, little-endian) → [u8; 4] per pixel
        let mut pixels = vec![0u8; packed.len() * 4];
        for (dst, &px) in pixels.chunks_exact_mut(4).zip(packed) {
            dst.copy_from_slice(&px.to_le_bytes());
        }

        drop(data);
        targets.staging.unmap();

        Ok(Frame { size, pixels })
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Some(t) = self.targets.take() {
            t.output.destroy();
            t.staging.destroy();
        }
        log::debug!("GPU renderer released");
    }
}

// ── Pipeline construction ──

fn build_pipeline(device: &wgpu::Device) -> (wgpu::ComputePipeline, wgpu::BindGroupLayout) {
    let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Composite Shader"),
        source: wgpu::ShaderSource::Wgsl(COMPOSITE_WGSL.into()),
    });

    let buffer_entry = |binding: u32, ty: wgpu::BufferBindingType| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    };

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Render BGL"),
        entries: &[
            // Uniforms
            buffer_entry(0, wgpu::BufferBindingType::Uniform),
            // Primitives
            buffer_entry(1, wgpu::BufferBindingType::Storage { read_only: true }),
            // Output pixels
            buffer_entry(2, wgpu::BufferBindingType::Storage { read_only: false }),
        ],
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Render PL"),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some("Composite Pipeline"),
        layout: Some(&pipeline_layout),
        module: &shader_module,
        entry_point: Some("main"),
        compilation_options: wgpu::PipelineCompilationOptions::default(),
        cache: None,
    });

    (pipeline, bind_group_layout)
}

const COMPOSITE_WGSL: &str = r#"
struct Uniforms {
    clear_color: vec4<f32>,
    width: u32,
    height: u32,
    prim_count: u32,
    _pad0: u32,
}

struct Prim {
    kind: u32,
    count: u32,
    shaded: u32,
    _pad0: u32,
    color: vec4<f32>,
    geom: vec4<f32>,
    extra: vec4<f32>,
    poly: array<vec4<f32>, 5>,
}

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(0) @binding(1) var<storage, read> prims: array<Prim>;
@group(0) @binding(2) var<storage, read_write> output_pixels: array<u32>;

fn poly_point(i: u32, j: u32) -> vec2<f32> {
    let v = prims[i].poly[j / 2u];
    if (j % 2u == 0u) {
        return v.xy;
    }
    return v.zw;
}

// Brightness if covered, negative otherwise
fn coverage(i: u32, p: vec2<f32>) -> f32 {
    let kind = prims[i].kind;
    let geom = prims[i].geom;

    if (kind == 0u) {
        let d = p - geom.xy;
        let d2 = dot(d, d);
        let r2 = geom.z * geom.z;
        if (d2 > r2) {
            return -1.0;
        }
        if (prims[i].shaded == 1u) {
            return 1.0 - 0.45 * d2 / r2;
        }
        return 1.0;
    }

    if (kind == 1u) {
        let a = geom.xy;
        let ab = geom.zw - a;
        let len2 = dot(ab, ab);
        var h = 0.0;
        if (len2 > 0.0) {
            h = clamp(dot(p - a, ab) / len2, 0.0, 1.0);
        }
        let d = p - (a + ab * h);
        let r = prims[i].extra.x;
        if (dot(d, d) <= r * r) {
            return 1.0;
        }
        return -1.0;
    }

    let n = prims[i].count;
    var winding = 0.0;
    for (var j = 0u; j < n; j++) {
        let a = poly_point(i, j);
        let b = poly_point(i, (j + 1u) % n);
        let e = b - a;
        let q = p - a;
        let c = e.x * q.y - e.y * q.x;
        if (c != 0.0) {
            if (winding != 0.0 && sign(c) != winding) {
                return -1.0;
            }
            winding = sign(c);
        }
    }
    return 1.0;
}

// ── Main compute kernel: one thread per pixel ──
@compute @workgroup_size(16, 16)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let px = gid.x;
    let py = gid.y;
    if (px >= u.width || py >= u.height) {
        return;
    }

    let p = vec2<f32>(f32(px) + 0.5, f32(py) + 0.5);
    var col = u.clear_color.xyz;

    for (var i = 0u; i < u.prim_count; i++) {
        let shade = coverage(i, p);
        if (shade >= 0.0) {
            let c = prims[i].color;
            col = c.xyz * shade * c.w + col * (1.0 - c.w);
        }
    }

    let r = clamp(col.x, 0.0, 1.0);
    let g = clamp(col.y, 0.0, 1.0);
    let b = clamp(col.z, 0.0, 1.0);

    let idx = py * u.width + px;
    output_pixels[idx] = u32(r * 255.0)
                       | (u32(g * 255.0) << 8u)
                       | (u32(b * 255.0) << 16u)
                       | (255u << 24u);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn prim_layout_is_vec4_aligned() {
        assert_eq!(std::mem::size_of::<Uniforms>(), 32);
        assert_eq!(std::mem::size_of::<GpuPrim>() % 16, 0);
        assert_eq!(std::mem::size_of::<GpuPrim>(), 144);
    }

    #[test]
    fn polygons_pack_two_points_per_slot() {
        let prim = DrawPrim {
            shape: Shape::Polygon {
                points: vec![Vec2::new(1.0, 2.0), Vec2::new(3.0, 4.0), Vec2::new(5.0, 6.0)],
            },
            color: [1.0; 4],
            depth: 1.0,
            shaded: false,
        };
        let g = GpuPrim::from_prim(&prim);
        assert_eq!(g.kind, KIND_POLYGON);
        assert_eq!(g.count, 3);
        assert_eq!(g.poly[0], [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(g.poly[1][..2], [5.0, 6.0]);
    }

    #[test]
    fn output_must_fit_one_storage_binding() {
        let default_binding = 128 << 20;
        assert!(check_output_bytes(SurfaceSize::new(1920, 1080), default_binding).is_ok());
        assert!(check_output_bytes(SurfaceSize::new(4096, 4096), default_binding).is_ok());
        assert!(matches!(
            check_output_bytes(SurfaceSize::new(6000, 6000), default_binding),
            Err(VizError::ContextUnavailable(_))
        ));
    }

    #[test]
    fn capsule_radius_in_extra() {
        let prim = DrawPrim {
            shape: Shape::Capsule {
                a: Vec2::ZERO,
                b: Vec2::new(4.0, 0.0),
                radius: 1.5,
            },
            color: [1.0; 4],
            depth: 1.0,
            shaded: false,
        };
        let g = GpuPrim::from_prim(&prim);
        assert_eq!(g.kind, KIND_CAPSULE);
        assert_eq!(g.geom, [0.0, 0.0, 4.0, 0.0]);
        assert_eq!(g.extra[0], 1.5);
    }
}
