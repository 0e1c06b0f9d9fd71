//! Headless smoke demo: builds a scene through the full engine path
//! (buffers → registry → swap → wgpu backend) and writes the rendered frame
//! to `nabu-demo.png`.
//!
//! Pass a TTF path as the first argument to also exercise the text path:
//!
//! ```text
//! nabu-demo /usr/share/fonts/truetype/dejavu/DejaVuSans.ttf
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};

use nabu_engine::coords::{Color, Rect, Vec2};
use nabu_engine::draw::{CornerFlags, check_mark, rectangle_filled_rounded};
use nabu_engine::logging::{LoggingConfig, init_logging};
use nabu_engine::manager::DrawManager;
use nabu_engine::render::{RenderBackend, WgpuRenderer};
use nabu_engine::text::{Font, glyph_ranges_latin};

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let (device, queue) = pollster::block_on(create_device())?;
    let format = wgpu::TextureFormat::Rgba8Unorm;

    let manager = DrawManager::new(Vec2::new(WIDTH as f32, HEIGHT as f32));

    let font = match std::env::args().nth(1) {
        Some(path) => {
            let bytes = std::fs::read(&path).with_context(|| format!("reading font {path}"))?;
            Some(
                manager
                    .add_font(&bytes, 18.0, glyph_ranges_latin())
                    .context("building font atlas")?,
            )
        }
        None => None,
    };

    let scene = manager.register_buffer(0);
    let overlay = manager.register_buffer(10);
    let badge = manager.register_child_buffer(overlay, 1);

    build_scene(&manager, scene, font.as_ref());
    build_overlay(&manager, overlay, badge);
    manager.swap_buffers(scene);
    manager.swap_buffers(overlay);

    // Nudge the already-swapped overlay without re-tessellating it.
    manager.update_matrix_translate(overlay, Vec2::new(0.0, 8.0), None);

    let mut renderer = WgpuRenderer::new(device.clone(), queue.clone(), format);

    let target = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("nabu-demo target"),
        size: wgpu::Extent3d { width: WIDTH, height: HEIGHT, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    renderer.set_render_target(
        target.create_view(&wgpu::TextureViewDescriptor::default()),
        WIDTH,
        HEIGHT,
    );
    renderer.draw(&manager);

    let pixels = read_back(&device, &queue, &target)?;
    image::save_buffer("nabu-demo.png", &pixels, WIDTH, HEIGHT, image::ExtendedColorType::Rgba8)
        .context("writing nabu-demo.png")?;

    let (vtx, idx) = manager.active_totals();
    println!("rendered {vtx} vertices / {idx} indices to nabu-demo.png");
    Ok(())
}

fn build_scene(manager: &DrawManager, id: nabu_engine::manager::BufferId, font: Option<&Arc<Font>>) {
    let buf = manager.get_buffer(id);
    let mut buf = buf.lock().expect("scene buffer");

    // Background gradient.
    buf.rectangle_filled_multicolor(
        Vec2::new(0.0, 0.0),
        Vec2::new(WIDTH as f32, HEIGHT as f32),
        Color::rgb(24, 26, 38),
        Color::rgb(24, 26, 38),
        Color::rgb(48, 30, 70),
        Color::rgb(48, 30, 70),
    );

    // Panel with three rounded corners.
    rectangle_filled_rounded(
        &mut buf,
        Vec2::new(60.0, 60.0),
        Vec2::new(420.0, 280.0),
        16.0,
        Color::rgb(40, 44, 62),
        CornerFlags::TOP | CornerFlags::BOT_RIGHT,
    );

    // Clipped shapes: everything outside the panel vanishes.
    buf.push_clip_rect(Rect::new(60.0, 60.0, 420.0, 280.0), false);
    buf.circle_filled(Vec2::new(140.0, 150.0), 40.0, Color::RED, true);
    buf.arc_filled(
        Vec2::new(260.0, 150.0),
        40.0,
        Color::rgb(255, 220, 120),
        Color::rgb(255, 140, 40),
        270.0,
        45.0,
        true,
    );
    buf.circle(Vec2::new(380.0, 150.0), 40.0, Color::GREEN, 3.0, true);
    buf.pop_clip_rect();

    // Circular scissor: the square is trimmed to a disc.
    buf.push_clip_rect(Rect::new(480.0, 60.0, 700.0, 280.0), false);
    buf.push_clip_rect(Rect::new(520.0, 100.0, 660.0, 240.0), true);
    buf.rectangle_filled(Vec2::new(480.0, 60.0), Vec2::new(700.0, 280.0), Color::BLUE);
    buf.pop_clip_rect();
    buf.pop_clip_rect();

    // Anti-aliased polyline sweep.
    let wave: Vec<Vec2> = (0..=24)
        .map(|i| {
            let t = i as f32 / 24.0;
            Vec2::new(
                60.0 + t * 640.0,
                420.0 + (t * std::f32::consts::TAU * 2.0).sin() * 48.0,
            )
        })
        .collect();
    buf.poly_line(&wave, Color::rgb(120, 200, 255), 4.0, true);

    check_mark(&mut buf, Vec2::new(60.0, 500.0), 48.0, Color::GREEN);

    if let Some(font) = font {
        buf.text(
            Some(font),
            "nabu draw engine",
            Vec2::new(130.0, 510.0),
            Color::WHITE,
            true,
            None,
        );
    }
}

fn build_overlay(
    manager: &DrawManager,
    overlay: nabu_engine::manager::BufferId,
    badge: nabu_engine::manager::BufferId,
) {
    {
        let buf = manager.get_buffer(overlay);
        let mut buf = buf.lock().expect("overlay buffer");
        rectangle_filled_rounded(
            &mut buf,
            Vec2::new(620.0, 500.0),
            Vec2::new(760.0, 560.0),
            10.0,
            Color::new(255, 255, 255, 40),
            CornerFlags::ALL,
        );
    }
    {
        let buf = manager.get_buffer(badge);
        let mut buf = buf.lock().expect("badge buffer");
        buf.circle_filled(Vec2::new(640.0, 520.0), 8.0, Color::RED, true);
    }
}

async fn create_device() -> Result<(wgpu::Device, wgpu::Queue)> {
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
        .await
        .context("no suitable GPU adapter")?;

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("nabu-demo device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        })
        .await
        .context("failed to create wgpu device/queue")?;

    Ok((device, queue))
}

/// Copies the target texture into host memory, stripping the row padding
/// required by wgpu's buffer-copy alignment.
fn read_back(device: &wgpu::Device, queue: &wgpu::Queue, target: &wgpu::Texture) -> Result<Vec<u8>> {
    const ALIGN: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let unpadded = WIDTH * 4;
    let padded = unpadded.div_ceil(ALIGN) * ALIGN;

    let readback = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("nabu-demo readback"),
        size: (padded * HEIGHT) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder =
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("readback") });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: target,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &readback,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(HEIGHT),
            },
        },
        wgpu::Extent3d { width: WIDTH, height: HEIGHT, depth_or_array_layers: 1 },
    );
    queue.submit(Some(encoder.finish()));

    let slice = readback.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device
        .poll(wgpu::PollType::wait_indefinitely())
        .context("waiting for readback")?;
    rx.recv().context("map_async dropped")?.context("mapping readback buffer")?;

    let data = slice.get_mapped_range();
    let mut pixels = Vec::with_capacity((unpadded * HEIGHT) as usize);
    for row in 0..HEIGHT {
        let start = (row * padded) as usize;
        pixels.extend_from_slice(&data[start..start + unpadded as usize]);
    }
    drop(data);
    readback.unmap();
    Ok(pixels)
}
