//! Meadow - grass field viewer
//!
//! Usage: `meadow [config.json]`
//!
//! Keys: `=`/`-` density, `]`/`[` curvature, `.`/`,` culling radius,
//! `R` toggle receive shadows, `Space` pause the orbit, `Esc` quit.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use meadow::core::{camera::Camera, logging, Error, Vec2, Vec3};
use meadow::grass::{GrassConfig, GrassSystem, PlacementGridConfig};
use meadow::render::{context::GpuContext, WgpuGrassBackend};
use meadow::terrain::{Heightmap, TerrainGenerator, TerrainParams};

const SKY: wgpu::Color = wgpu::Color { r: 0.55, g: 0.72, b: 0.92, a: 1.0 };
const ORBIT_SPEED: f32 = 0.15;
const EYE_HEIGHT: f32 = 2.5;

struct Graphics {
    window: Arc<Window>,
    gpu: GpuContext,
    depth: wgpu::TextureView,
    grass: GrassSystem<WgpuGrassBackend>,
}

struct App {
    graphics: Option<Graphics>,
    config: GrassConfig,
    terrain: Heightmap,
    camera: Camera,
    orbit_angle: f32,
    paused: bool,
    last_frame: Instant,
    failed: bool,
}

impl App {
    fn new(config: GrassConfig) -> Self {
        let generator = TerrainGenerator::new(TerrainParams {
            scale: 40.0,
            height_scale: 6.0,
            ..Default::default()
        });
        let terrain = generator.bake(Vec2::new(-64.0, -64.0), 128.0, 129);

        Self {
            graphics: None,
            config,
            terrain,
            camera: Camera::default(),
            orbit_angle: 0.0,
            paused: false,
            last_frame: Instant::now(),
            failed: false,
        }
    }

    fn init_graphics(&mut self, event_loop: &ActiveEventLoop) -> Result<Graphics, Error> {
        let window_attrs = Window::default_attributes()
            .with_title("Meadow")
            .with_inner_size(PhysicalSize::new(1280, 720));

        let window = Arc::new(
            event_loop
                .create_window(window_attrs)
                .map_err(|e| Error::Window(e.to_string()))?,
        );
        let gpu = pollster::block_on(GpuContext::new(window.clone()))?;

        let size = window.inner_size();
        self.camera.set_aspect(size.width.max(1) as f32, size.height.max(1) as f32);

        log::info!("Window created: {}x{}", size.width, size.height);
        log::info!("GPU: {}", gpu.adapter.get_info().name);

        let backend = WgpuGrassBackend::new(&gpu.device, &gpu.queue, gpu.format());
        let mut grass = GrassSystem::new(backend, self.config);
        grass.set_terrain(self.terrain.clone());
        let depth = gpu.create_depth_view();

        Ok(Graphics { window, gpu, depth, grass })
    }

    fn update_camera(&mut self, dt: f32) {
        if !self.paused {
            self.orbit_angle += dt * ORBIT_SPEED;
        }

        let grid = &self.config.placement;
        let center = Vec3::new(grid.origin[0], 0.0, grid.origin[1]);
        let radius = grid.tile_size as f32 * 0.75 + 2.0;
        let x = center.x + self.orbit_angle.cos() * radius;
        let z = center.z + self.orbit_angle.sin() * radius;

        let eye = Vec3::new(x, self.terrain.height_at(x, z) + EYE_HEIGHT, z);
        let target = Vec3::new(center.x, self.terrain.height_at(center.x, center.z), center.z);

        let aspect = self.camera.aspect;
        self.camera = Camera::look_at(eye, target, Vec3::Y);
        self.camera.aspect = aspect;
    }

    fn handle_key(&mut self, code: KeyCode, event_loop: &ActiveEventLoop) {
        let mut config = self.config;
        match code {
            KeyCode::Escape => event_loop.exit(),
            KeyCode::Space => self.paused = !self.paused,
            KeyCode::Equal => config.placement.density += 5,
            KeyCode::Minus => config.placement.density = config.placement.density.saturating_sub(5),
            KeyCode::BracketRight => config.shape.curvature += 0.1,
            KeyCode::BracketLeft => config.shape.curvature -= 0.1,
            KeyCode::Period => config.render.culling_radius += 0.5,
            KeyCode::Comma => config.render.culling_radius -= 0.5,
            KeyCode::KeyR => config.render.receive_shadows = !config.render.receive_shadows,
            _ => return,
        }

        let config = config.clamped();
        if config != self.config {
            log::info!(
                "density={} curvature={:.1} culling_radius={:.1} receive_shadows={}",
                config.placement.density,
                config.shape.curvature,
                config.render.culling_radius,
                config.render.receive_shadows
            );
            self.config = config;
            self.failed = false;
            if let Some(graphics) = &mut self.graphics {
                graphics.grass.set_config(config);
            }
        }
    }

    fn render(&mut self) -> Result<(), Error> {
        let Some(graphics) = &mut self.graphics else {
            return Ok(());
        };

        let output = graphics.gpu.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut frame = graphics.grass.backend().begin_frame(view, graphics.depth.clone());
        frame.clear(SKY);

        if !self.failed {
            match graphics.grass.frame(&mut frame, Some(&self.camera)) {
                Ok(report) if report.rebuilt => log::debug!("{:?}", report),
                Ok(_) => {}
                Err(e) => {
                    log::error!("Grass frame failed: {}", e);
                    self.failed = true;
                }
            }
        }

        graphics.grass.backend().submit(frame);
        output.present();
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.graphics.is_some() {
            return;
        }

        match self.init_graphics(event_loop) {
            Ok(graphics) => self.graphics = Some(graphics),
            Err(e) => {
                log::error!("Failed to initialize graphics: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if size.width > 0 && size.height > 0 {
                    self.camera.set_aspect(size.width as f32, size.height as f32);
                    if let Some(graphics) = &mut self.graphics {
                        graphics.gpu.resize(size.width, size.height);
                        graphics.depth = graphics.gpu.create_depth_view();
                    }
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => self.handle_key(code, event_loop),
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let dt = (now - self.last_frame).as_secs_f32();
                self.last_frame = now;

                self.update_camera(dt);
                if let Err(e) = self.render() {
                    log::warn!("Frame dropped: {}", e);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(graphics) = &self.graphics {
            graphics.window.request_redraw();
        }
    }
}

fn load_config(path: Option<PathBuf>) -> GrassConfig {
    let default = GrassConfig {
        placement: PlacementGridConfig {
            tile_size: 8,
            ..Default::default()
        },
        ..Default::default()
    };

    let Some(path) = path else {
        return default;
    };

    match GrassConfig::load(&path) {
        Ok(config) => {
            log::info!("Loaded grass config from {}", path.display());
            config
        }
        Err(e) => {
            log::warn!("Ignoring {}: {}", path.display(), e);
            default
        }
    }
}

fn main() {
    logging::init();
    log::info!("Meadow starting...");

    let config = load_config(std::env::args().nth(1).map(PathBuf::from));
    log::info!(
        "Field: {} blades ({} per unit over a {}m tile)",
        config.placement.capacity(),
        config.placement.density,
        config.placement.tile_size
    );

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            log::error!("Failed to create event loop: {}", e);
            return;
        }
    };

    let mut app = App::new(config);
    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("Event loop error: {}", e);
    }
}
