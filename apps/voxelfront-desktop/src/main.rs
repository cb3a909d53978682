use anyhow::Result;
use clap::Parser;
use glam::{UVec2, Vec3};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};
use voxelfront_common::Transform;
use voxelfront_engine::WorldFrontend;
use voxelfront_render::FlyCamera;
use voxelfront_render_wgpu::WgpuBackend;
use voxelfront_stream::StreamConfig;
use voxelfront_volume::{Voxel, VoxelVolume};

const SPAWN_RADIUS: i32 = 5;

#[derive(Parser)]
#[command(name = "voxelfront-desktop", about = "Voxelfront desktop client")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// World seed
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Extraction radius in chunks
    #[arg(short, long, default_value = "4")]
    radius: i32,
}

struct App {
    seed: u64,
    radius: i32,
    camera: FlyCamera,
    keys_held: HashSet<KeyCode>,
    mouse_captured: bool,
    last_frame: Instant,
    window: Option<Arc<Window>>,
    engine: Option<WorldFrontend<WgpuBackend>>,
}

impl App {
    fn new(seed: u64, radius: i32) -> Self {
        Self {
            seed,
            radius,
            camera: FlyCamera::default(),
            keys_held: HashSet::new(),
            mouse_captured: false,
            last_frame: Instant::now(),
            window: None,
            engine: None,
        }
    }

    fn update_camera(&mut self, dt: f32) {
        let speed_mult = if self.keys_held.contains(&KeyCode::ShiftLeft) {
            3.0
        } else {
            1.0
        };

        let mut wish = Vec3::ZERO;
        if self.keys_held.contains(&KeyCode::KeyW) {
            wish.z += 1.0;
        }
        if self.keys_held.contains(&KeyCode::KeyS) {
            wish.z -= 1.0;
        }
        if self.keys_held.contains(&KeyCode::KeyA) {
            wish.x -= 1.0;
        }
        if self.keys_held.contains(&KeyCode::KeyD) {
            wish.x += 1.0;
        }
        if self.keys_held.contains(&KeyCode::Space) {
            wish.y += 1.0;
        }
        if self.keys_held.contains(&KeyCode::ControlLeft) {
            wish.y -= 1.0;
        }
        self.camera.fly(wish, dt * speed_mult);
    }

    fn handle_key(&mut self, key: KeyCode, pressed: bool) {
        if pressed {
            self.keys_held.insert(key);
        } else {
            self.keys_held.remove(&key);
        }
        if !pressed {
            return;
        }

        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        match key {
            KeyCode::KeyN => {
                let pos = self.camera.position + self.camera.forward() * 5.0;
                engine.spawn_entity(Transform::from_position(pos));
            }
            KeyCode::KeyR => {
                engine.reset();
                engine.on_spawn(self.camera.position, SPAWN_RADIUS);
                tracing::info!("world re-streamed");
            }
            KeyCode::F3 => {
                let stats = engine.stats();
                tracing::info!(
                    meshes = stats.meshes,
                    extracted = stats.extracted,
                    pending = stats.pending,
                    "streaming stats"
                );
            }
            _ => {}
        }
    }

    /// Dig out the voxel the camera is pointing at.
    fn dig(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        let hit = engine
            .volume()
            .raycast(self.camera.position, self.camera.forward(), 64.0);
        if let Some((cell, _)) = hit {
            match engine.set_voxel(cell, Voxel::AIR) {
                Ok(grid) => tracing::debug!(?cell, ?grid, "voxel dug"),
                Err(e) => tracing::warn!("dig failed: {e}"),
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title("voxelfront")
            .with_inner_size(PhysicalSize::new(1280u32, 720));
        let window = Arc::new(event_loop.create_window(attrs).expect("create window"));
        let size = window.inner_size();
        self.camera.set_aspect(UVec2::new(size.width, size.height));

        let volume = Arc::new(VoxelVolume::with_seed(self.seed));
        let config = StreamConfig {
            extraction_radius: self.radius,
            ..StreamConfig::default()
        };
        let backend = WgpuBackend::new(Arc::clone(&window));
        let mut engine =
            WorldFrontend::new(volume, config, backend).expect("streaming configuration");
        engine
            .on_init(UVec2::new(size.width, size.height))
            .expect("initialize renderer");
        engine.on_spawn(self.camera.position, SPAWN_RADIUS);

        self.window = Some(window);
        self.engine = Some(engine);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                if let Some(engine) = self.engine.as_mut() {
                    engine.shutdown();
                }
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                let dimension = UVec2::new(new_size.width, new_size.height);
                self.camera.set_aspect(dimension);
                if let Some(engine) = self.engine.as_mut() {
                    engine.resize(dimension);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: key_state,
                        ..
                    },
                ..
            } => {
                self.handle_key(key, key_state == ElementState::Pressed);
            }
            WindowEvent::MouseInput {
                button: MouseButton::Right,
                state: btn_state,
                ..
            } => {
                self.mouse_captured = btn_state == ElementState::Pressed;
                if let Some(window) = &self.window {
                    window.set_cursor_visible(!self.mouse_captured);
                }
            }
            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state: ElementState::Pressed,
                ..
            } => {
                self.dig();
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let dt = (now - self.last_frame).as_secs_f32().min(0.1);
                self.last_frame = now;
                self.update_camera(dt);

                let Some(engine) = self.engine.as_mut() else {
                    return;
                };
                engine.extract_new_meshes(self.camera.position, false);
                engine.on_running(dt);

                if let Err(e) = engine.render_world(&self.camera) {
                    tracing::error!("render error: {e}");
                    return;
                }
                if let Err(e) = engine.render_entities(&self.camera) {
                    tracing::error!("render error: {e}");
                }
                engine.end_frame();

                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if self.mouse_captured {
                self.camera.rotate(delta.0 as f32, delta.1 as f32);
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!(seed = cli.seed, "voxelfront-desktop starting");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(cli.seed, cli.radius);
    event_loop.run_app(&mut app)?;

    Ok(())
}
