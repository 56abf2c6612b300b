//! Demo state: scene setup, per-frame update and the render call.

use std::f32::consts::TAU;
use std::sync::Arc;

use anyhow::{Context, Result};
use engine_core::{Time, Transform, Vec3};
use input::InputState;
use procgen::{normal_to_dudv, PoolConfig, PoolData, RippleConfig, SkyConfig, TextureGenerator};
use renderer::{
    tile_model, tile_offsets, Camera, CameraPose, Drawable, FrameCameras, FrameCapture, FrameParams, Lighting, Mesh,
    MeshData, MirrorCamera, MoveKeys, OffscreenTargets, PassDriver, RenderContext, RenderError, SceneMesh,
    ScenePipelines, SceneSet, Skybox, TargetPreview, Texture, WaterPlane, WaterSettings, WaterSurface,
};
use winit::keyboard::KeyCode;
use winit::window::{CursorGrabMode, Window};

use crate::config::DemoConfig;

const TEXTURE_SIZE: u32 = 256;
const SKY_FACE_SIZE: u32 = 256;

pub struct DemoState {
    pub ctx: RenderContext,
    pub time: Time,
    pub input: InputState,
    pub camera: Camera,
    pub running: bool,

    config: DemoConfig,
    mirror: MirrorCamera,
    lighting: Lighting,
    tiles: Vec<Vec3>,

    targets: OffscreenTargets,
    driver: PassDriver,
    scene: SceneSet,
    water: WaterSurface,
    previews: TargetPreview,
    capture: FrameCapture,
}

impl DemoState {
    pub async fn new(window: Arc<Window>, config: DemoConfig) -> Result<Self> {
        let ctx = RenderContext::new(window, config.vsync)
            .await
            .context("failed to create render context")?;
        let (width, height) = ctx.dimensions();
        let format = ctx.surface_format();

        let mut camera = Camera {
            pose: CameraPose::new(Vec3::from(config.eye), config.yaw, config.pitch),
            fov_degrees: config.fov_degrees,
            near: config.near,
            far: config.far,
            mouse_speed: config.mouse_speed,
            move_speed: config.move_speed,
            ..Default::default()
        };
        camera.set_aspect(width, height);

        let targets = OffscreenTargets::create(&ctx.device, width, height, format)
            .context("failed to create offscreen targets")?;

        // Generated textures stand in for any asset file that is missing.
        let mut generator = TextureGenerator::new(config.seed);
        let normal_data = generator.water_normal_map(TEXTURE_SIZE, &RippleConfig::default());
        let dudv_data = normal_to_dudv(&normal_data);
        let (stone_data, stone_normal_data) = generator.stone(TEXTURE_SIZE);
        let sky_faces = generator.sky_faces(SKY_FACE_SIZE, &SkyConfig::default());

        let assets = &config.asset_dir;
        let (device, queue) = (&ctx.device, &ctx.queue);
        let dudv = Texture::load_or(device, queue, &assets.join("dudv.png"), &dudv_data, false)?;
        let water_normal = Texture::load_or(device, queue, &assets.join("normal.png"), &normal_data, false)?;
        let stone = Texture::load_or(device, queue, &assets.join("stone.png"), &stone_data, true)?;
        let stone_normal = Texture::from_texture_data(device, queue, "stone_normal", &stone_normal_data, false)?;
        let sky = Texture::cubemap(device, queue, "Sky Cubemap", &sky_faces)?;

        let pipelines = Arc::new(ScenePipelines::new(device, format).context("failed to build scene shaders")?);
        let pool = PoolData::generate(PoolConfig {
            seed: config.seed,
            ..Default::default()
        });
        log::info!(
            "Generated pool: {} vertices, {} triangles",
            pool.vertices.len(),
            pool.indices.len() / 3
        );
        let pool_mesh = SceneMesh::new(
            device,
            "Pool",
            pipelines.clone(),
            MeshData::from_pool(&pool).upload(device, "Pool"),
            &stone,
            &stone_normal,
            Transform::default(),
        );
        // Straddles the water line so both clip planes have something to cut.
        let block = SceneMesh::new(
            device,
            "Stone Block",
            pipelines.clone(),
            Mesh::cube(device),
            &stone,
            &stone_normal,
            Transform::from_position(Vec3::new(0.0, config.water_height, 0.0)),
        );
        let skybox = Skybox::new(device, format, &sky, config.skybox_half_size)?;
        let meshes: Vec<Box<dyn Drawable>> = vec![Box::new(pool_mesh), Box::new(block)];
        let scene = SceneSet::new(Some(Box::new(skybox)), meshes);

        let water = WaterSurface::new(
            device,
            format,
            &targets,
            &dudv,
            &water_normal,
            WaterSettings {
                half_size: config.water_half_size,
                scroll_speed: config.scroll_speed,
                wave_strength: config.wave_strength,
            },
        )
        .context("failed to build water surface")?;
        let previews = TargetPreview::new(device, format, &targets)?;

        let water_plane = WaterPlane::new(config.water_height, config.reflection_bias);
        let driver = PassDriver::new(&water_plane)?;

        let mut state = Self {
            time: Time::new(),
            input: InputState::new(),
            running: true,
            mirror: MirrorCamera::new(config.water_height),
            lighting: Lighting {
                position: Vec3::from(config.light_position),
                color: Vec3::from(config.light_color),
            },
            tiles: tile_offsets(config.tiles_per_side, config.water_half_size),
            capture: FrameCapture::new(config.capture_dir.clone()),
            ctx,
            camera,
            config,
            targets,
            driver,
            scene,
            water,
            previews,
        };
        state.grab_cursor(true);
        Ok(state)
    }

    pub fn grab_cursor(&mut self, grab: bool) {
        let window = &self.ctx.window;
        if grab {
            let _ = window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined));
        } else {
            let _ = window.set_cursor_grab(CursorGrabMode::None);
        }
        window.set_cursor_visible(!grab);
        self.input.set_cursor_locked(grab);
    }

    pub fn update(&mut self) {
        self.time.update();
        if let Some(fps) = self.time.take_fps_report() {
            log::debug!("FPS: {:.1} (frame {})", fps, self.time.frame_count());
        }
        self.input.begin_frame();

        self.handle_debug_keys();

        let delta = self.input.mouse_delta();
        self.camera.process_mouse(delta.x, delta.y);
        let held = |a: KeyCode, b: KeyCode| self.input.is_key_held(a) || self.input.is_key_held(b);
        let keys = MoveKeys {
            forward: held(KeyCode::KeyW, KeyCode::ArrowUp),
            backward: held(KeyCode::KeyS, KeyCode::ArrowDown),
            right: held(KeyCode::KeyD, KeyCode::ArrowRight),
            left: held(KeyCode::KeyA, KeyCode::ArrowLeft),
        };
        self.camera.process_movement(keys, self.time.delta_seconds());

        self.water.tick();
    }

    fn handle_debug_keys(&mut self) {
        if self.input.is_key_pressed(KeyCode::Escape) {
            self.running = false;
        }
        if self.input.is_key_pressed(KeyCode::KeyI) {
            let pose = self.camera.pose;
            log::info!(
                "Eye ({:.3}, {:.3}, {:.3}) pitch {:.3} yaw {:.3}",
                pose.position.x,
                pose.position.y,
                pose.position.z,
                pose.pitch.rem_euclid(TAU),
                pose.yaw.rem_euclid(TAU)
            );
        }
        if self.input.is_key_pressed(KeyCode::KeyR) {
            self.water.animation_mut().reset();
            log::info!("Water scroll reset");
        }
        if self.input.is_key_pressed(KeyCode::KeyP) {
            let paused = self.water.animation_mut().toggle_pause();
            log::info!("Water scroll {}", if paused { "paused" } else { "resumed" });
        }
        if self.input.is_key_pressed(KeyCode::KeyY) {
            if self.ctx.can_capture() {
                let on = self.capture.toggle();
                log::info!(
                    "Frame capture {} ({})",
                    if on { "on" } else { "off" },
                    self.capture.dir().display()
                );
            } else {
                log::warn!("Frame capture is not supported by this surface");
            }
        }
        if self.input.is_key_pressed(KeyCode::KeyT) {
            let shown = self.driver.toggle_previews();
            log::info!("Target previews {}", if shown { "shown" } else { "hidden" });
        }
    }

    pub fn render(&mut self) -> Result<()> {
        let output = match self.ctx.begin_frame() {
            Ok(output) => output,
            Err(RenderError::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                self.ctx.resize(self.ctx.size);
                return Ok(());
            }
            Err(RenderError::Surface(wgpu::SurfaceError::Timeout)) => {
                log::warn!("Surface timeout; skipping frame");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let cameras = FrameCameras::new(&self.camera, &self.mirror);
        let frame = FrameParams {
            view: cameras.primary.view,
            projection: cameras.primary.projection,
            eye: cameras.primary.eye,
            lighting: self.lighting,
            near: self.camera.near,
            far: self.camera.far,
        };
        for &offset in &self.tiles {
            self.water.draw(tile_model(offset, self.config.water_height), &frame);
        }

        self.driver.run(
            &self.ctx,
            &self.targets,
            &cameras,
            self.lighting,
            (self.camera.near, self.camera.far),
            &mut self.scene,
            &mut self.water,
            &self.previews,
            &view,
        );

        if let Err(e) = self.capture.capture(&self.ctx, &output.texture) {
            log::error!("{}; stopping capture", e);
            self.capture.toggle();
        }

        self.ctx.end_frame(output);
        Ok(())
    }

    pub fn resize(&mut self, size: winit::dpi::PhysicalSize<u32>) {
        self.ctx.resize(size);
        self.camera.set_aspect(size.width, size.height);
    }
}
