//! Per-frame pass plan and the driver that executes it.
//!
//! A frame is three passes: refraction and reflection into the offscreen targets, then the main
//! pass to the screen which samples both. The plan is plain data so ordering, clip state and
//! camera selection can be checked without a GPU. Each pass is submitted on its own because
//! scene uniforms are shared between passes and `write_buffer` only lands at submit time.

use crate::camera::{Camera, EyeView};
use crate::clip::{ClipState, WaterPlane};
use crate::context::RenderContext;
use crate::error::{RenderError, RenderResult};
use crate::mirror::MirrorCamera;
use crate::preview::TargetPreview;
use crate::scene::{CullMode, FrameParams, Lighting, SceneSet};
use crate::target::{ClearOps, OffscreenTargets, TargetId};
use crate::water::WaterSurface;

/// Sky-blue behind the main view.
pub const MAIN_CLEAR: wgpu::Color = wgpu::Color {
    r: 97.0 / 256.0,
    g: 175.0 / 256.0,
    b: 239.0 / 256.0,
    a: 1.0,
};

/// Grey behind the offscreen views.
pub const OFFSCREEN_CLEAR: wgpu::Color = wgpu::Color {
    r: 171.0 / 256.0,
    g: 178.0 / 256.0,
    b: 191.0 / 256.0,
    a: 1.0,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Refraction,
    Reflection,
    Main,
}

impl PassKind {
    pub fn label(self) -> &'static str {
        match self {
            PassKind::Refraction => "Refraction Pass",
            PassKind::Reflection => "Reflection Pass",
            PassKind::Main => "Main Pass",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraSelector {
    Primary,
    Mirrored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Offscreen(TargetId),
    Screen,
}

/// Which groups of draws a pass issues, in skybox, scene, water, previews order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawSet {
    pub skybox: bool,
    pub scene: bool,
    pub water: bool,
    pub previews: bool,
}

impl DrawSet {
    /// Offscreen targets read while this draw set executes.
    pub fn samples(&self) -> &'static [TargetId] {
        if self.water || self.previews {
            &TargetId::ALL
        } else {
            &[]
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassDescriptor {
    pub kind: PassKind,
    pub destination: Destination,
    pub clip: ClipState,
    pub camera: CameraSelector,
    pub cull: CullMode,
    pub draws: DrawSet,
    pub clear_color: wgpu::Color,
}

/// The fixed refraction, reflection, main sequence.
pub fn frame_passes(water: &WaterPlane) -> [PassDescriptor; 3] {
    let offscreen_draws = DrawSet {
        skybox: true,
        scene: true,
        water: false,
        previews: false,
    };
    [
        PassDescriptor {
            kind: PassKind::Refraction,
            destination: Destination::Offscreen(TargetId::Refraction),
            clip: ClipState::refraction(water),
            camera: CameraSelector::Primary,
            cull: CullMode::Back,
            draws: offscreen_draws,
            clear_color: OFFSCREEN_CLEAR,
        },
        PassDescriptor {
            kind: PassKind::Reflection,
            destination: Destination::Offscreen(TargetId::Reflection),
            clip: ClipState::reflection(water),
            camera: CameraSelector::Mirrored,
            // Mirroring flips winding.
            cull: CullMode::None,
            draws: offscreen_draws,
            clear_color: OFFSCREEN_CLEAR,
        },
        PassDescriptor {
            kind: PassKind::Main,
            destination: Destination::Screen,
            clip: ClipState::DISABLED,
            camera: CameraSelector::Primary,
            cull: CullMode::Back,
            draws: DrawSet {
                skybox: true,
                scene: true,
                water: true,
                previews: true,
            },
            clear_color: MAIN_CLEAR,
        },
    ]
}

/// Every target a pass samples must have been rendered by an earlier pass, and no pass may
/// sample the target it renders into.
pub fn check_dependencies(passes: &[PassDescriptor]) -> RenderResult<()> {
    for (i, pass) in passes.iter().enumerate() {
        for &target in pass.draws.samples() {
            let rendered_before = passes[..i]
                .iter()
                .any(|p| p.destination == Destination::Offscreen(target));
            let self_sampling = pass.destination == Destination::Offscreen(target);
            if !rendered_before || self_sampling {
                return Err(RenderError::PassOrder {
                    pass: pass.kind.label().to_string(),
                    target: target.label().to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Primary and mirrored views for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameCameras {
    pub primary: EyeView,
    pub mirrored: EyeView,
}

impl FrameCameras {
    pub fn new(camera: &Camera, mirror: &MirrorCamera) -> Self {
        let primary = camera.eye_view();
        let reflected = mirror.derive(&camera.pose);
        Self {
            primary,
            mirrored: EyeView {
                view: reflected.view_matrix(),
                projection: primary.projection,
                eye: reflected.position,
            },
        }
    }

    pub fn select(&self, selector: CameraSelector) -> &EyeView {
        match selector {
            CameraSelector::Primary => &self.primary,
            CameraSelector::Mirrored => &self.mirrored,
        }
    }
}

/// Executes the pass plan each frame.
pub struct PassDriver {
    passes: Vec<PassDescriptor>,
    show_previews: bool,
}

impl PassDriver {
    pub fn new(water: &WaterPlane) -> RenderResult<Self> {
        Self::from_passes(frame_passes(water).to_vec())
    }

    pub fn from_passes(passes: Vec<PassDescriptor>) -> RenderResult<Self> {
        check_dependencies(&passes)?;
        Ok(Self {
            passes,
            show_previews: false,
        })
    }

    pub fn passes(&self) -> &[PassDescriptor] {
        &self.passes
    }

    /// Returns the new visibility.
    pub fn toggle_previews(&mut self) -> bool {
        self.show_previews = !self.show_previews;
        self.show_previews
    }

    /// Render every pass. Water tiles must already be queued; they are cleared afterwards.
    #[allow(clippy::too_many_arguments)]
    pub fn run(
        &self,
        ctx: &RenderContext,
        targets: &OffscreenTargets,
        cameras: &FrameCameras,
        lighting: Lighting,
        near_far: (f32, f32),
        scene: &mut SceneSet,
        water: &mut WaterSurface,
        previews: &TargetPreview,
        screen: &wgpu::TextureView,
    ) {
        for pass in &self.passes {
            let eye = cameras.select(pass.camera);
            let frame = FrameParams {
                view: eye.view,
                projection: eye.projection,
                eye: eye.eye,
                lighting,
                near: near_far.0,
                far: near_far.1,
            };

            scene.set_frame(&frame);
            scene.set_clip_planes(&pass.clip);
            scene.prepare(&ctx.queue);
            if pass.draws.water {
                water.prepare(&ctx.device, &ctx.queue);
            }

            let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(pass.kind.label()),
            });
            {
                let bound = match pass.destination {
                    Destination::Offscreen(id) => targets.bind(id),
                    Destination::Screen => targets.unbind(screen, ctx.depth_view()),
                };
                log::trace!("{} -> {}", pass.kind.label(), bound.label());
                let mut rpass = bound.begin_pass(
                    &mut encoder,
                    ClearOps {
                        color: Some(pass.clear_color),
                        depth: true,
                    },
                );
                if pass.draws.skybox {
                    scene.draw_skybox(&mut rpass);
                }
                if pass.draws.scene {
                    scene.draw_meshes(&mut rpass, pass.cull);
                }
                if pass.draws.water {
                    water.encode(&mut rpass);
                }
                if pass.draws.previews && self.show_previews {
                    previews.draw(&mut rpass);
                }
            }
            ctx.queue.submit(std::iter::once(encoder.finish()));
        }
        water.end_frame();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::Vec3;

    fn water() -> WaterPlane {
        WaterPlane::new(2.2, 0.125)
    }

    #[test]
    fn passes_run_refraction_reflection_main() {
        let kinds: Vec<_> = frame_passes(&water()).iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![PassKind::Refraction, PassKind::Reflection, PassKind::Main]);
        assert!(check_dependencies(&frame_passes(&water())).is_ok());
    }

    #[test]
    fn each_pass_gets_its_clip_and_camera() {
        let [refraction, reflection, main] = frame_passes(&water());

        assert_eq!(refraction.destination, Destination::Offscreen(TargetId::Refraction));
        assert_eq!(refraction.camera, CameraSelector::Primary);
        assert!(refraction.clip.admits(Vec3::new(0.0, 2.0, 0.0)));
        assert!(!refraction.clip.admits(Vec3::new(0.0, 2.5, 0.0)));
        assert!(refraction.clip.planes[1].is_none());

        assert_eq!(reflection.destination, Destination::Offscreen(TargetId::Reflection));
        assert_eq!(reflection.camera, CameraSelector::Mirrored);
        assert_eq!(reflection.cull, CullMode::None);
        assert!(reflection.clip.planes[0].is_none());
        assert!(reflection.clip.admits(Vec3::new(0.0, 2.5, 0.0)));

        assert_eq!(main.destination, Destination::Screen);
        assert_eq!(main.clip, ClipState::DISABLED);
        assert_eq!(main.cull, CullMode::Back);
    }

    #[test]
    fn only_main_pass_draws_water() {
        let passes = frame_passes(&water());
        assert!(!passes[0].draws.water);
        assert!(!passes[1].draws.water);
        assert!(passes[2].draws.water);
        assert!(passes.iter().all(|p| p.draws.skybox && p.draws.scene));
    }

    #[test]
    fn offscreen_and_main_clear_colors_differ() {
        let passes = frame_passes(&water());
        assert_eq!(passes[0].clear_color, OFFSCREEN_CLEAR);
        assert_eq!(passes[1].clear_color, OFFSCREEN_CLEAR);
        assert_eq!(passes[2].clear_color, MAIN_CLEAR);
    }

    #[test]
    fn main_before_offscreen_is_rejected() {
        let [refraction, reflection, main] = frame_passes(&water());
        let err = check_dependencies(&[main, refraction, reflection]).unwrap_err();
        assert!(matches!(err, RenderError::PassOrder { .. }));
        assert!(PassDriver::from_passes(vec![refraction, main]).is_err());
    }

    #[test]
    fn sampling_own_destination_is_rejected() {
        let [refraction, reflection, mut main] = frame_passes(&water());
        main.destination = Destination::Offscreen(TargetId::Reflection);
        assert!(check_dependencies(&[refraction, reflection, main]).is_err());
    }

    #[test]
    fn mirrored_camera_shares_projection() {
        let camera = Camera::default();
        let cameras = FrameCameras::new(&camera, &MirrorCamera::new(2.2));
        assert_eq!(cameras.mirrored.projection, cameras.primary.projection);
        let expected_y = 2.0 * 2.2 - camera.position().y;
        assert!((cameras.mirrored.eye.y - expected_y).abs() < 1e-5);
        assert_eq!(cameras.select(CameraSelector::Primary).eye, camera.position());
    }

    #[test]
    fn previews_start_hidden() {
        let mut driver = PassDriver::new(&water()).unwrap();
        assert_eq!(driver.passes().len(), 3);
        assert!(driver.toggle_previews());
        assert!(!driver.toggle_previews());
    }
}
