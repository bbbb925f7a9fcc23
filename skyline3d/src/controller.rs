use glam::Mat4;
use rand::Rng;
use tracing::{debug, info};

use crate::camera::{CameraPose, CameraRig, view_projection};
use crate::config::{ProfileParams, SkylineConfig};
use crate::generator::Skyline;
use crate::resources::{ResourceId, ResourceKind, ResourceLedger};
use crate::scroll::{ScrollGeometry, parallax_offset, scroll_progress};
use crate::twinkle::WindowMaterialPool;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// What a frame callback has to do after [`SceneController::tick`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameUpdate {
    pub pose: CameraPose,
    /// The material pool was updated this frame.
    pub glow_dirty: bool,
    /// Building offsets or yaw changed since the last frame.
    pub buildings_dirty: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TeardownReport {
    pub released: usize,
}

/// Owns all mutable state of the effect. The frame loop and the DOM reactors share one of
/// these instead of module-level globals.
pub struct SceneController {
    params: ProfileParams,
    skyline: Skyline,
    materials: WindowMaterialPool,
    rig: CameraRig,
    ledger: ResourceLedger,
    renderer_handle: ResourceId,
    progress: f32,
    viewport: Viewport,
    frame: u64,
    visible: bool,
    parallax_dirty: bool,
    running: bool,
}

impl SceneController {
    pub fn new<R: Rng + ?Sized>(config: &SkylineConfig, rng: &mut R, viewport: Viewport) -> Self {
        let params = config.params();
        let mut ledger = ResourceLedger::new();
        let renderer_handle = ledger.register(ResourceKind::Renderer, "renderer");
        let skyline = Skyline::generate(&params, rng, &mut ledger);
        let materials = WindowMaterialPool::new(params.twinkle_mode, &mut ledger);
        info!(
            profile = ?config.profile,
            buildings = skyline.buildings.len(),
            windows = skyline.windows.len(),
            resources = ledger.len(),
            "skyline scene created"
        );
        Self {
            params,
            skyline,
            materials,
            rig: CameraRig::default(),
            ledger,
            renderer_handle,
            progress: 0.0,
            viewport,
            frame: 0,
            visible: true,
            parallax_dirty: true,
            running: true,
        }
    }

    pub fn on_scroll(&mut self, geometry: ScrollGeometry) {
        let progress = scroll_progress(geometry);
        self.progress = progress;
        self.rig.set_progress(progress);

        let total = self.skyline.buildings.len();
        for building in &mut self.skyline.buildings {
            building.offset = parallax_offset(building.index, total, progress);
        }
        self.parallax_dirty = true;
    }

    pub fn on_resize(&mut self, viewport: Viewport) {
        debug!(width = viewport.width, height = viewport.height, "viewport resized");
        self.viewport = viewport;
    }

    pub fn set_visible(&mut self, visible: bool) {
        if visible != self.visible {
            debug!(visible, "host visibility changed");
        }
        self.visible = visible;
    }

    /// Advances one display frame at `time` seconds. Returns `None` when the frame should be
    /// skipped entirely: after teardown, or while hidden in profiles that pause offscreen.
    pub fn tick(&mut self, time: f64) -> Option<FrameUpdate> {
        if !self.running || (self.params.skip_when_hidden && !self.visible) {
            return None;
        }

        self.rig.step();
        let mut buildings_dirty = std::mem::replace(&mut self.parallax_dirty, false);

        let glow_dirty = self.frame % self.params.twinkle_every == 0;
        if glow_dirty {
            self.materials.update(time);
        }
        if self.frame % self.params.sway_every == 0 {
            for building in &mut self.skyline.buildings {
                let sway = (time * 0.03 + building.index as f64 * 0.1).sin() * 0.3;
                building.yaw = (sway * 0.005) as f32;
            }
            buildings_dirty = true;
        }
        self.frame += 1;

        Some(FrameUpdate {
            pose: self.rig.pose(time),
            glow_dirty,
            buildings_dirty,
        })
    }

    pub fn view_projection(&self, pose: CameraPose) -> Mat4 {
        view_projection(pose, self.viewport.width, self.viewport.height)
    }

    /// Stops the frame loop and releases every generated handle. Safe to call more than
    /// once; later calls release nothing.
    pub fn teardown(&mut self) -> TeardownReport {
        self.running = false;
        let released = self.ledger.dispose_all();
        if released > 0 {
            info!(released, "skyline scene torn down");
        }
        TeardownReport { released }
    }

    pub fn skyline(&self) -> &Skyline {
        &self.skyline
    }

    pub fn materials(&self) -> &WindowMaterialPool {
        &self.materials
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    pub fn renderer_handle(&self) -> ResourceId {
        self.renderer_handle
    }

    pub fn rig(&self) -> &CameraRig {
        &self.rig
    }

    pub fn params(&self) -> &ProfileParams {
        &self.params
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
mod test {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::camera::{Phase, camera_target, look_ahead, phase_and_local_progress};
    use crate::config::Profile;

    fn t_controller(profile: Profile) -> SceneController {
        let config = SkylineConfig {
            profile,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(42);
        SceneController::new(
            &config,
            &mut rng,
            Viewport {
                width: 1280,
                height: 720,
            },
        )
    }

    fn geometry_for_progress(p: f64) -> ScrollGeometry {
        // into = scroll_y - 1000 + 800, section height 2000
        ScrollGeometry {
            scroll_y: p * 2000.0 + 200.0,
            section_top: 1000.0,
            section_height: 2000.0,
            viewport_height: 800.0,
        }
    }

    #[test]
    fn mid_tour_scroll_scenario() {
        let mut controller = t_controller(Profile::Lean);
        controller.on_scroll(geometry_for_progress(0.5));
        assert_eq!(controller.progress(), 0.5);
        assert_eq!(phase_and_local_progress(controller.progress()).0, Phase::Tour);
        assert_eq!(controller.rig().target(), camera_target(0.5));

        let buildings = &controller.skyline().buildings;
        assert_eq!(buildings.len(), 35);
        let first = buildings[0].offset;
        let last = buildings[34].offset;
        assert!(first.y < 0.0 && last.y > 0.0);
        assert_ne!(first, last);
    }

    #[test]
    fn camera_converges_on_target() {
        let mut controller = t_controller(Profile::Lean);
        controller.on_scroll(geometry_for_progress(0.5));
        let mut time = 0.0;
        for _ in 0..400 {
            controller.tick(time);
            time += 1.0 / 60.0;
        }
        let target = camera_target(0.5);
        assert!((controller.rig().position() - target).length() < 0.01);
        let aim = controller.rig().look_at() - look_ahead(target, 0.5);
        assert!(aim.length() < 0.01);
    }

    #[test]
    fn lean_profile_throttles_twinkle_and_sway() {
        let mut controller = t_controller(Profile::Lean);
        let first = controller.tick(0.0).unwrap();
        assert!(first.glow_dirty && first.buildings_dirty);
        // Frame 1: neither twinkle (every 2nd) nor sway (every 4th) runs.
        let second = controller.tick(0.016).unwrap();
        assert!(!second.glow_dirty && !second.buildings_dirty);
        assert_eq!(controller.materials().time(), 0.0);
        let third = controller.tick(0.032).unwrap();
        assert!(third.glow_dirty && !third.buildings_dirty);
        assert_eq!(controller.materials().time(), 0.032);
        controller.tick(0.048);
        assert!(controller.tick(0.064).unwrap().buildings_dirty);
    }

    #[test]
    fn detailed_profile_updates_every_frame() {
        let mut controller = t_controller(Profile::Detailed);
        for i in 0..5 {
            let update = controller.tick(i as f64 * 0.016).unwrap();
            assert!(update.glow_dirty && update.buildings_dirty);
        }
    }

    #[test]
    fn hidden_lean_scene_skips_frames() {
        let mut controller = t_controller(Profile::Lean);
        controller.set_visible(false);
        let before = *controller.rig();
        assert!(controller.tick(1.0).is_none());
        assert_eq!(*controller.rig(), before);
        controller.set_visible(true);
        assert!(controller.tick(1.0).is_some());

        let mut detailed = t_controller(Profile::Detailed);
        detailed.set_visible(false);
        assert!(detailed.tick(1.0).is_some());
    }

    #[test]
    fn scroll_marks_buildings_dirty_on_next_frame() {
        let mut controller = t_controller(Profile::Lean);
        controller.tick(0.0);
        assert!(!controller.tick(0.016).unwrap().buildings_dirty);
        controller.on_scroll(geometry_for_progress(0.4));
        assert!(controller.tick(0.032).unwrap().buildings_dirty);
        assert!(!controller.tick(0.048).unwrap().buildings_dirty);
    }

    #[test]
    fn sway_stays_subtle() {
        let mut controller = t_controller(Profile::Detailed);
        controller.tick(12.5);
        for b in &controller.skyline().buildings {
            assert!(b.yaw.abs() <= 0.3 * 0.005 + 1e-6);
        }
    }

    #[test]
    fn teardown_disposes_every_handle_once() {
        for profile in [Profile::Lean, Profile::Detailed] {
            let mut controller = t_controller(profile);
            let total = controller.ledger().len();
            assert_eq!(controller.teardown().released, total);
            assert_eq!(controller.teardown().released, 0);
            assert!(!controller.is_running());
            assert!(controller.tick(0.0).is_none());

            let ledger = controller.ledger();
            assert!(ledger.ids().all(|id| ledger.dispose_count(id) == 1));
            let skyline = controller.skyline();
            let renderer = controller.renderer_handle();
            let owned = skyline
                .buildings
                .iter()
                .flat_map(|b| b.resources.iter())
                .chain(skyline.windows.iter().flat_map(|w| w.resources.iter()))
                .chain(skyline.ground.resources.iter())
                .chain(controller.materials().shared_resources().iter())
                .chain(std::iter::once(&renderer));
            for id in owned {
                assert!(ledger.is_disposed(*id));
            }
        }
    }
}
