use std::f32::consts::PI;

use glam::{Mat4, Vec3};

pub const FOV_Y_DEGREES: f32 = 60.0;
pub const NEAR: f32 = 0.1;
pub const FAR: f32 = 2000.0;

pub const POSITION_SMOOTHING: f32 = 0.08;
pub const LOOK_AT_SMOOTHING: f32 = 0.1;

const APPROACH_END: f32 = 0.3;
const TOUR_END: f32 = 0.7;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Easing in toward the city and down.
    Approach,
    /// Sweeping a lateral curve while moving through the streets.
    Tour,
    /// Rising and pulling back over the skyline.
    Overview,
}

/// Picks the camera phase for scroll progress `p` (clamped to `[0, 1]`) and the progress
/// within that phase, normalized to `[0, 1]`.
pub fn phase_and_local_progress(p: f32) -> (Phase, f32) {
    let p = clamp_progress(p);
    if p < APPROACH_END {
        (Phase::Approach, p / APPROACH_END)
    } else if p < TOUR_END {
        (Phase::Tour, (p - APPROACH_END) / (TOUR_END - APPROACH_END))
    } else {
        (Phase::Overview, (p - TOUR_END) / (1.0 - TOUR_END))
    }
}

/// Clamps into `[0, 1]`; NaN maps to 0.
pub fn clamp_progress(p: f32) -> f32 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}

/// Where the camera wants to be at progress `p`.
///
/// The formulas are not continuous across phase boundaries (the Z target jumps by 50 at
/// p = 0.3 and the Y target by 15 at p = 0.7); frame smoothing hides the jump.
pub fn camera_target(p: f32) -> Vec3 {
    let (phase, t) = phase_and_local_progress(p);
    match phase {
        Phase::Approach => Vec3::new((t * PI).sin() * 40.0, 60.0 - t * 20.0, 250.0 - t * 100.0),
        Phase::Tour => {
            let curve_z = -50.0 + t * 100.0;
            Vec3::new(
                (t * PI * 2.0).sin() * 50.0,
                40.0 + (t * PI).sin() * 15.0,
                150.0 - curve_z,
            )
        }
        Phase::Overview => Vec3::new((t * PI).sin() * 30.0, 55.0 + t * 30.0, 50.0 - t * 50.0),
    }
}

/// Point slightly ahead of `target` along the direction of travel.
pub fn look_ahead(target: Vec3, p: f32) -> Vec3 {
    let p = clamp_progress(p);
    Vec3::new(
        target.x + (p * PI * 2.0).sin() * 20.0,
        target.y - 10.0,
        target.z - 50.0,
    )
}

/// Small drift applied on top of the smoothed position so the view never fully rests.
pub fn float_offset(time: f64) -> Vec3 {
    Vec3::new(
        ((time * 0.08).sin() * 2.0) as f32,
        ((time * 0.12).cos() * 1.5) as f32,
        0.0,
    )
}

/// Convex blend of `current` toward `target`.
pub fn approach(current: Vec3, target: Vec3, factor: f32) -> Vec3 {
    current + (target - current) * factor.clamp(0.0, 1.0)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPose {
    pub eye: Vec3,
    pub look_at: Vec3,
}

/// Scroll-driven camera: targets are set from scroll events, the smoothed values chase them
/// once per rendered frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraRig {
    target: Vec3,
    target_look_at: Vec3,
    position: Vec3,
    look_at: Vec3,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            target: Vec3::new(0.0, 50.0, 200.0),
            target_look_at: Vec3::new(0.0, 30.0, 0.0),
            position: Vec3::new(0.0, 50.0, 200.0),
            look_at: Vec3::new(0.0, 30.0, 0.0),
        }
    }
}

impl CameraRig {
    pub fn set_progress(&mut self, p: f32) {
        self.target = camera_target(p);
        self.target_look_at = look_ahead(self.target, p);
    }

    pub fn step(&mut self) {
        self.position = approach(self.position, self.target, POSITION_SMOOTHING);
        self.look_at = approach(self.look_at, self.target_look_at, LOOK_AT_SMOOTHING);
    }

    pub fn pose(&self, time: f64) -> CameraPose {
        CameraPose {
            eye: self.position + float_offset(time),
            look_at: self.look_at,
        }
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn look_at(&self) -> Vec3 {
        self.look_at
    }
}

pub fn view_projection(pose: CameraPose, width: u32, height: u32) -> Mat4 {
    let aspect = width.max(1) as f32 / height.max(1) as f32;
    let view = Mat4::look_at_rh(pose.eye, pose.look_at, Vec3::Y);
    let proj = Mat4::perspective_rh(FOV_Y_DEGREES.to_radians(), aspect, NEAR, FAR);
    proj * view
}
