use glam::Vec3;
use rand::Rng;

use crate::config::{ProfileParams, TwinkleMode};
use crate::generator::{Building, FLOOR_HEIGHT, Rgb, srgb_hex};
use crate::resources::{ResourceId, ResourceKind, ResourceLedger};

pub const WINDOW_WIDTH: f32 = 3.0;
pub const WINDOW_HEIGHT: f32 = 4.0;
const SLOT_WIDTH: f32 = 5.0;
const FACE_OFFSET: f32 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LightColor {
    White,
    Warm,
}

impl LightColor {
    pub const ALL: [LightColor; 2] = [LightColor::White, LightColor::Warm];

    /// Warm-yellow above 0.75, white otherwise.
    pub fn from_draw(draw: f32) -> Self {
        if draw > 0.75 {
            LightColor::Warm
        } else {
            LightColor::White
        }
    }

    pub fn slot(self) -> usize {
        match self {
            LightColor::White => 0,
            LightColor::Warm => 1,
        }
    }

    pub fn color(self) -> Rgb {
        match self {
            LightColor::White => srgb_hex(0xffffff),
            LightColor::Warm => srgb_hex(0xffaa00),
        }
    }
}

/// A lit window, in the owning building's local space. Brightness is not stored here; it
/// comes from the material pool.
#[derive(Clone, Debug, PartialEq)]
pub struct WindowLight {
    pub building: usize,
    pub center: Vec3,
    pub normal: Vec3,
    pub color: LightColor,
    pub resources: Vec<ResourceId>,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Face {
    pub(crate) normal: Vec3,
    /// Distance from the building axis to the face.
    pub(crate) half_thickness: f32,
    /// Width of the face along its horizontal axis.
    pub(crate) span: f32,
}

pub(crate) fn faces(building: &Building) -> [Face; 4] {
    [
        Face {
            normal: Vec3::X,
            half_thickness: building.width / 2.0,
            span: building.depth,
        },
        Face {
            normal: Vec3::NEG_X,
            half_thickness: building.width / 2.0,
            span: building.depth,
        },
        Face {
            normal: Vec3::Z,
            half_thickness: building.depth / 2.0,
            span: building.width,
        },
        Face {
            normal: Vec3::NEG_Z,
            half_thickness: building.depth / 2.0,
            span: building.width,
        },
    ]
}

/// Horizontal axis of a vertical face such that `right x up == normal`.
pub(crate) fn face_right(normal: Vec3) -> Vec3 {
    Vec3::Y.cross(normal)
}

/// Height of the middle of `floor`; window slots are centred on it.
fn floor_center(floor: u32) -> f32 {
    floor as f32 * FLOOR_HEIGHT + FLOOR_HEIGHT / 2.0
}

pub fn generate_windows<R: Rng + ?Sized>(
    buildings: &[Building],
    params: &ProfileParams,
    rng: &mut R,
    ledger: &mut ResourceLedger,
) -> Vec<WindowLight> {
    let shared_geometry = match params.twinkle_mode {
        TwinkleMode::SharedByColor => {
            Some(ledger.register(ResourceKind::Geometry, "window plane"))
        }
        TwinkleMode::PerLight => None,
    };

    let mut lights = Vec::new();
    for building in buildings {
        for face in faces(building) {
            let slots = (face.span / SLOT_WIDTH).floor() as u32;
            let right = face_right(face.normal);
            for floor in (1..building.floors).step_by(params.window_floor_step as usize) {
                for slot in 0..slots {
                    if rng.gen::<f32>() >= params.window_lit_probability {
                        continue;
                    }
                    let color = LightColor::from_draw(rng.gen::<f32>());
                    let along = ((slot as f32 + 0.5) / slots as f32 - 0.5) * face.span;
                    let center = face.normal * (face.half_thickness + FACE_OFFSET)
                        + right * along
                        + Vec3::Y * floor_center(floor);

                    let resources = match shared_geometry {
                        // Materials for shared lights belong to the pool.
                        Some(_) => Vec::new(),
                        None => vec![
                            ledger.register(ResourceKind::Geometry, "window plane"),
                            ledger.register(ResourceKind::Material, "window"),
                        ],
                    };
                    lights.push(WindowLight {
                        building: building.index,
                        center,
                        normal: face.normal,
                        color,
                        resources,
                    });
                }
            }
        }
    }
    lights
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Profile;
    use crate::generator::test::t_skyline;

    #[test]
    fn light_color_threshold() {
        assert_eq!(LightColor::from_draw(0.5), LightColor::White);
        assert_eq!(LightColor::from_draw(0.75), LightColor::White);
        assert_eq!(LightColor::from_draw(0.76), LightColor::Warm);
    }

    #[test]
    fn windows_sit_on_their_building_faces() {
        let (skyline, _) = t_skyline(Profile::Detailed, 9);
        assert!(!skyline.windows.is_empty());
        for light in &skyline.windows {
            let b = &skyline.buildings[light.building];
            let half = b.half_extents();
            let along_normal = light.center.dot(light.normal);
            let expected = if light.normal.x != 0.0 { half.x } else { half.z };
            assert!((along_normal - (expected + 0.1)).abs() < 1e-4);

            let lateral = light.center.dot(face_right(light.normal)).abs();
            let lateral_limit = if light.normal.x != 0.0 { half.z } else { half.x };
            assert!(lateral + WINDOW_WIDTH / 2.0 <= lateral_limit + 1e-3);

            assert!(light.center.y + WINDOW_HEIGHT / 2.0 <= b.height);
            assert!(light.center.y >= FLOOR_HEIGHT);
        }
    }

    #[test]
    fn lean_windows_use_every_second_floor() {
        let (skyline, _) = t_skyline(Profile::Lean, 4);
        for light in &skyline.windows {
            let floor = (light.center.y / FLOOR_HEIGHT).floor() as u32;
            assert_eq!(light.center.y, floor_center(floor));
            assert_eq!(light.center.y % FLOOR_HEIGHT, FLOOR_HEIGHT / 2.0);
            assert_eq!(floor % 2, 1, "window on floor {floor}");
            assert!(light.resources.is_empty());
        }
    }

    #[test]
    fn lit_fraction_tracks_probability() {
        let (skyline, _) = t_skyline(Profile::Detailed, 21);
        let slots: u32 = skyline
            .buildings
            .iter()
            .map(|b| {
                faces(b)
                    .iter()
                    .map(|f| (f.span / SLOT_WIDTH).floor() as u32 * b.floors.saturating_sub(1))
                    .sum::<u32>()
            })
            .sum();
        let lit = skyline.windows.len() as f32 / slots as f32;
        assert!((0.7..0.8).contains(&lit), "lit fraction {lit}");

        let warm = skyline
            .windows
            .iter()
            .filter(|l| l.color == LightColor::Warm)
            .count() as f32
            / skyline.windows.len() as f32;
        assert!((0.2..0.3).contains(&warm), "warm fraction {warm}");
    }
}
