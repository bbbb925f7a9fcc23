use glam::{Vec2, Vec3};
use rand::Rng;

use crate::config::ProfileParams;
use crate::resources::{ResourceId, ResourceKind, ResourceLedger};
use crate::windows::{self, WindowLight};

pub type Rgb = [f32; 3];

pub const FLOOR_HEIGHT: f32 = 8.0;
const CORNER_WIDTH: f32 = 0.8;
const LEDGE_EVERY: u32 = 3;

/// Converts an sRGB hex colour (as written in CSS) into linear RGB.
pub fn srgb_hex(hex: u32) -> Rgb {
    let channel = |shift: u32| {
        let c = ((hex >> shift) & 0xff) as f32 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    [channel(16), channel(8), channel(0)]
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorTier {
    White,
    LightGray,
    Accent,
}

impl ColorTier {
    /// Maps a uniform draw in `[0, 1)` onto a tier: `[0, 0.7)` white, `[0.7, 0.9)` light gray,
    /// `[0.9, 1)` accent.
    pub fn from_draw(draw: f32) -> Self {
        if draw < 0.7 {
            ColorTier::White
        } else if draw < 0.9 {
            ColorTier::LightGray
        } else {
            ColorTier::Accent
        }
    }

    pub fn hex(self) -> u32 {
        match self {
            ColorTier::White => 0xffffff,
            ColorTier::LightGray => 0xf5f5f5,
            ColorTier::Accent => 0xd70f26,
        }
    }

    pub fn color(self) -> Rgb {
        srgb_hex(self.hex())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrimKind {
    Corner,
    Ledge,
    Roof,
}

/// A decorative box attached to a building, in building-local coordinates (origin at the
/// centre of the footprint, on the ground).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Trim {
    pub kind: TrimKind,
    pub center: Vec3,
    pub size: Vec3,
    pub color: Rgb,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Building {
    pub index: usize,
    pub width: f32,
    pub height: f32,
    pub depth: f32,
    pub floors: u32,
    /// Ground-level position before parallax.
    pub base: Vec3,
    /// Scroll-driven parallax shift in the XZ plane (x, z).
    pub offset: Vec2,
    /// Current sway around the vertical axis, in radians.
    pub yaw: f32,
    pub tier: ColorTier,
    pub emissive: f32,
    pub trim: Vec<Trim>,
    pub resources: Vec<ResourceId>,
}

impl Building {
    pub fn position(&self) -> Vec3 {
        self.base + Vec3::new(self.offset.x, 0.0, self.offset.y)
    }

    pub fn half_extents(&self) -> Vec3 {
        Vec3::new(self.width * 0.5, self.height * 0.5, self.depth * 0.5)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Rgb,
    pub intensity: f32,
    pub range: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Atmosphere {
    pub background: Rgb,
    pub fog_density: f32,
    pub ambient: Rgb,
    pub ambient_intensity: f32,
    pub sun_position: Vec3,
    pub sun_intensity: f32,
    pub point_lights: Vec<PointLight>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Ground {
    pub size: f32,
    pub color: Rgb,
    /// Z coordinate of each road line.
    pub road_lines: Vec<f32>,
    pub line_width: f32,
    pub line_color: Rgb,
    pub line_opacity: f32,
    pub resources: Vec<ResourceId>,
}

/// Everything generated once at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct Skyline {
    pub buildings: Vec<Building>,
    pub windows: Vec<WindowLight>,
    pub ground: Ground,
    pub atmosphere: Atmosphere,
}

impl Skyline {
    pub fn generate<R: Rng + ?Sized>(
        params: &ProfileParams,
        rng: &mut R,
        ledger: &mut ResourceLedger,
    ) -> Self {
        let buildings = generate_buildings(params, rng, ledger);
        // Lights hang off buildings, so they're generated from the finished building list.
        let windows = windows::generate_windows(&buildings, params, rng, ledger);
        let ground = generate_ground(ledger);
        let atmosphere = generate_atmosphere(&buildings);
        tracing::debug!(
            buildings = buildings.len(),
            windows = windows.len(),
            point_lights = atmosphere.point_lights.len(),
            "skyline generated"
        );
        Self {
            buildings,
            windows,
            ground,
            atmosphere,
        }
    }
}

pub fn generate_buildings<R: Rng + ?Sized>(
    params: &ProfileParams,
    rng: &mut R,
    ledger: &mut ResourceLedger,
) -> Vec<Building> {
    let count = params.building_count;
    let start_x = -(count as f32 * params.spacing) / 2.0;

    (0..count)
        .map(|index| {
            let width = rng.gen_range(18.0f32..43.0);
            let depth = rng.gen_range(18.0f32..43.0);
            let height = rng.gen_range(40.0f32..180.0);
            let x = start_x + index as f32 * params.spacing + rng.gen_range(-7.5f32..7.5);
            let z = rng.gen_range(-75.0f32..75.0);
            let tier = ColorTier::from_draw(rng.gen::<f32>());
            let floors = (height / FLOOR_HEIGHT).floor() as u32;

            let mut resources = vec![
                ledger.register(ResourceKind::Geometry, "building body"),
                ledger.register(ResourceKind::Material, "building body"),
            ];
            let mut trim = Vec::new();

            if params.architectural_trim {
                // The four columns share one geometry and one material.
                resources.push(ledger.register(ResourceKind::Geometry, "corner column"));
                resources.push(ledger.register(ResourceKind::Material, "corner column"));
                let cx = width / 2.0 - CORNER_WIDTH / 2.0;
                let cz = depth / 2.0 - CORNER_WIDTH / 2.0;
                for (sx, sz) in [(1.0, 1.0), (-1.0, 1.0), (1.0, -1.0), (-1.0, -1.0)] {
                    trim.push(Trim {
                        kind: TrimKind::Corner,
                        center: Vec3::new(sx * cx, height / 2.0, sz * cz),
                        size: Vec3::new(CORNER_WIDTH, height, CORNER_WIDTH),
                        color: srgb_hex(0xcccccc),
                    });
                }

                for floor in (1..floors).step_by(LEDGE_EVERY as usize) {
                    resources.push(ledger.register(ResourceKind::Geometry, "ledge"));
                    resources.push(ledger.register(ResourceKind::Material, "ledge"));
                    trim.push(Trim {
                        kind: TrimKind::Ledge,
                        center: Vec3::new(0.0, floor as f32 * FLOOR_HEIGHT, 0.0),
                        size: Vec3::new(width + 0.5, 0.3, depth + 0.5),
                        color: srgb_hex(0xaaaaaa),
                    });
                }
            }

            resources.push(ledger.register(ResourceKind::Geometry, "roof"));
            resources.push(ledger.register(ResourceKind::Material, "roof"));
            trim.push(Trim {
                kind: TrimKind::Roof,
                center: Vec3::new(0.0, height + 1.0, 0.0),
                size: Vec3::new(width + 1.0, 2.0, depth + 1.0),
                color: srgb_hex(0x888888),
            });

            Building {
                index,
                width,
                height,
                depth,
                floors,
                base: Vec3::new(x, 0.0, z),
                offset: Vec2::ZERO,
                yaw: 0.0,
                tier,
                emissive: 0.05,
                trim,
                resources,
            }
        })
        .collect()
}

fn generate_ground(ledger: &mut ResourceLedger) -> Ground {
    let mut resources = vec![
        ledger.register(ResourceKind::Geometry, "ground"),
        ledger.register(ResourceKind::Material, "ground"),
    ];
    let road_lines: Vec<f32> = (-500..500).step_by(50).map(|z| z as f32).collect();
    for _ in &road_lines {
        resources.push(ledger.register(ResourceKind::Geometry, "road line"));
        resources.push(ledger.register(ResourceKind::Material, "road line"));
    }
    Ground {
        size: 2000.0,
        color: srgb_hex(0x1a1a1a),
        road_lines,
        line_width: 0.5,
        line_color: srgb_hex(0x333333),
        line_opacity: 0.3,
        resources,
    }
}

fn generate_atmosphere(buildings: &[Building]) -> Atmosphere {
    let point_lights = buildings
        .iter()
        .filter(|b| b.index % 5 == 0)
        .map(|b| PointLight {
            position: Vec3::new(b.base.x, b.height * 0.8, b.base.z),
            color: [1.0, 1.0, 1.0],
            intensity: 0.5,
            range: 100.0,
        })
        .collect();
    Atmosphere {
        background: srgb_hex(0x0a0a0a),
        fog_density: 0.0008,
        ambient: [1.0, 1.0, 1.0],
        ambient_intensity: 0.3,
        sun_position: Vec3::new(50.0, 150.0, 50.0),
        sun_intensity: 0.6,
        point_lights,
    }
}

#[cfg(test)]
pub(crate) mod test {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::config::Profile;

    pub fn t_skyline(profile: Profile, seed: u64) -> (Skyline, ResourceLedger) {
        let mut ledger = ResourceLedger::new();
        let mut rng = StdRng::seed_from_u64(seed);
        let skyline = Skyline::generate(&profile.params(), &mut rng, &mut ledger);
        (skyline, ledger)
    }

    #[test]
    fn color_thresholds() {
        assert_eq!(ColorTier::from_draw(0.0), ColorTier::White);
        assert_eq!(ColorTier::from_draw(0.69), ColorTier::White);
        assert_eq!(ColorTier::from_draw(0.7), ColorTier::LightGray);
        assert_eq!(ColorTier::from_draw(0.71), ColorTier::LightGray);
        assert_eq!(ColorTier::from_draw(0.9), ColorTier::Accent);
        assert_eq!(ColorTier::from_draw(0.95), ColorTier::Accent);
    }

    #[test]
    fn lean_building_count_and_dimensions() {
        for seed in 0..20 {
            let (skyline, _) = t_skyline(Profile::Lean, seed);
            assert_eq!(skyline.buildings.len(), 35);
            for b in &skyline.buildings {
                assert!((40.0..180.0).contains(&b.height), "height {}", b.height);
                assert!((18.0..43.0).contains(&b.width), "width {}", b.width);
                assert!((18.0..43.0).contains(&b.depth), "depth {}", b.depth);
            }
        }
    }

    #[test]
    fn detailed_profile_has_trim() {
        let (skyline, _) = t_skyline(Profile::Detailed, 3);
        assert_eq!(skyline.buildings.len(), 50);
        for b in &skyline.buildings {
            let corners = b.trim.iter().filter(|t| t.kind == TrimKind::Corner).count();
            let ledges = b.trim.iter().filter(|t| t.kind == TrimKind::Ledge).count();
            assert_eq!(corners, 4);
            assert_eq!(ledges, (1..b.floors).step_by(3).count());
            assert_eq!(b.trim.last().map(|t| t.kind), Some(TrimKind::Roof));
        }
    }

    #[test]
    fn lean_profile_only_has_roofs() {
        let (skyline, _) = t_skyline(Profile::Lean, 3);
        for b in &skyline.buildings {
            assert_eq!(b.trim.len(), 1);
            assert_eq!(b.trim[0].kind, TrimKind::Roof);
            assert_eq!(b.trim[0].center.y, b.height + 1.0);
        }
    }

    #[test]
    fn buildings_are_spaced_along_x() {
        let params = Profile::Lean.params();
        let (skyline, _) = t_skyline(Profile::Lean, 11);
        let start = -(params.building_count as f32 * params.spacing) / 2.0;
        for b in &skyline.buildings {
            let slot = start + b.index as f32 * params.spacing;
            assert!((b.base.x - slot).abs() <= 7.5);
            assert!((-75.0..75.0).contains(&b.base.z));
        }
    }

    #[test]
    fn every_fifth_building_gets_a_point_light() {
        let (skyline, _) = t_skyline(Profile::Lean, 5);
        assert_eq!(skyline.atmosphere.point_lights.len(), 7);
        let first = &skyline.buildings[0];
        assert_eq!(
            skyline.atmosphere.point_lights[0].position,
            Vec3::new(first.base.x, first.height * 0.8, first.base.z)
        );
    }

    #[test]
    fn road_lines_every_fifty_units() {
        let (skyline, _) = t_skyline(Profile::Lean, 0);
        assert_eq!(skyline.ground.road_lines.len(), 20);
        assert_eq!(skyline.ground.road_lines[0], -500.0);
        assert_eq!(skyline.ground.road_lines[19], 450.0);
    }

    #[test]
    fn srgb_white_and_black_are_exact() {
        assert_eq!(srgb_hex(0xffffff), [1.0, 1.0, 1.0]);
        assert_eq!(srgb_hex(0x000000), [0.0, 0.0, 0.0]);
    }
}
