use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::config::TwinkleMode;
use crate::generator::{Building, Ground, Rgb, Skyline};
use crate::twinkle::{MAX_EMISSIVE, MAX_OPACITY};
use crate::windows::{LightColor, WINDOW_HEIGHT, WINDOW_WIDTH, face_right};

/// `binding.x` for geometry that is already in world space.
pub const WORLD_SPACE: f32 = -1.0;
/// `binding.y` for surfaces whose material never changes.
pub const FIXED_GLOW: f32 = -1.0;
/// `binding.y` for windows that twinkle on their own phase (`binding.z`).
pub const PER_LIGHT_GLOW: f32 = 2.0;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 3],
    /// `[opacity, emissive intensity, lit]`. Surfaces with `lit == 0` ignore scene lights and
    /// are drawn at `color * emissive`.
    pub material: [f32; 3],
    /// `[building slot, glow slot, twinkle phase]`. Positions of building geometry are local
    /// to the building and placed by its slot in the building uniforms. A glow slot of 0 or 1
    /// reads the shared glow for that [`LightColor::slot`].
    pub binding: [f32; 3],
}

impl Vertex {
    pub(crate) const ATTRIBS: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x3,
        3 => Float32x3,
        4 => Float32x3
    ];

    pub(crate) fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Surface {
    color: Rgb,
    opacity: f32,
    emissive: f32,
    lit: bool,
    glow: f32,
    phase: f32,
}

impl Surface {
    fn lit(color: Rgb, emissive: f32) -> Self {
        Self {
            color,
            opacity: 1.0,
            emissive,
            lit: true,
            glow: FIXED_GLOW,
            phase: 0.0,
        }
    }

    fn unlit(color: Rgb, opacity: f32, emissive: f32) -> Self {
        Self {
            color,
            opacity,
            emissive,
            lit: false,
            glow: FIXED_GLOW,
            phase: 0.0,
        }
    }

    fn window(color: LightColor, mode: TwinkleMode, index: usize) -> Self {
        let glow = match mode {
            TwinkleMode::SharedByColor => color.slot() as f32,
            TwinkleMode::PerLight => PER_LIGHT_GLOW,
        };
        Self {
            glow,
            phase: index as f32,
            ..Self::unlit(color.color(), MAX_OPACITY, MAX_EMISSIVE)
        }
    }

    fn material(&self) -> [f32; 3] {
        [self.opacity, self.emissive, if self.lit { 1.0 } else { 0.0 }]
    }
}

/// Triangle soup for the whole skyline.
///
/// Nothing that changes per frame is baked in: building placement, sway and window glow all
/// come from uniforms, so the buffers are uploaded once.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneMesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl SceneMesh {
    pub fn build(skyline: &Skyline, mode: TwinkleMode) -> Self {
        let mut mesh = SceneMesh::default();
        mesh.append_ground(&skyline.ground);
        for building in &skyline.buildings {
            mesh.append_building(building);
        }
        // Transparent windows go last so they blend over the opaque geometry behind them.
        for (idx, light) in skyline.windows.iter().enumerate() {
            mesh.push_quad(
                light.building as f32,
                light.center,
                light.normal,
                Vec3::Y,
                WINDOW_WIDTH / 2.0,
                WINDOW_HEIGHT / 2.0,
                Surface::window(light.color, mode, idx),
            );
        }
        mesh
    }

    fn append_ground(&mut self, ground: &Ground) {
        let half = ground.size / 2.0;
        self.push_quad(
            WORLD_SPACE,
            Vec3::ZERO,
            Vec3::Y,
            Vec3::NEG_Z,
            half,
            half,
            Surface::lit(ground.color, 0.0),
        );
        for z in &ground.road_lines {
            self.push_quad(
                WORLD_SPACE,
                Vec3::new(0.0, 0.1, *z),
                Vec3::Y,
                Vec3::NEG_Z,
                half,
                ground.line_width / 2.0,
                Surface::unlit(ground.line_color, ground.line_opacity, 1.0),
            );
        }
    }

    fn append_building(&mut self, building: &Building) {
        let slot = building.index as f32;
        self.append_box(
            slot,
            Vec3::new(0.0, building.height / 2.0, 0.0),
            building.half_extents(),
            Surface::lit(building.tier.color(), building.emissive),
        );
        for trim in &building.trim {
            self.append_box(slot, trim.center, trim.size / 2.0, Surface::lit(trim.color, 0.0));
        }
    }

    fn append_box(&mut self, slot: f32, center: Vec3, half: Vec3, surface: Surface) {
        for normal in [Vec3::X, Vec3::NEG_X, Vec3::Z, Vec3::NEG_Z] {
            let right = face_right(normal);
            let across = right.abs().dot(half);
            let offset = normal.abs().dot(half);
            self.push_quad(
                slot,
                center + normal * offset,
                normal,
                Vec3::Y,
                across,
                half.y,
                surface,
            );
        }
        self.push_quad(
            slot,
            center + Vec3::Y * half.y,
            Vec3::Y,
            Vec3::NEG_Z,
            half.x,
            half.z,
            surface,
        );
        self.push_quad(
            slot,
            center - Vec3::Y * half.y,
            Vec3::NEG_Y,
            Vec3::Z,
            half.x,
            half.z,
            surface,
        );
    }

    /// Pushes a rectangle facing `normal`, wound counter-clockwise when seen from that side.
    #[allow(clippy::too_many_arguments)]
    fn push_quad(
        &mut self,
        slot: f32,
        center: Vec3,
        normal: Vec3,
        up: Vec3,
        half_width: f32,
        half_height: f32,
        surface: Surface,
    ) {
        let right = up.cross(normal);
        let corners = [
            center - right * half_width - up * half_height,
            center + right * half_width - up * half_height,
            center + right * half_width + up * half_height,
            center - right * half_width + up * half_height,
        ];
        let base = self.vertices.len() as u32;
        for corner in corners {
            self.vertices.push(Vertex {
                position: corner.to_array(),
                normal: normal.to_array(),
                color: surface.color,
                material: surface.material(),
                binding: [slot, surface.glow, surface.phase],
            });
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Profile;
    use crate::generator::test::t_skyline;

    fn t_mesh(profile: Profile) -> (Skyline, SceneMesh) {
        let (skyline, _) = t_skyline(profile, 8);
        let mesh = SceneMesh::build(&skyline, profile.params().twinkle_mode);
        (skyline, mesh)
    }

    fn window_vertices<'a>(skyline: &Skyline, mesh: &'a SceneMesh) -> &'a [Vertex] {
        let first = mesh.vertices.len() - skyline.windows.len() * 4;
        &mesh.vertices[first..]
    }

    #[test]
    fn quad_counts_match_generated_objects() {
        let (skyline, mesh) = t_mesh(Profile::Detailed);
        let boxes: usize = skyline.buildings.iter().map(|b| 1 + b.trim.len()).sum();
        let quads = 1 + skyline.ground.road_lines.len() + boxes * 6 + skyline.windows.len();
        assert_eq!(mesh.vertices.len(), quads * 4);
        assert_eq!(mesh.indices.len(), quads * 6);
        assert!(mesh.indices.iter().all(|i| (*i as usize) < mesh.vertices.len()));
    }

    #[test]
    fn quads_wind_toward_their_normal() {
        let (_, mesh) = t_mesh(Profile::Lean);
        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| mesh.vertices[i as usize]);
            let pa = Vec3::from_array(a.position);
            let face = (Vec3::from_array(b.position) - pa).cross(Vec3::from_array(c.position) - pa);
            assert!(face.dot(Vec3::from_array(a.normal)) > 0.0);
        }
    }

    #[test]
    fn mesh_ignores_per_frame_state() {
        let (mut skyline, mesh) = t_mesh(Profile::Lean);
        for b in &mut skyline.buildings {
            b.yaw = 0.001;
            b.offset = glam::Vec2::new(1.0, -2.0);
        }
        let moved = SceneMesh::build(&skyline, TwinkleMode::SharedByColor);
        assert_eq!(moved, mesh);
    }

    #[test]
    fn ground_is_world_space_and_buildings_use_their_slot() {
        let (skyline, mesh) = t_mesh(Profile::Lean);
        let ground_quads = 1 + skyline.ground.road_lines.len();
        let (ground, rest) = mesh.vertices.split_at(ground_quads * 4);
        assert!(ground.iter().all(|v| v.binding[0] == WORLD_SPACE));
        assert!(ground.iter().all(|v| v.binding[1] == FIXED_GLOW));

        let building_vertices = &rest[..rest.len() - skyline.windows.len() * 4];
        let mut quads = building_vertices.chunks(4 * 6);
        for building in &skyline.buildings {
            let body = quads.next().unwrap();
            assert!(body.iter().all(|v| v.binding[0] == building.index as f32));
            for _ in &building.trim {
                quads.next().unwrap();
            }
        }
    }

    #[test]
    fn lean_windows_read_their_color_slot() {
        let (skyline, mesh) = t_mesh(Profile::Lean);
        let windows = window_vertices(&skyline, &mesh);
        for (light, quad) in skyline.windows.iter().zip(windows.chunks(4)) {
            for v in quad {
                assert_eq!(v.binding[0], light.building as f32);
                assert_eq!(v.binding[1], light.color.slot() as f32);
                assert_eq!(v.material[2], 0.0);
            }
        }
    }

    #[test]
    fn detailed_windows_carry_their_own_phase() {
        let (skyline, mesh) = t_mesh(Profile::Detailed);
        let windows = window_vertices(&skyline, &mesh);
        for (idx, quad) in windows.chunks(4).enumerate() {
            assert!(quad.iter().all(|v| v.binding[1] == PER_LIGHT_GLOW));
            assert!(quad.iter().all(|v| v.binding[2] == idx as f32));
        }
    }
}
