use crate::config::TwinkleMode;
use crate::resources::{ResourceId, ResourceKind, ResourceLedger};
use crate::windows::LightColor;

pub const MAX_OPACITY: f32 = 0.8;
pub const MAX_EMISSIVE: f32 = 1.5;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Glow {
    pub opacity: f32,
    pub emissive: f32,
}

/// Flicker for a light (or a colour slot) with phase index `phase` at `time` seconds.
///
/// The oscillation stays in `[0.4, 1.0]`, so opacity stays in `[0.32, 0.8]` and emissive
/// intensity in `[0.6, 1.5]`.
pub fn twinkle(time: f64, phase: usize) -> Glow {
    let wave = ((time * 2.0 + phase as f64 * 0.1).sin() * 0.3 + 0.7) as f32;
    Glow {
        opacity: (wave * MAX_OPACITY).clamp(0.0, MAX_OPACITY),
        emissive: (wave * MAX_EMISSIVE).clamp(0.0, MAX_EMISSIVE),
    }
}

/// Window-light materials, owned by the scene controller.
///
/// In [`TwinkleMode::SharedByColor`] there is exactly one material per [`LightColor`] and every
/// light of that colour reads it. In [`TwinkleMode::PerLight`] each light's glow is derived
/// from the time of the last update and its own index; the renderer evaluates the same curve
/// on the GPU.
#[derive(Clone, Debug)]
pub struct WindowMaterialPool {
    mode: TwinkleMode,
    time: f64,
    shared: [Glow; 2],
    shared_resources: Vec<ResourceId>,
}

impl WindowMaterialPool {
    pub fn new(mode: TwinkleMode, ledger: &mut ResourceLedger) -> Self {
        let shared_resources = match mode {
            TwinkleMode::SharedByColor => LightColor::ALL
                .iter()
                .map(|_| ledger.register(ResourceKind::Material, "shared window"))
                .collect(),
            TwinkleMode::PerLight => Vec::new(),
        };
        let mut pool = Self {
            mode,
            time: 0.0,
            shared: [twinkle(0.0, 0); 2],
            shared_resources,
        };
        pool.update(0.0);
        pool
    }

    pub fn update(&mut self, time: f64) {
        self.time = time;
        for color in LightColor::ALL {
            self.shared[color.slot()] = twinkle(time, color.slot());
        }
    }

    pub fn glow(&self, light_index: usize, color: LightColor) -> Glow {
        match self.mode {
            TwinkleMode::SharedByColor => self.shared[color.slot()],
            TwinkleMode::PerLight => twinkle(self.time, light_index),
        }
    }

    /// Time passed to the last [`update`](Self::update).
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Shared glow per colour, indexed by [`LightColor::slot`].
    pub fn shared(&self) -> &[Glow; 2] {
        &self.shared
    }

    pub fn shared_resources(&self) -> &[ResourceId] {
        &self.shared_resources
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Profile;
    use crate::generator::test::t_skyline;

    #[test]
    fn twinkle_stays_in_bounds() {
        let mut time = -1000.0;
        while time < 1000.0 {
            for phase in [0, 1, 17, 12_345] {
                let glow = twinkle(time, phase);
                assert!((0.0..=MAX_OPACITY).contains(&glow.opacity), "{glow:?}");
                assert!((0.0..=MAX_EMISSIVE).contains(&glow.emissive), "{glow:?}");
            }
            time += 0.37;
        }
        // Epoch-scale timestamps too.
        let glow = twinkle(1.7e9, 3);
        assert!((0.0..=MAX_OPACITY).contains(&glow.opacity));
    }

    #[test]
    fn shared_pool_moves_lights_of_a_color_together() {
        let (skyline, _) = t_skyline(Profile::Lean, 2);
        let mut ledger = ResourceLedger::new();
        let mut pool = WindowMaterialPool::new(TwinkleMode::SharedByColor, &mut ledger);
        assert_eq!(ledger.count_of(ResourceKind::Material), 2);

        pool.update(3.2);
        let expected = twinkle(3.2, LightColor::Warm.slot());
        for (idx, light) in skyline.windows.iter().enumerate() {
            if light.color == LightColor::Warm {
                assert_eq!(pool.glow(idx, light.color), expected);
            }
        }
    }

    #[test]
    fn per_light_pool_offsets_each_light() {
        let (skyline, _) = t_skyline(Profile::Detailed, 2);
        let mut ledger = ResourceLedger::new();
        let mut pool = WindowMaterialPool::new(TwinkleMode::PerLight, &mut ledger);
        assert!(pool.shared_resources().is_empty());
        pool.update(1.0);
        let a = pool.glow(0, skyline.windows[0].color);
        let b = pool.glow(10, skyline.windows[10].color);
        assert_ne!(a, b);
        assert_eq!(b, twinkle(1.0, 10));
    }

    #[test]
    fn per_light_glow_follows_latest_update() {
        let mut ledger = ResourceLedger::new();
        let mut pool = WindowMaterialPool::new(TwinkleMode::PerLight, &mut ledger);
        pool.update(5.5);
        assert_eq!(pool.time(), 5.5);
        for idx in [0, 1, 7, 4_000] {
            assert_eq!(pool.glow(idx, LightColor::White), twinkle(5.5, idx));
            assert_eq!(pool.glow(idx, LightColor::Warm), twinkle(5.5, idx));
        }
    }
}
