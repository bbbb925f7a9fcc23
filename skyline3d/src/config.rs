use serde_derive::Deserialize;

use crate::SkylineError;

/// Which generation/update profile to run.
///
/// `Detailed` is the first version of the effect: more buildings, corner trim and ledges,
/// every light twinkling on its own phase. `Lean` trades those details for fewer draws and
/// less per-frame work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Detailed,
    #[default]
    Lean,
}

/// How window lights share their flicker state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TwinkleMode {
    /// Each light gets its own phase offset.
    PerLight,
    /// All lights of one colour share a single material and flicker in lock-step.
    SharedByColor,
}

/// Constants that differ between profiles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProfileParams {
    pub building_count: usize,
    pub spacing: f32,
    pub architectural_trim: bool,
    pub window_lit_probability: f32,
    pub window_floor_step: u32,
    pub twinkle_mode: TwinkleMode,
    /// Twinkle is recomputed on frames where `frame % twinkle_every == 0`.
    pub twinkle_every: u64,
    /// Building sway is recomputed on frames where `frame % sway_every == 0`.
    pub sway_every: u64,
    pub skip_when_hidden: bool,
    pub coalesce_scroll: bool,
    pub debounce_resize: bool,
}

impl Profile {
    pub fn params(self) -> ProfileParams {
        match self {
            Profile::Detailed => ProfileParams {
                building_count: 50,
                spacing: 30.0,
                architectural_trim: true,
                window_lit_probability: 0.75,
                window_floor_step: 1,
                twinkle_mode: TwinkleMode::PerLight,
                twinkle_every: 1,
                sway_every: 1,
                skip_when_hidden: false,
                coalesce_scroll: false,
                debounce_resize: false,
            },
            Profile::Lean => ProfileParams {
                building_count: 35,
                spacing: 42.0,
                architectural_trim: false,
                window_lit_probability: 0.4,
                window_floor_step: 2,
                twinkle_mode: TwinkleMode::SharedByColor,
                twinkle_every: 2,
                sway_every: 4,
                skip_when_hidden: true,
                coalesce_scroll: true,
                debounce_resize: true,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SkylineConfig {
    pub profile: Profile,
    /// Fixed seed for reproducible skylines. `None` draws from the thread RNG.
    pub seed: Option<u64>,
    pub resize_debounce_ms: u32,
    pub max_pixel_ratio: f64,
    pub exposure: f32,
}

impl Default for SkylineConfig {
    fn default() -> Self {
        Self {
            profile: Profile::default(),
            seed: None,
            resize_debounce_ms: 150,
            max_pixel_ratio: 2.0,
            exposure: 0.8,
        }
    }
}

impl SkylineConfig {
    pub fn from_json(json: &str) -> Result<Self, SkylineError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn params(&self) -> ProfileParams {
        self.profile.params()
    }
}
