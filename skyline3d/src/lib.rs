//! Procedural city skyline for the horizon landing-page effect: generation, the
//! scroll-driven camera path, window twinkle and a `wgpu` renderer. Nothing in here touches
//! the DOM; the `horizon` crate feeds it scroll/resize/visibility signals.

pub mod camera;
pub mod config;
pub mod controller;
pub mod error;
pub mod generator;
pub mod mesh;
pub mod resources;
pub mod scroll;
pub mod twinkle;
pub mod wgpu;
pub mod windows;

pub use camera::{CameraPose, CameraRig, Phase, phase_and_local_progress};
pub use config::{Profile, ProfileParams, SkylineConfig, TwinkleMode};
pub use controller::{FrameUpdate, SceneController, TeardownReport, Viewport};
pub use error::SkylineError;
pub use generator::{Building, ColorTier, Skyline};
pub use mesh::SceneMesh;
pub use scroll::{ScrollGate, ScrollGeometry, parallax_offset, scroll_progress};
pub use windows::{LightColor, WindowLight};
