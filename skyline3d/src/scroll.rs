use std::f32::consts::PI;

use glam::Vec2;

/// What the page reports on each scroll or resize event, in CSS pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollGeometry {
    pub scroll_y: f64,
    pub section_top: f64,
    pub section_height: f64,
    pub viewport_height: f64,
}

/// How far the viewport has scrolled through the host section: 0 when the section's top
/// enters from below, 1 once its bottom reaches the bottom of the viewport.
pub fn scroll_progress(geometry: ScrollGeometry) -> f32 {
    let into = geometry.scroll_y - geometry.section_top + geometry.viewport_height;
    if !(geometry.section_height > 0.0) {
        // Degenerate section: a step instead of a divide by zero.
        return if into > 0.0 { 1.0 } else { 0.0 };
    }
    let progress = (into / geometry.section_height).clamp(0.0, 1.0);
    if progress.is_nan() { 0.0 } else { progress as f32 }
}

/// Horizontal (x) and depth (z) shift for building `index` of `total` at progress `p`.
/// Buildings left of centre move opposite to buildings right of centre.
pub fn parallax_offset(index: usize, total: usize, p: f32) -> Vec2 {
    let factor = (index as f32 / total.max(1) as f32 - 0.5) * 0.3;
    Vec2::new((p * PI * 2.0).sin() * factor * 20.0, p * factor * 30.0)
}

/// Coalesces bursts of scroll events into at most one update per display frame.
///
/// `request` returns `true` only for the first event since the last `take`, meaning the
/// caller must schedule a frame callback; that callback calls `take` and does the work.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScrollGate {
    pending: bool,
}

impl ScrollGate {
    pub fn request(&mut self) -> bool {
        if self.pending {
            false
        } else {
            self.pending = true;
            true
        }
    }

    pub fn take(&mut self) -> bool {
        std::mem::replace(&mut self.pending, false)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn geometry(scroll_y: f64) -> ScrollGeometry {
        ScrollGeometry {
            scroll_y,
            section_top: 900.0,
            section_height: 1600.0,
            viewport_height: 800.0,
        }
    }

    #[test]
    fn progress_is_monotone_and_clamped() {
        let mut last = 0.0;
        for step in -200..600 {
            let p = scroll_progress(geometry(step as f64 * 10.0));
            assert!((0.0..=1.0).contains(&p));
            assert!(p >= last, "progress went backwards at {step}");
            last = p;
        }
        assert_eq!(scroll_progress(geometry(-10_000.0)), 0.0);
        assert_eq!(scroll_progress(geometry(1.0e7)), 1.0);
    }

    #[test]
    fn progress_midpoint() {
        // into = 900 - 900 + 800 = 800 of 1600
        assert_eq!(scroll_progress(geometry(900.0)), 0.5);
    }

    #[test]
    fn zero_height_section_does_not_nan() {
        let mut g = geometry(0.0);
        g.section_height = 0.0;
        assert_eq!(scroll_progress(g), 0.0);
        g.scroll_y = 5000.0;
        assert_eq!(scroll_progress(g), 1.0);
    }

    #[test]
    fn parallax_flips_across_the_row() {
        let first = parallax_offset(0, 35, 0.5);
        let last = parallax_offset(34, 35, 0.5);
        assert!(first.y < 0.0 && last.y > 0.0);
        assert!((first.y + 2.25).abs() < 1e-4);
        assert_ne!(first.y.abs(), last.y.abs());
        assert_eq!(parallax_offset(7, 35, 0.0), Vec2::ZERO);
    }

    #[test]
    fn gate_coalesces_bursts() {
        let mut gate = ScrollGate::default();
        assert!(gate.request());
        assert!(!gate.request());
        assert!(!gate.request());
        assert!(gate.take());
        assert!(!gate.take());
        assert!(gate.request());
    }
}
