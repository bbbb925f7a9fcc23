use thiserror::Error;
use tracing::warn;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, HtmlCanvasElement, Window};

use skyline3d::{ScrollGeometry, SkylineConfig};

pub const CONTAINER_SELECTOR: &str = ".horizon-section";
pub const CANVAS_ID: &str = "horizon-canvas";
const CONFIG_ATTRIBUTE: &str = "data-skyline";

/// Host capabilities the skyline can't run without.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("No global window")]
    NoWindow,
    #[error("Window has no document")]
    NoDocument,
    #[error("WebGL2 is not available in this browser")]
    NoWebGl2,
}

pub fn window_and_document() -> Result<(Window, Document), HostError> {
    let window = web_sys::window().ok_or(HostError::NoWindow)?;
    let document = window.document().ok_or(HostError::NoDocument)?;
    Ok((window, document))
}

/// Checked once before anything is generated; there's no fallback renderer.
pub fn check_graphics(document: &Document) -> Result<(), HostError> {
    let probe = document
        .create_element("canvas")
        .ok()
        .and_then(|el| el.dyn_into::<HtmlCanvasElement>().ok())
        .ok_or(HostError::NoWebGl2)?;
    match probe.get_context("webgl2") {
        Ok(Some(_)) => Ok(()),
        _ => Err(HostError::NoWebGl2),
    }
}

/// Runs `f` now if the document is parsed, otherwise on `DOMContentLoaded`.
pub fn when_ready(document: &Document, f: impl FnOnce() + 'static) {
    if document.ready_state() != "loading" {
        f();
        return;
    }
    let callback = Closure::once(f);
    let _ = document
        .add_event_listener_with_callback("DOMContentLoaded", callback.as_ref().unchecked_ref());
    callback.forget();
}

pub fn read_config(canvas: &Element) -> SkylineConfig {
    let Some(raw) = canvas.get_attribute(CONFIG_ATTRIBUTE) else {
        return SkylineConfig::default();
    };
    SkylineConfig::from_json(&raw).unwrap_or_else(|err| {
        warn!(%err, "ignoring invalid skyline config");
        SkylineConfig::default()
    })
}

pub fn viewport_height(window: &Window) -> f64 {
    window
        .inner_height()
        .ok()
        .and_then(|h| h.as_f64())
        .unwrap_or(0.0)
}

pub fn scroll_geometry(window: &Window, container: &web_sys::HtmlElement) -> ScrollGeometry {
    let scroll_y = window.scroll_y().unwrap_or(0.0);
    ScrollGeometry {
        scroll_y,
        section_top: container.get_bounding_client_rect().top() + scroll_y,
        section_height: container.offset_height() as f64,
        viewport_height: viewport_height(window),
    }
}

/// CSS size of the container and the drawing-buffer size for it at the capped pixel ratio.
pub fn surface_size(
    window: &Window,
    container: &Element,
    max_pixel_ratio: f64,
) -> ((u32, u32), (u32, u32)) {
    let rect = container.get_bounding_client_rect();
    let ratio = window.device_pixel_ratio().min(max_pixel_ratio).max(1.0);
    let css = (rect.width().max(1.0) as u32, rect.height().max(1.0) as u32);
    let physical = (
        (rect.width() * ratio).round().max(1.0) as u32,
        (rect.height() * ratio).round().max(1.0) as u32,
    );
    (css, physical)
}
