//! Mounts the skyline into `#horizon-canvas` and keeps it in step with the page.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Context, anyhow};
use gloo_timers::callback::Timeout;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    Document, Event, HtmlCanvasElement, HtmlElement, IntersectionObserver,
    IntersectionObserverEntry, Window,
};

use skyline3d::wgpu::{GpuContext, SceneRenderer};
use skyline3d::{SceneController, SceneMesh, ScrollGate, SkylineConfig, Viewport};

use crate::host;

struct Effect {
    window: Window,
    container: HtmlElement,
    canvas: HtmlCanvasElement,
    config: SkylineConfig,
    controller: SceneController,
    gpu: GpuContext,
    renderer: SceneRenderer,
    scroll_gate: ScrollGate,
    animation: Option<i32>,
    resize_timer: Option<Timeout>,
    observer: Option<IntersectionObserver>,
}

type Shared = Rc<RefCell<Effect>>;

impl Effect {
    fn frame(&mut self, time: f64) {
        let Some(update) = self.controller.tick(time) else {
            return;
        };
        self.renderer
            .update_frame(&self.gpu.queue, &self.controller, &update, self.config.exposure);
        if let Err(err) = self.gpu.present(&self.renderer) {
            warn!(%err, "dropped skyline frame");
        }
    }

    fn apply_scroll(&mut self) {
        let geometry = host::scroll_geometry(&self.window, &self.container);
        self.controller.on_scroll(geometry);
    }

    fn apply_resize(&mut self) {
        let (css, physical) =
            host::surface_size(&self.window, &self.container, self.config.max_pixel_ratio);
        let (width, height) = self.gpu.resize(physical.0, physical.1);
        self.canvas.set_width(width);
        self.canvas.set_height(height);
        self.renderer.resize(&self.gpu.device, &self.gpu.config);
        self.controller.on_resize(Viewport {
            width: css.0,
            height: css.1,
        });
        self.apply_scroll();
    }

    fn teardown(&mut self) {
        if let Some(id) = self.animation.take() {
            let _ = self.window.cancel_animation_frame(id);
        }
        // Dropping a pending timeout cancels it.
        self.resize_timer.take();
        if let Some(observer) = self.observer.take() {
            observer.disconnect();
        }
        if self.controller.teardown().released > 0 {
            self.renderer.destroy();
        }
    }
}

/// Builds the scene and starts the frame loop. Pages without the canvas are left alone.
pub async fn mount(window: Window, document: Document) -> anyhow::Result<()> {
    let container = document
        .query_selector(host::CONTAINER_SELECTOR)
        .map_err(|err| anyhow!("{err:?}"))?
        .and_then(|el| el.dyn_into::<HtmlElement>().ok());
    let canvas = document
        .get_element_by_id(host::CANVAS_ID)
        .and_then(|el| el.dyn_into::<HtmlCanvasElement>().ok());
    let (Some(container), Some(canvas)) = (container, canvas) else {
        debug!("no skyline canvas on this page");
        return Ok(());
    };

    let config = host::read_config(&canvas);
    let (css, physical) = host::surface_size(&window, &container, config.max_pixel_ratio);
    canvas.set_width(physical.0);
    canvas.set_height(physical.1);

    let viewport = Viewport {
        width: css.0,
        height: css.1,
    };
    let controller = match config.seed {
        Some(seed) => SceneController::new(&config, &mut StdRng::seed_from_u64(seed), viewport),
        None => SceneController::new(&config, &mut rand::thread_rng(), viewport),
    };

    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::GL,
        ..Default::default()
    });
    let surface = instance
        .create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone()))
        .context("creating canvas surface")?;
    let gpu = GpuContext::connect(&instance, surface, physical.0, physical.1).await?;
    let mesh = SceneMesh::build(controller.skyline(), controller.params().twinkle_mode);
    let renderer = SceneRenderer::new(&gpu.device, &gpu.config, &mesh, &controller);
    info!(
        vertices = mesh.vertices.len(),
        width = gpu.config.width,
        height = gpu.config.height,
        format = ?gpu.config.format,
        "skyline renderer ready"
    );

    let effect = Rc::new(RefCell::new(Effect {
        window: window.clone(),
        container: container.clone(),
        canvas,
        config,
        controller,
        gpu,
        renderer,
        scroll_gate: ScrollGate::default(),
        animation: None,
        resize_timer: None,
        observer: None,
    }));
    effect.borrow_mut().apply_scroll();

    listen_scroll(&window, &effect);
    listen_resize(&window, &effect);
    observe_visibility(&container, &effect);
    listen_unload(&window, &effect);
    start_loop(&window, effect);
    Ok(())
}

fn listen(target: &web_sys::EventTarget, event: &str, handler: Closure<dyn FnMut(Event)>) {
    let _ = target.add_event_listener_with_callback(event, handler.as_ref().unchecked_ref());
    handler.forget();
}

fn start_loop(window: &Window, effect: Shared) {
    let slot: Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>> = Rc::new(RefCell::new(None));
    let next = slot.clone();
    let win = window.clone();
    let fx = effect.clone();
    *slot.borrow_mut() = Some(Closure::new(move |timestamp: f64| {
        let mut fx = fx.borrow_mut();
        if !fx.controller.is_running() {
            let _ = next.borrow_mut().take();
            return;
        }
        fx.frame(timestamp / 1000.0);
        if let Some(callback) = next.borrow().as_ref() {
            fx.animation = win
                .request_animation_frame(callback.as_ref().unchecked_ref())
                .ok();
        }
    }));
    if let Some(callback) = slot.borrow().as_ref() {
        effect.borrow_mut().animation = window
            .request_animation_frame(callback.as_ref().unchecked_ref())
            .ok();
    }
}

fn listen_scroll(window: &Window, effect: &Shared) {
    let fx = effect.clone();
    let win = window.clone();
    let on_scroll = move |_: Event| {
        let mut effect = fx.borrow_mut();
        if !effect.controller.params().coalesce_scroll {
            effect.apply_scroll();
            return;
        }
        if !effect.scroll_gate.request() {
            return;
        }
        let fx = fx.clone();
        let callback = Closure::once_into_js(move |_: f64| {
            let mut effect = fx.borrow_mut();
            if effect.scroll_gate.take() {
                effect.apply_scroll();
            }
        });
        if win
            .request_animation_frame(callback.unchecked_ref())
            .is_err()
        {
            effect.scroll_gate.take();
        }
    };
    listen(window, "scroll", Closure::new(on_scroll));
}

fn listen_resize(window: &Window, effect: &Shared) {
    let fx = effect.clone();
    let on_resize = move |_: Event| {
        let mut effect = fx.borrow_mut();
        if !effect.controller.params().debounce_resize {
            effect.apply_resize();
            return;
        }
        let delay = effect.config.resize_debounce_ms;
        let target = fx.clone();
        // Replacing the timer drops, and so cancels, the previous one.
        effect.resize_timer = Some(Timeout::new(delay, move || {
            let mut effect = target.borrow_mut();
            effect.resize_timer = None;
            effect.apply_resize();
        }));
    };
    listen(window, "resize", Closure::new(on_resize));
}

fn observe_visibility(container: &HtmlElement, effect: &Shared) {
    let fx = effect.clone();
    let callback = Closure::<dyn FnMut(js_sys::Array, IntersectionObserver)>::new(
        move |entries: js_sys::Array, _: IntersectionObserver| {
            let visible = entries
                .iter()
                .filter_map(|entry| entry.dyn_into::<IntersectionObserverEntry>().ok())
                .last()
                .map(|entry| entry.is_intersecting());
            if let Some(visible) = visible {
                fx.borrow_mut().controller.set_visible(visible);
            }
        },
    );
    match IntersectionObserver::new(callback.as_ref().unchecked_ref()) {
        Ok(observer) => {
            observer.observe(container);
            effect.borrow_mut().observer = Some(observer);
            callback.forget();
        }
        Err(err) => warn!(?err, "visibility tracking unavailable"),
    }
}

fn listen_unload(window: &Window, effect: &Shared) {
    let fx = effect.clone();
    listen(
        window,
        "beforeunload",
        Closure::new(move |_: Event| fx.borrow_mut().teardown()),
    );
}
