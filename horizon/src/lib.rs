//! Browser entry point for the horizon landing page: the skyline canvas, the intro reveal and
//! the site header/menu behaviour. The page logic that doesn't need a DOM lives in [`nav`] and
//! [`reveal`] so it can be tested natively.

pub mod nav;
pub mod reveal;

#[cfg(target_arch = "wasm32")]
mod effect;
#[cfg(target_arch = "wasm32")]
mod host;
#[cfg(target_arch = "wasm32")]
mod logging;

#[cfg(target_arch = "wasm32")]
mod entry {
    use std::panic;

    use tracing::error;
    use wasm_bindgen::prelude::*;

    use crate::{effect, host, logging, nav, reveal};

    #[wasm_bindgen(start)]
    fn start() {
        panic::set_hook(Box::new(console_error_panic_hook::hook));
        logging::init();

        let (window, document) = match host::window_and_document() {
            Ok(pair) => pair,
            Err(err) => {
                error!(%err, "horizon cannot start");
                return;
            }
        };
        let ready_document = document.clone();
        host::when_ready(&document, move || run(window, ready_document));
    }

    fn run(window: web_sys::Window, document: web_sys::Document) {
        nav::install(&window, &document);

        let Some(container) = document
            .query_selector(host::CONTAINER_SELECTOR)
            .ok()
            .flatten()
        else {
            return;
        };
        reveal::install(&window, &document, &container);

        if let Err(err) = host::check_graphics(&document) {
            error!(%err, "skyline disabled");
            return;
        }
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(err) = effect::mount(window, document).await {
                error!(?err, "failed to mount skyline");
            }
        });
    }
}
