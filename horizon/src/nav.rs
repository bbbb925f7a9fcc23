//! Site header and mobile menu.

pub const SCROLLED_THRESHOLD: f64 = 30.0;

pub const HEADER_SELECTOR: &str = ".site-header";
pub const TOGGLE_SELECTOR: &str = ".menu-toggle";
pub const NAV_SELECTOR: &str = ".site-nav";
pub const SCROLLED_CLASS: &str = "scrolled";
pub const OPEN_CLASS: &str = "is-open";
pub const BODY_LOCK_CLASS: &str = "menu-open";

pub fn header_scrolled(scroll_y: f64) -> bool {
    scroll_y > SCROLLED_THRESHOLD
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MenuState {
    open: bool,
}

impl MenuState {
    pub fn toggle(&mut self) {
        self.open = !self.open;
    }

    /// Returns whether anything changed.
    pub fn close(&mut self) -> bool {
        std::mem::replace(&mut self.open, false)
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn aria_expanded(&self) -> &'static str {
        if self.open { "true" } else { "false" }
    }
}

#[cfg(target_arch = "wasm32")]
pub use dom::install;

#[cfg(target_arch = "wasm32")]
mod dom {
    use std::cell::RefCell;
    use std::rc::Rc;

    use tracing::debug;
    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use web_sys::{Document, Element, Event, KeyboardEvent, Window};

    use super::*;

    struct Menu {
        state: MenuState,
        toggle: Element,
        nav: Element,
        body: Option<Element>,
    }

    impl Menu {
        fn sync(&self) {
            let open = self.state.is_open();
            let _ = self.nav.class_list().toggle_with_force(OPEN_CLASS, open);
            let _ = self
                .toggle
                .set_attribute("aria-expanded", self.state.aria_expanded());
            if let Some(body) = &self.body {
                let _ = body.class_list().toggle_with_force(BODY_LOCK_CLASS, open);
            }
        }
    }

    fn listen(target: &web_sys::EventTarget, event: &str, handler: Closure<dyn FnMut(Event)>) {
        let _ = target.add_event_listener_with_callback(event, handler.as_ref().unchecked_ref());
        handler.forget();
    }

    pub fn install(window: &Window, document: &Document) {
        install_header(window, document);
        install_menu(document);
    }

    fn install_header(window: &Window, document: &Document) {
        let Some(header) = document.query_selector(HEADER_SELECTOR).ok().flatten() else {
            return;
        };
        let update = {
            let window = window.clone();
            move |_: Event| {
                let scroll_y = window.scroll_y().unwrap_or(0.0);
                let _ = header
                    .class_list()
                    .toggle_with_force(SCROLLED_CLASS, header_scrolled(scroll_y));
            }
        };
        listen(window, "scroll", Closure::new(update.clone()));
        listen(window, "load", Closure::new(update));
    }

    fn install_menu(document: &Document) {
        let toggle = document.query_selector(TOGGLE_SELECTOR).ok().flatten();
        let nav = document.query_selector(NAV_SELECTOR).ok().flatten();
        let (Some(toggle), Some(nav)) = (toggle, nav) else {
            debug!("no menu toggle on this page");
            return;
        };

        let menu = Rc::new(RefCell::new(Menu {
            state: MenuState::default(),
            toggle: toggle.clone(),
            nav: nav.clone(),
            body: document.body().map(Element::from),
        }));
        menu.borrow().sync();

        let on_toggle = {
            let menu = menu.clone();
            move |_: Event| {
                let mut menu = menu.borrow_mut();
                menu.state.toggle();
                menu.sync();
            }
        };
        listen(&toggle, "click", Closure::new(on_toggle));

        let on_nav_click = {
            let menu = menu.clone();
            move |event: Event| {
                let is_link = event
                    .target()
                    .and_then(|t| t.dyn_into::<Element>().ok())
                    .and_then(|el| el.closest("a").ok().flatten())
                    .is_some();
                let mut menu = menu.borrow_mut();
                if is_link && menu.state.close() {
                    menu.sync();
                }
            }
        };
        listen(&nav, "click", Closure::new(on_nav_click));

        let on_key = move |event: Event| {
            let escape = event
                .dyn_ref::<KeyboardEvent>()
                .map(|key| key.key() == "Escape")
                .unwrap_or(false);
            let mut menu = menu.borrow_mut();
            if escape && menu.state.close() {
                menu.sync();
            }
        };
        listen(document, "keydown", Closure::new(on_key));
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn header_threshold_is_exclusive() {
        assert!(!header_scrolled(0.0));
        assert!(!header_scrolled(30.0));
        assert!(header_scrolled(30.5));
    }

    #[test]
    fn menu_toggle_and_close() {
        let mut menu = MenuState::default();
        assert_eq!(menu.aria_expanded(), "false");
        menu.toggle();
        assert!(menu.is_open());
        assert_eq!(menu.aria_expanded(), "true");
        assert!(menu.close());
        assert!(!menu.close());
        assert_eq!(menu.aria_expanded(), "false");
    }
}
