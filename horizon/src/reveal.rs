//! Intro reveal for the copy that sits over the skyline: fades the content wrapper in, then
//! slides the eyebrow, heading and lead up into place with overlapping steps.

/// `powerN.out` easing curves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ease {
    Power2Out,
    Power3Out,
    Power4Out,
}

impl Ease {
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        let exponent = match self {
            Ease::Power2Out => 3,
            Ease::Power3Out => 4,
            Ease::Power4Out => 5,
        };
        1.0 - (1.0 - t).powi(exponent)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevealPart {
    Content,
    Eyebrow,
    Heading,
    Lead,
}

impl RevealPart {
    /// Selector relative to the content wrapper; `None` for the wrapper itself.
    pub fn selector(self) -> Option<&'static str> {
        match self {
            RevealPart::Content => None,
            RevealPart::Eyebrow => Some(".eyebrow"),
            RevealPart::Heading => Some("h1"),
            RevealPart::Lead => Some(".lead"),
        }
    }

    fn step(self) -> StepPlan {
        match self {
            RevealPart::Content => StepPlan {
                from_y: 0.0,
                duration: 0.6,
                ease: Ease::Power2Out,
                overlap: 0.0,
            },
            RevealPart::Eyebrow => StepPlan {
                from_y: 30.0,
                duration: 0.8,
                ease: Ease::Power3Out,
                overlap: 0.4,
            },
            RevealPart::Heading => StepPlan {
                from_y: 50.0,
                duration: 1.0,
                ease: Ease::Power4Out,
                overlap: 0.6,
            },
            RevealPart::Lead => StepPlan {
                from_y: 30.0,
                duration: 0.8,
                ease: Ease::Power3Out,
                overlap: 0.7,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct StepPlan {
    from_y: f64,
    duration: f64,
    ease: Ease,
    /// How far before the current end of the timeline this step starts.
    overlap: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RevealStep {
    pub part: RevealPart,
    pub start: f64,
    pub duration: f64,
    pub ease: Ease,
    pub from_y: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PartStyle {
    pub opacity: f64,
    pub translate_y: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RevealTimeline {
    steps: Vec<RevealStep>,
    playhead: f64,
    direction: Option<Direction>,
}

impl RevealTimeline {
    /// Builds the timeline from the parts that exist on the page, in reveal order. Each part
    /// after the first starts its overlap before the end of what was already scheduled, so a
    /// missing part pulls the rest earlier.
    pub fn new(parts: &[RevealPart]) -> Self {
        let mut steps: Vec<RevealStep> = Vec::with_capacity(parts.len());
        let mut end: f64 = 0.0;
        for part in parts {
            let plan = part.step();
            let start = if steps.is_empty() {
                0.0
            } else {
                (end - plan.overlap).max(0.0)
            };
            steps.push(RevealStep {
                part: *part,
                start,
                duration: plan.duration,
                ease: plan.ease,
                from_y: plan.from_y,
            });
            end = end.max(start + plan.duration);
        }
        Self {
            steps,
            playhead: 0.0,
            direction: None,
        }
    }

    pub fn steps(&self) -> &[RevealStep] {
        &self.steps
    }

    pub fn duration(&self) -> f64 {
        self.steps
            .iter()
            .map(|s| s.start + s.duration)
            .fold(0.0, f64::max)
    }

    pub fn play(&mut self) {
        self.direction = Some(Direction::Forward);
    }

    pub fn reverse(&mut self) {
        self.direction = Some(Direction::Backward);
    }

    pub fn is_animating(&self) -> bool {
        match self.direction {
            Some(Direction::Forward) => self.playhead < self.duration(),
            Some(Direction::Backward) => self.playhead > 0.0,
            None => false,
        }
    }

    /// Moves the playhead by `dt` seconds in the current direction.
    pub fn advance(&mut self, dt: f64) {
        let dt = dt.max(0.0);
        self.playhead = match self.direction {
            Some(Direction::Forward) => (self.playhead + dt).min(self.duration()),
            Some(Direction::Backward) => (self.playhead - dt).max(0.0),
            None => self.playhead,
        };
    }

    pub fn playhead(&self) -> f64 {
        self.playhead
    }

    pub fn styles(&self) -> Vec<(RevealPart, PartStyle)> {
        self.steps
            .iter()
            .map(|step| {
                let local = if step.duration > 0.0 {
                    (self.playhead - step.start) / step.duration
                } else {
                    1.0
                };
                let eased = step.ease.apply(local);
                (
                    step.part,
                    PartStyle {
                        opacity: eased,
                        translate_y: step.from_y * (1.0 - eased),
                    },
                )
            })
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerAction {
    Play,
    Reverse,
}

/// Fires `Play` when the section's top scrolls above 80% of the viewport height, and
/// `Reverse` when it scrolls back below that line. Leaving past the bottom does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct RevealTrigger {
    entered: bool,
}

pub const TRIGGER_START: f64 = 0.8;

impl RevealTrigger {
    pub fn update(&mut self, section_top: f64, viewport_height: f64) -> Option<TriggerAction> {
        let past_start = section_top <= viewport_height * TRIGGER_START;
        if past_start == self.entered {
            return None;
        }
        self.entered = past_start;
        Some(if past_start {
            TriggerAction::Play
        } else {
            TriggerAction::Reverse
        })
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
    use web_sys::{Document, Element, HtmlElement, Window};

    use super::*;

    const CONTENT_SELECTOR: &str = ".horizon-content";

    struct Reveal {
        window: Window,
        container: Element,
        content: HtmlElement,
        parts: Vec<(RevealPart, HtmlElement)>,
        timeline: RevealTimeline,
        trigger: RevealTrigger,
        last_timestamp: Option<f64>,
        running: bool,
    }

    impl Reveal {
        fn element(&self, part: RevealPart) -> Option<&HtmlElement> {
            match part {
                RevealPart::Content => Some(&self.content),
                other => self.parts.iter().find(|(p, _)| *p == other).map(|(_, el)| el),
            }
        }

        fn apply_styles(&self) {
            for (part, style) in self.timeline.styles() {
                if let Some(element) = self.element(part) {
                    let css = element.style();
                    let _ = css.set_property("opacity", &format!("{:.4}", style.opacity));
                    if part != RevealPart::Content {
                        let _ = css.set_property(
                            "transform",
                            &format!("translateY({:.2}px)", style.translate_y),
                        );
                    }
                }
            }
        }

        fn check_trigger(&mut self) -> bool {
            let top = self.container.get_bounding_client_rect().top();
            let viewport_height = self
                .window
                .inner_height()
                .ok()
                .and_then(|h| h.as_f64())
                .unwrap_or(0.0);
            match self.trigger.update(top, viewport_height) {
                Some(TriggerAction::Play) => self.timeline.play(),
                Some(TriggerAction::Reverse) => self.timeline.reverse(),
                None => return false,
            }
            self.last_timestamp = None;
            true
        }
    }

    /// Wires the reveal to `container`. Missing content wrapper means no reveal; missing
    /// children just drop their step.
    pub fn install(window: &Window, document: &Document, container: &Element) {
        let Some(content) = document
            .query_selector(CONTENT_SELECTOR)
            .ok()
            .flatten()
            .and_then(|el| el.dyn_into::<HtmlElement>().ok())
        else {
            debug!("no reveal content; skipping intro animation");
            return;
        };

        let mut present = vec![RevealPart::Content];
        let mut parts = Vec::new();
        for part in [RevealPart::Eyebrow, RevealPart::Heading, RevealPart::Lead] {
            let found = part
                .selector()
                .and_then(|sel| content.query_selector(sel).ok().flatten())
                .and_then(|el| el.dyn_into::<HtmlElement>().ok());
            if let Some(element) = found {
                present.push(part);
                parts.push((part, element));
            }
        }

        let _ = content.style().set_property("visibility", "visible");
        let reveal = Rc::new(RefCell::new(Reveal {
            window: window.clone(),
            container: container.clone(),
            content,
            parts,
            timeline: RevealTimeline::new(&present),
            trigger: RevealTrigger::default(),
            last_timestamp: None,
            running: false,
        }));
        reveal.borrow().apply_styles();

        let frame: Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>> = Rc::new(RefCell::new(None));
        let frame_handle = frame.clone();
        let reveal_for_frame = reveal.clone();
        let window_for_frame = window.clone();
        *frame.borrow_mut() = Some(Closure::new(move |timestamp: f64| {
            let mut state = reveal_for_frame.borrow_mut();
            let dt = state
                .last_timestamp
                .map(|last| (timestamp - last) / 1000.0)
                .unwrap_or(0.0);
            state.last_timestamp = Some(timestamp);
            state.timeline.advance(dt);
            state.apply_styles();
            state.running = state.timeline.is_animating();
            if state.running {
                if let Some(callback) = frame_handle.borrow().as_ref() {
                    let _ = window_for_frame
                        .request_animation_frame(callback.as_ref().unchecked_ref());
                }
            }
        }));

        let window_for_scroll = window.clone();
        let on_scroll = Closure::<dyn FnMut()>::new(move || {
            let mut state = reveal.borrow_mut();
            if state.check_trigger() && !state.running {
                state.running = true;
                if let Some(callback) = frame.borrow().as_ref() {
                    let _ = window_for_scroll
                        .request_animation_frame(callback.as_ref().unchecked_ref());
                }
            }
        });
        let _ = window
            .add_event_listener_with_callback("scroll", on_scroll.as_ref().unchecked_ref());
        // Evaluate once so a section already in view reveals on load.
        on_scroll
            .as_ref()
            .unchecked_ref::<js_sys::Function>()
            .call0(&JsValue::NULL)
            .ok();
        on_scroll.forget();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const ALL: [RevealPart; 4] = [
        RevealPart::Content,
        RevealPart::Eyebrow,
        RevealPart::Heading,
        RevealPart::Lead,
    ];

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn full_timeline_positions() {
        let timeline = RevealTimeline::new(&ALL);
        let starts: Vec<f64> = timeline.steps().iter().map(|s| s.start).collect();
        assert!(close(starts[0], 0.0));
        assert!(close(starts[1], 0.2));
        assert!(close(starts[2], 0.4));
        assert!(close(starts[3], 0.7));
        assert!(close(timeline.duration(), 1.5));
    }

    #[test]
    fn missing_parts_shift_later_steps() {
        let timeline = RevealTimeline::new(&[RevealPart::Content, RevealPart::Lead]);
        assert_eq!(timeline.steps().len(), 2);
        assert!(close(timeline.steps()[1].start, 0.0));
        assert!(close(timeline.duration(), 0.8));
    }

    #[test]
    fn easing_endpoints() {
        for ease in [Ease::Power2Out, Ease::Power3Out, Ease::Power4Out] {
            assert_eq!(ease.apply(0.0), 0.0);
            assert_eq!(ease.apply(1.0), 1.0);
            assert_eq!(ease.apply(-3.0), 0.0);
            assert!(ease.apply(0.5) > 0.5);
        }
        assert!(Ease::Power4Out.apply(0.3) > Ease::Power2Out.apply(0.3));
    }

    #[test]
    fn play_then_reverse() {
        let mut timeline = RevealTimeline::new(&ALL);
        let hidden = timeline.styles();
        assert!(hidden.iter().all(|(_, s)| s.opacity == 0.0));
        assert_eq!(hidden[2].1.translate_y, 50.0);
        assert!(!timeline.is_animating());

        timeline.play();
        assert!(timeline.is_animating());
        for _ in 0..100 {
            timeline.advance(1.0 / 60.0);
        }
        assert!(!timeline.is_animating());
        assert!(timeline.styles().iter().all(|(_, s)| s.opacity == 1.0 && s.translate_y == 0.0));

        timeline.reverse();
        timeline.advance(10.0);
        assert_eq!(timeline.playhead(), 0.0);
        assert!(timeline.styles().iter().all(|(_, s)| s.opacity == 0.0));
    }

    #[test]
    fn trigger_plays_on_enter_and_reverses_on_leave_back() {
        let mut trigger = RevealTrigger::default();
        assert_eq!(trigger.update(1000.0, 800.0), None);
        assert_eq!(trigger.update(640.0, 800.0), Some(TriggerAction::Play));
        assert_eq!(trigger.update(-3000.0, 800.0), None);
        assert_eq!(trigger.update(700.0, 800.0), Some(TriggerAction::Reverse));
    }

    #[test]
    fn trigger_fires_on_load_when_already_in_view() {
        let mut trigger = RevealTrigger::default();
        assert_eq!(trigger.update(100.0, 800.0), Some(TriggerAction::Play));
    }
}
