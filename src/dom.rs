use std::{cell::Cell, rc::Rc};

use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::{
    ClipboardEvent, Document, Event, EventTarget, HtmlElement, InputEvent, KeyboardEvent, Node,
    PointerEvent, Window,
};

use crate::{
    geometry::ScreenSize,
    layer_view::InputQueue,
    log::log_status,
    note::{key_passes_limit, ElementFactory, ElementSpec, NoteElement, NoteId, NoteInput, NOTE_HOVER_CLASS, NOTE_SELECT_CLASS},
    symbol::ComputedTextStyle,
};

/// Layout properties of the note element, the look is left to the css class
const NOTE_STYLE: &str = "position: absolute; white-space: nowrap; touch-action: none; \
    -webkit-user-select: auto; user-select: auto;";

fn js_err(e: JsValue) -> String {
    format!("{e:?}")
}

/// Char offsets of the selection inside `element`, `None` if the selection
/// is somewhere else. Selection offsets count UTF-16 units within a single
/// text node, so they are measured as the text from the element start.
fn selection_offsets(window: &Window, document: &Document, element: &HtmlElement) -> Option<(usize, Option<usize>)> {
    let sel = window.get_selection().ok()??;
    if sel.range_count() == 0 {
        return None;
    }
    let range = sel.get_range_at(0).ok()?;
    let start = range.start_container().ok()?;
    if !element.contains(Some(&start)) {
        return None;
    }
    let chars_until = |node: &Node, offset: u32| -> Option<usize> {
        let prefix = document.create_range().ok()?;
        prefix.select_node_contents(element).ok()?;
        prefix.set_end(node, offset).ok()?;
        Some(String::from(prefix.to_string()).chars().count())
    };
    let caret = chars_until(&start, range.start_offset().ok()?)?;
    let end = if range.collapsed() {
        None
    } else {
        chars_until(&range.end_container().ok()?, range.end_offset().ok()?)
    };
    Some((caret, end))
}

struct Listener {
    target: EventTarget,
    kind: &'static str,
    callback: Closure<dyn FnMut(Event)>,
}

fn listen<H>(target: &EventTarget, kind: &'static str, handler: H) -> Result<Listener, String>
    where H: FnMut(Event) + 'static
{
    let callback = Closure::wrap(Box::new(handler) as Box<dyn FnMut(Event)>);
    target
        .add_event_listener_with_callback(kind, callback.as_ref().unchecked_ref())
        .map_err(js_err)?;
    Ok(Listener { target: target.clone(), kind, callback })
}

/// A `contenteditable` div on the view surface
pub struct DomNoteElement {
    window: Window,
    document: Document,
    element: HtmlElement,
    listeners: Vec<Listener>,
}

impl DomNoteElement {
    fn unlisten(&mut self) {
        for l in self.listeners.drain(..) {
            let _ = l.target.remove_event_listener_with_callback(l.kind, l.callback.as_ref().unchecked_ref());
        }
    }

    fn set_style(&self, property: &str, value: &str) {
        if let Err(e) = self.element.style().set_property(property, value) {
            log_status(&format!("cannot set {property}: {}", js_err(e)));
        }
    }
}

impl Drop for DomNoteElement {
    fn drop(&mut self) {
        self.unlisten();
    }
}

impl NoteElement for DomNoteElement {

    fn text(&self) -> String {
        self.element.inner_text()
    }

    fn set_text(&mut self, text: &str) {
        self.element.set_inner_text(text);
    }

    fn size(&self) -> ScreenSize {
        ScreenSize {
            width: self.element.offset_width() as f64,
            height: self.element.offset_height() as f64,
        }
    }

    fn set_position(&mut self, left: f64, top: f64) {
        self.set_style("left", &format!("{left}px"));
        self.set_style("top", &format!("{top}px"));
    }

    fn set_class(&mut self, class: &str, on: bool) {
        if let Err(e) = self.element.class_list().toggle_with_force(class, on) {
            log_status(&format!("cannot toggle class {class}: {}", js_err(e)));
        }
    }

    fn set_visible(&mut self, visible: bool) {
        self.set_style("opacity", if visible { "1" } else { "0" });
        self.set_style("pointer-events", if visible { "auto" } else { "none" });
    }

    fn is_focused(&self) -> bool {
        let node: &Node = &self.element;
        self.document
            .active_element()
            .map_or(false, |active| active.is_same_node(Some(node)))
    }

    fn focus(&mut self) {
        if let Err(e) = self.element.focus() {
            log_status(&format!("cannot focus note: {}", js_err(e)));
        }
    }

    fn blur(&mut self) {
        if let Err(e) = self.element.blur() {
            log_status(&format!("cannot blur note: {}", js_err(e)));
        }
    }

    fn computed_style(&self) -> ComputedTextStyle {
        let style = match self.window.get_computed_style(&self.element) {
            Ok(Some(s)) => s,
            _ => return ComputedTextStyle::default(),
        };
        let prop = |name: &str| style.get_property_value(name).unwrap_or_default();
        ComputedTextStyle {
            color: prop("color"),
            background_color: prop("background-color"),
            font_family: prop("font-family"),
            font_style: prop("font-style"),
            font_weight: prop("font-weight"),
            font_size: prop("font-size"),
        }
    }

    fn remove(&mut self) {
        self.unlisten();
        self.element.remove();
    }
}

/// Creates note elements on the view surface. Element input goes into the
/// shared queue and is handled on the next render.
pub struct DomElementFactory {
    window: Window,
    document: Document,
    surface: HtmlElement,
    inputs: InputQueue,
}

impl DomElementFactory {

    pub fn new(surface: HtmlElement, inputs: InputQueue) -> Result<Self, String> {
        let window = web_sys::window().ok_or_else(|| "no window".to_string())?;
        let document = window.document().ok_or_else(|| "no document".to_string())?;
        Ok(Self { window, document, surface, inputs })
    }

    fn listeners(&self, id: NoteId, element: &HtmlElement, limit: Option<usize>) -> Result<Vec<Listener>, String> {
        let target: &EventTarget = element.as_ref();
        let window: &EventTarget = self.window.as_ref();
        let document: &EventTarget = self.document.as_ref();
        let pressed = Rc::new(Cell::new(false));
        let mut listeners = Vec::new();

        // keep note interaction away from the map view underneath
        for kind in ["keyup", "click"] {
            listeners.push(listen(target, kind, |e| e.stop_propagation())?);
        }

        let queue = self.inputs.clone();
        listeners.push(listen(target, "input", move |e| {
            let (input_type, data) = match e.dyn_ref::<InputEvent>() {
                Some(ie) => (ie.input_type(), ie.data()),
                None => (String::new(), None),
            };
            queue.borrow_mut().push((id, NoteInput::Input { input_type, data }));
        })?);

        let queue = self.inputs.clone();
        let win = self.window.clone();
        let doc = self.document.clone();
        let el = element.clone();
        listeners.push(listen(target, "paste", move |e| {
            e.prevent_default();
            let text = e.dyn_ref::<ClipboardEvent>()
                .and_then(|ce| ce.clipboard_data())
                .and_then(|dt| dt.get_data("text/plain").ok())
                .unwrap_or_default();
            // no caret in the note: append
            let (caret, selection_end) = selection_offsets(&win, &doc, &el).unwrap_or((usize::MAX, None));
            queue.borrow_mut().push((id, NoteInput::Paste { text, caret, selection_end }));
        })?);

        let el = element.clone();
        let win = self.window.clone();
        listeners.push(listen(target, "keydown", move |e| {
            e.stop_propagation();
            let ke = match e.dyn_ref::<KeyboardEvent>() {
                Some(ke) => ke,
                None => return,
            };
            let has_selection = matches!(win.get_selection(), Ok(Some(sel)) if !sel.is_collapsed());
            let modifier = ke.ctrl_key() || ke.meta_key() || ke.alt_key();
            let len = el.inner_text().chars().count();
            if !key_passes_limit(&ke.key(), modifier, has_selection, len, limit) {
                e.prevent_default();
            }
        })?);

        let el = element.clone();
        listeners.push(listen(target, "pointermove", move |e| {
            let classes = el.class_list();
            if classes.contains(NOTE_SELECT_CLASS) || classes.contains(NOTE_HOVER_CLASS) {
                e.stop_propagation();
            }
        })?);

        let queue = self.inputs.clone();
        let surface = self.surface.clone();
        let down = pressed.clone();
        listeners.push(listen(target, "pointerdown", move |e| {
            e.stop_propagation();
            let pe = match e.dyn_ref::<PointerEvent>() {
                Some(pe) => pe,
                None => return,
            };
            let origin = surface.get_bounding_client_rect();
            down.set(true);
            queue.borrow_mut().push((id, NoteInput::PointerDown {
                x: pe.client_x() as f64 - origin.left(),
                y: pe.client_y() as f64 - origin.top(),
                timestamp: e.time_stamp(),
            }));
        })?);

        let queue = self.inputs.clone();
        let surface = self.surface.clone();
        let down = pressed.clone();
        listeners.push(listen(window, "pointermove", move |e| {
            if !down.get() {
                return;
            }
            let pe = match e.dyn_ref::<PointerEvent>() {
                Some(pe) => pe,
                None => return,
            };
            let origin = surface.get_bounding_client_rect();
            queue.borrow_mut().push((id, NoteInput::PointerMove {
                x: pe.client_x() as f64 - origin.left(),
                y: pe.client_y() as f64 - origin.top(),
                timestamp: e.time_stamp(),
            }));
        })?);

        // released on the note, somewhere else, outside the page, or taken over by the browser
        let ends = [
            (target, "pointerup"),
            (window, "pointerup"),
            (window, "pointercancel"),
            (document, "pointerleave"),
        ];
        for (source, kind) in ends {
            let queue = self.inputs.clone();
            let down = pressed.clone();
            let is_note = std::ptr::eq(source, target);
            listeners.push(listen(source, kind, move |e| {
                if is_note {
                    e.stop_propagation();
                }
                if down.replace(false) {
                    queue.borrow_mut().push((id, NoteInput::PointerUp));
                }
            })?);
        }

        let queue = self.inputs.clone();
        listeners.push(listen(target, "focus", move |_| {
            queue.borrow_mut().push((id, NoteInput::Focus));
        })?);

        let queue = self.inputs.clone();
        listeners.push(listen(target, "blur", move |_| {
            queue.borrow_mut().push((id, NoteInput::Blur));
        })?);

        Ok(listeners)
    }
}

impl ElementFactory for DomElementFactory {
    type Element = DomNoteElement;

    fn create(&mut self, spec: &ElementSpec) -> Result<DomNoteElement, String> {
        let element = self.document
            .create_element("div")
            .map_err(js_err)?
            .dyn_into::<HtmlElement>()
            .map_err(|_| "note element is not an HtmlElement".to_string())?;

        element.set_content_editable(if spec.editable { "true" } else { "false" });
        element.set_inner_text(&spec.text);
        element.set_attribute("data-placeholder", &spec.text_placeholder).map_err(js_err)?;
        element.set_tab_index(1);
        if let Some(class) = spec.css_class.as_deref().filter(|c| !c.is_empty()) {
            element.class_list().add_1(class).map_err(js_err)?;
        }
        element.style().set_css_text(NOTE_STYLE);

        let listeners = self.listeners(spec.note_id, &element, spec.text_max_characters)?;
        self.surface.append_child(&element).map_err(js_err)?;

        Ok(DomNoteElement {
            window: self.window.clone(),
            document: self.document.clone(),
            element,
            listeners,
        })
    }
}
