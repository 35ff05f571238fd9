use std::rc::Rc;

use serde_derive::{Deserialize, Serialize};

use crate::{
    geometry::{Geometry, GeometryEngine, Graphic, MapPoint, PointGeometry, ScreenPoint, ScreenRect, ScreenSize, Vector},
    log::log_status,
    placement::{AnchorState, PlacementConfig, PlacementEngine, PlacementInput},
    symbol::{ComputedTextStyle, NoteAttributes, NoteGraphic, TextSymbol},
    view::MapView,
};

pub type NoteId = u32;

// CSS classes projected from the note state onto its element
pub const NOTE_HOVER_CLASS: &str = "note-hover";
pub const NOTE_SELECT_CLASS: &str = "note-select";
pub const NOTE_DRAG_CLASS: &str = "note-drag";

pub const GRABBING_CURSOR: &str = "grabbing";

/// Keys that pass even when the note is at its character limit
pub const ALWAYS_ALLOWED_KEYS: &[&str] = &[
    "Backspace",
    "Delete",
    "ArrowLeft",
    "ArrowRight",
    "ArrowUp",
    "ArrowDown",
    "Home",
    "End",
    "Tab",
    "Enter",
    "Escape",
    "Shift",
    "Control",
    "Alt",
    "Meta",
    "CapsLock",
];

/// The element a note is rendered into
pub trait NoteElement {
    fn text(&self) -> String;
    fn set_text(&mut self, text: &str);
    /// Rendered size in pixels
    fn size(&self) -> ScreenSize;
    /// Top left corner relative to the view surface
    fn set_position(&mut self, left: f64, top: f64);
    fn set_class(&mut self, class: &str, on: bool);
    fn set_visible(&mut self, visible: bool);
    fn is_focused(&self) -> bool;
    fn focus(&mut self);
    fn blur(&mut self);
    fn computed_style(&self) -> ComputedTextStyle;
    /// Detach from the document and drop all listeners
    fn remove(&mut self);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSpec {
    pub note_id: NoteId,
    pub text: String,
    pub editable: bool,
    pub text_placeholder: String,
    pub css_class: Option<String>,
    pub text_max_characters: Option<usize>,
}

pub trait ElementFactory {
    type Element: NoteElement;
    fn create(&mut self, spec: &ElementSpec) -> Result<Self::Element, String>;
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteOptions {
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub text_placeholder: String,
    #[serde(default)]
    pub css_class: Option<String>,
    #[serde(default)]
    pub text_max_characters: Option<usize>,
}

/// User input on a note element
#[derive(Debug, Clone, PartialEq)]
pub enum NoteInput {
    /// `input` event after the element text changed
    Input { input_type: String, data: Option<String> },
    /// Plain text pasted at the caret, replacing `caret..selection_end` (char offsets)
    Paste { text: String, caret: usize, selection_end: Option<usize> },
    KeyDown { key: String, modifier: bool, has_selection: bool },
    Focus,
    Blur,
    PointerDown { x: f64, y: f64, timestamp: f64 },
    PointerMove { x: f64, y: f64, timestamp: f64 },
    /// Pointer released or left the window
    PointerUp,
}

/// Things that happened to a note, forwarded by the layer as `note-<name>`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum NoteEvent {
    Hover { hovered: bool },
    Select { selected: bool },
    Focus,
    Blur,
    UpdateText { text: String },
    UpdatePosition {
        #[serde(rename = "mapPoint")]
        map_point: MapPoint,
    },
    Drag { velocity: [f64; 2], acceleration: [f64; 2] },
    DragStop,
}

impl NoteEvent {
    pub fn name(&self) -> &'static str {
        match self {
            NoteEvent::Hover { .. } => "hover",
            NoteEvent::Select { .. } => "select",
            NoteEvent::Focus => "focus",
            NoteEvent::Blur => "blur",
            NoteEvent::UpdateText { .. } => "update-text",
            NoteEvent::UpdatePosition { .. } => "update-position",
            NoteEvent::Drag { .. } => "drag",
            NoteEvent::DragStop => "drag-stop",
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct NoteFlags {
    pub hovered: bool,
    pub selected: bool,
    pub dragging: bool,
    pub occluded: bool,
    pub empty: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct DragTelemetry {
    pub was_dragged: bool,
    pub velocity: Vector,
    pub acceleration: Vector,
    pub last_point: Option<ScreenPoint>,
    pub last_timestamp: Option<f64>,
}

/// Chars, not bytes
pub fn truncate_chars(s: &str, max: Option<usize>) -> String {
    match max {
        Some(max) => s.chars().take(max).collect(),
        None => s.to_string(),
    }
}

/// Whether a keystroke may go through given the character limit
pub fn key_passes_limit(key: &str, modifier: bool, has_selection: bool, text_len: usize, limit: Option<usize>) -> bool {
    let limit = match limit {
        Some(l) => l,
        None => return true,
    };
    has_selection || text_len < limit || modifier || ALWAYS_ALLOWED_KEYS.contains(&key)
}

/// One text note attached to a graphic
#[derive(Debug)]
pub struct Note<E: NoteElement> {
    id: NoteId,
    graphic: Rc<Graphic>,
    text: String,
    options: NoteOptions,
    placement: PlacementConfig,
    engine: PlacementEngine,
    map_point: Option<MapPoint>,
    screen_rect: Option<ScreenRect>,
    flags: NoteFlags,
    drag: DragTelemetry,
    prior_cursor: Option<String>,
    element: Option<E>,
    events: Vec<NoteEvent>,
    placement_error: Option<String>,
    destroyed: bool,
}

impl<E: NoteElement> Note<E> {

    pub fn new(id: NoteId, graphic: Rc<Graphic>, text: &str, options: NoteOptions, placement: PlacementConfig) -> Self {
        Self {
            id,
            graphic,
            text: truncate_chars(text, options.text_max_characters),
            options,
            placement,
            engine: PlacementEngine::new(),
            map_point: None,
            screen_rect: None,
            flags: NoteFlags::default(),
            drag: DragTelemetry::default(),
            prior_cursor: None,
            element: None,
            events: Vec::new(),
            placement_error: None,
            destroyed: false,
        }
    }

    pub fn id(&self) -> NoteId {
        self.id
    }

    pub fn graphic(&self) -> &Rc<Graphic> {
        &self.graphic
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn options(&self) -> &NoteOptions {
        &self.options
    }

    pub fn placement(&self) -> &PlacementConfig {
        &self.placement
    }

    pub fn anchor(&self) -> Option<MapPoint> {
        self.engine.anchor()
    }

    pub fn vector(&self) -> Option<Vector> {
        self.engine.vector()
    }

    pub fn anchor_state(&self) -> AnchorState {
        self.engine.state()
    }

    pub fn map_point(&self) -> Option<MapPoint> {
        self.map_point
    }

    pub fn screen_rect(&self) -> Option<ScreenRect> {
        self.screen_rect
    }

    pub fn drag_telemetry(&self) -> &DragTelemetry {
        &self.drag
    }

    pub fn element(&self) -> Option<&E> {
        self.element.as_ref()
    }

    pub fn has_element(&self) -> bool {
        self.element.is_some()
    }

    pub fn hovered(&self) -> bool {
        self.flags.hovered
    }

    pub fn selected(&self) -> bool {
        self.flags.selected
    }

    pub fn dragging(&self) -> bool {
        self.flags.dragging
    }

    pub fn hidden(&self) -> bool {
        self.flags.occluded
    }

    pub fn empty(&self) -> bool {
        self.flags.empty
    }

    /// Follows the DOM focus, not stored
    pub fn focused(&self) -> bool {
        self.element.as_ref().map_or(false, |e| e.is_focused())
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn take_events(&mut self) -> Vec<NoteEvent> {
        std::mem::take(&mut self.events)
    }

    fn emit(&mut self, event: NoteEvent) {
        self.events.push(event);
    }

    /// Attach the note to a different graphic, placement starts over
    pub fn set_graphic(&mut self, graphic: Rc<Graphic>) {
        self.graphic = graphic;
        self.engine.invalidate();
    }

    pub fn set_placement_hint(&mut self, hint: Option<MapPoint>) {
        self.placement.hint = hint;
    }

    pub fn create_element<F>(
        &mut self,
        factory: &mut F,
        view: &dyn MapView,
        geo: &dyn GeometryEngine,
        focus: bool,
    ) -> Result<(), String>
        where F: ElementFactory<Element = E>
    {
        if self.destroyed || self.element.is_some() {
            return Ok(());
        }

        let mut element = factory.create(&ElementSpec {
            note_id: self.id,
            text: self.text.clone(),
            editable: self.options.editable,
            text_placeholder: self.options.text_placeholder.clone(),
            css_class: self.options.css_class.clone(),
            text_max_characters: self.options.text_max_characters,
        })?;

        element.set_text(&self.text);
        element.set_class(NOTE_HOVER_CLASS, self.flags.hovered);
        element.set_class(NOTE_SELECT_CLASS, self.flags.selected);
        self.text = truncate_chars(&element.text(), self.options.text_max_characters);
        self.element = Some(element);

        self.update_position(view, geo);

        if focus && self.options.editable {
            if let Some(e) = self.element.as_mut() {
                e.focus();
            }
        }
        Ok(())
    }

    /// Recompute the note position in map space, then move the element in screen space
    pub fn update_position(&mut self, view: &dyn MapView, geo: &dyn GeometryEngine) {
        self.update_map_point(view, geo);
        self.update_element_position(view);
    }

    fn update_map_point(&mut self, view: &dyn MapView, geo: &dyn GeometryEngine) {
        let size = match self.element.as_ref() {
            Some(e) => e.size(),
            None => return,
        };
        let focused = self.focused();
        let graphic = self.graphic.clone();
        let input = PlacementInput {
            geometry: &graphic.geometry,
            symbol: graphic.symbol.as_ref(),
            note_size: size,
            focused,
            config: &self.placement,
        };

        match self.engine.compute_position(&input, view, geo) {
            Ok(point) => {
                self.placement_error = None;
                let moved = self.map_point.map_or(true, |old| !old.equals(&point));
                self.map_point = Some(point);
                if moved {
                    self.emit(NoteEvent::UpdatePosition { map_point: point });
                }
            },
            Err(e) => {
                if self.placement_error.as_deref() != Some(e.as_str()) {
                    log_status(&format!("note {}: cannot place note on {}: {e}", self.id, graphic.geometry.type_name()));
                }
                self.placement_error = Some(e);
            },
        }
    }

    fn update_element_position(&mut self, view: &dyn MapView) {
        if !view.ready() {
            return;
        }
        let (element, map_point) = match (self.element.as_mut(), self.map_point) {
            (Some(e), Some(p)) => (e, p),
            _ => return,
        };
        let size = element.size();
        let center = view.to_screen(&map_point);
        let left = (center.x - size.width / 2.0).round();
        let top = (center.y - size.height / 2.0).round();
        element.set_position(left, top);
        self.screen_rect = Some(ScreenRect::new(left, top, size));
    }

    pub fn set_visibility(&mut self, visible: bool) {
        self.flags.occluded = !visible;
        if let Some(e) = self.element.as_mut() {
            e.set_visible(visible);
        }
    }

    pub fn set_hover(&mut self, state: bool) {
        let element = match self.element.as_mut() {
            Some(e) => e,
            None => return,
        };
        element.set_class(NOTE_HOVER_CLASS, state);
        if state != self.flags.hovered {
            self.flags.hovered = state;
            self.emit(NoteEvent::Hover { hovered: state });
        }
    }

    pub fn set_select(&mut self, state: bool) {
        let element = match self.element.as_mut() {
            Some(e) => e,
            None => return,
        };
        element.set_class(NOTE_SELECT_CLASS, state);
        if state != self.flags.selected {
            self.flags.selected = state;
            self.emit(NoteEvent::Select { selected: state });
        }
    }

    pub fn set_drag(&mut self, state: bool, view: &mut dyn MapView) {
        if state == self.flags.dragging {
            return;
        }
        self.flags.dragging = state;
        if let Some(e) = self.element.as_mut() {
            e.set_class(NOTE_DRAG_CLASS, state);
        }

        if state {
            self.prior_cursor = view.cursor();
            view.set_cursor(Some(GRABBING_CURSOR.to_string()));
            self.drag = DragTelemetry::default();
        } else {
            view.set_cursor(self.prior_cursor.take());
            if self.drag.was_dragged {
                self.emit(NoteEvent::DragStop);
            }
        }
    }

    /// Pointer moved to `p` (screen pixels) while dragging
    pub fn drag_to(&mut self, p: ScreenPoint, timestamp: f64, view: &dyn MapView) {
        if !self.flags.dragging {
            return;
        }

        if !self.drag.was_dragged {
            // leave edit mode, the blur this causes is not reported
            if let Some(e) = self.element.as_mut().filter(|e| e.is_focused()) {
                e.blur();
            }
        }

        self.drag.was_dragged = true;
        self.engine.invalidate();
        self.placement.hint = Some(view.to_map(&p));

        if !matches!(self.graphic.geometry, Geometry::Point(_)) {
            if let Some(last) = self.drag.last_point {
                let dt = match self.drag.last_timestamp {
                    Some(t) if timestamp > t => timestamp - t,
                    _ => 1.0,
                };
                // screen y grows down, map y grows up
                let velocity = Vector {
                    x: (p.x - last.x) / dt,
                    y: -(p.y - last.y) / dt,
                };
                self.drag.acceleration = Vector {
                    x: (velocity.x - self.drag.velocity.x) / dt,
                    y: (velocity.y - self.drag.velocity.y) / dt,
                };
                self.drag.velocity = velocity;
            }
        }

        self.drag.last_point = Some(p);
        self.drag.last_timestamp = Some(timestamp);

        let (v, a) = (self.drag.velocity, self.drag.acceleration);
        self.emit(NoteEvent::Drag {
            velocity: [v.x, v.y],
            acceleration: [a.x, a.y],
        });
    }

    /// Returns false if the default action of the DOM event must be prevented
    pub fn handle_input(&mut self, input: NoteInput, view: &mut dyn MapView, geo: &dyn GeometryEngine) -> bool {
        if self.destroyed {
            return true;
        }
        match input {
            NoteInput::Input { input_type, data } => {
                self.on_input(&input_type, data.as_deref(), &*view, geo);
                true
            },
            NoteInput::Paste { text, caret, selection_end } => {
                self.on_paste(&text, caret, selection_end, &*view, geo);
                false
            },
            NoteInput::KeyDown { key, modifier, has_selection } => {
                key_passes_limit(&key, modifier, has_selection, self.text.chars().count(), self.options.text_max_characters)
            },
            NoteInput::Focus => {
                self.on_focus();
                true
            },
            NoteInput::Blur => {
                self.on_blur(&*view, geo);
                true
            },
            NoteInput::PointerDown { x, y, timestamp } => {
                self.set_drag(true, view);
                self.drag.last_point = Some(ScreenPoint { x, y });
                self.drag.last_timestamp = Some(timestamp);
                true
            },
            NoteInput::PointerMove { x, y, timestamp } => {
                self.drag_to(ScreenPoint { x, y }, timestamp, &*view);
                true
            },
            NoteInput::PointerUp => {
                let clicked = self.flags.dragging && !self.drag.was_dragged;
                self.set_drag(false, view);
                if clicked && self.options.editable && !self.focused() && !self.flags.occluded {
                    if let Some(e) = self.element.as_mut() {
                        e.focus();
                    }
                }
                true
            },
        }
    }

    fn on_input(&mut self, input_type: &str, data: Option<&str>, view: &dyn MapView, geo: &dyn GeometryEngine) {
        let element = match self.element.as_mut() {
            Some(e) => e,
            None => return,
        };

        // enter leaves edit mode
        if (input_type == "insertText" || input_type == "insertParagraph") && data.is_none() {
            element.set_text(&self.text);
            element.blur();
            return;
        }

        let raw = element.text();
        let text = truncate_chars(&raw, self.options.text_max_characters);
        if text != raw {
            element.set_text(&text);
        }
        self.text = text;
        self.update_position(view, geo);
        self.emit(NoteEvent::UpdateText { text: self.text.clone() });
    }

    fn on_paste(&mut self, pasted: &str, caret: usize, selection_end: Option<usize>, view: &dyn MapView, geo: &dyn GeometryEngine) {
        let element = match self.element.as_mut() {
            Some(e) => e,
            None => return,
        };

        // notes are single line
        let pasted = pasted.replace("\r\n", " ").replace(['\r', '\n'], " ");
        let current = element.text().chars().collect::<Vec<_>>();
        let start = caret.min(current.len());
        let end = selection_end.unwrap_or(start).max(start).min(current.len());

        let mut text = current[..start].iter().collect::<String>();
        text.push_str(&pasted);
        text.extend(current[end..].iter());
        let text = truncate_chars(&text, self.options.text_max_characters);

        element.set_text(&text);
        self.text = text;
        self.update_position(view, geo);
        self.emit(NoteEvent::UpdateText { text: self.text.clone() });
    }

    fn on_focus(&mut self) {
        if self.flags.occluded {
            if let Some(e) = self.element.as_mut() {
                e.blur();
            }
            return;
        }
        self.emit(NoteEvent::Focus);
    }

    fn on_blur(&mut self, view: &dyn MapView, geo: &dyn GeometryEngine) {
        if let Some(e) = self.element.as_ref() {
            self.text = truncate_chars(&e.text(), self.options.text_max_characters);
        }
        self.flags.empty = self.text.is_empty();
        self.set_hover(false);
        self.update_position(view, geo);
        if !self.flags.dragging {
            self.emit(NoteEvent::Blur);
        }
    }

    /// Approximate the note as a text graphic placed at the anchor
    pub fn to_graphic(&self, view: &dyn MapView) -> Option<NoteGraphic> {
        if self.text.is_empty() {
            return None;
        }
        let element = self.element.as_ref()?;
        let map_point = self.map_point?;
        let anchor = self.engine.anchor()?;

        // offset from the anchor to the current position, symbol y points up
        let screen_note = view.to_screen(&map_point);
        let screen_anchor = view.to_screen(&anchor);
        let xoffset = screen_note.x - screen_anchor.x;
        let yoffset = -(screen_note.y - screen_anchor.y);

        let style = element.computed_style();

        Some(NoteGraphic {
            geometry: Geometry::Point(PointGeometry {
                x: anchor.x,
                y: anchor.y,
                spatial_reference: self.graphic.geometry.spatial_reference().cloned(),
            }),
            symbol: TextSymbol::from_style(&self.text, &style, xoffset, yoffset),
            attributes: NoteAttributes {
                object_id: self.id,
                text: self.text.clone(),
            },
        })
    }

    /// Drop the element and its listeners, the note can get a new one later
    pub fn remove_element(&mut self) {
        if let Some(mut e) = self.element.take() {
            e.remove();
        }
        self.screen_rect = None;
    }

    /// Calling it again does nothing
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.remove_element();
        self.events.clear();
        self.destroyed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geometry::{GeoEngine, Polyline},
        testing::{line_graphic, point_graphic, polygon_graphic, FakeElement, FakeFactory},
        view::test_view,
    };
    use float_cmp::approx_eq;

    fn options(max: Option<usize>) -> NoteOptions {
        NoteOptions {
            editable: true,
            text_placeholder: "Add a note".to_string(),
            css_class: Some("my-note".to_string()),
            text_max_characters: max,
        }
    }

    fn placed_note(graphic: Graphic, text: &str, max: Option<usize>) -> Note<FakeElement> {
        let view = test_view();
        let mut note = Note::new(1, Rc::new(graphic), text, options(max), PlacementConfig::default());
        note.create_element(&mut FakeFactory::default(), &view, &GeoEngine, false).unwrap();
        note.take_events();
        note
    }

    fn input(note: &mut Note<FakeElement>, input: NoteInput) -> bool {
        let mut view = test_view();
        note.handle_input(input, &mut view, &GeoEngine)
    }

    fn type_text(note: &mut Note<FakeElement>, text: &str) {
        note.element.as_mut().unwrap().text = text.to_string();
        input(note, NoteInput::Input { input_type: "insertText".to_string(), data: Some("x".to_string()) });
    }

    #[test]
    fn creates_element_with_text() {
        let note = placed_note(polygon_graphic("p"), "this is a test note", None);
        let e = note.element().unwrap();
        assert_eq!(e.text, "this is a test note");
        assert_eq!(e.spec.as_ref().unwrap().css_class.as_deref(), Some("my-note"));
        assert_eq!(note.text(), "this is a test note");
        assert!(note.map_point().is_some());
        assert!(note.screen_rect().is_some());
    }

    #[test]
    fn initial_text_is_truncated() {
        let note = placed_note(point_graphic("p", 0.0, 0.0), "abcdef", Some(3));
        assert_eq!(note.text(), "abc");
    }

    #[test]
    fn hover_and_select_emit_only_on_change() {
        let mut note = placed_note(polygon_graphic("p"), "note", None);
        assert!(!note.hovered());
        note.set_hover(true);
        note.set_hover(true);
        assert!(note.hovered());
        assert!(note.element().unwrap().classes.contains(NOTE_HOVER_CLASS));
        assert_eq!(note.take_events(), vec![NoteEvent::Hover { hovered: true }]);

        note.set_select(true);
        note.set_select(false);
        note.set_select(false);
        assert!(!note.selected());
        assert_eq!(note.take_events(), vec![
            NoteEvent::Select { selected: true },
            NoteEvent::Select { selected: false },
        ]);
    }

    #[test]
    fn visibility_is_projected_onto_the_element() {
        let mut note = placed_note(polygon_graphic("p"), "note", None);
        assert!(!note.hidden());
        note.set_visibility(false);
        assert!(note.hidden());
        assert!(!note.element().unwrap().visible);
    }

    #[test]
    fn enter_reverts_and_leaves_edit_mode() {
        let mut note = placed_note(polygon_graphic("p"), "before", None);
        note.element.as_mut().unwrap().focused = true;
        note.element.as_mut().unwrap().text = "before\n".to_string();
        input(&mut note, NoteInput::Input { input_type: "insertParagraph".to_string(), data: None });
        assert_eq!(note.element().unwrap().text, "before");
        assert!(!note.focused());
        assert!(note.take_events().is_empty());
    }

    #[test]
    fn typing_updates_text_and_position() {
        let mut note = placed_note(polygon_graphic("p"), "a", None);
        let before = note.screen_rect().unwrap();
        type_text(&mut note, "a much longer note");
        assert_eq!(note.text(), "a much longer note");
        let after = note.screen_rect().unwrap();
        assert!(after.right - after.left > before.right - before.left);
        let events = note.take_events();
        assert!(events.contains(&NoteEvent::UpdateText { text: "a much longer note".to_string() }));
    }

    #[test]
    fn typed_text_is_clamped() {
        let mut note = placed_note(polygon_graphic("p"), "", Some(5));
        type_text(&mut note, "abcdefgh");
        assert_eq!(note.text(), "abcde");
        assert_eq!(note.element().unwrap().text, "abcde");
    }

    #[test]
    fn keydown_at_limit() {
        let mut note = placed_note(polygon_graphic("p"), "abc", Some(3));
        let key = |k: &str, modifier: bool, has_selection: bool| NoteInput::KeyDown {
            key: k.to_string(),
            modifier,
            has_selection,
        };
        assert!(!input(&mut note, key("d", false, false)));
        assert!(input(&mut note, key("Backspace", false, false)));
        assert!(input(&mut note, key("ArrowLeft", false, false)));
        assert!(input(&mut note, key("Enter", false, false)));
        assert!(input(&mut note, key("a", true, false)));
        assert!(input(&mut note, key("d", false, true)));

        let mut unlimited = placed_note(polygon_graphic("p"), "abc", None);
        assert!(input(&mut unlimited, key("d", false, false)));
    }

    #[test]
    fn paste_inserts_plain_text_at_caret_and_clamps() {
        let mut note = placed_note(polygon_graphic("p"), "hello world", Some(15));
        let allowed = input(&mut note, NoteInput::Paste {
            text: "big\nnew".to_string(),
            caret: 6,
            selection_end: None,
        });
        assert!(!allowed);
        assert_eq!(note.text(), "hello big newwo");
        assert_eq!(note.text().chars().count(), 15);
        assert!(note.take_events().iter().any(|e| e.name() == "update-text"));

        let mut note = placed_note(polygon_graphic("p"), "hello world", None);
        input(&mut note, NoteInput::Paste {
            text: "there".to_string(),
            caret: 6,
            selection_end: Some(11),
        });
        assert_eq!(note.text(), "hello there");

        // offsets count chars, not UTF-16 units
        let mut note = placed_note(polygon_graphic("p"), "😀ab", None);
        input(&mut note, NoteInput::Paste {
            text: "X".to_string(),
            caret: 1,
            selection_end: None,
        });
        assert_eq!(note.text(), "😀Xab");

        // caret outside the note appends
        input(&mut note, NoteInput::Paste {
            text: "!".to_string(),
            caret: usize::MAX,
            selection_end: None,
        });
        assert_eq!(note.text(), "😀Xab!");
    }

    #[test]
    fn focus_on_hidden_note_is_rejected() {
        let mut note = placed_note(polygon_graphic("p"), "note", None);
        note.set_visibility(false);
        note.element.as_mut().unwrap().focused = true;
        input(&mut note, NoteInput::Focus);
        assert!(!note.focused());
        assert!(note.take_events().is_empty());

        note.set_visibility(true);
        input(&mut note, NoteInput::Focus);
        assert_eq!(note.take_events(), vec![NoteEvent::Focus]);
    }

    #[test]
    fn blur_marks_empty_notes() {
        let mut note = placed_note(polygon_graphic("p"), "note", None);
        note.set_hover(true);
        note.element.as_mut().unwrap().text = String::new();
        note.take_events();
        input(&mut note, NoteInput::Blur);
        assert!(note.empty());
        assert!(!note.hovered());
        let events = note.take_events();
        assert!(events.contains(&NoteEvent::Blur));
        assert!(events.contains(&NoteEvent::Hover { hovered: false }));
    }

    #[test]
    fn drag_sets_cursor_and_moves_the_anchor() {
        let mut view = test_view();
        view.set_cursor(Some("crosshair".to_string()));
        let mut note = placed_note(polygon_graphic("p"), "note", None);
        let anchor_before = note.anchor().unwrap();

        note.handle_input(NoteInput::PointerDown { x: 400.0, y: 300.0, timestamp: 0.0 }, &mut view, &GeoEngine);
        assert!(note.dragging());
        assert_eq!(view.cursor(), Some(GRABBING_CURSOR.to_string()));
        assert!(note.element().unwrap().classes.contains(NOTE_DRAG_CLASS));

        note.handle_input(NoteInput::PointerMove { x: 900.0, y: 300.0, timestamp: 10.0 }, &mut view, &GeoEngine);
        assert_eq!(note.anchor_state(), AnchorState::Unplaced);
        assert!(note.placement().hint.unwrap().equals(&view.to_map(&ScreenPoint { x: 900.0, y: 300.0 })));
        // 500 px in 10 ms
        assert!(approx_eq!(f64, note.drag_telemetry().velocity.x, 50.0, epsilon = 1e-9));
        assert!(note.take_events().iter().any(|e| e.name() == "drag"));

        note.update_position(&view, &GeoEngine);
        assert!(!note.anchor().unwrap().equals(&anchor_before));
        note.take_events();

        note.handle_input(NoteInput::PointerUp, &mut view, &GeoEngine);
        assert!(!note.dragging());
        assert_eq!(view.cursor(), Some("crosshair".to_string()));
        assert_eq!(note.take_events(), vec![NoteEvent::DragStop]);
    }

    #[test]
    fn point_notes_do_not_track_velocity() {
        let mut view = test_view();
        let mut note = placed_note(point_graphic("p", 0.0, 0.0), "note", None);
        note.handle_input(NoteInput::PointerDown { x: 0.0, y: 0.0, timestamp: 0.0 }, &mut view, &GeoEngine);
        note.handle_input(NoteInput::PointerMove { x: 100.0, y: 0.0, timestamp: 1.0 }, &mut view, &GeoEngine);
        assert_eq!(note.drag_telemetry().velocity, Vector::ZERO);
        assert!(note.drag_telemetry().was_dragged);
    }

    #[test]
    fn blur_caused_by_drag_is_not_reported() {
        let mut view = test_view();
        let mut note = placed_note(polygon_graphic("p"), "note", None);
        note.element.as_mut().unwrap().focused = true;
        note.handle_input(NoteInput::PointerDown { x: 10.0, y: 10.0, timestamp: 0.0 }, &mut view, &GeoEngine);
        note.handle_input(NoteInput::PointerMove { x: 20.0, y: 10.0, timestamp: 5.0 }, &mut view, &GeoEngine);
        assert!(!note.focused());
        note.handle_input(NoteInput::Blur, &mut view, &GeoEngine);
        assert!(!note.take_events().contains(&NoteEvent::Blur));
    }

    #[test]
    fn click_without_movement_focuses() {
        let mut view = test_view();
        let mut note = placed_note(polygon_graphic("p"), "note", None);
        note.handle_input(NoteInput::PointerDown { x: 10.0, y: 10.0, timestamp: 0.0 }, &mut view, &GeoEngine);
        note.handle_input(NoteInput::PointerUp, &mut view, &GeoEngine);
        assert!(note.focused());
        assert!(note.take_events().is_empty());
    }

    #[test]
    fn to_graphic_offsets_round_trip() {
        let view = test_view();
        let note = placed_note(line_graphic("l", 0.0, 0.0), "note", None);
        let graphic = note.to_graphic(&view).unwrap();
        let anchor = note.anchor().unwrap();

        let (x, y) = match &graphic.geometry {
            Geometry::Point(p) => (p.x, p.y),
            _ => panic!("expected a point"),
        };
        assert!(MapPoint { x, y }.equals(&anchor));

        let s = view.to_screen(&anchor);
        let moved = view.to_map(&ScreenPoint {
            x: s.x + graphic.symbol.xoffset,
            y: s.y - graphic.symbol.yoffset,
        });
        assert!(moved.equals(&note.map_point().unwrap()));
        assert_eq!(graphic.attributes.object_id, 1);
        assert_eq!(graphic.attributes.text, "note");
        assert_eq!(graphic.symbol.text, "note");
    }

    #[test]
    fn to_graphic_requires_a_placed_note() {
        let view = test_view();
        let unrendered: Note<FakeElement> = Note::new(1, Rc::new(polygon_graphic("p")), "note", options(None), PlacementConfig::default());
        assert!(unrendered.to_graphic(&view).is_none());
        let empty = placed_note(polygon_graphic("p"), "", None);
        assert!(empty.to_graphic(&view).is_none());
    }

    #[test]
    fn placement_errors_leave_map_point_unset() {
        let mut graphic = polygon_graphic("p");
        graphic.geometry = Geometry::Polyline(Polyline::default());
        let note = placed_note(graphic, "note", None);
        assert!(note.map_point().is_none());
        assert!(note.to_graphic(&test_view()).is_none());
    }

    #[test]
    fn destroy_is_idempotent() {
        let mut note = placed_note(polygon_graphic("p"), "note", None);
        note.destroy();
        assert!(!note.has_element());
        assert!(note.is_destroyed());
        note.destroy();
        assert!(note.handle_input(NoteInput::Focus, &mut test_view(), &GeoEngine));
    }

    #[test]
    fn set_graphic_invalidates_placement() {
        let mut note = placed_note(polygon_graphic("p"), "note", None);
        assert!(note.anchor().is_some());
        note.set_graphic(Rc::new(point_graphic("q", 5.0, 5.0)));
        assert!(note.anchor().is_none());
        note.update_position(&test_view(), &GeoEngine);
        assert!(note.anchor().unwrap().equals(&MapPoint { x: 5.0, y: 5.0 }));
    }

    #[test]
    fn event_names() {
        assert_eq!(NoteEvent::DragStop.name(), "drag-stop");
        assert_eq!(NoteEvent::UpdateText { text: String::new() }.name(), "update-text");
        let json = serde_json::to_value(&NoteEvent::Hover { hovered: true }).unwrap();
        assert_eq!(json["type"], "hover");
    }
}
