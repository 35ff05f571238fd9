use std::rc::Rc;

use config::NotesConfig;
use dom::{DomElementFactory, DomNoteElement};
use fonts::FontRequest;
use geometry::{GeoEngine, Graphic};
use layer::{EventOutbox, NoteInit, NotesLayer};
use layer_view::{InputQueue, NotesLayerView};
use log::log_status;
use view::ViewState;
use wasm_bindgen::prelude::*;

pub mod geometry;
pub mod view;
pub mod placement;
pub mod fonts;
pub mod symbol;
pub mod note;
pub mod collide;
pub mod layer;
pub mod layer_view;
pub mod dom;
pub mod config;
pub mod log;

#[cfg(test)]
mod testing;

/// Maps a CSS font (JSON `{ fontFamily, fontStyle, fontWeight, fontSize }`)
/// onto a font text symbols can use
#[wasm_bindgen]
pub fn get_font_settings(request: String) -> String {
    let request = match serde_json::from_str::<FontRequest>(&request) {
        Ok(o) => o,
        Err(e) => return e.to_string(),
    };
    serde_json::to_string(&fonts::get_font_settings(&request)).unwrap_or_default()
}

/// Notes layer bound to one map view. The host pushes view snapshots with
/// `set_view` and calls `render` once per frame.
#[wasm_bindgen]
pub struct MapNotes {
    layer: NotesLayer<DomNoteElement>,
    layer_view: Option<NotesLayerView<DomElementFactory>>,
    view: ViewState,
    inputs: InputQueue,
    engine: GeoEngine,
}

#[wasm_bindgen]
impl MapNotes {

    #[wasm_bindgen(constructor)]
    pub fn new(config: String) -> MapNotes {
        MapNotes {
            layer: NotesLayer::new(NotesConfig::from_string(&config)),
            layer_view: None,
            view: ViewState::default(),
            inputs: InputQueue::default(),
            engine: GeoEngine,
        }
    }

    /// Renders the notes into `surface`, positioned according to `view`
    pub fn attach(&mut self, surface: web_sys::HtmlElement, view: String) -> Result<(), String> {
        self.view = ViewState::from_string(&view)?;
        let factory = DomElementFactory::new(surface, self.inputs.clone())?;
        let mut layer_view = NotesLayerView::new(factory, self.inputs.clone());
        layer_view.attach(&mut self.layer, &self.view, &self.engine);
        self.layer_view = Some(layer_view);
        Ok(())
    }

    pub fn detach(&mut self) {
        if let Some(mut lv) = self.layer_view.take() {
            lv.detach(&mut self.layer);
        }
    }

    pub fn set_view(&mut self, view: String) -> Result<(), String> {
        let next = ViewState::from_string(&view)?;
        if self.view.update(next) {
            if let Some(lv) = self.layer_view.as_mut() {
                lv.extent_changed();
            }
        }
        Ok(())
    }

    /// Returns the id of the new note
    pub fn add_note(&mut self, graphic: String, init: String) -> Result<u32, String> {
        let graphic = Graphic::from_string(&graphic)?;
        let init = NoteInit::from_string(&init)?;
        Ok(self.layer.add_note_for_graphic(Rc::new(graphic), init))
    }

    pub fn update_graphic(&mut self, graphic: String) -> Result<Option<u32>, String> {
        let graphic = Graphic::from_string(&graphic)?;
        let id = self.layer.update_graphic(Rc::new(graphic));
        if let (Some(_), Some(lv)) = (id, self.layer_view.as_mut()) {
            lv.set_dirty(true);
        }
        Ok(id)
    }

    pub fn remove_note(&mut self, graphic_uid: String) -> Option<u32> {
        self.layer.remove_note_for_graphic(&graphic_uid)
    }

    pub fn set_hovered(&mut self, graphic_uid: Option<String>) {
        self.layer.set_hovered_note_for_graphic(graphic_uid.as_deref());
    }

    pub fn set_selected(&mut self, graphic_uid: Option<String>) {
        self.layer.set_selected_note_for_graphic(graphic_uid.as_deref());
    }

    pub fn render(&mut self) {
        if let Some(lv) = self.layer_view.as_mut() {
            lv.render(&mut self.layer, &mut self.view, &self.engine);
        }
    }

    /// JSON `{ geometry, attributes: { id, text } }` of the note under the point, or `null`
    pub fn hit_test(&self, x: f64, y: f64) -> String {
        let hit = self.layer_view.as_ref().and_then(|lv| lv.hit_test(&self.layer, x, y));
        serde_json::to_string(&hit).unwrap_or_default()
    }

    /// All notes as JSON text graphics
    pub fn to_graphics(&self) -> String {
        serde_json::to_string(&self.layer.to_graphics(&self.view)).unwrap_or_default()
    }

    pub fn dragging(&self) -> bool {
        self.layer.dragging()
    }

    /// Cursor the host should show over the map while notes are dragged
    pub fn cursor(&self) -> Option<String> {
        self.view.cursor.clone()
    }

    /// `callback` receives every note event as a JSON string. Delivery is
    /// deferred to a microtask so the callback may call back into the layer.
    pub fn set_event_callback(&mut self, callback: js_sys::Function) {
        let outbox = EventOutbox::default();
        self.layer.set_event_handler(Box::new(move |event| {
            if !outbox.push(event) {
                return;
            }
            let outbox = outbox.clone();
            let callback = callback.clone();
            wasm_bindgen_futures::spawn_local(async move {
                for json in outbox.drain() {
                    if let Err(e) = callback.call1(&JsValue::NULL, &JsValue::from_str(&json)) {
                        log_status(&format!("event callback failed: {e:?}"));
                    }
                }
            });
        }));
    }

    pub fn destroy(&mut self) {
        self.detach();
        self.layer.destroy();
    }
}
