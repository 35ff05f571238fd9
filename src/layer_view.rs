use std::{cell::RefCell, rc::Rc};

use serde_derive::{Deserialize, Serialize};

use crate::{
    geometry::{GeometryEngine, PointGeometry, ScreenPoint},
    layer::{LayerChange, NotesLayer},
    log::log_status,
    note::{ElementFactory, NoteEvent, NoteId, NoteInput},
    view::MapView,
};

/// Element input waiting for the next render, filled by the DOM listeners
pub type InputQueue = Rc<RefCell<Vec<(NoteId, NoteInput)>>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitAttributes {
    pub id: NoteId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitResult {
    pub geometry: PointGeometry,
    pub attributes: HitAttributes,
}

/// Keeps the note elements of a layer in sync with the map view
pub struct NotesLayerView<F: ElementFactory> {
    factory: F,
    inputs: InputQueue,
    attached: bool,
    dirty: bool,
}

impl<F: ElementFactory> NotesLayerView<F> {

    pub fn new(factory: F, inputs: InputQueue) -> Self {
        Self {
            factory,
            inputs,
            attached: false,
            dirty: false,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// Called by the host whenever the view extent changed
    pub fn extent_changed(&mut self) {
        self.dirty = true;
    }

    /// Creates elements for the notes already in the layer
    pub fn attach(&mut self, layer: &mut NotesLayer<F::Element>, view: &dyn MapView, geo: &dyn GeometryEngine) {
        if self.attached {
            return;
        }
        self.attached = true;
        let ids = layer.notes().iter().map(|n| n.id()).collect::<Vec<_>>();
        for id in ids {
            self.add_note_element(layer, id, false, view, geo);
        }
        // adds before the attach are handled above
        layer.take_changes();
        self.dirty = true;
    }

    /// Removes all elements, queued input is dropped
    pub fn detach(&mut self, layer: &mut NotesLayer<F::Element>) {
        if !self.attached {
            return;
        }
        self.attached = false;
        layer.remove_elements();
        self.inputs.borrow_mut().clear();
        self.dirty = false;
    }

    fn add_note_element(
        &mut self,
        layer: &mut NotesLayer<F::Element>,
        id: NoteId,
        focus: bool,
        view: &dyn MapView,
        geo: &dyn GeometryEngine,
    ) {
        if let Err(e) = layer.create_element(id, &mut self.factory, view, geo, focus) {
            log_status(&format!("note {id}: {e}"));
        }
        self.dirty = true;
    }

    fn apply_changes(&mut self, layer: &mut NotesLayer<F::Element>, view: &dyn MapView, geo: &dyn GeometryEngine) {
        loop {
            let changes = layer.take_changes();
            if changes.is_empty() {
                break;
            }
            for change in changes {
                match change {
                    LayerChange::Added { id, focus } => self.add_note_element(layer, id, focus, view, geo),
                    LayerChange::Removed(_) => self.dirty = true,
                    LayerChange::Note(_, NoteEvent::UpdatePosition { .. }) => {},
                    LayerChange::Note(_, _) => self.dirty = true,
                }
            }
        }
    }

    /// One frame: handle input, sync elements, drop emptied notes, and if
    /// anything changed reposition and collide
    pub fn render(&mut self, layer: &mut NotesLayer<F::Element>, view: &mut dyn MapView, geo: &dyn GeometryEngine) {
        if !self.attached {
            return;
        }

        let inputs = std::mem::take(&mut *self.inputs.borrow_mut());
        for (id, input) in inputs {
            layer.dispatch_input(id, input, view, geo);
        }

        self.apply_changes(layer, &*view, geo);

        if !layer.remove_empty_notes().is_empty() {
            self.apply_changes(layer, &*view, geo);
        }

        if !self.dirty {
            return;
        }
        if layer.config().collide_when_stationary && !view.stationary() {
            return;
        }

        self.dirty = false;
        layer.update_note_positions(&*view, geo);
        layer.collide_notes();
        // position updates of this pass must not trigger another one
        layer.take_changes();
    }

    /// First visible note under the screen point
    pub fn hit_test(&self, layer: &NotesLayer<F::Element>, x: f64, y: f64) -> Option<HitResult> {
        let p = ScreenPoint { x, y };
        let note = layer.notes().iter()
            .filter(|n| !n.hidden() && n.has_element())
            .find(|n| n.screen_rect().map_or(false, |r| r.contains(&p)))?;
        let map_point = note.map_point()?;
        Some(HitResult {
            geometry: PointGeometry {
                x: map_point.x,
                y: map_point.y,
                spatial_reference: note.graphic().geometry.spatial_reference().cloned(),
            },
            attributes: HitAttributes {
                id: note.id(),
                text: note.text().to_string(),
            },
        })
    }
}
