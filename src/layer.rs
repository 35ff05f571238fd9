use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use serde_derive::{Deserialize, Serialize};

use crate::{
    collide::{resolve_collisions, CollisionCandidate},
    config::NotesConfig,
    geometry::{GeometryEngine, Graphic, MapPoint},
    log::log_status,
    note::{ElementFactory, Note, NoteElement, NoteEvent, NoteId, NoteInput},
    symbol::NoteGraphic,
    view::MapView,
};

/// Optional per-note settings for `add_note_for_graphic`
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteInit {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub placement_hint: Option<MapPoint>,
    /// Start editing as soon as the element exists
    #[serde(default)]
    pub focus: bool,
}

impl NoteInit {
    pub fn from_string(s: &str) -> Result<NoteInit, String> {
        if s.trim().is_empty() {
            return Ok(NoteInit::default());
        }
        serde_json::from_str::<NoteInit>(s).map_err(|e| format!("invalid note options: {e}"))
    }
}

/// What the layer view has to react to
#[derive(Debug, Clone, PartialEq)]
pub enum LayerChange {
    Added { id: NoteId, focus: bool },
    Removed(NoteId),
    Note(NoteId, NoteEvent),
}

/// Event as handed to the host application, `kind` is `note-add`, `note-hover`, ...
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub note_id: NoteId,
    pub graphic_uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<NoteEvent>,
}

pub type EventHandler = Box<dyn FnMut(&LayerEvent)>;

/// Serialized events waiting for the host. Events are raised while the
/// layer is borrowed, so they are handed over once the current call returned.
#[derive(Debug, Default, Clone)]
pub struct EventOutbox {
    queue: Rc<RefCell<VecDeque<String>>>,
}

impl EventOutbox {

    /// Returns true for the first event after the outbox was drained,
    /// that is when a delivery has to be scheduled
    pub fn push(&self, event: &LayerEvent) -> bool {
        let json = match serde_json::to_string(event) {
            Ok(o) => o,
            Err(e) => {
                log_status(&format!("cannot serialize {}: {e}", event.kind));
                return false;
            },
        };
        let mut queue = self.queue.borrow_mut();
        queue.push_back(json);
        queue.len() == 1
    }

    pub fn drain(&self) -> Vec<String> {
        self.queue.borrow_mut().drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}

/// Creates and owns the notes attached to graphics of other layers
pub struct NotesLayer<E: NoteElement> {
    notes: Vec<Note<E>>,
    next_id: NoteId,
    config: NotesConfig,
    handler: EventHandler,
    changes: Vec<LayerChange>,
}

impl<E: NoteElement> NotesLayer<E> {

    pub fn new(config: NotesConfig) -> Self {
        Self {
            notes: Vec::new(),
            next_id: 0,
            config,
            handler: Box::new(|_| {}),
            changes: Vec::new(),
        }
    }

    pub fn config(&self) -> &NotesConfig {
        &self.config
    }

    pub fn set_event_handler(&mut self, handler: EventHandler) {
        self.handler = handler;
    }

    /// Notes in insertion order
    pub fn notes(&self) -> &[Note<E>] {
        &self.notes
    }

    pub fn take_changes(&mut self) -> Vec<LayerChange> {
        std::mem::take(&mut self.changes)
    }

    fn emit(&mut self, change: LayerChange, note_id: NoteId, graphic_uid: String) {
        let (kind, detail) = match &change {
            LayerChange::Added { .. } => ("note-add".to_string(), None),
            LayerChange::Removed(_) => ("note-remove".to_string(), None),
            LayerChange::Note(_, e) => (format!("note-{}", e.name()), Some(e.clone())),
        };
        (self.handler)(&LayerEvent { kind, note_id, graphic_uid, detail });
        self.changes.push(change);
    }

    /// Forward everything the notes have emitted since the last call
    fn forward_note_events(&mut self) {
        let pending = self.notes.iter_mut()
            .flat_map(|n| {
                let id = n.id();
                let uid = n.graphic().uid.clone();
                n.take_events().into_iter().map(move |e| (id, uid.clone(), e))
            })
            .collect::<Vec<_>>();
        for (id, uid, e) in pending {
            self.emit(LayerChange::Note(id, e), id, uid);
        }
    }

    pub fn add_note_for_graphic(&mut self, graphic: Rc<Graphic>, init: NoteInit) -> NoteId {
        let id = self.next_id;
        self.next_id += 1;
        let uid = graphic.uid.clone();
        let note = Note::new(
            id,
            graphic,
            init.text.as_deref().unwrap_or_default(),
            self.config.note_options(),
            self.config.placement(init.placement_hint),
        );
        self.notes.push(note);
        self.emit(LayerChange::Added { id, focus: init.focus }, id, uid);
        id
    }

    pub fn remove_note_for_graphic(&mut self, graphic_uid: &str) -> Option<NoteId> {
        let id = self.find_note_for_graphic(graphic_uid)?.id();
        self.remove_note(id)
    }

    /// Destroys the note with this id, graphics may carry more than one note
    pub fn remove_note(&mut self, id: NoteId) -> Option<NoteId> {
        let pos = self.notes.iter().position(|n| n.id() == id)?;
        let mut note = self.notes.remove(pos);
        let uid = note.graphic().uid.clone();
        note.destroy();
        self.emit(LayerChange::Removed(id), id, uid);
        Some(id)
    }

    /// Swap in a new version of a graphic (same uid), its note is placed again
    pub fn update_graphic(&mut self, graphic: Rc<Graphic>) -> Option<NoteId> {
        let note = self.notes.iter_mut().find(|n| n.graphic().uid == graphic.uid)?;
        note.set_graphic(graphic);
        Some(note.id())
    }

    pub fn find_note_for_id(&self, id: NoteId) -> Option<&Note<E>> {
        self.notes.iter().find(|n| n.id() == id)
    }

    pub fn find_note_for_graphic(&self, graphic_uid: &str) -> Option<&Note<E>> {
        self.notes.iter().find(|n| n.graphic().uid == graphic_uid)
    }

    fn note_mut(&mut self, id: NoteId) -> Option<&mut Note<E>> {
        self.notes.iter_mut().find(|n| n.id() == id)
    }

    /// Hover the note of the graphic and un-hover every other rendered note
    pub fn set_hovered_note_for_graphic(&mut self, graphic_uid: Option<&str>) {
        let target = graphic_uid.and_then(|uid| self.find_note_for_graphic(uid)).map(|n| n.id());
        for note in self.notes.iter_mut().filter(|n| n.has_element()) {
            let state = Some(note.id()) == target;
            note.set_hover(state);
        }
        self.forward_note_events();
    }

    pub fn set_selected_note_for_graphic(&mut self, graphic_uid: Option<&str>) {
        let target = graphic_uid.and_then(|uid| self.find_note_for_graphic(uid)).map(|n| n.id());
        for note in self.notes.iter_mut().filter(|n| n.has_element()) {
            let state = Some(note.id()) == target;
            note.set_select(state);
        }
        self.forward_note_events();
    }

    pub fn dragging(&self) -> bool {
        self.notes.iter().any(|n| n.dragging())
    }

    pub fn create_element<F>(
        &mut self,
        id: NoteId,
        factory: &mut F,
        view: &dyn MapView,
        geo: &dyn GeometryEngine,
        focus: bool,
    ) -> Result<(), String>
        where F: ElementFactory<Element = E>
    {
        let result = match self.note_mut(id) {
            Some(note) => note.create_element(factory, view, geo, focus),
            None => Err(format!("no note with id {id}")),
        };
        self.forward_note_events();
        result
    }

    pub fn update_note_positions(&mut self, view: &dyn MapView, geo: &dyn GeometryEngine) {
        for note in self.notes.iter_mut() {
            note.update_position(view, geo);
        }
        self.forward_note_events();
    }

    /// Hide notes that overlap a note with higher priority, show all others
    pub fn collide_notes(&mut self) {
        let rendered = self.notes.iter()
            .enumerate()
            .filter(|(_, n)| n.has_element())
            .filter_map(|(i, n)| Some((i, CollisionCandidate {
                rect: n.screen_rect()?,
                dragging: n.dragging(),
                focused: n.focused(),
                selected: n.selected(),
                hovered: n.hovered(),
            })))
            .collect::<Vec<_>>();

        let candidates = rendered.iter().map(|(_, c)| *c).collect::<Vec<_>>();
        let hidden = resolve_collisions(&candidates, self.config.hover_priority);

        let mut visible = vec![true; self.notes.len()];
        for ((i, _), h) in rendered.iter().zip(hidden.iter()) {
            visible[*i] = !*h;
        }
        for (note, v) in self.notes.iter_mut().zip(visible) {
            note.set_visibility(v);
        }
    }

    /// Returns whether the default action of the DOM event may proceed
    pub fn dispatch_input(
        &mut self,
        id: NoteId,
        input: NoteInput,
        view: &mut dyn MapView,
        geo: &dyn GeometryEngine,
    ) -> bool {
        let allow = match self.note_mut(id) {
            Some(note) => note.handle_input(input, view, geo),
            None => true,
        };
        self.forward_note_events();
        allow
    }

    /// Removes notes whose text was cleared, returns their ids
    pub fn remove_empty_notes(&mut self) -> Vec<NoteId> {
        let empty = self.notes.iter()
            .filter(|n| n.empty())
            .map(|n| n.id())
            .collect::<Vec<_>>();
        empty.into_iter().filter_map(|id| self.remove_note(id)).collect()
    }

    pub fn to_graphics(&self, view: &dyn MapView) -> Vec<NoteGraphic> {
        self.notes.iter().filter_map(|n| n.to_graphic(view)).collect()
    }

    /// Remove the elements of all notes, the notes themselves stay in the layer
    pub fn remove_elements(&mut self) {
        for note in self.notes.iter_mut() {
            note.remove_element();
        }
        self.changes.clear();
    }

    /// Remove and destroy every note
    pub fn destroy(&mut self) {
        for mut note in std::mem::take(&mut self.notes) {
            note.destroy();
        }
        self.changes.clear();
    }
}
