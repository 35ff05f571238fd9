use serde_derive::{Deserialize, Serialize};

use crate::{
    geometry::{MapPoint, Octant},
    log::log_status,
    note::NoteOptions,
    placement::{default_point_alignments, PlacementConfig},
};

fn default_true() -> bool {
    true
}

/// Layer wide settings, passed as JSON from the host page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotesConfig {
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub text_placeholder: String,
    #[serde(default)]
    pub css_class: Option<String>,
    #[serde(default)]
    pub text_max_characters: Option<usize>,
    /// Hovered notes win collisions against notes that are only newer
    #[serde(default)]
    pub hover_priority: bool,
    /// Skip position updates and collisions while the view is panning or zooming
    #[serde(default = "default_true")]
    pub collide_when_stationary: bool,
    #[serde(default = "default_true")]
    pub outside_polygon: bool,
    #[serde(default = "default_point_alignments")]
    pub point_alignments: Vec<Octant>,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            editable: false,
            text_placeholder: String::new(),
            css_class: None,
            text_max_characters: None,
            hover_priority: false,
            collide_when_stationary: true,
            outside_polygon: true,
            point_alignments: default_point_alignments(),
        }
    }
}

impl NotesConfig {

    /// Empty or invalid JSON gives the default config
    pub fn from_string(s: &str) -> NotesConfig {
        if s.trim().is_empty() {
            return NotesConfig::default();
        }
        match serde_json::from_str::<NotesConfig>(s) {
            Ok(o) => o,
            Err(e) => {
                log_status(&format!("invalid config, using defaults: {e}"));
                NotesConfig::default()
            },
        }
    }

    pub fn note_options(&self) -> NoteOptions {
        NoteOptions {
            editable: self.editable,
            text_placeholder: self.text_placeholder.clone(),
            css_class: self.css_class.clone(),
            text_max_characters: self.text_max_characters,
        }
    }

    pub fn placement(&self, hint: Option<MapPoint>) -> PlacementConfig {
        PlacementConfig {
            hint,
            point_alignments: self.point_alignments.clone(),
            outside_polygon: self.outside_polygon,
        }
    }
}
