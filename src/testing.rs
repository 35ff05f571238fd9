//! In-memory note elements for unit tests

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    geometry::{Geometry, Graphic, PointGeometry, Polygon, Polyline, ScreenSize},
    note::{ElementFactory, ElementSpec, NoteElement},
    symbol::ComputedTextStyle,
};

/// Text is laid out as 5 px per char plus 20 px padding, 20 px high
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FakeElement {
    pub spec: Option<ElementSpec>,
    pub text: String,
    pub position: Option<(f64, f64)>,
    pub classes: BTreeSet<String>,
    pub visible: bool,
    pub focused: bool,
    pub removed: bool,
    pub style: ComputedTextStyle,
}

impl NoteElement for FakeElement {

    fn text(&self) -> String {
        self.text.clone()
    }

    fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
    }

    fn size(&self) -> ScreenSize {
        ScreenSize {
            width: 20.0 + 5.0 * self.text.chars().count() as f64,
            height: 20.0,
        }
    }

    fn set_position(&mut self, left: f64, top: f64) {
        self.position = Some((left, top));
    }

    fn set_class(&mut self, class: &str, on: bool) {
        if on {
            self.classes.insert(class.to_string());
        } else {
            self.classes.remove(class);
        }
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn is_focused(&self) -> bool {
        self.focused
    }

    fn focus(&mut self) {
        self.focused = true;
    }

    fn blur(&mut self) {
        self.focused = false;
    }

    fn computed_style(&self) -> ComputedTextStyle {
        self.style.clone()
    }

    fn remove(&mut self) {
        self.removed = true;
    }
}

#[derive(Debug, Default)]
pub struct FakeFactory {
    pub created: usize,
    pub fail: bool,
}

impl ElementFactory for FakeFactory {
    type Element = FakeElement;

    fn create(&mut self, spec: &ElementSpec) -> Result<FakeElement, String> {
        if self.fail {
            return Err("cannot create element".to_string());
        }
        self.created += 1;
        Ok(FakeElement {
            spec: Some(spec.clone()),
            text: spec.text.clone(),
            visible: true,
            style: ComputedTextStyle {
                color: "rgb(0, 0, 0)".to_string(),
                background_color: "rgb(255, 255, 255)".to_string(),
                font_family: "Arial".to_string(),
                font_style: "normal".to_string(),
                font_weight: "400".to_string(),
                font_size: "16px".to_string(),
            },
            ..Default::default()
        })
    }
}

pub fn point_graphic(uid: &str, x: f64, y: f64) -> Graphic {
    Graphic {
        uid: uid.to_string(),
        geometry: Geometry::Point(PointGeometry { x, y, spatial_reference: None }),
        symbol: None,
        attributes: BTreeMap::new(),
    }
}

/// Horizontal line from (x, y) to (x + 10, y)
pub fn line_graphic(uid: &str, x: f64, y: f64) -> Graphic {
    Graphic {
        uid: uid.to_string(),
        geometry: Geometry::Polyline(Polyline {
            paths: vec![vec![[x, y], [x + 10.0, y]]],
            spatial_reference: None,
        }),
        symbol: None,
        attributes: BTreeMap::new(),
    }
}

/// Clockwise 10 x 10 square with its lower left corner at the origin
pub fn polygon_graphic(uid: &str) -> Graphic {
    Graphic {
        uid: uid.to_string(),
        geometry: Geometry::Polygon(Polygon {
            rings: vec![vec![[0.0, 0.0], [0.0, 10.0], [10.0, 10.0], [10.0, 0.0], [0.0, 0.0]]],
            spatial_reference: None,
        }),
        symbol: None,
        attributes: BTreeMap::new(),
    }
}
