//! Anchor placement for notes.
//!
//! A note is positioned relative to an *anchor*, a point on or near the
//! geometry of its graphic, and a unit *vector* pointing from the note
//! towards that anchor. Both are derived once from the geometry (and the
//! optional placement hint) and kept until the placement is invalidated,
//! e.g. when the user drags the note. Every later position update only
//! rescales the offset for the current zoom level and note size.
//!
//! Sign convention: `vector` points from the note side towards the geometry.
//! The note is pushed along `-vector`, and the half-size shift uses the
//! octant of `-vector`, so the note box always moves away from the geometry.

use serde_derive::{Deserialize, Serialize};

use crate::{
    geometry::{
        px_to_map, Extent, Geometry, GeometryEngine, MapPoint, MarkerSymbol, Octant, PointGeometry,
        Polyline, ScreenPoint, ScreenSize, Vector,
    },
    view::MapView,
};

/// Gap between a line / polygon and its note at the zoom level the note was placed at
pub const ANCHOR_BUFFER_PX: f64 = 15.0;
/// Zooming out this many levels from the initial zoom reaches the smallest gap
pub const ZOOM_TAPER_RANGE: f64 = 3.0;
/// Fraction of the gap removed when fully zoomed out
pub const ZOOM_TAPER_FACTOR: f64 = 0.5;
/// Gap between a point marker and its note
pub const POINT_BUFFER_X_PX: f64 = 6.0;
pub const POINT_BUFFER_Y_PX: f64 = 3.0;

fn default_true() -> bool {
    true
}

pub fn default_point_alignments() -> Vec<Octant> {
    vec![
        Octant::S,
        Octant::N,
        Octant::E,
        Octant::W,
        Octant::SE,
        Octant::SW,
        Octant::NE,
        Octant::NW,
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementConfig {
    /// Desired location of the note, set by the caller or while dragging
    #[serde(default)]
    pub hint: Option<MapPoint>,
    /// Candidate alignments for point graphics, earlier entries win ties
    #[serde(default = "default_point_alignments")]
    pub point_alignments: Vec<Octant>,
    /// Whether polygon notes may be pushed outside the polygon
    #[serde(default = "default_true")]
    pub outside_polygon: bool,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            hint: None,
            point_alignments: default_point_alignments(),
            outside_polygon: true,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum AnchorState {
    Unplaced,
    Placed { anchor: MapPoint, vector: Vector },
}

/// Everything about the note that placement depends on
#[derive(Debug, Clone, Copy)]
pub struct PlacementInput<'a> {
    pub geometry: &'a Geometry,
    pub symbol: Option<&'a MarkerSymbol>,
    pub note_size: ScreenSize,
    pub focused: bool,
    pub config: &'a PlacementConfig,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PointCandidate {
    pub alignment: Octant,
    pub point: MapPoint,
}

/// Per-note placement state
#[derive(Debug, Clone)]
pub struct PlacementEngine {
    state: AnchorState,
    initial_zoom: Option<f64>,
    last_alignment: Option<Octant>,
}

impl Default for PlacementEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PlacementEngine {

    pub fn new() -> Self {
        Self {
            state: AnchorState::Unplaced,
            initial_zoom: None,
            last_alignment: None,
        }
    }

    pub fn state(&self) -> AnchorState {
        self.state
    }

    pub fn anchor(&self) -> Option<MapPoint> {
        match self.state {
            AnchorState::Placed { anchor, .. } => Some(anchor),
            AnchorState::Unplaced => None,
        }
    }

    pub fn vector(&self) -> Option<Vector> {
        match self.state {
            AnchorState::Placed { vector, .. } => Some(vector),
            AnchorState::Unplaced => None,
        }
    }

    pub fn initial_zoom(&self) -> Option<f64> {
        self.initial_zoom
    }

    pub fn last_alignment(&self) -> Option<Octant> {
        self.last_alignment
    }

    /// Forget anchor and vector, the next position update derives them again
    pub fn invalidate(&mut self) {
        self.state = AnchorState::Unplaced;
    }

    /// Current map location of the note's visual center
    pub fn compute_position(
        &mut self,
        input: &PlacementInput,
        view: &dyn MapView,
        engine: &dyn GeometryEngine,
    ) -> Result<MapPoint, String> {
        let initial_zoom = *self.initial_zoom.get_or_insert(view.zoom());

        match input.geometry {
            Geometry::Point(point) => self.place_point(point, input, view),
            Geometry::Polyline(line) => {
                let (anchor, vector) = self.placed(|| {
                    line_anchor(input.geometry, line, input.config.hint.as_ref(), engine)
                })?;
                let buffer = tapered_buffer(initial_zoom, view.zoom());
                Ok(anchored_offset(anchor, vector, input.note_size, buffer, view.resolution()))
            },
            Geometry::Polygon(_) => {
                let (anchor, vector) = self.placed(|| {
                    polygon_anchor(
                        input.geometry,
                        input.config.hint.as_ref(),
                        input.config.outside_polygon,
                        engine,
                    )
                })?;
                let buffer = tapered_buffer(initial_zoom, view.zoom());
                Ok(anchored_offset(anchor, vector, input.note_size, buffer, view.resolution()))
            },
        }
    }

    fn placed<F>(&mut self, derive: F) -> Result<(MapPoint, Vector), String>
        where F: FnOnce() -> Result<(MapPoint, Vector), String>
    {
        match self.state {
            AnchorState::Placed { anchor, vector } => Ok((anchor, vector)),
            AnchorState::Unplaced => {
                let (anchor, vector) = derive()?;
                self.state = AnchorState::Placed { anchor, vector };
                Ok((anchor, vector))
            },
        }
    }

    fn place_point(
        &mut self,
        point: &PointGeometry,
        input: &PlacementInput,
        view: &dyn MapView,
    ) -> Result<MapPoint, String> {
        let (anchor, _) = self.placed(|| Ok((point.map_point(), Vector::ZERO)))?;

        let candidates = point_candidates(
            &anchor,
            input.symbol,
            input.note_size,
            &input.config.point_alignments,
            view,
        );

        // keep the alignment fixed while the note is being edited
        let frozen = match self.last_alignment {
            Some(last) if input.focused => candidates.iter().find(|c| c.alignment == last).copied(),
            _ => None,
        };

        let chosen = match frozen {
            Some(c) => c,
            None => choose_candidate(&candidates, input.config.hint.as_ref())
                .ok_or_else(|| "no point alignments configured".to_string())?,
        };

        self.last_alignment = Some(chosen.alignment);
        Ok(chosen.point)
    }
}

/// One candidate note position per alignment, in the order given
pub fn point_candidates(
    anchor: &MapPoint,
    symbol: Option<&MarkerSymbol>,
    note_size: ScreenSize,
    alignments: &[Octant],
    view: &dyn MapView,
) -> Vec<PointCandidate> {
    let symbol_size = symbol.map(|s| s.size_px()).unwrap_or_default();
    let (symbol_dx, symbol_dy) = symbol.map(|s| s.offset_px()).unwrap_or((0.0, 0.0));

    let screen = view.to_screen(anchor);
    let marker = ScreenPoint {
        x: screen.x + symbol_dx,
        y: screen.y + symbol_dy,
    };

    let dist_x = (symbol_size.width + note_size.width) / 2.0 + POINT_BUFFER_X_PX;
    let dist_y = (symbol_size.height + note_size.height) / 2.0 + POINT_BUFFER_Y_PX;

    alignments.iter().map(|alignment| {
        let (ox, oy) = alignment.screen_offset();
        let candidate = ScreenPoint {
            x: marker.x + ox * dist_x,
            y: marker.y + oy * dist_y,
        };
        PointCandidate {
            alignment: *alignment,
            point: view.to_map(&candidate),
        }
    }).collect()
}

/// Candidate closest to the hint, the first candidate without a hint.
/// Ties go to the candidate listed first.
pub fn choose_candidate(candidates: &[PointCandidate], hint: Option<&MapPoint>) -> Option<PointCandidate> {
    let first = *candidates.first()?;
    let hint = match hint {
        Some(h) => h,
        None => return Some(first),
    };

    let mut best = first;
    let mut best_dist = first.point.dist(hint);
    for c in candidates.iter().skip(1) {
        let d = c.point.dist(hint);
        if d < best_dist {
            best = *c;
            best_dist = d;
        }
    }
    Some(best)
}

/// Anchor and outward normal for a polyline
pub fn line_anchor(
    geometry: &Geometry,
    line: &Polyline,
    hint: Option<&MapPoint>,
    engine: &dyn GeometryEngine,
) -> Result<(MapPoint, Vector), String> {
    match hint {
        Some(hint) => {
            let anchor = engine.nearest_coordinate(geometry, hint)
                .ok_or_else(|| "no nearest coordinate on polyline".to_string())?;
            let vector = hint.vector_to(&anchor).normalize();
            // hint right on the line
            if vector.is_zero() {
                return Ok((anchor, chord_normal(line)?));
            }
            Ok((anchor, vector))
        },
        None => {
            let center = geometry.vertex_average()
                .ok_or_else(|| "polyline has no vertices".to_string())?;
            let anchor = engine.nearest_coordinate(geometry, &center)
                .ok_or_else(|| "no nearest coordinate on polyline".to_string())?;
            Ok((anchor, chord_normal(line)?))
        },
    }
}

/// Normal perpendicular to the line from the first to the last vertex
fn chord_normal(line: &Polyline) -> Result<Vector, String> {
    let (first, last) = line.chord()
        .ok_or_else(|| "polyline has no vertices".to_string())?;
    Ok(first.vector_to(&last).rotate_90deg_ccw().normalize())
}

/// Where a polygon note goes without a hint: bottom center of the extent
/// for wide polygons, right center for tall ones
pub fn default_polygon_point(extent: &Extent) -> MapPoint {
    let center = extent.center();
    if extent.width() > extent.height() {
        MapPoint { x: center.x, y: extent.min_y }
    } else {
        MapPoint { x: extent.max_x, y: center.y }
    }
}

/// Anchor and push vector for a polygon
pub fn polygon_anchor(
    geometry: &Geometry,
    hint: Option<&MapPoint>,
    outside_polygon: bool,
    engine: &dyn GeometryEngine,
) -> Result<(MapPoint, Vector), String> {
    let near = match hint {
        Some(h) => *h,
        None => {
            let extent = geometry.extent().ok_or_else(|| "polygon has no vertices".to_string())?;
            default_polygon_point(&extent)
        },
    };

    let distance = engine.distance(geometry, &near)
        .ok_or_else(|| "polygon has no vertices".to_string())?;

    // inside the polygon: the note stays where it is
    if distance <= 0.0 {
        return Ok((near, Vector::ZERO));
    }

    let anchor = engine.nearest_boundary_coordinate(geometry, &near)
        .ok_or_else(|| "no nearest coordinate on polygon".to_string())?;

    let vector = if outside_polygon {
        near.vector_to(&anchor).normalize()
    } else {
        Vector::ZERO
    };

    Ok((anchor, vector))
}

/// Gap in pixels, shrinking linearly to half of `ANCHOR_BUFFER_PX` over the
/// first three zoom levels out from `initial_zoom`
pub fn tapered_buffer(initial_zoom: f64, zoom: f64) -> f64 {
    let zoom_diff = (initial_zoom - zoom).max(0.0).min(ZOOM_TAPER_RANGE);
    ANCHOR_BUFFER_PX * (1.0 - (zoom_diff / ZOOM_TAPER_RANGE) * ZOOM_TAPER_FACTOR)
}

/// Note center for an anchor / vector pair: `buffer_px` away from the anchor
/// against the vector, plus half the note size towards the same side
pub fn anchored_offset(
    anchor: MapPoint,
    vector: Vector,
    note_size: ScreenSize,
    buffer_px: f64,
    resolution: f64,
) -> MapPoint {
    let point = anchor.translate(&vector.scale(-px_to_map(buffer_px, resolution)));
    if vector.is_zero() {
        return point;
    }

    let o = vector.invert().octant().offset();
    point.translate(&Vector {
        x: o.x * px_to_map(note_size.width / 2.0, resolution),
        y: o.y * px_to_map(note_size.height / 2.0, resolution),
    })
}
