use std::{collections::BTreeMap, f64::consts::PI};

use float_cmp::approx_eq;
use geo::{BoundingRect, Closest, ClosestPoint, EuclideanDistance};
use serde_derive::{Deserialize, Serialize};

/// Marker symbol sizes are given in points, the screen works in pixels
pub const PT_PER_PX: f64 = 0.75;

#[inline]
pub fn pt_to_px(pt: f64) -> f64 {
    pt / PT_PER_PX
}

/// Map units covered by `px` screen pixels at the given resolution (map units per pixel)
#[inline]
pub fn px_to_map(px: f64, resolution: f64) -> f64 {
    px * resolution
}

#[derive(Debug, Copy, Default, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct MapPoint {
    pub x: f64,
    pub y: f64,
}

impl MapPoint {

    pub fn translate(&self, by: &Vector) -> MapPoint {
        MapPoint {
            x: self.x + by.x,
            y: self.y + by.y,
        }
    }

    /// Vector pointing from this point to `other`
    pub fn vector_to(&self, other: &MapPoint) -> Vector {
        Vector {
            x: other.x - self.x,
            y: other.y - self.y,
        }
    }

    pub fn dist(&self, other: &Self) -> f64 {
        self.vector_to(other).length()
    }

    pub fn equals(&self, other: &Self) -> bool {
        approx_eq!(f64, self.x, other.x, epsilon = 0.001) &&
        approx_eq!(f64, self.y, other.y, epsilon = 0.001)
    }

    fn to_geo(&self) -> geo::Point<f64> {
        geo::Point::new(self.x, self.y)
    }
}

/// Direction in map space (y grows upwards)
#[derive(Debug, Copy, Default, Clone, PartialEq, PartialOrd)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
}

impl Vector {

    pub const ZERO: Vector = Vector { x: 0.0, y: 0.0 };

    #[inline]
    pub fn length(&self) -> f64 {
        self.x.hypot(self.y)
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        approx_eq!(f64, self.length(), 0.0, epsilon = 1e-12)
    }

    /// Unit vector in the same direction, a zero vector stays zero
    #[inline]
    #[must_use = "returns a new vector"]
    pub fn normalize(&self) -> Self {
        let len = self.length();
        if self.is_zero() {
            return Vector::ZERO;
        }
        Self {
            x: self.x / len,
            y: self.y / len,
        }
    }

    /// Rotate the vector 90 degrees counter-clockwise
    #[inline]
    #[must_use = "returns a new vector"]
    pub fn rotate_90deg_ccw(&self) -> Self {
        Self {
            x: -self.y,
            y: self.x,
        }
    }

    #[inline]
    #[must_use = "returns a new vector"]
    pub fn scale(&self, f: f64) -> Self {
        Self {
            x: self.x * f,
            y: self.y * f,
        }
    }

    /// Flip the sign of both x and y
    #[inline]
    #[must_use = "returns a new vector"]
    pub fn invert(&self) -> Self {
        self.scale(-1.0)
    }

    pub fn octant(&self) -> Octant {
        Octant::from_angle(self.y.atan2(self.x))
    }
}

/// One of the eight compass directions a note can be pushed towards
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Octant {
    E,
    NE,
    N,
    NW,
    W,
    SW,
    S,
    SE,
}

impl Octant {

    /// Counter-clockwise, starting at east: index `i` covers the angle `i * 45deg`
    pub const ALL: [Octant; 8] = [
        Octant::E,
        Octant::NE,
        Octant::N,
        Octant::NW,
        Octant::W,
        Octant::SW,
        Octant::S,
        Octant::SE,
    ];

    pub fn from_index(i: usize) -> Octant {
        Self::ALL[i % 8]
    }

    /// Octant containing an angle in radians (as returned by `atan2`)
    pub fn from_angle(radians: f64) -> Octant {
        let i = (8.0 * radians / (2.0 * PI) + 8.0).round();
        Self::from_index(i.max(0.0) as usize)
    }

    /// Offset in map axes (y up), not normalized: diagonals reach the corners of a box
    pub fn offset(&self) -> Vector {
        let (x, y) = match self {
            Octant::E => (1.0, 0.0),
            Octant::NE => (1.0, 1.0),
            Octant::N => (0.0, 1.0),
            Octant::NW => (-1.0, 1.0),
            Octant::W => (-1.0, 0.0),
            Octant::SW => (-1.0, -1.0),
            Octant::S => (0.0, -1.0),
            Octant::SE => (1.0, -1.0),
        };
        Vector { x, y }
    }

    /// Same offset in screen axes (y down)
    pub fn screen_offset(&self) -> (f64, f64) {
        let o = self.offset();
        (o.x, -o.y)
    }
}

#[derive(Debug, Copy, Default, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Copy, Default, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Copy, Default, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct ScreenRect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl ScreenRect {

    pub fn new(left: f64, top: f64, size: ScreenSize) -> Self {
        Self {
            left,
            top,
            right: left + size.width,
            bottom: top + size.height,
        }
    }

    /// Rects that only touch at an edge count as overlapping
    pub fn intersects(&self, other: &ScreenRect) -> bool {
        !(self.right < other.left || // self is left of other
          self.left > other.right || // self is right of other
          self.bottom < other.top || // self is above other
          self.top > other.bottom) // self is below other
    }

    pub fn contains(&self, p: &ScreenPoint) -> bool {
        p.x >= self.left && p.x <= self.right && p.y >= self.top && p.y <= self.bottom
    }
}

#[derive(Debug, Copy, Default, Clone, PartialEq, PartialOrd)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> MapPoint {
        MapPoint {
            x: (self.min_x + self.max_x) / 2.0,
            y: (self.min_y + self.max_y) / 2.0,
        }
    }

    pub fn equals(&self, other: &Self) -> bool {
        approx_eq!(f64, self.min_x, other.min_x, epsilon = 0.001) &&
        approx_eq!(f64, self.min_y, other.min_y, epsilon = 0.001) &&
        approx_eq!(f64, self.max_x, other.max_x, epsilon = 0.001) &&
        approx_eq!(f64, self.max_y, other.max_y, epsilon = 0.001)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wkid: Option<u32>,
    #[serde(default, rename = "latestWkid", skip_serializing_if = "Option::is_none")]
    pub latest_wkid: Option<u32>,
}

pub type Path = Vec<[f64; 2]>;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointGeometry {
    pub x: f64,
    pub y: f64,
    #[serde(default, rename = "spatialReference", skip_serializing_if = "Option::is_none")]
    pub spatial_reference: Option<SpatialReference>,
}

impl PointGeometry {
    pub fn map_point(&self) -> MapPoint {
        MapPoint { x: self.x, y: self.y }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    pub paths: Vec<Path>,
    #[serde(default, rename = "spatialReference", skip_serializing_if = "Option::is_none")]
    pub spatial_reference: Option<SpatialReference>,
}

impl Polyline {

    /// First vertex of the first path and last vertex of the last path
    pub fn chord(&self) -> Option<(MapPoint, MapPoint)> {
        let first = self.paths.iter().flat_map(|p| p.iter()).next()?;
        let last = self.paths.iter().rev().flat_map(|p| p.iter().rev()).next()?;
        Some((to_map_point(first), to_map_point(last)))
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub rings: Vec<Path>,
    #[serde(default, rename = "spatialReference", skip_serializing_if = "Option::is_none")]
    pub spatial_reference: Option<SpatialReference>,
}

impl Polygon {

    /// Outer rings are clockwise (negative signed area). If no ring is
    /// clockwise the rings came in the other winding order and all of them
    /// are treated as outer rings.
    pub fn outer_rings(&self) -> Vec<&Path> {
        let clockwise = self.rings.iter().filter(|r| signed_area(r) < 0.0).collect::<Vec<_>>();
        if clockwise.is_empty() {
            self.rings.iter().collect()
        } else {
            clockwise
        }
    }

    pub fn inner_rings(&self) -> Vec<&Path> {
        let outer = self.outer_rings();
        self.rings.iter().filter(|r| !outer.iter().any(|o| std::ptr::eq(*o, *r))).collect()
    }
}

fn signed_area(ring: &Path) -> f64 {
    let n = ring.len();
    if n < 3 {
        return 0.0;
    }
    (0..n).map(|i| {
        let [x1, y1] = ring[i];
        let [x2, y2] = ring[(i + 1) % n];
        x1 * y2 - x2 * y1
    }).sum::<f64>() / 2.0
}

/// Geometry of the feature a note is anchored to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Geometry {
    Point(PointGeometry),
    Polyline(Polyline),
    Polygon(Polygon),
}

impl Geometry {

    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "point",
            Geometry::Polyline(_) => "polyline",
            Geometry::Polygon(_) => "polygon",
        }
    }

    pub fn spatial_reference(&self) -> Option<&SpatialReference> {
        match self {
            Geometry::Point(p) => p.spatial_reference.as_ref(),
            Geometry::Polyline(l) => l.spatial_reference.as_ref(),
            Geometry::Polygon(p) => p.spatial_reference.as_ref(),
        }
    }

    pub fn vertices(&self) -> Vec<MapPoint> {
        match self {
            Geometry::Point(p) => vec![p.map_point()],
            Geometry::Polyline(l) => l.paths.iter().flat_map(|p| p.iter().map(to_map_point)).collect(),
            Geometry::Polygon(p) => p.rings.iter().flat_map(|r| r.iter().map(to_map_point)).collect(),
        }
    }

    /// Simple average of all vertices
    pub fn vertex_average(&self) -> Option<MapPoint> {
        let vertices = self.vertices();
        if vertices.is_empty() {
            return None;
        }
        let n = vertices.len() as f64;
        let (sx, sy) = vertices.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Some(MapPoint { x: sx / n, y: sy / n })
    }

    pub fn extent(&self) -> Option<Extent> {
        let points = self.vertices().iter().map(|p| (p.x, p.y)).collect::<Vec<_>>();
        let rect = geo::MultiPoint::from(points).bounding_rect()?;
        Some(Extent {
            min_x: rect.min().x,
            min_y: rect.min().y,
            max_x: rect.max().x,
            max_y: rect.max().y,
        })
    }
}

fn to_map_point(c: &[f64; 2]) -> MapPoint {
    MapPoint { x: c[0], y: c[1] }
}

pub fn translate_geoline(a: &Path) -> geo::LineString<f64> {
    geo::LineString(a.iter().map(|coord| geo::Coord {
        x: coord[0],
        y: coord[1],
    }).collect())
}

pub fn translate_to_geo_poly(a: &Polygon) -> geo::MultiPolygon<f64> {
    let inner = a.inner_rings();
    geo::MultiPolygon(a.outer_rings().iter().map(|outer| {
        let outer = translate_geoline(outer);
        let inner = inner.iter().map(|r| translate_geoline(r)).collect::<Vec<_>>();
        geo::Polygon::new(outer, inner)
    }).collect())
}

pub fn translate_to_geo_lines(a: &Polyline) -> geo::MultiLineString<f64> {
    geo::MultiLineString(a.paths.iter().map(translate_geoline).collect())
}

fn translate_outer_boundary(a: &Polygon) -> geo::MultiLineString<f64> {
    geo::MultiLineString(a.outer_rings().iter().map(|r| translate_geoline(r)).collect())
}

#[derive(Debug, Copy, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerOutline {
    #[serde(default)]
    pub width: f64,
}

/// Subset of a marker symbol used to keep point notes clear of the marker
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerSymbol {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub size: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub xoffset: f64,
    #[serde(default)]
    pub yoffset: f64,
    #[serde(default)]
    pub outline: Option<MarkerOutline>,
}

impl MarkerSymbol {

    pub fn is_picture_marker(&self) -> bool {
        self.kind == "picture-marker" || self.kind == "esriPMS"
    }

    pub fn size_px(&self) -> ScreenSize {
        if self.is_picture_marker() {
            ScreenSize {
                width: pt_to_px(self.width),
                height: pt_to_px(self.height),
            }
        } else {
            let size = pt_to_px(self.size + self.outline.map(|o| o.width).unwrap_or(0.0));
            ScreenSize { width: size, height: size }
        }
    }

    /// Symbol offset in screen pixels (symbol offsets point up, the screen grows down)
    pub fn offset_px(&self) -> (f64, f64) {
        (pt_to_px(self.xoffset), -pt_to_px(self.yoffset))
    }
}

/// A map feature that notes are attached to. Owned by the host application,
/// notes only hold a shared reference and never mutate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graphic {
    pub uid: String,
    pub geometry: Geometry,
    #[serde(default)]
    pub symbol: Option<MarkerSymbol>,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl Graphic {
    pub fn from_string(s: &str) -> Result<Graphic, String> {
        serde_json::from_str::<Graphic>(s).map_err(|e| format!("invalid graphic: {e}"))
    }
}

/// Geometry operations the placement engine needs from the host geometry engine
pub trait GeometryEngine {
    /// Nearest point on or in the geometry (a point inside a polygon is its own nearest point)
    fn nearest_coordinate(&self, geometry: &Geometry, point: &MapPoint) -> Option<MapPoint>;
    /// Nearest point on the outer rings of a polygon, or on the geometry itself otherwise
    fn nearest_boundary_coordinate(&self, geometry: &Geometry, point: &MapPoint) -> Option<MapPoint>;
    /// Zero if the point lies inside a polygon or on a line
    fn distance(&self, geometry: &Geometry, point: &MapPoint) -> Option<f64>;
}

/// `GeometryEngine` backed by the `geo` crate
#[derive(Debug, Default, Copy, Clone)]
pub struct GeoEngine;

impl GeometryEngine for GeoEngine {

    fn nearest_coordinate(&self, geometry: &Geometry, point: &MapPoint) -> Option<MapPoint> {
        let p = point.to_geo();
        match geometry {
            Geometry::Point(g) => Some(g.map_point()),
            Geometry::Polyline(l) => closest(&translate_to_geo_lines(l), &p),
            Geometry::Polygon(poly) => closest(&translate_to_geo_poly(poly), &p),
        }
    }

    fn nearest_boundary_coordinate(&self, geometry: &Geometry, point: &MapPoint) -> Option<MapPoint> {
        match geometry {
            Geometry::Polygon(poly) => closest(&translate_outer_boundary(poly), &point.to_geo()),
            _ => self.nearest_coordinate(geometry, point),
        }
    }

    fn distance(&self, geometry: &Geometry, point: &MapPoint) -> Option<f64> {
        if geometry.vertices().is_empty() {
            return None;
        }
        let p = point.to_geo();
        let d = match geometry {
            Geometry::Point(g) => p.euclidean_distance(&g.map_point().to_geo()),
            Geometry::Polyline(l) => p.euclidean_distance(&translate_to_geo_lines(l)),
            Geometry::Polygon(poly) => p.euclidean_distance(&translate_to_geo_poly(poly)),
        };
        Some(d)
    }
}

fn closest<G: ClosestPoint<f64>>(g: &G, p: &geo::Point<f64>) -> Option<MapPoint> {
    match g.closest_point(p) {
        Closest::Intersection(c) | Closest::SinglePoint(c) => Some(MapPoint { x: c.x(), y: c.y() }),
        Closest::Indeterminate => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Geometry {
        // clockwise, as outer rings are stored
        Geometry::Polygon(Polygon {
            rings: vec![vec![[0.0, 0.0], [0.0, 10.0], [10.0, 10.0], [10.0, 0.0], [0.0, 0.0]]],
            spatial_reference: None,
        })
    }

    #[test]
    fn normalize_keeps_zero_vector() {
        assert_eq!(Vector::ZERO.normalize(), Vector::ZERO);
        let v = Vector { x: 3.0, y: 4.0 }.normalize();
        assert!(approx_eq!(f64, v.length(), 1.0, epsilon = 1e-12));
        assert!(approx_eq!(f64, v.x, 0.6, epsilon = 1e-12));
    }

    #[test]
    fn octant_from_vector_angle() {
        assert_eq!(Vector { x: 1.0, y: 0.0 }.octant(), Octant::E);
        assert_eq!(Vector { x: 1.0, y: 1.0 }.octant(), Octant::NE);
        assert_eq!(Vector { x: 0.0, y: 1.0 }.octant(), Octant::N);
        assert_eq!(Vector { x: -1.0, y: 0.2 }.octant(), Octant::W);
        assert_eq!(Vector { x: -1.0, y: -1.0 }.octant(), Octant::SW);
        assert_eq!(Vector { x: 0.1, y: -1.0 }.octant(), Octant::S);
        assert_eq!(Vector { x: 1.0, y: -0.9 }.octant(), Octant::SE);
        // -180deg and +180deg both land on west
        assert_eq!(Octant::from_angle(-PI), Octant::W);
        assert_eq!(Octant::from_angle(PI), Octant::W);
    }

    #[test]
    fn screen_offset_flips_y() {
        assert_eq!(Octant::N.screen_offset(), (0.0, -1.0));
        assert_eq!(Octant::SE.screen_offset(), (1.0, 1.0));
    }

    #[test]
    fn touching_rects_intersect() {
        let size = ScreenSize { width: 10.0, height: 10.0 };
        let a = ScreenRect::new(0.0, 0.0, size);
        assert!(a.intersects(&ScreenRect::new(10.0, 0.0, size)));
        assert!(a.intersects(&ScreenRect::new(5.0, 5.0, size)));
        assert!(!a.intersects(&ScreenRect::new(10.5, 0.0, size)));
        assert!(!a.intersects(&ScreenRect::new(0.0, -10.5, size)));
    }

    #[test]
    fn polygon_ring_orientation() {
        let poly = Polygon {
            rings: vec![
                vec![[0.0, 0.0], [0.0, 10.0], [10.0, 10.0], [10.0, 0.0], [0.0, 0.0]],
                vec![[2.0, 2.0], [8.0, 2.0], [8.0, 8.0], [2.0, 8.0], [2.0, 2.0]],
            ],
            spatial_reference: None,
        };
        assert_eq!(poly.outer_rings().len(), 1);
        assert_eq!(poly.inner_rings().len(), 1);
        assert_eq!(poly.inner_rings()[0][1], [8.0, 2.0]);
    }

    #[test]
    fn geo_engine_polygon_queries() {
        let engine = GeoEngine;
        let inside = MapPoint { x: 5.0, y: 5.0 };
        let outside = MapPoint { x: 5.0, y: -4.0 };
        let square = square();

        assert_eq!(engine.distance(&square, &inside), Some(0.0));
        assert!(approx_eq!(f64, engine.distance(&square, &outside).unwrap(), 4.0, epsilon = 1e-9));
        assert!(engine.nearest_coordinate(&square, &inside).unwrap().equals(&inside));
        let near_bottom = MapPoint { x: 5.0, y: 2.0 };
        assert!(engine.nearest_boundary_coordinate(&square, &near_bottom).unwrap().equals(&MapPoint { x: 5.0, y: 0.0 }));
        assert!(engine.nearest_boundary_coordinate(&square, &outside).unwrap().equals(&MapPoint { x: 5.0, y: 0.0 }));
    }

    #[test]
    fn geo_engine_line_queries() {
        let engine = GeoEngine;
        let line = Geometry::Polyline(Polyline {
            paths: vec![vec![[0.0, 0.0], [10.0, 0.0]]],
            spatial_reference: None,
        });
        let nearest = engine.nearest_coordinate(&line, &MapPoint { x: 3.0, y: 7.0 }).unwrap();
        assert!(nearest.equals(&MapPoint { x: 3.0, y: 0.0 }));
        assert_eq!(engine.distance(&line, &MapPoint { x: 4.0, y: 0.0 }), Some(0.0));
        let empty = Geometry::Polyline(Polyline::default());
        assert_eq!(engine.distance(&empty, &MapPoint::default()), None);
    }

    #[test]
    fn extent_and_average() {
        let square = square();
        let extent = square.extent().unwrap();
        assert_eq!(extent.width(), 10.0);
        assert_eq!(extent.height(), 10.0);
        // the closing vertex is counted twice
        let avg = square.vertex_average().unwrap();
        assert!(approx_eq!(f64, avg.x, 4.0, epsilon = 1e-9));
    }

    #[test]
    fn unsupported_geometry_type_is_rejected() {
        let s = r#"{ "uid": "a", "geometry": { "type": "multipoint", "points": [] } }"#;
        assert!(Graphic::from_string(s).is_err());
        let s = r#"{ "uid": "a", "geometry": { "type": "point", "x": 1.0, "y": 2.0 } }"#;
        let g = Graphic::from_string(s).unwrap();
        assert_eq!(g.geometry.type_name(), "point");
    }

    #[test]
    fn marker_symbol_size() {
        let sms = MarkerSymbol {
            kind: "simple-marker".to_string(),
            size: 12.0,
            outline: Some(MarkerOutline { width: 3.0 }),
            ..Default::default()
        };
        assert!(approx_eq!(f64, sms.size_px().height, 20.0, epsilon = 1e-9));
        let pms = MarkerSymbol {
            kind: "picture-marker".to_string(),
            width: 15.0,
            height: 30.0,
            yoffset: 7.5,
            ..Default::default()
        };
        assert!(approx_eq!(f64, pms.size_px().width, 20.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, pms.offset_px().1, -10.0, epsilon = 1e-9));
    }
}
