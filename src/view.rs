use serde_derive::{Deserialize, Serialize};

use crate::geometry::{Extent, MapPoint, ScreenPoint};

/// What notes need from the host map view
pub trait MapView {
    fn to_screen(&self, point: &MapPoint) -> ScreenPoint;
    fn to_map(&self, point: &ScreenPoint) -> MapPoint;
    fn zoom(&self) -> f64;
    /// Map units per screen pixel
    fn resolution(&self) -> f64;
    fn ready(&self) -> bool;
    /// False while the user pans or zooms
    fn stationary(&self) -> bool {
        true
    }
    fn cursor(&self) -> Option<String>;
    fn set_cursor(&mut self, cursor: Option<String>);
}

fn default_true() -> bool {
    true
}

/// Snapshot of the host view, pushed from JS on every extent change.
/// Screen origin is the top left corner of the view surface.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub center: MapPoint,
    pub zoom: f64,
    pub resolution: f64,
    /// surface size in pixels
    pub width: f64,
    pub height: f64,
    #[serde(default = "default_true")]
    pub ready: bool,
    #[serde(default = "default_true")]
    pub stationary: bool,
    #[serde(default)]
    pub cursor: Option<String>,
}

impl ViewState {

    pub fn from_string(s: &str) -> Result<ViewState, String> {
        serde_json::from_str::<ViewState>(s).map_err(|e| format!("invalid view state: {e}"))
    }

    pub fn extent(&self) -> Extent {
        let half_w = self.width * self.resolution / 2.0;
        let half_h = self.height * self.resolution / 2.0;
        Extent {
            min_x: self.center.x - half_w,
            min_y: self.center.y - half_h,
            max_x: self.center.x + half_w,
            max_y: self.center.y + half_h,
        }
    }

    /// Takes over the geometry of a new snapshot, keeps the cursor. Returns whether the extent changed.
    pub fn update(&mut self, next: ViewState) -> bool {
        let changed = !self.extent().equals(&next.extent());
        let cursor = self.cursor.take();
        *self = ViewState { cursor, ..next };
        changed
    }
}

impl MapView for ViewState {

    fn to_screen(&self, point: &MapPoint) -> ScreenPoint {
        let extent = self.extent();
        ScreenPoint {
            x: (point.x - extent.min_x) / self.resolution,
            y: (extent.max_y - point.y) / self.resolution,
        }
    }

    fn to_map(&self, point: &ScreenPoint) -> MapPoint {
        let extent = self.extent();
        MapPoint {
            x: extent.min_x + point.x * self.resolution,
            y: extent.max_y - point.y * self.resolution,
        }
    }

    fn zoom(&self) -> f64 {
        self.zoom
    }

    fn resolution(&self) -> f64 {
        self.resolution
    }

    fn ready(&self) -> bool {
        self.ready
    }

    fn stationary(&self) -> bool {
        self.stationary
    }

    fn cursor(&self) -> Option<String> {
        self.cursor.clone()
    }

    fn set_cursor(&mut self, cursor: Option<String>) {
        self.cursor = cursor;
    }
}

#[cfg(test)]
pub(crate) fn test_view() -> ViewState {
    ViewState {
        center: MapPoint { x: 0.0, y: 0.0 },
        zoom: 10.0,
        resolution: 0.5,
        width: 800.0,
        height: 600.0,
        ready: true,
        stationary: true,
        cursor: None,
    }
}
