//! Map widget boundary and a Web Mercator reference implementation.
//!
//! The overlay never owns the map. It only asks it to project coordinates,
//! report the visible bounds and zoom level, and occasionally recentre.

use crate::ir::{GeoBounds, GeoCoord};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const TILE_SIZE: f64 = 256.0;
const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// A position in map-control pixel space (origin at the top-left corner).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: ScreenPoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Contract the overlay requires from the interactive map.
pub trait MapWidget {
    fn project_to_screen(&self, coord: GeoCoord) -> ScreenPoint;
    fn project_to_map(&self, point: ScreenPoint) -> GeoCoord;
    fn viewport_bounds(&self) -> GeoBounds;
    fn zoom_level(&self) -> f64;
    /// Recentre the map. An animated change arrives back as a regular
    /// transition start/settle pair.
    fn set_view(&mut self, center: GeoCoord, zoom: f64, animate: bool);
}

/// Spherical Web Mercator map with a fixed control size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MercatorMap {
    center: GeoCoord,
    zoom: f64,
    width: f64,
    height: f64,
    min_zoom: f64,
    max_zoom: f64,
}

impl MercatorMap {
    pub fn new(center: GeoCoord, zoom: f64, width: f64, height: f64) -> Self {
        let mut map = Self {
            center,
            zoom,
            width: width.max(1.0),
            height: height.max(1.0),
            min_zoom: 1.0,
            max_zoom: 21.0,
        };
        map.zoom = map.clamp_zoom(zoom);
        map
    }

    pub fn center(&self) -> GeoCoord {
        self.center
    }

    pub fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = self.clamp_zoom(zoom);
    }

    pub fn set_center(&mut self, center: GeoCoord) {
        self.center = center;
    }

    /// Move the view by a pixel offset, as a drag gesture would.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        let (cx, cy) = self.world_pixel(self.center);
        self.center = self.world_to_coord(cx + dx, cy + dy);
    }

    fn clamp_zoom(&self, zoom: f64) -> f64 {
        zoom.clamp(self.min_zoom, self.max_zoom)
    }

    fn world_size(&self) -> f64 {
        TILE_SIZE * 2f64.powf(self.zoom)
    }

    fn world_pixel(&self, coord: GeoCoord) -> (f64, f64) {
        let size = self.world_size();
        let lat = coord.latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        let x = (coord.longitude + 180.0) / 360.0 * size;
        let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * size;
        (x, y)
    }

    fn world_to_coord(&self, x: f64, y: f64) -> GeoCoord {
        let size = self.world_size();
        let longitude = x / size * 360.0 - 180.0;
        let n = PI - 2.0 * PI * y / size;
        let latitude = n.sinh().atan().to_degrees();
        GeoCoord::new(latitude, longitude)
    }
}

impl MapWidget for MercatorMap {
    fn project_to_screen(&self, coord: GeoCoord) -> ScreenPoint {
        let (cx, cy) = self.world_pixel(self.center);
        let (px, py) = self.world_pixel(coord);
        ScreenPoint::new(px - cx + self.width / 2.0, py - cy + self.height / 2.0)
    }

    fn project_to_map(&self, point: ScreenPoint) -> GeoCoord {
        let (cx, cy) = self.world_pixel(self.center);
        self.world_to_coord(
            point.x - self.width / 2.0 + cx,
            point.y - self.height / 2.0 + cy,
        )
    }

    fn viewport_bounds(&self) -> GeoBounds {
        let north_west = self.project_to_map(ScreenPoint::new(0.0, 0.0));
        let south_east = self.project_to_map(ScreenPoint::new(self.width, self.height));
        GeoBounds {
            west: north_west.longitude,
            south: south_east.latitude,
            east: south_east.longitude,
            north: north_west.latitude,
        }
    }

    fn zoom_level(&self) -> f64 {
        self.zoom
    }

    fn set_view(&mut self, center: GeoCoord, zoom: f64, _animate: bool) {
        self.center = center;
        self.zoom = self.clamp_zoom(zoom);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn center_projects_to_control_middle() {
        let map = MercatorMap::new(GeoCoord::new(47.6, -122.3), 10.0, 800.0, 600.0);
        let p = map.project_to_screen(GeoCoord::new(47.6, -122.3));
        assert!(close(p.x, 400.0));
        assert!(close(p.y, 300.0));
    }

    #[test]
    fn projection_round_trips_through_screen_space() {
        let map = MercatorMap::new(GeoCoord::new(10.0, 20.0), 6.0, 640.0, 480.0);
        let coord = GeoCoord::new(11.0, 21.0);
        let back = map.project_to_map(map.project_to_screen(coord));
        assert!(close(back.latitude, coord.latitude));
        assert!(close(back.longitude, coord.longitude));
    }

    #[test]
    fn zooming_in_spreads_points_apart() {
        let mut map = MercatorMap::new(GeoCoord::new(10.0, 20.0), 4.0, 640.0, 480.0);
        let a = GeoCoord::new(10.0, 20.0);
        let b = GeoCoord::new(11.0, 21.0);
        let before = map.project_to_screen(a).distance(map.project_to_screen(b));
        map.set_zoom(5.0);
        let after = map.project_to_screen(a).distance(map.project_to_screen(b));
        assert!(close(after, before * 2.0));
    }

    #[test]
    fn pan_moves_every_point_by_the_same_offset() {
        let mut map = MercatorMap::new(GeoCoord::new(0.0, 0.0), 8.0, 500.0, 500.0);
        let coord = GeoCoord::new(0.5, 0.5);
        let before = map.project_to_screen(coord);
        map.pan_by(30.0, -20.0);
        let after = map.project_to_screen(coord);
        assert!((before.x - after.x - 30.0).abs() < 1e-6);
        assert!((before.y - after.y + 20.0).abs() < 1e-6);
    }

    #[test]
    fn bounds_contain_center() {
        let map = MercatorMap::new(GeoCoord::new(45.0, 15.0), 9.0, 1024.0, 768.0);
        let bounds = map.viewport_bounds();
        assert!(bounds.contains(map.center()));
        assert!(bounds.west < bounds.east);
        assert!(bounds.south < bounds.north);
    }

    #[test]
    fn zoom_is_clamped() {
        let map = MercatorMap::new(GeoCoord::new(0.0, 0.0), 40.0, 100.0, 100.0);
        assert_eq!(map.zoom_level(), 21.0);
    }
}
