use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a photo as assigned by the data service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoId(String);

impl PhotoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PhotoId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoord {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoCoord {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Geographic rectangle of the visible map, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl GeoBounds {
    pub fn contains(&self, coord: GeoCoord) -> bool {
        let lat_ok = coord.latitude >= self.south && coord.latitude <= self.north;
        // Bounds crossing the antimeridian have west > east.
        let lon_ok = if self.west <= self.east {
            coord.longitude >= self.west && coord.longitude <= self.east
        } else {
            coord.longitude >= self.west || coord.longitude <= self.east
        };
        lat_ok && lon_ok
    }
}

/// A geotagged photo. Owned by the data service; the overlay only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: PhotoId,
    pub coord: GeoCoord,
    pub title: String,
    /// Page of the photo on its hosting service.
    pub url: String,
    pub thumbnail_url: String,
    pub image_url: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Photo {
    /// Photo with only identity and location set; display metadata left empty.
    pub fn located(id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: PhotoId::new(id),
            coord: GeoCoord::new(latitude, longitude),
            title: String::new(),
            url: String::new(),
            thumbnail_url: String::new(),
            image_url: String::new(),
            width: 0,
            height: 0,
            tags: Vec::new(),
        }
    }
}

/// Query handed to the external photo data service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SearchRequest {
    /// Free-text search restricted to the visible map region.
    Region { text: String, bounds: GeoBounds },
    /// Photos sharing tags with a given photo, around its location.
    Nearby { tags: Vec<String>, coord: GeoCoord },
}
