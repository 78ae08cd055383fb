//! Bounds and area helpers over GeoJSON values.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// WGS84 equatorial radius in meters.
const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Geographic bounds in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Bounds {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Center point as (lon, lat).
    pub fn center(&self) -> (f64, f64) {
        (
            (self.west + self.east) / 2.0,
            (self.south + self.north) / 2.0,
        )
    }

    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// `[west, south, east, north]`, the order the backend expects.
    pub fn to_array(&self) -> [f64; 4] {
        [self.west, self.south, self.east, self.north]
    }

    fn extend(&mut self, lon: f64, lat: f64) {
        self.west = self.west.min(lon);
        self.south = self.south.min(lat);
        self.east = self.east.max(lon);
        self.north = self.north.max(lat);
    }

    /// Bounds of every coordinate in a GeoJSON geometry, feature or collection.
    pub fn from_geojson(geojson: &Value) -> Option<Bounds> {
        let mut bounds: Option<Bounds> = None;
        visit_positions(geojson, &mut |lon, lat| match bounds.as_mut() {
            Some(b) => b.extend(lon, lat),
            None => bounds = Some(Bounds::new(lon, lat, lon, lat)),
        });
        bounds
    }
}

/// Call `f` for every `[lon, lat, ..]` position found in `value`.
fn visit_positions(value: &Value, f: &mut dyn FnMut(f64, f64)) {
    match value {
        Value::Object(map) => {
            if let Some(coords) = map.get("coordinates") {
                visit_coordinates(coords, f);
            }
            if let Some(Value::Array(geometries)) = map.get("geometries") {
                for g in geometries {
                    visit_positions(g, f);
                }
            }
            if let Some(geometry) = map.get("geometry") {
                visit_positions(geometry, f);
            }
            if let Some(Value::Array(features)) = map.get("features") {
                for feature in features {
                    visit_positions(feature, f);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                visit_positions(item, f);
            }
        }
        _ => {}
    }
}

fn visit_coordinates(coords: &Value, f: &mut dyn FnMut(f64, f64)) {
    if let Some((lon, lat)) = as_position(coords) {
        f(lon, lat);
    } else if let Value::Array(items) = coords {
        for item in items {
            visit_coordinates(item, f);
        }
    }
}

fn as_position(value: &Value) -> Option<(f64, f64)> {
    let items = value.as_array()?;
    if items.len() < 2 {
        return None;
    }
    Some((items[0].as_f64()?, items[1].as_f64()?))
}

fn ring_positions(ring: &Value) -> Vec<(f64, f64)> {
    ring.as_array()
        .map(|items| items.iter().filter_map(as_position).collect())
        .unwrap_or_default()
}

/// Spherical-excess area of a closed ring, in square meters.
fn ring_area_m2(ring: &[(f64, f64)]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..ring.len() {
        let (lon1, lat1) = ring[i];
        let (lon2, lat2) = ring[(i + 1) % ring.len()];
        area += (lon2 - lon1).to_radians()
            * (2.0 + lat1.to_radians().sin() + lat2.to_radians().sin());
    }
    (area * EARTH_RADIUS_M * EARTH_RADIUS_M / 2.0).abs()
}

fn polygon_area_m2(rings: &Value) -> f64 {
    let Some(rings) = rings.as_array() else {
        return 0.0;
    };
    let mut iter = rings.iter();
    let outer = iter.next().map(|r| ring_area_m2(&ring_positions(r))).unwrap_or(0.0);
    let holes: f64 = iter.map(|r| ring_area_m2(&ring_positions(r))).sum();
    (outer - holes).max(0.0)
}

fn area_m2(value: &Value) -> f64 {
    let Some(map) = value.as_object() else {
        return 0.0;
    };
    match map.get("type").and_then(Value::as_str) {
        Some("Polygon") => map.get("coordinates").map(polygon_area_m2).unwrap_or(0.0),
        Some("MultiPolygon") => map
            .get("coordinates")
            .and_then(Value::as_array)
            .map(|polys| polys.iter().map(polygon_area_m2).sum())
            .unwrap_or(0.0),
        Some("GeometryCollection") => map
            .get("geometries")
            .and_then(Value::as_array)
            .map(|gs| gs.iter().map(area_m2).sum())
            .unwrap_or(0.0),
        Some("Feature") => map.get("geometry").map(area_m2).unwrap_or(0.0),
        Some("FeatureCollection") => map
            .get("features")
            .and_then(Value::as_array)
            .map(|fs| fs.iter().map(area_m2).sum())
            .unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Approximate geodesic area of the polygons in a GeoJSON value, in km².
pub fn area_km2(geojson: &Value) -> f64 {
    area_m2(geojson) / 1_000_000.0
}
