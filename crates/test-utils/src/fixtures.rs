//! Canned backend payloads for gee-client tests.
//!
//! The shapes mirror what the analysis backend returns for each endpoint.

use serde_json::{json, Value};

/// Common bounding boxes as `[west, south, east, north]`.
pub mod bbox {
    /// Kota Bandung, West Java
    pub const BANDUNG: [f64; 4] = [107.55, -6.97, 107.74, -6.84];

    /// Bali province
    pub const BALI: [f64; 4] = [114.43, -8.85, 115.71, -8.06];

    /// One degree square at the equator
    pub const UNIT_EQUATOR: [f64; 4] = [0.0, 0.0, 1.0, 1.0];
}

/// A closed rectangular polygon covering `bbox`.
pub fn rectangle(bbox: [f64; 4]) -> Value {
    let [w, s, e, n] = bbox;
    json!({
        "type": "Polygon",
        "coordinates": [[[w, s], [e, s], [e, n], [w, n], [w, s]]]
    })
}

/// `GET /health` with the engine initialized.
pub fn health_ready() -> Value {
    json!({"status": "healthy", "gee_initialized": true, "version": "1.2.0"})
}

/// `GET /health` with the engine not initialized.
pub fn health_degraded() -> Value {
    json!({"status": "healthy", "gee_initialized": false})
}

/// `GET /regions/provinces`
pub fn provinces() -> Value {
    json!({"provinces": [
        {"name": "Jawa Barat", "code": "32"},
        {"name": "Bali", "code": "51"},
        {"name": "Kalimantan Timur", "code": "64"}
    ]})
}

/// `GET /regions/cities?province_code=32`
pub fn cities_jawa_barat() -> Value {
    json!({"cities": [
        {"name": "Kota Bandung", "code": "3273"},
        {"name": "Kabupaten Bogor", "code": "3201"}
    ]})
}

/// `GET /regions/cities?province_code=51`
pub fn cities_bali() -> Value {
    json!({"cities": [
        {"name": "Kota Denpasar", "code": "5171"},
        {"name": "Kabupaten Badung", "code": "5103"},
        {"name": "Kabupaten Gianyar", "code": "5104"}
    ]})
}

/// `GET /regions/geometry` for Kota Bandung.
pub fn bandung_geometry() -> Value {
    json!({
        "geojson": {
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"name": "Kota Bandung"},
                "geometry": rectangle(bbox::BANDUNG)
            }]
        },
        "area_km2": 167.31
    })
}

/// `POST /analyze/vegetation`
pub fn vegetation_response() -> Value {
    json!({
        "statistics": {
            "NDVI": {"mean": 0.54, "min": -0.12, "max": 0.89, "std_dev": 0.17},
            "EVI": {"mean": 0.33, "min": -0.05, "max": 0.71, "std_dev": 0.11}
        },
        "tile_urls": {
            "NDVI": "https://earthengine.googleapis.com/v1/maps/ndvi/tiles/{z}/{x}/{y}",
            "EVI": "https://earthengine.googleapis.com/v1/maps/evi/tiles/{z}/{x}/{y}"
        },
        "rgb_tile_url": "https://earthengine.googleapis.com/v1/maps/rgb/tiles/{z}/{x}/{y}",
        "collection_size": 23
    })
}

/// `POST /analyze/landcover`
pub fn landcover_response() -> Value {
    json!({
        "classes": {
            "dynamic_world": [
                {"name": "Built", "area_km2": 120.4, "percentage": 71.9, "color": "#C4281B"},
                {"name": "Trees", "area_km2": 21.7, "percentage": 13.0, "color": "#397D49"}
            ]
        },
        "tile_urls": {
            "dynamic_world": "https://earthengine.googleapis.com/v1/maps/dw/tiles/{z}/{x}/{y}"
        }
    })
}

/// `POST /timeseries`
pub fn timeseries_response() -> Value {
    json!({
        "index": "NDVI",
        "series": [
            {"date": "2024-01", "value": 0.48},
            {"date": "2024-02", "value": 0.52},
            {"date": "2024-03", "value": 0.57}
        ]
    })
}

/// Error body in the backend's format.
pub fn error_body(message: &str) -> Value {
    json!({"error": message})
}
