//! Request and response types for the analysis backend, plus the
//! session-scoped values built from them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::geometry::Bounds;

// ============================================================================
// Regions
// ============================================================================

/// One entry of a province or city selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionOption {
    pub name: String,
    pub code: String,
}

impl RegionOption {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
        }
    }
}

/// Ordered display-name → code list, rebuilt in full on every load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionList {
    options: Vec<RegionOption>,
    selected: Option<String>,
}

impl SelectionList {
    pub fn new(options: Vec<RegionOption>) -> Self {
        Self {
            options,
            selected: None,
        }
    }

    /// Parse a backend listing.
    ///
    /// Accepts a bare array of `{name, code}`, an object wrapping such an
    /// array under `key` or `data`, or an object mapping names to codes.
    pub fn from_payload(payload: &Value, key: &str) -> Self {
        let list = payload
            .get(key)
            .or_else(|| payload.get("data"))
            .unwrap_or(payload);

        let options = match list {
            Value::Array(items) => items.iter().filter_map(option_from_item).collect(),
            Value::Object(map) => map
                .iter()
                .filter_map(|(name, code)| Some(RegionOption::new(name.clone(), scalar_to_string(code)?)))
                .collect(),
            _ => Vec::new(),
        };
        Self::new(options)
    }

    pub fn options(&self) -> &[RegionOption] {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn code_for(&self, name: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.name == name || o.name.eq_ignore_ascii_case(name))
            .map(|o| o.code.as_str())
    }

    /// Mark `name` as selected; returns the option if it exists.
    pub fn select(&mut self, name: &str) -> Option<RegionOption> {
        let option = self
            .options
            .iter()
            .find(|o| o.name == name || o.name.eq_ignore_ascii_case(name))
            .cloned()?;
        self.selected = Some(option.name.clone());
        Some(option)
    }

    pub fn selected(&self) -> Option<&RegionOption> {
        let name = self.selected.as_deref()?;
        self.options.iter().find(|o| o.name == name)
    }

    pub fn clear(&mut self) {
        self.options.clear();
        self.selected = None;
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn option_from_item(item: &Value) -> Option<RegionOption> {
    let name = item.get("name").and_then(Value::as_str)?;
    let code = item.get("code").and_then(scalar_to_string)?;
    Some(RegionOption::new(name, code))
}

/// Administrative level passed as `endpoint` to the geometry lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionLevel {
    Province,
    City,
}

impl RegionLevel {
    pub fn endpoint(&self) -> &'static str {
        match self {
            RegionLevel::Province => "provinces",
            RegionLevel::City => "cities",
        }
    }
}

// ============================================================================
// Area of interest
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AoiKind {
    Admin,
    Drawn,
}

/// The region every analysis call reads. Replaced wholesale on each selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaOfInterest {
    pub kind: AoiKind,
    pub name: String,
    pub bounds: Bounds,
    pub area_km2: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geojson: Option<Value>,
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub gee_initialized: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HealthStatus {
    /// Engine ready to serve analyses. A decoded health reply already
    /// means the backend is reachable, so `status` is informational.
    pub fn is_ready(&self) -> bool {
        self.gee_initialized
    }
}

// ============================================================================
// Analysis parameters
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    Vegetation,
    Landcover,
    #[default]
    Combined,
}

impl AnalysisType {
    pub fn includes_vegetation(&self) -> bool {
        matches!(self, AnalysisType::Vegetation | AnalysisType::Combined)
    }

    pub fn includes_landcover(&self) -> bool {
        matches!(self, AnalysisType::Landcover | AnalysisType::Combined)
    }
}

impl std::str::FromStr for AnalysisType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vegetation" => Ok(AnalysisType::Vegetation),
            "landcover" | "land_cover" => Ok(AnalysisType::Landcover),
            "combined" | "both" => Ok(AnalysisType::Combined),
            other => Err(format!("Unknown analysis type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandcoverMode {
    #[default]
    Annual,
    Seasonal,
}

impl std::str::FromStr for LandcoverMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "annual" => Ok(LandcoverMode::Annual),
            "seasonal" => Ok(LandcoverMode::Seasonal),
            other => Err(format!("Unknown land cover mode: {}", other)),
        }
    }
}

/// User-selected analysis settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisParams {
    pub analysis_type: AnalysisType,
    pub year: i32,
    pub start_month: u32,
    pub end_month: u32,
    pub cloud_threshold: u32,
    pub indices: Vec<String>,
    pub use_dynamic_world: bool,
    pub use_esa_worldcover: bool,
    pub landcover_mode: LandcoverMode,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        use chrono::Datelike;
        Self {
            analysis_type: AnalysisType::default(),
            year: chrono::Utc::now().year(),
            start_month: 1,
            end_month: 12,
            cloud_threshold: 20,
            indices: vec!["NDVI".to_string()],
            use_dynamic_world: true,
            use_esa_worldcover: true,
            landcover_mode: LandcoverMode::default(),
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VegetationRequest {
    pub bounds: [f64; 4],
    pub year: i32,
    pub start_month: u32,
    pub end_month: u32,
    pub cloud_threshold: u32,
    pub indices: Vec<String>,
}

impl VegetationRequest {
    pub fn new(aoi: &AreaOfInterest, params: &AnalysisParams) -> Self {
        Self {
            bounds: aoi.bounds.to_array(),
            year: params.year,
            start_month: params.start_month,
            end_month: params.end_month,
            cloud_threshold: params.cloud_threshold,
            indices: params.indices.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandcoverRequest {
    pub bounds: [f64; 4],
    pub year: i32,
    pub use_dynamic_world: bool,
    pub use_esa_worldcover: bool,
    pub mode: LandcoverMode,
}

impl LandcoverRequest {
    pub fn new(aoi: &AreaOfInterest, params: &AnalysisParams) -> Self {
        Self {
            bounds: aoi.bounds.to_array(),
            year: params.year,
            use_dynamic_world: params.use_dynamic_world,
            use_esa_worldcover: params.use_esa_worldcover,
            mode: params.landcover_mode,
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Summary statistics of one spectral index over the AOI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStatistics {
    #[serde(default)]
    pub mean: Option<f64>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub std_dev: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VegetationResponse {
    #[serde(default)]
    pub statistics: BTreeMap<String, IndexStatistics>,
    #[serde(default)]
    pub tile_urls: BTreeMap<String, String>,
    #[serde(default)]
    pub rgb_tile_url: Option<String>,
    #[serde(default)]
    pub collection_size: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandcoverClass {
    pub name: String,
    #[serde(default)]
    pub area_km2: Option<f64>,
    #[serde(default)]
    pub percentage: Option<f64>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandcoverResponse {
    /// Class breakdown keyed by dataset (e.g. `dynamic_world`, `esa_worldcover`)
    #[serde(default)]
    pub classes: BTreeMap<String, Vec<LandcoverClass>>,
    #[serde(default)]
    pub tile_urls: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Region geometry lookup result.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionGeometry {
    pub geojson: Value,
    pub area_km2: Option<f64>,
}

impl RegionGeometry {
    /// Accepts `{geojson, area_km2?}` or a bare GeoJSON object.
    pub fn from_payload(payload: Value) -> Option<Self> {
        if let Some(geojson) = payload.get("geojson").or_else(|| payload.get("geometry")) {
            if geojson.is_object() {
                let area_km2 = payload
                    .get("area_km2")
                    .or_else(|| payload.get("area"))
                    .and_then(Value::as_f64);
                return Some(Self {
                    geojson: geojson.clone(),
                    area_km2,
                });
            }
        }
        if payload.get("type").and_then(Value::as_str).is_some() {
            return Some(Self {
                geojson: payload,
                area_km2: None,
            });
        }
        None
    }
}

// ============================================================================
// Accumulated results
// ============================================================================

/// Results of the current complete analysis, filled as sub-analyses resolve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vegetation: Option<VegetationResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landcover: Option<LandcoverResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rgb_tile_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_size: Option<u64>,
}

impl AnalysisResults {
    pub fn is_empty(&self) -> bool {
        self.vegetation.is_none() && self.landcover.is_none()
    }

    pub fn record_vegetation(&mut self, response: VegetationResponse) {
        self.rgb_tile_url = response.rgb_tile_url.clone();
        self.collection_size = response.collection_size;
        self.vegetation = Some(response);
    }

    pub fn record_landcover(&mut self, response: LandcoverResponse) {
        self.landcover = Some(response);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_selection_list_from_array() {
        let payload = json!({"provinces": [
            {"name": "Jawa Barat", "code": "32"},
            {"name": "Bali", "code": 51},
            {"name": "broken"}
        ]});
        let list = SelectionList::from_payload(&payload, "provinces");
        assert_eq!(list.len(), 2);
        assert_eq!(list.code_for("Bali"), Some("51"));
        assert_eq!(list.code_for("jawa barat"), Some("32"));
        assert_eq!(list.code_for("broken"), None);
    }

    #[test]
    fn test_selection_list_from_name_map() {
        let payload = json!({"Aceh": "11", "Papua": "94"});
        let list = SelectionList::from_payload(&payload, "provinces");
        assert_eq!(list.len(), 2);
        assert_eq!(list.code_for("Papua"), Some("94"));
    }

    #[test]
    fn test_selection_list_select_and_clear() {
        let mut list = SelectionList::new(vec![RegionOption::new("Bali", "51")]);
        assert!(list.select("Nowhere").is_none());
        assert!(list.selected().is_none());
        assert_eq!(list.select("bali").unwrap().code, "51");
        assert_eq!(list.selected().unwrap().name, "Bali");
        list.clear();
        assert!(list.is_empty());
        assert!(list.selected().is_none());
    }

    #[test]
    fn test_health_readiness() {
        let ready: HealthStatus =
            serde_json::from_value(json!({"status": "healthy", "gee_initialized": true})).unwrap();
        assert!(ready.is_ready());

        let degraded: HealthStatus =
            serde_json::from_value(json!({"status": "healthy", "gee_initialized": false})).unwrap();
        assert!(!degraded.is_ready());

        for payload in [
            json!({"gee_initialized": true}),
            json!({"status": "OK", "gee_initialized": true}),
            json!({"status": "running", "gee_initialized": true}),
        ] {
            let status: HealthStatus = serde_json::from_value(payload.clone()).unwrap();
            assert!(status.is_ready(), "not ready: {}", payload);
        }
    }

    #[test]
    fn test_analysis_type_parsing() {
        assert_eq!("combined".parse::<AnalysisType>(), Ok(AnalysisType::Combined));
        assert_eq!("LANDCOVER".parse::<AnalysisType>(), Ok(AnalysisType::Landcover));
        assert!("ndvi".parse::<AnalysisType>().is_err());
        assert!(AnalysisType::Vegetation.includes_vegetation());
        assert!(!AnalysisType::Vegetation.includes_landcover());
    }

    #[test]
    fn test_vegetation_response_keeps_unknown_fields() {
        let payload = json!({
            "statistics": {"NDVI": {"mean": 0.61, "min": -0.1, "max": 0.92}},
            "tile_urls": {"NDVI": "https://earthengine.googleapis.com/tiles/{z}/{x}/{y}"},
            "collection_size": 14,
            "date_range": "2024-01-01/2024-12-31"
        });
        let response: VegetationResponse = serde_json::from_value(payload.clone()).unwrap();
        assert_eq!(response.statistics["NDVI"].mean, Some(0.61));
        assert_eq!(response.collection_size, Some(14));
        assert_eq!(serde_json::to_value(&response).unwrap()["date_range"], payload["date_range"]);
    }

    #[test]
    fn test_results_denormalize_vegetation_fields() {
        let mut results = AnalysisResults::default();
        assert!(results.is_empty());
        results.record_vegetation(VegetationResponse {
            rgb_tile_url: Some("https://tiles/rgb".into()),
            collection_size: Some(9),
            ..Default::default()
        });
        assert!(!results.is_empty());
        assert_eq!(results.rgb_tile_url.as_deref(), Some("https://tiles/rgb"));
        assert_eq!(results.collection_size, Some(9));
    }

    #[test]
    fn test_region_geometry_payload_shapes() {
        let wrapped = RegionGeometry::from_payload(json!({
            "geojson": {"type": "Polygon", "coordinates": []},
            "area_km2": 5780.1,
            "name": "Bali"
        }))
        .unwrap();
        assert_eq!(wrapped.area_km2, Some(5780.1));
        assert_eq!(wrapped.geojson["type"], "Polygon");

        let bare = RegionGeometry::from_payload(json!({"type": "Feature", "geometry": null})).unwrap();
        assert!(bare.area_km2.is_none());

        assert!(RegionGeometry::from_payload(json!({"message": "nothing"})).is_none());
    }
}
