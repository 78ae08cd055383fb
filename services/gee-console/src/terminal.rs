//! Terminal implementations of the UI and map surfaces.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use gee_client::models::{LandcoverClass, VegetationResponse};
use gee_client::{
    AnalysisParams, AnalysisResults, AoiKind, AreaOfInterest, Bounds, ClientError, MapView,
    RegionOption, Selector, Severity, Ui,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::debug;

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS);
    table
}

fn fmt_num(value: Option<f64>, precision: usize) -> String {
    value
        .map(|v| format!("{:.*}", precision, v))
        .unwrap_or_else(|| "-".to_string())
}

fn fmt_bounds(bounds: &Bounds) -> String {
    format!(
        "{:.4}, {:.4}, {:.4}, {:.4}",
        bounds.west, bounds.south, bounds.east, bounds.north
    )
}

// ============================================================================
// Tables
// ============================================================================

pub fn area_table(aoi: &AreaOfInterest) -> Table {
    let kind = match aoi.kind {
        AoiKind::Admin => "administrative",
        AoiKind::Drawn => "drawn",
    };
    let mut table = new_table();
    table.set_header(vec![format!("Area of interest: {}", aoi.name)]);
    table.add_row(vec!["Type:", kind]);
    table.add_row(vec!["Area:", &format!("{:.2} km²", aoi.area_km2)]);
    table.add_row(vec!["Bounds (W, S, E, N):", &fmt_bounds(&aoi.bounds)]);
    table
}

pub fn region_table(title: &str, options: &[RegionOption]) -> Table {
    let mut table = new_table();
    table.set_header(vec![title, "Code"]);
    for option in options {
        table.add_row(vec![option.name.as_str(), option.code.as_str()]);
    }
    table
}

pub fn vegetation_table(response: &VegetationResponse) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Index", "Mean", "Min", "Max", "Std dev"]);
    for (index, stats) in &response.statistics {
        table.add_row(vec![
            index.clone(),
            fmt_num(stats.mean, 3),
            fmt_num(stats.min, 3),
            fmt_num(stats.max, 3),
            fmt_num(stats.std_dev, 3),
        ]);
    }
    table
}

pub fn landcover_table(dataset: &str, classes: &[LandcoverClass]) -> Table {
    let mut table = new_table();
    table.set_header(vec![dataset.to_string(), "Area (km²)".into(), "Share".into()]);
    for class in classes {
        table.add_row(vec![
            class.name.clone(),
            fmt_num(class.area_km2, 2),
            class
                .percentage
                .map(|p| format!("{:.1}%", p))
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table
}

/// Table for `{"series": [{"date", "value"}, ...]}` payloads, if the shape matches.
pub fn timeseries_table(series: &Value) -> Option<Table> {
    let points = series.get("series")?.as_array()?;
    let index = series.get("index").and_then(Value::as_str).unwrap_or("Value");

    let mut table = new_table();
    table.set_header(vec!["Date", index]);
    for point in points {
        let date = point.get("date").and_then(Value::as_str).unwrap_or("?");
        let value = fmt_num(point.get("value").and_then(Value::as_f64), 3);
        table.add_row(vec![date.to_string(), value]);
    }
    Some(table)
}

pub fn status_table(
    aoi: Option<&AreaOfInterest>,
    params: &AnalysisParams,
    results: &AnalysisResults,
    map: &MapState,
    backend_ready: bool,
) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Session", ""]);
    table.add_row(vec![
        "Backend:",
        if backend_ready { "ready" } else { "degraded" },
    ]);
    table.add_row(vec![
        "Area of interest:".to_string(),
        aoi.map(|a| format!("{} ({:.2} km²)", a.name, a.area_km2))
            .unwrap_or_else(|| "none".to_string()),
    ]);
    table.add_row(vec![
        "Analysis:".to_string(),
        format!(
            "{:?}, {} months {}-{}, cloud < {}%",
            params.analysis_type,
            params.year,
            params.start_month,
            params.end_month,
            params.cloud_threshold
        ),
    ]);
    table.add_row(vec!["Indices:".to_string(), params.indices.join(", ")]);
    table.add_row(vec![
        "Land cover:".to_string(),
        format!(
            "Dynamic World {}, ESA WorldCover {}, {:?}",
            if params.use_dynamic_world { "on" } else { "off" },
            if params.use_esa_worldcover { "on" } else { "off" },
            params.landcover_mode
        ),
    ]);

    let mut have = Vec::new();
    if results.vegetation.is_some() {
        have.push("vegetation");
    }
    if results.landcover.is_some() {
        have.push("land cover");
    }
    table.add_row(vec![
        "Results:".to_string(),
        if have.is_empty() {
            "none".to_string()
        } else {
            have.join(", ")
        },
    ]);
    table.add_row(vec![
        "Map layers:".to_string(),
        if map.layers.is_empty() {
            "none".to_string()
        } else {
            map.layers.join(", ")
        },
    ]);
    table
}

/// Write `contents` to `dir/filename` through a temporary file in the same directory.
pub fn write_atomically(dir: &Path, filename: &str, contents: &[u8]) -> Result<PathBuf, ClientError> {
    let to_ui = |e: std::io::Error| ClientError::Ui(format!("cannot write {}: {}", filename, e));

    std::fs::create_dir_all(dir).map_err(to_ui)?;
    let mut file = NamedTempFile::new_in(dir).map_err(to_ui)?;
    file.write_all(contents).map_err(to_ui)?;
    file.flush().map_err(to_ui)?;

    let target = dir.join(filename);
    file.persist(&target).map_err(|e| to_ui(e.error))?;
    Ok(target)
}

// ============================================================================
// UI
// ============================================================================

pub struct TerminalUi {
    spinner: Mutex<Option<ProgressBar>>,
    selects: Mutex<HashMap<Selector, Vec<RegionOption>>>,
    output_dir: PathBuf,
}

impl TerminalUi {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            spinner: Mutex::new(None),
            selects: Mutex::new(HashMap::new()),
            output_dir,
        }
    }

    pub fn options(&self, selector: Selector) -> Vec<RegionOption> {
        self.selects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&selector)
            .cloned()
            .unwrap_or_default()
    }

    /// Print above the spinner when one is running.
    pub fn print(&self, text: &str) {
        let spinner = self.spinner.lock().unwrap_or_else(|e| e.into_inner());
        match spinner.as_ref() {
            Some(pb) => pb.suspend(|| println!("{}", text)),
            None => println!("{}", text),
        }
    }
}

impl Ui for TerminalUi {
    fn show_loading(&self, title: &str, subtitle: &str) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("{} ({})", title, subtitle));
        pb.enable_steady_tick(Duration::from_millis(100));

        let previous = self
            .spinner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(pb);
        if let Some(old) = previous {
            old.finish_and_clear();
        }
    }

    fn hide_loading(&self) {
        let spinner = self.spinner.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
    }

    fn alert(&self, severity: Severity, message: &str) {
        self.print(&format!("[{}] {}", severity.as_str().to_uppercase(), message));
    }

    fn populate_select(&self, selector: Selector, options: &[RegionOption]) {
        self.selects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(selector, options.to_vec());
        let title = match selector {
            Selector::Province => "Province",
            Selector::City => "City / regency",
        };
        self.print(&region_table(title, options).to_string());
    }

    fn clear_select(&self, selector: Selector) {
        self.selects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&selector);
        debug!(selector = ?selector, "Selector cleared");
    }

    fn show_area_info(&self, aoi: &AreaOfInterest) {
        self.print(&area_table(aoi).to_string());
    }

    fn display_results(&self, results: &AnalysisResults) -> Result<(), ClientError> {
        if let Some(vegetation) = &results.vegetation {
            self.print(&vegetation_table(vegetation).to_string());
        }
        if let Some(size) = results.collection_size {
            self.print(&format!("Images in collection: {}", size));
        }
        if let Some(landcover) = &results.landcover {
            for (dataset, classes) in &landcover.classes {
                self.print(&landcover_table(dataset, classes).to_string());
            }
        }
        Ok(())
    }

    fn show_timeseries(&self, series: &Value) -> Result<(), ClientError> {
        let text = match timeseries_table(series) {
            Some(table) => table.to_string(),
            None => serde_json::to_string_pretty(series)?,
        };
        self.print(&text);
        Ok(())
    }

    fn save_download(&self, filename: &str, contents: &[u8]) -> Result<(), ClientError> {
        let path = write_atomically(&self.output_dir, filename, contents)?;
        debug!(path = %path.display(), bytes = contents.len(), "Download written");
        Ok(())
    }
}

// ============================================================================
// Map
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapState {
    pub boundary: Option<String>,
    pub view: Option<Bounds>,
    pub layers: Vec<String>,
}

/// Keeps track of what a map would show and prints tile URLs.
#[derive(Default)]
pub struct TerminalMap {
    state: Mutex<MapState>,
}

impl TerminalMap {
    pub fn state(&self) -> MapState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl MapView for TerminalMap {
    fn clear_analysis_layers(&self) {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .layers
            .clear();
    }

    fn show_boundary(&self, name: &str, _geojson: &Value) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).boundary = Some(name.to_string());
    }

    fn clear_boundary(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.boundary = None;
        state.view = None;
    }

    fn fit_bounds(&self, bounds: &Bounds) {
        debug!(bounds = %fmt_bounds(bounds), "Map view fitted");
        self.state.lock().unwrap_or_else(|e| e.into_inner()).view = Some(*bounds);
    }

    fn add_tile_layer(&self, name: &str, url_template: &str) {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.layers.retain(|l| l != name);
            state.layers.push(name.to_string());
        }
        println!("Tile layer {}: {}", name, url_template);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::fixtures;

    #[test]
    fn test_vegetation_table_lists_indices() {
        let response: VegetationResponse =
            serde_json::from_value(fixtures::vegetation_response()).unwrap();
        let text = vegetation_table(&response).to_string();
        assert!(text.contains("NDVI"));
        assert!(text.contains("0.540"));
        assert!(text.contains("EVI"));
        assert!(text.contains("0.110"));
    }

    #[test]
    fn test_timeseries_table_shape() {
        let text = timeseries_table(&fixtures::timeseries_response())
            .unwrap()
            .to_string();
        assert!(text.contains("2024-03"));
        assert!(text.contains("0.570"));
        assert!(timeseries_table(&serde_json::json!({"task": "queued"})).is_none());
    }

    #[test]
    fn test_status_without_aoi() {
        let text = status_table(
            None,
            &AnalysisParams::default(),
            &AnalysisResults::default(),
            &MapState::default(),
            false,
        )
        .to_string();
        assert!(text.contains("degraded"));
        assert!(text.contains("none"));
        assert!(text.contains("NDVI"));
    }

    #[test]
    fn test_write_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("exports");

        let path = write_atomically(&target, "gee_analysis_Bali_1.json", b"{}").unwrap();
        assert_eq!(path, target.join("gee_analysis_Bali_1.json"));
        assert_eq!(std::fs::read(&path).unwrap(), b"{}");

        write_atomically(&target, "gee_analysis_Bali_1.json", b"[1]").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"[1]");
        assert_eq!(std::fs::read_dir(&target).unwrap().count(), 1);
    }

    #[test]
    fn test_map_layers_replace_by_name() {
        let map = TerminalMap::default();
        map.add_tile_layer("NDVI", "https://tiles/a/{z}/{x}/{y}");
        map.add_tile_layer("RGB", "https://tiles/b/{z}/{x}/{y}");
        map.add_tile_layer("NDVI", "https://tiles/c/{z}/{x}/{y}");
        assert_eq!(map.state().layers, vec!["RGB".to_string(), "NDVI".to_string()]);

        map.clear_analysis_layers();
        assert!(map.state().layers.is_empty());
    }

    #[test]
    fn test_ui_keeps_selector_contents() {
        let dir = tempfile::tempdir().unwrap();
        let ui = TerminalUi::new(dir.path().to_path_buf());
        let options = vec![RegionOption {
            name: "Bali".into(),
            code: "51".into(),
        }];
        ui.populate_select(Selector::Province, &options);
        assert_eq!(ui.options(Selector::Province), options);

        ui.clear_select(Selector::Province);
        assert!(ui.options(Selector::Province).is_empty());

        ui.save_download("stats.json", b"{\"ok\":true}").unwrap();
        assert!(dir.path().join("stats.json").exists());
    }
}
