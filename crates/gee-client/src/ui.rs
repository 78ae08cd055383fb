//! Adapter traits between orchestration and whatever renders the page.
//!
//! Orchestration decides what to request and how to interpret the answer;
//! implementations of these traits only mutate their own widgets.

use serde_json::Value;

use crate::error::{ClientError, Severity};
use crate::geometry::Bounds;
use crate::models::{AnalysisResults, AreaOfInterest, RegionOption};

/// Selector widgets the orchestration layer fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Selector {
    Province,
    City,
}

/// Page-level UI surface.
pub trait Ui: Send + Sync {
    fn show_loading(&self, title: &str, subtitle: &str);

    fn hide_loading(&self);

    /// Dismissible alert.
    fn alert(&self, severity: Severity, message: &str);

    /// Replace every option of `selector` with `options`.
    fn populate_select(&self, selector: Selector, options: &[RegionOption]);

    fn clear_select(&self, selector: Selector);

    fn show_area_info(&self, aoi: &AreaOfInterest);

    /// Render tables and charts for the accumulated results.
    fn display_results(&self, results: &AnalysisResults) -> Result<(), ClientError>;

    fn show_timeseries(&self, series: &Value) -> Result<(), ClientError>;

    /// Hand a generated file to the user.
    fn save_download(&self, filename: &str, contents: &[u8]) -> Result<(), ClientError>;
}

/// Map layer provider.
pub trait MapView: Send + Sync {
    /// Remove every analysis tile layer; the boundary stays.
    fn clear_analysis_layers(&self);

    /// Draw the AOI outline, replacing any previous one.
    fn show_boundary(&self, name: &str, geojson: &Value);

    fn clear_boundary(&self);

    fn fit_bounds(&self, bounds: &Bounds);

    /// Add an overlay rendered from a `{z}/{x}/{y}` URL template.
    fn add_tile_layer(&self, name: &str, url_template: &str);
}
