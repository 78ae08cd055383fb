//! User-facing operations.
//!
//! Each operation runs Idle → Loading → (Success | Failure) → Idle:
//! - the loading indicator is hidden exactly once, before the outcome is inspected
//! - precondition failures raise a `warning` alert before any request is made
//! - request failures raise a `danger` alert with the backend's message
//! - every failure path returns an empty value so the caller can carry on
//!
//! A second invocation of an operation that is still outstanding is
//! rejected with a warning (see [`OperationGuard`]).

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::client::{DefaultTransport, GeeClient};
use crate::error::{ClientError, Severity};
use crate::geometry::{self, Bounds};
use crate::guard::{OperationGuard, OperationKind, OperationTicket};
use crate::models::{
    AnalysisParams, AnalysisResults, AnalysisType, AoiKind, AreaOfInterest, HealthStatus,
    LandcoverRequest, LandcoverResponse, RegionGeometry, RegionLevel, RegionOption,
    SelectionList, VegetationRequest, VegetationResponse,
};
use crate::session::SessionState;
use crate::snapshot::StatisticsSnapshot;
use crate::transport::Transport;
use crate::ui::{MapView, Selector, Ui};

/// Name given to hand-drawn areas when the caller supplies none.
pub const DRAWN_AREA_NAME: &str = "Custom Area";

/// Hides the loading indicator exactly once, on `finish` or on drop.
struct LoadingScope<'a> {
    ui: &'a dyn Ui,
    active: bool,
}

impl<'a> LoadingScope<'a> {
    fn show(ui: &'a dyn Ui, title: &str, subtitle: &str) -> Self {
        ui.show_loading(title, subtitle);
        Self { ui, active: true }
    }

    fn finish(mut self) {
        self.hide();
    }

    fn hide(&mut self) {
        if self.active {
            self.active = false;
            self.ui.hide_loading();
        }
    }
}

impl Drop for LoadingScope<'_> {
    fn drop(&mut self) {
        self.hide();
    }
}

/// Sequences backend calls and turns their results into UI and map updates.
pub struct Orchestrator<T = DefaultTransport> {
    client: GeeClient<T>,
    ui: Arc<dyn Ui>,
    map: Arc<dyn MapView>,
    session: Mutex<SessionState>,
    guard: OperationGuard,
}

impl<T: Transport> Orchestrator<T> {
    pub fn new(client: GeeClient<T>, ui: Arc<dyn Ui>, map: Arc<dyn MapView>) -> Self {
        Self::with_params(client, ui, map, AnalysisParams::default())
    }

    pub fn with_params(
        client: GeeClient<T>,
        ui: Arc<dyn Ui>,
        map: Arc<dyn MapView>,
        params: AnalysisParams,
    ) -> Self {
        Self {
            client,
            ui,
            map,
            session: Mutex::new(SessionState::new(params)),
            guard: OperationGuard::new(),
        }
    }

    pub fn client(&self) -> &GeeClient<T> {
        &self.client
    }

    pub fn ui(&self) -> &dyn Ui {
        &*self.ui
    }

    // ------------------------------------------------------------------
    // Session accessors
    // ------------------------------------------------------------------

    pub async fn aoi(&self) -> Option<AreaOfInterest> {
        self.session.lock().await.aoi().cloned()
    }

    pub async fn results(&self) -> AnalysisResults {
        self.session.lock().await.results().clone()
    }

    pub async fn params(&self) -> AnalysisParams {
        self.session.lock().await.params().clone()
    }

    pub async fn update_params<F>(&self, f: F)
    where
        F: FnOnce(&mut AnalysisParams),
    {
        let mut session = self.session.lock().await;
        f(session.params_mut());
        debug!(params = ?session.params(), "Analysis parameters updated");
    }

    pub async fn provinces(&self) -> SelectionList {
        self.session.lock().await.provinces().clone()
    }

    pub async fn cities(&self) -> SelectionList {
        self.session.lock().await.cities().clone()
    }

    // ------------------------------------------------------------------
    // Shared plumbing
    // ------------------------------------------------------------------

    fn begin(&self, kind: OperationKind) -> Option<OperationTicket> {
        let ticket = self.guard.try_begin(kind);
        if ticket.is_none() {
            let err = ClientError::Busy(kind);
            warn!(operation = kind.label(), "Operation already in progress");
            self.ui.alert(err.severity(), &err.to_string());
        }
        ticket
    }

    fn loading(&self, title: &str, subtitle: &str) -> LoadingScope<'_> {
        LoadingScope::show(&*self.ui, title, subtitle)
    }

    fn report(&self, context: &str, err: &ClientError) {
        warn!(error = %err, context = context, "Operation failed");
        self.ui
            .alert(err.severity(), &format!("{}: {}", context, err));
    }

    fn precondition(&self, message: &str) {
        let err = ClientError::Precondition(message.to_string());
        debug!(reason = message, "Precondition not met");
        self.ui.alert(err.severity(), &err.to_string());
    }

    async fn require_aoi(&self) -> Option<(AreaOfInterest, AnalysisParams)> {
        let found = {
            let session = self.session.lock().await;
            session
                .aoi()
                .cloned()
                .map(|aoi| (aoi, session.params().clone()))
        };
        if found.is_none() {
            self.precondition("Please select or draw an area of interest first");
        }
        found
    }

    // ------------------------------------------------------------------
    // Health
    // ------------------------------------------------------------------

    /// Query backend health. `None` when unreachable.
    pub async fn check_health(&self) -> Option<HealthStatus> {
        let _ticket = self.begin(OperationKind::HealthCheck)?;
        match self.client.health().await {
            Ok(status) => {
                info!(
                    status = %status.status,
                    gee_initialized = status.gee_initialized,
                    "Backend health"
                );
                Some(status)
            }
            Err(e) => {
                warn!(error = %e, "Backend health check failed");
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Regions
    // ------------------------------------------------------------------

    /// Rebuild the province selector from the backend.
    pub async fn load_provinces(&self) -> Vec<RegionOption> {
        let Some(_ticket) = self.begin(OperationKind::LoadProvinces) else {
            return Vec::new();
        };

        let scope = self.loading("Loading provinces", "Fetching administrative regions");
        let result = self.client.provinces().await;
        scope.finish();

        match result {
            Ok(payload) => {
                let list = SelectionList::from_payload(&payload, "provinces");
                let options = list.options().to_vec();
                self.session.lock().await.replace_provinces(list);
                self.ui.populate_select(Selector::Province, &options);
                self.ui.clear_select(Selector::City);
                info!(count = options.len(), "Provinces loaded");
                options
            }
            Err(e) => {
                self.report("Failed to load provinces", &e);
                Vec::new()
            }
        }
    }

    /// Select a province by display name and reload its cities.
    pub async fn select_province(&self, name: &str) -> Vec<RegionOption> {
        let selected = {
            let mut session = self.session.lock().await;
            let option = session.provinces_mut().select(name);
            if option.is_some() {
                session.replace_cities(SelectionList::default());
            }
            option
        };

        let Some(province) = selected else {
            self.precondition(&format!("Unknown province: {}", name));
            return Vec::new();
        };

        self.ui.clear_select(Selector::City);
        self.load_cities(&province.code).await
    }

    /// Replace the city selector with the cities of `province_code`.
    pub async fn load_cities(&self, province_code: &str) -> Vec<RegionOption> {
        let Some(_ticket) = self.begin(OperationKind::LoadCities) else {
            return Vec::new();
        };

        let scope = self.loading("Loading cities", province_code);
        let result = self.client.cities(province_code).await;
        scope.finish();

        match result {
            Ok(payload) => {
                let list = SelectionList::from_payload(&payload, "cities");
                let options = list.options().to_vec();
                self.session.lock().await.replace_cities(list);
                self.ui.populate_select(Selector::City, &options);
                info!(province_code = province_code, count = options.len(), "Cities loaded");
                options
            }
            Err(e) => {
                self.report("Failed to load cities", &e);
                Vec::new()
            }
        }
    }

    /// Select a city by display name. No request is made.
    pub async fn select_city(&self, name: &str) -> Option<RegionOption> {
        let selected = self.session.lock().await.cities_mut().select(name);
        if selected.is_none() {
            self.precondition(&format!("Unknown city: {}", name));
        }
        selected
    }

    /// Load the selected city, or the selected province when no city is chosen.
    pub async fn load_selected_region(&self) -> Option<AreaOfInterest> {
        let target = {
            let session = self.session.lock().await;
            session
                .cities()
                .selected()
                .map(|c| (RegionLevel::City, c.clone()))
                .or_else(|| {
                    session
                        .provinces()
                        .selected()
                        .map(|p| (RegionLevel::Province, p.clone()))
                })
        };

        match target {
            Some((level, option)) => self.load_region(level, &option.code, &option.name).await,
            None => {
                self.precondition("Please select a province or city first");
                None
            }
        }
    }

    /// Fetch a region boundary and make it the AOI.
    pub async fn load_region(
        &self,
        level: RegionLevel,
        code: &str,
        name: &str,
    ) -> Option<AreaOfInterest> {
        let _ticket = self.begin(OperationKind::LoadRegion)?;

        let scope = self.loading("Loading region", name);
        let result = self.client.geometry(level, code).await;
        scope.finish();

        let payload = match result {
            Ok(payload) => payload,
            Err(e) => {
                self.report("Failed to load region", &e);
                return None;
            }
        };

        let parsed = RegionGeometry::from_payload(payload).and_then(|geometry| {
            let bounds = Bounds::from_geojson(&geometry.geojson)?;
            Some((geometry, bounds))
        });
        let Some((geometry, bounds)) = parsed else {
            self.report(
                "Failed to load region",
                &ClientError::Decode(format!("no boundary geometry for {}", name)),
            );
            return None;
        };

        let area_km2 = geometry
            .area_km2
            .unwrap_or_else(|| geometry::area_km2(&geometry.geojson));

        let aoi = AreaOfInterest {
            kind: AoiKind::Admin,
            name: name.to_string(),
            bounds,
            area_km2,
            geojson: Some(geometry.geojson),
        };
        self.apply_aoi(aoi.clone()).await;
        info!(region = name, level = ?level, area_km2 = area_km2, "Region loaded");
        Some(aoi)
    }

    /// Use a hand-drawn shape as the AOI.
    pub async fn set_drawn_area(&self, geojson: Value, name: Option<&str>) -> Option<AreaOfInterest> {
        let Some(bounds) = Bounds::from_geojson(&geojson) else {
            self.precondition("The drawn shape has no coordinates");
            return None;
        };

        let aoi = AreaOfInterest {
            kind: AoiKind::Drawn,
            name: name.unwrap_or(DRAWN_AREA_NAME).to_string(),
            bounds,
            area_km2: geometry::area_km2(&geojson),
            geojson: Some(geojson),
        };
        self.apply_aoi(aoi.clone()).await;
        info!(region = %aoi.name, area_km2 = aoi.area_km2, "Drawn area set");
        Some(aoi)
    }

    async fn apply_aoi(&self, aoi: AreaOfInterest) {
        self.session.lock().await.set_aoi(aoi.clone());
        self.map.clear_analysis_layers();
        if let Some(geojson) = &aoi.geojson {
            self.map.show_boundary(&aoi.name, geojson);
        }
        self.map.fit_bounds(&aoi.bounds);
        self.ui.show_area_info(&aoi);
    }

    /// Drop the AOI, its results and every layer.
    pub async fn clear_map(&self) {
        self.session.lock().await.clear_aoi();
        self.map.clear_analysis_layers();
        self.map.clear_boundary();
        info!("Map cleared");
    }

    // ------------------------------------------------------------------
    // Analyses
    // ------------------------------------------------------------------

    async fn vegetation_step(&self) -> Option<VegetationResponse> {
        let _ticket = self.begin(OperationKind::Vegetation)?;
        let (aoi, params) = self.require_aoi().await?;
        self.fetch_vegetation(&aoi, &params).await
    }

    /// Caller holds the `Vegetation` ticket.
    async fn fetch_vegetation(
        &self,
        aoi: &AreaOfInterest,
        params: &AnalysisParams,
    ) -> Option<VegetationResponse> {
        let request = VegetationRequest::new(aoi, params);
        let scope = self.loading(
            "Running vegetation analysis",
            &format!("{} · {} · {}", aoi.name, params.year, params.indices.join(", ")),
        );
        let result = self.client.analyze_vegetation(&request).await;
        scope.finish();

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.report("Vegetation analysis failed", &e);
                return None;
            }
        };

        {
            let mut session = self.session.lock().await;
            if session.aoi() != Some(aoi) {
                debug!(
                    region = %aoi.name,
                    "Area changed during vegetation analysis, discarding response"
                );
                return None;
            }
            for (index, url) in &response.tile_urls {
                self.map.add_tile_layer(index, url);
            }
            if let Some(url) = &response.rgb_tile_url {
                self.map.add_tile_layer("RGB", url);
            }
            session.results_mut().record_vegetation(response.clone());
        }
        info!(
            region = %aoi.name,
            indices = response.statistics.len(),
            collection_size = ?response.collection_size,
            "Vegetation analysis complete"
        );
        Some(response)
    }

    async fn landcover_step(&self) -> Option<LandcoverResponse> {
        let _ticket = self.begin(OperationKind::Landcover)?;
        let (aoi, params) = self.require_aoi().await?;
        self.fetch_landcover(&aoi, &params).await
    }

    /// Caller holds the `Landcover` ticket.
    async fn fetch_landcover(
        &self,
        aoi: &AreaOfInterest,
        params: &AnalysisParams,
    ) -> Option<LandcoverResponse> {
        let request = LandcoverRequest::new(aoi, params);
        let scope = self.loading(
            "Running land cover analysis",
            &format!("{} · {}", aoi.name, params.year),
        );
        let result = self.client.analyze_landcover(&request).await;
        scope.finish();

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.report("Land cover analysis failed", &e);
                return None;
            }
        };

        {
            let mut session = self.session.lock().await;
            if session.aoi() != Some(aoi) {
                debug!(
                    region = %aoi.name,
                    "Area changed during land cover analysis, discarding response"
                );
                return None;
            }
            for (dataset, url) in &response.tile_urls {
                self.map.add_tile_layer(dataset, url);
            }
            session.results_mut().record_landcover(response.clone());
        }
        info!(
            region = %aoi.name,
            datasets = response.classes.len(),
            "Land cover analysis complete"
        );
        Some(response)
    }

    fn show_results(&self, results: &AnalysisResults) {
        if let Err(e) = self.ui.display_results(results) {
            self.report("Failed to display results", &e);
        }
    }

    /// Run only the vegetation analysis and display the accumulated results.
    pub async fn run_vegetation(&self) -> Option<VegetationResponse> {
        let response = self.vegetation_step().await?;
        let results = self.results().await;
        self.show_results(&results);
        Some(response)
    }

    /// Run only the land cover analysis and display the accumulated results.
    pub async fn run_landcover(&self) -> Option<LandcoverResponse> {
        let response = self.landcover_step().await?;
        let results = self.results().await;
        self.show_results(&results);
        Some(response)
    }

    /// Run the analyses selected by the current analysis type, one after the other.
    ///
    /// Partial results are kept when one sub-analysis fails; results are
    /// displayed when at least one succeeded. The sub-analyses it will run
    /// are claimed up front, so a standalone run of either rejects the
    /// whole composite.
    pub async fn run_complete_analysis(&self) -> AnalysisResults {
        let Some(_ticket) = self.begin(OperationKind::CompleteAnalysis) else {
            return AnalysisResults::default();
        };

        let analysis_type = self.session.lock().await.params().analysis_type;
        let mut kinds = Vec::new();
        if analysis_type.includes_vegetation() {
            kinds.push(OperationKind::Vegetation);
        }
        if analysis_type.includes_landcover() {
            kinds.push(OperationKind::Landcover);
        }
        let Some(_steps) = kinds
            .into_iter()
            .map(|kind| self.begin(kind))
            .collect::<Option<Vec<_>>>()
        else {
            return AnalysisResults::default();
        };

        match self.compose_analysis(analysis_type).await {
            Ok(results) => results,
            Err(e) => {
                error!(error = %e, "Complete analysis failed");
                self.session.lock().await.reset_results();
                self.map.clear_analysis_layers();
                self.ui.alert(
                    Severity::Danger,
                    &format!("Analysis failed unexpectedly: {}", e),
                );
                AnalysisResults::default()
            }
        }
    }

    async fn compose_analysis(
        &self,
        analysis_type: AnalysisType,
    ) -> Result<AnalysisResults, ClientError> {
        let Some((aoi, params)) = self.require_aoi().await else {
            return Ok(AnalysisResults::default());
        };

        self.session.lock().await.reset_results();
        self.map.clear_analysis_layers();
        info!(
            region = %aoi.name,
            analysis_type = ?analysis_type,
            year = params.year,
            "Starting complete analysis"
        );

        if analysis_type.includes_vegetation() {
            self.fetch_vegetation(&aoi, &params).await;
        }
        if analysis_type.includes_landcover() {
            self.fetch_landcover(&aoi, &params).await;
        }

        let results = self.results().await;
        if results.is_empty() {
            warn!(region = %aoi.name, "No analysis produced results");
            return Ok(results);
        }

        self.ui.display_results(&results)?;
        self.ui.alert(Severity::Success, "Analysis complete");
        Ok(results)
    }

    /// Request a time series. The AOI bounds are filled in when the caller
    /// did not supply any.
    pub async fn run_timeseries(&self, params: Value) -> Option<Value> {
        let _ticket = self.begin(OperationKind::TimeSeries)?;
        let params = self.with_aoi_bounds(params).await?;

        let scope = self.loading("Running time series analysis", "This may take a few minutes");
        let result = self.client.timeseries(params).await;
        scope.finish();

        match result {
            Ok(series) => {
                if let Err(e) = self.ui.show_timeseries(&series) {
                    self.report("Failed to display time series", &e);
                }
                Some(series)
            }
            Err(e) => {
                self.report("Time series analysis failed", &e);
                None
            }
        }
    }

    /// Ask the backend to export imagery or statistics.
    pub async fn request_export(&self, params: Value) -> Option<Value> {
        let _ticket = self.begin(OperationKind::Export)?;
        let params = self.with_aoi_bounds(params).await?;

        let scope = self.loading("Preparing export", "Submitting export task");
        let result = self.client.export(params).await;
        scope.finish();

        match result {
            Ok(response) => {
                let message = response
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("Export started");
                self.ui.alert(Severity::Success, message);
                Some(response)
            }
            Err(e) => {
                self.report("Export failed", &e);
                None
            }
        }
    }

    async fn with_aoi_bounds(&self, params: Value) -> Option<Value> {
        let mut params = match params {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            _ => {
                self.precondition("Request parameters must be a JSON object");
                return None;
            }
        };

        if !params.contains_key("bounds") {
            let (aoi, _) = self.require_aoi().await?;
            params.insert("bounds".into(), serde_json::json!(aoi.bounds.to_array()));
            params
                .entry("region")
                .or_insert_with(|| Value::String(aoi.name.clone()));
        }
        Some(Value::Object(params))
    }

    /// Build the statistics snapshot and hand it to the UI as a download.
    pub async fn download_statistics(&self) -> Option<String> {
        let _ticket = self.begin(OperationKind::Download)?;

        let prepared = {
            let session = self.session.lock().await;
            match session.aoi() {
                None => Err("Please select or draw an area of interest first"),
                Some(_) if session.results().is_empty() => {
                    Err("Run an analysis before downloading statistics")
                }
                Some(aoi) => Ok(StatisticsSnapshot::new(
                    aoi,
                    session.params(),
                    session.results(),
                    Utc::now(),
                )),
            }
        };

        let snapshot = match prepared {
            Ok(snapshot) => snapshot,
            Err(reason) => {
                self.precondition(reason);
                return None;
            }
        };

        let filename = snapshot.filename();
        let saved = snapshot
            .to_json_bytes()
            .map_err(ClientError::from)
            .and_then(|bytes| self.ui.save_download(&filename, &bytes));

        match saved {
            Ok(()) => {
                info!(filename = %filename, region = %snapshot.region, "Statistics downloaded");
                self.ui
                    .alert(Severity::Success, &format!("Statistics saved as {}", filename));
                Some(filename)
            }
            Err(e) => {
                self.report("Failed to download statistics", &e);
                None
            }
        }
    }
}
