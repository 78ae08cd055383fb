//! Scripted transport and recording UI adapters shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use gee_client::{
    AnalysisResults, ApiRequest, ApiResult, AreaOfInterest, Bounds, ClientError, GeeClient,
    MapView, Orchestrator, RegionOption, Selector, Severity, Transport, Ui,
};

// ============================================================================
// Transport
// ============================================================================

/// Replies per path. Queued replies are used first, then the sticky one.
#[derive(Default)]
pub struct ScriptedTransport {
    queued: Mutex<HashMap<String, VecDeque<ApiResult<Value>>>>,
    sticky: Mutex<HashMap<String, ApiResult<Value>>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to every request on `path` with `reply`.
    pub fn on(self, path: &str, reply: ApiResult<Value>) -> Self {
        self.sticky.lock().unwrap().insert(path.to_string(), reply);
        self
    }

    /// Reply once to the next request on `path`.
    pub fn once(self, path: &str, reply: ApiResult<Value>) -> Self {
        self.queued
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Hold requests on `path` until the returned handle is notified.
    pub fn gate(&self, path: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(path.to_string(), Arc::clone(&notify));
        notify
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .count()
    }

    pub fn last_to(&self, path: &str) -> Option<ApiRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.path == path)
            .cloned()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> ApiResult<Value> {
        let path = request.path.clone();
        self.requests.lock().unwrap().push(request);

        let gate = self.gates.lock().unwrap().get(&path).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let queued = self
            .queued
            .lock()
            .unwrap()
            .get_mut(&path)
            .and_then(VecDeque::pop_front);
        if let Some(reply) = queued {
            return reply;
        }
        self.sticky
            .lock()
            .unwrap()
            .get(&path)
            .cloned()
            .unwrap_or_else(|| Err(ClientError::Network(format!("no reply scripted for {}", path))))
    }
}

/// Backend error in the shape the transport produces for a JSON error body.
pub fn backend_error(status: u16, message: &str) -> ApiResult<Value> {
    Err(ClientError::Http {
        status,
        message: message.to_string(),
    })
}

// ============================================================================
// UI
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum UiCall {
    ShowLoading(String, String),
    HideLoading,
    Alert(Severity, String),
    Populate(Selector, Vec<RegionOption>),
    ClearSelect(Selector),
    AreaInfo(String),
    Results(AnalysisResults),
    TimeSeries(Value),
    Download(String, Vec<u8>),
}

/// Records every call and keeps selector contents like a real page would.
#[derive(Default)]
pub struct RecordingUi {
    calls: Mutex<Vec<UiCall>>,
    selects: Mutex<HashMap<Selector, Vec<RegionOption>>>,
    fail_display: AtomicBool,
}

impl RecordingUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_display(&self) {
        self.fail_display.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<UiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn options(&self, selector: Selector) -> Vec<RegionOption> {
        self.selects
            .lock()
            .unwrap()
            .get(&selector)
            .cloned()
            .unwrap_or_default()
    }

    pub fn alerts(&self) -> Vec<(Severity, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                UiCall::Alert(severity, message) => Some((severity, message)),
                _ => None,
            })
            .collect()
    }

    pub fn alerts_of(&self, severity: Severity) -> Vec<String> {
        self.alerts()
            .into_iter()
            .filter(|(s, _)| *s == severity)
            .map(|(_, m)| m)
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&UiCall) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn shows(&self) -> usize {
        self.count(|c| matches!(c, UiCall::ShowLoading(..)))
    }

    pub fn hides(&self) -> usize {
        self.count(|c| matches!(c, UiCall::HideLoading))
    }

    fn push(&self, call: UiCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Ui for RecordingUi {
    fn show_loading(&self, title: &str, subtitle: &str) {
        self.push(UiCall::ShowLoading(title.into(), subtitle.into()));
    }

    fn hide_loading(&self) {
        self.push(UiCall::HideLoading);
    }

    fn alert(&self, severity: Severity, message: &str) {
        self.push(UiCall::Alert(severity, message.into()));
    }

    fn populate_select(&self, selector: Selector, options: &[RegionOption]) {
        self.selects
            .lock()
            .unwrap()
            .insert(selector, options.to_vec());
        self.push(UiCall::Populate(selector, options.to_vec()));
    }

    fn clear_select(&self, selector: Selector) {
        self.selects.lock().unwrap().remove(&selector);
        self.push(UiCall::ClearSelect(selector));
    }

    fn show_area_info(&self, aoi: &AreaOfInterest) {
        self.push(UiCall::AreaInfo(aoi.name.clone()));
    }

    fn display_results(&self, results: &AnalysisResults) -> Result<(), ClientError> {
        if self.fail_display.load(Ordering::SeqCst) {
            return Err(ClientError::Ui("chart canvas missing".into()));
        }
        self.push(UiCall::Results(results.clone()));
        Ok(())
    }

    fn show_timeseries(&self, series: &Value) -> Result<(), ClientError> {
        self.push(UiCall::TimeSeries(series.clone()));
        Ok(())
    }

    fn save_download(&self, filename: &str, contents: &[u8]) -> Result<(), ClientError> {
        self.push(UiCall::Download(filename.into(), contents.to_vec()));
        Ok(())
    }
}

// ============================================================================
// Map
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum MapCall {
    ClearAnalysisLayers,
    Boundary(String),
    ClearBoundary,
    FitBounds(Bounds),
    TileLayer(String, String),
}

#[derive(Default)]
pub struct RecordingMap {
    calls: Mutex<Vec<MapCall>>,
}

impl RecordingMap {
    pub fn calls(&self) -> Vec<MapCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn tile_layers(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                MapCall::TileLayer(name, _) => Some(name),
                _ => None,
            })
            .collect()
    }
}

impl MapView for RecordingMap {
    fn clear_analysis_layers(&self) {
        self.calls.lock().unwrap().push(MapCall::ClearAnalysisLayers);
    }

    fn show_boundary(&self, name: &str, _geojson: &Value) {
        self.calls.lock().unwrap().push(MapCall::Boundary(name.into()));
    }

    fn clear_boundary(&self) {
        self.calls.lock().unwrap().push(MapCall::ClearBoundary);
    }

    fn fit_bounds(&self, bounds: &Bounds) {
        self.calls.lock().unwrap().push(MapCall::FitBounds(*bounds));
    }

    fn add_tile_layer(&self, name: &str, url_template: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(MapCall::TileLayer(name.into(), url_template.into()));
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub orchestrator: Arc<Orchestrator<Arc<ScriptedTransport>>>,
    pub transport: Arc<ScriptedTransport>,
    pub ui: Arc<RecordingUi>,
    pub map: Arc<RecordingMap>,
}

impl Harness {
    pub fn new(transport: ScriptedTransport) -> Self {
        let transport = Arc::new(transport);
        let ui = Arc::new(RecordingUi::new());
        let map = Arc::new(RecordingMap::default());
        let orchestrator = Arc::new(Orchestrator::new(
            GeeClient::new(Arc::clone(&transport)),
            ui.clone(),
            map.clone(),
        ));
        Self {
            orchestrator,
            transport,
            ui,
            map,
        }
    }
}
