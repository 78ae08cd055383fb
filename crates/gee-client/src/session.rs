//! Session state owned by the orchestration layer.

use crate::models::{AnalysisParams, AnalysisResults, AreaOfInterest, SelectionList};

/// Everything one user session reads and writes between operations.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    aoi: Option<AreaOfInterest>,
    results: AnalysisResults,
    params: AnalysisParams,
    provinces: SelectionList,
    cities: SelectionList,
}

impl SessionState {
    pub fn new(params: AnalysisParams) -> Self {
        Self {
            params,
            ..Default::default()
        }
    }

    pub fn aoi(&self) -> Option<&AreaOfInterest> {
        self.aoi.as_ref()
    }

    /// Replace the AOI. Results computed for the previous one are dropped.
    pub fn set_aoi(&mut self, aoi: AreaOfInterest) {
        self.aoi = Some(aoi);
        self.results = AnalysisResults::default();
    }

    pub fn clear_aoi(&mut self) {
        self.aoi = None;
        self.results = AnalysisResults::default();
    }

    pub fn results(&self) -> &AnalysisResults {
        &self.results
    }

    pub fn results_mut(&mut self) -> &mut AnalysisResults {
        &mut self.results
    }

    pub fn reset_results(&mut self) {
        self.results = AnalysisResults::default();
    }

    pub fn params(&self) -> &AnalysisParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut AnalysisParams {
        &mut self.params
    }

    pub fn provinces(&self) -> &SelectionList {
        &self.provinces
    }

    pub fn provinces_mut(&mut self) -> &mut SelectionList {
        &mut self.provinces
    }

    /// Replace the province list; the city list depends on it and is cleared.
    pub fn replace_provinces(&mut self, provinces: SelectionList) {
        self.provinces = provinces;
        self.cities.clear();
    }

    pub fn cities(&self) -> &SelectionList {
        &self.cities
    }

    pub fn cities_mut(&mut self) -> &mut SelectionList {
        &mut self.cities
    }

    pub fn replace_cities(&mut self, cities: SelectionList) {
        self.cities = cities;
    }
}
