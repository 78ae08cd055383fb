//! Downloadable statistics snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AnalysisParams, AnalysisResults, AreaOfInterest};

/// JSON document handed to the user by the "download statistics" action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub analysis_date: DateTime<Utc>,
    pub region: String,
    pub area_km2: f64,
    pub year: i32,
    pub parameters: AnalysisParams,
    pub results: AnalysisResults,
}

impl StatisticsSnapshot {
    pub fn new(
        aoi: &AreaOfInterest,
        params: &AnalysisParams,
        results: &AnalysisResults,
        analysis_date: DateTime<Utc>,
    ) -> Self {
        Self {
            analysis_date,
            region: aoi.name.clone(),
            area_km2: aoi.area_km2,
            year: params.year,
            parameters: params.clone(),
            results: results.clone(),
        }
    }

    /// `gee_analysis_<region, spaces as underscores>_<epoch millis>.json`
    pub fn filename(&self) -> String {
        snapshot_filename(&self.region, self.analysis_date.timestamp_millis())
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}

pub fn snapshot_filename(region: &str, epoch_millis: i64) -> String {
    format!("gee_analysis_{}_{}.json", region.replace(' ', "_"), epoch_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Bounds;
    use crate::models::{AoiKind, VegetationResponse};
    use chrono::TimeZone;

    fn aoi() -> AreaOfInterest {
        AreaOfInterest {
            kind: AoiKind::Admin,
            name: "Kabupaten Bandung Barat".into(),
            bounds: Bounds::new(107.2, -7.1, 107.7, -6.7),
            area_km2: 1305.8,
            geojson: None,
        }
    }

    #[test]
    fn test_filename_replaces_spaces() {
        assert_eq!(
            snapshot_filename("Kota Bandung", 1_700_000_000_000),
            "gee_analysis_Kota_Bandung_1700000000000.json"
        );
        assert_eq!(snapshot_filename("Bali", 5), "gee_analysis_Bali_5.json");
    }

    #[test]
    fn test_snapshot_round_trips_region() {
        let date = Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap();
        let mut results = AnalysisResults::default();
        results.record_vegetation(VegetationResponse {
            collection_size: Some(12),
            ..Default::default()
        });
        let snapshot = StatisticsSnapshot::new(&aoi(), &AnalysisParams::default(), &results, date);

        let bytes = snapshot.to_json_bytes().unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["region"], "Kabupaten Bandung Barat");
        assert_eq!(parsed["results"]["collection_size"], 12);

        let back: StatisticsSnapshot = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, snapshot);
        assert_eq!(
            back.filename(),
            format!("gee_analysis_Kabupaten_Bandung_Barat_{}.json", date.timestamp_millis())
        );
    }
}
