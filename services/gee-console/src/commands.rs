//! Console command parsing.
//!
//! Each input line maps to either a UI event for the orchestrator or a
//! console-local action (settings, status, help).

use std::path::PathBuf;

use gee_client::{AnalysisParams, AnalysisType, LandcoverMode, UiEvent};
use serde_json::Value;
use thiserror::Error;

pub const HELP: &str = "\
Commands:
  provinces                 reload the province list
  province <name>           select a province and load its cities
  city <name>               select a city
  load                      load the selected city (or province) as the area of interest
  draw <file> [name]        use a GeoJSON file as the area of interest
  analyze                   run the analyses selected by `set type`
  vegetation                run the vegetation analysis only
  landcover                 run the land cover analysis only
  set <key> <value>         change an analysis parameter (see below)
  timeseries [json]         request a time series, e.g. {\"index\": \"NDVI\"}
  export [json]             submit an export task
  download                  save the statistics of the last analysis
  clear                     drop the area of interest and all layers
  status                    show the current session
  help                      show this help
  quit                      exit

Settings:
  type <vegetation|landcover|combined>
  year <yyyy>   start_month <1-12>   end_month <1-12>
  cloud <0-100>   indices <NDVI,EVI,...>
  dynamic_world <on|off>   esa_worldcover <on|off>
  mode <annual|seasonal>";

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("Unknown command: {0} (type `help` for a list)")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Invalid JSON: {0}")]
    Json(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidSetting { key: String, reason: String },
}

/// A single analysis parameter change.
#[derive(Debug, Clone, PartialEq)]
pub enum Setting {
    AnalysisType(AnalysisType),
    Year(i32),
    StartMonth(u32),
    EndMonth(u32),
    CloudThreshold(u32),
    Indices(Vec<String>),
    DynamicWorld(bool),
    EsaWorldcover(bool),
    Mode(LandcoverMode),
}

impl Setting {
    pub fn parse(key: &str, value: &str) -> Result<Self, CommandError> {
        let invalid = |reason: String| CommandError::InvalidSetting {
            key: key.to_string(),
            reason,
        };

        let setting = match key.to_ascii_lowercase().as_str() {
            "type" => Setting::AnalysisType(value.parse().map_err(invalid)?),
            "year" => {
                let year: i32 = value.parse().map_err(|_| invalid("expected a year".into()))?;
                if !(1984..=2100).contains(&year) {
                    return Err(invalid(format!("{} is outside 1984-2100", year)));
                }
                Setting::Year(year)
            }
            "start_month" => Setting::StartMonth(parse_month(value).map_err(invalid)?),
            "end_month" => Setting::EndMonth(parse_month(value).map_err(invalid)?),
            "cloud" | "cloud_threshold" => {
                let pct: u32 = value
                    .parse()
                    .map_err(|_| invalid("expected a percentage".into()))?;
                if pct > 100 {
                    return Err(invalid(format!("{} is above 100", pct)));
                }
                Setting::CloudThreshold(pct)
            }
            "indices" => {
                let indices: Vec<String> = value
                    .split(',')
                    .map(|s| s.trim().to_ascii_uppercase())
                    .filter(|s| !s.is_empty())
                    .collect();
                if indices.is_empty() {
                    return Err(invalid("at least one index is required".into()));
                }
                Setting::Indices(indices)
            }
            "dynamic_world" => Setting::DynamicWorld(parse_switch(value).map_err(invalid)?),
            "esa_worldcover" => Setting::EsaWorldcover(parse_switch(value).map_err(invalid)?),
            "mode" => Setting::Mode(value.parse().map_err(invalid)?),
            _ => return Err(invalid("unknown setting".into())),
        };
        Ok(setting)
    }

    pub fn apply(self, params: &mut AnalysisParams) {
        match self {
            Setting::AnalysisType(t) => params.analysis_type = t,
            Setting::Year(y) => params.year = y,
            Setting::StartMonth(m) => {
                params.start_month = m;
                params.end_month = params.end_month.max(m);
            }
            Setting::EndMonth(m) => {
                params.end_month = m;
                params.start_month = params.start_month.min(m);
            }
            Setting::CloudThreshold(pct) => params.cloud_threshold = pct,
            Setting::Indices(indices) => params.indices = indices,
            Setting::DynamicWorld(on) => params.use_dynamic_world = on,
            Setting::EsaWorldcover(on) => params.use_esa_worldcover = on,
            Setting::Mode(mode) => params.landcover_mode = mode,
        }
    }
}

fn parse_month(value: &str) -> Result<u32, String> {
    match value.parse::<u32>() {
        Ok(m) if (1..=12).contains(&m) => Ok(m),
        _ => Err(format!("{} is not a month (1-12)", value)),
    }
}

fn parse_switch(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        other => Err(format!("expected on/off, got {}", other)),
    }
}

/// A parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Event(UiEvent),
    Draw { path: PathBuf, name: Option<String> },
    Set(Setting),
    Status,
    Help,
    Quit,
}

/// Parse one input line. Blank lines and `#` comments yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "provinces" => Command::Event(UiEvent::RefreshProvinces),
        "province" => Command::Event(UiEvent::ProvinceChanged(required(
            rest,
            "province <name>",
        )?)),
        "city" => Command::Event(UiEvent::CityChanged(required(rest, "city <name>")?)),
        "load" => Command::Event(UiEvent::LoadRegionClicked),
        "draw" => {
            let rest = required(rest, "draw <file> [name]")?;
            let (path, name) = match rest.split_once(char::is_whitespace) {
                Some((path, name)) => (path, Some(name.trim().to_string())),
                None => (rest.as_str(), None),
            };
            Command::Draw {
                path: PathBuf::from(path),
                name,
            }
        }
        "analyze" | "run" => Command::Event(UiEvent::RunAnalysisClicked),
        "vegetation" => Command::Event(UiEvent::VegetationClicked),
        "landcover" => Command::Event(UiEvent::LandcoverClicked),
        "set" => {
            let usage = "set <key> <value>";
            let (key, value) = rest
                .split_once(char::is_whitespace)
                .ok_or(CommandError::Usage(usage))?;
            Command::Set(Setting::parse(key, value.trim())?)
        }
        "timeseries" => Command::Event(UiEvent::TimeSeriesClicked(json_arg(rest)?)),
        "export" => Command::Event(UiEvent::ExportClicked(json_arg(rest)?)),
        "download" => Command::Event(UiEvent::DownloadClicked),
        "clear" => Command::Event(UiEvent::ClearClicked),
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn required(rest: &str, usage: &'static str) -> Result<String, CommandError> {
    if rest.is_empty() {
        Err(CommandError::Usage(usage))
    } else {
        Ok(rest.to_string())
    }
}

fn json_arg(rest: &str) -> Result<Value, CommandError> {
    if rest.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(rest).map_err(|e| CommandError::Json(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blank_and_comment_lines() {
        assert_eq!(parse("   "), Ok(None));
        assert_eq!(parse("# analysis for Bali"), Ok(None));
    }

    #[test]
    fn test_names_keep_spaces() {
        assert_eq!(
            parse("province Jawa Barat").unwrap(),
            Some(Command::Event(UiEvent::ProvinceChanged("Jawa Barat".into())))
        );
        assert_eq!(
            parse("CITY   Kota Bandung ").unwrap(),
            Some(Command::Event(UiEvent::CityChanged("Kota Bandung".into())))
        );
        assert_eq!(parse("province"), Err(CommandError::Usage("province <name>")));
    }

    #[test]
    fn test_draw_with_and_without_name() {
        assert_eq!(
            parse("draw area.geojson").unwrap(),
            Some(Command::Draw {
                path: PathBuf::from("area.geojson"),
                name: None
            })
        );
        assert_eq!(
            parse("draw /tmp/farm.json North Field").unwrap(),
            Some(Command::Draw {
                path: PathBuf::from("/tmp/farm.json"),
                name: Some("North Field".into())
            })
        );
    }

    #[test]
    fn test_json_arguments() {
        assert_eq!(
            parse("timeseries").unwrap(),
            Some(Command::Event(UiEvent::TimeSeriesClicked(Value::Null)))
        );
        assert_eq!(
            parse(r#"export {"format": "GeoTIFF", "scale": 30}"#).unwrap(),
            Some(Command::Event(UiEvent::ExportClicked(
                json!({"format": "GeoTIFF", "scale": 30})
            )))
        );
        assert!(matches!(parse("export {nope"), Err(CommandError::Json(_))));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(parse("zoom 5"), Err(CommandError::Unknown("zoom".into())));
    }

    #[test]
    fn test_settings_parse() {
        assert_eq!(
            parse("set type vegetation").unwrap(),
            Some(Command::Set(Setting::AnalysisType(AnalysisType::Vegetation)))
        );
        assert_eq!(
            Setting::parse("indices", "ndvi, evi,,savi").unwrap(),
            Setting::Indices(vec!["NDVI".into(), "EVI".into(), "SAVI".into()])
        );
        assert_eq!(
            Setting::parse("esa_worldcover", "off").unwrap(),
            Setting::EsaWorldcover(false)
        );
        assert!(Setting::parse("cloud", "120").is_err());
        assert!(Setting::parse("start_month", "13").is_err());
        assert!(Setting::parse("year", "soon").is_err());
        assert!(Setting::parse("zoom", "3").is_err());
        assert_eq!(parse("set year"), Err(CommandError::Usage("set <key> <value>")));
    }

    #[test]
    fn test_month_settings_keep_range_ordered() {
        let mut params = AnalysisParams {
            start_month: 3,
            end_month: 6,
            ..Default::default()
        };

        Setting::StartMonth(9).apply(&mut params);
        assert_eq!((params.start_month, params.end_month), (9, 9));

        Setting::EndMonth(2).apply(&mut params);
        assert_eq!((params.start_month, params.end_month), (2, 2));

        Setting::EndMonth(11).apply(&mut params);
        assert_eq!((params.start_month, params.end_month), (2, 11));
    }
}
