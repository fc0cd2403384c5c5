//! # Reanalysis Time Series Download and Caching
//!
//! Retrieves point-located hourly reanalysis series, one calendar year per request,
//! and keeps each year as a JSON file so that later runs only download what is missing.
//!
//! ## Data Source
//!
//! ### Open-Meteo historical archive
//! - **URL**: https://archive-api.open-meteo.com/v1/archive
//! - **Model**: ERA5 (configurable)
//! - **Format**: JSON, hourly arrays aligned with a `time` array (UTC)
//!
//! Variables are normalised to ERA5 conventions:
//! - `ssrd`: surface solar radiation downwards, J/m² accumulated over the hour
//!   (archive `shortwave_radiation` is the hourly mean in W/m², × 3600)
//! - `u100` / `v100`: 100 m wind components in m/s, derived from the archive's
//!   `wind_speed_100m` and meteorological `wind_direction_100m`
//!
//! ## Caching Strategy
//! - **Location**: `<site output dir>/<prefix>_<year>.json`
//! - **Validity**: a present, parseable file is reused forever (historical data)
//! - **Corruption**: an unreadable file is discarded and downloaded again
//!
//! ## Error Handling
//! A failure for one year is logged and that year is skipped; the remaining years are
//! still fetched. [`FetchReport`] lists what came from where.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{fs, io};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ReanalysisConfig;
use crate::Site;

/// Errors that can occur while fetching or caching one year of data.
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request failed (network, server, or protocol error)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Archive answered with a non-success status
    #[error("archive returned status {0}")]
    Status(u16),

    /// Response did not have the expected structure
    #[error("unexpected archive response: {0}")]
    Parse(String),

    /// Cache file operations failed
    #[error("cache IO: {0}")]
    Cache(#[from] io::Error),

    /// Cache file content is not a valid series
    #[error("cache format: {0}")]
    CacheFormat(#[from] serde_json::Error),

    /// Year not cached and remote access disabled
    #[error("offline and not cached")]
    Offline,
}

/// Group of variables fetched together.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VariableSet {
    /// `ssrd`
    SolarRadiation,
    /// `u100`, `v100`
    Wind100m,
}

impl VariableSet {
    /// File name prefix of the per-year cache.
    pub fn cache_prefix(self) -> &'static str {
        match self {
            VariableSet::SolarRadiation => "ssrd",
            VariableSet::Wind100m => "wind100m",
        }
    }

    /// Field names present in a series of this set.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            VariableSet::SolarRadiation => &["ssrd"],
            VariableSet::Wind100m => &["u100", "v100"],
        }
    }

    fn archive_params(self) -> &'static str {
        match self {
            VariableSet::SolarRadiation => "shortwave_radiation",
            VariableSet::Wind100m => "wind_speed_100m,wind_direction_100m",
        }
    }
}

/// Hourly values keyed by field name, aligned with `time` (UTC). Gaps are `None`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlySeries {
    pub time: Vec<NaiveDateTime>,
    pub fields: BTreeMap<String, Vec<Option<f64>>>,
}

impl HourlySeries {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&[Option<f64>]> {
        self.fields.get(name).map(Vec::as_slice)
    }

    /// Append another series. Fields missing on one side are padded with `None`.
    pub fn extend(&mut self, other: HourlySeries) {
        let before = self.len();
        let added = other.len();
        for (name, values) in other.fields {
            self.fields
                .entry(name)
                .or_insert_with(|| vec![None; before])
                .extend(values);
        }
        self.time.extend(other.time);
        let total = self.len();
        for values in self.fields.values_mut() {
            values.resize(total, None);
        }
        debug!(added, total, "series extended");
    }
}

/// One year of one variable set at one point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct YearRequest {
    pub variables: VariableSet,
    pub year: i32,
    pub site: Site,
}

/// Remote provider of hourly reanalysis data.
#[allow(async_fn_in_trait)]
pub trait ReanalysisSource {
    async fn fetch_year(&self, request: &YearRequest) -> Result<HourlySeries, FetchError>;
}

/// Open-Meteo archive response
#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    hourly: ArchiveHourly,
}

#[derive(Debug, Deserialize)]
struct ArchiveHourly {
    time: Vec<String>,
    #[serde(default)]
    shortwave_radiation: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_100m: Vec<Option<f64>>,
    #[serde(default)]
    wind_direction_100m: Vec<Option<f64>>,
}

/// Client for the Open-Meteo historical weather archive.
pub struct OpenMeteoArchive {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OpenMeteoArchive {
    pub fn new(config: &ReanalysisConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
        })
    }

    fn url(&self, request: &YearRequest) -> String {
        format!(
            "{}?latitude={:.6}&longitude={:.6}&start_date={y}-01-01&end_date={y}-12-31&\
             hourly={}&models={}&wind_speed_unit=ms&timezone=GMT",
            self.base_url,
            request.site.latitude,
            request.site.longitude,
            request.variables.archive_params(),
            self.model,
            y = request.year,
        )
    }
}

impl ReanalysisSource for OpenMeteoArchive {
    async fn fetch_year(&self, request: &YearRequest) -> Result<HourlySeries, FetchError> {
        let url = self.url(request);
        debug!(%url, "requesting archive");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }
        let body: ArchiveResponse = response.json().await?;
        archive_to_series(body.hourly, request.variables)
    }
}

/// Convert archive arrays to an ERA5-style series.
fn archive_to_series(
    hourly: ArchiveHourly,
    variables: VariableSet,
) -> Result<HourlySeries, FetchError> {
    let time = hourly
        .time
        .iter()
        .map(|t| {
            NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M")
                .map_err(|e| FetchError::Parse(format!("time {t:?}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let n = time.len();

    let check = |name: &str, len: usize| {
        if len == n {
            Ok(())
        } else {
            Err(FetchError::Parse(format!("{name} has {len} values for {n} times")))
        }
    };

    let mut fields = BTreeMap::new();
    match variables {
        VariableSet::SolarRadiation => {
            check("shortwave_radiation", hourly.shortwave_radiation.len())?;
            let ssrd = hourly
                .shortwave_radiation
                .iter()
                .map(|w| w.map(|w| w * 3600.0))
                .collect();
            fields.insert("ssrd".to_string(), ssrd);
        }
        VariableSet::Wind100m => {
            check("wind_speed_100m", hourly.wind_speed_100m.len())?;
            check("wind_direction_100m", hourly.wind_direction_100m.len())?;
            let (u, v): (Vec<_>, Vec<_>) = hourly
                .wind_speed_100m
                .iter()
                .zip(hourly.wind_direction_100m.iter())
                .map(|(speed, dir)| match (speed, dir) {
                    (Some(s), Some(d)) => {
                        let (sin, cos) = d.to_radians().sin_cos();
                        (Some(-s * sin), Some(-s * cos))
                    }
                    _ => (None, None),
                })
                .unzip();
            fields.insert("u100".to_string(), u);
            fields.insert("v100".to_string(), v);
        }
    }

    Ok(HourlySeries { time, fields })
}

/// Outcome of a multi-year fetch.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub series: HourlySeries,
    pub downloaded: Vec<i32>,
    pub cached: Vec<i32>,
    pub failed: Vec<(i32, String)>,
}

impl FetchReport {
    pub fn years_available(&self) -> usize {
        self.downloaded.len() + self.cached.len()
    }
}

/// Cache-first, year-by-year reanalysis retrieval.
pub struct ReanalysisDownloader<S> {
    source: S,
    cache_dir: PathBuf,
    offline: bool,
}

impl<S: ReanalysisSource> ReanalysisDownloader<S> {
    pub fn new(source: S, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            cache_dir: cache_dir.into(),
            offline: false,
        }
    }

    /// Never call the remote source; use cached years only.
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cache_path(&self, variables: VariableSet, year: i32) -> PathBuf {
        self.cache_dir
            .join(format!("{}_{}.json", variables.cache_prefix(), year))
    }

    /// Fetch every year in `years`, reusing cached years and skipping failed ones.
    pub async fn fetch(
        &self,
        variables: VariableSet,
        years: RangeInclusive<i32>,
        site: &Site,
    ) -> FetchReport {
        let mut report = FetchReport::default();

        for year in years {
            let path = self.cache_path(variables, year);

            if path.exists() {
                match load_cache(&path, variables) {
                    Ok(series) => {
                        info!("   → {year}: already exists");
                        report.series.extend(series);
                        report.cached.push(year);
                        continue;
                    }
                    Err(e) => warn!("   → {year}: discarding unreadable cache ({e})"),
                }
            }

            if self.offline {
                report.failed.push((year, FetchError::Offline.to_string()));
                continue;
            }

            info!("   → downloading {year}...");
            let request = YearRequest {
                variables,
                year,
                site: *site,
            };
            match self.source.fetch_year(&request).await {
                Ok(series) => {
                    // Cache write failures are not fatal
                    if let Err(e) = save_cache(&path, &series) {
                        warn!("   → {year}: could not write cache ({e})");
                    }
                    report.series.extend(series);
                    report.downloaded.push(year);
                }
                Err(e) => {
                    warn!("there's an error in {year}: {e}");
                    report.failed.push((year, e.to_string()));
                }
            }
        }

        report
    }
}

fn load_cache(path: &Path, variables: VariableSet) -> Result<HourlySeries, FetchError> {
    let data = fs::read(path)?;
    let series: HourlySeries = serde_json::from_slice(&data)?;
    for name in variables.fields() {
        match series.field(name) {
            Some(values) if values.len() == series.len() => {}
            _ => return Err(FetchError::Parse(format!("cache lacks {name}"))),
        }
    }
    Ok(series)
}

fn save_cache(path: &Path, series: &HourlySeries) -> Result<(), FetchError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_vec(series)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn series(year: i32, hours: u32) -> HourlySeries {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let time = (0..hours)
            .map(|h| start + chrono::Duration::hours(h as i64))
            .collect();
        let mut fields = BTreeMap::new();
        fields.insert("u100".to_string(), vec![Some(3.0); hours as usize]);
        fields.insert("v100".to_string(), vec![Some(4.0); hours as usize]);
        HourlySeries { time, fields }
    }

    #[test]
    fn test_archive_wind_to_components() {
        let hourly = ArchiveHourly {
            time: vec!["2001-01-01T00:00".into(), "2001-01-01T01:00".into()],
            shortwave_radiation: vec![],
            wind_speed_100m: vec![Some(10.0), None],
            wind_direction_100m: vec![Some(90.0), Some(0.0)],
        };
        let series = archive_to_series(hourly, VariableSet::Wind100m).unwrap();
        let u = series.field("u100").unwrap();
        let v = series.field("v100").unwrap();
        // Wind from the east blows towards the west
        assert!((u[0].unwrap() + 10.0).abs() < 1e-9);
        assert!(v[0].unwrap().abs() < 1e-9);
        assert_eq!(u[1], None);
    }

    #[test]
    fn test_archive_solar_to_joules() {
        let hourly = ArchiveHourly {
            time: vec!["2001-06-01T12:00".into()],
            shortwave_radiation: vec![Some(800.0)],
            wind_speed_100m: vec![],
            wind_direction_100m: vec![],
        };
        let series = archive_to_series(hourly, VariableSet::SolarRadiation).unwrap();
        assert_eq!(series.field("ssrd").unwrap()[0], Some(2_880_000.0));
    }

    #[test]
    fn test_archive_length_mismatch_rejected() {
        let hourly = ArchiveHourly {
            time: vec!["2001-06-01T12:00".into(), "2001-06-01T13:00".into()],
            shortwave_radiation: vec![Some(800.0)],
            wind_speed_100m: vec![],
            wind_direction_100m: vec![],
        };
        assert!(matches!(
            archive_to_series(hourly, VariableSet::SolarRadiation),
            Err(FetchError::Parse(_))
        ));
    }

    #[test]
    fn test_extend_pads_missing_fields() {
        let mut a = series(2000, 2);
        let mut b = series(2001, 3);
        b.fields.remove("v100");
        a.extend(b);
        assert_eq!(a.len(), 5);
        assert_eq!(a.field("u100").unwrap().len(), 5);
        assert_eq!(a.field("v100").unwrap()[4], None);
    }

    #[test]
    fn test_cache_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("wind100m_2000.json");
        let original = series(2000, 4);
        save_cache(&path, &original).unwrap();
        assert_eq!(load_cache(&path, VariableSet::Wind100m).unwrap(), original);
        assert!(matches!(
            load_cache(&path, VariableSet::SolarRadiation),
            Err(FetchError::Parse(_))
        ));
    }

    #[test]
    fn test_url_contains_request() {
        let archive = OpenMeteoArchive::new(&ReanalysisConfig::default()).unwrap();
        let url = archive.url(&YearRequest {
            variables: VariableSet::Wind100m,
            year: 2005,
            site: Site::new(-3.73, -38.52),
        });
        assert!(url.starts_with("https://archive-api.open-meteo.com/v1/archive?"));
        assert!(url.contains("start_date=2005-01-01&end_date=2005-12-31"));
        assert!(url.contains("hourly=wind_speed_100m,wind_direction_100m"));
        assert!(url.contains("latitude=-3.730000"));
        assert!(url.contains("models=era5"));
    }
}
