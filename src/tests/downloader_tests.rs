//! Cache-first downloader behaviour against an in-memory source.

use chrono::NaiveDate;
use energy_potential::reanalysis::{
    FetchError, HourlySeries, ReanalysisDownloader, ReanalysisSource, VariableSet, YearRequest,
};
use energy_potential::Site;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Serves two hourly wind records per year and fails for the listed years.
struct FakeArchive {
    failing: Vec<i32>,
    calls: AtomicUsize,
}

impl FakeArchive {
    fn new(failing: &[i32]) -> Self {
        Self {
            failing: failing.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ReanalysisSource for FakeArchive {
    async fn fetch_year(&self, request: &YearRequest) -> Result<HourlySeries, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&request.year) {
            return Err(FetchError::Status(500));
        }
        let start = NaiveDate::from_ymd_opt(request.year, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let mut series = HourlySeries {
            time: vec![start, start + chrono::Duration::hours(1)],
            ..Default::default()
        };
        series
            .fields
            .insert("u100".into(), vec![Some(request.year as f64), Some(1.0)]);
        series.fields.insert("v100".into(), vec![Some(0.0), None]);
        Ok(series)
    }
}

fn site() -> Site {
    Site::new(-3.73, -38.52)
}

#[tokio::test]
async fn failed_years_are_skipped() {
    let dir = TempDir::new().unwrap();
    let downloader = ReanalysisDownloader::new(FakeArchive::new(&[2002]), dir.path());

    let report = downloader
        .fetch(VariableSet::Wind100m, 2001..=2003, &site())
        .await;

    assert_eq!(report.downloaded, vec![2001, 2003]);
    assert!(report.cached.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, 2002);
    assert_eq!(report.series.len(), 4);
    assert!(downloader.cache_path(VariableSet::Wind100m, 2001).exists());
    assert!(!downloader.cache_path(VariableSet::Wind100m, 2002).exists());
}

#[tokio::test]
async fn cached_years_are_not_downloaded_again() {
    let dir = TempDir::new().unwrap();
    let first = ReanalysisDownloader::new(FakeArchive::new(&[2002]), dir.path());
    first
        .fetch(VariableSet::Wind100m, 2001..=2003, &site())
        .await;

    let source = FakeArchive::new(&[]);
    let second = ReanalysisDownloader::new(source, dir.path());
    let report = second
        .fetch(VariableSet::Wind100m, 2001..=2003, &site())
        .await;

    assert_eq!(report.cached, vec![2001, 2003]);
    assert_eq!(report.downloaded, vec![2002]);
    assert_eq!(report.years_available(), 3);

    // Cached values survive the JSON round trip, gaps included
    let u = report.series.field("u100").unwrap();
    assert_eq!(u[0], Some(2001.0));
    assert_eq!(report.series.field("v100").unwrap()[1], None);
}

#[tokio::test]
async fn cache_file_names_follow_variable_and_year() {
    let dir = TempDir::new().unwrap();
    let downloader = ReanalysisDownloader::new(FakeArchive::new(&[]), dir.path());
    assert_eq!(
        downloader.cache_path(VariableSet::SolarRadiation, 1999),
        dir.path().join("ssrd_1999.json")
    );
    assert_eq!(
        downloader.cache_path(VariableSet::Wind100m, 2018),
        dir.path().join("wind100m_2018.json")
    );
}

#[tokio::test]
async fn corrupt_cache_is_refetched() {
    let dir = TempDir::new().unwrap();
    let source = FakeArchive::new(&[]);
    let downloader = ReanalysisDownloader::new(source, dir.path());
    let path = downloader.cache_path(VariableSet::Wind100m, 2005);
    fs::write(&path, b"{ not json").unwrap();

    let report = downloader
        .fetch(VariableSet::Wind100m, 2005..=2005, &site())
        .await;

    assert_eq!(report.downloaded, vec![2005]);
    let text = fs::read_to_string(&path).unwrap();
    assert!(serde_json::from_str::<HourlySeries>(&text).is_ok());
}

#[tokio::test]
async fn offline_mode_uses_cache_only() {
    let dir = TempDir::new().unwrap();
    ReanalysisDownloader::new(FakeArchive::new(&[]), dir.path())
        .fetch(VariableSet::Wind100m, 2010..=2010, &site())
        .await;

    let downloader =
        ReanalysisDownloader::new(FakeArchive::new(&[]), dir.path()).offline(true);
    let report = downloader
        .fetch(VariableSet::Wind100m, 2010..=2011, &site())
        .await;

    assert_eq!(report.cached, vec![2010]);
    assert!(report.downloaded.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, 2011);
}

#[tokio::test]
async fn source_called_once_per_missing_year() {
    let dir = TempDir::new().unwrap();
    let downloader = ReanalysisDownloader::new(FakeArchive::new(&[]), dir.path());
    downloader
        .fetch(VariableSet::SolarRadiation, 2000..=2002, &site())
        .await;
    downloader
        .fetch(VariableSet::SolarRadiation, 2000..=2003, &site())
        .await;
    assert_eq!(downloader.source().calls(), 4);
}
