//! Solar and wind analysis branches.
//!
//! Each branch gathers its inputs, computes its month × hour grids and hands them to a
//! [`FigureSink`]. Branch failures are returned as [`AnalysisError`]; the binary reports
//! them and carries on with the other branch.

use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::profile::{AnnualProfileSynthesizer, AnnualSynthesis, ProfileError};
use crate::raster::{sample_months, RasterError, RasterSampler};
use crate::reanalysis::{
    FetchError, FetchReport, ReanalysisDownloader, ReanalysisSource, VariableSet,
};
use crate::render::{
    draw_ascii_heatmap, write_grid_json, write_surface_html, PlotLabels, RenderError, Renderer,
};
use crate::wind::{capacity_factor, WindEnergy, WindError, WindStatistics};
use crate::{MonthHourGrid, Site};

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Wind(#[from] WindError),

    #[error("missing input: {0}")]
    MissingInput(String),
}

/// Where figures go.
pub enum FigureSink<'a> {
    /// Image files, JSON grids and HTML surfaces under `dir`
    Files {
        renderer: &'a dyn Renderer,
        dir: PathBuf,
    },
    /// Shaded tables on stdout, nothing written
    Console,
}

impl FigureSink<'_> {
    /// Emit a heatmap named `<base>_<site tag>`. Returns the image path when one was written.
    pub fn heatmap(
        &self,
        grid: &MonthHourGrid,
        labels: &PlotLabels,
        base: &str,
        site: &Site,
    ) -> Result<Option<PathBuf>, RenderError> {
        match self {
            FigureSink::Files { renderer, dir } => {
                fs::create_dir_all(dir)?;
                let stem = format!("{base}_{}", site.file_tag());
                let path = dir.join(format!("{stem}.{}", renderer.extension()));
                renderer.heatmap(grid, labels, &path)?;
                write_grid_json(grid, labels, &dir.join(format!("{stem}.json")))?;
                Ok(Some(path))
            }
            FigureSink::Console => {
                draw_ascii_heatmap(grid, labels);
                Ok(None)
            }
        }
    }

    /// Emit a 3D surface named `<base>_<site tag>`, as an image plus an interactive
    /// `.html` page. The console has no surface view.
    pub fn surface(
        &self,
        grid: &MonthHourGrid,
        labels: &PlotLabels,
        base: &str,
        site: &Site,
    ) -> Result<Option<PathBuf>, RenderError> {
        match self {
            FigureSink::Files { renderer, dir } => {
                fs::create_dir_all(dir)?;
                let stem = format!("{base}_{}", site.file_tag());
                let path = dir.join(format!("{stem}.{}", renderer.extension()));
                renderer.surface3d(grid, labels, &path)?;
                write_surface_html(grid, labels, &dir.join(format!("{stem}.html")))?;
                Ok(Some(path))
            }
            FigureSink::Console => Ok(None),
        }
    }
}

/// Result of the solar branch.
#[derive(Debug)]
pub struct SolarReport {
    /// Raster samples in calendar order (kWh/m²/day, NaN where missing)
    pub monthly_input: [f64; 12],
    pub synthesis: AnnualSynthesis,
    /// Surface radiation download, when enabled
    pub radiation: Option<FetchReport>,
    pub figures: Vec<PathBuf>,
}

/// Result of the wind branch.
#[derive(Debug)]
pub struct WindReport {
    pub statistics: WindStatistics,
    pub energy: WindEnergy,
    pub years_downloaded: Vec<i32>,
    pub years_cached: Vec<i32>,
    pub years_failed: Vec<(i32, String)>,
    pub figures: Vec<PathBuf>,
}

/// Monthly rasters → hourly PV table → figures, plus the optional radiation download.
pub async fn run_solar<R, S>(
    config: &Config,
    site: &Site,
    sampler: &R,
    sink: &FigureSink<'_>,
    downloader: Option<&ReanalysisDownloader<S>>,
) -> Result<SolarReport, AnalysisError>
where
    R: RasterSampler + ?Sized,
    S: ReanalysisSource,
{
    let synthesizer = AnnualProfileSynthesizer::new(config.synthesizer())?;

    let monthly_input = sample_months(sampler, site);
    if monthly_input.iter().all(|v| v.is_nan()) {
        return Err(AnalysisError::MissingInput(
            "no monthly PV density raster could be sampled".to_string(),
        ));
    }

    let synthesis = synthesizer.synthesize_annual(&monthly_input, site)?;

    let radiation = match downloader {
        Some(downloader) => {
            println!(
                "Downloading surface solar radiation ({}–{})...",
                config.reanalysis.first_year, config.reanalysis.last_year
            );
            let report = downloader
                .fetch(
                    VariableSet::SolarRadiation,
                    config.reanalysis.first_year..=config.reanalysis.last_year,
                    site,
                )
                .await;
            info!(
                downloaded = report.downloaded.len(),
                cached = report.cached.len(),
                failed = report.failed.len(),
                "radiation series ready"
            );
            Some(report)
        }
        None => None,
    };

    let mut figures = Vec::new();
    let labels = PlotLabels::new(
        "Solar Monthly Average PV Density",
        "PV Production Density (kWh/m²)",
        4,
    );
    figures.extend(sink.heatmap(
        &synthesis.monthly_means,
        &labels,
        "Solar_Monthly_Average_PV_Density",
        site,
    )?);
    let labels = PlotLabels::new("Solar PV Production 3D", "PV Production (kWh/m²)", 4);
    figures.extend(sink.surface(
        &synthesis.monthly_means,
        &labels,
        "Solar_PV_Production_3D",
        site,
    )?);

    Ok(SolarReport {
        monthly_input,
        synthesis,
        radiation,
        figures,
    })
}

/// 100 m wind series → statistics and energy grids → figures.
pub async fn run_wind<S: ReanalysisSource>(
    config: &Config,
    site: &Site,
    downloader: &ReanalysisDownloader<S>,
    sink: &FigureSink<'_>,
) -> Result<WindReport, AnalysisError> {
    println!(
        "Downloading 100m wind data ({}–{})...",
        config.reanalysis.first_year, config.reanalysis.last_year
    );
    let report = downloader
        .fetch(
            VariableSet::Wind100m,
            config.reanalysis.first_year..=config.reanalysis.last_year,
            site,
        )
        .await;

    if report.years_available() == 0 {
        return Err(AnalysisError::MissingInput(
            "no wind years available".to_string(),
        ));
    }
    if !report.failed.is_empty() {
        warn!(
            "{} of {} years unavailable",
            report.failed.len(),
            report.failed.len() + report.years_available()
        );
    }

    let statistics = match WindStatistics::from_series(&report.series) {
        Ok(statistics) => statistics,
        Err(WindError::NoData) => {
            return Err(AnalysisError::MissingInput(
                "wind series has no usable records".to_string(),
            ))
        }
        Err(e) => return Err(e.into()),
    };

    let raster = config.paths.input_dir.join(&config.wind.capacity_factor_raster);
    let cf = capacity_factor(&raster, site, config.wind.default_capacity_factor);
    let energy = statistics.energy(cf, config.wind.power_density_kw_m2);

    let mut figures = Vec::new();
    figures.extend(sink.heatmap(
        &energy.energy_density,
        &PlotLabels::new(
            "Wind Monthly Average Energy Density",
            "Average Energy Density (kWh/m²)",
            5,
        ),
        "Wind_Monthly_Average_Energy_Density",
        site,
    )?);
    let std_labels = PlotLabels::new(
        "Wind Monthly Standard Deviation",
        "Standard Deviation (kWh/m²)",
        5,
    );
    figures.extend(sink.heatmap(
        &energy.std_energy,
        &std_labels,
        "Wind_Monthly_Standard_Deviation",
        site,
    )?);
    figures.extend(sink.heatmap(
        &statistics.cv,
        &PlotLabels::new(
            "Wind Coefficient of Variation",
            "Coefficient of Variation (%)",
            1,
        ),
        "Wind_Coefficient_of_Variation",
        site,
    )?);
    figures.extend(sink.surface(
        &energy.std_energy,
        &std_labels,
        "Wind_Standard_Deviation_3D",
        site,
    )?);

    Ok(WindReport {
        statistics,
        energy,
        years_downloaded: report.downloaded,
        years_cached: report.cached,
        years_failed: report.failed,
        figures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reanalysis::{HourlySeries, YearRequest};
    use std::cell::RefCell;
    use std::path::Path;
    use tempfile::TempDir;

    /// Records every figure request instead of drawing.
    #[derive(Default)]
    struct RecordingRenderer {
        calls: RefCell<Vec<(String, String)>>,
    }

    impl Renderer for RecordingRenderer {
        fn extension(&self) -> &'static str {
            "rec"
        }

        fn heatmap(
            &self,
            _: &MonthHourGrid,
            labels: &PlotLabels,
            path: &Path,
        ) -> Result<(), RenderError> {
            self.calls
                .borrow_mut()
                .push(("heatmap".into(), labels.title.clone()));
            fs::write(path, b"")?;
            Ok(())
        }

        fn surface3d(
            &self,
            _: &MonthHourGrid,
            labels: &PlotLabels,
            path: &Path,
        ) -> Result<(), RenderError> {
            self.calls
                .borrow_mut()
                .push(("surface".into(), labels.title.clone()));
            fs::write(path, b"")?;
            Ok(())
        }
    }

    struct Constant(f64);

    impl RasterSampler for Constant {
        fn sample(&self, _month: u32, _site: &Site) -> f64 {
            self.0
        }
    }

    /// Returns a constant wind of 5 m/s for the first day of each requested year.
    struct SteadyWind;

    impl ReanalysisSource for SteadyWind {
        async fn fetch_year(&self, request: &YearRequest) -> Result<HourlySeries, FetchError> {
            let start = chrono::NaiveDate::from_ymd_opt(request.year, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap();
            let time: Vec<_> = (0..24).map(|h| start + chrono::Duration::hours(h)).collect();
            let mut series = HourlySeries {
                time,
                ..Default::default()
            };
            series.fields.insert("u100".into(), vec![Some(3.0); 24]);
            series.fields.insert("v100".into(), vec![Some(4.0); 24]);
            Ok(series)
        }
    }

    struct Unreachable;

    impl ReanalysisSource for Unreachable {
        async fn fetch_year(&self, _: &YearRequest) -> Result<HourlySeries, FetchError> {
            Err(FetchError::Status(503))
        }
    }

    fn test_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.paths.input_dir = dir.join("input");
        config.paths.output_dir = dir.join("output");
        config.reanalysis.first_year = 2001;
        config.reanalysis.last_year = 2002;
        config
    }

    #[tokio::test]
    async fn test_solar_branch_renders_both_figures() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let site = Site::new(-3.73, -38.52);
        let renderer = RecordingRenderer::default();
        let sink = FigureSink::Files {
            renderer: &renderer,
            dir: dir.path().join("figures"),
        };

        let no_download = None::<&ReanalysisDownloader<Unreachable>>;
        let report = run_solar(&config, &site, &Constant(5.0), &sink, no_download)
            .await
            .unwrap();

        assert_eq!(report.monthly_input, [5.0; 12]);
        assert!(report.radiation.is_none());
        assert_eq!(report.figures.len(), 2);
        assert!(report.figures[0]
            .ends_with("Solar_Monthly_Average_PV_Density_Lat_m3p73_Lon_m38p52.rec"));
        assert!(dir
            .path()
            .join("figures/Solar_Monthly_Average_PV_Density_Lat_m3p73_Lon_m38p52.json")
            .exists());
        let page = fs::read_to_string(
            dir.path()
                .join("figures/Solar_PV_Production_3D_Lat_m3p73_Lon_m38p52.html"),
        )
        .unwrap();
        assert!(page.contains("Solar PV"));
        let calls = renderer.calls.borrow();
        assert_eq!(calls[0].0, "heatmap");
        assert_eq!(calls[1].0, "surface");
    }

    #[tokio::test]
    async fn test_solar_branch_all_missing_is_skipped() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let err = run_solar(
            &config,
            &Site::new(-3.73, -38.52),
            &Constant(f64::NAN),
            &FigureSink::Console,
            None::<&ReanalysisDownloader<Unreachable>>,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AnalysisError::MissingInput(_)));
    }

    #[tokio::test]
    async fn test_wind_branch_end_to_end() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let site = Site::new(-3.73, -38.52);
        let downloader = ReanalysisDownloader::new(SteadyWind, dir.path().join("cache"));
        let renderer = RecordingRenderer::default();
        let sink = FigureSink::Files {
            renderer: &renderer,
            dir: dir.path().join("figures"),
        };

        let report = run_wind(&config, &site, &downloader, &sink).await.unwrap();

        assert_eq!(report.years_downloaded, vec![2001, 2002]);
        assert_eq!(report.statistics.samples, 48);
        // Constant speed: mean equals the global mean, so density is cf × power density
        let expected = 0.45 * 0.004;
        assert!((report.energy.energy_density.values[0][0] - expected).abs() < 1e-12);
        assert_eq!(report.energy.std_energy.values[0][0], 0.0);
        assert_eq!(report.statistics.cv.values[0][0], 0.0);
        assert_eq!(report.figures.len(), 4);
        assert_eq!(renderer.calls.borrow().len(), 4);
        assert!(dir
            .path()
            .join("figures/Wind_Standard_Deviation_3D_Lat_m3p73_Lon_m38p52.html")
            .exists());
    }

    #[tokio::test]
    async fn test_wind_branch_without_years_is_skipped() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let downloader = ReanalysisDownloader::new(Unreachable, dir.path().join("cache"));
        let err = run_wind(&config, &Site::new(-3.73, -38.52), &downloader, &FigureSink::Console)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::MissingInput(_)));
    }
}
