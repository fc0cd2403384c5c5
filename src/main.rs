//! # Energy Potential Application Entry Point
//!
//! This binary runs the solar and wind analyses for one coordinate.
//! It supports file output (PNG figures, JSON grids and HTML surfaces under
//! `output/<site>/figures`)
//! and a development mode (`--stdout`) that prints shaded ASCII tables instead.

// Test modules
#[cfg(test)]
mod tests;

use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::error;
use tracing_subscriber::EnvFilter;

use energy_potential::analysis::{run_solar, run_wind, FigureSink};
use energy_potential::config::{Config, CONFIG_FILE};
use energy_potential::raster::MonthlyRasterSet;
use energy_potential::reanalysis::{OpenMeteoArchive, ReanalysisDownloader};
use energy_potential::render::ImageRenderer;
use energy_potential::Site;

/// Hourly solar PV and wind energy potential at a coordinate.
#[derive(Parser, Debug)]
#[command(name = "energy-potential", version, about)]
struct Cli {
    /// Latitude in degrees [default: site.latitude from the config, -3.73]
    #[arg(long, allow_negative_numbers = true)]
    lat: Option<f64>,

    /// Longitude in degrees [default: site.longitude from the config, -38.52]
    #[arg(long, allow_negative_numbers = true)]
    lon: Option<f64>,

    /// Run only the solar analysis
    #[arg(long)]
    solar_only: bool,

    /// Run only the wind analysis
    #[arg(long)]
    wind_only: bool,

    /// Configuration file
    #[arg(long, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Print ASCII heatmaps instead of writing figures
    #[arg(long)]
    stdout: bool,

    /// Use cached reanalysis years only
    #[arg(long)]
    offline: bool,

    /// Write the effective configuration to the --config path and exit
    #[arg(long)]
    init_config: bool,
}

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

impl Cli {
    fn site(&self, config: &Config) -> Site {
        let default = config.default_site();
        Site::new(
            round6(self.lat.unwrap_or(default.latitude)),
            round6(self.lon.unwrap_or(default.longitude)),
        )
    }

    fn load_config(&self) -> Config {
        if self.config.as_path() == Path::new(CONFIG_FILE) {
            Config::load()
        } else {
            Config::load_from_path(&self.config)
        }
    }
}

fn banner(title: &str) {
    println!("{}", "=".repeat(70));
    println!("{title}");
    println!("{}", "=".repeat(70));
}

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.load_config();
    if cli.init_config {
        config.save_to_path(&cli.config)?;
        println!("Configuration written to {}", cli.config.display());
        return Ok(());
    }

    let site = cli.site(&config);
    if !site.is_valid() {
        anyhow::bail!(
            "coordinates out of range: lat {}, lon {}",
            site.latitude,
            site.longitude
        );
    }

    banner(&format!(
        "SOLAR + WIND ENERGY ANALYSIS\nPoint of interest: Latitude {}°, Longitude {}°",
        site.latitude, site.longitude
    ));

    let output_dir = config.site_output_dir(&site);
    let figures_dir = output_dir.join("figures");
    let renderer = ImageRenderer::default();
    let sink = if cli.stdout {
        FigureSink::Console
    } else {
        FigureSink::Files {
            renderer: &renderer,
            dir: figures_dir.clone(),
        }
    };

    let archive = OpenMeteoArchive::new(&config.reanalysis)?;
    let downloader = ReanalysisDownloader::new(archive, output_dir).offline(cli.offline);

    // Create Tokio runtime for the downloads
    let rt = tokio::runtime::Runtime::new()?;

    if !cli.wind_only {
        banner(&format!(
            "SOLAR ANALYSIS → Lat: {:.2}° | Lon: {:.2}°",
            site.latitude, site.longitude
        ));
        let rasters = MonthlyRasterSet::new(
            config.paths.input_dir.clone(),
            config.solar.raster_prefix.clone(),
            config.solar.max_distance_deg,
        );
        let radiation = config.reanalysis.fetch_solar.then_some(&downloader);
        match rt.block_on(run_solar(&config, &site, &rasters, &sink, radiation)) {
            Ok(report) => {
                let daily: Vec<String> = (0..12)
                    .map(|m| format!("{:.3}", report.synthesis.monthly_means.row_total(m)))
                    .collect();
                println!("Daily totals by month (kWh/m²): {}", daily.join(" "));
                println!("\nSOLAR ANALYSIS COMPLETED!");
                if !cli.stdout {
                    println!("All files in: {}", figures_dir.display());
                }
            }
            Err(e) => error!("solar analysis skipped: {e}"),
        }
    }

    if !cli.solar_only {
        banner(&format!(
            "WIND ANALYSIS → Lat: {:.2}° | Lon: {:.2}°",
            site.latitude, site.longitude
        ));
        match rt.block_on(run_wind(&config, &site, &downloader, &sink)) {
            Ok(report) => {
                println!(
                    "Capacity factor {:.4}, {} years used",
                    report.energy.capacity_factor,
                    report.years_downloaded.len() + report.years_cached.len()
                );
                println!("\nWIND ANALYSIS COMPLETED!");
                if !cli.stdout {
                    println!("All files saved in: {}", figures_dir.display());
                }
            }
            Err(e) => error!("wind analysis skipped: {e}"),
        }
    }

    banner("ALL ANALYSES FINISHED");
    Ok(())
}
