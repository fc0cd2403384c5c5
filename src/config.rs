//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the energy-config.toml file.
//! It centralizes the site defaults, clear-sky constants, input raster naming, the
//! reanalysis source and the wind scaling constants.
//!
//! Every section is optional in the file; missing sections and fields take their defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::harmonic::MonthAnchor;
use crate::profile::{ClearSkyModel, SynthesizerConfig};
use crate::Site;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "energy-config.toml";

/// Application configuration loaded from energy-config.toml
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Default point of interest and its civil timezone
    pub site: SiteConfig,
    /// Profile synthesis parameters
    pub solar: SolarConfig,
    /// Input and output locations
    pub paths: PathsConfig,
    /// Historical reanalysis source
    pub reanalysis: ReanalysisConfig,
    /// Wind energy scaling
    pub wind: WindConfig,
}

/// Point of interest used when no coordinates are given on the command line
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteConfig {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Fixed offset of local standard time from UTC in hours (no daylight saving)
    pub timezone_offset_hours: f64,
}

/// Solar profile synthesis and monthly raster settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SolarConfig {
    /// Harmonics kept in the annual Fourier fit (1..=6)
    pub harmonics: usize,
    /// Placement of each monthly sample on the day-of-year axis
    pub month_anchor: MonthAnchor,
    /// Monthly rasters are `<raster_prefix><MM>.tif` inside `paths.input_dir`
    pub raster_prefix: String,
    /// Farthest a raster cell centre may be from the site, in degrees
    pub max_distance_deg: f64,
    pub clear_sky: ClearSkyModel,
}

/// File system locations
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
}

/// Reanalysis archive settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReanalysisConfig {
    pub base_url: String,
    /// Reanalysis model requested from the archive
    pub model: String,
    pub first_year: i32,
    pub last_year: i32,
    pub timeout_secs: u64,
    /// Also download the surface solar radiation series in the solar branch
    pub fetch_solar: bool,
}

/// Wind energy scaling
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WindConfig {
    /// Capacity-factor raster inside `paths.input_dir`
    pub capacity_factor_raster: String,
    /// Used when the raster is missing or has no valid cell at the site
    pub default_capacity_factor: f64,
    /// Power density of the reference turbine, kW/m²
    pub power_density_kw_m2: f64,
}

impl Default for SiteConfig {
    fn default() -> Self {
        SiteConfig {
            name: "Fortaleza, CE".to_string(),
            latitude: -3.73,
            longitude: -38.52,
            timezone_offset_hours: -3.0,
        }
    }
}

impl Default for SolarConfig {
    fn default() -> Self {
        SolarConfig {
            harmonics: 6,
            month_anchor: MonthAnchor::CalendarMidpoint,
            raster_prefix: "ceara_densiPV_".to_string(),
            max_distance_deg: 0.02,
            clear_sky: ClearSkyModel::default(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig {
            input_dir: PathBuf::from("./input"),
            output_dir: PathBuf::from("./output"),
        }
    }
}

impl Default for ReanalysisConfig {
    fn default() -> Self {
        ReanalysisConfig {
            base_url: "https://archive-api.open-meteo.com/v1/archive".to_string(),
            model: "era5".to_string(),
            first_year: 1999,
            last_year: 2018,
            timeout_secs: 120,
            fetch_solar: true,
        }
    }
}

impl Default for WindConfig {
    fn default() -> Self {
        WindConfig {
            capacity_factor_raster: "ceara_cf_onshore_offshore_iec_ii.tif".to_string(),
            default_capacity_factor: 0.45,
            power_density_kw_m2: 0.004,
        }
    }
}

impl Config {
    /// Load configuration from energy-config.toml
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_FILE)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!(site = %config.site.name, "loaded configuration");
                    config
                }
                Err(e) => {
                    warn!("invalid config file format: {e}");
                    warn!("using default configuration (Fortaleza, CE)");
                    Self::default()
                }
            },
            Err(_) => {
                info!(
                    path = %path.as_ref().display(),
                    "no config file found, using default configuration (Fortaleza, CE)"
                );
                Self::default()
            }
        }
    }

    /// Save current configuration to the given path
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(&path, contents)?;
        info!(path = %path.as_ref().display(), "configuration saved");
        Ok(())
    }

    /// Site used when no coordinates are given on the command line
    pub fn default_site(&self) -> Site {
        Site::new(self.site.latitude, self.site.longitude)
    }

    /// Immutable synthesizer parameters derived from this configuration.
    pub fn synthesizer(&self) -> SynthesizerConfig {
        SynthesizerConfig {
            clear_sky: self.solar.clear_sky,
            harmonics: self.solar.harmonics,
            timezone_offset_hours: self.site.timezone_offset_hours,
            month_anchor: self.solar.month_anchor,
        }
    }

    /// Output directory for one site.
    pub fn site_output_dir(&self, site: &Site) -> PathBuf {
        self.paths.output_dir.join(site.coord_folder())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.site.latitude, -3.73);
        assert_eq!(config.site.longitude, -38.52);
        assert_eq!(config.site.timezone_offset_hours, -3.0);
        assert_eq!(config.solar.harmonics, 6);
        assert_eq!(config.solar.clear_sky.solar_constant, 1367.0);
        assert_eq!(config.wind.power_density_kw_m2, 0.004);
        assert_eq!(config.reanalysis.first_year, 1999);
        assert_eq!(config.reanalysis.last_year, 2018);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let parsed: Config = toml::from_str(
            r#"
[site]
latitude = -5.0
longitude = -40.0

[solar]
harmonics = 4
month_anchor = "uniform"
"#,
        )
        .unwrap();
        assert_eq!(parsed.site.latitude, -5.0);
        assert_eq!(parsed.site.timezone_offset_hours, -3.0);
        assert_eq!(parsed.solar.harmonics, 4);
        assert_eq!(parsed.solar.month_anchor, MonthAnchor::Uniform);
        assert_eq!(parsed.solar.clear_sky.beam_transmissivity, 0.98);
        assert_eq!(parsed.wind.default_capacity_factor, 0.45);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let config = Config::load_from_path("/nonexistent/path");
        // Should fallback to default
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_invalid_file_falls_back() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), "[solar]\nharmonics = \"six\"\n").unwrap();
        assert_eq!(Config::load_from_path(file.path()), Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let file = NamedTempFile::new().unwrap();
        let mut config = Config::default();
        config.site.name = "Quixadá, CE".to_string();
        config.save_to_path(file.path()).unwrap();
        assert_eq!(Config::load_from_path(file.path()).site.name, "Quixadá, CE");
    }

    #[test]
    fn test_default_site_follows_file() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), "[site]\nlatitude = -7.2\nlongitude = -39.3\n").unwrap();
        let site = Config::load_from_path(file.path()).default_site();
        assert_eq!(site.latitude, -7.2);
        assert_eq!(site.longitude, -39.3);
    }

    #[test]
    fn test_synthesizer_parameters() {
        let mut config = Config::default();
        config.site.timezone_offset_hours = -5.0;
        let synth = config.synthesizer();
        assert_eq!(synth.timezone_offset_hours, -5.0);
        assert_eq!(synth.harmonics, 6);
    }
}
