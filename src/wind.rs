//! Wind speed statistics by month and hour, scaled into energy density.
//!
//! Speed is `hypot(u100, v100)`. Each (month, hour) cell keeps the mean, the sample
//! standard deviation (n − 1) and the coefficient of variation `std / mean · 100`,
//! with undefined CVs reported as 0. Energy density normalises the mean by the overall
//! mean speed and scales it by the site capacity factor and the turbine power density.

use chrono::{Datelike, Timelike};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::raster::RasterGrid;
use crate::reanalysis::HourlySeries;
use crate::{MonthHourGrid, Site, HOURS_PER_DAY};

#[derive(Error, Debug, PartialEq)]
pub enum WindError {
    #[error("series has no {0} field")]
    MissingField(&'static str),

    #[error("no usable wind records")]
    NoData,
}

/// Welford running mean and variance.
#[derive(Clone, Copy, Debug, Default)]
struct RunningStats {
    n: usize,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    fn push(&mut self, x: f64) {
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (x - self.mean);
    }

    fn mean(&self) -> f64 {
        if self.n == 0 {
            f64::NAN
        } else {
            self.mean
        }
    }

    /// Sample standard deviation; NaN below two values.
    fn std(&self) -> f64 {
        if self.n < 2 {
            f64::NAN
        } else {
            (self.m2 / (self.n - 1) as f64).sqrt()
        }
    }
}

/// Month × hour wind speed statistics (m/s).
#[derive(Clone, Debug)]
pub struct WindStatistics {
    pub mean: MonthHourGrid,
    pub std: MonthHourGrid,
    /// Coefficient of variation in percent
    pub cv: MonthHourGrid,
    pub counts: [[usize; HOURS_PER_DAY]; 12],
    pub global_mean: f64,
    pub samples: usize,
}

impl WindStatistics {
    /// Pivot a `u100`/`v100` series. Records with a missing component are dropped.
    pub fn from_series(series: &HourlySeries) -> Result<Self, WindError> {
        let u = series.field("u100").ok_or(WindError::MissingField("u100"))?;
        let v = series.field("v100").ok_or(WindError::MissingField("v100"))?;

        let mut cells = [[RunningStats::default(); HOURS_PER_DAY]; 12];
        let mut overall = RunningStats::default();

        for ((time, u), v) in series.time.iter().zip(u).zip(v) {
            let (Some(u), Some(v)) = (u, v) else { continue };
            if !(u.is_finite() && v.is_finite()) {
                continue;
            }
            let speed = u.hypot(*v);
            let month = time.month0() as usize;
            let hour = time.hour() as usize;
            cells[month][hour].push(speed);
            overall.push(speed);
        }

        if overall.n == 0 {
            return Err(WindError::NoData);
        }

        let mut mean = MonthHourGrid::zeros();
        let mut std = MonthHourGrid::zeros();
        let mut cv = MonthHourGrid::zeros();
        let mut counts = [[0; HOURS_PER_DAY]; 12];
        for month in 0..12 {
            for hour in 0..HOURS_PER_DAY {
                let cell = &cells[month][hour];
                mean.values[month][hour] = cell.mean();
                std.values[month][hour] = cell.std();
                let ratio = cell.std() / cell.mean() * 100.0;
                cv.values[month][hour] = if ratio.is_nan() { 0.0 } else { ratio };
                counts[month][hour] = cell.n;
            }
        }

        Ok(Self {
            mean,
            std,
            cv,
            counts,
            global_mean: overall.mean(),
            samples: overall.n,
        })
    }

    /// Energy grids for a capacity factor and turbine power density (kW/m²).
    pub fn energy(&self, capacity_factor: f64, power_density_kw_m2: f64) -> WindEnergy {
        let scale = capacity_factor * power_density_kw_m2;
        let global_mean = self.global_mean;
        WindEnergy {
            capacity_factor,
            energy_density: self.mean.map(|m| m / global_mean * scale),
            std_energy: self.std.map(|s| s * scale),
        }
    }
}

/// Scaled wind energy grids (kWh/m² per hour).
#[derive(Clone, Debug)]
pub struct WindEnergy {
    pub capacity_factor: f64,
    pub energy_density: MonthHourGrid,
    pub std_energy: MonthHourGrid,
}

/// Capacity factor at the site from a raster, or `default` when it cannot be read.
pub fn capacity_factor(raster_path: &Path, site: &Site, default: f64) -> f64 {
    if !raster_path.exists() {
        info!(path = %raster_path.display(), "no capacity factor raster, using {default}");
        return default;
    }
    match RasterGrid::read_geotiff(raster_path) {
        Ok(grid) => match grid.value_at(site) {
            Some(value) => {
                info!("GeoTIFF capacity factor: {value:.4}");
                value
            }
            None => default,
        },
        Err(e) => {
            warn!("error reading GeoTIFF: {e}");
            default
        }
    }
}
