//! # Energy Potential Core Library
//!
//! This library estimates hourly solar photovoltaic and wind energy potential at a single
//! geographic coordinate. It combines static monthly climatology rasters with historical
//! reanalysis time series and turns both into month × hour tables ready for plotting.
//!
//! ## Data Flow
//!
//! ### Solar
//! 1. **Sample**: one daily energy density per calendar month from the monthly rasters
//!    ([`raster`])
//! 2. **Fit**: a truncated Fourier series through the twelve values ([`harmonic`])
//! 3. **Synthesize**: a clear-sky diurnal curve per day, rescaled so its integral matches
//!    the fitted daily density ([`profile`], [`solar_geometry`])
//! 4. **Summarize**: 365 × 24 hourly energies averaged into a 12 × 24 [`MonthlyMeanTable`]
//!
//! ### Wind
//! 1. **Fetch**: hourly 100 m wind components per year, cached on disk ([`reanalysis`])
//! 2. **Pivot**: mean / standard deviation / coefficient of variation by month and hour
//!    ([`wind`])
//! 3. **Scale**: capacity factor × power density into an energy density grid
//!
//! Both branches hand their grids to a [`render::Renderer`].
//!
//! ## Core Types
//! - [`Site`]: the point of interest
//! - [`HourlyProfile`]: 24 hourly energies for one day
//! - [`AnnualHourlyMatrix`]: 365 hourly profiles
//! - [`MonthHourGrid`]: a labelled 12 × 24 table, aliased as [`MonthlyMeanTable`]

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

pub mod analysis;
pub mod config;
pub mod harmonic;
pub mod profile;
pub mod raster;
pub mod reanalysis;
pub mod render;
pub mod solar_geometry;
pub mod wind;

/// Non-leap day count per calendar month.
pub const DAYS_PER_MONTH: [usize; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Short month names used as row labels.
pub const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Length of the synthesized year. Leap days are not modelled.
pub const DAYS_PER_YEAR: usize = 365;

pub const HOURS_PER_DAY: usize = 24;

/// Point of interest in geographic coordinates (degrees, WGS84).
///
/// # Example
/// ```
/// use energy_potential::Site;
///
/// let fortaleza = Site::new(-3.73, -38.52);
/// assert_eq!(fortaleza.coord_folder(), "m3p73_m38p52");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub latitude: f64,
    pub longitude: f64,
}

impl Site {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// True when both coordinates are finite and inside their geographic ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Directory name for this site's outputs, e.g. `m3p73_m38p52`.
    pub fn coord_folder(&self) -> String {
        format!("{:.2}_{:.2}", self.latitude, self.longitude)
            .replace('-', "m")
            .replace('.', "p")
    }

    /// File name suffix for this site's figures, e.g. `Lat_m3p73_Lon_m38p52`.
    pub fn file_tag(&self) -> String {
        let encode = |v: f64| v.to_string().replace('-', "m").replace('.', "p");
        format!("Lat_{}_Lon_{}", encode(self.latitude), encode(self.longitude))
    }
}

/// Hourly energy (kWh/m²) for the 24 clock hours of one day.
///
/// Hour `h` covers the interval `[h, h+1)` in local standard time.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HourlyProfile {
    pub energy: [f64; HOURS_PER_DAY],
}

impl HourlyProfile {
    pub fn zeros() -> Self {
        Self {
            energy: [0.0; HOURS_PER_DAY],
        }
    }

    /// Daily total (kWh/m²).
    pub fn total(&self) -> f64 {
        self.energy.iter().sum()
    }

    /// Clock hour holding the largest value. Ties resolve to the earliest hour.
    pub fn peak_hour(&self) -> usize {
        self.energy
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |(best, max), (hour, &v)| {
                if v > max {
                    (hour, v)
                } else {
                    (best, max)
                }
            })
            .0
    }
}

/// One [`HourlyProfile`] per day of a 365-day year, day 1 first.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnualHourlyMatrix {
    days: Vec<HourlyProfile>,
}

impl AnnualHourlyMatrix {
    /// Wrap exactly [`DAYS_PER_YEAR`] profiles. Returns `None` for any other length.
    pub fn new(days: Vec<HourlyProfile>) -> Option<Self> {
        (days.len() == DAYS_PER_YEAR).then_some(Self { days })
    }

    /// Evaluate `profile_for(day)` for days `1..=365` in parallel.
    pub fn par_from_fn<F>(profile_for: F) -> Self
    where
        F: Fn(usize) -> HourlyProfile + Sync + Send,
    {
        Self {
            days: (1..=DAYS_PER_YEAR).into_par_iter().map(profile_for).collect(),
        }
    }

    /// Profile for a 1-based day of year.
    pub fn day(&self, day_of_year: usize) -> Option<&HourlyProfile> {
        day_of_year
            .checked_sub(1)
            .and_then(|index| self.days.get(index))
    }

    pub fn days(&self) -> &[HourlyProfile] {
        &self.days
    }

    /// Average the rows of each calendar month using [`DAYS_PER_MONTH`].
    pub fn monthly_means(&self) -> MonthHourGrid {
        let mut grid = MonthHourGrid::zeros();
        let mut start = 0;
        for (month, &count) in DAYS_PER_MONTH.iter().enumerate() {
            let rows = &self.days[start..start + count];
            for hour in 0..HOURS_PER_DAY {
                let sum: f64 = rows.iter().map(|p| p.energy[hour]).sum();
                grid.values[month][hour] = sum / count as f64;
            }
            start += count;
        }
        grid
    }
}

/// A 12 × 24 table indexed by calendar month (row) and clock hour (column).
///
/// Rows are labelled with [`MONTH_NAMES`] and columns `00h`..`23h`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthHourGrid {
    pub values: [[f64; HOURS_PER_DAY]; 12],
}

/// Monthly mean hourly PV energy (kWh/m²), the primary solar output.
pub type MonthlyMeanTable = MonthHourGrid;

impl MonthHourGrid {
    pub fn zeros() -> Self {
        Self {
            values: [[0.0; HOURS_PER_DAY]; 12],
        }
    }

    pub fn filled(value: f64) -> Self {
        Self {
            values: [[value; HOURS_PER_DAY]; 12],
        }
    }

    pub fn row_labels() -> [&'static str; 12] {
        MONTH_NAMES
    }

    pub fn column_labels() -> Vec<String> {
        (0..HOURS_PER_DAY).map(|h| format!("{h:02}h")).collect()
    }

    /// Sum of one month's row.
    pub fn row_total(&self, month_index: usize) -> f64 {
        self.values[month_index].iter().sum()
    }

    /// Apply `f` to every cell.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        let mut out = self.clone();
        out.values
            .iter_mut()
            .flat_map(|row| row.iter_mut())
            .for_each(|v| *v = f(*v));
        out
    }

    /// Round every cell to `decimals` digits.
    pub fn rounded(&self, decimals: i32) -> Self {
        let scale = 10f64.powi(decimals);
        self.map(|v| (v * scale).round() / scale)
    }

    /// Smallest and largest finite value, or `None` if the grid has no finite cells.
    pub fn finite_range(&self) -> Option<(f64, f64)> {
        self.values
            .iter()
            .flat_map(|row| row.iter().copied())
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((min, max)) => Some((min.min(v), max.max(v))),
            })
    }

    pub fn has_nan(&self) -> bool {
        self.values.iter().flatten().any(|v| v.is_nan())
    }
}
