//! # Annual Hourly PV Profile Synthesis
//!
//! Expands twelve monthly mean daily energy densities (kWh/m²/day) into 365 × 24 hourly
//! energies, then averages them back into a 12 × 24 monthly table.
//!
//! ## Pipeline
//! 1. **Harmonic fit** of the monthly values ([`HarmonicFit`])
//! 2. **Daily density** by evaluating the fit at days 1..=365 (not clamped)
//! 3. **Solar geometry** for the day ([`DayGeometry`])
//! 4. **Clear-sky curve** at 241 points across the clock day (6-minute steps)
//! 5. **Normalization** so the trapezoidal integral equals the daily density
//! 6. **Hourly aggregation**: interpolate at whole hours, average each hour's endpoints
//! 7. **Monthly means** with the non-leap month table, rounded to 6 decimals
//!
//! Days are independent, so steps 3–6 run as a parallel map over days.
//!
//! ## Degenerate days
//! When the clear-sky curve integrates to zero (polar night) the day stays all zero
//! whatever the target density. NaN targets produce NaN curves.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::harmonic::{HarmonicFit, MonthAnchor, MAX_HARMONICS};
use crate::solar_geometry::DayGeometry;
use crate::{AnnualHourlyMatrix, HourlyProfile, MonthlyMeanTable, Site, DAYS_PER_YEAR};

/// Sub-hourly samples across the clock day, inclusive of both midnights.
pub const SUBHOURLY_SAMPLES: usize = 241;

/// Decimal digits kept in the monthly mean table.
const TABLE_DECIMALS: i32 = 6;

#[derive(Error, Debug, PartialEq)]
pub enum ProfileError {
    #[error("harmonic count {0} outside 1..=6")]
    InvalidHarmonics(usize),

    #[error("site ({latitude}, {longitude}) is outside the geographic range")]
    InvalidSite { latitude: f64, longitude: f64 },

    #[error("timezone offset {0} h is not a valid UTC offset")]
    InvalidTimezone(f64),
}

/// Exponential-transmission clear-sky irradiance on a horizontal surface.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClearSkyModel {
    /// Extraterrestrial irradiance I0 (W/m²)
    pub solar_constant: f64,
    /// Beam transmissivity Kb, raised to the air mass 1/cos θ
    pub beam_transmissivity: f64,
    /// Diffuse fraction Kd of I0
    pub diffuse_fraction: f64,
}

impl Default for ClearSkyModel {
    fn default() -> Self {
        Self {
            solar_constant: 1367.0,
            beam_transmissivity: 0.98,
            diffuse_fraction: 0.13,
        }
    }
}

impl ClearSkyModel {
    /// Global horizontal irradiance in kW/m² for a given cosine of the zenith angle.
    /// Zero when the sun is at or below the horizon.
    pub fn irradiance_kw(&self, cos_zenith: f64) -> f64 {
        if cos_zenith <= 0.0 {
            return 0.0;
        }
        let direct =
            self.solar_constant * self.beam_transmissivity.powf(1.0 / cos_zenith) * cos_zenith;
        let diffuse = self.solar_constant * self.diffuse_fraction * cos_zenith;
        (direct + diffuse) / 1000.0
    }
}

/// Immutable parameters of one synthesizer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SynthesizerConfig {
    pub clear_sky: ClearSkyModel,
    pub harmonics: usize,
    pub timezone_offset_hours: f64,
    pub month_anchor: MonthAnchor,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            clear_sky: ClearSkyModel::default(),
            harmonics: MAX_HARMONICS,
            timezone_offset_hours: -3.0,
            month_anchor: MonthAnchor::CalendarMidpoint,
        }
    }
}

/// Irradiance (kW/m²) sampled every 6 minutes over one clock day.
#[derive(Clone, Debug, PartialEq)]
pub struct SubHourlyCurve {
    pub clock_hours: Vec<f64>,
    pub irradiance: Vec<f64>,
}

impl SubHourlyCurve {
    /// Trapezoidal integral over the day (kWh/m²).
    pub fn integral(&self) -> f64 {
        self.clock_hours
            .windows(2)
            .zip(self.irradiance.windows(2))
            .map(|(h, v)| (h[1] - h[0]) * (v[0] + v[1]) / 2.0)
            .sum()
    }

    /// Linear interpolation at a clock hour, clamped to the end values outside the day.
    pub fn interpolate(&self, clock_hour: f64) -> f64 {
        let xs = &self.clock_hours;
        let ys = &self.irradiance;
        if clock_hour <= xs[0] {
            return ys[0];
        }
        if clock_hour >= xs[xs.len() - 1] {
            return ys[ys.len() - 1];
        }
        let upper = xs.partition_point(|&x| x < clock_hour);
        let lower = upper - 1;
        let alpha = (clock_hour - xs[lower]) / (xs[upper] - xs[lower]);
        ys[lower] + alpha * (ys[upper] - ys[lower])
    }

    /// Hourly energies: mean of the interpolated values at each hour's two endpoints.
    pub fn hourly(&self) -> HourlyProfile {
        let at_hour: Vec<f64> = (0..=24).map(|h| self.interpolate(h as f64)).collect();
        let mut profile = HourlyProfile::zeros();
        for (energy, pair) in profile.energy.iter_mut().zip(at_hour.windows(2)) {
            *energy = (pair[0] + pair[1]) / 2.0;
        }
        profile
    }
}

/// Everything produced by one annual synthesis.
#[derive(Clone, Debug)]
pub struct AnnualSynthesis {
    pub fit: HarmonicFit,
    pub daily_density: Vec<f64>,
    pub matrix: AnnualHourlyMatrix,
    pub monthly_means: MonthlyMeanTable,
}

/// Monthly densities + site → hourly profiles. Holds no state between calls.
#[derive(Clone, Debug)]
pub struct AnnualProfileSynthesizer {
    config: SynthesizerConfig,
}

impl AnnualProfileSynthesizer {
    pub fn new(config: SynthesizerConfig) -> Result<Self, ProfileError> {
        if !(1..=MAX_HARMONICS).contains(&config.harmonics) {
            return Err(ProfileError::InvalidHarmonics(config.harmonics));
        }
        if !config.timezone_offset_hours.is_finite()
            || !(-12.0..=14.0).contains(&config.timezone_offset_hours)
        {
            return Err(ProfileError::InvalidTimezone(config.timezone_offset_hours));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &SynthesizerConfig {
        &self.config
    }

    /// Step 1: harmonic fit of the monthly values.
    pub fn fit(&self, monthly: &[f64; 12]) -> HarmonicFit {
        HarmonicFit::fit(monthly, self.config.harmonics, self.config.month_anchor)
    }

    /// Steps 3–5: normalized clear-sky curve for one day.
    pub fn subhourly_curve(&self, day: usize, daily_density: f64, site: &Site) -> SubHourlyCurve {
        let geometry = DayGeometry::new(day, site, self.config.timezone_offset_hours);
        let last = (SUBHOURLY_SAMPLES - 1) as f64;
        let clock_hours: Vec<f64> = (0..SUBHOURLY_SAMPLES)
            .map(|i| 24.0 * i as f64 / last)
            .collect();

        let irradiance = clock_hours
            .iter()
            .map(|&clock| {
                let solar_hour = geometry.true_solar_time(clock);
                if geometry.daylight.contains(solar_hour) {
                    self.config
                        .clear_sky
                        .irradiance_kw(geometry.cos_zenith(solar_hour))
                } else {
                    0.0
                }
            })
            .collect();

        let mut curve = SubHourlyCurve {
            clock_hours,
            irradiance,
        };

        let modeled = curve.integral();
        if modeled > 0.0 {
            let scale = daily_density / modeled;
            curve.irradiance.iter_mut().for_each(|v| *v *= scale);
        } else {
            debug!(day, "no clear-sky energy, leaving day at zero");
        }
        curve
    }

    /// Steps 3–6 for one day. Pure in `(day, daily_density, site)`.
    pub fn hourly_profile(&self, day: usize, daily_density: f64, site: &Site) -> HourlyProfile {
        self.subhourly_curve(day, daily_density, site).hourly()
    }

    /// Full pipeline, keeping every intermediate product.
    pub fn synthesize_annual(
        &self,
        monthly: &[f64; 12],
        site: &Site,
    ) -> Result<AnnualSynthesis, ProfileError> {
        if !site.is_valid() {
            return Err(ProfileError::InvalidSite {
                latitude: site.latitude,
                longitude: site.longitude,
            });
        }

        let fit = self.fit(monthly);
        if fit.is_degraded() {
            warn!("missing monthly value; the harmonic fit and every derived day are NaN");
        }
        let daily_density = fit.daily_series(DAYS_PER_YEAR);

        let matrix = AnnualHourlyMatrix::par_from_fn(|day| {
            self.hourly_profile(day, daily_density[day - 1], site)
        });
        let monthly_means = matrix.monthly_means().rounded(TABLE_DECIMALS);

        debug!(
            harmonics = fit.harmonics(),
            a0 = fit.a0(),
            "annual profile synthesized"
        );

        Ok(AnnualSynthesis {
            fit,
            daily_density,
            matrix,
            monthly_means,
        })
    }

    /// Full pipeline, monthly mean table only.
    pub fn synthesize(
        &self,
        monthly: &[f64; 12],
        site: &Site,
    ) -> Result<MonthlyMeanTable, ProfileError> {
        Ok(self.synthesize_annual(monthly, site)?.monthly_means)
    }
}
