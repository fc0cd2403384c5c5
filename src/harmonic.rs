//! # Annual Harmonic Fit
//!
//! Treats twelve monthly means as samples of a periodic function of day-of-year and
//! fits a truncated Fourier series to them by discrete projection:
//!
//! ```text
//! A0    = mean(values)
//! An[n] = 2/12 · Σ values[m] · cos(2π n day[m] / P)
//! Bn[n] = 2/12 · Σ values[m] · sin(2π n day[m] / P)        n = 1..H
//! ```
//!
//! The projection is exact for uniformly spaced samples and approximate for calendar
//! month midpoints. The fit is global: a NaN in any month reaches every coefficient.

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use crate::DAYS_PER_MONTH;

/// Period of the annual cycle in days.
pub const YEAR_PERIOD_DAYS: f64 = 365.25;

/// Largest harmonic count twelve samples can resolve.
pub const MAX_HARMONICS: usize = 6;

/// Where each month's sample sits on the day-of-year axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthAnchor {
    /// Midpoint of the calendar month (non-leap day counts).
    #[default]
    CalendarMidpoint,
    /// Twelve equal slices of the period, sampled at their centres.
    Uniform,
}

impl MonthAnchor {
    /// Representative day of each month.
    pub fn days(self) -> [f64; 12] {
        let mut days = [0.0; 12];
        match self {
            MonthAnchor::CalendarMidpoint => {
                let mut elapsed = 0.0;
                for (day, &count) in days.iter_mut().zip(DAYS_PER_MONTH.iter()) {
                    *day = elapsed + count as f64 / 2.0;
                    elapsed += count as f64;
                }
            }
            MonthAnchor::Uniform => {
                let step = YEAR_PERIOD_DAYS / 12.0;
                for (m, day) in days.iter_mut().enumerate() {
                    *day = m as f64 * step + step / 2.0;
                }
            }
        }
        days
    }
}

/// Fourier coefficients of the annual cycle. Immutable once fitted.
#[derive(Clone, Debug, PartialEq)]
pub struct HarmonicFit {
    a0: f64,
    an: Vec<f64>,
    bn: Vec<f64>,
    period: f64,
}

impl HarmonicFit {
    /// Project twelve monthly values onto `harmonics` cosine/sine pairs.
    ///
    /// `harmonics` is expected in `1..=MAX_HARMONICS`; the caller validates it.
    pub fn fit(values: &[f64; 12], harmonics: usize, anchor: MonthAnchor) -> Self {
        let days = anchor.days();
        let m = values.len() as f64;
        let a0 = values.iter().sum::<f64>() / m;

        let project = |n: usize, basis: fn(f64) -> f64| -> f64 {
            let sum: f64 = values
                .iter()
                .zip(days.iter())
                .map(|(&v, &d)| v * basis(TAU * n as f64 * d / YEAR_PERIOD_DAYS))
                .sum();
            2.0 / m * sum
        };

        let an = (1..=harmonics).map(|n| project(n, f64::cos)).collect();
        let bn = (1..=harmonics).map(|n| project(n, f64::sin)).collect();

        Self {
            a0,
            an,
            bn,
            period: YEAR_PERIOD_DAYS,
        }
    }

    pub fn a0(&self) -> f64 {
        self.a0
    }

    pub fn an(&self) -> &[f64] {
        &self.an
    }

    pub fn bn(&self) -> &[f64] {
        &self.bn
    }

    pub fn harmonics(&self) -> usize {
        self.an.len()
    }

    /// True if any coefficient is NaN.
    pub fn is_degraded(&self) -> bool {
        self.a0.is_nan() || self.an.iter().chain(self.bn.iter()).any(|c| c.is_nan())
    }

    /// Evaluate the series at day `t` (fractional days allowed). Not clamped.
    pub fn evaluate(&self, t: f64) -> f64 {
        self.an
            .iter()
            .zip(self.bn.iter())
            .enumerate()
            .fold(self.a0, |acc, (i, (&a, &b))| {
                let arg = TAU * (i + 1) as f64 * t / self.period;
                acc + a * arg.cos() + b * arg.sin()
            })
    }

    /// Daily densities for days `1..=days`.
    pub fn daily_series(&self, days: usize) -> Vec<f64> {
        (1..=days).map(|d| self.evaluate(d as f64)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calendar_midpoints() {
        let days = MonthAnchor::CalendarMidpoint.days();
        assert_eq!(days[0], 15.5);
        assert_eq!(days[1], 45.0);
        assert_eq!(days[11], 334.0 + 15.5);
    }

    #[test]
    fn test_uniform_anchor() {
        let days = MonthAnchor::Uniform.days();
        let step = YEAR_PERIOD_DAYS / 12.0;
        assert!((days[0] - step / 2.0).abs() < 1e-12);
        assert!((days[11] - (11.5 * step)).abs() < 1e-12);
    }

    #[test]
    fn test_constant_input_degenerates_to_mean() {
        let fit = HarmonicFit::fit(&[5.0; 12], 6, MonthAnchor::Uniform);
        assert!((fit.a0() - 5.0).abs() < 1e-12);
        for c in fit.an().iter().chain(fit.bn()) {
            assert!(c.abs() < 1e-9, "coefficient {c} should vanish");
        }
        assert!((fit.evaluate(100.0) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_constant_input_calendar_anchor_is_nearly_flat() {
        let fit = HarmonicFit::fit(&[5.0; 12], 6, MonthAnchor::CalendarMidpoint);
        assert!((fit.a0() - 5.0).abs() < 1e-12);
        for c in fit.an().iter().chain(fit.bn()) {
            assert!(c.abs() < 0.1, "coefficient {c} should be small");
        }
    }

    #[test]
    fn test_single_harmonic_is_recovered() {
        let days = MonthAnchor::Uniform.days();
        let values: [f64; 12] =
            std::array::from_fn(|m| 4.0 + (TAU * days[m] / YEAR_PERIOD_DAYS).cos());
        let fit = HarmonicFit::fit(&values, 3, MonthAnchor::Uniform);
        assert!((fit.a0() - 4.0).abs() < 1e-9);
        assert!((fit.an()[0] - 1.0).abs() < 1e-9);
        assert!(fit.bn()[0].abs() < 1e-9);
        assert!(fit.an()[1].abs() < 1e-9);
    }

    #[test]
    fn test_nan_propagates_into_every_coefficient() {
        let mut values = [5.0; 12];
        values[6] = f64::NAN;
        let fit = HarmonicFit::fit(&values, 6, MonthAnchor::CalendarMidpoint);
        assert!(fit.a0().is_nan());
        assert!(fit.an().iter().all(|c| c.is_nan()));
        assert!(fit.bn().iter().all(|c| c.is_nan()));
        assert!(fit.is_degraded());
        assert!(fit.evaluate(1.0).is_nan());
    }

    #[test]
    fn test_daily_series_length() {
        let fit = HarmonicFit::fit(&[1.0; 12], 2, MonthAnchor::CalendarMidpoint);
        let series = fit.daily_series(365);
        assert_eq!(series.len(), 365);
        assert_eq!(fit.harmonics(), 2);
    }
}
