//! Low-precision solar geometry for a day of the year.
//!
//! Cooper declination, the Spencer-style equation of time in the
//! `B = 360/365·(n − 81)` form and the sunset hour angle of a horizontal surface.
//! Accuracy is a few minutes of time, which is well below the 6-minute sampling of the
//! synthesized irradiance curve.

use crate::Site;

/// Solar declination in degrees for day-of-year `day` (1 = Jan 1).
pub fn declination_deg(day: usize) -> f64 {
    23.45 * (360.0 * (284.0 + day as f64) / 365.0).to_radians().sin()
}

/// Equation of time in minutes for day-of-year `day`.
pub fn equation_of_time_min(day: usize) -> f64 {
    let b = (360.0 / 365.0 * (day as f64 - 81.0)).to_radians();
    9.87 * (2.0 * b).sin() - 7.53 * b.cos() - 1.5 * b.sin()
}

/// Hours to add to local clock time to obtain true solar time.
///
/// The standard meridian is `timezone_offset_hours × 15°`.
pub fn time_correction_hours(day: usize, longitude: f64, timezone_offset_hours: f64) -> f64 {
    let standard_meridian = timezone_offset_hours * 15.0;
    (4.0 * (standard_meridian - longitude) + equation_of_time_min(day)) / 60.0
}

/// Sun-above-horizon window in true solar hours.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Daylight {
    /// Sun rises and sets; both in `[0, 24]`, symmetric about solar noon.
    Normal { sunrise: f64, sunset: f64 },
    /// Sun never sets.
    PolarDay,
    /// Sun never rises.
    PolarNight,
}

impl Daylight {
    /// Sunrise and sunset hours. Polar night collapses to a zero-length window at noon.
    pub fn window(&self) -> (f64, f64) {
        match *self {
            Daylight::Normal { sunrise, sunset } => (sunrise, sunset),
            Daylight::PolarDay => (0.0, 24.0),
            Daylight::PolarNight => (12.0, 12.0),
        }
    }

    /// Whether the sun may be up at `solar_hour`. A polar day contains every hour,
    /// including true solar times outside `[0, 24]` that a large time correction produces.
    pub fn contains(&self, solar_hour: f64) -> bool {
        match *self {
            Daylight::Normal { sunrise, sunset } => (sunrise..=sunset).contains(&solar_hour),
            Daylight::PolarDay => true,
            Daylight::PolarNight => false,
        }
    }

    pub fn day_length_hours(&self) -> f64 {
        let (rise, set) = self.window();
        set - rise
    }
}

/// Daylight window from latitude and declination (degrees).
///
/// `cos ωs = −tan φ · tan δ`. Arguments outside `[-1, 1]` mean the sun never crosses
/// the horizon that day.
pub fn daylight(latitude_deg: f64, declination_deg: f64) -> Daylight {
    let cos_ws = -latitude_deg.to_radians().tan() * declination_deg.to_radians().tan();
    if cos_ws >= 1.0 {
        Daylight::PolarNight
    } else if cos_ws <= -1.0 {
        Daylight::PolarDay
    } else {
        let half_day = cos_ws.acos().to_degrees() / 15.0;
        Daylight::Normal {
            sunrise: 12.0 - half_day,
            sunset: 12.0 + half_day,
        }
    }
}

/// Sun geometry for one site on one day.
#[derive(Clone, Copy, Debug)]
pub struct DayGeometry {
    sin_lat: f64,
    cos_lat: f64,
    sin_decl: f64,
    cos_decl: f64,
    pub declination_deg: f64,
    pub time_correction_hours: f64,
    pub daylight: Daylight,
}

impl DayGeometry {
    pub fn new(day: usize, site: &Site, timezone_offset_hours: f64) -> Self {
        let declination = declination_deg(day);
        let (sin_lat, cos_lat) = site.latitude.to_radians().sin_cos();
        let (sin_decl, cos_decl) = declination.to_radians().sin_cos();
        Self {
            sin_lat,
            cos_lat,
            sin_decl,
            cos_decl,
            declination_deg: declination,
            time_correction_hours: time_correction_hours(
                day,
                site.longitude,
                timezone_offset_hours,
            ),
            daylight: daylight(site.latitude, declination),
        }
    }

    /// Local clock hour → true solar hour.
    pub fn true_solar_time(&self, clock_hour: f64) -> f64 {
        clock_hour + self.time_correction_hours
    }

    /// Local clock hour at which the sun crosses the meridian.
    pub fn solar_noon_clock(&self) -> f64 {
        12.0 - self.time_correction_hours
    }

    /// Cosine of the solar zenith angle at a true solar hour. Negative below the horizon.
    pub fn cos_zenith(&self, solar_hour: f64) -> f64 {
        let omega = (15.0 * (solar_hour - 12.0)).to_radians();
        self.sin_lat * self.sin_decl + self.cos_lat * self.cos_decl * omega.cos()
    }
}
