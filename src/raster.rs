//! # Raster Sampling
//!
//! Point extraction from single-band GeoTIFF climatology layers, read natively with the
//! `tiff` crate (no GDAL). Only north-up rasters in geographic coordinates (EPSG:4326)
//! are supported; the georeferencing comes from the ModelPixelScale and ModelTiepoint
//! tags and nodata from the GDAL_NODATA tag.
//!
//! Two lookups are offered:
//! - [`RasterGrid::nearest_cell`]: nearest cell centre by Euclidean distance in degrees,
//!   used for the monthly PV density layers (rejects points beyond a threshold)
//! - [`RasterGrid::value_at`]: the cell containing the point, used for the capacity
//!   factor layer

use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;
use tracing::{debug, warn};

use crate::{Site, DAYS_PER_MONTH};

const MODEL_PIXEL_SCALE: Tag = Tag::ModelPixelScaleTag;
const MODEL_TIEPOINT: Tag = Tag::ModelTiepointTag;
const GDAL_NODATA: Tag = Tag::GdalNodata;

/// Cells below this value are treated as empty.
const EMPTY_CELL_THRESHOLD: f64 = 1e-10;

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("raster IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF decode: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("raster has no usable georeferencing tags")]
    MissingGeoTransform,

    #[error("unsupported pixel format")]
    UnsupportedPixelType,

    #[error("raster data has {got} cells, expected {rows}x{cols}")]
    Shape { rows: usize, cols: usize, got: usize },
}

/// North-up affine transform: pixel (col, row) → (lon, lat) of the upper-left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    /// Negative for north-up rasters
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Geographic coordinates (x, y) of a pixel centre.
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            self.origin_y + (row as f64 + 0.5) * self.pixel_height,
        )
    }

    /// Fractional pixel coordinates (col, row) of a geographic point.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.pixel_width,
            (y - self.origin_y) / self.pixel_height,
        )
    }
}

/// Single-band raster held in memory as `f64`, row-major from the top row.
#[derive(Clone, Debug)]
pub struct RasterGrid {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
    transform: GeoTransform,
    nodata: Option<f64>,
}

impl RasterGrid {
    pub fn new(
        rows: usize,
        cols: usize,
        data: Vec<f64>,
        transform: GeoTransform,
        nodata: Option<f64>,
    ) -> Result<Self, RasterError> {
        if data.len() != rows * cols {
            return Err(RasterError::Shape {
                rows,
                cols,
                got: data.len(),
            });
        }
        Ok(Self {
            rows,
            cols,
            data,
            transform,
            nodata,
        })
    }

    /// Read band 1 of a GeoTIFF file.
    pub fn read_geotiff<P: AsRef<Path>>(path: P) -> Result<Self, RasterError> {
        let file = File::open(path.as_ref())?;
        Self::decode(BufReader::new(file))
    }

    fn decode<R: Read + Seek>(reader: R) -> Result<Self, RasterError> {
        let mut decoder = Decoder::new(reader)?;
        let (width, height) = decoder.dimensions()?;

        let data: Vec<f64> = match decoder.read_image()? {
            DecodingResult::F32(buf) => buf.into_iter().map(f64::from).collect(),
            DecodingResult::F64(buf) => buf,
            DecodingResult::U8(buf) => buf.into_iter().map(f64::from).collect(),
            DecodingResult::U16(buf) => buf.into_iter().map(f64::from).collect(),
            DecodingResult::U32(buf) => buf.into_iter().map(f64::from).collect(),
            DecodingResult::I8(buf) => buf.into_iter().map(f64::from).collect(),
            DecodingResult::I16(buf) => buf.into_iter().map(f64::from).collect(),
            DecodingResult::I32(buf) => buf.into_iter().map(f64::from).collect(),
            _ => return Err(RasterError::UnsupportedPixelType),
        };

        let scale = decoder
            .get_tag_f64_vec(MODEL_PIXEL_SCALE)
            .map_err(|_| RasterError::MissingGeoTransform)?;
        let tiepoint = decoder
            .get_tag_f64_vec(MODEL_TIEPOINT)
            .map_err(|_| RasterError::MissingGeoTransform)?;
        if scale.len() < 2 || tiepoint.len() < 6 {
            return Err(RasterError::MissingGeoTransform);
        }
        // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
        let transform = GeoTransform::new(
            tiepoint[3] - tiepoint[0] * scale[0],
            tiepoint[4] + tiepoint[1] * scale[1],
            scale[0],
            -scale[1],
        );

        let nodata = decoder
            .get_tag_ascii_string(GDAL_NODATA)
            .ok()
            .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f64>().ok());

        Self::new(height as usize, width as usize, data, transform, nodata)
    }

    /// Write as a 32-bit float GeoTIFF with scale, tiepoint and nodata tags.
    pub fn write_geotiff<P: AsRef<Path>>(&self, path: P) -> Result<(), RasterError> {
        let file = File::create(path.as_ref())?;
        self.encode(file)
    }

    fn encode<W: Write + Seek>(&self, writer: W) -> Result<(), RasterError> {
        let mut encoder = TiffEncoder::new(writer)?;
        let mut image = encoder.new_image::<Gray32Float>(self.cols as u32, self.rows as u32)?;

        let t = &self.transform;
        let scale = [t.pixel_width, t.pixel_height.abs(), 0.0];
        image.encoder().write_tag(MODEL_PIXEL_SCALE, &scale[..])?;
        let tiepoint = [0.0, 0.0, 0.0, t.origin_x, t.origin_y, 0.0];
        image.encoder().write_tag(MODEL_TIEPOINT, &tiepoint[..])?;
        if let Some(nodata) = self.nodata {
            image
                .encoder()
                .write_tag(GDAL_NODATA, nodata.to_string().as_str())?;
        }

        let data: Vec<f32> = self.data.iter().map(|&v| v as f32).collect();
        image.write_data(&data)?;
        Ok(())
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        (row < self.rows && col < self.cols).then(|| self.data[row * self.cols + col])
    }

    /// True for NaN and nodata cells.
    pub fn is_missing(&self, value: f64) -> bool {
        value.is_nan() || self.nodata.is_some_and(|nd| value == nd)
    }

    /// Apply `f` to every valid cell; nodata cells become NaN.
    pub fn map_valid(&self, f: impl Fn(f64) -> f64) -> Self {
        let data = self
            .data
            .iter()
            .map(|&v| if self.is_missing(v) { f64::NAN } else { f(v) })
            .collect();
        Self {
            data,
            nodata: None,
            ..self.clone()
        }
    }

    /// Nearest cell centre to the site: `(row, col, distance in degrees)`.
    pub fn nearest_cell(&self, site: &Site) -> Option<(usize, usize, f64)> {
        let mut best: Option<(usize, usize, f64)> = None;
        for row in 0..self.rows {
            for col in 0..self.cols {
                let (x, y) = self.transform.pixel_center(col, row);
                let distance = (x - site.longitude).hypot(y - site.latitude);
                if best.map_or(true, |(_, _, d)| distance < d) {
                    best = Some((row, col, distance));
                }
            }
        }
        best
    }

    /// Value of the nearest cell centre, or NaN when it is farther than `max_distance_deg`.
    pub fn sample_nearest(&self, site: &Site, max_distance_deg: f64) -> f64 {
        match self.nearest_cell(site) {
            Some((row, col, distance)) if distance <= max_distance_deg => {
                self.data[row * self.cols + col]
            }
            Some((_, _, distance)) => {
                warn!("point far from the raster: ({distance:.4}°)");
                f64::NAN
            }
            None => f64::NAN,
        }
    }

    /// Value of the cell containing the site; `None` outside the grid or on nodata.
    pub fn value_at(&self, site: &Site) -> Option<f64> {
        let (col, row) = self.transform.geo_to_pixel(site.longitude, site.latitude);
        if !(col >= 0.0 && row >= 0.0) {
            return None;
        }
        self.get(row.floor() as usize, col.floor() as usize)
            .filter(|&v| !self.is_missing(v))
    }
}

/// Source of one scalar per calendar month at a site.
pub trait RasterSampler {
    /// Daily energy density for `month` (1..=12) at the site, NaN when unavailable.
    fn sample(&self, month: u32, site: &Site) -> f64;
}

/// Monthly PV density layers `<input_dir>/<prefix><MM>.tif`.
///
/// Cells hold monthly totals (kWh/m²/month); samples are returned per day.
#[derive(Clone, Debug)]
pub struct MonthlyRasterSet {
    pub input_dir: PathBuf,
    pub prefix: String,
    pub max_distance_deg: f64,
}

impl MonthlyRasterSet {
    pub fn new(
        input_dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        max_distance_deg: f64,
    ) -> Self {
        Self {
            input_dir: input_dir.into(),
            prefix: prefix.into(),
            max_distance_deg,
        }
    }

    pub fn path_for(&self, month: u32) -> PathBuf {
        self.input_dir.join(format!("{}{:02}.tif", self.prefix, month))
    }

    /// Daily density layer for a month: totals divided by the month length, empty cells NaN.
    pub fn load_daily(&self, month: u32) -> Result<RasterGrid, RasterError> {
        let grid = RasterGrid::read_geotiff(self.path_for(month))?;
        let days = DAYS_PER_MONTH[(month - 1) as usize] as f64;
        Ok(grid.map_valid(|v| {
            let daily = v / days;
            if daily < EMPTY_CELL_THRESHOLD {
                f64::NAN
            } else {
                daily
            }
        }))
    }
}

impl RasterSampler for MonthlyRasterSet {
    fn sample(&self, month: u32, site: &Site) -> f64 {
        if !(1..=12).contains(&month) {
            return f64::NAN;
        }
        let path = self.path_for(month);
        if !path.exists() {
            warn!(path = %path.display(), "file not found");
            return f64::NAN;
        }
        match self.load_daily(month) {
            Ok(grid) => {
                let value = grid.sample_nearest(site, self.max_distance_deg);
                debug!(month, value, "sampled monthly density");
                value
            }
            Err(e) => {
                warn!("error in the month {month:02}: {e}");
                f64::NAN
            }
        }
    }
}

/// Sample all twelve months in calendar order.
pub fn sample_months<S: RasterSampler + ?Sized>(sampler: &S, site: &Site) -> [f64; 12] {
    std::array::from_fn(|m| sampler.sample(m as u32 + 1, site))
}
