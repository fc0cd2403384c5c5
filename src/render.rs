//! # Month × Hour Grid Rendering
//!
//! Renders 12 × 24 grids both as image files and as terminal output.
//!
//! - [`ImageRenderer`] draws with `embedded-graphics` into an `image::RgbImage` and
//!   saves PNG: an annotated heatmap with a colour bar, and an isometric wireframe
//!   surface.
//! - [`write_surface_html`] writes the surface as a standalone page that rotates in a
//!   browser.
//! - [`draw_ascii_heatmap`] prints a shaded table for development mode (`--stdout`).
//! - [`write_grid_json`] stores the grid values next to the figures.

use embedded_graphics::{
    mono_font::{ascii::FONT_6X10, MonoTextStyle},
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
    text::{Alignment, Text},
};
use image::{ImageFormat, Rgb, RgbImage};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::{MonthHourGrid, HOURS_PER_DAY, MONTH_NAMES};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("render IO: {0}")]
    Io(#[from] io::Error),

    #[error("grid serialization: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image encoding: {0}")]
    Image(#[from] image::ImageError),
}

/// Titles and number format for one figure.
#[derive(Clone, Debug)]
pub struct PlotLabels {
    pub title: String,
    /// Colour bar / z axis label, with unit
    pub value_label: String,
    /// Decimals in cell annotations
    pub decimals: usize,
}

impl PlotLabels {
    pub fn new(title: impl Into<String>, value_label: impl Into<String>, decimals: usize) -> Self {
        Self {
            title: title.into(),
            value_label: value_label.into(),
            decimals,
        }
    }
}

/// Figure producer for month × hour grids.
pub trait Renderer {
    /// File extension of the figures, without the dot.
    fn extension(&self) -> &'static str;

    fn heatmap(
        &self,
        grid: &MonthHourGrid,
        labels: &PlotLabels,
        path: &Path,
    ) -> Result<(), RenderError>;

    fn surface3d(
        &self,
        grid: &MonthHourGrid,
        labels: &PlotLabels,
        path: &Path,
    ) -> Result<(), RenderError>;
}

/// Turbo-like colour ramp anchors, evenly spaced from 0 to 1.
const RAMP: [(u8, u8, u8); 9] = [
    (48, 18, 59),
    (70, 107, 227),
    (40, 188, 235),
    (50, 241, 152),
    (164, 252, 60),
    (237, 208, 58),
    (251, 128, 34),
    (210, 49, 5),
    (122, 4, 3),
];

const MISSING: Rgb888 = Rgb888::new(160, 160, 160);
const BACKGROUND: Rgb888 = Rgb888::WHITE;
const INK: Rgb888 = Rgb888::BLACK;

/// Colour for a value normalised to `[0, 1]` (clamped). NaN maps to grey.
pub fn ramp_color(t: f64) -> Rgb888 {
    if t.is_nan() {
        return MISSING;
    }
    let t = t.clamp(0.0, 1.0) * (RAMP.len() - 1) as f64;
    let i = (t.floor() as usize).min(RAMP.len() - 2);
    let f = t - i as f64;
    let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * f).round() as u8;
    let (a, b) = (RAMP[i], RAMP[i + 1]);
    Rgb888::new(lerp(a.0, b.0), lerp(a.1, b.1), lerp(a.2, b.2))
}

fn normalizer(grid: &MonthHourGrid) -> impl Fn(f64) -> f64 {
    let (min, max) = grid.finite_range().unwrap_or((0.0, 1.0));
    let span = if max > min { max - min } else { 1.0 };
    move |v| (v - min) / span
}

/// RGB image buffer that `embedded-graphics` can draw on.
pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: Rgb888) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, to_rgb(background)),
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb888> {
        self.image
            .get_pixel_checked(x, y)
            .map(|&Rgb([r, g, b])| Rgb888::new(r, g, b))
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn save_png(&self, path: &Path) -> Result<(), image::ImageError> {
        self.image.save_with_format(path, ImageFormat::Png)
    }
}

fn to_rgb(color: Rgb888) -> Rgb<u8> {
    Rgb([color.r(), color.g(), color.b()])
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }
}

impl DrawTarget for Canvas {
    type Color = Rgb888;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if let (Ok(x), Ok(y)) = (u32::try_from(point.x), u32::try_from(point.y)) {
                if x < self.image.width() && y < self.image.height() {
                    self.image.put_pixel(x, y, to_rgb(color));
                }
            }
        }
        Ok(())
    }
}

/// PNG figures drawn with `embedded-graphics`.
#[derive(Clone, Debug)]
pub struct ImageRenderer {
    pub cell_width: u32,
    pub cell_height: u32,
}

impl Default for ImageRenderer {
    fn default() -> Self {
        Self {
            cell_width: 44,
            cell_height: 30,
        }
    }
}

impl ImageRenderer {
    const LEFT: u32 = 40;
    const TOP: u32 = 30;
    const BOTTOM: u32 = 30;
    const BAR_WIDTH: u32 = 110;

    /// Draw the annotated heatmap onto a new canvas.
    pub fn heatmap_canvas(&self, grid: &MonthHourGrid, labels: &PlotLabels) -> Canvas {
        let grid_w = self.cell_width * HOURS_PER_DAY as u32;
        let grid_h = self.cell_height * 12;
        let width = Self::LEFT + grid_w + Self::BAR_WIDTH;
        let height = Self::TOP + grid_h + Self::BOTTOM;
        let mut canvas = Canvas::new(width, height, BACKGROUND);
        let text = MonoTextStyle::new(&FONT_6X10, INK);
        let normalize = normalizer(grid);

        Text::new(&labels.title, Point::new(Self::LEFT as i32, 15), text)
            .draw(&mut canvas)
            .ok();

        for (month, row) in grid.values.iter().enumerate() {
            let y = (Self::TOP + month as u32 * self.cell_height) as i32;
            Text::new(
                MONTH_NAMES[month],
                Point::new(8, y + self.cell_height as i32 / 2 + 3),
                text,
            )
            .draw(&mut canvas)
            .ok();

            for (hour, &value) in row.iter().enumerate() {
                let x = (Self::LEFT + hour as u32 * self.cell_width) as i32;
                let fill = ramp_color(normalize(value));
                Rectangle::new(
                    Point::new(x, y),
                    Size::new(self.cell_width - 1, self.cell_height - 1),
                )
                .into_styled(PrimitiveStyle::with_fill(fill))
                .draw(&mut canvas)
                .ok();

                // Dark cells get light annotations
                let luminance =
                    0.299 * fill.r() as f64 + 0.587 * fill.g() as f64 + 0.114 * fill.b() as f64;
                let ink = if luminance < 110.0 { Rgb888::WHITE } else { INK };
                let annotation = format_value(value, labels.decimals);
                Text::with_alignment(
                    &annotation,
                    Point::new(
                        x + self.cell_width as i32 / 2,
                        y + self.cell_height as i32 / 2 + 3,
                    ),
                    MonoTextStyle::new(&FONT_6X10, ink),
                    Alignment::Center,
                )
                .draw(&mut canvas)
                .ok();
            }
        }

        let axis_y = (Self::TOP + grid_h + 14) as i32;
        for hour in (0..HOURS_PER_DAY).step_by(3) {
            let x = (Self::LEFT + hour as u32 * self.cell_width + self.cell_width / 2) as i32;
            Text::with_alignment(
                &format!("{hour:02}h"),
                Point::new(x, axis_y),
                text,
                Alignment::Center,
            )
            .draw(&mut canvas)
            .ok();
        }
        Text::new(
            "Hour of Day",
            Point::new((Self::LEFT + grid_w / 2) as i32 - 33, axis_y + 12),
            text,
        )
        .draw(&mut canvas)
        .ok();

        self.draw_color_bar(&mut canvas, grid, labels, Self::LEFT + grid_w + 15);
        canvas
    }

    fn draw_color_bar(
        &self,
        canvas: &mut Canvas,
        grid: &MonthHourGrid,
        labels: &PlotLabels,
        x: u32,
    ) {
        let text = MonoTextStyle::new(&FONT_6X10, INK);
        let bar_h = self.cell_height * 12;
        for dy in 0..bar_h {
            let t = 1.0 - dy as f64 / (bar_h - 1) as f64;
            Line::new(
                Point::new(x as i32, (Self::TOP + dy) as i32),
                Point::new(x as i32 + 14, (Self::TOP + dy) as i32),
            )
            .into_styled(PrimitiveStyle::with_stroke(ramp_color(t), 1))
            .draw(canvas)
            .ok();
        }
        if let Some((min, max)) = grid.finite_range() {
            let label_x = x as i32 + 18;
            Text::new(
                &format_value(max, labels.decimals),
                Point::new(label_x, Self::TOP as i32 + 8),
                text,
            )
            .draw(canvas)
            .ok();
            Text::new(
                &format_value(min, labels.decimals),
                Point::new(label_x, (Self::TOP + bar_h) as i32),
                text,
            )
            .draw(canvas)
            .ok();
        }
        Text::new(
            &labels.value_label,
            Point::new(x as i32 - 10, (Self::TOP + bar_h + 14) as i32),
            text,
        )
        .draw(canvas)
        .ok();
    }

    /// Draw the isometric wireframe surface onto a new canvas.
    pub fn surface_canvas(&self, grid: &MonthHourGrid, labels: &PlotLabels) -> Canvas {
        const WIDTH: u32 = 1000;
        const HEIGHT: u32 = 640;
        const STEP_HOUR: (f64, f64) = (28.0, 9.0);
        const STEP_MONTH: (f64, f64) = (-30.0, 14.0);
        const Z_HEIGHT: f64 = 260.0;
        let origin = (330.0, 330.0);

        let mut canvas = Canvas::new(WIDTH, HEIGHT, BACKGROUND);
        let text = MonoTextStyle::new(&FONT_6X10, INK);
        let normalize = normalizer(grid);

        let project = |month: usize, hour: usize, z: f64| -> Point {
            let x = origin.0 + hour as f64 * STEP_HOUR.0 + month as f64 * STEP_MONTH.0;
            let y =
                origin.1 + hour as f64 * STEP_HOUR.1 + month as f64 * STEP_MONTH.1 - z * Z_HEIGHT;
            Point::new(x.round() as i32, y.round() as i32)
        };
        let height_of = |month: usize, hour: usize| {
            let t = normalize(grid.values[month][hour]);
            if t.is_finite() {
                t
            } else {
                0.0
            }
        };

        Text::new(&labels.title, Point::new(20, 20), text)
            .draw(&mut canvas)
            .ok();

        // Back to front so nearer months overdraw farther ones
        for month in 0..12 {
            for hour in 0..HOURS_PER_DAY {
                let z = height_of(month, hour);
                let here = project(month, hour, z);
                let color = ramp_color(normalize(grid.values[month][hour]));
                if hour + 1 < HOURS_PER_DAY {
                    let next = project(month, hour + 1, height_of(month, hour + 1));
                    Line::new(here, next)
                        .into_styled(PrimitiveStyle::with_stroke(color, 2))
                        .draw(&mut canvas)
                        .ok();
                }
                if month + 1 < 12 {
                    let next = project(month + 1, hour, height_of(month + 1, hour));
                    Line::new(here, next)
                        .into_styled(PrimitiveStyle::with_stroke(color, 1))
                        .draw(&mut canvas)
                        .ok();
                }
            }
        }

        for hour in (0..HOURS_PER_DAY).step_by(3) {
            let p = project(12, hour, 0.0);
            Text::new(&format!("{hour:02}h"), p + Point::new(0, 12), text)
                .draw(&mut canvas)
                .ok();
        }
        for (month, name) in MONTH_NAMES.iter().enumerate() {
            let p = project(month, HOURS_PER_DAY, 0.0);
            Text::new(name, p + Point::new(6, 4), text)
                .draw(&mut canvas)
                .ok();
        }
        Text::new(
            &format!("z: {}", labels.value_label),
            Point::new(20, HEIGHT as i32 - 15),
            text,
        )
        .draw(&mut canvas)
        .ok();
        canvas
    }
}

impl Renderer for ImageRenderer {
    fn extension(&self) -> &'static str {
        "png"
    }

    fn heatmap(
        &self,
        grid: &MonthHourGrid,
        labels: &PlotLabels,
        path: &Path,
    ) -> Result<(), RenderError> {
        self.heatmap_canvas(grid, labels).save_png(path)?;
        info!("file created: {}", file_name(path));
        Ok(())
    }

    fn surface3d(
        &self,
        grid: &MonthHourGrid,
        labels: &PlotLabels,
        path: &Path,
    ) -> Result<(), RenderError> {
        self.surface_canvas(grid, labels).save_png(path)?;
        info!("file created: {}", file_name(path));
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn format_value(value: f64, decimals: usize) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else {
        format!("{value:.decimals$}")
    }
}

#[derive(Serialize)]
struct GridDocument<'a> {
    title: &'a str,
    value_label: &'a str,
    rows: [&'static str; 12],
    columns: Vec<String>,
    values: Vec<Vec<Option<f64>>>,
}

/// Grid values as JSON; NaN cells become `null`.
pub fn write_grid_json(
    grid: &MonthHourGrid,
    labels: &PlotLabels,
    path: &Path,
) -> Result<(), RenderError> {
    fs::write(path, serde_json::to_vec_pretty(&GridDocument::new(grid, labels))?)?;
    Ok(())
}

impl<'a> GridDocument<'a> {
    fn new(grid: &MonthHourGrid, labels: &'a PlotLabels) -> Self {
        GridDocument {
            title: &labels.title,
            value_label: &labels.value_label,
            rows: MonthHourGrid::row_labels(),
            columns: MonthHourGrid::column_labels(),
            values: grid
                .values
                .iter()
                .map(|row| row.iter().map(|&v| (!v.is_nan()).then_some(v)).collect())
                .collect(),
        }
    }
}

/// Page skeleton of the interactive surface. `__TITLE__` and `__GRID__` are substituted.
const SURFACE_PAGE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>__TITLE__</title>
<style>
body { font-family: sans-serif; margin: 16px; }
canvas { border: 1px solid #ccc; cursor: grab; }
</style>
</head>
<body>
<h3>__TITLE__</h3>
<canvas id="surface" width="960" height="620"></canvas>
<p>Drag to rotate, scroll to zoom.</p>
<script>
const grid = __GRID__;
const ramp = [[48,18,59],[70,107,227],[40,188,235],[50,241,152],[164,252,60],
  [237,208,58],[251,128,34],[210,49,5],[122,4,3]];
const cells = grid.values.flat().filter(v => v !== null);
const lo = cells.length ? Math.min(...cells) : 0;
const hi = cells.length ? Math.max(...cells) : 1;
const span = hi > lo ? hi - lo : 1;
const norm = v => v === null ? 0 : (v - lo) / span;
function color(t) {
  const x = Math.min(Math.max(t, 0), 1) * (ramp.length - 1);
  const i = Math.min(Math.floor(x), ramp.length - 2);
  const f = x - i;
  const c = ramp[i].map((a, k) => Math.round(a + (ramp[i + 1][k] - a) * f));
  return `rgb(${c[0]},${c[1]},${c[2]})`;
}
const canvas = document.getElementById("surface");
const ctx = canvas.getContext("2d");
let yaw = -0.7, pitch = 0.5, zoom = 1;
function project(m, h, z) {
  const x = (h - 11.5) / 23, y = (m - 5.5) / 11, zz = z - 0.5;
  const cx = x * Math.cos(yaw) - y * Math.sin(yaw);
  const cy = x * Math.sin(yaw) + y * Math.cos(yaw);
  const sy = cy * Math.sin(pitch) - zz * Math.cos(pitch);
  const s = 420 * zoom;
  return [canvas.width / 2 + cx * s, canvas.height / 2 + sy * s];
}
function draw() {
  ctx.clearRect(0, 0, canvas.width, canvas.height);
  ctx.lineWidth = 1.5;
  for (let m = 0; m < 12; m++) {
    for (let h = 0; h < 24; h++) {
      const z = norm(grid.values[m][h]);
      const p = project(m, h, z);
      ctx.strokeStyle = grid.values[m][h] === null ? "#a0a0a0" : color(z);
      const next = [];
      if (h + 1 < 24) next.push(project(m, h + 1, norm(grid.values[m][h + 1])));
      if (m + 1 < 12) next.push(project(m + 1, h, norm(grid.values[m + 1][h])));
      for (const q of next) {
        ctx.beginPath(); ctx.moveTo(p[0], p[1]); ctx.lineTo(q[0], q[1]); ctx.stroke();
      }
    }
  }
  ctx.fillStyle = "#000";
  for (let h = 0; h < 24; h += 3) {
    const p = project(12, h, 0); ctx.fillText(grid.columns[h], p[0], p[1] + 12);
  }
  for (let m = 0; m < 12; m++) {
    const p = project(m, 24, 0); ctx.fillText(grid.rows[m], p[0] + 6, p[1] + 4);
  }
  ctx.fillText("z: " + grid.value_label, 12, canvas.height - 12);
}
let drag = null;
canvas.addEventListener("mousedown", e => { drag = [e.clientX, e.clientY]; });
window.addEventListener("mouseup", () => { drag = null; });
window.addEventListener("mousemove", e => {
  if (!drag) return;
  yaw += (e.clientX - drag[0]) * 0.01;
  pitch = Math.min(Math.max(pitch + (e.clientY - drag[1]) * 0.01, 0.05), 1.5);
  drag = [e.clientX, e.clientY];
  draw();
});
canvas.addEventListener("wheel", e => {
  e.preventDefault();
  zoom = Math.min(Math.max(zoom * (e.deltaY < 0 ? 1.1 : 0.9), 0.3), 4);
  draw();
});
draw();
</script>
</body>
</html>
"##;

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Self-contained rotatable 3D surface page with the grid embedded as JSON.
pub fn write_surface_html(
    grid: &MonthHourGrid,
    labels: &PlotLabels,
    path: &Path,
) -> Result<(), RenderError> {
    // Keep the embedded JSON from closing the script element
    let data = serde_json::to_string(&GridDocument::new(grid, labels))?.replace("</", "<\\/");
    let page = SURFACE_PAGE
        .replace("__TITLE__", &escape_html(&labels.title))
        .replace("__GRID__", &data);
    fs::write(path, page)?;
    info!("file created: {}", file_name(path));
    Ok(())
}

/// Shading characters from low to high.
const SHADES: [char; 10] = [' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Shaded month × hour table, one character per cell.
pub fn ascii_heatmap(grid: &MonthHourGrid, labels: &PlotLabels) -> String {
    let normalize = normalizer(grid);
    let mut out = String::new();
    out.push_str(&labels.title);
    out.push('\n');

    let header: String = (0..HOURS_PER_DAY)
        .map(|h| if h % 3 == 0 { '|' } else { ' ' })
        .collect();
    out.push_str(&format!("    {header}\n"));

    for (month, row) in grid.values.iter().enumerate() {
        let cells: String = row
            .iter()
            .map(|&v| {
                let t = normalize(v);
                if t.is_nan() {
                    '?'
                } else {
                    SHADES[((t.clamp(0.0, 1.0) * (SHADES.len() - 1) as f64).round()) as usize]
                }
            })
            .collect();
        out.push_str(&format!("{:<4}{cells}\n", MONTH_NAMES[month]));
    }

    let axis: String = (0..HOURS_PER_DAY)
        .step_by(6)
        .map(|h| format!("{h:<6}"))
        .collect();
    out.push_str(&format!("    {axis}\n"));
    if let Some((min, max)) = grid.finite_range() {
        out.push_str(&format!(
            "    {} .. {} {}\n",
            format_value(min, labels.decimals),
            format_value(max, labels.decimals),
            labels.value_label
        ));
    }
    out
}

/// Render a grid to the terminal.
pub fn draw_ascii_heatmap(grid: &MonthHourGrid, labels: &PlotLabels) {
    println!("{}", ascii_heatmap(grid, labels));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ramp_grid() -> MonthHourGrid {
        let mut grid = MonthHourGrid::zeros();
        for (m, row) in grid.values.iter_mut().enumerate() {
            for (h, v) in row.iter_mut().enumerate() {
                *v = (m * HOURS_PER_DAY + h) as f64;
            }
        }
        grid
    }

    fn labels() -> PlotLabels {
        PlotLabels::new("Test", "Energy (kWh/m²)", 2)
    }

    #[test]
    fn test_ramp_endpoints() {
        assert_eq!(ramp_color(0.0), Rgb888::new(48, 18, 59));
        assert_eq!(ramp_color(1.0), Rgb888::new(122, 4, 3));
        assert_eq!(ramp_color(2.0), ramp_color(1.0));
        assert_eq!(ramp_color(f64::NAN), MISSING);
    }

    #[test]
    fn test_heatmap_png_written() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("heat.png");
        let renderer = ImageRenderer::default();
        assert_eq!(renderer.extension(), "png");
        renderer.heatmap(&ramp_grid(), &labels(), &path).unwrap();

        let decoded = image::open(&path).unwrap().to_rgb8();
        let canvas = renderer.heatmap_canvas(&ramp_grid(), &labels());
        let Size { width, height } = canvas.size();
        assert_eq!(decoded.dimensions(), (width, height));
        assert_eq!(
            *decoded.get_pixel(ImageRenderer::LEFT, ImageRenderer::TOP),
            to_rgb(ramp_color(0.0))
        );
        assert_eq!(*decoded.get_pixel(0, height - 1), to_rgb(BACKGROUND));
    }

    #[test]
    fn test_heatmap_cells_use_ramp() {
        let renderer = ImageRenderer::default();
        let canvas = renderer.heatmap_canvas(&ramp_grid(), &labels());
        // Top-left corner pixel of the first cell holds the minimum colour
        let first = canvas.pixel(ImageRenderer::LEFT, ImageRenderer::TOP).unwrap();
        assert_eq!(first, ramp_color(0.0));
        let last = canvas
            .pixel(
                ImageRenderer::LEFT + 23 * renderer.cell_width,
                ImageRenderer::TOP + 11 * renderer.cell_height,
            )
            .unwrap();
        assert_eq!(last, ramp_color(1.0));
    }

    #[test]
    fn test_surface_draws_something() {
        let canvas = ImageRenderer::default().surface_canvas(&ramp_grid(), &labels());
        let background = to_rgb(BACKGROUND);
        let drawn = canvas.image().pixels().filter(|&&c| c != background).count();
        assert!(drawn > 1000, "only {drawn} pixels drawn");
    }

    #[test]
    fn test_surface_png_decodes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("surface.png");
        ImageRenderer::default()
            .surface3d(&ramp_grid(), &labels(), &path)
            .unwrap();
        assert_eq!(image::open(&path).unwrap().to_rgb8().dimensions(), (1000, 640));
    }

    #[test]
    fn test_canvas_clips_outside_points() {
        let mut canvas = Canvas::new(4, 3, BACKGROUND);
        Line::new(Point::new(-5, 1), Point::new(10, 1))
            .into_styled(PrimitiveStyle::with_stroke(INK, 1))
            .draw(&mut canvas)
            .ok();
        assert_eq!(canvas.pixel(0, 1), Some(INK));
        assert_eq!(canvas.pixel(3, 1), Some(INK));
        assert_eq!(canvas.pixel(0, 0), Some(BACKGROUND));
        assert_eq!(canvas.pixel(4, 1), None);
    }

    #[test]
    fn test_surface_html_embeds_grid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("surface.html");
        let mut grid = MonthHourGrid::filled(2.25);
        grid.values[3][7] = f64::NAN;
        let labels = PlotLabels::new("Wind <100 m>", "Energy (kWh/m²)", 2);
        write_surface_html(&grid, &labels, &path).unwrap();

        let page = fs::read_to_string(&path).unwrap();
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<title>Wind &lt;100 m&gt;</title>"));
        assert!(!page.contains("__GRID__") && !page.contains("__TITLE__"));

        let start = page.find("const grid = ").unwrap() + "const grid = ".len();
        let end = start + page[start..].find(";\n").unwrap();
        let doc: serde_json::Value = serde_json::from_str(&page[start..end]).unwrap();
        assert_eq!(doc["values"][0][0], 2.25);
        assert!(doc["values"][3][7].is_null());
        assert_eq!(doc["value_label"], "Energy (kWh/m²)");
    }

    #[test]
    fn test_ascii_heatmap_shading() {
        let text = ascii_heatmap(&ramp_grid(), &labels());
        let jan = text.lines().find(|l| l.starts_with("Jan")).unwrap();
        let dec = text.lines().find(|l| l.starts_with("Dec")).unwrap();
        assert_eq!(jan.chars().nth(4), Some(' '));
        assert_eq!(dec.chars().last(), Some('@'));
        assert!(text.contains("0.00 .. 287.00"));
    }

    #[test]
    fn test_ascii_marks_missing() {
        let mut grid = ramp_grid();
        grid.values[5][5] = f64::NAN;
        let text = ascii_heatmap(&grid, &labels());
        assert!(text.lines().any(|l| l.starts_with("Jun") && l.contains('?')));
    }

    #[test]
    fn test_grid_json_nulls_nan() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("grid.json");
        let mut grid = MonthHourGrid::filled(1.5);
        grid.values[0][0] = f64::NAN;
        write_grid_json(&grid, &labels(), &path).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert!(doc["values"][0][0].is_null());
        assert_eq!(doc["values"][11][23], 1.5);
        assert_eq!(doc["rows"][0], "Jan");
        assert_eq!(doc["columns"][23], "23h");
    }
}
