//! One-shot spectrogram for the analysis view
//!
//! Unlike the streaming heatmap, the matrix here holds raw (dB-like,
//! unbounded) magnitudes. They are normalized against the matrix's own
//! min/max, resampled bilinearly to the output resolution and colored with
//! the four-stop RGB gradient.

use super::{Canvas, RenderError, Theme};
use crate::buffer::{SpectrogramFrame, SpectrogramMatrix};
use crate::colormap::{Rgb, map_intensity, normalize};

pub const PLACEHOLDER: &str = "Computing spectrogram";
const GRID_DIVISIONS: usize = 4;

/// Output resolution and palette
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticStyle {
    pub width: u32,
    pub height: u32,
    pub theme: Theme,
}

impl Default for StaticStyle {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 600,
            theme: Theme::Dark,
        }
    }
}

impl StaticStyle {
    fn background(&self) -> Rgb {
        match self.theme {
            Theme::Dark => Rgb(0x1a, 0x1a, 0x1a),
            Theme::Light => Rgb(0xff, 0xff, 0xff),
        }
    }

    fn ink(&self) -> Rgb {
        match self.theme {
            Theme::Dark => Rgb(255, 255, 255),
            Theme::Light => Rgb(0, 0, 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Painted,
    /// Matrix was empty; only the placeholder message was drawn
    Placeholder,
}

pub struct StaticRender {
    pub canvas: Canvas,
    pub outcome: RenderOutcome,
}

/// Bilinear estimate at fractional (row, col), clamping at the far edges.
///
/// The matrix must be non-empty.
pub fn bilinear(matrix: &SpectrogramMatrix, row: f64, col: f64) -> f64 {
    let last_row = matrix.rows() - 1;
    let last_col = matrix.cols() - 1;

    let r0 = (row.floor().max(0.0) as usize).min(last_row);
    let c0 = (col.floor().max(0.0) as usize).min(last_col);
    let r1 = (r0 + 1).min(last_row);
    let c1 = (c0 + 1).min(last_col);

    let fr = (row - r0 as f64).clamp(0.0, 1.0);
    let fc = (col - c0 as f64).clamp(0.0, 1.0);

    let v00 = matrix.value(r0, c0);
    let v01 = matrix.value(r0, c1);
    let v10 = matrix.value(r1, c0);
    let v11 = matrix.value(r1, c1);

    v00 * (1.0 - fr) * (1.0 - fc) + v01 * (1.0 - fr) * fc + v10 * fr * (1.0 - fc) + v11 * fr * fc
}

/// Render the spectrogram at the style's resolution
pub fn render(frame: &SpectrogramFrame, style: &StaticStyle) -> Result<StaticRender, RenderError> {
    let matrix = &frame.matrix;

    // Must be checked before any interpolation indexing
    if matrix.is_empty() {
        return placeholder(style);
    }
    let Some((min, max)) = matrix.min_max() else {
        return placeholder(style);
    };

    let pixels = rasterize(matrix, min, max, style.width, style.height);
    let mut canvas = Canvas::from_rgba(style.width, style.height, pixels)?;
    draw_grid(&mut canvas, style);

    Ok(StaticRender {
        canvas,
        outcome: RenderOutcome::Painted,
    })
}

/// Caption with the axis extents, e.g. `"0-4000 Hz  window 0.20 s"`
pub fn axis_caption(frame: &SpectrogramFrame) -> Option<String> {
    let (first, last) = (frame.frequencies.first()?, frame.frequencies.last()?);
    let mut caption = format!("{}-{} Hz", first.round(), last.round());
    if let Some(window) = frame.window_seconds() {
        caption.push_str(&format!("  window {:.2} s", window));
    }
    Some(caption)
}

/// Fill an RGBA8 buffer, top row first. Row 0 of the matrix lands at the bottom.
fn rasterize(matrix: &SpectrogramMatrix, min: f64, max: f64, width: u32, height: u32) -> Vec<u8> {
    let (w, h) = (width as f64, height as f64);
    let rows = matrix.rows() as f64;
    let cols = matrix.cols() as f64;

    let mut data = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        let freq_idx = (h - y as f64 - 1.0) / h * rows;
        for x in 0..width {
            let time_idx = x as f64 / w * cols;
            let value = bilinear(matrix, freq_idx, time_idx);
            let Rgb(r, g, b) = map_intensity(normalize(value, min, max));
            data.extend_from_slice(&[r, g, b, 255]);
        }
    }
    data
}

fn draw_grid(canvas: &mut Canvas, style: &StaticStyle) {
    let width = canvas.width();
    let height = canvas.height();
    let color = style.ink().with_alpha(0.1);

    for i in 0..=GRID_DIVISIONS {
        let y = height / GRID_DIVISIONS as f32 * i as f32;
        canvas.line((0.0, y), (width, y), color, 1.0);
    }
    for i in 0..=GRID_DIVISIONS {
        let x = width / GRID_DIVISIONS as f32 * i as f32;
        canvas.line((x, 0.0), (x, height), color, 1.0);
    }
}

fn placeholder(style: &StaticStyle) -> Result<StaticRender, RenderError> {
    let mut canvas = Canvas::new(style.width, style.height)?;
    canvas.clear(style.background().to_color());

    let scale = 2.0;
    let x = (canvas.width() - Canvas::text_width(PLACEHOLDER, scale)) / 2.0;
    let y = (canvas.height() - Canvas::text_height(scale)) / 2.0;
    canvas.text(PLACEHOLDER, x.max(0.0), y, scale, style.ink().with_alpha(0.55));

    Ok(StaticRender {
        canvas,
        outcome: RenderOutcome::Placeholder,
    })
}
