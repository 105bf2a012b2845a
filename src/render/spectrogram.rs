//! Streaming spectrogram heatmap
//!
//! Cells arrive pre-scaled to 0..=255 and are colored with the HSL ramp,
//! row 0 (lowest frequency) at the bottom. Reference lines mark whole kHz and
//! the 1-4 kHz leak band is outlined.

use super::Canvas;
use crate::buffer::SpectrogramFrame;
use crate::colormap::{Rgb, stream_color};

pub const BACKGROUND: Rgb = Rgb(0x10, 0x14, 0x28);
const GRID: Rgb = Rgb(255, 255, 255);
const CRITICAL: Rgb = Rgb(211, 47, 47);

/// Frequencies (Hz) that get a reference line and label
pub const GRID_FREQUENCIES: [f64; 5] = [0.0, 1000.0, 2000.0, 3000.0, 4000.0];

/// Frequency band (Hz) characteristic of a leak signature
pub const CRITICAL_BAND: (f64, f64) = (1000.0, 4000.0);

pub const PLACEHOLDER: &str = "Waiting for spectrogram data";

const LABEL_SCALE: f32 = 1.0;

/// Vertical position of a gridline for `freq`, given the axis range.
///
/// Falls back to even spacing (`index / 4`) when the range is degenerate.
pub fn gridline_y(freq: f64, index: usize, freq_min: f64, freq_max: f64, height: f32) -> f32 {
    let ratio = if freq_max > freq_min {
        (freq - freq_min) / (freq_max - freq_min)
    } else {
        index as f64 / (GRID_FREQUENCIES.len() - 1) as f64
    };
    height - ratio as f32 * height
}

/// (top y, height) of the leak-band outline, clipped to the axis range.
///
/// None when the axis does not reach the band or has no positive extent.
pub fn critical_band_span(freq_min: f64, freq_max: f64, height: f32) -> Option<(f32, f32)> {
    if freq_max <= 0.0 || freq_max <= freq_min {
        return None;
    }

    let low = CRITICAL_BAND.0.clamp(freq_min.max(0.0), freq_max);
    let high = CRITICAL_BAND.1.clamp(freq_min.max(0.0), freq_max);
    if high <= low {
        return None;
    }

    let range = freq_max - freq_min;
    let start_ratio = ((low - freq_min) / range) as f32;
    let end_ratio = ((high - freq_min) / range) as f32;
    Some((height - end_ratio * height, (end_ratio - start_ratio) * height))
}

fn grid_label(freq: f64) -> String {
    format!("{} kHz", freq / 1000.0)
}

/// Paint one frame. Returns false when only the placeholder was drawn.
pub fn draw(canvas: &mut Canvas, frame: &SpectrogramFrame) -> bool {
    let width = canvas.width();
    let height = canvas.height();

    canvas.clear(BACKGROUND.to_color());

    let matrix = &frame.matrix;
    if matrix.is_empty() {
        let y = height / 2.0 - Canvas::text_height(2.0);
        canvas.text(PLACEHOLDER, 20.0, y, 2.0, GRID.with_alpha(0.6));
        return false;
    }

    let rows = matrix.rows();
    let cols = matrix.cols();
    let cell_width = width / cols as f32;
    let cell_height = height / rows as f32;

    for r in 0..rows {
        let y = height - (r + 1) as f32 * cell_height;
        for (c, &cell) in matrix.row(r).iter().enumerate() {
            // 1px overlap hides seams between neighbouring cells
            canvas.fill_rect(
                c as f32 * cell_width,
                y,
                cell_width + 1.0,
                cell_height + 1.0,
                stream_color(cell).to_color(),
            );
        }
    }

    let (freq_min, freq_max) = frame.frequency_range();

    let line_color = GRID.with_alpha(0.08);
    for (i, &freq) in GRID_FREQUENCIES.iter().enumerate() {
        let y = gridline_y(freq, i, freq_min, freq_max, height);
        canvas.line((0.0, y), (width, y), line_color, 1.0);
    }

    let label_color = GRID.with_alpha(0.7);
    let text_height = Canvas::text_height(LABEL_SCALE);
    for (i, &freq) in GRID_FREQUENCIES.iter().enumerate() {
        let baseline = gridline_y(freq, i, freq_min, freq_max, height) - 6.0;
        let baseline = baseline.min(height - 6.0).max(12.0);
        canvas.text(&grid_label(freq), 8.0, baseline - text_height, LABEL_SCALE, label_color);
    }

    if let Some((top, span)) = critical_band_span(freq_min, freq_max, height) {
        canvas.stroke_rect(0.0, top, width, span, CRITICAL.with_alpha(0.6), 2.0);
    }

    true
}
