//! Streaming time-domain plot

use super::Canvas;
use crate::buffer::SampleBuffer;
use crate::colormap::Rgb;
use tiny_skia::Color;

pub const BACKGROUND: Rgb = Rgb(0x0f, 0x14, 0x19);
pub const SIGNAL: Rgb = Rgb(0x00, 0xff, 0x88);
const GRID: Rgb = Rgb(100, 150, 200);
const LABEL: Rgb = Rgb(255, 255, 255);

/// Fraction of the canvas height a full-scale value reaches above or below center
pub const AMPLITUDE_FRACTION: f32 = 0.35;
const HORIZONTAL_DIVISIONS: usize = 4;
const VERTICAL_DIVISIONS: usize = 10;
const GLOW_BLUR: f32 = 10.0;
const LABEL_SCALE: f32 = 1.0;

/// Map the buffer onto canvas coordinates.
///
/// x follows the sample positions when they span a range, otherwise the
/// points are spread evenly. y is centered and scaled by the largest absolute
/// value, so that value lands exactly `AMPLITUDE_FRACTION * height * amplitude`
/// from the center line. Long buffers are decimated to roughly one point per
/// pixel column. If the trace stops short of the right edge it is held flat
/// to the edge.
pub fn polyline(buffer: &SampleBuffer, width: f32, height: f32, amplitude: f32) -> Vec<(f32, f32)> {
    let center_y = height / 2.0;
    let len = buffer.samples.len().min(buffer.values.len());
    if len == 0 {
        return Vec::new();
    }

    let samples = &buffer.samples[..len];
    let values = &buffer.values[..len];

    let (min_sample, max_sample) = samples
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &s| (lo.min(s), hi.max(s)));
    let sample_range = max_sample - min_sample;
    let max_abs = values.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));

    let step = ((len as f32 / width).floor() as usize).max(1);
    let amplitude = amplitude.clamp(0.0, 1.0);

    let mut points = Vec::with_capacity(len / step + 2);
    for i in (0..len).step_by(step) {
        let x = if sample_range > 0.0 {
            ((samples[i] - min_sample) / sample_range) as f32 * width
        } else if len > 1 {
            i as f32 / (len - 1) as f32 * width
        } else {
            0.0
        };

        let scaled = if max_abs > 0.0 {
            (values[i] / max_abs) as f32 * amplitude
        } else {
            0.0
        };
        let y = center_y - scaled.clamp(-1.0, 1.0) * (height * AMPLITUDE_FRACTION);

        points.push((x, y));
    }

    if let Some(&(last_x, last_y)) = points.last() {
        if last_x < width {
            points.push((width, last_y));
        }
    }

    points
}

/// Paint one frame: background, grid, center axis, glowing trace, labels,
/// amplitude indicator
pub fn draw(canvas: &mut Canvas, buffer: &SampleBuffer, amplitude: f32) {
    let width = canvas.width();
    let height = canvas.height();
    let center_y = height / 2.0;

    canvas.clear(BACKGROUND.to_color());
    draw_grid(canvas);

    canvas.line((0.0, center_y), (width, center_y), GRID.with_alpha(0.3), 2.0);

    let points = polyline(buffer, width, height, amplitude);
    canvas.glow_polyline(&points, SIGNAL.to_color(), 2.0, GLOW_BLUR);

    let label = LABEL.with_alpha(0.7);
    let text_height = Canvas::text_height(LABEL_SCALE);
    canvas.text("Amplitude", 10.0, 20.0 - text_height, LABEL_SCALE, label);
    canvas.text("Acoustic signal", 10.0, height - 10.0 - text_height, LABEL_SCALE, label);

    draw_amplitude_indicator(canvas, amplitude);
}

fn draw_grid(canvas: &mut Canvas) {
    let width = canvas.width();
    let height = canvas.height();
    let color = GRID.with_alpha(0.1);

    for i in 0..=HORIZONTAL_DIVISIONS {
        let y = height / HORIZONTAL_DIVISIONS as f32 * i as f32;
        canvas.line((0.0, y), (width, y), color, 1.0);
    }
    for i in 0..=VERTICAL_DIVISIONS {
        let x = width / VERTICAL_DIVISIONS as f32 * i as f32;
        canvas.line((x, 0.0), (x, height), color, 1.0);
    }
}

fn draw_amplitude_indicator(canvas: &mut Canvas, amplitude: f32) {
    let width = canvas.width();
    let height = canvas.height();
    let track_height = (height - 20.0).max(0.0);

    canvas.fill_rect(width - 30.0, 10.0, 20.0, track_height, Color::from_rgba8(255, 255, 255, 26));

    let level = track_height * amplitude.clamp(0.0, 1.0);
    canvas.fill_rect(width - 30.0, height - 10.0 - level, 20.0, level, SIGNAL.to_color());
}
