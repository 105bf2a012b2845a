//! dB color scale shown beside the static spectrogram

use super::{Canvas, RenderError, Theme};
use crate::colormap::{Rgb, map_intensity};

pub const STEPS: usize = 20;
pub const WIDTH: u32 = 72;
const BAR_X: f32 = 10.0;
const BAR_WIDTH: f32 = 20.0;
const MARGIN: f32 = 24.0;
const CAPTION_HEIGHT: u32 = 24;

/// Labels from top (loudest) to bottom
pub const LABELS: [&str; 3] = ["0", "-40", "-80"];

fn background(theme: Theme) -> Rgb {
    match theme {
        Theme::Dark => Rgb(0x1a, 0x1a, 0x1a),
        Theme::Light => Rgb(0xff, 0xff, 0xff),
    }
}

fn ink(theme: Theme) -> Rgb {
    match theme {
        Theme::Dark => Rgb(255, 255, 255),
        Theme::Light => Rgb(0, 0, 0),
    }
}

/// Color of each legend step, coldest first (step `i` samples `i / 19`)
pub fn legend_colors() -> [Rgb; STEPS] {
    std::array::from_fn(|i| map_intensity(i as f64 / (STEPS - 1) as f64))
}

/// Draw the scale: a stacked bar, coldest step at the bottom, with dB labels
pub fn render(height: u32, theme: Theme) -> Result<Canvas, RenderError> {
    let mut canvas = Canvas::new(WIDTH, height)?;
    canvas.clear(background(theme).to_color());

    let bar_top = MARGIN;
    let bar_height = (canvas.height() - 2.0 * MARGIN).max(0.0);
    let step_height = bar_height / STEPS as f32;

    for (i, color) in legend_colors().iter().enumerate() {
        let y = bar_top + bar_height - (i + 1) as f32 * step_height;
        canvas.fill_rect(BAR_X, y, BAR_WIDTH, step_height.ceil(), color.to_color());
    }
    canvas.stroke_rect(BAR_X, bar_top, BAR_WIDTH, bar_height, ink(theme).with_alpha(0.3), 1.0);

    let label = ink(theme).with_alpha(0.8);
    let text_height = Canvas::text_height(1.0);
    canvas.text("dB", BAR_X, (bar_top - text_height) / 2.0, 1.0, label);

    let label_x = BAR_X + BAR_WIDTH + 6.0;
    for (i, text) in LABELS.iter().enumerate() {
        let center = bar_top + bar_height * i as f32 / (LABELS.len() - 1) as f32;
        canvas.text(text, label_x, center - text_height / 2.0, 1.0, label);
    }

    Ok(canvas)
}

/// Place the legend to the right of the spectrogram, with an optional caption
/// strip underneath
pub fn compose(
    spectrogram: &Canvas,
    legend: &Canvas,
    caption: Option<&str>,
    theme: Theme,
) -> Result<Canvas, RenderError> {
    let chart_width = spectrogram.pixmap().width();
    let chart_height = spectrogram.pixmap().height();
    let width = chart_width + legend.pixmap().width();
    let height = chart_height.max(legend.pixmap().height())
        + if caption.is_some() { CAPTION_HEIGHT } else { 0 };

    let mut out = Canvas::new(width, height)?;
    out.clear(background(theme).to_color());
    out.draw_canvas(spectrogram, 0, 0);
    out.draw_canvas(legend, chart_width as i32, 0);

    if let Some(caption) = caption {
        let y = chart_height as f32 + (CAPTION_HEIGHT as f32 - Canvas::text_height(1.0)) / 2.0;
        out.text(caption, 8.0, y, 1.0, ink(theme).with_alpha(0.7));
    }

    Ok(out)
}
