//! Headless rendering onto tiny-skia pixmaps
//!
//! Each renderer owns exactly one [`Canvas`]; nothing here shares a pixmap.
//!
//! - `canvas`: drawing primitives over a pixmap
//! - `font`: 5x7 bitmap glyphs for labels
//! - `waveform`: streaming time-domain plot
//! - `spectrogram`: streaming HSL heatmap with frequency grid and leak band
//! - `static_view`: one-shot bilinear spectrogram in the RGB gradient
//! - `legend`: color scale for the static view

use thiserror::Error;

mod canvas;
mod font;
pub mod legend;
pub mod spectrogram;
pub mod static_view;
pub mod waveform;

pub use canvas::Canvas;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Cannot allocate a {width}x{height} canvas")]
    Allocation { width: u32, height: u32 },
    #[error("PNG encoding failed: {0}")]
    Encode(String),
}

/// Which canvas a frame was painted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Waveform,
    Spectrogram,
}

impl View {
    pub fn as_str(&self) -> &'static str {
        match self {
            View::Waveform => "waveform",
            View::Spectrogram => "spectrogram",
        }
    }
}

/// Light or dark palette for the static chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn from_dark_mode(dark_mode: bool) -> Self {
        if dark_mode { Theme::Dark } else { Theme::Light }
    }
}
