//! Frame destinations

use crate::render::{RenderError, View};
use std::path::PathBuf;
use tiny_skia::Pixmap;
use tracing::debug;

/// Receives every painted frame, one call per view per tick
pub trait FrameSink: Send + Sync {
    fn present(&self, view: View, frame_no: u64, frame: &Pixmap) -> Result<(), RenderError>;
}

/// Discards frames
pub struct NullSink;

impl FrameSink for NullSink {
    fn present(&self, _view: View, _frame_no: u64, _frame: &Pixmap) -> Result<(), RenderError> {
        Ok(())
    }
}

/// Writes every N-th frame of each view as `<view>-<frame>.png`
pub struct CaptureSink {
    dir: PathBuf,
    every: u64,
}

impl CaptureSink {
    pub fn new(dir: impl Into<PathBuf>, every: u64) -> Self {
        Self {
            dir: dir.into(),
            every: every.max(1),
        }
    }

    pub fn frame_path(&self, view: View, frame_no: u64) -> PathBuf {
        self.dir
            .join(format!("{}-{:06}.png", view.as_str(), frame_no))
    }
}

impl FrameSink for CaptureSink {
    fn present(&self, view: View, frame_no: u64, frame: &Pixmap) -> Result<(), RenderError> {
        if frame_no % self.every != 0 {
            return Ok(());
        }

        let path = self.frame_path(view, frame_no);
        frame
            .save_png(&path)
            .map_err(|e| RenderError::Encode(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Captured frame");
        Ok(())
    }
}
