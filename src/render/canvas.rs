//! Drawing primitives over a tiny-skia pixmap

use super::RenderError;
use super::font;
use std::path::Path;
use tiny_skia::{
    Color, FillRule, IntSize, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Rect, Stroke,
    Transform,
};

/// A fixed-size, exclusively owned drawing surface
pub struct Canvas {
    pixmap: Pixmap,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        let pixmap = Pixmap::new(width, height).ok_or(RenderError::Allocation { width, height })?;
        Ok(Self { pixmap })
    }

    /// Wrap an RGBA8 buffer (opaque pixels, so premultiplied == straight)
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self, RenderError> {
        let size = IntSize::from_wh(width, height).ok_or(RenderError::Allocation { width, height })?;
        let pixmap = Pixmap::from_vec(data, size).ok_or(RenderError::Allocation { width, height })?;
        Ok(Self { pixmap })
    }

    pub fn width(&self) -> f32 {
        self.pixmap.width() as f32
    }

    pub fn height(&self) -> f32 {
        self.pixmap.height() as f32
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn clear(&mut self, color: Color) {
        self.pixmap.fill(color);
    }

    pub fn line(&mut self, from: (f32, f32), to: (f32, f32), color: Color, width: f32) {
        self.polyline(&[from, to], color, width);
    }

    pub fn polyline(&mut self, points: &[(f32, f32)], color: Color, width: f32) {
        let Some(path) = build_polyline(points) else {
            return;
        };

        let paint = solid_paint(color, true);
        let stroke = Stroke {
            width,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };
        self.pixmap
            .stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }

    /// Polyline with a soft halo, approximating a canvas shadow blur.
    ///
    /// The halo is a stack of progressively narrower, more opaque strokes
    /// under the core line.
    pub fn glow_polyline(&mut self, points: &[(f32, f32)], color: Color, width: f32, blur: f32) {
        let layers = 5;
        for i in (1..=layers).rev() {
            let spread = blur * i as f32 / layers as f32;
            let alpha = 0.06 + 0.04 * (layers - i) as f32;
            let mut halo = color;
            halo.set_alpha(alpha);
            self.polyline(points, halo, width + spread);
        }
        self.polyline(points, color, width);
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color) {
        let Some(rect) = Rect::from_xywh(x, y, width, height) else {
            return;
        };
        let paint = solid_paint(color, false);
        self.pixmap.fill_rect(rect, &paint, Transform::identity(), None);
    }

    pub fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color, line: f32) {
        let Some(rect) = Rect::from_xywh(x, y, width, height) else {
            return;
        };
        let path = PathBuilder::from_rect(rect);
        let paint = solid_paint(color, true);
        let stroke = Stroke {
            width: line,
            ..Stroke::default()
        };
        self.pixmap
            .stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }

    /// Draw `text` with its top-left corner at (x, y)
    pub fn text(&mut self, text: &str, x: f32, y: f32, scale: f32, color: Color) {
        let mut pb = PathBuilder::new();
        for (dx, dy) in font::lit_pixels(text, scale) {
            if let Some(rect) = Rect::from_xywh(x + dx, y + dy, scale, scale) {
                pb.push_rect(rect);
            }
        }
        let Some(path) = pb.finish() else {
            return;
        };

        // Sharp pixels for text
        let paint = solid_paint(color, false);
        self.pixmap
            .fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    }

    pub fn text_height(scale: f32) -> f32 {
        font::GLYPH_HEIGHT * scale
    }

    pub fn text_width(text: &str, scale: f32) -> f32 {
        font::text_width(text, scale)
    }

    /// Copy another canvas onto this one at (x, y)
    pub fn draw_canvas(&mut self, other: &Canvas, x: i32, y: i32) {
        self.pixmap.draw_pixmap(
            x,
            y,
            other.pixmap.as_ref(),
            &tiny_skia::PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), RenderError> {
        self.pixmap
            .save_png(path)
            .map_err(|e| RenderError::Encode(e.to_string()))
    }

    /// RGBA of the pixel at (x, y), demultiplied
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let px = self.pixmap.pixel(x, y)?.demultiply();
        Some([px.red(), px.green(), px.blue(), px.alpha()])
    }
}

fn solid_paint(color: Color, anti_alias: bool) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = anti_alias;
    paint
}

fn build_polyline(points: &[(f32, f32)]) -> Option<tiny_skia::Path> {
    let (&(x0, y0), rest) = points.split_first()?;
    if rest.is_empty() {
        return None;
    }

    let mut pb = PathBuilder::new();
    pb.move_to(x0, y0);
    for &(x, y) in rest {
        pb.line_to(x, y);
    }
    pb.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sized_canvas_is_an_error() {
        assert!(matches!(
            Canvas::new(0, 10),
            Err(RenderError::Allocation { width: 0, height: 10 })
        ));
    }

    #[test]
    fn test_clear_and_fill_rect() {
        let mut canvas = Canvas::new(10, 10).unwrap();
        canvas.clear(Color::from_rgba8(15, 20, 25, 255));
        assert_eq!(canvas.pixel(5, 5), Some([15, 20, 25, 255]));

        canvas.fill_rect(0.0, 0.0, 5.0, 5.0, Color::from_rgba8(255, 0, 0, 255));
        assert_eq!(canvas.pixel(2, 2), Some([255, 0, 0, 255]));
        assert_eq!(canvas.pixel(7, 7), Some([15, 20, 25, 255]));
    }

    #[test]
    fn test_text_touches_pixels() {
        let mut canvas = Canvas::new(40, 20).unwrap();
        canvas.clear(Color::BLACK);
        canvas.text("I", 2.0, 2.0, 2.0, Color::WHITE);
        // Top bar of the I spans the first row of the glyph
        assert_eq!(canvas.pixel(3, 3), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_from_rgba_rejects_short_buffer() {
        assert!(Canvas::from_rgba(4, 4, vec![0; 10]).is_err());
        assert!(Canvas::from_rgba(2, 1, vec![255; 8]).is_ok());
    }
}
