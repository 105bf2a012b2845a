//! Intensity color mapping
//!
//! Two schemes are in use and they must not be swapped:
//!
//! - [`map_intensity`]: four-stop RGB gradient (dark blue, cyan, green,
//!   yellow) for the static spectrogram and its legend. Input is normalized
//!   against the matrix's own min/max.
//! - [`stream_color`]: linear HSL ramp for the streaming spectrogram, whose
//!   cells arrive pre-scaled to 0..=255.

/// 8-bit RGB triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const fn r(self) -> u8 {
        self.0
    }

    pub const fn g(self) -> u8 {
        self.1
    }

    pub const fn b(self) -> u8 {
        self.2
    }

    pub fn to_color(self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.r(), self.g(), self.b(), 255)
    }

    pub fn with_alpha(self, alpha: f32) -> tiny_skia::Color {
        let mut color = self.to_color();
        color.set_alpha(alpha.clamp(0.0, 1.0));
        color
    }
}

/// One linear segment of the gradient. A value in `(start, end]` maps to
/// `from + (to - from) * local`, with `local = (t - start) / (end - start)`.
#[derive(Debug, Clone, Copy)]
pub struct ColorStop {
    pub start: f64,
    pub end: f64,
    pub from: Rgb,
    pub to: Rgb,
}

/// Cold to warm, lowest segment first
pub const COLOR_STOPS: [ColorStop; 4] = [
    ColorStop {
        start: 0.0,
        end: 0.25,
        from: Rgb(0, 0, 100),
        to: Rgb(0, 100, 200),
    },
    ColorStop {
        start: 0.25,
        end: 0.5,
        from: Rgb(0, 200, 255),
        to: Rgb(0, 255, 200),
    },
    ColorStop {
        start: 0.5,
        end: 0.75,
        from: Rgb(255, 255, 50),
        to: Rgb(0, 255, 150),
    },
    ColorStop {
        start: 0.75,
        end: 1.0,
        from: Rgb(255, 255, 50),
        to: Rgb(255, 255, 0),
    },
];

/// Map a normalized intensity in [0, 1] to the RGB gradient.
///
/// Out-of-range input is clamped and NaN is treated as 0, so this is total.
/// The first segment is closed at 0; every other segment is open at its start.
pub fn map_intensity(t: f64) -> Rgb {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };

    let stop = COLOR_STOPS
        .iter()
        .rev()
        .find(|stop| t > stop.start)
        .unwrap_or(&COLOR_STOPS[0]);

    let local = (t - stop.start) / (stop.end - stop.start);
    Rgb(
        lerp_u8(stop.from.0, stop.to.0, local),
        lerp_u8(stop.from.1, stop.to.1, local),
        lerp_u8(stop.from.2, stop.to.2, local),
    )
}

/// Linear rescale of `value` into [0, 1] against `(min, max)`.
///
/// A constant signal (`max == min`) normalizes to 0 everywhere.
pub fn normalize(value: f64, min: f64, max: f64) -> f64 {
    let range = max - min;
    if range > 0.0 {
        ((value - min) / range).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Streaming spectrogram color for a pre-scaled cell value in 0..=255.
///
/// Hue falls 220° → 0° and lightness rises 15% → 80% with intensity,
/// at a fixed 85% saturation.
pub fn stream_color(cell: f64) -> Rgb {
    let intensity = if cell.is_nan() {
        0.0
    } else {
        (cell / 255.0).clamp(0.0, 1.0)
    };
    let hue = 220.0 - intensity * 220.0;
    let lightness = 0.15 + intensity * 0.65;
    hsl_to_rgb(hue, 0.85, lightness)
}

/// CSS-style HSL to RGB. `hue` in degrees, saturation and lightness in [0, 1].
pub fn hsl_to_rgb(hue: f64, saturation: f64, lightness: f64) -> Rgb {
    let h = hue.rem_euclid(360.0) / 360.0;
    let s = saturation.clamp(0.0, 1.0);
    let l = lightness.clamp(0.0, 1.0);

    if s == 0.0 {
        let v = to_u8(l);
        return Rgb(v, v, v);
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;

    Rgb(
        to_u8(hue_channel(p, q, h + 1.0 / 3.0)),
        to_u8(hue_channel(p, q, h)),
        to_u8(hue_channel(p, q, h - 1.0 / 3.0)),
    )
}

fn hue_channel(p: f64, q: f64, t: f64) -> f64 {
    let t = t.rem_euclid(1.0);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

fn lerp_u8(a: u8, b: u8, t: f64) -> u8 {
    (a as f64 + (b as f64 - a as f64) * t).round().clamp(0.0, 255.0) as u8
}

fn to_u8(unit: f64) -> u8 {
    (unit * 255.0).round().clamp(0.0, 255.0) as u8
}
