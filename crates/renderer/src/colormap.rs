//! Fixed colour ramps addressed by name.

use serde::Serialize;
use tracing::warn;

/// Color value in RGBA format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(hex: u32) -> Self {
        Self::new((hex >> 16) as u8, (hex >> 8) as u8, hex as u8, 255)
    }

    pub const fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Linear color interpolation, `t` clamped to `[0, 1]`.
pub fn interpolate_color(color1: Color, color2: Color, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    let t_inv = 1.0 - t;
    let mix = |a: u8, b: u8| (a as f32 * t_inv + b as f32 * t).round() as u8;

    Color::new(
        mix(color1.r, color2.r),
        mix(color1.g, color2.g),
        mix(color1.b, color2.b),
        mix(color1.a, color2.a),
    )
}

/// Number of stops in every ramp.
pub const STOP_COUNT: usize = 10;

/// A named ramp of evenly spaced colour stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Colormap {
    pub name: &'static str,
    pub stops: [Color; STOP_COUNT],
}

/// Perceptually ordered blue → green → yellow ramp.
pub const VIRIDIS: Colormap = Colormap {
    name: "viridis",
    stops: [
        Color::opaque(0x440154),
        Color::opaque(0x482878),
        Color::opaque(0x3E4989),
        Color::opaque(0x31688E),
        Color::opaque(0x26828E),
        Color::opaque(0x1F9E89),
        Color::opaque(0x35B779),
        Color::opaque(0x6DCD59),
        Color::opaque(0xB4DE2C),
        Color::opaque(0xFDE725),
    ],
};

const COLORMAPS: &[Colormap] = &[VIRIDIS];

impl Colormap {
    /// Look up a ramp by name (case-insensitive).
    pub fn by_name(name: &str) -> Option<&'static Colormap> {
        COLORMAPS.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Look up a ramp by name, falling back to viridis.
    pub fn resolve(name: &str) -> &'static Colormap {
        Self::by_name(name).unwrap_or_else(|| {
            warn!(colormap = %name, "unknown colormap, using viridis");
            &VIRIDIS
        })
    }

    /// Names of all available ramps.
    pub fn names() -> impl Iterator<Item = &'static str> {
        COLORMAPS.iter().map(|c| c.name)
    }

    /// Colour at normalized position `t` in `[0, 1]`, interpolated between
    /// the two nearest stops.
    pub fn color_at(&self, t: f32) -> Color {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let position = t * (STOP_COUNT - 1) as f32;
        let segment = (position.floor() as usize).min(STOP_COUNT - 2);
        interpolate_color(
            self.stops[segment],
            self.stops[segment + 1],
            position - segment as f32,
        )
    }
}
