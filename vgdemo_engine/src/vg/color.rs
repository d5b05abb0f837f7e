/// RGBA colors in linear float components

/// Color with components in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Color = Color { r: 0.0, g: 0.0, b: 0.0, a: 0.0 };
    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };
    pub const BLACK: Color = Color { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };

    /// Color from 8-bit components
    pub fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: a as f32 / 255.0,
        }
    }

    /// Opaque color from 8-bit components
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    /// Color from float components
    pub fn rgbaf(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Color from hue, saturation and lightness, all in `0.0..=1.0`
    ///
    /// The hue wraps around, saturation and lightness are clamped.
    pub fn hsla(h: f32, s: f32, l: f32, a: u8) -> Self {
        let mut h = h % 1.0;
        if h < 0.0 {
            h += 1.0;
        }
        let s = s.clamp(0.0, 1.0);
        let l = l.clamp(0.0, 1.0);
        let m2 = if l <= 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let m1 = 2.0 * l - m2;
        Self {
            r: hue(h + 1.0 / 3.0, m1, m2).clamp(0.0, 1.0),
            g: hue(h, m1, m2).clamp(0.0, 1.0),
            b: hue(h - 1.0 / 3.0, m1, m2).clamp(0.0, 1.0),
            a: a as f32 / 255.0,
        }
    }

    /// Opaque color from hue, saturation and lightness
    pub fn hsl(h: f32, s: f32, l: f32) -> Self {
        Self::hsla(h, s, l, 255)
    }

    /// Same color with a new 8-bit alpha
    pub fn with_alpha(self, a: u8) -> Self {
        Self { a: a as f32 / 255.0, ..self }
    }

    /// Linear interpolation towards `other` (`t` clamped to `0.0..=1.0`)
    pub fn lerp(self, other: Color, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let u = 1.0 - t;
        Self {
            r: self.r * u + other.r * t,
            g: self.g * u + other.g * t,
            b: self.b * u + other.b * t,
            a: self.a * u + other.a * t,
        }
    }

    /// Components multiplied by alpha
    pub fn premultiplied(self) -> [f32; 4] {
        [self.r * self.a, self.g * self.a, self.b * self.a, self.a]
    }
}

fn hue(mut h: f32, m1: f32, m2: f32) -> f32 {
    if h < 0.0 {
        h += 1.0;
    }
    if h > 1.0 {
        h -= 1.0;
    }
    if h < 1.0 / 6.0 {
        m1 + (m2 - m1) * h * 6.0
    } else if h < 3.0 / 6.0 {
        m2
    } else if h < 4.0 / 6.0 {
        m1 + (m2 - m1) * (2.0 / 3.0 - h) * 6.0
    } else {
        m1
    }
}
