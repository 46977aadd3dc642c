//! Colour conversions shared by the bar visualizer, the particle layer and
//! the progress bar.

use crossterm::style::Color;
use std::fmt;
use std::str::FromStr;

/// Hue span used by [`hue_rotate`]; bars sweep most of the wheel but stop
/// short of wrapping back to red.
const HUE_SPAN: f64 = 0.85;

/// An 8-bit RGB triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const BACKGROUND: Rgb = Rgb::new(0x34, 0x3a, 0x40);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Format as `#RRGGBB`.
    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({},{},{})", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = ParseRgbError;

    /// Parse `#RRGGBB` (leading `#` optional).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParseRgbError(s.to_string()));
        }
        let value = u32::from_str_radix(hex, 16).map_err(|_| ParseRgbError(s.to_string()))?;
        Ok(Rgb::new((value >> 16) as u8, (value >> 8) as u8, value as u8))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRgbError(pub String);

impl fmt::Display for ParseRgbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid hex colour: {:?}", self.0)
    }
}

impl std::error::Error for ParseRgbError {}

impl From<Rgb> for Color {
    fn from(c: Rgb) -> Self {
        Color::Rgb { r: c.r, g: c.g, b: c.b }
    }
}

fn channel(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// HSV to RGB, all components in `[0, 1]`.
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> Rgb {
    let i = (h * 6.0).floor();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);
    let (r, g, b) = match (i as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    Rgb::new(channel(r), channel(g), channel(b))
}

/// Rainbow colour for a bar position.
///
/// `position` is roughly a bin index in `0..100`; the hue is
/// `position / 100 * 0.85` so the sweep covers 0°–306°.
pub fn hue_rotate(position: f64, saturation: f64) -> Rgb {
    hsv_to_rgb(position / 100.0 * HUE_SPAN, saturation.clamp(0.0, 1.0), 1.0)
}

/// HSL to RGB, components clamped to `[0, 1]`.
pub fn hsl_to_rgb(h: f64, s: f64, l: f64) -> Rgb {
    let (h, s, l) = (h.clamp(0.0, 1.0), s.clamp(0.0, 1.0), l.clamp(0.0, 1.0));

    if s == 0.0 {
        let c = channel(l);
        return Rgb::new(c, c, c);
    }

    fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
        if t < 0.0 {
            t += 1.0;
        }
        if t > 1.0 {
            t -= 1.0;
        }
        if t < 1.0 / 6.0 {
            return p + (q - p) * 6.0 * t;
        }
        if t < 0.5 {
            return q;
        }
        if t < 2.0 / 3.0 {
            return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
        }
        p
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    Rgb::new(
        channel(hue_to_rgb(p, q, h + 1.0 / 3.0)),
        channel(hue_to_rgb(p, q, h)),
        channel(hue_to_rgb(p, q, h - 1.0 / 3.0)),
    )
}

/// RGB to HSL, each component in `[0, 1]`.
pub fn rgb_to_hsl(c: Rgb) -> (f64, f64, f64) {
    let r = c.r as f64 / 255.0;
    let g = c.g as f64 / 255.0;
    let b = c.b as f64 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if max == min {
        return (0.0, 0.0, l); // achromatic
    }

    let d = max - min;
    let s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };
    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    (h / 6.0, s, l)
}

/// Colour from the low three bytes of a numeric id.
pub fn color_from_id(id: u64) -> Rgb {
    Rgb::new(id as u8, (id >> 8) as u8, (id >> 16) as u8)
}

/// Colour for an opaque player identifier.
///
/// Decimal ids map through [`color_from_id`]. Other strings with at least six
/// hex digits (UUID-like) use them as `RRGGBB`; the rest fall back to an
/// FNV-1a hash of the text.
pub fn color_from_identifier(id: &str) -> Rgb {
    if let Ok(n) = id.parse::<u64>() {
        return color_from_id(n);
    }
    let hex: String = id.chars().filter(|&c| c != '-').take(6).collect();
    if hex.len() == 6 {
        if let Ok(c) = hex.parse::<Rgb>() {
            return c;
        }
    }
    color_from_id(fnv1a(id.as_bytes()))
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}
