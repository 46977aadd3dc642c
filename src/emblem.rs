//! Centre emblem of the circle visualizer.
//!
//! Two frames (open and blinking), each kept at full and reduced resolution;
//! narrow surfaces draw the reduced copy.

use crate::error::{Error, Result};
use image::imageops::FilterType;
use image::{Rgba, RgbaImage};
use std::path::Path;
use tracing::debug;

/// Edge length of the generated emblem.
const PROCEDURAL_SIZE: u32 = 96;
/// Images are downscaled to at most this edge on load.
const MAX_EMBLEM_SIZE: u32 = 256;

const SCLERA: Rgba<u8> = Rgba([240, 240, 240, 255]);
const IRIS: Rgba<u8> = Rgba([64, 156, 160, 255]);
const PUPIL: Rgba<u8> = Rgba([20, 20, 24, 255]);
const LID: Rgba<u8> = Rgba([240, 240, 240, 255]);

#[derive(Debug, Clone)]
pub struct Emblem {
    open: RgbaImage,
    blink: RgbaImage,
    open_small: RgbaImage,
    blink_small: RgbaImage,
}

impl Default for Emblem {
    fn default() -> Self {
        Self::procedural()
    }
}

impl Emblem {
    pub fn from_frames(open: RgbaImage, blink: RgbaImage) -> Self {
        let open_small = half_size(&open);
        let blink_small = half_size(&blink);
        Self { open, blink, open_small, blink_small }
    }

    /// Generated eye, open and shut.
    pub fn procedural() -> Self {
        Self::from_frames(
            draw_eye(PROCEDURAL_SIZE, false),
            draw_eye(PROCEDURAL_SIZE, true),
        )
    }

    /// Load emblem images. Without a blink image the open one is reused.
    pub fn load(open: &Path, blink: Option<&Path>) -> Result<Self> {
        let open_img = load_rgba(open)?;
        let blink_img = match blink {
            Some(path) => load_rgba(path)?,
            None => open_img.clone(),
        };
        debug!(path = %open.display(), w = open_img.width(), h = open_img.height(), "emblem loaded");
        Ok(Self::from_frames(open_img, blink_img))
    }

    pub fn frame(&self, blinking: bool, small: bool) -> &RgbaImage {
        match (blinking, small) {
            (false, false) => &self.open,
            (true, false) => &self.blink,
            (false, true) => &self.open_small,
            (true, true) => &self.blink_small,
        }
    }
}

fn load_rgba(path: &Path) -> Result<RgbaImage> {
    let img = image::open(path).map_err(|source| Error::Image {
        path: path.display().to_string(),
        source,
    })?;
    let img = if img.width() > MAX_EMBLEM_SIZE || img.height() > MAX_EMBLEM_SIZE {
        img.resize(MAX_EMBLEM_SIZE, MAX_EMBLEM_SIZE, FilterType::Triangle)
    } else {
        img
    };
    Ok(img.to_rgba8())
}

fn half_size(img: &RgbaImage) -> RgbaImage {
    let w = (img.width() / 2).max(1);
    let h = (img.height() / 2).max(1);
    image::imageops::resize(img, w, h, FilterType::Triangle)
}

/// Almond eye inside a transparent square.
fn draw_eye(size: u32, closed: bool) -> RgbaImage {
    let mut img = RgbaImage::new(size, size);
    let c = size as f64 / 2.0;
    let half_w = size as f64 * 0.48;
    let half_h = size as f64 * 0.28;
    let iris_r = half_h * 0.85;
    let pupil_r = iris_r * 0.45;
    let lid_thickness = (size as f64 * 0.04).max(1.0);

    for (x, y, px) in img.enumerate_pixels_mut() {
        let dx = x as f64 + 0.5 - c;
        let dy = y as f64 + 0.5 - c;
        let nx = dx / half_w;
        if nx.abs() >= 1.0 {
            continue;
        }
        // Lids are parabolas meeting at the corners.
        let lid = half_h * (1.0 - nx * nx);

        if closed {
            let curve = lid * 0.35;
            if (dy - curve).abs() <= lid_thickness {
                *px = LID;
            }
            continue;
        }

        if dy.abs() > lid {
            continue;
        }
        let r = (dx * dx + dy * dy).sqrt();
        *px = if r <= pupil_r {
            PUPIL
        } else if r <= iris_r {
            IRIS
        } else {
            SCLERA
        };
    }
    img
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opaque(img: &RgbaImage) -> usize {
        img.pixels().filter(|p| p.0[3] > 0).count()
    }

    #[test]
    fn procedural_frames() {
        let e = Emblem::procedural();
        let open = e.frame(false, false);
        let shut = e.frame(true, false);
        assert_eq!(open.dimensions(), (PROCEDURAL_SIZE, PROCEDURAL_SIZE));
        assert_eq!(*open.get_pixel(PROCEDURAL_SIZE / 2, PROCEDURAL_SIZE / 2), PUPIL);
        assert!(opaque(shut) < opaque(open) / 2);
        assert_eq!(e.frame(false, true).width(), PROCEDURAL_SIZE / 2);
    }

    #[test]
    fn missing_file_is_an_image_error() {
        let err = Emblem::load(Path::new("/nonexistent/emblem.png"), None).unwrap_err();
        assert!(matches!(err, Error::Image { .. }));
    }
}
