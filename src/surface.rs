//! Drawing surface abstraction.
//!
//! Coordinates are virtual pixels; a surface reports its current size every
//! frame and renderers re-query it instead of caching dimensions.

use crate::colors::Rgb;
use image::RgbaImage;

/// Canvas-style drawing primitives.
pub trait DrawSurface {
    /// Current size in virtual pixels.
    fn size(&self) -> (f64, f64);
    fn clear(&mut self);
    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Rgb);
    fn draw_image(&mut self, image: &RgbaImage, x: f64, y: f64, w: f64, h: f64);
    fn begin_path(&mut self);
    fn move_to(&mut self, x: f64, y: f64);
    fn quadratic_curve_to(&mut self, cx: f64, cy: f64, x: f64, y: f64);
    fn stroke(&mut self, color: Rgb, line_width: f64);
    /// Push the current transform.
    fn save(&mut self);
    fn translate(&mut self, dx: f64, dy: f64);
    /// Pop back to the last saved transform.
    fn restore(&mut self);
}

/// Translation stack backing `save`/`translate`/`restore`.
#[derive(Debug, Clone, Default)]
pub struct TransformStack {
    current: (f64, f64),
    saved: Vec<(f64, f64)>,
}

impl TransformStack {
    pub fn save(&mut self) {
        self.saved.push(self.current);
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.current.0 += dx;
        self.current.1 += dy;
    }

    /// Unbalanced restores are ignored.
    pub fn restore(&mut self) {
        if let Some(prev) = self.saved.pop() {
            self.current = prev;
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (x + self.current.0, y + self.current.1)
    }

    pub fn depth(&self) -> usize {
        self.saved.len()
    }
}

/// Polyline path built from `move_to` and `quadratic_curve_to`.
#[derive(Debug, Clone, Default)]
pub struct Path {
    subpaths: Vec<Vec<(f64, f64)>>,
}

/// Segments per quadratic curve when flattening.
const CURVE_STEPS: usize = 8;

impl Path {
    pub fn clear(&mut self) {
        self.subpaths.clear();
    }

    pub fn move_to(&mut self, p: (f64, f64)) {
        self.subpaths.push(vec![p]);
    }

    /// Flatten a quadratic Bézier from the current point.
    ///
    /// Without a current point the control point is used as the start.
    pub fn quadratic_to(&mut self, c: (f64, f64), p: (f64, f64)) {
        if self.subpaths.is_empty() {
            self.subpaths.push(vec![c]);
        }
        let Some(sub) = self.subpaths.last_mut() else { return };
        let start = sub.last().copied().unwrap_or(c);
        for step in 1..=CURVE_STEPS {
            let t = step as f64 / CURVE_STEPS as f64;
            let mt = 1.0 - t;
            let x = mt * mt * start.0 + 2.0 * mt * t * c.0 + t * t * p.0;
            let y = mt * mt * start.1 + 2.0 * mt * t * c.1 + t * t * p.1;
            sub.push((x, y));
        }
    }

    /// Line segments of every subpath.
    pub fn segments(&self) -> impl Iterator<Item = ((f64, f64), (f64, f64))> + '_ {
        self.subpaths
            .iter()
            .flat_map(|sub| sub.windows(2).map(|w| (w[0], w[1])))
    }
}

/// A recorded draw call, in surface coordinates after translation.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Clear,
    FillRect { x: f64, y: f64, w: f64, h: f64, color: Rgb },
    Image { x: f64, y: f64, w: f64, h: f64, width_px: u32 },
    Stroke { segments: usize, color: Rgb },
    Save,
    Translate { dx: f64, dy: f64 },
    Restore,
}

/// Surface that records calls instead of drawing; handy for headless runs.
#[derive(Debug, Clone)]
pub struct Recorder {
    pub width: f64,
    pub height: f64,
    pub ops: Vec<DrawOp>,
    transform: TransformStack,
    path: Path,
}

impl Recorder {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
            transform: TransformStack::default(),
            path: Path::default(),
        }
    }

    pub fn take_ops(&mut self) -> Vec<DrawOp> {
        std::mem::take(&mut self.ops)
    }

    /// Depth of unmatched `save` calls.
    pub fn save_depth(&self) -> usize {
        self.transform.depth()
    }
}

impl DrawSurface for Recorder {
    fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    fn clear(&mut self) {
        self.ops.push(DrawOp::Clear);
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Rgb) {
        let (x, y) = self.transform.apply(x, y);
        self.ops.push(DrawOp::FillRect { x, y, w, h, color });
    }

    fn draw_image(&mut self, image: &RgbaImage, x: f64, y: f64, w: f64, h: f64) {
        let (x, y) = self.transform.apply(x, y);
        self.ops.push(DrawOp::Image { x, y, w, h, width_px: image.width() });
    }

    fn begin_path(&mut self) {
        self.path.clear();
    }

    fn move_to(&mut self, x: f64, y: f64) {
        let p = self.transform.apply(x, y);
        self.path.move_to(p);
    }

    fn quadratic_curve_to(&mut self, cx: f64, cy: f64, x: f64, y: f64) {
        let c = self.transform.apply(cx, cy);
        let p = self.transform.apply(x, y);
        self.path.quadratic_to(c, p);
    }

    fn stroke(&mut self, color: Rgb, _line_width: f64) {
        let segments = self.path.segments().count();
        self.ops.push(DrawOp::Stroke { segments, color });
    }

    fn save(&mut self) {
        self.transform.save();
        self.ops.push(DrawOp::Save);
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.transform.translate(dx, dy);
        self.ops.push(DrawOp::Translate { dx, dy });
    }

    fn restore(&mut self) {
        self.transform.restore();
        self.ops.push(DrawOp::Restore);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_stack_scopes_translation() {
        let mut t = TransformStack::default();
        t.save();
        t.translate(3.0, 4.0);
        assert_eq!(t.apply(1.0, 1.0), (4.0, 5.0));
        t.restore();
        assert_eq!(t.apply(1.0, 1.0), (1.0, 1.0));
        assert_eq!(t.depth(), 0);
        // an extra restore is ignored
        t.restore();
        assert_eq!(t.apply(1.0, 1.0), (1.0, 1.0));
    }

    #[test]
    fn quadratic_curve_ends_on_target() {
        let mut p = Path::default();
        p.move_to((0.0, 0.0));
        p.quadratic_to((5.0, 10.0), (10.0, 0.0));
        let segs: Vec<_> = p.segments().collect();
        assert_eq!(segs.len(), CURVE_STEPS);
        assert_eq!(segs.last().map(|s| s.1), Some((10.0, 0.0)));
        // midpoint of the curve is halfway to the control point
        assert_eq!(segs[CURVE_STEPS / 2 - 1].1, (5.0, 5.0));
    }

    #[test]
    fn recorder_applies_translation() {
        let mut r = Recorder::new(100.0, 50.0);
        r.save();
        r.translate(2.0, 0.0);
        r.fill_rect(1.0, 1.0, 1.0, 1.0, Rgb::WHITE);
        r.restore();
        r.fill_rect(1.0, 1.0, 1.0, 1.0, Rgb::WHITE);
        let ops = r.take_ops();
        assert!(matches!(ops[2], DrawOp::FillRect { x, .. } if x == 3.0));
        assert!(matches!(ops[4], DrawOp::FillRect { x, .. } if x == 1.0));
        assert_eq!(r.save_depth(), 0);
    }
}
