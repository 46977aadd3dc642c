use crate::colors::Rgb;
use crate::surface::{DrawSurface, Path, TransformStack};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{poll, read, Event, KeyCode, KeyModifiers},
    execute, queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{
        disable_raw_mode, enable_raw_mode, size, Clear, ClearType, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use image::RgbaImage;
use std::io::{self, stdout, Write};
use std::time::Duration;

/// Virtual pixels per terminal cell. Each cell shows two 8×8 dots.
pub const CELL_WIDTH_PX: f64 = 8.0;
pub const CELL_HEIGHT_PX: f64 = 16.0;
const DOT_PX: f64 = 8.0;

/// Alpha threshold below which a pixel is considered transparent
const ALPHA_THRESHOLD: u8 = 10;

/// Dot raster behind the terminal surface.
#[derive(Debug, Clone)]
pub struct PixelCanvas {
    cols: usize,
    rows: usize,
    dots: Vec<Option<Rgb>>,
    transform: TransformStack,
    path: Path,
}

impl PixelCanvas {
    /// Canvas for a `cols` × `rows` cell area (twice as many dot rows).
    pub fn new(cols: u16, rows: u16) -> Self {
        let cols = cols as usize;
        let rows = rows as usize * 2;
        Self {
            cols,
            rows,
            dots: vec![None; cols * rows],
            transform: TransformStack::default(),
            path: Path::default(),
        }
    }

    pub fn dot(&self, x: usize, y: usize) -> Option<Rgb> {
        if x < self.cols && y < self.rows {
            self.dots[y * self.cols + x]
        } else {
            None
        }
    }

    pub fn dot_size(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    fn plot(&mut self, x: i64, y: i64, color: Rgb) {
        if x >= 0 && y >= 0 && (x as usize) < self.cols && (y as usize) < self.rows {
            self.dots[y as usize * self.cols + x as usize] = Some(color);
        }
    }

    /// Dot span covered by `[start, start + len)`; never empty for `len > 0`.
    fn span(start: f64, len: f64) -> (i64, i64) {
        let first = (start / DOT_PX).floor() as i64;
        let last = ((start + len) / DOT_PX).ceil() as i64;
        (first, last.max(first + 1))
    }

    fn line(&mut self, a: (f64, f64), b: (f64, f64), color: Rgb) {
        let (x0, y0) = (a.0 / DOT_PX, a.1 / DOT_PX);
        let (x1, y1) = (b.0 / DOT_PX, b.1 / DOT_PX);
        let steps = (x1 - x0).abs().max((y1 - y0).abs()).ceil().max(1.0) as usize;
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            let x = x0 + (x1 - x0) * t;
            let y = y0 + (y1 - y0) * t;
            self.plot(x.floor() as i64, y.floor() as i64, color);
        }
    }
}

impl DrawSurface for PixelCanvas {
    fn size(&self) -> (f64, f64) {
        (self.cols as f64 * CELL_WIDTH_PX, (self.rows / 2) as f64 * CELL_HEIGHT_PX)
    }

    fn clear(&mut self) {
        self.dots.fill(None);
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Rgb) {
        if w <= 0.0 || h <= 0.0 || !(x.is_finite() && y.is_finite()) {
            return;
        }
        let (x, y) = self.transform.apply(x, y);
        let (x0, x1) = Self::span(x, w);
        let (y0, y1) = Self::span(y, h);
        for dy in y0.max(0)..y1.min(self.rows as i64) {
            for dx in x0.max(0)..x1.min(self.cols as i64) {
                self.plot(dx, dy, color);
            }
        }
    }

    fn draw_image(&mut self, image: &RgbaImage, x: f64, y: f64, w: f64, h: f64) {
        if w <= 0.0 || h <= 0.0 || image.width() == 0 || image.height() == 0 {
            return;
        }
        let (x, y) = self.transform.apply(x, y);
        let (x0, x1) = Self::span(x, w);
        let (y0, y1) = Self::span(y, h);
        for dy in y0.max(0)..y1.min(self.rows as i64) {
            let v = ((dy as f64 + 0.5) * DOT_PX - y) / h;
            if !(0.0..1.0).contains(&v) {
                continue;
            }
            let py = ((v * image.height() as f64) as u32).min(image.height() - 1);
            for dx in x0.max(0)..x1.min(self.cols as i64) {
                let u = ((dx as f64 + 0.5) * DOT_PX - x) / w;
                if !(0.0..1.0).contains(&u) {
                    continue;
                }
                let px = ((u * image.width() as f64) as u32).min(image.width() - 1);
                let [r, g, b, a] = image.get_pixel(px, py).0;
                if a >= ALPHA_THRESHOLD {
                    self.plot(dx, dy, Rgb::new(r, g, b));
                }
            }
        }
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
        let segments: Vec<_> = self.path.segments().collect();
        for (a, b) in segments {
            self.line(a, b, color);
        }
    }

    fn save(&mut self) {
        self.transform.save();
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.transform.translate(dx, dy);
    }

    fn restore(&mut self) {
        self.transform.restore();
    }
}

/// A single cell in the terminal buffer
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub ch: char,
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub bold: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: None,
            bg: None,
            bold: false,
        }
    }
}

/// Terminal abstraction for rendering
pub struct Terminal {
    width: u16,
    height: u16,
    buffer: Vec<Vec<Cell>>,
    canvas: PixelCanvas,
    alternate_screen: bool,
}

impl Terminal {
    /// Initialize the terminal for drawing
    pub fn new(alternate_screen: bool) -> io::Result<Self> {
        let (width, height) = size()?;

        if alternate_screen {
            enable_raw_mode()?;
            execute!(stdout(), EnterAlternateScreen, Hide)?;
        }

        Ok(Self {
            width,
            height,
            buffer: vec![vec![Cell::default(); width as usize]; height as usize],
            canvas: PixelCanvas::new(width, height),
            alternate_screen,
        })
    }

    /// Get terminal dimensions
    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    /// Resize buffers after the terminal changed size.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.buffer = vec![vec![Cell::default(); width as usize]; height as usize];
        self.canvas = PixelCanvas::new(width, height);
    }

    /// Clear the cell buffer
    pub fn clear(&mut self) {
        for row in &mut self.buffer {
            for cell in row {
                *cell = Cell::default();
            }
        }
    }

    /// Clear the actual terminal
    pub fn clear_screen(&self) -> io::Result<()> {
        execute!(stdout(), Clear(ClearType::All))?;
        Ok(())
    }

    /// Set a character at position with optional color
    pub fn set(&mut self, x: i32, y: i32, ch: char, fg: Option<Color>, bold: bool) {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            let cell = &mut self.buffer[y as usize][x as usize];
            cell.ch = ch;
            cell.fg = fg;
            cell.bold = bold;
        }
    }

    pub fn set_with_bg(&mut self, x: i32, y: i32, ch: char, fg: Option<Color>, bg: Option<Color>, bold: bool) {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            self.buffer[y as usize][x as usize] = Cell { ch, fg, bg, bold };
        }
    }

    /// Set a string starting at position
    pub fn set_str(&mut self, x: i32, y: i32, s: &str, fg: Option<Color>, bold: bool) {
        for (i, ch) in s.chars().enumerate() {
            self.set(x + i as i32, y, ch, fg, bold);
        }
    }

    /// Copy the dot canvas into the cell buffer using half blocks.
    pub fn compose(&mut self) {
        for cy in 0..self.height as usize {
            for cx in 0..self.width as usize {
                let top = self.canvas.dot(cx, cy * 2);
                let bottom = self.canvas.dot(cx, cy * 2 + 1);
                self.buffer[cy][cx] = half_block(top, bottom);
            }
        }
    }

    /// Write the cell buffer to the screen.
    pub fn present(&self) -> io::Result<()> {
        let mut out = stdout().lock();
        let mut last: (Option<Color>, Option<Color>, bool) = (None, None, false);
        queue!(out, ResetColor)?;

        for (y, row) in self.buffer.iter().enumerate() {
            queue!(out, MoveTo(0, y as u16))?;
            for cell in row {
                let style = (cell.fg, cell.bg, cell.bold);
                if style != last {
                    queue!(out, SetAttribute(Attribute::Reset), ResetColor)?;
                    if let Some(fg) = cell.fg {
                        queue!(out, SetForegroundColor(fg))?;
                    }
                    if let Some(bg) = cell.bg {
                        queue!(out, SetBackgroundColor(bg))?;
                    }
                    if cell.bold {
                        queue!(out, SetAttribute(Attribute::Bold))?;
                    }
                    last = style;
                }
                queue!(out, Print(cell.ch))?;
            }
        }
        queue!(out, SetAttribute(Attribute::Reset), ResetColor)?;
        out.flush()
    }

    /// Check for keypress (non-blocking), returns (code, modifiers)
    pub fn check_key(&self) -> io::Result<Option<(KeyCode, KeyModifiers)>> {
        if poll(Duration::from_millis(0))? {
            if let Event::Key(key_event) = read()? {
                return Ok(Some((key_event.code, key_event.modifiers)));
            }
        }
        Ok(None)
    }

    /// Sleep for specified duration
    pub fn sleep(&self, seconds: f32) {
        std::thread::sleep(Duration::from_secs_f32(seconds.max(0.0)));
    }

    pub fn canvas(&self) -> &PixelCanvas {
        &self.canvas
    }
}

fn half_block(top: Option<Rgb>, bottom: Option<Rgb>) -> Cell {
    match (top, bottom) {
        (None, None) => Cell::default(),
        (Some(t), None) => Cell { ch: '▀', fg: Some(t.into()), bg: None, bold: false },
        (None, Some(b)) => Cell { ch: '▄', fg: Some(b.into()), bg: None, bold: false },
        (Some(t), Some(b)) if t == b => Cell { ch: ' ', fg: None, bg: Some(t.into()), bold: false },
        (Some(t), Some(b)) => Cell { ch: '▀', fg: Some(t.into()), bg: Some(b.into()), bold: false },
    }
}

impl DrawSurface for Terminal {
    fn size(&self) -> (f64, f64) {
        self.canvas.size()
    }

    fn clear(&mut self) {
        self.canvas.clear();
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Rgb) {
        self.canvas.fill_rect(x, y, w, h, color);
    }

    fn draw_image(&mut self, image: &RgbaImage, x: f64, y: f64, w: f64, h: f64) {
        self.canvas.draw_image(image, x, y, w, h);
    }

    fn begin_path(&mut self) {
        self.canvas.begin_path();
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.canvas.move_to(x, y);
    }

    fn quadratic_curve_to(&mut self, cx: f64, cy: f64, x: f64, y: f64) {
        self.canvas.quadratic_curve_to(cx, cy, x, y);
    }

    fn stroke(&mut self, color: Rgb, line_width: f64) {
        self.canvas.stroke(color, line_width);
    }

    fn save(&mut self) {
        self.canvas.save();
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.canvas.translate(dx, dy);
    }

    fn restore(&mut self) {
        self.canvas.restore();
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        if self.alternate_screen {
            let _ = execute!(stdout(), ResetColor, Show, LeaveAlternateScreen);
            let _ = disable_raw_mode();
        }
    }
}
