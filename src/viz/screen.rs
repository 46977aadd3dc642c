/// Responsive width class of the drawing surface, 0 (narrowest) to 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScreenClass(u8);

/// Lower bounds of classes 1..=6, in pixels.
const BREAKPOINTS: [f64; 6] = [576.0, 768.0, 992.0, 1200.0, 1400.0, 1600.0];
const BAR_HEIGHT_MODIFIERS: [f64; 7] = [3.0, 3.0, 3.0, 2.0, 2.0, 1.25, 1.0];
const SHAKE_MODIFIERS: [f64; 7] = [0.6, 0.7, 0.7, 0.7, 0.8, 0.8, 1.0];
/// Classes below this draw the reduced emblem.
const LARGE_EMBLEM_CLASS: u8 = 5;
/// Bar mode averages fewer bins together at and above this width.
const WIDE_BAR_WIDTH: f64 = 1350.0;

impl ScreenClass {
    pub fn from_width(width: f64) -> Self {
        Self(BREAKPOINTS.iter().filter(|&&b| width >= b).count() as u8)
    }

    pub fn index(self) -> u8 {
        self.0
    }

    /// Divisor applied to ring heights; portrait surfaces always use 3.
    pub fn bar_height_modifier(self, portrait: bool) -> f64 {
        if portrait {
            3.0
        } else {
            BAR_HEIGHT_MODIFIERS[self.0 as usize]
        }
    }

    pub fn shake_modifier(self) -> f64 {
        SHAKE_MODIFIERS[self.0 as usize]
    }

    pub fn small_emblem(self) -> bool {
        self.0 < LARGE_EMBLEM_CLASS
    }
}

/// Bins averaged per bar in bar mode.
pub fn bar_divisor(width: f64) -> usize {
    if width < WIDE_BAR_WIDTH {
        4
    } else {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakpoints() {
        let cases = [
            (0.0, 0),
            (575.0, 0),
            (576.0, 1),
            (991.0, 2),
            (992.0, 3),
            (1399.0, 4),
            (1400.0, 5),
            (1600.0, 6),
            (4000.0, 6),
        ];
        for (w, class) in cases {
            assert_eq!(ScreenClass::from_width(w).index(), class, "width {w}");
        }
    }

    #[test]
    fn derived_modifiers() {
        let narrow = ScreenClass::from_width(640.0);
        let wide = ScreenClass::from_width(1700.0);
        assert_eq!(narrow.bar_height_modifier(false), 3.0);
        assert_eq!(wide.bar_height_modifier(false), 1.0);
        assert_eq!(wide.bar_height_modifier(true), 3.0);
        assert_eq!(narrow.shake_modifier(), 0.7);
        assert_eq!(wide.shake_modifier(), 1.0);
        assert!(narrow.small_emblem());
        assert!(!ScreenClass::from_width(1450.0).small_emblem());
        assert_eq!(bar_divisor(1349.0), 4);
        assert_eq!(bar_divisor(1350.0), 2);
    }
}
