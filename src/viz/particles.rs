//! Particle layer for the circle visualizer.
//!
//! A fixed-size pool of squares emitted from the centre of the surface.
//! Louder frames fling them harder; players who just guessed the song tint
//! newly born particles through the [`ColorFadeBuffer`].

use super::amplitude::BASE_AMPLITUDE_SCALAR;
use crate::colors::Rgb;
use crate::surface::DrawSurface;
use rand::Rng;

/// Live particles kept in the pool after every tick.
pub const TARGET_PARTICLES: usize = 1500;
/// Birth size before the random bump.
pub const BASE_PARTICLE_SIZE: f64 = 2.5;
/// Upper bound of the random size bump at birth.
const MAX_PARTICLE_SIZE: f64 = 1.0;
const SIZE_GROWTH: f64 = 0.01;
/// Velocity scale per unit of amplitude above the base scalar.
const VELOCITY_SCALE: f64 = 10.0;
/// Lifespans are drawn from `[-5, 395)`; negative ones die on their first tick.
const LIFESPAN_RANGE: f64 = 400.0;
const LIFESPAN_OFFSET: f64 = 5.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub id: usize,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub size: f64,
    pub life: u32,
    pub death: f64,
    pub color: Rgb,
}

impl Particle {
    pub fn is_dead(&self) -> bool {
        self.life as f64 > self.death
    }
}

/// Temporary colour injected into new particles.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorFadeEntry {
    pub color: Rgb,
    pub remaining: i32,
}

/// Colours waiting to be mixed into the particle stream.
///
/// Each birth samples one entry at a random index (not FIFO), so several
/// winners blend together instead of taking turns.
#[derive(Debug, Clone, Default)]
pub struct ColorFadeBuffer {
    entries: Vec<ColorFadeEntry>,
}

impl ColorFadeBuffer {
    pub fn push(&mut self, color: Rgb, duration: i32) {
        self.entries.push(ColorFadeEntry { color, remaining: duration });
    }

    /// Take one use of a random entry, evicting it once used up.
    pub fn sample<R: Rng>(&mut self, rng: &mut R) -> Option<Rgb> {
        if self.entries.is_empty() {
            return None;
        }
        let index = rng.gen_range(0..self.entries.len());
        let entry = &mut self.entries[index];
        let color = entry.color;
        entry.remaining -= 1;
        if entry.remaining <= 0 {
            self.entries.remove(index);
        }
        Some(color)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[ColorFadeEntry] {
        &self.entries
    }
}

#[derive(Debug, Clone)]
pub struct ParticleSystem {
    particles: Vec<Particle>,
    target: usize,
    fades: ColorFadeBuffer,
}

impl Default for ParticleSystem {
    fn default() -> Self {
        Self::new(TARGET_PARTICLES)
    }
}

impl ParticleSystem {
    pub fn new(target: usize) -> Self {
        Self {
            particles: Vec::with_capacity(target),
            target,
            fades: ColorFadeBuffer::default(),
        }
    }

    /// Advance every particle one frame, drop the dead and refill the pool.
    ///
    /// Displacement is amplified to `v * 2 * current` on frames where
    /// `current >= average + threshold`.
    pub fn tick<R: Rng>(
        &mut self,
        current: f64,
        average: f64,
        threshold: f64,
        origin: (f64, f64),
        rng: &mut R,
    ) {
        let hit = is_hit(current, average, threshold);
        for p in &mut self.particles {
            if hit {
                p.x += p.vx * 2.0 * current;
                p.y += p.vy * 2.0 * current;
            } else {
                p.x += p.vx;
                p.y += p.vy;
            }
            p.life += 1;
            p.size += SIZE_GROWTH;
        }
        self.particles.retain(|p| !p.is_dead());

        while self.particles.len() < self.target {
            self.spawn(current, origin, rng);
        }
    }

    /// Emit one particle at `origin` with a velocity proportional to how far
    /// `amplitude` sits above the base scalar.
    pub fn spawn<R: Rng>(&mut self, amplitude: f64, origin: (f64, f64), rng: &mut R) {
        let strength = amplitude - BASE_AMPLITUDE_SCALAR;
        let color = self.fades.sample(rng).unwrap_or(Rgb::WHITE);

        let vx = (rng.gen::<f64>() * 2.0 - 1.0) * strength * VELOCITY_SCALE;
        let vy = (rng.gen::<f64>() * 2.0 - 1.0) * strength * VELOCITY_SCALE;
        let size = (rng.gen::<f64>() * MAX_PARTICLE_SIZE + BASE_PARTICLE_SIZE).floor();
        let death = rng.gen::<f64>() * LIFESPAN_RANGE - LIFESPAN_OFFSET;

        self.particles.push(Particle {
            id: self.particles.len(),
            x: origin.0,
            y: origin.1,
            vx,
            vy,
            size,
            life: 0,
            death,
            color,
        });
    }

    pub fn render(&self, surface: &mut dyn DrawSurface) {
        for p in &self.particles {
            surface.fill_rect(p.x, p.y, p.size, p.size, p.color);
        }
    }

    pub fn fades(&self) -> &ColorFadeBuffer {
        &self.fades
    }

    pub fn fades_mut(&mut self) -> &mut ColorFadeBuffer {
        &mut self.fades
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }
}

/// The "hit" condition shared by particle displacement and screen shake.
pub fn is_hit(current: f64, average: f64, threshold: f64) -> bool {
    current >= average + threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{DrawOp, Recorder};
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn tick_fills_empty_pool() {
        let mut ps = ParticleSystem::default();
        ps.tick(1.5, 1.5, 0.15, (50.0, 50.0), &mut rng());
        assert_eq!(ps.len(), TARGET_PARTICLES);
        assert!(ps.particles().iter().all(|p| p.x == 50.0 && p.y == 50.0));
    }

    #[test]
    fn birth_attributes_in_range() {
        let mut ps = ParticleSystem::new(200);
        let mut r = rng();
        for _ in 0..200 {
            ps.spawn(2.25, (0.0, 0.0), &mut r);
        }
        for p in ps.particles() {
            assert!(p.vx.abs() <= 10.0 && p.vy.abs() <= 10.0);
            assert!(p.size == 2.0 || p.size == 3.0);
            assert!((-5.0..395.0).contains(&p.death));
            assert_eq!(p.color, Rgb::WHITE);
        }
        assert_eq!(ps.particles()[17].id, 17);
    }

    #[test]
    fn silence_gives_still_particles() {
        let mut ps = ParticleSystem::new(10);
        ps.spawn(BASE_AMPLITUDE_SCALAR, (0.0, 0.0), &mut rng());
        let p = &ps.particles()[0];
        assert_eq!((p.vx, p.vy), (0.0, 0.0));
    }

    fn moving_particle(death: f64) -> Particle {
        Particle {
            id: 0,
            x: 0.0,
            y: 0.0,
            vx: 1.0,
            vy: -1.0,
            size: 2.0,
            life: 0,
            death,
            color: Rgb::WHITE,
        }
    }

    #[test]
    fn plain_and_amplified_displacement() {
        let mut r = rng();
        let mut ps = ParticleSystem::new(1);
        ps.particles.push(moving_particle(100.0));

        ps.tick(1.3, 1.3, 0.15, (0.0, 0.0), &mut r);
        let p = &ps.particles()[0];
        assert_eq!((p.x, p.y), (1.0, -1.0));
        assert_eq!(p.life, 1);
        assert!((p.size - 2.01).abs() < 1e-12);

        ps.tick(2.0, 1.3, 0.15, (0.0, 0.0), &mut r);
        let p = &ps.particles()[0];
        assert_eq!((p.x, p.y), (5.0, -5.0));
    }

    #[test]
    fn expired_particles_are_replaced() {
        let mut r = rng();
        let mut ps = ParticleSystem::new(2);
        ps.particles.push(moving_particle(0.5));
        ps.particles.push(moving_particle(-3.0));
        ps.tick(1.25, 1.25, 0.15, (9.0, 9.0), &mut r);
        assert_eq!(ps.len(), 2);
        assert!(ps.particles().iter().all(|p| p.life == 0 && p.x == 9.0));
    }

    #[test]
    fn fade_entry_evicted_when_used_up() {
        let mut ps = ParticleSystem::new(10);
        let color: Rgb = "#AABBCC".parse().unwrap();
        ps.fades_mut().push(color, 1);
        ps.spawn(1.5, (0.0, 0.0), &mut rng());
        assert!(ps.fades().is_empty());
        assert_eq!(ps.particles()[0].color, color);
    }

    #[test]
    fn fade_entry_counts_down() {
        let mut buf = ColorFadeBuffer::default();
        buf.push(Rgb::new(1, 2, 3), 3);
        let mut r = rng();
        assert!(buf.sample(&mut r).is_some());
        assert_eq!(buf.entries()[0].remaining, 2);
        buf.sample(&mut r);
        buf.sample(&mut r);
        assert!(buf.is_empty());
        assert_eq!(buf.sample(&mut r), None);
    }

    #[test]
    fn render_draws_each_particle_in_its_colour() {
        let mut ps = ParticleSystem::new(3);
        ps.fades_mut().push(Rgb::new(9, 9, 9), 1);
        let mut r = rng();
        for _ in 0..3 {
            ps.spawn(1.5, (4.0, 4.0), &mut r);
        }
        let mut surface = Recorder::new(10.0, 10.0);
        ps.render(&mut surface);
        let colors: Vec<Rgb> = surface
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::FillRect { color, .. } => Some(*color),
                _ => None,
            })
            .collect();
        assert_eq!(colors, vec![Rgb::new(9, 9, 9), Rgb::WHITE, Rgb::WHITE]);
    }

    proptest! {
        #[test]
        fn tick_restores_target(start in 0usize..=TARGET_PARTICLES, current in 1.25f64..2.5, seed in any::<u64>()) {
            let mut r = StdRng::seed_from_u64(seed);
            let mut ps = ParticleSystem::default();
            for _ in 0..start {
                ps.spawn(current, (0.0, 0.0), &mut r);
            }
            ps.tick(current, 1.5, 0.15, (0.0, 0.0), &mut r);
            prop_assert_eq!(ps.len(), TARGET_PARTICLES);
        }
    }
}
