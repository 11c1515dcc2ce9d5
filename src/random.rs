// --- File: random.rs ---
use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

pub type SimRng = StdRng;

/// Random directions, positions and angles drawn from one injected stream.
///
/// Every operation only advances the wrapped generator, so two fields built
/// from the same seed produce identical sequences.
pub struct RandomField<R: Rng = SimRng> {
    rng: R,
}

impl RandomField<SimRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(SimRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(SimRng::from_entropy())
    }
}

impl<R: Rng> RandomField<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// One sample from the uniform stream over [0, 1).
    #[inline]
    pub fn unit(&mut self) -> f32 {
        self.rng.gen_range(0.0..1.0)
    }

    /// Unit vector from a normalized sample of the square [-1, 1]².
    ///
    /// This is not an angle sample: directions near the diagonals are
    /// slightly more likely than directions near the axes.
    pub fn direction(&mut self) -> Vec2 {
        let x = self.unit() * 2.0 - 1.0;
        let y = self.unit() * 2.0 - 1.0;
        let v = Vec2::new(x, y);
        if v.length_squared() > 0.0 {
            v.normalize()
        } else {
            Vec2::X
        }
    }

    /// Point inside the `range`-sized rectangle centered on the origin.
    pub fn position(&mut self, range: Vec2) -> Vec2 {
        let x = self.unit() * range.x - range.x / 2.0;
        let y = self.unit() * range.y - range.y / 2.0;
        Vec2::new(x, y)
    }

    /// Angle in [0, 2π).
    pub fn angle(&mut self) -> f32 {
        // Rounding can land exactly on TAU for samples just below 1.0
        let angle = self.unit() * TAU;
        if angle >= TAU { 0.0 } else { angle }
    }
}

#[inline]
pub fn angle_to_vec(angle: f32) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}
