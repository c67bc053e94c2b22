//! Toroidal world geometry
//!
//! Every proximity, steering and containment check goes through these
//! helpers. Raw subtraction is wrong near the world edges.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Map a coordinate back into `[0, size)`.
///
/// Position updates move less than one world-size per tick, so the common
/// case is a single add or subtract. Larger magnitudes take the modulo path.
#[inline]
pub fn wrap(value: f32, size: f32) -> f32 {
    if value >= 0.0 && value < size {
        return value;
    }
    let wrapped = if value < 0.0 && value >= -size {
        value + size
    } else if value >= size && value < 2.0 * size {
        value - size
    } else {
        value.rem_euclid(size)
    };
    // Tiny negatives round up to exactly `size`
    if wrapped >= size || wrapped < 0.0 {
        0.0
    } else {
        wrapped
    }
}

/// Signed shortest-path difference in `(-size/2, size/2]`
#[inline]
pub fn wrapped_delta(d: f32, size: f32) -> f32 {
    let half = size * 0.5;
    let mut d = d;
    if d > half {
        d -= size;
    } else if d <= -half {
        d += size;
    }
    if d > half || d <= -half {
        d = d.rem_euclid(size);
        if d > half {
            d -= size;
        }
    }
    d
}

/// Fixed-size rectangular world with periodic boundaries
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct World {
    pub width: f32,
    pub height: f32,
}

impl World {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width * 0.5, self.height * 0.5)
    }

    #[inline]
    pub fn wrap_position(&self, pos: Vec2) -> Vec2 {
        Vec2::new(wrap(pos.x, self.width), wrap(pos.y, self.height))
    }

    /// Shortest vector from `from` to `to`
    #[inline]
    pub fn delta(&self, from: Vec2, to: Vec2) -> Vec2 {
        Vec2::new(
            wrapped_delta(to.x - from.x, self.width),
            wrapped_delta(to.y - from.y, self.height),
        )
    }

    #[inline]
    pub fn distance_sq(&self, a: Vec2, b: Vec2) -> f32 {
        self.delta(a, b).length_squared()
    }

    #[inline]
    pub fn distance(&self, a: Vec2, b: Vec2) -> f32 {
        self.delta(a, b).length()
    }

    /// Uniform random point in the world
    pub fn random_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec2 {
        self.wrap_position(Vec2::new(
            rng.random::<f32>() * self.width,
            rng.random::<f32>() * self.height,
        ))
    }

    /// Uniform random point within `radius` of `center`, wrapped
    pub fn random_point_near<R: Rng + ?Sized>(&self, rng: &mut R, center: Vec2, radius: f32) -> Vec2 {
        let angle = rng.random::<f32>() * std::f32::consts::TAU;
        let r = radius * rng.random::<f32>().sqrt();
        self.wrap_position(center + crate::heading_to_dir(angle) * r)
    }
}
