//! Fixed-point math utilities for deterministic simulation.
//!
//! Line interpolation, asteroid mass and motion interpolation all use
//! fixed-point arithmetic so a seeded match replays bit-for-bit on any CPU.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

use crate::grid::CubeCell;

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// `sqrt(3)` in raw I32F32 bits.
const SQRT_3: Fixed = Fixed::from_bits(7_439_101_574);

/// Fixed-point 2D vector, used for cell centres in layout space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Centre of a pointy-top hex of unit size.
    #[must_use]
    pub fn from_cell(cell: CubeCell) -> Self {
        let q = Fixed::from_num(cell.q);
        let r = Fixed::from_num(cell.r);
        Self {
            x: SQRT_3 * q + SQRT_3 / Fixed::from_num(2) * r,
            y: Fixed::from_num(3) / Fixed::from_num(2) * r,
        }
    }

    /// Calculate squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Linearly interpolate between two vectors.
    #[must_use]
    pub fn lerp(self, other: Self, t: Fixed) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }
}

/// `max(floor, value / divisor)` for fixed-point quantities.
#[must_use]
pub fn scaled_floor(value: Fixed, divisor: i32, floor: Fixed) -> Fixed {
    (value / Fixed::from_num(divisor)).max(floor)
}
