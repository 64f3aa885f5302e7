use serde::{Deserialize, Serialize};

///Represents a vector in 2D space.
/// Also used for positions: a point is the vector from the map origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vector2 {
    ///Value along the x-axis.
    /// Positive direction is east.
    pub x: f64,
    ///Value along the y-axis.
    /// Positive direction is south, matching map coordinates.
    pub y: f64,
}

/// A position on the map.
pub type Point2 = Vector2;

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Vector2 { x, y }
    }

    ///Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f64 {
        self.sq_magnitude().sqrt()
    }

    ///Returns the squared magnitude of the vector.
    pub fn sq_magnitude(&self) -> f64 {
        self.dot(self)
    }

    ///Returns the dot product of two vectors.
    pub fn dot(&self, other: &Vector2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    ///Returns the scaled vector.
    pub fn scale(&self, scalar: f64) -> Vector2 {
        Vector2 {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    ///Returns the sum of two vectors.
    pub fn add(&self, other: &Vector2) -> Vector2 {
        Vector2 {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    ///Returns the difference `self - other`.
    pub fn sub(&self, other: &Vector2) -> Vector2 {
        Vector2 {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }

    ///Returns the distance between two points.
    pub fn distance_to(&self, other: &Vector2) -> f64 {
        self.sub(other).magnitude()
    }
}

impl From<(f64, f64)> for Vector2 {
    fn from((x, y): (f64, f64)) -> Self {
        Vector2 { x, y }
    }
}
