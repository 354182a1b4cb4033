use serde::{Deserialize, Serialize};

use crate::math::Vec2;

/// Axis-aligned rectangle in the planar frame.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb2 {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb2 {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Aabb2 { min, max }
    }

    /// Builds the box spanned by two arbitrary corners.
    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        Aabb2 {
            min: Vec2::new(a.x.min(b.x), a.y.min(b.y)),
            max: Vec2::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

#[cfg(test)]
mod tests {
    use super::Aabb2;
    use crate::math::Vec2;

    #[test]
    fn corners_are_normalized() {
        let b = Aabb2::from_corners(Vec2::new(5.0, -1.0), Vec2::new(-5.0, 3.0));
        assert_eq!(b.min, Vec2::new(-5.0, -1.0));
        assert_eq!(b.max, Vec2::new(5.0, 3.0));
        assert_eq!(b.width(), 10.0);
        assert_eq!(b.height(), 4.0);
        assert!(b.contains(Vec2::ZERO));
        assert!(!b.contains(Vec2::new(0.0, 3.5)));
    }
}
