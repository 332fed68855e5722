use serde::{Deserialize, Serialize};

/// axis-aligned bounding box in map coordinates, where x is longitude and
/// y is latitude. all comparisons are inclusive on both edges.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> BoundingBox {
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// degenerate box covering a single point
    pub fn from_point(x: f64, y: f64) -> BoundingBox {
        BoundingBox::new(x, y, x, y)
    }

    /// non-strict overlap test. boxes that share only an edge or corner
    /// still intersect.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !(self.max_x < other.min_x
            || self.min_x > other.max_x
            || self.max_y < other.min_y
            || self.min_y > other.max_y)
    }

    /// closed-interval point containment
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// grows this box by min/max merge so it also covers `other`
    pub fn expand(&mut self, other: &BoundingBox) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    /// union of two boxes without mutating either
    pub fn merged(&self, other: &BoundingBox) -> BoundingBox {
        let mut merged = *self;
        merged.expand(other);
        merged
    }

    /// area, or zero for a degenerate box with non-positive extent on
    /// either axis
    pub fn area(&self) -> f64 {
        let width = self.max_x - self.min_x;
        let height = self.max_y - self.min_y;
        if width <= 0.0 || height <= 0.0 {
            return 0.0;
        }
        width * height
    }

    /// perimeter, or zero for a degenerate box
    pub fn perimeter(&self) -> f64 {
        let width = self.max_x - self.min_x;
        let height = self.max_y - self.min_y;
        if width <= 0.0 || height <= 0.0 {
            return 0.0;
        }
        2.0 * (width + height)
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) * 0.5,
            (self.min_y + self.max_y) * 0.5,
        )
    }

    pub fn is_finite(&self) -> bool {
        self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite()
    }

    /// true when `other` lies fully inside this box (closed edges)
    pub fn covers(&self, other: &BoundingBox) -> bool {
        other.min_x >= self.min_x
            && other.min_y >= self.min_y
            && other.max_x <= self.max_x
            && other.max_y <= self.max_y
    }
}
