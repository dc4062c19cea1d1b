use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// Tolerance used by geometric predicates to absorb float noise.
pub const EPSILON: f32 = 1e-3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(self, other: Vec2) -> f32 {
        (self - other).length()
    }

    pub fn manhattan(self, other: Vec2) -> f32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn approx_eq(self, other: Vec2) -> bool {
        (self.x - other.x).abs() <= EPSILON && (self.y - other.y).abs() <= EPSILON
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// A rectangle defined by min and max corners
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    /// An empty rectangle at the origin
    pub const NOTHING: Self = Self {
        min: Vec2 { x: 0.0, y: 0.0 },
        max: Vec2 { x: 0.0, y: 0.0 },
    };

    pub fn from_min_max(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn from_pos_size(pos: Vec2, size: Vec2) -> Self {
        Self {
            min: pos,
            max: Vec2::new(pos.x + size.x, pos.y + size.y),
        }
    }

    pub fn from_center_size(center: Vec2, size: Vec2) -> Self {
        Self::from_pos_size(
            Vec2::new(center.x - size.x * 0.5, center.y - size.y * 0.5),
            size,
        )
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width(), self.height())
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            self.min.x + self.width() * 0.5,
            self.min.y + self.height() * 0.5,
        )
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// Whether `other` lies completely inside this rectangle (with float tolerance).
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.min.x >= self.min.x - EPSILON
            && other.min.y >= self.min.y - EPSILON
            && other.max.x <= self.max.x + EPSILON
            && other.max.y <= self.max.y + EPSILON
    }

    /// Closed intersection test: touching edges count as intersecting.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// Open intersection test: the shared region must have positive area.
    pub fn overlaps(&self, other: &Rect) -> bool {
        let (ox, oy) = self.overlap_extent(other);
        ox > EPSILON && oy > EPSILON
    }

    /// Width and height of the shared region; negative values are gaps.
    pub fn overlap_extent(&self, other: &Rect) -> (f32, f32) {
        let ox = self.max.x.min(other.max.x) - self.min.x.max(other.min.x);
        let oy = self.max.y.min(other.max.y) - self.min.y.max(other.min.y);
        (ox, oy)
    }

    /// Axis-aligned clearance between two rectangles; zero when they touch or overlap.
    pub fn gap(&self, other: &Rect) -> f32 {
        let (ox, oy) = self.overlap_extent(other);
        let gx = (-ox).max(0.0);
        let gy = (-oy).max(0.0);
        gx.max(gy)
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            min: Vec2::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Vec2::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// Return a new rectangle expanded by `amount` on all sides
    pub fn expand(&self, amount: f32) -> Rect {
        Rect {
            min: Vec2::new(self.min.x - amount, self.min.y - amount),
            max: Vec2::new(self.max.x + amount, self.max.y + amount),
        }
    }

    /// Shrink by `padding` on every side plus `top` extra on the top edge.
    /// Degenerate results collapse onto the center line instead of inverting.
    pub fn inset(&self, padding: f32, top: f32) -> Rect {
        let min = Vec2::new(self.min.x + padding, self.min.y + padding + top);
        let max = Vec2::new(self.max.x - padding, self.max.y - padding);
        Rect {
            min: Vec2::new(min.x.min(max.x), min.y.min(max.y)),
            max: Vec2::new(max.x.max(min.x), max.y.max(min.y)),
        }
    }

    pub fn translate(&self, delta: Vec2) -> Rect {
        Rect {
            min: self.min + delta,
            max: self.max + delta,
        }
    }

    /// Bounding box of a set of rectangles, `None` when the iterator is empty.
    pub fn bounding<'a>(rects: impl IntoIterator<Item = &'a Rect>) -> Option<Rect> {
        rects
            .into_iter()
            .fold(None, |acc: Option<Rect>, rect| match acc {
                Some(bounds) => Some(bounds.union(rect)),
                None => Some(*rect),
            })
    }
}

fn orientation(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Whether two segments cross at a single interior point.
///
/// Collinear overlaps and shared endpoints do not count as crossings.
pub fn segments_cross(a1: Vec2, a2: Vec2, b1: Vec2, b2: Vec2) -> bool {
    let d1 = orientation(b1, b2, a1);
    let d2 = orientation(b1, b2, a2);
    let d3 = orientation(a1, a2, b1);
    let d4 = orientation(a1, a2, b2);

    ((d1 > EPSILON && d2 < -EPSILON) || (d1 < -EPSILON && d2 > EPSILON))
        && ((d3 > EPSILON && d4 < -EPSILON) || (d3 < -EPSILON && d4 > EPSILON))
}

/// Whether the segment passes through the interior of `rect`.
pub fn segment_hits_rect(a: Vec2, b: Vec2, rect: &Rect) -> bool {
    // Liang-Barsky clipping against the open rectangle.
    let inner = rect.expand(-EPSILON);
    if inner.width() <= 0.0 || inner.height() <= 0.0 {
        return false;
    }

    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let mut t0 = 0.0f32;
    let mut t1 = 1.0f32;

    for (p, q) in [
        (-dx, a.x - inner.min.x),
        (dx, inner.max.x - a.x),
        (-dy, a.y - inner.min.y),
        (dy, inner.max.y - a.y),
    ] {
        if p.abs() < f32::EPSILON {
            if q < 0.0 {
                return false;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return false;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return false;
            }
            t1 = t1.min(r);
        }
    }

    t0 < t1
}

/// Total length of a polyline.
pub fn polyline_length(points: &[Vec2]) -> f32 {
    points.windows(2).map(|w| w[0].distance(w[1])).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rect(x: f32, y: f32, w: f32, h: f32) -> Rect {
        Rect::from_pos_size(Vec2::new(x, y), Vec2::new(w, h))
    }

    #[test]
    fn test_touching_rects_intersect_but_do_not_overlap() {
        let a = rect(0.0, 0.0, 10.0, 10.0);
        let b = rect(10.0, 0.0, 10.0, 10.0);
        assert!(a.intersects(&b));
        assert!(!a.overlaps(&b));
        assert_eq!(a.gap(&b), 0.0);
    }

    #[test]
    fn test_gap_measures_clearance() {
        let a = rect(0.0, 0.0, 10.0, 10.0);
        let b = rect(25.0, 0.0, 10.0, 10.0);
        assert!((a.gap(&b) - 15.0).abs() < 1e-4);
    }

    #[test]
    fn test_inset_reserves_label_band() {
        let outer = rect(0.0, 0.0, 200.0, 100.0);
        let inner = outer.inset(10.0, 20.0);
        assert_eq!(inner.min, Vec2::new(10.0, 30.0));
        assert_eq!(inner.max, Vec2::new(190.0, 90.0));
    }

    #[test]
    fn test_segments_cross() {
        let cross = segments_cross(
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 10.0),
            Vec2::new(10.0, 0.0),
        );
        assert!(cross);

        let shared_endpoint = segments_cross(
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
        );
        assert!(!shared_endpoint);
    }

    #[test]
    fn test_segment_hits_rect() {
        let obstacle = rect(10.0, -5.0, 10.0, 10.0);
        assert!(segment_hits_rect(
            Vec2::new(0.0, 0.0),
            Vec2::new(30.0, 0.0),
            &obstacle
        ));
        assert!(!segment_hits_rect(
            Vec2::new(0.0, 20.0),
            Vec2::new(30.0, 20.0),
            &obstacle
        ));
        // Running along the border is not a hit.
        assert!(!segment_hits_rect(
            Vec2::new(0.0, 5.0),
            Vec2::new(30.0, 5.0),
            &obstacle
        ));
    }

    proptest! {
        #[test]
        fn prop_union_contains_both(
            ax in -500.0f32..500.0, ay in -500.0f32..500.0,
            aw in 1.0f32..200.0, ah in 1.0f32..200.0,
            bx in -500.0f32..500.0, by in -500.0f32..500.0,
            bw in 1.0f32..200.0, bh in 1.0f32..200.0,
        ) {
            let a = rect(ax, ay, aw, ah);
            let b = rect(bx, by, bw, bh);
            let u = a.union(&b);
            prop_assert!(u.contains_rect(&a));
            prop_assert!(u.contains_rect(&b));
        }

        #[test]
        fn prop_overlap_is_symmetric(
            ax in -100.0f32..100.0, ay in -100.0f32..100.0,
            bx in -100.0f32..100.0, by in -100.0f32..100.0,
        ) {
            let a = rect(ax, ay, 50.0, 40.0);
            let b = rect(bx, by, 30.0, 60.0);
            prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
            prop_assert!((a.gap(&b) - b.gap(&a)).abs() < 1e-4);
        }
    }
}
