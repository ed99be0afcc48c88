/// Axis-aligned rectangle in pixels (top-left origin).
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Half-open integer pixel span `[x0, x1) x [y0, y1)`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct PixelBounds {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Rect {
    #[inline]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub fn right(self) -> f32 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(self) -> f32 {
        self.y + self.height
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    /// Flips negative extents so width/height are non-negative.
    #[inline]
    pub fn normalized(self) -> Self {
        let (x, width) = if self.width < 0.0 {
            (self.x + self.width, -self.width)
        } else {
            (self.x, self.width)
        };
        let (y, height) = if self.height < 0.0 {
            (self.y + self.height, -self.height)
        } else {
            (self.y, self.height)
        };
        Rect::new(x, y, width, height)
    }

    /// Overlap of two rectangles; `None` when they only touch or are disjoint.
    #[inline]
    pub fn intersect(self, other: Rect) -> Option<Rect> {
        let a = self.normalized();
        let b = other.normalized();

        let x0 = a.x.max(b.x);
        let y0 = a.y.max(b.y);
        let x1 = a.right().min(b.right());
        let y1 = a.bottom().min(b.bottom());

        if x1 - x0 <= 0.0 || y1 - y0 <= 0.0 {
            None
        } else {
            Some(Rect::new(x0, y0, x1 - x0, y1 - y0))
        }
    }

    /// Pixels whose centers fall inside the rectangle, clamped to `width x height`.
    ///
    /// Returns `None` for empty coverage. Non-finite rectangles cover nothing.
    pub fn pixel_bounds(self, width: u32, height: u32) -> Option<PixelBounds> {
        if !self.is_finite() {
            return None;
        }
        let r = self.normalized();

        let snap = |v: f32, max: u32| -> u32 { (v.round().max(0.0) as u32).min(max) };
        let bounds = PixelBounds {
            x0: snap(r.x, width),
            y0: snap(r.y, height),
            x1: snap(r.right(), width),
            y1: snap(r.bottom(), height),
        };

        (!bounds.is_empty()).then_some(bounds)
    }
}

impl PixelBounds {
    #[inline]
    pub fn is_empty(self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    #[inline]
    pub fn width(self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    #[inline]
    pub fn height(self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }

    #[inline]
    pub fn intersect(self, other: PixelBounds) -> Option<PixelBounds> {
        let out = PixelBounds {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        };
        (!out.is_empty()).then_some(out)
    }

    #[inline]
    pub fn contains(self, x: u32, y: u32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(x: f32, y: f32, w: f32, h: f32) -> Rect {
        Rect::new(x, y, w, h)
    }

    #[test]
    fn normalized_flips_negative_extents() {
        let n = r(10.0, 10.0, -4.0, -3.0).normalized();
        assert_eq!(n, r(6.0, 7.0, 4.0, 3.0));
    }

    #[test]
    fn intersect_overlapping() {
        let i = r(0.0, 0.0, 10.0, 10.0).intersect(r(5.0, 5.0, 10.0, 10.0));
        assert_eq!(i, Some(r(5.0, 5.0, 5.0, 5.0)));
    }

    #[test]
    fn intersect_touching_edge_is_none() {
        assert!(r(0.0, 0.0, 10.0, 10.0).intersect(r(10.0, 0.0, 5.0, 5.0)).is_none());
    }

    #[test]
    fn pixel_bounds_clamps_to_target() {
        let b = r(-5.0, 2.0, 20.0, 100.0).pixel_bounds(10, 10).unwrap();
        assert_eq!(b, PixelBounds { x0: 0, y0: 2, x1: 10, y1: 10 });
    }

    #[test]
    fn pixel_bounds_rejects_offscreen_and_nan() {
        assert!(r(20.0, 20.0, 5.0, 5.0).pixel_bounds(10, 10).is_none());
        assert!(r(f32::NAN, 0.0, 5.0, 5.0).pixel_bounds(10, 10).is_none());
    }

    #[test]
    fn pixel_bounds_intersection() {
        let a = PixelBounds { x0: 0, y0: 0, x1: 8, y1: 8 };
        let b = PixelBounds { x0: 4, y0: 6, x1: 12, y1: 12 };
        assert_eq!(a.intersect(b), Some(PixelBounds { x0: 4, y0: 6, x1: 8, y1: 8 }));
        assert!(a.contains(7, 7));
        assert!(!a.contains(8, 0));
    }
}
