use super::{PixelBounds, Viewport};

/// Integer damage rectangle `(left, top, right, bottom)`, right/bottom exclusive.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct DirtyRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl DirtyRect {
    #[inline]
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    /// Dirty rect covering the whole viewport.
    #[inline]
    pub fn of_viewport(viewport: Viewport) -> Self {
        Self::new(
            0,
            0,
            i32::try_from(viewport.width).unwrap_or(i32::MAX),
            i32::try_from(viewport.height).unwrap_or(i32::MAX),
        )
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }
}

/// Area a single draw has to repaint.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum DirtyRegion {
    /// Nothing is known about the damage; repaint everything.
    #[default]
    Full,
    Rect(DirtyRect),
}

impl DirtyRegion {
    /// Wire encoding of [`DirtyRegion::Full`] in a draw record.
    pub(crate) const FULL_SENTINEL: [i32; 4] = [-1, -1, -1, -1];

    pub(crate) fn encode(self) -> [i32; 4] {
        match self {
            DirtyRegion::Full => Self::FULL_SENTINEL,
            DirtyRegion::Rect(r) => [r.left, r.top, r.right, r.bottom],
        }
    }

    pub(crate) fn decode(raw: [i32; 4]) -> Self {
        if raw == Self::FULL_SENTINEL {
            DirtyRegion::Full
        } else {
            DirtyRegion::Rect(DirtyRect::new(raw[0], raw[1], raw[2], raw[3]))
        }
    }

    /// Pixels to repaint inside `viewport`.
    ///
    /// A damage rect that misses the viewport entirely yields `None`; such a
    /// draw has nothing to repaint and is skipped.
    pub fn clip_to(self, viewport: Viewport) -> Option<PixelBounds> {
        let full = PixelBounds { x0: 0, y0: 0, x1: viewport.width, y1: viewport.height };
        match self {
            DirtyRegion::Full => (!full.is_empty()).then_some(full),
            DirtyRegion::Rect(r) if r.is_empty() => None,
            DirtyRegion::Rect(r) => {
                let clamp = |v: i32, max: u32| -> u32 { (v.max(0) as u32).min(max) };
                full.intersect(PixelBounds {
                    x0: clamp(r.left, viewport.width),
                    y0: clamp(r.top, viewport.height),
                    x1: clamp(r.right, viewport.width),
                    y1: clamp(r.bottom, viewport.height),
                })
            }
        }
    }

    /// Whether this region covers the whole viewport.
    pub fn covers(self, viewport: Viewport) -> bool {
        match self {
            DirtyRegion::Full => true,
            DirtyRegion::Rect(_) => self.clip_to(viewport)
                == Some(PixelBounds { x0: 0, y0: 0, x1: viewport.width, y1: viewport.height }),
        }
    }
}

impl From<Option<DirtyRect>> for DirtyRegion {
    fn from(rect: Option<DirtyRect>) -> Self {
        rect.map_or(DirtyRegion::Full, DirtyRegion::Rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unspecified_dirty_means_full_invalidation() {
        assert_eq!(DirtyRegion::from(None), DirtyRegion::Full);
        assert_eq!(DirtyRegion::Full.encode(), [-1, -1, -1, -1]);
        assert_eq!(DirtyRegion::decode([-1, -1, -1, -1]), DirtyRegion::Full);
    }

    #[test]
    fn explicit_rect_survives_the_draw_record() {
        let region = DirtyRegion::Rect(DirtyRect::new(0, 0, 800, 600));
        assert_eq!(DirtyRegion::decode(region.encode()), region);
    }

    #[test]
    fn clip_to_clamps_into_viewport() {
        let vp = Viewport::new(100, 50);
        let region = DirtyRegion::Rect(DirtyRect::new(-10, 10, 500, 20));
        assert_eq!(region.clip_to(vp), Some(PixelBounds { x0: 0, y0: 10, x1: 100, y1: 20 }));
    }

    #[test]
    fn clip_to_rejects_disjoint_and_empty() {
        let vp = Viewport::new(100, 50);
        assert_eq!(DirtyRegion::Rect(DirtyRect::new(200, 0, 300, 10)).clip_to(vp), None);
        assert_eq!(DirtyRegion::Rect(DirtyRect::new(5, 5, 5, 9)).clip_to(vp), None);
    }

    #[test]
    fn covers_recognises_whole_viewport_rects() {
        let vp = Viewport::new(800, 600);
        assert!(DirtyRegion::Rect(DirtyRect::of_viewport(vp)).covers(vp));
        assert!(!DirtyRegion::Rect(DirtyRect::new(0, 0, 10, 10)).covers(vp));
    }
}
