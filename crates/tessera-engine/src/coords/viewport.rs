/// Rendering target size in physical pixels.
///
/// Mutated only through `RenderProxy::setup`; the proxy keeps a cached copy so
/// size queries never cross threads.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A zero-area viewport cannot back a frame (surfaces refuse 0x0 configurations).
    #[inline]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of bytes an RGBA8 buffer of this size occupies.
    #[inline]
    pub fn rgba8_bytes(self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_when_either_axis_is_zero() {
        assert!(Viewport::new(0, 10).is_empty());
        assert!(Viewport::new(10, 0).is_empty());
        assert!(!Viewport::new(1, 1).is_empty());
    }

    #[test]
    fn rgba8_bytes_does_not_overflow_u32_math() {
        assert_eq!(Viewport::new(800, 600).rgba8_bytes(), 1_920_000);
        assert_eq!(Viewport::new(70_000, 70_000).rgba8_bytes(), 19_600_000_000);
    }
}
