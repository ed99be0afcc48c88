use crate::coords::{Color, PixelBounds};

/// CPU-side RGBA8 pixel buffer, premultiplied alpha, row-major.
///
/// Used as the headless backend's framebuffer and as the result type of
/// layer readback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 4]>,
}

impl Bitmap {
    /// A transparent bitmap of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0; 4]; width as usize * height as usize],
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn bounds(&self) -> PixelBounds {
        PixelBounds { x0: 0, y0: 0, x1: self.width, y1: self.height }
    }

    /// Premultiplied RGBA bytes at `(x, y)`; `None` outside the bitmap.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        (x < self.width && y < self.height).then(|| self.pixels[self.index(x, y)])
    }

    #[inline]
    pub fn pixels(&self) -> &[[u8; 4]] {
        &self.pixels
    }

    /// Overwrites every pixel in `area` with `color`.
    pub fn fill(&mut self, area: PixelBounds, color: Color) {
        let Some(area) = area.intersect(self.bounds()) else { return };
        let rgba = color.to_premul_rgba8();
        for y in area.y0..area.y1 {
            let row = self.index(area.x0, y);
            self.pixels[row..row + area.width() as usize].fill(rgba);
        }
    }

    /// Source-over blends `color` into every pixel in `area`.
    pub fn blend(&mut self, area: PixelBounds, color: Color) {
        if color.is_opaque() {
            self.fill(area, color);
            return;
        }
        let Some(area) = area.intersect(self.bounds()) else { return };
        for y in area.y0..area.y1 {
            for x in area.x0..area.x1 {
                let i = self.index(x, y);
                let [r, g, b, a] = self.pixels[i];
                let dst = Color::from_premul(
                    r as f32 / 255.0,
                    g as f32 / 255.0,
                    b as f32 / 255.0,
                    a as f32 / 255.0,
                );
                self.pixels[i] = color.over(dst).to_premul_rgba8();
            }
        }
    }

    /// Copies `src` with its top-left at `(dst_x, dst_y)`, limited to `clip`.
    pub fn blit(&mut self, src: &Bitmap, dst_x: i64, dst_y: i64, clip: PixelBounds) {
        let Some(clip) = clip.intersect(self.bounds()) else { return };
        for y in clip.y0..clip.y1 {
            let sy = y as i64 - dst_y;
            if sy < 0 || sy >= src.height as i64 {
                continue;
            }
            for x in clip.x0..clip.x1 {
                let sx = x as i64 - dst_x;
                if sx < 0 || sx >= src.width as i64 {
                    continue;
                }
                let i = self.index(x, y);
                self.pixels[i] = src.pixels[src.index(sx as u32, sy as u32)];
            }
        }
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [u8; 4] = [255, 0, 0, 255];

    #[test]
    fn fill_is_clamped_to_bitmap() {
        let mut bmp = Bitmap::new(4, 4);
        bmp.fill(PixelBounds { x0: 2, y0: 2, x1: 10, y1: 10 }, Color::from_rgba8(255, 0, 0, 255));
        assert_eq!(bmp.pixel(3, 3), Some(RED));
        assert_eq!(bmp.pixel(1, 1), Some([0, 0, 0, 0]));
        assert_eq!(bmp.pixel(4, 0), None);
    }

    #[test]
    fn blend_respects_alpha() {
        let mut bmp = Bitmap::new(1, 1);
        bmp.fill(bmp.bounds(), Color::WHITE);
        bmp.blend(bmp.bounds(), Color::from_premul(0.0, 0.0, 0.0, 0.5));
        assert_eq!(bmp.pixel(0, 0), Some([128, 128, 128, 255]));
    }

    #[test]
    fn blit_offsets_and_clips() {
        let mut src = Bitmap::new(2, 2);
        src.fill(src.bounds(), Color::from_rgba8(255, 0, 0, 255));

        let mut dst = Bitmap::new(4, 4);
        dst.blit(&src, 3, 3, dst.bounds());
        assert_eq!(dst.pixel(3, 3), Some(RED));
        assert_eq!(dst.pixel(2, 2), Some([0, 0, 0, 0]));

        let mut clipped = Bitmap::new(4, 4);
        clipped.blit(&src, 0, 0, PixelBounds { x0: 1, y0: 1, x1: 4, y1: 4 });
        assert_eq!(clipped.pixel(0, 0), Some([0, 0, 0, 0]));
        assert_eq!(clipped.pixel(1, 1), Some(RED));
    }
}
