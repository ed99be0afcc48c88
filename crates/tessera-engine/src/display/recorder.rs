use crate::coords::{Color, Rect};
use crate::handle::{FunctorId, LayerHandle};

use super::{DisplayList, DrawItem, DrawOp};

/// Records draw operations into a [`DisplayList`].
///
/// # Clipping
///
/// [`push_clip`](Self::push_clip) / [`pop_clip`](Self::pop_clip) scope the
/// following operations to a scissor rect. Clips are intersected with their
/// parent, so nested clips only ever shrink.
///
/// ```
/// # use tessera_engine::coords::{Color, Rect};
/// # use tessera_engine::display::DisplayListRecorder;
/// let mut rec = DisplayListRecorder::new();
/// rec.push_clip(Rect::new(0.0, 0.0, 100.0, 40.0));
/// rec.fill_rect(Rect::new(0.0, 0.0, 400.0, 400.0), Color::WHITE);
/// rec.pop_clip();
/// let list = rec.finish();
/// assert_eq!(list.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct DisplayListRecorder {
    items: Vec<DrawItem>,

    /// The top is always the effective clip, already intersected with all parents.
    clip_stack: Vec<Rect>,
}

impl DisplayListRecorder {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops recorded items and the clip stack, keeping capacity.
    #[inline]
    pub fn clear(&mut self) {
        self.items.clear();
        self.clip_stack.clear();
    }

    #[inline]
    pub fn push(&mut self, op: DrawOp) {
        self.items.push(DrawItem {
            op,
            clip: self.clip_stack.last().copied(),
        });
    }

    /// Replaces the clipped area with `color`.
    pub fn clear_to(&mut self, color: Color) {
        self.push(DrawOp::Clear(color));
    }

    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        if rect.is_empty() || !rect.is_finite() {
            return;
        }
        self.push(DrawOp::FillRect { rect, color });
    }

    /// Invokes the functor with this id when the list is drawn.
    pub fn draw_functor(&mut self, functor: FunctorId) {
        self.push(DrawOp::Functor(functor));
    }

    pub fn draw_layer(&mut self, layer: LayerHandle, dst: Rect) {
        self.push(DrawOp::Layer { layer, dst });
    }

    /// Begins a scissor region. Must be balanced with [`pop_clip`](Self::pop_clip).
    pub fn push_clip(&mut self, rect: Rect) {
        let effective = match self.clip_stack.last() {
            None => rect.normalized(),
            // No overlap: a zero-area clip makes backends skip the scoped ops.
            Some(&parent) => parent.intersect(rect).unwrap_or(Rect::new(0.0, 0.0, 0.0, 0.0)),
        };
        self.clip_stack.push(effective);
    }

    /// Ends the innermost scissor region.
    pub fn pop_clip(&mut self) {
        debug_assert!(!self.clip_stack.is_empty(), "pop_clip called without matching push_clip");
        self.clip_stack.pop();
    }

    /// Freezes the recording. The recorder is reset and can be reused.
    pub fn finish(&mut self) -> DisplayList {
        debug_assert!(self.clip_stack.is_empty(), "unbalanced push_clip at finish");
        self.clip_stack.clear();
        DisplayList::from_items(std::mem::take(&mut self.items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_clips_intersect() {
        let mut rec = DisplayListRecorder::new();
        rec.push_clip(Rect::new(0.0, 0.0, 50.0, 50.0));
        rec.push_clip(Rect::new(25.0, 25.0, 50.0, 50.0));
        rec.fill_rect(Rect::new(0.0, 0.0, 10.0, 10.0), Color::BLACK);
        rec.pop_clip();
        rec.fill_rect(Rect::new(0.0, 0.0, 10.0, 10.0), Color::BLACK);
        rec.pop_clip();
        rec.fill_rect(Rect::new(0.0, 0.0, 10.0, 10.0), Color::BLACK);

        let list = rec.finish();
        let clips: Vec<_> = list.items().iter().map(|i| i.clip).collect();
        assert_eq!(
            clips,
            vec![
                Some(Rect::new(25.0, 25.0, 25.0, 25.0)),
                Some(Rect::new(0.0, 0.0, 50.0, 50.0)),
                None,
            ]
        );
    }

    #[test]
    fn disjoint_clip_collapses_to_zero_area() {
        let mut rec = DisplayListRecorder::new();
        rec.push_clip(Rect::new(0.0, 0.0, 10.0, 10.0));
        rec.push_clip(Rect::new(20.0, 20.0, 10.0, 10.0));
        rec.clear_to(Color::WHITE);
        rec.pop_clip();
        rec.pop_clip();

        let list = rec.finish();
        assert!(list.items()[0].clip.unwrap().is_empty());
    }

    #[test]
    fn empty_rects_are_not_recorded() {
        let mut rec = DisplayListRecorder::new();
        rec.fill_rect(Rect::new(0.0, 0.0, 0.0, 10.0), Color::BLACK);
        rec.fill_rect(Rect::new(0.0, 0.0, f32::INFINITY, 10.0), Color::BLACK);
        assert!(rec.finish().is_empty());
    }

    #[test]
    fn finish_resets_and_assigns_fresh_ids() {
        let mut rec = DisplayListRecorder::new();
        let functor = FunctorId::next();
        rec.draw_functor(functor);
        let a = rec.finish();
        let b = rec.finish();

        assert_ne!(a.id(), b.id());
        assert_eq!(a.functors().collect::<Vec<_>>(), vec![functor]);
        assert!(b.is_empty());
        assert_eq!(a.clone(), a);
    }
}
