use std::fmt;
use std::sync::Arc;

use crate::coords::{Color, Rect};
use crate::handle::{DisplayListId, FunctorId, LayerHandle};

/// Renderer-agnostic draw operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// Replaces every pixel inside the clip with `Color` (no blending).
    Clear(Color),
    /// Source-over fill of a rectangle.
    FillRect { rect: Rect, color: Color },
    /// Runs an attached functor inline. Unknown ids are skipped.
    Functor(FunctorId),
    /// Composites an offscreen layer into `dst`. Unknown handles are skipped.
    Layer { layer: LayerHandle, dst: Rect },
}

/// A recorded operation plus the clip that was active when it was recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawItem {
    pub op: DrawOp,
    /// Scissor rect in pixels. `None` = no clipping beyond the dirty region.
    pub clip: Option<Rect>,
}

struct Recording {
    id: DisplayListId,
    items: Box<[DrawItem]>,
}

/// Immutable, shareable draw recording.
///
/// The scene collaborator produces these; the render thread only ever reads
/// them. Cloning bumps a reference count, so passing a list through the command
/// channel never allocates.
#[derive(Clone)]
pub struct DisplayList {
    inner: Arc<Recording>,
}

impl DisplayList {
    pub(crate) fn from_items(items: Vec<DrawItem>) -> Self {
        Self {
            inner: Arc::new(Recording {
                id: DisplayListId::next(),
                items: items.into_boxed_slice(),
            }),
        }
    }

    /// An empty recording. Drawing it still clears the dirty region.
    pub fn empty() -> Self {
        Self::from_items(Vec::new())
    }

    #[inline]
    pub fn id(&self) -> DisplayListId {
        self.inner.id
    }

    /// Items in paint order (back-to-front).
    #[inline]
    pub fn items(&self) -> &[DrawItem] {
        &self.inner.items
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.items.is_empty()
    }

    /// Functors referenced by this list, in paint order.
    pub fn functors(&self) -> impl Iterator<Item = FunctorId> + '_ {
        self.items().iter().filter_map(|item| match item.op {
            DrawOp::Functor(id) => Some(id),
            _ => None,
        })
    }
}

impl PartialEq for DisplayList {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for DisplayList {}

impl fmt::Debug for DisplayList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayList")
            .field("id", &self.inner.id)
            .field("items", &self.inner.items.len())
            .finish()
    }
}
