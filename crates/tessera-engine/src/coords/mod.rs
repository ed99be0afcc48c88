//! Geometry and color types shared by the proxy, display lists and backends.
//!
//! Canonical space:
//! - pixels, origin top-left, +X right, +Y down
//! - draw geometry is `f32` ([`Rect`]); damage tracking is integral ([`DirtyRect`])

mod color;
mod dirty;
mod rect;
mod viewport;

pub use color::Color;
pub use dirty::{DirtyRect, DirtyRegion};
pub use rect::{PixelBounds, Rect};
pub use viewport::Viewport;
