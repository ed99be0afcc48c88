//! Display lists: immutable draw recordings handed to the render thread.
//!
//! Responsibilities:
//! - record renderer-agnostic draw operations in paint order
//! - bake the active clip into every recorded item
//! - share the finished recording by reference count (cloning never copies ops)

mod list;
mod recorder;

pub use list::{DisplayList, DrawItem, DrawOp};
pub use recorder::DisplayListRecorder;
