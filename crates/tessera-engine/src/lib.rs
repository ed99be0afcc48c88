//! Tessera engine crate.
//!
//! A render thread owns the GPU backend and every GPU-resident resource;
//! control threads drive it through [`RenderProxy`] handles that forward
//! commands over a bounded queue.

pub mod backend;
pub mod coords;
pub mod display;
pub mod error;
pub mod functor;
pub mod handle;
pub mod logging;
pub mod proxy;
mod registry;
pub mod sweep;
pub mod thread;

pub use backend::{Backend, Capabilities};
pub use error::RenderError;
pub use functor::{DrawFunctor, Functor, FunctorInfo};
pub use proxy::RenderProxy;
pub use sweep::ResourceTree;
pub use thread::{DrawStatus, GfxInfo, RenderThread, RenderThreadConfig};
