//! Messages between proxies and the render thread.

use crossbeam::channel::Sender;

use crate::backend::{Backend, Bitmap};
use crate::coords::{DirtyRegion, Viewport};
use crate::display::DisplayList;
use crate::error::RenderError;
use crate::functor::Functor;
use crate::handle::{FunctorId, LayerHandle, ProxyHandle};

use super::context::GfxInfo;

pub(crate) type Task = Box<dyn FnOnce() + Send + 'static>;

/// One unit of work on the shared command queue.
pub(crate) enum Envelope<B: Backend> {
    Command { handle: ProxyHandle, command: Command<B> },
    Task(Task),
    Shutdown,
}

/// Per-context command. Variants documented as synchronous always produce
/// exactly one [`Reply`]; the rest produce none.
pub(crate) enum Command<B: Backend> {
    /// Synchronous. Carries the reply slot the context will answer on for its
    /// whole lifetime.
    Create { translucent: bool, reply: Sender<Reply> },
    /// Synchronous.
    Initialize(B::Surface),
    /// Synchronous.
    UpdateSurface(Option<B::Surface>),
    /// Synchronous.
    Setup(Viewport),
    /// Synchronous.
    Draw(DrawArgs),
    /// Synchronous.
    RepeatLastDraw,
    /// Synchronous.
    Destroy { full: bool },
    AttachFunctor(Functor<B>),
    DetachFunctor(FunctorId),
    /// Synchronous.
    CreateLayer { width: u32, height: u32 },
    PushLayerUpdate { layer: LayerHandle, display_list: DisplayList },
    FlushLayerUpdates,
    /// Synchronous.
    CopyLayer(LayerHandle),
    DestroyLayer(LayerHandle),
    FlushCaches,
    SetName(String),
    /// Synchronous.
    DumpInfo,
    /// Synchronous.
    Fence,
    Dispose,
}

impl<B: Backend> Command<B> {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Create { .. } => "create",
            Command::Initialize(_) => "initialize",
            Command::UpdateSurface(_) => "update_surface",
            Command::Setup(_) => "setup",
            Command::Draw(_) => "draw",
            Command::RepeatLastDraw => "repeat_last_draw",
            Command::Destroy { .. } => "destroy",
            Command::AttachFunctor(_) => "attach_functor",
            Command::DetachFunctor(_) => "detach_functor",
            Command::CreateLayer { .. } => "create_layer",
            Command::PushLayerUpdate { .. } => "push_layer_update",
            Command::FlushLayerUpdates => "flush_layer_updates",
            Command::CopyLayer(_) => "copy_layer",
            Command::DestroyLayer(_) => "destroy_layer",
            Command::FlushCaches => "flush_caches",
            Command::SetName(_) => "set_name",
            Command::DumpInfo => "dump_info",
            Command::Fence => "fence",
            Command::Dispose => "dispose",
        }
    }
}

/// Acknowledgement of a synchronous command.
#[derive(Debug)]
pub(crate) enum Reply {
    Created(Result<(), RenderError>),
    Done,
    Surface(Result<(), RenderError>),
    Resized(Result<(), RenderError>),
    Drawn(DrawStatus),
    Layer(Result<LayerHandle, RenderError>),
    Pixels(Result<Bitmap, RenderError>),
    Info(Box<GfxInfo>),
}

/// Outcome of a draw request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DrawStatus {
    /// The frame was submitted and queued for presentation.
    Drawn,
    /// Nothing was drawn: no surface, no viewport, empty damage, a lost
    /// surface frame, or a disabled/destroyed proxy.
    Skipped,
}

/// Fixed-size draw record: the display list plus the dirty rectangle as four
/// integers. `(-1, -1, -1, -1)` requests a full repaint.
#[derive(Debug, Clone)]
pub(crate) struct DrawArgs {
    pub display_list: DisplayList,
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl DrawArgs {
    pub fn new(display_list: DisplayList, dirty: DirtyRegion) -> Self {
        let [left, top, right, bottom] = dirty.encode();
        Self { display_list, left, top, right, bottom }
    }

    #[inline]
    pub fn dirty(&self) -> DirtyRegion {
        DirtyRegion::decode([self.left, self.top, self.right, self.bottom])
    }
}
