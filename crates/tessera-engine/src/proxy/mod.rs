//! Control-thread handle to a render context.
//!
//! Every method marshals a command onto the render thread's queue. Synchronous
//! methods then block on the proxy's reply slot until the render thread has
//! issued the work; the render thread itself never waits for the proxy.
//!
//! Blocking calls have no timeout: if the GPU driver wedges, they wait with it.

use std::fmt;
use std::io::{self, Write};

use crossbeam::channel::{Receiver, Sender, bounded};

use crate::backend::{Backend, Bitmap, Capabilities};
use crate::coords::{DirtyRect, Viewport};
use crate::display::DisplayList;
use crate::error::RenderError;
use crate::functor::Functor;
use crate::handle::{FunctorId, LayerHandle, ProxyHandle};
use crate::sweep::{self, ResourceTree};
use crate::thread::{self, Command, DrawArgs, DrawStatus, Envelope, GfxInfo, Rejected, Reply};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Lifecycle {
    Live,
    /// `destroy(true)` ran; only destroy and dispose still do anything.
    Destroyed,
    /// Creation failed or the render thread went away.
    Disabled,
    Disposed,
}

pub struct RenderProxy<B: Backend> {
    handle: ProxyHandle,
    commands: Sender<Envelope<B>>,
    replies: Receiver<Reply>,
    capabilities: Capabilities,
    translucent: bool,
    viewport: Option<Viewport>,
    frame_count: u64,
    state: Lifecycle,
}

impl<B: Backend> RenderProxy<B> {
    pub(crate) fn create(
        commands: Sender<Envelope<B>>,
        capabilities: Capabilities,
        translucent: bool,
    ) -> Result<Self, RenderError> {
        let handle = ProxyHandle::next();
        let (reply_tx, replies) = bounded(1);

        let mut proxy = Self {
            handle,
            commands,
            replies,
            capabilities,
            translucent,
            viewport: None,
            frame_count: 0,
            state: Lifecycle::Live,
        };

        match proxy.request(Command::Create { translucent, reply: reply_tx }) {
            Some(Reply::Created(Ok(()))) => Ok(proxy),
            Some(Reply::Created(Err(err))) => {
                proxy.invalidate_handle();
                Err(err)
            }
            None => {
                proxy.invalidate_handle();
                Err(RenderError::InvalidHandle)
            }
            other => {
                proxy.unexpected("create", other);
                proxy.invalidate_handle();
                Err(RenderError::InvalidHandle)
            }
        }
    }

    pub(crate) fn disabled(commands: Sender<Envelope<B>>, capabilities: Capabilities, translucent: bool) -> Self {
        let (_, replies) = bounded(1);
        Self {
            handle: ProxyHandle::INVALID,
            commands,
            replies,
            capabilities,
            translucent,
            viewport: None,
            frame_count: 0,
            state: Lifecycle::Disabled,
        }
    }

    #[inline]
    pub fn handle(&self) -> ProxyHandle {
        self.handle
    }

    /// `false` after a failed creation, a full destroy, or loss of the render thread.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.state == Lifecycle::Live
    }

    #[inline]
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    #[inline]
    pub fn is_translucent(&self) -> bool {
        self.translucent
    }

    /// Binds the platform surface.
    ///
    /// `Ok(false)` when the proxy is disabled or destroyed. On
    /// `AllocationFailure` the proxy stays usable and may retry.
    pub fn initialize(&mut self, surface: B::Surface) -> Result<bool, RenderError> {
        if !self.is_enabled() {
            return Ok(false);
        }
        match self.request(Command::Initialize(surface)) {
            Some(Reply::Surface(result)) => result.map(|()| true),
            None => Ok(false),
            other => {
                self.unexpected("initialize", other);
                Ok(false)
            }
        }
    }

    /// Replaces the bound surface; `None` detaches rendering until the next bind.
    ///
    /// Returns after the render thread has released the old binding, so the
    /// caller may destroy the old surface right away.
    pub fn update_surface(&mut self, surface: Option<B::Surface>) -> Result<(), RenderError> {
        if !self.is_enabled() {
            return Ok(());
        }
        match self.request(Command::UpdateSurface(surface)) {
            Some(Reply::Surface(result)) => result,
            None => Ok(()),
            other => {
                self.unexpected("update_surface", other);
                Ok(())
            }
        }
    }

    /// Same as `update_surface(Some(surface))`.
    pub fn invalidate(&mut self, surface: B::Surface) -> Result<(), RenderError> {
        self.update_surface(Some(surface))
    }

    /// Sets the viewport. A size equal to the current one is not forwarded.
    ///
    /// Fails with `AllocationFailure` when the bound surface cannot get
    /// buffers of the new size. The surface stays bound, the cached size is
    /// forgotten, and a later `setup` may retry.
    pub fn setup(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if !self.is_enabled() {
            return Ok(());
        }
        let viewport = Viewport::new(width, height);
        if self.viewport == Some(viewport) {
            return Ok(());
        }
        self.viewport = Some(viewport);
        match self.request(Command::Setup(viewport)) {
            Some(Reply::Resized(Ok(()))) | None => Ok(()),
            Some(Reply::Resized(Err(err))) => {
                self.viewport = None;
                Err(err)
            }
            other => {
                self.unexpected("setup", other);
                Ok(())
            }
        }
    }

    /// Cached viewport width; 0 before the first `setup`.
    #[inline]
    pub fn width(&self) -> u32 {
        self.viewport.map_or(0, |vp| vp.width)
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.viewport.map_or(0, |vp| vp.height)
    }

    /// Frames this proxy has had drawn.
    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Draws one frame and returns once it is submitted and queued for
    /// presentation (not when it reaches the screen).
    ///
    /// `None` for `dirty` repaints the whole viewport.
    pub fn draw(&mut self, display_list: &DisplayList, dirty: Option<DirtyRect>) -> DrawStatus {
        if !self.is_enabled() {
            return DrawStatus::Skipped;
        }
        let args = DrawArgs::new(display_list.clone(), dirty.into());
        self.expect_drawn("draw", Command::Draw(args))
    }

    /// Redraws the last submitted display list over the whole viewport.
    pub fn repeat_last_draw(&mut self) -> DrawStatus {
        if !self.is_enabled() {
            return DrawStatus::Skipped;
        }
        self.expect_drawn("repeat_last_draw", Command::RepeatLastDraw)
    }

    /// Releases the surface binding and, when `full`, every GPU resource of
    /// the context. After a full destroy all other calls are no-ops.
    ///
    /// Runs after any draw queued before it.
    pub fn destroy(&mut self, full: bool) {
        if !self.is_enabled() {
            return;
        }
        self.expect_done("destroy", Command::Destroy { full });
        if full && self.state == Lifecycle::Live {
            self.state = Lifecycle::Destroyed;
        }
    }

    /// Registers `functor` so display lists may reference it by id.
    /// Attaching an already attached functor changes nothing.
    pub fn attach_functor(&mut self, functor: &Functor<B>) -> Result<(), RenderError> {
        if !self.is_enabled() {
            return Ok(());
        }
        self.require(Capabilities::FUNCTORS)?;
        self.send(Command::AttachFunctor(functor.clone()));
        Ok(())
    }

    /// Unregisters a functor. Unknown ids are ignored.
    ///
    /// Lists drawn after this call skip the functor; the callback itself is
    /// released on the render thread once the detach executes.
    pub fn detach_functor(&mut self, id: FunctorId) {
        if self.is_enabled() {
            self.send(Command::DetachFunctor(id));
        }
    }

    /// Allocates an offscreen layer of `width x height` pixels.
    pub fn create_display_list_layer(&mut self, width: u32, height: u32) -> Result<LayerHandle, RenderError> {
        if !self.is_enabled() {
            return Err(RenderError::InvalidHandle);
        }
        self.require(Capabilities::LAYERS)?;
        match self.request(Command::CreateLayer { width, height }) {
            Some(Reply::Layer(result)) => result,
            None => Err(RenderError::InvalidHandle),
            other => {
                self.unexpected("create_layer", other);
                Err(RenderError::InvalidHandle)
            }
        }
    }

    /// Queues `display_list` to be recorded into `layer` before the next draw.
    pub fn push_layer_update(&mut self, layer: LayerHandle, display_list: &DisplayList) -> Result<(), RenderError> {
        if !self.is_enabled() {
            return Ok(());
        }
        self.require(Capabilities::LAYERS)?;
        self.send(Command::PushLayerUpdate {
            layer,
            display_list: display_list.clone(),
        });
        Ok(())
    }

    /// Applies queued layer updates without drawing a frame.
    pub fn flush_layer_updates(&mut self) {
        if self.is_enabled() && self.capabilities.contains(Capabilities::LAYERS) {
            self.send(Command::FlushLayerUpdates);
        }
    }

    /// Reads a layer's pixels back, after applying its queued updates.
    pub fn copy_layer_into(&mut self, layer: LayerHandle) -> Result<Bitmap, RenderError> {
        if !self.is_enabled() {
            return Err(RenderError::InvalidHandle);
        }
        self.require(Capabilities::LAYERS | Capabilities::LAYER_READBACK)?;
        match self.request(Command::CopyLayer(layer)) {
            Some(Reply::Pixels(result)) => result,
            None => Err(RenderError::InvalidHandle),
            other => {
                self.unexpected("copy_layer", other);
                Err(RenderError::InvalidHandle)
            }
        }
    }

    /// Frees a layer's backing on the render thread. Unknown handles are ignored.
    pub fn destroy_layer(&mut self, layer: LayerHandle) {
        if self.is_enabled() && self.capabilities.contains(Capabilities::LAYERS) {
            self.send(Command::DestroyLayer(layer));
        }
    }

    /// Walks `tree` from `root` releasing each node's resources, then has the
    /// render thread drop its cached recordings and trim backend caches.
    ///
    /// The walk runs on the calling thread even when the proxy is disabled.
    /// Returns the number of nodes visited.
    pub fn destroy_hardware_resources<T>(&mut self, tree: &mut T, root: T::Node) -> usize
    where
        T: ResourceTree + ?Sized,
    {
        let visited = sweep::release_resources(tree, root);
        if self.is_enabled() {
            self.send(Command::FlushCaches);
        }
        visited
    }

    /// Labels the context in logs and reports.
    pub fn set_name(&mut self, name: impl Into<String>) {
        if self.is_enabled() {
            self.send(Command::SetName(name.into()));
        }
    }

    /// Snapshot of the render-thread side of this proxy.
    pub fn gfx_info(&mut self) -> Option<GfxInfo> {
        if !self.is_enabled() {
            return None;
        }
        match self.request(Command::DumpInfo) {
            Some(Reply::Info(info)) => Some(*info),
            None => None,
            other => {
                self.unexpected("dump_info", other);
                None
            }
        }
    }

    /// Writes a human-readable report of the context to `out`.
    pub fn dump_gfx_info(&mut self, out: &mut impl Write) -> io::Result<()> {
        match self.gfx_info() {
            Some(info) => writeln!(out, "{info}"),
            None => writeln!(out, "Render context {} ({:?})", self.handle, self.state),
        }
    }

    /// Blocks until every command this proxy submitted earlier has executed.
    pub fn fence(&mut self) {
        if self.is_enabled() {
            self.expect_done("fence", Command::Fence);
        }
    }

    /// Destroys the render-thread context. Does not wait.
    pub fn dispose(mut self) {
        self.dispose_context();
    }

    fn dispose_context(&mut self) {
        if self.state == Lifecycle::Disposed {
            return;
        }
        if self.handle.is_valid() {
            let envelope = Envelope::Command {
                handle: self.handle,
                command: Command::Dispose,
            };
            match thread::submit(&self.commands, envelope) {
                Ok(()) => {}
                Err(Rejected::Disconnected) => {
                    log::debug!("proxy {}: render thread gone before dispose", self.handle);
                }
                Err(Rejected::Full) => {
                    log::error!("proxy {}: render queue full; context leaks until shutdown", self.handle);
                }
            }
        }
        self.state = Lifecycle::Disposed;
    }

    fn require(&self, needed: Capabilities) -> Result<(), RenderError> {
        let missing = needed.difference(self.capabilities);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(RenderError::UnsupportedOperation(missing))
        }
    }

    /// Fire-and-forget submission. Disables the proxy if the thread is gone.
    fn send(&mut self, command: Command<B>) -> bool {
        let name = command.name();
        let envelope = Envelope::Command {
            handle: self.handle,
            command,
        };
        match thread::submit(&self.commands, envelope) {
            Ok(()) => true,
            Err(Rejected::Full) => {
                log::warn!("proxy {}: render queue full; {name} from the render thread dropped", self.handle);
                false
            }
            Err(Rejected::Disconnected) => {
                self.disable("render thread gone");
                false
            }
        }
    }

    /// Synchronous submission. `None` means the thread went away (the proxy is
    /// disabled by then) or the call was made on the render thread.
    fn request(&mut self, command: Command<B>) -> Option<Reply> {
        if thread::on_render_thread() {
            log::error!(
                "proxy {}: {} called on the render thread would wait on itself; ignored",
                self.handle,
                command.name()
            );
            return None;
        }
        if !self.send(command) {
            return None;
        }
        match self.replies.recv() {
            Ok(reply) => Some(reply),
            Err(_) => {
                self.disable("render thread stopped before replying");
                None
            }
        }
    }

    fn expect_done(&mut self, what: &str, command: Command<B>) {
        match self.request(command) {
            Some(Reply::Done) | None => {}
            other => self.unexpected(what, other),
        }
    }

    fn expect_drawn(&mut self, what: &str, command: Command<B>) -> DrawStatus {
        match self.request(command) {
            Some(Reply::Drawn(status)) => {
                if status == DrawStatus::Drawn {
                    self.frame_count += 1;
                }
                status
            }
            None => DrawStatus::Skipped,
            other => {
                self.unexpected(what, other);
                DrawStatus::Skipped
            }
        }
    }

    fn unexpected(&self, what: &str, reply: Option<Reply>) {
        log::error!("proxy {}: unexpected reply to {what}: {reply:?}", self.handle);
    }

    fn disable(&mut self, reason: &str) {
        if self.state == Lifecycle::Live || self.state == Lifecycle::Destroyed {
            log::error!("proxy {}: {reason}; disabling", self.handle);
            self.state = Lifecycle::Disabled;
        }
    }

    fn invalidate_handle(&mut self) {
        self.handle = ProxyHandle::INVALID;
        self.state = Lifecycle::Disabled;
    }
}

impl<B: Backend> Drop for RenderProxy<B> {
    fn drop(&mut self) {
        if matches!(self.state, Lifecycle::Live | Lifecycle::Destroyed) {
            log::warn!("proxy {} dropped without dispose", self.handle);
        }
        self.dispose_context();
    }
}

impl<B: Backend> fmt::Debug for RenderProxy<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderProxy")
            .field("handle", &self.handle)
            .field("state", &self.state)
            .field("viewport", &self.viewport)
            .field("frame_count", &self.frame_count)
            .finish()
    }
}
