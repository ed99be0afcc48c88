//! The render thread: sole owner of a backend and every context's GPU state.
//!
//! Proxies and [`RenderThread::post`] share one bounded FIFO queue, so work
//! executes strictly in submission order. The thread only ever blocks on
//! receiving the next envelope; replies go out with `try_send`.
//!
//! There are no timeouts. A wedged driver stalls the thread and every caller
//! waiting on a synchronous proxy call.
//!
//! Work submitted from the render thread itself (a posted task or a functor)
//! never waits for queue space: when the queue is full it is rejected.

mod channel;
mod context;

use std::cell::Cell;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread::JoinHandle;

use anyhow::{Context as _, Result, anyhow};
use crossbeam::channel::{Receiver, Sender, TrySendError, bounded};

use crate::backend::{Backend, Capabilities};
use crate::error::RenderError;
use crate::handle::ProxyHandle;
use crate::proxy::RenderProxy;

pub(crate) use channel::{Command, DrawArgs, Envelope, Reply};
pub use channel::DrawStatus;
pub use context::{FrameStats, GfxInfo};

use context::CanvasContext;

thread_local! {
    static ON_RENDER_THREAD: Cell<bool> = const { Cell::new(false) };
}

/// `true` while running on a render thread.
pub(crate) fn on_render_thread() -> bool {
    ON_RENDER_THREAD.with(Cell::get)
}

/// Why an envelope was not queued.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Rejected {
    /// The render thread has exited.
    Disconnected,
    /// The queue was full and the sender is the render thread, which is the
    /// only one that could make room.
    Full,
}

/// Queues `envelope`, waiting for space unless called on the render thread.
pub(crate) fn submit<B: Backend>(queue: &Sender<Envelope<B>>, envelope: Envelope<B>) -> Result<(), Rejected> {
    if on_render_thread() {
        return queue.try_send(envelope).map_err(|err| match err {
            TrySendError::Full(_) => Rejected::Full,
            TrySendError::Disconnected(_) => Rejected::Disconnected,
        });
    }
    queue.send(envelope).map_err(|_| Rejected::Disconnected)
}

/// Render thread configuration.
#[derive(Debug, Clone)]
pub struct RenderThreadConfig {
    /// OS thread name; shows up in debuggers and panic messages.
    pub thread_name: String,

    /// Envelopes the command queue holds before senders block.
    ///
    /// Only fire-and-forget submissions ever wait here; synchronous calls wait
    /// on their reply anyway.
    pub command_capacity: usize,
}

impl Default for RenderThreadConfig {
    fn default() -> Self {
        Self {
            thread_name: "tessera-render".to_owned(),
            command_capacity: 64,
        }
    }
}

/// Handle to a running render thread.
///
/// Dropping it shuts the thread down after the queue drains; contexts whose
/// proxies were not disposed are torn down with a warning.
pub struct RenderThread<B: Backend> {
    commands: Sender<Envelope<B>>,
    capabilities: Capabilities,
    backend_name: &'static str,
    join: Option<JoinHandle<()>>,
}

impl<B: Backend> RenderThread<B> {
    /// Spawns the thread and builds the backend on it with `factory`.
    ///
    /// Returns once the backend is up; a factory error is returned here.
    pub fn spawn<F>(config: RenderThreadConfig, factory: F) -> Result<Self>
    where
        F: FnOnce() -> Result<B> + Send + 'static,
    {
        let (commands, queue) = bounded::<Envelope<B>>(config.command_capacity.max(1));
        let (ready_tx, ready_rx) = bounded::<Result<(Capabilities, &'static str)>>(1);

        let join = std::thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || match factory() {
                Ok(backend) => {
                    let _ = ready_tx.send(Ok((backend.capabilities(), backend.name())));
                    drop(ready_tx);
                    run(backend, queue);
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            })
            .context("failed to spawn render thread")?;

        let (capabilities, backend_name) = match ready_rx.recv() {
            Ok(Ok(ready)) => ready,
            Ok(Err(err)) => {
                let _ = join.join();
                return Err(err.context("render backend initialization failed"));
            }
            Err(_) => {
                let _ = join.join();
                return Err(anyhow!("render thread exited during startup"));
            }
        };

        log::info!(
            "render thread '{}' started ({backend_name}, {capabilities:?})",
            config.thread_name
        );

        Ok(Self {
            commands,
            capabilities,
            backend_name,
            join: Some(join),
        })
    }

    #[inline]
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    #[inline]
    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    /// Creates a proxy whose context lives on this thread.
    ///
    /// On allocation failure the proxy comes back disabled with an invalid
    /// handle; every call on it is then a no-op.
    pub fn create_proxy(&self, translucent: bool) -> RenderProxy<B> {
        match self.try_create_proxy(translucent) {
            Ok(proxy) => proxy,
            Err(err) => {
                log::warn!("render context allocation failed: {err}; proxy disabled");
                RenderProxy::disabled(self.commands.clone(), self.capabilities, translucent)
            }
        }
    }

    /// Like [`create_proxy`](Self::create_proxy) but reports the failure.
    pub fn try_create_proxy(&self, translucent: bool) -> Result<RenderProxy<B>, RenderError> {
        RenderProxy::create(self.commands.clone(), self.capabilities, translucent)
    }

    /// Runs `task` on the render thread after everything queued before it.
    ///
    /// The task must not wait on control-thread state. A panicking task is
    /// logged and the thread keeps running. Returns `false` if the thread is
    /// gone, or if the queue is full and the caller is the render thread.
    pub fn post<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match submit(&self.commands, Envelope::Task(Box::new(task))) {
            Ok(()) => true,
            Err(Rejected::Full) => {
                log::warn!("render queue full; task posted from the render thread dropped");
                false
            }
            Err(Rejected::Disconnected) => false,
        }
    }
}

impl<B: Backend> Drop for RenderThread<B> {
    fn drop(&mut self) {
        let _ = self.commands.send(Envelope::Shutdown);
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::error!("render thread panicked");
            }
        }
    }
}

fn run<B: Backend>(mut backend: B, queue: Receiver<Envelope<B>>) {
    ON_RENDER_THREAD.with(|flag| flag.set(true));
    let mut contexts: HashMap<ProxyHandle, CanvasContext<B>> = HashMap::new();

    for envelope in queue.iter() {
        match envelope {
            Envelope::Command {
                handle,
                command: Command::Create { translucent, reply },
            } => match backend.create_canvas(translucent) {
                Ok(canvas) => {
                    let ctx = CanvasContext::new(handle, canvas, reply);
                    ctx.acknowledge("create", Reply::Created(Ok(())));
                    contexts.insert(handle, ctx);
                    log::debug!("context {handle} created (translucent={translucent})");
                }
                Err(err) => {
                    log::warn!("context {handle} allocation failed: {err}");
                    if reply.try_send(Reply::Created(Err(err))).is_err() {
                        log::error!("proxy {handle} gone; dropping create acknowledgement");
                    }
                }
            },

            Envelope::Command {
                handle,
                command: Command::Dispose,
            } => match contexts.remove(&handle) {
                Some(ctx) => ctx.teardown(&mut backend),
                None => log::debug!("dispose of unknown context {handle} ignored"),
            },

            Envelope::Command { handle, command } => match contexts.get_mut(&handle) {
                Some(ctx) => ctx.dispatch(&mut backend, command),
                None => log::debug!("{} for unknown context {handle} dropped", command.name()),
            },

            Envelope::Task(task) => {
                if catch_unwind(AssertUnwindSafe(task)).is_err() {
                    log::error!("posted render task panicked");
                }
            }

            Envelope::Shutdown => break,
        }
    }

    for (handle, ctx) in contexts.drain() {
        log::warn!("context {handle} ('{}') still live at shutdown; tearing down", ctx.name());
        ctx.teardown(&mut backend);
    }
    log::info!("render thread stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::backend::headless::{HeadlessBackend, HeadlessConfig};

    fn headless() -> RenderThread<HeadlessBackend> {
        RenderThread::spawn(RenderThreadConfig::default(), || Ok(HeadlessBackend::default())).unwrap()
    }

    #[test]
    fn factory_errors_surface_from_spawn() {
        let result = RenderThread::<HeadlessBackend>::spawn(RenderThreadConfig::default(), || {
            Err(anyhow!("no adapter"))
        });
        let err = result.err().unwrap();
        assert!(format!("{err:#}").contains("no adapter"));
    }

    #[test]
    fn spawn_reports_backend_capabilities() {
        let thread = RenderThread::spawn(RenderThreadConfig::default(), || {
            Ok(HeadlessBackend::new(HeadlessConfig {
                capabilities: Capabilities::FUNCTORS,
                ..HeadlessConfig::default()
            }))
        })
        .unwrap();
        assert_eq!(thread.capabilities(), Capabilities::FUNCTORS);
        assert_eq!(thread.backend_name(), "headless");
    }

    #[test]
    fn posted_tasks_run_in_order_and_survive_panics() {
        let thread = headless();
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let log = Arc::clone(&log);
            assert!(thread.post(move || log.lock().push(i)));
        }
        assert!(thread.post(|| panic!("task bug")));
        let tail = Arc::clone(&log);
        assert!(thread.post(move || tail.lock().push(3)));

        drop(thread);
        assert_eq!(*log.lock(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn render_thread_submissions_never_wait_for_space() {
        let (queue, backlog) = bounded::<Envelope<HeadlessBackend>>(1);
        assert_eq!(submit(&queue, Envelope::Task(Box::new(|| {}))), Ok(()));
        assert!(!on_render_thread());

        let outcome = std::thread::spawn(move || {
            ON_RENDER_THREAD.with(|flag| flag.set(true));
            submit(&queue, Envelope::Task(Box::new(|| {})))
        })
        .join()
        .unwrap();

        assert_eq!(outcome, Err(Rejected::Full));
        assert_eq!(backlog.len(), 1);
    }

    #[test]
    fn tasks_run_on_the_render_thread() {
        let thread = headless();
        let seen = Arc::new(Mutex::new(None));
        let flag = Arc::clone(&seen);
        assert!(thread.post(move || *flag.lock() = Some(on_render_thread())));
        drop(thread);
        assert_eq!(*seen.lock(), Some(true));
    }

    #[test]
    fn shutdown_tears_down_undisposed_contexts() {
        let thread = headless();
        let proxy = thread.create_proxy(false);
        assert!(proxy.is_enabled());

        // Thread first: the proxy's own dispose then finds the queue closed.
        drop(thread);
        drop(proxy);
    }
}
