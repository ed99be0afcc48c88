//! Per-context resource tables owned by the render thread.
//!
//! Nothing here is shared: a registry lives inside one canvas context and is
//! only touched while the render thread executes that context's commands.

use std::collections::HashMap;

use crate::backend::Backend;
use crate::coords::Viewport;
use crate::display::DisplayList;
use crate::functor::Functor;
use crate::handle::{FunctorId, LayerHandle};

/// A layer together with the size it was allocated at.
pub(crate) struct LayerEntry<B: Backend> {
    pub layer: B::Layer,
    pub size: Viewport,
}

pub(crate) struct ResourceRegistry<B: Backend> {
    functors: HashMap<FunctorId, Functor<B>>,
    layers: HashMap<LayerHandle, LayerEntry<B>>,
    /// Re-records waiting for the next draw or explicit flush, in push order.
    pending_layer_updates: Vec<(LayerHandle, DisplayList)>,
    /// Kept for replay; dropped by a cache flush.
    last_drawn: Option<DisplayList>,
}

impl<B: Backend> Default for ResourceRegistry<B> {
    fn default() -> Self {
        Self {
            functors: HashMap::new(),
            layers: HashMap::new(),
            pending_layer_updates: Vec::new(),
            last_drawn: None,
        }
    }
}

impl<B: Backend> ResourceRegistry<B> {
    /// Returns `false` when the id was already attached; the first entry wins.
    pub fn attach_functor(&mut self, functor: Functor<B>) -> bool {
        match self.functors.entry(functor.id()) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(functor);
                true
            }
        }
    }

    pub fn detach_functor(&mut self, id: FunctorId) -> bool {
        self.functors.remove(&id).is_some()
    }

    #[inline]
    pub fn functor(&self, id: FunctorId) -> Option<&Functor<B>> {
        self.functors.get(&id)
    }

    pub fn insert_layer(&mut self, layer: B::Layer, size: Viewport) -> LayerHandle {
        let handle = LayerHandle::next();
        self.layers.insert(handle, LayerEntry { layer, size });
        handle
    }

    #[inline]
    pub fn layer(&self, handle: LayerHandle) -> Option<&LayerEntry<B>> {
        self.layers.get(&handle)
    }

    /// Temporarily removes a layer so it can be re-recorded while the rest of
    /// the registry stays readable. Pair with [`restore_layer`](Self::restore_layer).
    pub fn take_layer(&mut self, handle: LayerHandle) -> Option<LayerEntry<B>> {
        self.layers.remove(&handle)
    }

    pub fn restore_layer(&mut self, handle: LayerHandle, entry: LayerEntry<B>) {
        self.layers.insert(handle, entry);
    }

    /// Unregisters a layer and drops any update still queued for it.
    pub fn remove_layer(&mut self, handle: LayerHandle) -> Option<LayerEntry<B>> {
        let entry = self.layers.remove(&handle)?;
        self.pending_layer_updates.retain(|(h, _)| *h != handle);
        Some(entry)
    }

    /// Queues a re-record. A later update for the same layer replaces an
    /// earlier one that has not been applied yet.
    ///
    /// Returns `false` for unknown layers.
    pub fn queue_layer_update(&mut self, handle: LayerHandle, list: DisplayList) -> bool {
        if !self.layers.contains_key(&handle) {
            return false;
        }
        match self.pending_layer_updates.iter_mut().find(|(h, _)| *h == handle) {
            Some(pending) => pending.1 = list,
            None => self.pending_layer_updates.push((handle, list)),
        }
        true
    }

    pub fn take_layer_updates(&mut self) -> Vec<(LayerHandle, DisplayList)> {
        std::mem::take(&mut self.pending_layer_updates)
    }

    #[inline]
    pub fn has_pending_layer_updates(&self) -> bool {
        !self.pending_layer_updates.is_empty()
    }

    pub fn set_last_drawn(&mut self, list: DisplayList) {
        self.last_drawn = Some(list);
    }

    #[inline]
    pub fn last_drawn(&self) -> Option<&DisplayList> {
        self.last_drawn.as_ref()
    }

    /// Drops cached recordings. Layers and functors are untouched.
    pub fn flush_caches(&mut self) {
        self.last_drawn = None;
    }

    #[inline]
    pub fn functor_count(&self) -> usize {
        self.functors.len()
    }

    #[inline]
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Display lists the registry currently keeps alive.
    pub fn cached_display_lists(&self) -> usize {
        self.pending_layer_updates.len() + usize::from(self.last_drawn.is_some())
    }

    /// Releases every entry, freeing layer backings through `backend`.
    pub fn clear(&mut self, backend: &mut B) {
        self.functors.clear();
        self.pending_layer_updates.clear();
        self.last_drawn = None;
        for (_, entry) in self.layers.drain() {
            backend.destroy_layer(entry.layer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::HeadlessBackend;
    use crate::display::DisplayListRecorder;

    type Registry = ResourceRegistry<HeadlessBackend>;

    fn noop_functor() -> Functor<HeadlessBackend> {
        Functor::<HeadlessBackend>::from_fn(|_, _| {})
    }

    #[test]
    fn functor_attach_is_idempotent() {
        let mut reg = Registry::default();
        let f = noop_functor();

        assert!(reg.attach_functor(f.clone()));
        assert!(!reg.attach_functor(f.clone()));
        assert_eq!(reg.functor_count(), 1);

        assert!(reg.detach_functor(f.id()));
        assert!(!reg.detach_functor(f.id()));
        assert_eq!(reg.functor_count(), 0);
    }

    #[test]
    fn layer_updates_coalesce_per_layer() {
        let mut backend = HeadlessBackend::default();
        let mut reg = Registry::default();
        let a = reg.insert_layer(backend.create_layer(2, 2).unwrap(), Viewport::new(2, 2));
        let b = reg.insert_layer(backend.create_layer(2, 2).unwrap(), Viewport::new(2, 2));

        let mut rec = DisplayListRecorder::new();
        let first = rec.finish();
        let second = rec.finish();
        let third = rec.finish();

        assert!(reg.queue_layer_update(a, first));
        assert!(reg.queue_layer_update(b, second));
        assert!(reg.queue_layer_update(a, third.clone()));

        let updates = reg.take_layer_updates();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].0, a);
        assert_eq!(updates[0].1, third);
        assert!(!reg.has_pending_layer_updates());
    }

    #[test]
    fn removed_layers_reject_updates() {
        let mut backend = HeadlessBackend::default();
        let mut reg = Registry::default();
        let layer = reg.insert_layer(backend.create_layer(1, 1).unwrap(), Viewport::new(1, 1));
        assert!(reg.queue_layer_update(layer, DisplayList::empty()));

        assert!(reg.remove_layer(layer).is_some());
        assert!(!reg.has_pending_layer_updates());
        assert!(!reg.queue_layer_update(layer, DisplayList::empty()));
        assert!(reg.remove_layer(layer).is_none());
    }

    #[test]
    fn clear_releases_everything() {
        let mut backend = HeadlessBackend::default();
        let mut reg = Registry::default();
        reg.attach_functor(noop_functor());
        reg.insert_layer(backend.create_layer(1, 1).unwrap(), Viewport::new(1, 1));
        reg.set_last_drawn(DisplayList::empty());
        assert_eq!(reg.cached_display_lists(), 1);

        reg.clear(&mut backend);
        assert_eq!(reg.functor_count(), 0);
        assert_eq!(reg.layer_count(), 0);
        assert_eq!(reg.cached_display_lists(), 0);
    }
}
