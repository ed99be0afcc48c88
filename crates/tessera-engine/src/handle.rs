//! Opaque identifiers handed across the thread boundary.
//!
//! Every id is process-unique and never reused, so a stale handle can only miss
//! in a registry lookup; it can never alias a newer resource.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident, $counter:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(NonZeroU64);

        static $counter: AtomicU64 = AtomicU64::new(1);

        impl $name {
            pub(crate) fn next() -> Self {
                let raw = $counter.fetch_add(1, Ordering::Relaxed);
                // The counter starts at 1 and would need 2^64 allocations to wrap.
                Self(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
            }

            #[inline]
            pub fn get(self) -> u64 {
                self.0.get()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

opaque_id!(
    /// Identity of an immutable display list recording.
    DisplayListId,
    NEXT_DISPLAY_LIST
);

opaque_id!(
    /// Identity of an externally owned draw callback.
    FunctorId,
    NEXT_FUNCTOR
);

opaque_id!(
    /// Offscreen render target owned by the render thread.
    LayerHandle,
    NEXT_LAYER
);

static NEXT_PROXY: AtomicU64 = AtomicU64::new(1);

/// Control-side identifier of a rendering context.
///
/// Zero is the invalid handle a proxy carries when its context could not be
/// allocated.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ProxyHandle(u64);

impl ProxyHandle {
    pub const INVALID: ProxyHandle = ProxyHandle(0);

    pub(crate) fn next() -> Self {
        Self(NEXT_PROXY.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ProxyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "ProxyHandle#{}", self.0)
        } else {
            f.write_str("ProxyHandle(invalid)")
        }
    }
}

impl fmt::Display for ProxyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_nonzero() {
        let a = LayerHandle::next();
        let b = LayerHandle::next();
        assert_ne!(a, b);
        assert!(a.get() > 0);
    }

    #[test]
    fn proxy_handles_start_valid() {
        assert!(ProxyHandle::next().is_valid());
        assert!(!ProxyHandle::INVALID.is_valid());
        assert_eq!(ProxyHandle::default(), ProxyHandle::INVALID);
    }
}
