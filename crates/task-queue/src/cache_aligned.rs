use crossbeam_utils::CachePadded;
use std::ops::Deref;

/// Cache-line-padded wrapper, used to isolate each spin-lock word (ring
/// cursor lock, continuation-table lock) from the cursors/counters it
/// guards, since the lock is CAS'd on every contested call while the guarded
/// fields are touched far less often.
///
/// A thin shim over [`crossbeam_utils::CachePadded`].
pub(crate) struct CacheAligned<T>(CachePadded<T>);

impl<T> CacheAligned<T> {
    pub(crate) fn new(value: T) -> Self {
        Self(CachePadded::new(value))
    }
}

impl<T> Deref for CacheAligned<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
