//! Deferred values
//!
//! A [Deferred] holder computes its value on first access and memoizes it. When the lazy
//! registration is active, the container supplies `Deferred<T>` for any injectable `T`
//! without explicit registration, resolving `T` only when the holder is forced.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::resolve::{DetachedResolver, Result};
use crate::types::{cast, Dependency, Instance, ServiceType};

type Source<T> = Arc<dyn Fn() -> Result<T> + Send + Sync>;

/// Build the type-erased `Deferred<T>` for a held service type
pub(crate) type DeferredActivator = fn(DetachedResolver, ServiceType) -> Instance;

/// A value computed on first access and memoized thereafter.
///
/// Clones share the memoized value. A failed computation is not memoized.
pub struct Deferred<T> {
    cell: Arc<OnceCell<T>>,
    source: Source<T>,
}

impl<T> Deferred<T> {
    pub fn new<F>(source: F) -> Self
    where
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        Self {
            cell: Arc::new(OnceCell::new()),
            source: Arc::new(source),
        }
    }

    /// Force the holder and borrow its value.
    pub fn get(&self) -> Result<&T> {
        self.cell.get_or_try_init(|| (self.source)())
    }

    pub fn is_created(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T: Clone> Deferred<T> {
    /// Force the holder and clone its value.
    pub fn value(&self) -> Result<T> {
        self.get().cloned()
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            source: self.source.clone(),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("created", &self.is_created())
            .finish()
    }
}

/// Build a `Deferred<T>` which resolves the held type when forced
pub(crate) fn activate<T: Dependency>(resolver: DetachedResolver, held: ServiceType) -> Instance {
    Arc::new(Deferred::<T>::new(move || cast::<T>(&resolver(&held)?)))
}
