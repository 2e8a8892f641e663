use std::fmt;

use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::resolve::{Result, WiringError};
use crate::types::ServiceType;

/// Cache of the value produced for one consumer type.
///
/// The container supplies one wrapper per (consumer, service) pair, under the lifetime chosen
/// at registration. Whatever that lifetime, the factory behind a wrapper runs at most once.
pub struct DependencyContextWrapper<T> {
    consumer: ServiceType,
    outcome: OnceCell<std::result::Result<T, String>>,
}

impl<T: Clone> DependencyContextWrapper<T> {
    pub fn new(consumer: ServiceType) -> Self {
        Self {
            consumer,
            outcome: OnceCell::new(),
        }
    }

    pub fn consumer(&self) -> &ServiceType {
        &self.consumer
    }

    /// True once the factory has run, whether it succeeded or not
    pub fn is_populated(&self) -> bool {
        self.outcome.get().is_some()
    }

    /// Return the cached value, producing it on first access.
    ///
    /// Concurrent first accesses block until the single call to `create` returns.
    /// A failure is stored as well: the caller that ran `create` gets its error,
    /// later callers get [WiringError::ContextFactoryFailed] and `create` is not called again.
    pub fn get_or_create(&self, create: impl FnOnce() -> Result<T>) -> Result<T> {
        let mut failure = None;
        let outcome = self.outcome.get_or_init(|| {
            debug!(consumer = %self.consumer, "populating context cache");
            create().map_err(|e| {
                warn!(consumer = %self.consumer, error = %e, "context factory failed");
                let reason = e.to_string();
                failure = Some(e);
                reason
            })
        });
        if let Some(e) = failure {
            return Err(e);
        }
        match outcome {
            Ok(value) => Ok(value.clone()),
            Err(reason) => Err(WiringError::ContextFactoryFailed {
                consumer: self.consumer.to_string(),
                reason: reason.clone(),
            }),
        }
    }
}

impl<T> fmt::Debug for DependencyContextWrapper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyContextWrapper")
            .field("consumer", &self.consumer)
            .field("populated", &self.outcome.get().is_some())
            .finish()
    }
}
