//! Context-based injection
//!
//! A context factory receives a [DependencyContext] describing the consumer of the value it
//! produces. The context is recovered from the construction plans compiled by the container
//! (see [rewriter]), and values can be cached per (consumer, service) pair with a
//! [DependencyContextWrapper].

use std::fmt;

use crate::types::ServiceType;

pub(crate) mod rewriter;
mod wrapper;

pub use wrapper::DependencyContextWrapper;

/// Describes the context in which a service request must be fulfilled.
#[derive(Clone, PartialEq, Eq)]
pub struct DependencyContext {
    service_type: Option<ServiceType>,
    implementation_type: Option<ServiceType>,
    cache_key: Option<ServiceType>,
}

impl DependencyContext {
    /// Context of a service requested directly from the container
    pub const ROOT: DependencyContext = DependencyContext {
        service_type: None,
        implementation_type: None,
        cache_key: None,
    };

    pub fn root() -> Self {
        Self::ROOT
    }

    pub(crate) fn new(
        service_type: ServiceType,
        implementation_type: ServiceType,
        dependency_type: &ServiceType,
    ) -> Self {
        let cache_key = ServiceType::context_wrapper(dependency_type, &implementation_type);
        Self {
            service_type: Some(service_type),
            implementation_type: Some(implementation_type),
            cache_key: Some(cache_key),
        }
    }

    /// The type of service that is being requested.
    pub fn service_type(&self) -> Option<&ServiceType> {
        self.service_type.as_ref()
    }

    /// The type to which the created service will be handed over.
    pub fn implementation_type(&self) -> Option<&ServiceType> {
        self.implementation_type.as_ref()
    }

    /// The wrapper type caching values for this consumer.
    pub fn cache_key(&self) -> Option<&ServiceType> {
        self.cache_key.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.implementation_type.is_none()
    }
}

impl fmt::Debug for DependencyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyContext")
            .field("service_type", &self.service_type)
            .field("implementation_type", &self.implementation_type)
            .finish()
    }
}
