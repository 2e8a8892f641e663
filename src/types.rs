//! Runtime type descriptors
//!
//! Registrations, plan nodes and instance caches are keyed by [ServiceType]. Most descriptors
//! wrap a plain [TypeId], but the container also needs keys for types that only exist as a
//! combination of other types (the per-consumer cache wrappers), and has to recognise
//! [Deferred] holders without runtime generic instantiation. Both are expressed through the
//! shape carried by the descriptor.

use std::any::{type_name, Any, TypeId};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use crate::deferred::{self, Deferred, DeferredActivator};
use crate::resolve::{Result, WiringError};

/// Type-erased value produced by plans and stored in instance caches
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Convert a configuration string into an instance of the described type
pub type Converter = fn(&str) -> std::result::Result<Instance, String>;

/// Identity of a service type
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKey {
    Native(TypeId),
    Composite {
        definition: TypeId,
        arguments: Arc<[TypeKey]>,
    },
}

/// Marker for the composite keys of the per-consumer cache wrappers
enum ContextWrapperDefinition {}

#[derive(Clone)]
enum Shape {
    Plain,
    Value(Converter),
    Deferred {
        inner: Arc<ServiceType>,
        activate: DeferredActivator,
    },
    ContextWrapper {
        service: Arc<ServiceType>,
        consumer: Arc<ServiceType>,
    },
}

/// Runtime descriptor of a type that can be registered, requested or constructed.
///
/// Equality and hashing only consider the [TypeKey].
#[derive(Clone)]
pub struct ServiceType {
    key: TypeKey,
    name: Cow<'static, str>,
    shape: Shape,
}

impl ServiceType {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            key: TypeKey::Native(TypeId::of::<T>()),
            name: Cow::Borrowed(type_name::<T>()),
            shape: Shape::Plain,
        }
    }

    /// Descriptor of a value type which can be parsed from a configuration string.
    pub fn value<T>() -> Self
    where
        T: FromStr + Send + Sync + 'static,
        T::Err: fmt::Display,
    {
        Self::with_converter::<T>(|raw| {
            raw.parse::<T>()
                .map(|value| Arc::new(value) as Instance)
                .map_err(|e| e.to_string())
        })
    }

    /// Descriptor of a value type parsed from configuration strings by a custom converter.
    ///
    /// The converter must produce instances of `T`.
    pub fn with_converter<T: Send + Sync + 'static>(converter: Converter) -> Self {
        Self {
            shape: Shape::Value(converter),
            ..Self::of::<T>()
        }
    }

    /// Descriptor of a [Deferred] holder for the target type.
    pub fn deferred<T: Dependency>() -> Self {
        Self {
            shape: Shape::Deferred {
                inner: Arc::new(T::service_type()),
                activate: deferred::activate::<T>,
            },
            ..Self::of::<Deferred<T>>()
        }
    }

    /// Synthetic descriptor of the cache wrapper for a (service, consumer) pair.
    pub fn context_wrapper(service: &ServiceType, consumer: &ServiceType) -> Self {
        Self {
            key: TypeKey::Composite {
                definition: TypeId::of::<ContextWrapperDefinition>(),
                arguments: Arc::from(vec![service.key.clone(), consumer.key.clone()]),
            },
            name: Cow::Owned(format!("DependencyContextWrapper<{service}, {consumer}>")),
            shape: Shape::ContextWrapper {
                service: Arc::new(service.clone()),
                consumer: Arc::new(consumer.clone()),
            },
        }
    }

    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.key == TypeKey::Native(TypeId::of::<T>())
    }

    /// Value types and strings can be converted from configuration strings.
    pub fn converter(&self) -> Option<Converter> {
        match self.shape {
            Shape::Value(converter) => Some(converter),
            _ => None,
        }
    }

    pub fn is_convertible(&self) -> bool {
        self.converter().is_some()
    }

    /// Held type and activation function of a [Deferred] descriptor.
    pub(crate) fn deferred_parts(&self) -> Option<(&ServiceType, DeferredActivator)> {
        match &self.shape {
            Shape::Deferred { inner, activate } => Some((inner, *activate)),
            _ => None,
        }
    }

    /// Service and consumer of a cache wrapper descriptor.
    pub fn context_wrapper_parts(&self) -> Option<(&ServiceType, &ServiceType)> {
        match &self.shape {
            Shape::ContextWrapper { service, consumer } => Some((service, consumer)),
            _ => None,
        }
    }
}

impl PartialEq for ServiceType {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for ServiceType {}

impl Hash for ServiceType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceType({})", self.name)
    }
}

/// A type which can be requested from the container and injected into constructors.
///
/// It is implemented for all `Arc<T>`, for [Deferred] holders, for strings and primitive
/// values. Local types only need an empty implementation, or the [setting_value] macro when
/// they can be parsed from configuration strings.
pub trait Dependency: Clone + Send + Sync + 'static {
    fn service_type() -> ServiceType {
        ServiceType::of::<Self>()
    }
}

impl<T: ?Sized + Send + Sync + 'static> Dependency for Arc<T> {}

impl<T: Dependency> Dependency for Deferred<T> {
    fn service_type() -> ServiceType {
        ServiceType::deferred::<T>()
    }
}

/// Declare that local types can be injected from configuration strings.
///
/// The types must implement [FromStr] with a displayable error. `bool` is not declared through
/// this macro: its settings accept `true` and `false` in any case.
#[macro_export]
macro_rules! setting_value {
    ($($ty:ty),+ $(,)?) => {
        $(
        impl $crate::Dependency for $ty {
            fn service_type() -> $crate::ServiceType {
                $crate::ServiceType::value::<Self>()
            }
        }
        )+
    };
}

setting_value!(String, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

impl Dependency for bool {
    fn service_type() -> ServiceType {
        ServiceType::with_converter::<bool>(parse_bool)
    }
}

fn parse_bool(raw: &str) -> std::result::Result<Instance, String> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("true") {
        Ok(Arc::new(true))
    } else if raw.eq_ignore_ascii_case("false") {
        Ok(Arc::new(false))
    } else {
        Err("expected `true` or `false`".to_string())
    }
}

/// Extract a typed value from an instance.
pub fn cast<T: Dependency>(instance: &Instance) -> Result<T> {
    instance
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| WiringError::TypeMismatch {
            expected: type_name::<T>().to_string(),
        })
}

/// Read-only view of one constructor parameter
#[derive(Clone, Debug)]
pub struct ParameterDescriptor {
    name: String,
    parameter_type: ServiceType,
    owner: ServiceType,
    position: usize,
}

impl ParameterDescriptor {
    pub fn new(
        name: impl Into<String>,
        parameter_type: ServiceType,
        owner: ServiceType,
        position: usize,
    ) -> Self {
        Self {
            name: name.into(),
            parameter_type,
            owner,
            position,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type of the parameter
    pub fn parameter_type(&self) -> &ServiceType {
        &self.parameter_type
    }

    /// Implementation type whose constructor declares the parameter
    pub fn owner(&self) -> &ServiceType {
        &self.owner
    }

    pub fn position(&self) -> usize {
        self.position
    }
}
