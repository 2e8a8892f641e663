//! Traits and structs describing the host container contract
//!
//! The context and convention engines never talk to [crate::Hanami] directly: they are written
//! against the traits of this module, which describe what a host container has to offer.
//!
//! * The [Resolver] trait gives access to instances, either type-erased or through
//!   the typed `resolve::<T>()` accessor on `dyn Resolver`.
//! * The [HostContainer] trait adds the registration side: zero-argument factories, the
//!   [PlanCompiled] and [UnregisteredType] extension points, and the decoration point for the
//!   parameter behaviors.
//! * The [VerificationBehavior] and [InjectionBehavior] traits are consulted for every
//!   constructor parameter while a construction plan is being built.

use std::mem;
use std::sync::Arc;

use thiserror::Error;

use crate::inject::Scope;
use crate::plan::{Function, PlanNode};
use crate::types::{cast, Dependency, Instance, ParameterDescriptor, ServiceType};

/// Errors triggered during the autowiring process
#[derive(Error, Debug)]
pub enum WiringError {
    #[error("Cyclic dependencies: {0} depends on itself")]
    CyclicResolution(String),
    #[error("Consistency error: {0} has already been registered")]
    AlreadyRegistered(String),
    #[error("The container is locked after its first use: {0} cannot be registered")]
    Locked(String),
    #[error("No registration for type {0} could be found")]
    NotRegistered(String),
    #[error("Type {0} is registered as scoped but was resolved outside of a scope")]
    NoActiveScope(String),
    #[error("Type mismatch: expected an instance of {expected}")]
    TypeMismatch { expected: String },
    #[error("Constructor of {implementation} takes {expected} parameters but {given} names were given")]
    ParameterCount {
        implementation: String,
        expected: usize,
        given: usize,
    },
    #[error("The context factory for consumer {consumer} already failed: {reason}")]
    ContextFactoryFailed { consumer: String, reason: String },
    #[error("The container backing this deferred value has been dropped")]
    ContainerDropped,
    #[error("No app setting with key '{key}' could be found in the application's configuration")]
    MissingAppSetting { key: String },
    #[error("App setting '{key}' with value '{value}' cannot be converted to {target}: {reason}")]
    InvalidAppSetting {
        key: String,
        value: String,
        target: String,
        reason: String,
    },
    #[error("No connection string for parameter '{parameter}' could be found, tried {attempted:?}")]
    MissingConnectionString {
        parameter: String,
        attempted: Vec<String>,
    },
    #[error("{convention} cannot build a value for parameter '{parameter}' of type {parameter_type}")]
    UnsupportedParameter {
        convention: &'static str,
        parameter: String,
        parameter_type: String,
    },
    #[error("Invalid configuration: {0}")]
    Configuration(#[from] Box<figment::Error>),
}

pub type Result<T, E = WiringError> = std::result::Result<T, E>;

/// Lifetime policy of a registration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// A new instance for every request
    #[default]
    Transient,
    /// A single instance for the whole container
    Singleton,
    /// A single instance per [Scope]
    Scoped,
}

/// Detached resolution callback, used by values which resolve long after their construction
pub type DetachedResolver = Arc<dyn Fn(&ServiceType) -> Result<Instance> + Send + Sync>;

/// Obtain instances from a container
pub trait Resolver: Send + Sync {
    /// Resolve a type-erased instance of the target type.
    fn resolve_service(&self, service: &ServiceType) -> Result<Instance>;

    /// Build a resolution callback that does not keep the container alive.
    fn detach(&self) -> DetachedResolver;

    /// The scope in which the current resolution happens, if any.
    fn scope(&self) -> Option<&Scope> {
        None
    }
}

impl dyn Resolver + '_ {
    /// Obtain an instance of the target type.
    pub fn resolve<T: Dependency>(&self) -> Result<T> {
        let service = T::service_type();
        cast(&self.resolve_service(&service)?)
    }
}

/// Event raised each time the host has built the construction plan of a registration.
///
/// Subscribers may replace the plan before the lifetime policy is applied to it.
pub struct PlanCompiled {
    registered_service: ServiceType,
    plan: PlanNode,
}

impl PlanCompiled {
    pub fn new(registered_service: ServiceType, plan: PlanNode) -> Self {
        Self {
            registered_service,
            plan,
        }
    }

    pub fn registered_service(&self) -> &ServiceType {
        &self.registered_service
    }

    pub fn plan(&self) -> &PlanNode {
        &self.plan
    }

    /// Replace the plan with a transformed version of itself.
    pub fn rewrite(&mut self, rewrite: impl FnOnce(PlanNode) -> PlanNode) {
        let plan = mem::replace(&mut self.plan, PlanNode::constant(()));
        self.plan = rewrite(plan);
    }

    pub fn into_plan(self) -> PlanNode {
        self.plan
    }
}

/// Event raised when a type without registration is requested.
///
/// The first subscriber able to handle it supplies a [Registration], later subscribers
/// see the event as handled.
pub struct UnregisteredType {
    service_type: ServiceType,
    registration: Option<Registration>,
}

impl UnregisteredType {
    pub fn new(service_type: ServiceType) -> Self {
        Self {
            service_type,
            registration: None,
        }
    }

    pub fn service_type(&self) -> &ServiceType {
        &self.service_type
    }

    pub fn handled(&self) -> bool {
        self.registration.is_some()
    }

    /// Supply the registration for the requested type.
    ///
    /// Return an error if another subscriber already handled the request
    pub fn register(&mut self, registration: Registration) -> Result<()> {
        if self.handled() {
            return Err(WiringError::AlreadyRegistered(
                self.service_type.to_string(),
            ));
        }
        self.registration = Some(registration);
        Ok(())
    }

    pub fn into_registration(self) -> Option<Registration> {
        self.registration
    }
}

pub type PlanCompiledHook = Arc<dyn Fn(&mut PlanCompiled) + Send + Sync>;
pub type UnregisteredTypeHook = Arc<dyn Fn(&mut UnregisteredType) -> Result<()> + Send + Sync>;

/// How a registration produces its instances
#[derive(Clone)]
pub(crate) enum Source {
    Function(Function),
    Constructor {
        implementation: ServiceType,
        parameters: Vec<ParameterDescriptor>,
        activator: crate::plan::Activator,
    },
    Instance(Instance),
}

/// A service type bound to the source of its instances and a lifetime
#[derive(Clone)]
pub struct Registration {
    service: ServiceType,
    lifetime: Lifetime,
    source: Source,
}

impl Registration {
    /// Instances are produced by a function invoked without arguments.
    pub fn function(service: ServiceType, lifetime: Lifetime, function: Function) -> Self {
        Self {
            service,
            lifetime,
            source: Source::Function(function),
        }
    }

    /// A single pre-built instance.
    pub fn instance(service: ServiceType, instance: Instance) -> Self {
        Self {
            service,
            lifetime: Lifetime::Singleton,
            source: Source::Instance(instance),
        }
    }

    pub(crate) fn constructor(
        service: ServiceType,
        lifetime: Lifetime,
        implementation: ServiceType,
        parameters: Vec<ParameterDescriptor>,
        activator: crate::plan::Activator,
    ) -> Self {
        Self {
            service,
            lifetime,
            source: Source::Constructor {
                implementation,
                parameters,
                activator,
            },
        }
    }

    pub fn service(&self) -> &ServiceType {
        &self.service
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub(crate) fn source(&self) -> &Source {
        &self.source
    }
}

/// Access to the plans of other registrations while a construction plan is being built
pub trait DependencyPlans {
    /// Plan producing an instance of the target type, ready to be inlined.
    fn dependency_plan(&self, service: &ServiceType) -> Result<PlanNode>;
}

/// Verify that a constructor parameter can be supplied
pub trait VerificationBehavior: Send + Sync {
    fn verify(&self, parameter: &ParameterDescriptor, plans: &dyn DependencyPlans) -> Result<()>;
}

/// Build the plan node supplying a constructor parameter
pub trait InjectionBehavior: Send + Sync {
    fn build_parameter(
        &self,
        parameter: &ParameterDescriptor,
        plans: &dyn DependencyPlans,
    ) -> Result<PlanNode>;
}

/// The pair of behaviors consulted for every constructor parameter
#[derive(Clone)]
pub struct ParameterBehaviors {
    pub verification: Arc<dyn VerificationBehavior>,
    pub injection: Arc<dyn InjectionBehavior>,
}

/// Registration side of a host container
pub trait HostContainer: Resolver {
    /// Register a zero-argument function as the source of a service type.
    fn register_function(
        &self,
        service: ServiceType,
        lifetime: Lifetime,
        function: Function,
    ) -> Result<()>;

    /// Subscribe to the compilation of every construction plan.
    fn on_plan_compiled(&self, hook: PlanCompiledHook) -> Result<()>;

    /// Subscribe to requests for types without registration.
    fn on_unregistered_type(&self, hook: UnregisteredTypeHook) -> Result<()>;

    fn parameter_behaviors(&self) -> ParameterBehaviors;

    /// Replace the parameter behaviors, usually by decorating the current ones.
    fn set_parameter_behaviors(&self, behaviors: ParameterBehaviors) -> Result<()>;
}
