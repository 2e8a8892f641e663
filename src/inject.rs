use std::cell::RefCell;
use std::collections::hash_map::{Entry, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tracing::{debug, trace, warn};

use crate::constructor::Constructor;
use crate::plan::{Function, PlanNode};
use crate::resolve::*;
use crate::types::{cast, Dependency, Instance, ParameterDescriptor, ServiceType, TypeKey};

/// Dependency injection container.
///
/// Registrations are accepted until the first resolution (or [Hanami::verify]), after which
/// the container is locked. Construction plans are compiled once per service type, on first
/// request, and cached.
///
/// Clones share the same registrations and instances.
#[derive(Clone, Default)]
pub struct Hanami {
    inner: Arc<Inner>,
}

struct Inner {
    registry: RwLock<Registry>,
    plan_compiled: RwLock<Vec<PlanCompiledHook>>,
    unregistered_type: RwLock<Vec<UnregisteredTypeHook>>,
    behaviors: RwLock<ParameterBehaviors>,
    /// Compiled plans, readable without waiting for a compilation in progress
    compiled: RwLock<HashMap<TypeKey, Arc<PlanNode>>>,
    /// Serializes plan compilation
    plans: ReentrantMutex<RefCell<TypeMap>>,
    locked: AtomicBool,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            registry: RwLock::default(),
            plan_compiled: RwLock::default(),
            unregistered_type: RwLock::default(),
            behaviors: RwLock::new(ParameterBehaviors {
                verification: Arc::new(DefaultVerificationBehavior),
                injection: Arc::new(DefaultInjectionBehavior),
            }),
            compiled: RwLock::default(),
            plans: ReentrantMutex::default(),
            locked: AtomicBool::new(false),
        }
    }
}

#[derive(Default)]
struct Registry {
    entries: HashMap<TypeKey, Registration>,
    order: Vec<ServiceType>,
}

#[derive(Debug)]
enum TypeMapEntry {
    Resolving,
    Ready(Arc<PlanNode>),
}

/// Store the compiled plans, and mark the plans under compilation
#[derive(Default)]
struct TypeMap(HashMap<TypeKey, TypeMapEntry>);

/// Parameters are supplied by the plan of their declared type
struct DefaultVerificationBehavior;

impl VerificationBehavior for DefaultVerificationBehavior {
    fn verify(
        &self,
        parameter: &ParameterDescriptor,
        plans: &dyn DependencyPlans,
    ) -> Result<()> {
        plans.dependency_plan(parameter.parameter_type()).map(|_| ())
    }
}

struct DefaultInjectionBehavior;

impl InjectionBehavior for DefaultInjectionBehavior {
    fn build_parameter(
        &self,
        parameter: &ParameterDescriptor,
        plans: &dyn DependencyPlans,
    ) -> Result<PlanNode> {
        plans.dependency_plan(parameter.parameter_type())
    }
}

impl Hanami {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the constructor of the implementation of a service type.
    pub fn register<S: Dependency>(&self, lifetime: Lifetime, constructor: Constructor<S>) -> Result<()> {
        let (implementation, parameters, activator) = constructor.into_parts();
        self.add(Registration::constructor(
            S::service_type(),
            lifetime,
            implementation,
            parameters,
            activator,
        ))
    }

    /// Register a factory building the service from the resolver.
    pub fn register_factory<S, F>(&self, lifetime: Lifetime, factory: F) -> Result<()>
    where
        S: Dependency,
        F: Fn(&dyn Resolver) -> Result<S> + Send + Sync + 'static,
    {
        let service = S::service_type();
        let function = Function::new(
            format!("factory<{service}>"),
            move |resolver: &dyn Resolver, _: &[Instance]| {
                Ok(Arc::new(factory(resolver)?) as Instance)
            },
        );
        self.add(Registration::function(service, lifetime, function))
    }

    /// Register a single pre-built instance.
    pub fn register_instance<S: Dependency>(&self, instance: S) -> Result<()> {
        self.add(Registration::instance(S::service_type(), Arc::new(instance)))
    }

    pub fn is_registered(&self, service: &ServiceType) -> bool {
        self.inner.registry.read().entries.contains_key(service.key())
    }

    pub fn is_locked(&self) -> bool {
        self.inner.locked.load(Ordering::Acquire)
    }

    /// Obtain an instance of the target type.
    ///
    /// Return an error if the type could not be resolved
    pub fn resolve<T: Dependency>(&self) -> Result<T> {
        cast(&self.resolve_service(&T::service_type())?)
    }

    /// Start a scope for the instances registered with [Lifetime::Scoped].
    pub fn begin_scope(&self) -> Scope {
        Scope {
            container: self.clone(),
            instances: Arc::default(),
        }
    }

    /// Lock the container, compile the plans of all registrations, then create one instance of
    /// each of them inside a scope.
    pub fn verify(&self) -> Result<()> {
        self.lock();
        let services = self.inner.registry.read().order.clone();
        for service in &services {
            self.plan(service)?;
        }
        let scope = self.begin_scope();
        for service in &services {
            scope.resolve_service(service)?;
        }
        debug!(registrations = services.len(), "container verified");
        Ok(())
    }

    fn lock(&self) {
        if !self.inner.locked.swap(true, Ordering::AcqRel) {
            debug!("container locked");
        }
    }

    fn check_unlocked(&self, what: impl FnOnce() -> String) -> Result<()> {
        if self.is_locked() {
            return Err(WiringError::Locked(what()));
        }
        Ok(())
    }

    fn add(&self, registration: Registration) -> Result<()> {
        self.check_unlocked(|| registration.service().to_string())?;
        let mut registry = self.inner.registry.write();
        let service = registration.service().clone();
        match registry.entries.entry(service.key().clone()) {
            Entry::Occupied(_) => return Err(WiringError::AlreadyRegistered(service.to_string())),
            Entry::Vacant(v) => {
                v.insert(registration);
            }
        }
        debug!(service = %service, "registered");
        registry.order.push(service);
        Ok(())
    }

    /// Find the registration of a service, asking the unregistered type hooks if needed.
    fn registration(&self, service: &ServiceType) -> Result<Registration> {
        if let Some(registration) = self.inner.registry.read().entries.get(service.key()) {
            return Ok(registration.clone());
        }

        let hooks = self.inner.unregistered_type.read().clone();
        let mut event = UnregisteredType::new(service.clone());
        for hook in &hooks {
            hook(&mut event)?;
        }
        let Some(registration) = event.into_registration() else {
            return Err(WiringError::NotRegistered(service.to_string()));
        };

        let mut registry = self.inner.registry.write();
        let registration = match registry.entries.entry(service.key().clone()) {
            Entry::Occupied(o) => o.get().clone(),
            Entry::Vacant(v) => {
                trace!(service = %service, "registered on request");
                v.insert(registration).clone()
            }
        };
        Ok(registration)
    }

    /// Compiled plan of a service type.
    ///
    /// Compiled plans are read under a shared lock. Compilation itself is serialized.
    ///
    /// Return an error if the plan depends on itself
    fn plan(&self, service: &ServiceType) -> Result<Arc<PlanNode>> {
        if let Some(plan) = self.inner.compiled.read().get(service.key()) {
            return Ok(plan.clone());
        }
        let guard = self.inner.plans.lock();
        match guard.borrow().0.get(service.key()) {
            Some(TypeMapEntry::Ready(plan)) => return Ok(plan.clone()),
            Some(TypeMapEntry::Resolving) => {
                warn!(service = %service, "cyclic dependency");
                return Err(WiringError::CyclicResolution(service.to_string()));
            }
            None => (),
        }
        guard
            .borrow_mut()
            .0
            .insert(service.key().clone(), TypeMapEntry::Resolving);

        let compiled = self.compile(service);
        let mut tm = guard.borrow_mut();
        match compiled {
            Ok(plan) => {
                let plan = Arc::new(plan);
                tm.0.insert(service.key().clone(), TypeMapEntry::Ready(plan.clone()));
                self.inner
                    .compiled
                    .write()
                    .insert(service.key().clone(), plan.clone());
                Ok(plan)
            }
            Err(e) => {
                tm.0.remove(service.key());
                Err(e)
            }
        }
    }

    fn compile(&self, service: &ServiceType) -> Result<PlanNode> {
        let registration = self.registration(service)?;
        let plan = match registration.source() {
            Source::Function(function) => PlanNode::invoke(function.clone(), vec![]),
            Source::Instance(instance) => PlanNode::Constant(instance.clone()),
            Source::Constructor {
                implementation,
                parameters,
                activator,
            } => {
                let behaviors = self.parameter_behaviors();
                let mut arguments = Vec::with_capacity(parameters.len());
                for parameter in parameters {
                    behaviors.verification.verify(parameter, self)?;
                    arguments.push(behaviors.injection.build_parameter(parameter, self)?);
                }
                PlanNode::Construct {
                    implementation: implementation.clone(),
                    activator: activator.clone(),
                    arguments,
                }
            }
        };

        let hooks = self.inner.plan_compiled.read().clone();
        let mut event = PlanCompiled::new(service.clone(), plan);
        for hook in &hooks {
            hook(&mut event);
        }
        let plan = event.into_plan();
        trace!(service = %service, plan = ?plan, "compiled construction plan");

        Ok(apply_lifetime(service, registration.lifetime(), plan))
    }

    fn resolve_in(&self, service: &ServiceType, resolver: &dyn Resolver) -> Result<Instance> {
        self.lock();
        let plan = self.plan(service)?;
        trace!(service = %service, "resolving");
        plan.evaluate(resolver)
    }
}

/// Wrap a plan to share its instances according to the lifetime.
fn apply_lifetime(service: &ServiceType, lifetime: Lifetime, plan: PlanNode) -> PlanNode {
    match (lifetime, plan) {
        (_, PlanNode::Constant(instance)) => PlanNode::Constant(instance),
        (Lifetime::Transient, plan) => plan,
        (Lifetime::Singleton, plan) => {
            let cell: OnceCell<Instance> = OnceCell::new();
            let function = Function::new(
                format!("singleton<{service}>"),
                move |resolver: &dyn Resolver, _: &[Instance]| {
                    cell.get_or_try_init(|| plan.evaluate(resolver)).cloned()
                },
            );
            PlanNode::invoke(function, vec![])
        }
        (Lifetime::Scoped, plan) => {
            let service = service.clone();
            let function = Function::new(
                format!("scoped<{service}>"),
                move |resolver: &dyn Resolver, _: &[Instance]| {
                    let scope = resolver
                        .scope()
                        .ok_or_else(|| WiringError::NoActiveScope(service.to_string()))?;
                    scope.instance(&service, || plan.evaluate(resolver))
                },
            );
            PlanNode::invoke(function, vec![])
        }
    }
}

fn detached(container: Weak<Inner>) -> DetachedResolver {
    Arc::new(move |service: &ServiceType| {
        let inner = container.upgrade().ok_or(WiringError::ContainerDropped)?;
        Hanami { inner }.resolve_service(service)
    })
}

impl Resolver for Hanami {
    fn resolve_service(&self, service: &ServiceType) -> Result<Instance> {
        self.resolve_in(service, self)
    }

    fn detach(&self) -> DetachedResolver {
        detached(Arc::downgrade(&self.inner))
    }
}

impl DependencyPlans for Hanami {
    fn dependency_plan(&self, service: &ServiceType) -> Result<PlanNode> {
        self.plan(service).map(|plan| (*plan).clone())
    }
}

impl HostContainer for Hanami {
    fn register_function(
        &self,
        service: ServiceType,
        lifetime: Lifetime,
        function: Function,
    ) -> Result<()> {
        self.add(Registration::function(service, lifetime, function))
    }

    fn on_plan_compiled(&self, hook: PlanCompiledHook) -> Result<()> {
        self.check_unlocked(|| "plan compiled hook".to_string())?;
        self.inner.plan_compiled.write().push(hook);
        Ok(())
    }

    fn on_unregistered_type(&self, hook: UnregisteredTypeHook) -> Result<()> {
        self.check_unlocked(|| "unregistered type hook".to_string())?;
        self.inner.unregistered_type.write().push(hook);
        Ok(())
    }

    fn parameter_behaviors(&self) -> ParameterBehaviors {
        self.inner.behaviors.read().clone()
    }

    fn set_parameter_behaviors(&self, behaviors: ParameterBehaviors) -> Result<()> {
        self.check_unlocked(|| "parameter behaviors".to_string())?;
        *self.inner.behaviors.write() = behaviors;
        Ok(())
    }
}

type ScopedInstances = Mutex<HashMap<TypeKey, Arc<OnceCell<Instance>>>>;

/// Resolution scope.
///
/// Services registered with [Lifetime::Scoped] are created once per scope, other services
/// behave as when resolved from the container.
#[derive(Clone)]
pub struct Scope {
    container: Hanami,
    instances: Arc<ScopedInstances>,
}

impl Scope {
    pub fn resolve<T: Dependency>(&self) -> Result<T> {
        cast(&self.resolve_service(&T::service_type())?)
    }

    /// Instance of a scoped service, created on first request.
    pub(crate) fn instance(
        &self,
        service: &ServiceType,
        create: impl FnOnce() -> Result<Instance>,
    ) -> Result<Instance> {
        let cell = self
            .instances
            .lock()
            .entry(service.key().clone())
            .or_default()
            .clone();
        cell.get_or_try_init(create).cloned()
    }
}

impl Resolver for Scope {
    fn resolve_service(&self, service: &ServiceType) -> Result<Instance> {
        self.container.resolve_in(service, self)
    }

    /// Resolve in the scope while it is alive, then in the container alone.
    fn detach(&self) -> DetachedResolver {
        let container = Arc::downgrade(&self.container.inner);
        let instances = Arc::downgrade(&self.instances);
        Arc::new(move |service: &ServiceType| {
            let inner = container.upgrade().ok_or(WiringError::ContainerDropped)?;
            let container = Hanami { inner };
            match instances.upgrade() {
                Some(instances) => Scope {
                    container,
                    instances,
                }
                .resolve_service(service),
                None => container.resolve_service(service),
            }
        })
    }

    fn scope(&self) -> Option<&Scope> {
        Some(self)
    }
}
