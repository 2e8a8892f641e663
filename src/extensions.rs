//! Advanced registrations
//!
//! The [AdvancedRegistration] trait is implemented for every [HostContainer]: context-based
//! registrations, lazy values and parameter conventions are wired into the host through its
//! extension points only.
//!
//! ```
//! # use std::sync::Arc;
//! # use hanami_advanced::*;
//! struct Logger {
//!     category: String,
//! }
//!
//! struct Repository {
//!     logger: Arc<Logger>,
//! }
//!
//! # fn main() -> Result<(), WiringError> {
//! let container = Hanami::new();
//! container.register_with_context(|context: &DependencyContext, _: &dyn Resolver| {
//!     let category = context
//!         .implementation_type()
//!         .map(|consumer| consumer.to_string())
//!         .unwrap_or_else(|| "root".to_string());
//!     Ok(Arc::new(Logger { category }))
//! })?;
//! container.register(
//!     Lifetime::Transient,
//!     Constructor::new(&["logger"], |logger: Arc<Logger>| Repository { logger })?.map(Arc::new),
//! )?;
//!
//! let repository: Arc<Repository> = container.resolve()?;
//! assert!(repository.logger.category.ends_with("Repository"));
//! let logger: Arc<Logger> = container.resolve()?;
//! assert_eq!(logger.category, "root");
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tracing::debug;

use crate::context::rewriter::rewrite_root_calls;
use crate::context::{DependencyContext, DependencyContextWrapper};
use crate::conventions::{self, ParameterConvention};
use crate::plan::Function;
use crate::resolve::{
    HostContainer, Lifetime, PlanCompiled, Registration, Resolver, Result, UnregisteredType,
    WiringError,
};
use crate::types::{Dependency, Instance, ServiceType};

/// Registration methods built on the extension points of a host container
pub trait AdvancedRegistration: HostContainer {
    /// Register a factory which receives the context of the consumer of each produced value.
    ///
    /// The factory is called for each request. When the service is requested directly, it
    /// receives [DependencyContext::ROOT].
    ///
    /// Return an error if the container is locked or the service is already registered
    fn register_with_context<T, F>(&self, factory: F) -> Result<()>
    where
        T: Dependency,
        F: Fn(&DependencyContext, &dyn Resolver) -> Result<T> + Send + Sync + 'static,
    {
        let service = T::service_type();
        let context_function = Function::new(
            format!("context<{service}>"),
            move |resolver: &dyn Resolver, arguments: &[Instance]| {
                let context = context_argument(arguments)?;
                Ok(Arc::new(factory(context, resolver)?) as Instance)
            },
        );
        attach_context_function(self, service, context_function)
    }

    /// Register a context factory whose values are cached per consumer type.
    ///
    /// Each consumer type gets a [DependencyContextWrapper] living under the given lifetime, and
    /// the factory is called at most once per wrapper. Direct requests are not cached.
    fn register_cached_with_context<T, F>(&self, factory: F, lifetime: Lifetime) -> Result<()>
    where
        T: Dependency,
        F: Fn(&DependencyContext, &dyn Resolver) -> Result<T> + Send + Sync + 'static,
    {
        let service = T::service_type();
        let context_function = Function::new(
            format!("cached_context<{service}>"),
            move |resolver: &dyn Resolver, arguments: &[Instance]| {
                let context = context_argument(arguments)?;
                let Some(cache_key) = context.cache_key() else {
                    return Ok(Arc::new(factory(context, resolver)?) as Instance);
                };
                let wrapper = resolver.resolve_service(cache_key)?;
                let wrapper = wrapper
                    .downcast_ref::<DependencyContextWrapper<T>>()
                    .ok_or_else(|| WiringError::TypeMismatch {
                        expected: cache_key.to_string(),
                    })?;
                let value = wrapper.get_or_create(|| factory(context, resolver))?;
                Ok(Arc::new(value) as Instance)
            },
        );
        attach_context_function(self, service.clone(), context_function)?;

        let hook_service = service.clone();
        self.on_unregistered_type(Arc::new(move |event: &mut UnregisteredType| {
            if event.handled() {
                return Ok(());
            }
            let consumer = match event.service_type().context_wrapper_parts() {
                Some((wrapped, consumer)) if *wrapped == hook_service => consumer.clone(),
                _ => return Ok(()),
            };
            let wrapper = event.service_type().clone();
            let function = Function::new(
                wrapper.to_string(),
                move |_: &dyn Resolver, _: &[Instance]| {
                    Ok(Arc::new(DependencyContextWrapper::<T>::new(consumer.clone())) as Instance)
                },
            );
            event.register(Registration::function(wrapper, lifetime, function))
        }))?;
        debug!(service = %service, ?lifetime, "context cache attached");
        Ok(())
    }

    /// Register a context factory called at most once per consumer type for the lifetime of
    /// the container.
    fn register_single_with_context<T, F>(&self, factory: F) -> Result<()>
    where
        T: Dependency,
        F: Fn(&DependencyContext, &dyn Resolver) -> Result<T> + Send + Sync + 'static,
    {
        self.register_cached_with_context(factory, Lifetime::Singleton)
    }

    /// Supply a [crate::Deferred] holder for any type that can be resolved.
    ///
    /// The held type is only resolved when the holder is forced.
    fn register_lazy(&self) -> Result<()> {
        self.on_unregistered_type(Arc::new(|event: &mut UnregisteredType| {
            if event.handled() {
                return Ok(());
            }
            let Some((held, activate)) = event.service_type().deferred_parts() else {
                return Ok(());
            };
            let held = held.clone();
            let requested = event.service_type().clone();
            let function = Function::new(
                requested.to_string(),
                move |resolver: &dyn Resolver, _: &[Instance]| {
                    Ok(activate(resolver.detach(), held.clone()))
                },
            );
            event.register(Registration::function(requested, Lifetime::Transient, function))
        }))?;
        debug!("lazy registration attached");
        Ok(())
    }

    /// Supply constructor parameters from a convention.
    ///
    /// Conventions registered later are asked first.
    fn register_parameter_convention<C>(&self, convention: C) -> Result<()>
    where
        C: ParameterConvention + 'static,
    {
        let behaviors = conventions::decorate(self.parameter_behaviors(), Arc::new(convention));
        self.set_parameter_behaviors(behaviors)?;
        debug!(convention = std::any::type_name::<C>(), "parameter convention registered");
        Ok(())
    }
}

impl<H: HostContainer + ?Sized> AdvancedRegistration for H {}

fn context_argument(arguments: &[Instance]) -> Result<&DependencyContext> {
    arguments
        .first()
        .and_then(|argument| argument.downcast_ref::<DependencyContext>())
        .ok_or_else(|| WiringError::TypeMismatch {
            expected: ServiceType::of::<DependencyContext>().to_string(),
        })
}

/// Register the root factory of a context function and rewrite the plans calling it.
fn attach_context_function<H>(host: &H, service: ServiceType, context_function: Function) -> Result<()>
where
    H: HostContainer + ?Sized,
{
    let root_context = context_function.clone();
    let root_factory = Function::new(
        format!("root<{service}>"),
        move |resolver: &dyn Resolver, _: &[Instance]| {
            let context: Instance = Arc::new(DependencyContext::ROOT);
            root_context.call(resolver, &[context])
        },
    );
    let root_id = root_factory.id();
    host.register_function(service.clone(), Lifetime::Transient, root_factory)?;

    let dependency = service.clone();
    host.on_plan_compiled(Arc::new(move |event: &mut PlanCompiled| {
        if *event.registered_service() == dependency {
            return;
        }
        let registered = event.registered_service().clone();
        event.rewrite(|plan| {
            rewrite_root_calls(plan, &registered, &dependency, root_id, &context_function)
        });
    }))?;
    debug!(service = %service, "context registration attached");
    Ok(())
}
