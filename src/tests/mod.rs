use std::sync::Arc;

use super::*;

mod config;
mod container;
mod lazy;

/// Value produced by the context factories, remembering the context it was built for
#[derive(Debug)]
struct Dependable {
    service: Option<ServiceType>,
    consumer: Option<ServiceType>,
}

impl Dependable {
    fn new(context: &DependencyContext) -> Self {
        Self {
            service: context.service_type().cloned(),
            consumer: context.implementation_type().cloned(),
        }
    }

    fn is_for<T: 'static>(&self) -> bool {
        self.consumer.as_ref().is_some_and(|consumer| consumer.is::<T>())
    }
}

#[derive(Debug)]
struct DependerA {
    dependable: Arc<Dependable>,
}

struct DependerB {
    dependable: Arc<Dependable>,
}

/// Depends on the context service both directly and through [DependerB]
struct DependerC {
    b: Arc<DependerB>,
    dependable: Arc<Dependable>,
}

fn context_factory(context: &DependencyContext, _: &dyn Resolver) -> Result<Arc<Dependable>> {
    Ok(Arc::new(Dependable::new(context)))
}

fn register_dependers(container: &Hanami) -> Result<()> {
    container.register(
        Lifetime::Transient,
        Constructor::new(&["dependable"], |dependable: Arc<Dependable>| DependerA { dependable })?
            .map(Arc::new),
    )?;
    container.register(
        Lifetime::Transient,
        Constructor::new(&["dependable"], |dependable: Arc<Dependable>| DependerB { dependable })?
            .map(Arc::new),
    )?;
    container.register(
        Lifetime::Transient,
        Constructor::new(
            &["b", "dependable"],
            |b: Arc<DependerB>, dependable: Arc<Dependable>| DependerC { b, dependable },
        )?
        .map(Arc::new),
    )
}
