use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::*;

#[derive(Debug)]
struct Service;

struct LazyDepender {
    service: Deferred<Arc<Service>>,
}

fn lazy_container(calls: Arc<AtomicUsize>, lifetime: Lifetime) -> Result<Hanami> {
    let container = Hanami::new();
    container.register_factory(lifetime, move |_: &dyn Resolver| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(Service))
    })?;
    container.register(
        Lifetime::Transient,
        Constructor::new(&["service"], |service: Deferred<Arc<Service>>| LazyDepender {
            service,
        })?
        .map(Arc::new),
    )?;
    container.register_lazy()?;
    Ok(container)
}

#[test]
fn deferred_dependency() -> Result<(), WiringError> {
    let calls = Arc::new(AtomicUsize::new(0));
    let container = lazy_container(calls.clone(), Lifetime::Transient)?;

    let depender: Arc<LazyDepender> = container.resolve()?;
    assert!(!depender.service.is_created());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let first = depender.service.value()?;
    let second = depender.service.value()?;
    assert!(Arc::ptr_eq(&first, &second));
    assert!(depender.service.is_created());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    Ok(())
}

#[test]
fn nested_deferred() -> Result<(), WiringError> {
    let calls = Arc::new(AtomicUsize::new(0));
    let container = lazy_container(calls.clone(), Lifetime::Transient)?;
    container.verify()?;
    let after_verify = calls.load(Ordering::SeqCst);

    let outer: Deferred<Deferred<Arc<Service>>> = container.resolve()?;
    let inner = outer.value()?;
    assert!(!inner.is_created());
    inner.value()?;
    assert_eq!(calls.load(Ordering::SeqCst), after_verify + 1);

    Ok(())
}

#[allow(clippy::vtable_address_comparisons)]
#[test]
fn deferred_in_scope() -> Result<(), WiringError> {
    let calls = Arc::new(AtomicUsize::new(0));
    let container = lazy_container(calls.clone(), Lifetime::Scoped)?;

    let scope = container.begin_scope();
    let depender: Arc<LazyDepender> = scope.resolve()?;
    let service: Arc<Service> = scope.resolve()?;
    assert!(Arc::ptr_eq(&depender.service.value()?, &service));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // the scope is gone: scoped services cannot be resolved any more
    let depender: Arc<LazyDepender> = scope.resolve()?;
    drop(scope);
    let err = depender.service.value().unwrap_err();
    assert!(matches!(err, WiringError::NoActiveScope(_)));

    Ok(())
}

#[test]
fn deferred_outlives_container() -> Result<(), WiringError> {
    let container = lazy_container(Arc::default(), Lifetime::Transient)?;
    let deferred: Deferred<Arc<Service>> = container.resolve()?;
    drop(container);

    let err = deferred.value().unwrap_err();
    assert!(matches!(err, WiringError::ContainerDropped));
    Ok(())
}

#[test]
fn deferred_requires_lazy_registration() -> Result<(), WiringError> {
    let container = Hanami::new();
    container.register_factory(Lifetime::Transient, |_: &dyn Resolver| Ok(Arc::new(Service)))?;

    let err = container.resolve::<Deferred<Arc<Service>>>().unwrap_err();
    assert!(matches!(err, WiringError::NotRegistered(_)));
    Ok(())
}

#[test]
fn deferred_values() {
    let deferred = Deferred::new(|| Ok(5));
    let clone = deferred.clone();
    assert!(!clone.is_created());
    assert_eq!(deferred.value().unwrap(), 5);
    assert!(clone.is_created());
    assert_eq!(*clone.get().unwrap(), 5);

    let failing: Deferred<u32> = Deferred::new(|| Err(WiringError::ContainerDropped));
    assert!(failing.get().is_err());
    assert!(!failing.is_created());
}
