use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use super::*;

trait TestTrait: Send + Sync {
    fn cheers(&self) -> &'static str;
}

#[derive(Default, Debug)]
struct SecretImpl {}
impl TestTrait for SecretImpl {
    fn cheers(&self) -> &'static str {
        "here is the secret ingredient"
    }
}

trait TestActionable: Send + Sync {
    fn get_helper(&self) -> Arc<dyn TestTrait>;
}

struct ConcreteActionable {
    helper: Arc<dyn TestTrait>,
}

impl ConcreteActionable {
    fn new(helper: Arc<dyn TestTrait>) -> Self {
        Self { helper }
    }
}

impl TestActionable for ConcreteActionable {
    fn get_helper(&self) -> Arc<dyn TestTrait> {
        self.helper.clone()
    }
}

fn test_container() -> Result<Hanami> {
    let container = Hanami::new();
    container.register(
        Lifetime::Singleton,
        Constructor::new(&[], SecretImpl::default)?
            .map(|secret| -> Arc<dyn TestTrait> { Arc::new(secret) }),
    )?;
    container.register(
        Lifetime::Transient,
        Constructor::new(&["helper"], ConcreteActionable::new)?
            .map(|actionable| -> Arc<dyn TestActionable> { Arc::new(actionable) }),
    )?;
    Ok(container)
}

// Disable clippy lint on the comparison of fat pointers:
// this is only test code, the issue should not arise in this context
// and should be properly fixed in future rust versions
// * https://github.com/rust-lang/rust/pull/80505
// * https://stackoverflow.com/questions/67109860/how-to-compare-trait-objects-within-an-arc
#[allow(clippy::vtable_address_comparisons)]
#[test]
fn resolve_singleton() -> Result<(), WiringError> {
    let container = test_container()?;

    let v1: Arc<dyn TestTrait> = container.resolve()?;
    let v2: Arc<dyn TestTrait> = container.resolve()?;

    assert_eq!(v1.cheers(), "here is the secret ingredient");
    assert!(Arc::ptr_eq(&v1, &v2));

    // retrieve two on-demand instances: they are different but share the same helper
    let a1: Arc<dyn TestActionable> = container.resolve()?;
    let a2: Arc<dyn TestActionable> = container.clone().resolve()?;
    assert!(!Arc::ptr_eq(&a1, &a2));
    let (h1, h2) = (a1.get_helper(), a2.get_helper());
    assert!(Arc::ptr_eq(&h1, &h2));

    Ok(())
}

#[allow(clippy::vtable_address_comparisons)]
#[test]
fn scoped_instances() -> Result<(), WiringError> {
    let container = Hanami::new();
    container.register_factory(Lifetime::Scoped, |_: &dyn Resolver| {
        Ok(Arc::new(SecretImpl::default()))
    })?;

    let scope = container.begin_scope();
    let s1: Arc<SecretImpl> = scope.resolve()?;
    let s2: Arc<SecretImpl> = scope.resolve()?;
    assert!(Arc::ptr_eq(&s1, &s2));

    let other: Arc<SecretImpl> = container.begin_scope().resolve()?;
    assert!(!Arc::ptr_eq(&s1, &other));

    let err = container.resolve::<Arc<SecretImpl>>().unwrap_err();
    assert!(matches!(err, WiringError::NoActiveScope(_)));
    Ok(())
}

#[test]
fn instances_and_factories() -> Result<(), WiringError> {
    let container = Hanami::new();
    container.register_instance(42u32)?;
    container.register_factory(Lifetime::Transient, |resolver: &dyn Resolver| {
        let answer: u32 = resolver.resolve()?;
        Ok(format!("the answer is {answer}"))
    })?;

    assert!(container.is_registered(&u32::service_type()));
    assert!(!container.is_locked());
    assert_eq!(container.resolve::<String>()?, "the answer is 42");
    assert!(container.is_locked());
    Ok(())
}

#[derive(Debug)]
struct Chicken {
    _egg: Arc<Egg>,
}

#[derive(Debug)]
struct Egg {
    _chicken: Arc<Chicken>,
}

#[test]
fn cyclic_dependencies() -> Result<(), WiringError> {
    let container = Hanami::new();
    container.register(
        Lifetime::Transient,
        Constructor::new(&["egg"], |egg: Arc<Egg>| Chicken { _egg: egg })?.map(Arc::new),
    )?;
    container.register(
        Lifetime::Transient,
        Constructor::new(&["chicken"], |chicken: Arc<Chicken>| Egg { _chicken: chicken })?
            .map(Arc::new),
    )?;

    let err = container.resolve::<Arc<Chicken>>().unwrap_err();
    assert!(matches!(err, WiringError::CyclicResolution(_)));
    // failed plans are not cached
    let err = container.resolve::<Arc<Egg>>().unwrap_err();
    assert!(matches!(err, WiringError::CyclicResolution(_)));
    Ok(())
}

#[test]
fn missing_registrations() -> Result<(), WiringError> {
    let container = Hanami::new();
    container.register(
        Lifetime::Transient,
        Constructor::new(&["helper"], ConcreteActionable::new)?.map(Arc::new),
    )?;

    let err = container.verify().unwrap_err();
    assert!(matches!(err, WiringError::NotRegistered(_)));
    let err = container.resolve::<u32>().unwrap_err();
    assert!(matches!(err, WiringError::NotRegistered(_)));
    Ok(())
}

#[test]
fn registration_errors() -> Result<(), WiringError> {
    let err = Constructor::new(&["a", "b"], |a: u32| a).err();
    assert!(matches!(
        err,
        Some(WiringError::ParameterCount {
            expected: 1,
            given: 2,
            ..
        })
    ));

    let container = test_container()?;
    let err = container.register_instance::<Arc<dyn TestTrait>>(Arc::new(SecretImpl {})).unwrap_err();
    assert!(matches!(err, WiringError::AlreadyRegistered(_)));

    container.verify()?;
    let err = container.register_instance(1u32).unwrap_err();
    assert!(matches!(err, WiringError::Locked(_)));
    Ok(())
}

#[test]
fn type_mismatch() {
    let instance: Instance = Arc::new(1u32);
    assert_eq!(cast::<u32>(&instance).unwrap(), 1);
    assert!(matches!(
        cast::<String>(&instance),
        Err(WiringError::TypeMismatch { .. })
    ));
}

#[test]
fn service_types() {
    let wrapper = ServiceType::context_wrapper(&ServiceType::of::<u32>(), &ServiceType::of::<String>());
    let (service, consumer) = wrapper.context_wrapper_parts().unwrap();
    assert!(service.is::<u32>());
    assert!(consumer.is::<String>());
    assert_ne!(
        wrapper,
        ServiceType::context_wrapper(&ServiceType::of::<String>(), &ServiceType::of::<u32>())
    );
    assert_eq!(
        wrapper,
        ServiceType::context_wrapper(&ServiceType::of::<u32>(), &ServiceType::of::<String>())
    );

    assert!(u32::service_type().is_convertible());
    assert!(!ServiceType::of::<u32>().is_convertible());
    assert_eq!(ServiceType::of::<u32>(), u32::service_type());
    assert!(<Deferred<u32>>::service_type().deferred_parts().is_some());
}

/// Holds the compilation of `gated` parameters until released
struct Gate {
    closed: AtomicBool,
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl ParameterConvention for Gate {
    fn can_resolve(&self, parameter: &ParameterDescriptor) -> Result<bool> {
        if parameter.name() != "gated" {
            return Ok(false);
        }
        if self.closed.swap(false, Ordering::SeqCst) {
            let _ = self.entered.lock().send(());
            self.release
                .lock()
                .recv_timeout(Duration::from_secs(5))
                .map_err(|_| WiringError::NotRegistered("gate release".to_string()))?;
        }
        Ok(true)
    }

    fn build_value(&self, _: &ParameterDescriptor) -> Result<PlanNode> {
        Ok(PlanNode::constant(7u64))
    }
}

struct Gated(u64);

#[test]
fn compiled_plans_resolve_during_compilation() -> Result<(), WiringError> {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let container = Hanami::new();
    container.register_parameter_convention(Gate {
        closed: AtomicBool::new(true),
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    })?;
    container.register_instance(42u32)?;
    container.register(
        Lifetime::Transient,
        Constructor::new(&["gated"], |value: u64| Gated(value))?.map(Arc::new),
    )?;
    assert_eq!(container.resolve::<u32>()?, 42);

    let gated = thread::scope(|s| {
        let compiling = s.spawn(|| container.resolve::<Arc<Gated>>());
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        // the compilation of Gated is in progress on the other thread
        let answer = container.resolve::<u32>();
        release_tx.send(()).unwrap();
        answer.map(|answer| (answer, compiling.join().unwrap()))
    });
    let (answer, gated) = gated?;
    assert_eq!(answer, 42);
    assert_eq!(gated?.0, 7);
    Ok(())
}
