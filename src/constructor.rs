use std::sync::Arc;

use crate::resolve::{Result, WiringError};
use crate::types::{cast, Dependency, Instance, ParameterDescriptor, ServiceType};

/*
 * The following is used to call constructors with up to 10 injected parameters
 * inspired by https://nickbryan.co.uk/software/using-a-type-map-for-dependency-injection-in-rust/
 */

/// A Callable has a ```call``` function with a single argument and a single return type.
///
/// This trait is implemented for all functions with up to 10 arguments, using a tuple to
/// wrap them all in a single type.
pub trait Callable<Args, Ret> {
    fn call(&self, args: Args) -> Ret;
}

/// Tuple of injectable parameter types
///
/// This trait is implemented for tuples of [Dependency] types
pub trait Parameters: Sized {
    fn types() -> Vec<ServiceType>;
    fn extract(arguments: &[Instance]) -> Result<Self>;
}

fn argument(arguments: &[Instance], position: usize) -> Result<&Instance> {
    arguments.get(position).ok_or(WiringError::ParameterCount {
        implementation: "constructor arguments".to_string(),
        expected: position + 1,
        given: arguments.len(),
    })
}

macro_rules! callable_tuple ({ $($param:ident)* } => {
    impl<Func, Ret, $($param,)*> Callable<($($param,)*), Ret> for Func
    where
        Func: Fn($($param),*) -> Ret,
    {
        #[inline]
        #[allow(non_snake_case)]
        fn call(&self, ($($param,)*): ($($param,)*)) -> Ret {
            (self)($($param,)*)
        }
    }

    #[allow(clippy::unused_unit)]
    impl<$($param: Dependency,)*> Parameters for ($($param,)*) {
        fn types() -> Vec<ServiceType> {
            vec![$(<$param as Dependency>::service_type(),)*]
        }

        #[allow(unused_mut, unused_variables, unused_assignments)]
        fn extract(arguments: &[Instance]) -> Result<Self> {
            let mut position = 0;
            Ok(($({
                let value = cast::<$param>(argument(arguments, position)?)?;
                position += 1;
                value
            },)*))
        }
    }
});

callable_tuple! {}
callable_tuple! { A }
callable_tuple! { A B }
callable_tuple! { A B C }
callable_tuple! { A B C D }
callable_tuple! { A B C D E }
callable_tuple! { A B C D E F }
callable_tuple! { A B C D E F G }
callable_tuple! { A B C D E F G H }
callable_tuple! { A B C D E F G H I }
callable_tuple! { A B C D E F G H I J }

type Activate<S> = Arc<dyn Fn(&[Instance]) -> Result<S> + Send + Sync>;

/// Constructor of an implementation type with named parameters.
///
/// Parameter names drive the parameter conventions, parameter types drive the
/// regular dependency resolution.
///
/// ```
/// # use std::sync::Arc;
/// # use hanami_advanced::*;
/// struct Greeter {
///     greeting: String,
/// }
///
/// # fn main() -> Result<(), WiringError> {
/// let constructor = Constructor::new(&["greetingAppSetting"], |greeting: String| Greeter { greeting })?;
/// assert_eq!(constructor.parameters().len(), 1);
/// let _service = constructor.map(Arc::new);
/// # Ok(())
/// # }
/// ```
pub struct Constructor<S> {
    implementation: ServiceType,
    parameters: Vec<ParameterDescriptor>,
    activate: Activate<S>,
}

impl<I: 'static> Constructor<I> {
    /// Describe the constructor of the implementation type ```I```.
    ///
    /// Return an error if the number of names differs from the number of parameters
    pub fn new<Args, F>(names: &[&str], constructor: F) -> Result<Self>
    where
        Args: Parameters + 'static,
        F: Callable<Args, I> + Send + Sync + 'static,
    {
        let implementation = ServiceType::of::<I>();
        let types = Args::types();
        if names.len() != types.len() {
            return Err(WiringError::ParameterCount {
                implementation: implementation.to_string(),
                expected: types.len(),
                given: names.len(),
            });
        }
        let parameters = names
            .iter()
            .zip(types)
            .enumerate()
            .map(|(position, (name, parameter_type))| {
                ParameterDescriptor::new(*name, parameter_type, implementation.clone(), position)
            })
            .collect();

        Ok(Self {
            implementation,
            parameters,
            activate: Arc::new(move |arguments: &[Instance]| {
                Ok(constructor.call(Args::extract(arguments)?))
            }),
        })
    }
}

impl<S: 'static> Constructor<S> {
    /// Convert the constructed value, typically to wrap it into an `Arc`.
    ///
    /// The implementation type and the parameters are not affected.
    pub fn map<T, F>(self, convert: F) -> Constructor<T>
    where
        T: 'static,
        F: Fn(S) -> T + Send + Sync + 'static,
    {
        let activate = self.activate;
        Constructor {
            implementation: self.implementation,
            parameters: self.parameters,
            activate: Arc::new(move |arguments: &[Instance]| activate(arguments).map(&convert)),
        }
    }

    pub fn implementation(&self) -> &ServiceType {
        &self.implementation
    }

    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    pub(crate) fn into_parts(self) -> (ServiceType, Vec<ParameterDescriptor>, crate::plan::Activator)
    where
        S: Send + Sync,
    {
        let activate = self.activate;
        let activator: crate::plan::Activator =
            Arc::new(move |arguments: Vec<Instance>| Ok(Arc::new(activate(&arguments)?) as Instance));
        (self.implementation, self.parameters, activator)
    }
}
