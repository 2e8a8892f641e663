//! Dependency injection container with parameter conventions and context-based injection.
//!
//! # Simple use case
//!
//! ```
//! # use std::sync::Arc;
//! # use hanami_advanced::*;
//! // Define traits and implementors
//! trait Repository: Send + Sync {
//!     fn describe(&self) -> String;
//! }
//!
//! struct SqlRepository {
//!     connection_string: String,
//!     timeout: u32,
//! }
//!
//! impl Repository for SqlRepository {
//!     fn describe(&self) -> String {
//!         format!("{} ({}s)", self.connection_string, self.timeout)
//!     }
//! }
//!
//! # fn main() -> Result<(), WiringError> {
//! // Parameters are matched by name against the configuration
//! let config = Configuration::from_figment(&figment::Figment::from(
//!     figment::providers::Serialized::defaults(Configuration {
//!         app_settings: [("timeout".to_string(), "30".to_string())].into(),
//!         connection_strings: [(
//!             "orders".to_string(),
//!             ConnectionEntry {
//!                 connection_string: "Server=db".to_string(),
//!                 provider_name: "postgres".to_string(),
//!             },
//!         )]
//!         .into(),
//!     }),
//! ))?;
//!
//! let container = Hanami::new();
//! container.register_parameter_convention(AppSettingsConvention::new(config.clone()))?;
//! container.register_parameter_convention(ConnectionStringsConvention::new(config))?;
//! container.register(
//!     Lifetime::Singleton,
//!     Constructor::new(
//!         &["ordersConnectionString", "timeoutAppSetting"],
//!         |connection_string: String, timeout: u32| SqlRepository { connection_string, timeout },
//!     )?
//!     .map(|repository| -> Arc<dyn Repository> { Arc::new(repository) }),
//! )?;
//!
//! container.verify()?;
//! let repository: Arc<dyn Repository> = container.resolve()?;
//! assert_eq!(repository.describe(), "Server=db (30s)");
//! # Ok(())
//! # }
//! ```
//!
//! # Mechanism
//!
//! The container keeps a registry of type-erased registrations keyed by [ServiceType], and
//! compiles each of them into a construction plan (a tree of [PlanNode]) on first request.
//! Compiled plans are cached in a type map, which also detects cyclic dependencies.
//!
//! The advanced features are not built into the container: they only use its extension points,
//! described by the [HostContainer] trait.
//!
//! * Constructor parameters go through a pair of parameter behaviors. A [ParameterConvention]
//!   decorates them to supply parameters by name, e.g. from the [Configuration].
//! * Each compiled plan is handed to the plan compiled hooks before its lifetime is applied.
//!   Context-based registrations use it to find the calls to their root factory and replace
//!   them with a call carrying the [DependencyContext] of the consumer.
//! * Requests for types without registration are handed to the unregistered type hooks, which
//!   supply the per-consumer [DependencyContextWrapper] caches and the [Deferred] holders.
//!
//! The [AdvancedRegistration] trait wires these features into any host container.

mod config;
mod constructor;
mod context;
mod conventions;
mod deferred;
mod extensions;
mod helpers;
mod inject;
mod plan;
mod resolve;
mod types;

pub use config::{
    Configuration, ConfigurationLoader, ConnectionEntry, ConnectionStore, ConnectionStringSettings,
    SettingsStore, DEFAULT_ENV_PREFIX,
};
pub use constructor::{Callable, Constructor, Parameters};
pub use context::{DependencyContext, DependencyContextWrapper};
pub use conventions::{AppSettingsConvention, ConnectionStringsConvention, ParameterConvention};
pub use deferred::Deferred;
pub use extensions::AdvancedRegistration;
pub use inject::{Hanami, Scope};
pub use plan::{walk_construct, walk_invoke, Activator, Enclosing, Function, FunctionId, PlanNode, PlanVisitor};
pub use resolve::{
    DependencyPlans, DetachedResolver, HostContainer, InjectionBehavior, Lifetime, ParameterBehaviors,
    PlanCompiled, PlanCompiledHook, Registration, Resolver, Result, UnregisteredType,
    UnregisteredTypeHook, VerificationBehavior, WiringError,
};
pub use types::{cast, Converter, Dependency, Instance, ParameterDescriptor, ServiceType, TypeKey};

#[cfg(test)]
mod tests;
