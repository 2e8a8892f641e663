//! Parameter conventions
//!
//! A convention decides from the name and the type of a constructor parameter whether its value
//! can be supplied without registration, typically from configuration. Registering a
//! convention decorates the parameter behaviors of the container: the most recently registered
//! convention is asked first and the container's own behaviors come last.

use std::sync::Arc;

use crate::plan::PlanNode;
use crate::resolve::{
    DependencyPlans, InjectionBehavior, ParameterBehaviors, Result, VerificationBehavior,
};
use crate::types::ParameterDescriptor;

mod app_settings;
pub(crate) mod connection_strings;

pub use app_settings::AppSettingsConvention;
pub use connection_strings::ConnectionStringsConvention;

/// Constructor parameter injection based on parameter names and types.
pub trait ParameterConvention: Send + Sync {
    /// Check if the convention can supply the parameter.
    ///
    /// Conventions validate their source eagerly: a matching parameter whose value cannot be
    /// found is an error, not a mismatch.
    fn can_resolve(&self, parameter: &ParameterDescriptor) -> Result<bool>;

    /// Build the plan node supplying the parameter.
    ///
    /// Only called after [ParameterConvention::can_resolve] accepted the same parameter.
    fn build_value(&self, parameter: &ParameterDescriptor) -> Result<PlanNode>;
}

struct ConventionVerificationBehavior {
    decorated: Arc<dyn VerificationBehavior>,
    convention: Arc<dyn ParameterConvention>,
}

impl VerificationBehavior for ConventionVerificationBehavior {
    fn verify(&self, parameter: &ParameterDescriptor, plans: &dyn DependencyPlans) -> Result<()> {
        if self.convention.can_resolve(parameter)? {
            return Ok(());
        }
        self.decorated.verify(parameter, plans)
    }
}

struct ConventionInjectionBehavior {
    decorated: Arc<dyn InjectionBehavior>,
    convention: Arc<dyn ParameterConvention>,
}

impl InjectionBehavior for ConventionInjectionBehavior {
    fn build_parameter(
        &self,
        parameter: &ParameterDescriptor,
        plans: &dyn DependencyPlans,
    ) -> Result<PlanNode> {
        if self.convention.can_resolve(parameter)? {
            return self.convention.build_value(parameter);
        }
        self.decorated.build_parameter(parameter, plans)
    }
}

/// Wrap both parameter behaviors with a convention.
pub(crate) fn decorate(
    behaviors: ParameterBehaviors,
    convention: Arc<dyn ParameterConvention>,
) -> ParameterBehaviors {
    ParameterBehaviors {
        verification: Arc::new(ConventionVerificationBehavior {
            decorated: behaviors.verification,
            convention: convention.clone(),
        }),
        injection: Arc::new(ConventionInjectionBehavior {
            decorated: behaviors.injection,
            convention,
        }),
    }
}
