use std::sync::Arc;

use tracing::debug;

use crate::config::SettingsStore;
use crate::conventions::ParameterConvention;
use crate::helpers::key_before_suffix;
use crate::plan::PlanNode;
use crate::resolve::{Result, WiringError};
use crate::types::{Instance, ParameterDescriptor};

const APP_SETTINGS_SUFFIX: &str = "AppSetting";

/// Inject values from the application settings into parameters named with the "AppSetting"
/// suffix.
///
/// The parameter must be a string or a value type (see [crate::setting_value]). The key is the
/// parameter name without its suffix: `timeoutAppSetting` reads the `timeout` setting and
/// converts it to the parameter type.
pub struct AppSettingsConvention {
    settings: Arc<dyn SettingsStore>,
}

impl AppSettingsConvention {
    pub fn new(settings: impl SettingsStore + 'static) -> Self {
        Self {
            settings: Arc::new(settings),
        }
    }

    /// Read the settings with a custom reader.
    pub fn with_reader<F>(reader: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self::new(reader)
    }

    fn key<'a>(&self, parameter: &'a ParameterDescriptor) -> Option<&'a str> {
        if !parameter.parameter_type().is_convertible() {
            return None;
        }
        key_before_suffix(parameter.name(), APP_SETTINGS_SUFFIX)
    }

    fn value(&self, parameter: &ParameterDescriptor, key: &str) -> Result<Instance> {
        let raw = self
            .settings
            .setting(key)
            .ok_or_else(|| WiringError::MissingAppSetting {
                key: key.to_string(),
            })?;
        let convert = parameter
            .parameter_type()
            .converter()
            .ok_or_else(|| unsupported(parameter))?;
        convert(&raw).map_err(|reason| WiringError::InvalidAppSetting {
            key: key.to_string(),
            value: raw.clone(),
            target: parameter.parameter_type().to_string(),
            reason,
        })
    }
}

fn unsupported(parameter: &ParameterDescriptor) -> WiringError {
    WiringError::UnsupportedParameter {
        convention: "AppSettingsConvention",
        parameter: parameter.name().to_string(),
        parameter_type: parameter.parameter_type().to_string(),
    }
}

impl ParameterConvention for AppSettingsConvention {
    fn can_resolve(&self, parameter: &ParameterDescriptor) -> Result<bool> {
        let Some(key) = self.key(parameter) else {
            return Ok(false);
        };
        self.value(parameter, key)?;
        debug!(parameter = parameter.name(), owner = %parameter.owner(), key, "app setting convention");
        Ok(true)
    }

    fn build_value(&self, parameter: &ParameterDescriptor) -> Result<PlanNode> {
        let key = self.key(parameter).ok_or_else(|| unsupported(parameter))?;
        Ok(PlanNode::Constant(self.value(parameter, key)?))
    }
}
