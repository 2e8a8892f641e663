use std::sync::Arc;

use tracing::debug;

use crate::config::{ConnectionStore, ConnectionStringSettings};
use crate::conventions::ParameterConvention;
use crate::helpers::{key_before_suffix, remove_end_ignore_ascii_case};
use crate::plan::PlanNode;
use crate::resolve::{Result, WiringError};
use crate::types::ParameterDescriptor;

const CONNECTION_STRING_SUFFIX: &str = "ConnectionString";
const PROVIDER_NAME_SUFFIX: &str = "ConnectionProviderName";

/// Suffixes stripped from the name of a descriptor-typed parameter, most specific first
const SETTINGS_SUFFIXES: [&str; 4] = [
    "ConnectionStringSetting",
    "ConnectionString",
    "ConnectionSetting",
    "Connection",
];

#[derive(Debug)]
enum Target<'a> {
    Settings,
    ConnectionString(&'a str),
    ProviderName(&'a str),
}

/// Inject named connections into constructor parameters.
///
/// Three kinds of parameters are supported:
///
/// * `ordersConnectionString: String` receives the connection string of `orders`
/// * `ordersConnectionProviderName: String` receives its provider name
/// * any parameter of type [ConnectionStringSettings] receives the whole descriptor. Its name
///   may carry one of the usual suffixes (`orders`, `ordersConnection`, `ordersConnectionSetting`...),
///   the literal name is tried first, then its root and every suffixed variant of the root.
pub struct ConnectionStringsConvention {
    connections: Arc<dyn ConnectionStore>,
}

impl ConnectionStringsConvention {
    pub fn new(connections: impl ConnectionStore + 'static) -> Self {
        Self {
            connections: Arc::new(connections),
        }
    }

    /// Read the connections with a custom reader.
    pub fn with_reader<F>(reader: F) -> Self
    where
        F: Fn(&str) -> Option<ConnectionStringSettings> + Send + Sync + 'static,
    {
        Self::new(reader)
    }

    fn target<'a>(&self, parameter: &'a ParameterDescriptor) -> Option<Target<'a>> {
        let parameter_type = parameter.parameter_type();
        if parameter_type.is::<ConnectionStringSettings>() {
            return Some(Target::Settings);
        }
        if !parameter_type.is::<String>() {
            return None;
        }
        let name = parameter.name();
        if let Some(key) = key_before_suffix(name, CONNECTION_STRING_SUFFIX) {
            return Some(Target::ConnectionString(key));
        }
        key_before_suffix(name, PROVIDER_NAME_SUFFIX).map(Target::ProviderName)
    }

    fn lookup(&self, parameter: &ParameterDescriptor, names: Vec<String>) -> Result<ConnectionStringSettings> {
        for name in &names {
            if let Some(settings) = self.connections.connection(name) {
                debug!(parameter = parameter.name(), connection = %name, "connection string convention");
                return Ok(settings);
            }
        }
        Err(WiringError::MissingConnectionString {
            parameter: parameter.name().to_string(),
            attempted: names,
        })
    }

    fn value(&self, parameter: &ParameterDescriptor, target: &Target<'_>) -> Result<PlanNode> {
        Ok(match target {
            Target::Settings => {
                PlanNode::constant(self.lookup(parameter, candidate_names(parameter.name()))?)
            }
            Target::ConnectionString(key) => PlanNode::constant(
                self.lookup(parameter, vec![key.to_string()])?.connection_string,
            ),
            Target::ProviderName(key) => PlanNode::constant(
                self.lookup(parameter, vec![key.to_string()])?.provider_name,
            ),
        })
    }
}

/// Connection names tried for a descriptor-typed parameter, in order.
///
/// The literal name comes first, then the name stripped of its connection suffix, then the
/// stripped root followed by each known suffix.
pub(crate) fn candidate_names(name: &str) -> Vec<String> {
    let root = remove_end_ignore_ascii_case(name, &SETTINGS_SUFFIXES);
    let mut names = vec![name.to_string()];
    if !root.is_empty() {
        names.push(root.to_string());
    }
    names.extend(SETTINGS_SUFFIXES.iter().map(|suffix| format!("{root}{suffix}")));

    let mut unique = Vec::with_capacity(names.len());
    for name in names {
        if !unique.contains(&name) {
            unique.push(name);
        }
    }
    unique
}

impl ParameterConvention for ConnectionStringsConvention {
    fn can_resolve(&self, parameter: &ParameterDescriptor) -> Result<bool> {
        let Some(target) = self.target(parameter) else {
            return Ok(false);
        };
        self.value(parameter, &target)?;
        Ok(true)
    }

    fn build_value(&self, parameter: &ParameterDescriptor) -> Result<PlanNode> {
        let target = self
            .target(parameter)
            .ok_or_else(|| WiringError::UnsupportedParameter {
                convention: "ConnectionStringsConvention",
                parameter: parameter.name().to_string(),
                parameter_type: parameter.parameter_type().to_string(),
            })?;
        self.value(parameter, &target)
    }
}
