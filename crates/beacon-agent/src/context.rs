//! Static context attributes
//!
//! The default [`IContextProvider`]: a fixed attribute set built once from
//! the `agent` configuration section.

use beacon_core::config::AgentConfig;
use beacon_core::domain::Attributes;
use beacon_core::ports::IContextProvider;

pub const SERVICE_NAME_ATTRIBUTE: &str = "service.name";
pub const ENVIRONMENT_ATTRIBUTE: &str = "deployment.environment";

#[derive(Debug, Clone, Default)]
pub struct StaticContextProvider {
    attributes: Attributes,
}

impl StaticContextProvider {
    pub fn new(attributes: Attributes) -> Self {
        Self { attributes }
    }

    /// Service name, environment, then the configured static attributes
    pub fn from_config(config: &AgentConfig) -> Self {
        let mut attributes = Attributes::new()
            .with(SERVICE_NAME_ATTRIBUTE, config.service_name.as_str())
            .with(ENVIRONMENT_ATTRIBUTE, config.environment.as_str());
        for (key, value) in &config.attributes {
            attributes.insert(key.as_str(), value.as_str());
        }
        Self { attributes }
    }
}

impl IContextProvider for StaticContextProvider {
    fn attributes(&self) -> Attributes {
        self.attributes.clone()
    }
}
