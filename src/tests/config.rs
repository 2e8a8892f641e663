use std::fs;
use std::sync::Arc;

use figment::providers::{Format, Toml};
use figment::Figment;

use super::*;

const CONFIG: &str = r#"
[app_settings]
timeout = "30"
name = "orders-service"

[connection_strings.orders]
connection_string = "Server=db;Database=orders"
provider_name = "postgres"

[connection_strings.audit]
connection_string = "Server=db;Database=audit"
"#;

#[test]
fn configuration_stores() -> Result<(), WiringError> {
    let config = Configuration::from_figment(&Figment::from(Toml::string(CONFIG)))?;

    assert_eq!(config.setting("timeout").as_deref(), Some("30"));
    assert_eq!(config.setting("missing"), None);
    assert_eq!(
        config.connection("orders"),
        Some(ConnectionStringSettings::new(
            "orders",
            "Server=db;Database=orders",
            "postgres"
        ))
    );
    assert_eq!(config.connection("audit").map(|c| c.provider_name), Some(String::new()));
    assert_eq!(config.connection("missing"), None);
    Ok(())
}

#[test]
fn invalid_configuration() {
    let figment = Figment::from(Toml::string("app_settings = 3"));
    let err = Configuration::from_figment(&figment).unwrap_err();
    assert!(matches!(err, WiringError::Configuration(_)));
}

struct OrdersRepository {
    connection: ConnectionStringSettings,
    timeout: u32,
    name: String,
}

#[test]
fn conventions_from_configuration() -> Result<(), WiringError> {
    let config = Configuration::from_figment(&Figment::from(Toml::string(CONFIG)))?;
    let container = Hanami::new();
    container.register_parameter_convention(AppSettingsConvention::new(config.clone()))?;
    container.register_parameter_convention(ConnectionStringsConvention::new(config))?;
    container.register(
        Lifetime::Singleton,
        Constructor::new(
            &["ordersConnection", "timeoutAppSetting", "nameAppSetting"],
            |connection: ConnectionStringSettings, timeout: u32, name: String| OrdersRepository {
                connection,
                timeout,
                name,
            },
        )?
        .map(Arc::new),
    )?;
    container.verify()?;

    let repository: Arc<OrdersRepository> = container.resolve()?;
    assert_eq!(repository.connection.name, "orders");
    assert_eq!(repository.connection.provider_name, "postgres");
    assert_eq!(repository.timeout, 30);
    assert_eq!(repository.name, "orders-service");
    Ok(())
}

#[test]
fn loader_without_file() -> Result<(), WiringError> {
    let config = ConfigurationLoader::new()
        .with_config_path("does/not/exist.toml")
        .with_env_prefix("HANAMI_TEST_MISSING_FILE")
        .load()?;
    assert_eq!(config, Configuration::default());
    Ok(())
}

#[test]
fn loader_merges_file_and_environment() -> Result<(), WiringError> {
    let path = std::env::temp_dir().join(format!("hanami-advanced-{}.toml", std::process::id()));
    fs::write(&path, CONFIG).unwrap();
    std::env::set_var("HANAMI_TEST_LOADER_APP_SETTINGS__NAME", "from_env");
    std::env::set_var("HANAMI_TEST_LOADER_APP_SETTINGS__MODE", "fast");

    let loaded = ConfigurationLoader::default()
        .with_config_path(&path)
        .with_env_prefix("HANAMI_TEST_LOADER")
        .load();
    fs::remove_file(&path).unwrap();
    let config = loaded?;

    assert_eq!(config.setting("timeout").as_deref(), Some("30"));
    assert_eq!(config.setting("name").as_deref(), Some("from_env"));
    assert_eq!(config.setting("mode").as_deref(), Some("fast"));
    assert!(config.connection("orders").is_some());
    Ok(())
}
