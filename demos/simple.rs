use std::sync::Arc;

use hanami_advanced::*;

// Define regular traits and implementor structs

trait Logger: Send + Sync {
    fn log(&self, content: &str);
}

trait OrderService: Send + Sync {
    fn place(&self, item: &str);
}

struct CategoryLogger {
    category: String,
}

impl Logger for CategoryLogger {
    fn log(&self, content: &str) {
        println!("[{}] {}", self.category, content);
    }
}

struct OrderServiceImpl {
    logger: Arc<dyn Logger>,
    connection_string: String,
    retries: u8,
}

impl OrderServiceImpl {
    fn new(logger: Arc<dyn Logger>, connection_string: String, retries: u8) -> Self {
        Self {
            logger,
            connection_string,
            retries,
        }
    }
}

impl OrderService for OrderServiceImpl {
    fn place(&self, item: &str) {
        self.logger.log(&format!(
            "placing {} on {} ({} retries)",
            item, self.connection_string, self.retries
        ));
    }
}

fn main() -> Result<(), WiringError> {
    // Settings and connections come from hanami.toml and HANAMI_* variables
    let config = ConfigurationLoader::new()
        .with_config_path("hanami.toml")
        .load()?;

    let container = Hanami::new();
    container.register_parameter_convention(AppSettingsConvention::with_reader(move |key: &str| {
        config.setting(key).or_else(|| (key == "retries").then(|| "3".to_string()))
    }))?;
    container.register_parameter_convention(ConnectionStringsConvention::with_reader(|name: &str| {
        Some(ConnectionStringSettings::new(name, format!("Server=localhost;Database={name}"), "sqlite"))
    }))?;

    // One logger per consumer type, named after it
    container.register_single_with_context(|context: &DependencyContext, _: &dyn Resolver| {
        let category = context
            .implementation_type()
            .map(|consumer| consumer.to_string())
            .unwrap_or_else(|| "main".to_string());
        Ok(Arc::new(CategoryLogger { category }) as Arc<dyn Logger>)
    })?;

    container.register(
        Lifetime::Singleton,
        Constructor::new(
            &["logger", "ordersConnectionString", "retriesAppSetting"],
            OrderServiceImpl::new,
        )?
        .map(|service| -> Arc<dyn OrderService> { Arc::new(service) }),
    )?;

    container.verify()?;

    let orders: Arc<dyn OrderService> = container.resolve()?;
    orders.place("coffee");

    let logger: Arc<dyn Logger> = container.resolve()?;
    logger.log("done");

    Ok(())
}
