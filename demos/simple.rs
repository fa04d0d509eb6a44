use std::sync::Arc;
use std::time::SystemTime;

use odr::*;

// Define regular traits and implementor structs

trait Logger: Send + Sync {
    fn log(&self, content: &str);
}

struct PrefixLogger {
    prefix: String,
}

impl Logger for PrefixLogger {
    fn log(&self, content: &str) {
        println!("[{}] {}", self.prefix, content);
    }
}

struct DateLogger {
    logger: Arc<PrefixLogger>,
}

impl DateLogger {
    fn log_date(&self) -> Result<(), std::time::SystemTimeError> {
        let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH)?;
        self.logger.log(&format!("{}s since epoch", now.as_secs()));
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    // Declare how each type is built from its positional arguments
    let mut catalog = Catalog::new();
    catalog
        .register("PrefixLogger", |args: &Arguments| {
            Ok(PrefixLogger {
                prefix: args.optional_string(0)?.unwrap_or("app").to_owned(),
            })
        })?
        .register("DateLogger", |args: &Arguments| {
            Ok(DateLogger {
                logger: args.instance(0)?,
            })
        })?;

    // Describe the object graph
    let mut logger = Blueprint::with_id(&catalog, "PrefixLogger", "logger")?;
    logger.add_argument("prefix", Reference::parameter("log.prefix")?)?;
    let mut dated = Blueprint::new(&catalog, "DateLogger")?;
    dated.add_argument("logger", Reference::blueprint("logger")?)?;

    let registry = Registry::new();
    registry.add_blueprint(logger)?;
    registry.add_blueprint(dated)?;
    registry.set_parameter("log.prefix", "demo")?;
    registry.compile()?;

    let b: Arc<DateLogger> = registry.get_as("DateLogger")?;
    b.log_date()?;

    Ok(())
}
