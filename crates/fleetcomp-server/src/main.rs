//! fleetcomp server entry point.

use fleetcomp_server::config::Config;
use fleetcomp_server::{StartupError, logging, run};

#[actix_web::main]
async fn main() -> Result<(), StartupError> {
    let config = Config::load()?;
    logging::init(&config.logging);
    run(config).await
}
