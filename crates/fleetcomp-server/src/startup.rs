//! Process wiring: database, migrations, master bootstrap and the HTTP
//! listener.

use actix_web::{App, HttpServer, web};
use fleetcomp_caf::CafService;
use fleetcomp_core::error::FleetError;
use fleetcomp_db::{DbError, DbManager, SurrealStore, run_migrations};
use surrealdb::engine::any::Any;
use tracing::info;

use crate::api;
use crate::config::{Config, ConfigError};
use crate::identity::{IdentityError, TokenVerifier};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("database connection failed: {0}")]
    Database(#[from] surrealdb::Error),

    #[error(transparent)]
    Migration(#[from] DbError),

    #[error("bootstrap failed: {0}")]
    Bootstrap(#[from] FleetError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Connect, migrate, bootstrap the master organization, then serve until
/// shutdown.
pub async fn run(config: Config) -> Result<(), StartupError> {
    let verifier = TokenVerifier::new(&config.identity)?;

    let manager = DbManager::connect(&config.database).await?;
    run_migrations(manager.client()).await?;

    let service = CafService::new(SurrealStore::new(manager.client().clone()), config.caf);
    let master = service.ensure_master_organization().await?;
    info!(
        organization_id = %master.id,
        approval_required_by_default = service.config().approval_required_by_default,
        "Master organization ready"
    );
    if let Some(bootstrap) = &config.bootstrap {
        let staff = service
            .ensure_master_staff(&bootstrap.subject, &bootstrap.name, &bootstrap.email)
            .await?;
        info!(staff_id = %staff.id, "Master staff ready");
    }

    let service = web::Data::new(service);
    let verifier = web::Data::new(verifier);
    let json_limit = config.server.json_limit;

    info!(
        host = %config.server.host,
        port = config.server.port,
        "Starting fleetcomp server"
    );
    HttpServer::new(move || {
        App::new()
            .app_data(api::json_config(json_limit))
            .app_data(service.clone())
            .app_data(verifier.clone())
            .configure(api::configure::<SurrealStore<Any>>)
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    info!("fleetcomp server stopped");
    Ok(())
}
