//! Incident, violation and CAF generation routes.

use actix_web::{HttpResponse, web};
use fleetcomp_caf::{CafService, NewViolation};
use fleetcomp_core::models::incident::CreateIncident;
use fleetcomp_core::repository::Store;
use uuid::Uuid;

use super::ApiError;
use crate::identity::Identity;

pub(super) fn routes<S: Store + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.route("/incidents", web::post().to(create::<S>))
        .route("/incidents/{id}", web::get().to(get::<S>))
        .route("/incidents/{id}/violations", web::post().to(record_violation::<S>))
        .route("/incidents/{id}/cafs", web::post().to(generate_cafs::<S>))
        .route("/incidents/{id}/recompute", web::post().to(recompute::<S>));
}

async fn create<S: Store>(
    service: web::Data<CafService<S>>,
    identity: Identity,
    body: web::Json<CreateIncident>,
) -> Result<HttpResponse, ApiError> {
    let caller = service.resolve_caller(identity.subject()).await?;
    let incident = service.create_incident(&caller, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(incident))
}

async fn get<S: Store>(
    service: web::Data<CafService<S>>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let caller = service.resolve_caller(identity.subject()).await?;
    let detail = service.get_incident(&caller, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(detail))
}

async fn record_violation<S: Store>(
    service: web::Data<CafService<S>>,
    identity: Identity,
    path: web::Path<Uuid>,
    body: web::Json<NewViolation>,
) -> Result<HttpResponse, ApiError> {
    let caller = service.resolve_caller(identity.subject()).await?;
    let violation = service
        .record_violation(&caller, path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(violation))
}

/// Returns only the CAFs created by this call; an empty list means every
/// violation already had one.
async fn generate_cafs<S: Store>(
    service: web::Data<CafService<S>>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let caller = service.resolve_caller(identity.subject()).await?;
    let cafs = service
        .generate_for_incident(&caller, path.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(cafs))
}

async fn recompute<S: Store>(
    service: web::Data<CafService<S>>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let caller = service.resolve_caller(identity.subject()).await?;
    let incident = service
        .recompute_incident(&caller, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(incident))
}
