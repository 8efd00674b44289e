//! Organization, staff, risk and audit routes.

use actix_web::{HttpResponse, web};
use chrono::{DateTime, Utc};
use fleetcomp_caf::{CafService, NewStaff};
use fleetcomp_core::models::organization::CreateOrganization;
use fleetcomp_core::repository::{AuditLogFilter, Store};
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiError, PageQuery};
use crate::identity::Identity;

pub(super) fn routes<S: Store + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.route("/organizations", web::post().to(create::<S>))
        .route("/organizations/{id}/risk", web::get().to(risk::<S>))
        .route("/organizations/{id}/audit", web::get().to(audit_log::<S>))
        .service(
            web::resource("/organizations/{id}/staff")
                .route(web::get().to(list_staff::<S>))
                .route(web::post().to(add_staff::<S>)),
        );
}

async fn create<S: Store>(
    service: web::Data<CafService<S>>,
    identity: Identity,
    body: web::Json<CreateOrganization>,
) -> Result<HttpResponse, ApiError> {
    let caller = service.resolve_caller(identity.subject()).await?;
    let organization = service
        .create_organization(&caller, body.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(organization))
}

async fn risk<S: Store>(
    service: web::Data<CafService<S>>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let caller = service.resolve_caller(identity.subject()).await?;
    let risk = service
        .organization_risk(&caller, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(risk))
}

async fn add_staff<S: Store>(
    service: web::Data<CafService<S>>,
    identity: Identity,
    path: web::Path<Uuid>,
    body: web::Json<NewStaff>,
) -> Result<HttpResponse, ApiError> {
    let caller = service.resolve_caller(identity.subject()).await?;
    let staff = service
        .add_staff(&caller, path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(staff))
}

async fn list_staff<S: Store>(
    service: web::Data<CafService<S>>,
    identity: Identity,
    path: web::Path<Uuid>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    let caller = service.resolve_caller(identity.subject()).await?;
    let page = service
        .list_staff(&caller, path.into_inner(), query.pagination())
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

#[derive(Debug, Deserialize)]
struct AuditQuery {
    actor_id: Option<Uuid>,
    action: Option<String>,
    resource_id: Option<Uuid>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    offset: Option<u64>,
    limit: Option<u64>,
}

async fn audit_log<S: Store>(
    service: web::Data<CafService<S>>,
    identity: Identity,
    path: web::Path<Uuid>,
    query: web::Query<AuditQuery>,
) -> Result<HttpResponse, ApiError> {
    let caller = service.resolve_caller(identity.subject()).await?;
    let query = query.into_inner();
    let pagination = PageQuery {
        offset: query.offset,
        limit: query.limit,
    }
    .pagination();
    let filter = AuditLogFilter {
        actor_id: query.actor_id,
        action: query.action,
        resource_id: query.resource_id,
        from: query.from,
        to: query.to,
    };
    let page = service
        .list_audit_log(&caller, path.into_inner(), filter, pagination)
        .await?;
    Ok(HttpResponse::Ok().json(page))
}
