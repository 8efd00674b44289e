//! CAF record, status, signature, attachment and export routes.

use actix_web::{HttpRequest, HttpResponse, web};
use fleetcomp_caf::{CafService, NewAttachment, NewCaf, SignatureRequest};
use fleetcomp_core::models::caf::{CafFilter, CafStatus};
use fleetcomp_core::repository::Store;
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiError, PageQuery, client_ip};
use crate::identity::Identity;

pub(super) fn routes<S: Store + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.route("/organizations/{id}/cafs", web::get().to(list::<S>))
        .route("/cafs", web::post().to(create::<S>))
        .service(
            web::resource("/cafs/{id}")
                .route(web::get().to(get::<S>))
                .route(web::delete().to(delete::<S>)),
        )
        .route("/cafs/{id}/status", web::patch().to(transition::<S>))
        .service(
            web::resource("/cafs/{id}/signatures")
                .route(web::get().to(list_signatures::<S>))
                .route(web::post().to(sign::<S>)),
        )
        .route("/cafs/{id}/attachments", web::post().to(add_attachment::<S>))
        .route(
            "/cafs/{id}/attachments/{attachment_id}",
            web::delete().to(remove_attachment::<S>),
        )
        .route("/cafs/{id}/export", web::get().to(export::<S>));
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<CafStatus>,
    incident_id: Option<Uuid>,
    offset: Option<u64>,
    limit: Option<u64>,
}

async fn list<S: Store>(
    service: web::Data<CafService<S>>,
    identity: Identity,
    path: web::Path<Uuid>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let caller = service.resolve_caller(identity.subject()).await?;
    let query = query.into_inner();
    let filter = CafFilter {
        status: query.status,
        incident_id: query.incident_id,
    };
    let pagination = PageQuery {
        offset: query.offset,
        limit: query.limit,
    }
    .pagination();
    let page = service
        .list_cafs(&caller, path.into_inner(), filter, pagination)
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

async fn create<S: Store>(
    service: web::Data<CafService<S>>,
    identity: Identity,
    body: web::Json<NewCaf>,
) -> Result<HttpResponse, ApiError> {
    let caller = service.resolve_caller(identity.subject()).await?;
    let caf = service.create_caf(&caller, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(caf))
}

async fn get<S: Store>(
    service: web::Data<CafService<S>>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let caller = service.resolve_caller(identity.subject()).await?;
    let detail = service.get_caf(&caller, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(detail))
}

async fn delete<S: Store>(
    service: web::Data<CafService<S>>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let caller = service.resolve_caller(identity.subject()).await?;
    service.delete_caf(&caller, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[derive(Debug, Deserialize)]
struct StatusChange {
    status: CafStatus,
}

async fn transition<S: Store>(
    req: HttpRequest,
    service: web::Data<CafService<S>>,
    identity: Identity,
    path: web::Path<Uuid>,
    body: web::Json<StatusChange>,
) -> Result<HttpResponse, ApiError> {
    let caller = service.resolve_caller(identity.subject()).await?;
    let caf = service
        .transition_status(&caller, path.into_inner(), body.status, client_ip(&req))
        .await?;
    Ok(HttpResponse::Ok().json(caf))
}

async fn list_signatures<S: Store>(
    service: web::Data<CafService<S>>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let caller = service.resolve_caller(identity.subject()).await?;
    let signatures = service
        .list_signatures(&caller, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(signatures))
}

async fn sign<S: Store>(
    req: HttpRequest,
    service: web::Data<CafService<S>>,
    identity: Identity,
    path: web::Path<Uuid>,
    body: web::Json<SignatureRequest>,
) -> Result<HttpResponse, ApiError> {
    let caller = service.resolve_caller(identity.subject()).await?;
    let outcome = service
        .submit_signature(
            &caller,
            path.into_inner(),
            body.into_inner(),
            client_ip(&req),
        )
        .await?;
    Ok(HttpResponse::Created().json(outcome))
}

async fn add_attachment<S: Store>(
    service: web::Data<CafService<S>>,
    identity: Identity,
    path: web::Path<Uuid>,
    body: web::Json<NewAttachment>,
) -> Result<HttpResponse, ApiError> {
    let caller = service.resolve_caller(identity.subject()).await?;
    let attachment = service
        .add_attachment(&caller, path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(attachment))
}

async fn remove_attachment<S: Store>(
    service: web::Data<CafService<S>>,
    identity: Identity,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse, ApiError> {
    let caller = service.resolve_caller(identity.subject()).await?;
    let (caf_id, attachment_id) = path.into_inner();
    service
        .remove_attachment(&caller, caf_id, attachment_id)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn export<S: Store>(
    service: web::Data<CafService<S>>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let caller = service.resolve_caller(identity.subject()).await?;
    let export = service.export_caf(&caller, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(export))
}
