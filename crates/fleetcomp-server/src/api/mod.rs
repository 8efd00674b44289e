//! JSON API under `/api`, plus `/health`.
//!
//! Handlers are generic over the [`Store`] so the same routes serve the
//! SurrealDB deployment and in-memory test instances. Every handler
//! resolves the bearer identity into a caller and leaves the access
//! decision to the CAF service.

mod caf;
mod error;
mod incident;
mod organization;

use actix_web::http::header::HeaderMap;
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use fleetcomp_core::repository::{Pagination, Store};
use serde::Deserialize;
use serde_json::json;

pub use error::ApiError;

const MAX_PAGE_SIZE: u64 = 200;

/// Register all routes for a service over `S`.
pub fn configure<S: Store + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| ApiError::bad_request(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::bad_request(err.to_string()).into()),
    )
    .route("/health", web::get().to(health))
    .service(
        web::scope("/api")
            .configure(organization::routes::<S>)
            .configure(incident::routes::<S>)
            .configure(caf::routes::<S>),
    );
}

/// JSON body settings: size limit and `{"error": ..}` for malformed bodies.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _req| ApiError::bad_request(err.to_string()).into())
}

async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

/// Client address: first `X-Forwarded-For` entry, then `X-Real-IP`, then
/// the socket peer.
pub fn client_ip(req: &HttpRequest) -> Option<String> {
    forwarded_ip(req.headers()).or_else(|| req.peer_addr().map(|addr| addr.ip().to_string()))
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    header("x-forwarded-for")
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .or_else(|| header("x-real-ip"))
        .map(String::from)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PageQuery {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl PageQuery {
    pub fn pagination(&self) -> Pagination {
        let default = Pagination::default();
        Pagination {
            offset: self.offset.unwrap_or(default.offset),
            limit: self.limit.unwrap_or(default.limit).clamp(1, MAX_PAGE_SIZE),
        }
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test::TestRequest;

    use super::*;

    #[test]
    fn first_forwarded_entry_wins() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", " 203.0.113.7 , 10.0.0.1"))
            .insert_header(("X-Real-IP", "198.51.100.2"))
            .peer_addr("127.0.0.1:5000".parse().unwrap())
            .to_http_request();
        assert_eq!(client_ip(&req).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn real_ip_then_peer() {
        let req = TestRequest::default()
            .insert_header(("X-Real-IP", "198.51.100.2"))
            .peer_addr("127.0.0.1:5000".parse().unwrap())
            .to_http_request();
        assert_eq!(client_ip(&req).as_deref(), Some("198.51.100.2"));

        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", ""))
            .peer_addr("127.0.0.1:5000".parse().unwrap())
            .to_http_request();
        assert_eq!(client_ip(&req).as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn no_address_at_all() {
        let req = TestRequest::default().to_http_request();
        assert_eq!(client_ip(&req), None);
    }

    #[test]
    fn page_size_is_clamped() {
        let page = PageQuery {
            offset: None,
            limit: Some(10_000),
        }
        .pagination();
        assert_eq!(page.offset, 0);
        assert_eq!(page.limit, MAX_PAGE_SIZE);
        assert_eq!(PageQuery::default().pagination().limit, 50);
    }
}
