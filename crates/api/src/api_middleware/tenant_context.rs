//! Tenant header middleware.
//!
//! Tenant isolation here is a row column (`tenant_id` on every customer-scoped
//! record), not a schema, so there's no schema name to resolve the way a
//! multi-schema deployment would need. This middleware only extracts an
//! `X-Tenant-ID` header into the request extensions for routes that want to
//! short-circuit on it before ever touching the body (the screening intake
//! route itself carries `tenant_id` in its JSON payload and doesn't need it).

use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use screening_core::TenantId;
use tracing::warn;
use uuid::Uuid;

pub async fn tenant_header_middleware(headers: HeaderMap, mut req: Request, next: Next) -> Response {
    match extract_tenant_id(&headers) {
        Some(tenant_id) => {
            req.extensions_mut().insert(tenant_id);
        }
        None => warn!("request arrived without an X-Tenant-ID header"),
    }

    next.run(req).await
}

fn extract_tenant_id(headers: &HeaderMap) -> Option<TenantId> {
    headers.get("x-tenant-id").and_then(|v| v.to_str().ok()).and_then(|s| Uuid::parse_str(s).ok()).map(TenantId::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_a_well_formed_tenant_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-tenant-id", "550e8400-e29b-41d4-a716-446655440000".parse().unwrap());
        assert!(extract_tenant_id(&headers).is_some());
    }

    #[test]
    fn ignores_a_malformed_tenant_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-tenant-id", "not-a-uuid".parse().unwrap());
        assert!(extract_tenant_id(&headers).is_none());
    }
}
