pub mod request_id;
pub mod security_headers;
pub mod tenant_context;

pub use request_id::{request_id_middleware, RequestIdExt};
pub use security_headers::SecurityHeadersMiddleware;
pub use tenant_context::tenant_header_middleware;
