//! Request helpers: trace id and principal extraction.
//!
//! Authentication itself is an upstream concern; this service trusts the
//! identity headers its gateway injects and uses them only for
//! attribution and logging.

use actix_web::HttpRequest;
use chat_core::Principal;
use uuid::Uuid;

pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Use the caller-provided trace id, or mint one.
pub fn extract_trace_id(req: &HttpRequest) -> String {
    req.headers()
        .get(TRACE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Principal from gateway-injected identity headers.
pub fn extract_principal(req: &HttpRequest) -> Principal {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let mut principal = Principal::new(
        header("x-user-id").unwrap_or_else(|| "anonymous".to_string()),
        header("x-user-email").unwrap_or_default(),
    );
    principal.department = header("x-user-department");
    principal
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn trace_id_is_minted_when_absent() {
        let req = TestRequest::default().to_http_request();
        assert!(!extract_trace_id(&req).is_empty());
    }

    #[test]
    fn principal_reads_identity_headers() {
        let req = TestRequest::default()
            .insert_header(("x-user-id", "u42"))
            .insert_header(("x-user-email", "u42@example.org"))
            .to_http_request();
        let principal = extract_principal(&req);
        assert_eq!(principal.id, "u42");
        assert_eq!(principal.email, "u42@example.org");
    }
}
