//! Authentication Gate
//!
//! Resolves the access rule for every request, verifies the bearer token when
//! the rule needs one, and stores the resulting identity in the request
//! extensions. Never touches a store.

use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::{header, Method};
use actix_web::middleware::Next;
use actix_web::{web, Error, HttpMessage, HttpResponse, ResponseError};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::identity::AuthenticatedIdentity;
use super::policy::AccessPolicy;
use super::token::{TokenError, TokenVerifier};
use crate::api::ApiError;
use crate::metrics::Metrics;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingCredentials,

    #[error("{0}")]
    InvalidToken(#[from] TokenError),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Malformed request path: {0}")]
    MalformedPath(String),
}

impl AuthError {
    fn outcome(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials | AuthError::InvalidToken(_) => "unauthenticated",
            AuthError::Forbidden(_) => "forbidden",
            AuthError::MalformedPath(_) => "malformed",
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
///
/// The scheme name is matched case-insensitively.
pub fn extract_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|token| !token.is_empty())
}

/// Paths the router would decode differently from the policy.
///
/// Expects the router's normalised path, where only `%`, `/` and `+` are
/// left percent-encoded. Anything still encoded, or an empty segment,
/// cannot be matched against a rule reliably.
fn is_ambiguous_path(path: &str) -> bool {
    path.contains('%') || path.contains("//")
}

pub struct AuthGate {
    policy: AccessPolicy,
    verifier: TokenVerifier,
    metrics: Arc<Metrics>,
}

impl AuthGate {
    pub fn new(policy: AccessPolicy, verifier: TokenVerifier, metrics: Arc<Metrics>) -> Self {
        Self {
            policy,
            verifier,
            metrics,
        }
    }

    /// Decide whether a request may proceed.
    ///
    /// `path` must be the path the router matches on, not the raw request
    /// target. `Ok(None)` admits a public route without an identity.
    pub fn admit(
        &self,
        method: &Method,
        path: &str,
        authorization: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthenticatedIdentity>, AuthError> {
        let decision = self.decide(method, path, authorization, now);

        match &decision {
            Ok(None) => self.metrics.record_auth_decision("public"),
            Ok(Some(identity)) => {
                self.metrics.record_auth_decision("admitted");
                tracing::debug!(
                    subject = %identity.subject,
                    role = %identity.role,
                    method = %method,
                    path = %path,
                    "Request admitted"
                );
            }
            Err(e) => {
                self.metrics.record_auth_decision(e.outcome());
                tracing::warn!(
                    reason = %e,
                    method = %method,
                    path = %path,
                    "Request rejected"
                );
            }
        }

        decision
    }

    fn decide(
        &self,
        method: &Method,
        path: &str,
        authorization: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthenticatedIdentity>, AuthError> {
        if is_ambiguous_path(path) {
            return Err(AuthError::MalformedPath(path.to_string()));
        }

        let resolved = self.policy.resolve(method, path);
        if resolved.access.is_public() {
            return Ok(None);
        }

        let token = authorization
            .and_then(extract_bearer)
            .ok_or(AuthError::MissingCredentials)?;
        let identity = self.verifier.verify(token, now)?;

        if !resolved.access.permits(&identity, resolved.owner.as_deref()) {
            return Err(AuthError::Forbidden(format!(
                "role {} may not access {}",
                identity.role,
                resolved.pattern.unwrap_or(path)
            )));
        }

        Ok(Some(identity))
    }
}

/// actix-web middleware running the gate in front of every handler.
///
/// Expects `web::Data<AuthGate>` in app data.
pub async fn authenticate<B: MessageBody>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, Error> {
    let Some(gate) = req.app_data::<web::Data<AuthGate>>().cloned() else {
        tracing::error!("AuthGate missing from app data; rejecting request");
        let response = HttpResponse::InternalServerError().finish();
        return Ok(req.into_response(response).map_into_right_body());
    };

    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    // Routing sees the decoded path, so the policy must too.
    let path = req.match_info().as_str();

    match gate.admit(req.method(), path, authorization, Utc::now()) {
        Ok(identity) => {
            if let Some(identity) = identity {
                req.extensions_mut().insert(identity);
            }
            next.call(req)
                .await
                .map(ServiceResponse::map_into_left_body)
        }
        Err(e) => {
            let response = ApiError::from(e).error_response();
            Ok(req.into_response(response).map_into_right_body())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Claims, Role};

    const SECRET: &str = "gate-test-secret-with-at-least-32-bytes";

    fn gate() -> AuthGate {
        AuthGate::new(
            AccessPolicy::default(),
            TokenVerifier::new(SECRET),
            Arc::new(Metrics::new().unwrap()),
        )
    }

    fn bearer(subject: &str, role: Role, exp: i64) -> String {
        let token = TokenVerifier::new(SECRET)
            .sign(&Claims::new(subject, role, exp))
            .unwrap();
        format!("Bearer {}", token)
    }

    fn later() -> i64 {
        Utc::now().timestamp() + 3_600
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer("bearer abc"), Some("abc"));
        assert_eq!(extract_bearer("BEARER  abc "), Some("abc"));
        assert_eq!(extract_bearer("Basic abc"), None);
        assert_eq!(extract_bearer("Bearerabc"), None);
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("abc"), None);
    }

    #[test]
    fn test_public_route_needs_no_token() {
        let admitted = gate()
            .admit(&Method::GET, "/api/products/1", None, Utc::now())
            .unwrap();
        assert!(admitted.is_none());
    }

    #[test]
    fn test_missing_header_is_unauthenticated() {
        for (method, path) in [
            (Method::GET, "/api/orders"),
            (Method::POST, "/api/orders"),
            (Method::GET, "/api/vendors/V1/stats"),
            (Method::GET, "/api/unknown"),
        ] {
            assert_eq!(
                gate().admit(&method, path, None, Utc::now()),
                Err(AuthError::MissingCredentials)
            );
        }
    }

    #[test]
    fn test_non_bearer_header_is_unauthenticated() {
        let result = gate().admit(&Method::GET, "/api/orders", Some("Basic dXNlcjpwYXNz"), Utc::now());
        assert_eq!(result, Err(AuthError::MissingCredentials));
    }

    #[test]
    fn test_expired_token_is_unauthenticated_not_forbidden() {
        let header = bearer("U1", Role::Buyer, Utc::now().timestamp() - 10);
        let result = gate().admit(&Method::GET, "/api/orders", Some(&header), Utc::now());
        assert_eq!(result, Err(AuthError::InvalidToken(TokenError::Expired)));
    }

    #[test]
    fn test_wrong_role_is_forbidden() {
        let header = bearer("U1", Role::Buyer, later());
        let result = gate().admit(&Method::GET, "/api/orders", Some(&header), Utc::now());
        assert!(matches!(result, Err(AuthError::Forbidden(_))));
    }

    #[test]
    fn test_owner_checks() {
        let gate = gate();
        let own = bearer("V1", Role::Vendor, later());
        let other = bearer("V2", Role::Vendor, later());

        let admitted = gate
            .admit(&Method::GET, "/api/vendors/V1/orders", Some(&own), Utc::now())
            .unwrap()
            .unwrap();
        assert_eq!(admitted.subject, "V1");

        assert!(matches!(
            gate.admit(&Method::GET, "/api/vendors/V1/orders", Some(&other), Utc::now()),
            Err(AuthError::Forbidden(_))
        ));
    }

    #[test]
    fn test_encoded_or_empty_segments_are_rejected() {
        let gate = gate();
        let admin = bearer("A1", Role::Admin, later());

        for path in [
            "/api/vendors/V%2F1/orders",
            "/api/orders/%25",
            "/api//orders",
            "/api/health%2F",
        ] {
            assert!(
                matches!(
                    gate.admit(&Method::GET, path, Some(&admin), Utc::now()),
                    Err(AuthError::MalformedPath(_))
                ),
                "path {:?}",
                path
            );
        }
    }

    #[test]
    fn test_decisions_are_counted() {
        let gate = gate();
        let _ = gate.admit(&Method::GET, "/api/health", None, Utc::now());
        let _ = gate.admit(&Method::GET, "/api/orders", None, Utc::now());

        let counter = |outcome: &str| {
            gate.metrics
                .auth_decisions
                .with_label_values(&[outcome])
                .get()
        };
        assert_eq!(counter("public"), 1);
        assert_eq!(counter("unauthenticated"), 1);
    }
}
