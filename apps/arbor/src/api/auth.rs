//! # Authentication Module
//!
//! Two independent checks guard the HTTP API:
//!
//! - An optional API key (`server.api_key` / `ARBOR_API_KEY`). When set, every
//!   request except `/health` needs `Authorization: Bearer <key>`.
//! - The acting role, taken from the `X-Arbor-Role` header and checked by the
//!   handlers against `AccessPolicy`.

use super::types::ApiError;
use arbor_core::{ArborError, Role, RoleId};
use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Header naming the role a request acts as.
pub const ROLE_HEADER: &str = "x-arbor-role";

// =============================================================================
// API KEY AUTHENTICATION
// =============================================================================

/// Constant-time key comparison.
///
/// Both keys are padded to the same length so `ct_eq` always runs over the
/// same number of bytes.
fn keys_match(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();

    let max_len = provided.len().max(expected.len());
    let mut padded_provided = vec![0u8; max_len];
    let mut padded_expected = vec![0u8; max_len];
    padded_provided[..provided.len()].copy_from_slice(provided);
    padded_expected[..expected.len()].copy_from_slice(expected);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided.len() == expected.len()
}

/// API key authentication middleware.
///
/// Installed only when a key is configured. `/health` is always allowed
/// (for load balancer checks).
pub async fn api_key_auth_middleware(
    State(expected): State<Arc<str>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth_header {
        Some(header_value) => {
            // Support both "Bearer <key>" and raw "<key>" formats
            let provided = header_value.strip_prefix("Bearer ").unwrap_or(header_value);
            if keys_match(provided, &expected) {
                Ok(next.run(request).await)
            } else {
                tracing::warn!(
                    event = "auth_failure",
                    reason = "invalid_api_key",
                    "Authentication failed: invalid API key"
                );
                Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
            }
        }
        None => {
            tracing::warn!(
                event = "auth_failure",
                reason = "missing_authorization_header",
                "Missing Authorization header"
            );
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
    }
}

// =============================================================================
// ROLE RESOLUTION
// =============================================================================

/// Configured roles keyed by id.
#[derive(Debug, Clone, Default)]
pub struct RoleRegistry {
    roles: BTreeMap<RoleId, Role>,
}

impl RoleRegistry {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            roles: roles.into_iter().map(|r| (r.id, r)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// The role a request acts as.
    ///
    /// Without the header the request is the superuser only when no roles
    /// are configured at all.
    pub fn resolve(&self, headers: &HeaderMap) -> Result<Role, ApiError> {
        let Some(value) = headers.get(ROLE_HEADER) else {
            if self.roles.is_empty() {
                return Ok(Role::superuser());
            }
            return Err(ArborError::PermissionDenied(format!("missing {} header", ROLE_HEADER)).into());
        };

        let id = value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .ok_or_else(|| ArborError::Validation(format!("invalid {} header", ROLE_HEADER)))?;

        self.roles.get(&RoleId(id)).cloned().ok_or_else(|| {
            tracing::warn!(event = "auth_failure", reason = "unknown_role", role = id);
            ArborError::PermissionDenied(format!("unknown role {}", id)).into()
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(role: Option<&'static str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(role) = role {
            headers.insert(ROLE_HEADER, HeaderValue::from_static(role));
        }
        headers
    }

    #[test]
    fn keys_must_match_exactly() {
        assert!(keys_match("secret", "secret"));
        assert!(!keys_match("secret", "secret2"));
        assert!(!keys_match("", "secret"));
        assert!(!keys_match("secreT", "secret"));
    }

    #[test]
    fn no_roles_means_superuser() {
        let registry = RoleRegistry::default();
        let role = registry.resolve(&headers(None)).expect("role");
        assert!(role.id.is_superuser());
    }

    #[test]
    fn configured_roles_require_the_header() {
        let registry = RoleRegistry::new([Role::new(2, "editor")]);
        let err = registry.resolve(&headers(None)).err().expect("denied");
        assert_eq!(err.status, StatusCode::FORBIDDEN);

        let role = registry.resolve(&headers(Some("2"))).expect("role");
        assert_eq!(role.name, "editor");
    }

    #[test]
    fn unknown_or_malformed_role() {
        let registry = RoleRegistry::new([Role::new(2, "editor")]);
        let unknown = registry.resolve(&headers(Some("9"))).err().expect("denied");
        assert_eq!(unknown.status, StatusCode::FORBIDDEN);

        let malformed = registry.resolve(&headers(Some("abc"))).err().expect("invalid");
        assert_eq!(malformed.status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
