//! Bearer-token authentication middleware.
//!
//! Every request passes through [`auth_middleware_with_state`], which
//! attaches an [`AuthContext`] extension. A missing Authorization
//! header produces an anonymous context so public routes keep working;
//! a header that is present but does not verify is rejected here with
//! 401 before any handler runs.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use cadence_core::{IdentityVerifier, VerifiedIdentity};

use crate::state::AppState;

/// Caller identity for the current request, anonymous when no token
/// was presented.
#[derive(Clone, Debug, Default)]
pub struct AuthContext {
    pub identity: Option<VerifiedIdentity>,
}

impl AuthContext {
    pub fn verified(identity: VerifiedIdentity) -> Self {
        Self {
            identity: Some(identity),
        }
    }
}

pub async fn auth_middleware_with_state(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let context = match request.headers().get(AUTHORIZATION) {
        None => AuthContext::default(),
        Some(header) => {
            // A presented credential is never ignored: anything other
            // than a well-formed Bearer token is rejected here.
            let Some(token) = header
                .to_str()
                .ok()
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(str::trim)
            else {
                tracing::debug!("rejected non-bearer authorization header");
                return (
                    StatusCode::UNAUTHORIZED,
                    "unsupported authorization scheme, expected Bearer".to_string(),
                )
                    .into_response();
            };
            match state.engine.verify(token).await {
                Ok(identity) => AuthContext::verified(identity),
                Err(err) => {
                    tracing::debug!(error = %err, "rejected bearer token");
                    return (StatusCode::UNAUTHORIZED, err.to_string()).into_response();
                }
            }
        }
    };

    request.extensions_mut().insert(context);
    next.run(request).await
}

/// Handler-side gate for routes that require a signed-in caller.
pub fn require_identity(auth: &AuthContext) -> Result<&VerifiedIdentity, (StatusCode, String)> {
    auth.identity.as_ref().ok_or((
        StatusCode::UNAUTHORIZED,
        "authentication required".to_string(),
    ))
}
