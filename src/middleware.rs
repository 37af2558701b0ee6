//! Axum middleware that runs an authenticator in front of the handlers.
//!
//! ```ignore
//! let auth: Arc<dyn Authenticator> = Arc::new(ApiKeyAuthenticator::new("k1:billing")?);
//! let app = Router::new()
//!     .route("/items", get(list_items))
//!     .layer(axum::middleware::from_fn_with_state(auth, auth_middleware));
//! ```

use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode, header::WWW_AUTHENTICATE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{debug, warn};

use crate::api_key::API_KEY_HEADER;
use crate::authenticator::{AuthError, Authenticator};
use crate::context;
use crate::identity::AuthMethod;

/// Authenticate the request; attach the identity or answer `401`.
pub async fn auth_middleware(
    State(authenticator): State<Arc<dyn Authenticator>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    match authenticator.authenticate(&parts).await {
        Ok(info) => {
            debug!(
                method = %info.method,
                subject = %info.subject,
                path = %parts.uri.path(),
                "Authenticated request"
            );
            context::attach(&mut parts.extensions, info);
            next.run(Request::from_parts(parts, body)).await
        }
        Err(e) => {
            warn!(
                method = %authenticator.method(),
                path = %parts.uri.path(),
                error = %e,
                "Authentication failed"
            );
            unauthorized_response(&e, authenticator.method())
        }
    }
}

/// `WWW-Authenticate` challenge for a failure under `method`.
#[must_use]
pub fn challenge(error: &AuthError, method: AuthMethod) -> String {
    if matches!(error, AuthError::InvalidToken(_)) {
        return r#"Bearer error="invalid_token""#.to_string();
    }
    match method {
        AuthMethod::Basic => r#"Basic realm="api""#.to_string(),
        AuthMethod::ApiKey => format!(r#"ApiKey header="{API_KEY_HEADER}""#),
        _ => "Bearer".to_string(),
    }
}

/// Create a 401 Unauthorized response
fn unauthorized_response(error: &AuthError, method: AuthMethod) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(WWW_AUTHENTICATE, challenge(error, method))],
        Json(json!({
            "error": {
                "code": error.code(),
                "message": error.to_string(),
            }
        })),
    )
        .into_response()
}
