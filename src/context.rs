//! Carrying the resolved identity on the request.
//!
//! The boundary layer attaches [`AuthInfo`] to the request extensions after a
//! successful authentication; handlers read it back with [`auth_info`] or the
//! [`Authenticated`] extractor.

use std::convert::Infallible;

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::{Extensions, StatusCode, request::Parts};

use crate::identity::AuthInfo;

/// Attach `info` to the request, replacing any earlier identity.
pub fn attach(extensions: &mut Extensions, info: AuthInfo) {
    extensions.insert(info);
}

/// The identity attached to the request, if any.
#[must_use]
pub fn auth_info(extensions: &Extensions) -> Option<&AuthInfo> {
    extensions.get::<AuthInfo>()
}

/// Extractor for the authenticated identity.
///
/// Rejects with `401 Unauthorized` when no identity was attached. Use
/// `Option<Authenticated>` for routes that also serve anonymous callers.
#[derive(Debug, Clone)]
pub struct Authenticated(pub AuthInfo);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        auth_info(&parts.extensions)
            .cloned()
            .map(Self)
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

impl<S> OptionalFromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(auth_info(&parts.extensions).cloned().map(Self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::AuthMethod;
    use axum::http::Request;

    #[test]
    fn absent_identity_is_none() {
        let extensions = Extensions::new();
        assert!(auth_info(&extensions).is_none());
    }

    #[test]
    fn attached_identity_is_returned() {
        let mut extensions = Extensions::new();
        attach(&mut extensions, AuthInfo::new(AuthMethod::ApiKey, "billing"));
        let info = auth_info(&extensions).unwrap();
        assert_eq!(info.subject, "billing");
        assert_eq!(info.method, AuthMethod::ApiKey);
    }

    #[tokio::test]
    async fn extractor_rejects_without_identity() {
        let (mut parts, ()) = Request::new(()).into_parts();
        let result =
            <Authenticated as FromRequestParts<()>>::from_request_parts(&mut parts, &()).await;
        assert_eq!(result.unwrap_err(), StatusCode::UNAUTHORIZED);

        let optional =
            <Authenticated as OptionalFromRequestParts<()>>::from_request_parts(&mut parts, &())
                .await
                .unwrap();
        assert!(optional.is_none());
    }

    #[tokio::test]
    async fn extractor_returns_identity() {
        let (mut parts, ()) = Request::new(()).into_parts();
        attach(&mut parts.extensions, AuthInfo::new(AuthMethod::Basic, "alice"));
        let Authenticated(info) =
            <Authenticated as FromRequestParts<()>>::from_request_parts(&mut parts, &())
                .await
                .unwrap();
        assert_eq!(info.subject, "alice");
    }
}
