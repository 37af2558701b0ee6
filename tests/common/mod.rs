//! Shared test helpers: a mock OIDC provider and token signing.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::{Request, StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::get,
};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parking_lot::RwLock;
use request_authn::VerifierOptions;
use serde_json::{Value, json};

pub const RSA_A: &[u8] = include_bytes!("../fixtures/rsa_a.pem");
pub const RSA_B: &[u8] = include_bytes!("../fixtures/rsa_b.pem");
pub const KID_A: &str = "key-a";
pub const KID_B: &str = "key-b";

pub fn jwk_a() -> Value {
    serde_json::from_str(include_str!("../fixtures/jwk_a.json")).unwrap()
}

pub fn jwk_b() -> Value {
    serde_json::from_str(include_str!("../fixtures/jwk_b.json")).unwrap()
}

/// Fast retries, no background refresh during the test.
pub fn test_options() -> VerifierOptions {
    VerifierOptions {
        refresh_interval: Duration::from_secs(3600),
        retry_attempts: 3,
        retry_base_delay: Duration::from_millis(10),
        http_timeout: Duration::from_secs(5),
    }
}

struct IdpState {
    issuer: String,
    keys: RwLock<Vec<Value>>,
    discovery: RwLock<Option<Value>>,
    jwks_hits: AtomicUsize,
    fail_jwks: AtomicBool,
}

/// OIDC provider on a random local port serving discovery and a JWKS.
pub struct MockIdp {
    pub issuer: String,
    state: Arc<IdpState>,
}

impl MockIdp {
    pub async fn start(keys: Vec<Value>) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let issuer = format!("http://{}", listener.local_addr().unwrap());

        let state = Arc::new(IdpState {
            issuer: issuer.clone(),
            keys: RwLock::new(keys),
            discovery: RwLock::new(None),
            jwks_hits: AtomicUsize::new(0),
            fail_jwks: AtomicBool::new(false),
        });

        let app = Router::new()
            .route("/.well-known/openid-configuration", get(discovery))
            .route("/jwks", get(jwks))
            .with_state(Arc::clone(&state));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { issuer, state }
    }

    pub fn serve_keys(&self, keys: Vec<Value>) {
        *self.state.keys.write() = keys;
    }

    pub fn serve_discovery(&self, document: Value) {
        *self.state.discovery.write() = Some(document);
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.fail_jwks.store(failing, Ordering::SeqCst);
    }

    pub fn jwks_hits(&self) -> usize {
        self.state.jwks_hits.load(Ordering::SeqCst)
    }
}

async fn discovery(State(state): State<Arc<IdpState>>) -> Json<Value> {
    let document = state.discovery.read().clone().unwrap_or_else(|| {
        json!({
            "issuer": state.issuer,
            "jwks_uri": format!("{}/jwks", state.issuer),
        })
    });
    Json(document)
}

async fn jwks(State(state): State<Arc<IdpState>>) -> Response {
    state.jwks_hits.fetch_add(1, Ordering::SeqCst);
    if state.fail_jwks.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let keys = state.keys.read().clone();
    Json(json!({ "keys": keys })).into_response()
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Standard claims valid for one hour.
pub fn claims(issuer: &str, subject: &str, audience: Value) -> Value {
    json!({
        "iss": issuer,
        "sub": subject,
        "aud": audience,
        "exp": now() + 3600,
        "iat": now(),
    })
}

pub fn sign_with(pem: &[u8], kid: &str, algorithm: Algorithm, claims: &Value) -> String {
    let mut header = Header::new(algorithm);
    header.kid = Some(kid.to_string());
    jsonwebtoken::encode(&header, claims, &EncodingKey::from_rsa_pem(pem).unwrap()).unwrap()
}

/// RS256 token signed with key A.
pub fn sign(claims: &Value) -> String {
    sign_with(RSA_A, KID_A, Algorithm::RS256, claims)
}

/// Request head carrying `headers`.
pub fn request(headers: &[(&str, &str)]) -> Parts {
    let mut builder = Request::builder().uri("/items");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(()).unwrap().into_parts().0
}

pub fn bearer(token: &str) -> Parts {
    request(&[("authorization", &format!("Bearer {token}"))])
}
