//! End-to-end tests of the OAuth HTTP surface

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, SecondsFormat, Utc};
use ed25519_dalek::{Signer, SigningKey};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::{json, Value};
use tower::ServiceExt;

use ton_oauth_server::auth::{SigningKeys, WalletAddress};
use ton_oauth_server::config::Config;
use ton_oauth_server::ledger::{AccountState, OracleError, StaticOracle, WalletOracle};
use ton_oauth_server::{build_router, build_state};

const PRIVATE_PEM: &str = include_str!("fixtures/signing_private.pem");
const PUBLIC_PEM: &str = include_str!("fixtures/signing_public.pem");
const OTHER_PRIVATE_PEM: &str = include_str!("fixtures/other_private.pem");
const OTHER_PUBLIC_PEM: &str = include_str!("fixtures/other_public.pem");

struct UnreachableOracle;

#[async_trait]
impl WalletOracle for UnreachableOracle {
    async fn account_state(&self, _address: &WalletAddress) -> Result<AccountState, OracleError> {
        Err(OracleError::Transport("connection refused by 10.1.2.3".to_string()))
    }

    fn name(&self) -> &'static str {
        "unreachable"
    }
}

fn config(pairs: &[(&str, &str)]) -> Config {
    let pairs: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Config::from_lookup(|key| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    })
    .unwrap()
}

fn app_with(oracle: Arc<dyn WalletOracle>, pairs: &[(&str, &str)]) -> Router {
    let config = config(pairs);
    let keys = SigningKeys::from_pem(PRIVATE_PEM, PUBLIC_PEM, config.key_id.clone()).unwrap();
    build_router(build_state(&config, keys, oracle), &config)
}

fn app(state: AccountState) -> Router {
    app_with(Arc::new(StaticOracle::new(state)), &[])
}

fn wallet() -> SigningKey {
    SigningKey::from_bytes(&[9u8; 32])
}

fn timestamp(offset: Duration) -> String {
    (Utc::now() + offset).to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn assertion_body(message: &str) -> Value {
    let key = wallet();
    json!({
        "message": message,
        "signature": STANDARD.encode(key.sign(message.as_bytes()).to_bytes()),
        "publicKey": STANDARD.encode(key.verifying_key().to_bytes()),
    })
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post(app: Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    let request = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

#[tokio::test]
async fn authorize_issues_challenge() {
    let (status, body) = get(
        app(AccountState::Active),
        "/oauth/authorize?redirect_uri=https%3A%2F%2Fapp.example.com%2Fcb&scope=profile",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["redirect_uri"], "https://app.example.com/cb");
    assert_eq!(body["scope"], "profile");
    assert!(!body["client_id"].as_str().unwrap().is_empty());
    assert!(!body["challenge"].as_str().unwrap().is_empty());
    assert!(body["expiresAt"].is_string());
}

#[tokio::test]
async fn authorize_rejects_bad_redirect_uri() {
    let (status, body) = get(
        app(AccountState::Active),
        "/oauth/authorize?redirect_uri=not%20a%20url",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = get(app(AccountState::Active), "/oauth/authorize").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn verify_accepts_fresh_assertion() {
    let message = format!("TON-OAUTH:{}", timestamp(Duration::seconds(-30)));
    let (status, body) = post(
        app(AccountState::Active),
        "/oauth/verify",
        &assertion_body(&message),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["issuer"], "TON-OAUTH");
    let expected = WalletAddress::from_public_key(&wallet().verifying_key().to_bytes(), false);
    assert_eq!(body["wallet"], expected.to_string());
}

#[tokio::test]
async fn verify_rejects_expired_assertion() {
    let message = format!("TON-OAUTH:{}", timestamp(Duration::minutes(-5)));
    let (status, body) = post(
        app(AccountState::Active),
        "/oauth/verify",
        &assertion_body(&message),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "EXPIRED");
}

#[tokio::test]
async fn verify_rejects_tampered_message() {
    let message = format!("TON-OAUTH:{}", timestamp(Duration::zero()));
    let mut body = assertion_body(&message);
    body["message"] = json!(format!("OTHER:{}", timestamp(Duration::zero())));

    let (status, body) = post(app(AccountState::Active), "/oauth/verify", &body).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_SIGNATURE");
}

#[tokio::test]
async fn verify_rejects_bad_key_encoding() {
    let message = format!("TON-OAUTH:{}", timestamp(Duration::zero()));
    let mut body = assertion_body(&message);
    body["publicKey"] = json!("AAAA");

    let (status, body) = post(app(AccountState::Active), "/oauth/verify", &body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn verify_rejects_malformed_json() {
    let request = Request::post("/oauth/verify")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"message\":"))
        .unwrap();
    let (status, _) = send(app(AccountState::Active), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn inactive_wallet_is_unauthorized() {
    let message = format!("TON-OAUTH:{}", timestamp(Duration::zero()));

    let (status, body) = post(
        app(AccountState::Uninitialized),
        "/oauth/token",
        &assertion_body(&message),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "WALLET_INACTIVE");

    let (status, body) = post(
        app(AccountState::NotFound),
        "/oauth/verify",
        &assertion_body(&message),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "WALLET_NOT_FOUND");
}

#[tokio::test]
async fn oracle_outage_is_service_unavailable() {
    let message = format!("TON-OAUTH:{}", timestamp(Duration::zero()));
    let (status, body) = post(
        app_with(Arc::new(UnreachableOracle), &[]),
        "/oauth/verify",
        &assertion_body(&message),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(!body.to_string().contains("10.1.2.3"));
}

#[tokio::test]
async fn token_round_trip() {
    let message = format!("TON-OAUTH:{}", timestamp(Duration::zero()));
    let (status, body) = post(
        app(AccountState::Active),
        "/oauth/token",
        &assertion_body(&message),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let jwt = body["jwt"].as_str().unwrap().to_string();
    assert_eq!(jwt.split('.').count(), 3);

    let (status, body) = post(
        app(AccountState::Active),
        "/oauth/verify-token",
        &json!({ "jwt": jwt }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["issuer"], "TON-OAUTH");
    assert!(body["exp"].as_i64().unwrap() > Utc::now().timestamp());
}

#[tokio::test]
async fn token_requires_valid_assertion() {
    let message = format!("TON-OAUTH:{}", timestamp(Duration::minutes(-10)));
    let (status, body) = post(
        app(AccountState::Active),
        "/oauth/token",
        &assertion_body(&message),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.get("jwt").is_none());
}

#[tokio::test]
async fn token_from_other_key_is_rejected() {
    let other = SigningKeys::from_pem(OTHER_PRIVATE_PEM, OTHER_PUBLIC_PEM, "main-key").unwrap();
    let (jwt, _) = ton_oauth_server::auth::generate_access_token(
        &other,
        "TON-OAUTH",
        Duration::minutes(5),
    )
    .unwrap();

    let (status, body) = post(
        app(AccountState::Active),
        "/oauth/verify-token",
        &json!({ "jwt": jwt }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_SIGNATURE");
}

#[tokio::test]
async fn jwks_publishes_configured_key() {
    let app = app_with(
        Arc::new(StaticOracle::always_active()),
        &[("KEY_ID", "rotation-2")],
    );
    let (status, body) = get(app.clone(), "/oauth/jwks").await;

    assert_eq!(status, StatusCode::OK);
    let keys = body["keys"].as_array().unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0]["kid"], "rotation-2");
    assert_eq!(keys[0]["kty"], "RSA");
    assert_eq!(keys[0]["alg"], "RS256");
    assert_eq!(keys[0]["use"], "sig");
    assert_eq!(keys[0]["e"], "AQAB");

    let (status, alias) = get(app, "/.well-known/jwks.json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(alias, body);
}

#[tokio::test]
async fn challenge_binding_is_enforced_when_required() {
    let app = app_with(
        Arc::new(StaticOracle::always_active()),
        &[("REQUIRE_CHALLENGE_BINDING", "true")],
    );

    let unbound = format!("TON-OAUTH:{}", timestamp(Duration::zero()));
    let (status, _) = post(app.clone(), "/oauth/verify", &assertion_body(&unbound)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, challenge) = get(
        app.clone(),
        "/oauth/authorize?redirect_uri=https%3A%2F%2Fapp.example.com%2Fcb",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let nonce = challenge["challenge"].as_str().unwrap().to_string();

    let bound = format!("TON-OAUTH:{}:{}", nonce, timestamp(Duration::zero()));
    let mut body = assertion_body(&bound);
    body["nonce"] = json!(nonce);
    let (status, response) = post(app.clone(), "/oauth/verify", &body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["nonce"], json!(nonce));

    let (status, response) = post(app.clone(), "/oauth/token", &body).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response["jwt"].is_string());

    body["nonce"] = json!("other");
    let (status, response) = post(app, "/oauth/verify", &body).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(response["error"]["code"], "CHALLENGE_MISMATCH");
}

#[tokio::test]
async fn never_issued_nonce_gets_no_token() {
    let app = app_with(
        Arc::new(StaticOracle::always_active()),
        &[("REQUIRE_CHALLENGE_BINDING", "true")],
    );

    let message = format!("TON-OAUTH:attacker-chosen:{}", timestamp(Duration::zero()));
    let mut body = assertion_body(&message);
    body["nonce"] = json!("attacker-chosen");

    let (status, response) = post(app, "/oauth/token", &body).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(response["error"]["code"], "UNKNOWN_CHALLENGE");
    assert!(response.get("jwt").is_none());
}

#[tokio::test]
async fn unsigned_token_is_algorithm_mismatch() {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    let now = Utc::now().timestamp();
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let claims = URL_SAFE_NO_PAD.encode(
        json!({ "jti": "x", "iss": "TON-OAUTH", "iat": now, "exp": now + 60 }).to_string(),
    );
    let jwt = format!("{}.{}.", header, claims);

    let (status, body) = post(
        app(AccountState::Active),
        "/oauth/verify-token",
        &json!({ "jwt": jwt }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "ALGORITHM_MISMATCH");
}

#[tokio::test]
async fn replay_protection_makes_exchange_single_use() {
    let app = app_with(
        Arc::new(StaticOracle::always_active()),
        &[("REPLAY_PROTECTION", "true")],
    );
    let body = assertion_body(&format!("TON-OAUTH:{}", timestamp(Duration::zero())));

    let (status, _) = post(app.clone(), "/oauth/token", &body).await;
    assert_eq!(status, StatusCode::OK);

    let (status, response) = post(app, "/oauth/token", &body).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(response["error"]["code"], "ASSERTION_REPLAYED");
}

#[tokio::test]
async fn health_and_security_headers() {
    let response = app(AccountState::Active)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
    assert!(headers.contains_key("x-request-id"));
    assert!(!headers.contains_key(header::STRICT_TRANSPORT_SECURITY));
}

#[tokio::test]
async fn unknown_route_is_json_not_found() {
    let (status, body) = get(app(AccountState::Active), "/oauth/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}
