// SPDX-License-Identifier: MIT

//! Authentication routes: signup, signin, OAuth, password reset, logout.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, SESSION_COOKIE};
use crate::models::{Account, ResetToken};
use crate::routes::profiles::ensure_profile;
use crate::services::password::{hash_password, verify_password};
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// How long a password-reset token stays valid.
const RESET_TOKEN_TTL_MINUTES: i64 = 60;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/signin", post(signin))
        .route("/auth/oauth", get(oauth_start))
        .route("/auth/oauth/callback", get(oauth_callback))
        .route("/auth/reset/request", post(reset_request))
        .route("/auth/reset/confirm", post(reset_confirm))
        .route("/auth/logout", post(logout))
}

// ─── Password Signup / Signin ────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 60))]
    pub display_name: String,
}

#[derive(Deserialize, Validate)]
pub struct SigninRequest {
    #[validate(email)]
    pub email: String,
    pub password: String,
}

/// Session payload returned by signup/signin.
#[derive(Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub account_id: String,
}

fn session_cookie(token: &str) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(7))
        .build()
}

/// Create an account plus its default profile, return a session.
async fn signup(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<SignupRequest>,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let email = payload.email.trim().to_lowercase();

    if state.db.find_account_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email is already registered".to_string()));
    }

    let account = Account {
        id: Uuid::new_v4().to_string(),
        email,
        password_hash: Some(hash_password(&payload.password)?),
        oauth_subject: None,
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    state.db.upsert_account(&account).await?;

    ensure_profile(&state.db, &account.id, &payload.display_name).await?;

    tracing::info!(account_id = %account.id, "Account created");

    let token = create_jwt(&account.id, &state.config.jwt_signing_key)?;
    let jar = jar.add(session_cookie(&token));

    Ok((
        jar,
        Json(SessionResponse {
            token,
            account_id: account.id,
        }),
    ))
}

/// Verify credentials, return a session.
async fn signin(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<SigninRequest>,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let email = payload.email.trim().to_lowercase();

    let account = state
        .db
        .find_account_by_email(&email)
        .await?
        .ok_or(AppError::Unauthorized)?;

    // OAuth-only accounts have no password to check
    let hash = account.password_hash.as_deref().ok_or(AppError::Unauthorized)?;

    if !verify_password(&payload.password, hash)? {
        return Err(AppError::Unauthorized);
    }

    let token = create_jwt(&account.id, &state.config.jwt_signing_key)?;
    let jar = jar.add(session_cookie(&token));

    Ok((
        jar,
        Json(SessionResponse {
            token,
            account_id: account.id,
        }),
    ))
}

/// Clear the session cookie.
async fn logout(jar: CookieJar) -> (CookieJar, Json<serde_json::Value>) {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/").build());
    (jar, Json(serde_json::json!({ "success": true })))
}

// ─── OAuth Sign-in ───────────────────────────────────────────

/// Query parameters for starting the OAuth flow.
#[derive(Deserialize)]
pub struct OAuthStartParams {
    /// Frontend URL to redirect back to after OAuth completes.
    /// If not provided, uses FRONTEND_URL.
    #[serde(default)]
    redirect_uri: Option<String>,
}

/// Start OAuth flow - redirect to the provider's authorization endpoint.
async fn oauth_start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OAuthStartParams>,
    headers: axum::http::HeaderMap,
) -> Result<Redirect> {
    let frontend_url = params
        .redirect_uri
        .unwrap_or_else(|| state.config.frontend_url.clone());

    // Encode frontend URL + timestamp in state
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis();

    // Create the data payload: "frontend_url|timestamp_hex"
    let state_payload = format!("{}|{:x}", frontend_url, timestamp);

    // Sign the payload
    let mut mac = HmacSha256::new_from_slice(&state.config.oauth_state_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(state_payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed_state = format!("{}|{}", state_payload, hex::encode(signature));
    let oauth_state = URL_SAFE_NO_PAD.encode(signed_state.as_bytes());

    let callback_url = callback_url_from_headers(&headers);

    let auth_url = format!(
        "https://accounts.google.com/o/oauth2/v2/auth?\
         client_id={}&\
         redirect_uri={}&\
         response_type=code&\
         scope=openid%20email%20profile&\
         state={}",
        state.config.oauth_client_id,
        urlencoding::encode(&callback_url),
        oauth_state
    );

    tracing::info!(
        client_id = %state.config.oauth_client_id,
        frontend_url = %frontend_url,
        "Starting OAuth flow"
    );

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    code: String,
    state: String,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - verify state, exchange the code, create a session.
async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
    // Decode and verify frontend URL from state parameter
    let frontend_url = verify_and_decode_state(&params.state, &state.config.oauth_state_key)
        .unwrap_or_else(|| {
            tracing::warn!(
                "Invalid or tampered state parameter, falling back to default frontend URL"
            );
            state.config.frontend_url.clone()
        });

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from provider");
        let redirect = format!("{}?error={}", frontend_url, error);
        return Ok(Redirect::temporary(&redirect));
    }

    tracing::info!("Exchanging authorization code for tokens");

    let callback_url = callback_url_from_headers(&headers);
    let identity = exchange_code(&state, &params.code, &callback_url).await?;

    // Upsert account: match on email, link the OAuth subject on first use
    let email = identity.email.trim().to_lowercase();
    let account = match state.db.find_account_by_email(&email).await? {
        Some(mut account) => {
            if account.oauth_subject.is_none() {
                account.oauth_subject = Some(identity.sub.clone());
                state.db.upsert_account(&account).await?;
            }
            account
        }
        None => {
            let account = Account {
                id: Uuid::new_v4().to_string(),
                email,
                password_hash: None,
                oauth_subject: Some(identity.sub.clone()),
                created_at: chrono::Utc::now().to_rfc3339(),
            };
            state.db.upsert_account(&account).await?;
            account
        }
    };

    let display_name = identity.name.unwrap_or_else(|| "New Member".to_string());
    ensure_profile(&state.db, &account.id, &display_name).await?;

    tracing::info!(account_id = %account.id, "OAuth sign-in successful");

    let jwt = create_jwt(&account.id, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    let redirect_url = format!("{}/callback?token={}", frontend_url, jwt);

    Ok(Redirect::temporary(&redirect_url))
}

/// Identity claims we need from the OAuth provider.
struct OAuthIdentity {
    sub: String,
    email: String,
    name: Option<String>,
}

#[derive(Deserialize)]
struct TokenExchangeResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UserInfoResponse {
    sub: String,
    email: String,
    #[serde(default)]
    name: Option<String>,
}

/// Exchange the authorization code and fetch the user's identity.
async fn exchange_code(
    state: &Arc<AppState>,
    code: &str,
    callback_url: &str,
) -> Result<OAuthIdentity> {
    let http = reqwest::Client::new();

    let token_response = http
        .post("https://oauth2.googleapis.com/token")
        .form(&[
            ("client_id", state.config.oauth_client_id.as_str()),
            ("client_secret", state.config.oauth_client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", callback_url),
        ])
        .send()
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Token exchange failed: {}", e)))?;

    if !token_response.status().is_success() {
        let status = token_response.status();
        let body = token_response.text().await.unwrap_or_default();
        tracing::error!(%status, body = %body, "OAuth token exchange rejected");
        return Err(AppError::Unauthorized);
    }

    let tokens: TokenExchangeResponse = token_response
        .json()
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Malformed token response: {}", e)))?;

    let userinfo: UserInfoResponse = http
        .get("https://openidconnect.googleapis.com/v1/userinfo")
        .bearer_auth(&tokens.access_token)
        .send()
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Userinfo request failed: {}", e)))?
        .json()
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Malformed userinfo response: {}", e)))?;

    Ok(OAuthIdentity {
        sub: userinfo.sub,
        email: userinfo.email,
        name: userinfo.name,
    })
}

/// Build the OAuth callback URL from the request's Host header.
fn callback_url_from_headers(headers: &axum::http::HeaderMap) -> String {
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| {
            std::env::var("API_HOST").unwrap_or_else(|_| "localhost:8080".to_string())
        });

    let scheme = if host.contains("localhost") || host.contains("127.0.0.1") {
        "http"
    } else {
        "https"
    };

    format!("{}://{}/auth/oauth/callback", scheme, host)
}

/// Verify HMAC signature and decode the frontend URL from the OAuth state parameter.
fn verify_and_decode_state(state: &str, secret: &[u8]) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // Format is "frontend_url|timestamp_hex|signature_hex"
    let parts: Vec<&str> = state_str.splitn(3, '|').collect();
    if parts.len() != 3 {
        return None;
    }

    let frontend_url = parts[0];
    let timestamp_hex = parts[1];
    let signature_hex = parts[2];

    // Reconstruct payload and verify signature
    let payload = format!("{}|{}", frontend_url, timestamp_hex);

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());

    let expected_signature = hex::encode(mac.finalize().into_bytes());

    if signature_hex != expected_signature {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    Some(frontend_url.to_string())
}

// ─── Password Reset ──────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct ResetRequestPayload {
    #[validate(email)]
    pub email: String,
}

#[derive(Deserialize, Validate)]
pub struct ResetConfirmPayload {
    pub token: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

/// Issue a reset token for an email.
///
/// Always returns 200 so the endpoint cannot be used to enumerate accounts.
/// Delivery is out of band; the token is logged for the operator.
async fn reset_request(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ResetRequestPayload>,
) -> Result<Json<serde_json::Value>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let email = payload.email.trim().to_lowercase();

    if let Some(account) = state.db.find_account_by_email(&email).await? {
        let token = crate::services::codes::generate_reset_token();
        let record = ResetToken {
            account_id: account.id.clone(),
            expires_at: (chrono::Utc::now() + chrono::Duration::minutes(RESET_TOKEN_TTL_MINUTES))
                .to_rfc3339(),
        };
        state.db.set_reset_token(&token, &record).await?;

        tracing::info!(account_id = %account.id, token = %token, "Password reset token issued");
    } else {
        tracing::debug!("Password reset requested for unknown email");
    }

    Ok(Json(serde_json::json!({ "success": true })))
}

/// Consume a reset token and set the new password.
async fn reset_confirm(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ResetConfirmPayload>,
) -> Result<Json<serde_json::Value>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let invalid = || AppError::BadRequest("Invalid or expired reset token".to_string());

    let record = state
        .db
        .get_reset_token(&payload.token)
        .await?
        .ok_or_else(invalid)?;

    let expires_at = chrono::DateTime::parse_from_rfc3339(&record.expires_at)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Malformed token expiry: {}", e)))?;
    if expires_at < chrono::Utc::now() {
        state.db.delete_reset_token(&payload.token).await?;
        return Err(invalid());
    }

    let mut account = state
        .db
        .get_account(&record.account_id)
        .await?
        .ok_or_else(invalid)?;

    account.password_hash = Some(hash_password(&payload.new_password)?);
    state.db.upsert_account(&account).await?;
    state.db.delete_reset_token(&payload.token).await?;

    tracing::info!(account_id = %account.id, "Password reset completed");

    Ok(Json(serde_json::json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_and_decode_state_success() {
        let secret = b"secret_key";
        let frontend_url = "https://example.com";
        let timestamp = 1234567890u128;

        let payload = format!("{}|{:x}", frontend_url, timestamp);
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        let state_data = format!("{}|{}", payload, signature);
        let encoded_state = URL_SAFE_NO_PAD.encode(state_data.as_bytes());

        let result = verify_and_decode_state(&encoded_state, secret);
        assert_eq!(result, Some(frontend_url.to_string()));
    }

    #[test]
    fn test_verify_and_decode_state_invalid_signature() {
        let secret = b"secret_key";
        let frontend_url = "https://example.com";
        let timestamp = 1234567890u128;

        let payload = format!("{}|{:x}", frontend_url, timestamp);
        let signature = "invalid_signature";

        let state_data = format!("{}|{}", payload, signature);
        let encoded_state = URL_SAFE_NO_PAD.encode(state_data.as_bytes());

        let result = verify_and_decode_state(&encoded_state, secret);
        assert_eq!(result, None);
    }

    #[test]
    fn test_verify_and_decode_state_wrong_secret() {
        let secret = b"secret_key";
        let wrong_secret = b"wrong_key";
        let frontend_url = "https://example.com";
        let timestamp = 1234567890u128;

        let payload = format!("{}|{:x}", frontend_url, timestamp);
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        let state_data = format!("{}|{}", payload, signature);
        let encoded_state = URL_SAFE_NO_PAD.encode(state_data.as_bytes());

        let result = verify_and_decode_state(&encoded_state, wrong_secret);
        assert_eq!(result, None);
    }

    #[test]
    fn test_verify_and_decode_state_malformed() {
        let secret = b"secret_key";
        let encoded_state = URL_SAFE_NO_PAD.encode("invalid|format");
        let result = verify_and_decode_state(&encoded_state, secret);
        assert_eq!(result, None);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("tok123");
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "tok123");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
    }
}
