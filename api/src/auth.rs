use crate::config::ShopConfig;
use crate::database::Role;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use poem::{
    error::ResponseError,
    http::{header, StatusCode},
    FromRequest, Request, RequestBody, Response,
};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Authenticated user taken from a verified bearer token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub role: Role,
}

/// Authenticated user holding the admin role
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthenticatedUser);

/// Authentication error types
#[derive(Debug)]
pub enum AuthError {
    MissingHeader(String),
    InvalidFormat(String),
    InvalidSignature,
    TokenExpired,
    WrongTokenKind,
    Forbidden,
    InternalError(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AuthError::MissingHeader(h) => write!(f, "Missing required header: {}", h),
            AuthError::InvalidFormat(msg) => write!(f, "Invalid token format: {}", msg),
            AuthError::InvalidSignature => write!(f, "Invalid token signature"),
            AuthError::TokenExpired => write!(f, "Token expired"),
            AuthError::WrongTokenKind => write!(f, "Token cannot be used here"),
            AuthError::Forbidden => write!(f, "Require admin role"),
            AuthError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

impl ResponseError for AuthError {
    fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingHeader(_) => StatusCode::UNAUTHORIZED,
            AuthError::InvalidFormat(_) => StatusCode::UNAUTHORIZED,
            AuthError::InvalidSignature => StatusCode::UNAUTHORIZED,
            AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
            AuthError::WrongTokenKind => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn as_response(&self) -> Response
    where
        Self: std::error::Error + Send + Sync + 'static,
    {
        let body = serde_json::json!({ "success": false, "mes": self.to_string() });
        Response::builder()
            .status(self.status())
            .content_type("application/json")
            .body(body.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub kind: TokenKind,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    fn new(user_id: &str, role: Option<Role>, kind: TokenKind, ttl_secs: i64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            role: role.map(|r| r.to_string()),
            kind,
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now,
            exp: now.saturating_add(ttl_secs),
        }
    }
}

fn signature(secret: &str, signing_input: &str) -> Result<HmacSha256, AuthError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AuthError::InternalError(format!("Invalid signing key: {}", e)))?;
    mac.update(signing_input.as_bytes());
    Ok(mac)
}

/// Encode claims as an HS256 JWT
pub fn sign_token(secret: &str, claims: &Claims) -> Result<String, AuthError> {
    let payload = serde_json::to_vec(claims)
        .map_err(|e| AuthError::InternalError(format!("Failed to encode claims: {}", e)))?;
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(TOKEN_HEADER),
        URL_SAFE_NO_PAD.encode(payload)
    );
    let mac = signature(secret, &signing_input)?;
    Ok(format!(
        "{}.{}",
        signing_input,
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    ))
}

/// Verify an HS256 JWT and its expiry against `now` (unix seconds)
pub fn verify_token_at(secret: &str, token: &str, now: i64) -> Result<Claims, AuthError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::InvalidFormat(
            "expected three dot-separated parts".to_string(),
        ));
    };

    let header: serde_json::Value = URL_SAFE_NO_PAD
        .decode(header_b64)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .ok_or_else(|| AuthError::InvalidFormat("unreadable header".to_string()))?;
    if header["alg"] != "HS256" {
        return Err(AuthError::InvalidFormat(format!(
            "unsupported algorithm {}",
            header["alg"]
        )));
    }

    let provided = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|e| AuthError::InvalidFormat(format!("signature encoding: {}", e)))?;
    signature(secret, &format!("{}.{}", header_b64, payload_b64))?
        .verify_slice(&provided)
        .map_err(|_| AuthError::InvalidSignature)?;

    let claims: Claims = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .ok_or_else(|| AuthError::InvalidFormat("unreadable claims".to_string()))?;
    if claims.exp <= now {
        return Err(AuthError::TokenExpired);
    }
    Ok(claims)
}

pub fn verify_token(secret: &str, token: &str) -> Result<Claims, AuthError> {
    verify_token_at(secret, token, chrono::Utc::now().timestamp())
}

pub fn issue_access_token(
    config: &ShopConfig,
    user_id: &str,
    role: Role,
) -> Result<String, AuthError> {
    let claims = Claims::new(
        user_id,
        Some(role),
        TokenKind::Access,
        config.access_token_ttl_secs,
    );
    sign_token(&config.jwt_secret, &claims)
}

pub fn issue_refresh_token(config: &ShopConfig, user_id: &str) -> Result<String, AuthError> {
    let claims = Claims::new(
        user_id,
        None,
        TokenKind::Refresh,
        config.refresh_token_ttl_secs,
    );
    sign_token(&config.jwt_secret, &claims)
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut rand_core::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

/// Poem extractor for requests carrying `Authorization: Bearer <access token>`
impl FromRequest<'_> for AuthenticatedUser {
    async fn from_request(req: &Request, _body: &mut RequestBody) -> poem::Result<Self> {
        let config = req
            .data::<Arc<ShopConfig>>()
            .ok_or_else(|| AuthError::InternalError("Missing auth configuration".to_string()))?;

        let authorization = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AuthError::MissingHeader("Authorization".to_string()))?;
        let token = authorization
            .strip_prefix("Bearer ")
            .ok_or_else(|| AuthError::InvalidFormat("expected a Bearer token".to_string()))?;

        let claims = verify_token(&config.jwt_secret, token.trim())?;
        if claims.kind != TokenKind::Access {
            return Err(AuthError::WrongTokenKind.into());
        }
        let role = claims
            .role
            .as_deref()
            .and_then(|r| Role::from_str(r).ok())
            .unwrap_or_default();

        Ok(AuthenticatedUser {
            user_id: claims.sub,
            role,
        })
    }
}

/// Poem extractor that additionally requires the admin role
impl FromRequest<'_> for AdminUser {
    async fn from_request(req: &Request, body: &mut RequestBody) -> poem::Result<Self> {
        let user = AuthenticatedUser::from_request(req, body).await?;
        if user.role != Role::Admin {
            tracing::warn!("User {} denied admin access", user.user_id);
            return Err(AuthError::Forbidden.into());
        }
        Ok(AdminUser(user))
    }
}
