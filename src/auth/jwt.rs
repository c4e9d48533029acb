use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{config::JwtConfig, error::AppError, state::AppState};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

/// Access and refresh token issued together on register, login and refresh.
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::minutes(cfg.ttl_minutes.max(1)),
            refresh_ttl: Duration::minutes(cfg.refresh_ttl_minutes.max(1)),
        }
    }

    pub fn issue_pair(&self, user_id: Uuid) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access: self.sign(user_id, TokenKind::Access)?,
            refresh: self.sign(user_id, TokenKind::Refresh)?,
        })
    }

    fn sign(&self, user_id: Uuid, kind: TokenKind) -> Result<String, AppError> {
        let now = OffsetDateTime::now_utc();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp(),
            exp: (now + ttl).unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(anyhow::Error::new(e).context("signing jwt")))
    }

    /// Checks signature, expiry, issuer, audience and kind; yields the user id.
    pub fn verify_as(&self, token: &str, expected: TokenKind) -> Result<Uuid, AppError> {
        let mut validation = Validation::default();
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| {
                warn!(error = %e, "jwt rejected");
                AppError::unauthorized("Invalid or expired token")
            })?
            .claims;

        if claims.kind != expected {
            return Err(AppError::unauthorized(match expected {
                TokenKind::Access => "Access token required",
                TokenKind::Refresh => "Refresh token required",
            }));
        }
        debug!(user_id = %claims.sub, kind = ?claims.kind, "jwt verified");
        Ok(claims.sub)
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::from_config(&state.config.jwt)
    }
}

/// Token from an `Authorization: Bearer <token>` header; scheme is case-insensitive.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?;

    let token = match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => token.trim(),
        _ => "",
    };
    if token.is_empty() {
        return Err(AppError::unauthorized("Invalid Authorization header"));
    }
    Ok(token)
}

/// The signed-in user, from a valid access token.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let user_id = JwtKeys::from_ref(state).verify_as(token, TokenKind::Access)?;
        Ok(AuthUser(user_id))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn keys(secret: &str, issuer: &str) -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: "riders".into(),
            ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        })
    }

    #[test]
    fn pair_verifies_only_as_its_own_kind() {
        let keys = keys("s3cret", "carpool");
        let rider = Uuid::new_v4();
        let pair = keys.issue_pair(rider).unwrap();

        assert_eq!(keys.verify_as(&pair.access, TokenKind::Access).unwrap(), rider);
        assert_eq!(keys.verify_as(&pair.refresh, TokenKind::Refresh).unwrap(), rider);

        let err = keys.verify_as(&pair.access, TokenKind::Refresh).unwrap_err();
        assert_eq!(err.to_string(), "Refresh token required");
        let err = keys.verify_as(&pair.refresh, TokenKind::Access).unwrap_err();
        assert_eq!(err.to_string(), "Access token required");
    }

    #[test]
    fn foreign_tokens_are_unauthorized() {
        let ours = keys("s3cret", "carpool");
        let pair = ours.issue_pair(Uuid::new_v4()).unwrap();

        for other in [keys("other", "carpool"), keys("s3cret", "elsewhere")] {
            let err = other.verify_as(&pair.access, TokenKind::Access).unwrap_err();
            assert_eq!(err.kind(), "unauthorized");
        }
        assert!(ours.verify_as("garbage", TokenKind::Access).is_err());
    }

    #[test]
    fn bearer_scheme_parsing() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        for (raw, expected) in [
            ("Bearer abc", Some("abc")),
            ("bearer  abc ", Some("abc")),
            ("Basic abc", None),
            ("Bearer ", None),
        ] {
            headers.insert(AUTHORIZATION, HeaderValue::from_static(raw));
            assert_eq!(bearer_token(&headers).ok(), expected, "{raw}");
        }
    }
}
