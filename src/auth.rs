use actix_web::cookie::{Cookie, SameSite};
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use dashmap::DashMap;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};

use crate::error::ApiError;
use crate::routes::AppState;

pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub jti: String, // session id, used for revocation
}

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("invalid session token")]
    Invalid,
    #[error("session revoked")]
    Revoked,
    #[error("token encoding failed: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
}

/// Issues and checks signed session tokens; logout revokes by `jti`.
pub struct SessionGate {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: chrono::Duration,
    revoked: DashMap<String, usize>, // jti -> exp
}

impl SessionGate {
    pub fn new(secret: &[u8], ttl: chrono::Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
            revoked: DashMap::new(),
        }
    }

    pub fn issue(&self, username: &str) -> Result<String, SessionError> {
        let exp = (chrono::Utc::now() + self.ttl).timestamp().max(0) as usize;
        let claims = Claims {
            sub: username.to_string(),
            exp,
            jti: uuid::Uuid::new_v4().to_string(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|_| SessionError::Invalid)?
            .claims;
        if self.revoked.contains_key(&claims.jti) {
            return Err(SessionError::Revoked);
        }
        Ok(claims)
    }

    pub fn revoke(&self, claims: &Claims) {
        let now = chrono::Utc::now().timestamp().max(0) as usize;
        // entries past their exp would fail validation anyway
        self.revoked.retain(|_, exp| *exp > now);
        self.revoked.insert(claims.jti.clone(), claims.exp);
    }

    pub fn cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE, token)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .finish()
    }

    pub fn removal_cookie() -> Cookie<'static> {
        let mut c = Cookie::build(SESSION_COOKIE, "").path("/").finish();
        c.make_removal();
        c
    }
}

/// Extractor for an authenticated admin session.
///
/// Reads the `session` cookie, falling back to `Authorization: Bearer`.
/// Rejects with `401`; page handlers take `Option<Admin>` and redirect.
pub struct Admin(pub Claims);

impl FromRequest for Admin {
    type Error = ApiError;
    type Future = Ready<Result<Self, ApiError>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        let Some(state) = req.app_data::<web::Data<AppState>>() else {
            return ready(Err(ApiError::Internal));
        };
        // a stale cookie must not shadow a valid bearer token
        let from_cookie = req
            .cookie(SESSION_COOKIE)
            .and_then(|c| state.sessions.verify(c.value()).ok());
        let claims = from_cookie.or_else(|| {
            BearerAuth::from_request(req, pl)
                .into_inner()
                .ok()
                .and_then(|b| state.sessions.verify(b.token()).ok())
        });
        ready(claims.map(Admin).ok_or(ApiError::Unauthorized))
    }
}
