use crate::{
    error::AppError,
    models::{PlatformRole, User},
    schema::users,
    DbPool,
};
use axum::{
    async_trait,
    extract::{Extension, FromRequest, RequestParts, TypedHeader},
    headers::{authorization::Bearer, Authorization},
};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use jsonwebtoken::{errors::Result as JwtResult, DecodingKey, TokenData, Validation};
use serde::{Deserialize, Serialize};
use std::ops::Deref;

struct Keys {
    decoding: DecodingKey,
}

lazy_static::lazy_static! {
    static ref KEYS: Keys = {
        let secret = std::env::var("JWT_SECRET").expect("JWT_SECRET must be set");
        Keys {
            decoding: DecodingKey::from_base64_secret(&secret).expect("JWT_SECRET is not valid base64"),
        }
    };
}

/// Token claims minted by the identity provider. We only validate.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,
    pub exp: u64,
}

#[allow(unused_must_use)]
pub fn ensure_jwt_secret_is_valid() {
    KEYS.deref();
}

pub fn validate_jwt(token: &str) -> JwtResult<TokenData<Claims>> {
    jsonwebtoken::decode::<Claims>(token, &KEYS.decoding, &Validation::default())
}

/// The caller's identity, resolved against the user store on every request
/// and passed explicitly into each operation that needs authorization.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: i32,
    pub display_name: String,
    pub role: PlatformRole,
}

pub struct ExtractAuth(pub AuthContext);

#[async_trait]
impl<B: Send> FromRequest<B> for ExtractAuth {
    type Rejection = AppError;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request(req)
                .await
                .map_err(|_| AppError::Unauthorized("missing bearer token"))?;

        let claims = validate_jwt(bearer.token())
            .map_err(|_| AppError::Unauthorized("invalid or expired token"))?
            .claims;

        let Extension(pool) = Extension::<DbPool>::from_request(req)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

        let conn = &mut pool.get().await?;
        let user = users::table
            .find(claims.sub)
            .first::<User>(conn)
            .await
            .optional()?
            .ok_or(AppError::Unauthorized("unknown user"))?;
        if !user.is_active {
            return Err(AppError::Unauthorized("account is disabled"));
        }

        Ok(ExtractAuth(AuthContext {
            user_id: user.id,
            display_name: user.display_name,
            role: user.role,
        }))
    }
}
