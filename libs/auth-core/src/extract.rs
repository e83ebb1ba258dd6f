//! Actix request extractors for the authentication context.
//!
//! Handlers take [`Principal`] when authentication is mandatory (missing or
//! invalid bearer → 401) or [`AuthContext`] when anonymous access is
//! meaningful. Both require a [`TokenService`] registered as app data.

use actix_web::{dev::Payload, error, web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};

use crate::principal::{AuthContext, Principal};
use crate::token::TokenService;

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn resolve(req: &HttpRequest) -> Result<AuthContext, actix_web::Error> {
    let tokens = req
        .app_data::<web::Data<TokenService>>()
        .ok_or_else(|| error::ErrorInternalServerError("token service not configured"))?;

    Ok(match bearer_token(req).and_then(|token| tokens.verify(token)) {
        Some(principal) => AuthContext::Authenticated(principal),
        None => AuthContext::Anonymous,
    })
}

impl FromRequest for AuthContext {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(resolve(req))
    }
}

impl FromRequest for Principal {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(resolve(req).and_then(|context| match context {
            AuthContext::Authenticated(principal) => Ok(principal),
            AuthContext::Anonymous => Err(error::ErrorUnauthorized(
                "Authorization header missing or invalid",
            )),
        }))
    }
}
