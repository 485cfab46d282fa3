//! Gate outcomes and their HTTP rendering.

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde_json::json;

use crate::auth::{Claims, VerifyError};
use crate::security::headers::{X_USER_ID, X_USER_ROLE};
use crate::security::rate_limit::RateLimitRejection;

/// 401 body when an API call carries no session cookie.
pub const TOKEN_REQUIRED_MESSAGE: &str = "No autorizado. Token de autenticación requerido.";
/// 401 body when the session cookie does not verify.
pub const TOKEN_INVALID_MESSAGE: &str = "Token de autenticación inválido.";

/// Identity republished to the upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: HeaderValue,
    pub role: HeaderValue,
}

impl Identity {
    /// Claims become header values verbatim; values that are not valid
    /// header text are refused.
    pub fn from_claims(claims: &Claims) -> Result<Self, VerifyError> {
        Ok(Self {
            user_id: HeaderValue::from_str(&claims.sub).map_err(|_| VerifyError::UnusableClaim)?,
            role: HeaderValue::from_str(&claims.role).map_err(|_| VerifyError::UnusableClaim)?,
        })
    }

    /// Set `x-user-id` and `x-user-role`.
    pub fn inject(&self, headers: &mut HeaderMap) {
        headers.insert(X_USER_ID, self.user_id.clone());
        headers.insert(X_USER_ROLE, self.role.clone());
    }
}

/// Why an API request was refused with 401.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    MissingToken,
    InvalidToken(VerifyError),
}

impl AuthFailure {
    pub fn message(&self) -> &'static str {
        match self {
            AuthFailure::MissingToken => TOKEN_REQUIRED_MESSAGE,
            AuthFailure::InvalidToken(_) => TOKEN_INVALID_MESSAGE,
        }
    }
}

impl IntoResponse for AuthFailure {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": self.message() })),
        )
            .into_response()
    }
}

/// What the gate decided for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Forward to the upstream, with identity headers when authenticated.
    Forward { identity: Option<Identity> },
    /// Send the browser to the login page.
    RedirectToLogin { location: String },
    /// API call without a usable token.
    Unauthorized(AuthFailure),
    /// A limiter refused the request; its rejection is returned as is.
    TooManyRequests(RateLimitRejection),
}

impl Decision {
    pub fn pass() -> Self {
        Decision::Forward { identity: None }
    }

    /// Short label for logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            Decision::Forward { identity: None } => "pass",
            Decision::Forward { identity: Some(_) } => "authenticated",
            Decision::RedirectToLogin { .. } => "redirect",
            Decision::Unauthorized(AuthFailure::MissingToken) => "missing_token",
            Decision::Unauthorized(AuthFailure::InvalidToken(_)) => "invalid_token",
            Decision::TooManyRequests(_) => "rate_limited",
        }
    }

    /// `Ok` carries the identity to inject before forwarding; `Err` is the
    /// short-circuit response.
    pub fn resolve(self) -> Result<Option<Identity>, Response> {
        match self {
            Decision::Forward { identity } => Ok(identity),
            Decision::RedirectToLogin { location } => {
                Err(Redirect::temporary(&location).into_response())
            }
            Decision::Unauthorized(failure) => Err(failure.into_response()),
            Decision::TooManyRequests(rejection) => Err(rejection.into_response()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    #[test]
    fn identity_from_claims() {
        let claims = Claims {
            sub: "17".into(),
            role: "medico".into(),
            exp: 0,
        };
        let identity = Identity::from_claims(&claims).unwrap();

        let mut headers = HeaderMap::new();
        identity.inject(&mut headers);
        assert_eq!(headers[X_USER_ID], "17");
        assert_eq!(headers[X_USER_ROLE], "medico");
    }

    #[test]
    fn control_characters_in_claims_are_refused() {
        let claims = Claims {
            sub: "17\r\nx-user-role: admin".into(),
            role: "medico".into(),
            exp: 0,
        };
        assert_eq!(Identity::from_claims(&claims), Err(VerifyError::UnusableClaim));
    }

    #[test]
    fn redirect_is_temporary() {
        let response = Decision::RedirectToLogin {
            location: "/cagpu/login".into(),
        }
        .resolve()
        .unwrap_err();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[header::LOCATION], "/cagpu/login");
    }

    #[tokio::test]
    async fn unauthorized_messages_differ() {
        for (failure, message) in [
            (AuthFailure::MissingToken, TOKEN_REQUIRED_MESSAGE),
            (
                AuthFailure::InvalidToken(VerifyError::Malformed),
                TOKEN_INVALID_MESSAGE,
            ),
        ] {
            let response = Decision::Unauthorized(failure).resolve().unwrap_err();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

            let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(json, json!({ "error": message }));
        }
    }
}
