use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::debug;

use crate::app::services::AppServices;
use crate::context::{Authentication, PrincipalContext};

#[derive(Clone)]
pub struct AuthState {
    pub services: Arc<AppServices>,
}

/// Resolves the bearer token, if any, into an [`Authentication`].
///
/// Never rejects by itself: public routes ignore the outcome and protected
/// ones turn it into 401 through the `PrincipalContext` extractor.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let authentication = authenticate(&state.services, req.headers());
    req.extensions_mut().insert(authentication);
    next.run(req).await
}

fn authenticate(services: &AppServices, headers: &HeaderMap) -> Authentication {
    let token = match extract_bearer(headers) {
        Bearer::Missing => return Authentication::Anonymous,
        Bearer::Malformed => return Authentication::Rejected,
        Bearer::Token(token) => token,
    };

    let claims = match services.jwt().validate(token, Utc::now()) {
        Ok(claims) => claims,
        Err(err) => {
            debug!(error = %err, "bearer token rejected");
            return Authentication::Rejected;
        }
    };

    // The role comes from the directory, not the token, so a changed role
    // takes effect without waiting for expiry.
    match services.read_models().users.get(claims.sub) {
        Some(user) => Authentication::Authenticated(PrincipalContext::new(
            claims.sub,
            user.role().clone(),
            user.email(),
        )),
        None => {
            debug!(user_id = %claims.sub, "token subject is not a known user");
            Authentication::Rejected
        }
    }
}

enum Bearer<'a> {
    Missing,
    Malformed,
    Token(&'a str),
}

fn extract_bearer(headers: &HeaderMap) -> Bearer<'_> {
    let Some(header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Bearer::Missing;
    };

    let Ok(header) = header.to_str() else {
        return Bearer::Malformed;
    };

    match header.strip_prefix("Bearer ").map(str::trim) {
        Some(token) if !token.is_empty() => Bearer::Token(token),
        _ => Bearer::Malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum::http::header::AUTHORIZATION;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_extraction() {
        assert!(matches!(extract_bearer(&HeaderMap::new()), Bearer::Missing));
        assert!(matches!(extract_bearer(&headers("Basic abc")), Bearer::Malformed));
        assert!(matches!(extract_bearer(&headers("Bearer   ")), Bearer::Malformed));
        assert!(matches!(extract_bearer(&headers("Bearer abc.def")), Bearer::Token("abc.def")));
    }
}
