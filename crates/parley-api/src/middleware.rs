use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use parley_types::api::Claims;

/// Extract and validate the JWT from the Authorization header.
pub async fn require_auth(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let secret =
        std::env::var("PARLEY_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let claims = claims_from_headers(req.headers(), &secret).ok_or(StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Best-effort claims extraction for endpoints that work with or without a
/// caller identity (room key, history).
pub fn claims_from_headers(headers: &HeaderMap, secret: &str) -> Option<Claims> {
    let auth_header = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = auth_header.strip_prefix("Bearer ")?;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::create_token;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn extracts_claims_from_bearer_header() {
        let token = create_token("secret", 3, "bob").unwrap();
        let headers = headers_with(&format!("Bearer {token}"));
        let claims = claims_from_headers(&headers, "secret").unwrap();
        assert_eq!(claims.sub, 3);
    }

    #[test]
    fn rejects_missing_or_malformed_header() {
        assert!(claims_from_headers(&HeaderMap::new(), "secret").is_none());
        let token = create_token("secret", 3, "bob").unwrap();
        assert!(claims_from_headers(&headers_with(&token), "secret").is_none());
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = create_token("other", 3, "bob").unwrap();
        let headers = headers_with(&format!("Bearer {token}"));
        assert!(claims_from_headers(&headers, "secret").is_none());
    }
}
