use axum::{extract::Request, http::header, middleware::Next, response::IntoResponse};

/// Hardening headers for the server-rendered pages and the JSON auth API.
///
/// Pages may load their own scripts and styles and talk to the media CDN;
/// `/api/` responses are never framed or rendered as documents.
pub async fn security_headers_middleware(req: Request, next: Next) -> impl IntoResponse {
    let is_api_route = req.uri().path().starts_with("/api/");

    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        header::HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::X_FRAME_OPTIONS,
        header::HeaderValue::from_static("DENY"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        header::HeaderValue::from_static("same-origin"),
    );

    let csp = if is_api_route {
        "default-src 'none'; frame-ancestors 'none'"
    } else {
        "default-src 'self'; \
         img-src 'self' https://ik.imagekit.io data:; \
         media-src 'self' https://ik.imagekit.io; \
         connect-src 'self' https://upload.imagekit.io; \
         frame-ancestors 'none'"
    };
    if let Ok(value) = header::HeaderValue::from_str(csp) {
        headers.insert(header::CONTENT_SECURITY_POLICY, value);
    }

    response
}
