use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::{
    application::services::{namespace::encode_filename, secret::verify_secret},
    domain::config::server::ServerConfig,
};

pub const SECRET_HEADER: &str = "X-CDN-SECRET";
pub const PUBLIC_CACHE: &str = "public, max-age=1800";

/// Rejects requests whose `X-CDN-SECRET` header does not match the configured secret.
pub async fn validate_cdn_secret(
    State(config): State<Arc<ServerConfig>>,
    headers: HeaderMap,
    request: Request<Body>,
    next: Next,
) -> Response {
    let provided = match headers.get(SECRET_HEADER) {
        Some(value) => match value.to_str() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("{} header contains invalid UTF-8", SECRET_HEADER);
                None
            }
        },
        None => None,
    };

    match verify_secret(&config.secret, provided) {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::X_FRAME_OPTIONS,
        HeaderValue::from_static("SAMEORIGIN"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("no-referrer"),
    );

    response
}

/// Cache and download headers for files served straight from the public root.
/// Images are cacheable, everything else downloads under its own name.
pub fn static_header_control(response: &mut Response, filename: &str) {
    if !(response.status().is_success() || response.status().is_redirection()) {
        return;
    }

    let is_image = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("image/"));

    let headers = response.headers_mut();
    if is_image {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(PUBLIC_CACHE));
    } else {
        let disposition = format!(
            "attachment; filename=\"{}\"",
            encode_filename(filename)
        );
        match HeaderValue::from_str(&disposition) {
            Ok(value) => {
                headers.insert(header::CONTENT_DISPOSITION, value);
            }
            Err(e) => warn!("Cannot build Content-Disposition for {}: {}", filename, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn response_with(content_type: &str, status: StatusCode) -> Response {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        response
    }

    #[test]
    fn images_are_cacheable() {
        let mut response = response_with("image/webp", StatusCode::OK);
        static_header_control(&mut response, "1.webp");
        assert_eq!(response.headers()[header::CACHE_CONTROL], PUBLIC_CACHE);
        assert!(response.headers().get(header::CONTENT_DISPOSITION).is_none());
    }

    #[test]
    fn other_files_download_under_their_name() {
        let mut response = response_with("application/pdf", StatusCode::OK);
        static_header_control(&mut response, "my report.pdf");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"my%20report.pdf\""
        );
        assert!(response.headers().get(header::CACHE_CONTROL).is_none());
    }

    #[test]
    fn errors_are_left_alone() {
        let mut response = response_with("text/plain", StatusCode::NOT_FOUND);
        static_header_control(&mut response, "missing.txt");
        assert!(response.headers().get(header::CONTENT_DISPOSITION).is_none());
    }
}
