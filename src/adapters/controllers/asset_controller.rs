use axum::{
    body::Body,
    extract::{Path, Query, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tracing::{info, warn};

use crate::{
    adapters::{
        dto::asset_dto::{ProxyDimensionsQuery, ProxyQuery, TransformQuery},
        middleware::{static_header_control, PUBLIC_CACHE},
        state::AppState,
    },
    application::{
        error::ApplicationError,
        services::{
            on_demand::{RenderedImage, TransformDirective},
            secret::verify_secret,
        },
    },
    domain::models::geometry::Dimensions,
};

pub struct AssetController;

impl AssetController {
    /// GET /{*path}?type=webp&size=N
    ///
    /// Without a transform query the file is served as stored. A failed
    /// transform falls back to the stored file as well.
    pub async fn get_asset(
        State(app_state): State<AppState>,
        Path(relative): Path<String>,
        Query(query): Query<TransformQuery>,
        request: Request,
    ) -> Result<Response, ApplicationError> {
        let namespace = app_state.storage.namespace();
        namespace.join_relative(&relative)?;

        if let Some(directive) =
            TransformDirective::from_query(query.kind.as_deref(), query.size.as_deref())
        {
            match app_state.on_demand.render_stored(&relative, directive).await {
                Ok(rendered) => return Ok(rendered_response(rendered)),
                Err(ApplicationError::InvalidPath) => return Err(ApplicationError::InvalidPath),
                Err(e) => warn!("Serving {} untransformed: {}", relative, e),
            }
        }

        let mut response = match ServeDir::new(namespace.root()).oneshot(request).await {
            Ok(response) => response.map(Body::new),
            Err(infallible) => match infallible {},
        };

        let filename = relative.rsplit('/').next().unwrap_or(&relative);
        static_header_control(&mut response, filename);
        Ok(response)
    }

    /// GET /proxy/{encodedUrl}/{filename}?type=webp
    pub async fn proxy(
        State(app_state): State<AppState>,
        Path((url, _filename)): Path<(String, String)>,
        Query(query): Query<ProxyQuery>,
    ) -> Result<Response, ApplicationError> {
        let static_webp = query
            .kind
            .as_deref()
            .is_some_and(|k| k.eq_ignore_ascii_case("webp"));

        info!("Proxying remote image (static_webp: {})", static_webp);
        let rendered = app_state.on_demand.render_remote(&url, static_webp).await?;
        Ok(rendered_response(rendered))
    }

    /// GET /proxy-dimensions?url=...&secret=...
    pub async fn proxy_dimensions(
        State(app_state): State<AppState>,
        Query(query): Query<ProxyDimensionsQuery>,
    ) -> Result<Json<Dimensions>, ApplicationError> {
        verify_secret(&app_state.config.secret, query.secret.as_deref())?;
        let url = query.url.ok_or(ApplicationError::InvalidUrl)?;
        let dimensions = app_state.on_demand.remote_dimensions(&url).await?;
        Ok(Json(dimensions))
    }
}

fn rendered_response(rendered: RenderedImage) -> Response {
    let content_type = HeaderValue::from_str(&rendered.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, HeaderValue::from_static(PUBLIC_CACHE)),
            (header::ACCEPT_RANGES, HeaderValue::from_static("bytes")),
        ],
        rendered.data,
    )
        .into_response()
}
