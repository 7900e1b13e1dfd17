//! Read-time transforms of stored or remote images. Nothing produced here is
//! ever written to the public namespace.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::{
    application::{
        error::ApplicationError,
        services::{
            image_engine::{ImageEngine, TranscodePlan},
            namespace::PublicNamespace,
            remote_source::{parse_remote_url, RemoteSource},
        },
    },
    domain::models::{
        geometry::Dimensions,
        image::{is_supported_image_mime, OutputFormat},
    },
};

pub const MAX_PREVIEW_EDGE: u32 = 1920;

/// The `type` / `size` query of a read request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformDirective {
    /// `type=webp`: first frame only, encoded as WEBP.
    pub static_webp: bool,
    pub size: Option<u32>,
}

impl TransformDirective {
    /// `None` when neither parameter is present, which means the file is
    /// served untouched.
    pub fn from_query(kind: Option<&str>, size: Option<&str>) -> Option<Self> {
        let kind = kind.filter(|k| !k.is_empty());
        let size = size.filter(|s| !s.is_empty());
        if kind.is_none() && size.is_none() {
            return None;
        }
        Some(Self {
            static_webp: kind.is_some_and(|k| k.eq_ignore_ascii_case("webp")),
            size: size.and_then(parse_size),
        })
    }
}

/// Leading integer of `raw`, clamped to [`MAX_PREVIEW_EDGE`]. Zero, negative
/// and non-numeric values mean "no resize".
fn parse_size(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let digits = &digits[..end];
    if negative || digits.is_empty() {
        return None;
    }
    // Anything too long for u64 is certainly above the clamp.
    let value = digits.parse::<u64>().unwrap_or(u64::MAX);
    match value {
        0 => None,
        v if v >= MAX_PREVIEW_EDGE as u64 => Some(MAX_PREVIEW_EDGE),
        v => Some(v as u32),
    }
}

#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub content_type: String,
    pub data: Bytes,
}

#[derive(Clone)]
pub struct OnDemandTranscodeService {
    engine: Arc<dyn ImageEngine>,
    namespace: PublicNamespace,
    remote: Arc<dyn RemoteSource>,
    max_remote_bytes: u64,
}

impl OnDemandTranscodeService {
    pub fn new(
        engine: Arc<dyn ImageEngine>,
        namespace: PublicNamespace,
        remote: Arc<dyn RemoteSource>,
        max_remote_bytes: u64,
    ) -> Self {
        Self {
            engine,
            namespace,
            remote,
            max_remote_bytes,
        }
    }

    /// Transforms a file inside the public namespace.
    ///
    /// Traversal and directories fail with `InvalidPath` before anything is
    /// decoded. Engine failures surface as `CompressError`, which the caller
    /// may answer by serving the original.
    pub async fn render_stored(
        &self,
        relative_path: &str,
        directive: TransformDirective,
    ) -> Result<RenderedImage, ApplicationError> {
        let path = self.namespace.resolve_file(relative_path).await?;
        let data = Bytes::from(
            tokio::fs::read(&path)
                .await
                .map_err(ApplicationError::internal)?,
        );
        self.render(data, directive).await
    }

    /// Proxies a remote image, optionally as a static WEBP preview.
    ///
    /// The scheme is checked first, then a `HEAD` probe must report an image
    /// type before the body is fetched.
    pub async fn render_remote(
        &self,
        raw_url: &str,
        static_webp: bool,
    ) -> Result<RenderedImage, ApplicationError> {
        let url = parse_remote_url(raw_url)?;
        let probe = self.remote.probe(&url).await?;
        let content_type = image_content_type(probe.content_type.as_deref())?;

        let body = self
            .remote
            .fetch(&probe.final_url, self.max_remote_bytes)
            .await?;

        if !static_webp {
            return Ok(RenderedImage {
                content_type,
                data: body.data,
            });
        }

        self.render(
            body.data,
            TransformDirective {
                static_webp: true,
                size: None,
            },
        )
        .await
    }

    /// Width and height of a remote image, read without storing it.
    pub async fn remote_dimensions(&self, raw_url: &str) -> Result<Dimensions, ApplicationError> {
        let url = parse_remote_url(raw_url)?;
        let body = self.remote.fetch(&url, self.max_remote_bytes).await?;
        image_content_type(body.content_type.as_deref())?;
        let info = self.engine.probe_bytes(body.data).await?;
        Ok(info.dimensions())
    }

    async fn render(
        &self,
        data: Bytes,
        directive: TransformDirective,
    ) -> Result<RenderedImage, ApplicationError> {
        let info = self.engine.probe_bytes(data.clone()).await?;
        let format = if directive.static_webp {
            OutputFormat::Webp
        } else {
            OutputFormat::for_animation(info.is_animated())
        };
        let plan = TranscodePlan::for_preview(directive.size, directive.static_webp, format);

        debug!(
            width = info.width,
            height = info.height,
            frames = info.frame_count,
            ?directive,
            "Rendering preview"
        );

        let data = self.engine.render(data, &plan).await.map_err(|e| {
            warn!("Preview render failed: {}", e);
            ApplicationError::CompressError
        })?;

        Ok(RenderedImage {
            content_type: format.mime_type().to_string(),
            data,
        })
    }
}

fn image_content_type(content_type: Option<&str>) -> Result<String, ApplicationError> {
    match content_type {
        Some(mime) if is_supported_image_mime(mime) => Ok(mime.to_string()),
        _ => Err(ApplicationError::InvalidImageType),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        application::services::{
            image_engine::GeometryStep,
            remote_source::{RemoteBody, RemoteProbe},
        },
        domain::models::image::ImageInfo,
    };
    use async_trait::async_trait;
    use reqwest::Url;
    use std::{path::Path, sync::Mutex};

    #[test]
    fn no_query_means_no_transform() {
        assert_eq!(TransformDirective::from_query(None, None), None);
        assert_eq!(TransformDirective::from_query(Some(""), Some("")), None);
    }

    #[test]
    fn size_is_clamped_and_sanitised() {
        let size = |raw| TransformDirective::from_query(None, Some(raw)).unwrap().size;
        assert_eq!(size("512"), Some(512));
        assert_eq!(size("1920"), Some(1920));
        assert_eq!(size("5000"), Some(1920));
        assert_eq!(size("99999999999999999999999"), Some(1920));
        assert_eq!(size("300px"), Some(300));
        assert_eq!(size("0"), None);
        assert_eq!(size("-10"), None);
        assert_eq!(size("abc"), None);
    }

    #[test]
    fn webp_type_requests_a_static_preview() {
        let directive = TransformDirective::from_query(Some("webp"), None).unwrap();
        assert!(directive.static_webp);
        assert_eq!(directive.size, None);

        let directive = TransformDirective::from_query(Some("png"), Some("64")).unwrap();
        assert!(!directive.static_webp);
    }

    struct StubEngine {
        info: ImageInfo,
        plans: Mutex<Vec<TranscodePlan>>,
    }

    #[async_trait]
    impl ImageEngine for StubEngine {
        async fn probe(&self, _path: &Path) -> Result<ImageInfo, ApplicationError> {
            Ok(self.info)
        }

        async fn probe_bytes(&self, _data: Bytes) -> Result<ImageInfo, ApplicationError> {
            Ok(self.info)
        }

        async fn execute(
            &self,
            _source: &Path,
            _plan: &TranscodePlan,
            _output: &Path,
        ) -> Result<(), ApplicationError> {
            Ok(())
        }

        async fn render(
            &self,
            _data: Bytes,
            plan: &TranscodePlan,
        ) -> Result<Bytes, ApplicationError> {
            self.plans.lock().unwrap().push(*plan);
            Ok(Bytes::from_static(b"rendered"))
        }
    }

    struct StubRemote {
        content_type: Option<&'static str>,
        fetched: Mutex<Vec<Url>>,
    }

    #[async_trait]
    impl RemoteSource for StubRemote {
        async fn probe(&self, url: &Url) -> Result<RemoteProbe, ApplicationError> {
            Ok(RemoteProbe {
                final_url: url.join("/final.png").unwrap(),
                content_type: self.content_type.map(str::to_string),
            })
        }

        async fn fetch(&self, url: &Url, _max_bytes: u64) -> Result<RemoteBody, ApplicationError> {
            self.fetched.lock().unwrap().push(url.clone());
            Ok(RemoteBody {
                content_type: self.content_type.map(str::to_string),
                data: Bytes::from_static(b"original"),
            })
        }
    }

    fn service(
        root: &Path,
        frames: u32,
        content_type: Option<&'static str>,
    ) -> (OnDemandTranscodeService, Arc<StubEngine>, Arc<StubRemote>) {
        let engine = Arc::new(StubEngine {
            info: ImageInfo {
                width: 800,
                height: 600,
                frame_count: frames,
            },
            plans: Mutex::new(Vec::new()),
        });
        let remote = Arc::new(StubRemote {
            content_type,
            fetched: Mutex::new(Vec::new()),
        });
        let service = OnDemandTranscodeService::new(
            engine.clone(),
            PublicNamespace::new(root),
            remote.clone(),
            1024,
        );
        (service, engine, remote)
    }

    #[tokio::test]
    async fn stored_animation_keeps_gif_unless_static_requested() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("emojis/1")).unwrap();
        std::fs::write(dir.path().join("emojis/1/1.gif"), b"gif").unwrap();
        let (service, engine, _) = service(dir.path(), 8, None);

        let sized = service
            .render_stored(
                "emojis/1/1.gif",
                TransformDirective {
                    static_webp: false,
                    size: Some(64),
                },
            )
            .await
            .unwrap();
        assert_eq!(sized.content_type, "image/gif");

        let still = service
            .render_stored(
                "emojis/1/1.gif",
                TransformDirective {
                    static_webp: true,
                    size: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(still.content_type, "image/webp");

        let plans = engine.plans.lock().unwrap();
        assert_eq!(plans[0].geometry, GeometryStep::FitOnly(Dimensions::square(64)));
        assert!(plans[1].first_frame_only);
    }

    #[tokio::test]
    async fn stored_traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (service, engine, _) = service(dir.path(), 1, None);
        let err = service
            .render_stored(
                "../secret.png",
                TransformDirective {
                    static_webp: true,
                    size: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::InvalidPath));
        assert!(engine.plans.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn remote_passthrough_fetches_the_redirect_target() {
        let dir = tempfile::tempdir().unwrap();
        let (service, engine, remote) = service(dir.path(), 1, Some("image/png"));

        let image = service
            .render_remote("https://example.com/start", false)
            .await
            .unwrap();

        assert_eq!(image.content_type, "image/png");
        assert_eq!(&image.data[..], b"original");
        assert_eq!(
            remote.fetched.lock().unwrap()[0].as_str(),
            "https://example.com/final.png"
        );
        assert!(engine.plans.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn remote_non_image_is_rejected_before_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _, remote) = service(dir.path(), 1, Some("text/html"));

        let err = service
            .render_remote("https://example.com/page", true)
            .await
            .unwrap_err();

        assert!(matches!(err, ApplicationError::InvalidImageType));
        assert!(remote.fetched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn remote_bad_scheme_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _, _) = service(dir.path(), 1, Some("image/png"));
        let err = service
            .render_remote("file:///etc/passwd", true)
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::InvalidUrl));
    }

    #[tokio::test]
    async fn remote_dimensions_are_read_by_the_engine() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _, _) = service(dir.path(), 1, Some("image/jpeg"));
        let dimensions = service
            .remote_dimensions("http://example.com/a.jpg")
            .await
            .unwrap();
        assert_eq!(dimensions, Dimensions::new(800, 600));
    }
}
