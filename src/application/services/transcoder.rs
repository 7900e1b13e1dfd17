use std::{path::Path, sync::Arc};

use tracing::{debug, warn};

use crate::{
    application::{
        error::ApplicationError,
        services::image_engine::{ImageEngine, TranscodePlan},
    },
    domain::models::{
        asset::TranscodeResult, geometry::GeometryRequest, image::OutputFormat,
        upload::split_filename,
    },
};

#[derive(Debug, Clone)]
pub struct TranscodeRequest<'a> {
    pub source: &'a Path,
    pub geometry: GeometryRequest,
    /// Created when absent.
    pub destination_dir: &'a Path,
    pub original_filename: &'a str,
    /// Replaces the user's basename, e.g. with a generated asset id.
    pub replacement_basename: Option<&'a str>,
}

#[derive(Clone)]
pub struct Transcoder {
    engine: Arc<dyn ImageEngine>,
}

impl Transcoder {
    pub fn new(engine: Arc<dyn ImageEngine>) -> Self {
        Self { engine }
    }

    /// Decodes the source, picks GIF for animations and WEBP otherwise, runs
    /// the upload plan and confirms the written file by reading it back.
    ///
    /// Any failure is a `CompressError`; a partially written output is removed
    /// before returning.
    pub async fn transcode(
        &self,
        request: TranscodeRequest<'_>,
    ) -> Result<TranscodeResult, ApplicationError> {
        let source_info = self.engine.probe(request.source).await.map_err(|e| {
            warn!("Cannot decode {}: {}", request.source.display(), e);
            ApplicationError::CompressError
        })?;

        let is_animated = source_info.is_animated();
        let format = OutputFormat::for_animation(is_animated);
        let output_filename = output_filename(
            request.original_filename,
            request.replacement_basename,
            format,
        );

        tokio::fs::create_dir_all(request.destination_dir)
            .await
            .map_err(|e| {
                warn!(
                    "Cannot create destination {}: {}",
                    request.destination_dir.display(),
                    e
                );
                ApplicationError::CompressError
            })?;

        let output_path = request.destination_dir.join(&output_filename);
        let plan = TranscodePlan::for_upload(&request.geometry, format);

        debug!(
            source = %request.source.display(),
            output = %output_path.display(),
            frames = source_info.frame_count,
            geometry = ?plan.geometry,
            "Transcoding"
        );

        if let Err(e) = self
            .engine
            .execute(request.source, &plan, &output_path)
            .await
        {
            warn!("Transcode of {} failed: {}", request.source.display(), e);
            remove_output(&output_path).await;
            return Err(ApplicationError::CompressError);
        }

        let written = match self.engine.probe(&output_path).await {
            Ok(info) => info,
            Err(e) => {
                warn!("Written file {} is unreadable: {}", output_path.display(), e);
                remove_output(&output_path).await;
                return Err(ApplicationError::CompressError);
            }
        };

        Ok(TranscodeResult {
            output_path,
            output_filename,
            dimensions: written.dimensions(),
            is_animated,
        })
    }
}

async fn remove_output(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Cannot remove partial output {}: {}", path.display(), e);
        }
    }
}

fn output_filename(
    original_filename: &str,
    replacement_basename: Option<&str>,
    format: OutputFormat,
) -> String {
    let basename = match replacement_basename {
        Some(name) => safe_filename(name),
        None => safe_filename(&split_filename(original_filename).0),
    };
    format!("{}.{}", basename, format.extension())
}

/// Strips leading dots (and surrounding whitespace) so the result can never
/// be a hidden file; empty names become `unnamed`.
pub fn safe_filename(name: &str) -> String {
    let stripped = name.trim().trim_start_matches(|c: char| c == '.' || c.is_whitespace());
    if stripped.is_empty() {
        "unnamed".to_string()
    } else {
        stripped.to_string()
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::domain::models::{
        geometry::{CropBox, CropSpec, Dimensions},
        image::ImageInfo,
    };
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::{path::PathBuf, sync::Mutex};

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Probe(PathBuf),
        Execute { output: PathBuf, plan: TranscodePlan },
    }

    /// Records operations; `probe` pops queued results from the back.
    #[derive(Default)]
    pub struct MockEngine {
        pub probe_results: Mutex<Vec<Result<ImageInfo, ()>>>,
        pub fail_execute: bool,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    impl MockEngine {
        /// `results` in call order.
        pub fn with_probes(mut results: Vec<Result<ImageInfo, ()>>) -> Self {
            results.reverse();
            Self {
                probe_results: Mutex::new(results),
                ..Self::default()
            }
        }

        pub fn operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ImageEngine for MockEngine {
        async fn probe(&self, path: &Path) -> Result<ImageInfo, ApplicationError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Probe(path.to_path_buf()));
            self.probe_results
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(()))
                .map_err(|_| ApplicationError::CompressError)
        }

        async fn probe_bytes(&self, _data: Bytes) -> Result<ImageInfo, ApplicationError> {
            Err(ApplicationError::CompressError)
        }

        async fn execute(
            &self,
            _source: &Path,
            plan: &TranscodePlan,
            output: &Path,
        ) -> Result<(), ApplicationError> {
            self.operations.lock().unwrap().push(RecordedOp::Execute {
                output: output.to_path_buf(),
                plan: *plan,
            });
            // Leave a partial file behind either way.
            std::fs::write(output, b"partial").unwrap();
            if self.fail_execute {
                Err(ApplicationError::CompressError)
            } else {
                Ok(())
            }
        }

        async fn render(
            &self,
            _data: Bytes,
            _plan: &TranscodePlan,
        ) -> Result<Bytes, ApplicationError> {
            Err(ApplicationError::CompressError)
        }
    }

    fn info(width: u32, height: u32, frame_count: u32) -> ImageInfo {
        ImageInfo {
            width,
            height,
            frame_count,
        }
    }

    fn request<'a>(source: &'a Path, dest: &'a Path, name: &'a str) -> TranscodeRequest<'a> {
        TranscodeRequest {
            source,
            geometry: GeometryRequest::fit(Dimensions::square(1920)),
            destination_dir: dest,
            original_filename: name,
            replacement_basename: None,
        }
    }

    #[tokio::test]
    async fn static_source_becomes_webp() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out");
        let engine = Arc::new(MockEngine::with_probes(vec![
            Ok(info(4000, 3000, 1)),
            Ok(info(1920, 1440, 1)),
        ]));
        let transcoder = Transcoder::new(engine.clone());

        let result = transcoder
            .transcode(request(Path::new("/scratch/1.png"), &dest, "holiday.png"))
            .await
            .unwrap();

        assert_eq!(result.output_filename, "holiday.webp");
        assert_eq!(result.output_path, dest.join("holiday.webp"));
        assert_eq!(result.dimensions, Dimensions::new(1920, 1440));
        assert!(!result.is_animated);

        let ops = engine.operations();
        assert_eq!(ops.len(), 3);
        assert!(matches!(&ops[1], RecordedOp::Execute { plan, .. } if plan.format == OutputFormat::Webp));
        assert_eq!(ops[2], RecordedOp::Probe(dest.join("holiday.webp")));
    }

    #[tokio::test]
    async fn animated_source_becomes_gif() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(MockEngine::with_probes(vec![
            Ok(info(64, 64, 12)),
            Ok(info(64, 64, 12)),
        ]));
        let transcoder = Transcoder::new(engine);

        let mut req = request(Path::new("/scratch/2.gif"), dir.path(), "party.gif");
        req.replacement_basename = Some("1234");
        let result = transcoder.transcode(req).await.unwrap();

        assert_eq!(result.output_filename, "1234.gif");
        assert!(result.is_animated);
    }

    #[tokio::test]
    async fn crop_geometry_reaches_the_engine() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(MockEngine::with_probes(vec![
            Ok(info(500, 500, 1)),
            Ok(info(200, 200, 1)),
        ]));
        let transcoder = Transcoder::new(engine.clone());
        let crop = CropBox {
            x: 10,
            y: 10,
            width: 200,
            height: 200,
        };

        let mut req = request(Path::new("/scratch/3.jpg"), dir.path(), "me.jpg");
        req.geometry = GeometryRequest::fit(Dimensions::square(200)).with_crop(CropSpec::Rect(crop));
        transcoder.transcode(req).await.unwrap();

        let ops = engine.operations();
        assert!(matches!(
            &ops[1],
            RecordedOp::Execute { plan, .. }
                if plan.geometry == crate::application::services::image_engine::GeometryStep::CropThenFill {
                    crop,
                    target: Dimensions::square(200)
                }
        ));
    }

    #[tokio::test]
    async fn undecodable_source_is_a_compress_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(MockEngine::with_probes(vec![Err(())]));
        let transcoder = Transcoder::new(engine.clone());

        let err = transcoder
            .transcode(request(Path::new("/scratch/x.png"), dir.path(), "x.png"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApplicationError::CompressError));
        assert_eq!(engine.operations().len(), 1);
    }

    #[tokio::test]
    async fn failed_write_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(MockEngine {
            fail_execute: true,
            ..MockEngine::with_probes(vec![Ok(info(10, 10, 1))])
        });
        let transcoder = Transcoder::new(engine);

        let err = transcoder
            .transcode(request(Path::new("/scratch/x.png"), dir.path(), "x.png"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApplicationError::CompressError));
        assert!(!dir.path().join("x.webp").exists());
    }

    #[tokio::test]
    async fn unreadable_output_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(MockEngine::with_probes(vec![Ok(info(10, 10, 1)), Err(())]));
        let transcoder = Transcoder::new(engine);

        let err = transcoder
            .transcode(request(Path::new("/scratch/x.png"), dir.path(), "x.png"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApplicationError::CompressError));
        assert!(!dir.path().join("x.webp").exists());
    }

    #[test]
    fn safe_filename_strips_leading_dots() {
        assert_eq!(safe_filename(".hidden"), "hidden");
        assert_eq!(safe_filename(" . .bashrc"), "bashrc");
        assert_eq!(safe_filename("..."), "unnamed");
        assert_eq!(safe_filename(""), "unnamed");
        assert_eq!(safe_filename("cat.v2"), "cat.v2");
    }

    #[test]
    fn output_filename_uses_replacement_when_given() {
        assert_eq!(
            output_filename("photo.jpeg", Some("99"), OutputFormat::Webp),
            "99.webp"
        );
        assert_eq!(
            output_filename(".png", None, OutputFormat::Gif),
            "unnamed.gif"
        );
    }
}
