//! The seam between the pipeline and the image codec.
//!
//! A [`TranscodePlan`] describes the ordered operations; an [`ImageEngine`]
//! executes it. The pipeline never touches pixels itself, it only decides
//! what the engine should do and handles the files around it.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    application::error::ApplicationError,
    domain::models::{
        geometry::{CropBox, CropSpec, Dimensions, GeometryRequest, ResizeMode},
        image::{ImageInfo, OutputFormat},
    },
};

pub const DEFAULT_QUALITY: u8 = 90;

/// Lossy finishing applied after geometry: a deliberate size/quality trade.
/// Palette mapping is nearest-colour, never dithered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Finishing {
    pub alpha: bool,
    /// Colour tolerance as a fraction of the full channel range.
    pub fuzz: f32,
    pub colors: u16,
}

impl Finishing {
    pub const LOSSY: Finishing = Finishing {
        alpha: true,
        fuzz: 0.10,
        colors: 128,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryStep {
    None,
    /// Shrink-only bound.
    FitOnly(Dimensions),
    /// Cover the box, center-crop to it, reset the canvas offset.
    FillThenCenterCrop(Dimensions),
    /// Cut `crop` at source resolution, then cover-and-crop to `target`.
    CropThenFill { crop: CropBox, target: Dimensions },
}

impl From<&GeometryRequest> for GeometryStep {
    fn from(request: &GeometryRequest) -> Self {
        match (request.crop, request.mode) {
            (None, ResizeMode::Fit) => GeometryStep::FitOnly(request.target),
            (None, ResizeMode::Fill) => GeometryStep::FillThenCenterCrop(request.target),
            (Some(CropSpec::SizeOnly(size)), _) => GeometryStep::FillThenCenterCrop(size),
            (Some(CropSpec::Rect(crop)), _) => GeometryStep::CropThenFill {
                crop,
                target: request.target,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranscodePlan {
    pub quality: u8,
    pub auto_orient: bool,
    pub first_frame_only: bool,
    pub geometry: GeometryStep,
    pub finishing: Option<Finishing>,
    pub format: OutputFormat,
}

impl TranscodePlan {
    /// The full upload pipeline: orient, geometry, lossy finishing. Animation
    /// frames always reach the engine coalesced onto the full canvas.
    pub fn for_upload(request: &GeometryRequest, format: OutputFormat) -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            auto_orient: true,
            first_frame_only: false,
            geometry: GeometryStep::from(request),
            finishing: Some(Finishing::LOSSY),
            format,
        }
    }

    /// Read-time conversion. A static preview only decodes the first frame.
    pub fn for_preview(bound: Option<u32>, static_only: bool, format: OutputFormat) -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            auto_orient: true,
            first_frame_only: static_only,
            geometry: bound
                .map(|edge| GeometryStep::FitOnly(Dimensions::square(edge)))
                .unwrap_or(GeometryStep::None),
            finishing: None,
            format,
        }
    }
}

#[async_trait]
pub trait ImageEngine: Send + Sync {
    /// Decode headers and count frames of a file.
    async fn probe(&self, path: &Path) -> Result<ImageInfo, ApplicationError>;

    async fn probe_bytes(&self, data: Bytes) -> Result<ImageInfo, ApplicationError>;

    /// Run `plan` on `source` and write the encoded result to `output`.
    async fn execute(
        &self,
        source: &Path,
        plan: &TranscodePlan,
        output: &Path,
    ) -> Result<(), ApplicationError>;

    /// Run `plan` on in-memory bytes and return the encoded result.
    async fn render(&self, data: Bytes, plan: &TranscodePlan) -> Result<Bytes, ApplicationError>;
}
