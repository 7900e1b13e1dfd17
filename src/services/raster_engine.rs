//! Pure Rust image engine.
//!
//! | Step | Crate / function |
//! |---|---|
//! | Decode, frame count | `image` decoders (`GifDecoder`, `WebPDecoder`, `PngDecoder` for APNG) |
//! | Orientation | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Resize / crop | `image::imageops` with `Lanczos3` |
//! | Palette | `color_quant` via [`super::quantize`] |
//! | Encode → WEBP | `webp::Encoder` (lossy, libwebp) |
//! | Encode → GIF | `image::codecs::gif::GifEncoder`, infinite loop |
//!
//! Animation frames come out of the decoders already composited onto the full
//! logical canvas, which is what coalescing requires before per-frame geometry.

use std::{
    io::Cursor,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use bytes::Bytes;
use image::{
    codecs::{
        gif::{GifDecoder, GifEncoder, Repeat},
        png::PngDecoder,
        webp::WebPDecoder,
    },
    imageops::{self, FilterType},
    AnimationDecoder, Delay, DynamicImage, Frame, ImageDecoder, ImageFormat, ImageReader,
    Limits, RgbaImage,
};
use tracing::debug;

use crate::{
    application::{
        error::ApplicationError,
        services::{
            geometry_resolver::{center_offset, clip_crop, fill_dimensions, fit_dimensions},
            image_engine::{GeometryStep, ImageEngine, TranscodePlan},
        },
    },
    domain::models::{
        geometry::Dimensions,
        image::{ImageInfo, OutputFormat},
    },
    services::{error::EngineError, quantize},
};

const GIF_ENCODE_SPEED: i32 = 10;

/// Largest canvas edge any decoder accepts.
const MAX_DECODE_EDGE: u32 = 20_000;
/// Single allocation ceiling handed to the decoders.
const MAX_DECODE_ALLOC: u64 = 512 * 1024 * 1024;
/// Sum of RGBA bytes across all decoded frames of one image.
const MAX_FRAME_BYTES: u64 = 512 * 1024 * 1024;
/// libwebp refuses anything wider or taller.
const WEBP_MAX_EDGE: u32 = 16_383;

#[derive(Debug, Clone, Copy, Default)]
pub struct RasterEngine;

impl RasterEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ImageEngine for RasterEngine {
    async fn probe(&self, path: &Path) -> Result<ImageInfo, ApplicationError> {
        let path = path.to_path_buf();
        Ok(run_blocking(move || {
            let data = std::fs::read(&path)?;
            inspect(&data)
        })
        .await?)
    }

    async fn probe_bytes(&self, data: Bytes) -> Result<ImageInfo, ApplicationError> {
        Ok(run_blocking(move || inspect(&data)).await?)
    }

    async fn execute(
        &self,
        source: &Path,
        plan: &TranscodePlan,
        output: &Path,
    ) -> Result<(), ApplicationError> {
        let source = source.to_path_buf();
        let output: PathBuf = output.to_path_buf();
        let plan = *plan;
        Ok(run_blocking(move || {
            let data = std::fs::read(&source)?;
            let encoded = transcode(&data, &plan)?;
            std::fs::write(&output, encoded)?;
            Ok(())
        })
        .await?)
    }

    async fn render(&self, data: Bytes, plan: &TranscodePlan) -> Result<Bytes, ApplicationError> {
        let plan = *plan;
        let encoded = run_blocking(move || transcode(&data, &plan)).await?;
        Ok(Bytes::from(encoded))
    }
}

async fn run_blocking<T, F>(work: F) -> Result<T, EngineError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, EngineError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| EngineError::Task(e.to_string()))?
}

fn guess_format(data: &[u8]) -> Result<ImageFormat, EngineError> {
    image::guess_format(data).map_err(|_| EngineError::UnknownFormat)
}

fn decode_limits() -> Limits {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_DECODE_EDGE);
    limits.max_image_height = Some(MAX_DECODE_EDGE);
    limits.max_alloc = Some(MAX_DECODE_ALLOC);
    limits
}

fn gif_decoder(data: &[u8]) -> Result<GifDecoder<Cursor<&[u8]>>, EngineError> {
    let mut decoder = GifDecoder::new(Cursor::new(data))?;
    decoder.set_limits(decode_limits())?;
    Ok(decoder)
}

fn webp_decoder(data: &[u8]) -> Result<WebPDecoder<Cursor<&[u8]>>, EngineError> {
    let mut decoder = WebPDecoder::new(Cursor::new(data))?;
    decoder.set_limits(decode_limits())?;
    Ok(decoder)
}

fn png_decoder(data: &[u8]) -> Result<PngDecoder<Cursor<&[u8]>>, EngineError> {
    Ok(PngDecoder::with_limits(Cursor::new(data), decode_limits())?)
}

fn still_reader(data: &[u8], format: ImageFormat) -> ImageReader<Cursor<&[u8]>> {
    let mut reader = ImageReader::with_format(Cursor::new(data), format);
    reader.limits(decode_limits());
    reader
}

fn inspect(data: &[u8]) -> Result<ImageInfo, EngineError> {
    let format = guess_format(data)?;

    let (dimensions, frame_count) = match format {
        ImageFormat::Gif => {
            let decoder = gif_decoder(data)?;
            let (width, height) = decoder.dimensions();
            (Dimensions::new(width, height), count_frames(decoder, MAX_FRAME_BYTES)?)
        }
        ImageFormat::WebP => {
            let decoder = webp_decoder(data)?;
            let (width, height) = decoder.dimensions();
            let frames = if decoder.has_animation() {
                count_frames(decoder, MAX_FRAME_BYTES)?
            } else {
                1
            };
            (Dimensions::new(width, height), frames)
        }
        ImageFormat::Png => {
            let decoder = png_decoder(data)?;
            let (width, height) = decoder.dimensions();
            let frames = if decoder.is_apng()? {
                count_frames(decoder.apng()?, MAX_FRAME_BYTES)?
            } else {
                1
            };
            (Dimensions::new(width, height), frames)
        }
        _ => {
            let (width, height) = still_reader(data, format).into_dimensions()?;
            (Dimensions::new(width, height), 1)
        }
    };

    Ok(ImageInfo {
        width: dimensions.width,
        height: dimensions.height,
        frame_count,
    })
}

fn count_frames<'a>(decoder: impl AnimationDecoder<'a>, budget: u64) -> Result<u32, EngineError> {
    let mut count = 0u32;
    let mut decoded = 0u64;
    for frame in decoder.into_frames() {
        decoded += frame?.buffer().as_raw().len() as u64;
        if decoded > budget {
            return Err(EngineError::TooLarge { limit: budget });
        }
        count += 1;
    }
    Ok(count.max(1))
}

/// Runs `plan` on encoded bytes and returns the encoded result.
fn transcode(data: &[u8], plan: &TranscodePlan) -> Result<Vec<u8>, EngineError> {
    let frames = decode_frames(data, plan)?;

    let mut processed = Vec::with_capacity(frames.len());
    for (buffer, delay) in frames {
        let mut buffer = apply_geometry(buffer, &plan.geometry)?;
        if let Some(finishing) = &plan.finishing {
            quantize::apply(&mut buffer, finishing);
        }
        processed.push((buffer, delay));
    }

    debug!(
        frames = processed.len(),
        format = plan.format.extension(),
        "Encoding"
    );

    match plan.format {
        OutputFormat::Webp => encode_webp(&processed, plan.quality),
        OutputFormat::Gif => encode_gif(processed),
    }
}

type DecodedFrame = (RgbaImage, Delay);

fn decode_frames(data: &[u8], plan: &TranscodePlan) -> Result<Vec<DecodedFrame>, EngineError> {
    let format = guess_format(data)?;

    let animated = match format {
        ImageFormat::Gif => Some(collect_frames(gif_decoder(data)?, plan, MAX_FRAME_BYTES)?),
        ImageFormat::WebP => {
            let decoder = webp_decoder(data)?;
            if decoder.has_animation() {
                Some(collect_frames(decoder, plan, MAX_FRAME_BYTES)?)
            } else {
                None
            }
        }
        ImageFormat::Png => {
            let decoder = png_decoder(data)?;
            if decoder.is_apng()? {
                Some(collect_frames(decoder.apng()?, plan, MAX_FRAME_BYTES)?)
            } else {
                None
            }
        }
        _ => None,
    };

    match animated {
        Some(frames) if !frames.is_empty() => Ok(frames),
        Some(_) => Err(EngineError::Encode("animation has no frames".to_string())),
        None => Ok(vec![(decode_still(data, format, plan)?, Delay::from_numer_denom_ms(0, 1))]),
    }
}

/// Decodes frames until `budget` RGBA bytes are held, then gives up.
fn collect_frames<'a>(
    decoder: impl AnimationDecoder<'a>,
    plan: &TranscodePlan,
    budget: u64,
) -> Result<Vec<DecodedFrame>, EngineError> {
    let limit = if plan.first_frame_only { 1 } else { usize::MAX };
    let mut frames = Vec::new();
    let mut decoded = 0u64;
    for frame in decoder.into_frames().take(limit) {
        let frame = frame?;
        decoded += frame.buffer().as_raw().len() as u64;
        if decoded > budget {
            return Err(EngineError::TooLarge { limit: budget });
        }
        let delay = frame.delay();
        frames.push((frame.into_buffer(), delay));
    }
    Ok(frames)
}

fn decode_still(
    data: &[u8],
    format: ImageFormat,
    plan: &TranscodePlan,
) -> Result<RgbaImage, EngineError> {
    let mut decoder = still_reader(data, format).into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut image = DynamicImage::from_decoder(decoder)?;
    if plan.auto_orient {
        image.apply_orientation(orientation);
    }
    Ok(image.into_rgba8())
}

fn apply_geometry(frame: RgbaImage, step: &GeometryStep) -> Result<RgbaImage, EngineError> {
    let source = Dimensions::new(frame.width(), frame.height());
    match *step {
        GeometryStep::None => Ok(frame),
        GeometryStep::FitOnly(bound) => {
            let target = fit_dimensions(source, bound);
            Ok(resize_to(frame, target))
        }
        GeometryStep::FillThenCenterCrop(target) => Ok(fill_and_crop(frame, target)),
        GeometryStep::CropThenFill { crop, target } => {
            let crop = clip_crop(crop, source).ok_or(EngineError::CropOutOfBounds)?;
            let cut = imageops::crop_imm(&frame, crop.x, crop.y, crop.width, crop.height)
                .to_image();
            Ok(fill_and_crop(cut, target))
        }
    }
}

fn resize_to(frame: RgbaImage, target: Dimensions) -> RgbaImage {
    if frame.width() == target.width && frame.height() == target.height {
        return frame;
    }
    imageops::resize(&frame, target.width, target.height, FilterType::Lanczos3)
}

/// Cover `target`, then cut the centered window. The result starts at the
/// origin, so no canvas offset survives.
fn fill_and_crop(frame: RgbaImage, target: Dimensions) -> RgbaImage {
    let source = Dimensions::new(frame.width(), frame.height());
    let covered = resize_to(frame, fill_dimensions(source, target));
    let (x, y) = center_offset(
        Dimensions::new(covered.width(), covered.height()),
        target,
    );
    imageops::crop_imm(&covered, x, y, target.width, target.height).to_image()
}

fn encode_webp(frames: &[DecodedFrame], quality: u8) -> Result<Vec<u8>, EngineError> {
    let (frame, _) = frames
        .first()
        .ok_or_else(|| EngineError::Encode("nothing to encode".to_string()))?;
    if frame.width() > WEBP_MAX_EDGE || frame.height() > WEBP_MAX_EDGE {
        return Err(EngineError::Encode(format!(
            "{}x{} exceeds the webp limit of {}",
            frame.width(),
            frame.height(),
            WEBP_MAX_EDGE
        )));
    }
    let encoder = webp::Encoder::from_rgba(frame.as_raw(), frame.width(), frame.height());
    let encoded = encoder
        .encode_simple(false, f32::from(quality))
        .map_err(|e| EngineError::Encode(format!("{:?}", e)))?;
    Ok(encoded.to_vec())
}

fn encode_gif(frames: Vec<DecodedFrame>) -> Result<Vec<u8>, EngineError> {
    let mut buffer = Vec::new();
    {
        let mut encoder = GifEncoder::new_with_speed(&mut buffer, GIF_ENCODE_SPEED);
        encoder.set_repeat(Repeat::Infinite)?;
        encoder.encode_frames(
            frames
                .into_iter()
                .map(|(image, delay)| Frame::from_parts(image, 0, 0, delay)),
        )?;
    }
    Ok(buffer)
}
