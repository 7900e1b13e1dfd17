//! Crop and resize geometry.
//!
//! Everything here is pure: no I/O and no images, so the rules for user
//! supplied crop points and the two resize modes can be tested exhaustively.

use crate::{
    application::error::ApplicationError,
    domain::models::geometry::{CropBox, CropSpec, Dimensions, GeometryRequest, ResizeMode},
};

pub const MAX_POINT_VALUE: f64 = 9999.0;

/// Parses the raw `points` field into a crop box.
///
/// Absent, blank or `null` input means "no crop". Anything else must be a
/// JSON array of exactly four finite numbers in `[0, 9999]` that describe a
/// box with non-zero width and height.
pub fn parse_points(raw: Option<&str>) -> Result<Option<CropBox>, ApplicationError> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(raw) => raw,
    };

    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|_| ApplicationError::InvalidPoints)?;

    let entries = match value {
        serde_json::Value::Null => return Ok(None),
        serde_json::Value::Array(entries) => entries,
        _ => return Err(ApplicationError::InvalidPoints),
    };

    if entries.len() != 4 {
        return Err(ApplicationError::InvalidPoints);
    }

    let mut points = [0f64; 4];
    for (slot, entry) in points.iter_mut().zip(entries.iter()) {
        let n = entry.as_f64().ok_or(ApplicationError::InvalidPoints)?;
        if !n.is_finite() || !(0.0..=MAX_POINT_VALUE).contains(&n) {
            return Err(ApplicationError::InvalidPoints);
        }
        *slot = n;
    }

    let [x0, y0, x1, y1] = points;
    let crop = CropBox {
        x: x0.min(x1).round() as u32,
        y: y0.min(y1).round() as u32,
        width: (x1 - x0).abs().round() as u32,
        height: (y1 - y0).abs().round() as u32,
    };

    if crop.width == 0 || crop.height == 0 {
        return Err(ApplicationError::InvalidPoints);
    }

    Ok(Some(crop))
}

/// Builds the geometry for a request. Explicit points always switch the
/// request to Fill so the output is exactly `target`.
pub fn resolve(
    points: Option<&str>,
    target: Dimensions,
    mode: ResizeMode,
) -> Result<GeometryRequest, ApplicationError> {
    Ok(match parse_points(points)? {
        Some(crop) => GeometryRequest {
            target,
            mode: ResizeMode::Fill,
            crop: Some(CropSpec::Rect(crop)),
        },
        None => GeometryRequest {
            target,
            mode,
            crop: None,
        },
    })
}

/// Shrink-only, aspect-preserving bound of `source` inside `bound`.
pub fn fit_dimensions(source: Dimensions, bound: Dimensions) -> Dimensions {
    if source.width <= bound.width && source.height <= bound.height {
        return source;
    }
    let scale = f64::min(
        bound.width as f64 / source.width as f64,
        bound.height as f64 / source.height as f64,
    );
    Dimensions {
        width: scaled(source.width, scale).min(bound.width),
        height: scaled(source.height, scale).min(bound.height),
    }
}

/// Aspect-preserving size that covers `target`; at least one edge matches
/// exactly and neither edge falls short.
pub fn fill_dimensions(source: Dimensions, target: Dimensions) -> Dimensions {
    let scale = f64::max(
        target.width as f64 / source.width as f64,
        target.height as f64 / source.height as f64,
    );
    Dimensions {
        width: scaled(source.width, scale).max(target.width),
        height: scaled(source.height, scale).max(target.height),
    }
}

/// Top-left corner of a `target` sized window centered inside `outer`.
pub fn center_offset(outer: Dimensions, target: Dimensions) -> (u32, u32) {
    (
        outer.width.saturating_sub(target.width) / 2,
        outer.height.saturating_sub(target.height) / 2,
    )
}

/// Intersection of `crop` with a `source` sized canvas. `None` when the box
/// lies entirely outside the image.
pub fn clip_crop(crop: CropBox, source: Dimensions) -> Option<CropBox> {
    if crop.x >= source.width || crop.y >= source.height {
        return None;
    }
    let width = crop.width.min(source.width - crop.x);
    let height = crop.height.min(source.height - crop.y);
    if width == 0 || height == 0 {
        return None;
    }
    Some(CropBox {
        x: crop.x,
        y: crop.y,
        width,
        height,
    })
}

fn scaled(edge: u32, scale: f64) -> u32 {
    ((edge as f64 * scale).round() as u32).max(1)
}
