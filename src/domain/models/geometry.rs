use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn square(edge: u32) -> Self {
        Self::new(edge, edge)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeMode {
    /// Preserve aspect ratio, shrink only, longer edge bounded by the target.
    Fit,
    /// Preserve aspect ratio, cover the target, then crop to it exactly.
    Fill,
}

/// Crop rectangle in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropSpec {
    /// Legacy two-value crop: fill the size, then crop around the center.
    SizeOnly(Dimensions),
    /// Explicit rectangle cut at source resolution before resizing.
    Rect(CropBox),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryRequest {
    pub target: Dimensions,
    pub mode: ResizeMode,
    pub crop: Option<CropSpec>,
}

impl GeometryRequest {
    pub fn fit(target: Dimensions) -> Self {
        Self {
            target,
            mode: ResizeMode::Fit,
            crop: None,
        }
    }

    pub fn with_crop(mut self, crop: CropSpec) -> Self {
        self.crop = Some(crop);
        self
    }
}
