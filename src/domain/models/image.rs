use serde::Serialize;

use super::geometry::Dimensions;

pub const SUPPORTED_IMAGE_MIME_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "image/gif",
];

/// Compares the MIME essence only, so `image/png; charset=binary` still matches.
pub fn is_supported_image_mime(mime: &str) -> bool {
    let essence = mime.split(';').next().unwrap_or(mime).trim().to_ascii_lowercase();
    SUPPORTED_IMAGE_MIME_TYPES.contains(&essence.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Webp,
    Gif,
}

impl OutputFormat {
    /// Animated sources keep their frames as GIF, everything else becomes WEBP.
    pub fn for_animation(is_animated: bool) -> Self {
        if is_animated {
            OutputFormat::Gif
        } else {
            OutputFormat::Webp
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Webp => "webp",
            OutputFormat::Gif => "gif",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Webp => "image/webp",
            OutputFormat::Gif => "image/gif",
        }
    }
}

/// What the engine reports about a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub frame_count: u32,
}

impl ImageInfo {
    pub fn is_animated(&self) -> bool {
        self.frame_count > 1
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }
}
