//! Lossy finishing: alpha snapping and palette reduction.

use color_quant::NeuQuant;
use image::{Rgba, RgbaImage};

use crate::application::services::image_engine::Finishing;

/// NeuQuant sampling factor: 1 is the slowest and best, 30 the fastest.
const SAMPLE_FACTOR: i32 = 10;

pub fn apply(frame: &mut RgbaImage, finishing: &Finishing) {
    snap_alpha(frame, finishing);
    reduce_palette(frame, finishing.colors);
}

/// Alpha within `fuzz` of either extreme is pushed to that extreme, so nearly
/// invisible fringes vanish and nearly opaque pixels stop blending. Without
/// alpha support the frame is made fully opaque.
fn snap_alpha(frame: &mut RgbaImage, finishing: &Finishing) {
    if !finishing.alpha {
        for pixel in frame.pixels_mut() {
            pixel[3] = u8::MAX;
        }
        return;
    }

    let low = (finishing.fuzz.clamp(0.0, 1.0) * 255.0).round() as u8;
    let high = u8::MAX - low;
    for pixel in frame.pixels_mut() {
        if pixel[3] <= low {
            *pixel = Rgba([0, 0, 0, 0]);
        } else if pixel[3] >= high {
            pixel[3] = u8::MAX;
        }
    }
}

/// Maps every pixel to its nearest palette entry. No error diffusion.
fn reduce_palette(frame: &mut RgbaImage, colors: u16) {
    let colors = usize::from(colors.clamp(2, 256));
    let quantizer = NeuQuant::new(SAMPLE_FACTOR, colors, frame.as_raw());
    for pixel in frame.chunks_exact_mut(4) {
        quantizer.map_pixel(pixel);
    }
}
